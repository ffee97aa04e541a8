//! Follow-up URLs for partial-content fetches.

use ::url::form_urlencoded;

use crate::request::Environment;

/// Build the URL a client calls to service `trigger_id`: the environment's post
/// path, its hidden parameters, then `param=trigger_id`.
pub fn follow_up_url(env: &dyn Environment, param: &str, trigger_id: &str) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    for (key, value) in env.hidden_parameters() {
        query.append_pair(&key, &value);
    }
    query.append_pair(param, trigger_id);
    format!("{}?{}", env.post_path(), query.finish())
}
