//! In-memory request and environment.

use std::collections::BTreeMap;

use crate::request::{Environment, Method, Request};

// ---------------------------------------------------------------------------
// MockRequest
// ---------------------------------------------------------------------------

/// A request built in code.
///
/// # Examples
///
/// ```
/// use weft::request::Request;
/// use weft::testing::MockRequest;
///
/// let request = MockRequest::post().param("name", "Ada").param("tag", "a").param("tag", "b");
/// assert_eq!(request.parameter("name"), Some("Ada"));
/// assert_eq!(request.parameter_values("tag"), vec!["a", "b"]);
/// ```
#[derive(Debug, Clone)]
pub struct MockRequest {
    method: Method,
    params: Vec<(String, String)>,
    session_attributes: BTreeMap<String, String>,
    app_attributes: BTreeMap<String, String>,
    logged_out: bool,
}

impl MockRequest {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            params: Vec::new(),
            session_attributes: BTreeMap::new(),
            app_attributes: BTreeMap::new(),
            logged_out: false,
        }
    }

    pub fn get() -> Self {
        Self::new(Method::Get)
    }

    pub fn post() -> Self {
        Self::new(Method::Post)
    }

    /// Add a parameter value (builder). Repeating a name makes it multi-valued.
    pub fn param(mut self, name: &str, value: &str) -> Self {
        self.params.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Whether something asked for the session to end.
    pub fn logged_out(&self) -> bool {
        self.logged_out
    }
}

impl Request for MockRequest {
    fn method(&self) -> Method {
        self.method.clone()
    }

    fn parameter(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn parameter_values(&self, name: &str) -> Vec<&str> {
        self.params
            .iter()
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
            .collect()
    }

    fn parameter_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for (key, _) in &self.params {
            if !names.contains(&key.as_str()) {
                names.push(key);
            }
        }
        names
    }

    fn session_attribute(&self, key: &str) -> Option<&str> {
        self.session_attributes.get(key).map(String::as_str)
    }

    fn set_session_attribute(&mut self, key: &str, value: String) {
        self.session_attributes.insert(key.to_owned(), value);
    }

    fn app_attribute(&self, key: &str) -> Option<&str> {
        self.app_attributes.get(key).map(String::as_str)
    }

    fn set_app_attribute(&mut self, key: &str, value: String) {
        self.app_attributes.insert(key.to_owned(), value);
    }

    fn logout(&mut self) {
        self.logged_out = true;
    }
}

// ---------------------------------------------------------------------------
// MockEnvironment
// ---------------------------------------------------------------------------

/// Fixed post path and hidden parameters.
#[derive(Debug, Clone, Default)]
pub struct MockEnvironment {
    post_path: String,
    hidden: BTreeMap<String, String>,
}

impl MockEnvironment {
    pub fn new(post_path: &str) -> Self {
        Self {
            post_path: post_path.to_owned(),
            hidden: BTreeMap::new(),
        }
    }

    /// Add a hidden parameter (builder).
    pub fn with_hidden(mut self, key: &str, value: &str) -> Self {
        self.hidden.insert(key.to_owned(), value.to_owned());
        self
    }
}

impl Environment for MockEnvironment {
    fn post_path(&self) -> &str {
        &self.post_path
    }

    fn hidden_parameters(&self) -> BTreeMap<String, String> {
        self.hidden.clone()
    }
}
