//! Collaborator interfaces: the inbound request and its environment.
//!
//! The HTTP layer adapts its own request type to [`Request`]; the lifecycle only
//! sees opaque parameters, a method and attribute maps.

use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Method
// ---------------------------------------------------------------------------

/// HTTP method of a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Other(String),
}

impl Method {
    /// Parse a method name, case-insensitively.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "DELETE" => Self::Delete,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Post => f.write_str("POST"),
            Self::Put => f.write_str("PUT"),
            Self::Delete => f.write_str("DELETE"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// An inbound request, bound to one session.
pub trait Request {
    fn method(&self) -> Method;

    /// First value of a parameter.
    fn parameter(&self, name: &str) -> Option<&str>;

    /// All values of a multi-valued parameter, in request order.
    fn parameter_values(&self, name: &str) -> Vec<&str>;

    /// Names of every parameter present.
    fn parameter_names(&self) -> Vec<&str>;

    fn session_attribute(&self, key: &str) -> Option<&str>;

    fn set_session_attribute(&mut self, key: &str, value: String);

    fn app_attribute(&self, key: &str) -> Option<&str>;

    fn set_app_attribute(&mut self, key: &str, value: String);

    /// Ask the HTTP layer to end the session after this request.
    fn logout(&mut self);
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// Routing information used to build follow-up URLs. URLs are opaque strings.
pub trait Environment: Send + Sync + fmt::Debug {
    /// Path requests should be posted to.
    fn post_path(&self) -> &str;

    /// Parameters every follow-up request must carry.
    fn hidden_parameters(&self) -> BTreeMap<String, String>;
}
