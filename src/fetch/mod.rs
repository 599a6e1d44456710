//! Request/response plumbing between the linker and external directories.
//!
//! The core only sees the [`Fetcher`] trait: one blocking call per request,
//! non-2xx and network failures surfaced as [`TransportError`].
pub mod challenge;
pub mod http;
pub mod mock;

use thiserror::Error;

/// Errors raised by a [`Fetcher`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("challenge required at {url} and no token was obtained")]
    ChallengeUnsolved { url: String },
}

impl TransportError {
    /// Timeouts, connection failures, 429 and 5xx are worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Connect(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Body(_) | Self::ChallengeUnsolved { .. } => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A single idempotent request. Query and form pairs are URL-encoded by the
/// transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub form: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl FetchRequest {
    fn new(method: Method, url: &str) -> Self {
        Self {
            method,
            url: url.to_string(),
            query: Vec::new(),
            form: Vec::new(),
            headers: Vec::new(),
        }
    }

    pub fn get(url: &str) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: &str) -> Self {
        Self::new(Method::Post, url)
    }

    #[must_use]
    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    #[must_use]
    pub fn form(mut self, key: &str, value: impl ToString) -> Self {
        self.form.push((key.to_string(), value.to_string()));
        self
    }

    #[must_use]
    pub fn header(mut self, name: &str, value: impl ToString) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    #[must_use]
    pub fn headers<'a>(mut self, pairs: impl IntoIterator<Item = &'a (String, String)>) -> Self {
        self.headers.extend(pairs.into_iter().cloned());
        self
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn form_value(&self, key: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A successful (2xx) response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

/// Blocking transport used by the harvest loop and the linker.
pub trait Fetcher {
    /// Perform `request`. Non-2xx responses are returned as
    /// [`TransportError::Status`].
    fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, TransportError>;
}

impl<F: Fetcher + ?Sized> Fetcher for &F {
    fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, TransportError> {
        (**self).fetch(request)
    }
}

/// Resolve a detail reference against a directory base URL.
pub fn resolve_url(base_url: &str, reference: &str) -> String {
    if reference.starts_with("http://") || reference.starts_with("https://") {
        return reference.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        reference.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(TransportError::Timeout("t".into()).is_transient());
        assert!(TransportError::Connect("reset".into()).is_transient());
        for status in [429, 500, 502, 503] {
            let err = TransportError::Status {
                status,
                url: "u".into(),
            };
            assert!(err.is_transient(), "{status} should be transient");
        }
        for status in [400, 403, 404] {
            let err = TransportError::Status {
                status,
                url: "u".into(),
            };
            assert!(!err.is_transient(), "{status} should not be transient");
        }
        assert!(!TransportError::Body("bad".into()).is_transient());
    }

    #[test]
    fn test_request_builder() {
        let req = FetchRequest::post("https://d.test/search")
            .form("q", "John Smith")
            .query("page", 2)
            .header("Accept", "application/json");
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.form_value("q"), Some("John Smith"));
        assert_eq!(req.query_value("page"), Some("2"));
        assert_eq!(req.header_value("accept"), Some("application/json"));
        assert_eq!(req.query_value("missing"), None);
    }

    #[test]
    fn test_resolve_url() {
        assert_eq!(
            resolve_url("https://d.test/", "/find/person/abc"),
            "https://d.test/find/person/abc"
        );
        assert_eq!(
            resolve_url("https://d.test", "https://other.test/x"),
            "https://other.test/x"
        );
    }
}
