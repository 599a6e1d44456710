/// Blocking HTTP transport backed by `reqwest`.
///
/// An `HttpSession` owns its client and cookie jar. One session is opened per
/// run and passed explicitly to whatever needs it; dropping it releases the
/// connection pool and cookies.
use std::time::Duration;

use tracing::debug;

use super::{FetchRequest, FetchResponse, Fetcher, Method, TransportError};
use crate::config::HttpConfig;

pub struct HttpSession {
    client: reqwest::blocking::Client,
    default_headers: Vec<(String, String)>,
}

impl HttpSession {
    /// Build a session with a cookie store, per-request timeout, and user agent.
    pub fn open(config: &HttpConfig) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .cookie_store(true)
            .build()
            .map_err(|e| TransportError::Connect(format!("HTTP client build failed: {e}")))?;

        Ok(Self {
            client,
            default_headers: config.headers.clone(),
        })
    }
}

fn classify(err: reqwest::Error, url: &str) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(format!("{url}: {err}"))
    } else if let Some(status) = err.status() {
        TransportError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        }
    } else {
        TransportError::Connect(format!("{url}: {err}"))
    }
}

impl Fetcher for HttpSession {
    fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, TransportError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if !request.form.is_empty() {
            builder = builder.form(&request.form);
        }
        for (name, value) in self.default_headers.iter().chain(&request.headers) {
            builder = builder.header(name.as_str(), value.as_str());
        }

        debug!("{:?} {}", request.method, request.url);
        let resp = builder.send().map_err(|e| classify(e, &request.url))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                url: request.url.clone(),
            });
        }

        let body = resp
            .text()
            .map_err(|e| TransportError::Body(e.to_string()))?;

        Ok(FetchResponse {
            status: status.as_u16(),
            body,
        })
    }
}
