//! HTTP transport seam.
//!
//! [`Transport`] is the only place requests leave the process. The
//! production implementation is [`HttpTransport`] over a `ureq` agent;
//! tests use the in-memory `MockServer`.

use std::fmt::Write;
use std::time::Duration;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::de::DeserializeOwned;
use tracing::debug;
use ureq::Agent;

use crate::auth::Auth;
use crate::error::TransportError;

/// Characters escaped in query keys and values (everything but unreserved).
const QUERY: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
        }
    }
}

/// API request relative to the server base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    /// Path starting with `/rest/api`.
    pub path: String,
    /// Query parameters in insertion order, unencoded.
    pub query: Vec<(String, String)>,
    /// JSON body for POST and PUT.
    pub body: Option<serde_json::Value>,
}

impl Request {
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::Post,
            body: Some(body),
            ..Self::get(path)
        }
    }

    #[must_use]
    pub fn put(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::Put,
            body: Some(body),
            ..Self::get(path)
        }
    }

    /// Add a query parameter.
    #[must_use]
    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_owned(), value.to_string()));
        self
    }

    /// Last value of a query parameter.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Path with the percent-encoded query string.
    pub fn path_and_query(&self) -> String {
        let mut out = self.path.clone();
        for (index, (key, value)) in self.query.iter().enumerate() {
            out.push(if index == 0 { '?' } else { '&' });
            write!(
                out,
                "{}={}",
                utf8_percent_encode(key, QUERY),
                utf8_percent_encode(value, QUERY)
            )
            .unwrap();
        }
        out
    }
}

/// Raw response: status and body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Response {
    /// Body as text, replacing invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserialize the JSON body.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Executes API requests.
///
/// Non-success statuses are returned as responses, not errors; only a
/// failure to complete the exchange is a [`TransportError`].
pub trait Transport {
    fn execute(&self, request: &Request) -> Result<Response, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, request: &Request) -> Result<Response, TransportError> {
        (**self).execute(request)
    }
}

/// Transport over HTTPS with a `ureq` agent.
pub struct HttpTransport {
    agent: Agent,
    base_url: String,
    auth: Auth,
}

impl HttpTransport {
    /// Create a transport with a global per-request timeout.
    #[must_use]
    pub fn new(base_url: &str, auth: Auth, timeout: Duration) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_owned(),
            auth,
        }
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: &Request) -> Result<Response, TransportError> {
        let url = format!("{}{}", self.base_url, request.path_and_query());
        debug!(
            method = request.method.as_str(),
            url = %url,
            auth = self.auth.scheme(),
            "Sending request (Authorization redacted)"
        );

        let auth_header = self.auth.header_value();
        let response = match request.method {
            Method::Get => self
                .agent
                .get(&url)
                .header("Authorization", &auth_header)
                .header("Accept", "application/json")
                .call()?,
            Method::Post | Method::Put => {
                let payload = serde_json::to_vec(
                    request.body.as_ref().unwrap_or(&serde_json::Value::Null),
                )?;
                let builder = if request.method == Method::Post {
                    self.agent.post(&url)
                } else {
                    self.agent.put(&url)
                };
                builder
                    .header("Authorization", &auth_header)
                    .header("Content-Type", "application/json")
                    .header("Accept", "application/json")
                    .send(&payload[..])?
            }
        };

        let status = response.status().as_u16();
        let body = response.into_body().read_to_vec()?;
        debug!(status, bytes = body.len(), "Received response");
        Ok(Response { status, body })
    }
}
