// src/core/net.rs
//
// Blocking HTTP GET behind a small trait so sources can be driven from canned
// bodies (tests, benches) without touching the network.

use std::collections::HashMap;
use std::sync::Mutex;

use reqwest::blocking::Client;
use reqwest::header::{self, HeaderMap, HeaderValue};
use thiserror::Error;
use tracing::debug;

use crate::config::HttpOptions;
use crate::config::consts::{ACCEPT, ACCEPT_LANGUAGE};

/// A fetched response body.
#[derive(Clone, Debug)]
pub struct Body {
    pub url: String,
    pub content_type: Option<String>,
    pub text: String,
}

impl Body {
    pub fn looks_like_json(&self) -> bool {
        self.content_type.as_deref().is_some_and(|c| c.contains("json"))
            || self.text.trim_start().starts_with(['{', '['])
    }
}

#[derive(Debug, Error)]
pub enum NetError {
    #[error("request to {url} failed: {cause}")]
    Request { url: String, cause: String },
    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("reading body from {url}: {cause}")]
    Body { url: String, cause: String },
    #[error("building HTTP client: {0}")]
    Client(String),
}

pub trait Transport: Send + Sync {
    fn get(&self, url: &str) -> Result<Body, NetError>;
}

/* ---------------- reqwest ---------------- */

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Browser-like headers; fixed timeout from options.
    pub fn new(opts: &HttpOptions) -> Result<Self, NetError> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT));
        headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE));

        let client = Client::builder()
            .timeout(opts.timeout)
            .user_agent(opts.user_agent.as_str())
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| NetError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<Body, NetError> {
        debug!(url, "GET");
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| NetError::Request { url: s!(url), cause: e.to_string() })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(NetError::Status { url: s!(url), status: status.as_u16() });
        }

        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_ascii_lowercase());

        let text = resp
            .text()
            .map_err(|e| NetError::Body { url: s!(url), cause: e.to_string() })?;

        Ok(Body { url: s!(url), content_type, text })
    }
}

/* ---------------- canned ---------------- */

/// Serves fixed bodies by URL and records every request.
/// Unknown URLs fail like a refused connection.
#[derive(Default)]
pub struct FixtureTransport {
    bodies: HashMap<String, Result<String, u16>>,
    calls: Mutex<Vec<String>>,
}

impl FixtureTransport {
    pub fn new() -> Self { Self::default() }

    pub fn with_body(mut self, url: &str, body: &str) -> Self {
        self.bodies.insert(s!(url), Ok(s!(body)));
        self
    }

    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.bodies.insert(s!(url), Err(status));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl Transport for FixtureTransport {
    fn get(&self, url: &str) -> Result<Body, NetError> {
        if let Ok(mut c) = self.calls.lock() {
            c.push(s!(url));
        }
        match self.bodies.get(url) {
            Some(Ok(text)) => Ok(Body { url: s!(url), content_type: None, text: text.clone() }),
            Some(Err(status)) => Err(NetError::Status { url: s!(url), status: *status }),
            None => Err(NetError::Request { url: s!(url), cause: s!("connection refused") }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_serves_and_records() {
        let t = FixtureTransport::new()
            .with_body("http://a/x.json", r#"{"ok":true}"#)
            .with_status("http://a/down", 503);

        let body = t.get("http://a/x.json").unwrap();
        assert!(body.looks_like_json());
        assert!(matches!(t.get("http://a/down"), Err(NetError::Status { status: 503, .. })));
        assert!(matches!(t.get("http://a/missing"), Err(NetError::Request { .. })));
        assert_eq!(t.calls().len(), 3);
    }

    #[test]
    fn client_builds_with_defaults() {
        assert!(HttpTransport::new(&HttpOptions::default()).is_ok());
    }
}
