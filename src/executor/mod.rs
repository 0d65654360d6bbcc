//! HTTP transport capability.
//!
//! The engine talks to the network through the [`Transport`] trait:
//! send a wire-ready request, get a response. The default implementation
//! uses reqwest's blocking client — the whole interpreter is a single
//! logical thread of control, so the only suspension points are this
//! call and shell-command execution. Tests substitute fake transports.

pub mod error;

pub use error::RequestError;

use crate::models::{HttpMethod, HttpResponse};
use std::time::Duration;

/// Per-send options, produced from the layered config overrides.
#[derive(Debug, Clone)]
pub struct SendOptions {
    /// Hard deadline for the whole request/response cycle.
    pub timeout: Duration,

    /// Skip TLS certificate verification.
    pub insecure: bool,

    /// Proxy URL for the outgoing request.
    pub proxy: Option<String>,
}

/// A request after placeholder substitution, ready for the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRequest {
    pub method: HttpMethod,
    /// Final URL with query parameters merged in.
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

/// Capability for sending a request and receiving a response.
pub trait Transport {
    fn send(
        &self,
        request: &ResolvedRequest,
        options: &SendOptions,
    ) -> Result<HttpResponse, RequestError>;
}

/// Validates the URL and merges query parameters into it.
///
/// The scheme must be http or https. Parameter values arrive already
/// substituted; percent-encoding is handled here.
pub fn append_query(url: &str, pairs: &[(String, String)]) -> Result<String, RequestError> {
    let mut parsed = url::Url::parse(url)?;

    let scheme = parsed.scheme().to_string();
    if scheme != "http" && scheme != "https" {
        return Err(RequestError::UnsupportedProtocol(scheme));
    }

    if !pairs.is_empty() {
        let mut editor = parsed.query_pairs_mut();
        for (key, value) in pairs {
            editor.append_pair(key, value);
        }
        drop(editor);
    }

    Ok(parsed.to_string())
}

/// The reqwest-backed [`Transport`] implementation.
#[derive(Debug, Default)]
pub struct ReqwestTransport;

impl ReqwestTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for ReqwestTransport {
    fn send(
        &self,
        request: &ResolvedRequest,
        options: &SendOptions,
    ) -> Result<HttpResponse, RequestError> {
        let mut builder = reqwest::blocking::Client::builder()
            .timeout(options.timeout)
            .danger_accept_invalid_certs(options.insecure);

        if let Some(proxy_url) = &options.proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| RequestError::Build(format!("invalid proxy: {}", e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| RequestError::Build(e.to_string()))?;

        let mut req = client.request(to_reqwest_method(request.method), &request.url);
        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            req = req.body(body.clone());
        }

        let response = req.send().map_err(|e| {
            if e.is_timeout() {
                RequestError::Timeout {
                    url: request.url.clone(),
                    timeout_ms: options.timeout.as_millis() as u64,
                }
            } else if e.is_connect() {
                RequestError::Network(format!("connection failed: {}", e))
            } else if e.is_builder() {
                RequestError::Build(e.to_string())
            } else {
                RequestError::Network(e.to_string())
            }
        })?;

        let status_code = response.status().as_u16();
        let status_text = response
            .status()
            .canonical_reason()
            .unwrap_or("Unknown")
            .to_string();

        let mut headers = Vec::new();
        for (name, value) in response.headers() {
            if let Ok(value_str) = value.to_str() {
                headers.push((name.as_str().to_string(), value_str.to_string()));
            }
        }

        let body = response
            .bytes()
            .map_err(|e| RequestError::Network(e.to_string()))?
            .to_vec();

        let mut http_response = HttpResponse::new(status_code, status_text);
        http_response.headers = headers;
        http_response.body = body;
        Ok(http_response)
    }
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::GET => reqwest::Method::GET,
        HttpMethod::POST => reqwest::Method::POST,
        HttpMethod::PUT => reqwest::Method::PUT,
        HttpMethod::DELETE => reqwest::Method::DELETE,
        HttpMethod::PATCH => reqwest::Method::PATCH,
        HttpMethod::OPTIONS => reqwest::Method::OPTIONS,
        HttpMethod::HEAD => reqwest::Method::HEAD,
        HttpMethod::TRACE => reqwest::Method::TRACE,
        HttpMethod::CONNECT => reqwest::Method::CONNECT,
    }
}
