//! Response-side data models.
//!
//! [`HttpResponse`] is the immutable view a post-hook gets of a completed
//! network call: status, headers, body, plus a JSON-decode accessor whose
//! result is cached so repeated `res.json.*` reads decode at most once.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error raised by the JSON accessor on a response.
///
/// Per the interpreter's error model this is fatal only to the hook that
/// invoked the accessor, not to the request or its callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonDecodeError {
    /// The body is not valid JSON (or not valid UTF-8).
    Decode(String),

    /// The body decoded but the requested path does not exist.
    PathNotFound(String),
}

impl fmt::Display for JsonDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonDecodeError::Decode(msg) => {
                write!(f, "Response body is not valid JSON: {}", msg)
            }
            JsonDecodeError::PathNotFound(path) => {
                write!(f, "JSON path '{}' not found in response body", path)
            }
        }
    }
}

impl std::error::Error for JsonDecodeError {}

/// An HTTP response as produced by the transport.
///
/// Immutable once constructed (hooks only read it). The body is kept as
/// raw bytes so binary responses survive; text accessors convert on
/// demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpResponse {
    /// HTTP status code (e.g. 200, 404).
    pub status_code: u16,

    /// Human-readable status text (e.g. "OK", "Not Found").
    pub status_text: String,

    /// Response headers in arrival order.
    pub headers: Vec<(String, String)>,

    /// Raw response body.
    pub body: Vec<u8>,

    /// Cached result of the JSON accessor.
    #[serde(skip)]
    json_cache: OnceCell<serde_json::Value>,
}

impl HttpResponse {
    /// Creates a response with the given status and no headers or body.
    pub fn new(status_code: u16, status_text: impl Into<String>) -> Self {
        Self {
            status_code,
            status_text: status_text.into(),
            headers: Vec::new(),
            body: Vec::new(),
            json_cache: OnceCell::new(),
        }
    }

    /// True when the status code is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Looks up a header value, name compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the body as UTF-8 text, replacing invalid sequences.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decodes the body as JSON, caching the result.
    ///
    /// The decode happens at most once per response; every subsequent
    /// call returns the cached value (or the same error for a body that
    /// is not JSON).
    pub fn json(&self) -> Result<&serde_json::Value, JsonDecodeError> {
        if let Some(value) = self.json_cache.get() {
            return Ok(value);
        }
        let text = std::str::from_utf8(&self.body)
            .map_err(|e| JsonDecodeError::Decode(e.to_string()))?;
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| JsonDecodeError::Decode(e.to_string()))?;
        Ok(self.json_cache.get_or_init(|| value))
    }

    /// Extracts a dotted path from the decoded JSON body.
    ///
    /// Path segments index objects by key and arrays by number. Scalar
    /// leaves render without JSON quoting; composite leaves render as
    /// compact JSON.
    pub fn json_path(&self, path: &str) -> Result<String, JsonDecodeError> {
        let mut current = self.json()?;
        for segment in path.split('.') {
            current = match current {
                serde_json::Value::Object(map) => map
                    .get(segment)
                    .ok_or_else(|| JsonDecodeError::PathNotFound(path.to_string()))?,
                serde_json::Value::Array(items) => segment
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| items.get(i))
                    .ok_or_else(|| JsonDecodeError::PathNotFound(path.to_string()))?,
                _ => return Err(JsonDecodeError::PathNotFound(path.to_string())),
            };
        }
        Ok(render_json_value(current))
    }
}

/// Renders a JSON value for use as a plain string.
fn render_json_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
