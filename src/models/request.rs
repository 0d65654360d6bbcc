//! Request-side data models.
//!
//! A parsed request file becomes a [`Document`]: an ordered set of global
//! variable declarations plus an ordered list of named [`RequestDef`]s.
//! Variable values are stored raw — placeholders are resolved at the point
//! of use, not at declaration time, so forward references between
//! variables are legal.

use serde::{Deserialize, Serialize};

/// HTTP request method.
///
/// All standard methods as defined in RFC 7231 and RFC 5789.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpMethod {
    GET,
    POST,
    PUT,
    DELETE,
    PATCH,
    OPTIONS,
    HEAD,
    TRACE,
    CONNECT,
}

impl HttpMethod {
    /// Returns the string representation of the method.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::DELETE => "DELETE",
            HttpMethod::PATCH => "PATCH",
            HttpMethod::OPTIONS => "OPTIONS",
            HttpMethod::HEAD => "HEAD",
            HttpMethod::TRACE => "TRACE",
            HttpMethod::CONNECT => "CONNECT",
        }
    }

    /// Parses a string into an `HttpMethod`.
    ///
    /// Matching is case-insensitive. Returns `None` for anything that is
    /// not one of the nine standard methods.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "GET" => Some(HttpMethod::GET),
            "POST" => Some(HttpMethod::POST),
            "PUT" => Some(HttpMethod::PUT),
            "DELETE" => Some(HttpMethod::DELETE),
            "PATCH" => Some(HttpMethod::PATCH),
            "OPTIONS" => Some(HttpMethod::OPTIONS),
            "HEAD" => Some(HttpMethod::HEAD),
            "TRACE" => Some(HttpMethod::TRACE),
            "CONNECT" => Some(HttpMethod::CONNECT),
            _ => None,
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-request configuration overrides.
///
/// Every field is optional: `None` means "inherit from the next layer
/// down" (request block → document → base config from the CLI). Parsed
/// from `@cfg.<key> = value` lines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestConfig {
    /// Request/command timeout in milliseconds.
    pub timeout_ms: Option<u64>,

    /// Skip TLS certificate verification.
    pub insecure: Option<bool>,

    /// Proxy URL for the outgoing request.
    pub proxy: Option<String>,

    /// Resolve and substitute but skip the network call.
    pub dry_run: Option<bool>,
}

impl RequestConfig {
    /// Layers `over` on top of `self`: any field set in `over` wins.
    pub fn overlay(&self, over: &RequestConfig) -> RequestConfig {
        RequestConfig {
            timeout_ms: over.timeout_ms.or(self.timeout_ms),
            insecure: over.insecure.or(self.insecure),
            proxy: over.proxy.clone().or_else(|| self.proxy.clone()),
            dry_run: over.dry_run.or(self.dry_run),
        }
    }
}

/// A single named request definition parsed from a request file.
///
/// A definition without a method/URL pair is *script-only*: invoking it
/// runs its script body with no network activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestDef {
    /// Unique name within the document, from the `### #<name>` marker.
    pub name: String,

    /// HTTP method; `None` marks the request script-only.
    pub method: Option<HttpMethod>,

    /// Target URL, possibly containing `{{...}}` placeholders.
    /// Present exactly when `method` is present.
    pub url: Option<String>,

    /// Ordered header name/value pairs, values unresolved.
    pub headers: Vec<(String, String)>,

    /// Ordered query parameter pairs, values unresolved.
    pub query: Vec<(String, String)>,

    /// Raw body text, unresolved, verbatim from the file.
    pub body: Option<String>,

    /// Local variable declarations; shadow globals within this request only.
    pub locals: Vec<(String, String)>,

    /// Pre-hook script source, run before substitution and send.
    pub pre_script: Option<String>,

    /// Post-hook script source, run after the response arrives. For a
    /// script-only request this is the entire script body.
    pub post_script: Option<String>,

    /// Config overrides declared inside this block.
    pub config: RequestConfig,

    /// Line number of the `### #<name>` marker (1-based).
    pub line_number: usize,
}

impl RequestDef {
    /// Creates an empty definition for the given name and marker line.
    pub fn new(name: impl Into<String>, line_number: usize) -> Self {
        Self {
            name: name.into(),
            method: None,
            url: None,
            headers: Vec::new(),
            query: Vec::new(),
            body: None,
            locals: Vec::new(),
            pre_script: None,
            post_script: None,
            config: RequestConfig::default(),
            line_number,
        }
    }

    /// True when the definition has no method/URL line.
    pub fn is_script_only(&self) -> bool {
        self.method.is_none()
    }

    /// Looks up a local declaration by name, last declaration wins.
    pub fn local(&self, name: &str) -> Option<&str> {
        self.locals
            .iter()
            .rev()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A fully parsed request file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    /// Global variable declarations in file order, values raw.
    pub globals: Vec<(String, String)>,

    /// Document-level config overrides (declared before any block).
    pub config: RequestConfig,

    /// Request definitions in file order. Names are unique.
    pub requests: Vec<RequestDef>,
}

impl Document {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a request definition by name.
    pub fn request(&self, name: &str) -> Option<&RequestDef> {
        self.requests.iter().find(|r| r.name == name)
    }
}
