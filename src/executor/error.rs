//! HTTP transport error types.

use std::fmt;

/// Errors that can occur while sending a request.
///
/// These are fatal to the in-flight request and propagate through the
/// entire nested `send` caller chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// Connection failure, DNS error, or other network-level problem.
    Network(String),

    /// The request did not complete within the configured timeout.
    Timeout { url: String, timeout_ms: u64 },

    /// The URL could not be parsed.
    InvalidUrl(String),

    /// The URL scheme is not http or https.
    UnsupportedProtocol(String),

    /// The client or request could not be constructed.
    Build(String),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::Network(msg) => write!(f, "Network error: {}", msg),
            RequestError::Timeout { url, timeout_ms } => {
                write!(f, "Request to {} timed out after {}ms", url, timeout_ms)
            }
            RequestError::InvalidUrl(msg) => write!(f, "Invalid URL: {}", msg),
            RequestError::UnsupportedProtocol(scheme) => {
                write!(
                    f,
                    "Unsupported protocol '{}': only http and https are supported",
                    scheme
                )
            }
            RequestError::Build(msg) => write!(f, "Request build error: {}", msg),
        }
    }
}

impl std::error::Error for RequestError {}

impl From<url::ParseError> for RequestError {
    fn from(err: url::ParseError) -> Self {
        RequestError::InvalidUrl(err.to_string())
    }
}
