//! Error types for request-file parsing.
//!
//! Every variant carries the 1-based line number where the problem was
//! found so users can locate and fix syntax errors in their files.

use std::fmt;

/// Errors that can occur while parsing a request file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A `###` marker that is not a well-formed `### #<name>` line.
    InvalidMarker { content: String, line: usize },

    /// Two request blocks share the same name.
    DuplicateRequest { name: String, line: usize },

    /// A request line with an unknown HTTP method.
    InvalidMethod { method: String, line: usize },

    /// A request line with a method but no URL.
    MissingUrl { line: usize },

    /// A `Name: value` header line with an empty name.
    InvalidHeader { content: String, line: usize },

    /// An `@cfg.<key>` line with an unrecognized key.
    UnknownConfigKey { key: String, line: usize },

    /// An `@cfg.<key>` line whose value does not parse for that key.
    InvalidConfigValue {
        key: String,
        value: String,
        line: usize,
    },

    /// A line that fits no rule for its position in the file.
    UnexpectedLine { content: String, line: usize },
}

impl ParseError {
    /// Returns the line number associated with this error.
    pub fn line(&self) -> usize {
        match self {
            ParseError::InvalidMarker { line, .. } => *line,
            ParseError::DuplicateRequest { line, .. } => *line,
            ParseError::InvalidMethod { line, .. } => *line,
            ParseError::MissingUrl { line } => *line,
            ParseError::InvalidHeader { line, .. } => *line,
            ParseError::UnknownConfigKey { line, .. } => *line,
            ParseError::InvalidConfigValue { line, .. } => *line,
            ParseError::UnexpectedLine { line, .. } => *line,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::InvalidMarker { content, line } => {
                write!(
                    f,
                    "Invalid request marker '{}' at line {}. Expected format: '### #<name>'",
                    content, line
                )
            }
            ParseError::DuplicateRequest { name, line } => {
                write!(f, "Duplicate request name '{}' at line {}", name, line)
            }
            ParseError::InvalidMethod { method, line } => {
                write!(
                    f,
                    "Invalid HTTP method '{}' at line {}. Expected one of: GET, POST, PUT, DELETE, PATCH, OPTIONS, HEAD, TRACE, CONNECT",
                    method, line
                )
            }
            ParseError::MissingUrl { line } => {
                write!(
                    f,
                    "Missing URL in request line at line {}. Expected format: 'METHOD URL'",
                    line
                )
            }
            ParseError::InvalidHeader { content, line } => {
                write!(
                    f,
                    "Invalid header '{}' at line {}. Expected format: 'Header-Name: value'",
                    content, line
                )
            }
            ParseError::UnknownConfigKey { key, line } => {
                write!(
                    f,
                    "Unknown config key '{}' at line {}. Expected one of: timeout, insecure, proxy, dry-run",
                    key, line
                )
            }
            ParseError::InvalidConfigValue { key, value, line } => {
                write!(
                    f,
                    "Invalid value '{}' for config key '{}' at line {}",
                    value, key, line
                )
            }
            ParseError::UnexpectedLine { content, line } => {
                write!(f, "Unexpected line '{}' at line {}", content, line)
            }
        }
    }
}

impl std::error::Error for ParseError {}
