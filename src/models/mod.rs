//! Core data models.
//!
//! This module defines the data structures shared across the interpreter:
//! the parsed [`Document`], individual request definitions, and HTTP
//! responses as seen by hooks and the formatter.

pub mod request;
pub mod response;

pub use request::{Document, HttpMethod, RequestConfig, RequestDef};
pub use response::{HttpResponse, JsonDecodeError};
