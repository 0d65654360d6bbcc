//! Execution engine error types.
//!
//! One enum aggregates everything that can go wrong while driving a
//! request: unknown names, resolution failures, hook script errors,
//! transport failures, and the recursion safety valve. Command and
//! timeout failures arrive wrapped in the variant of the layer that hit
//! them and propagate through every pending `send` caller.

use crate::executor::RequestError;
use crate::models::JsonDecodeError;
use crate::script::ScriptError;
use crate::variables::VarError;
use std::fmt;

/// Errors raised while executing a document.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The start argument or a `send` target names no request.
    UnknownRequest(String),

    /// Placeholder resolution failed (undefined variable, cycle, or
    /// command failure).
    Var(VarError),

    /// A hook script failed to parse or hit a runtime violation.
    Script(ScriptError),

    /// The transport failed (network error or timeout).
    Request(RequestError),

    /// A hook's JSON accessor failed. Fatal to that hook only; the
    /// engine absorbs this at the hook boundary.
    Json(JsonDecodeError),

    /// Nested `send` depth exceeded the configured safety valve,
    /// usually a cycle between requests.
    RecursionLimit { depth: usize },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::UnknownRequest(name) => {
                write!(f, "Unknown request '{}'", name)
            }
            EngineError::Var(err) => write!(f, "{}", err),
            EngineError::Script(err) => write!(f, "{}", err),
            EngineError::Request(err) => write!(f, "{}", err),
            EngineError::Json(err) => write!(f, "{}", err),
            EngineError::RecursionLimit { depth } => {
                write!(
                    f,
                    "Nested send depth {} exceeded the configured limit; probable request cycle",
                    depth
                )
            }
        }
    }
}

impl std::error::Error for EngineError {}

impl From<VarError> for EngineError {
    fn from(err: VarError) -> Self {
        EngineError::Var(err)
    }
}

impl From<ScriptError> for EngineError {
    fn from(err: ScriptError) -> Self {
        EngineError::Script(err)
    }
}

impl From<RequestError> for EngineError {
    fn from(err: RequestError) -> Self {
        EngineError::Request(err)
    }
}

impl From<JsonDecodeError> for EngineError {
    fn from(err: JsonDecodeError) -> Self {
        EngineError::Json(err)
    }
}
