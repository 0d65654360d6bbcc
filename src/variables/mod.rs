//! Variable resolution.
//!
//! This module resolves `{{...}}` placeholders against a scope chain,
//! including the side-effecting placeholder kinds: environment reads,
//! one-shot command execution, and cached command execution.

pub mod substitution;

pub use substitution::{resolve, Scope};

use crate::shell::CommandError;
use std::fmt;

/// Errors raised during placeholder resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarError {
    /// A plain reference was undefined in every applicable scope.
    Undefined(String),

    /// Variable definitions refer back to themselves (directly or via a
    /// chain deeper than the resolver's depth cap).
    CircularReference(String),

    /// A command-substitution placeholder failed.
    Command(CommandError),
}

impl fmt::Display for VarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarError::Undefined(name) => {
                write!(f, "Undefined variable '{}'", name)
            }
            VarError::CircularReference(name) => {
                write!(f, "Circular reference while resolving '{}'", name)
            }
            VarError::Command(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for VarError {}

impl From<CommandError> for VarError {
    fn from(err: CommandError) -> Self {
        VarError::Command(err)
    }
}
