//! Execution configuration.
//!
//! The base configuration comes from the CLI (or library caller);
//! `@cfg.*` overrides layer on top of it, document-level first, then the
//! executing request's block.

use crate::models::RequestConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default timeout for network calls and shell commands.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default cap on nested `send` depth.
///
/// The interpreter deliberately imposes no semantic limit on chaining,
/// but a cycle between requests would otherwise recurse until resource
/// exhaustion; this safety valve turns that into a reportable error.
pub const DEFAULT_MAX_SEND_DEPTH: usize = 64;

/// Fully-determined configuration for one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Timeout in milliseconds for network calls and shell commands.
    pub timeout_ms: u64,

    /// Skip TLS certificate verification.
    pub insecure: bool,

    /// Proxy URL for outgoing requests.
    pub proxy: Option<String>,

    /// Resolve and substitute but skip the network call.
    pub dry_run: bool,

    /// Maximum nested `send` depth before aborting.
    pub max_send_depth: usize,
}

impl ExecutionConfig {
    /// Returns the timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Applies a layer of `@cfg.*` overrides on top of this config.
    pub fn with_overrides(&self, overrides: &RequestConfig) -> ExecutionConfig {
        ExecutionConfig {
            timeout_ms: overrides.timeout_ms.unwrap_or(self.timeout_ms),
            insecure: overrides.insecure.unwrap_or(self.insecure),
            proxy: overrides.proxy.clone().or_else(|| self.proxy.clone()),
            dry_run: overrides.dry_run.unwrap_or(self.dry_run),
            max_send_depth: self.max_send_depth,
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            insecure: false,
            proxy: None,
            dry_run: false,
            max_send_depth: DEFAULT_MAX_SEND_DEPTH,
        }
    }
}
