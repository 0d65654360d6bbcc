//! Placeholder substitution engine.
//!
//! Replaces `{{...}}` spans in request text with resolved values. Each
//! span is matched non-greedily (no nested braces) and classified:
//!
//! - `$NAME` reads an OS environment variable (missing → empty string)
//! - `>>cmd` runs a shell command once per run, memoized by exact
//!   command text in the shared cache
//! - `>cmd` runs a shell command on every reference, never cached
//! - anything else is a variable name, looked up hook frame first, then
//!   request locals, then globals
//!
//! Values resolved from variables are themselves resolved recursively,
//! with cycle detection and a depth cap, so transitive and forward
//! references between declarations work.

use super::VarError;
use crate::shell::CommandRunner;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Depth cap for transitive variable references.
const MAX_RESOLUTION_DEPTH: usize = 16;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{([^{}]+?)\}\}").expect("placeholder regex"));

/// The scope chain a placeholder is resolved against.
///
/// Lookup order: hook frame (loop variables and request/response views,
/// present only while a hook runs), then the current request's locals,
/// then the global store.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub hook: Option<&'a HashMap<String, String>>,
    pub locals: Option<&'a [(String, String)]>,
    pub globals: &'a HashMap<String, String>,
}

impl<'a> Scope<'a> {
    /// A scope with only the global store, used outside any request.
    pub fn global(globals: &'a HashMap<String, String>) -> Self {
        Self {
            hook: None,
            locals: None,
            globals,
        }
    }

    fn lookup(&self, name: &str) -> Option<&'a str> {
        if let Some(frame) = self.hook {
            if let Some(value) = frame.get(name) {
                return Some(value.as_str());
            }
        }
        if let Some(locals) = self.locals {
            if let Some((_, value)) = locals.iter().rev().find(|(k, _)| k == name) {
                return Some(value.as_str());
            }
        }
        self.globals.get(name).map(|v| v.as_str())
    }
}

/// Resolves every placeholder in `text` against the scope chain.
///
/// `cache` is the run-wide command cache shared by the whole invocation:
/// `>>cmd` results are inserted at most once per exact command text and
/// reused on every later reference. `timeout` bounds each command run.
pub fn resolve(
    text: &str,
    scope: &Scope<'_>,
    shell: &dyn CommandRunner,
    cache: &mut HashMap<String, String>,
    timeout: Duration,
) -> Result<String, VarError> {
    // Fast path for text without any placeholder markers.
    if !text.contains("{{") {
        return Ok(text.to_string());
    }
    resolve_depth(text, scope, shell, cache, timeout, 0, &mut HashSet::new())
}

#[allow(clippy::too_many_arguments)]
fn resolve_depth(
    text: &str,
    scope: &Scope<'_>,
    shell: &dyn CommandRunner,
    cache: &mut HashMap<String, String>,
    timeout: Duration,
    depth: usize,
    visiting: &mut HashSet<String>,
) -> Result<String, VarError> {
    if depth >= MAX_RESOLUTION_DEPTH {
        return Err(VarError::CircularReference(text.to_string()));
    }

    let mut result = String::with_capacity(text.len());
    let mut last_end = 0;

    for cap in PLACEHOLDER.captures_iter(text) {
        let span = cap.get(0).expect("full match");
        let inner = cap.get(1).expect("inner").as_str().trim();

        result.push_str(&text[last_end..span.start()]);
        result.push_str(&resolve_one(
            inner, scope, shell, cache, timeout, depth, visiting,
        )?);
        last_end = span.end();
    }

    result.push_str(&text[last_end..]);
    Ok(result)
}

/// Resolves the inside of a single `{{...}}` span.
#[allow(clippy::too_many_arguments)]
fn resolve_one(
    inner: &str,
    scope: &Scope<'_>,
    shell: &dyn CommandRunner,
    cache: &mut HashMap<String, String>,
    timeout: Duration,
    depth: usize,
    visiting: &mut HashSet<String>,
) -> Result<String, VarError> {
    // Environment read: missing variables are the empty string, never
    // an error.
    if let Some(name) = inner.strip_prefix('$') {
        return Ok(std::env::var(name.trim()).unwrap_or_default());
    }

    // Cached command execution, memoized by exact command text.
    if let Some(cmd) = inner.strip_prefix(">>") {
        let cmd = cmd.trim();
        if let Some(cached) = cache.get(cmd) {
            return Ok(cached.clone());
        }
        let output = shell.run(cmd, timeout)?;
        cache.insert(cmd.to_string(), output.clone());
        return Ok(output);
    }

    // One-shot command execution, re-run on every reference.
    if let Some(cmd) = inner.strip_prefix('>') {
        return Ok(shell.run(cmd.trim(), timeout)?);
    }

    // Plain variable reference.
    let value = scope
        .lookup(inner)
        .ok_or_else(|| VarError::Undefined(inner.to_string()))?
        .to_string();

    if visiting.contains(inner) {
        return Err(VarError::CircularReference(inner.to_string()));
    }
    visiting.insert(inner.to_string());
    let resolved = resolve_depth(&value, scope, shell, cache, timeout, depth + 1, visiting)?;
    visiting.remove(inner);
    Ok(resolved)
}
