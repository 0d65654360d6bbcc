//! OpenAPI document to request-file generation.
//!
//! A stateless collaborator: feed it an OpenAPI 3.x document as JSON
//! text, get back request-file text ready to save and run. Nothing it
//! produces feeds back into parsing or execution.
//!
//! The generated file declares `@baseUrl` from the first server entry
//! and one named request per operation: required query parameters become
//! `name={{name}}` lines so the values stay declarable, and operations
//! with a JSON request body get a `Content-Type` header and an empty
//! object body as a starting point.

use serde_json::Value;
use std::fmt;

/// Errors raised while generating a request file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratorError {
    /// The input is not valid JSON.
    InvalidJson(String),

    /// The document has no `paths` object.
    MissingPaths,
}

impl fmt::Display for GeneratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneratorError::InvalidJson(msg) => {
                write!(f, "OpenAPI document is not valid JSON: {}", msg)
            }
            GeneratorError::MissingPaths => {
                write!(f, "OpenAPI document has no 'paths' object")
            }
        }
    }
}

impl std::error::Error for GeneratorError {}

const HTTP_METHODS: [&str; 8] = [
    "get", "post", "put", "delete", "patch", "options", "head", "trace",
];

/// Generates request-file text from an OpenAPI document.
pub fn generate(openapi_json: &str) -> Result<String, GeneratorError> {
    let doc: Value =
        serde_json::from_str(openapi_json).map_err(|e| GeneratorError::InvalidJson(e.to_string()))?;

    let paths = doc
        .get("paths")
        .and_then(Value::as_object)
        .ok_or(GeneratorError::MissingPaths)?;

    let base_url = doc
        .get("servers")
        .and_then(Value::as_array)
        .and_then(|servers| servers.first())
        .and_then(|server| server.get("url"))
        .and_then(Value::as_str)
        .unwrap_or("http://localhost");

    let mut out = String::new();
    out.push_str(&format!("@baseUrl = {}\n", base_url));

    for (path, item) in paths {
        let Some(item) = item.as_object() else {
            continue;
        };
        for method in HTTP_METHODS {
            let Some(operation) = item.get(method) else {
                continue;
            };
            out.push('\n');
            out.push_str(&generate_operation(path, method, operation));
        }
    }

    Ok(out)
}

fn generate_operation(path: &str, method: &str, operation: &Value) -> String {
    let name = operation
        .get("operationId")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| fallback_name(method, path));

    let mut out = String::new();
    out.push_str(&format!("### #{}\n", sanitize_name(&name)));
    out.push_str(&format!(
        "{} {{{{baseUrl}}}}{}\n",
        method.to_uppercase(),
        template_path(path)
    ));

    if wants_json_body(operation) {
        out.push_str("Content-Type: application/json\n");
    }

    for parameter in required_query_parameters(operation) {
        out.push_str(&format!("{}={{{{{}}}}}\n", parameter, parameter));
    }

    if wants_json_body(operation) {
        out.push_str("\n{}\n");
    }

    out
}

/// Converts `{param}` path segments into `{{param}}` placeholders.
fn template_path(path: &str) -> String {
    path.replace('{', "{{").replace('}', "}}")
}

fn fallback_name(method: &str, path: &str) -> String {
    format!("{}_{}", method, path.trim_matches('/').replace('/', "_"))
}

/// Keeps the name within the request-marker grammar.
fn sanitize_name(name: &str) -> String {
    let mut sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty()
        || !sanitized
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .unwrap_or(false)
    {
        sanitized.insert(0, '_');
    }
    sanitized
}

fn required_query_parameters(operation: &Value) -> Vec<String> {
    operation
        .get("parameters")
        .and_then(Value::as_array)
        .map(|parameters| {
            parameters
                .iter()
                .filter(|p| p.get("in").and_then(Value::as_str) == Some("query"))
                .filter(|p| p.get("required").and_then(Value::as_bool) == Some(true))
                .filter_map(|p| p.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn wants_json_body(operation: &Value) -> bool {
    operation
        .get("requestBody")
        .and_then(|body| body.get("content"))
        .and_then(Value::as_object)
        .map(|content| content.keys().any(|k| k.starts_with("application/json")))
        .unwrap_or(false)
}
