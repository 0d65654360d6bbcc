//! Output formatting.
//!
//! Renders a completed [`RequestOutcome`] for the terminal in one of two
//! modes. Terse mode prints the response body — or the hook's `write`
//! replacement — followed by any `append` lines, and nothing else.
//! Verbose mode prints fixed banner sections with the full request and
//! response detail; hook output always appears after them, regardless of
//! what the hook wrote. Sections with nothing to show (script-only runs,
//! dry runs) are omitted.

use crate::engine::RequestOutcome;
use crate::executor::ResolvedRequest;
use crate::models::HttpResponse;

/// How much of the outcome to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Body (or `write` replacement) plus trailing `append` lines.
    Terse,
    /// Banner sections with full request and response detail.
    Verbose,
}

/// Renders an outcome in the given mode.
pub fn format_outcome(outcome: &RequestOutcome, mode: OutputMode) -> String {
    match mode {
        OutputMode::Terse => format_terse(outcome),
        OutputMode::Verbose => format_verbose(outcome),
    }
}

fn format_terse(outcome: &RequestOutcome) -> String {
    let mut out = match &outcome.write {
        Some(replacement) => replacement.clone(),
        None => outcome
            .response
            .as_ref()
            .map(|r| r.body_text())
            .unwrap_or_default(),
    };

    for append in &outcome.appends {
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(append);
    }

    out
}

fn format_verbose(outcome: &RequestOutcome) -> String {
    let mut sections = Vec::new();

    if let Some(request) = &outcome.request {
        sections.push(format_request_section(request));
    }
    if let Some(response) = &outcome.response {
        sections.push(format_response_section(response));
    }
    if outcome.write.is_some() || !outcome.appends.is_empty() {
        sections.push(format_output_section(outcome));
    }

    sections.join("\n")
}

fn format_request_section(request: &ResolvedRequest) -> String {
    let mut out = String::from("=== Request ===\n");
    out.push_str(&format!("{} {}\n", request.method, request.url));
    for (name, value) in &request.headers {
        out.push_str(&format!("{}: {}\n", name, value));
    }
    if let Some(body) = &request.body {
        out.push('\n');
        out.push_str(body);
        out.push('\n');
    }
    out
}

fn format_response_section(response: &HttpResponse) -> String {
    let mut out = String::from("=== Response ===\n");
    out.push_str(&format!(
        "{} {}\n",
        response.status_code, response.status_text
    ));
    for (name, value) in &response.headers {
        out.push_str(&format!("{}: {}\n", name, value));
    }
    let body = response.body_text();
    if !body.is_empty() {
        out.push('\n');
        out.push_str(&body);
        if !body.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

fn format_output_section(outcome: &RequestOutcome) -> String {
    let mut out = String::from("=== Output ===\n");
    if let Some(write) = &outcome.write {
        out.push_str(write);
        if !write.ends_with('\n') {
            out.push('\n');
        }
    }
    for append in &outcome.appends {
        out.push_str(append);
        if !append.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}
