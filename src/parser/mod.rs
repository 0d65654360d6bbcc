//! Request-file parser.
//!
//! Parses the line-oriented request-file format into a [`Document`]:
//! global variable declarations followed by named request blocks opened
//! by `### #<name>` markers. Parsing is a single forward pass with no
//! backtracking beyond the current block.
//!
//! Inside a block the sections appear in order: `@name = value` locals
//! and `@cfg.*` overrides, an optional `METHOD URL` line, `Name: value`
//! headers mixed with `key=value` query parameters, a blank line, body
//! text verbatim, and an optional `:::`-delimited hook script. A second
//! `:::` splits the script into pre and post sections; with a single
//! delimiter the whole script is the post-hook.

pub mod error;

use crate::models::{Document, HttpMethod, RequestConfig, RequestDef};
use error::ParseError;
use once_cell::sync::Lazy;
use regex::Regex;

/// Line that opens and splits embedded hook scripts.
const SCRIPT_DELIMITER: &str = ":::";

static NAME_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^###\s+#([A-Za-z_][A-Za-z0-9_-]*)\s*$").expect("marker regex"));

static REQUEST_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z]+)\s+(\S+)\s*$").expect("request line regex"));

static VAR_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@([A-Za-z_][A-Za-z0-9_.-]*)\s*=\s*(.*)$").expect("var regex"));

/// Section the parser is in within one request block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Leading `@name = value` / `@cfg.*` lines, before the method line.
    Vars,
    /// Header and query-parameter lines, after the method line.
    Headers,
    /// Verbatim body text, after the first blank line.
    Body,
    /// Embedded hook script, after the `:::` delimiter.
    Script,
}

/// Accumulated state for the block currently being parsed.
struct BlockState {
    def: RequestDef,
    phase: Phase,
    body_lines: Vec<String>,
    script_lines: Vec<String>,
    /// Index into `script_lines` where the second `:::` split the script.
    script_split: Option<usize>,
}

impl BlockState {
    fn new(name: &str, line: usize) -> Self {
        Self {
            def: RequestDef::new(name, line),
            phase: Phase::Vars,
            body_lines: Vec::new(),
            script_lines: Vec::new(),
            script_split: None,
        }
    }
}

/// Parses request-file text into a [`Document`].
///
/// Fails with a [`ParseError`] carrying line context on malformed
/// structure. Line endings are normalized before parsing, so files with
/// `\r\n` parse identically.
///
/// # Examples
///
/// ```
/// use restflow::parser::parse;
///
/// let doc = parse("@baseUrl = http://x\n\n### #main\nGET {{baseUrl}}/ping\n").unwrap();
/// assert_eq!(doc.requests.len(), 1);
/// assert_eq!(doc.requests[0].name, "main");
/// ```
pub fn parse(text: &str) -> Result<Document, ParseError> {
    let normalized = text.replace("\r\n", "\n");
    let mut doc = Document::new();
    let mut current: Option<BlockState> = None;

    for (idx, line) in normalized.lines().enumerate() {
        let line_num = idx + 1;
        let trimmed = line.trim();

        if trimmed.starts_with("###") {
            // Inside body or script, marker-shaped lines still end the
            // block: the marker is the only construct recognized there.
            if let Some(caps) = NAME_MARKER.captures(trimmed) {
                if let Some(block) = current.take() {
                    finish_block(&mut doc, block)?;
                }
                let name = caps.get(1).expect("marker capture").as_str();
                current = Some(BlockState::new(name, line_num));
                continue;
            }
            return Err(ParseError::InvalidMarker {
                content: trimmed.to_string(),
                line: line_num,
            });
        }

        match current.as_mut() {
            None => preamble_line(&mut doc, line, line_num)?,
            Some(block) => block_line(block, line, line_num)?,
        }
    }

    if let Some(block) = current.take() {
        finish_block(&mut doc, block)?;
    }

    Ok(doc)
}

/// Handles one line before any request block: globals, document-level
/// config, comments, blank lines.
fn preamble_line(doc: &mut Document, line: &str, line_num: usize) -> Result<(), ParseError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(());
    }

    if let Some(caps) = VAR_LINE.captures(trimmed) {
        let name = caps.get(1).expect("var name").as_str();
        let value = caps.get(2).expect("var value").as_str();
        if let Some(key) = name.strip_prefix("cfg.") {
            return apply_config(&mut doc.config, key, value, line_num);
        }
        doc.globals.push((name.to_string(), value.to_string()));
        return Ok(());
    }

    Err(ParseError::UnexpectedLine {
        content: trimmed.to_string(),
        line: line_num,
    })
}

/// Handles one line inside a request block, advancing its phase.
fn block_line(block: &mut BlockState, line: &str, line_num: usize) -> Result<(), ParseError> {
    let trimmed = line.trim();

    if trimmed == SCRIPT_DELIMITER {
        match block.phase {
            Phase::Script => {
                // Second delimiter: everything so far becomes the pre-hook.
                if block.script_split.is_none() {
                    block.script_split = Some(block.script_lines.len());
                } else {
                    return Err(ParseError::UnexpectedLine {
                        content: trimmed.to_string(),
                        line: line_num,
                    });
                }
            }
            _ => block.phase = Phase::Script,
        }
        return Ok(());
    }

    match block.phase {
        Phase::Vars => {
            if trimmed.is_empty() || trimmed.starts_with('#') {
                return Ok(());
            }
            if let Some(caps) = VAR_LINE.captures(trimmed) {
                let name = caps.get(1).expect("var name").as_str();
                let value = caps.get(2).expect("var value").as_str();
                if let Some(key) = name.strip_prefix("cfg.") {
                    return apply_config(&mut block.def.config, key, value, line_num);
                }
                block
                    .def
                    .locals
                    .push((name.to_string(), value.to_string()));
                return Ok(());
            }
            if let Some(caps) = REQUEST_LINE.captures(trimmed) {
                let method_str = caps.get(1).expect("method").as_str();
                let method =
                    HttpMethod::from_str(method_str).ok_or(ParseError::InvalidMethod {
                        method: method_str.to_string(),
                        line: line_num,
                    })?;
                block.def.method = Some(method);
                block.def.url = Some(caps.get(2).expect("url").as_str().to_string());
                block.phase = Phase::Headers;
                return Ok(());
            }
            // A lone all-caps word is a method with its URL missing.
            if !trimmed.is_empty()
                && trimmed.chars().all(|c| c.is_ascii_uppercase())
                && HttpMethod::from_str(trimmed).is_some()
            {
                return Err(ParseError::MissingUrl { line: line_num });
            }
            Err(ParseError::UnexpectedLine {
                content: trimmed.to_string(),
                line: line_num,
            })
        }
        Phase::Headers => {
            if trimmed.is_empty() {
                block.phase = Phase::Body;
                return Ok(());
            }
            if trimmed.starts_with('#') {
                return Ok(());
            }
            if let Some(colon) = trimmed.find(':') {
                let name = trimmed[..colon].trim();
                let value = trimmed[colon + 1..].trim();
                if name.is_empty() {
                    return Err(ParseError::InvalidHeader {
                        content: trimmed.to_string(),
                        line: line_num,
                    });
                }
                block
                    .def
                    .headers
                    .push((name.to_string(), value.to_string()));
                return Ok(());
            }
            if let Some(eq) = trimmed.find('=') {
                let key = trimmed[..eq].trim();
                let value = trimmed[eq + 1..].trim();
                block.def.query.push((key.to_string(), value.to_string()));
                return Ok(());
            }
            Err(ParseError::UnexpectedLine {
                content: trimmed.to_string(),
                line: line_num,
            })
        }
        Phase::Body => {
            // Verbatim, including blank and `#` lines.
            block.body_lines.push(line.to_string());
            Ok(())
        }
        Phase::Script => {
            block.script_lines.push(line.to_string());
            Ok(())
        }
    }
}

/// Applies one `@cfg.<key> = value` override.
fn apply_config(
    config: &mut RequestConfig,
    key: &str,
    value: &str,
    line_num: usize,
) -> Result<(), ParseError> {
    let bad_value = || ParseError::InvalidConfigValue {
        key: key.to_string(),
        value: value.to_string(),
        line: line_num,
    };
    match key {
        "timeout" => {
            config.timeout_ms = Some(value.parse::<u64>().map_err(|_| bad_value())?);
        }
        "insecure" => {
            config.insecure = Some(parse_bool(value).ok_or_else(bad_value)?);
        }
        "proxy" => {
            config.proxy = Some(value.to_string());
        }
        "dry-run" => {
            config.dry_run = Some(parse_bool(value).ok_or_else(bad_value)?);
        }
        _ => {
            return Err(ParseError::UnknownConfigKey {
                key: key.to_string(),
                line: line_num,
            });
        }
    }
    Ok(())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Seals the current block: trims the body, splits the script, checks
/// name uniqueness, and appends the definition to the document.
fn finish_block(doc: &mut Document, block: BlockState) -> Result<(), ParseError> {
    let BlockState {
        mut def,
        body_lines,
        script_lines,
        script_split,
        ..
    } = block;

    if doc.request(&def.name).is_some() {
        return Err(ParseError::DuplicateRequest {
            name: def.name,
            line: def.line_number,
        });
    }

    def.body = join_trimmed(&body_lines);

    match script_split {
        Some(split) => {
            def.pre_script = join_trimmed(&script_lines[..split]);
            def.post_script = join_trimmed(&script_lines[split..]);
        }
        None => {
            def.post_script = join_trimmed(&script_lines);
        }
    }

    doc.requests.push(def);
    Ok(())
}

/// Joins lines, dropping leading and trailing blank lines; interior
/// blank lines survive. Returns `None` when nothing remains.
fn join_trimmed(lines: &[String]) -> Option<String> {
    let start = lines.iter().position(|l| !l.trim().is_empty())?;
    let end = lines.iter().rposition(|l| !l.trim().is_empty())?;
    Some(lines[start..=end].join("\n"))
}
