//! Hook script sublanguage.
//!
//! Hooks are not arbitrary code: they are a bounded, enumerable
//! statement set interpreted by the execution engine. One statement per
//! line; `#` comments and blank lines are skipped. Values go through
//! placeholder resolution before use, which is also how hooks read
//! variables (`{{key}}`) and request/response fields (`{{res.status}}`,
//! `{{res.json.path}}`, ...).
//!
//! ```text
//! set <key> <value>          store a value in the global store
//! send <request>             synchronously run another named request
//! write <text>               replace the rendered body
//! append <text>              add trailing output text
//! req.method <METHOD>        mutate the pending request (pre-hook only)
//! req.url <text>
//! req.header <Name>: <value>
//! req.query <key>=<value>
//! req.body <text>
//! if <a> == <b> ... else ... end
//! for <var> in <a>..<b> ... end
//! ```

use std::fmt;

/// Comparison operator in an `if` statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
}

/// One statement of the hook sublanguage.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `set <key> <value>` — `Api.set`.
    Set { key: String, value: String },

    /// `send <request>` — `Api.send`, synchronous chaining.
    Send { request: String },

    /// `write <text>` — `Output.write`, replaces the rendered body.
    Write { text: String },

    /// `append <text>` — `Output.append`, trailing output text.
    Append { text: String },

    /// `req.method <METHOD>`.
    ReqMethod { value: String },

    /// `req.url <text>`.
    ReqUrl { value: String },

    /// `req.header <Name>: <value>`.
    ReqHeader { name: String, value: String },

    /// `req.query <key>=<value>`.
    ReqQuery { name: String, value: String },

    /// `req.body <text>`.
    ReqBody { value: String },

    /// `if <left> <op> <right> ... [else ...] end`.
    If {
        left: String,
        op: CmpOp,
        right: String,
        then_branch: Vec<Statement>,
        else_branch: Vec<Statement>,
    },

    /// `for <var> in <start>..<end> ... end`, end exclusive.
    For {
        var: String,
        start: String,
        end: String,
        body: Vec<Statement>,
    },
}

/// Errors from hook scripts.
///
/// `Syntax` is raised while parsing script source; the remaining
/// variants are raised by the engine while a hook runs. Line numbers are
/// relative to the script block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    /// Malformed statement or unbalanced `if`/`for` block.
    Syntax { message: String, line: usize },

    /// A `req.*` mutation outside a pre-hook.
    NoRequestInScope { statement: String },

    /// A `res.*`/`sent.*` JSON view read with no response available
    /// (pre-hook, dry-run, script-only, or before any `send`).
    NoResponseInScope { field: String },

    /// `req.method` with an unknown HTTP method.
    InvalidMethod { method: String },

    /// A `for` bound that did not evaluate to an integer.
    InvalidLoopBound { text: String },
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptError::Syntax { message, line } => {
                write!(f, "Script syntax error at script line {}: {}", line, message)
            }
            ScriptError::NoRequestInScope { statement } => {
                write!(
                    f,
                    "'{}' is only valid in a pre-hook with a pending request",
                    statement
                )
            }
            ScriptError::NoResponseInScope { field } => {
                write!(f, "'{}' requires a response and none is available", field)
            }
            ScriptError::InvalidMethod { method } => {
                write!(f, "Invalid HTTP method '{}' in req.method", method)
            }
            ScriptError::InvalidLoopBound { text } => {
                write!(f, "Loop bound '{}' is not an integer", text)
            }
        }
    }
}

impl std::error::Error for ScriptError {}

/// What ended a nested statement block.
#[derive(Debug, PartialEq, Eq)]
enum BlockEnd {
    End,
    Else,
    Eof,
}

/// Parses hook script source into a statement list.
pub fn parse_script(source: &str) -> Result<Vec<Statement>, ScriptError> {
    let lines: Vec<(usize, &str)> = source
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l))
        .collect();
    let mut pos = 0;
    let (statements, end) = parse_block(&lines, &mut pos)?;
    match end {
        BlockEnd::Eof => Ok(statements),
        _ => {
            let line = lines.get(pos.saturating_sub(1)).map(|(n, _)| *n).unwrap_or(0);
            Err(ScriptError::Syntax {
                message: "'end' or 'else' outside a block".to_string(),
                line,
            })
        }
    }
}

fn parse_block(
    lines: &[(usize, &str)],
    pos: &mut usize,
) -> Result<(Vec<Statement>, BlockEnd), ScriptError> {
    let mut statements = Vec::new();

    while *pos < lines.len() {
        let (line_num, raw) = lines[*pos];
        *pos += 1;
        let line = raw.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line == "end" {
            return Ok((statements, BlockEnd::End));
        }
        if line == "else" {
            return Ok((statements, BlockEnd::Else));
        }

        let (keyword, rest) = match line.split_once(char::is_whitespace) {
            Some((kw, rest)) => (kw, rest.trim()),
            None => (line, ""),
        };

        let syntax = |message: &str| ScriptError::Syntax {
            message: message.to_string(),
            line: line_num,
        };

        let statement = match keyword {
            "set" => {
                let (key, value) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| syntax("expected 'set <key> <value>'"))?;
                Statement::Set {
                    key: key.to_string(),
                    value: value.trim().to_string(),
                }
            }
            "send" => {
                if rest.is_empty() || rest.contains(char::is_whitespace) {
                    return Err(syntax("expected 'send <request>'"));
                }
                Statement::Send {
                    request: rest.to_string(),
                }
            }
            "write" => Statement::Write {
                text: rest.to_string(),
            },
            "append" => Statement::Append {
                text: rest.to_string(),
            },
            "req.method" => {
                if rest.is_empty() {
                    return Err(syntax("expected 'req.method <METHOD>'"));
                }
                Statement::ReqMethod {
                    value: rest.to_string(),
                }
            }
            "req.url" => {
                if rest.is_empty() {
                    return Err(syntax("expected 'req.url <text>'"));
                }
                Statement::ReqUrl {
                    value: rest.to_string(),
                }
            }
            "req.header" => {
                let (name, value) = rest
                    .split_once(':')
                    .ok_or_else(|| syntax("expected 'req.header <Name>: <value>'"))?;
                let name = name.trim();
                if name.is_empty() {
                    return Err(syntax("header name is empty"));
                }
                Statement::ReqHeader {
                    name: name.to_string(),
                    value: value.trim().to_string(),
                }
            }
            "req.query" => {
                let (name, value) = rest
                    .split_once('=')
                    .ok_or_else(|| syntax("expected 'req.query <key>=<value>'"))?;
                Statement::ReqQuery {
                    name: name.trim().to_string(),
                    value: value.trim().to_string(),
                }
            }
            "req.body" => Statement::ReqBody {
                value: rest.to_string(),
            },
            "if" => {
                let (left, op, right) = parse_condition(rest).ok_or_else(|| {
                    syntax("expected 'if <left> == <right>' or 'if <left> != <right>'")
                })?;
                let (then_branch, end) = parse_block(lines, pos)?;
                let (else_branch, end) = match end {
                    BlockEnd::Else => parse_block(lines, pos)?,
                    other => (Vec::new(), other),
                };
                if end != BlockEnd::End {
                    return Err(syntax("'if' without matching 'end'"));
                }
                Statement::If {
                    left,
                    op,
                    right,
                    then_branch,
                    else_branch,
                }
            }
            "for" => {
                let (var, range) = rest
                    .split_once(" in ")
                    .ok_or_else(|| syntax("expected 'for <var> in <start>..<end>'"))?;
                let (start, end_bound) = range
                    .split_once("..")
                    .ok_or_else(|| syntax("expected 'for <var> in <start>..<end>'"))?;
                let var = var.trim();
                if var.is_empty() {
                    return Err(syntax("loop variable is empty"));
                }
                let (body, end) = parse_block(lines, pos)?;
                if end != BlockEnd::End {
                    return Err(syntax("'for' without matching 'end'"));
                }
                Statement::For {
                    var: var.to_string(),
                    start: start.trim().to_string(),
                    end: end_bound.trim().to_string(),
                    body,
                }
            }
            other => {
                return Err(syntax(&format!("unknown statement '{}'", other)));
            }
        };

        statements.push(statement);
    }

    Ok((statements, BlockEnd::Eof))
}

/// Splits `<left> == <right>` / `<left> != <right>`.
fn parse_condition(text: &str) -> Option<(String, CmpOp, String)> {
    for (token, op) in [("==", CmpOp::Eq), ("!=", CmpOp::Ne)] {
        if let Some((left, right)) = text.split_once(token) {
            let left = left.trim();
            let right = right.trim();
            if left.is_empty() {
                return None;
            }
            return Some((left.to_string(), op, right.to_string()));
        }
    }
    None
}
