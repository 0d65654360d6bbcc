//! Execution engine.
//!
//! Drives one named request through the per-request state machine:
//! Resolve-Locals → Run-Pre-Hook → Substitute → (dry-run: skip network)
//! → Send → Run-Post-Hook. The engine owns the global variable store and
//! the command cache for the lifetime of one invocation and passes them
//! into every nested `send`, which re-enters the same machine
//! synchronously and completes fully before control returns to the
//! calling hook statement — the mechanism behind loop-style chaining.
//!
//! There is no semantic limit on chaining depth; a configurable safety
//! valve ([`config::DEFAULT_MAX_SEND_DEPTH`]) converts request cycles
//! into a fatal error instead of resource exhaustion.

pub mod config;
pub mod error;

pub use config::ExecutionConfig;
pub use error::EngineError;

use crate::executor::{append_query, ResolvedRequest, SendOptions, Transport};
use crate::models::{Document, HttpMethod, HttpResponse};
use crate::script::{parse_script, CmpOp, ScriptError, Statement};
use crate::shell::CommandRunner;
use crate::variables::{resolve, Scope, VarError};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// A request while its pre-hook can still mutate it: raw fields, before
/// substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: Option<String>,
}

/// Everything one request run produced, for the formatter.
#[derive(Debug, Clone, Default)]
pub struct RequestOutcome {
    /// Name of the request that ran.
    pub name: String,

    /// The substituted request as sent (absent for script-only runs).
    pub request: Option<ResolvedRequest>,

    /// The response (absent for script-only and dry-run runs).
    pub response: Option<HttpResponse>,

    /// Replacement body from `write`, if the hook called it.
    pub write: Option<String>,

    /// Trailing output lines from `append`, in call order.
    pub appends: Vec<String>,
}

impl RequestOutcome {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

/// A failed run together with everything the start request had produced
/// by the time the failure hit. `append`/`write` output already written
/// by hooks is never retracted; callers render it before reporting the
/// error.
#[derive(Debug, Clone)]
pub struct ExecutionFailure {
    pub error: EngineError,
    pub partial: RequestOutcome,
}

impl fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for ExecutionFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Hook execution state: the frame of loop variables and field views,
/// the mutable pending request (pre-hooks only), the owning request's
/// response (post-hooks only), and the response of the most recent
/// nested `send`.
struct HookEnv<'a> {
    locals: &'a [(String, String)],
    pending: Option<&'a mut PendingRequest>,
    response: Option<&'a HttpResponse>,
    frame: HashMap<String, String>,
    last_sent: Option<HttpResponse>,
}

/// The request-file interpreter for one invocation.
///
/// Owns the mutable global store (seeded from the document's global
/// declarations) and the command cache; both are shared with every
/// nested `send`.
pub struct Engine<'d> {
    document: &'d Document,
    transport: Box<dyn Transport>,
    shell: Box<dyn CommandRunner>,
    config: ExecutionConfig,
    globals: HashMap<String, String>,
    command_cache: HashMap<String, String>,
}

impl<'d> Engine<'d> {
    /// Creates an engine over a parsed document.
    pub fn new(
        document: &'d Document,
        transport: Box<dyn Transport>,
        shell: Box<dyn CommandRunner>,
        config: ExecutionConfig,
    ) -> Self {
        let globals = document.globals.iter().cloned().collect();
        Self {
            document,
            transport,
            shell,
            config,
            globals,
            command_cache: HashMap::new(),
        }
    }

    /// Runs the named start request to completion.
    ///
    /// On failure the returned [`ExecutionFailure`] carries the partial
    /// outcome so hook output produced before the error still renders.
    pub fn execute(&mut self, start: &str) -> Result<RequestOutcome, ExecutionFailure> {
        log::debug!("executing start request '{}'", start);
        let mut outcome = RequestOutcome::new(start);
        match self.run_request_into(start, 0, &mut outcome) {
            Ok(()) => Ok(outcome),
            Err(error) => Err(ExecutionFailure {
                error,
                partial: outcome,
            }),
        }
    }

    fn run_request(&mut self, name: &str, depth: usize) -> Result<RequestOutcome, EngineError> {
        let mut outcome = RequestOutcome::new(name);
        self.run_request_into(name, depth, &mut outcome)?;
        Ok(outcome)
    }

    fn run_request_into(
        &mut self,
        name: &str,
        depth: usize,
        outcome: &mut RequestOutcome,
    ) -> Result<(), EngineError> {
        if depth > self.config.max_send_depth {
            return Err(EngineError::RecursionLimit { depth });
        }

        let document = self.document;
        let def = document
            .request(name)
            .ok_or_else(|| EngineError::UnknownRequest(name.to_string()))?;

        let effective = self
            .config
            .with_overrides(&document.config)
            .with_overrides(&def.config);

        // Script-only: both script sections run immediately with no
        // Response available and no network activity.
        let (Some(method), Some(raw_url)) = (def.method, def.url.clone()) else {
            log::debug!("request '{}' is script-only", name);
            if let Some(source) = &def.pre_script {
                self.run_hook(source, &def.locals, None, None, outcome, &effective, depth)?;
            }
            if let Some(source) = &def.post_script {
                self.run_hook(source, &def.locals, None, None, outcome, &effective, depth)?;
            }
            return Ok(());
        };

        let mut pending = PendingRequest {
            method,
            url: raw_url,
            headers: def.headers.clone(),
            query: def.query.clone(),
            body: def.body.clone(),
        };

        if let Some(source) = &def.pre_script {
            self.run_hook(
                source,
                &def.locals,
                Some(&mut pending),
                None,
                outcome,
                &effective,
                depth,
            )?;
        }

        let resolved = self.substitute(&pending, &def.locals, &effective)?;
        log::debug!("{} {}", resolved.method, resolved.url);
        outcome.request = Some(resolved.clone());

        let response = if effective.dry_run {
            log::debug!("dry-run: skipping network call for '{}'", name);
            None
        } else {
            let options = SendOptions {
                timeout: effective.timeout(),
                insecure: effective.insecure,
                proxy: effective.proxy.clone(),
            };
            Some(self.transport.send(&resolved, &options)?)
        };

        if let Some(source) = &def.post_script {
            self.run_hook(
                source,
                &def.locals,
                None,
                response.as_ref(),
                outcome,
                &effective,
                depth,
            )?;
        }

        outcome.response = response;
        Ok(())
    }

    /// Substitutes placeholders in every request part and merges query
    /// parameters into the final URL.
    fn substitute(
        &mut self,
        pending: &PendingRequest,
        locals: &[(String, String)],
        effective: &ExecutionConfig,
    ) -> Result<ResolvedRequest, EngineError> {
        let timeout = effective.timeout();

        let url = self.resolve_plain(&pending.url, locals, timeout)?;

        let mut headers = Vec::with_capacity(pending.headers.len());
        for (name, value) in &pending.headers {
            headers.push((name.clone(), self.resolve_plain(value, locals, timeout)?));
        }

        let mut query = Vec::with_capacity(pending.query.len());
        for (key, value) in &pending.query {
            query.push((key.clone(), self.resolve_plain(value, locals, timeout)?));
        }

        let body = match &pending.body {
            Some(text) => Some(self.resolve_plain(text, locals, timeout)?),
            None => None,
        };

        Ok(ResolvedRequest {
            method: pending.method,
            url: append_query(&url, &query)?,
            headers,
            body,
        })
    }

    /// Parses and runs one hook script. A failed JSON accessor aborts
    /// the hook but nothing beyond it; every other error propagates.
    #[allow(clippy::too_many_arguments)]
    fn run_hook(
        &mut self,
        source: &str,
        locals: &[(String, String)],
        pending: Option<&mut PendingRequest>,
        response: Option<&HttpResponse>,
        outcome: &mut RequestOutcome,
        effective: &ExecutionConfig,
        depth: usize,
    ) -> Result<(), EngineError> {
        let statements = parse_script(source)?;
        let mut env = HookEnv {
            locals,
            pending,
            response,
            frame: HashMap::new(),
            last_sent: None,
        };
        match self.exec_statements(&statements, &mut env, outcome, effective, depth) {
            Err(EngineError::Json(err)) => {
                log::warn!("hook for '{}' aborted: {}", outcome.name, err);
                Ok(())
            }
            other => other,
        }
    }

    fn exec_statements(
        &mut self,
        statements: &[Statement],
        env: &mut HookEnv<'_>,
        outcome: &mut RequestOutcome,
        effective: &ExecutionConfig,
        depth: usize,
    ) -> Result<(), EngineError> {
        for statement in statements {
            match statement {
                Statement::Set { key, value } => {
                    let value = self.eval_text(value, env, outcome, effective)?;
                    self.globals.insert(key.clone(), value);
                }
                Statement::Send { request } => {
                    let nested = self.run_request(request, depth + 1)?;
                    env.last_sent = nested.response;
                }
                Statement::Write { text } => {
                    outcome.write = Some(self.eval_text(text, env, outcome, effective)?);
                }
                Statement::Append { text } => {
                    let text = self.eval_text(text, env, outcome, effective)?;
                    outcome.appends.push(text);
                }
                Statement::ReqMethod { value } => {
                    let value = self.eval_text(value, env, outcome, effective)?;
                    let method = HttpMethod::from_str(&value)
                        .ok_or(ScriptError::InvalidMethod { method: value })?;
                    pending_mut(env, "req.method")?.method = method;
                }
                Statement::ReqUrl { value } => {
                    let value = self.eval_text(value, env, outcome, effective)?;
                    pending_mut(env, "req.url")?.url = value;
                }
                Statement::ReqHeader { name, value } => {
                    let value = self.eval_text(value, env, outcome, effective)?;
                    let pending = pending_mut(env, "req.header")?;
                    upsert_header(&mut pending.headers, name, value);
                }
                Statement::ReqQuery { name, value } => {
                    let value = self.eval_text(value, env, outcome, effective)?;
                    let pending = pending_mut(env, "req.query")?;
                    match pending.query.iter_mut().find(|(k, _)| k == name) {
                        Some((_, existing)) => *existing = value,
                        None => pending.query.push((name.clone(), value)),
                    }
                }
                Statement::ReqBody { value } => {
                    let value = self.eval_text(value, env, outcome, effective)?;
                    pending_mut(env, "req.body")?.body = Some(value);
                }
                Statement::If {
                    left,
                    op,
                    right,
                    then_branch,
                    else_branch,
                } => {
                    let left = self.eval_text(left, env, outcome, effective)?;
                    let right = self.eval_text(right, env, outcome, effective)?;
                    let matched = match op {
                        CmpOp::Eq => left == right,
                        CmpOp::Ne => left != right,
                    };
                    let branch = if matched { then_branch } else { else_branch };
                    self.exec_statements(branch, env, outcome, effective, depth)?;
                }
                Statement::For {
                    var,
                    start,
                    end,
                    body,
                } => {
                    let start = self.eval_loop_bound(start, env, outcome, effective)?;
                    let end = self.eval_loop_bound(end, env, outcome, effective)?;
                    for i in start..end {
                        env.frame.insert(var.clone(), i.to_string());
                        self.exec_statements(body, env, outcome, effective, depth)?;
                    }
                    env.frame.remove(var);
                }
            }
        }
        Ok(())
    }

    fn eval_loop_bound(
        &mut self,
        text: &str,
        env: &HookEnv<'_>,
        outcome: &RequestOutcome,
        effective: &ExecutionConfig,
    ) -> Result<i64, EngineError> {
        let value = self.eval_text(text, env, outcome, effective)?;
        value
            .trim()
            .parse::<i64>()
            .map_err(|_| ScriptError::InvalidLoopBound { text: value }.into())
    }

    /// Resolves hook text: the frame plus request/response field views
    /// shadow ordinary variables, then the locals/globals chain applies.
    fn eval_text(
        &mut self,
        text: &str,
        env: &HookEnv<'_>,
        outcome: &RequestOutcome,
        effective: &ExecutionConfig,
    ) -> Result<String, EngineError> {
        let mut bindings = env.frame.clone();

        if let Some(pending) = env.pending.as_deref() {
            bindings.insert("req.method".to_string(), pending.method.to_string());
            bindings.insert("req.url".to_string(), pending.url.clone());
            if let Some(body) = &pending.body {
                bindings.insert("req.body".to_string(), body.clone());
            }
            for (name, value) in &pending.headers {
                bindings.insert(format!("req.header.{}", name.to_lowercase()), value.clone());
            }
        } else if let Some(request) = &outcome.request {
            bindings.insert("req.method".to_string(), request.method.to_string());
            bindings.insert("req.url".to_string(), request.url.clone());
            if let Some(body) = &request.body {
                bindings.insert("req.body".to_string(), body.clone());
            }
            for (name, value) in &request.headers {
                bindings.insert(format!("req.header.{}", name.to_lowercase()), value.clone());
            }
        }

        if let Some(response) = env.response {
            bind_response(&mut bindings, "res", response);
        }
        if let Some(response) = &env.last_sent {
            bind_response(&mut bindings, "sent", response);
        }

        bind_json_paths(text, env.response, env.last_sent.as_ref(), &mut bindings)?;
        bind_header_aliases(text, &mut bindings);

        self.resolve_hook_text(text, &bindings, env.locals, effective.timeout())
            .map_err(Into::into)
    }

    fn resolve_hook_text(
        &mut self,
        text: &str,
        bindings: &HashMap<String, String>,
        locals: &[(String, String)],
        timeout: Duration,
    ) -> Result<String, VarError> {
        let scope = Scope {
            hook: Some(bindings),
            locals: Some(locals),
            globals: &self.globals,
        };
        resolve(
            text,
            &scope,
            self.shell.as_ref(),
            &mut self.command_cache,
            timeout,
        )
    }

    fn resolve_plain(
        &mut self,
        text: &str,
        locals: &[(String, String)],
        timeout: Duration,
    ) -> Result<String, VarError> {
        let scope = Scope {
            hook: None,
            locals: Some(locals),
            globals: &self.globals,
        };
        resolve(
            text,
            &scope,
            self.shell.as_ref(),
            &mut self.command_cache,
            timeout,
        )
    }
}

fn pending_mut<'a, 'b>(
    env: &'a mut HookEnv<'b>,
    statement: &str,
) -> Result<&'a mut PendingRequest, EngineError> {
    env.pending
        .as_deref_mut()
        .ok_or_else(|| {
            ScriptError::NoRequestInScope {
                statement: statement.to_string(),
            }
            .into()
        })
}

fn upsert_header(headers: &mut Vec<(String, String)>, name: &str, value: String) {
    match headers
        .iter_mut()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
    {
        Some((_, existing)) => *existing = value,
        None => headers.push((name.to_string(), value)),
    }
}

/// Adds scalar field views of a response under the given prefix.
fn bind_response(bindings: &mut HashMap<String, String>, prefix: &str, response: &HttpResponse) {
    bindings.insert(format!("{}.status", prefix), response.status_code.to_string());
    bindings.insert(format!("{}.body", prefix), response.body_text());
    for (name, value) in &response.headers {
        bindings.insert(
            format!("{}.header.{}", prefix, name.to_lowercase()),
            value.clone(),
        );
    }
}

/// Scans the text for `res.json.*` / `sent.json.*` placeholders and
/// binds each referenced path. The decode itself is cached on the
/// response; a failure here is fatal to the invoking hook only.
/// Referencing a JSON view with no response available (pre-hook,
/// dry-run, script-only, or before any `send`) is a script error.
fn bind_json_paths(
    text: &str,
    response: Option<&HttpResponse>,
    last_sent: Option<&HttpResponse>,
    bindings: &mut HashMap<String, String>,
) -> Result<(), EngineError> {
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            break;
        };
        let inner = after[..end].trim();
        if let Some(path) = inner.strip_prefix("res.json.") {
            match response {
                Some(response) => {
                    bindings.insert(inner.to_string(), response.json_path(path)?);
                }
                None => {
                    return Err(ScriptError::NoResponseInScope {
                        field: inner.to_string(),
                    }
                    .into())
                }
            }
        } else if let Some(path) = inner.strip_prefix("sent.json.") {
            match last_sent {
                Some(response) => {
                    bindings.insert(inner.to_string(), response.json_path(path)?);
                }
                None => {
                    return Err(ScriptError::NoResponseInScope {
                        field: inner.to_string(),
                    }
                    .into())
                }
            }
        }
        rest = &after[end + 2..];
    }
    Ok(())
}

/// Header names compare case-insensitively, but placeholder lookup is
/// verbatim; alias any header view referenced with a different casing
/// to its lowercased binding.
fn bind_header_aliases(text: &str, bindings: &mut HashMap<String, String>) {
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            break;
        };
        let inner = after[..end].trim();
        for prefix in ["req.header.", "res.header.", "sent.header."] {
            if let Some(name) = inner.strip_prefix(prefix) {
                let canonical = format!("{}{}", prefix, name.to_lowercase());
                if canonical != inner {
                    if let Some(value) = bindings.get(&canonical).cloned() {
                        bindings.insert(inner.to_string(), value);
                    }
                }
                break;
            }
        }
        rest = &after[end + 2..];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::RequestError;
    use crate::parser::parse;
    use crate::shell::CommandError;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Transport fake that records every call and answers from a fixed
    /// responder.
    struct FakeTransport {
        calls: Rc<RefCell<Vec<ResolvedRequest>>>,
        responder: Box<dyn Fn(&ResolvedRequest) -> Result<HttpResponse, RequestError>>,
    }

    impl Transport for FakeTransport {
        fn send(
            &self,
            request: &ResolvedRequest,
            _options: &SendOptions,
        ) -> Result<HttpResponse, RequestError> {
            self.calls.borrow_mut().push(request.clone());
            (self.responder)(request)
        }
    }

    struct FakeShell {
        calls: Rc<RefCell<Vec<String>>>,
    }

    impl CommandRunner for FakeShell {
        fn run(&self, command: &str, _timeout: Duration) -> Result<String, CommandError> {
            self.calls.borrow_mut().push(command.to_string());
            Ok(format!("out:{}", command))
        }
    }

    fn text_response(body: &str) -> HttpResponse {
        let mut response = HttpResponse::new(200, "OK");
        response.body = body.as_bytes().to_vec();
        response
    }

    /// Call logs left behind after a run.
    struct Harness {
        calls: Rc<RefCell<Vec<ResolvedRequest>>>,
        shell_calls: Rc<RefCell<Vec<String>>>,
    }

    fn run(
        source: &str,
        start: &str,
        responder: impl Fn(&ResolvedRequest) -> Result<HttpResponse, RequestError> + 'static,
    ) -> (Result<RequestOutcome, ExecutionFailure>, Harness) {
        let document = parse(source).unwrap();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let shell_calls = Rc::new(RefCell::new(Vec::new()));
        let transport = Box::new(FakeTransport {
            calls: calls.clone(),
            responder: Box::new(responder),
        });
        let shell = Box::new(FakeShell {
            calls: shell_calls.clone(),
        });
        let mut engine = Engine::new(&document, transport, shell, ExecutionConfig::default());
        let result = engine.execute(start);
        (result, Harness { calls, shell_calls })
    }

    #[test]
    fn test_end_to_end_get_with_global() {
        let source = "@baseUrl = http://x\n\n### #main\nGET {{baseUrl}}/ping\n";
        let (result, h) = run(source, "main", |_| Ok(text_response("pong")));

        let outcome = result.unwrap();
        let calls = h.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, HttpMethod::GET);
        assert_eq!(calls[0].url, "http://x/ping");
        assert_eq!(outcome.response.as_ref().unwrap().body_text(), "pong");
    }

    #[test]
    fn test_unknown_start_request() {
        let (result, _) = run("### #main\nGET http://x/a\n", "other", |_| {
            Ok(text_response(""))
        });
        assert_eq!(
            result.unwrap_err().error,
            EngineError::UnknownRequest("other".to_string())
        );
    }

    #[test]
    fn test_script_only_request_no_network() {
        let source = "### #setup\n:::\nset flag ready\n";
        let (result, h) = run(source, "setup", |_| Ok(text_response("")));

        let outcome = result.unwrap();
        assert!(outcome.request.is_none());
        assert!(outcome.response.is_none());
        assert_eq!(h.calls.borrow().len(), 0);
    }

    #[test]
    fn test_local_shadows_global_without_leak() {
        let source = "@host = global\n\n\
                      ### #a\n@host = local\nGET http://{{host}}/a\n\n\
                      ### #b\nGET http://{{host}}/b\n\n\
                      ### #both\n:::\nsend a\nsend b\n";
        let (result, h) = run(source, "both", |_| Ok(text_response("")));

        result.unwrap();
        let calls = h.calls.borrow();
        assert_eq!(calls[0].url, "http://local/a");
        assert_eq!(calls[1].url, "http://global/b");
    }

    #[test]
    fn test_chaining_loop_ten_iterations() {
        let source = "@baseUrl = http://x\n\n\
                      ### #main\n\
                      :::\n\
                      for n in 0..10\n\
                      set i {{n}}\n\
                      send loop\n\
                      end\n\n\
                      ### #loop\n\
                      GET {{baseUrl}}/count\n\
                      value={{i}}\n";
        let (result, h) = run(source, "main", |_| Ok(text_response("ok")));

        result.unwrap();
        let calls = h.calls.borrow();
        assert_eq!(calls.len(), 10);
        for (i, call) in calls.iter().enumerate() {
            assert_eq!(call.url, format!("http://x/count?value={}", i));
        }
    }

    #[test]
    fn test_request_cycle_hits_recursion_limit() {
        let source = "### #a\nGET http://x/a\n\n:::\nsend b\n\n\
                      ### #b\nGET http://x/b\n\n:::\nsend a\n";
        let (result, _) = run(source, "a", |_| Ok(text_response("")));

        assert!(matches!(
            result.unwrap_err().error,
            EngineError::RecursionLimit { .. }
        ));
    }

    #[test]
    fn test_pre_hook_mutates_outgoing_request() {
        let source = "### #main\n\
                      GET http://x/a\n\
                      :::\n\
                      req.method POST\n\
                      req.header X-Trace: t-1\n\
                      req.body {\"n\": 1}\n\
                      :::\n\
                      append done\n";
        let (result, h) = run(source, "main", |_| Ok(text_response("")));

        let outcome = result.unwrap();
        let calls = h.calls.borrow();
        assert_eq!(calls[0].method, HttpMethod::POST);
        assert_eq!(
            calls[0].headers,
            vec![("X-Trace".to_string(), "t-1".to_string())]
        );
        assert_eq!(calls[0].body.as_deref(), Some("{\"n\": 1}"));
        assert_eq!(outcome.appends, vec!["done".to_string()]);
    }

    #[test]
    fn test_req_mutation_in_post_hook_fails() {
        let source = "### #main\nGET http://x/a\n\n:::\nreq.method POST\n";
        let (result, _) = run(source, "main", |_| Ok(text_response("")));

        assert!(matches!(
            result.unwrap_err().error,
            EngineError::Script(ScriptError::NoRequestInScope { .. })
        ));
    }

    #[test]
    fn test_post_hook_reads_response_fields() {
        let source = "### #main\n\
                      GET http://x/a\n\
                      :::\n\
                      :::\n\
                      set code {{res.status}}\n\
                      set token {{res.json.token}}\n\
                      write {{res.json.token}}/{{code}}\n";
        let (result, _) = run(source, "main", |_| {
            Ok(text_response(r#"{"token": "abc"}"#))
        });

        let outcome = result.unwrap();
        assert_eq!(outcome.write.as_deref(), Some("abc/200"));
    }

    #[test]
    fn test_json_decode_error_aborts_hook_only() {
        let source = "### #main\n\
                      GET http://x/a\n\
                      :::\n\
                      :::\n\
                      append before\n\
                      set t {{res.json.token}}\n\
                      append after\n";
        let (result, _) = run(source, "main", |_| Ok(text_response("not json")));

        let outcome = result.unwrap();
        // The hook aborted at the JSON accessor, keeping earlier output.
        assert_eq!(outcome.appends, vec!["before".to_string()]);
        assert!(outcome.response.is_some());
    }

    #[test]
    fn test_sent_view_of_nested_response() {
        let source = "### #main\n\
                      :::\n\
                      send fetch\n\
                      set token {{sent.json.token}}\n\
                      append status {{sent.status}}\n\n\
                      ### #fetch\n\
                      GET http://x/auth\n";
        let (result, _) = run(source, "main", |_| {
            Ok(text_response(r#"{"token": "xyz"}"#))
        });

        let outcome = result.unwrap();
        assert_eq!(outcome.appends, vec!["status 200".to_string()]);
    }

    #[test]
    fn test_if_else_branching() {
        let source = "### #main\n\
                      GET http://x/a\n\
                      :::\n\
                      :::\n\
                      if {{res.status}} == 200\n\
                      append ok\n\
                      else\n\
                      append failed\n\
                      end\n";
        let (result, _) = run(source, "main", |_| Ok(text_response("")));
        assert_eq!(result.unwrap().appends, vec!["ok".to_string()]);

        let (result, _) = run(source, "main", |_| {
            let mut r = text_response("");
            r.status_code = 500;
            r.status_text = "Internal Server Error".to_string();
            Ok(r)
        });
        assert_eq!(result.unwrap().appends, vec!["failed".to_string()]);
    }

    #[test]
    fn test_dry_run_skips_network() {
        let source = "@cfg.dry-run = true\n\n### #main\nGET http://x/a\n";
        let (result, h) = run(source, "main", |_| Ok(text_response("")));

        let outcome = result.unwrap();
        assert!(outcome.request.is_some());
        assert!(outcome.response.is_none());
        assert_eq!(h.calls.borrow().len(), 0);
    }

    #[test]
    fn test_network_error_propagates_through_send_chain() {
        let source = "### #main\n:::\nsend inner\nappend unreachable\n\n\
                      ### #inner\nGET http://x/a\n";
        let (result, _) = run(source, "main", |_| {
            Err(RequestError::Network("connection refused".to_string()))
        });

        assert!(matches!(
            result.unwrap_err().error,
            EngineError::Request(RequestError::Network(_))
        ));
    }

    #[test]
    fn test_cached_command_shared_across_chain() {
        let source = "@stamp = {{>>date}}\n\n\
                      ### #main\n\
                      GET http://x/a\n\
                      t={{stamp}}\n\
                      \n\
                      :::\n\
                      send second\n\n\
                      ### #second\n\
                      GET http://x/b\n\
                      t={{stamp}}\n";
        let (result, h) = run(source, "main", |_| Ok(text_response("")));

        result.unwrap();
        assert_eq!(h.shell_calls.borrow().len(), 1);
        let calls = h.calls.borrow();
        assert_eq!(calls[0].url, "http://x/a?t=out%3Adate");
        assert_eq!(calls[1].url, "http://x/b?t=out%3Adate");
    }

    #[test]
    fn test_query_value_resolution_and_merge() {
        let source = "@v = 7\n\n### #main\nGET http://x/list\ncount={{v}}\n";
        let (result, h) = run(source, "main", |_| Ok(text_response("")));

        result.unwrap();
        assert_eq!(h.calls.borrow()[0].url, "http://x/list?count=7");
    }

    #[test]
    fn test_undefined_variable_fails_request() {
        let source = "### #main\nGET http://x/{{nope}}\n";
        let (result, _) = run(source, "main", |_| Ok(text_response("")));

        assert_eq!(
            result.unwrap_err().error,
            EngineError::Var(VarError::Undefined("nope".to_string()))
        );
    }

    #[test]
    fn test_header_view_lookup_is_case_insensitive() {
        let source = "### #main\n\
                      GET http://x/a\n\
                      X-Trace: t-9\n\
                      :::\n\
                      append trace {{req.header.X-Trace}}\n\
                      :::\n\
                      append type {{res.header.Content-Type}}\n";
        let (result, _) = run(source, "main", |_| {
            let mut response = text_response("ok");
            response
                .headers
                .push(("Content-Type".to_string(), "application/json".to_string()));
            Ok(response)
        });

        let outcome = result.unwrap();
        assert_eq!(
            outcome.appends,
            vec!["trace t-9".to_string(), "type application/json".to_string()]
        );
    }

    #[test]
    fn test_append_before_failed_send_survives() {
        let source = "### #main\n\
                      GET http://x/a\n\
                      :::\n\
                      :::\n\
                      append progress\n\
                      send failing\n\
                      append unreachable\n\n\
                      ### #failing\n\
                      GET http://x/b\n";
        let (result, _) = run(source, "main", |req| {
            if req.url.ends_with("/b") {
                Err(RequestError::Network("connection refused".to_string()))
            } else {
                Ok(text_response("ok"))
            }
        });

        let failure = result.unwrap_err();
        assert!(matches!(
            failure.error,
            EngineError::Request(RequestError::Network(_))
        ));
        assert_eq!(failure.partial.appends, vec!["progress".to_string()]);
    }

    #[test]
    fn test_script_only_runs_both_sections() {
        let source = "### #setup\n\
                      :::\n\
                      append first\n\
                      :::\n\
                      append second\n";
        let (result, h) = run(source, "setup", |_| Ok(text_response("")));

        let outcome = result.unwrap();
        assert_eq!(
            outcome.appends,
            vec!["first".to_string(), "second".to_string()]
        );
        assert_eq!(h.calls.borrow().len(), 0);
    }

    #[test]
    fn test_json_view_without_response_is_script_error() {
        let source = "@cfg.dry-run = true\n\n\
                      ### #main\n\
                      GET http://x/a\n\
                      :::\n\
                      :::\n\
                      append {{res.json.token}}\n";
        let (result, _) = run(source, "main", |_| Ok(text_response("")));

        assert!(matches!(
            result.unwrap_err().error,
            EngineError::Script(ScriptError::NoResponseInScope { .. })
        ));
    }

    #[test]
    fn test_set_then_get_across_requests() {
        let source = "### #main\n\
                      :::\n\
                      set who world\n\
                      send greet\n\
                      write {{sent.body}}\n\n\
                      ### #greet\n\
                      GET http://x/hello\n\
                      name={{who}}\n";
        let (result, h) = run(source, "main", |req| {
            Ok(text_response(&format!("hi from {}", req.url)))
        });

        let outcome = result.unwrap();
        assert_eq!(h.calls.borrow()[0].url, "http://x/hello?name=world");
        assert_eq!(
            outcome.write.as_deref(),
            Some("hi from http://x/hello?name=world")
        );
    }
}
