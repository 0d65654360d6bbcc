//! End-to-end execution integration tests
//!
//! These tests drive whole request files through parse → engine →
//! formatter with fake transports and shells, covering chaining,
//! scoping, command memoization, and output semantics without touching
//! the network.

use restflow::engine::{Engine, EngineError, ExecutionConfig, ExecutionFailure};
use restflow::executor::{RequestError, ResolvedRequest, SendOptions, Transport};
use restflow::formatter::{format_outcome, OutputMode};
use restflow::models::{HttpMethod, HttpResponse};
use restflow::parser::parse;
use restflow::shell::{CommandError, CommandRunner};

use std::cell::RefCell;
use std::fs;
use std::rc::Rc;
use std::time::Duration;

/// Transport fake that logs calls and answers from a responder closure.
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

fn response_with_body(body: &str) -> HttpResponse {
    let mut response = HttpResponse::new(200, "OK");
    response
        .headers
        .push(("Content-Type".to_string(), "application/json".to_string()));
    response.body = body.as_bytes().to_vec();
    response
}

struct Run {
    outcome: Result<restflow::RequestOutcome, ExecutionFailure>,
    http_calls: Rc<RefCell<Vec<ResolvedRequest>>>,
    shell_calls: Rc<RefCell<Vec<String>>>,
}

fn execute(
    source: &str,
    start: &str,
    responder: impl Fn(&ResolvedRequest) -> Result<HttpResponse, RequestError> + 'static,
) -> Run {
    let document = parse(source).expect("request file should parse");
    let http_calls = Rc::new(RefCell::new(Vec::new()));
    let shell_calls = Rc::new(RefCell::new(Vec::new()));

    let mut engine = Engine::new(
        &document,
        Box::new(FakeTransport {
            calls: http_calls.clone(),
            responder: Box::new(responder),
        }),
        Box::new(FakeShell {
            calls: shell_calls.clone(),
        }),
        ExecutionConfig::default(),
    );
    let outcome = engine.execute(start);

    Run {
        outcome,
        http_calls,
        shell_calls,
    }
}

#[test]
fn test_base_url_ping_round_trip() {
    let source = "@baseUrl = http://localhost:8080\n\n\
                  ### #main\n\
                  GET {{baseUrl}}/ping\n\
                  Accept: application/json\n";
    let run = execute(source, "main", |_| Ok(response_with_body("pong")));

    let outcome = run.outcome.unwrap();
    let calls = run.http_calls.borrow();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, HttpMethod::GET);
    assert_eq!(calls[0].url, "http://localhost:8080/ping");
    assert_eq!(
        calls[0].headers,
        vec![("Accept".to_string(), "application/json".to_string())]
    );
    assert_eq!(format_outcome(&outcome, OutputMode::Terse), "pong");
}

#[test]
fn test_ten_iteration_chaining_loop() {
    let source = "@baseUrl = http://svc\n\n\
                  ### #main\n\
                  :::\n\
                  for n in 0..10\n\
                  set i {{n}}\n\
                  send step\n\
                  end\n\
                  append swept\n\n\
                  ### #step\n\
                  GET {{baseUrl}}/items\n\
                  page={{i}}\n";
    let run = execute(source, "main", |_| Ok(response_with_body("{}")));

    let outcome = run.outcome.unwrap();
    let calls = run.http_calls.borrow();
    assert_eq!(calls.len(), 10);
    for (i, call) in calls.iter().enumerate() {
        assert_eq!(call.url, format!("http://svc/items?page={}", i));
    }
    assert_eq!(format_outcome(&outcome, OutputMode::Terse), "swept");
}

#[test]
fn test_token_capture_then_authorized_call() {
    let source = "@baseUrl = http://svc\n\n\
                  ### #main\n\
                  :::\n\
                  send login\n\
                  set token {{sent.json.token}}\n\
                  send profile\n\
                  write {{sent.status}}\n\n\
                  ### #login\n\
                  POST {{baseUrl}}/login\n\n\
                  ### #profile\n\
                  GET {{baseUrl}}/me\n\
                  Authorization: Bearer {{token}}\n";
    let run = execute(source, "main", |req| {
        if req.url.ends_with("/login") {
            Ok(response_with_body(r#"{"token": "t-123"}"#))
        } else {
            Ok(response_with_body(r#"{"name": "ada"}"#))
        }
    });

    let outcome = run.outcome.unwrap();
    let calls = run.http_calls.borrow();
    assert_eq!(calls.len(), 2);
    assert_eq!(
        calls[1].headers,
        vec![("Authorization".to_string(), "Bearer t-123".to_string())]
    );
    assert_eq!(outcome.write.as_deref(), Some("200"));
}

#[test]
fn test_local_shadowing_does_not_leak() {
    let source = "@env = prod\n\n\
                  ### #staging\n\
                  @env = staging\n\
                  GET http://{{env}}.svc/health\n\n\
                  ### #default\n\
                  GET http://{{env}}.svc/health\n\n\
                  ### #sweep\n\
                  :::\n\
                  send staging\n\
                  send default\n";
    let run = execute(source, "sweep", |_| Ok(response_with_body("ok")));

    run.outcome.unwrap();
    let calls = run.http_calls.borrow();
    assert_eq!(calls[0].url, "http://staging.svc/health");
    assert_eq!(calls[1].url, "http://prod.svc/health");
}

#[test]
fn test_memoized_vs_uncached_commands() {
    let source = "@stamp = {{>>date -u}}\n\
                  @fresh = {{>uuidgen}}\n\n\
                  ### #main\n\
                  GET http://svc/a\n\
                  s1={{stamp}}\n\
                  s2={{stamp}}\n\
                  f1={{fresh}}\n\
                  f2={{fresh}}\n";
    let run = execute(source, "main", |_| Ok(response_with_body("ok")));

    run.outcome.unwrap();
    let shell_calls = run.shell_calls.borrow();
    let memoized = shell_calls.iter().filter(|c| c.as_str() == "date -u").count();
    let uncached = shell_calls.iter().filter(|c| c.as_str() == "uuidgen").count();
    assert_eq!(memoized, 1);
    assert_eq!(uncached, 2);
}

#[test]
fn test_script_only_request_makes_no_network_calls() {
    let source = "### #bookkeeping\n\
                  :::\n\
                  set counter 0\n\
                  append initialized\n";
    let run = execute(source, "bookkeeping", |_| {
        panic!("script-only request must not reach the transport")
    });

    let outcome = run.outcome.unwrap();
    assert!(run.http_calls.borrow().is_empty());
    assert!(outcome.request.is_none());
    assert!(outcome.response.is_none());
    assert_eq!(
        format_outcome(&outcome, OutputMode::Terse),
        "initialized"
    );
}

#[test]
fn test_append_semantics_in_both_modes() {
    let source = "### #main\n\
                  GET http://svc/a\n\
                  :::\n\
                  :::\n\
                  append done\n";
    let run = execute(source, "main", |_| Ok(response_with_body("body text")));

    let outcome = run.outcome.unwrap();
    assert_eq!(
        format_outcome(&outcome, OutputMode::Terse),
        "body text\ndone"
    );

    let verbose = format_outcome(&outcome, OutputMode::Verbose);
    assert!(verbose.contains("=== Response ===\n200 OK"));
    assert!(verbose.contains("body text"));
    assert!(verbose.ends_with("=== Output ===\ndone\n"));
}

#[test]
fn test_pre_hook_conditionally_rewrites_request() {
    let source = "@mode = replay\n\n\
                  ### #main\n\
                  GET http://svc/events\n\
                  :::\n\
                  if {{mode}} == replay\n\
                  req.query from={{$RESTFLOW_UNSET_FROM}}\n\
                  req.header X-Replay: 1\n\
                  end\n\
                  :::\n";
    let run = execute(source, "main", |_| Ok(response_with_body("ok")));

    run.outcome.unwrap();
    let calls = run.http_calls.borrow();
    // Missing environment variables read as empty, never error.
    assert_eq!(calls[0].url, "http://svc/events?from=");
    assert_eq!(
        calls[0].headers,
        vec![("X-Replay".to_string(), "1".to_string())]
    );
}

#[test]
fn test_unknown_request_name_is_fatal() {
    let run = execute("### #main\nGET http://svc/a\n", "nope", |_| {
        Ok(response_with_body("ok"))
    });
    assert_eq!(
        run.outcome.unwrap_err().error,
        EngineError::UnknownRequest("nope".to_string())
    );
}

#[test]
fn test_append_output_survives_later_failure() {
    let source = "### #main\n\
                  GET http://svc/a\n\
                  :::\n\
                  :::\n\
                  append checkpoint reached\n\
                  send broken\n\n\
                  ### #broken\n\
                  GET http://svc/down\n";
    let run = execute(source, "main", |req| {
        if req.url.ends_with("/down") {
            Err(RequestError::Network("connection refused".to_string()))
        } else {
            Ok(response_with_body("ok"))
        }
    });

    let failure = run.outcome.unwrap_err();
    assert!(matches!(
        failure.error,
        EngineError::Request(RequestError::Network(_))
    ));
    // The partial outcome still renders the text written before the failure.
    assert_eq!(
        format_outcome(&failure.partial, OutputMode::Terse),
        "checkpoint reached"
    );
}

#[test]
fn test_mixed_case_header_view_resolves() {
    let source = "### #main\n\
                  GET http://svc/a\n\
                  :::\n\
                  :::\n\
                  append {{res.header.Content-Type}}\n";
    let run = execute(source, "main", |_| Ok(response_with_body("{}")));

    let outcome = run.outcome.unwrap();
    assert_eq!(outcome.appends, vec!["application/json".to_string()]);
}

#[test]
fn test_file_from_disk_round_trip() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("smoke.http");
    fs::write(
        &path,
        "@baseUrl = http://svc\n\n### #main\nGET {{baseUrl}}/ping\n",
    )
    .expect("write request file");

    let text = fs::read_to_string(&path).expect("read request file");
    let run = execute(&text, "main", |_| Ok(response_with_body("pong")));

    let outcome = run.outcome.unwrap();
    assert_eq!(outcome.response.unwrap().body_text(), "pong");
}
