//! # restflow
//!
//! An interpreter for scripted HTTP request files. A request file holds
//! named request definitions, variable declarations, and embedded hook
//! scripts; invoking one request can trigger a whole choreography of
//! variable resolution, shell-command substitution, scripted mutation,
//! and synchronous chained sends.
//!
//! ## Quick start
//!
//! ```
//! use restflow::engine::{Engine, ExecutionConfig};
//! use restflow::executor::{ResolvedRequest, SendOptions, Transport};
//! use restflow::models::HttpResponse;
//! use restflow::parser::parse;
//! use restflow::shell::SystemShell;
//!
//! struct NoNetwork;
//!
//! impl Transport for NoNetwork {
//!     fn send(
//!         &self,
//!         _request: &ResolvedRequest,
//!         _options: &SendOptions,
//!     ) -> Result<HttpResponse, restflow::executor::RequestError> {
//!         Ok(HttpResponse::new(200, "OK"))
//!     }
//! }
//!
//! let doc = parse("@baseUrl = http://localhost\n\n### #main\nGET {{baseUrl}}/ping\n").unwrap();
//! let mut engine = Engine::new(
//!     &doc,
//!     Box::new(NoNetwork),
//!     Box::new(SystemShell::new()),
//!     ExecutionConfig::default(),
//! );
//! let outcome = engine.execute("main").unwrap();
//! assert_eq!(outcome.response.unwrap().status_code, 200);
//! ```
//!
//! ## Architecture
//!
//! - [`parser`] — request-file text to [`models::Document`]
//! - [`variables`] — `{{...}}` placeholder resolution with environment
//!   reads and shell-command substitution
//! - [`script`] — the bounded hook-script sublanguage
//! - [`engine`] — the per-request state machine and chained sends
//! - [`executor`] — the HTTP transport behind the [`executor::Transport`]
//!   trait
//! - [`formatter`] — terse and verbose terminal output
//! - [`openapi`] — OpenAPI document to request-file generation

pub mod engine;
pub mod executor;
pub mod formatter;
pub mod models;
pub mod openapi;
pub mod parser;
pub mod script;
pub mod shell;
pub mod variables;

pub use engine::{Engine, EngineError, ExecutionConfig, ExecutionFailure, RequestOutcome};
pub use formatter::{format_outcome, OutputMode};
pub use models::{Document, HttpMethod, HttpResponse, RequestDef};
pub use parser::parse;
