//! Sandboxed, observable execution of untrusted agent programs.
//!
//! An agent program is a short script that calls a text-generation
//! service and structures its work as spans. This crate runs such
//! programs one at a time in a throwaway script engine, streams their
//! diagnostics to the host as leveled [`log::LogRecord`]s, lets them
//! publish their span graph and pause on human input, and guarantees
//! that a superseded run can no longer reach the host's callbacks.
//!
//! The capabilities a program sees:
//!
//! | call | effect |
//! |------|--------|
//! | `print` / `debug` | `info` / `verbose` log records |
//! | `log_warn`, `log_error` | `warn` / `error` log records |
//! | `span_start`, `span_end` | build the run's span list |
//! | `publish_graph`, `publish_graph_json` | push the span list to the host |
//! | `request_text`, `request_confirm` | pause on the interaction bridge |
//! | `generate` | call the text-generation backend |
//!
//! The credential passed to [`executor::SandboxExecutor::execute`] is
//! injected as scope constants under conventional names so programs can
//! read it the way they would read an environment variable.

pub mod bridge;
pub mod error;
pub mod executor;
pub mod generate;
pub mod log;

pub use bridge::{Bridge, InputHandler, InputKind, InputRequest, RequestId};
pub use error::{GeneratorError, SandboxError};
pub use executor::{current_run_id, RunId, SandboxConfig, SandboxExecutor, SandboxHooks};
pub use generate::{TextGenerator, UnconfiguredGenerator};
pub use log::{LogEmitter, LogLevel, LogRecord, LogSink};
