//! One-shot sandboxed execution of agent programs.
//!
//! Each invocation instantiates a fresh script engine, wires the host's
//! capabilities into it (diagnostics, tracing, graph publication, the
//! interaction bridge, text generation, credentials) and evaluates the
//! submitted source exactly once. Nothing of a previous run's global state
//! survives into the next: isolation comes from never reusing an engine.
//!
//! Only one run is "current" at a time from the host's point of view.
//! Every run is tagged with a [`RunId`], and every callback delivery is
//! gated on that id still being the active one, so late-arriving output
//! from a superseded run is silently discarded rather than interleaved
//! with the new run's stream.

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rhai::{Dynamic, Engine, EvalAltResult, Position, Scope};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use skein_trace::{spans_from_json, ParentRef, Span, SpanId, Trace};

use crate::bridge::{Bridge, InputHandler, InputRequest};
use crate::error::SandboxError;
use crate::generate::{TextGenerator, UnconfiguredGenerator};
use crate::log::{LogEmitter, LogLevel, LogSink};

/// Identifier tagging one sandbox run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId(pub Uuid);

impl RunId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The one run currently allowed to deliver callbacks, process-wide.
static ACTIVE_RUN: Lazy<Mutex<Option<RunId>>> = Lazy::new(|| Mutex::new(None));

/// The id of the currently active run, if any.
pub fn current_run_id() -> Option<RunId> {
    *ACTIVE_RUN.lock()
}

/// Claim on the active-run slot, released on drop.
///
/// Activating a new guard supersedes whatever run held the slot before;
/// the superseded run keeps executing but its callbacks stop being
/// delivered. Dropping a guard clears the slot only if this run still
/// owns it, so a superseded run's teardown cannot knock out its
/// successor.
#[derive(Debug)]
struct RunGuard {
    id: RunId,
}

impl RunGuard {
    fn activate(id: RunId) -> Self {
        let mut slot = ACTIVE_RUN.lock();
        if let Some(previous) = slot.replace(id) {
            debug!(%previous, current = %id, "superseding active run");
        }
        Self { id }
    }

    fn is_current(id: RunId) -> bool {
        *ACTIVE_RUN.lock() == Some(id)
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut slot = ACTIVE_RUN.lock();
        if *slot == Some(self.id) {
            *slot = None;
        }
    }
}

/// Host callbacks wired into every run.
#[derive(Clone)]
pub struct SandboxHooks {
    /// Receives each log record, in call order, as it is produced.
    pub on_log: LogSink,
    /// Receives the span list each time the program publishes its graph.
    pub on_graph: Arc<dyn Fn(Vec<Span>) + Send + Sync>,
    /// Receives human-input requests from the interaction bridge.
    pub on_input: InputHandler,
}

impl std::fmt::Debug for SandboxHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxHooks").finish_non_exhaustive()
    }
}

/// Tunables for the sandbox.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Engine operation budget per run; 0 disables the limit.
    pub max_operations: u64,
    /// Constant names under which the credential is injected into the
    /// program's scope.
    pub credential_names: Vec<String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            max_operations: 10_000_000,
            credential_names: vec!["API_KEY".to_string(), "OPENAI_API_KEY".to_string()],
        }
    }
}

/// Runs untrusted agent programs, one at a time.
#[derive(Clone)]
pub struct SandboxExecutor {
    config: SandboxConfig,
    generator: Arc<dyn TextGenerator>,
    hooks: SandboxHooks,
}

impl SandboxExecutor {
    /// Executor with default config and no text-generation backend.
    pub fn new(hooks: SandboxHooks) -> Self {
        Self {
            config: SandboxConfig::default(),
            generator: Arc::new(UnconfiguredGenerator),
            hooks,
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: SandboxConfig) -> Self {
        self.config = config;
        self
    }

    /// Wire in a text-generation backend.
    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = generator;
        self
    }

    /// Run `source` exactly once and return the span list it produced.
    ///
    /// The run becomes the process's active run for its duration;
    /// starting another run while this one is in flight supersedes it.
    /// Program failures surface as [`SandboxError::Script`] after the
    /// run's callbacks have been withdrawn.
    pub async fn execute(&self, source: &str, credential: &str) -> Result<Vec<Span>, SandboxError> {
        let run = RunId::new();
        let guard = RunGuard::activate(run);

        let ctx = RunContext {
            run,
            emitter: LogEmitter::new(gate_log(run, Arc::clone(&self.hooks.on_log))),
            trace: Arc::new(Mutex::new(Trace::new())),
            graph: gate_graph(run, Arc::clone(&self.hooks.on_graph)),
            bridge: Bridge::new(gate_input(run, Arc::clone(&self.hooks.on_input))),
            generator: Arc::clone(&self.generator),
            credential: credential.to_string(),
        };

        ctx.emitter
            .emit(LogLevel::System, "agent program starting");

        let config = self.config.clone();
        let source = source.to_string();
        let task_ctx = ctx.clone();
        let outcome = tokio::task::spawn_blocking(move || run_program(&source, &config, &task_ctx))
            .await
            .map_err(|join| SandboxError::Aborted(join.to_string()))?;

        match &outcome {
            Ok(()) => ctx
                .emitter
                .emit(LogLevel::System, "agent program finished"),
            Err(err) => ctx
                .emitter
                .emit(LogLevel::System, format!("agent program failed: {err}")),
        }

        drop(guard);
        outcome?;

        let spans = ctx.trace.lock().spans().to_vec();
        Ok(spans)
    }
}

impl std::fmt::Debug for SandboxExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxExecutor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Everything one run's registered functions need, cheap to clone.
#[derive(Clone)]
struct RunContext {
    run: RunId,
    emitter: LogEmitter,
    trace: Arc<Mutex<Trace>>,
    graph: Arc<dyn Fn(Vec<Span>) + Send + Sync>,
    bridge: Bridge,
    generator: Arc<dyn TextGenerator>,
    credential: String,
}

fn gate_log(run: RunId, inner: LogSink) -> LogSink {
    Arc::new(move |record| {
        if RunGuard::is_current(run) {
            inner(record);
        }
    })
}

fn gate_graph(
    run: RunId,
    inner: Arc<dyn Fn(Vec<Span>) + Send + Sync>,
) -> Arc<dyn Fn(Vec<Span>) + Send + Sync> {
    Arc::new(move |spans| {
        if RunGuard::is_current(run) {
            inner(spans);
        }
    })
}

fn gate_input(run: RunId, inner: InputHandler) -> InputHandler {
    Arc::new(move |request: InputRequest| {
        if RunGuard::is_current(run) {
            inner(request);
        }
        // Not current: the request is dropped here, which resolves the
        // waiting program with the cancellation value.
    })
}

/// Build a fresh engine, install the run's capabilities and evaluate the
/// program to completion on the blocking thread.
fn run_program(source: &str, config: &SandboxConfig, ctx: &RunContext) -> Result<(), SandboxError> {
    let mut engine = Engine::new();
    if config.max_operations > 0 {
        engine.set_max_operations(config.max_operations);
    }

    install_diagnostics(&mut engine, ctx);
    install_tracer(&mut engine, ctx);
    install_bridge(&mut engine, ctx);
    install_generator(&mut engine, ctx);

    let mut scope = Scope::new();
    for name in &config.credential_names {
        scope.push_constant(name.clone(), ctx.credential.clone());
    }

    debug!(run = %ctx.run, "evaluating agent program");
    engine
        .eval_with_scope::<Dynamic>(&mut scope, source)
        .map(|_| ())
        .map_err(|err| SandboxError::Script {
            message: err.to_string(),
        })
}

/// Route the engine's diagnostic output into leveled log records.
fn install_diagnostics(engine: &mut Engine, ctx: &RunContext) {
    let emitter = ctx.emitter.clone();
    engine.on_print(move |text| emitter.emit(LogLevel::Info, text));

    let emitter = ctx.emitter.clone();
    engine.on_debug(move |text, _source, _pos| emitter.emit(LogLevel::Verbose, text));

    let emitter = ctx.emitter.clone();
    engine.register_fn("log_warn", move |message: &str| {
        emitter.emit(LogLevel::Warn, message);
    });

    let emitter = ctx.emitter.clone();
    engine.register_fn("log_error", move |message: &str| {
        emitter.emit(LogLevel::Error, message);
    });
}

/// Span creation/closure and graph publication.
fn install_tracer(engine: &mut Engine, ctx: &RunContext) {
    let c = ctx.clone();
    engine.register_fn("span_start", move |name: &str| {
        c.trace.lock().start_span(name, Value::Null, None).to_string()
    });

    let c = ctx.clone();
    engine.register_fn("span_start", move |name: &str, input: Dynamic| {
        c.trace
            .lock()
            .start_span(name, dynamic_to_value(input), None)
            .to_string()
    });

    let c = ctx.clone();
    engine.register_fn(
        "span_start",
        move |name: &str, input: Dynamic, parent: &str| {
            let parent = parse_parent(&c, parent).map(ParentRef::One);
            c.trace
                .lock()
                .start_span(name, dynamic_to_value(input), parent)
                .to_string()
        },
    );

    let c = ctx.clone();
    engine.register_fn(
        "span_start",
        move |name: &str, input: Dynamic, parents: rhai::Array| {
            let ids: Vec<SpanId> = parents
                .iter()
                .filter_map(|p| parse_parent(&c, &p.to_string()))
                .collect();
            let parent = (!ids.is_empty()).then_some(ParentRef::Many(ids));
            c.trace
                .lock()
                .start_span(name, dynamic_to_value(input), parent)
                .to_string()
        },
    );

    let c = ctx.clone();
    engine.register_fn("span_end", move |id: &str| end_span(&c, id, Value::Null));

    let c = ctx.clone();
    engine.register_fn("span_end", move |id: &str, output: Dynamic| {
        end_span(&c, id, dynamic_to_value(output));
    });

    let c = ctx.clone();
    engine.register_fn("publish_graph", move || {
        let spans = c.trace.lock().spans().to_vec();
        (c.graph)(spans);
    });

    let c = ctx.clone();
    engine.register_fn("publish_graph_json", move |payload: &str| {
        match spans_from_json(payload) {
            Ok(spans) => (c.graph)(spans),
            Err(err) => {
                warn!(run = %c.run, %err, "discarding malformed graph payload");
                c.emitter
                    .emit(LogLevel::Warn, format!("ignoring graph payload: {err}"));
            }
        }
    });
}

/// The interaction bridge entry points.
fn install_bridge(engine: &mut Engine, ctx: &RunContext) {
    let bridge = ctx.bridge.clone();
    engine.register_fn("request_text", move |message: &str| {
        option_to_dynamic(bridge.request_text(message, None))
    });

    let bridge = ctx.bridge.clone();
    engine.register_fn("request_text", move |message: &str, default: &str| {
        option_to_dynamic(bridge.request_text(message, Some(default)))
    });

    let bridge = ctx.bridge.clone();
    engine.register_fn("request_confirm", move |message: &str| {
        bridge.request_confirm(message)
    });
}

/// The text-generation call; service failures become script errors the
/// program can catch or let propagate.
fn install_generator(engine: &mut Engine, ctx: &RunContext) {
    let c = ctx.clone();
    engine.register_fn(
        "generate",
        move |prompt: &str| -> Result<String, Box<EvalAltResult>> {
            c.generator
                .generate(prompt, &c.credential)
                .map_err(|err| EvalAltResult::ErrorRuntime(err.to_string().into(), Position::NONE).into())
        },
    );
}

/// Close a span; an unknown or unparsable id only produces a warning.
fn end_span(ctx: &RunContext, id: &str, output: Value) {
    let Some(span_id) = parse_parent(ctx, id) else {
        return;
    };
    if !ctx.trace.lock().end_span(span_id, output) {
        warn!(run = %ctx.run, span = id, "span_end on unknown id");
        ctx.emitter
            .emit(LogLevel::Warn, format!("span_end: unknown span id {id}"));
    }
}

/// Parse a span id handed back from the program, warning on garbage.
fn parse_parent(ctx: &RunContext, id: &str) -> Option<SpanId> {
    match id.parse() {
        Ok(span_id) => Some(span_id),
        Err(_) => {
            ctx.emitter
                .emit(LogLevel::Warn, format!("not a span id: {id}"));
            None
        }
    }
}

fn dynamic_to_value(value: Dynamic) -> Value {
    rhai::serde::from_dynamic(&value).unwrap_or(Value::Null)
}

fn option_to_dynamic(value: Option<String>) -> Dynamic {
    match value {
        Some(text) => text.into(),
        None => Dynamic::UNIT,
    }
}
