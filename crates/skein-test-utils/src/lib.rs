//! Shared fixtures for skein tests: span builders, recording hooks and a
//! canned text generator.

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;

use skein_sandbox::{
    GeneratorError, InputRequest, LogRecord, SandboxHooks, TextGenerator,
};
use skein_trace::{ParentRef, Span, SpanId, SpanStatus};

/// A completed root span with explicit timestamps.
pub fn span(name: &str, start: i64, end: i64) -> Span {
    Span {
        id: SpanId::new(),
        name: name.to_string(),
        parent_id: None,
        input: Value::Null,
        output: Value::Null,
        status: SpanStatus::Completed,
        start_time: start,
        end_time: Some(end),
    }
}

/// A completed span with the given parents.
pub fn child_span(name: &str, start: i64, end: i64, parents: &[SpanId]) -> Span {
    let parent_id = match parents {
        [] => None,
        [only] => Some(ParentRef::One(*only)),
        many => Some(ParentRef::Many(many.to_vec())),
    };
    Span {
        parent_id,
        ..span(name, start, end)
    }
}

/// Everything the host observed during a run.
#[derive(Debug, Default)]
pub struct RunCapture {
    pub logs: Mutex<Vec<LogRecord>>,
    pub graphs: Mutex<Vec<Vec<Span>>>,
    pub inputs: Mutex<Vec<InputRequest>>,
}

impl RunCapture {
    /// Messages of captured log records, in delivery order.
    pub fn messages(&self) -> Vec<String> {
        self.logs.lock().iter().map(|r| r.content.clone()).collect()
    }
}

/// Hooks that record every delivery into a [`RunCapture`].
pub fn capture_hooks() -> (Arc<RunCapture>, SandboxHooks) {
    let capture = Arc::new(RunCapture::default());
    let hooks = SandboxHooks {
        on_log: {
            let capture = Arc::clone(&capture);
            Arc::new(move |record| capture.logs.lock().push(record))
        },
        on_graph: {
            let capture = Arc::clone(&capture);
            Arc::new(move |spans| capture.graphs.lock().push(spans))
        },
        on_input: {
            let capture = Arc::clone(&capture);
            Arc::new(move |request| capture.inputs.lock().push(request))
        },
    };
    (capture, hooks)
}

/// Wait for the next queued input request while a run is in flight.
pub async fn next_input(capture: &RunCapture) -> InputRequest {
    for _ in 0..500 {
        if let Some(request) = capture.inputs.lock().pop() {
            return request;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no input request arrived");
}

/// Generator returning one canned completion, or the usual credential
/// error when the credential is empty.
#[derive(Debug, Clone)]
pub struct StaticGenerator {
    pub response: String,
}

impl StaticGenerator {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

impl TextGenerator for StaticGenerator {
    fn generate(&self, _prompt: &str, credential: &str) -> Result<String, GeneratorError> {
        if credential.is_empty() {
            return Err(GeneratorError::MissingCredential);
        }
        Ok(self.response.clone())
    }
}
