//! The interaction bridge: request/response channels for human input.
//!
//! A running program can pause on a text prompt or a yes/no confirmation.
//! Each call builds an [`InputRequest`] carrying a one-shot responder,
//! hands it to the host through the registered handler and blocks the
//! program's thread until the host resolves it. The bridge enforces no
//! timeout of its own; cancellation policy belongs entirely to the host,
//! which can resolve any pending request with a cancellation value at any
//! time (dropping the request without answering counts as cancellation).

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Identifier of one pending input request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(pub Uuid);

impl RequestId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What kind of answer the program is waiting for.
#[derive(Debug, Clone, PartialEq)]
pub enum InputKind {
    /// Free-form text, with an optional prefilled default.
    Text {
        /// Suggested answer the host may present for one-key acceptance.
        default: Option<String>,
    },
    /// A yes/no decision.
    Confirm,
}

/// A pending human-input request, resolvable exactly once.
#[derive(Debug)]
pub struct InputRequest {
    /// Unique id, usable by hosts that queue several requests.
    pub id: RequestId,
    /// Prompt text to present to the human.
    pub message: String,
    /// Expected answer shape.
    pub kind: InputKind,
    responder: oneshot::Sender<Value>,
}

impl InputRequest {
    /// Answer the request. Errors are impossible to act on (the program
    /// may have been abandoned), so the send result is discarded.
    pub fn resolve(self, value: Value) {
        let _ = self.responder.send(value);
    }

    /// Resolve with the cancellation value; the program sees a declined
    /// prompt, not an error.
    pub fn cancel(self) {
        self.resolve(Value::Null);
    }
}

/// Host-side consumer of input requests.
pub type InputHandler = Arc<dyn Fn(InputRequest) + Send + Sync>;

/// Program-facing entry points, parameterized by the host's handler.
#[derive(Clone)]
pub struct Bridge {
    deliver: InputHandler,
}

impl Bridge {
    /// Wrap a host handler.
    pub fn new(deliver: InputHandler) -> Self {
        Self { deliver }
    }

    /// Ask for free-form text. `None` means the human declined (or the
    /// host cancelled); program logic treats it as a normal branch.
    pub fn request_text(&self, message: &str, default: Option<&str>) -> Option<String> {
        let value = self.request(
            message,
            InputKind::Text {
                default: default.map(str::to_string),
            },
        );
        match value {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }
    }

    /// Ask for a yes/no decision; any resolution value is coerced.
    pub fn request_confirm(&self, message: &str) -> bool {
        truthy(&self.request(message, InputKind::Confirm))
    }

    fn request(&self, message: &str, kind: InputKind) -> Value {
        let (tx, rx) = oneshot::channel();
        (self.deliver)(InputRequest {
            id: RequestId::new(),
            message: message.to_string(),
            kind,
            responder: tx,
        });
        // A dropped responder means the host abandoned the request;
        // surface it as cancellation.
        rx.blocking_recv().unwrap_or(Value::Null)
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge").finish_non_exhaustive()
    }
}

/// JSON truthiness used for confirmation coercion.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    fn queueing_bridge() -> (Bridge, Arc<Mutex<Vec<InputRequest>>>) {
        let pending = Arc::new(Mutex::new(Vec::new()));
        let handler = {
            let pending = Arc::clone(&pending);
            Arc::new(move |req: InputRequest| pending.lock().push(req)) as InputHandler
        };
        (Bridge::new(handler), pending)
    }

    #[test]
    fn text_request_resolves_with_answer() {
        let (bridge, pending) = queueing_bridge();
        let asker = std::thread::spawn(move || bridge.request_text("name?", None));
        let req = loop {
            if let Some(req) = pending.lock().pop() {
                break req;
            }
            std::thread::yield_now();
        };
        assert_eq!(req.message, "name?");
        req.resolve(json!("Ada"));
        assert_eq!(asker.join().unwrap(), Some("Ada".to_string()));
    }

    #[test]
    fn cancelled_text_request_is_none_not_error() {
        let (bridge, pending) = queueing_bridge();
        let asker = std::thread::spawn(move || bridge.request_text("name?", Some("anon")));
        let req = loop {
            if let Some(req) = pending.lock().pop() {
                break req;
            }
            std::thread::yield_now();
        };
        if let InputKind::Text { default } = &req.kind {
            assert_eq!(default.as_deref(), Some("anon"));
        } else {
            panic!("expected a text request");
        }
        req.cancel();
        assert_eq!(asker.join().unwrap(), None);
    }

    #[test]
    fn dropped_request_acts_as_cancellation() {
        let (bridge, pending) = queueing_bridge();
        let asker = std::thread::spawn(move || bridge.request_confirm("proceed?"));
        loop {
            let mut queue = pending.lock();
            if queue.pop().is_some() {
                break;
            }
            drop(queue);
            std::thread::yield_now();
        }
        assert!(!asker.join().unwrap());
    }

    #[test]
    fn confirm_coerces_non_boolean_resolutions() {
        for (value, expected) in [
            (json!(true), true),
            (json!(false), false),
            (json!(1), true),
            (json!(0), false),
            (json!("yes"), true),
            (json!(""), false),
            (json!(null), false),
            (json!({"any": "object"}), true),
        ] {
            let (bridge, pending) = queueing_bridge();
            let asker = std::thread::spawn(move || bridge.request_confirm("ok?"));
            let req = loop {
                if let Some(req) = pending.lock().pop() {
                    break req;
                }
                std::thread::yield_now();
            };
            req.resolve(value.clone());
            assert_eq!(asker.join().unwrap(), expected, "value: {value}");
        }
    }
}
