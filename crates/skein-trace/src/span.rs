//! The span model: labeled execution intervals with explicit parent links.
//!
//! Spans are created in `RUNNING` state, mutated exactly once by the
//! matching end call (or never; an unclosed span is a legitimate terminal
//! state representing aborted work), and read-only afterward. The list for
//! one run is owned exclusively by that run; nothing persists or merges
//! across runs.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::TraceError;

/// Opaque span identifier, assigned at creation and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SpanId(pub Uuid);

impl SpanId {
    /// Generate a fresh id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SpanId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SpanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SpanId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Parent link of a span: a single predecessor or a fan-in from several.
///
/// Serializes untagged, so the wire shape is a bare id string or an array
/// of id strings, matching the payload the host exchanges with programs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParentRef {
    /// One predecessor.
    One(SpanId),
    /// Fan-in from several predecessors, in declaration order.
    Many(Vec<SpanId>),
}

impl ParentRef {
    /// The referenced ids, in declaration order.
    pub fn ids(&self) -> &[SpanId] {
        match self {
            ParentRef::One(id) => std::slice::from_ref(id),
            ParentRef::Many(ids) => ids,
        }
    }
}

/// Terminal state of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SpanStatus {
    /// Open, or never closed (aborted/interrupted work). Not an error.
    Running,
    /// Closed by the matching end call.
    Completed,
}

/// One labeled execution interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    /// Unique id, assigned at creation.
    pub id: SpanId,
    /// Human-readable label; not required to be unique.
    pub name: String,
    /// Absent for roots. Ids that resolve to no span in the same list are
    /// treated as "root" by the renderers, never as an error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ParentRef>,
    /// Payload captured at start.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub input: Value,
    /// Payload captured at end; `Null` while the span is open.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub output: Value,
    /// Lifecycle state.
    pub status: SpanStatus,
    /// Epoch milliseconds.
    pub start_time: i64,
    /// Epoch milliseconds; absent until closed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
}

impl Span {
    /// Declared parent ids, in declaration order (empty for roots).
    pub fn parents(&self) -> &[SpanId] {
        self.parent_id.as_ref().map(ParentRef::ids).unwrap_or(&[])
    }
}

/// The append-only span list produced by one run.
///
/// No index beyond the flat list: runs produce tens of spans and the list
/// is serialized wholesale for rendering and for publication to the host.
#[derive(Debug, Default)]
pub struct Trace {
    spans: Vec<Span>,
}

impl Trace {
    /// Create an empty trace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a span in `RUNNING` state, append it and return its id.
    pub fn start_span(
        &mut self,
        name: impl Into<String>,
        input: Value,
        parent: Option<ParentRef>,
    ) -> SpanId {
        let id = SpanId::new();
        self.spans.push(Span {
            id,
            name: name.into(),
            parent_id: parent,
            input,
            output: Value::Null,
            status: SpanStatus::Running,
            start_time: now_millis(),
            end_time: None,
        });
        id
    }

    /// Close the span with the given id, recording its output and end time.
    ///
    /// An unknown id does nothing and returns `false`: losing one trace
    /// entry must never abort the workflow that produced it. Callers decide
    /// whether to surface a warning.
    pub fn end_span(&mut self, id: SpanId, output: Value) -> bool {
        match self.spans.iter_mut().find(|s| s.id == id) {
            Some(span) => {
                span.status = SpanStatus::Completed;
                span.output = output;
                span.end_time = Some(now_millis());
                true
            }
            None => false,
        }
    }

    /// All spans, in creation order.
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// Number of spans recorded so far.
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// Whether no span has been recorded.
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Consume the trace, yielding the owned span list.
    pub fn into_spans(self) -> Vec<Span> {
        self.spans
    }
}

/// Current wall-clock time in epoch milliseconds.
pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Serialize a span list to the JSON payload exchanged with the host.
pub fn spans_to_json(spans: &[Span]) -> Result<String, TraceError> {
    Ok(serde_json::to_string(spans)?)
}

/// Parse the JSON span payload back into a span list.
pub fn spans_from_json(payload: &str) -> Result<Vec<Span>, TraceError> {
    Ok(serde_json::from_str(payload)?)
}
