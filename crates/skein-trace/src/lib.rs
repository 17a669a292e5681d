//! Span tracing and diagram synthesis for agent-program runs.
//!
//! A run of an agent program produces a flat list of [`Span`]s: labeled
//! execution intervals with zero, one or many parent links. This crate owns
//! that data model and everything derived from it:
//!
//! - [`span`]: the append-only span list and its JSON wire shape
//! - [`diagram`]: pure renderers turning a finished span list into Mermaid
//!   text (a dependency flowchart and a temporal sequence diagram)
//! - [`infer`]: a best-effort fallback that regex-scans program source for
//!   declared topology before any run has happened
//!
//! # Quick Start
//!
//! ```rust
//! use skein_trace::{Trace, diagram};
//!
//! let mut trace = Trace::new();
//! let plan = trace.start_span("plan", serde_json::Value::Null, None);
//! trace.end_span(plan, serde_json::Value::Null);
//!
//! let flowchart = diagram::dependency_flowchart(trace.spans());
//! assert!(flowchart.starts_with("graph TD"));
//! ```

pub mod diagram;
pub mod error;
pub mod infer;
pub mod span;

pub use diagram::{dependency_flowchart, sequence_diagram};
pub use error::TraceError;
pub use infer::infer_flowchart;
pub use span::{spans_from_json, spans_to_json, ParentRef, Span, SpanId, SpanStatus, Trace};
