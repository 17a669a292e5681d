//! Mermaid diagram synthesis from finished span lists.
//!
//! Two pure renderers over the same flat list: a dependency flowchart
//! (who preceded whom, no timing) and a temporal sequence diagram (ordered
//! call/return interactions). Both emit plain Mermaid text for an external
//! renderer; nothing here validates the diagram semantically.

mod flowchart;
mod sequence;

pub use flowchart::dependency_flowchart;
pub use sequence::sequence_diagram;

/// Derive a Mermaid-safe identifier from a span name by stripping every
/// character outside `[A-Za-z0-9_]`.
///
/// Distinct spans whose names sanitize to the same identifier collide; at
/// the scale of real workloads (tens of nodes) this is an accepted
/// limitation, not deduplicated.
pub(crate) fn sanitize_id(name: &str) -> String {
    let id: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if id.is_empty() {
        "node".to_string()
    } else {
        id
    }
}

/// Escape a span name for use inside a quoted Mermaid label.
pub(crate) fn escape_label(name: &str) -> String {
    name.replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
