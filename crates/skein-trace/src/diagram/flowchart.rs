//! Dependency-graph renderer.
//!
//! One node per span; one edge per (parent, span) pair. Spans with no
//! resolvable parent hang off a synthetic `START` node, and spans never
//! referenced as anybody's parent feed a synthetic `END` node.

use std::collections::HashMap;

use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;

use super::{escape_label, sanitize_id};
use crate::span::{Span, SpanId};

/// Render the dependency graph of a finished span list as Mermaid text.
///
/// A `parent_id` entry that resolves to no span in the list is ignored; a
/// span left with no resolvable parent is treated as a root. Neither case
/// is an error.
pub fn dependency_flowchart(spans: &[Span]) -> String {
    let mut out = String::from("graph TD\n");
    out.push_str("    START([START])\n");
    out.push_str("    END([END])\n");

    // First occurrence wins if an id ever repeats; ids are not supposed to.
    let mut index_of: HashMap<SpanId, usize> = HashMap::new();
    for (i, span) in spans.iter().enumerate() {
        index_of.entry(span.id).or_insert(i);
    }

    let ids: Vec<String> = spans.iter().map(|s| node_id(&s.name)).collect();

    for (span, sid) in spans.iter().zip(&ids) {
        out.push_str(&format!("    {}[\"{}\"]\n", sid, escape_label(&span.name)));
    }

    // Reference topology over span indices; exit nodes are the spans that
    // nobody names as a parent.
    let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();
    for i in 0..spans.len() {
        graph.add_node(i);
    }
    for (i, span) in spans.iter().enumerate() {
        for parent in span.parents() {
            if let Some(&p) = index_of.get(parent) {
                if p != i {
                    graph.add_edge(p, i, ());
                }
            }
        }
    }

    for (i, span) in spans.iter().enumerate() {
        let mut rooted = true;
        for parent in span.parents() {
            if let Some(&p) = index_of.get(parent) {
                if p == i {
                    continue;
                }
                out.push_str(&format!("    {} --> {}\n", ids[p], ids[i]));
                rooted = false;
            }
        }
        if rooted {
            out.push_str(&format!("    START --> {}\n", ids[i]));
        }
    }

    for i in 0..spans.len() {
        if graph
            .neighbors_directed(i, Direction::Outgoing)
            .next()
            .is_none()
        {
            out.push_str(&format!("    {} --> END\n", ids[i]));
        }
    }

    out
}

/// Sanitized span id, kept distinct from the synthetic terminals so a
/// span literally named `START` or `END` cannot merge with them.
fn node_id(name: &str) -> String {
    let mut id = sanitize_id(name);
    if id == "START" || id == "END" {
        id.push('_');
    }
    id
}
