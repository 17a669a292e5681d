//! Structural properties of the diagram renderers over arbitrary span lists.

use proptest::prelude::*;
use serde_json::Value;
use skein_trace::{dependency_flowchart, sequence_diagram, ParentRef, Span, SpanId, SpanStatus};

fn arb_name() -> impl Strategy<Value = String> {
    "[a-z_]{1,12}"
}

/// A list of spans whose parent links, when present, point at earlier
/// entries in the same list.
fn arb_spans(max: usize) -> impl Strategy<Value = Vec<Span>> {
    prop::collection::vec((arb_name(), 0i64..1_000, any::<bool>(), any::<u8>()), 0..max)
        .prop_map(|raw| {
            let mut spans: Vec<Span> = Vec::with_capacity(raw.len());
            for (name, start, closed, parent_pick) in raw {
                let parent_id = if spans.is_empty() || parent_pick == 0 {
                    None
                } else {
                    let p = spans[parent_pick as usize % spans.len()].id;
                    Some(ParentRef::One(p))
                };
                spans.push(Span {
                    id: SpanId::new(),
                    name,
                    parent_id,
                    input: Value::Null,
                    output: Value::Null,
                    status: if closed {
                        SpanStatus::Completed
                    } else {
                        SpanStatus::Running
                    },
                    start_time: start,
                    end_time: closed.then_some(start + 1),
                });
            }
            spans
        })
}

proptest! {
    #[test]
    fn flowchart_emits_one_node_line_per_span(spans in arb_spans(12)) {
        let out = dependency_flowchart(&spans);
        let node_lines = out.lines().filter(|l| l.contains("[\"")).count();
        prop_assert_eq!(node_lines, spans.len());
    }

    #[test]
    fn flowchart_starts_with_header_and_terminals(spans in arb_spans(12)) {
        let out = dependency_flowchart(&spans);
        prop_assert!(out.starts_with("graph TD\n    START([START])\n    END([END])\n"));
    }

    #[test]
    fn flowchart_edge_endpoints_are_declared_nodes(spans in arb_spans(12)) {
        let out = dependency_flowchart(&spans);
        let mut known: Vec<String> = vec!["START".into(), "END".into()];
        for line in out.lines().filter(|l| l.contains("[\"")) {
            if let Some(id) = line.trim().split('[').next() {
                known.push(id.to_string());
            }
        }
        for line in out.lines().filter(|l| l.contains("-->")) {
            let mut parts = line.trim().split(" --> ");
            let from = parts.next().unwrap_or("").to_string();
            let to = parts.next().unwrap_or("").to_string();
            prop_assert!(known.contains(&from), "unknown edge source {from}");
            prop_assert!(known.contains(&to), "unknown edge target {to}");
        }
    }

    #[test]
    fn sequence_emits_one_call_and_return_per_span(spans in arb_spans(12)) {
        let out = sequence_diagram(&spans);
        let calls = out.lines().filter(|l| l.contains("->>+")).count();
        let returns = out.lines().filter(|l| l.contains("-->>-")).count();
        prop_assert_eq!(calls, spans.len());
        prop_assert_eq!(returns, spans.len());
    }

    #[test]
    fn sequence_is_deterministic(spans in arb_spans(12)) {
        prop_assert_eq!(sequence_diagram(&spans), sequence_diagram(&spans));
    }
}
