//! Temporal sequence-diagram renderer.

use super::sanitize_id;
use crate::span::Span;

/// Render a finished span list as a Mermaid sequence diagram.
///
/// Spans become participants; each span is drawn as an activated call from
/// the participant that was most plausibly driving it, followed by an
/// immediate return. The caller of a span is the first of its declared
/// parents that was active when the span started (started earlier, not yet
/// ended); a span with no such parent is called by a synthetic `Host`
/// participant. When several declared parents were active simultaneously,
/// the first one in declaration order wins.
pub fn sequence_diagram(spans: &[Span]) -> String {
    let mut out = String::from("sequenceDiagram\n");
    out.push_str("    participant Host\n");

    let mut order: Vec<usize> = (0..spans.len()).collect();
    order.sort_by_key(|&i| spans[i].start_time);

    for &i in &order {
        let child = &spans[i];
        let callee = participant(&child.name);
        let caller = effective_caller(spans, child)
            .map(|p| participant(&p.name))
            .unwrap_or_else(|| "Host".to_string());
        out.push_str(&format!(
            "    {}->>+{}: {}\n",
            caller,
            callee,
            message_text(child)
        ));
        out.push_str(&format!("    {}-->>-{}: return\n", callee, caller));
    }

    out
}

/// Sanitized participant id, kept distinct from the synthetic `Host`
/// participant so a span literally named `Host` cannot merge with it.
fn participant(name: &str) -> String {
    let mut id = sanitize_id(name);
    if id == "Host" {
        id.push('_');
    }
    id
}

/// First declared parent active at the child's start, in declaration order.
fn effective_caller<'a>(spans: &'a [Span], child: &Span) -> Option<&'a Span> {
    for parent_id in child.parents() {
        let Some(parent) = spans.iter().find(|s| s.id == *parent_id) else {
            continue;
        };
        if parent.id == child.id {
            continue;
        }
        let started_before = parent.start_time < child.start_time;
        let still_open = parent.end_time.map_or(true, |end| end > child.start_time);
        if started_before && still_open {
            return Some(parent);
        }
    }
    None
}

/// Message label: the span name flattened onto one line, with the Mermaid
/// statement separator neutralized.
fn message_text(span: &Span) -> String {
    span.name
        .replace(['\n', '\r'], " ")
        .replace(';', ",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::{ParentRef, SpanId, SpanStatus};
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    fn span(name: &str, start: i64, end: Option<i64>, parents: Option<ParentRef>) -> Span {
        Span {
            id: SpanId::new(),
            name: name.to_string(),
            parent_id: parents,
            input: Value::Null,
            output: Value::Null,
            status: if end.is_some() {
                SpanStatus::Completed
            } else {
                SpanStatus::Running
            },
            start_time: start,
            end_time: end,
        }
    }

    #[test]
    fn empty_list_renders_header_and_host() {
        assert_eq!(
            sequence_diagram(&[]),
            "sequenceDiagram\n    participant Host\n"
        );
    }

    #[test]
    fn contained_child_is_called_by_its_parent() {
        let a = span("outer", 0, Some(10), None);
        let b = span("inner", 5, Some(8), Some(ParentRef::One(a.id)));
        let out = sequence_diagram(&[a, b]);
        assert!(out.contains("    Host->>+outer: outer\n"));
        assert!(out.contains("    outer->>+inner: inner\n"));
        assert!(out.contains("    inner-->>-outer: return\n"));
    }

    #[test]
    fn parent_already_ended_falls_back_to_host() {
        let a = span("first", 0, Some(10), None);
        let b = span("second", 12, Some(15), Some(ParentRef::One(a.id)));
        let out = sequence_diagram(&[a, b]);
        assert!(out.contains("    Host->>+second: second\n"));
    }

    #[test]
    fn unclosed_parent_counts_as_active() {
        let a = span("poller", 0, None, None);
        let b = span("iteration", 3, Some(4), Some(ParentRef::One(a.id)));
        let out = sequence_diagram(&[a, b]);
        assert!(out.contains("    poller->>+iteration: iteration\n"));
    }

    #[test]
    fn first_active_parent_wins_in_declaration_order() {
        let a = span("left", 0, Some(20), None);
        let b = span("right", 0, Some(20), None);
        let join = span("join", 10, Some(15), Some(ParentRef::Many(vec![b.id, a.id])));
        let out = sequence_diagram(&[a, b, join]);
        assert!(out.contains("    right->>+join: join\n"));
    }

    #[test]
    fn spans_are_ordered_by_start_time() {
        let late = span("late", 50, Some(60), None);
        let early = span("early", 1, Some(2), None);
        let out = sequence_diagram(&[late, early]);
        let early_pos = out.find("Host->>+early").unwrap();
        let late_pos = out.find("Host->>+late").unwrap();
        assert!(early_pos < late_pos);
    }

    #[test]
    fn equal_start_times_keep_insertion_order() {
        let a = span("a", 7, Some(8), None);
        let b = span("b", 7, Some(8), None);
        let out = sequence_diagram(&[a, b]);
        assert!(out.find("Host->>+a").unwrap() < out.find("Host->>+b").unwrap());
    }

    #[test]
    fn span_named_host_stays_distinct_from_the_synthetic_participant() {
        let a = span("Host", 0, Some(1), None);
        let out = sequence_diagram(&[a]);
        assert!(out.contains("    Host->>+Host_: Host\n"));
        assert!(out.contains("    Host_-->>-Host: return\n"));
    }

    #[test]
    fn message_text_is_single_line_without_separators() {
        let a = span("fetch;\nparse", 0, Some(1), None);
        let out = sequence_diagram(&[a]);
        assert!(out.contains(": fetch, parse\n"));
    }
}
