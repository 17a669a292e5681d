//! Static topology inference from unexecuted program source.
//!
//! Before a program has ever run there is no span list to render, but the
//! source usually declares its intended graph through the host topology
//! calls. This module regex-scans the raw text for those calls and builds a
//! best-effort flowchart out of them. It is explicitly not a parser: calls
//! assembled through string manipulation, commented-out calls and calls
//! split across unusual formatting can be missed or misread. The result is
//! a preview, never an execution record.

use indexmap::IndexSet;
use once_cell::sync::Lazy;
use regex::Regex;

/// Identifier of the synthetic routing node emitted for branch calls.
const DECISION: &str = "decision";

/// Maximum label line width before wrapping with `<br>`.
const LABEL_WRAP: usize = 18;

static NODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"graph_node\(\s*"([^"]+)"\s*\)"#).unwrap()
});

static EDGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"graph_edge\(\s*(?:"([^"]+)"|(START|END))\s*,\s*(?:"([^"]+)"|(START|END))\s*\)"#,
    )
    .unwrap()
});

static BRANCH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"graph_branch\(\s*"([^"]+)"\s*,\s*([A-Za-z_][A-Za-z0-9_]*)\s*(?:,\s*#\{([^}]*)\})?\s*\)"#,
    )
    .unwrap()
});

static MAPPING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""?([A-Za-z0-9_ ]+)"?\s*:\s*(?:"([^"]+)"|(START|END))"#).unwrap()
});

/// Scan program source for topology declarations and render them as a
/// Mermaid flowchart.
///
/// Nodes and edges appear in source-discovery order. When nothing is
/// recognized the result is a single placeholder node, so callers can
/// always hand the output to a renderer.
pub fn infer_flowchart(source: &str) -> String {
    // Collapse whitespace runs so calls split across lines still match.
    let source = source.split_whitespace().collect::<Vec<_>>().join(" ");
    let source = source.as_str();

    let mut nodes: IndexSet<String> = IndexSet::new();
    let mut edges: Vec<String> = Vec::new();
    let mut uses_start = false;
    let mut uses_end = false;
    let mut uses_decision = false;

    for caps in NODE_RE.captures_iter(source) {
        if let Some(name) = caps.get(1) {
            register(name.as_str(), &mut nodes, &mut uses_start, &mut uses_end);
        }
    }

    for caps in EDGE_RE.captures_iter(source) {
        let Some(from) = endpoint(&caps, 1, 2) else {
            continue;
        };
        let Some(to) = endpoint(&caps, 3, 4) else {
            continue;
        };
        register(&from, &mut nodes, &mut uses_start, &mut uses_end);
        register(&to, &mut nodes, &mut uses_start, &mut uses_end);
        edges.push(format!("    {} --> {}", from, to));
    }

    for caps in BRANCH_RE.captures_iter(source) {
        let Some(from) = caps.get(1).map(|m| m.as_str().to_string()) else {
            continue;
        };
        register(&from, &mut nodes, &mut uses_start, &mut uses_end);
        let router = caps
            .get(2)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        match caps.get(3) {
            Some(mapping) => {
                for entry in MAPPING_RE.captures_iter(mapping.as_str()) {
                    let Some(label) = entry.get(1).map(|m| m.as_str().trim().to_string()) else {
                        continue;
                    };
                    let Some(target) = endpoint(&entry, 2, 3) else {
                        continue;
                    };
                    register(&target, &mut nodes, &mut uses_start, &mut uses_end);
                    edges.push(format!(
                        "    {} -->|{}| {}",
                        from,
                        wrap_label(&label),
                        target
                    ));
                }
            }
            None => {
                uses_decision = true;
                edges.push(format!(
                    "    {} -->|{}| {}",
                    from,
                    wrap_label(&router),
                    DECISION
                ));
            }
        }
    }

    if nodes.is_empty() && edges.is_empty() && !uses_start && !uses_end {
        return "graph TD\n    empty[\"No graph structure detected\"]\n".to_string();
    }

    let mut out = String::from("graph TD\n");
    for node in &nodes {
        out.push_str(&format!("    {}\n", node));
    }
    for edge in &edges {
        out.push_str(edge);
        out.push('\n');
    }
    if uses_start {
        out.push_str("    START([START])\n");
    }
    if uses_end {
        out.push_str("    END([END])\n");
    }
    if uses_decision {
        out.push_str(&format!("    {}{{{}}}\n", DECISION, DECISION));
    }
    out
}

/// Quoted-or-terminal capture pair: group `quoted` holds a quoted name,
/// group `terminal` a bare `START`/`END` keyword.
fn endpoint(caps: &regex::Captures<'_>, quoted: usize, terminal: usize) -> Option<String> {
    caps.get(quoted)
        .or_else(|| caps.get(terminal))
        .map(|m| m.as_str().to_string())
}

/// Record a discovered node id: terminals flip their shape-declaration
/// flags, ordinary names join the node set.
fn register(name: &str, nodes: &mut IndexSet<String>, uses_start: &mut bool, uses_end: &mut bool) {
    match name {
        "START" => *uses_start = true,
        "END" => *uses_end = true,
        _ => {
            nodes.insert(name.to_string());
        }
    }
}

/// Word-wrap an edge label onto `<br>`-joined lines so long branch labels
/// don't stretch the rendered diagram.
fn wrap_label(label: &str) -> String {
    let collapsed = label.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    for word in collapsed.split(' ') {
        if current.is_empty() {
            current = word.to_string();
        } else if current.len() + 1 + word.len() <= LABEL_WRAP {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current = word.to_string();
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines.join("<br>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn no_declarations_yields_placeholder() {
        let out = infer_flowchart("let x = 1 + 1;");
        assert_eq!(out, "graph TD\n    empty[\"No graph structure detected\"]\n");
    }

    #[test]
    fn nodes_appear_in_discovery_order() {
        let src = r#"
            graph_node("fetch");
            graph_node("parse");
            graph_node("fetch");
        "#;
        let out = infer_flowchart(src);
        let fetch = out.find("    fetch\n").unwrap();
        let parse = out.find("    parse\n").unwrap();
        assert!(fetch < parse);
        assert_eq!(out.matches("    fetch\n").count(), 1);
    }

    #[test]
    fn quoted_edges_render_as_arrows() {
        let src = r#"graph_edge("fetch", "parse");"#;
        let out = infer_flowchart(src);
        assert!(out.contains("    fetch --> parse\n"));
    }

    #[test]
    fn bare_terminals_get_shape_declarations() {
        let src = r#"
            graph_edge(START, "fetch");
            graph_edge("fetch", END);
        "#;
        let out = infer_flowchart(src);
        assert!(out.contains("    START --> fetch\n"));
        assert!(out.contains("    fetch --> END\n"));
        assert!(out.contains("    START([START])\n"));
        assert!(out.contains("    END([END])\n"));
    }

    #[test]
    fn node_declared_terminal_gets_a_shape_declaration() {
        let src = r#"
            graph_node("START");
            graph_node("fetch");
            graph_edge("fetch", "parse");
        "#;
        let out = infer_flowchart(src);
        assert!(out.contains("    START([START])\n"));
        // The terminal must not also appear as a plain node line.
        assert!(!out.contains("graph TD\n    START\n"));
        assert_eq!(out.matches("START").count(), 2);
        assert!(out.contains("    fetch\n"));
    }

    #[test]
    fn terminals_are_not_declared_when_unused() {
        let out = infer_flowchart(r#"graph_edge("a", "b");"#);
        assert!(!out.contains("START(["));
        assert!(!out.contains("END(["));
    }

    #[test]
    fn branch_with_mapping_emits_labeled_edges() {
        let src = r#"
            graph_branch("triage", route_ticket, #{
                "refund": "handle_refund",
                escalate: END
            });
        "#;
        let out = infer_flowchart(src);
        assert!(out.contains("    triage -->|refund| handle_refund\n"));
        assert!(out.contains("    triage -->|escalate| END\n"));
        assert!(out.contains("    END([END])\n"));
        assert!(!out.contains(DECISION));
    }

    #[test]
    fn branch_without_mapping_routes_through_decision_node() {
        let src = r#"graph_branch("triage", route_ticket);"#;
        let out = infer_flowchart(src);
        assert!(out.contains("    triage -->|route_ticket| decision\n"));
        assert!(out.contains("    decision{decision}\n"));
    }

    #[test]
    fn long_labels_wrap_with_br() {
        let src = r#"
            graph_branch("triage", route, #{
                "a very long branch label indeed": "target"
            });
        "#;
        let out = infer_flowchart(src);
        assert!(out.contains("|a very long branch<br>label indeed|"));
    }

    #[test]
    fn declarations_mixed_into_real_source_are_found() {
        let src = r#"
            // build the workflow
            graph_node("plan");
            if ready {
                graph_edge(START, "plan");
            }
            graph_edge("plan", END);
        "#;
        let out = infer_flowchart(src);
        assert!(out.contains("    plan\n"));
        assert!(out.contains("    START --> plan\n"));
        assert!(out.contains("    plan --> END\n"));
    }
}
