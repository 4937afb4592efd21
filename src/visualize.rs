use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use petgraph::Direction;
use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{EdgeRef, Topo};

use crate::engine::portfolio_chart::is_step_node;
use crate::engine::topo::flow_graph;
use crate::model::{FlowChart, FlowNode};

/// Render a flow chart as `json`, `ascii` or `dot`, to `output` or stdout.
pub fn render(chart: &FlowChart, title: &str, format: &str, output: Option<&Path>) -> anyhow::Result<()> {
    let text = match format {
        "json" => format!("{}\n", serde_json::to_string_pretty(chart)?),
        "ascii" => render_ascii(chart, title),
        "dot" => render_dot(chart, title),
        other => anyhow::bail!("unknown chart format '{other}' (expected json, ascii or dot)"),
    };
    match output {
        Some(path) => {
            std::fs::write(path, text)?;
            eprintln!("Written to {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}

/// Graphviz source, left to right, edges labelled with their ratio.
pub fn render_dot(chart: &FlowChart, title: &str) -> String {
    let graph = flow_graph(chart);
    let body = Dot::with_attr_getters(
        &graph,
        &[Config::NodeNoLabel, Config::EdgeNoLabel, Config::GraphContentOnly],
        &|_, edge| format!("label = {:?}", percent(*edge.weight())),
        &|_, (_, node)| node_attrs(node),
    );
    format!("digraph flowchart {{\n    rankdir = LR\n    label = {title:?}\n    node [fontsize = 10]\n{body:?}}}\n")
}

fn node_attrs(node: &FlowNode) -> String {
    let label = match (&node.chain, node.symbol_list.is_empty()) {
        (Some(chain), false) => format!("{}\n{} on {chain}", node.name, node.symbol_list.join("-")),
        _ => node.name.clone(),
    };
    let shape = if !is_step_node(node) {
        "house"
    } else if node.id.ends_with("-swap") {
        "parallelogram"
    } else {
        "box"
    };
    format!("label = {label:?} shape = {shape} tooltip = {:?}", node.id)
}

fn percent(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

/// Plain-text rendering, one block per depth. A node's depth is the length
/// of the longest path reaching it; each node lists its incoming edges.
pub fn render_ascii(chart: &FlowChart, title: &str) -> String {
    let graph = flow_graph(chart);

    let mut out = String::new();
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "{}", "=".repeat(title.chars().count().max(8)));

    for (depth, layer) in depth_layers(&graph) {
        let _ = writeln!(out, "\n[{depth}]");
        for idx in layer {
            let node = graph[idx];
            let chain = node.chain.as_deref().map(|c| format!(" ({c})")).unwrap_or_default();
            let _ = writeln!(out, "  {}{chain}", node.name);
            for edge in graph.edges_directed(idx, Direction::Incoming) {
                let _ = writeln!(out, "      <- {} {}", graph[edge.source()].name, percent(*edge.weight()));
            }
        }
    }

    let _ = writeln!(out, "\n{} nodes, {} edges", chart.nodes.len(), chart.edges.len());
    out
}

fn depth_layers(graph: &DiGraph<&FlowNode, f64>) -> BTreeMap<usize, Vec<NodeIndex>> {
    let mut depth = vec![0usize; graph.node_count()];
    let mut layers: BTreeMap<usize, Vec<NodeIndex>> = BTreeMap::new();
    let mut topo = Topo::new(graph);
    while let Some(idx) = topo.next(graph) {
        for next in graph.neighbors_directed(idx, Direction::Outgoing) {
            depth[next.index()] = depth[next.index()].max(depth[idx.index()] + 1);
        }
        layers.entry(depth[idx.index()]).or_default().push(idx);
    }
    layers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FlowEdge;

    fn chart() -> FlowChart {
        FlowChart {
            nodes: vec![
                FlowNode::new("base", "zapIn"),
                FlowNode::new("base/aave/v3/usdc-approve", "Approve"),
                FlowNode::new("base/aave/v3/usdc-deposit", "Deposit \"USDC\""),
            ],
            edges: vec![
                FlowEdge::new("e0", "base", "base/aave/v3/usdc-approve", 0.5),
                FlowEdge::new("e1", "base/aave/v3/usdc-approve", "base/aave/v3/usdc-deposit", 0.5),
            ],
        }
    }

    #[test]
    fn test_dot_quotes_labels_and_ratios() {
        let dot = render_dot(&chart(), "demo");
        assert!(dot.starts_with("digraph flowchart {"));
        assert!(dot.contains("label = \"demo\""));
        assert!(dot.contains("label = \"zapIn\" shape = house"));
        assert!(dot.contains("Deposit \\\"USDC\\\""));
        assert!(dot.contains("label = \"50.0%\""));
        assert!(dot.trim_end().ends_with('}'));
    }

    #[test]
    fn test_ascii_groups_by_depth() {
        let text = render_ascii(&chart(), "demo");
        let approve = text.find("[1]\n  Approve").expect("depth 1");
        let deposit = text.find("[2]\n  Deposit \"USDC\"").expect("depth 2");
        assert!(approve < deposit);
        assert!(text.contains("<- Approve 50.0%"));
        assert!(text.contains("3 nodes, 2 edges"));
    }
}
