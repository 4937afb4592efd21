use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Topo;

use crate::model::flowchart::{FlowChart, FlowNode, NodeId};

/// Chart as a petgraph DiGraph, nodes weighted by the chart node and edges
/// by their ratio.
///
/// Edges that reference unknown nodes are dropped (validation reports them),
/// as are self-loops. A repeated node id keeps its first node.
pub(crate) fn flow_graph(chart: &FlowChart) -> DiGraph<&FlowNode, f64> {
    let mut graph = DiGraph::<&FlowNode, f64>::new();
    let mut node_indices: HashMap<&str, NodeIndex> = HashMap::new();

    for node in &chart.nodes {
        node_indices
            .entry(node.id.as_str())
            .or_insert_with(|| graph.add_node(node));
    }

    for edge in chart.edges.iter().filter(|e| e.source != e.target) {
        if let (Some(&from), Some(&to)) = (
            node_indices.get(edge.source.as_str()),
            node_indices.get(edge.target.as_str()),
        ) {
            graph.add_edge(from, to, edge.data.ratio);
        }
    }
    graph
}

/// Topological execution order of a flow chart's nodes.
///
/// Nodes on a cycle never become ready and are left out of the order.
pub fn execution_order(chart: &FlowChart) -> Vec<NodeId> {
    let graph = flow_graph(chart);
    let mut topo = Topo::new(&graph);
    let mut order = Vec::new();
    while let Some(idx) = topo.next(&graph) {
        order.push(graph[idx].id.clone());
    }
    order
}

/// [`execution_order`] restricted to the nodes tagged with `chain`.
pub fn chain_execution_order(chart: &FlowChart, chain: &str) -> Vec<NodeId> {
    execution_order(chart)
        .into_iter()
        .filter(|id| chart.node(id).is_some_and(|n| n.chain.as_deref() == Some(chain)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::flowchart::{FlowEdge, FlowNode};

    #[test]
    fn test_order_follows_edges() {
        let chart = FlowChart {
            nodes: vec![
                FlowNode::new("c", "C"),
                FlowNode::new("a", "A"),
                FlowNode::new("b", "B"),
            ],
            edges: vec![
                FlowEdge::new("e0", "a", "b", 1.0),
                FlowEdge::new("e1", "b", "c", 1.0),
                FlowEdge::new("e2", "a", "missing", 1.0),
            ],
        };
        assert_eq!(execution_order(&chart), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_chain_filter() {
        let mut a = FlowNode::new("a", "A");
        a.chain = Some("base".into());
        let mut b = FlowNode::new("b", "B");
        b.chain = Some("arbitrum".into());
        let chart = FlowChart {
            nodes: vec![a, b],
            edges: vec![FlowEdge::new("e0", "a", "b", 1.0)],
        };
        assert_eq!(chain_execution_order(&chart, "arbitrum"), vec!["b"]);
    }
}
