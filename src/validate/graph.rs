use petgraph::algo::is_cyclic_directed;

use crate::engine::topo::flow_graph;
use crate::model::FlowChart;

use super::ValidationError;

/// Self-loops are reported per node; any other cycle once for the chart.
pub fn check_dag(chart: &FlowChart) -> Vec<ValidationError> {
    let mut errors: Vec<ValidationError> = chart
        .edges
        .iter()
        .filter(|e| e.source == e.target)
        .map(|e| ValidationError::SelfLoop {
            node_id: e.source.clone(),
        })
        .collect();

    if is_cyclic_directed(&flow_graph(chart)) {
        errors.push(ValidationError::CycleDetected);
    }
    errors
}

/// A per-protocol flow is a single path: `n` nodes joined by `n - 1` edges,
/// edge `i` running from node `i` to node `i + 1`.
pub fn check_linear(chart: &FlowChart) -> Vec<ValidationError> {
    let expected = chart.nodes.len().saturating_sub(1);
    if chart.edges.len() != expected {
        return vec![ValidationError::EdgeCount {
            expected,
            actual: chart.edges.len(),
        }];
    }

    chart
        .edges
        .iter()
        .zip(chart.nodes.windows(2))
        .filter(|(edge, pair)| edge.source != pair[0].id || edge.target != pair[1].id)
        .map(|(edge, _)| ValidationError::BrokenChain {
            edge_id: edge.id.clone(),
        })
        .collect()
}
