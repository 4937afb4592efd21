use std::collections::HashSet;

use crate::model::{FlowChart, FlowEdge};

use super::ValidationError;

/// Node and edge ids are unique, and every edge endpoint is a node.
pub fn check_references(chart: &FlowChart) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let mut nodes: HashSet<&str> = HashSet::with_capacity(chart.nodes.len());
    for node in &chart.nodes {
        if !nodes.insert(&node.id) {
            errors.push(ValidationError::DuplicateNodeId {
                node_id: node.id.clone(),
            });
        }
    }

    let mut edges: HashSet<&str> = HashSet::with_capacity(chart.edges.len());
    for edge in &chart.edges {
        if !edges.insert(&edge.id) {
            errors.push(ValidationError::DuplicateEdgeId {
                edge_id: edge.id.clone(),
            });
        }
        errors.extend(
            dangling_ends(edge, &nodes).map(|node_id| ValidationError::UnknownNode {
                edge_id: edge.id.clone(),
                node_id: node_id.to_string(),
            }),
        );
    }

    errors
}

fn dangling_ends<'a>(edge: &'a FlowEdge, nodes: &'a HashSet<&str>) -> impl Iterator<Item = &'a str> {
    [edge.source.as_str(), edge.target.as_str()]
        .into_iter()
        .filter(|end| !nodes.contains(end))
}

/// Edge ratios are fractions of the flow entering the edge's source.
pub fn check_ratios(chart: &FlowChart) -> Vec<ValidationError> {
    chart
        .edges
        .iter()
        .filter(|e| !(0.0..=1.0).contains(&e.data.ratio))
        .map(|e| ValidationError::InvalidRatio {
            edge_id: e.id.clone(),
            ratio: e.data.ratio,
        })
        .collect()
}
