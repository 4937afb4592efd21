use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A unique identifier for a node within a flow chart.
pub type NodeId = String;

/// One discrete operation (swap, approve, deposit, ...) or a chain anchor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlowNode {
    pub id: NodeId,
    /// Human-readable label, e.g. "Swap USDC to WETH".
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub symbol_list: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img_src: Option<String>,
    /// Strategy category, set on chain anchor nodes only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl FlowNode {
    /// A bare node, before metadata enrichment.
    pub fn new(id: impl Into<NodeId>, name: impl Into<String>) -> Self {
        FlowNode {
            id: id.into(),
            name: name.into(),
            chain: None,
            symbol_list: Vec::new(),
            img_src: None,
            category: None,
        }
    }
}

/// Per-edge payload: the share of the action's value flowing through it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EdgeData {
    pub ratio: f64,
}

/// A directed edge between two flow nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FlowEdge {
    pub id: String,
    pub source: NodeId,
    pub target: NodeId,
    pub data: EdgeData,
}

impl FlowEdge {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
        ratio: f64,
    ) -> Self {
        FlowEdge {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            data: EdgeData { ratio },
        }
    }
}

/// Nodes plus edges, ready for rendering or execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FlowChart {
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
}

impl FlowChart {
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|n| n.id.clone()).collect()
    }

    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Nodes tagged with the given chain, in chart order.
    pub fn nodes_on_chain<'a>(&'a self, chain: &'a str) -> impl Iterator<Item = &'a FlowNode> {
        self.nodes
            .iter()
            .filter(move |n| n.chain.as_deref() == Some(chain))
    }

    /// Append another chart's nodes and edges.
    pub fn extend(&mut self, other: FlowChart) {
        self.nodes.extend(other.nodes);
        self.edges.extend(other.edges);
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
