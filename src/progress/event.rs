use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::NodeId;

/// The four event channels listeners can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    NodeUpdate,
    TradingLossUpdate,
    EdgeUpdate,
    BatchUpdate,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::NodeUpdate => "NODE_UPDATE",
            EventKind::TradingLossUpdate => "TRADING_LOSS_UPDATE",
            EventKind::EdgeUpdate => "EDGE_UPDATE",
            EventKind::BatchUpdate => "BATCH_UPDATE",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    #[default]
    Pending,
    Active,
}

/// One node's new status, as carried by `NODE_UPDATE` and inside batches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeUpdate {
    pub node_id: NodeId,
    pub status: NodeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trading_loss: Option<f64>,
}

impl NodeUpdate {
    pub fn active(node_id: impl Into<NodeId>, trading_loss: Option<f64>) -> Self {
        NodeUpdate {
            node_id: node_id.into(),
            status: NodeStatus::Active,
            trading_loss,
        }
    }
}

/// Events flowing through the coordinator, both queued and emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowEvent {
    NodeUpdate(NodeUpdate),
    #[serde(rename_all = "camelCase")]
    TradingLossUpdate { node_id: NodeId, trading_loss: f64 },
    #[serde(rename_all = "camelCase")]
    EdgeUpdate { edge_id: String, active: bool },
    /// Applied entry by entry, in order.
    BatchUpdate { status: Vec<NodeUpdate> },
}

impl FlowEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            FlowEvent::NodeUpdate(_) => EventKind::NodeUpdate,
            FlowEvent::TradingLossUpdate { .. } => EventKind::TradingLossUpdate,
            FlowEvent::EdgeUpdate { .. } => EventKind::EdgeUpdate,
            FlowEvent::BatchUpdate { .. } => EventKind::BatchUpdate,
        }
    }
}

/// Stored per-node state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeState {
    pub status: NodeStatus,
    pub timestamp: DateTime<Utc>,
    pub trading_loss: Option<f64>,
}

/// What `get_node_state` reports; unknown nodes read as pending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSnapshot {
    pub status: NodeStatus,
    pub trading_loss: Option<f64>,
}
