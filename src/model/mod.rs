pub mod allocation;
pub mod chain;
pub mod flowchart;
pub mod portfolio;
pub mod protocol;

pub use allocation::{AllocationTree, ProtocolAllocation};
pub use chain::{Chain, ChainName, ChainStatus};
pub use flowchart::{FlowChart, FlowEdge, FlowNode, NodeId};
pub use portfolio::{PortfolioDefinition, PortfolioStrategy};
pub use protocol::{Protocol, ProtocolDescriptor, ProtocolMode, TokenMeta};
