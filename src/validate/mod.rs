mod graph;
mod references;
mod weights;

use std::path::Path;

use thiserror::Error;

use crate::engine::steps::FlowChartSteps;
use crate::model::allocation::{AllocationTree, iter_allocations};
use crate::model::{FlowChart, PortfolioDefinition, Protocol};

pub use weights::WEIGHT_EPSILON;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Edge `{edge_id}` references unknown node `{node_id}`")]
    UnknownNode { edge_id: String, node_id: String },

    #[error("Flow chart contains a cycle")]
    CycleDetected,

    #[error("Self-loop on node `{node_id}`")]
    SelfLoop { node_id: String },

    #[error("Duplicate node ID `{node_id}`")]
    DuplicateNodeId { node_id: String },

    #[error("Duplicate edge ID `{edge_id}`")]
    DuplicateEdgeId { edge_id: String },

    #[error("Edge `{edge_id}` has ratio {ratio}, expected 0.0..=1.0")]
    InvalidRatio { edge_id: String, ratio: f64 },

    #[error("Linear flow has {actual} edges, expected {expected}")]
    EdgeCount { expected: usize, actual: usize },

    #[error("Edge `{edge_id}` does not link consecutive nodes")]
    BrokenChain { edge_id: String },

    #[error("Weight {weight} at `{location}` is outside 0.0..=1.0")]
    InvalidWeight { location: String, weight: f64 },

    #[error("Strategy weights sum to {total}, expected 1")]
    WeightSum { total: f64 },

    #[error("Flow for `{protocol}` ({action}): {source}")]
    ProtocolFlow {
        protocol: String,
        action: &'static str,
        #[source]
        source: Box<ValidationError>,
    },
}

fn collect(errors: Vec<ValidationError>) -> Result<(), Vec<ValidationError>> {
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Validate strategy weights, collecting all errors.
pub fn validate_strategy<P>(tree: &AllocationTree<P>) -> Result<(), Vec<ValidationError>> {
    collect(weights::check_strategy_weights(tree))
}

/// Validate a flow chart's structure, collecting all errors.
pub fn validate_flow_chart(chart: &FlowChart) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    errors.extend(references::check_references(chart));
    errors.extend(references::check_ratios(chart));
    errors.extend(graph::check_dag(chart));

    collect(errors)
}

/// Validate a per-protocol flow: a well-formed DAG that is also a single path.
pub fn validate_linear_flow(chart: &FlowChart) -> Result<(), Vec<ValidationError>> {
    let mut errors = validate_flow_chart(chart).err().unwrap_or_default();
    errors.extend(graph::check_linear(chart));
    collect(errors)
}

/// Check every flow each protocol in the strategy can produce.
pub fn validate_protocol_flows<P: Protocol>(tree: &AllocationTree<P>) -> Result<(), Vec<ValidationError>> {
    const PROBE_TOKEN: &str = "USDC";
    const PROBE_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

    let mut errors = Vec::new();
    for (_, _, allocation) in iter_allocations(tree) {
        let protocol = &allocation.protocol;
        let flows: [(&'static str, FlowChart); 5] = [
            ("zapIn", protocol.zap_in_flow_chart(PROBE_TOKEN, PROBE_ADDRESS, allocation.weight)),
            ("zapOut", protocol.zap_out_flow_chart(PROBE_TOKEN, PROBE_ADDRESS, allocation.weight)),
            ("claimAndSwap", protocol.claim_flow_chart(PROBE_TOKEN, PROBE_ADDRESS)),
            ("transfer", protocol.transfer_flow_chart(allocation.weight)),
            ("stake", protocol.stake_flow_chart()),
        ];
        for (action, chart) in flows {
            if let Err(found) = validate_linear_flow(&chart) {
                errors.extend(found.into_iter().map(|e| ValidationError::ProtocolFlow {
                    protocol: protocol.unique_id(),
                    action,
                    source: Box::new(e),
                }));
            }
        }
    }
    collect(errors)
}

/// Load and fully validate a portfolio definition from a JSON file.
pub fn load_and_validate(path: &Path) -> Result<PortfolioDefinition, Vec<ValidationError>> {
    let contents = std::fs::read_to_string(path).map_err(|e| vec![ValidationError::Io(e)])?;
    let portfolio: PortfolioDefinition =
        serde_json::from_str(&contents).map_err(|e| vec![ValidationError::Json(e)])?;
    validate(&portfolio)?;
    Ok(portfolio)
}

/// Validate a portfolio definition, collecting all errors.
pub fn validate(portfolio: &PortfolioDefinition) -> Result<(), Vec<ValidationError>> {
    let mut errors = validate_strategy(&portfolio.strategy).err().unwrap_or_default();
    errors.extend(validate_protocol_flows(&portfolio.strategy).err().unwrap_or_default());
    collect(errors)
}

/// CLI entry point for the `validate` subcommand.
pub fn run(path: &Path) -> anyhow::Result<()> {
    match load_and_validate(path) {
        Ok(portfolio) => {
            println!(
                "Portfolio '{}' is valid. {} positions on {} chains.",
                portfolio.name,
                iter_allocations(&portfolio.strategy).count(),
                crate::model::allocation::chains_of(&portfolio.strategy).len()
            );
            Ok(())
        }
        Err(errors) => {
            eprintln!("Validation failed with {} error(s):", errors.len());
            for (i, e) in errors.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, e);
            }
            std::process::exit(1);
        }
    }
}
