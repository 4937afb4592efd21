//! Pure computations: chain ordering, amount thresholds, rebalance math and
//! flow chart generation. Nothing here performs I/O.

pub mod chain_order;
pub mod minimum;
pub mod portfolio_chart;
pub mod reinvest;
pub mod steps;
pub mod topo;

pub use chain_order::{next_chain, sort_chains};
pub use minimum::minimum_token_amount;
pub use portfolio_chart::{ActionName, ActionParams, FlowChartError, PortfolioFlowChartBuilder, RebalanceParams};
pub use reinvest::{apply_weight_diffs, rebalance_reinvest_usd_amount, weight_diff_sums, WeightDiffSums};
pub use steps::FlowChartSteps;
pub use topo::{chain_execution_order, execution_order};
