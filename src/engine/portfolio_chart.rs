use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AssetConfig;
use crate::engine::reinvest::weight_diff_sums;
use crate::engine::steps::FlowChartSteps;
use crate::model::chain::{ChainName, normalize_chain_name};
use crate::model::flowchart::{FlowChart, FlowEdge, FlowNode};
use crate::model::portfolio::{BalanceDict, PortfolioStrategy};
use crate::model::protocol::{Protocol, TokenMeta};

#[derive(Debug, Error)]
pub enum FlowChartError {
    #[error("Invalid action name {0}")]
    UnknownAction(String),

    #[error("Balance entry `{0}` does not match any protocol in the strategy")]
    UnknownProtocol(String),

    #[error("No middle token configured for chain `{0}`")]
    MissingMiddleToken(String),

    #[error("Rebalance action requires rebalance parameters")]
    MissingRebalanceParams,
}

/// Portfolio-level action names, as the frontend spells them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum ActionName {
    ZapIn,
    ZapOut,
    ClaimAndSwap,
    Transfer,
    Stake,
    Rebalance,
    CrossChainRebalance,
    LocalRebalance,
}

impl ActionName {
    pub fn is_rebalance(self) -> bool {
        matches!(
            self,
            ActionName::Rebalance | ActionName::CrossChainRebalance | ActionName::LocalRebalance
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionName::ZapIn => "zapIn",
            ActionName::ZapOut => "zapOut",
            ActionName::ClaimAndSwap => "claimAndSwap",
            ActionName::Transfer => "transfer",
            ActionName::Stake => "stake",
            ActionName::Rebalance => "rebalance",
            ActionName::CrossChainRebalance => "crossChainRebalance",
            ActionName::LocalRebalance => "localRebalance",
        }
    }
}

impl FromStr for ActionName {
    type Err = FlowChartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "zapIn" => Ok(ActionName::ZapIn),
            "zapOut" => Ok(ActionName::ZapOut),
            "claimAndSwap" => Ok(ActionName::ClaimAndSwap),
            "transfer" => Ok(ActionName::Transfer),
            "stake" => Ok(ActionName::Stake),
            "rebalance" => Ok(ActionName::Rebalance),
            "crossChainRebalance" => Ok(ActionName::CrossChainRebalance),
            "localRebalance" => Ok(ActionName::LocalRebalance),
            other => Err(FlowChartError::UnknownAction(other.to_string())),
        }
    }
}

impl std::fmt::Display for ActionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token parameters for the standard actions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActionParams {
    #[serde(default)]
    pub token_in_symbol: String,
    #[serde(default)]
    pub token_in_address: String,
    #[serde(default)]
    pub output_token: String,
    #[serde(default)]
    pub output_token_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rebalance: Option<RebalanceParams>,
}

/// Inputs for rebalance charts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RebalanceParams {
    /// Protocol unique id → annotated balance (see `apply_weight_diffs`).
    pub balances: BalanceDict,
    /// Chains on which over-weight positions are zapped out.
    pub zap_out_chains: Vec<ChainName>,
    /// Intermediate token per chain that zap-outs convert into.
    pub middle_tokens: HashMap<ChainName, TokenMeta>,
    /// The wallet's chain, in display form ("Arbitrum One" is fine).
    pub current_chain: String,
}

/// Stitches per-protocol step graphs into one portfolio chart rooted at one
/// node per chain.
pub struct PortfolioFlowChartBuilder<'a, S: PortfolioStrategy> {
    portfolio: &'a S,
    assets: AssetConfig,
}

impl<'a, S: PortfolioStrategy> PortfolioFlowChartBuilder<'a, S> {
    pub fn new(portfolio: &'a S, assets: AssetConfig) -> Self {
        Self { portfolio, assets }
    }

    pub fn build(&self, action: ActionName, params: &ActionParams) -> Result<FlowChart, FlowChartError> {
        if action.is_rebalance() {
            let rebalance = params
                .rebalance
                .as_ref()
                .ok_or(FlowChartError::MissingRebalanceParams)?;
            self.build_rebalance(action, params, rebalance)
        } else {
            Ok(self.build_standard(action, params))
        }
    }

    fn chain_node(&self, chain: &str, name: String) -> FlowNode {
        let mut node = FlowNode::new(chain, name);
        node.chain = Some(chain.to_string());
        node.img_src = Some(self.assets.chain_image(chain));
        node
    }

    fn build_standard(&self, action: ActionName, params: &ActionParams) -> FlowChart {
        let mut chain_nodes: Vec<FlowNode> = Vec::new();
        let mut flow = FlowChart::default();

        for (category, by_chain) in self.portfolio.strategy() {
            for (chain, allocations) in by_chain {
                if !chain_nodes.iter().any(|n| &n.id == chain) {
                    let mut node = self.chain_node(chain, action.to_string());
                    node.category = Some(category.clone());
                    chain_nodes.push(node);
                }

                for allocation in allocations {
                    if allocation.weight == 0.0 {
                        continue;
                    }
                    let protocol = &allocation.protocol;
                    let steps = match action {
                        ActionName::ZapIn => protocol.zap_in_flow_chart(
                            &params.token_in_symbol,
                            &params.token_in_address,
                            allocation.weight,
                        ),
                        ActionName::Stake => protocol.stake_flow_chart(),
                        ActionName::Transfer => protocol.transfer_flow_chart(allocation.weight),
                        ActionName::ZapOut => protocol.zap_out_flow_chart(
                            &params.output_token,
                            &params.output_token_address,
                            allocation.weight,
                        ),
                        ActionName::ClaimAndSwap => {
                            protocol.claim_flow_chart(&params.output_token, &params.output_token_address)
                        }
                        _ => unreachable!("rebalance actions are built separately"),
                    };
                    let entry = FlowEdge::new(
                        format!("edge-{chain}-{}", protocol.unique_id()),
                        chain.as_str(),
                        &steps.nodes[0].id,
                        allocation.weight,
                    );
                    flow.extend(steps);
                    flow.edges.push(entry);
                }
            }
        }

        chain_nodes.extend(flow.nodes);
        FlowChart {
            nodes: chain_nodes,
            edges: flow.edges,
        }
    }

    fn build_rebalance(
        &self,
        action: ActionName,
        params: &ActionParams,
        rebalance: &RebalanceParams,
    ) -> Result<FlowChart, FlowChartError> {
        let threshold = self.portfolio.rebalance_threshold();
        let sums = weight_diff_sums(&rebalance.balances, threshold);
        let current_chain = normalize_chain_name(&rebalance.current_chain);

        let mut seen: HashSet<&str> = HashSet::new();
        let mut chain_nodes: Vec<FlowNode> = Vec::new();
        let mut flow = FlowChart::default();
        let mut last_end_node: Option<String> = None;

        // Zap out of over-weight positions into each chain's middle token.
        for (key, balance) in &rebalance.balances {
            let chain = balance.chain.as_str();
            if !rebalance.zap_out_chains.iter().any(|c| c == chain) || balance.weight_diff <= threshold {
                continue;
            }
            let end_id = end_of_zap_out_id(chain);
            if seen.insert(chain) {
                chain_nodes.push(self.chain_node(chain, action.to_string()));
                let mut end = self.chain_node(chain, "Start Zapping In".into());
                end.id = end_id.clone();
                flow.nodes.push(end);
                last_end_node = Some(end_id.clone());
            }
            let middle = rebalance
                .middle_tokens
                .get(chain)
                .ok_or_else(|| FlowChartError::MissingMiddleToken(chain.to_string()))?;
            let protocol = self
                .portfolio
                .find_protocol(key)
                .ok_or_else(|| FlowChartError::UnknownProtocol(key.clone()))?;

            let ratio = balance.weight_diff / sums.positive;
            let steps = protocol.zap_out_flow_chart(&middle.symbol, &middle.address, ratio);
            let first = steps.nodes[0].id.clone();
            let last = steps.nodes[steps.nodes.len() - 1].id.clone();
            flow.extend(steps);
            flow.edges.push(FlowEdge::new(
                format!("edge-{chain}-{}", protocol.unique_id()),
                chain,
                first,
                ratio,
            ));
            flow.edges.push(FlowEdge::new(format!("edge-{last}-endOfZapOut"), last, &end_id, ratio));
        }

        // Funds leave from the current chain's end-of-zap-out node when it exists.
        let origin = if seen.contains(current_chain.as_str()) {
            Some(end_of_zap_out_id(&current_chain))
        } else {
            last_end_node
        };

        // Zap into under-weight positions.
        for (key, balance) in &rebalance.balances {
            if balance.weight_diff >= 0.0 {
                continue;
            }
            let chain = balance.chain.as_str();
            let protocol = self
                .portfolio
                .find_protocol(key)
                .ok_or_else(|| FlowChartError::UnknownProtocol(key.clone()))?;
            let ratio = -balance.weight_diff / sums.negative;
            let steps = protocol.zap_in_flow_chart(&params.token_in_symbol, &params.token_in_address, ratio);

            if seen.insert(chain) {
                chain_nodes.push(self.chain_node(chain, format!("Bridge to {chain}")));
                if let Some(origin) = &origin {
                    flow.edges.push(FlowEdge::new(format!("edge-{origin}-{chain}"), origin, chain, ratio));
                }
            }

            let source = match &origin {
                Some(origin) if current_chain == chain => origin.clone(),
                _ => chain.to_string(),
            };
            let first = steps.nodes[0].id.clone();
            flow.edges.push(FlowEdge::new(
                format!("edge-{source}-{}", protocol.unique_id()),
                source,
                first,
                ratio,
            ));
            flow.extend(steps);
        }

        chain_nodes.extend(flow.nodes);
        Ok(FlowChart {
            nodes: chain_nodes,
            edges: flow.edges,
        })
    }
}

fn end_of_zap_out_id(chain: &str) -> String {
    format!("endOfZapOutOn{chain}")
}

/// Step nodes carry a protocol unique id ("chain/name/version/symbols") in
/// their id; chain anchors and end-of-zap-out markers do not.
pub fn is_step_node(node: &FlowNode) -> bool {
    node.id.contains('/')
}

/// Chains that have at least one step node, in chart order.
pub fn step_chains(chart: &FlowChart) -> Vec<ChainName> {
    let mut chains: Vec<ChainName> = Vec::new();
    for node in chart.nodes.iter().filter(|n| is_step_node(n)) {
        if let Some(chain) = &node.chain {
            if !chains.contains(chain) {
                chains.push(chain.clone());
            }
        }
    }
    chains
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_name_round_trip() {
        for name in ["zapIn", "zapOut", "claimAndSwap", "transfer", "stake", "localRebalance"] {
            assert_eq!(name.parse::<ActionName>().unwrap().as_str(), name);
        }
        assert!(matches!(
            "bogus".parse::<ActionName>(),
            Err(FlowChartError::UnknownAction(_))
        ));
        assert!(ActionName::CrossChainRebalance.is_rebalance());
        assert!(!ActionName::ZapIn.is_rebalance());
    }
}
