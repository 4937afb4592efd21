//! Per-protocol step graphs.
//!
//! Every [`Protocol`] gets a linear chain of operation nodes for each action
//! (zap in, zap out, claim, transfer, stake). Node ids embed the protocol's
//! `unique_id()` so flows from different positions never collide when they are
//! merged into one portfolio chart.

use crate::model::flowchart::{FlowChart, FlowEdge, FlowNode};
use crate::model::protocol::{Protocol, ProtocolMode, TokenMeta};

/// Placeholder decimals passed to zap-in token resolution.
const INPUT_TOKEN_DECIMALS: u8 = 18;

/// Flow chart generation, available on every protocol.
pub trait FlowChartSteps: Protocol {
    /// Swap(s) into the deposit token(s), then approve, deposit, stake.
    fn zap_in_flow_chart(&self, input_token: &str, token_in_address: &str, weight: f64) -> FlowChart {
        let mut nodes = Vec::new();
        match self.mode() {
            ProtocolMode::Single => {
                let best = self.best_token_to_zap_in(input_token, token_in_address, INPUT_TOKEN_DECIMALS);
                if !best.same_address(token_in_address) {
                    nodes.push(self.zap_in_swap_node(input_token, &best));
                }
            }
            ProtocolMode::Lp => {
                for best in self.lp_tokens_to_zap_in() {
                    if !best.same_address(token_in_address) {
                        nodes.push(self.zap_in_swap_node(input_token, &best));
                    }
                }
            }
        }
        let uid = self.unique_id();
        nodes.push(FlowNode::new(format!("{uid}-approve"), "Approve"));
        nodes.push(FlowNode::new(
            format!("{uid}-deposit"),
            format!("Deposit {}", self.symbol_list().join("-")),
        ));
        nodes.push(FlowNode::new(format!("{uid}-stake"), "stake"));
        self.finish(nodes, weight)
    }

    /// Claim rewards, then swap each reward leg into the output token.
    /// Claims are never split, so every edge carries ratio 1.
    fn claim_flow_chart(&self, output_token: &str, output_token_address: &str) -> FlowChart {
        let mut nodes = vec![FlowNode::new(format!("{}-claim", self.unique_id()), "Claim Rewards")];
        self.push_zap_out_swaps(&mut nodes, output_token, output_token_address);
        self.finish(nodes, 1.0)
    }

    /// Unstake, claim, withdraw, then swap into the output token.
    fn zap_out_flow_chart(&self, output_token: &str, output_token_address: &str, weight: f64) -> FlowChart {
        let uid = self.unique_id();
        let mut nodes = vec![
            FlowNode::new(format!("{uid}-unstake"), "Unstake"),
            FlowNode::new(format!("{uid}-claim"), "Claim Rewards"),
            FlowNode::new(
                format!("{uid}-withdraw"),
                format!("Withdraw {}", self.symbol_list().join("-")),
            ),
        ];
        self.push_zap_out_swaps(&mut nodes, output_token, output_token_address);
        self.finish(nodes, weight)
    }

    fn transfer_flow_chart(&self, weight: f64) -> FlowChart {
        let uid = self.unique_id();
        let nodes = vec![
            FlowNode::new(format!("{uid}-unstake"), "Unstake"),
            FlowNode::new(format!("{uid}-transfer"), "Transfer"),
        ];
        self.finish(nodes, weight)
    }

    fn stake_flow_chart(&self) -> FlowChart {
        let nodes = vec![FlowNode::new(format!("{}-stake", self.unique_id()), "stake")];
        self.finish(nodes, 1.0)
    }

    // ── Shared pieces ──────────────────────────────────────────────

    fn zap_in_swap_node(&self, input_token: &str, best: &TokenMeta) -> FlowNode {
        FlowNode::new(
            format!("{}-{}-{}-swap", self.unique_id(), input_token, best.symbol),
            format!("Swap {} to {}", input_token, best.symbol),
        )
    }

    fn zap_out_swap_node(&self, best: &TokenMeta, output_token: &str) -> FlowNode {
        FlowNode::new(
            format!("{}-{}-{}-swap", self.unique_id(), best.symbol, output_token),
            format!("Swap {} to {}", best.symbol, output_token),
        )
    }

    /// Trailing swaps shared by claim and zap-out.
    fn push_zap_out_swaps(&self, nodes: &mut Vec<FlowNode>, output_token: &str, output_token_address: &str) {
        match self.mode() {
            ProtocolMode::Single => {
                let best = self.best_token_to_zap_out();
                if !best.same_address(output_token_address) {
                    nodes.push(self.zap_out_swap_node(&best, output_token));
                }
            }
            ProtocolMode::Lp => {
                for best in self.lp_tokens_to_zap_out() {
                    if !best.same_address(output_token_address) {
                        nodes.push(self.zap_out_swap_node(&best, output_token));
                    }
                }
            }
        }
    }

    /// Link consecutive nodes, then stamp chain/symbol/image metadata.
    fn finish(&self, mut nodes: Vec<FlowNode>, ratio: f64) -> FlowChart {
        let uid = self.unique_id();
        let edges = nodes
            .windows(2)
            .enumerate()
            .map(|(i, pair)| FlowEdge::new(format!("edge-{uid}-{i}"), &pair[0].id, &pair[1].id, ratio))
            .collect();

        let symbols: Vec<String> = self
            .symbol_list()
            .iter()
            .map(|s| s.replacen("(bridged)", "", 1))
            .collect();
        let img_src = self.image_src();
        for node in &mut nodes {
            node.chain = Some(self.chain().to_string());
            node.symbol_list = symbols.clone();
            node.img_src = Some(img_src.clone());
        }
        FlowChart { nodes, edges }
    }
}

impl<P: Protocol + ?Sized> FlowChartSteps for P {}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::protocol::ProtocolDescriptor;

    fn single() -> ProtocolDescriptor {
        ProtocolDescriptor {
            protocol_name: "test".into(),
            protocol_version: "0".into(),
            chain: "arbitrum".into(),
            symbol_list: vec!["TEST(bridged)".into()],
            mode: ProtocolMode::Single,
            zap_in_token: Some(TokenMeta::new("USDC", "0xUSDCAddress", 6)),
            zap_out_token: Some(TokenMeta::new("USDC", "0xUSDCAddress", 6)),
            lp_tokens: vec![],
            asset_base_path: String::new(),
        }
    }

    #[test]
    fn test_zap_in_ids_and_metadata() {
        let chart = single().zap_in_flow_chart("ETH", "0xETH", 0.4);
        let ids: Vec<&str> = chart.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "arbitrum/test/0/TEST(bridged)-ETH-USDC-swap",
                "arbitrum/test/0/TEST(bridged)-approve",
                "arbitrum/test/0/TEST(bridged)-deposit",
                "arbitrum/test/0/TEST(bridged)-stake",
            ]
        );
        assert_eq!(chart.nodes[2].name, "Deposit TEST(bridged)");
        assert_eq!(chart.nodes[0].symbol_list, vec!["TEST".to_string()]);
        assert_eq!(chart.nodes[0].img_src.as_deref(), Some("/projectPictures/test.webp"));
        assert_eq!(chart.edges[0].id, "edge-arbitrum/test/0/TEST(bridged)-0");
        assert!(chart.edges.iter().all(|e| e.data.ratio == 0.4));
    }

    #[test]
    fn test_stake_has_no_edges() {
        let chart = single().stake_flow_chart();
        assert_eq!(chart.nodes.len(), 1);
        assert!(chart.edges.is_empty());
    }
}
