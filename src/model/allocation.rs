use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::chain::ChainName;
use super::protocol::ProtocolDescriptor;

/// One leaf of the strategy: a protocol position and its target weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProtocolAllocation<P = ProtocolDescriptor> {
    /// Target share of the portfolio, 0.0 - 1.0. Zero-weight entries stay in
    /// the tree but receive no capital.
    pub weight: f64,
    pub protocol: P,
}

/// Category (e.g. "stablecoin", "gold") → chain → allocations.
pub type AllocationTree<P = ProtocolDescriptor> =
    BTreeMap<String, BTreeMap<ChainName, Vec<ProtocolAllocation<P>>>>;

/// Flatten the tree into `(category, chain, allocation)` triples.
pub fn iter_allocations<P>(
    tree: &AllocationTree<P>,
) -> impl Iterator<Item = (&str, &str, &ProtocolAllocation<P>)> {
    tree.iter().flat_map(|(category, chains)| {
        chains.iter().flat_map(move |(chain, allocations)| {
            allocations
                .iter()
                .map(move |a| (category.as_str(), chain.as_str(), a))
        })
    })
}

/// Distinct chains in the tree, in key order.
pub fn chains_of<P>(tree: &AllocationTree<P>) -> Vec<ChainName> {
    let mut chains: Vec<ChainName> = Vec::new();
    for by_chain in tree.values() {
        for chain in by_chain.keys() {
            if !chains.contains(chain) {
                chains.push(chain.clone());
            }
        }
    }
    chains
}

/// Chains that hold at least one allocation with weight > 0.
pub fn funded_chains<P>(tree: &AllocationTree<P>) -> Vec<ChainName> {
    let mut chains: Vec<ChainName> = Vec::new();
    for (_, chain, allocation) in iter_allocations(tree) {
        if allocation.weight > 0.0 && !chains.iter().any(|c| c == chain) {
            chains.push(chain.to_string());
        }
    }
    chains
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> AllocationTree<&'static str> {
        let mut tree = AllocationTree::new();
        tree.entry("stable".into()).or_default().insert(
            "base".into(),
            vec![ProtocolAllocation { weight: 0.5, protocol: "a" }],
        );
        tree.entry("gold".into()).or_default().insert(
            "arbitrum".into(),
            vec![ProtocolAllocation { weight: 0.0, protocol: "b" }],
        );
        tree.entry("gold".into()).or_default().insert(
            "base".into(),
            vec![ProtocolAllocation { weight: 0.5, protocol: "c" }],
        );
        tree
    }

    #[test]
    fn test_chains_dedup() {
        assert_eq!(chains_of(&tree()), vec!["arbitrum", "base"]);
        assert_eq!(funded_chains(&tree()), vec!["base"]);
        assert_eq!(iter_allocations(&tree()).count(), 3);
    }
}
