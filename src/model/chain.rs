use std::collections::HashMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A chain identifier as used throughout the engine: a lowercase name such as
/// `"arbitrum"` or `"base"`.
pub type ChainName = String;

/// A blockchain the wallet can be switched to.
///
/// In JSON, chains are always objects:
/// - Known EVM chain: `{"name": "arbitrum", "chain_id": 42161}`
/// - Unknown chain: `{"name": "fantom"}` (no chain id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Chain {
    /// Lowercase chain name (e.g. "ethereum", "base", "arbitrum").
    pub name: ChainName,
    /// EVM chain ID, when the chain is in the registry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
}

// ── Methods ──────────────────────────────────────────────────────────

impl Chain {
    /// EVM chain ID, if this chain has one.
    pub fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

// ── Registry ─────────────────────────────────────────────────────────

const KNOWN_CHAINS: &[(&str, u64)] = &[
    ("ethereum", 1),
    ("optimism", 10),
    ("bsc", 56),
    ("polygon", 137),
    ("metis", 1088),
    ("base", 8453),
    ("arbitrum", 42161),
    ("linea", 59144),
];

impl Chain {
    /// Construct a chain from its name, matching known chains.
    /// Display names like "Arbitrum One" are normalized first; unknown names
    /// fall back to a name-only chain.
    pub fn from_name(name: &str) -> Self {
        let name = normalize_chain_name(name);
        let chain_id = KNOWN_CHAINS
            .iter()
            .find(|(known, _)| *known == name)
            .map(|(_, id)| *id);
        Chain { name, chain_id }
    }

    /// Reverse lookup from an EVM chain ID.
    pub fn from_chain_id(chain_id: u64) -> Option<Self> {
        KNOWN_CHAINS
            .iter()
            .find(|(_, id)| *id == chain_id)
            .map(|(name, id)| Chain {
                name: (*name).to_string(),
                chain_id: Some(*id),
            })
    }
}

/// Lowercase, then strip the wallet-provider suffixes (" one", " mainnet").
/// Only the first occurrence of each suffix is removed.
pub fn normalize_chain_name(name: &str) -> String {
    name.to_lowercase()
        .replacen(" one", "", 1)
        .replacen(" mainnet", "", 1)
        .trim()
        .to_string()
}

// ── Display ──────────────────────────────────────────────────────────

impl std::fmt::Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

// ── Completion status ────────────────────────────────────────────────

/// Per-chain completion flags for one multi-chain action.
///
/// A chain missing from the map has not completed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ChainStatus(HashMap<ChainName, bool>);

impl ChainStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with every given chain marked incomplete.
    pub fn pending<S: AsRef<str>>(chains: &[S]) -> Self {
        ChainStatus(
            chains
                .iter()
                .map(|c| (c.as_ref().to_string(), false))
                .collect(),
        )
    }

    pub fn is_complete(&self, chain: &str) -> bool {
        self.0.get(chain).copied().unwrap_or(false)
    }

    pub fn mark_complete(&mut self, chain: &str) {
        self.0.insert(chain.to_string(), true);
    }

    pub fn set(&mut self, chain: &str, complete: bool) {
        self.0.insert(chain.to_string(), complete);
    }

    /// True when every listed chain has completed. An empty list is complete.
    pub fn all_complete<S: AsRef<str>>(&self, chains: &[S]) -> bool {
        chains.iter().all(|c| self.is_complete(c.as_ref()))
    }
}

impl<K: Into<ChainName>> FromIterator<(K, bool)> for ChainStatus {
    fn from_iter<I: IntoIterator<Item = (K, bool)>>(iter: I) -> Self {
        ChainStatus(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_provider_suffixes() {
        assert_eq!(normalize_chain_name("Arbitrum One"), "arbitrum");
        assert_eq!(normalize_chain_name("Ethereum mainnet"), "ethereum");
        assert_eq!(normalize_chain_name("BASE"), "base");
        assert_eq!(normalize_chain_name("ARBITRUM ONE"), "arbitrum");
        assert_eq!(normalize_chain_name(" optimism "), "optimism");
    }

    #[test]
    fn test_from_name_resolves_registry() {
        assert_eq!(Chain::from_name("Arbitrum One").chain_id(), Some(42161));
        assert_eq!(Chain::from_name("base").chain_id(), Some(8453));
        let unknown = Chain::from_name("fantom");
        assert_eq!(unknown.name(), "fantom");
        assert_eq!(unknown.chain_id(), None);
        assert_eq!(Chain::from_chain_id(10).map(|c| c.name), Some("optimism".into()));
    }

    #[test]
    fn test_missing_status_is_incomplete() {
        let mut status: ChainStatus = [("base", true)].into_iter().collect();
        assert!(status.is_complete("base"));
        assert!(!status.is_complete("arbitrum"));
        assert!(!status.all_complete(&["base", "arbitrum"]));
        status.mark_complete("arbitrum");
        assert!(status.all_complete(&["base", "arbitrum"]));
        assert!(status.all_complete::<&str>(&[]));
    }
}
