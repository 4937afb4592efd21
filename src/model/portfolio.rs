use std::collections::{BTreeMap, HashMap};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::allocation::{AllocationTree, iter_allocations};
use super::protocol::{Protocol, ProtocolDescriptor};

#[derive(Debug, Error)]
pub enum PortfolioError {
    #[error("Reward `{symbol}` has balance {balance} but its USD value is {usd_value}")]
    UnpricedBalance {
        symbol: String,
        balance: f64,
        usd_value: f64,
    },
}

/// Token symbol (lowercase) → USD price.
pub type TokenPrices = HashMap<String, f64>;

/// A claimable reward token and its USD value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RewardEntry {
    pub symbol: String,
    pub balance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usd_denominated_value: Option<f64>,
}

impl RewardEntry {
    /// Price a reward balance. A non-zero balance must come out with a
    /// positive, finite USD value; anything else means the price table is
    /// missing the token.
    pub fn priced(symbol: &str, balance: f64, price: f64) -> Result<Self, PortfolioError> {
        let usd_value = balance * price;
        if balance != 0.0 && !(usd_value.is_finite() && usd_value > 0.0) {
            return Err(PortfolioError::UnpricedBalance {
                symbol: symbol.to_string(),
                balance,
                usd_value,
            });
        }
        Ok(RewardEntry {
            symbol: symbol.to_string(),
            balance,
            usd_denominated_value: Some(usd_value),
        })
    }
}

/// Token address → pending reward.
pub type PendingRewards = BTreeMap<String, RewardEntry>;

/// One protocol position's balance and rebalance bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolBalance {
    pub chain: String,
    pub usd_balance: f64,
    /// Target weight from the strategy.
    #[serde(default)]
    pub weight: f64,
    /// Share of this position to withdraw when rebalancing (0 = keep all).
    #[serde(default)]
    pub zap_out_percentage: f64,
    /// `current_weight - weight`; positive means over-allocated.
    #[serde(default)]
    pub weight_diff: f64,
    #[serde(default)]
    pub current_weight: f64,
}

/// Flat protocol id → balance mapping consumed by the rebalance paths.
pub type BalanceDict = BTreeMap<String, ProtocolBalance>;

/// Synchronous view of a portfolio: its strategy and fee schedule.
pub trait PortfolioStrategy {
    type Protocol: Protocol;

    fn strategy(&self) -> &AllocationTree<Self::Protocol>;

    fn entry_fee_rate(&self) -> f64;
    fn swap_fee_rate(&self) -> f64;
    fn referral_fee_rate(&self) -> f64;

    /// Minimum over-allocation before a position is rebalanced.
    fn rebalance_threshold(&self) -> f64 {
        0.05
    }

    /// Sum of USD values across a rewards mapping; unpriced entries count 0.
    fn sum_usd_denominated_values(&self, rewards: &PendingRewards) -> f64 {
        rewards
            .values()
            .map(|r| r.usd_denominated_value.unwrap_or(0.0))
            .sum()
    }

    /// Find a strategy leaf by its current or legacy unique id.
    fn find_protocol(&self, id: &str) -> Option<&Self::Protocol> {
        iter_allocations(self.strategy())
            .map(|(_, _, a)| &a.protocol)
            .find(|p| p.unique_id() == id || p.old_unique_id() == id)
    }
}

/// Async portfolio collaborator: balances and lock-ups need network access.
#[cfg(feature = "full")]
#[async_trait::async_trait]
pub trait PortfolioHelper: PortfolioStrategy + Send + Sync {
    /// Longest lock-up period across funded positions, in seconds.
    async fn lock_up_period(&self, address: &str) -> anyhow::Result<u64>;

    /// Total USD balance, per-protocol balances, and the price table used.
    async fn usd_balance_of(&self, address: &str) -> anyhow::Result<PortfolioBalance>;

    async fn pending_rewards(&self, address: &str) -> anyhow::Result<PendingRewards>;
}

/// Result of [`PortfolioHelper::usd_balance_of`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioBalance {
    pub usd_balance: f64,
    pub usd_balance_dict: BalanceDict,
    pub token_prices_mapping_table: TokenPrices,
}

// ── Definition file ──────────────────────────────────────────────────

/// A portfolio loaded from JSON: strategy, fee schedule, and the static
/// market/position data a live client would otherwise fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PortfolioDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub strategy: AllocationTree<ProtocolDescriptor>,
    #[serde(default = "default_entry_fee_rate")]
    pub entry_fee_rate: f64,
    #[serde(default = "default_swap_fee_rate")]
    pub swap_fee_rate: f64,
    #[serde(default = "default_referral_fee_rate")]
    pub referral_fee_rate: f64,
    #[serde(default = "default_rebalance_threshold")]
    pub rebalance_threshold: f64,
    /// Lowercase token symbol → USD price.
    #[serde(default)]
    pub token_prices: TokenPrices,
    /// Protocol unique id → current USD balance.
    #[serde(default)]
    pub positions: BTreeMap<String, f64>,
    /// Token address → unclaimed reward (symbol + token amount).
    #[serde(default)]
    pub rewards: BTreeMap<String, RewardBalance>,
    /// Lock-up period in seconds.
    #[serde(default)]
    pub lock_up_period: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RewardBalance {
    pub symbol: String,
    pub balance: f64,
}

fn default_entry_fee_rate() -> f64 {
    0.0
}
fn default_swap_fee_rate() -> f64 {
    0.00299
}
fn default_referral_fee_rate() -> f64 {
    0.7
}
fn default_rebalance_threshold() -> f64 {
    0.05
}

impl PortfolioDefinition {
    /// Price every reward balance against the token price table.
    pub fn priced_rewards(&self) -> Result<PendingRewards, PortfolioError> {
        let mut rewards = PendingRewards::new();
        for (address, reward) in &self.rewards {
            let price = self
                .token_prices
                .get(&reward.symbol.to_lowercase())
                .copied()
                .unwrap_or(0.0);
            rewards.insert(
                address.clone(),
                RewardEntry::priced(&reward.symbol, reward.balance, price)?,
            );
        }
        Ok(rewards)
    }

    /// Per-protocol balances for every strategy leaf. Positions are looked up
    /// by unique id first, then by the legacy id.
    pub fn protocol_balances(&self) -> BalanceDict {
        let mut dict = BalanceDict::new();
        for (_, chain, allocation) in iter_allocations(&self.strategy) {
            let p = &allocation.protocol;
            let usd_balance = self
                .positions
                .get(&p.unique_id())
                .or_else(|| self.positions.get(&p.old_unique_id()))
                .copied()
                .unwrap_or(0.0);
            dict.insert(
                p.unique_id(),
                ProtocolBalance {
                    chain: chain.to_string(),
                    usd_balance,
                    weight: allocation.weight,
                    ..Default::default()
                },
            );
        }
        dict
    }

    /// Balances annotated for a rebalance. The total counts priced pending
    /// rewards alongside every position.
    pub fn rebalance_balance(&self) -> Result<PortfolioBalance, PortfolioError> {
        let rewards = self.priced_rewards()?;
        let mut dict = self.protocol_balances();
        let usd_balance = self.sum_usd_denominated_values(&rewards) + dict.values().map(|b| b.usd_balance).sum::<f64>();
        crate::engine::reinvest::apply_weight_diffs(&mut dict, usd_balance, self.rebalance_threshold);
        Ok(PortfolioBalance {
            usd_balance,
            usd_balance_dict: dict,
            token_prices_mapping_table: self.token_prices.clone(),
        })
    }

    /// Stamp the hosting prefix onto every protocol's picture path.
    pub fn with_asset_base_path(mut self, base_path: &str) -> Self {
        for by_chain in self.strategy.values_mut() {
            for allocations in by_chain.values_mut() {
                for allocation in allocations {
                    allocation.protocol.asset_base_path = base_path.to_string();
                }
            }
        }
        self
    }
}

impl PortfolioStrategy for PortfolioDefinition {
    type Protocol = ProtocolDescriptor;

    fn strategy(&self) -> &AllocationTree<ProtocolDescriptor> {
        &self.strategy
    }

    fn entry_fee_rate(&self) -> f64 {
        self.entry_fee_rate
    }

    fn swap_fee_rate(&self) -> f64 {
        self.swap_fee_rate
    }

    fn referral_fee_rate(&self) -> f64 {
        self.referral_fee_rate
    }

    fn rebalance_threshold(&self) -> f64 {
        self.rebalance_threshold
    }
}

#[cfg(feature = "full")]
#[async_trait::async_trait]
impl PortfolioHelper for PortfolioDefinition {
    async fn lock_up_period(&self, _address: &str) -> anyhow::Result<u64> {
        Ok(self.lock_up_period)
    }

    async fn usd_balance_of(&self, _address: &str) -> anyhow::Result<PortfolioBalance> {
        Ok(self.rebalance_balance()?)
    }

    async fn pending_rewards(&self, _address: &str) -> anyhow::Result<PendingRewards> {
        Ok(self.priced_rewards()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priced_rejects_unpriced_balance() {
        let err = RewardEntry::priced("arb", 2.0, 0.0).unwrap_err();
        assert!(err.to_string().contains("arb"));
        assert!(RewardEntry::priced("arb", 2.0, f64::NAN).is_err());
        // A zero balance needs no price.
        let zero = RewardEntry::priced("arb", 0.0, 0.0).unwrap();
        assert_eq!(zero.usd_denominated_value, Some(0.0));
    }

    #[test]
    fn test_rebalance_total_counts_rewards() {
        let mut p = crate::example::example_portfolio();
        let positions: f64 = p.positions.values().sum();
        let rewards = p.sum_usd_denominated_values(&p.priced_rewards().unwrap());
        assert!(rewards > 0.0);

        let balance = p.rebalance_balance().unwrap();
        assert_eq!(balance.usd_balance, positions + rewards);
        let aave = &balance.usd_balance_dict["arbitrum/aave/v3/usdc"];
        assert!((aave.current_weight - 400.0 / (positions + rewards)).abs() < 1e-12);

        p.token_prices.clear();
        assert!(p.rebalance_balance().is_err());
    }

    #[test]
    fn test_priced_values_balance() {
        let e = RewardEntry::priced("arb", 4.0, 0.5).unwrap();
        assert_eq!(e.usd_denominated_value, Some(2.0));
    }
}
