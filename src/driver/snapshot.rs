use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::model::portfolio::{BalanceDict, PendingRewards, PortfolioHelper, TokenPrices};

/// Cached per-address portfolio data, refreshed when older than the TTL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSnapshot {
    pub token_prices_mapping_table: TokenPrices,
    pub usd_balance: f64,
    pub usd_balance_dict: BalanceDict,
    pub lock_up_period: u64,
    pub pending_rewards: PendingRewards,
    /// USD value of wallet leftovers too small to route.
    #[serde(default)]
    pub dust: f64,
    pub timestamp: DateTime<Utc>,
}

impl PortfolioSnapshot {
    pub async fn fetch<H>(helper: &H, address: &str) -> anyhow::Result<Self>
    where
        H: PortfolioHelper + ?Sized,
    {
        let balance = helper.usd_balance_of(address).await?;
        let pending_rewards = helper.pending_rewards(address).await?;
        let lock_up_period = helper.lock_up_period(address).await?;
        Ok(PortfolioSnapshot {
            token_prices_mapping_table: balance.token_prices_mapping_table,
            usd_balance: balance.usd_balance,
            usd_balance_dict: balance.usd_balance_dict,
            lock_up_period,
            pending_rewards,
            dust: 0.0,
            timestamp: Utc::now(),
        })
    }

    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        now.signed_duration_since(self.timestamp) < ttl
    }
}
