use crate::model::portfolio::{BalanceDict, PendingRewards, PortfolioStrategy};

/// USD amount available to re-deposit on `chain_filter` after a rebalance:
/// every matching position's `usd_balance * zap_out_percentage` plus all
/// pending rewards.
///
/// - `None` filter: nothing to reinvest, returns 0.
/// - Empty filter: all chains.
/// - Otherwise the filter goes through [`reinvest_chain_key`] and is
///   compared verbatim against each entry's stored chain name.
///
/// A missing portfolio makes the reward term NaN, and so the result.
pub fn rebalance_reinvest_usd_amount<P>(
    chain_filter: Option<&str>,
    balances: &BalanceDict,
    pending_rewards: &PendingRewards,
    portfolio: Option<&P>,
) -> f64
where
    P: PortfolioStrategy + ?Sized,
{
    let Some(filter) = chain_filter else {
        return 0.0;
    };
    let chain = reinvest_chain_key(filter);

    let positions: f64 = balances
        .values()
        .filter(|b| chain.is_empty() || b.chain == chain)
        .filter(|b| b.zap_out_percentage > 0.0)
        .map(|b| b.usd_balance * b.zap_out_percentage)
        .sum();

    let rewards = portfolio
        .map(|p| p.sum_usd_denominated_values(pending_rewards))
        .unwrap_or(f64::NAN);

    positions + rewards
}

/// Strip the first " one" and the first " mainnet" as written, then
/// lowercase. The suffix match is case-sensitive, so "Arbitrum One" keys as
/// "arbitrum one" and matches no stored chain.
pub fn reinvest_chain_key(filter: &str) -> String {
    filter.replacen(" one", "", 1).replacen(" mainnet", "", 1).to_lowercase()
}

/// Sums of over- and under-allocation across a balance dict.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WeightDiffSums {
    /// Sum of `weight_diff` over positions above the rebalance threshold.
    pub positive: f64,
    /// Absolute sum of negative `weight_diff`s.
    pub negative: f64,
}

/// Fill in `current_weight`, `weight_diff` and `zap_out_percentage` for every
/// position given the portfolio's total USD value.
///
/// Zero-weight positions are fully withdrawn. Positions over-allocated by
/// more than `threshold` withdraw just the excess.
pub fn apply_weight_diffs(balances: &mut BalanceDict, total_usd: f64, threshold: f64) -> WeightDiffSums {
    let mut sums = WeightDiffSums::default();
    for b in balances.values_mut() {
        let current_weight = if b.usd_balance.is_nan() {
            0.0
        } else {
            b.usd_balance / total_usd
        };
        b.current_weight = current_weight;
        b.weight_diff = current_weight - b.weight;
        b.zap_out_percentage = if b.weight == 0.0 { 1.0 } else { 0.0 };
        if b.weight_diff > threshold {
            b.zap_out_percentage = (current_weight - b.weight) * total_usd / b.usd_balance;
            sums.positive += b.weight_diff;
        }
        if b.weight_diff < 0.0 {
            sums.negative += b.weight_diff;
        }
    }
    sums.negative = sums.negative.abs();
    sums
}

/// Recompute [`WeightDiffSums`] from an already-annotated dict.
pub fn weight_diff_sums(balances: &BalanceDict, threshold: f64) -> WeightDiffSums {
    let mut sums = WeightDiffSums::default();
    for b in balances.values() {
        if b.weight_diff > threshold {
            sums.positive += b.weight_diff;
        }
        if b.weight_diff < 0.0 {
            sums.negative += b.weight_diff;
        }
    }
    sums.negative = sums.negative.abs();
    sums
}
