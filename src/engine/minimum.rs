use std::collections::BTreeMap;

use crate::config::Thresholds;
use crate::model::allocation::AllocationTree;
use crate::model::portfolio::TokenPrices;

/// Smallest input amount, in units of `selected_token`, worth zapping in.
///
/// `selected_token` is the dropdown form `"{symbol}-{address}-{decimals}"`;
/// only the symbol is used for the price lookup. A missing token or price
/// yields NaN. Zero weights yield Infinity. Neither is turned into an error:
/// callers check `is_finite()` before using the result.
///
/// Single-chain mode (`skip_bridge`) only walks `current_chain` and normalizes
/// the smallest weight by that chain's total weight. Cross-chain mode walks
/// every chain, and also requires each funded chain to receive at least the
/// bridge minimum.
pub fn minimum_token_amount<P>(
    selected_token: Option<&str>,
    skip_bridge: bool,
    strategy: &AllocationTree<P>,
    token_prices: &TokenPrices,
    current_chain: &str,
    thresholds: &Thresholds,
) -> f64 {
    let token_price = selected_token
        .and_then(|t| t.split('-').next())
        .map(|symbol| symbol.to_lowercase())
        .and_then(|symbol| token_prices.get(&symbol).copied())
        .unwrap_or(f64::NAN);

    let mut smallest_weight = f64::INFINITY;
    let mut sum_of_weights = 0.0;
    let mut destination_chain_weights: BTreeMap<&str, f64> = BTreeMap::new();

    for by_chain in strategy.values() {
        for (chain, allocations) in by_chain {
            if skip_bridge && chain != current_chain {
                continue;
            }
            for allocation in allocations {
                let weight = allocation.weight;
                if weight > 0.0 && weight < smallest_weight {
                    smallest_weight = weight;
                }
                if skip_bridge {
                    sum_of_weights += weight;
                } else {
                    *destination_chain_weights.entry(chain.as_str()).or_insert(0.0) += weight;
                }
            }
        }
    }

    if smallest_weight == f64::INFINITY {
        smallest_weight = 1.0;
    }
    if sum_of_weights == 0.0 {
        sum_of_weights = 1.0;
    }

    let normalized_smallest_weight = if skip_bridge {
        smallest_weight / sum_of_weights
    } else {
        smallest_weight
    };
    let protocol_min_zap_in_usd = thresholds.min_protocol_zap_in_usd / normalized_smallest_weight;

    let usd_minimum = if skip_bridge {
        protocol_min_zap_in_usd
    } else {
        let total: f64 = destination_chain_weights.values().sum();
        destination_chain_weights
            .values()
            .map(|w| w / total)
            .filter(|w| *w != 0.0)
            .map(|w| thresholds.min_bridge_usd / w)
            .fold(protocol_min_zap_in_usd, max_propagating_nan)
    };

    usd_minimum / token_price
}

/// `Math.max` semantics: any NaN operand makes the result NaN.
fn max_propagating_nan(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.max(b)
    }
}
