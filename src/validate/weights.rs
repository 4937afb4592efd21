use crate::model::allocation::{AllocationTree, iter_allocations};

use super::ValidationError;

/// Tolerance on the total strategy weight.
pub const WEIGHT_EPSILON: f64 = 1e-5;

/// Every weight lies in [0, 1] and the whole tree sums to 1.
pub fn check_strategy_weights<P>(tree: &AllocationTree<P>) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut total = 0.0;

    for (category, chain, allocation) in iter_allocations(tree) {
        let weight = allocation.weight;
        if !weight.is_finite() || !(0.0..=1.0).contains(&weight) {
            errors.push(ValidationError::InvalidWeight {
                location: format!("{category}/{chain}"),
                weight,
            });
            continue;
        }
        total += weight;
    }

    if errors.is_empty() && (total - 1.0).abs() > WEIGHT_EPSILON {
        errors.push(ValidationError::WeightSum { total });
    }

    errors
}
