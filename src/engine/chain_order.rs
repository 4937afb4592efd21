use std::cmp::Ordering;

use crate::model::chain::{ChainName, ChainStatus};

/// Order chains for a multi-chain action.
///
/// Stable sort by, in order of precedence:
/// 1. completed chains first,
/// 2. the current chain first within its completion group,
/// 3. shorter names first,
/// 4. lexicographic.
pub fn sort_chains<S: AsRef<str>>(
    chains: &[S],
    status: &ChainStatus,
    current_chain: Option<&str>,
) -> Vec<ChainName> {
    let mut ordered: Vec<ChainName> = chains.iter().map(|c| c.as_ref().to_string()).collect();
    ordered.sort_by(|a, b| compare_chains(a, b, status, current_chain));
    ordered
}

fn compare_chains(a: &str, b: &str, status: &ChainStatus, current_chain: Option<&str>) -> Ordering {
    let a_done = status.is_complete(a);
    let b_done = status.is_complete(b);
    // `true` must sort first, so compare b against a.
    b_done
        .cmp(&a_done)
        .then_with(|| {
            let is_current = |c: &str| current_chain.is_some_and(|cur| !cur.is_empty() && cur == c);
            is_current(b).cmp(&is_current(a))
        })
        .then_with(|| a.len().cmp(&b.len()))
        .then_with(|| a.cmp(b))
}

/// First incomplete chain in [`sort_chains`] order, or `None` when every
/// chain is complete (or there are none).
///
/// The current chain is not skipped: while it is incomplete it is the answer.
pub fn next_chain<S: AsRef<str>>(
    chains: &[S],
    status: &ChainStatus,
    current_chain: Option<&str>,
) -> Option<ChainName> {
    sort_chains(chains, status, current_chain)
        .into_iter()
        .find(|c| !status.is_complete(c))
}
