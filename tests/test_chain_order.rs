use pretty_assertions::assert_eq;
use rstest::rstest;
use zap_flow::engine::{next_chain, sort_chains};
use zap_flow::model::ChainStatus;

// ── Helpers ──────────────────────────────────────────────────────────

fn status(done: &[&str]) -> ChainStatus {
    done.iter().map(|c| (*c, true)).collect()
}

const CHAINS: &[&str] = &["ethereum", "base", "arbitrum", "optimism", "polygon", "bsc"];

/// Every subset of `CHAINS` as a completion status.
fn all_statuses() -> Vec<ChainStatus> {
    (0..1u32 << CHAINS.len())
        .map(|mask| {
            let done: Vec<&str> = CHAINS
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, c)| *c)
                .collect();
            status(&done)
        })
        .collect()
}

// ── Ordering ─────────────────────────────────────────────────────────

#[rstest]
#[case::finished_first(
    &["ethereum", "arbitrum", "base"],
    &["ethereum"],
    Some("base"),
    &["ethereum", "base", "arbitrum"]
)]
#[case::length_then_lexicographic(
    &["optimism", "base", "bsc", "arbitrum"],
    &[],
    None,
    &["bsc", "base", "arbitrum", "optimism"]
)]
#[case::current_within_finished_group(
    &["polygon", "ethereum", "base"],
    &["polygon", "ethereum"],
    Some("ethereum"),
    &["ethereum", "polygon", "base"]
)]
#[case::unknown_current_chain(
    &["ethereum", "arbitrum", "optimism"],
    &[],
    Some("linea"),
    &["arbitrum", "ethereum", "optimism"]
)]
fn test_sort_chains(
    #[case] chains: &[&str],
    #[case] done: &[&str],
    #[case] current: Option<&str>,
    #[case] expected: &[&str],
) {
    assert_eq!(sort_chains(chains, &status(done), current), expected);
}

#[test]
fn test_sort_is_idempotent() {
    for s in all_statuses() {
        for current in [None, Some("base"), Some("polygon"), Some("")] {
            let once = sort_chains(CHAINS, &s, current);
            let twice = sort_chains(&once, &s, current);
            assert_eq!(once, twice);
        }
    }
}

#[test]
fn test_sort_is_a_permutation() {
    let s = status(&["base"]);
    let mut sorted = sort_chains(CHAINS, &s, Some("bsc"));
    sorted.sort();
    let mut input: Vec<String> = CHAINS.iter().map(|c| c.to_string()).collect();
    input.sort();
    assert_eq!(sorted, input);
}

#[test]
fn test_completed_chains_lead() {
    for s in all_statuses() {
        let sorted = sort_chains(CHAINS, &s, Some("arbitrum"));
        let first_pending = sorted.iter().position(|c| !s.is_complete(c)).unwrap_or(sorted.len());
        assert!(sorted[first_pending..].iter().all(|c| !s.is_complete(c)));
    }
}

// ── Next chain ───────────────────────────────────────────────────────

#[test]
fn test_next_chain_never_returns_completed() {
    for s in all_statuses() {
        for current in [None, Some("ethereum"), Some("bsc")] {
            match next_chain(CHAINS, &s, current) {
                Some(next) => assert!(!s.is_complete(&next), "{next} is complete"),
                None => assert!(s.all_complete(CHAINS)),
            }
        }
    }
}

#[test]
fn test_next_chain_prefers_incomplete_current() {
    let s = status(&["ethereum"]);
    assert_eq!(
        next_chain(&["ethereum", "arbitrum", "base"], &s, Some("arbitrum")).as_deref(),
        Some("arbitrum")
    );
    assert_eq!(
        next_chain(&["ethereum", "arbitrum", "base"], &s, Some("ethereum")).as_deref(),
        Some("base")
    );
}

#[test]
fn test_next_chain_walks_to_completion() {
    let chains = ["optimism", "base", "arbitrum"];
    let mut s = ChainStatus::pending(&chains);
    let mut visited = Vec::new();
    let mut current = "arbitrum".to_string();
    while let Some(next) = next_chain(&chains, &s, Some(&current)) {
        s.mark_complete(&next);
        visited.push(next.clone());
        current = next;
    }
    assert_eq!(visited, vec!["arbitrum", "base", "optimism"]);
    assert!(s.all_complete(&chains));
}
