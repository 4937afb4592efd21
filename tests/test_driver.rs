
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use pretty_assertions::assert_eq;

use portfolio_common::*;
use zap_flow::config::Thresholds;
use zap_flow::driver::{
    Action, ActionDriver, ActionSession, DriverConfig, DriverError, MemoryCache, PortfolioCache, PortfolioSnapshot,
    StepReceipt, Wallet,
};
use zap_flow::engine::ActionName;
use zap_flow::example::example_portfolio;
use zap_flow::model::{Chain, FlowNode, PortfolioDefinition};
use zap_flow::progress::{NodeStatus, ProgressCoordinator};

const ADDRESS: &str = "0xAbC0000000000000000000000000000000000001";

// ── Mock wallet ──────────────────────────────────────────────────────

/// Records every call; optionally fails every step on one chain.
#[derive(Default)]
struct MockWallet {
    fail_on_chain: Option<String>,
    switches: Mutex<Vec<String>>,
    executed: Mutex<Vec<(String, String)>>,
}

impl MockWallet {
    fn failing_on(chain: &str) -> Self {
        MockWallet {
            fail_on_chain: Some(chain.to_string()),
            ..Default::default()
        }
    }

    fn switches(&self) -> Vec<String> {
        self.switches.lock().unwrap().clone()
    }

    fn executed(&self) -> Vec<(String, String)> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Wallet for MockWallet {
    fn address(&self) -> &str {
        ADDRESS
    }

    async fn switch_chain(&self, chain: &Chain) -> Result<()> {
        self.switches.lock().unwrap().push(chain.name.clone());
        Ok(())
    }

    async fn execute_step(&self, chain: &Chain, node: &FlowNode) -> Result<StepReceipt> {
        if self.fail_on_chain.as_deref() == Some(chain.name()) {
            anyhow::bail!("user rejected the request");
        }
        self.executed
            .lock()
            .unwrap()
            .push((chain.name.clone(), node.id.clone()));
        Ok(StepReceipt {
            node_id: node.id.clone(),
            tx_hash: format!("0x{:02x}", self.executed.lock().unwrap().len()),
            trading_loss: node.id.ends_with("-swap").then_some(-0.01),
        })
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn config() -> DriverConfig {
    DriverConfig {
        thresholds: Thresholds::PRODUCTION,
        max_jitter: Duration::ZERO,
        ..Default::default()
    }
}

fn zap_in(amount: f64) -> Action {
    Action::ZapIn {
        selected_token: format!("usdc-{USDC}-6"),
        amount,
    }
}

async fn run(
    portfolio: &PortfolioDefinition,
    wallet: &MockWallet,
    cache: &MemoryCache,
    action: &Action,
) -> Result<zap_flow::driver::ActionOutcome, DriverError> {
    let mut driver = ActionDriver::new(
        portfolio,
        wallet,
        cache,
        ProgressCoordinator::new(),
        config(),
        "Arbitrum One",
    );
    driver.run(action).await
}

// ── Zap in ───────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_zap_in_runs_current_chain_first() {
    let portfolio = example_portfolio();
    let wallet = MockWallet::default();
    let cache = MemoryCache::new();

    let outcome = run(&portfolio, &wallet, &cache, &zap_in(1_000.0)).await.expect("zap in");

    // Already on arbitrum, so the only switch is to base.
    assert_eq!(wallet.switches(), vec!["base".to_string()]);
    let executed = wallet.executed();
    let first_base = executed.iter().position(|(c, _)| c == "base").expect("base steps");
    assert!(executed[..first_base].iter().all(|(c, _)| c == "arbitrum"));
    assert!(executed[first_base..].iter().all(|(c, _)| c == "base"));

    // Every step node ran exactly once.
    let steps = outcome.chart.nodes.iter().filter(|n| n.id.contains('/')).count();
    assert_eq!(outcome.receipts.len(), steps);
    assert_eq!(steps, 20);
    assert!(outcome.session.is_finished());
    assert_eq!(outcome.session.chains, vec!["arbitrum".to_string(), "base".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_steps_follow_flow_order() {
    let portfolio = example_portfolio();
    let wallet = MockWallet::default();
    let cache = MemoryCache::new();
    run(&portfolio, &wallet, &cache, &zap_in(1_000.0)).await.expect("zap in");

    let position = |id: &str| {
        wallet
            .executed()
            .iter()
            .position(|(_, n)| n == id)
            .unwrap_or_else(|| panic!("{id} not executed"))
    };
    let uid = "arbitrum/aave/v3/weth";
    assert!(position(&format!("{uid}-usdc-weth-swap")) < position(&format!("{uid}-approve")));
    assert!(position(&format!("{uid}-approve")) < position(&format!("{uid}-deposit")));
    assert!(position(&format!("{uid}-deposit")) < position(&format!("{uid}-stake")));
}

#[tokio::test(start_paused = true)]
async fn test_progress_marks_executed_nodes_active() {
    let portfolio = example_portfolio();
    let wallet = MockWallet::default();
    let cache = MemoryCache::new();
    let coordinator = ProgressCoordinator::new();
    let mut driver = ActionDriver::new(&portfolio, &wallet, &cache, coordinator.clone(), config(), "arbitrum");

    let outcome = driver.run(&zap_in(1_000.0)).await.expect("zap in");
    coordinator.wait_until_idle().await;

    for receipt in &outcome.receipts {
        let state = coordinator.get_node_state(&receipt.node_id);
        assert_eq!(state.status, NodeStatus::Active, "{}", receipt.node_id);
        assert_eq!(state.trading_loss, receipt.trading_loss);
    }
    // Chain roots are seeded but never executed.
    assert_eq!(coordinator.get_node_state("arbitrum").status, NodeStatus::Pending);
    assert_eq!(driver.current_chain(), "base");
}

#[tokio::test(start_paused = true)]
async fn test_zap_in_below_minimum_is_rejected() {
    let portfolio = example_portfolio();
    let wallet = MockWallet::default();
    let cache = MemoryCache::new();

    let err = run(&portfolio, &wallet, &cache, &zap_in(10.0)).await.unwrap_err();
    match err {
        DriverError::BelowMinimum { amount, minimum, unit } => {
            assert_eq!(amount, 10.0);
            // Base holds 30% of the weight: 20 / 0.3.
            assert!((minimum - 20.0 / 0.3).abs() < 1e-9, "{minimum}");
            assert_eq!(unit, "usdc");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(wallet.executed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unpriced_token_has_no_minimum() {
    let portfolio = example_portfolio();
    let wallet = MockWallet::default();
    let cache = MemoryCache::new();
    let action = Action::ZapIn {
        selected_token: "dai-0xda10-18".into(),
        amount: 1_000.0,
    };

    let err = run(&portfolio, &wallet, &cache, &action).await.unwrap_err();
    assert!(matches!(err, DriverError::MinimumUnavailable { token } if token == "dai-0xda10-18"));
}

// ── Resume ───────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_failed_leg_resumes_on_next_run() {
    let portfolio = example_portfolio();
    let cache = MemoryCache::new();

    let broken = MockWallet::failing_on("base");
    let err = run(&portfolio, &broken, &cache, &zap_in(1_000.0)).await.unwrap_err();
    assert!(matches!(&err, DriverError::Step { chain, .. } if chain == "base"));

    let key = ActionSession::key(ADDRESS, ActionName::ZapIn);
    let saved = cache.get_session(&key).await.unwrap().expect("session saved");
    assert!(saved.status.is_complete("arbitrum"));
    assert!(!saved.status.is_complete("base"));

    let healthy = MockWallet::default();
    let outcome = run(&portfolio, &healthy, &cache, &zap_in(1_000.0)).await.expect("resume");
    assert_eq!(outcome.session.id, saved.id);
    assert!(outcome.session.is_finished());
    assert_eq!(healthy.switches(), vec!["base".to_string()]);
    assert_eq!(healthy.executed().len(), 9);
    assert!(healthy.executed().iter().all(|(c, _)| c == "base"));

    // A finished session is not resumed.
    let again = MockWallet::default();
    let fresh = run(&portfolio, &again, &cache, &zap_in(1_000.0)).await.expect("fresh run");
    assert_ne!(fresh.session.id, saved.id);
    assert_eq!(again.executed().len(), 20);
}

// ── Other actions ────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_claim_without_rewards_is_rejected() {
    let mut portfolio = example_portfolio();
    portfolio.rewards.clear();
    let wallet = MockWallet::default();
    let cache = MemoryCache::new();
    let action = Action::ClaimAndSwap {
        output_token: "usdc".into(),
        output_token_address: USDC.into(),
    };

    let err = run(&portfolio, &wallet, &cache, &action).await.unwrap_err();
    assert!(matches!(err, DriverError::BelowMinimum { ref unit, .. } if unit == "USD"));
}

#[tokio::test(start_paused = true)]
async fn test_rebalance_bridges_from_current_chain() {
    let portfolio = example_portfolio();
    let wallet = MockWallet::default();
    let cache = MemoryCache::new();
    let action = Action::Rebalance { middle_token: usdc() };

    let outcome = run(&portfolio, &wallet, &cache, &action).await.expect("rebalance");

    let bridge = outcome.chart.node("base").expect("base root");
    assert_eq!(bridge.name, "Bridge to base");
    assert!(
        outcome
            .chart
            .edges
            .iter()
            .any(|e| e.source == "endOfZapOutOnarbitrum" && e.target == "base")
    );
    // The over-weight aave usdc position is withdrawn before anything is deposited.
    let executed = wallet.executed();
    let withdraw = executed
        .iter()
        .position(|(_, n)| n == "arbitrum/aave/v3/usdc-withdraw")
        .expect("withdraw ran");
    let first_deposit = executed
        .iter()
        .position(|(_, n)| n.ends_with("-deposit"))
        .expect("deposit ran");
    assert!(withdraw < first_deposit);
}

#[tokio::test(start_paused = true)]
async fn test_fresh_snapshot_is_reused() {
    let portfolio = example_portfolio();
    let wallet = MockWallet::default();
    let cache = MemoryCache::new();

    // Seed a snapshot whose price table lacks usdc.
    let mut snapshot = PortfolioSnapshot::fetch(&portfolio, &ADDRESS.to_lowercase())
        .await
        .unwrap();
    snapshot.token_prices_mapping_table.remove("usdc");
    cache.set_snapshot(&ADDRESS.to_lowercase(), &snapshot).await.unwrap();

    let err = run(&portfolio, &wallet, &cache, &zap_in(1_000.0)).await.unwrap_err();
    assert!(matches!(err, DriverError::MinimumUnavailable { .. }));
}
