//! Orchestration: turn a user action into per-chain transaction legs and
//! drive them through the wallet, one chain at a time.

pub mod cache;
pub mod session;
pub mod snapshot;
pub mod wallet;

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{AppConfig, AssetConfig, Thresholds};
use crate::engine::portfolio_chart::{is_step_node, step_chains};
use crate::engine::{
    ActionName, ActionParams, FlowChartError, PortfolioFlowChartBuilder, RebalanceParams, chain_execution_order,
    minimum_token_amount, next_chain, rebalance_reinvest_usd_amount,
};
use crate::model::chain::normalize_chain_name;
use crate::model::portfolio::PortfolioHelper;
use crate::model::{Chain, ChainName, FlowChart, TokenMeta};
use crate::progress::tracker::MAX_JITTER;
use crate::progress::{ProgressCoordinator, RandomJitter, TransactionProgress};

pub use cache::{CacheError, FileCache, MemoryCache, PortfolioCache};
pub use session::ActionSession;
pub use snapshot::PortfolioSnapshot;
pub use wallet::{DryRunWallet, StepReceipt, Wallet};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    FlowChart(#[from] FlowChartError),

    #[error("Failed to load portfolio data")]
    Portfolio(#[source] BoxError),

    #[error("Minimum amount for {token} cannot be computed (missing price or weights)")]
    MinimumUnavailable { token: String },

    #[error("Amount {amount} is below the minimum {minimum} {unit}")]
    BelowMinimum { amount: f64, minimum: f64, unit: String },

    #[error("Failed to switch to chain `{chain}`")]
    SwitchChain {
        chain: ChainName,
        #[source]
        source: BoxError,
    },

    #[error("Step `{node_id}` on `{chain}` failed")]
    Step {
        chain: ChainName,
        node_id: String,
        #[source]
        source: BoxError,
    },
}

/// A user-initiated portfolio action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Action {
    #[serde(rename_all = "camelCase")]
    ZapIn {
        /// `"{symbol}-{address}-{decimals}"`.
        selected_token: String,
        amount: f64,
    },
    #[serde(rename_all = "camelCase")]
    ZapOut {
        output_token: String,
        output_token_address: String,
    },
    #[serde(rename_all = "camelCase")]
    ClaimAndSwap {
        output_token: String,
        output_token_address: String,
    },
    Transfer {
        recipient: String,
    },
    Stake,
    #[serde(rename_all = "camelCase")]
    Rebalance { middle_token: TokenMeta },
}

impl Action {
    pub fn name(&self) -> ActionName {
        match self {
            Action::ZapIn { .. } => ActionName::ZapIn,
            Action::ZapOut { .. } => ActionName::ZapOut,
            Action::ClaimAndSwap { .. } => ActionName::ClaimAndSwap,
            Action::Transfer { .. } => ActionName::Transfer,
            Action::Stake => ActionName::Stake,
            Action::Rebalance { .. } => ActionName::Rebalance,
        }
    }

    /// Flow chart parameters for this action.
    pub fn params(&self, snapshot: &PortfolioSnapshot, current_chain: &str) -> ActionParams {
        match self {
            Action::ZapIn { selected_token, .. } => {
                let mut parts = selected_token.split('-');
                ActionParams {
                    token_in_symbol: parts.next().unwrap_or_default().to_string(),
                    token_in_address: parts.next().unwrap_or_default().to_string(),
                    ..Default::default()
                }
            }
            Action::ZapOut {
                output_token,
                output_token_address,
            }
            | Action::ClaimAndSwap {
                output_token,
                output_token_address,
            } => ActionParams {
                output_token: output_token.clone(),
                output_token_address: output_token_address.clone(),
                ..Default::default()
            },
            Action::Transfer { .. } | Action::Stake => ActionParams::default(),
            Action::Rebalance { middle_token } => {
                let mut zap_out_chains: Vec<ChainName> = Vec::new();
                for balance in snapshot.usd_balance_dict.values() {
                    if !zap_out_chains.contains(&balance.chain) {
                        zap_out_chains.push(balance.chain.clone());
                    }
                }
                let middle_tokens: HashMap<ChainName, TokenMeta> = zap_out_chains
                    .iter()
                    .map(|c| (c.clone(), middle_token.clone()))
                    .collect();
                ActionParams {
                    token_in_symbol: middle_token.symbol.clone(),
                    token_in_address: middle_token.address.clone(),
                    rebalance: Some(RebalanceParams {
                        balances: snapshot.usd_balance_dict.clone(),
                        zap_out_chains,
                        middle_tokens,
                        current_chain: current_chain.to_string(),
                    }),
                    ..Default::default()
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub thresholds: Thresholds,
    pub assets: AssetConfig,
    /// Cached snapshots older than this are refetched.
    pub snapshot_ttl: Duration,
    /// Upper bound of the random delay before each progress report.
    pub max_jitter: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            thresholds: Thresholds::default(),
            assets: AssetConfig::default(),
            snapshot_ttl: Duration::from_secs(300),
            max_jitter: MAX_JITTER,
        }
    }
}

impl From<&AppConfig> for DriverConfig {
    fn from(config: &AppConfig) -> Self {
        DriverConfig {
            thresholds: config.thresholds,
            assets: config.assets.clone(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub session: ActionSession,
    pub chart: FlowChart,
    pub receipts: Vec<StepReceipt>,
}

/// Runs one action to completion (or to the first failing step).
pub struct ActionDriver<'a, H, W: ?Sized, C: ?Sized> {
    portfolio: &'a H,
    wallet: &'a W,
    cache: &'a C,
    progress: TransactionProgress<ProgressCoordinator, RandomJitter>,
    config: DriverConfig,
    current_chain: ChainName,
}

impl<'a, H, W, C> ActionDriver<'a, H, W, C>
where
    H: PortfolioHelper,
    W: Wallet + ?Sized,
    C: PortfolioCache + ?Sized,
{
    pub fn new(
        portfolio: &'a H,
        wallet: &'a W,
        cache: &'a C,
        progress: ProgressCoordinator,
        config: DriverConfig,
        current_chain: &str,
    ) -> Self {
        let jitter = RandomJitter {
            max: config.max_jitter,
        };
        ActionDriver {
            portfolio,
            wallet,
            cache,
            progress: TransactionProgress::with_jitter(progress, jitter),
            config,
            current_chain: normalize_chain_name(current_chain),
        }
    }

    pub fn current_chain(&self) -> &str {
        &self.current_chain
    }

    pub fn coordinator(&self) -> &ProgressCoordinator {
        self.progress.sink()
    }

    pub async fn run(&mut self, action: &Action) -> Result<ActionOutcome, DriverError> {
        let address = self.wallet.address().to_lowercase();
        let name = action.name();
        info!(action = %name, address = %address, chain = %self.current_chain, "starting action");

        let snapshot = self.load_snapshot(&address).await?;
        let params = action.params(&snapshot, &self.current_chain);
        let chart = PortfolioFlowChartBuilder::new(self.portfolio, self.config.assets.clone()).build(name, &params)?;
        self.progress.sink().clear_all(&chart.node_ids()).await;

        self.check_amounts(action, &snapshot)?;

        let chains = step_chains(&chart);
        let key = ActionSession::key(&address, name);
        let mut session = match self.cache.get_session(&key).await? {
            Some(previous) if previous.can_resume(&chains) => {
                info!(session = %previous.id, "resuming unfinished action");
                previous
            }
            _ => ActionSession::new(name, &address, chains),
        };
        self.cache.set_session(&key, &session).await?;

        let mut receipts = Vec::new();
        while let Some(chain) = next_chain(&session.chains, &session.status, Some(&self.current_chain)) {
            let target = Chain::from_name(&chain);
            if chain != self.current_chain {
                self.wallet
                    .switch_chain(&target)
                    .await
                    .map_err(|e| DriverError::SwitchChain {
                        chain: chain.clone(),
                        source: e.into(),
                    })?;
                self.current_chain = chain.clone();
            }

            for node_id in chain_execution_order(&chart, &chain) {
                let Some(node) = chart.node(&node_id).filter(|n| is_step_node(n)) else {
                    continue;
                };
                let receipt = self
                    .wallet
                    .execute_step(&target, node)
                    .await
                    .map_err(|e| DriverError::Step {
                        chain: chain.clone(),
                        node_id: node_id.clone(),
                        source: e.into(),
                    })?;
                self.progress
                    .handle_transaction_progress(None, &node.id, receipt.trading_loss, &node.name)
                    .await;
                receipts.push(receipt);
            }

            session.status.mark_complete(&chain);
            self.cache.set_session(&key, &session).await?;
            debug!(chain = %chain, "chain leg complete");
        }

        info!(action = %name, steps = receipts.len(), "action complete");
        Ok(ActionOutcome {
            session,
            chart,
            receipts,
        })
    }

    async fn load_snapshot(&self, address: &str) -> Result<PortfolioSnapshot, DriverError> {
        if let Some(cached) = self.cache.get_snapshot(address).await? {
            if cached.is_fresh(self.config.snapshot_ttl, Utc::now()) {
                debug!("using cached portfolio snapshot");
                return Ok(cached);
            }
        }
        let snapshot = PortfolioSnapshot::fetch(self.portfolio, address)
            .await
            .map_err(|e| DriverError::Portfolio(e.into()))?;
        self.cache.set_snapshot(address, &snapshot).await?;
        Ok(snapshot)
    }

    fn check_amounts(&self, action: &Action, snapshot: &PortfolioSnapshot) -> Result<(), DriverError> {
        let thresholds = &self.config.thresholds;
        match action {
            Action::ZapIn {
                selected_token,
                amount,
            } => {
                let minimum = minimum_token_amount(
                    Some(selected_token.as_str()),
                    false,
                    self.portfolio.strategy(),
                    &snapshot.token_prices_mapping_table,
                    &self.current_chain,
                    thresholds,
                );
                if !minimum.is_finite() {
                    return Err(DriverError::MinimumUnavailable {
                        token: selected_token.clone(),
                    });
                }
                if *amount < minimum {
                    return Err(DriverError::BelowMinimum {
                        amount: *amount,
                        minimum,
                        unit: selected_token.split('-').next().unwrap_or_default().to_string(),
                    });
                }
            }
            Action::ClaimAndSwap { .. } => {
                let rewards = self.portfolio.sum_usd_denominated_values(&snapshot.pending_rewards);
                if rewards < thresholds.min_claim_amount {
                    return Err(DriverError::BelowMinimum {
                        amount: rewards,
                        minimum: thresholds.min_claim_amount,
                        unit: "USD".into(),
                    });
                }
            }
            Action::Rebalance { .. } => {
                // Empty filter: every chain's excess is reinvested.
                let reinvest = rebalance_reinvest_usd_amount(
                    Some(""),
                    &snapshot.usd_balance_dict,
                    &snapshot.pending_rewards,
                    Some(self.portfolio),
                );
                if !(reinvest >= thresholds.min_protocol_zap_in_usd) {
                    return Err(DriverError::BelowMinimum {
                        amount: reinvest,
                        minimum: thresholds.min_protocol_zap_in_usd,
                        unit: "USD".into(),
                    });
                }
            }
            Action::ZapOut { .. } | Action::Transfer { .. } | Action::Stake => {}
        }
        Ok(())
    }
}
