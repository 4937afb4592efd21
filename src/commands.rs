use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use zap_flow::config::AppConfig;
use zap_flow::driver::{Action, ActionDriver, DriverConfig, DryRunWallet, FileCache};
use zap_flow::engine::{self, ActionName, ActionParams, PortfolioFlowChartBuilder, RebalanceParams};
use zap_flow::model::{ChainStatus, PortfolioDefinition, TokenMeta};
use zap_flow::progress::ProgressCoordinator;
use zap_flow::{validate, visualize};

use crate::cli::{ChartFormat, TokenArgs};

fn load_portfolio(path: &Path, config: &AppConfig) -> Result<PortfolioDefinition> {
    let portfolio = validate::load_and_validate(path).map_err(|errs| {
        anyhow::anyhow!(
            "Invalid portfolio definition:\n{}",
            errs.iter()
                .map(|e| format!("  - {e}"))
                .collect::<Vec<_>>()
                .join("\n")
        )
    })?;
    Ok(portfolio.with_asset_base_path(&config.assets.base_path))
}

/// Parse "symbol-address-decimals" (address and decimals optional).
fn parse_token(spec: &str) -> Result<TokenMeta> {
    let mut parts = spec.split('-');
    let symbol = parts.next().filter(|s| !s.is_empty()).context("token symbol is empty")?;
    let address = parts.next().unwrap_or_default();
    let decimals = match parts.next() {
        Some(d) => d.parse().with_context(|| format!("invalid decimals in token '{spec}'"))?,
        None => 18,
    };
    Ok(TokenMeta::new(symbol, address, decimals))
}

// ── order ────────────────────────────────────────────────────────────

pub fn order(chains: &[String], done: &[String], current: Option<&str>) -> Result<()> {
    let status: ChainStatus = done.iter().map(|c| (c.as_str(), true)).collect();
    let sorted = engine::sort_chains(chains, &status, current);
    println!("Order: {}", sorted.join(" -> "));
    match engine::next_chain(chains, &status, current) {
        Some(next) => println!("Next:  {next}"),
        None => println!("Next:  (all chains complete)"),
    }
    Ok(())
}

// ── minimum ──────────────────────────────────────────────────────────

pub fn minimum(file: &Path, token: &str, skip_bridge: bool, chain: &str) -> Result<()> {
    let config = AppConfig::from_env()?;
    let portfolio = load_portfolio(file, &config)?;
    let minimum = engine::minimum_token_amount(
        Some(token),
        skip_bridge,
        &portfolio.strategy,
        &portfolio.token_prices,
        chain,
        &config.thresholds,
    );
    let symbol = token.split('-').next().unwrap_or(token);
    if minimum.is_finite() {
        println!("Minimum zap-in: {minimum:.6} {symbol} ({:?} thresholds)", config.environment);
        Ok(())
    } else {
        anyhow::bail!("No minimum for {symbol}: missing price or all weights are zero (got {minimum})")
    }
}

// ── flowchart ────────────────────────────────────────────────────────

pub fn flowchart(
    file: &Path,
    action: &str,
    tokens: &TokenArgs,
    format: ChartFormat,
    output: Option<&Path>,
) -> Result<()> {
    let config = AppConfig::from_env()?;
    let portfolio = load_portfolio(file, &config)?;
    let action: ActionName = action.parse()?;

    let mut params = ActionParams {
        output_token: tokens.output_token.clone().unwrap_or_default(),
        output_token_address: tokens.output_token_address.clone().unwrap_or_default(),
        ..Default::default()
    };
    if let Some(token) = &tokens.token {
        let token = parse_token(token)?;
        params.token_in_symbol = token.symbol;
        params.token_in_address = token.address;
    }
    if action.is_rebalance() {
        let middle = parse_token(
            tokens
                .middle_token
                .as_deref()
                .context("--middle-token is required for rebalance actions")?,
        )?;
        let balances = portfolio.rebalance_balance()?.usd_balance_dict;
        let zap_out_chains = zap_flow::model::allocation::chains_of(&portfolio.strategy);
        params.token_in_symbol = middle.symbol.clone();
        params.token_in_address = middle.address.clone();
        params.rebalance = Some(RebalanceParams {
            balances,
            middle_tokens: zap_out_chains.iter().map(|c| (c.clone(), middle.clone())).collect(),
            zap_out_chains,
            current_chain: tokens.chain.clone(),
        });
    }

    let chart = PortfolioFlowChartBuilder::new(&portfolio, config.assets.clone()).build(action, &params)?;
    let title = format!("{} · {action}", portfolio.name);
    visualize::render(&chart, &title, format.as_str(), output)
}

// ── simulate ─────────────────────────────────────────────────────────

pub struct SimulateArgs<'a> {
    pub file: &'a Path,
    pub action: &'a str,
    pub tokens: &'a TokenArgs,
    pub amount: f64,
    pub recipient: Option<&'a str>,
    pub address: &'a str,
    pub cache_dir: Option<PathBuf>,
    pub output: Option<&'a Path>,
}

fn build_action(args: &SimulateArgs<'_>) -> Result<Action> {
    let name: ActionName = args.action.parse()?;
    let output_token = || args.tokens.output_token.clone().context("--output-token is required");
    Ok(match name {
        ActionName::ZapIn => Action::ZapIn {
            selected_token: args.tokens.token.clone().context("--token is required for zapIn")?,
            amount: args.amount,
        },
        ActionName::ZapOut => Action::ZapOut {
            output_token: output_token()?,
            output_token_address: args.tokens.output_token_address.clone().unwrap_or_default(),
        },
        ActionName::ClaimAndSwap => Action::ClaimAndSwap {
            output_token: output_token()?,
            output_token_address: args.tokens.output_token_address.clone().unwrap_or_default(),
        },
        ActionName::Transfer => Action::Transfer {
            recipient: args.recipient.context("--recipient is required for transfer")?.to_string(),
        },
        ActionName::Stake => Action::Stake,
        ActionName::Rebalance | ActionName::CrossChainRebalance | ActionName::LocalRebalance => {
            Action::Rebalance {
                middle_token: parse_token(
                    args.tokens
                        .middle_token
                        .as_deref()
                        .context("--middle-token is required for rebalance")?,
                )?,
            }
        }
    })
}

pub fn simulate(args: SimulateArgs<'_>) -> Result<()> {
    let mut config = AppConfig::from_env()?;
    if let Some(dir) = &args.cache_dir {
        config.cache_dir = dir.clone();
    }
    let portfolio = load_portfolio(args.file, &config)?;
    let action = build_action(&args)?;

    let rt = tokio::runtime::Runtime::new().context("creating tokio runtime")?;
    let outcome = rt.block_on(async {
        let wallet = DryRunWallet::new(args.address);
        let cache = FileCache::new(&config.cache_dir);
        let mut driver = ActionDriver::new(
            &portfolio,
            &wallet,
            &cache,
            ProgressCoordinator::new(),
            DriverConfig::from(&config),
            &args.tokens.chain,
        );
        driver.run(&action).await
    })?;

    println!(
        "Session {}: {} steps across {} chain(s)",
        outcome.session.id,
        outcome.receipts.len(),
        outcome.session.chains.len()
    );
    for receipt in &outcome.receipts {
        println!("  {}  {}", receipt.tx_hash, receipt.node_id);
    }

    if let Some(path) = args.output {
        let json = serde_json::json!({
            "session": outcome.session,
            "receipts": outcome.receipts,
            "chart": outcome.chart,
        });
        std::fs::write(path, serde_json::to_string_pretty(&json)?)
            .with_context(|| format!("writing {}", path.display()))?;
        eprintln!("Written to {}", path.display());
    }
    Ok(())
}
