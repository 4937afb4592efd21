use serde::Deserialize;
use wasm_bindgen::prelude::*;

use crate::config::{AssetConfig, Thresholds};
use crate::engine::{self, ActionParams, PortfolioFlowChartBuilder};
use crate::model::{ChainName, ChainStatus, PortfolioDefinition};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChainOrderRequest {
    /// `null` reads as an empty list.
    #[serde(default)]
    chains: Option<Vec<ChainName>>,
    #[serde(default)]
    status: ChainStatus,
    #[serde(default)]
    current_chain: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MinimumRequest {
    portfolio: PortfolioDefinition,
    selected_token: Option<String>,
    #[serde(default)]
    skip_bridge: bool,
    current_chain: String,
    #[serde(default)]
    thresholds: Thresholds,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlowChartRequest {
    portfolio: PortfolioDefinition,
    action: String,
    #[serde(default)]
    params: ActionParams,
    #[serde(default)]
    asset_base_path: String,
}

fn error_json(message: impl std::fmt::Display) -> String {
    serde_json::json!({ "error": message.to_string() }).to_string()
}

fn parse<'a, T: Deserialize<'a>>(json: &'a str) -> Result<T, String> {
    serde_json::from_str(json).map_err(|e| error_json(format!("JSON parse error: {e}")))
}

#[wasm_bindgen]
pub fn sort_chains_json(json: &str) -> String {
    let req: ChainOrderRequest = match parse(json) {
        Ok(r) => r,
        Err(e) => return e,
    };
    let chains = req.chains.unwrap_or_default();
    let sorted = engine::sort_chains(&chains, &req.status, req.current_chain.as_deref());
    serde_json::json!(sorted).to_string()
}

#[wasm_bindgen]
pub fn next_chain_json(json: &str) -> String {
    let req: ChainOrderRequest = match parse(json) {
        Ok(r) => r,
        Err(e) => return e,
    };
    let chains = req.chains.unwrap_or_default();
    let next = engine::next_chain(&chains, &req.status, req.current_chain.as_deref());
    serde_json::json!(next).to_string()
}

/// Non-finite results come back as `null`; JSON has no NaN.
#[wasm_bindgen]
pub fn minimum_token_amount_json(json: &str) -> String {
    let req: MinimumRequest = match parse(json) {
        Ok(r) => r,
        Err(e) => return e,
    };
    let minimum = engine::minimum_token_amount(
        req.selected_token.as_deref(),
        req.skip_bridge,
        &req.portfolio.strategy,
        &req.portfolio.token_prices,
        &req.current_chain,
        &req.thresholds,
    );
    serde_json::json!({ "minimum": minimum.is_finite().then_some(minimum) }).to_string()
}

#[wasm_bindgen]
pub fn flow_chart_json(json: &str) -> String {
    let req: FlowChartRequest = match parse(json) {
        Ok(r) => r,
        Err(e) => return e,
    };
    let action = match req.action.parse() {
        Ok(a) => a,
        Err(e) => return error_json(e),
    };
    let assets = AssetConfig {
        base_path: req.asset_base_path.clone(),
    };
    let portfolio = req.portfolio.with_asset_base_path(&req.asset_base_path);
    match PortfolioFlowChartBuilder::new(&portfolio, assets).build(action, &req.params) {
        Ok(chart) => serde_json::to_string(&chart).unwrap_or_else(error_json),
        Err(e) => error_json(e),
    }
}

#[wasm_bindgen]
pub fn get_schema() -> String {
    crate::schema::get_schema_json()
}
