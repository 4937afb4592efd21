use std::collections::{BTreeMap, HashMap};

use crate::model::portfolio::RewardBalance;
use crate::model::{PortfolioDefinition, ProtocolAllocation, ProtocolDescriptor, ProtocolMode, TokenMeta};

const ARB_USDC: &str = "0xaf88d065e77c8cC2239327C5EDb3A432268e5831";
const ARB_USDT: &str = "0xFd086bC7CD5C481DCC9C85ebE478A1C0b69FCbb9";
const ARB_WETH: &str = "0x82aF49447D8a07e3bd95BD0d56f35241523fBab1";
const ARB_ARB: &str = "0x912CE59144191C1204E64559FE8253a0e49E6548";
const BASE_USDC: &str = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913";
const BASE_DOLA: &str = "0x4621b7A9c75199271F773Ebd9A499dbd165c3191";

fn single(chain: &str, name: &str, version: &str, token: TokenMeta) -> ProtocolDescriptor {
    ProtocolDescriptor {
        protocol_name: name.into(),
        protocol_version: version.into(),
        chain: chain.into(),
        symbol_list: vec![token.symbol.clone()],
        mode: ProtocolMode::Single,
        zap_in_token: Some(token.clone()),
        zap_out_token: Some(token),
        lp_tokens: vec![],
        asset_base_path: String::new(),
    }
}

fn lp(chain: &str, name: &str, version: &str, legs: [TokenMeta; 2]) -> ProtocolDescriptor {
    ProtocolDescriptor {
        protocol_name: name.into(),
        protocol_version: version.into(),
        chain: chain.into(),
        symbol_list: legs.iter().map(|t| t.symbol.clone()).collect(),
        mode: ProtocolMode::Lp,
        zap_in_token: None,
        zap_out_token: None,
        lp_tokens: legs.to_vec(),
        asset_base_path: String::new(),
    }
}

fn leaf(weight: f64, protocol: ProtocolDescriptor) -> ProtocolAllocation {
    ProtocolAllocation { weight, protocol }
}

/// A two-chain stablecoin/ETH portfolio with one idle (zero-weight) position.
pub fn example_portfolio() -> PortfolioDefinition {
    let usdc = TokenMeta::new("usdc", ARB_USDC, 6);
    let usdt = TokenMeta::new("usdt", ARB_USDT, 6);
    let weth = TokenMeta::new("weth", ARB_WETH, 18);
    let base_usdc = TokenMeta::new("usdc", BASE_USDC, 6);
    let dola = TokenMeta::new("dola", BASE_DOLA, 18);

    let mut strategy = BTreeMap::new();
    strategy.insert(
        "stablecoin".to_string(),
        BTreeMap::from([
            (
                "arbitrum".to_string(),
                vec![
                    leaf(0.25, single("arbitrum", "aave", "v3", usdc.clone())),
                    leaf(0.15, lp("arbitrum", "camelot", "v3", [usdc.clone(), usdt])),
                ],
            ),
            (
                "base".to_string(),
                vec![
                    leaf(0.2, lp("base", "aerodrome", "v2", [base_usdc.clone(), dola])),
                    leaf(0.1, single("base", "moonwell", "0", base_usdc)),
                ],
            ),
        ]),
    );
    strategy.insert(
        "eth".to_string(),
        BTreeMap::from([(
            "arbitrum".to_string(),
            vec![
                leaf(0.3, single("arbitrum", "aave", "v3", weth.clone())),
                leaf(0.0, single("arbitrum", "radiant", "v2", weth)),
            ],
        )]),
    );

    PortfolioDefinition {
        name: "Stable+ Vault".to_string(),
        description: Some(
            "Stablecoin lending and LP across Arbitrum and Base, with an ETH lending sleeve. \
             Rebalances when any position drifts more than 5% from target."
                .to_string(),
        ),
        strategy,
        entry_fee_rate: 0.0,
        swap_fee_rate: 0.00299,
        referral_fee_rate: 0.7,
        rebalance_threshold: 0.05,
        token_prices: HashMap::from([
            ("usdc".to_string(), 1.0),
            ("usdt".to_string(), 1.0),
            ("dola".to_string(), 0.998),
            ("weth".to_string(), 2500.0),
            ("arb".to_string(), 0.6),
        ]),
        positions: BTreeMap::from([
            ("arbitrum/aave/v3/usdc".to_string(), 400.0),
            ("arbitrum/camelot/v3/usdc-usdt".to_string(), 150.0),
            ("base/aerodrome/v2/usdc-dola".to_string(), 180.0),
            ("base/moonwell/0/usdc".to_string(), 90.0),
            ("arbitrum/aave/v3/weth".to_string(), 180.0),
        ]),
        rewards: BTreeMap::from([(
            ARB_ARB.to_string(),
            RewardBalance {
                symbol: "arb".to_string(),
                balance: 12.5,
            },
        )]),
        lock_up_period: 0,
    }
}

/// Print an example portfolio definition JSON to stdout.
pub fn run() -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&example_portfolio())?;
    println!("{json}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate;

    #[test]
    fn test_example_is_valid() {
        let portfolio = example_portfolio();
        assert!(validate::validate(&portfolio).is_ok());
        let json = serde_json::to_string(&portfolio).unwrap();
        let back: PortfolioDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(back, portfolio);
    }
}
