use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How a protocol position is entered: a single asset, or an LP pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ProtocolMode {
    #[serde(rename = "single")]
    Single,
    #[serde(rename = "LP")]
    Lp,
}

impl std::fmt::Display for ProtocolMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolMode::Single => write!(f, "single"),
            ProtocolMode::Lp => write!(f, "LP"),
        }
    }
}

/// A resolved token: symbol, contract address, decimals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TokenMeta {
    pub symbol: String,
    pub address: String,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
}

fn default_decimals() -> u8 {
    18
}

impl TokenMeta {
    pub fn new(symbol: impl Into<String>, address: impl Into<String>, decimals: u8) -> Self {
        TokenMeta {
            symbol: symbol.into(),
            address: address.into(),
            decimals,
        }
    }

    /// Case-insensitive address comparison.
    pub fn same_address(&self, address: &str) -> bool {
        self.address.eq_ignore_ascii_case(address)
    }
}

/// A yield protocol position that can be zapped into and out of.
///
/// Implementors supply identity and the token-resolution callbacks; the flow
/// chart generator in [`crate::engine::steps`] is available on every
/// implementor.
pub trait Protocol {
    fn chain(&self) -> &str;
    fn protocol_name(&self) -> &str;
    fn protocol_version(&self) -> &str;
    fn symbol_list(&self) -> &[String];
    fn mode(&self) -> ProtocolMode;

    /// Best token to swap the user's input into before depositing.
    fn best_token_to_zap_in(&self, input_token: &str, token_in_address: &str, decimals: u8)
    -> TokenMeta;
    /// Token the position withdraws into.
    fn best_token_to_zap_out(&self) -> TokenMeta;
    /// LP legs to acquire when zapping in.
    fn lp_tokens_to_zap_in(&self) -> Vec<TokenMeta>;
    /// LP legs received when zapping out.
    fn lp_tokens_to_zap_out(&self) -> Vec<TokenMeta>;

    /// `{chain}/{protocolName}/{protocolVersion}/{symbols}`. Globally unique
    /// per position; flow node ids embed it.
    fn unique_id(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.chain(),
            self.protocol_name(),
            self.protocol_version(),
            self.symbol_list().join("-")
        )
    }

    /// Identifier used before versions were part of the id. Cached balance
    /// dictionaries written by older clients are keyed by it.
    fn old_unique_id(&self) -> String {
        format!(
            "{}/{}/{}",
            self.chain(),
            self.protocol_name(),
            self.symbol_list().join("-")
        )
    }

    fn image_src(&self) -> String {
        format!("/projectPictures/{}.webp", self.protocol_name())
    }
}

/// A protocol described entirely by data: identity plus the tokens each
/// resolution callback returns. Used by portfolio definition files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProtocolDescriptor {
    pub protocol_name: String,
    #[serde(default = "default_version")]
    pub protocol_version: String,
    pub chain: String,
    pub symbol_list: Vec<String>,
    pub mode: ProtocolMode,
    /// Token a single-asset zap-in swaps into.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zap_in_token: Option<TokenMeta>,
    /// Token a single-asset zap-out withdraws into.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zap_out_token: Option<TokenMeta>,
    /// LP legs (same for both directions).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lp_tokens: Vec<TokenMeta>,
    /// Hosting prefix for project pictures, e.g. "/all-weather-frontend".
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub asset_base_path: String,
}

fn default_version() -> String {
    "0".into()
}

impl ProtocolDescriptor {
    /// The first symbol doubles as the zap token when none is configured.
    fn fallback_token(&self) -> TokenMeta {
        let symbol = self.symbol_list.first().cloned().unwrap_or_default();
        TokenMeta::new(symbol, String::new(), default_decimals())
    }
}

impl Protocol for ProtocolDescriptor {
    fn chain(&self) -> &str {
        &self.chain
    }

    fn protocol_name(&self) -> &str {
        &self.protocol_name
    }

    fn protocol_version(&self) -> &str {
        &self.protocol_version
    }

    fn symbol_list(&self) -> &[String] {
        &self.symbol_list
    }

    fn mode(&self) -> ProtocolMode {
        self.mode
    }

    fn best_token_to_zap_in(
        &self,
        _input_token: &str,
        _token_in_address: &str,
        _decimals: u8,
    ) -> TokenMeta {
        self.zap_in_token
            .clone()
            .unwrap_or_else(|| self.fallback_token())
    }

    fn best_token_to_zap_out(&self) -> TokenMeta {
        self.zap_out_token
            .clone()
            .or_else(|| self.zap_in_token.clone())
            .unwrap_or_else(|| self.fallback_token())
    }

    fn lp_tokens_to_zap_in(&self) -> Vec<TokenMeta> {
        self.lp_tokens.clone()
    }

    fn lp_tokens_to_zap_out(&self) -> Vec<TokenMeta> {
        self.lp_tokens.clone()
    }

    fn image_src(&self) -> String {
        let path = format!("projectPictures/{}.webp", self.protocol_name);
        format!("{}/{}", self.asset_base_path, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> ProtocolDescriptor {
        ProtocolDescriptor {
            protocol_name: "aave".into(),
            protocol_version: "3".into(),
            chain: "arbitrum".into(),
            symbol_list: vec!["usdc".into()],
            mode: ProtocolMode::Single,
            zap_in_token: Some(TokenMeta::new("usdc", "0xAF88", 6)),
            zap_out_token: None,
            lp_tokens: vec![],
            asset_base_path: String::new(),
        }
    }

    #[test]
    fn test_ids() {
        let p = descriptor();
        assert_eq!(p.unique_id(), "arbitrum/aave/3/usdc");
        assert_eq!(p.old_unique_id(), "arbitrum/aave/usdc");
        assert_eq!(p.image_src(), "/projectPictures/aave.webp");
    }

    #[test]
    fn test_zap_out_falls_back_to_zap_in_token() {
        let p = descriptor();
        assert_eq!(p.best_token_to_zap_out().address, "0xAF88");
        assert!(p.best_token_to_zap_out().same_address("0xaf88"));
    }

    #[test]
    fn test_mode_serde_names() {
        assert_eq!(serde_json::to_string(&ProtocolMode::Lp).unwrap(), "\"LP\"");
        let m: ProtocolMode = serde_json::from_str("\"single\"").unwrap();
        assert_eq!(m, ProtocolMode::Single);
    }
}
