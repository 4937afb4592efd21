use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid ZAP_FLOW_ENV '{0}'. Use 'production' or 'local'.")]
    InvalidEnvironment(String),

    #[error("Invalid value '{value}' for {var}: expected a number")]
    InvalidNumber { var: &'static str, value: String },
}

/// Deployment environment. Local development uses lower thresholds so
/// small test deposits pass validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Local,
}

impl Environment {
    pub fn parse(value: Option<&str>) -> Result<Self, ConfigError> {
        match value.map(|v| v.trim().to_lowercase()).as_deref() {
            None | Some("") | Some("production") | Some("prod") => Ok(Environment::Production),
            Some("local") | Some("dev") | Some("development") => Ok(Environment::Local),
            Some(other) => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }
}

/// USD thresholds used to validate user-entered amounts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Smallest USD amount worth depositing into a single protocol.
    pub min_protocol_zap_in_usd: f64,
    /// Smallest USD amount worth bridging to a chain.
    pub min_bridge_usd: f64,
    /// Smallest pending-reward USD value worth claiming.
    pub min_claim_amount: f64,
}

impl Thresholds {
    pub const PRODUCTION: Thresholds = Thresholds {
        min_protocol_zap_in_usd: 3.0,
        min_bridge_usd: 20.0,
        min_claim_amount: 1.0,
    };

    pub const LOCAL: Thresholds = Thresholds {
        min_protocol_zap_in_usd: 0.5,
        min_bridge_usd: 5.0,
        min_claim_amount: 1.0,
    };

    pub fn for_environment(env: Environment) -> Self {
        match env {
            Environment::Production => Self::PRODUCTION,
            Environment::Local => Self::LOCAL,
        }
    }

    /// Environment defaults, then per-threshold overrides from
    /// `ZAP_FLOW_MIN_PROTOCOL_USD`, `ZAP_FLOW_MIN_BRIDGE_USD`, `ZAP_FLOW_MIN_CLAIM_AMOUNT`.
    pub fn from_lookup<F>(env: Environment, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut t = Self::for_environment(env);
        override_f64(&lookup, "ZAP_FLOW_MIN_PROTOCOL_USD", &mut t.min_protocol_zap_in_usd)?;
        override_f64(&lookup, "ZAP_FLOW_MIN_BRIDGE_USD", &mut t.min_bridge_usd)?;
        override_f64(&lookup, "ZAP_FLOW_MIN_CLAIM_AMOUNT", &mut t.min_claim_amount)?;
        Ok(t)
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::PRODUCTION
    }
}

fn override_f64<F>(lookup: &F, var: &'static str, slot: &mut f64) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(var) {
        *slot = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { var, value })?;
    }
    Ok(())
}

/// Static asset hosting prefix (e.g. "/all-weather-frontend" on GitHub Pages).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetConfig {
    pub base_path: String,
}

impl AssetConfig {
    pub fn asset_path(&self, path: &str) -> String {
        let clean = path.strip_prefix('/').unwrap_or(path);
        format!("{}/{}", self.base_path, clean)
    }

    pub fn chain_image(&self, chain: &str) -> String {
        self.asset_path(&format!("/chainPicturesWebp/{chain}.webp"))
    }
}

/// Everything the CLI and driver read from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub thresholds: Thresholds,
    pub assets: AssetConfig,
    pub cache_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = Environment::parse(lookup("ZAP_FLOW_ENV").as_deref())?;
        let thresholds = Thresholds::from_lookup(environment, &lookup)?;
        let assets = AssetConfig {
            base_path: lookup("ZAP_FLOW_ASSET_BASE_PATH").unwrap_or_default(),
        };
        let cache_dir = lookup("ZAP_FLOW_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_cache_dir);
        Ok(AppConfig {
            environment,
            thresholds,
            assets,
            cache_dir,
        })
    }
}

#[cfg(feature = "full")]
fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("zap-flow")
}

#[cfg(not(feature = "full"))]
fn default_cache_dir() -> PathBuf {
    PathBuf::from(".zap-flow")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_defaults_to_production() {
        let cfg = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.environment, Environment::Production);
        assert_eq!(cfg.thresholds, Thresholds::PRODUCTION);
        assert_eq!(cfg.assets.base_path, "");
    }

    #[test]
    fn test_local_lowers_thresholds_and_overrides_apply() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("ZAP_FLOW_ENV", "local"),
            ("ZAP_FLOW_MIN_BRIDGE_USD", "50"),
        ]))
        .unwrap();
        assert_eq!(cfg.thresholds.min_protocol_zap_in_usd, 0.5);
        assert_eq!(cfg.thresholds.min_bridge_usd, 50.0);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(AppConfig::from_lookup(lookup(&[("ZAP_FLOW_ENV", "staging")])).is_err());
        let err = AppConfig::from_lookup(lookup(&[("ZAP_FLOW_MIN_PROTOCOL_USD", "abc")]))
            .unwrap_err();
        assert!(err.to_string().contains("ZAP_FLOW_MIN_PROTOCOL_USD"));
    }

    #[test]
    fn test_asset_path() {
        let assets = AssetConfig {
            base_path: "/all-weather-frontend".into(),
        };
        assert_eq!(
            assets.chain_image("base"),
            "/all-weather-frontend/chainPicturesWebp/base.webp"
        );
        assert_eq!(AssetConfig::default().asset_path("x.webp"), "/x.webp");
    }
}
