//! Configuration management

use std::{path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Explorer API configuration, one entry per chain
    pub explorers: ExplorersConfig,
    /// Token address set and decimals
    pub token: TokenConfig,
    /// Supply cache configuration
    pub cache: CacheConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Explorer clients, one per chain the token lives on
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorersConfig {
    /// BSC-chain explorer (token contract, project wallet, burn address)
    pub bsc: ExplorerConfig,
    /// ETH-chain explorer (vesting contract)
    pub eth: ExplorerConfig,
}

impl Default for ExplorersConfig {
    fn default() -> Self {
        Self {
            bsc: ExplorerConfig::with_base_url("https://api.bscscan.com/api"),
            eth: ExplorerConfig::with_base_url("https://api.etherscan.io/api"),
        }
    }
}

/// A single explorer API endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    /// API key. Required; startup fails when empty.
    pub api_key: String,
    /// Base URL of the explorer API
    pub base_url: String,
    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.etherscan.io/api".to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

impl ExplorerConfig {
    fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            ..Self::default()
        }
    }
}

/// Token address set. Fixed per deployment; the defaults are the
/// production contract and wallets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Token contract address
    pub contract: String,
    /// Project wallet address (excluded from circulating supply)
    pub project_wallet: String,
    /// Vesting contract address on the ETH chain
    pub vesting_contract: String,
    /// Address where tokens go to die
    pub burn_address: String,
    /// Token decimals: amounts are divided by 10^decimals for display
    pub decimals: u32,
    /// Fetch burn and project balances in one batched explorer call
    /// instead of one call per holder
    pub batch_balances: bool,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            contract: "0x8f1e60d84182db487ac235acc65825e50b5477a1".to_string(),
            project_wallet: "0x30DD781D2143fE32C36E894a049898f268b82092".to_string(),
            vesting_contract: "0xc598d81c62f6391b2412d02a78fa3f3affe58b52".to_string(),
            burn_address: "0x000000000000000000000000000000000000dead".to_string(),
            decimals: 18,
            batch_balances: false,
        }
    }
}

/// Supply cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How long a computed supply report stays fresh
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist, cannot be
    /// parsed, or fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        // Load from file if provided
        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // Merge environment variables (SUPPLY_GATEWAY_ prefix)
        figment = figment.merge(Env::prefixed("SUPPLY_GATEWAY_").split("__"));

        let config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate required fields. Missing explorer credentials are fatal
    /// here rather than surfacing as runtime query failures.
    pub fn validate(&self) -> Result<()> {
        for (chain, explorer) in [("bsc", &self.explorers.bsc), ("eth", &self.explorers.eth)] {
            if explorer.api_key.is_empty() {
                return Err(Error::Config(format!(
                    "Missing api_key for explorers.{chain} (set SUPPLY_GATEWAY_EXPLORERS__{}__API_KEY)",
                    chain.to_uppercase()
                )));
            }
            Url::parse(&explorer.base_url).map_err(|e| {
                Error::Config(format!(
                    "Invalid base_url {:?} for explorers.{chain}: {e}",
                    explorer.base_url
                ))
            })?;
        }

        let t = &self.token;
        for (field, value) in [
            ("contract", &t.contract),
            ("project_wallet", &t.project_wallet),
            ("vesting_contract", &t.vesting_contract),
            ("burn_address", &t.burn_address),
        ] {
            if value.is_empty() {
                return Err(Error::Config(format!("token.{field} must not be empty")));
            }
        }

        if self.cache.ttl.is_zero() {
            return Err(Error::Config("cache.ttl must be positive".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;

    use super::*;

    fn configured() -> Config {
        let mut config = Config::default();
        config.explorers.bsc.api_key = "bsc-key".to_string();
        config.explorers.eth.api_key = "eth-key".to_string();
        config
    }

    #[test]
    fn defaults_match_deployment() {
        let config = Config::default();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.cache.ttl, Duration::from_secs(60));
        assert_eq!(config.token.decimals, 18);
        assert!(!config.token.batch_balances);
        assert_eq!(config.explorers.bsc.timeout, Duration::from_secs(5));
        assert_eq!(config.explorers.bsc.base_url, "https://api.bscscan.com/api");
        assert_eq!(config.explorers.eth.base_url, "https://api.etherscan.io/api");
    }

    #[test]
    fn validate_rejects_missing_api_key() {
        let config = Config::default();
        let err = config.validate().expect_err("empty api_key must fail");
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("api_key"));
    }

    #[test]
    fn validate_rejects_bad_base_url() {
        let mut config = configured();
        config.explorers.eth.base_url = "not a url".to_string();
        let err = config.validate().expect_err("bad URL must fail");
        assert!(err.to_string().contains("base_url"));
    }

    #[test]
    fn validate_rejects_empty_address() {
        let mut config = configured();
        config.token.burn_address = String::new();
        let err = config.validate().expect_err("empty address must fail");
        assert!(err.to_string().contains("burn_address"));
    }

    #[test]
    fn validate_accepts_complete_config() {
        configured().validate().expect("complete config is valid");
    }

    #[test]
    fn load_merges_yaml_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".yaml")
            .tempfile()
            .expect("create temp config");
        writeln!(
            file,
            concat!(
                "server:\n",
                "  port: 9090\n",
                "cache:\n",
                "  ttl: 30s\n",
                "explorers:\n",
                "  bsc:\n",
                "    api_key: file-bsc-key\n",
                "  eth:\n",
                "    api_key: file-eth-key\n",
            )
        )
        .expect("write temp config");

        let config = Config::load(Some(file.path())).expect("load yaml config");

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.cache.ttl, Duration::from_secs(30));
        assert_eq!(config.explorers.bsc.api_key, "file-bsc-key");
        // Untouched sections keep their defaults
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.token.decimals, 18);
    }

    #[test]
    fn load_rejects_missing_file() {
        let err = Config::load(Some(Path::new("/nonexistent/supply.yaml")))
            .expect_err("missing file must fail");
        assert!(err.to_string().contains("not found"));
    }
}
