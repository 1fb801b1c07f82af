/// Relay configuration module
/// Loads server, chain and confirmation settings from the environment

use ethers::types::Address;
use shared::Network;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// HTTP listener configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

impl ServerConfig {
    fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = lookup("PORT")
            .unwrap_or_else(|| "5000".to_string())
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidConfig(format!("Invalid PORT: {}", e)))?;

        let cors_origins = lookup("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        Ok(ServerConfig {
            host,
            port,
            cors_origins,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Chain client configuration: where to send, what to call, who signs
#[derive(Clone)]
pub struct ChainConfig {
    pub network: Network,
    pub chain_id: u64,
    pub rpc_url: String,
    pub private_key: String,
    pub contract_address: Address,
    pub abi_path: Option<PathBuf>,
}

impl fmt::Debug for ChainConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainConfig")
            .field("network", &self.network)
            .field("chain_id", &self.chain_id)
            .field("rpc_url", &self.rpc_url)
            .field("private_key", &"<redacted>")
            .field("contract_address", &self.contract_address)
            .field("abi_path", &self.abi_path)
            .finish()
    }
}

impl ChainConfig {
    fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let network = match lookup("CHAIN_NETWORK") {
            Some(raw) => Network::from_str(&raw).map_err(ConfigError::InvalidConfig)?,
            None => Network::PolygonMainnet,
        };

        let chain_id = match lookup("CHAIN_ID") {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|e| ConfigError::InvalidConfig(format!("Invalid CHAIN_ID: {}", e)))?,
            None => network.chain_id(),
        };

        let rpc_url = required(lookup, "POLYGON_MAINNET_RPC")?;
        let private_key = required(lookup, "PRIVATE_KEY")?;

        let raw_address = required(lookup, "CONTRACT_ADDRESS")?;
        let contract_address = raw_address.trim().parse::<Address>().map_err(|_| {
            ConfigError::InvalidConfig(format!("Invalid CONTRACT_ADDRESS: {}", raw_address))
        })?;

        let abi_path = lookup("CONTRACT_ABI_PATH")
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        Ok(ChainConfig {
            network,
            chain_id,
            rpc_url,
            private_key,
            contract_address,
            abi_path,
        })
    }
}

/// How the contribute endpoint treats on-chain confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationMode {
    /// Respond once broadcast; a background watcher records the outcome
    Async,
    /// Hold the request open until confirmed or timed out
    Blocking,
}

impl FromStr for ConfirmationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "async" => Ok(ConfirmationMode::Async),
            "blocking" | "sync" => Ok(ConfirmationMode::Blocking),
            other => Err(format!("Unknown confirmation mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfirmationConfig {
    pub mode: ConfirmationMode,
    pub timeout: Duration,
    pub confirmations: usize,
    pub record_ttl: Duration,
    pub record_capacity: u64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            mode: ConfirmationMode::Async,
            timeout: Duration::from_secs(120),
            confirmations: 1,
            record_ttl: Duration::from_secs(3600),
            record_capacity: 10_000,
        }
    }
}

impl ConfirmationConfig {
    fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let mode = match lookup("RELAY_CONFIRMATION_MODE") {
            Some(raw) => ConfirmationMode::from_str(&raw).map_err(ConfigError::InvalidConfig)?,
            None => defaults.mode,
        };

        let timeout_secs = parse_or(lookup, "RELAY_CONFIRMATION_TIMEOUT_SECS", 120u64)?;
        if !(1..=3600).contains(&timeout_secs) {
            return Err(ConfigError::InvalidConfig(
                "Confirmation timeout must be between 1 and 3600 seconds".to_string(),
            ));
        }

        let confirmations = parse_or(lookup, "RELAY_CONFIRMATIONS", 1usize)?;
        if !(1..=64).contains(&confirmations) {
            return Err(ConfigError::InvalidConfig(
                "Confirmations must be between 1 and 64".to_string(),
            ));
        }

        let record_ttl_secs = parse_or(lookup, "RELAY_RECORD_TTL_SECS", 3600u64)?;
        let record_capacity = parse_or(lookup, "RELAY_RECORD_CAPACITY", 10_000u64)?;
        if record_ttl_secs == 0 || record_capacity == 0 {
            return Err(ConfigError::InvalidConfig(
                "Record TTL and capacity must be positive".to_string(),
            ));
        }

        Ok(ConfirmationConfig {
            mode,
            timeout: Duration::from_secs(timeout_secs),
            confirmations,
            record_ttl: Duration::from_secs(record_ttl_secs),
            record_capacity,
        })
    }
}

/// Service configuration combining all settings
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub server: ServerConfig,
    pub chain: ChainConfig,
    pub confirmation: ConfirmationConfig,
}

impl RelayConfig {
    /// Load full relay configuration from process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server = ServerConfig::from_lookup(&lookup)?;
        let chain = ChainConfig::from_lookup(&lookup)?;
        let confirmation = ConfirmationConfig::from_lookup(&lookup)?;

        info!(
            network = %chain.network,
            chain_id = chain.chain_id,
            contract = ?chain.contract_address,
            mode = ?confirmation.mode,
            timeout_secs = confirmation.timeout.as_secs(),
            confirmations = confirmation.confirmations,
            "Relay configuration loaded"
        );

        Ok(RelayConfig {
            server,
            chain,
            confirmation,
        })
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnv(key.to_string()))
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidConfig(format!("Invalid {}: {} ({})", key, raw, e))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const CONTRACT: &str = "0x6947a66460E47D0DABf65269A49c9A7b384B989d";

    fn base_env() -> HashMap<&'static str, String> {
        HashMap::from([
            ("POLYGON_MAINNET_RPC", "https://polygon-rpc.com".to_string()),
            (
                "PRIVATE_KEY",
                "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318".to_string(),
            ),
            ("CONTRACT_ADDRESS", CONTRACT.to_string()),
        ])
    }

    fn load(env: &HashMap<&'static str, String>) -> Result<RelayConfig, ConfigError> {
        RelayConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&base_env()).expect("should load with defaults");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.bind_addr(), "0.0.0.0:5000");
        assert_eq!(config.server.cors_origins, vec!["http://localhost:3000"]);
        assert_eq!(config.chain.network, Network::PolygonMainnet);
        assert_eq!(config.chain.chain_id, 137);
        assert_eq!(config.chain.contract_address, CONTRACT.parse::<Address>().unwrap());
        assert!(config.chain.abi_path.is_none());
        assert_eq!(config.confirmation.mode, ConfirmationMode::Async);
        assert_eq!(config.confirmation.timeout, Duration::from_secs(120));
        assert_eq!(config.confirmation.confirmations, 1);
    }

    #[test]
    fn test_missing_private_key() {
        let mut env = base_env();
        env.remove("PRIVATE_KEY");
        match load(&env) {
            Err(ConfigError::MissingEnv(key)) => assert_eq!(key, "PRIVATE_KEY"),
            other => panic!("expected missing PRIVATE_KEY, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_contract_address() {
        let mut env = base_env();
        env.insert("CONTRACT_ADDRESS", "not-an-address".to_string());
        assert!(matches!(load(&env), Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn test_blocking_mode_and_timeout_bounds() {
        let mut env = base_env();
        env.insert("RELAY_CONFIRMATION_MODE", "blocking".to_string());
        env.insert("RELAY_CONFIRMATION_TIMEOUT_SECS", "30".to_string());
        let config = load(&env).unwrap();
        assert_eq!(config.confirmation.mode, ConfirmationMode::Blocking);
        assert_eq!(config.confirmation.timeout, Duration::from_secs(30));

        env.insert("RELAY_CONFIRMATION_TIMEOUT_SECS", "0".to_string());
        assert!(matches!(load(&env), Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn test_network_selects_chain_id() {
        let mut env = base_env();
        env.insert("CHAIN_NETWORK", "amoy".to_string());
        assert_eq!(load(&env).unwrap().chain.chain_id, 80002);

        env.insert("CHAIN_ID", "31337".to_string());
        assert_eq!(load(&env).unwrap().chain.chain_id, 31337);
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let config = load(&base_env()).unwrap();
        let rendered = format!("{:?}", config.chain);
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("4c0883a6"));
    }

    #[test]
    fn test_cors_origins_split() {
        let mut env = base_env();
        env.insert(
            "CORS_ALLOWED_ORIGINS",
            "http://localhost:3000, https://pol-crowdfund.vercel.app,".to_string(),
        );
        let config = load(&env).unwrap();
        assert_eq!(
            config.server.cors_origins,
            vec!["http://localhost:3000", "https://pol-crowdfund.vercel.app"]
        );
    }
}
