use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// EVM networks the crowdfund can be deployed to and contributed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Network {
    PolygonMainnet,
    PolygonAmoy,
    Localhost,
}

impl Network {
    pub fn chain_id(&self) -> u64 {
        match self {
            Network::PolygonMainnet => 137,
            Network::PolygonAmoy => 80002,
            Network::Localhost => 31337,
        }
    }

    /// Chain id as reported by injected wallets (`eth_chainId`), e.g. `0x89`
    pub fn chain_id_hex(&self) -> String {
        format!("{:#x}", self.chain_id())
    }

    pub fn name(&self) -> &'static str {
        match self {
            Network::PolygonMainnet => "Polygon Mainnet",
            Network::PolygonAmoy => "Polygon Amoy",
            Network::Localhost => "Localhost",
        }
    }

    pub fn currency_symbol(&self) -> &'static str {
        match self {
            Network::PolygonMainnet | Network::PolygonAmoy => "POL",
            Network::Localhost => "ETH",
        }
    }

    /// Etherscan-compatible explorer API, if the network has one
    pub fn explorer_api_url(&self) -> Option<&'static str> {
        match self {
            Network::PolygonMainnet => Some("https://api.polygonscan.com/api"),
            Network::PolygonAmoy => Some("https://api-amoy.polygonscan.com/api"),
            Network::Localhost => None,
        }
    }

    pub fn from_chain_id(chain_id: u64) -> Option<Self> {
        [Network::PolygonMainnet, Network::PolygonAmoy, Network::Localhost]
            .into_iter()
            .find(|network| network.chain_id() == chain_id)
    }
}

impl Default for Network {
    fn default() -> Self {
        Network::PolygonMainnet
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::PolygonMainnet => write!(f, "polygon"),
            Network::PolygonAmoy => write!(f, "amoy"),
            Network::Localhost => write!(f, "localhost"),
        }
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "polygon" | "mainnet" | "polygon-mainnet" | "matic" => Ok(Network::PolygonMainnet),
            "amoy" | "polygon-amoy" | "testnet" => Ok(Network::PolygonAmoy),
            "localhost" | "local" | "hardhat" => Ok(Network::Localhost),
            other => Err(format!("Unknown network: {}", other)),
        }
    }
}

/// Parse a chain id as wallets report it: hex (`0x89`) or decimal (`137`)
pub fn parse_chain_id(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}
