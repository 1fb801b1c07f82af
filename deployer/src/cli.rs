use clap::{Args, Parser, Subcommand};
use shared::Network;
use std::path::PathBuf;

use crate::explorer::{DEFAULT_COMPILER_VERSION, DEFAULT_OPTIMIZER_RUNS};

#[derive(Parser, Debug)]
#[command(name = "deployer")]
#[command(about = "Deployment utility for the POL crowdfund contract")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Publish a new contract instance from a compiled Hardhat artifact
    Deploy(DeployArgs),
    /// Verify deployed source on the network's block explorer
    Verify(VerifyArgs),
}

#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Path to the Hardhat artifact JSON
    #[arg(long)]
    pub artifact: PathBuf,

    #[arg(long, env = "POLYGON_MAINNET_RPC")]
    pub rpc_url: String,

    /// Funded deployment account
    #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
    pub private_key: String,

    #[arg(long, default_value_t = 1)]
    pub confirmations: usize,
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    #[arg(long)]
    pub address: String,

    /// Single-file Solidity source
    #[arg(long)]
    pub source: PathBuf,

    #[arg(long, default_value = "CrowdFund")]
    pub contract_name: String,

    #[arg(long, default_value = DEFAULT_COMPILER_VERSION)]
    pub compiler_version: String,

    #[arg(long, default_value_t = DEFAULT_OPTIMIZER_RUNS)]
    pub optimizer_runs: u32,

    #[arg(long)]
    pub no_optimizer: bool,

    #[arg(long, env = "POLYGONSCAN_API_KEY", hide_env_values = true)]
    pub api_key: String,

    #[arg(long, env = "CHAIN_NETWORK", default_value = "polygon")]
    pub network: Network,

    /// Override the explorer API endpoint derived from the network
    #[arg(long)]
    pub api_url: Option<String>,
}
