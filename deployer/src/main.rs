use anyhow::{anyhow, Context, Result};
use clap::Parser;
use colored::Colorize;
use ethers::types::Address;
use std::fs;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use deployer::cli::{Cli, Command, DeployArgs, VerifyArgs};
use deployer::{ContractArtifact, DeployTarget, ExplorerClient, VerificationRequest, VerificationStatus};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("deployer=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    println!("{}", "=".repeat(80).cyan());
    println!("{}", "POL Crowdfund Deployer".bold().cyan());
    println!("{}", "=".repeat(80).cyan());
    println!();

    let start_time = Instant::now();

    match cli.command {
        Command::Deploy(args) => run_deploy(args).await?,
        Command::Verify(args) => run_verify(args).await?,
    }

    println!();
    println!(
        "{} Finished in {:.2}s",
        "✓".green().bold(),
        start_time.elapsed().as_secs_f64()
    );

    Ok(())
}

async fn run_deploy(args: DeployArgs) -> Result<()> {
    println!("{} Loading artifact: {}", "ℹ".blue(), args.artifact.display());
    let artifact = ContractArtifact::load(&args.artifact)?;

    let target = DeployTarget {
        rpc_url: args.rpc_url,
        private_key: args.private_key,
        confirmations: args.confirmations,
    };

    println!(
        "{} Deploying {} ({} bytes of bytecode)",
        "🚀".blue(),
        artifact.contract_name.bold(),
        artifact.bytecode.len()
    );

    let deployment = deployer::deploy(&artifact, &target)
        .await
        .with_context(|| format!("Failed to deploy {}", artifact.contract_name))?;

    println!("{} Deployer account: {:?}", "ℹ".blue(), deployment.deployer);
    println!(
        "{} Contract deployed to: {}",
        "✓".green(),
        format!("{:?}", deployment.address).bold()
    );
    println!("{} Transaction: {:?}", "✓".green(), deployment.tx_hash);
    if let Some(block) = deployment.block_number {
        println!("{} Included in block {} (chain {})", "✓".green(), block, deployment.chain_id);
    }

    Ok(())
}

async fn run_verify(args: VerifyArgs) -> Result<()> {
    let address: Address = args
        .address
        .parse()
        .map_err(|e| anyhow!("Invalid contract address '{}': {}", args.address, e))?;

    let source = fs::read_to_string(&args.source)
        .with_context(|| format!("Failed to read source file: {}", args.source.display()))?;

    let api_url = match args.api_url {
        Some(url) => url,
        None => args
            .network
            .explorer_api_url()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("{} has no block explorer; pass --api-url", args.network.name()))?,
    };

    let mut request = VerificationRequest::new(address, args.contract_name, source);
    request.compiler_version = args.compiler_version;
    request.optimizer_runs = (!args.no_optimizer).then_some(args.optimizer_runs);

    println!(
        "{} Verifying {:?} on {} with {}",
        "ℹ".blue(),
        address,
        args.network.name(),
        request.compiler_version
    );

    let client = ExplorerClient::new(api_url, args.api_key);
    let status = client
        .verify(&request)
        .await
        .context("Source verification failed")?;

    match status {
        VerificationStatus::AlreadyVerified => {
            println!("{} Contract was already verified", "✓".green())
        }
        _ => println!("{} Contract source verified", "✓".green()),
    }

    Ok(())
}
