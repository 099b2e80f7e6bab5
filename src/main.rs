//! Token supply API server

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use supply_gateway::{
    Result,
    cli::{Cli, Command},
    config::Config,
    explorer::{ChainClient, EtherscanClient},
    server::Server,
    service::SupplyService,
    setup_tracing,
    supply::Aggregator,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Local development convenience; missing .env is fine
    dotenvy::dotenv().ok();

    // Setup tracing
    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    match cli.command {
        Some(Command::Fetch) => run_fetch(&cli).await,
        Some(Command::Serve) | None => run_server(&cli).await,
    }
}

/// Load configuration and apply CLI overrides
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(ref host) = cli.host {
        config.server.host = host.clone();
    }
    Ok(config)
}

/// Build the aggregator from the configured explorer endpoints
fn build_aggregator(config: &Config) -> Result<Aggregator> {
    let bsc: Arc<dyn ChainClient> = Arc::new(EtherscanClient::new(&config.explorers.bsc)?);
    let eth: Arc<dyn ChainClient> = Arc::new(EtherscanClient::new(&config.explorers.eth)?);
    Ok(Aggregator::new(bsc, eth, config.token.clone()))
}

/// Run the HTTP server
async fn run_server(cli: &Cli) -> ExitCode {
    let config = match load_config(cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let aggregator = match build_aggregator(&config) {
        Ok(aggregator) => aggregator,
        Err(e) => {
            error!("Failed to create explorer clients: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.server.port,
        "Starting supply gateway"
    );

    let service = Arc::new(SupplyService::new(aggregator, config.cache.ttl));
    let server = Server::new(config, service);

    if let Err(e) = server.run().await {
        error!("Server error: {e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Run one aggregation cycle and print the figures (operational smoke test)
async fn run_fetch(cli: &Cli) -> ExitCode {
    let config = match load_config(cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let aggregator = match build_aggregator(&config) {
        Ok(aggregator) => aggregator,
        Err(e) => {
            eprintln!("Failed to create explorer clients: {e}");
            return ExitCode::FAILURE;
        }
    };

    match aggregator.compute().await {
        Ok(report) => {
            println!("max:         {}", report.max);
            println!("total:       {}", report.total);
            println!("circulating: {}", report.circulating);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Aggregation failed: {e}");
            ExitCode::FAILURE
        }
    }
}
