use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use log::{debug, error, info};

use chain_types::{Network, NetworkParams};
use coin_indexer_lib::client::BitcoinClient;
use coin_indexer_lib::config::Config;
use coin_indexer_lib::error::Error;
use coin_indexer_lib::store::open_store;
use coin_indexer_lib::sync::Synchronizer;

#[derive(Parser)]
struct CliArgs {
    /// Path to the configuration file
    #[clap(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = CliArgs::parse();

    let config = Config::new(&args.config)?;
    debug!("Configuration loaded: {:?}", config);

    let network: Network = config
        .server
        .network
        .parse()
        .map_err(Error::Config)?;
    let store = open_store(&config.server.storage)?;
    let client = BitcoinClient::new(&config.bitcoind);

    let interrupt = Arc::new(AtomicBool::new(false));
    {
        let interrupt = interrupt.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {e}");
                return;
            }
            info!("Shutdown signal received");
            interrupt.store(true, Ordering::Relaxed);
        });
    }

    let mut synchronizer =
        Synchronizer::new(client, store, NetworkParams::new(network), interrupt);
    synchronizer.initialize()?;

    info!("run address index sync");
    synchronizer
        .run(Duration::from_secs(config.poll_interval_secs))
        .await;
    info!("end address index sync");

    Ok(())
}
