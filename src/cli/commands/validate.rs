//! Validate configuration command.

use anyhow::{anyhow, Result};
use std::path::Path;
use tradebus_config::load_config;

pub async fn run(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {:?}", config_path);

    let config = load_config(config_path).map_err(|e| {
        println!("Configuration error: {e}");
        anyhow!(e)
    })?;

    if let Err(e) = config.validate() {
        println!("Configuration invalid: {e}");
        return Err(anyhow!(e));
    }

    println!("Configuration is valid!");
    println!();
    println!("App: {}", config.app.name);
    println!("Environment: {}", config.app.environment);
    println!("Store: {}", config.store.path);
    println!("Symbols: {:?}", config.strategy.symbols);
    println!("Risk per trade: {}", config.risk.risk_fraction);
    println!("Stop-loss fraction: {}", config.risk.stop_loss_fraction);
    println!("Max allocation: {}", config.risk.max_allocation_fraction);
    println!("Claim lease: {}s", config.scheduler.claim_lease_secs);
    println!("Alpaca paper mode: {}", config.gateway.paper);

    Ok(())
}
