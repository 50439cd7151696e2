//! Status command: signal counts and recent activity.

use anyhow::{Context, Result};
use std::path::Path;

use tradebus_config::load_config;
use tradebus_store::Store;

use crate::cli::StatusArgs;

pub async fn run(args: StatusArgs, config_path: &Path) -> Result<()> {
    let config = load_config(config_path).context("loading configuration")?;
    let store = Store::open(&config.store.path).await?;

    println!("Signals by status");
    println!("═══════════════════════════════════════════════════════════");
    let counts = store.count_by_status().await?;
    if counts.is_empty() {
        println!("  (no signals yet)");
    }
    let open: i64 = counts
        .iter()
        .filter(|(status, _)| status.is_open())
        .map(|(_, count)| count)
        .sum();
    for (status, count) in counts {
        println!("  {:<10} {}", status.to_string(), count);
    }
    println!("  {:<10} {}", "open", open);

    println!();
    println!("Recent signals");
    println!("═══════════════════════════════════════════════════════════");
    for signal in store.recent_signals(args.limit).await? {
        let size = signal
            .size
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        let detail = signal
            .last_error
            .as_deref()
            .or(signal.broker_order_id.as_deref())
            .unwrap_or("");
        println!(
            "  #{:<5} {:<6} {:<4} {:<10} size={:<8} v{} {}",
            signal.id,
            signal.symbol,
            signal.side.to_string(),
            signal.status.to_string(),
            size,
            signal.version,
            detail
        );
    }

    Ok(())
}
