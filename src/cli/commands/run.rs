//! Run command: wire up and drive the pipeline stages.

use anyhow::{anyhow, Context, Result};
use chrono::Duration;
use rust_decimal::Decimal;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use tradebus_config::{load_config, AppConfig};
use tradebus_core::BrokerGateway;
use tradebus_engine::{
    run_stage, ExecutorStage, GeneratorStage, ReconcilerStage, SizerStage, Stage, StageSchedule,
};
use tradebus_gateway::{AlpacaConfig, AlpacaGateway, CircuitBreaker, PaperGateway};
use tradebus_store::Store;

use crate::cli::RunArgs;

pub async fn run(args: RunArgs, config_path: &Path) -> Result<()> {
    let config = load_config(config_path).context("loading configuration")?;
    config.validate().map_err(|e| anyhow!("invalid configuration: {e}"))?;

    let store = Store::open(&config.store.path).await?;
    let (gateway, paper) = build_gateway(&args, &config)?;
    info!(gateway = gateway.name(), "pipeline starting");

    let claim_lease = Duration::seconds(config.scheduler.claim_lease_secs as i64);
    let gateway_timeout = std::time::Duration::from_secs(config.scheduler.gateway_timeout_secs);
    let schedule = |interval_secs: u64| StageSchedule {
        poll_interval: std::time::Duration::from_secs(interval_secs),
        claim_lease,
    };

    let stages: Vec<(Arc<dyn Stage>, StageSchedule)> = vec![
        (
            Arc::new(GeneratorStage::new(
                store.clone(),
                config.strategy.symbols.clone(),
                config.strategy_params(),
                Duration::minutes(config.strategy.sentiment_window_minutes as i64),
            )),
            schedule(config.scheduler.generator_interval_secs),
        ),
        (
            Arc::new(SizerStage::new(
                store.clone(),
                gateway.clone(),
                config.risk_params(),
                Duration::minutes(config.risk.max_signal_age_minutes as i64),
                gateway_timeout,
            )),
            schedule(config.scheduler.sizer_interval_secs),
        ),
        (
            Arc::new(ExecutorStage::new(
                store.clone(),
                gateway.clone(),
                gateway_timeout,
            )),
            schedule(config.scheduler.executor_interval_secs),
        ),
        (
            Arc::new(ReconcilerStage::new(
                store.clone(),
                gateway.clone(),
                gateway_timeout,
            )),
            schedule(config.scheduler.reconciler_interval_secs),
        ),
    ];

    let mut tasks = Vec::new();
    if let Some(paper) = paper {
        tasks.push(tokio::spawn(sync_paper_prices(
            store.clone(),
            paper,
            config.strategy.symbols.clone(),
            std::time::Duration::from_secs(config.scheduler.generator_interval_secs),
        )));
    }
    for (stage, schedule) in stages {
        tasks.push(tokio::spawn(run_stage(stage, store.clone(), schedule)));
    }
    futures::future::join_all(tasks).await;
    Ok(())
}

fn build_gateway(
    args: &RunArgs,
    config: &AppConfig,
) -> Result<(Arc<dyn BrokerGateway>, Option<PaperGateway>)> {
    let threshold = config.gateway.circuit_breaker_threshold;
    let cooldown = std::time::Duration::from_secs(config.gateway.circuit_breaker_cooldown_secs);

    if args.paper {
        let equity = Decimal::try_from(args.capital).context("paper capital")?;
        let gateway = PaperGateway::new(equity).with_instant_fill();
        let breaker = CircuitBreaker::new(gateway.clone(), threshold, cooldown);
        return Ok((Arc::new(breaker), Some(gateway)));
    }

    let api_key = std::env::var(&config.gateway.api_key_env)
        .with_context(|| format!("{} not set", config.gateway.api_key_env))?;
    let api_secret = std::env::var(&config.gateway.api_secret_env)
        .with_context(|| format!("{} not set", config.gateway.api_secret_env))?;

    let gateway = AlpacaGateway::new(AlpacaConfig::new(api_key, api_secret, config.gateway.paper))?;
    Ok((Arc::new(CircuitBreaker::new(gateway, threshold, cooldown)), None))
}

/// Keep the paper gateway's fill prices tracking the latest indicator close
/// per symbol, the way a live gateway would see the market move.
async fn sync_paper_prices(
    store: Store,
    paper: PaperGateway,
    symbols: Vec<String>,
    interval: std::time::Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        for symbol in &symbols {
            match store.latest_indicator(symbol).await {
                Ok(Some(snapshot)) => {
                    if let Ok(price) = Decimal::try_from(snapshot.close) {
                        paper.set_market_price(symbol.clone(), price);
                    }
                }
                Ok(None) => {}
                Err(e) => debug!(%symbol, error = %e, "paper price sync skipped"),
            }
        }
    }
}
