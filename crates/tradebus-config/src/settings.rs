//! Configuration structures.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tradebus_risk::RiskParams;
use tradebus_strategy::MeanReversionParams;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub gateway: GatewaySettings,
    #[serde(default)]
    pub strategy: StrategySettings,
    #[serde(default)]
    pub risk: RiskSettings,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
}

impl AppConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        self.risk_params().validate()?;
        self.strategy_params().validate()?;
        if self.strategy.symbols.is_empty() {
            return Err("at least one symbol required".into());
        }
        if self.scheduler.claim_lease_secs <= self.scheduler.gateway_timeout_secs {
            return Err("claim lease must exceed the gateway timeout".into());
        }
        Ok(())
    }

    pub fn risk_params(&self) -> RiskParams {
        RiskParams {
            risk_fraction: self.risk.risk_fraction,
            stop_loss_fraction: self.risk.stop_loss_fraction,
            take_profit_fraction: self.risk.take_profit_fraction,
            max_allocation_fraction: self.risk.max_allocation_fraction,
        }
    }

    pub fn strategy_params(&self) -> MeanReversionParams {
        MeanReversionParams {
            rsi_oversold: self.strategy.rsi_oversold,
            sentiment_floor: self.strategy.sentiment_floor,
        }
    }
}

/// General app settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    pub name: String,
    pub environment: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "tradebus".to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Durable store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    pub path: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: "data/tradebus.db".to_string(),
        }
    }
}

/// Broker gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySettings {
    pub api_key_env: String,
    pub api_secret_env: String,
    pub paper: bool,
    pub circuit_breaker_threshold: u32,
    pub circuit_breaker_cooldown_secs: u64,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            api_key_env: "ALPACA_API_KEY".to_string(),
            api_secret_env: "ALPACA_API_SECRET".to_string(),
            paper: true,
            circuit_breaker_threshold: 3,
            circuit_breaker_cooldown_secs: 300,
        }
    }
}

/// Strategy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategySettings {
    pub symbols: Vec<String>,
    pub rsi_oversold: f64,
    pub sentiment_floor: f64,
    pub sentiment_window_minutes: u64,
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            symbols: vec![
                "AAPL".to_string(),
                "MSFT".to_string(),
                "GOOGL".to_string(),
                "AMZN".to_string(),
                "NVDA".to_string(),
            ],
            rsi_oversold: 30.0,
            sentiment_floor: 0.0,
            sentiment_window_minutes: 300,
        }
    }
}

/// Risk management settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSettings {
    pub risk_fraction: Decimal,
    pub stop_loss_fraction: Decimal,
    pub take_profit_fraction: Decimal,
    pub max_allocation_fraction: Decimal,
    pub max_signal_age_minutes: u64,
}

impl Default for RiskSettings {
    fn default() -> Self {
        use rust_decimal_macros::dec;
        Self {
            risk_fraction: dec!(0.01),
            stop_loss_fraction: dec!(0.05),
            take_profit_fraction: dec!(0.10),
            max_allocation_fraction: dec!(0.20),
            max_signal_age_minutes: 60,
        }
    }
}

/// Per-stage polling and lease settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    pub generator_interval_secs: u64,
    pub sizer_interval_secs: u64,
    pub executor_interval_secs: u64,
    pub reconciler_interval_secs: u64,
    pub claim_lease_secs: u64,
    pub gateway_timeout_secs: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            generator_interval_secs: 30,
            sizer_interval_secs: 15,
            executor_interval_secs: 10,
            reconciler_interval_secs: 10,
            claim_lease_secs: 120,
            gateway_timeout_secs: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_lease_must_exceed_gateway_timeout() {
        let mut config = AppConfig::default();
        config.scheduler.claim_lease_secs = 5;
        config.scheduler.gateway_timeout_secs = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
                [risk]
                risk_fraction = "0.02"
                stop_loss_fraction = "0.05"
                take_profit_fraction = "0.10"
                max_allocation_fraction = "0.20"
                max_signal_age_minutes = 30
            "#,
        )
        .unwrap();

        use rust_decimal_macros::dec;
        assert_eq!(config.risk.risk_fraction, dec!(0.02));
        assert_eq!(config.app.name, "tradebus");
        assert_eq!(config.scheduler.claim_lease_secs, 120);
    }
}
