//! Configuration management.

mod settings;

pub use settings::{
    AppConfig, AppSettings, GatewaySettings, LoggingConfig, RiskSettings, SchedulerSettings,
    StoreSettings, StrategySettings,
};

use config::{Config, ConfigError, Environment, File};
use std::path::Path;

/// Load configuration from file and environment.
///
/// Environment overrides use the `TRADEBUS` prefix with `__` as the
/// separator, e.g. `TRADEBUS__RISK__RISK_FRACTION=0.02`.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from(path).required(true))
        .add_source(
            Environment::with_prefix("TRADEBUS")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    config.try_deserialize()
}
