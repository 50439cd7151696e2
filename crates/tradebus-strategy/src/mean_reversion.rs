//! Sentiment-gated mean reversion.
//!
//! Enters long when price dips below the lower volatility band while RSI is
//! oversold, but only if recent news sentiment is positive. A dip with bad
//! news is a falling knife, not a reversion candidate.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tradebus_core::{AvgSentiment, IndicatorSnapshot, Side, SignalDraft};

/// Parameters for the mean reversion predicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeanReversionParams {
    /// RSI level below which a symbol counts as oversold
    pub rsi_oversold: f64,
    /// Minimum trailing average sentiment required to enter
    pub sentiment_floor: f64,
}

impl Default for MeanReversionParams {
    fn default() -> Self {
        Self {
            rsi_oversold: 30.0,
            sentiment_floor: 0.0,
        }
    }
}

impl MeanReversionParams {
    /// Validate the parameters.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=100.0).contains(&self.rsi_oversold) {
            return Err("rsi_oversold must be between 0 and 100".into());
        }
        if !(-1.0..=1.0).contains(&self.sentiment_floor) {
            return Err("sentiment_floor must be between -1 and 1".into());
        }
        Ok(())
    }
}

/// Mean reversion entry predicate.
#[derive(Debug, Clone)]
pub struct MeanReversion {
    params: MeanReversionParams,
}

impl MeanReversion {
    pub fn new(params: MeanReversionParams) -> Self {
        Self { params }
    }

    /// Evaluate the latest snapshot for a symbol.
    ///
    /// Returns a BUY draft when price sits below the lower band, RSI is
    /// oversold, and the sentiment window holds at least one sample above
    /// the floor. Missing indicators (warmup) never produce a signal.
    pub fn evaluate(
        &self,
        snapshot: &IndicatorSnapshot,
        sentiment: &AvgSentiment,
    ) -> Option<SignalDraft> {
        let lower_band = snapshot.lower_band?;
        let rsi = snapshot.rsi_14?;

        if snapshot.close >= lower_band {
            return None;
        }
        if rsi >= self.params.rsi_oversold {
            return None;
        }
        if sentiment.samples == 0 || sentiment.average <= self.params.sentiment_floor {
            return None;
        }

        let entry = Decimal::try_from(snapshot.close).ok()?;
        Some(SignalDraft::new(snapshot.symbol.clone(), Side::Buy, entry))
    }
}
