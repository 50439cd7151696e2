//! Market data snapshot types consumed by the signal generator.
//!
//! These rows are produced by external ingestion/processing agents and are
//! append-only from the pipeline's point of view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latest computed technical indicators for a symbol, keyed by
/// `(symbol, timestamp)`. Analytics are nullable because upstream
/// calculators need a warmup window before each indicator is defined.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    /// Closing price of the bar the indicators were computed on
    pub close: f64,
    pub rsi_14: Option<f64>,
    pub sma_50: Option<f64>,
    pub sma_200: Option<f64>,
    /// Lower volatility band
    pub lower_band: Option<f64>,
    pub vwap: Option<f64>,
    pub atr_14: Option<f64>,
    pub volume: Option<f64>,
    pub volume_sma_20: Option<f64>,
}

/// News sentiment score for a symbol at a point in time, in [-1.0, 1.0].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentScore {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub score: f64,
    pub headline: Option<String>,
}

/// Average sentiment over a trailing window.
///
/// `samples == 0` means no sentiment evidence at all, which is different
/// from a neutral average.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AvgSentiment {
    pub average: f64,
    pub samples: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_avg_sentiment_distinguishes_empty() {
        let none = AvgSentiment {
            average: 0.0,
            samples: 0,
        };
        let neutral = AvgSentiment {
            average: 0.0,
            samples: 3,
        };
        assert_ne!(none, neutral);
    }
}
