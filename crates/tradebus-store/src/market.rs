//! Append-only indicator and sentiment repositories.
//!
//! Written by external producer agents; the pipeline only ever reads the
//! latest snapshot per symbol and a trailing sentiment average.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use tradebus_core::{AvgSentiment, IndicatorSnapshot, SentimentScore, StoreError};

use crate::db::{classify, Store};
use crate::retry::with_backoff;

impl Store {
    /// Record an indicator snapshot. Re-publishing the same `(symbol,
    /// timestamp)` replaces the row; history is otherwise append-only.
    pub async fn record_indicator(&self, snap: &IndicatorSnapshot) -> Result<(), StoreError> {
        with_backoff("record_indicator", || self.try_record_indicator(snap)).await
    }

    async fn try_record_indicator(&self, snap: &IndicatorSnapshot) -> Result<(), StoreError> {
        sqlx::query(
            r#"
                INSERT OR REPLACE INTO indicators (
                    symbol, timestamp, close, rsi_14, sma_50, sma_200,
                    lower_band, vwap, atr_14, volume, volume_sma_20
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&snap.symbol)
        .bind(snap.timestamp)
        .bind(snap.close)
        .bind(snap.rsi_14)
        .bind(snap.sma_50)
        .bind(snap.sma_200)
        .bind(snap.lower_band)
        .bind(snap.vwap)
        .bind(snap.atr_14)
        .bind(snap.volume)
        .bind(snap.volume_sma_20)
        .execute(self.pool())
        .await
        .map_err(classify)?;
        Ok(())
    }

    /// Record a sentiment score.
    pub async fn record_sentiment(&self, score: &SentimentScore) -> Result<(), StoreError> {
        with_backoff("record_sentiment", || self.try_record_sentiment(score)).await
    }

    async fn try_record_sentiment(&self, score: &SentimentScore) -> Result<(), StoreError> {
        sqlx::query(
            r#"
                INSERT OR REPLACE INTO sentiment (symbol, timestamp, score, headline)
                VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&score.symbol)
        .bind(score.timestamp)
        .bind(score.score)
        .bind(score.headline.as_deref())
        .execute(self.pool())
        .await
        .map_err(classify)?;
        Ok(())
    }

    /// The most recent indicator snapshot for a symbol, if any.
    pub async fn latest_indicator(
        &self,
        symbol: &str,
    ) -> Result<Option<IndicatorSnapshot>, StoreError> {
        with_backoff("latest_indicator", || self.try_latest_indicator(symbol)).await
    }

    async fn try_latest_indicator(
        &self,
        symbol: &str,
    ) -> Result<Option<IndicatorSnapshot>, StoreError> {
        let row = sqlx::query(
            r#"
                SELECT * FROM indicators
                WHERE symbol = ?
                ORDER BY timestamp DESC
                LIMIT 1
            "#,
        )
        .bind(symbol)
        .fetch_optional(self.pool())
        .await
        .map_err(classify)?;
        row.map(|r| map_indicator(&r)).transpose()
    }

    /// Average sentiment score for a symbol since the cutoff, along with
    /// the sample count. Zero samples means no evidence, not neutrality.
    pub async fn average_sentiment_since(
        &self,
        symbol: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<AvgSentiment, StoreError> {
        with_backoff("average_sentiment_since", || {
            self.try_average_sentiment_since(symbol, cutoff)
        })
        .await
    }

    async fn try_average_sentiment_since(
        &self,
        symbol: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<AvgSentiment, StoreError> {
        let row = sqlx::query(
            r#"
                SELECT AVG(score) AS average, COUNT(*) AS samples
                FROM sentiment
                WHERE symbol = ? AND timestamp >= ?
            "#,
        )
        .bind(symbol)
        .bind(cutoff)
        .fetch_one(self.pool())
        .await
        .map_err(classify)?;

        let average: Option<f64> = row.try_get("average").map_err(classify)?;
        let samples: i64 = row.try_get("samples").map_err(classify)?;
        Ok(AvgSentiment {
            average: average.unwrap_or(0.0),
            samples,
        })
    }
}

fn map_indicator(row: &SqliteRow) -> Result<IndicatorSnapshot, StoreError> {
    Ok(IndicatorSnapshot {
        symbol: row.try_get("symbol").map_err(classify)?,
        timestamp: row.try_get("timestamp").map_err(classify)?,
        close: row.try_get("close").map_err(classify)?,
        rsi_14: row.try_get("rsi_14").map_err(classify)?,
        sma_50: row.try_get("sma_50").map_err(classify)?,
        sma_200: row.try_get("sma_200").map_err(classify)?,
        lower_band: row.try_get("lower_band").map_err(classify)?,
        vwap: row.try_get("vwap").map_err(classify)?,
        atr_14: row.try_get("atr_14").map_err(classify)?,
        volume: row.try_get("volume").map_err(classify)?,
        volume_sma_20: row.try_get("volume_sma_20").map_err(classify)?,
    })
}
