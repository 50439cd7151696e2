//! Executed-trade audit log.

use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use tradebus_core::{Side, StoreError, TradeRecord};

use crate::db::{classify, Store};
use crate::retry::with_backoff;
use crate::signals::parse_decimal;

impl Store {
    /// Append an observed fill to the audit log.
    pub async fn record_trade(&self, trade: &TradeRecord) -> Result<(), StoreError> {
        with_backoff("record_trade", || self.try_record_trade(trade)).await
    }

    async fn try_record_trade(&self, trade: &TradeRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
                INSERT INTO executed_trades (signal_id, symbol, side, quantity, price, executed_at)
                VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(trade.signal_id)
        .bind(&trade.symbol)
        .bind(trade.side.to_string())
        .bind(trade.quantity.to_string())
        .bind(trade.price.to_string())
        .bind(trade.executed_at)
        .execute(self.pool())
        .await
        .map_err(classify)?;
        Ok(())
    }

    /// All recorded fills for a signal, oldest first.
    pub async fn trades_for_signal(&self, signal_id: i64) -> Result<Vec<TradeRecord>, StoreError> {
        with_backoff("trades_for_signal", || self.try_trades_for_signal(signal_id)).await
    }

    async fn try_trades_for_signal(&self, signal_id: i64) -> Result<Vec<TradeRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM executed_trades WHERE signal_id = ? ORDER BY executed_at ASC, id ASC",
        )
        .bind(signal_id)
        .fetch_all(self.pool())
        .await
        .map_err(classify)?;
        rows.iter().map(map_trade).collect()
    }
}

fn map_trade(row: &SqliteRow) -> Result<TradeRecord, StoreError> {
    let side_raw: String = row.try_get("side").map_err(classify)?;
    let quantity_raw: String = row.try_get("quantity").map_err(classify)?;
    let price_raw: String = row.try_get("price").map_err(classify)?;

    Ok(TradeRecord {
        signal_id: row.try_get("signal_id").map_err(classify)?,
        symbol: row.try_get("symbol").map_err(classify)?,
        side: side_raw.parse::<Side>().map_err(StoreError::Corrupt)?,
        quantity: parse_decimal("quantity", &quantity_raw)?,
        price: parse_decimal("price", &price_raw)?,
        executed_at: row.try_get("executed_at").map_err(classify)?,
    })
}
