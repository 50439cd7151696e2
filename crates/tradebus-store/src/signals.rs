//! Signal repository: insert, claim/lease, and CAS transitions.
//!
//! A claim is a lease, not a lock. Claiming tags the row with the claimant
//! and a timestamp while leaving `status` untouched, so a stale-claim sweep
//! restores the pre-claim state by simply clearing the tag. Every write
//! bumps `version` and is guarded by a compare-and-swap on the version the
//! writer read.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;
use tracing::warn;

use tradebus_core::{Side, Signal, SignalDraft, SignalStatus, StoreError, TransitionPatch};

use crate::db::{classify, Store};
use crate::retry::with_backoff;

/// Rounds of select-then-CAS a single `claim_next` call will attempt when
/// racing other claimants before reporting no work.
const CLAIM_CAS_ROUNDS: u32 = 3;

impl Store {
    /// Insert a new PENDING signal.
    ///
    /// Fails with [`StoreError::Conflict`] when an open (non-terminal)
    /// signal already exists for the `(symbol, side)` pair. The existence
    /// check and the insert are one statement, so two racing generators
    /// cannot both succeed.
    pub async fn insert_signal(&self, draft: &SignalDraft) -> Result<i64, StoreError> {
        with_backoff("insert_signal", || self.try_insert_signal(draft)).await
    }

    async fn try_insert_signal(&self, draft: &SignalDraft) -> Result<i64, StoreError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
                INSERT INTO signals (symbol, side, status, entry_price_hint, created_at, updated_at, version)
                SELECT ?, ?, 'PENDING', ?, ?, ?, 1
                WHERE NOT EXISTS (
                    SELECT 1 FROM signals
                    WHERE symbol = ? AND side = ?
                      AND status IN ('PENDING', 'SIZED', 'SUBMITTED')
                )
            "#,
        )
        .bind(&draft.symbol)
        .bind(draft.side.to_string())
        .bind(draft.entry_price_hint.to_string())
        .bind(now)
        .bind(now)
        .bind(&draft.symbol)
        .bind(draft.side.to_string())
        .execute(self.pool())
        .await
        .map_err(classify)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict {
                symbol: draft.symbol.clone(),
                side: draft.side.to_string(),
            });
        }
        Ok(result.last_insert_rowid())
    }

    /// Atomically claim the oldest unclaimed signal in the wanted status.
    ///
    /// Returns `None` when no eligible row exists (or every CAS round lost
    /// to another claimant; the next polling cycle will try again).
    pub async fn claim_next(
        &self,
        status: SignalStatus,
        claimant: &str,
    ) -> Result<Option<Signal>, StoreError> {
        with_backoff("claim_next", || self.try_claim_next(status, claimant)).await
    }

    async fn try_claim_next(
        &self,
        status: SignalStatus,
        claimant: &str,
    ) -> Result<Option<Signal>, StoreError> {
        for _ in 0..CLAIM_CAS_ROUNDS {
            let row = sqlx::query(
                r#"
                    SELECT id, version FROM signals
                    WHERE status = ? AND claimed_by IS NULL
                    ORDER BY created_at ASC, id ASC
                    LIMIT 1
                "#,
            )
            .bind(status.as_str())
            .fetch_optional(self.pool())
            .await
            .map_err(classify)?;

            let Some(row) = row else {
                return Ok(None);
            };
            let id: i64 = row.try_get("id").map_err(classify)?;
            let version: i64 = row.try_get("version").map_err(classify)?;

            let now = Utc::now();
            let result = sqlx::query(
                r#"
                    UPDATE signals
                    SET claimed_by = ?, claimed_at = ?, updated_at = ?, version = version + 1
                    WHERE id = ? AND version = ? AND claimed_by IS NULL
                "#,
            )
            .bind(claimant)
            .bind(now)
            .bind(now)
            .bind(id)
            .bind(version)
            .execute(self.pool())
            .await
            .map_err(classify)?;

            if result.rows_affected() == 1 {
                return Ok(Some(self.get_signal(id).await?));
            }
            // Another claimant won the CAS; re-select.
        }
        Ok(None)
    }

    /// Finalize a claimed row's transition to `new_status`, applying the
    /// patch, clearing the claim, and bumping the version.
    ///
    /// Terminal rows are refused regardless of version: once a signal is
    /// EXECUTED/FAILED/REJECTED/EXPIRED it is immutable.
    pub async fn commit_transition(
        &self,
        id: i64,
        expected_version: i64,
        new_status: SignalStatus,
        patch: &TransitionPatch,
    ) -> Result<Signal, StoreError> {
        with_backoff("commit_transition", || {
            self.try_commit_transition(id, expected_version, new_status, patch)
        })
        .await
    }

    async fn try_commit_transition(
        &self,
        id: i64,
        expected_version: i64,
        new_status: SignalStatus,
        patch: &TransitionPatch,
    ) -> Result<Signal, StoreError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
                UPDATE signals
                SET status = ?,
                    size = COALESCE(?, size),
                    stop_loss_price = COALESCE(?, stop_loss_price),
                    take_profit_price = COALESCE(?, take_profit_price),
                    broker_order_id = COALESCE(?, broker_order_id),
                    fill_price = COALESCE(?, fill_price),
                    last_error = COALESCE(?, last_error),
                    claimed_by = NULL,
                    claimed_at = NULL,
                    updated_at = ?,
                    version = version + 1
                WHERE id = ? AND version = ?
                  AND status IN ('PENDING', 'SIZED', 'SUBMITTED')
            "#,
        )
        .bind(new_status.as_str())
        .bind(patch.size.map(|d| d.to_string()))
        .bind(patch.stop_loss_price.map(|d| d.to_string()))
        .bind(patch.take_profit_price.map(|d| d.to_string()))
        .bind(patch.broker_order_id.as_deref())
        .bind(patch.fill_price.map(|d| d.to_string()))
        .bind(patch.last_error.as_deref())
        .bind(now)
        .bind(id)
        .bind(expected_version)
        .execute(self.pool())
        .await
        .map_err(classify)?;

        if result.rows_affected() == 0 {
            return match self.find_signal(id).await? {
                None => Err(StoreError::NotFound(id)),
                Some(_) => Err(StoreError::VersionConflict {
                    id,
                    expected: expected_version,
                }),
            };
        }
        self.get_signal(id).await
    }

    /// Stamp the broker order id on a row while its claim is still held.
    ///
    /// Run between a successful submit and the SUBMITTED commit so a crash
    /// in that window leaves a durable record; the next claimant re-queries
    /// the order instead of resubmitting it.
    pub async fn record_broker_order(
        &self,
        id: i64,
        expected_version: i64,
        broker_order_id: &str,
    ) -> Result<Signal, StoreError> {
        with_backoff("record_broker_order", || {
            self.try_record_broker_order(id, expected_version, broker_order_id)
        })
        .await
    }

    async fn try_record_broker_order(
        &self,
        id: i64,
        expected_version: i64,
        broker_order_id: &str,
    ) -> Result<Signal, StoreError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
                UPDATE signals
                SET broker_order_id = ?, updated_at = ?, version = version + 1
                WHERE id = ? AND version = ? AND claimed_by IS NOT NULL
            "#,
        )
        .bind(broker_order_id)
        .bind(now)
        .bind(id)
        .bind(expected_version)
        .execute(self.pool())
        .await
        .map_err(classify)?;

        if result.rows_affected() == 0 {
            return match self.find_signal(id).await? {
                None => Err(StoreError::NotFound(id)),
                Some(_) => Err(StoreError::VersionConflict {
                    id,
                    expected: expected_version,
                }),
            };
        }
        self.get_signal(id).await
    }

    /// Hand a claimed row back without a status change, making it
    /// immediately reclaimable.
    pub async fn release_claim(&self, id: i64, expected_version: i64) -> Result<(), StoreError> {
        with_backoff("release_claim", || self.try_release_claim(id, expected_version)).await
    }

    async fn try_release_claim(&self, id: i64, expected_version: i64) -> Result<(), StoreError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
                UPDATE signals
                SET claimed_by = NULL, claimed_at = NULL, updated_at = ?, version = version + 1
                WHERE id = ? AND version = ? AND claimed_by IS NOT NULL
            "#,
        )
        .bind(now)
        .bind(id)
        .bind(expected_version)
        .execute(self.pool())
        .await
        .map_err(classify)?;

        if result.rows_affected() == 0 {
            return match self.find_signal(id).await? {
                None => Err(StoreError::NotFound(id)),
                Some(_) => Err(StoreError::VersionConflict {
                    id,
                    expected: expected_version,
                }),
            };
        }
        Ok(())
    }

    /// Revert claims older than `max_age` back to their pre-claim state so a
    /// crashed claimant's work gets retried. Returns the number of rows
    /// released.
    pub async fn release_stale_claims(&self, max_age: Duration) -> Result<u64, StoreError> {
        with_backoff("release_stale_claims", || self.try_release_stale_claims(max_age)).await
    }

    async fn try_release_stale_claims(&self, max_age: Duration) -> Result<u64, StoreError> {
        let now = Utc::now();
        let cutoff = now - max_age;
        let result = sqlx::query(
            r#"
                UPDATE signals
                SET claimed_by = NULL, claimed_at = NULL, updated_at = ?, version = version + 1
                WHERE claimed_by IS NOT NULL AND claimed_at <= ?
            "#,
        )
        .bind(now)
        .bind(cutoff)
        .execute(self.pool())
        .await
        .map_err(classify)?;

        let released = result.rows_affected();
        if released > 0 {
            warn!(released, "released stale claims");
        }
        Ok(released)
    }

    /// Expire unclaimed PENDING signals older than `max_age`. Stale market
    /// context must not produce orders. Returns the number of rows expired.
    pub async fn expire_stale_pending(&self, max_age: Duration) -> Result<u64, StoreError> {
        with_backoff("expire_stale_pending", || self.try_expire_stale_pending(max_age)).await
    }

    async fn try_expire_stale_pending(&self, max_age: Duration) -> Result<u64, StoreError> {
        let now = Utc::now();
        let cutoff = now - max_age;
        let result = sqlx::query(
            r#"
                UPDATE signals
                SET status = 'EXPIRED',
                    last_error = 'exceeded maximum age before sizing',
                    updated_at = ?,
                    version = version + 1
                WHERE status = 'PENDING' AND claimed_by IS NULL AND created_at <= ?
            "#,
        )
        .bind(now)
        .bind(cutoff)
        .execute(self.pool())
        .await
        .map_err(classify)?;

        Ok(result.rows_affected())
    }

    /// Fetch a signal by id.
    pub async fn get_signal(&self, id: i64) -> Result<Signal, StoreError> {
        self.find_signal(id).await?.ok_or(StoreError::NotFound(id))
    }

    async fn find_signal(&self, id: i64) -> Result<Option<Signal>, StoreError> {
        let row = sqlx::query("SELECT * FROM signals WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(classify)?;
        row.map(|r| map_signal(&r)).transpose()
    }

    /// Count signals per status, for the operator CLI.
    pub async fn count_by_status(&self) -> Result<Vec<(SignalStatus, i64)>, StoreError> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM signals GROUP BY status")
            .fetch_all(self.pool())
            .await
            .map_err(classify)?;

        let mut counts = Vec::with_capacity(rows.len());
        for row in rows {
            let status_raw: String = row.try_get("status").map_err(classify)?;
            let status = status_raw
                .parse::<SignalStatus>()
                .map_err(StoreError::Corrupt)?;
            let n: i64 = row.try_get("n").map_err(classify)?;
            counts.push((status, n));
        }
        Ok(counts)
    }

    /// Most recently updated signals, newest first.
    pub async fn recent_signals(&self, limit: i64) -> Result<Vec<Signal>, StoreError> {
        let rows = sqlx::query("SELECT * FROM signals ORDER BY updated_at DESC, id DESC LIMIT ?")
            .bind(limit)
            .fetch_all(self.pool())
            .await
            .map_err(classify)?;
        rows.iter().map(map_signal).collect()
    }
}

pub(crate) fn parse_decimal(col: &str, raw: &str) -> Result<Decimal, StoreError> {
    Decimal::from_str(raw).map_err(|e| StoreError::Corrupt(format!("{col}: {e}")))
}

fn opt_decimal(col: &str, raw: Option<String>) -> Result<Option<Decimal>, StoreError> {
    raw.map(|s| parse_decimal(col, &s)).transpose()
}

fn map_signal(row: &SqliteRow) -> Result<Signal, StoreError> {
    let side_raw: String = row.try_get("side").map_err(classify)?;
    let status_raw: String = row.try_get("status").map_err(classify)?;
    let entry_raw: String = row.try_get("entry_price_hint").map_err(classify)?;

    Ok(Signal {
        id: row.try_get("id").map_err(classify)?,
        symbol: row.try_get("symbol").map_err(classify)?,
        side: side_raw.parse::<Side>().map_err(StoreError::Corrupt)?,
        status: status_raw
            .parse::<SignalStatus>()
            .map_err(StoreError::Corrupt)?,
        entry_price_hint: parse_decimal("entry_price_hint", &entry_raw)?,
        size: opt_decimal("size", row.try_get("size").map_err(classify)?)?,
        stop_loss_price: opt_decimal(
            "stop_loss_price",
            row.try_get("stop_loss_price").map_err(classify)?,
        )?,
        take_profit_price: opt_decimal(
            "take_profit_price",
            row.try_get("take_profit_price").map_err(classify)?,
        )?,
        broker_order_id: row.try_get("broker_order_id").map_err(classify)?,
        fill_price: opt_decimal("fill_price", row.try_get("fill_price").map_err(classify)?)?,
        last_error: row.try_get("last_error").map_err(classify)?,
        claimed_by: row.try_get("claimed_by").map_err(classify)?,
        claimed_at: row
            .try_get::<Option<DateTime<Utc>>, _>("claimed_at")
            .map_err(classify)?,
        created_at: row.try_get("created_at").map_err(classify)?,
        updated_at: row.try_get("updated_at").map_err(classify)?,
        version: row.try_get("version").map_err(classify)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashSet;

    async fn mem_store() -> Store {
        Store::open_in_memory().await.unwrap()
    }

    fn draft(symbol: &str) -> SignalDraft {
        SignalDraft::new(symbol, Side::Buy, dec!(50.00))
    }

    #[tokio::test]
    async fn test_insert_and_fetch() {
        let store = mem_store().await;
        let id = store.insert_signal(&draft("AAPL")).await.unwrap();

        let signal = store.get_signal(id).await.unwrap();
        assert_eq!(signal.symbol, "AAPL");
        assert_eq!(signal.side, Side::Buy);
        assert_eq!(signal.status, SignalStatus::Pending);
        assert_eq!(signal.entry_price_hint, dec!(50.00));
        assert_eq!(signal.version, 1);
        assert!(signal.size.is_none());
        assert!(!signal.is_claimed());
    }

    #[tokio::test]
    async fn test_open_signal_blocks_duplicate_insert() {
        let store = mem_store().await;
        store.insert_signal(&draft("AAPL")).await.unwrap();

        let err = store.insert_signal(&draft("AAPL")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));

        // Opposite side and other symbols are unaffected.
        store
            .insert_signal(&SignalDraft::new("AAPL", Side::Sell, dec!(50)))
            .await
            .unwrap();
        store.insert_signal(&draft("MSFT")).await.unwrap();
    }

    #[tokio::test]
    async fn test_sized_signal_still_blocks_insert() {
        let store = mem_store().await;
        let id = store.insert_signal(&draft("AAPL")).await.unwrap();

        let claimed = store
            .claim_next(SignalStatus::Pending, "sizer-1")
            .await
            .unwrap()
            .unwrap();
        store
            .commit_transition(
                id,
                claimed.version,
                SignalStatus::Sized,
                &TransitionPatch::sized(dec!(400), dec!(47.50), dec!(55.00)),
            )
            .await
            .unwrap();

        let err = store.insert_signal(&draft("AAPL")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_terminal_signal_frees_the_slot() {
        let store = mem_store().await;
        let id = store.insert_signal(&draft("AAPL")).await.unwrap();

        let claimed = store
            .claim_next(SignalStatus::Pending, "sizer-1")
            .await
            .unwrap()
            .unwrap();
        store
            .commit_transition(
                id,
                claimed.version,
                SignalStatus::Rejected,
                &TransitionPatch::reason("size below one unit"),
            )
            .await
            .unwrap();

        store.insert_signal(&draft("AAPL")).await.unwrap();
    }

    #[tokio::test]
    async fn test_claim_marks_row_and_bumps_version() {
        let store = mem_store().await;
        let id = store.insert_signal(&draft("AAPL")).await.unwrap();

        let claimed = store
            .claim_next(SignalStatus::Pending, "sizer-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(claimed.id, id);
        assert_eq!(claimed.status, SignalStatus::Pending);
        assert_eq!(claimed.claimed_by.as_deref(), Some("sizer-1"));
        assert!(claimed.claimed_at.is_some());
        assert_eq!(claimed.version, 2);

        // The claimed row is invisible to further claimants.
        let second = store
            .claim_next(SignalStatus::Pending, "sizer-2")
            .await
            .unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_claim_oldest_first() {
        let store = mem_store().await;
        let first = store.insert_signal(&draft("AAPL")).await.unwrap();
        let _second = store.insert_signal(&draft("MSFT")).await.unwrap();

        let claimed = store
            .claim_next(SignalStatus::Pending, "sizer-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(claimed.id, first);
    }

    #[tokio::test]
    async fn test_commit_transition_applies_patch_and_clears_claim() {
        let store = mem_store().await;
        let id = store.insert_signal(&draft("AAPL")).await.unwrap();
        let claimed = store
            .claim_next(SignalStatus::Pending, "sizer-1")
            .await
            .unwrap()
            .unwrap();

        let sized = store
            .commit_transition(
                id,
                claimed.version,
                SignalStatus::Sized,
                &TransitionPatch::sized(dec!(400), dec!(47.50), dec!(55.00)),
            )
            .await
            .unwrap();

        assert_eq!(sized.status, SignalStatus::Sized);
        assert_eq!(sized.size, Some(dec!(400)));
        assert_eq!(sized.stop_loss_price, Some(dec!(47.50)));
        assert_eq!(sized.take_profit_price, Some(dec!(55.00)));
        assert!(!sized.is_claimed());
        assert_eq!(sized.version, claimed.version + 1);
    }

    #[tokio::test]
    async fn test_commit_with_wrong_version_is_rejected() {
        let store = mem_store().await;
        let id = store.insert_signal(&draft("AAPL")).await.unwrap();
        let claimed = store
            .claim_next(SignalStatus::Pending, "sizer-1")
            .await
            .unwrap()
            .unwrap();

        let err = store
            .commit_transition(
                id,
                claimed.version + 10,
                SignalStatus::Sized,
                &TransitionPatch::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { .. }));
    }

    #[tokio::test]
    async fn test_terminal_rows_are_immutable() {
        let store = mem_store().await;
        let id = store.insert_signal(&draft("AAPL")).await.unwrap();
        let claimed = store
            .claim_next(SignalStatus::Pending, "sizer-1")
            .await
            .unwrap()
            .unwrap();
        let rejected = store
            .commit_transition(
                id,
                claimed.version,
                SignalStatus::Rejected,
                &TransitionPatch::reason("no"),
            )
            .await
            .unwrap();

        let err = store
            .commit_transition(
                id,
                rejected.version,
                SignalStatus::Sized,
                &TransitionPatch::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { .. }));
    }

    #[tokio::test]
    async fn test_stale_claim_is_released_and_reclaimable() {
        let store = mem_store().await;
        let id = store.insert_signal(&draft("AAPL")).await.unwrap();
        store
            .claim_next(SignalStatus::Pending, "sizer-crashed")
            .await
            .unwrap()
            .unwrap();

        // Nothing to release while the lease is fresh.
        let released = store
            .release_stale_claims(Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(released, 0);

        // A zero-length lease expires immediately.
        let released = store.release_stale_claims(Duration::zero()).await.unwrap();
        assert_eq!(released, 1);

        let signal = store.get_signal(id).await.unwrap();
        assert_eq!(signal.status, SignalStatus::Pending);
        assert!(!signal.is_claimed());

        let reclaimed = store
            .claim_next(SignalStatus::Pending, "sizer-2")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reclaimed.id, id);
        assert_eq!(reclaimed.claimed_by.as_deref(), Some("sizer-2"));
    }

    #[tokio::test]
    async fn test_release_restores_preclaim_status() {
        let store = mem_store().await;
        let id = store.insert_signal(&draft("AAPL")).await.unwrap();
        let claimed = store
            .claim_next(SignalStatus::Pending, "sizer-1")
            .await
            .unwrap()
            .unwrap();
        store
            .commit_transition(
                id,
                claimed.version,
                SignalStatus::Sized,
                &TransitionPatch::sized(dec!(1), dec!(47.50), dec!(55.00)),
            )
            .await
            .unwrap();

        // Claim as SIZED, then let the lease lapse: the row must come back
        // as SIZED, not PENDING.
        store
            .claim_next(SignalStatus::Sized, "exec-crashed")
            .await
            .unwrap()
            .unwrap();
        store.release_stale_claims(Duration::zero()).await.unwrap();

        let signal = store.get_signal(id).await.unwrap();
        assert_eq!(signal.status, SignalStatus::Sized);
        assert!(!signal.is_claimed());
    }

    #[tokio::test]
    async fn test_release_claim_explicitly() {
        let store = mem_store().await;
        let id = store.insert_signal(&draft("AAPL")).await.unwrap();
        let claimed = store
            .claim_next(SignalStatus::Pending, "sizer-1")
            .await
            .unwrap()
            .unwrap();

        store.release_claim(id, claimed.version).await.unwrap();

        let signal = store.get_signal(id).await.unwrap();
        assert!(!signal.is_claimed());
        assert_eq!(signal.status, SignalStatus::Pending);
        assert_eq!(signal.version, claimed.version + 1);
    }

    #[tokio::test]
    async fn test_record_broker_order_keeps_claim() {
        let store = mem_store().await;
        let id = store.insert_signal(&draft("AAPL")).await.unwrap();
        let claimed = store
            .claim_next(SignalStatus::Pending, "exec-1")
            .await
            .unwrap()
            .unwrap();

        let stamped = store
            .record_broker_order(id, claimed.version, "brk-123")
            .await
            .unwrap();
        assert_eq!(stamped.broker_order_id.as_deref(), Some("brk-123"));
        assert_eq!(stamped.claimed_by.as_deref(), Some("exec-1"));
        assert_eq!(stamped.version, claimed.version + 1);
    }

    #[tokio::test]
    async fn test_expire_stale_pending() {
        let store = mem_store().await;
        let id = store.insert_signal(&draft("AAPL")).await.unwrap();

        let expired = store.expire_stale_pending(Duration::hours(1)).await.unwrap();
        assert_eq!(expired, 0);

        let expired = store.expire_stale_pending(Duration::zero()).await.unwrap();
        assert_eq!(expired, 1);

        let signal = store.get_signal(id).await.unwrap();
        assert_eq!(signal.status, SignalStatus::Expired);
        assert!(signal.last_error.is_some());

        // The slot is free again.
        store.insert_signal(&draft("AAPL")).await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_claimants_never_share_a_row() {
        let store = mem_store().await;

        let mut expected = HashSet::new();
        for i in 0..6 {
            let symbol = format!("SYM{i}");
            let id = store.insert_signal(&draft(&symbol)).await.unwrap();
            expected.insert(id);
        }

        let mut handles = Vec::new();
        for worker in 0..4 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let claimant = format!("sizer-{worker}");
                let mut claimed = Vec::new();
                loop {
                    match store.claim_next(SignalStatus::Pending, &claimant).await {
                        Ok(Some(signal)) => claimed.push(signal.id),
                        Ok(None) => break,
                        Err(e) => panic!("claim failed: {e}"),
                    }
                }
                claimed
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.await.unwrap() {
                assert!(seen.insert(id), "signal {id} claimed twice");
            }
        }

        // A worker that loses every CAS round gives up early; drain what is
        // left so coverage is checked against the full set.
        while let Some(signal) = store
            .claim_next(SignalStatus::Pending, "sweeper")
            .await
            .unwrap()
        {
            assert!(seen.insert(signal.id), "signal {} claimed twice", signal.id);
        }
        assert_eq!(seen, expected);
    }

    #[tokio::test]
    async fn test_count_and_recent() {
        let store = mem_store().await;
        store.insert_signal(&draft("AAPL")).await.unwrap();
        store.insert_signal(&draft("MSFT")).await.unwrap();

        let counts = store.count_by_status().await.unwrap();
        assert_eq!(counts, vec![(SignalStatus::Pending, 2)]);

        let recent = store.recent_signals(10).await.unwrap();
        assert_eq!(recent.len(), 2);
    }
}
