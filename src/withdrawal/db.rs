//! Withdrawal Database Layer
//!
//! SQLite persistence for withdrawal requests.
//!
//! The store owns exactly one connection behind a `tokio::sync::Mutex`.
//! Every public operation holds that lock for its whole read-check-write
//! sequence, so each method is atomic with respect to every other one.
//! Status updates are additionally written as CAS (`WHERE status = ?`).

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{ConnectOptions, Connection, Row};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::error::WithdrawalError;
use super::state::WithdrawalStatus;
use super::types::{Metadata, NewWithdrawal, RequestId, WithdrawalRequest};

const SELECT_COLUMNS: &str = r#"
    SELECT id, player_name, player_uuid, wallet_address, amount, currency,
           status, created_at, updated_at, metadata, review_message_id,
           handled_by, handled_by_id, transaction_id, failure_reason
    FROM withdrawals
"#;

/// Withdrawal request store
pub struct WithdrawalStore {
    conn: Mutex<Option<SqliteConnection>>,
}

impl WithdrawalStore {
    /// Open (or create) the database file at `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, WithdrawalError> {
        let path = path.as_ref();
        let conn = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .connect()
            .await?;

        info!(path = %path.display(), "Withdrawal store opened");
        Self::with_connection(conn).await
    }

    /// Private in-memory database, gone once the store is closed
    pub async fn open_in_memory() -> Result<Self, WithdrawalError> {
        let conn = SqliteConnectOptions::from_str("sqlite::memory:")?
            .connect()
            .await?;
        Self::with_connection(conn).await
    }

    async fn with_connection(mut conn: SqliteConnection) -> Result<Self, WithdrawalError> {
        ensure_schema(&mut conn).await?;
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Persist a new PENDING request
    ///
    /// Timestamps are assigned here, never by the caller.
    pub async fn create(&self, input: &NewWithdrawal) -> Result<WithdrawalRequest, WithdrawalError> {
        let metadata = serde_json::to_string(&input.metadata)
            .map_err(|e| WithdrawalError::Validation(format!("metadata: {}", e)))?;

        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(WithdrawalError::StoreClosed)?;

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO withdrawals
                (player_name, player_uuid, wallet_address, amount, currency,
                 status, created_at, updated_at, metadata)
            VALUES
                (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(input.player_name.as_str())
        .bind(input.player_uuid.as_deref())
        .bind(input.wallet_address.as_str())
        .bind(input.amount.to_string())
        .bind(input.currency.as_str())
        .bind(WithdrawalStatus::Pending.as_str())
        .bind(now)
        .bind(now)
        .bind(metadata)
        .execute(&mut *conn)
        .await?;

        let id = result.last_insert_rowid();
        let request = load(conn, id).await?;
        info!(
            request_id = id,
            amount = %request.amount,
            currency = %request.currency,
            "Withdrawal request created"
        );
        Ok(request)
    }

    pub async fn get(&self, id: RequestId) -> Result<WithdrawalRequest, WithdrawalError> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(WithdrawalError::StoreClosed)?;
        load(conn, id).await
    }

    /// Most recently created first, optionally filtered by status
    pub async fn list(
        &self,
        status: Option<WithdrawalStatus>,
        limit: u32,
    ) -> Result<Vec<WithdrawalRequest>, WithdrawalError> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(WithdrawalError::StoreClosed)?;

        let rows = match status {
            None => {
                let sql = format!("{SELECT_COLUMNS} ORDER BY created_at DESC, id DESC LIMIT ?");
                sqlx::query(&sql)
                    .bind(i64::from(limit))
                    .fetch_all(&mut *conn)
                    .await?
            }
            Some(status) => {
                let sql = format!(
                    "{SELECT_COLUMNS} WHERE status = ? ORDER BY created_at DESC, id DESC LIMIT ?"
                );
                sqlx::query(&sql)
                    .bind(status.as_str())
                    .bind(i64::from(limit))
                    .fetch_all(&mut *conn)
                    .await?
            }
        };

        rows.iter().map(row_to_request).collect()
    }

    /// Attach the presentation-layer message that renders this request
    pub async fn set_review_message(
        &self,
        id: RequestId,
        message_id: i64,
    ) -> Result<WithdrawalRequest, WithdrawalError> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(WithdrawalError::StoreClosed)?;

        let current = load(conn, id).await?;
        let result = sqlx::query(
            "UPDATE withdrawals SET review_message_id = ?, updated_at = ? WHERE id = ?",
        )
        .bind(message_id)
        .bind(next_timestamp(&current))
        .bind(id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(WithdrawalError::NotFound(id));
        }
        load(conn, id).await
    }

    /// PENDING → PROCESSING
    ///
    /// This is the exclusive gate in front of the payout: of any number of
    /// concurrent callers exactly one sees `Ok`.
    pub async fn mark_processing(&self, id: RequestId) -> Result<WithdrawalRequest, WithdrawalError> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(WithdrawalError::StoreClosed)?;

        let current = load(conn, id).await?;
        if current.status != WithdrawalStatus::Pending {
            return Err(WithdrawalError::InvalidState {
                id,
                action: "process",
                current: current.status,
            });
        }

        let result = sqlx::query(
            "UPDATE withdrawals SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(WithdrawalStatus::Processing.as_str())
        .bind(next_timestamp(&current))
        .bind(id)
        .bind(current.status.as_str())
        .execute(&mut *conn)
        .await?;

        let updated = finish_cas(conn, id, result.rows_affected(), "process").await?;
        debug!(request_id = id, "Withdrawal moved to processing");
        Ok(updated)
    }

    /// PENDING | PROCESSING → APPROVED
    ///
    /// Records the actor and transaction id and clears any failure reason.
    pub async fn mark_approved(
        &self,
        id: RequestId,
        actor_name: &str,
        actor_id: i64,
        transaction_id: &str,
    ) -> Result<WithdrawalRequest, WithdrawalError> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(WithdrawalError::StoreClosed)?;

        let current = load(conn, id).await?;
        ensure_reviewable(&current, "approve")?;

        let result = sqlx::query(
            r#"
            UPDATE withdrawals
            SET status = ?, handled_by = ?, handled_by_id = ?, transaction_id = ?,
                failure_reason = NULL, updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(WithdrawalStatus::Approved.as_str())
        .bind(actor_name)
        .bind(actor_id)
        .bind(transaction_id)
        .bind(next_timestamp(&current))
        .bind(id)
        .bind(current.status.as_str())
        .execute(&mut *conn)
        .await?;

        finish_cas(conn, id, result.rows_affected(), "approve").await
    }

    /// PENDING | PROCESSING → REJECTED
    pub async fn mark_rejected(
        &self,
        id: RequestId,
        actor_name: &str,
        actor_id: i64,
        reason: Option<&str>,
    ) -> Result<WithdrawalRequest, WithdrawalError> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(WithdrawalError::StoreClosed)?;

        let current = load(conn, id).await?;
        ensure_reviewable(&current, "reject")?;

        let result = sqlx::query(
            r#"
            UPDATE withdrawals
            SET status = ?, handled_by = ?, handled_by_id = ?, failure_reason = ?,
                updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(WithdrawalStatus::Rejected.as_str())
        .bind(actor_name)
        .bind(actor_id)
        .bind(reason)
        .bind(next_timestamp(&current))
        .bind(id)
        .bind(current.status.as_str())
        .execute(&mut *conn)
        .await?;

        let updated = finish_cas(conn, id, result.rows_affected(), "reject").await?;
        info!(request_id = id, actor = actor_name, "Withdrawal rejected");
        Ok(updated)
    }

    /// Any state → FAILED
    ///
    /// No precondition. The transaction id is cleared so that it stays
    /// present only on approved rows.
    pub async fn mark_failed(
        &self,
        id: RequestId,
        reason: &str,
    ) -> Result<WithdrawalRequest, WithdrawalError> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(WithdrawalError::StoreClosed)?;

        let current = load(conn, id).await?;
        if let Some(tx_id) = current.transaction_id.as_deref() {
            warn!(
                request_id = id,
                status = %current.status,
                transaction_id = tx_id,
                "Overwriting a paid withdrawal with FAILED, transaction id discarded"
            );
        }

        sqlx::query(
            r#"
            UPDATE withdrawals
            SET status = ?, failure_reason = ?, transaction_id = NULL, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(WithdrawalStatus::Failed.as_str())
        .bind(reason)
        .bind(next_timestamp(&current))
        .bind(id)
        .execute(&mut *conn)
        .await?;

        load(conn, id).await
    }

    /// Release the connection. Later calls fail with `StoreClosed`.
    pub async fn close(&self) -> Result<(), WithdrawalError> {
        let mut guard = self.conn.lock().await;
        match guard.take() {
            Some(conn) => {
                conn.close().await?;
                info!("Withdrawal store closed");
            }
            None => debug!("Withdrawal store already closed"),
        }
        Ok(())
    }

    pub async fn is_closed(&self) -> bool {
        self.conn.lock().await.is_none()
    }
}

async fn ensure_schema(conn: &mut SqliteConnection) -> Result<(), WithdrawalError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS withdrawals (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            player_name TEXT NOT NULL,
            player_uuid TEXT,
            wallet_address TEXT NOT NULL,
            amount TEXT NOT NULL,
            currency TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            metadata TEXT,
            review_message_id INTEGER,
            handled_by TEXT,
            handled_by_id INTEGER,
            transaction_id TEXT,
            failure_reason TEXT
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_withdrawals_status_created ON withdrawals (status, created_at)",
    )
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn load(conn: &mut SqliteConnection, id: RequestId) -> Result<WithdrawalRequest, WithdrawalError> {
    let sql = format!("{SELECT_COLUMNS} WHERE id = ?");
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => row_to_request(&row),
        None => Err(WithdrawalError::NotFound(id)),
    }
}

/// Re-read after a CAS update; zero affected rows means the status moved
async fn finish_cas(
    conn: &mut SqliteConnection,
    id: RequestId,
    rows_affected: u64,
    action: &'static str,
) -> Result<WithdrawalRequest, WithdrawalError> {
    let request = load(conn, id).await?;
    if rows_affected == 0 {
        return Err(WithdrawalError::InvalidState {
            id,
            action,
            current: request.status,
        });
    }
    Ok(request)
}

fn ensure_reviewable(current: &WithdrawalRequest, action: &'static str) -> Result<(), WithdrawalError> {
    if current.status.is_reviewable() {
        Ok(())
    } else {
        Err(WithdrawalError::InvalidState {
            id: current.id,
            action,
            current: current.status,
        })
    }
}

/// `updated_at` never moves backwards, even if the wall clock does
fn next_timestamp(current: &WithdrawalRequest) -> DateTime<Utc> {
    Utc::now().max(current.updated_at)
}

fn row_to_request(row: &SqliteRow) -> Result<WithdrawalRequest, WithdrawalError> {
    let id: RequestId = row.try_get("id")?;

    let amount_raw: String = row.try_get("amount")?;
    let amount = Decimal::from_str(&amount_raw).map_err(|e| WithdrawalError::CorruptRow {
        id,
        reason: format!("amount {:?}: {}", amount_raw, e),
    })?;

    let status_raw: String = row.try_get("status")?;
    let status = status_raw
        .parse::<WithdrawalStatus>()
        .map_err(|reason| WithdrawalError::CorruptRow { id, reason })?;

    let metadata_raw: Option<String> = row.try_get("metadata")?;
    let metadata = match metadata_raw.as_deref() {
        None | Some("") => Metadata::new(),
        Some(raw) => serde_json::from_str(raw).map_err(|e| WithdrawalError::CorruptRow {
            id,
            reason: format!("metadata: {}", e),
        })?,
    };

    Ok(WithdrawalRequest {
        id,
        player_name: row.try_get("player_name")?,
        player_uuid: row.try_get("player_uuid")?,
        wallet_address: row.try_get("wallet_address")?,
        amount,
        currency: row.try_get("currency")?,
        status,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        metadata,
        review_message_id: row.try_get("review_message_id")?,
        handled_by: row.try_get("handled_by")?,
        handled_by_id: row.try_get("handled_by_id")?,
        transaction_id: row.try_get("transaction_id")?,
        failure_reason: row.try_get("failure_reason")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn store() -> WithdrawalStore {
        WithdrawalStore::open_in_memory().await.unwrap()
    }

    fn btc(amount: &str) -> NewWithdrawal {
        NewWithdrawal::new("Steve", "addr1", Decimal::from_str(amount).unwrap(), "BTC")
    }

    #[tokio::test]
    async fn test_create_starts_pending() {
        let store = store().await;
        let req = store.create(&btc("1.5")).await.unwrap();

        assert!(req.id > 0);
        assert_eq!(req.status, WithdrawalStatus::Pending);
        assert_eq!(req.amount, Decimal::from_str("1.5").unwrap());
        assert_eq!(req.created_at, req.updated_at);
        assert!(req.transaction_id.is_none());
        assert!(req.failure_reason.is_none());
    }

    #[tokio::test]
    async fn test_amount_is_exact() {
        let store = store().await;
        let req = store.create(&btc("0.100000000000000001")).await.unwrap();
        let loaded = store.get(req.id).await.unwrap();
        assert_eq!(loaded.amount.to_string(), "0.100000000000000001");
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let store = store().await;
        let a = store.create(&btc("1")).await.unwrap();
        let b = store.create(&btc("1")).await.unwrap();
        assert!(b.id > a.id);
    }

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        let store = store().await;
        let err = store.get(404).await.unwrap_err();
        assert!(matches!(err, WithdrawalError::NotFound(404)));
    }

    #[tokio::test]
    async fn test_metadata_roundtrip() {
        let store = store().await;
        let mut metadata = Metadata::new();
        metadata.insert("server".into(), json!("survival-1"));
        metadata.insert("balance".into(), json!({"before": 10, "after": 8}));
        let input = btc("2").with_player_uuid("uuid-1").with_metadata(metadata.clone());

        let req = store.create(&input).await.unwrap();
        let loaded = store.get(req.id).await.unwrap();
        assert_eq!(loaded.metadata, metadata);
        assert_eq!(loaded.player_uuid.as_deref(), Some("uuid-1"));
    }

    #[tokio::test]
    async fn test_list_newest_first_with_filter() {
        let store = store().await;
        let first = store.create(&btc("1")).await.unwrap();
        let second = store.create(&btc("2")).await.unwrap();
        let third = store.create(&btc("3")).await.unwrap();
        store.mark_rejected(second.id, "admin", 1, None).await.unwrap();

        let all = store.list(None, 10).await.unwrap();
        let ids: Vec<_> = all.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![third.id, second.id, first.id]);

        let pending = store.list(Some(WithdrawalStatus::Pending), 10).await.unwrap();
        let ids: Vec<_> = pending.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![third.id, first.id]);
        assert!(pending.iter().all(|r| r.status == WithdrawalStatus::Pending));

        let limited = store.list(None, 1).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id, third.id);
    }

    #[tokio::test]
    async fn test_processing_requires_pending() {
        let store = store().await;
        let req = store.create(&btc("1")).await.unwrap();

        let processing = store.mark_processing(req.id).await.unwrap();
        assert_eq!(processing.status, WithdrawalStatus::Processing);
        assert!(processing.updated_at >= req.updated_at);

        let err = store.mark_processing(req.id).await.unwrap_err();
        assert_eq!(err.current_status(), Some(WithdrawalStatus::Processing));
    }

    #[tokio::test]
    async fn test_approve_records_actor_and_clears_reason() {
        let store = store().await;
        let req = store.create(&btc("1")).await.unwrap();
        store.mark_processing(req.id).await.unwrap();

        let approved = store
            .mark_approved(req.id, "admin", 42, "tx-1")
            .await
            .unwrap();
        assert_eq!(approved.status, WithdrawalStatus::Approved);
        assert_eq!(approved.handled_by.as_deref(), Some("admin"));
        assert_eq!(approved.handled_by_id, Some(42));
        assert_eq!(approved.transaction_id.as_deref(), Some("tx-1"));
        assert!(approved.failure_reason.is_none());

        let err = store
            .mark_approved(req.id, "admin", 42, "tx-2")
            .await
            .unwrap_err();
        assert_eq!(err.current_status(), Some(WithdrawalStatus::Approved));
        assert_eq!(
            store.get(req.id).await.unwrap().transaction_id.as_deref(),
            Some("tx-1")
        );
    }

    #[tokio::test]
    async fn test_approve_from_failed_is_refused() {
        let store = store().await;
        let req = store.create(&btc("1")).await.unwrap();
        store.mark_failed(req.id, "rpc down").await.unwrap();

        let err = store.mark_approved(req.id, "admin", 1, "tx").await.unwrap_err();
        assert_eq!(err.current_status(), Some(WithdrawalStatus::Failed));
    }

    #[tokio::test]
    async fn test_reject_then_reject_again() {
        let store = store().await;
        let req = store.create(&btc("1")).await.unwrap();

        let rejected = store
            .mark_rejected(req.id, "mod", 7, Some("policy"))
            .await
            .unwrap();
        assert_eq!(rejected.status, WithdrawalStatus::Rejected);
        assert_eq!(rejected.failure_reason.as_deref(), Some("policy"));

        let err = store
            .mark_rejected(req.id, "other", 8, Some("again"))
            .await
            .unwrap_err();
        assert!(matches!(err, WithdrawalError::InvalidState { .. }));

        let after = store.get(req.id).await.unwrap();
        assert_eq!(after, rejected);
    }

    #[tokio::test]
    async fn test_failed_has_no_precondition_and_clears_tx() {
        let store = store().await;
        let req = store.create(&btc("1")).await.unwrap();
        store.mark_approved(req.id, "admin", 1, "tx-9").await.unwrap();

        let failed = store.mark_failed(req.id, "chargeback").await.unwrap();
        assert_eq!(failed.status, WithdrawalStatus::Failed);
        assert_eq!(failed.failure_reason.as_deref(), Some("chargeback"));
        assert!(failed.transaction_id.is_none());

        let again = store.mark_failed(req.id, "second").await.unwrap();
        assert_eq!(again.failure_reason.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_failed_unknown_is_not_found() {
        let store = store().await;
        let err = store.mark_failed(5, "x").await.unwrap_err();
        assert!(matches!(err, WithdrawalError::NotFound(5)));
    }

    #[tokio::test]
    async fn test_review_message() {
        let store = store().await;
        let req = store.create(&btc("1")).await.unwrap();

        let updated = store.set_review_message(req.id, 1234567890123).await.unwrap();
        assert_eq!(updated.review_message_id, Some(1234567890123));
        assert!(updated.updated_at >= req.updated_at);

        let err = store.set_review_message(999, 1).await.unwrap_err();
        assert!(matches!(err, WithdrawalError::NotFound(999)));
    }

    #[tokio::test]
    async fn test_updated_at_is_monotonic() {
        let store = store().await;
        let req = store.create(&btc("1")).await.unwrap();
        let a = store.set_review_message(req.id, 1).await.unwrap();
        let b = store.mark_processing(req.id).await.unwrap();
        let c = store.mark_failed(req.id, "boom").await.unwrap();

        assert!(a.updated_at >= req.created_at);
        assert!(b.updated_at >= a.updated_at);
        assert!(c.updated_at >= b.updated_at);
        assert_eq!(c.created_at, req.created_at);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let store = store().await;
        store.create(&btc("1")).await.unwrap();

        store.close().await.unwrap();
        assert!(store.is_closed().await);
        store.close().await.unwrap();

        let err = store.get(1).await.unwrap_err();
        assert!(matches!(err, WithdrawalError::StoreClosed));
    }

    #[tokio::test]
    async fn test_rows_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("withdrawals.db");

        let store = WithdrawalStore::open(&path).await.unwrap();
        let req = store.create(&btc("3.25")).await.unwrap();
        store.mark_processing(req.id).await.unwrap();
        store.close().await.unwrap();

        let reopened = WithdrawalStore::open(&path).await.unwrap();
        let loaded = reopened.get(req.id).await.unwrap();
        assert_eq!(loaded.status, WithdrawalStatus::Processing);
        assert_eq!(loaded.amount, Decimal::from_str("3.25").unwrap());

        let next = reopened.create(&btc("1")).await.unwrap();
        assert!(next.id > req.id);
        reopened.close().await.unwrap();
    }
}
