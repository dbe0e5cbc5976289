use chrono::{DateTime, Utc};
use sqlx::{Sqlite, Transaction};
use thiserror::Error;

use crate::{is_unique_violation, new_id, to_rfc3339};

/// Log of payment provider events that have already been applied.
///
/// All operations run inside the caller's transaction so the record commits
/// together with the mutations it guards.
#[derive(Clone, Copy)]
pub struct PaymentEventRepository;

/// Result of attempting to record an event id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded,
    Duplicate,
}

impl RecordOutcome {
    pub fn is_duplicate(self) -> bool {
        matches!(self, Self::Duplicate)
    }
}

#[derive(Debug, Error)]
pub enum PaymentEventError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl PaymentEventRepository {
    pub async fn is_recorded(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        event_id: &str,
    ) -> Result<bool, PaymentEventError> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM payment_events WHERE event_id = ?")
                .bind(event_id)
                .fetch_optional(&mut **tx)
                .await?;
        Ok(found.is_some())
    }

    pub async fn record(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        event_id: &str,
        event_type: &str,
        order_id: Option<&str>,
        processed_at: DateTime<Utc>,
    ) -> Result<RecordOutcome, PaymentEventError> {
        let result = sqlx::query(
            "INSERT INTO payment_events (id, event_id, event_type, order_id, processed_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(new_id())
        .bind(event_id)
        .bind(event_type)
        .bind(order_id)
        .bind(to_rfc3339(processed_at))
        .execute(&mut **tx)
        .await;

        match result {
            Ok(_) => Ok(RecordOutcome::Recorded),
            Err(err) if is_unique_violation(&err) => Ok(RecordOutcome::Duplicate),
            Err(err) => Err(PaymentEventError::Database(err)),
        }
    }
}
