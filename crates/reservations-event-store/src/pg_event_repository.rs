//! `PostgreSQL` implementation of the `EventRepository` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, warn};
use uuid::Uuid;

use reservations_core::error::DomainError;
use reservations_core::repository::{EventRepository, StoredEvent};

type EventRow = (
    Uuid,
    Uuid,
    String,
    serde_json::Value,
    i64,
    Uuid,
    Uuid,
    DateTime<Utc>,
);

const LOAD_EVENTS: &str = r"
SELECT event_id, aggregate_id, event_type, payload, sequence_number,
       correlation_id, causation_id, occurred_at
FROM domain_events
WHERE aggregate_id = $1
ORDER BY sequence_number
";

const CURRENT_VERSION: &str = r"
SELECT COALESCE(MAX(sequence_number), 0)
FROM domain_events
WHERE aggregate_id = $1
";

const INSERT_EVENT: &str = r"
INSERT INTO domain_events (
    event_id, aggregate_id, event_type, payload, sequence_number,
    correlation_id, causation_id, occurred_at
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
";

/// Applies the bundled schema migrations.
///
/// # Errors
///
/// Returns `sqlx::migrate::MigrateError` if a migration fails to apply.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(pool).await
}

fn infrastructure(err: &sqlx::Error) -> DomainError {
    DomainError::Infrastructure(err.to_string())
}

/// The unique constraint on `(aggregate_id, sequence_number)`.
const STREAM_POSITION_CONSTRAINT: &str = "domain_events_stream_position";

/// True only when another writer already took one of the batch's stream
/// positions. Other unique violations, such as a reused `event_id`, are not
/// races and must not be retried.
fn is_stream_position_conflict(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db)
            if db.is_unique_violation() && db.constraint() == Some(STREAM_POSITION_CONSTRAINT)
    )
}

/// PostgreSQL-backed event repository.
#[derive(Debug, Clone)]
pub struct PgEventRepository {
    pool: PgPool,
}

impl PgEventRepository {
    /// Creates a new `PgEventRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn current_version<'e, E>(executor: E, aggregate_id: Uuid) -> Result<i64, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        sqlx::query_scalar(CURRENT_VERSION)
            .bind(aggregate_id)
            .fetch_one(executor)
            .await
    }

    /// Builds the conflict error after a racing writer won the unique
    /// constraint. The transaction is gone, so the version is re-read.
    async fn lost_race(&self, aggregate_id: Uuid, expected_version: i64) -> DomainError {
        let actual = Self::current_version(&self.pool, aggregate_id)
            .await
            .unwrap_or(expected_version + 1);
        warn!(%aggregate_id, expected_version, actual, "lost append race");
        DomainError::ConcurrencyConflict {
            aggregate_id,
            expected: expected_version,
            actual,
        }
    }
}

#[async_trait]
impl EventRepository for PgEventRepository {
    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        let rows: Vec<EventRow> = sqlx::query_as(LOAD_EVENTS)
            .bind(aggregate_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| infrastructure(&e))?;

        debug!(%aggregate_id, count = rows.len(), "loaded events");

        Ok(rows
            .into_iter()
            .map(
                |(
                    event_id,
                    aggregate_id,
                    event_type,
                    payload,
                    sequence_number,
                    correlation_id,
                    causation_id,
                    occurred_at,
                )| StoredEvent {
                    event_id,
                    aggregate_id,
                    event_type,
                    payload,
                    sequence_number,
                    correlation_id,
                    causation_id,
                    occurred_at,
                },
            )
            .collect())
    }

    async fn append_events(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        StoredEvent::validate_batch(aggregate_id, expected_version, events)?;
        if events.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(|e| infrastructure(&e))?;

        let actual = Self::current_version(&mut *tx, aggregate_id)
            .await
            .map_err(|e| infrastructure(&e))?;
        if actual != expected_version {
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                actual,
            });
        }

        for event in events {
            let inserted = sqlx::query(INSERT_EVENT)
                .bind(event.event_id)
                .bind(event.aggregate_id)
                .bind(&event.event_type)
                .bind(&event.payload)
                .bind(event.sequence_number)
                .bind(event.correlation_id)
                .bind(event.causation_id)
                .bind(event.occurred_at)
                .execute(&mut *tx)
                .await;

            match inserted {
                Ok(_) => {}
                Err(err) if is_stream_position_conflict(&err) => {
                    drop(tx);
                    return Err(self.lost_race(aggregate_id, expected_version).await);
                }
                Err(err) => return Err(infrastructure(&err)),
            }
        }

        match tx.commit().await {
            Ok(()) => {}
            Err(err) if is_stream_position_conflict(&err) => {
                return Err(self.lost_race(aggregate_id, expected_version).await);
            }
            Err(err) => return Err(infrastructure(&err)),
        }

        debug!(%aggregate_id, expected_version, count = events.len(), "appended events");
        Ok(())
    }
}
