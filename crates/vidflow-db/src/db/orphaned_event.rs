use async_trait::async_trait;
use sqlx::PgPool;
use vidflow_core::models::OrphanedEvent;
use vidflow_core::AppError;

/// Sink for verified webhook events that matched no local record.
#[async_trait]
pub trait OrphanedEventLog: Send + Sync {
    async fn record(&self, event: &OrphanedEvent) -> Result<(), AppError>;
}

/// PostgreSQL repository for `orphaned_webhook_events`
#[derive(Clone)]
pub struct OrphanedEventRepository {
    pool: PgPool,
}

impl OrphanedEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrphanedEventLog for OrphanedEventRepository {
    #[tracing::instrument(skip(self, event), fields(db.table = "orphaned_webhook_events", db.operation = "insert", event_type = %event.event_type))]
    async fn record(&self, event: &OrphanedEvent) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO orphaned_webhook_events (id, event_type, object_id, payload, received_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(event.id)
        .bind(&event.event_type)
        .bind(&event.object_id)
        .bind(&event.payload)
        .bind(event.received_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
