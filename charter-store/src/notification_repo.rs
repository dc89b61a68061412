use async_trait::async_trait;
use charter_core::{CoreError, CoreResult};
use charter_notify::{IdempotencyKey, Notification, NotificationRepository};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::database::storage_err;

pub struct StoreNotificationRepository {
    pool: PgPool,
}

impl StoreNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    user_id: Uuid,
    kind: String,
    title: String,
    message: String,
    read: bool,
    idempotency_key: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = CoreError;

    fn try_from(row: NotificationRow) -> CoreResult<Self> {
        Ok(Notification {
            id: row.id,
            user_id: row.user_id,
            kind: row.kind.parse()?,
            title: row.title,
            message: row.message,
            read: row.read,
            idempotency_key: row.idempotency_key.map(IdempotencyKey::new),
            created_at: row.created_at,
        })
    }
}

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, kind, title, message, read, idempotency_key, created_at";

/// Insert inside an open transaction. A taken idempotency key yields the
/// existing row and `false`.
pub(crate) async fn insert_notification_tx(
    tx: &mut Transaction<'_, Postgres>,
    notification: Notification,
) -> CoreResult<(Notification, bool)> {
    let inserted = sqlx::query_as::<_, NotificationRow>(&format!(
        r#"
        INSERT INTO notifications (id, user_id, kind, title, message, read, idempotency_key, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (idempotency_key) DO NOTHING
        RETURNING {}
        "#,
        NOTIFICATION_COLUMNS
    ))
    .bind(notification.id)
    .bind(notification.user_id)
    .bind(notification.kind.as_str())
    .bind(&notification.title)
    .bind(&notification.message)
    .bind(notification.read)
    .bind(notification.idempotency_key.as_ref().map(|k| k.as_str()))
    .bind(notification.created_at)
    .fetch_optional(&mut **tx)
    .await
    .map_err(storage_err)?;

    if let Some(row) = inserted {
        return Ok((Notification::try_from(row)?, true));
    }

    let key = notification.idempotency_key.as_ref().ok_or_else(|| {
        CoreError::storage(format!("notification {} was not inserted", notification.id))
    })?;
    let existing = sqlx::query_as::<_, NotificationRow>(&format!(
        "SELECT {} FROM notifications WHERE idempotency_key = $1",
        NOTIFICATION_COLUMNS
    ))
    .bind(key.as_str())
    .fetch_one(&mut **tx)
    .await
    .map_err(storage_err)?;

    Ok((Notification::try_from(existing)?, false))
}

#[async_trait]
impl NotificationRepository for StoreNotificationRepository {
    async fn insert_notification(
        &self,
        notification: Notification,
    ) -> CoreResult<(Notification, bool)> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;
        let result = insert_notification_tx(&mut tx, notification).await?;
        tx.commit().await.map_err(storage_err)?;
        Ok(result)
    }

    async fn find_notification_by_key(
        &self,
        key: &IdempotencyKey,
    ) -> CoreResult<Option<Notification>> {
        let row = sqlx::query_as::<_, NotificationRow>(&format!(
            "SELECT {} FROM notifications WHERE idempotency_key = $1",
            NOTIFICATION_COLUMNS
        ))
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.map(Notification::try_from).transpose()
    }

    async fn list_notifications(&self, user_id: Uuid) -> CoreResult<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(&format!(
            "SELECT {} FROM notifications WHERE user_id = $1 ORDER BY seq DESC",
            NOTIFICATION_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.into_iter().map(Notification::try_from).collect()
    }

    async fn mark_notifications_read(&self, ids: &[Uuid]) -> CoreResult<usize> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        let known: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM notifications WHERE id = ANY($1) FOR UPDATE",
        )
        .bind(ids)
        .fetch_all(&mut *tx)
        .await
        .map_err(storage_err)?;

        if let Some(missing) = ids.iter().find(|id| !known.contains(id)) {
            // Dropping `tx` rolls back.
            return Err(CoreError::NotFound(format!("notification {}", missing)));
        }

        sqlx::query("UPDATE notifications SET read = TRUE WHERE id = ANY($1)")
            .bind(ids)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;

        tx.commit().await.map_err(storage_err)?;
        Ok(ids.len())
    }

    async fn count_unread_notifications(&self, user_id: Uuid) -> CoreResult<usize> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT read",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(count as usize)
    }
}
