use async_trait::async_trait;
use charter_chat::{ChatMessage, ChatRepository, NewChatMessage, ReadReceipt, ThreadSummary};
use charter_core::{CoreError, CoreResult};
use charter_shared::SenderRole;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::database::storage_err;

pub struct StoreChatRepository {
    pool: PgPool,
}

impl StoreChatRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: i64,
    user_id: Uuid,
    content: String,
    sender: String,
    read: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for ChatMessage {
    type Error = CoreError;

    fn try_from(row: MessageRow) -> CoreResult<Self> {
        Ok(ChatMessage {
            id: row.id,
            user_id: row.user_id,
            content: row.content,
            sender: row.sender.parse()?,
            read: row.read,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ThreadRow {
    user_id: Uuid,
    last_message_id: i64,
    last_message_at: DateTime<Utc>,
    last_sender: String,
    preview: String,
    unread_count: i32,
    message_count: i32,
}

impl TryFrom<ThreadRow> for ThreadSummary {
    type Error = CoreError;

    fn try_from(row: ThreadRow) -> CoreResult<Self> {
        Ok(ThreadSummary {
            user_id: row.user_id,
            last_message_id: row.last_message_id,
            last_message_at: row.last_message_at,
            last_sender: row.last_sender.parse()?,
            preview: row.preview,
            unread_count: row.unread_count.max(0) as u32,
            message_count: row.message_count.max(0) as u32,
        })
    }
}

const THREAD_COLUMNS: &str =
    "user_id, last_message_id, last_message_at, last_sender, preview, unread_count, message_count";

/// Row-lock the thread summary. Every writer to a thread takes this lock first,
/// which serializes inserts with read-marking.
async fn lock_thread(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
) -> CoreResult<Option<ThreadRow>> {
    sqlx::query_as::<_, ThreadRow>(&format!(
        "SELECT {} FROM chat_threads WHERE user_id = $1 FOR UPDATE",
        THREAD_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(storage_err)
}

#[async_trait]
impl ChatRepository for StoreChatRepository {
    async fn append_message(
        &self,
        message: NewChatMessage,
    ) -> CoreResult<(ChatMessage, ThreadSummary)> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        // 1. Make sure the thread row exists, then lock it
        sqlx::query(
            r#"
            INSERT INTO chat_threads (user_id, last_message_id, last_message_at, last_sender, preview)
            VALUES ($1, 0, NOW(), $2, '')
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(message.user_id)
        .bind(message.sender.as_str())
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;
        lock_thread(&mut tx, message.user_id).await?;

        // 2. Message row; its id is the per-thread order
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            INSERT INTO chat_messages (user_id, content, sender)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, content, sender, read, created_at
            "#,
        )
        .bind(message.user_id)
        .bind(&message.content)
        .bind(message.sender.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(storage_err)?;
        let stored = ChatMessage::try_from(row)?;

        // 3. Summary in the same transaction
        let unread = i32::from(message.sender.counts_as_unread());
        let thread = sqlx::query_as::<_, ThreadRow>(&format!(
            r#"
            UPDATE chat_threads
            SET last_message_id = $2, last_message_at = $3, last_sender = $4, preview = $5,
                unread_count = unread_count + $6, message_count = message_count + 1
            WHERE user_id = $1
            RETURNING {}
            "#,
            THREAD_COLUMNS
        ))
        .bind(stored.user_id)
        .bind(stored.id)
        .bind(stored.created_at)
        .bind(stored.sender.as_str())
        .bind(&message.preview)
        .bind(unread)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage_err)?;

        tx.commit().await.map_err(storage_err)?;
        Ok((stored, ThreadSummary::try_from(thread)?))
    }

    async fn thread_messages(&self, user_id: Uuid) -> CoreResult<Vec<ChatMessage>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, user_id, content, sender, read, created_at
            FROM chat_messages WHERE user_id = $1 ORDER BY id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.into_iter().map(ChatMessage::try_from).collect()
    }

    async fn thread_summary(&self, user_id: Uuid) -> CoreResult<Option<ThreadSummary>> {
        let row = sqlx::query_as::<_, ThreadRow>(&format!(
            "SELECT {} FROM chat_threads WHERE user_id = $1 AND message_count > 0",
            THREAD_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.map(ThreadSummary::try_from).transpose()
    }

    async fn thread_summaries(&self) -> CoreResult<Vec<ThreadSummary>> {
        let rows = sqlx::query_as::<_, ThreadRow>(&format!(
            r#"
            SELECT {} FROM chat_threads WHERE message_count > 0
            ORDER BY last_message_at DESC, last_message_id DESC
            "#,
            THREAD_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.into_iter().map(ThreadSummary::try_from).collect()
    }

    async fn mark_thread_read(&self, user_id: Uuid, up_to: Option<i64>) -> CoreResult<ReadReceipt> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        let thread = lock_thread(&mut tx, user_id)
            .await?
            .filter(|t| t.message_count > 0)
            .ok_or_else(|| CoreError::NotFound(format!("chat thread {}", user_id)))?;
        let cutoff = up_to.map_or(thread.last_message_id, |id| id.min(thread.last_message_id));

        let marked = sqlx::query(
            r#"
            UPDATE chat_messages SET read = TRUE
            WHERE user_id = $1 AND id <= $2 AND NOT read AND sender <> $3
            "#,
        )
        .bind(user_id)
        .bind(cutoff)
        .bind(SenderRole::Admin.as_str())
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?
        .rows_affected() as i32;

        let unread: i32 = sqlx::query_scalar(
            r#"
            UPDATE chat_threads SET unread_count = GREATEST(unread_count - $2, 0)
            WHERE user_id = $1
            RETURNING unread_count
            "#,
        )
        .bind(user_id)
        .bind(marked)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage_err)?;

        tx.commit().await.map_err(storage_err)?;
        Ok(ReadReceipt {
            cutoff_id: cutoff,
            marked: marked.max(0) as u32,
            unread_count: unread.max(0) as u32,
        })
    }
}
