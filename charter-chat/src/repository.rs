use async_trait::async_trait;
use charter_core::CoreResult;
use uuid::Uuid;

use crate::models::{ChatMessage, NewChatMessage, ReadReceipt, ThreadSummary};

/// Storage port for chat threads.
///
/// Implementations keep `ThreadSummary::unread_count` equal to the number of
/// unread non-admin messages by updating it in the same unit as every insert
/// and every read-marking.
#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// Append a message and return it with the updated thread summary.
    async fn append_message(
        &self,
        message: NewChatMessage,
    ) -> CoreResult<(ChatMessage, ThreadSummary)>;

    /// Messages of one thread in insertion order.
    async fn thread_messages(&self, user_id: Uuid) -> CoreResult<Vec<ChatMessage>>;

    async fn thread_summary(&self, user_id: Uuid) -> CoreResult<Option<ThreadSummary>>;

    /// One row per thread; never scans messages.
    async fn thread_summaries(&self) -> CoreResult<Vec<ThreadSummary>>;

    /// Mark every non-admin message with `id <= cutoff` as read, where the
    /// cutoff is `up_to` or, when absent, the thread's last message at the
    /// time the mark is applied. Messages past the cutoff stay unread.
    async fn mark_thread_read(&self, user_id: Uuid, up_to: Option<i64>) -> CoreResult<ReadReceipt>;
}
