use charter_core::{CoreError, CoreResult, EventBus, Subscription, Topic};
use charter_shared::models::events::ChatMessagePostedEvent;
use charter_shared::{DomainEvent, Masked, SenderRole};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{preview_of, ChatMessage, NewChatMessage, ReadReceipt, ThreadSummary};
use crate::repository::ChatRepository;

const ORDERING_STRIPES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatSettings {
    pub max_message_len: usize,
    pub preview_len: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            max_message_len: 4000,
            preview_len: 80,
        }
    }
}

/// Customer ↔ admin message threads, one per customer.
pub struct ChatChannel {
    repo: Arc<dyn ChatRepository>,
    bus: Arc<dyn EventBus>,
    settings: ChatSettings,
    // Append and publish happen under the thread's stripe so live delivery
    // follows insertion order within a thread.
    stripes: Vec<Mutex<()>>,
}

impl ChatChannel {
    pub fn new(repo: Arc<dyn ChatRepository>, bus: Arc<dyn EventBus>, settings: ChatSettings) -> Self {
        Self {
            repo,
            bus,
            settings,
            stripes: (0..ORDERING_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Append a message to the customer's thread and deliver it live.
    pub async fn send(
        &self,
        user_id: Uuid,
        sender: SenderRole,
        content: &str,
    ) -> CoreResult<ChatMessage> {
        let content = content.trim();
        if content.is_empty() {
            return Err(CoreError::ValidationError(
                "chat message must not be empty".to_string(),
            ));
        }
        let length = content.chars().count();
        if length > self.settings.max_message_len {
            return Err(CoreError::ValidationError(format!(
                "chat message is {} characters, limit is {}",
                length, self.settings.max_message_len
            )));
        }

        let _ordering = self.stripe(user_id).lock().await;

        let (message, summary) = self
            .repo
            .append_message(NewChatMessage {
                user_id,
                content: content.to_string(),
                sender,
                preview: preview_of(content, self.settings.preview_len),
            })
            .await?;

        tracing::debug!(
            "Chat {} <- {} message {} {:?} (unread {})",
            user_id,
            sender,
            message.id,
            Masked::new(&message.content),
            summary.unread_count
        );

        // Fire-and-forget: the message is committed whatever happens here.
        let event = DomainEvent::ChatMessagePosted(ChatMessagePostedEvent {
            message_id: message.id,
            user_id,
            sender,
            content: message.content.clone(),
            at: message.created_at,
        });
        if let Err(e) = self.bus.publish(Topic::Chat(user_id), event).await {
            tracing::warn!("Live delivery of chat message {} failed: {}", message.id, e);
        }

        Ok(message)
    }

    pub async fn history(&self, user_id: Uuid) -> CoreResult<Vec<ChatMessage>> {
        self.repo.thread_messages(user_id).await
    }

    /// All threads, most recent activity first.
    pub async fn list_threads(&self) -> CoreResult<Vec<ThreadSummary>> {
        let mut threads = self.repo.thread_summaries().await?;
        threads.sort_by(|a, b| {
            b.last_message_at
                .cmp(&a.last_message_at)
                .then_with(|| b.last_message_id.cmp(&a.last_message_id))
        });
        Ok(threads)
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> CoreResult<ReadReceipt> {
        self.mark_read_up_to(user_id, None).await
    }

    /// Mark read up to the last message the admin actually saw.
    pub async fn mark_read_up_to(
        &self,
        user_id: Uuid,
        cutoff: Option<i64>,
    ) -> CoreResult<ReadReceipt> {
        let receipt = self.repo.mark_thread_read(user_id, cutoff).await?;
        tracing::debug!(
            "Chat {} marked {} read up to {} ({} still unread)",
            user_id,
            receipt.marked,
            receipt.cutoff_id,
            receipt.unread_count
        );
        Ok(receipt)
    }

    pub async fn unread_count(&self, user_id: Uuid) -> CoreResult<u32> {
        Ok(self
            .repo
            .thread_summary(user_id)
            .await?
            .map(|t| t.unread_count)
            .unwrap_or(0))
    }

    pub async fn subscribe(&self, user_id: Uuid) -> CoreResult<Subscription> {
        self.bus.subscribe(Topic::Chat(user_id)).await
    }

    fn stripe(&self, user_id: Uuid) -> &Mutex<()> {
        let index = (user_id.as_u128() % ORDERING_STRIPES as u128) as usize;
        &self.stripes[index]
    }
}
