use async_trait::async_trait;
use charter_core::{CoreError, CoreResult};
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{ChatMessage, NewChatMessage, ReadReceipt, ThreadSummary};
use crate::repository::ChatRepository;

#[derive(Default)]
struct State {
    next_id: i64,
    messages: Vec<ChatMessage>,
    threads: HashMap<Uuid, ThreadSummary>,
}

#[derive(Default)]
pub struct FakeChatRepository {
    state: RwLock<State>,
}

#[async_trait]
impl ChatRepository for FakeChatRepository {
    async fn append_message(
        &self,
        message: NewChatMessage,
    ) -> CoreResult<(ChatMessage, ThreadSummary)> {
        let mut state = self.state.write().await;
        state.next_id += 1;
        let stored = ChatMessage {
            id: state.next_id,
            user_id: message.user_id,
            content: message.content,
            sender: message.sender,
            read: false,
            created_at: Utc::now(),
        };
        state.messages.push(stored.clone());

        let unread = u32::from(stored.sender.counts_as_unread());
        let summary = state
            .threads
            .entry(stored.user_id)
            .and_modify(|t| {
                t.last_message_id = stored.id;
                t.last_message_at = stored.created_at;
                t.last_sender = stored.sender;
                t.preview = message.preview.clone();
                t.unread_count += unread;
                t.message_count += 1;
            })
            .or_insert_with(|| ThreadSummary {
                user_id: stored.user_id,
                last_message_id: stored.id,
                last_message_at: stored.created_at,
                last_sender: stored.sender,
                preview: message.preview.clone(),
                unread_count: unread,
                message_count: 1,
            })
            .clone();
        Ok((stored, summary))
    }

    async fn thread_messages(&self, user_id: Uuid) -> CoreResult<Vec<ChatMessage>> {
        let state = self.state.read().await;
        Ok(state.messages.iter().filter(|m| m.user_id == user_id).cloned().collect())
    }

    async fn thread_summary(&self, user_id: Uuid) -> CoreResult<Option<ThreadSummary>> {
        Ok(self.state.read().await.threads.get(&user_id).cloned())
    }

    async fn thread_summaries(&self) -> CoreResult<Vec<ThreadSummary>> {
        Ok(self.state.read().await.threads.values().cloned().collect())
    }

    async fn mark_thread_read(&self, user_id: Uuid, up_to: Option<i64>) -> CoreResult<ReadReceipt> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let thread = state
            .threads
            .get_mut(&user_id)
            .ok_or_else(|| CoreError::NotFound(format!("chat thread {}", user_id)))?;
        let cutoff = up_to.unwrap_or(thread.last_message_id);

        let mut marked = 0;
        for m in state.messages.iter_mut().filter(|m| {
            m.user_id == user_id && m.id <= cutoff && !m.read && m.sender.counts_as_unread()
        }) {
            m.read = true;
            marked += 1;
        }
        thread.unread_count -= marked;
        Ok(ReadReceipt {
            cutoff_id: cutoff,
            marked,
            unread_count: thread.unread_count,
        })
    }
}
