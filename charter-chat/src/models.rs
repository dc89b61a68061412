use charter_shared::SenderRole;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One message in a customer's thread. `id` is the store-wide insertion
/// sequence, so it orders messages inside a thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub id: i64,
    pub user_id: Uuid,
    pub content: String,
    pub sender: SenderRole,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewChatMessage {
    pub user_id: Uuid,
    pub content: String,
    pub sender: SenderRole,
    /// Stored on the thread summary so listing never reads message rows.
    pub preview: String,
}

/// Per-thread row maintained on every insert and read-marking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThreadSummary {
    pub user_id: Uuid,
    pub last_message_id: i64,
    pub last_message_at: DateTime<Utc>,
    pub last_sender: SenderRole,
    pub preview: String,
    pub unread_count: u32,
    pub message_count: u32,
}

/// Result of `mark_all_read`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadReceipt {
    /// Highest message id covered by the read mark.
    pub cutoff_id: i64,
    pub marked: u32,
    /// Unread count right after the mark; zero unless a later message raced in.
    pub unread_count: u32,
}

pub(crate) fn preview_of(content: &str, max_chars: usize) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}…", head)
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        assert_eq!(preview_of("Hello", 10), "Hello");
        assert_eq!(preview_of("Zürich → JFK", 6), "Zürich…");
    }
}
