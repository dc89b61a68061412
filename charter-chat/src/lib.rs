pub mod models;
pub mod repository;
pub mod channel;

#[cfg(test)]
pub(crate) mod testing;

pub use models::{ChatMessage, NewChatMessage, ReadReceipt, ThreadSummary};
pub use repository::ChatRepository;
pub use channel::{ChatChannel, ChatSettings};
