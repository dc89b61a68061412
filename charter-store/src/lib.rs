pub mod app_config;
pub mod database;
pub mod memory;
pub mod booking_repo;
pub mod payment_repo;
pub mod notification_repo;
pub mod chat_repo;
pub mod redis_repo;
pub mod backends;

pub use app_config::Config;
pub use backends::{Backends, StartupError};
pub use database::DbClient;
pub use memory::MemoryStore;
pub use redis_repo::RedisEventBus;
