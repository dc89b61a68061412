use charter_booking::BookingRepository;
use charter_chat::ChatRepository;
use charter_core::{EventBus, InProcessBus};
use charter_ledger::PaymentRepository;
use charter_notify::NotificationRepository;
use std::sync::Arc;
use tracing::info;

use crate::app_config::Config;
use crate::booking_repo::StoreBookingRepository;
use crate::chat_repo::StoreChatRepository;
use crate::database::DbClient;
use crate::memory::MemoryStore;
use crate::notification_repo::StoreNotificationRepository;
use crate::payment_repo::StorePaymentRepository;
use crate::redis_repo::RedisEventBus;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Database connection failed: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("Redis connection failed: {0}")]
    Redis(#[from] redis::RedisError),
}

/// The concrete adapter behind every port.
#[derive(Clone)]
pub struct Backends {
    pub bookings: Arc<dyn BookingRepository>,
    pub payments: Arc<dyn PaymentRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub chat: Arc<dyn ChatRepository>,
    pub bus: Arc<dyn EventBus>,
}

impl Backends {
    pub fn in_memory() -> Self {
        Self::from_memory(Arc::new(MemoryStore::new()), Arc::new(InProcessBus::new()))
    }

    pub fn from_memory(store: Arc<MemoryStore>, bus: Arc<dyn EventBus>) -> Self {
        Self {
            bookings: store.clone(),
            payments: store.clone(),
            notifications: store.clone(),
            chat: store,
            bus,
        }
    }

    pub fn postgres(db: &DbClient, bus: Arc<dyn EventBus>) -> Self {
        Self {
            bookings: Arc::new(StoreBookingRepository::new(db.pool.clone())),
            payments: Arc::new(StorePaymentRepository::new(db.pool.clone())),
            notifications: Arc::new(StoreNotificationRepository::new(db.pool.clone())),
            chat: Arc::new(StoreChatRepository::new(db.pool.clone())),
            bus,
        }
    }

    /// Pick adapters from configuration: Postgres when a database URL is set,
    /// Redis when a Redis URL is set, in-process otherwise.
    pub async fn connect(config: &Config) -> Result<Self, StartupError> {
        let bus: Arc<dyn EventBus> = match &config.redis.url {
            Some(url) => Arc::new(RedisEventBus::new(url).await?),
            None => {
                info!("No Redis URL configured, using in-process event bus");
                Arc::new(InProcessBus::new())
            }
        };

        match &config.database.url {
            Some(url) => {
                let db = DbClient::new(url).await?;
                db.migrate().await?;
                Ok(Self::postgres(&db, bus))
            }
            None => {
                info!("No database URL configured, using in-memory store");
                Ok(Self::from_memory(Arc::new(MemoryStore::new()), bus))
            }
        }
    }
}
