use async_trait::async_trait;
use charter_core::{CoreError, CoreResult, EventBus, Subscription, Topic};
use charter_shared::DomainEvent;
use futures_util::StreamExt;
use redis::AsyncCommands;
use tokio::sync::mpsc;
use tracing::info;

/// Redis pub/sub transport for live events, for deployments with more than
/// one API node. Each subscription owns a dedicated pub/sub connection.
#[derive(Clone)]
pub struct RedisEventBus {
    client: redis::Client,
    publisher: redis::aio::MultiplexedConnection,
}

impl RedisEventBus {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        let publisher = client.get_multiplexed_async_connection().await?;
        info!("Connected Redis event bus");
        Ok(Self { client, publisher })
    }

    fn channel(topic: Topic) -> String {
        format!("charter:{}", topic.key())
    }
}

fn redis_err(err: redis::RedisError) -> CoreError {
    tracing::error!("Redis error: {}", err);
    CoreError::storage(err)
}

#[async_trait]
impl EventBus for RedisEventBus {
    async fn publish(&self, topic: Topic, event: DomainEvent) -> CoreResult<()> {
        let payload = serde_json::to_string(&event).map_err(CoreError::storage)?;
        let mut conn = self.publisher.clone();
        conn.publish::<_, _, ()>(Self::channel(topic), payload)
            .await
            .map_err(redis_err)
    }

    async fn subscribe(&self, topic: Topic) -> CoreResult<Subscription> {
        let channel = Self::channel(topic);
        let mut pubsub = self.client.get_async_pubsub().await.map_err(redis_err)?;
        pubsub.subscribe(&channel).await.map_err(redis_err)?;

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut messages = pubsub.into_on_message();
            loop {
                tokio::select! {
                    // Subscriber went away; dropping the stream closes the connection.
                    _ = tx.closed() => break,
                    msg = messages.next() => {
                        let Some(msg) = msg else { break };
                        let payload: String = match msg.get_payload() {
                            Ok(payload) => payload,
                            Err(e) => {
                                tracing::warn!("Unreadable payload on {}: {}", channel, e);
                                continue;
                            }
                        };
                        match serde_json::from_str::<DomainEvent>(&payload) {
                            Ok(event) => {
                                if tx.send(event).is_err() {
                                    break;
                                }
                            }
                            Err(e) => tracing::warn!("Undecodable event on {}: {}", channel, e),
                        }
                    }
                }
            }
            tracing::debug!("Redis subscription {} closed", channel);
        });

        Ok(Subscription::new(topic, rx))
    }
}
