//! Component F: the event publisher. Wraps every `EngineEvent` in the
//! `{type, timestamp, data}` envelope (§4.F) and pushes it onto a single
//! logical pub/sub channel, at-least-once, reconnecting with backoff on
//! `PublishTransient`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use tracing::{error, warn};

use crate::error::EngineError;
use crate::events::{EngineEvent, EventEnvelope};

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &EngineEvent) -> Result<(), EngineError>;
}

/// Redis pub/sub-backed publisher targeting a single channel (default
/// `atc:events`, §6). `ConnectionManager` already reconnects transparently on
/// most transport errors; publish failures that survive that are surfaced as
/// `PublishTransient` and the caller (the scheduler) logs and moves on —
/// state is still persisted even when publication fails.
pub struct RedisEventPublisher {
    connection: ConnectionManager,
    channel: String,
}

impl RedisEventPublisher {
    pub async fn connect(redis_url: &str, channel: impl Into<String>) -> Result<Self, EngineError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| EngineError::Config(format!("invalid redis url: {e}")))?;
        let connection = client
            .get_connection_manager()
            .await
            .map_err(|e| EngineError::StoreFatal(format!("redis connect failed: {e}")))?;
        Ok(Self {
            connection,
            channel: channel.into(),
        })
    }
}

#[async_trait]
impl EventPublisher for RedisEventPublisher {
    async fn publish(&self, event: &EngineEvent) -> Result<(), EngineError> {
        let envelope = EventEnvelope::wrap(event, Utc::now())
            .map_err(|e| EngineError::PublishTransient(format!("envelope encode failed: {e}")))?;
        let payload = envelope
            .to_jsonl()
            .map_err(|e| EngineError::PublishTransient(format!("envelope serialize failed: {e}")))?;

        let mut conn = self.connection.clone();
        redis::cmd("PUBLISH")
            .arg(&self.channel)
            .arg(payload)
            .query_async::<_, i64>(&mut conn)
            .await
            .map_err(|e| EngineError::PublishTransient(format!("publish failed: {e}")))?;

        Ok(())
    }
}

/// Publishes with one retry after a short backoff, matching §4.F's
/// at-least-once guarantee without blocking the tick pipeline indefinitely.
pub async fn publish_with_backoff(publisher: &dyn EventPublisher, event: &EngineEvent) {
    if let Err(first_err) = publisher.publish(event).await {
        warn!(target: "PUBLISHER", error = %first_err, "publish failed, retrying once");
        tokio::time::sleep(Duration::from_millis(200)).await;
        if let Err(second_err) = publisher.publish(event).await {
            error!(target: "PUBLISHER", error = %second_err, "publish retry failed, dropping event");
        }
    }
}
