use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use super::domain::ScoreEvent;
use crate::config::EventTopics;

/// Publish-only event bus. Returns the bus-assigned message id.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<String, PublishError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum PublishError {
    #[error("event could not be serialized: {0}")]
    Serialization(String),
    #[error("event bus unavailable: {0}")]
    Transport(String),
}

/// Serializes score events and routes them to their configured topics.
pub struct ResultPublisher<B> {
    bus: Arc<B>,
    topics: EventTopics,
}

impl<B> ResultPublisher<B>
where
    B: EventBus + 'static,
{
    pub fn new(bus: Arc<B>, topics: EventTopics) -> Self {
        Self { bus, topics }
    }

    pub async fn publish_score_calculated(&self, event: &ScoreEvent) -> Result<String, PublishError> {
        self.publish(&self.topics.score_calculated, event).await
    }

    pub async fn publish_score_failed(&self, event: &ScoreEvent) -> Result<String, PublishError> {
        self.publish(&self.topics.score_failed, event).await
    }

    async fn publish(&self, topic: &str, event: &ScoreEvent) -> Result<String, PublishError> {
        let payload = serde_json::to_vec(event)
            .map_err(|err| PublishError::Serialization(err.to_string()))?;

        match self.bus.publish(topic, payload).await {
            Ok(message_id) => {
                info!(
                    topic,
                    message_id = %message_id,
                    workspace_id = %event.workspace_id,
                    "score event published"
                );
                Ok(message_id)
            }
            Err(err) => {
                warn!(topic, workspace_id = %event.workspace_id, "failed to publish score event: {}", err);
                Err(err)
            }
        }
    }
}
