use crate::error::{AppError, Result};
use crate::ingest::counters::{Counter, MESSAGES_SENT, MESSAGES_SEND_FAILED};
use crate::messaging::MessageProducer;
use std::sync::Arc;

/// Publishes raw text payloads to the topic the ingestor is bound to.
///
/// Publishing does not wait for consumption and never retries; a rejected
/// publish surfaces as [`AppError::Publish`] carrying the channel's cause.
#[derive(Clone)]
pub struct MessagePublisher {
    producer: Arc<dyn MessageProducer>,
    topic: String,
    counter: Arc<dyn Counter>,
}

impl MessagePublisher {
    pub fn new(
        producer: Arc<dyn MessageProducer>,
        topic: impl Into<String>,
        counter: Arc<dyn Counter>,
    ) -> Self {
        Self {
            producer,
            topic: topic.into(),
            counter,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Hand `payload` to the channel. Any text is accepted, including "".
    pub async fn publish(&self, payload: &str) -> Result<()> {
        match self.producer.publish(&self.topic, payload).await {
            Ok(()) => {
                self.counter.increment(MESSAGES_SENT);
                tracing::info!(topic = %self.topic, bytes = payload.len(), "Message published");
                Ok(())
            }
            Err(e) => {
                self.counter.increment(MESSAGES_SEND_FAILED);
                tracing::warn!(topic = %self.topic, error = %e, "Failed to publish message");
                Err(AppError::Publish(e.to_string()))
            }
        }
    }
}
