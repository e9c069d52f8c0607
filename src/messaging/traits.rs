//! Messaging trait abstractions

use crate::messaging::error::MessagingResult;
use async_trait::async_trait;

/// Message producer trait
#[async_trait]
pub trait MessageProducer: Send + Sync {
    /// Publish a raw text payload to a topic
    async fn publish(&self, topic: &str, payload: &str) -> MessagingResult<()>;

    /// Publish multiple payloads to a topic, stopping at the first failure
    async fn publish_batch(&self, topic: &str, payloads: &[String]) -> MessagingResult<usize> {
        for payload in payloads {
            self.publish(topic, payload).await?;
        }
        Ok(payloads.len())
    }

    /// Check if the producer is connected
    async fn is_connected(&self) -> bool;

    /// Close the producer connection
    async fn close(&self) -> MessagingResult<()>;
}

/// Message consumer trait
#[async_trait]
pub trait MessageConsumer: Send + Sync {
    /// Subscribe to a topic and receive payloads
    async fn subscribe(&self, topic: &str) -> MessagingResult<Box<dyn MessageStream>>;

    /// Check if the consumer is connected
    async fn is_connected(&self) -> bool;

    /// Close the consumer connection
    async fn close(&self) -> MessagingResult<()>;
}

/// Stream of delivered payloads
#[async_trait]
pub trait MessageStream: Send {
    /// Next delivered payload; `None` once the subscription has ended
    async fn next(&mut self) -> MessagingResult<Option<String>>;

    /// Acknowledge the last delivered payload
    async fn ack(&mut self) -> MessagingResult<()>;

    /// Negative acknowledge (request redelivery where the backend supports it)
    async fn nack(&mut self) -> MessagingResult<()>;
}
