//! NATS message queue implementation

use crate::messaging::config::NatsConfig;
use crate::messaging::error::{MessagingError, MessagingResult};
use crate::messaging::traits::{MessageConsumer, MessageProducer, MessageStream};
use async_nats::Client;
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;

async fn connect(config: &NatsConfig) -> MessagingResult<Client> {
    let server = config.servers.first().ok_or_else(|| {
        MessagingError::ConfigurationError("NATS requires at least one server".to_string())
    })?;

    async_nats::ConnectOptions::new()
        .name(&config.connection_name)
        .ping_interval(Duration::from_secs(config.ping_interval_secs))
        .connect(server.as_str())
        .await
        .map_err(|e| MessagingError::ConnectionFailed(format!("NATS connection failed: {}", e)))
}

/// NATS producer
pub struct NatsProducer {
    client: Client,
}

impl NatsProducer {
    /// Create a new NATS producer
    pub async fn new(config: &NatsConfig) -> MessagingResult<Self> {
        Ok(Self {
            client: connect(config).await?,
        })
    }
}

#[async_trait]
impl MessageProducer for NatsProducer {
    async fn publish(&self, topic: &str, payload: &str) -> MessagingResult<()> {
        self.client
            .publish(topic.to_string(), payload.to_owned().into_bytes().into())
            .await
            .map_err(|e| MessagingError::PublishFailed(format!("NATS publish failed: {}", e)))?;

        // Surface connection problems to the caller instead of buffering silently
        self.client
            .flush()
            .await
            .map_err(|e| MessagingError::PublishFailed(format!("NATS flush failed: {}", e)))?;

        Ok(())
    }

    async fn is_connected(&self) -> bool {
        // async_nats reconnects on its own; a live client counts as connected
        true
    }

    async fn close(&self) -> MessagingResult<()> {
        // NATS client closes automatically on drop
        Ok(())
    }
}

/// NATS consumer
pub struct NatsConsumer {
    client: Client,
    queue_group: String,
}

impl NatsConsumer {
    /// Create a new NATS consumer
    pub async fn new(config: &NatsConfig) -> MessagingResult<Self> {
        Ok(Self {
            client: connect(config).await?,
            queue_group: config.queue_group.clone(),
        })
    }
}

#[async_trait]
impl MessageConsumer for NatsConsumer {
    async fn subscribe(&self, topic: &str) -> MessagingResult<Box<dyn MessageStream>> {
        let subscriber = self
            .client
            .queue_subscribe(topic.to_string(), self.queue_group.clone())
            .await
            .map_err(|e| MessagingError::SubscribeFailed(format!("NATS subscribe failed: {}", e)))?;

        Ok(Box::new(NatsMessageStream { subscriber }))
    }

    async fn is_connected(&self) -> bool {
        // async_nats reconnects on its own; a live client counts as connected
        true
    }

    async fn close(&self) -> MessagingResult<()> {
        Ok(())
    }
}

/// NATS message stream
pub struct NatsMessageStream {
    subscriber: async_nats::Subscriber,
}

#[async_trait]
impl MessageStream for NatsMessageStream {
    async fn next(&mut self) -> MessagingResult<Option<String>> {
        match self.subscriber.next().await {
            Some(msg) => Ok(Some(String::from_utf8(msg.payload.to_vec())?)),
            None => Ok(None),
        }
    }

    async fn ack(&mut self) -> MessagingResult<()> {
        // NATS core doesn't require explicit acks (use JetStream for that)
        Ok(())
    }

    async fn nack(&mut self) -> MessagingResult<()> {
        // NATS core doesn't support nack (use JetStream for that)
        Ok(())
    }
}
