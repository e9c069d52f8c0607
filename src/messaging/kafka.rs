//! Kafka message queue implementation

use crate::messaging::config::KafkaConfig;
use crate::messaging::error::{MessagingError, MessagingResult};
use crate::messaging::traits::{MessageConsumer, MessageProducer, MessageStream};
use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::Message;
use std::sync::Arc;
use std::time::Duration;

fn apply_sasl(client_config: &mut ClientConfig, config: &KafkaConfig) {
    if config.enable_sasl {
        if let (Some(mechanism), Some(username), Some(password)) = (
            &config.sasl_mechanism,
            &config.sasl_username,
            &config.sasl_password,
        ) {
            client_config
                .set("security.protocol", "SASL_SSL")
                .set("sasl.mechanism", mechanism)
                .set("sasl.username", username)
                .set("sasl.password", password);
        }
    }
}

/// Kafka producer
pub struct KafkaProducer {
    producer: Arc<FutureProducer>,
}

impl KafkaProducer {
    /// Create a new Kafka producer
    pub async fn new(config: &KafkaConfig, max_message_size: usize) -> MessagingResult<Self> {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("client.id", &config.client_id)
            .set("compression.type", &config.compression_type)
            .set("message.timeout.ms", config.message_timeout_ms.to_string())
            .set("message.max.bytes", max_message_size.to_string());

        apply_sasl(&mut client_config, config);

        let producer: FutureProducer = client_config.create().map_err(|e| {
            MessagingError::ConnectionFailed(format!("Kafka producer creation failed: {}", e))
        })?;

        Ok(Self {
            producer: Arc::new(producer),
        })
    }
}

#[async_trait]
impl MessageProducer for KafkaProducer {
    async fn publish(&self, topic: &str, payload: &str) -> MessagingResult<()> {
        let record: FutureRecord<'_, str, str> = FutureRecord::to(topic).payload(payload);

        self.producer
            .send(record, Duration::from_secs(0))
            .await
            .map_err(|(e, _)| MessagingError::PublishFailed(format!("Kafka publish failed: {}", e)))?;

        Ok(())
    }

    async fn is_connected(&self) -> bool {
        // Kafka producer doesn't have an explicit connected state
        true
    }

    async fn close(&self) -> MessagingResult<()> {
        // Kafka producer flushes on drop
        Ok(())
    }
}

/// Kafka consumer
#[derive(Debug)]
pub struct KafkaConsumer {
    config: KafkaConfig,
}

impl KafkaConsumer {
    /// Create a new Kafka consumer factory; each subscription opens its own
    /// group member
    pub async fn new(config: &KafkaConfig) -> MessagingResult<Self> {
        if config.group_id.is_empty() {
            return Err(MessagingError::ConfigurationError(
                "Kafka consumer requires a group id".to_string(),
            ));
        }

        Ok(Self {
            config: config.clone(),
        })
    }

    fn create_consumer(&self) -> MessagingResult<StreamConsumer> {
        let config = &self.config;
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("group.id", &config.group_id)
            .set("client.id", &config.client_id)
            .set("enable.auto.commit", config.enable_auto_commit.to_string())
            .set(
                "auto.commit.interval.ms",
                config.auto_commit_interval_ms.to_string(),
            )
            .set("auto.offset.reset", &config.auto_offset_reset)
            .set("session.timeout.ms", config.session_timeout_ms.to_string());

        apply_sasl(&mut client_config, config);

        client_config.create().map_err(|e| {
            MessagingError::ConnectionFailed(format!("Kafka consumer creation failed: {}", e))
        })
    }
}

#[async_trait]
impl MessageConsumer for KafkaConsumer {
    async fn subscribe(&self, topic: &str) -> MessagingResult<Box<dyn MessageStream>> {
        let consumer = self.create_consumer()?;
        consumer
            .subscribe(&[topic])
            .map_err(|e| MessagingError::SubscribeFailed(format!("Kafka subscribe failed: {}", e)))?;

        Ok(Box::new(KafkaMessageStream {
            consumer: Arc::new(consumer),
            auto_commit: self.config.enable_auto_commit,
        }))
    }

    async fn is_connected(&self) -> bool {
        true
    }

    async fn close(&self) -> MessagingResult<()> {
        Ok(())
    }
}

/// Kafka message stream
pub struct KafkaMessageStream {
    consumer: Arc<StreamConsumer>,
    auto_commit: bool,
}

#[async_trait]
impl MessageStream for KafkaMessageStream {
    async fn next(&mut self) -> MessagingResult<Option<String>> {
        let message = self
            .consumer
            .recv()
            .await
            .map_err(|e| MessagingError::ConsumeFailed(format!("Kafka recv failed: {}", e)))?;

        // An empty payload arrives as a null payload
        let payload = message.payload().unwrap_or_default().to_vec();
        Ok(Some(String::from_utf8(payload)?))
    }

    async fn ack(&mut self) -> MessagingResult<()> {
        if self.auto_commit {
            return Ok(());
        }

        self.consumer
            .commit_consumer_state(CommitMode::Async)
            .map_err(|e| MessagingError::ConsumeFailed(format!("Kafka commit failed: {}", e)))?;
        Ok(())
    }

    async fn nack(&mut self) -> MessagingResult<()> {
        // Kafka doesn't have explicit nack - uncommitted offsets are re-read on rebalance
        Ok(())
    }
}
