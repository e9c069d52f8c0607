//! Main messaging service

use crate::messaging::config::{MessagingBackend, MessagingConfig};
use crate::messaging::error::{MessagingError, MessagingResult};
use crate::messaging::kafka::{KafkaConsumer, KafkaProducer};
use crate::messaging::memory::InMemoryBroker;
use crate::messaging::metrics::{init_channel_metrics, CHANNEL_METRICS, REASON_TOO_LARGE};
use crate::messaging::nats::{NatsConsumer, NatsProducer};
use crate::messaging::traits::{MessageConsumer, MessageProducer, MessageStream};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

/// Unified access to the configured broker
pub struct MessagingService {
    config: MessagingConfig,
    producer: Arc<dyn MessageProducer>,
    consumer: Arc<dyn MessageConsumer>,
}

impl MessagingService {
    /// Connect to the configured backend
    pub async fn new(config: MessagingConfig) -> MessagingResult<Self> {
        let (producer, consumer): (Arc<dyn MessageProducer>, Arc<dyn MessageConsumer>) =
            match config.backend {
                MessagingBackend::Kafka => {
                    let producer: Arc<dyn MessageProducer> = Arc::new(
                        KafkaProducer::new(&config.kafka, config.max_message_size).await?,
                    );
                    let consumer: Arc<dyn MessageConsumer> =
                        Arc::new(KafkaConsumer::new(&config.kafka).await?);
                    (producer, consumer)
                }
                MessagingBackend::Nats => {
                    let producer: Arc<dyn MessageProducer> =
                        Arc::new(NatsProducer::new(&config.nats).await?);
                    let consumer: Arc<dyn MessageConsumer> =
                        Arc::new(NatsConsumer::new(&config.nats).await?);
                    (producer, consumer)
                }
                MessagingBackend::InMemory => {
                    let broker = Arc::new(InMemoryBroker::new(config.channel_capacity));
                    let producer: Arc<dyn MessageProducer> = broker.clone();
                    let consumer: Arc<dyn MessageConsumer> = broker;
                    (producer, consumer)
                }
            };

        Ok(Self::with_channel(config, producer, consumer))
    }

    /// Build a service over an already connected producer and consumer
    pub fn with_channel(
        config: MessagingConfig,
        producer: Arc<dyn MessageProducer>,
        consumer: Arc<dyn MessageConsumer>,
    ) -> Self {
        if config.enable_metrics {
            init_channel_metrics();
            let backend = backend_label(config.backend);
            CHANNEL_METRICS
                .broker_connected
                .with_label_values(&[backend])
                .set(1.0);
            CHANNEL_METRICS
                .payload_limit_bytes
                .with_label_values(&[backend])
                .set(config.max_message_size as f64);
        }

        tracing::info!(
            backend = backend_label(config.backend),
            topic = %config.full_topic(&config.topic),
            "Messaging service initialized"
        );

        Self {
            config,
            producer,
            consumer,
        }
    }

    /// Configured topic, before prefixing
    pub fn topic(&self) -> &str {
        &self.config.topic
    }

    pub fn config(&self) -> &MessagingConfig {
        &self.config
    }

    /// Subscribe to a topic; the prefix is applied here
    pub async fn subscribe(&self, topic: &str) -> MessagingResult<Box<dyn MessageStream>> {
        let full_topic = self.config.full_topic(topic);
        let inner = self.consumer.subscribe(&full_topic).await?;

        tracing::info!(topic = %full_topic, "Subscribed to topic");

        if !self.config.enable_metrics {
            return Ok(inner);
        }

        Ok(Box::new(MeteredStream {
            inner,
            topic: topic.to_string(),
            backend: backend_label(self.config.backend),
        }))
    }

    fn record_publish(&self, topic: &str, size: usize, start: Instant, result: &MessagingResult<()>) {
        if !self.config.enable_metrics {
            return;
        }

        let backend = backend_label(self.config.backend);
        match result {
            Ok(()) => {
                CHANNEL_METRICS
                    .payloads_published
                    .with_label_values(&[topic, backend])
                    .inc();
                CHANNEL_METRICS
                    .publish_duration
                    .with_label_values(&[topic, backend])
                    .observe(start.elapsed().as_secs_f64());
                CHANNEL_METRICS
                    .payload_bytes
                    .with_label_values(&[topic, backend])
                    .observe(size as f64);
            }
            Err(e) => {
                let reason = if size > self.config.max_message_size {
                    REASON_TOO_LARGE
                } else {
                    e.kind()
                };
                CHANNEL_METRICS
                    .payloads_rejected
                    .with_label_values(&[topic, backend, reason])
                    .inc();
            }
        }
    }
}

#[async_trait]
impl MessageProducer for MessagingService {
    async fn publish(&self, topic: &str, payload: &str) -> MessagingResult<()> {
        let start = Instant::now();

        let result = if payload.len() > self.config.max_message_size {
            Err(MessagingError::InvalidMessage(format!(
                "payload of {} bytes exceeds the {} byte limit",
                payload.len(),
                self.config.max_message_size
            )))
        } else {
            let full_topic = self.config.full_topic(topic);
            self.producer.publish(&full_topic, payload).await
        };

        self.record_publish(topic, payload.len(), start, &result);
        result
    }

    async fn is_connected(&self) -> bool {
        self.producer.is_connected().await && self.consumer.is_connected().await
    }

    async fn close(&self) -> MessagingResult<()> {
        self.producer.close().await?;
        self.consumer.close().await?;

        if self.config.enable_metrics {
            CHANNEL_METRICS
                .broker_connected
                .with_label_values(&[backend_label(self.config.backend)])
                .set(0.0);
        }

        tracing::info!("Messaging service closed");
        Ok(())
    }
}

/// Counts deliveries and read failures on a subscription
struct MeteredStream {
    inner: Box<dyn MessageStream>,
    topic: String,
    backend: &'static str,
}

#[async_trait]
impl MessageStream for MeteredStream {
    async fn next(&mut self) -> MessagingResult<Option<String>> {
        let result = self.inner.next().await;

        match &result {
            Ok(Some(_)) => CHANNEL_METRICS
                .payloads_delivered
                .with_label_values(&[&self.topic, self.backend])
                .inc(),
            Ok(None) => {}
            Err(e) => CHANNEL_METRICS
                .read_failures
                .with_label_values(&[&self.topic, self.backend, e.kind()])
                .inc(),
        }

        result
    }

    async fn ack(&mut self) -> MessagingResult<()> {
        self.inner.ack().await
    }

    async fn nack(&mut self) -> MessagingResult<()> {
        self.inner.nack().await
    }
}

fn backend_label(backend: MessagingBackend) -> &'static str {
    match backend {
        MessagingBackend::Kafka => "kafka",
        MessagingBackend::Nats => "nats",
        MessagingBackend::InMemory => "in_memory",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_round_trip() {
        let service = MessagingService::new(MessagingConfig::default())
            .await
            .unwrap();
        assert_eq!(service.topic(), "messages");

        let mut stream = service.subscribe("messages").await.unwrap();
        service.publish("messages", "hello").await.unwrap();

        assert_eq!(stream.next().await.unwrap().as_deref(), Some("hello"));
        stream.ack().await.unwrap();
    }

    #[tokio::test]
    async fn test_prefix_applies_to_both_sides() {
        let config = MessagingConfig {
            topic_prefix: "staging".to_string(),
            ..Default::default()
        };
        let broker = Arc::new(InMemoryBroker::new(8));
        let service = MessagingService::with_channel(config, broker.clone(), broker.clone());

        service.publish("messages", "prefixed").await.unwrap();
        assert_eq!(broker.pending("staging.messages"), 1);
        assert_eq!(broker.pending("messages"), 0);

        let mut stream = service.subscribe("messages").await.unwrap();
        assert_eq!(stream.next().await.unwrap().as_deref(), Some("prefixed"));
    }

    #[tokio::test]
    async fn test_oversized_payload_is_rejected() {
        let config = MessagingConfig {
            max_message_size: 4,
            ..Default::default()
        };
        let service = MessagingService::new(config).await.unwrap();

        let rejected = || {
            CHANNEL_METRICS
                .payloads_rejected
                .with_label_values(&["oversized-test", "in_memory", REASON_TOO_LARGE])
                .get()
        };
        let before = rejected();

        let result = service.publish("oversized-test", "too long").await;
        assert!(matches!(result, Err(MessagingError::InvalidMessage(_))));
        assert_eq!(rejected(), before + 1);

        service.publish("oversized-test", "fits").await.unwrap();
        assert_eq!(rejected(), before + 1);
    }

    #[tokio::test]
    async fn test_close_disconnects() {
        let service = MessagingService::new(MessagingConfig::default())
            .await
            .unwrap();
        assert!(service.is_connected().await);

        service.close().await.unwrap();
        assert!(!service.is_connected().await);
    }
}
