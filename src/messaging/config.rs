//! Messaging configuration

use serde::{Deserialize, Serialize};

/// Messaging backend type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessagingBackend {
    /// Kafka - distributed event streaming platform
    Kafka,
    /// NATS - lightweight, high-performance messaging
    Nats,
    /// In-process bounded queue, no external broker
    #[default]
    InMemory,
}

/// NATS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    /// NATS server URLs
    pub servers: Vec<String>,

    /// Connection name
    pub connection_name: String,

    /// Queue group shared by consumers so each payload reaches one of them
    pub queue_group: String,

    /// Ping interval in seconds
    pub ping_interval_secs: u64,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            servers: vec!["nats://localhost:4222".to_string()],
            connection_name: "message-ingest".to_string(),
            queue_group: "message-ingest".to_string(),
            ping_interval_secs: 60,
        }
    }
}

/// Kafka configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KafkaConfig {
    /// Kafka bootstrap servers
    pub bootstrap_servers: String,

    /// Client ID
    pub client_id: String,

    /// Consumer group ID
    pub group_id: String,

    /// Enable auto commit
    pub enable_auto_commit: bool,

    /// Auto commit interval in milliseconds
    pub auto_commit_interval_ms: u64,

    /// Session timeout in milliseconds
    pub session_timeout_ms: u64,

    /// Where a new consumer group starts reading (earliest, latest)
    pub auto_offset_reset: String,

    /// Enable SASL authentication
    pub enable_sasl: bool,

    /// SASL mechanism (PLAIN, SCRAM-SHA-256, SCRAM-SHA-512)
    pub sasl_mechanism: Option<String>,

    /// SASL username
    pub sasl_username: Option<String>,

    /// SASL password
    pub sasl_password: Option<String>,

    /// Compression type (none, gzip, snappy, lz4, zstd)
    pub compression_type: String,

    /// Message timeout in milliseconds
    pub message_timeout_ms: u64,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: "localhost:9092".to_string(),
            client_id: "message-ingest".to_string(),
            group_id: "kafka-group".to_string(),
            enable_auto_commit: false,
            auto_commit_interval_ms: 5000,
            session_timeout_ms: 30000,
            auto_offset_reset: "earliest".to_string(),
            enable_sasl: false,
            sasl_mechanism: None,
            sasl_username: None,
            sasl_password: None,
            compression_type: "snappy".to_string(),
            message_timeout_ms: 30000,
        }
    }
}

/// Main messaging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    /// Backend to use
    pub backend: MessagingBackend,

    /// NATS configuration
    pub nats: NatsConfig,

    /// Kafka configuration
    pub kafka: KafkaConfig,

    /// Topic the producer publishes to and the consumer is bound to
    pub topic: String,

    /// Optional topic prefix; empty means topics are used as given
    pub topic_prefix: String,

    /// Buffered payloads per topic for the in-process backend
    pub channel_capacity: usize,

    /// Largest payload the broker will accept, in bytes
    pub max_message_size: usize,

    /// Enable metrics
    pub enable_metrics: bool,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            backend: MessagingBackend::InMemory,
            nats: NatsConfig::default(),
            kafka: KafkaConfig::default(),
            topic: "messages".to_string(),
            topic_prefix: String::new(),
            channel_capacity: 10_000,
            max_message_size: 10 * 1024 * 1024, // 10MB
            enable_metrics: true,
        }
    }
}

impl MessagingConfig {
    /// Get full topic name with prefix
    pub fn full_topic(&self, topic: &str) -> String {
        if self.topic_prefix.is_empty() {
            topic.to_string()
        } else {
            format!("{}.{}", self.topic_prefix, topic)
        }
    }
}
