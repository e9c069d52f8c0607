//! Message channel between producers and the ingesting consumer
//!
//! This module provides a unified interface over the brokers a deployment can
//! sit on. Payloads are raw UTF-8 text; nothing is wrapped or re-encoded on
//! the way through.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │         MessagingService                         │
//! ├─────────────────────────────────────────────────┤
//! │  - publish()      - subscribe()                  │
//! │  - topic prefixing, publish metrics              │
//! └─────────────────────────────────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────────────┐
//! │      Channel Abstraction                         │
//! ├─────────────────────────────────────────────────┤
//! │  - MessageProducer / MessageConsumer traits      │
//! │  - MessageStream (next / ack / nack)             │
//! └─────────────────────────────────────────────────┘
//!        │                 │                 │
//!        ▼                 ▼                 ▼
//! ┌──────────────┐ ┌──────────────┐ ┌──────────────┐
//! │ Kafka        │ │ NATS         │ │ In-process   │
//! ├──────────────┤ ├──────────────┤ ├──────────────┤
//! │ Durable log  │ │ Low latency  │ │ Tests / dev  │
//! │ Partitioned  │ │ At-most-once │ │ Bounded queue│
//! └──────────────┘ └──────────────┘ └──────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use message_ingest::messaging::{MessageProducer, MessagingConfig, MessagingService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let messaging = MessagingService::new(MessagingConfig::default()).await?;
//!     messaging.publish("messages", "hello").await?;
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod kafka;
mod memory;
mod metrics;
mod nats;
mod service;
mod traits;

pub use config::{KafkaConfig, MessagingBackend, MessagingConfig, NatsConfig};
pub use error::{MessagingError, MessagingResult};
pub use kafka::{KafkaConsumer, KafkaProducer};
pub use memory::InMemoryBroker;
pub use metrics::{init_channel_metrics, CHANNEL_METRICS};
pub use nats::{NatsConsumer, NatsProducer};
pub use service::MessagingService;
pub use traits::{MessageConsumer, MessageProducer, MessageStream};
