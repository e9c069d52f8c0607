//! Producer and consumer sides of the ingestion pipeline
//!
//! [`MessagePublisher`] hands raw text to the channel. [`MessageIngestor`]
//! turns each delivered payload into a stored [`Message`](crate::models::Message),
//! and [`run_consumer`] drives it from a subscription.

pub mod consumer;
pub mod counters;
pub mod producer;

pub use consumer::{run_consumer, MessageIngestor};
pub use counters::{Counter, NoopCounter, RecordingCounter};
pub use producer::MessagePublisher;
