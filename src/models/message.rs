use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// A single ingested message in its structured, stored form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique identifier (hyphenated UUID), assigned at consumption time
    pub id: String,

    /// Raw payload, preserved byte for byte
    pub content: String,

    /// Instant the payload was accepted, milliseconds since the Unix epoch
    pub timestamp: i64,

    /// Lifecycle status
    pub status: MessageStatus,

    /// Set once on first durable persistence
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    /// Refreshed on every durable mutation
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Message {
    /// Build a freshly ingested message: new id, current time, `PROCESSED`
    pub fn new(content: impl Into<String>) -> Self {
        Self::with_id(
            Uuid::new_v4().to_string(),
            content,
            Utc::now().timestamp_millis(),
            MessageStatus::Processed,
        )
    }

    /// Build a message with explicit fields (batch loads, tests)
    pub fn with_id(
        id: impl Into<String>,
        content: impl Into<String>,
        timestamp: i64,
        status: MessageStatus,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            timestamp,
            status,
            created_at: None,
            updated_at: None,
        }
    }

    /// Instant used for creation ordering and date range queries.
    ///
    /// Falls back to `timestamp` for records that never went through
    /// durable persistence.
    pub fn created_instant(&self) -> DateTime<Utc> {
        self.created_at.unwrap_or_else(|| {
            DateTime::from_timestamp_millis(self.timestamp).unwrap_or_default()
        })
    }

    /// Case-insensitive substring match on the content
    pub fn matches(&self, term: &str) -> bool {
        self.content.to_lowercase().contains(&term.to_lowercase())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum MessageStatus {
    Pending,
    Processed,
    Failed,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Pending => "PENDING",
            MessageStatus::Processed => "PROCESSED",
            MessageStatus::Failed => "FAILED",
        }
    }
}
