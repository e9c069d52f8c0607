pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::ingest::{MessageIngestor, MessagePublisher, RecordingCounter};
use crate::query::QueryService;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub publisher: MessagePublisher,
    pub query: QueryService,
    pub ingestor: Arc<MessageIngestor>,
    pub counters: RecordingCounter,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        publisher: MessagePublisher,
        query: QueryService,
        ingestor: Arc<MessageIngestor>,
        counters: RecordingCounter,
    ) -> Self {
        Self {
            publisher,
            query,
            ingestor,
            counters,
            started_at: Instant::now(),
        }
    }
}

/// Envelope around every successful response
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn empty(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }
}
