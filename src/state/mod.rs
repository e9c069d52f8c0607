pub mod store;
pub mod sled_store;
pub mod factory;

pub use store::*;
pub use sled_store::SledStore;
pub use factory::{create_in_memory_store, create_store};

use crate::error::{AppError, Result};
use crate::models::{Message, MessageStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Concurrency-safe repository of ingested messages.
///
/// Every mutation is visible to all callers as soon as it returns. Listings
/// are ordered newest first by creation instant, ties broken by insertion
/// order.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Store a new message; fails with `DuplicateId` if the id is taken.
    /// Returns the message as stored.
    async fn insert(&self, message: Message) -> Result<Message>;

    /// Point lookup; a missing id is `Ok(None)`
    async fn get_by_id(&self, id: &str) -> Result<Option<Message>>;

    /// All messages, newest first
    async fn get_all(&self) -> Result<Vec<Message>>;

    /// One page of `get_all`, plus the total count
    async fn get_all_paged(&self, page: u32, size: u32) -> Result<Page<Message>> {
        validate_page(page, size)?;
        paginate(self.get_all().await?, page, size)
    }

    /// All messages with exactly this status, newest first
    async fn get_by_status(&self, status: MessageStatus) -> Result<Vec<Message>>;

    async fn get_by_status_paged(
        &self,
        status: MessageStatus,
        page: u32,
        size: u32,
    ) -> Result<Page<Message>> {
        validate_page(page, size)?;
        paginate(self.get_by_status(status).await?, page, size)
    }

    /// Messages created within `[start, end]`, newest first
    async fn get_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Message>>;

    /// Messages whose content contains `term`, ignoring case
    async fn search(&self, term: &str) -> Result<Vec<Message>>;

    async fn count_all(&self) -> Result<u64>;

    async fn count_by_status(&self, status: MessageStatus) -> Result<u64>;

    async fn exists_by_id(&self, id: &str) -> Result<bool> {
        Ok(self.get_by_id(id).await?.is_some())
    }

    /// Replace a stored message; fails with `NotFound` if the id is absent
    async fn update(&self, message: Message) -> Result<Message>;

    /// Returns true if a message was removed
    async fn delete_by_id(&self, id: &str) -> Result<bool>;

    /// Remove every message with this status; returns how many were removed
    async fn delete_by_status(&self, status: MessageStatus) -> Result<u64>;

    /// Remove everything; returns the prior count
    async fn clear(&self) -> Result<u64>;

    /// The newest message, if any
    async fn find_most_recent(&self) -> Result<Option<Message>> {
        Ok(self.get_all().await?.into_iter().next())
    }

    /// All `PROCESSED` messages ordered by ingestion timestamp, newest first
    async fn get_processed(&self) -> Result<Vec<Message>> {
        let mut messages = self.get_by_status(MessageStatus::Processed).await?;
        messages.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(messages)
    }
}

/// A single page of results
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, page: u32, size: u32, total: u64) -> Self {
        let total_pages = if size == 0 {
            0
        } else {
            total.div_ceil(size as u64)
        };

        Self {
            items,
            page,
            size,
            total,
            total_pages,
        }
    }

    pub fn is_last(&self) -> bool {
        (self.page as u64) + 1 >= self.total_pages
    }
}

/// Reject page requests the stores cannot serve
pub fn validate_page(_page: u32, size: u32) -> Result<()> {
    if size == 0 {
        return Err(AppError::InvalidPage(
            "page size must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Slice an already ordered listing into one page
pub fn paginate<T>(items: Vec<T>, page: u32, size: u32) -> Result<Page<T>> {
    validate_page(page, size)?;

    let total = items.len() as u64;
    let start = (page as usize).saturating_mul(size as usize);

    let items = items
        .into_iter()
        .skip(start)
        .take(size as usize)
        .collect();

    Ok(Page::new(items, page, size, total))
}
