//! Caller-facing read and maintenance surface over a [`MessageStore`]
//!
//! Translates loosely typed request parameters (signed page numbers, status
//! names, date bounds) into valid store calls, and turns a missing record
//! into [`AppError::NotFound`] so the boundary can tell it apart from an
//! internal failure.

use crate::config::QueryConfig;
use crate::error::{AppError, Result};
use crate::models::{Message, MessageStatus};
use crate::state::{MessageStore, Page};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;

/// Count of stored messages per status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageStats {
    pub total: u64,
    pub pending: u64,
    pub processed: u64,
    pub failed: u64,
}

/// Fields a caller may change on an existing message
#[derive(Debug, Clone, Default)]
pub struct MessageUpdate {
    pub content: Option<String>,
    pub status: Option<String>,
}

#[derive(Clone)]
pub struct QueryService {
    store: Arc<dyn MessageStore>,
    config: QueryConfig,
}

impl QueryService {
    pub fn new(store: Arc<dyn MessageStore>, config: QueryConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    pub async fn get_all(&self) -> Result<Vec<Message>> {
        self.store.get_all().await
    }

    /// One page of all messages; missing parameters fall back to page 0 and
    /// the configured default size, oversized pages are clamped
    pub async fn get_page(&self, page: Option<i64>, size: Option<i64>) -> Result<Page<Message>> {
        let (page, size) = self.page_bounds(page, size)?;
        self.store.get_all_paged(page, size).await
    }

    pub async fn get_status_page(
        &self,
        status: &str,
        page: Option<i64>,
        size: Option<i64>,
    ) -> Result<Page<Message>> {
        let status = parse_status(status)?;
        let (page, size) = self.page_bounds(page, size)?;
        self.store.get_by_status_paged(status, page, size).await
    }

    /// Point lookup that fails with `NotFound`
    pub async fn get_message(&self, id: &str) -> Result<Message> {
        self.store
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Message {} not found", id)))
    }

    pub async fn get_by_status(&self, status: &str) -> Result<Vec<Message>> {
        self.store.get_by_status(parse_status(status)?).await
    }

    /// Messages created within `[start, end]`
    pub async fn get_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Message>> {
        if start > end {
            return Err(AppError::Validation(format!(
                "range start {} is after end {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        self.store.get_by_date_range(start, end).await
    }

    pub async fn search(&self, term: &str) -> Result<Vec<Message>> {
        self.store.search(term).await
    }

    pub async fn count(&self) -> Result<u64> {
        self.store.count_all().await
    }

    pub async fn count_by_status(&self, status: &str) -> Result<u64> {
        self.store.count_by_status(parse_status(status)?).await
    }

    pub async fn exists(&self, id: &str) -> Result<bool> {
        self.store.exists_by_id(id).await
    }

    pub async fn latest(&self) -> Result<Option<Message>> {
        self.store.find_most_recent().await
    }

    pub async fn processed(&self) -> Result<Vec<Message>> {
        self.store.get_processed().await
    }

    pub async fn stats(&self) -> Result<MessageStats> {
        Ok(MessageStats {
            total: self.store.count_all().await?,
            pending: self.store.count_by_status(MessageStatus::Pending).await?,
            processed: self.store.count_by_status(MessageStatus::Processed).await?,
            failed: self.store.count_by_status(MessageStatus::Failed).await?,
        })
    }

    /// Apply `changes` to an existing message; id and timestamp never change
    pub async fn update(&self, id: &str, changes: MessageUpdate) -> Result<Message> {
        let mut message = self.get_message(id).await?;

        if let Some(status) = changes.status.as_deref() {
            message.status = parse_status(status)?;
        }
        if let Some(content) = changes.content {
            message.content = content;
        }

        self.store.update(message).await
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        self.store.delete_by_id(id).await
    }

    pub async fn delete_by_status(&self, status: &str) -> Result<u64> {
        self.store.delete_by_status(parse_status(status)?).await
    }

    pub async fn clear(&self) -> Result<u64> {
        let removed = self.store.clear().await?;
        tracing::info!(removed, "Cleared message store");
        Ok(removed)
    }

    fn page_bounds(&self, page: Option<i64>, size: Option<i64>) -> Result<(u32, u32)> {
        let page = page.unwrap_or(0);
        let size = size.unwrap_or(self.config.default_page_size as i64);

        if page < 0 {
            return Err(AppError::InvalidPage(format!(
                "page must not be negative, got {}",
                page
            )));
        }
        if size <= 0 {
            return Err(AppError::InvalidPage(format!(
                "page size must be greater than zero, got {}",
                size
            )));
        }

        let page = u32::try_from(page)
            .map_err(|_| AppError::InvalidPage(format!("page {} is out of range", page)))?;
        let size = size.min(self.config.max_page_size.max(1) as i64) as u32;

        Ok((page, size))
    }
}

/// Status names are matched ignoring case
pub fn parse_status(value: &str) -> Result<MessageStatus> {
    MessageStatus::from_str(value)
        .map_err(|_| AppError::Validation(format!("unknown message status '{}'", value)))
}
