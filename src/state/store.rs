use crate::error::{AppError, Result};
use crate::models::{Message, MessageStatus};
use crate::state::MessageStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Position of a message in listing order: creation instant, then insertion sequence
type OrderKey = (DateTime<Utc>, u64);

#[derive(Debug, Default)]
struct Inner {
    /// Messages ordered oldest first
    ordered: BTreeMap<OrderKey, Message>,
    index: HashMap<String, OrderKey>,
    next_seq: u64,
}

impl Inner {
    fn get(&self, id: &str) -> Option<&Message> {
        self.index.get(id).and_then(|key| self.ordered.get(key))
    }

    /// Matching messages, newest first
    fn collect<F>(&self, mut predicate: F) -> Vec<Message>
    where
        F: FnMut(&Message) -> bool,
    {
        self.ordered
            .values()
            .rev()
            .filter(|message| predicate(message))
            .cloned()
            .collect()
    }

    fn remove_where<F>(&mut self, mut predicate: F) -> u64
    where
        F: FnMut(&Message) -> bool,
    {
        let before = self.ordered.len();
        let index = &mut self.index;
        self.ordered.retain(|_, message| {
            let doomed = predicate(message);
            if doomed {
                index.remove(&message.id);
            }
            !doomed
        });
        (before - self.ordered.len()) as u64
    }
}

/// In-memory message store.
///
/// Messages live in a map ordered by creation instant and insertion
/// sequence, with an id index beside it. Writes touch only the affected
/// entries. Every read copies its result out under the read lock, so a
/// listing is always a complete, consistent view of the store.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn insert(&self, message: Message) -> Result<Message> {
        {
            let mut inner = self.inner.write();
            if inner.index.contains_key(&message.id) {
                return Err(AppError::DuplicateId(message.id));
            }

            let key = (message.created_instant(), inner.next_seq);
            inner.next_seq += 1;
            inner.index.insert(message.id.clone(), key);
            inner.ordered.insert(key, message.clone());
        }

        tracing::debug!(message_id = %message.id, "Message saved");
        Ok(message)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Message>> {
        Ok(self.inner.read().get(id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<Message>> {
        Ok(self.inner.read().collect(|_| true))
    }

    async fn get_by_status(&self, status: MessageStatus) -> Result<Vec<Message>> {
        Ok(self.inner.read().collect(|message| message.status == status))
    }

    async fn get_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Message>> {
        if start > end {
            return Ok(Vec::new());
        }

        let inner = self.inner.read();
        Ok(inner
            .ordered
            .range((start, 0)..=(end, u64::MAX))
            .rev()
            .map(|(_, message)| message.clone())
            .collect())
    }

    async fn search(&self, term: &str) -> Result<Vec<Message>> {
        let needle = term.to_lowercase();
        Ok(self
            .inner
            .read()
            .collect(|message| message.content.to_lowercase().contains(&needle)))
    }

    async fn count_all(&self) -> Result<u64> {
        Ok(self.inner.read().ordered.len() as u64)
    }

    async fn count_by_status(&self, status: MessageStatus) -> Result<u64> {
        let count = self
            .inner
            .read()
            .ordered
            .values()
            .filter(|message| message.status == status)
            .count();
        Ok(count as u64)
    }

    async fn exists_by_id(&self, id: &str) -> Result<bool> {
        Ok(self.inner.read().index.contains_key(id))
    }

    async fn update(&self, message: Message) -> Result<Message> {
        {
            let mut inner = self.inner.write();
            let old_key = *inner
                .index
                .get(&message.id)
                .ok_or_else(|| AppError::NotFound(format!("Message {} not found", message.id)))?;

            // The insertion sequence survives, the creation instant may move
            let key = (message.created_instant(), old_key.1);
            inner.ordered.remove(&old_key);
            inner.ordered.insert(key, message.clone());
            inner.index.insert(message.id.clone(), key);
        }

        tracing::debug!(message_id = %message.id, "Message updated");
        Ok(message)
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool> {
        let removed = {
            let mut inner = self.inner.write();
            match inner.index.remove(id) {
                Some(key) => inner.ordered.remove(&key).is_some(),
                None => false,
            }
        };

        if removed {
            tracing::debug!(message_id = %id, "Message deleted");
        }
        Ok(removed)
    }

    async fn delete_by_status(&self, status: MessageStatus) -> Result<u64> {
        let removed = self
            .inner
            .write()
            .remove_where(|message| message.status == status);

        tracing::debug!(status = %status, removed, "Messages deleted by status");
        Ok(removed)
    }

    async fn clear(&self) -> Result<u64> {
        let removed = {
            let mut inner = self.inner.write();
            let count = inner.ordered.len() as u64;
            inner.ordered.clear();
            inner.index.clear();
            count
        };

        tracing::info!(removed, "All messages cleared");
        Ok(removed)
    }
}
