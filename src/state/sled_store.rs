use crate::error::{AppError, Result};
use crate::models::{Message, MessageStatus};
use crate::state::MessageStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};
use sled::{Db, IVec, Tree};
use std::path::Path;
use std::sync::Arc;

/// Record layout on disk: the message plus its insertion sequence
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredMessage {
    seq: u64,
    message: Message,
}

impl StoredMessage {
    fn order_key(&self) -> (i64, u64) {
        (self.message.created_instant().timestamp_millis(), self.seq)
    }
}

/// Persistent message store using the Sled embedded database.
///
/// Three trees are kept in step inside one transaction per operation:
/// `messages` (id -> record), `messages_by_created` (creation millis + seq
/// -> id) and `messages_by_status` (status + seq -> id).
#[derive(Clone)]
pub struct SledStore {
    db: Arc<Db>,
    messages: Tree,
    by_created: Tree,
    by_status: Tree,
}

impl SledStore {
    /// Open (or create) a store at the specified path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path.as_ref()).map_err(|e| {
            AppError::Storage(format!("Failed to open Sled database: {}", e))
        })?;

        let messages = Self::open_tree(&db, "messages")?;
        let by_created = Self::open_tree(&db, "messages_by_created")?;
        let by_status = Self::open_tree(&db, "messages_by_status")?;

        tracing::info!("Initialized Sled store at {:?}", path.as_ref());

        Ok(Self {
            db: Arc::new(db),
            messages,
            by_created,
            by_status,
        })
    }

    fn open_tree(db: &Db, name: &str) -> Result<Tree> {
        db.open_tree(name).map_err(|e| {
            AppError::Storage(format!("Failed to open {} tree: {}", name, e))
        })
    }

    fn serialize(stored: &StoredMessage) -> Result<Vec<u8>> {
        bincode::serialize(stored).map_err(|e| {
            AppError::Serialization(format!("Failed to serialize message: {}", e))
        })
    }

    fn deserialize(bytes: &[u8]) -> Result<StoredMessage> {
        bincode::deserialize(bytes).map_err(|e| {
            AppError::Serialization(format!("Failed to deserialize message: {}", e))
        })
    }

    /// Big-endian so that byte order equals chronological order.
    /// The sign bit is flipped to keep pre-epoch instants sorted.
    fn created_key(created: DateTime<Utc>, seq: u64) -> Vec<u8> {
        let millis = (created.timestamp_millis() as u64) ^ (1 << 63);
        let mut key = Vec::with_capacity(16);
        key.extend_from_slice(&millis.to_be_bytes());
        key.extend_from_slice(&seq.to_be_bytes());
        key
    }

    fn status_prefix(status: MessageStatus) -> Vec<u8> {
        format!("{}/", status.as_str()).into_bytes()
    }

    fn status_key(status: MessageStatus, seq: u64) -> Vec<u8> {
        let mut key = Self::status_prefix(status);
        key.extend_from_slice(&seq.to_be_bytes());
        key
    }

    fn storage_error(context: &str, e: sled::Error) -> AppError {
        AppError::Storage(format!("{}: {}", context, e))
    }

    fn transaction_error(err: TransactionError<AppError>) -> AppError {
        match err {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => Self::storage_error("Transaction failed", e),
        }
    }

    fn next_seq(&self) -> Result<u64> {
        self.db
            .generate_id()
            .map_err(|e| Self::storage_error("Failed to generate sequence", e))
    }

    fn load(&self, id: &[u8]) -> Result<Option<StoredMessage>> {
        match self.messages.get(id) {
            Ok(Some(bytes)) => Ok(Some(Self::deserialize(&bytes)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(Self::storage_error("Failed to get message", e)),
        }
    }

    /// Resolve index entries into messages, keeping the index order.
    /// Entries whose record vanished concurrently are skipped.
    fn load_index<I>(&self, entries: I) -> Result<Vec<StoredMessage>>
    where
        I: Iterator<Item = sled::Result<(IVec, IVec)>>,
    {
        let mut loaded = Vec::new();
        for entry in entries {
            let (_, id) = entry.map_err(|e| Self::storage_error("Failed to read index", e))?;
            if let Some(stored) = self.load(&id)? {
                loaded.push(stored);
            }
        }
        Ok(loaded)
    }

    fn newest_first(mut stored: Vec<StoredMessage>) -> Vec<Message> {
        stored.sort_by(|a, b| b.order_key().cmp(&a.order_key()));
        stored.into_iter().map(|s| s.message).collect()
    }

    /// Remove the given ids and their index entries in a single transaction
    fn remove_ids(&self, ids: &[IVec]) -> Result<u64> {
        (&self.messages, &self.by_created, &self.by_status)
            .transaction(|(messages, by_created, by_status)| {
                let mut removed = 0u64;
                for id in ids {
                    let Some(bytes) = messages.remove(id.clone())? else {
                        continue;
                    };
                    let existing =
                        Self::deserialize(&bytes).map_err(ConflictableTransactionError::Abort)?;

                    by_created.remove(Self::created_key(
                        existing.message.created_instant(),
                        existing.seq,
                    ))?;
                    by_status.remove(Self::status_key(existing.message.status, existing.seq))?;
                    removed += 1;
                }
                Ok(removed)
            })
            .map_err(Self::transaction_error)
    }

    /// Flush pending writes to disk
    pub async fn flush(&self) -> Result<()> {
        self.db
            .flush_async()
            .await
            .map_err(|e| Self::storage_error("Failed to flush database", e))?;
        Ok(())
    }
}

#[async_trait]
impl MessageStore for SledStore {
    async fn insert(&self, mut message: Message) -> Result<Message> {
        let now = Utc::now();
        message.created_at = Some(now);
        message.updated_at = Some(now);

        let stored = StoredMessage {
            seq: self.next_seq()?,
            message,
        };
        let value = Self::serialize(&stored)?;
        let id_key = stored.message.id.as_bytes();
        let created_key = Self::created_key(now, stored.seq);
        let status_key = Self::status_key(stored.message.status, stored.seq);

        (&self.messages, &self.by_created, &self.by_status)
            .transaction(|(messages, by_created, by_status)| {
                if messages.get(id_key)?.is_some() {
                    return Err(ConflictableTransactionError::Abort(AppError::DuplicateId(
                        stored.message.id.clone(),
                    )));
                }

                messages.insert(id_key, value.as_slice())?;
                by_created.insert(created_key.as_slice(), id_key)?;
                by_status.insert(status_key.as_slice(), id_key)?;
                Ok(())
            })
            .map_err(Self::transaction_error)?;

        self.flush().await?;

        tracing::debug!(message_id = %stored.message.id, "Message saved to Sled");
        Ok(stored.message)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Message>> {
        Ok(self.load(id.as_bytes())?.map(|stored| stored.message))
    }

    async fn get_all(&self) -> Result<Vec<Message>> {
        let stored = self.load_index(self.by_created.iter().rev())?;
        Ok(Self::newest_first(stored))
    }

    async fn get_by_status(&self, status: MessageStatus) -> Result<Vec<Message>> {
        let stored = self.load_index(self.by_status.scan_prefix(Self::status_prefix(status)))?;
        Ok(Self::newest_first(stored))
    }

    async fn get_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Message>> {
        if start > end {
            return Ok(Vec::new());
        }

        let from = Self::created_key(start, 0);
        let to = Self::created_key(end, u64::MAX);

        let stored = self
            .load_index(self.by_created.range(from..=to))?
            .into_iter()
            .filter(|s| {
                let created = s.message.created_instant();
                created >= start && created <= end
            })
            .collect();

        Ok(Self::newest_first(stored))
    }

    async fn search(&self, term: &str) -> Result<Vec<Message>> {
        let needle = term.to_lowercase();
        let mut matched = Vec::new();

        for entry in self.messages.iter() {
            let (_, value) =
                entry.map_err(|e| Self::storage_error("Failed to iterate messages", e))?;
            let stored = Self::deserialize(&value)?;
            if stored.message.content.to_lowercase().contains(&needle) {
                matched.push(stored);
            }
        }

        Ok(Self::newest_first(matched))
    }

    async fn count_all(&self) -> Result<u64> {
        Ok(self.messages.len() as u64)
    }

    async fn count_by_status(&self, status: MessageStatus) -> Result<u64> {
        let mut count = 0u64;
        for entry in self.by_status.scan_prefix(Self::status_prefix(status)) {
            entry.map_err(|e| Self::storage_error("Failed to read status index", e))?;
            count += 1;
        }
        Ok(count)
    }

    async fn exists_by_id(&self, id: &str) -> Result<bool> {
        self.messages
            .contains_key(id.as_bytes())
            .map_err(|e| Self::storage_error("Failed to check message existence", e))
    }

    async fn update(&self, message: Message) -> Result<Message> {
        let now = Utc::now();
        let id_key = message.id.as_bytes();

        let updated = (&self.messages, &self.by_created, &self.by_status)
            .transaction(|(messages, _by_created, by_status)| {
                let existing = match messages.get(id_key)? {
                    Some(bytes) => {
                        Self::deserialize(&bytes).map_err(ConflictableTransactionError::Abort)?
                    }
                    None => {
                        return Err(ConflictableTransactionError::Abort(AppError::NotFound(
                            format!("Message {} not found", message.id),
                        )));
                    }
                };

                let mut replacement = message.clone();
                replacement.created_at = existing.message.created_at;
                replacement.updated_at = Some(now);

                let stored = StoredMessage {
                    seq: existing.seq,
                    message: replacement,
                };
                let value = Self::serialize(&stored).map_err(ConflictableTransactionError::Abort)?;
                messages.insert(id_key, value)?;

                if existing.message.status != stored.message.status {
                    by_status.remove(Self::status_key(existing.message.status, existing.seq))?;
                    by_status.insert(Self::status_key(stored.message.status, stored.seq), id_key)?;
                }

                Ok(stored.message)
            })
            .map_err(Self::transaction_error)?;

        self.flush().await?;

        tracing::debug!(message_id = %updated.id, "Message updated in Sled");
        Ok(updated)
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool> {
        let removed = self.remove_ids(&[IVec::from(id.as_bytes())])?;
        if removed > 0 {
            self.flush().await?;
            tracing::debug!(message_id = %id, "Message deleted from Sled");
        }
        Ok(removed > 0)
    }

    async fn delete_by_status(&self, status: MessageStatus) -> Result<u64> {
        let mut ids = Vec::new();
        for entry in self.by_status.scan_prefix(Self::status_prefix(status)) {
            let (_, id) = entry.map_err(|e| Self::storage_error("Failed to read status index", e))?;
            ids.push(id);
        }

        let removed = self.remove_ids(&ids)?;
        self.flush().await?;

        tracing::debug!(status = %status, removed, "Messages deleted by status from Sled");
        Ok(removed)
    }

    async fn clear(&self) -> Result<u64> {
        let mut ids = Vec::new();
        for key in self.messages.iter().keys() {
            ids.push(key.map_err(|e| Self::storage_error("Failed to iterate messages", e))?);
        }

        let removed = self.remove_ids(&ids)?;
        self.flush().await?;

        tracing::info!(removed, "All messages cleared from Sled");
        Ok(removed)
    }

    async fn find_most_recent(&self) -> Result<Option<Message>> {
        // The newest index entry is the last key of the creation index
        match self.by_created.last() {
            Ok(Some((_, id))) => Ok(self.load(&id)?.map(|stored| stored.message)),
            Ok(None) => Ok(None),
            Err(e) => Err(Self::storage_error("Failed to read creation index", e)),
        }
    }
}
