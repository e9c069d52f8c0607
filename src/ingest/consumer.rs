use crate::error::Result;
use crate::ingest::counters::{Counter, MESSAGES_CONSUMED, MESSAGES_CONSUME_FAILED};
use crate::messaging::{MessageStream, MessagingError};
use crate::models::Message;
use crate::state::MessageStore;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// First pause after a failed read from the channel, doubled per repeat
const READ_RETRY_INITIAL: Duration = Duration::from_millis(100);
const READ_RETRY_MAX: Duration = Duration::from_secs(5);

/// Turns delivered payloads into stored messages.
///
/// Every payload gets a fresh id, the current time and `PROCESSED` status;
/// the content is stored verbatim. Storage failures are fail-open: they are
/// logged and counted, and delivery is still acknowledged.
pub struct MessageIngestor {
    store: Arc<dyn MessageStore>,
    counter: Arc<dyn Counter>,
    processed: AtomicU64,
}

impl MessageIngestor {
    pub fn new(store: Arc<dyn MessageStore>, counter: Arc<dyn Counter>) -> Self {
        Self {
            store,
            counter,
            processed: AtomicU64::new(0),
        }
    }

    /// Channel entry point, invoked once per delivered payload
    pub async fn on_deliver(&self, payload: &str) {
        if let Err(e) = self.ingest(payload).await {
            self.counter.increment(MESSAGES_CONSUME_FAILED);
            tracing::error!(
                error = %e,
                bytes = payload.len(),
                "Failed to persist delivered message; dropping it"
            );
        }
    }

    /// Transform and persist one payload, surfacing store failures
    pub async fn ingest(&self, payload: &str) -> Result<Message> {
        let stored = self.store.insert(Message::new(payload)).await?;

        self.processed.fetch_add(1, Ordering::Relaxed);
        self.counter.increment(MESSAGES_CONSUMED);
        tracing::info!(message_id = %stored.id, "Message consumed and stored");

        Ok(stored)
    }

    /// Payloads stored since this ingestor was created
    pub fn processed_count(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }
}

/// Feed a subscription into `ingestor` until the stream ends or `shutdown`
/// resolves. Each payload is acknowledged after `on_deliver` returns.
/// Returns how many payloads were delivered.
///
/// Undecodable payloads are acknowledged and skipped. Any other read error
/// is treated as a transport fault and retried after a pause that doubles
/// on each consecutive failure, up to five seconds.
pub async fn run_consumer<F>(
    ingestor: Arc<MessageIngestor>,
    mut stream: Box<dyn MessageStream>,
    shutdown: F,
) -> u64
where
    F: Future<Output = ()> + Send,
{
    tokio::pin!(shutdown);
    let mut delivered = 0u64;
    let mut retry_delay = READ_RETRY_INITIAL;

    loop {
        let next = tokio::select! {
            _ = &mut shutdown => {
                tracing::info!(delivered, "Consumer stopping on shutdown");
                break;
            }
            next = stream.next() => next,
        };

        match next {
            Ok(Some(payload)) => {
                retry_delay = READ_RETRY_INITIAL;
                ingestor.on_deliver(&payload).await;
                delivered += 1;

                if let Err(e) = stream.ack().await {
                    tracing::warn!(error = %e, "Failed to acknowledge delivery");
                }
            }
            Ok(None) => {
                tracing::info!(delivered, "Subscription ended");
                break;
            }
            Err(e @ MessagingError::InvalidMessage(_)) => {
                retry_delay = READ_RETRY_INITIAL;
                ingestor.counter.increment(MESSAGES_CONSUME_FAILED);
                tracing::error!(error = %e, "Failed to decode delivery; skipping it");

                if let Err(e) = stream.ack().await {
                    tracing::warn!(error = %e, "Failed to acknowledge skipped delivery");
                }
            }
            Err(e) => {
                ingestor.counter.increment(MESSAGES_CONSUME_FAILED);
                tracing::error!(
                    error = %e,
                    retry_in_ms = retry_delay.as_millis() as u64,
                    "Failed to read from subscription"
                );

                tokio::select! {
                    _ = &mut shutdown => {
                        tracing::info!(delivered, "Consumer stopping on shutdown");
                        break;
                    }
                    _ = tokio::time::sleep(retry_delay) => {}
                }
                retry_delay = (retry_delay * 2).min(READ_RETRY_MAX);
            }
        }
    }

    delivered
}
