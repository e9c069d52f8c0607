//! In-process message channel
//!
//! Each topic is a bounded queue. Payloads published before anyone subscribes
//! stay buffered, and concurrent subscribers on one topic compete for
//! payloads the way members of a consumer group do.

use crate::messaging::error::{MessagingError, MessagingResult};
use crate::messaging::traits::{MessageConsumer, MessageProducer, MessageStream};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;

struct Topic {
    sender: mpsc::Sender<String>,
    receiver: Arc<Mutex<mpsc::Receiver<String>>>,
}

impl Topic {
    fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
        }
    }
}

/// Broker living inside the process; serves as both producer and consumer
#[derive(Clone)]
pub struct InMemoryBroker {
    topics: Arc<DashMap<String, Arc<Topic>>>,
    capacity: usize,
    closed: Arc<AtomicBool>,
}

impl InMemoryBroker {
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: Arc::new(DashMap::new()),
            capacity,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    fn topic(&self, name: &str) -> Arc<Topic> {
        self.topics
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Topic::new(self.capacity)))
            .value()
            .clone()
    }

    /// Payloads published to `topic` and not yet taken by a subscriber
    pub fn pending(&self, topic: &str) -> usize {
        self.topics
            .get(topic)
            .map(|t| t.sender.max_capacity() - t.sender.capacity())
            .unwrap_or(0)
    }
}

#[async_trait]
impl MessageProducer for InMemoryBroker {
    async fn publish(&self, topic: &str, payload: &str) -> MessagingResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(MessagingError::ConnectionFailed(
                "in-memory broker is closed".to_string(),
            ));
        }

        self.topic(topic)
            .sender
            .try_send(payload.to_string())
            .map_err(|e| match e {
                TrySendError::Full(_) => {
                    MessagingError::PublishFailed(format!("topic '{}' is full", topic))
                }
                TrySendError::Closed(_) => {
                    MessagingError::ConnectionFailed(format!("topic '{}' is closed", topic))
                }
            })
    }

    async fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    async fn close(&self) -> MessagingResult<()> {
        self.closed.store(true, Ordering::Release);
        // Dropping the senders ends every open stream once it is drained
        self.topics.clear();
        Ok(())
    }
}

#[async_trait]
impl MessageConsumer for InMemoryBroker {
    async fn subscribe(&self, topic: &str) -> MessagingResult<Box<dyn MessageStream>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(MessagingError::SubscribeFailed(
                "in-memory broker is closed".to_string(),
            ));
        }

        Ok(Box::new(InMemoryStream {
            receiver: self.topic(topic).receiver.clone(),
        }))
    }

    async fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    async fn close(&self) -> MessagingResult<()> {
        MessageProducer::close(self).await
    }
}

/// Subscription to one in-process topic
pub struct InMemoryStream {
    receiver: Arc<Mutex<mpsc::Receiver<String>>>,
}

#[async_trait]
impl MessageStream for InMemoryStream {
    async fn next(&mut self) -> MessagingResult<Option<String>> {
        let mut receiver = self.receiver.lock().await;
        Ok(receiver.recv().await)
    }

    async fn ack(&mut self) -> MessagingResult<()> {
        // Taking a payload off the queue is the acknowledgement
        Ok(())
    }

    async fn nack(&mut self) -> MessagingResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_before_subscribe_is_buffered() {
        let broker = InMemoryBroker::new(16);

        broker.publish("messages", "first").await.unwrap();
        broker.publish("messages", "second").await.unwrap();
        assert_eq!(broker.pending("messages"), 2);

        let mut stream = broker.subscribe("messages").await.unwrap();
        assert_eq!(stream.next().await.unwrap().as_deref(), Some("first"));
        assert_eq!(stream.next().await.unwrap().as_deref(), Some("second"));
        assert_eq!(broker.pending("messages"), 0);
    }

    #[tokio::test]
    async fn test_topics_are_isolated() {
        let broker = InMemoryBroker::new(16);

        broker.publish("a", "for a").await.unwrap();
        broker.publish("b", "for b").await.unwrap();

        let mut stream = broker.subscribe("b").await.unwrap();
        assert_eq!(stream.next().await.unwrap().as_deref(), Some("for b"));
        assert_eq!(broker.pending("a"), 1);
    }

    #[tokio::test]
    async fn test_full_topic_rejects_publish() {
        let broker = InMemoryBroker::new(1);

        broker.publish("messages", "fits").await.unwrap();
        let result = broker.publish("messages", "overflow").await;
        assert!(matches!(result, Err(MessagingError::PublishFailed(_))));
    }

    #[tokio::test]
    async fn test_close_ends_streams_and_rejects_publish() {
        let broker = InMemoryBroker::new(4);
        let mut stream = broker.subscribe("messages").await.unwrap();

        broker.publish("messages", "last").await.unwrap();
        MessageProducer::close(&broker).await.unwrap();

        assert_eq!(stream.next().await.unwrap().as_deref(), Some("last"));
        assert_eq!(stream.next().await.unwrap(), None);

        let result = broker.publish("messages", "late").await;
        assert!(matches!(result, Err(MessagingError::ConnectionFailed(_))));
        assert!(!MessageProducer::is_connected(&broker).await);
    }

    #[tokio::test]
    async fn test_empty_and_multibyte_payloads_pass_through() {
        let broker = InMemoryBroker::new(4);

        broker.publish("messages", "").await.unwrap();
        broker.publish("messages", "héllo wörld ✓ 日本語").await.unwrap();

        let mut stream = broker.subscribe("messages").await.unwrap();
        assert_eq!(stream.next().await.unwrap().as_deref(), Some(""));
        assert_eq!(
            stream.next().await.unwrap().as_deref(),
            Some("héllo wörld ✓ 日本語")
        );
    }
}
