mod common;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Pipeline, TOPIC};
use message_ingest::{
    error::{AppError, Result},
    ingest::{
        counters::{MESSAGES_CONSUMED, MESSAGES_CONSUME_FAILED, MESSAGES_SENT},
        run_consumer,
    },
    messaging::{MessageConsumer, MessageProducer, MessageStream, MessagingError, MessagingResult},
    models::{Message, MessageStatus},
    state::MessageStore,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Store whose every operation fails
struct UnavailableStore;

fn unavailable<T>() -> Result<T> {
    Err(AppError::Storage("engine unavailable".to_string()))
}

#[async_trait]
impl MessageStore for UnavailableStore {
    async fn insert(&self, _message: Message) -> Result<Message> {
        unavailable()
    }
    async fn get_by_id(&self, _id: &str) -> Result<Option<Message>> {
        unavailable()
    }
    async fn get_all(&self) -> Result<Vec<Message>> {
        unavailable()
    }
    async fn get_by_status(&self, _status: MessageStatus) -> Result<Vec<Message>> {
        unavailable()
    }
    async fn get_by_date_range(
        &self,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<Message>> {
        unavailable()
    }
    async fn search(&self, _term: &str) -> Result<Vec<Message>> {
        unavailable()
    }
    async fn count_all(&self) -> Result<u64> {
        unavailable()
    }
    async fn count_by_status(&self, _status: MessageStatus) -> Result<u64> {
        unavailable()
    }
    async fn update(&self, _message: Message) -> Result<Message> {
        unavailable()
    }
    async fn delete_by_id(&self, _id: &str) -> Result<bool> {
        unavailable()
    }
    async fn delete_by_status(&self, _status: MessageStatus) -> Result<u64> {
        unavailable()
    }
    async fn clear(&self) -> Result<u64> {
        unavailable()
    }
}

/// Stream that yields one undecodable delivery before a good one
struct FlakyStream {
    deliveries: Vec<MessagingResult<String>>,
    acks: usize,
}

#[async_trait]
impl MessageStream for FlakyStream {
    async fn next(&mut self) -> MessagingResult<Option<String>> {
        if self.deliveries.is_empty() {
            return Ok(None);
        }
        self.deliveries.remove(0).map(Some)
    }

    async fn ack(&mut self) -> MessagingResult<()> {
        self.acks += 1;
        Ok(())
    }

    async fn nack(&mut self) -> MessagingResult<()> {
        Ok(())
    }
}

/// Subscription whose transport never recovers
struct BrokenStream {
    reads: Arc<AtomicUsize>,
}

#[async_trait]
impl MessageStream for BrokenStream {
    async fn next(&mut self) -> MessagingResult<Option<String>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Err(MessagingError::ConsumeFailed("broker unreachable".to_string()))
    }

    async fn ack(&mut self) -> MessagingResult<()> {
        Ok(())
    }

    async fn nack(&mut self) -> MessagingResult<()> {
        Ok(())
    }
}

/// Publish everything, close the channel, then drain it through the consumer
async fn publish_and_drain(pipeline: &Pipeline, payloads: &[String]) -> u64 {
    let stream = pipeline.broker.subscribe(TOPIC).await.unwrap();
    for payload in payloads {
        pipeline.publisher.publish(payload).await.unwrap();
    }
    MessageProducer::close(pipeline.broker.as_ref()).await.unwrap();

    run_consumer(pipeline.ingestor.clone(), stream, std::future::pending()).await
}

#[tokio::test]
async fn test_sequential_messages_keep_their_order() {
    let pipeline = Pipeline::in_memory();
    let payloads: Vec<String> = (0..10).map(|i| format!("Message {}", i)).collect();

    assert_eq!(publish_and_drain(&pipeline, &payloads).await, 10);

    let mut stored = pipeline.store.get_all().await.unwrap();
    stored.reverse();

    let contents: Vec<&str> = stored.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, payloads.iter().map(String::as_str).collect::<Vec<_>>());
    assert!(stored.iter().all(|m| m.status == MessageStatus::Processed));

    assert_eq!(pipeline.ingestor.processed_count(), 10);
    assert_eq!(pipeline.counter.get(MESSAGES_SENT), 10);
    assert_eq!(pipeline.counter.get(MESSAGES_CONSUMED), 10);
}

#[tokio::test]
async fn test_content_is_preserved() {
    let pipeline = Pipeline::in_memory();
    let payloads = vec![
        String::new(),
        "y".repeat(50_000),
        "multi-byte: héllo wörld ✓ 日本語 🚀".to_string(),
        "  untrimmed\n".to_string(),
    ];

    publish_and_drain(&pipeline, &payloads).await;

    for payload in &payloads {
        let matching: Vec<Message> = pipeline
            .store
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .filter(|m| &m.content == payload)
            .collect();
        assert_eq!(matching.len(), 1, "payload of {} bytes", payload.len());
    }
}

#[tokio::test]
async fn test_every_consumed_record_has_a_unique_id() {
    let pipeline = Pipeline::in_memory();
    let payloads: Vec<String> = (0..50).map(|_| "duplicate body".to_string()).collect();

    publish_and_drain(&pipeline, &payloads).await;

    let stored = pipeline.store.get_all().await.unwrap();
    assert_eq!(stored.len(), 50);
    let ids: HashSet<&str> = stored.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids.len(), 50);
}

#[tokio::test]
async fn test_store_failure_is_fail_open() {
    let pipeline = Pipeline::with_store(Arc::new(UnavailableStore));
    let payloads: Vec<String> = (0..3).map(|i| format!("lost {}", i)).collect();

    // Every delivery is still consumed and acknowledged
    assert_eq!(publish_and_drain(&pipeline, &payloads).await, 3);

    assert_eq!(pipeline.ingestor.processed_count(), 0);
    assert_eq!(pipeline.counter.get(MESSAGES_CONSUMED), 0);
    assert_eq!(pipeline.counter.get(MESSAGES_CONSUME_FAILED), 3);
}

#[tokio::test]
async fn test_undecodable_delivery_is_skipped() {
    let pipeline = Pipeline::in_memory();
    let stream = FlakyStream {
        deliveries: vec![
            Err(MessagingError::InvalidMessage(
                "invalid utf-8 sequence".to_string(),
            )),
            Ok("survivor".to_string()),
        ],
        acks: 0,
    };

    let delivered = run_consumer(
        pipeline.ingestor.clone(),
        Box::new(stream),
        std::future::pending(),
    )
    .await;

    assert_eq!(delivered, 1);
    assert_eq!(pipeline.counter.get(MESSAGES_CONSUME_FAILED), 1);

    let stored = pipeline.store.get_all().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].content, "survivor");
}

#[tokio::test(start_paused = true)]
async fn test_transport_errors_back_off_before_retrying() {
    let pipeline = Pipeline::in_memory();
    let failure = || Err(MessagingError::ConsumeFailed("connection reset".to_string()));
    let stream = FlakyStream {
        deliveries: vec![failure(), failure(), failure(), Ok("recovered".to_string())],
        acks: 0,
    };

    let started = tokio::time::Instant::now();
    let delivered = run_consumer(
        pipeline.ingestor.clone(),
        Box::new(stream),
        std::future::pending(),
    )
    .await;

    // 100ms + 200ms + 400ms between the four reads
    assert!(started.elapsed() >= Duration::from_millis(700));
    assert_eq!(delivered, 1);
    assert_eq!(pipeline.counter.get(MESSAGES_CONSUME_FAILED), 3);
    assert_eq!(pipeline.store.count_all().await.unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_persistent_transport_error_does_not_spin() {
    let pipeline = Pipeline::in_memory();
    let reads = Arc::new(AtomicUsize::new(0));
    let stream = BrokenStream {
        reads: reads.clone(),
    };

    let delivered = run_consumer(
        pipeline.ingestor.clone(),
        Box::new(stream),
        tokio::time::sleep(Duration::from_secs(10)),
    )
    .await;

    // Reads at 0, 0.1, 0.3, 0.7, 1.5, 3.1, 6.3s, then the pause is capped at 5s
    assert_eq!(delivered, 0);
    let reads = reads.load(Ordering::SeqCst);
    assert!(reads <= 8, "{} reads in ten seconds", reads);
    assert_eq!(pipeline.counter.get(MESSAGES_CONSUME_FAILED), reads as u64);
}

#[tokio::test]
async fn test_consumer_stops_on_shutdown() {
    let pipeline = Pipeline::in_memory();
    let (stop, handle) = pipeline.spawn_consumer().await;

    pipeline.publisher.publish("before shutdown").await.unwrap();
    pipeline.wait_for_count(1).await;

    stop.send(()).unwrap();
    assert_eq!(handle.await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_producers() {
    let pipeline = Arc::new(Pipeline::in_memory());
    let (stop, handle) = pipeline.spawn_consumer().await;

    let mut producers = Vec::new();
    for p in 0..4 {
        let publisher = pipeline.publisher.clone();
        producers.push(tokio::spawn(async move {
            for i in 0..25 {
                publisher.publish(&format!("producer {} message {}", p, i)).await.unwrap();
            }
        }));
    }
    for producer in producers {
        producer.await.unwrap();
    }

    pipeline.wait_for_count(100).await;
    stop.send(()).unwrap();
    handle.await.unwrap();

    assert_eq!(pipeline.store.count_all().await.unwrap(), 100);
    assert_eq!(pipeline.ingestor.processed_count(), 100);
}
