//! Shared wiring for pipeline and API tests
//!
//! Builds the producer, in-process channel, ingestor and store the same way
//! the server binary does, with a recording counter in place of Prometheus.

#![allow(dead_code)]

use message_ingest::{
    api::{build_router_with_timeout, AppState},
    config::QueryConfig,
    ingest::{run_consumer, MessageIngestor, MessagePublisher, RecordingCounter},
    messaging::{InMemoryBroker, MessageConsumer},
    query::QueryService,
    state::{InMemoryStore, MessageStore},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub const TOPIC: &str = "messages";

pub struct Pipeline {
    pub broker: Arc<InMemoryBroker>,
    pub store: Arc<dyn MessageStore>,
    pub counter: RecordingCounter,
    pub publisher: MessagePublisher,
    pub ingestor: Arc<MessageIngestor>,
}

impl Pipeline {
    pub fn in_memory() -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()))
    }

    pub fn with_store(store: Arc<dyn MessageStore>) -> Self {
        let broker = Arc::new(InMemoryBroker::new(1024));
        let counter = RecordingCounter::new();
        let publisher = MessagePublisher::new(broker.clone(), TOPIC, Arc::new(counter.clone()));
        let ingestor = Arc::new(MessageIngestor::new(store.clone(), Arc::new(counter.clone())));

        Self {
            broker,
            store,
            counter,
            publisher,
            ingestor,
        }
    }

    /// Run the consumer in the background until the returned sender fires
    pub async fn spawn_consumer(&self) -> (oneshot::Sender<()>, JoinHandle<u64>) {
        let stream = self.broker.subscribe(TOPIC).await.unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let ingestor = self.ingestor.clone();

        let handle = tokio::spawn(async move {
            run_consumer(ingestor, stream, async move {
                let _ = stop_rx.await;
            })
            .await
        });

        (stop_tx, handle)
    }

    /// Wait until the store holds `expected` messages
    pub async fn wait_for_count(&self, expected: u64) {
        let store = self.store.clone();
        tokio::time::timeout(Duration::from_secs(5), async move {
            loop {
                if store.count_all().await.unwrap() >= expected {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for messages to be stored");
    }

    pub fn query(&self) -> QueryService {
        QueryService::new(self.store.clone(), QueryConfig::default())
    }

    pub fn router(&self) -> axum::Router {
        self.router_with_timeout(Duration::from_secs(30))
    }

    pub fn router_with_timeout(&self, timeout: Duration) -> axum::Router {
        build_router_with_timeout(
            AppState::new(
                self.publisher.clone(),
                self.query(),
                self.ingestor.clone(),
                self.counter.clone(),
            ),
            timeout,
        )
    }
}
