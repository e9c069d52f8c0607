mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use common::Pipeline;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use message_ingest::{
    models::{Message, MessageStatus},
    state::{InMemoryStore, MessageStore},
    Result,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Listing takes longer than any sane request timeout
struct SlowListingStore {
    inner: InMemoryStore,
    delay: Duration,
}

#[async_trait]
impl MessageStore for SlowListingStore {
    async fn insert(&self, message: Message) -> Result<Message> {
        self.inner.insert(message).await
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Message>> {
        self.inner.get_by_id(id).await
    }

    async fn get_all(&self) -> Result<Vec<Message>> {
        tokio::time::sleep(self.delay).await;
        self.inner.get_all().await
    }

    async fn get_by_status(&self, status: MessageStatus) -> Result<Vec<Message>> {
        self.inner.get_by_status(status).await
    }

    async fn get_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Message>> {
        self.inner.get_by_date_range(start, end).await
    }

    async fn search(&self, term: &str) -> Result<Vec<Message>> {
        self.inner.search(term).await
    }

    async fn count_all(&self) -> Result<u64> {
        self.inner.count_all().await
    }

    async fn count_by_status(&self, status: MessageStatus) -> Result<u64> {
        self.inner.count_by_status(status).await
    }

    async fn update(&self, message: Message) -> Result<Message> {
        self.inner.update(message).await
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool> {
        self.inner.delete_by_id(id).await
    }

    async fn delete_by_status(&self, status: MessageStatus) -> Result<u64> {
        self.inner.delete_by_status(status).await
    }

    async fn clear(&self) -> Result<u64> {
        self.inner.clear().await
    }
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            request = request.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    (status, value)
}

async fn seed(pipeline: &Pipeline, contents: &[&str]) -> Vec<Message> {
    let mut stored = Vec::new();
    for content in contents {
        stored.push(pipeline.store.insert(Message::new(*content)).await.unwrap());
    }
    stored
}

#[tokio::test]
async fn test_health() {
    let pipeline = Pipeline::in_memory();
    let app = pipeline.router();

    let (status, body) = call(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = call(&app, Method::GET, "/api/messages/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], "Running");
}

#[tokio::test]
async fn test_send_then_consume() {
    let pipeline = Pipeline::in_memory();
    let app = pipeline.router();
    let (stop, handle) = pipeline.spawn_consumer().await;

    let (status, body) = call(&app, Method::POST, "/api/messages/send?message=hello%20world", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"], "hello world");

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/messages/send-json",
        Some(json!({ "message": "from json" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    pipeline.wait_for_count(2).await;
    stop.send(()).unwrap();
    handle.await.unwrap();

    let (status, body) = call(&app, Method::GET, "/api/messages", None).await;
    assert_eq!(status, StatusCode::OK);
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["content"], "from json");
    assert_eq!(data[0]["status"], "PROCESSED");

    let (_, body) = call(&app, Method::GET, "/api/messages/stats", None).await;
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["processedSinceStart"], 2);
    assert_eq!(body["data"]["counters"]["messages.sent"], 2);
}

#[tokio::test]
async fn test_get_by_id_and_not_found() {
    let pipeline = Pipeline::in_memory();
    let stored = seed(&pipeline, &["findable"]).await;
    let app = pipeline.router();

    let (status, body) = call(&app, Method::GET, &format!("/api/messages/{}", stored[0].id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["content"], "findable");

    let (status, body) = call(&app, Method::GET, "/api/messages/missing-id", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_paging_and_invalid_page() {
    let pipeline = Pipeline::in_memory();
    seed(&pipeline, &["a", "b", "c", "d", "e"]).await;
    let app = pipeline.router();

    let (status, body) = call(&app, Method::GET, "/api/messages/paged?page=1&size=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 5);
    assert_eq!(body["data"]["totalPages"], 3);
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["content"], "c");

    let (status, body) = call(&app, Method::GET, "/api/messages/paged?page=0&size=0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_PAGE");
}

#[tokio::test]
async fn test_search_count_and_status() {
    let pipeline = Pipeline::in_memory();
    seed(&pipeline, &["Important data", "Other data", "Important event"]).await;
    let app = pipeline.router();

    let (_, body) = call(&app, Method::GET, "/api/messages/search?term=important", None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (_, body) = call(&app, Method::GET, "/api/messages/count", None).await;
    assert_eq!(body["data"], 3);

    let (status, body) = call(&app, Method::GET, "/api/messages/status/processed", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 3);

    let (status, _) = call(&app, Method::GET, "/api/messages/status/ARCHIVED", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = call(&app, Method::GET, "/api/messages/latest", None).await;
    assert_eq!(body["data"]["content"], "Important event");
}

#[tokio::test]
async fn test_range_query() {
    let pipeline = Pipeline::in_memory();
    seed(&pipeline, &["in range"]).await;
    let app = pipeline.router();

    let (status, body) = call(
        &app,
        Method::GET,
        "/api/messages/range?start=2000-01-01T00:00:00Z&end=2999-01-01T00:00:00Z",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, body) = call(
        &app,
        Method::GET,
        "/api/messages/range?start=2999-01-01T00:00:00Z&end=2000-01-01T00:00:00Z",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_update_and_delete() {
    let pipeline = Pipeline::in_memory();
    let stored = seed(&pipeline, &["first", "second"]).await;
    let app = pipeline.router();
    let uri = format!("/api/messages/{}", stored[0].id);

    let (status, body) = call(&app, Method::PUT, &uri, Some(json!({ "status": "FAILED" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "FAILED");
    assert_eq!(body["data"]["content"], "first");

    let (_, body) = call(&app, Method::DELETE, "/api/messages/status/failed", None).await;
    assert_eq!(body["data"], 1);

    let (_, body) = call(&app, Method::DELETE, "/api/messages/not-there", None).await;
    assert_eq!(body["data"], false);

    let (_, body) = call(&app, Method::DELETE, &format!("/api/messages/{}", stored[1].id), None).await;
    assert_eq!(body["data"], true);

    assert_eq!(
        pipeline
            .store
            .count_by_status(MessageStatus::Processed)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn test_clear() {
    let pipeline = Pipeline::in_memory();
    seed(&pipeline, &["one", "two", "three"]).await;
    let app = pipeline.router();

    let (status, body) = call(&app, Method::DELETE, "/api/messages", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], 3);

    let (_, body) = call(&app, Method::DELETE, "/api/messages", None).await;
    assert_eq!(body["data"], 0);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    message_ingest::metrics::init_metrics().unwrap();
    let pipeline = Pipeline::in_memory();
    let app = pipeline.router();

    call(&app, Method::GET, "/health", None).await;

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("message_ingest_http_requests_total"));
}

#[tokio::test]
async fn test_slow_request_times_out() {
    let store = Arc::new(SlowListingStore {
        inner: InMemoryStore::new(),
        delay: Duration::from_secs(5),
    });
    let pipeline = Pipeline::with_store(store);
    let app = pipeline.router_with_timeout(Duration::from_millis(50));

    let (status, _) = call(&app, Method::GET, "/api/messages", None).await;
    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);

    // Fast routes are unaffected
    let (status, _) = call(&app, Method::GET, "/api/messages/count", None).await;
    assert_eq!(status, StatusCode::OK);
}
