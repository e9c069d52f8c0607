use crate::api::{ApiResponse, AppState};
use crate::error::Result;
use crate::models::Message;
use crate::query::{MessageStats, MessageUpdate};
use crate::state::Page;
use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

pub async fn api_health() -> Result<Json<ApiResponse<String>>> {
    Ok(Json(ApiResponse::ok("API is healthy", "Running".to_string())))
}

/// Prometheus text exposition
pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        crate::metrics::gather_metrics(),
    )
}

#[derive(Debug, Deserialize)]
pub struct SendParams {
    pub message: String,
}

/// Publish the `message` query parameter
pub async fn send_message(
    State(state): State<AppState>,
    Query(params): Query<SendParams>,
) -> Result<Json<ApiResponse<String>>> {
    state.publisher.publish(&params.message).await?;
    Ok(Json(ApiResponse::ok("Message sent successfully", params.message)))
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub message: String,
}

/// Publish the `message` field of a JSON body
pub async fn send_json_message(
    State(state): State<AppState>,
    Json(request): Json<MessageRequest>,
) -> Result<Json<ApiResponse<String>>> {
    state.publisher.publish(&request.message).await?;
    Ok(Json(ApiResponse::ok("Message sent successfully", request.message)))
}

pub async fn list_messages(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<Message>>>> {
    let messages = state.query.get_all().await?;
    Ok(Json(ApiResponse::ok("Messages retrieved successfully", messages)))
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub size: Option<i64>,
}

pub async fn list_messages_paged(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<ApiResponse<Page<Message>>>> {
    let page = state.query.get_page(params.page, params.size).await?;
    Ok(Json(ApiResponse::ok("Messages retrieved successfully", page)))
}

pub async fn get_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Message>>> {
    let message = state.query.get_message(&id).await?;
    Ok(Json(ApiResponse::ok("Message retrieved successfully", message)))
}

pub async fn count_messages(State(state): State<AppState>) -> Result<Json<ApiResponse<u64>>> {
    let count = state.query.count().await?;
    Ok(Json(ApiResponse::ok("Message count retrieved", count)))
}

#[derive(Debug, Deserialize)]
pub struct StatusPageParams {
    pub page: Option<i64>,
    pub size: Option<i64>,
}

/// All messages with a status, or one page of them when `page` or `size` is given
pub async fn messages_by_status(
    State(state): State<AppState>,
    Path(status): Path<String>,
    Query(params): Query<StatusPageParams>,
) -> Result<axum::response::Response> {
    if params.page.is_some() || params.size.is_some() {
        let page = state
            .query
            .get_status_page(&status, params.page, params.size)
            .await?;
        return Ok(Json(ApiResponse::ok("Messages retrieved successfully", page)).into_response());
    }

    let messages = state.query.get_by_status(&status).await?;
    Ok(Json(ApiResponse::ok("Messages retrieved successfully", messages)).into_response())
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub term: String,
}

pub async fn search_messages(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<ApiResponse<Vec<Message>>>> {
    let messages = state.query.search(&params.term).await?;
    Ok(Json(ApiResponse::ok("Messages retrieved successfully", messages)))
}

#[derive(Debug, Deserialize)]
pub struct RangeParams {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

pub async fn messages_in_range(
    State(state): State<AppState>,
    Query(params): Query<RangeParams>,
) -> Result<Json<ApiResponse<Vec<Message>>>> {
    let messages = state.query.get_by_date_range(params.start, params.end).await?;
    Ok(Json(ApiResponse::ok("Messages retrieved successfully", messages)))
}

/// The newest message; `data` is null on an empty store
pub async fn latest_message(State(state): State<AppState>) -> Result<Json<ApiResponse<Message>>> {
    Ok(Json(match state.query.latest().await? {
        Some(message) => ApiResponse::ok("Latest message retrieved", message),
        None => ApiResponse::empty("No messages stored"),
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: MessageStats,
    pub processed_since_start: u64,
    pub counters: BTreeMap<String, u64>,
}

pub async fn message_stats(State(state): State<AppState>) -> Result<Json<ApiResponse<StatsResponse>>> {
    let stats = state.query.stats().await?;
    Ok(Json(ApiResponse::ok(
        "Message statistics retrieved",
        StatsResponse {
            stats,
            processed_since_start: state.ingestor.processed_count(),
            counters: state.counters.snapshot(),
        },
    )))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMessageRequest {
    pub content: Option<String>,
    #[validate(length(min = 1))]
    pub status: Option<String>,
}

pub async fn update_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateMessageRequest>,
) -> Result<Json<ApiResponse<Message>>> {
    request.validate()?;

    let updated = state
        .query
        .update(
            &id,
            MessageUpdate {
                content: request.content,
                status: request.status,
            },
        )
        .await?;

    Ok(Json(ApiResponse::ok("Message updated successfully", updated)))
}

pub async fn delete_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<bool>>> {
    let removed = state.query.delete(&id).await?;
    let message = if removed {
        "Message deleted"
    } else {
        "Message not found; nothing deleted"
    };
    Ok(Json(ApiResponse::ok(message, removed)))
}

pub async fn delete_by_status(
    State(state): State<AppState>,
    Path(status): Path<String>,
) -> Result<Json<ApiResponse<u64>>> {
    let removed = state.query.delete_by_status(&status).await?;
    Ok(Json(ApiResponse::ok("Messages deleted", removed)))
}

pub async fn clear_messages(State(state): State<AppState>) -> Result<Json<ApiResponse<u64>>> {
    let removed = state.query.clear().await?;
    Ok(Json(ApiResponse::ok("All messages cleared", removed)))
}
