use crate::api::{handlers, AppState};
use crate::metrics::MetricsLayer;
use axum::{
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower_http::{
    cors::CorsLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// The API router with requests cut off after `timeout` (408)
pub fn build_router_with_timeout(state: AppState, timeout: Duration) -> Router {
    build_router(state).layer(TimeoutLayer::new(timeout))
}

/// Build the main API router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health and metrics
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        // Publishing
        .route("/api/messages/send", post(handlers::send_message))
        .route("/api/messages/send-json", post(handlers::send_json_message))
        // Queries
        .route(
            "/api/messages",
            get(handlers::list_messages).delete(handlers::clear_messages),
        )
        .route("/api/messages/paged", get(handlers::list_messages_paged))
        .route("/api/messages/count", get(handlers::count_messages))
        .route("/api/messages/search", get(handlers::search_messages))
        .route("/api/messages/range", get(handlers::messages_in_range))
        .route("/api/messages/latest", get(handlers::latest_message))
        .route("/api/messages/stats", get(handlers::message_stats))
        .route("/api/messages/health", get(handlers::api_health))
        .route(
            "/api/messages/status/:status",
            get(handlers::messages_by_status).delete(handlers::delete_by_status),
        )
        .route(
            "/api/messages/:id",
            get(handlers::get_message)
                .put(handlers::update_message)
                .delete(handlers::delete_message),
        )
        // Add state
        .with_state(state)
        // Add middleware
        .layer(MetricsLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
}
