use message_ingest::{
    api::{build_router_with_timeout, AppState},
    config::Config,
    ingest::{
        counters::FanoutCounter, run_consumer, Counter, MessageIngestor, MessagePublisher,
        RecordingCounter,
    },
    messaging::{MessageProducer, MessagingService},
    metrics::PrometheusCounter,
    query::QueryService,
    state::create_store,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Using default configuration");
        Config::default()
    });

    // Initialize tracing
    let json_logs = config.observability.json_logs;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.observability.log_filter().into()),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    tracing::info!("Starting {} v{}", config.observability.service_name, env!("CARGO_PKG_VERSION"));

    // Initialize Prometheus metrics
    let mut counters: Vec<Arc<dyn Counter>> = Vec::new();
    let recording = RecordingCounter::new();
    counters.push(Arc::new(recording.clone()));

    if config.observability.prometheus_enabled {
        if let Err(e) = message_ingest::metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
            tracing::warn!("Continuing without metrics");
        } else {
            counters.push(Arc::new(PrometheusCounter::new()));
            tracing::info!("Prometheus metrics initialized");
        }
    } else {
        tracing::info!("Prometheus metrics disabled in configuration");
    }
    let counter: Arc<dyn Counter> = Arc::new(FanoutCounter::new(counters));

    // Initialize storage backend
    tracing::info!("Storage backend: {:?}", config.state.backend);
    let store = create_store(&config.state).await?;

    // Connect the message channel
    tracing::info!("Messaging backend: {:?}", config.messaging.backend);
    let messaging = Arc::new(MessagingService::new(config.messaging.clone()).await?);
    let topic = messaging.topic().to_string();

    let publisher = MessagePublisher::new(messaging.clone(), topic.clone(), counter.clone());
    let ingestor = Arc::new(MessageIngestor::new(store.clone(), counter));
    let query = QueryService::new(store, config.query.clone());

    // Spawn the consumer
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let stream = messaging.subscribe(&topic).await?;
    let consumer_ingestor = ingestor.clone();
    let consumer_handle = tokio::spawn(async move {
        let shutdown = async move {
            let _ = shutdown_rx.changed().await;
        };
        run_consumer(consumer_ingestor, stream, shutdown).await
    });
    tracing::info!(topic = %topic, "Consumer started");

    // Build HTTP router
    let app = build_router_with_timeout(
        AppState::new(publisher, query, ingestor, recording),
        config.server.request_timeout(),
    );

    let http_addr = format!("{}:{}", config.server.host, config.server.http_port);
    let http_listener = tokio::net::TcpListener::bind(&http_addr).await?;

    tracing::info!("HTTP API server listening on http://{}", http_addr);
    tracing::info!("   Health check: http://{}/health", http_addr);
    tracing::info!("   REST API: http://{}/api/messages", http_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let mut http_shutdown = shutdown_tx.subscribe();
    let mut http_handle = tokio::spawn(async move {
        let shutdown = async move {
            let _ = http_shutdown.changed().await;
        };
        if let Err(e) = axum::serve(http_listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            tracing::error!("HTTP server error: {}", e);
        }
    });

    let http_stopped = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
            false
        }
        _ = &mut http_handle => {
            tracing::warn!("HTTP server stopped");
            true
        }
    };

    tracing::info!("Shutting down gracefully...");
    let _ = shutdown_tx.send(true);

    if !http_stopped {
        if let Err(e) = http_handle.await {
            tracing::error!("HTTP server task failed: {}", e);
        }
    }
    if let Err(e) = messaging.close().await {
        tracing::warn!("Failed to close messaging cleanly: {}", e);
    }
    match consumer_handle.await {
        Ok(delivered) => tracing::info!(delivered, "Consumer stopped"),
        Err(e) => tracing::error!("Consumer task failed: {}", e),
    }

    Ok(())
}
