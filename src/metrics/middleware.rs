//! HTTP middleware recording request count, latency and in-flight requests

use super::{HTTP_CONNECTIONS_ACTIVE, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS};
use axum::{
    extract::{MatchedPath, Request},
    response::Response,
};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};

/// Tower layer for metrics collection
#[derive(Debug, Clone, Default)]
pub struct MetricsLayer;

impl MetricsLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService { inner }
    }
}

/// Tower service for metrics collection
#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
}

impl<S> Service<Request> for MetricsService<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let method = req.method().to_string();
        // Route templates keep label cardinality bounded
        let path = req
            .extensions()
            .get::<MatchedPath>()
            .map(|p| p.as_str().to_string())
            .unwrap_or_else(|| "unmatched".to_string());

        HTTP_CONNECTIONS_ACTIVE.inc();

        let start = Instant::now();
        let future = self.inner.call(req);

        Box::pin(async move {
            let result = future.await;

            HTTP_CONNECTIONS_ACTIVE.dec();

            if let Ok(response) = &result {
                let status = response.status().as_u16().to_string();

                HTTP_REQUESTS_TOTAL
                    .with_label_values(&[&method, &path, &status])
                    .inc();
                HTTP_REQUEST_DURATION_SECONDS
                    .with_label_values(&[&method, &path])
                    .observe(start.elapsed().as_secs_f64());
            }

            result
        })
    }
}
