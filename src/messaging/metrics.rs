//! Prometheus metrics for the message channel.
//!
//! Everything here lives under `message_ingest_channel_*` in the default
//! registry. `topic` is the unprefixed topic name.

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, register_gauge_vec, register_histogram_vec, register_int_counter_vec,
    GaugeVec, HistogramVec, IntCounterVec,
};

/// Rejection reason for payloads over `max_message_size`
pub const REASON_TOO_LARGE: &str = "too_large";

pub struct ChannelMetrics {
    /// Payloads accepted by the broker
    pub payloads_published: IntCounterVec,

    /// Payloads refused before or by the broker, labelled with a reason
    pub payloads_rejected: IntCounterVec,

    /// Payloads handed to the ingestor
    pub payloads_delivered: IntCounterVec,

    pub read_failures: IntCounterVec,

    /// 1 while connected, 0 after close
    pub broker_connected: GaugeVec,

    /// Configured `max_message_size`, for comparison with `payload_bytes`
    pub payload_limit_bytes: GaugeVec,

    pub publish_duration: HistogramVec,

    /// 64 B up to 16 MiB in steps of 4x, so the default 10 MiB limit falls
    /// inside the last bucket
    pub payload_bytes: HistogramVec,
}

lazy_static! {
    pub static ref CHANNEL_METRICS: ChannelMetrics = ChannelMetrics {
        payloads_published: register_int_counter_vec!(
            "message_ingest_channel_payloads_published_total",
            "Raw text payloads accepted by the broker",
            &["topic", "backend"]
        )
        .unwrap(),

        payloads_rejected: register_int_counter_vec!(
            "message_ingest_channel_payloads_rejected_total",
            "Payloads that could not be published",
            &["topic", "backend", "reason"]
        )
        .unwrap(),

        payloads_delivered: register_int_counter_vec!(
            "message_ingest_channel_payloads_delivered_total",
            "Payloads read from a subscription for ingestion",
            &["topic", "backend"]
        )
        .unwrap(),

        read_failures: register_int_counter_vec!(
            "message_ingest_channel_read_failures_total",
            "Failed reads from a subscription",
            &["topic", "backend", "reason"]
        )
        .unwrap(),

        broker_connected: register_gauge_vec!(
            "message_ingest_channel_broker_connected",
            "Whether the channel holds a broker connection",
            &["backend"]
        )
        .unwrap(),

        payload_limit_bytes: register_gauge_vec!(
            "message_ingest_channel_payload_limit_bytes",
            "Largest payload the channel accepts",
            &["backend"]
        )
        .unwrap(),

        publish_duration: register_histogram_vec!(
            "message_ingest_channel_publish_duration_seconds",
            "Time from publish call to broker acknowledgement",
            &["topic", "backend"],
            vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]
        )
        .unwrap(),

        payload_bytes: register_histogram_vec!(
            "message_ingest_channel_payload_bytes",
            "Size of published payloads in bytes",
            &["topic", "backend"],
            exponential_buckets(64.0, 4.0, 10).unwrap()
        )
        .unwrap(),
    };
}

/// Register the channel metrics with the default registry
pub fn init_channel_metrics() {
    lazy_static::initialize(&CHANNEL_METRICS);
}
