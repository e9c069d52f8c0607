use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A payload was accepted by the channel
pub const MESSAGES_SENT: &str = "messages.sent";
/// The channel rejected a publish
pub const MESSAGES_SEND_FAILED: &str = "messages.send_failed";
/// A delivered payload was stored
pub const MESSAGES_CONSUMED: &str = "messages.consumed";
/// A delivered payload could not be decoded or stored
pub const MESSAGES_CONSUME_FAILED: &str = "messages.consume_failed";

/// Named event counter injected into the publisher and the ingestor
pub trait Counter: Send + Sync {
    fn increment(&self, name: &str);
}

/// Discards every increment
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCounter;

impl Counter for NoopCounter {
    fn increment(&self, _name: &str) {}
}

/// Keeps counts in memory
#[derive(Debug, Clone, Default)]
pub struct RecordingCounter {
    counts: Arc<DashMap<String, u64>>,
}

impl RecordingCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> u64 {
        self.counts.get(name).map(|c| *c).unwrap_or(0)
    }

    /// All counts, ordered by name
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counts
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }
}

impl Counter for RecordingCounter {
    fn increment(&self, name: &str) {
        *self.counts.entry(name.to_string()).or_insert(0) += 1;
    }
}

/// Forwards each increment to every wrapped counter
pub struct FanoutCounter {
    counters: Vec<Arc<dyn Counter>>,
}

impl FanoutCounter {
    pub fn new(counters: Vec<Arc<dyn Counter>>) -> Self {
        Self { counters }
    }
}

impl Counter for FanoutCounter {
    fn increment(&self, name: &str) {
        for counter in &self.counters {
            counter.increment(name);
        }
    }
}
