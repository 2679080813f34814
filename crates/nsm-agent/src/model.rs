//! Object-model publication traits consumed by the core (§6 "External object-model
//! contract consumed", §3 "Numeric value sink"). The publication surface itself
//! (D-Bus, shared memory) is out of scope; this module ships the trait seams plus
//! an in-memory/log-backed reference implementation of each for the binary and
//! tests.

use std::sync::{Arc, Mutex};

use log::{info, trace};

/// `updateReading(value, timestamp)` sink, published to the object model.
pub trait ValueSink: Send + Sync {
    fn update_reading(&self, value: f64, timestamp: u64);
}

/// `updateStatus(available, functional)` sink (§7 "User-visible behavior").
pub trait StatusSink: Send + Sync {
    fn update_status(&self, available: bool, functional: bool);
}

/// `publish(objectPath, interface, property, value, timestampMs)` sink for an
/// out-of-process shared-memory telemetry ring.
pub trait SharedMemSink: Send + Sync {
    fn publish(&self, object_path: &str, interface: &str, property: &str, value: f64, timestamp_ms: u64);
}

/// Publishes to the object-model value property. The reference implementation
/// just logs at `trace!`, since no real object-model server is in scope here.
#[derive(Debug, Default)]
pub struct LoggingValueSink {
    label: String,
}

impl LoggingValueSink {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }
}

impl ValueSink for LoggingValueSink {
    fn update_reading(&self, value: f64, timestamp: u64) {
        trace!("{}: reading={} timestamp={}", self.label, value, timestamp);
    }
}

/// Tracks the maximum value observed since construction (§3 "peak sink").
#[derive(Debug, Default)]
pub struct PeakValueSink {
    peak: Mutex<Option<f64>>,
}

impl PeakValueSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peak(&self) -> Option<f64> {
        *self.peak.lock().expect("peak sink mutex poisoned")
    }
}

impl ValueSink for PeakValueSink {
    fn update_reading(&self, value: f64, _timestamp: u64) {
        let mut peak = self.peak.lock().expect("peak sink mutex poisoned");
        *peak = Some(peak.map_or(value, |p| p.max(value)));
    }
}

/// Distributes readings to multiple sinks, composing the value-property,
/// shared-memory, and peak sinks behind one observer (§3 "wrap multiple sinks as a
/// single observer").
#[derive(Default)]
pub struct CompositeValueSink {
    sinks: Vec<Arc<dyn ValueSink>>,
}

impl CompositeValueSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, sink: Arc<dyn ValueSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl ValueSink for CompositeValueSink {
    fn update_reading(&self, value: f64, timestamp: u64) {
        for sink in &self.sinks {
            sink.update_reading(value, timestamp);
        }
    }
}

/// Reference `StatusSink` that logs transitions at `info!` (repeated identical
/// statuses are the caller's responsibility to rate-limit, per §4.6's per-sensor
/// (CC, reason) bitmap).
#[derive(Debug, Default)]
pub struct LoggingStatusSink {
    label: String,
}

impl LoggingStatusSink {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }
}

impl StatusSink for LoggingStatusSink {
    fn update_status(&self, available: bool, functional: bool) {
        info!(
            "{}: status available={} functional={}",
            self.label, available, functional
        );
    }
}

/// Reference `SharedMemSink` that logs publications instead of writing to a real
/// shared-memory ring.
#[derive(Debug, Default)]
pub struct LoggingSharedMemSink;

impl SharedMemSink for LoggingSharedMemSink {
    fn publish(&self, object_path: &str, interface: &str, property: &str, value: f64, timestamp_ms: u64) {
        trace!(
            "shared-mem publish {object_path} {interface}.{property}={value} @ {timestamp_ms}ms"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peak_sink_tracks_maximum() {
        let sink = PeakValueSink::new();
        sink.update_reading(1.0, 0);
        sink.update_reading(5.0, 1);
        sink.update_reading(3.0, 2);
        assert_eq!(sink.peak(), Some(5.0));
    }

    #[test]
    fn composite_sink_forwards_to_all_members() {
        let peak: Arc<PeakValueSink> = Arc::new(PeakValueSink::new());
        let composite = CompositeValueSink::new()
            .push(peak.clone())
            .push(Arc::new(LoggingValueSink::new("t")));
        composite.update_reading(2.5, 0);
        assert_eq!(peak.peak(), Some(2.5));
    }
}
