//! Sensor model (C6, §4.6).
//!
//! Four concrete shapes share one `update` operation and diverge only in codec
//! specifics, so they are modeled as a tagged `enum` with per-variant state
//! rather than an inheritance tree, per spec.md §9 ("tagged unions ... are
//! preferred over open inheritance trees").

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{trace, warn};
use nsm_proto::codec::aggregate::{decode_aggregate_resp_raw, interpret_sample};
use nsm_proto::model::{AggregateSample, SensorKind, AGGREGATE_MAX_SUBSENSOR_TAG};
use nsm_proto::types::{Eid, InstanceId};
use nsm_proto::NsmCodecError;

use crate::error::TransportError;
use crate::events::EventDispatcher;
use crate::model::{StatusSink, ValueSink};
use crate::timing::DeviceSemaphore;
use crate::transport::MctpTransport;
use crate::{exchange, events};

/// Resources a sensor needs to run one `update` pass, threaded through by the
/// scheduler (C7) or the async set-operation dispatcher (C8) that invokes it.
#[derive(Clone)]
pub struct SensorContext {
    pub transport: Arc<MctpTransport>,
    pub events: Arc<EventDispatcher>,
    pub semaphore: Arc<DeviceSemaphore>,
    pub eid: Eid,
    pub retries: u32,
    pub request_timeout: Duration,
    pub long_running_timeout: Duration,
}

pub type EncodeRequestFn = Box<dyn Fn(InstanceId, &mut [u8]) -> Result<usize, NsmCodecError> + Send + Sync>;

/// Tracks which (transport-or-command) failures have already been logged for a
/// sensor, so repeated identical failures from the same device collapse to a
/// single log line (§3 "Sensor (abstract): Error-rate rate-limiting").
#[derive(Default)]
struct FailureRateLimiter {
    seen: Mutex<HashSet<(u8, u16)>>,
}

/// Discriminant + reason code pair used as the rate-limiter key. `kind` collapses
/// the handful of failure shapes a sensor can see into one small space; it is not
/// a wire value.
mod failure_kind {
    pub const TIMEOUT: u8 = 0;
    pub const UNREACHABLE: u8 = 1;
    pub const WRITE_FAILURE: u8 = 2;
    pub const COMMAND_FAIL: u8 = 3;
    pub const DECODE: u8 = 4;
}

impl FailureRateLimiter {
    fn note(&self, name: &str, err: &TransportError) {
        let key = match err {
            TransportError::Timeout { .. } => (failure_kind::TIMEOUT, 0),
            TransportError::Unreachable { .. } => (failure_kind::UNREACHABLE, 0),
            TransportError::WriteFailure(_) => (failure_kind::WRITE_FAILURE, 0),
            TransportError::InstanceIdPoolExhausted { .. } => (failure_kind::WRITE_FAILURE, 0),
            TransportError::Codec(_) => (failure_kind::DECODE, 0),
            TransportError::CommandFail { reason_code } => (failure_kind::COMMAND_FAIL, *reason_code),
            TransportError::LongRunningTimeout { .. } => (failure_kind::TIMEOUT, 0),
            TransportError::LongRunningInstanceMismatch { .. } => (failure_kind::DECODE, 0),
        };
        let first_time = self.seen.lock().expect("rate limiter mutex poisoned").insert(key);
        if first_time {
            warn!("sensor {name}: {err}");
        } else {
            trace!("sensor {name}: {err} (repeat, suppressed)");
        }
    }
}

/// `update(value, timestamp=0)` sink plus the status half of the same reading
/// (§3 "Numeric value sink").
pub struct ReadingSink {
    pub value: Arc<dyn ValueSink>,
    pub status: Arc<dyn StatusSink>,
}

impl ReadingSink {
    fn ok(&self, value: f64, timestamp: u64) {
        self.value.update_reading(value, timestamp);
        self.status.update_status(true, true);
    }

    fn not_working(&self) {
        self.status.update_status(true, false);
    }
}

/// Polled sensor: request -> response -> sink (§4.6 "Polled sensor contract").
pub struct PolledSensor {
    pub name: String,
    pub encode_request: EncodeRequestFn,
    pub decode_response: Box<dyn Fn(&[u8]) -> Result<f64, NsmCodecError> + Send + Sync>,
    pub sink: ReadingSink,
    failures: FailureRateLimiter,
}

impl PolledSensor {
    pub fn new(
        name: impl Into<String>,
        encode_request: EncodeRequestFn,
        decode_response: impl Fn(&[u8]) -> Result<f64, NsmCodecError> + Send + Sync + 'static,
        sink: ReadingSink,
    ) -> Self {
        Self {
            name: name.into(),
            encode_request,
            decode_response: Box::new(decode_response),
            sink,
            failures: FailureRateLimiter::default(),
        }
    }

    async fn update(&self, ctx: &SensorContext) {
        let result = exchange::send_recv_nsm_msg(
            &ctx.transport,
            ctx.eid,
            ctx.request_timeout,
            ctx.retries,
            |instance_id, buf| (self.encode_request)(instance_id, buf),
        )
        .await;

        match result {
            Ok(bytes) => match (self.decode_response)(&bytes) {
                Ok(value) => self.sink.ok(value, 0),
                Err(err) => {
                    self.failures.note(&self.name, &TransportError::Codec(err));
                    self.sink.not_working();
                }
            },
            Err(err) => {
                self.failures.note(&self.name, &err);
                self.sink.not_working();
            }
        }
    }
}

/// One sub-sensor slot an aggregator routes samples to, keyed by tag 0..=0xFD
/// (§3 "Aggregator sensor", §4.1 "tags 254-255 reserved").
pub struct SubSensorSlot {
    pub tag: u8,
    pub sink: ReadingSink,
}

/// Aggregator sensor: single request -> stream of `(tag, bytes)` samples, each
/// routed to a sub-sensor (§4.6 "Aggregator sensor"). Tag 0xFF (timestamp) is
/// stashed and forwarded to every numeric reading decoded from the same
/// response; tag 0xFE (UUID) is informational only.
pub struct AggregatorSensor {
    pub name: String,
    pub encode_request: EncodeRequestFn,
    pub sub_sensors: Vec<SubSensorSlot>,
    failures: FailureRateLimiter,
}

impl AggregatorSensor {
    pub fn new(name: impl Into<String>, encode_request: EncodeRequestFn, sub_sensors: Vec<SubSensorSlot>) -> Self {
        Self {
            name: name.into(),
            encode_request,
            sub_sensors,
            failures: FailureRateLimiter::default(),
        }
    }

    async fn update(&self, ctx: &SensorContext) {
        let result = exchange::send_recv_nsm_msg(
            &ctx.transport,
            ctx.eid,
            ctx.request_timeout,
            ctx.retries,
            |instance_id, buf| (self.encode_request)(instance_id, buf),
        )
        .await;

        let bytes = match result {
            Ok(bytes) => bytes,
            Err(err) => {
                self.failures.note(&self.name, &err);
                for slot in &self.sub_sensors {
                    slot.sink.not_working();
                }
                return;
            }
        };

        let (raw_samples, walk_error) = decode_aggregate_resp_raw(&bytes);
        let mut timestamp = 0u64;
        for raw in &raw_samples {
            if raw.tag == nsm_proto::model::AGGREGATE_TAG_TIMESTAMP {
                if let Ok(AggregateSample::Timestamp(ts)) = interpret_sample(*raw) {
                    timestamp = ts;
                }
            }
        }
        for raw in raw_samples {
            if raw.tag > AGGREGATE_MAX_SUBSENSOR_TAG {
                continue;
            }
            let Some(slot) = self.sub_sensors.iter().find(|slot| slot.tag == raw.tag) else {
                continue;
            };
            match interpret_sample(raw) {
                Ok(AggregateSample::SubSensor { data, .. }) if data.len() == 4 => {
                    let value = f32::from_le_bytes(data.try_into().expect("checked len 4"));
                    slot.sink.ok(value as f64, timestamp);
                }
                _ => slot.sink.not_working(),
            }
        }
        if let Some(err) = walk_error {
            self.failures.note(&self.name, &TransportError::Codec(err));
        }
    }
}

/// Event-driven sensor: no request; registers itself with C4 for one
/// `(messageType, eventId)` key and does nothing on `update` (§4.6 "Event sensor").
pub struct EventSensor {
    pub name: String,
    pub key: events::EventKey,
}

impl EventSensor {
    pub fn register(&self, events: &EventDispatcher, eid: Eid, handler: Arc<dyn events::EventHandler>) {
        events.register(eid, self.key, handler);
    }

    async fn update(&self, _ctx: &SensorContext) {
        // No-op by design: all handling happens off the registered event handler.
    }
}

/// Long-running sensor: combines an async set-operation entry point with the
/// event handler that resolves it (§4.6 "Async long-running sensor"). `execute`
/// is invoked by C8's dispatcher rather than by the per-device scheduler pass.
pub struct LongRunningSensor {
    pub name: String,
    pub encode_request: EncodeRequestFn,
    pub decode_response: Box<dyn Fn(&[u8]) -> Result<(), NsmCodecError> + Send + Sync>,
}

impl LongRunningSensor {
    pub fn new(
        name: impl Into<String>,
        encode_request: EncodeRequestFn,
        decode_response: impl Fn(&[u8]) -> Result<(), NsmCodecError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            encode_request,
            decode_response: Box::new(decode_response),
        }
    }

    /// Runs the long-running round trip to completion. Returns the device-level
    /// error taxonomy C8 expects (§4.8 "Error taxonomy"), not a raw transport error.
    pub async fn execute(&self, ctx: &SensorContext) -> Result<(), crate::error::AsyncOpError> {
        let outcome = exchange::send_recv_long_running(
            &ctx.transport,
            &ctx.events,
            &ctx.semaphore,
            ctx.eid,
            ctx.request_timeout,
            ctx.retries,
            ctx.long_running_timeout,
            |instance_id, buf| (self.encode_request)(instance_id, buf),
        )
        .await
        .map_err(|err| {
            warn!("long-running sensor {}: {err}", self.name);
            match err {
                TransportError::Timeout { .. }
                | TransportError::LongRunningTimeout { .. }
                | TransportError::Unreachable { .. } => crate::error::AsyncOpError::Unavailable,
                TransportError::CommandFail { .. } | TransportError::Codec(_) => {
                    crate::error::AsyncOpError::WriteFailure
                }
                _ => crate::error::AsyncOpError::InternalFailure,
            }
        })?;

        if !outcome.completion_code.is_success() {
            return Err(crate::error::AsyncOpError::WriteFailure);
        }
        (self.decode_response)(&outcome.payload).map_err(|_| crate::error::AsyncOpError::WriteFailure)
    }
}

/// Tagged union over the four sensor shapes, sharing the harness above per
/// spec.md §9. Owned by a device's static/priority/round-robin/capability-refresh
/// lists (§3 "Sensor membership").
pub enum Sensor {
    Polled(PolledSensor),
    Aggregator(AggregatorSensor),
    EventDriven(EventSensor),
    LongRunning(LongRunningSensor),
}

impl Sensor {
    pub fn name(&self) -> &str {
        match self {
            Sensor::Polled(s) => &s.name,
            Sensor::Aggregator(s) => &s.name,
            Sensor::EventDriven(s) => &s.name,
            Sensor::LongRunning(s) => &s.name,
        }
    }

    pub fn kind(&self) -> SensorKind {
        match self {
            Sensor::Polled(_) => SensorKind::Polled,
            Sensor::Aggregator(_) => SensorKind::Aggregator,
            Sensor::EventDriven(_) => SensorKind::EventDriven,
            Sensor::LongRunning(_) => SensorKind::LongRunning,
        }
    }

    /// Runs one `update` pass (§4.7 scheduler step 3/4). Long-running sensors are
    /// not driven by the scheduler's polling pass (they are invoked through C8),
    /// so this is a no-op for that variant here.
    pub async fn update(&self, ctx: &SensorContext) {
        match self {
            Sensor::Polled(s) => s.update(ctx).await,
            Sensor::Aggregator(s) => s.update(ctx).await,
            Sensor::EventDriven(s) => s.update(ctx).await,
            Sensor::LongRunning(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LoggingStatusSink, PeakValueSink};
    use nsm_proto::codec::platform_env::{decode_get_temperature_reading_resp, encode_get_temperature_reading_resp};

    #[test]
    fn polled_sensor_decode_closure_matches_codec() {
        let mut buf = [0u8; 32];
        let n = encode_get_temperature_reading_resp(1, 46.189, &mut buf).unwrap();
        let decode: Box<dyn Fn(&[u8]) -> Result<f64, NsmCodecError> + Send + Sync> =
            Box::new(|bytes: &[u8]| decode_get_temperature_reading_resp(bytes).map(|v| v as f64));
        let value = decode(&buf[..n]).unwrap();
        assert!((value - 46.189).abs() < 0.01);
    }

    #[test]
    fn reading_sink_marks_not_working_on_failure() {
        let peak = Arc::new(PeakValueSink::new());
        let sink = ReadingSink {
            value: peak.clone(),
            status: Arc::new(LoggingStatusSink::new("t")),
        };
        sink.ok(5.0, 0);
        assert_eq!(peak.peak(), Some(5.0));
        sink.not_working();
        assert_eq!(peak.peak(), Some(5.0), "not_working must not clobber the last reading");
    }

    #[test]
    fn failure_rate_limiter_dedupes_identical_reason_codes() {
        let limiter = FailureRateLimiter::default();
        let err = TransportError::CommandFail { reason_code: 7 };
        limiter.note("s", &err);
        let first_seen = limiter.seen.lock().unwrap().len();
        limiter.note("s", &err);
        let second_seen = limiter.seen.lock().unwrap().len();
        assert_eq!(first_seen, second_seen);
    }
}
