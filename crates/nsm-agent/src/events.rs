//! Event dispatcher (C4, §4.4).
//!
//! Every unsolicited frame arriving from C2 carries a message-type byte and an
//! event-id byte. A per-device `(messageType, eventId) -> handler` map is
//! consulted; an absent key drops the frame with a logged warning and bumps a
//! counter. The long-running completion shape bypasses the registry entirely:
//! its instance id is matched against whichever sensor is currently installed as
//! the device's active long-running handler (§4.3 "Long-running flow").
//!
//! Event-id values for the XID/reset-required/threshold shapes are not
//! standardized anywhere in scope here; they are registered per-device from the
//! configuration the same way sensor identities are (§6 "Configuration inputs").

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use log::{trace, warn};
use nsm_proto::codec::event::{
    decode_long_running_completion_event, decode_reset_required_event, decode_threshold_event,
    decode_xid_event, LongRunningCompletionEvent, ResetRequiredEvent, ThresholdEvent, XidEvent,
};
use nsm_proto::types::Eid;

use crate::transport::RawFrame;

/// Local convention for the long-running completion event id: none of the
/// example corpus's retrieved headers enumerate a standard value, so the agent
/// reserves the top of the event-id space the same way it reserves aggregate
/// sample tags 254/255 (§4.7 "tags 254-255 reserved").
pub const EVENT_ID_LONG_RUNNING_COMPLETION: u8 = 0xF0;

/// A decoded event, handed to whichever handler is registered for its
/// `(message type, event id)` key.
#[derive(Debug, Clone)]
pub enum DecodedEvent {
    Xid(XidEvent),
    ResetRequired(ResetRequiredEvent),
    Threshold(ThresholdEvent),
}

/// Receives a fully decoded event for one registered `(messageType, eventId)` key.
pub trait EventHandler: Send + Sync {
    fn handle_event(&self, event: &DecodedEvent);
}

/// Receives long-running completion events while installed as a device's active
/// long-running handler. Exactly one may be installed per device at a time,
/// enforced by the device semaphore (§5 "at most one long-running command
/// outstanding per device").
pub trait LongRunningCompletionHandler: Send + Sync {
    fn handle_completion(&self, event: LongRunningCompletionEvent, payload: &[u8]);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventKey {
    pub message_type: u8,
    pub event_id: u8,
}

struct DeviceEventState {
    handlers: HashMap<EventKey, Arc<dyn EventHandler>>,
    long_running: Option<(u8, Arc<dyn LongRunningCompletionHandler>)>,
}

impl DeviceEventState {
    fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            long_running: None,
        }
    }
}

/// Dispatches decoded event frames to per-device registered handlers (C4).
pub struct EventDispatcher {
    devices: Mutex<HashMap<Eid, DeviceEventState>>,
    dropped_count: AtomicU64,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            devices: Mutex::new(HashMap::new()),
            dropped_count: AtomicU64::new(0),
        }
    }

    /// Total number of events dropped for lacking a registered handler, exposed
    /// for the "warning counter" named in §4.4.
    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    pub fn register(&self, eid: Eid, key: EventKey, handler: Arc<dyn EventHandler>) {
        self.devices
            .lock()
            .expect("event dispatcher mutex poisoned")
            .entry(eid)
            .or_insert_with(DeviceEventState::new)
            .handlers
            .insert(key, handler);
    }

    pub fn unregister(&self, eid: Eid, key: &EventKey) {
        if let Some(state) = self.devices.lock().expect("event dispatcher mutex poisoned").get_mut(&eid) {
            state.handlers.remove(key);
        }
    }

    /// Installs `handler` as the sole long-running completion recipient for
    /// `eid`, replacing any previous installation. Callers must hold the
    /// device's semaphore before calling this (§5).
    pub fn install_long_running(
        &self,
        eid: Eid,
        instance_id: u8,
        handler: Arc<dyn LongRunningCompletionHandler>,
    ) {
        self.devices
            .lock()
            .expect("event dispatcher mutex poisoned")
            .entry(eid)
            .or_insert_with(DeviceEventState::new)
            .long_running = Some((instance_id, handler));
    }

    pub fn clear_long_running(&self, eid: Eid) {
        if let Some(state) = self.devices.lock().expect("event dispatcher mutex poisoned").get_mut(&eid) {
            state.long_running = None;
        }
    }

    /// Consumes one frame read from C2: decodes its event-header, then either
    /// resolves a pending long-running completion or routes it through the
    /// per-device registry.
    pub fn dispatch(&self, frame: RawFrame) {
        let Ok(header) = nsm_proto::header::NsmHeader::decode(&frame.bytes) else {
            trace!("event dispatcher: unparseable header from eid {}", frame.eid);
            return;
        };
        if header.direction != nsm_proto::types::Direction::Event {
            trace!("event dispatcher: non-event frame from eid {}, ignoring", frame.eid);
            return;
        }
        if frame.bytes.len() <= nsm_proto::header::HEADER_LEN {
            return;
        }
        let event_id = frame.bytes[nsm_proto::header::HEADER_LEN];

        if event_id == EVENT_ID_LONG_RUNNING_COMPLETION {
            if let Ok(completion) = decode_long_running_completion_event(&frame.bytes) {
                self.dispatch_long_running(frame.eid, completion, &frame.bytes[completion.payload_offset..]);
            } else {
                trace!("event dispatcher: malformed long-running completion from eid {}", frame.eid);
            }
            return;
        }

        let key = EventKey {
            message_type: header.nvidia_message_type,
            event_id,
        };
        let handler = {
            let devices = self.devices.lock().expect("event dispatcher mutex poisoned");
            devices
                .get(&frame.eid)
                .and_then(|state| state.handlers.get(&key))
                .cloned()
        };
        let Some(handler) = handler else {
            self.dropped_count.fetch_add(1, Ordering::Relaxed);
            warn!(
                "no handler registered for eid {} key {:?}, dropping event",
                frame.eid, key
            );
            return;
        };

        let Some(decoded) = decode_common_event(&frame.bytes) else {
            trace!("event dispatcher: failed to decode event body from eid {}", frame.eid);
            return;
        };
        handler.handle_event(&decoded);
    }

    fn dispatch_long_running(&self, eid: Eid, event: LongRunningCompletionEvent, payload: &[u8]) {
        let handler = {
            let devices = self.devices.lock().expect("event dispatcher mutex poisoned");
            devices.get(&eid).and_then(|state| {
                state.long_running.as_ref().and_then(|(expected, handler)| {
                    if *expected == event.instance_id {
                        Some(handler.clone())
                    } else {
                        None
                    }
                })
            })
        };
        match handler {
            Some(handler) => handler.handle_completion(event, payload),
            None => {
                trace!(
                    "discarding long-running completion for eid {} instance {}: no matching accept id",
                    eid, event.instance_id
                );
            }
        }
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Tries each of the three common event shapes in turn; the first that decodes
/// without a length/data error wins. Shapes are structurally distinguishable by
/// length alone in the absence of a shared discriminant beyond message type.
fn decode_common_event(buffer: &[u8]) -> Option<DecodedEvent> {
    if let Ok(event) = decode_xid_event(buffer) {
        return Some(DecodedEvent::Xid(event));
    }
    if let Ok(event) = decode_threshold_event(buffer) {
        return Some(DecodedEvent::Threshold(event));
    }
    if let Ok(event) = decode_reset_required_event(buffer) {
        return Some(DecodedEvent::ResetRequired(event));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use nsm_proto::header::NsmHeader;
    use std::sync::atomic::AtomicUsize;

    struct CountingHandler(AtomicUsize);
    impl EventHandler for CountingHandler {
        fn handle_event(&self, _event: &DecodedEvent) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn encode_reset_required(eid: Eid, message_type: u8, event_id: u8, state: u8) -> RawFrame {
        let mut buf = vec![0u8; 16];
        let header = NsmHeader::new_event(message_type);
        let n = header.encode(&mut buf).unwrap();
        buf[n] = event_id;
        buf[n + 1] = state;
        buf.truncate(n + 2);
        RawFrame { eid, bytes: buf }
    }

    #[test]
    fn dispatch_routes_to_registered_handler() {
        let dispatcher = EventDispatcher::new();
        let handler = Arc::new(CountingHandler(AtomicUsize::new(0)));
        let key = EventKey { message_type: 0x03, event_id: 2 };
        dispatcher.register(5, key, handler.clone());

        dispatcher.dispatch(encode_reset_required(5, 0x03, 2, 1));
        assert_eq!(handler.0.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn dispatch_drops_unregistered_key_and_counts_it() {
        let dispatcher = EventDispatcher::new();
        dispatcher.dispatch(encode_reset_required(5, 0x03, 9, 1));
        assert_eq!(dispatcher.dropped_count(), 1);
    }

    struct RecordingLongRunning(Mutex<Option<u8>>);
    impl LongRunningCompletionHandler for RecordingLongRunning {
        fn handle_completion(&self, event: LongRunningCompletionEvent, _payload: &[u8]) {
            *self.0.lock().unwrap() = Some(event.instance_id);
        }
    }

    #[test]
    fn long_running_completion_resolves_matching_instance_id() {
        let dispatcher = EventDispatcher::new();
        let handler = Arc::new(RecordingLongRunning(Mutex::new(None)));
        dispatcher.install_long_running(7, 12, handler.clone());

        let mut buf = vec![0u8; 16];
        let header = NsmHeader::new_event(0x03);
        let n = header.encode(&mut buf).unwrap();
        buf[n] = 0xF0; // local convention event id for long-running completion
        buf[n + 1] = 12; // instance id
        buf[n + 2] = 0x0A; // command
        buf[n + 3] = nsm_proto::types::CompletionCode::Success as u8;
        buf[n + 4..n + 6].copy_from_slice(&0u16.to_le_bytes());
        buf.truncate(n + 6);

        dispatcher.dispatch(RawFrame { eid: 7, bytes: buf });
        assert_eq!(*handler.0.lock().unwrap(), Some(12));
    }

    #[test]
    fn long_running_completion_with_mismatched_instance_id_is_discarded() {
        let dispatcher = EventDispatcher::new();
        let handler = Arc::new(RecordingLongRunning(Mutex::new(None)));
        dispatcher.install_long_running(7, 12, handler.clone());

        let mut buf = vec![0u8; 16];
        let header = NsmHeader::new_event(0x03);
        let n = header.encode(&mut buf).unwrap();
        buf[n] = 0xF0;
        buf[n + 1] = 13; // different instance id
        buf[n + 2] = 0x0A;
        buf[n + 3] = nsm_proto::types::CompletionCode::Success as u8;
        buf[n + 4..n + 6].copy_from_slice(&0u16.to_le_bytes());
        buf.truncate(n + 6);

        dispatcher.dispatch(RawFrame { eid: 7, bytes: buf });
        assert_eq!(*handler.0.lock().unwrap(), None);
    }
}
