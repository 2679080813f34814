//! Async set-operation manager (C8, §4.8).
//!
//! Grounded on `original_source/nsmd/nsmSetAsync/asyncOperationManager.{hpp,cpp}`:
//! a bounded pool of result objects (default 32) that a PATCH/POST-style caller
//! polls for completion, and a per-object-path dispatcher mapping
//! `(interface, property)` to the handler that performs the write. The
//! original's DBus `set()` method allocates a result object and detaches a
//! coroutine that does the interface/property lookup, throwing if it's
//! missing; here the lookup happens synchronously before a result slot is
//! spent, since failing fast on an unsupported request is cheaper than
//! burning a pool slot on one (a deliberate divergence, recorded in DESIGN.md).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::{error, warn};
use nsm_proto::model::{AsyncOperationStatus, DeviceLifecycle};

use crate::device_manager::Device;
use crate::error::AsyncOpError;
use crate::sensor::{Sensor, SensorContext};

/// Default result-object pool size (§3 "Async set-operation result", "default 32").
pub const DEFAULT_POOL_CAPACITY: usize = 32;

/// One async set-operation's argument, covering the variant types the original
/// DBus `Set` interface accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum AsyncOpValue {
    Bool(bool),
    U8(u8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    F64(f64),
    Str(String),
    Bytes(Vec<u8>),
    Tuple(bool, u32),
}

/// Performs one async set-operation's device-facing write (§4.8 "Handler
/// registration"). Implementations typically wrap a `LongRunningSensor` or a
/// direct `send_recv_nsm_msg` call.
#[async_trait]
pub trait AsyncSetOperationHandler: Send + Sync {
    async fn handle(&self, value: &AsyncOpValue, device: &Arc<Device>) -> Result<(), AsyncOpError>;
}

/// A registered handler plus the sensor to refresh and the device to refresh
/// it on, once the write completes successfully (§4.8, mirrors the original's
/// `AsyncSetOperationInfo`).
pub struct AsyncSetOperationInfo {
    pub handler: Arc<dyn AsyncSetOperationHandler>,
    pub sensor: Option<Arc<Sensor>>,
    pub device: Arc<Device>,
    pub context: SensorContext,
}

struct ResultObject {
    status: AsyncOperationStatus,
    value: Option<AsyncOpValue>,
}

impl ResultObject {
    fn in_progress() -> Self {
        Self {
            status: AsyncOperationStatus::InProgress,
            value: None,
        }
    }
}

/// Bounded, round-robin-reused pool of result objects (§4.8 "bounded pool of
/// result objects"), mirroring `getCurrentObjectCount`'s grow-then-scan
/// allocation: new slots are appended until `capacity` is reached, after which
/// allocation scans forward from the cursor for the first non-`InProgress`
/// slot.
struct ResultPool {
    slots: Vec<ResultObject>,
    cursor: usize,
    capacity: usize,
}

impl ResultPool {
    fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            cursor: 0,
            capacity,
        }
    }

    /// Returns the index of a freshly allocated slot, or `None` if every slot
    /// in a full-capacity pool is still `InProgress` (§4.8 "pool exhausted").
    fn allocate(&mut self) -> Option<usize> {
        if self.slots.len() < self.capacity {
            self.slots.push(ResultObject::in_progress());
            let index = self.slots.len() - 1;
            self.cursor = (index + 1) % self.capacity;
            return Some(index);
        }

        let start = self.cursor;
        loop {
            if self.slots[self.cursor].status != AsyncOperationStatus::InProgress {
                let index = self.cursor;
                self.slots[index] = ResultObject::in_progress();
                self.cursor = (index + 1) % self.capacity;
                return Some(index);
            }
            self.cursor = (self.cursor + 1) % self.capacity;
            if self.cursor == start {
                return None;
            }
        }
    }
}

/// Owns the result-object pool and one dispatcher per object path (C8).
pub struct AsyncOperationManager {
    pool: Mutex<ResultPool>,
    object_path_prefix: String,
    dispatchers: Mutex<HashMap<String, Arc<AsyncSetOperationDispatcher>>>,
}

impl AsyncOperationManager {
    pub fn new(capacity: usize, object_path_prefix: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            pool: Mutex::new(ResultPool::new(capacity)),
            object_path_prefix: object_path_prefix.into(),
            dispatchers: Mutex::new(HashMap::new()),
        })
    }

    /// Returns the dispatcher for `object_path`, creating it on first use
    /// (mirrors `getDispatcher`'s `try_emplace`).
    pub fn dispatcher(self: &Arc<Self>, object_path: &str) -> Arc<AsyncSetOperationDispatcher> {
        self.dispatchers
            .lock()
            .expect("async-op dispatcher map poisoned")
            .entry(object_path.to_string())
            .or_insert_with(|| Arc::new(AsyncSetOperationDispatcher::new(self.clone())))
            .clone()
    }

    fn allocate_result_object(&self) -> Option<(String, usize)> {
        let mut pool = self.pool.lock().expect("async-op pool mutex poisoned");
        let index = pool.allocate()?;
        Some((format!("{}/{}", self.object_path_prefix, index), index))
    }

    fn set_status(&self, index: usize, status: AsyncOperationStatus) {
        let mut pool = self.pool.lock().expect("async-op pool mutex poisoned");
        if let Some(slot) = pool.slots.get_mut(index) {
            slot.status = status;
        }
    }

    /// Reads back the status of a previously returned object path, for a
    /// caller polling completion.
    pub fn status_of(&self, object_path: &str) -> Option<AsyncOperationStatus> {
        let index: usize = object_path.rsplit('/').next()?.parse().ok()?;
        self.pool
            .lock()
            .expect("async-op pool mutex poisoned")
            .slots
            .get(index)
            .map(|slot| slot.status)
    }
}

/// Maps `(interface, property)` to its registered handler and dispatches
/// `set()` calls against it, one instance per object path (§4.8).
pub struct AsyncSetOperationDispatcher {
    manager: Arc<AsyncOperationManager>,
    operations: Mutex<HashMap<String, HashMap<String, AsyncSetOperationInfo>>>,
}

impl AsyncSetOperationDispatcher {
    fn new(manager: Arc<AsyncOperationManager>) -> Self {
        Self {
            manager,
            operations: Mutex::new(HashMap::new()),
        }
    }

    pub fn add_async_set_operation(&self, interface: &str, property: &str, info: AsyncSetOperationInfo) {
        self.operations
            .lock()
            .expect("async-op registry mutex poisoned")
            .entry(interface.to_string())
            .or_default()
            .insert(property.to_string(), info);
    }

    /// Validates the `(interface, property)` pair, allocates a result object,
    /// and spawns the handler as a detached task, returning the object path
    /// immediately (§4.8 "Result is returned via a separate, pollable object").
    pub fn set(self: &Arc<Self>, interface: &str, property: &str, value: AsyncOpValue) -> Result<String, AsyncOpError> {
        let (handler, sensor, device, context) = {
            let operations = self.operations.lock().expect("async-op registry mutex poisoned");
            match operations.get(interface).and_then(|props| props.get(property)) {
                Some(info) => (
                    info.handler.clone(),
                    info.sensor.clone(),
                    info.device.clone(),
                    info.context.clone(),
                ),
                None => {
                    warn!("AsyncSet request property {property} not found for interface {interface}");
                    return Err(AsyncOpError::UnsupportedRequest);
                }
            }
        };

        let Some((object_path, index)) = self.manager.allocate_result_object() else {
            error!("AsyncOperationManager: no available result object to allocate for the request");
            return Err(AsyncOpError::Unavailable);
        };

        let manager = self.manager.clone();
        tokio::spawn(async move {
            let status = match handler.handle(&value, &device).await {
                Ok(()) => AsyncOperationStatus::Success,
                Err(AsyncOpError::WriteFailure) => AsyncOperationStatus::WriteFailure,
                Err(AsyncOpError::InvalidArgument) => AsyncOperationStatus::InvalidArgument,
                Err(AsyncOpError::Unavailable) => AsyncOperationStatus::Unavailable,
                Err(AsyncOpError::UnsupportedRequest) => AsyncOperationStatus::UnsupportedRequest,
                Err(AsyncOpError::InternalFailure) => AsyncOperationStatus::InternalFailure,
            };

            if status == AsyncOperationStatus::Success {
                if let Some(sensor) = &sensor {
                    let is_active = matches!(
                        *device.lifecycle.lock().expect("device lifecycle mutex poisoned"),
                        DeviceLifecycle::ActiveOnline
                    );
                    if is_active {
                        sensor.update(&context).await;
                    }
                }
            }

            manager.set_status(index, status);
        });

        Ok(object_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_grows_then_round_robins_once_full() {
        let mut pool = ResultPool::new(2);
        let a = pool.allocate().unwrap();
        let b = pool.allocate().unwrap();
        assert_ne!(a, b);
        // Both slots are still InProgress, so the pool is exhausted.
        assert!(pool.allocate().is_none());

        pool.slots[a].status = AsyncOperationStatus::Success;
        let c = pool.allocate().unwrap();
        assert_eq!(c, a, "the completed slot should be reused first");
    }

    #[test]
    fn pool_reports_exhaustion_when_nothing_has_completed() {
        let mut pool = ResultPool::new(1);
        assert!(pool.allocate().is_some());
        assert!(pool.allocate().is_none());
    }
}
