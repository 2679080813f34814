//! Agent-level error types (§7 "Transport-level", "Async-op level" taxonomies).
//!
//! `nsm-proto::NsmCodecError` stays a plain `Copy` enum because it must remain
//! `no_std`-usable; once a failure crosses into the agent it picks up `String`/
//! `io::Error` context via `thiserror`, the way `adamtc007-ob-poc`'s service
//! boundary layers its errors on top of lower-level plain enums.

use nsm_proto::{Eid, InstanceId, NsmCodecError};
use thiserror::Error;

/// Failures from the transport layer (C2) and request/response handler (C3).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no response from eid {eid} within the retry budget")]
    Timeout { eid: Eid },
    #[error("eid {eid} is offline")]
    Unreachable { eid: Eid },
    #[error("write to MCTP socket failed: {0}")]
    WriteFailure(#[from] std::io::Error),
    #[error("instance id pool for eid {eid} is exhausted")]
    InstanceIdPoolExhausted { eid: Eid },
    #[error("malformed response: {0}")]
    Codec(#[from] NsmCodecError),
    #[error("device returned failure completion code, reason code {reason_code:#06x}")]
    CommandFail { reason_code: u16 },
    #[error("long-running operation on eid {eid} timed out waiting for completion event")]
    LongRunningTimeout { eid: Eid },
    #[error("long-running completion event instance id {got} did not match accepted id {expected}")]
    LongRunningInstanceMismatch { expected: InstanceId, got: InstanceId },
}

/// Failures from the device manager (C5) during discovery/bring-up.
#[derive(Debug, Error)]
pub enum DeviceManagerError {
    #[error("ping failed for eid {eid}: {source}")]
    PingFailed { eid: Eid, #[source] source: TransportError },
    #[error("identification failed for eid {eid}: {source}")]
    IdentificationFailed { eid: Eid, #[source] source: TransportError },
    #[error("no device is registered for eid {eid}")]
    UnknownDevice { eid: Eid },
}

/// Status taxonomy for async set-operations (§3 "Async set-operation result",
/// §4.8 "Error taxonomy").
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AsyncOpError {
    #[error("write failed on the device")]
    WriteFailure,
    #[error("argument out of range")]
    InvalidArgument,
    #[error("async-op result pool exhausted")]
    Unavailable,
    #[error("request unsupported by this device")]
    UnsupportedRequest,
    #[error("internal failure")]
    InternalFailure,
}
