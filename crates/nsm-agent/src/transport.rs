//! MCTP socket transport (C2, §4.2).
//!
//! Owns the connected `AF_UNIX`/`SOCK_SEQPACKET` socket to the local MCTP demux
//! process, a per-destination instance-id pool, and a correlation table keyed by
//! `(Eid, InstanceId)`. Modeled on the teacher's `SdoClientConnection`/
//! `SdoClientManager` retry/deadline bookkeeping (`sdo/client_connection.rs`,
//! `sdo/client_manager.rs`), rebuilt on `tokio::sync::oneshot` instead of a
//! hand-rolled coroutine handle since the agent runs on a real async runtime.
//!
//! This repo does not speak MCTP itself (per spec.md §1 Non-goals); the 3-byte
//! frame prefix below is the local convention this socket uses to address a
//! specific endpoint through the demux, not the real MCTP wire transport header.

use std::collections::{HashMap, VecDeque};
use std::io::{IoSlice, Read};
use std::os::unix::net::UnixStream as StdUnixStream;
use std::sync::Mutex;
use std::time::Duration;

use log::{debug, trace, warn};
use nsm_proto::header::NsmHeader;
use nsm_proto::types::{Direction, Eid, InstanceId, MAX_INSTANCE_ID, MCTP_MSG_TYPE_VDM};
use socket2::{Domain, SockAddr, Socket, Type};
use tokio::io::unix::AsyncFd;
use tokio::sync::{mpsc, oneshot};

use crate::error::TransportError;

/// Byte prefix length before the NSM PDU on the local demux socket: `[tag, eid, mctp_type]`.
pub const FRAME_PREFIX_LEN: usize = 3;
/// Set on the tag byte of outgoing requests/events; clear on responses (§6 "MCTP framing").
pub const TAG_OWNER_BIT: u8 = 0x80;
/// One-time emulator handshake byte sent on connect, ahead of the VDM type + local EID.
const EMULATOR_HELLO_BYTE: u8 = 0xFF;
/// Large enough for any NSM PDU this agent encodes or expects to receive.
const MAX_FRAME_LEN: usize = 4096;

/// A fully framed, not-yet-interpreted message read off the socket: the remote
/// endpoint it came from plus the NSM PDU bytes (prefix already stripped).
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub eid: Eid,
    pub bytes: Vec<u8>,
}

/// Round-robin allocator over the 5-bit instance-id namespace for one destination
/// (§4.2 "Instance-id allocation").
struct InstanceIdPool {
    free: VecDeque<InstanceId>,
}

impl InstanceIdPool {
    fn new() -> Self {
        Self {
            free: (0..=MAX_INSTANCE_ID).collect(),
        }
    }

    fn alloc(&mut self) -> Option<InstanceId> {
        self.free.pop_front()
    }

    fn release(&mut self, id: InstanceId) {
        debug_assert!(!self.free.contains(&id), "instance id {id} released twice");
        self.free.push_back(id);
    }
}

struct PendingRequest {
    responder: oneshot::Sender<Vec<u8>>,
}

struct TransportState {
    instance_pools: HashMap<Eid, InstanceIdPool>,
    pending: HashMap<(Eid, InstanceId), PendingRequest>,
}

/// Owns the MCTP demux socket and drives the send/receive/correlate machinery
/// described in spec.md §4.2.
pub struct MctpTransport {
    fd: AsyncFd<Socket>,
    local_eid: Eid,
    state: Mutex<TransportState>,
    /// Unsolicited frames (no matching pending record) are forwarded here for C4.
    event_tx: mpsc::UnboundedSender<RawFrame>,
}

impl MctpTransport {
    /// Connects to the MCTP demux at `socket_path` (an abstract-namespace path is
    /// written with a leading NUL, per §6), performs the one-time emulator
    /// handshake, and spawns the background receive loop.
    pub fn connect(
        socket_path: &str,
        local_eid: Eid,
        event_tx: mpsc::UnboundedSender<RawFrame>,
    ) -> std::io::Result<std::sync::Arc<Self>> {
        let socket = Socket::new(Domain::UNIX, Type::SEQPACKET, None)?;
        let addr = unix_socket_address(socket_path)?;
        socket.connect(&addr)?;
        socket.set_nonblocking(true)?;

        // One-time emulator handshake: 0xFF, then the VDM type, then our local EID.
        socket.send(&[EMULATOR_HELLO_BYTE, MCTP_MSG_TYPE_VDM, local_eid])?;

        Self::from_connected_socket(socket, local_eid, event_tx)
    }

    /// Wraps an already-connected socket (no handshake performed), and spawns the
    /// background receive loop. Used by `connect` above and by tests that drive a
    /// loopback pair in place of a real MCTP demux process.
    pub fn from_connected_socket(
        socket: Socket,
        local_eid: Eid,
        event_tx: mpsc::UnboundedSender<RawFrame>,
    ) -> std::io::Result<std::sync::Arc<Self>> {
        socket.set_nonblocking(true)?;
        let transport = std::sync::Arc::new(Self {
            fd: AsyncFd::new(socket)?,
            local_eid,
            state: Mutex::new(TransportState {
                instance_pools: HashMap::new(),
                pending: HashMap::new(),
            }),
            event_tx,
        });

        let reader = transport.clone();
        tokio::spawn(async move {
            reader.receive_loop().await;
        });

        Ok(transport)
    }

    /// Reserves the next free instance id for `eid`. Released automatically by
    /// `send_recv` on every exit path (§4.2 "Ids return to the pool on response,
    /// timeout, or cancellation").
    pub fn alloc_instance_id(&self, eid: Eid) -> Result<InstanceId, TransportError> {
        let mut state = self.state.lock().expect("transport state mutex poisoned");
        state
            .instance_pools
            .entry(eid)
            .or_insert_with(InstanceIdPool::new)
            .alloc()
            .ok_or(TransportError::InstanceIdPoolExhausted { eid })
    }

    fn release_instance_id(&self, eid: Eid, id: InstanceId) {
        let mut state = self.state.lock().expect("transport state mutex poisoned");
        if let Some(pool) = state.instance_pools.get_mut(&eid) {
            pool.release(id);
        }
    }

    /// Sends `request` (already encoded with `instance_id`) to `eid` and awaits
    /// the matching response, retrying up to `retries` times on timeout using the
    /// same instance id each attempt (§4.2 "Retries and timeouts"). A late
    /// response from a discarded attempt finds no pending record on arrival and
    /// is offered to the event dispatcher instead, per the transport invariant in
    /// spec.md §8.
    pub async fn send_recv(
        &self,
        eid: Eid,
        instance_id: InstanceId,
        request: &[u8],
        timeout: Duration,
        retries: u32,
    ) -> Result<Vec<u8>, TransportError> {
        for attempt in 0..=retries {
            let (tx, rx) = oneshot::channel();
            {
                let mut state = self.state.lock().expect("transport state mutex poisoned");
                state
                    .pending
                    .insert((eid, instance_id), PendingRequest { responder: tx });
            }

            if let Err(err) = self.write_frame(eid, instance_id, request, attempt == 0).await {
                self.state
                    .lock()
                    .expect("transport state mutex poisoned")
                    .pending
                    .remove(&(eid, instance_id));
                self.release_instance_id(eid, instance_id);
                return Err(TransportError::WriteFailure(err));
            }

            match tokio::time::timeout(timeout, rx).await {
                Ok(Ok(bytes)) => {
                    self.release_instance_id(eid, instance_id);
                    return Ok(bytes);
                }
                Ok(Err(_sender_dropped)) => {
                    // The device went offline mid-flight; see `fail_all_for_eid`.
                    self.release_instance_id(eid, instance_id);
                    return Err(TransportError::Unreachable { eid });
                }
                Err(_elapsed) => {
                    self.state
                        .lock()
                        .expect("transport state mutex poisoned")
                        .pending
                        .remove(&(eid, instance_id));
                    if attempt == retries {
                        self.release_instance_id(eid, instance_id);
                        warn!(
                            "eid {eid} instance {instance_id} exhausted {retries} retries, giving up"
                        );
                        return Err(TransportError::Timeout { eid });
                    }
                    debug!(
                        "eid {eid} instance {instance_id} timed out, retrying (attempt {}/{retries})",
                        attempt + 1
                    );
                }
            }
        }
        unreachable!("loop always returns by the final attempt")
    }

    /// Fails every outstanding request to `eid` with `Unreachable`, resuming their
    /// continuations so awaiting coroutines can unwind (§5 "Cancellation").
    pub fn fail_all_for_eid(&self, eid: Eid) {
        let mut state = self.state.lock().expect("transport state mutex poisoned");
        let keys: Vec<_> = state
            .pending
            .keys()
            .filter(|(pending_eid, _)| *pending_eid == eid)
            .cloned()
            .collect();
        for key in keys {
            if let Some(pending) = state.pending.remove(&key) {
                // Dropping the sender resolves the awaiting `rx` with an error,
                // which `send_recv` maps to `Unreachable`.
                drop(pending.responder);
            }
        }
    }

    async fn write_frame(
        &self,
        eid: Eid,
        instance_id: InstanceId,
        payload: &[u8],
        is_request: bool,
    ) -> std::io::Result<()> {
        let tag_byte = if is_request {
            TAG_OWNER_BIT | (instance_id & 0x7F)
        } else {
            instance_id & 0x7F
        };
        let prefix = [tag_byte, eid, MCTP_MSG_TYPE_VDM];
        loop {
            let mut guard = self.fd.writable().await?;
            let bufs = [IoSlice::new(&prefix), IoSlice::new(payload)];
            match guard.try_io(|inner| inner.get_ref().send_vectored(&bufs)) {
                Ok(result) => return result.map(|_| ()),
                Err(_would_block) => continue,
            }
        }
    }

    async fn receive_loop(self: std::sync::Arc<Self>) {
        loop {
            match self.read_frame().await {
                Ok(Some(frame)) => self.dispatch_received(frame),
                Ok(None) => {
                    warn!("MCTP demux socket closed, receive loop exiting");
                    return;
                }
                Err(err) => {
                    warn!("MCTP demux socket read error: {err}, receive loop exiting");
                    return;
                }
            }
        }
    }

    async fn read_frame(&self) -> std::io::Result<Option<RawFrame>> {
        loop {
            let mut guard = self.fd.readable().await?;
            let mut buf = vec![0u8; MAX_FRAME_LEN];
            match guard.try_io(|inner| inner.get_ref().read(&mut buf)) {
                Ok(Ok(0)) => return Ok(None),
                Ok(Ok(n)) => {
                    buf.truncate(n);
                    return Ok(parse_frame(&buf));
                }
                Ok(Err(err)) => return Err(err),
                Err(_would_block) => continue,
            }
        }
    }

    fn dispatch_received(&self, frame: RawFrame) {
        let Ok(header) = NsmHeader::decode(&frame.bytes) else {
            trace!("dropping frame from eid {}: unparseable NSM header", frame.eid);
            return;
        };

        if header.direction == Direction::Response {
            let mut state = self.state.lock().expect("transport state mutex poisoned");
            if let Some(pending) = state.pending.remove(&(frame.eid, header.instance_id)) {
                let _ = pending.responder.send(frame.bytes);
                return;
            }
            drop(state);
            trace!(
                "no pending request for eid {} instance {}, offering frame to event dispatcher",
                frame.eid, header.instance_id
            );
        }

        if self.event_tx.send(frame).is_err() {
            trace!("event dispatcher channel closed, dropping frame");
        }
    }

    pub fn local_eid(&self) -> Eid {
        self.local_eid
    }
}

/// Builds a `SockAddr` for `path`, treating a leading NUL byte as the Linux
/// abstract-namespace convention (§6 "an abstract-namespace path").
fn unix_socket_address(path: &str) -> std::io::Result<SockAddr> {
    if let Some(stripped) = path.strip_prefix('\0') {
        SockAddr::unix(format!("\0{stripped}"))
    } else {
        SockAddr::unix(path)
    }
}

fn parse_frame(buf: &[u8]) -> Option<RawFrame> {
    if buf.len() < FRAME_PREFIX_LEN {
        return None;
    }
    let eid = buf[1];
    let mctp_type = buf[2];
    if mctp_type != MCTP_MSG_TYPE_VDM {
        return None;
    }
    Some(RawFrame {
        eid,
        bytes: buf[FRAME_PREFIX_LEN..].to_vec(),
    })
}

/// A loopback pair usable from tests without a real MCTP demux process, standing
/// in for the out-of-scope "CLI mockup responder" (SPEC_FULL.md §2 "Test
/// tooling").
#[cfg(any(test, feature = "test-util"))]
pub fn loopback_pair() -> std::io::Result<(StdUnixStream, StdUnixStream)> {
    StdUnixStream::pair()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_id_pool_round_trips_without_duplicates() {
        let mut pool = InstanceIdPool::new();
        let a = pool.alloc().unwrap();
        let b = pool.alloc().unwrap();
        assert_ne!(a, b);
        pool.release(a);
        let c = pool.alloc().unwrap();
        assert_eq!(a, c);
    }

    #[test]
    fn instance_id_pool_exhausts_after_32_allocations() {
        let mut pool = InstanceIdPool::new();
        for _ in 0..=MAX_INSTANCE_ID {
            assert!(pool.alloc().is_some());
        }
        assert!(pool.alloc().is_none());
    }

    #[test]
    fn parse_frame_rejects_non_vdm_type() {
        let buf = [0x80, 5, 0x00, 1, 2, 3];
        assert!(parse_frame(&buf).is_none());
    }

    #[test]
    fn parse_frame_strips_prefix() {
        let buf = [0x80, 5, MCTP_MSG_TYPE_VDM, 1, 2, 3];
        let frame = parse_frame(&buf).unwrap();
        assert_eq!(frame.eid, 5);
        assert_eq!(frame.bytes, vec![1, 2, 3]);
    }
}
