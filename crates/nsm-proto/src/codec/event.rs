//! Event decoders for C4's three common event shapes plus long-running completion
//! (§4.4). Event frames share the common 4-byte NSM header with `direction = Event`;
//! the event id is the first payload byte, per the dispatcher's `(messageType,
//! eventId)` key (§4.4).

use alloc::string::String;

use crate::codec::require_len;
use crate::header::{NsmHeader, HEADER_LEN};
use crate::types::{CompletionCode, Direction};
use crate::NsmCodecError;

/// Common fields every event frame carries ahead of its shape-specific payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventHeader {
    pub nvidia_message_type: u8,
    pub event_id: u8,
}

fn decode_event_header(buffer: &[u8]) -> Result<EventHeader, NsmCodecError> {
    require_len(buffer, HEADER_LEN + 1)?;
    let header = NsmHeader::decode(buffer)?;
    if header.direction != Direction::Event {
        return Err(NsmCodecError::Data);
    }
    Ok(EventHeader {
        nvidia_message_type: header.nvidia_message_type,
        event_id: buffer[HEADER_LEN],
    })
}

/// XID event payload: `(sequenceNumber, flags, reason, timestampNanos, messageText)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XidEvent {
    pub header: EventHeader,
    pub sequence_number: u32,
    pub flags: u8,
    pub reason: u32,
    pub timestamp_nanos: u64,
    pub message_text: String,
}

const XID_FIXED_LEN: usize = 4 + 1 + 4 + 8;

pub fn decode_xid_event(buffer: &[u8]) -> Result<XidEvent, NsmCodecError> {
    let header = decode_event_header(buffer)?;
    let base = HEADER_LEN + 1;
    require_len(buffer, base + XID_FIXED_LEN)?;
    let sequence_number = u32::from_le_bytes(buffer[base..base + 4].try_into()?);
    let flags = buffer[base + 4];
    let reason = u32::from_le_bytes(buffer[base + 5..base + 9].try_into()?);
    let timestamp_nanos = u64::from_le_bytes(buffer[base + 9..base + 17].try_into()?);
    let message_text = String::from_utf8_lossy(&buffer[base + 17..]).into_owned();
    Ok(XidEvent {
        header,
        sequence_number,
        flags,
        reason,
        timestamp_nanos,
        message_text,
    })
}

/// Reset-required event: state only, no further payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetRequiredEvent {
    pub header: EventHeader,
    pub state: u8,
}

pub fn decode_reset_required_event(buffer: &[u8]) -> Result<ResetRequiredEvent, NsmCodecError> {
    let header = decode_event_header(buffer)?;
    let base = HEADER_LEN + 1;
    require_len(buffer, base + 1)?;
    Ok(ResetRequiredEvent {
        header,
        state: buffer[base],
    })
}

/// Threshold categories bitmask (per-port receive errors, transmit discards,
/// symbol BER, effective BER, estimated effective BER, ... §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThresholdCategories(pub u32);

impl ThresholdCategories {
    pub const PORT_RCV_ERRORS: u32 = 1 << 0;
    pub const TRANSMIT_DISCARDS: u32 = 1 << 1;
    pub const SYMBOL_BER: u32 = 1 << 2;
    pub const EFFECTIVE_BER: u32 = 1 << 3;
    pub const ESTIMATED_EFFECTIVE_BER: u32 = 1 << 4;

    pub fn is_set(&self, category: u32) -> bool {
        self.0 & category != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdEvent {
    pub header: EventHeader,
    pub categories: ThresholdCategories,
}

pub fn decode_threshold_event(buffer: &[u8]) -> Result<ThresholdEvent, NsmCodecError> {
    let header = decode_event_header(buffer)?;
    let base = HEADER_LEN + 1;
    require_len(buffer, base + 4)?;
    let mask = u32::from_le_bytes(buffer[base..base + 4].try_into()?);
    Ok(ThresholdEvent {
        header,
        categories: ThresholdCategories(mask),
    })
}

/// Long-running completion event: decoded structurally like a response envelope,
/// but arriving unsolicited and keyed by `instance_id` rather than correlation table
/// lookup (§4.3 "Long-running flow"). Callers match `instance_id` against the
/// device's recorded accept id and discard mismatches with `Data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongRunningCompletionEvent {
    pub header: EventHeader,
    pub instance_id: u8,
    pub command: u8,
    pub completion_code: CompletionCode,
    pub data_size: u16,
    pub payload_offset: usize,
}

const LONG_RUNNING_COMPLETION_FIXED_LEN: usize = 1 + 1 + 1 + 2;

pub fn decode_long_running_completion_event(
    buffer: &[u8],
) -> Result<LongRunningCompletionEvent, NsmCodecError> {
    let header = decode_event_header(buffer)?;
    let base = HEADER_LEN + 1;
    require_len(buffer, base + LONG_RUNNING_COMPLETION_FIXED_LEN)?;
    let instance_id = buffer[base];
    let command = buffer[base + 1];
    let completion_code = CompletionCode::try_from(buffer[base + 2])?;
    let data_size = u16::from_le_bytes([buffer[base + 3], buffer[base + 4]]);
    Ok(LongRunningCompletionEvent {
        header,
        instance_id,
        command,
        completion_code,
        data_size,
        payload_offset: base + LONG_RUNNING_COMPLETION_FIXED_LEN,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::NsmHeader;

    fn encode_event_header(buffer: &mut [u8], message_type: u8, event_id: u8) -> usize {
        let header = NsmHeader::new_event(message_type);
        let n = header.encode(buffer).unwrap();
        buffer[n] = event_id;
        n + 1
    }

    #[test]
    fn xid_event_round_trip() {
        let mut buf = [0u8; 64];
        let mut offset = encode_event_header(&mut buf, 0x03, 1);
        buf[offset..offset + 4].copy_from_slice(&42u32.to_le_bytes());
        offset += 4;
        buf[offset] = 0x01;
        offset += 1;
        buf[offset..offset + 4].copy_from_slice(&7u32.to_le_bytes());
        offset += 4;
        buf[offset..offset + 8].copy_from_slice(&1_000_000u64.to_le_bytes());
        offset += 8;
        let text = b"GPU fell off the bus";
        buf[offset..offset + text.len()].copy_from_slice(text);
        offset += text.len();

        let event = decode_xid_event(&buf[..offset]).unwrap();
        assert_eq!(event.sequence_number, 42);
        assert_eq!(event.reason, 7);
        assert_eq!(event.timestamp_nanos, 1_000_000);
        assert_eq!(event.message_text, "GPU fell off the bus");
    }

    #[test]
    fn reset_required_event_round_trip() {
        let mut buf = [0u8; 16];
        let mut offset = encode_event_header(&mut buf, 0x03, 2);
        buf[offset] = 1;
        offset += 1;
        let event = decode_reset_required_event(&buf[..offset]).unwrap();
        assert_eq!(event.state, 1);
    }

    #[test]
    fn threshold_event_round_trip() {
        let mut buf = [0u8; 16];
        let mut offset = encode_event_header(&mut buf, 0x01, 3);
        let mask = ThresholdCategories::SYMBOL_BER | ThresholdCategories::TRANSMIT_DISCARDS;
        buf[offset..offset + 4].copy_from_slice(&mask.to_le_bytes());
        offset += 4;
        let event = decode_threshold_event(&buf[..offset]).unwrap();
        assert!(event.categories.is_set(ThresholdCategories::SYMBOL_BER));
        assert!(event.categories.is_set(ThresholdCategories::TRANSMIT_DISCARDS));
        assert!(!event.categories.is_set(ThresholdCategories::PORT_RCV_ERRORS));
    }

    #[test]
    fn long_running_completion_event_round_trip() {
        let mut buf = [0u8; 16];
        let mut offset = encode_event_header(&mut buf, 0x03, 0xF0);
        buf[offset] = 9; // instance id
        buf[offset + 1] = 0x0A; // command
        buf[offset + 2] = CompletionCode::Success as u8;
        buf[offset + 3..offset + 5].copy_from_slice(&0u16.to_le_bytes());
        offset += LONG_RUNNING_COMPLETION_FIXED_LEN;
        let event = decode_long_running_completion_event(&buf[..offset]).unwrap();
        assert_eq!(event.instance_id, 9);
        assert!(event.completion_code.is_success());
    }

    #[test]
    fn event_header_rejects_non_event_direction() {
        let mut buf = [0u8; 16];
        let header = NsmHeader::new_request(1, 0x03);
        let n = header.encode(&mut buf).unwrap();
        buf[n] = 1;
        assert_eq!(decode_reset_required_event(&buf[..n + 1]), Err(NsmCodecError::Data));
    }
}
