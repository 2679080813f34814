//! NSM header and response-envelope framing (§4.1 "Frame shape", §6 "NSM header").
//!
//! Every NSM PDU begins with this 4-byte header. Requests have no further common
//! framing; responses add a 1-byte command code, 1-byte completion code, 2-byte LE
//! data size, and — on non-success completion codes only — a 2-byte LE reason code.

use crate::error::NsmCodecError;
use crate::types::{CompletionCode, Direction, InstanceId, MAX_INSTANCE_ID};

/// Size in bytes of the common NSM header.
pub const HEADER_LEN: usize = 4;
/// Size in bytes of the common response envelope that follows the header
/// (command code + completion code + data size), before payload/reason code.
pub const RESPONSE_ENVELOPE_LEN: usize = 4;
/// Size in bytes of the reason code field present only on non-success responses.
pub const REASON_CODE_LEN: usize = 2;

/// The common 4-byte NSM header shared by every request, response and event frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NsmHeader {
    pub pci_vendor_id: u8,
    pub instance_id: InstanceId,
    pub direction: Direction,
    /// OCP type/version nibble pair, carried through unmodified.
    pub ocp_type_version: u8,
    /// Raw NVIDIA message type byte (command family selector).
    pub nvidia_message_type: u8,
}

impl NsmHeader {
    pub fn new_request(instance_id: InstanceId, nvidia_message_type: u8) -> Self {
        Self {
            pci_vendor_id: crate::types::NSM_PCI_VENDOR_ID,
            instance_id,
            direction: Direction::Request,
            ocp_type_version: 0,
            nvidia_message_type,
        }
    }

    pub fn new_response(instance_id: InstanceId, nvidia_message_type: u8) -> Self {
        Self {
            direction: Direction::Response,
            ..Self::new_request(instance_id, nvidia_message_type)
        }
    }

    pub fn new_event(nvidia_message_type: u8) -> Self {
        Self {
            direction: Direction::Event,
            ..Self::new_request(0, nvidia_message_type)
        }
    }

    /// Encodes the header into `buffer`, returning the number of bytes written.
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, NsmCodecError> {
        if buffer.len() < HEADER_LEN {
            return Err(NsmCodecError::Length);
        }
        if self.instance_id > MAX_INSTANCE_ID {
            return Err(NsmCodecError::Data);
        }
        buffer[0] = self.pci_vendor_id;
        buffer[1] = (self.instance_id & 0x1F) | ((self.direction as u8) << 5);
        buffer[2] = self.ocp_type_version;
        buffer[3] = self.nvidia_message_type;
        Ok(HEADER_LEN)
    }

    /// Decodes a header from the start of `buffer`.
    pub fn decode(buffer: &[u8]) -> Result<Self, NsmCodecError> {
        if buffer.len() < HEADER_LEN {
            return Err(NsmCodecError::Length);
        }
        let direction_bits = (buffer[1] >> 5) & 0x03;
        let direction = Direction::try_from(direction_bits)?;
        Ok(Self {
            pci_vendor_id: buffer[0],
            instance_id: buffer[1] & 0x1F,
            direction,
            ocp_type_version: buffer[2],
            nvidia_message_type: buffer[3],
        })
    }
}

/// The envelope fields common to every response PDU, decoded up to (but not
/// including) the reason code / payload, per the CC-first discipline of §4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseEnvelope {
    pub header: NsmHeader,
    pub command: u8,
    pub completion_code: CompletionCode,
    pub data_size: u16,
    /// Set only when `completion_code` is not `Success`.
    pub reason_code: Option<u16>,
    /// Offset in the original buffer at which the payload (on success) or the
    /// byte immediately past the reason code (on failure) begins.
    pub payload_offset: usize,
}

/// Encodes a request's common header into `buffer`. Callers append the
/// command-specific payload immediately after the returned offset.
pub fn encode_request_header(
    buffer: &mut [u8],
    instance_id: InstanceId,
    nvidia_message_type: u8,
) -> Result<usize, NsmCodecError> {
    NsmHeader::new_request(instance_id, nvidia_message_type).encode(buffer)
}

/// Encodes a success response's header + envelope (command, CC=Success, data_size)
/// into `buffer`. Callers append the command-specific payload and must have already
/// accounted for its length in `payload_len`.
pub fn encode_response_success(
    buffer: &mut [u8],
    instance_id: InstanceId,
    nvidia_message_type: u8,
    command: u8,
    payload_len: u16,
) -> Result<usize, NsmCodecError> {
    if buffer.len() < HEADER_LEN + RESPONSE_ENVELOPE_LEN {
        return Err(NsmCodecError::Length);
    }
    let mut offset = NsmHeader::new_response(instance_id, nvidia_message_type).encode(buffer)?;
    buffer[offset] = command;
    buffer[offset + 1] = CompletionCode::Success as u8;
    buffer[offset + 2..offset + 4].copy_from_slice(&payload_len.to_le_bytes());
    offset += RESPONSE_ENVELOPE_LEN;
    Ok(offset)
}

/// Encodes a failure response (header + envelope + 2-byte reason code, no payload).
pub fn encode_response_failure(
    buffer: &mut [u8],
    instance_id: InstanceId,
    nvidia_message_type: u8,
    command: u8,
    completion_code: CompletionCode,
    reason_code: u16,
) -> Result<usize, NsmCodecError> {
    if completion_code.is_success() {
        return Err(NsmCodecError::Data);
    }
    if buffer.len() < HEADER_LEN + RESPONSE_ENVELOPE_LEN + REASON_CODE_LEN {
        return Err(NsmCodecError::Length);
    }
    let mut offset = NsmHeader::new_response(instance_id, nvidia_message_type).encode(buffer)?;
    buffer[offset] = command;
    buffer[offset + 1] = completion_code as u8;
    buffer[offset + 2..offset + 4].copy_from_slice(&0u16.to_le_bytes());
    offset += RESPONSE_ENVELOPE_LEN;
    buffer[offset..offset + 2].copy_from_slice(&reason_code.to_le_bytes());
    offset += REASON_CODE_LEN;
    Ok(offset)
}

/// Decodes the header + response envelope, extracting CC first per §4.1's
/// "CC and reason-code discipline". On a non-success CC, the reason code is read
/// and `payload_offset` points past it; callers must not attempt to parse further.
pub fn decode_response_envelope(buffer: &[u8]) -> Result<ResponseEnvelope, NsmCodecError> {
    if buffer.len() < HEADER_LEN + RESPONSE_ENVELOPE_LEN {
        return Err(NsmCodecError::Length);
    }
    let header = NsmHeader::decode(buffer)?;
    let command = buffer[HEADER_LEN];
    let completion_code = CompletionCode::try_from(buffer[HEADER_LEN + 1])?;
    let data_size = u16::from_le_bytes([buffer[HEADER_LEN + 2], buffer[HEADER_LEN + 3]]);
    let mut offset = HEADER_LEN + RESPONSE_ENVELOPE_LEN;

    if completion_code.is_success() {
        return Ok(ResponseEnvelope {
            header,
            command,
            completion_code,
            data_size,
            reason_code: None,
            payload_offset: offset,
        });
    }

    if buffer.len() < offset + REASON_CODE_LEN {
        return Err(NsmCodecError::Length);
    }
    let reason_code = u16::from_le_bytes([buffer[offset], buffer[offset + 1]]);
    offset += REASON_CODE_LEN;
    Ok(ResponseEnvelope {
        header,
        command,
        completion_code,
        data_size,
        reason_code: Some(reason_code),
        payload_offset: offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() {
        let header = NsmHeader::new_request(17, 0x03);
        let mut buf = [0u8; HEADER_LEN];
        let n = header.encode(&mut buf).unwrap();
        assert_eq!(n, HEADER_LEN);
        let decoded = NsmHeader::decode(&buf).unwrap();
        assert_eq!(header, decoded);
    }

    #[test]
    fn header_rejects_oversized_instance_id() {
        let header = NsmHeader::new_request(0x20, 0x00);
        let mut buf = [0u8; HEADER_LEN];
        assert_eq!(header.encode(&mut buf), Err(NsmCodecError::Data));
    }

    #[test]
    fn header_rejects_short_buffer() {
        let mut buf = [0u8; 2];
        assert_eq!(
            NsmHeader::new_request(1, 0).encode(&mut buf),
            Err(NsmCodecError::Length)
        );
        assert_eq!(NsmHeader::decode(&buf), Err(NsmCodecError::Length));
    }

    #[test]
    fn success_envelope_round_trip() {
        let mut buf = [0u8; 32];
        let offset = encode_response_success(&mut buf, 3, 0x00, 0x00, 4).unwrap();
        buf[offset..offset + 4].copy_from_slice(&[1, 2, 3, 4]);
        let env = decode_response_envelope(&buf).unwrap();
        assert!(env.completion_code.is_success());
        assert_eq!(env.reason_code, None);
        assert_eq!(env.data_size, 4);
        assert_eq!(&buf[env.payload_offset..env.payload_offset + 4], &[1, 2, 3, 4]);
    }

    #[test]
    fn failure_envelope_carries_no_payload() {
        let mut buf = [0u8; 32];
        let offset = encode_response_failure(
            &mut buf,
            3,
            0x00,
            0x00,
            CompletionCode::ErrNotReady,
            0xBEEF,
        )
        .unwrap();
        assert_eq!(offset, HEADER_LEN + RESPONSE_ENVELOPE_LEN + REASON_CODE_LEN);
        let env = decode_response_envelope(&buf[..offset]).unwrap();
        assert_eq!(env.completion_code, CompletionCode::ErrNotReady);
        assert_eq!(env.reason_code, Some(0xBEEF));
    }

    #[test]
    fn truncated_failure_envelope_is_length_error() {
        let mut buf = [0u8; HEADER_LEN + RESPONSE_ENVELOPE_LEN];
        let header = NsmHeader::new_response(1, 0x00);
        header.encode(&mut buf).unwrap();
        buf[HEADER_LEN] = 0x00;
        buf[HEADER_LEN + 1] = CompletionCode::ErrNotReady as u8;
        assert_eq!(decode_response_envelope(&buf), Err(NsmCodecError::Length));
    }
}
