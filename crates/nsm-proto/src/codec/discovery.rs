//! Device-capability-discovery command family (message type 0x00).
//!
//! Covers: ping, supported-message-types, supported-command-codes,
//! query-device-identification, event-subscription, current-event-sources,
//! configure-event-ack (§6 "Command families used").

use crate::codec::{require_exact_len, require_len};
use crate::header::{
    decode_response_envelope, encode_request_header, encode_response_failure,
    encode_response_success, HEADER_LEN,
};
use crate::types::{discovery_cmd, CompletionCode, DeviceType, InstanceId, MessageType, NUM_COMMAND_CODES};
use crate::NsmCodecError;

const MSG_TYPE: u8 = MessageType::DeviceCapabilityDiscovery as u8;

// --- Ping ---

/// Ping carries no payload in either direction.
pub fn encode_ping_req(instance_id: InstanceId, buffer: &mut [u8]) -> Result<usize, NsmCodecError> {
    encode_request_header(buffer, instance_id, MSG_TYPE)
}

pub fn decode_ping_req(buffer: &[u8]) -> Result<InstanceId, NsmCodecError> {
    require_exact_len(buffer, HEADER_LEN)?;
    let header = crate::header::NsmHeader::decode(buffer)?;
    Ok(header.instance_id)
}

pub fn encode_ping_resp(
    instance_id: InstanceId,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    encode_response_success(buffer, instance_id, MSG_TYPE, discovery_cmd::PING, 0)
}

pub fn decode_ping_resp(buffer: &[u8]) -> Result<(), NsmCodecError> {
    let env = decode_response_envelope(buffer)?;
    if let Some(reason_code) = env.reason_code {
        return Err(NsmCodecError::CommandFail { reason_code });
    }
    Ok(())
}

// --- GetSupportedNvidiaMessageTypes ---

pub fn encode_get_supported_message_types_req(
    instance_id: InstanceId,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    encode_request_header(buffer, instance_id, MSG_TYPE)
}

/// A bitmask over the NVIDIA message type byte space, one bit per supported family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SupportedMessageTypes(pub u8);

impl SupportedMessageTypes {
    pub fn supports(&self, message_type: MessageType) -> bool {
        self.0 & (1 << (message_type as u8)) != 0
    }

    pub fn set(&mut self, message_type: MessageType) {
        self.0 |= 1 << (message_type as u8);
    }
}

pub fn encode_get_supported_message_types_resp(
    instance_id: InstanceId,
    supported: SupportedMessageTypes,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_response_success(
        buffer,
        instance_id,
        MSG_TYPE,
        discovery_cmd::GET_SUPPORTED_NVIDIA_MESSAGE_TYPES,
        1,
    )?;
    require_len(buffer, offset + 1)?;
    buffer[offset] = supported.0;
    Ok(offset + 1)
}

pub fn decode_get_supported_message_types_resp(
    buffer: &[u8],
) -> Result<SupportedMessageTypes, NsmCodecError> {
    let env = decode_response_envelope(buffer)?;
    if let Some(reason_code) = env.reason_code {
        return Err(NsmCodecError::CommandFail { reason_code });
    }
    if env.data_size < 1 {
        return Err(NsmCodecError::Data);
    }
    require_len(buffer, env.payload_offset + 1)?;
    Ok(SupportedMessageTypes(buffer[env.payload_offset]))
}

// --- GetSupportedCommandCodes ---

pub fn encode_get_supported_command_codes_req(
    instance_id: InstanceId,
    message_type: u8,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_request_header(buffer, instance_id, MSG_TYPE)?;
    require_len(buffer, offset + 1)?;
    buffer[offset] = message_type;
    Ok(offset + 1)
}

pub fn decode_get_supported_command_codes_req(buffer: &[u8]) -> Result<u8, NsmCodecError> {
    require_len(buffer, HEADER_LEN + 1)?;
    Ok(buffer[HEADER_LEN])
}

/// A 256-bit (32 byte) bitmask of supported command codes for one message type.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SupportedCommandCodes(pub [u8; NUM_COMMAND_CODES / 8]);

impl core::fmt::Debug for SupportedCommandCodes {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "SupportedCommandCodes({} bytes)", self.0.len())
    }
}

impl Default for SupportedCommandCodes {
    fn default() -> Self {
        Self([0u8; NUM_COMMAND_CODES / 8])
    }
}

impl SupportedCommandCodes {
    pub fn supports(&self, command_code: u8) -> bool {
        let byte = command_code / 8;
        let bit = command_code % 8;
        self.0[byte as usize] & (1 << bit) != 0
    }

    pub fn set(&mut self, command_code: u8) {
        let byte = command_code / 8;
        let bit = command_code % 8;
        self.0[byte as usize] |= 1 << bit;
    }
}

pub fn encode_get_supported_command_codes_resp(
    instance_id: InstanceId,
    codes: &SupportedCommandCodes,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let payload_len = codes.0.len();
    let offset = encode_response_success(
        buffer,
        instance_id,
        MSG_TYPE,
        discovery_cmd::GET_SUPPORTED_COMMAND_CODES,
        payload_len as u16,
    )?;
    require_len(buffer, offset + payload_len)?;
    buffer[offset..offset + payload_len].copy_from_slice(&codes.0);
    Ok(offset + payload_len)
}

pub fn decode_get_supported_command_codes_resp(
    buffer: &[u8],
) -> Result<SupportedCommandCodes, NsmCodecError> {
    let env = decode_response_envelope(buffer)?;
    if let Some(reason_code) = env.reason_code {
        return Err(NsmCodecError::CommandFail { reason_code });
    }
    let payload_len = NUM_COMMAND_CODES / 8;
    if (env.data_size as usize) < payload_len {
        return Err(NsmCodecError::Data);
    }
    require_len(buffer, env.payload_offset + payload_len)?;
    let mut codes = SupportedCommandCodes::default();
    codes
        .0
        .copy_from_slice(&buffer[env.payload_offset..env.payload_offset + payload_len]);
    Ok(codes)
}

// --- QueryDeviceIdentification ---

pub fn encode_query_device_identification_req(
    instance_id: InstanceId,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    encode_request_header(buffer, instance_id, MSG_TYPE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceIdentification {
    pub device_type: DeviceType,
    pub instance_number: u8,
}

pub fn encode_query_device_identification_resp(
    instance_id: InstanceId,
    identification: DeviceIdentification,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_response_success(
        buffer,
        instance_id,
        MSG_TYPE,
        discovery_cmd::QUERY_DEVICE_IDENTIFICATION,
        2,
    )?;
    require_len(buffer, offset + 2)?;
    buffer[offset] = identification.device_type as u8;
    buffer[offset + 1] = identification.instance_number;
    Ok(offset + 2)
}

pub fn decode_query_device_identification_resp(
    buffer: &[u8],
) -> Result<DeviceIdentification, NsmCodecError> {
    let env = decode_response_envelope(buffer)?;
    if let Some(reason_code) = env.reason_code {
        return Err(NsmCodecError::CommandFail { reason_code });
    }
    if env.data_size < 2 {
        return Err(NsmCodecError::Data);
    }
    require_len(buffer, env.payload_offset + 2)?;
    Ok(DeviceIdentification {
        device_type: DeviceType::from(buffer[env.payload_offset]),
        instance_number: buffer[env.payload_offset + 1],
    })
}

// --- EventSubscribe / ConfigureEventAcknowledgement ---

pub fn encode_event_subscribe_req(
    instance_id: InstanceId,
    message_type: u8,
    event_id: u8,
    enable: bool,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_request_header(buffer, instance_id, MSG_TYPE)?;
    require_len(buffer, offset + 3)?;
    buffer[offset] = message_type;
    buffer[offset + 1] = event_id;
    buffer[offset + 2] = enable as u8;
    Ok(offset + 3)
}

pub fn decode_event_subscribe_req(buffer: &[u8]) -> Result<(u8, u8, bool), NsmCodecError> {
    require_len(buffer, HEADER_LEN + 3)?;
    Ok((
        buffer[HEADER_LEN],
        buffer[HEADER_LEN + 1],
        buffer[HEADER_LEN + 2] != 0,
    ))
}

pub fn encode_event_subscribe_resp(
    instance_id: InstanceId,
    result: Result<(), CompletionCode>,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    match result {
        Ok(()) => encode_response_success(
            buffer,
            instance_id,
            MSG_TYPE,
            discovery_cmd::EVENT_SUBSCRIBE,
            0,
        ),
        Err(cc) => encode_response_failure(
            buffer,
            instance_id,
            MSG_TYPE,
            discovery_cmd::EVENT_SUBSCRIBE,
            cc,
            0,
        ),
    }
}

pub fn decode_event_subscribe_resp(buffer: &[u8]) -> Result<(), NsmCodecError> {
    let env = decode_response_envelope(buffer)?;
    if let Some(reason_code) = env.reason_code {
        return Err(NsmCodecError::CommandFail { reason_code });
    }
    Ok(())
}

/// Maximum (message type, event id) pairs reported by `GetCurrentEventSources`.
pub const MAX_EVENT_SOURCES: usize = 16;

pub fn encode_get_current_event_sources_req(
    instance_id: InstanceId,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    encode_request_header(buffer, instance_id, MSG_TYPE)
}

pub fn encode_get_current_event_sources_resp(
    instance_id: InstanceId,
    sources: &[(u8, u8)],
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    if sources.len() > MAX_EVENT_SOURCES {
        return Err(NsmCodecError::Data);
    }
    let payload_len = 1 + sources.len() * 2;
    let offset = encode_response_success(
        buffer,
        instance_id,
        MSG_TYPE,
        discovery_cmd::GET_CURRENT_EVENT_SOURCES,
        payload_len as u16,
    )?;
    require_len(buffer, offset + payload_len)?;
    buffer[offset] = sources.len() as u8;
    for (i, (mt, eid)) in sources.iter().enumerate() {
        buffer[offset + 1 + i * 2] = *mt;
        buffer[offset + 1 + i * 2 + 1] = *eid;
    }
    Ok(offset + payload_len)
}

pub fn decode_get_current_event_sources_resp(
    buffer: &[u8],
    out: &mut [(u8, u8); MAX_EVENT_SOURCES],
) -> Result<usize, NsmCodecError> {
    let env = decode_response_envelope(buffer)?;
    if let Some(reason_code) = env.reason_code {
        return Err(NsmCodecError::CommandFail { reason_code });
    }
    require_len(buffer, env.payload_offset + 1)?;
    let count = buffer[env.payload_offset] as usize;
    if count > MAX_EVENT_SOURCES {
        return Err(NsmCodecError::Data);
    }
    require_len(buffer, env.payload_offset + 1 + count * 2)?;
    for i in 0..count {
        let base = env.payload_offset + 1 + i * 2;
        out[i] = (buffer[base], buffer[base + 1]);
    }
    Ok(count)
}

// --- ConfigureEventAcknowledgement ---

/// Per-source acknowledgement-mode toggle: `(message_type, event_id, ack_enabled)`.
pub fn encode_configure_event_acknowledgement_req(
    instance_id: InstanceId,
    message_type: u8,
    event_id: u8,
    ack_enabled: bool,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_request_header(buffer, instance_id, MSG_TYPE)?;
    require_len(buffer, offset + 3)?;
    buffer[offset] = message_type;
    buffer[offset + 1] = event_id;
    buffer[offset + 2] = ack_enabled as u8;
    Ok(offset + 3)
}

pub fn decode_configure_event_acknowledgement_req(
    buffer: &[u8],
) -> Result<(u8, u8, bool), NsmCodecError> {
    require_exact_len(buffer, HEADER_LEN + 3)?;
    Ok((
        buffer[HEADER_LEN],
        buffer[HEADER_LEN + 1],
        buffer[HEADER_LEN + 2] != 0,
    ))
}

pub fn encode_configure_event_acknowledgement_resp(
    instance_id: InstanceId,
    result: Result<(), CompletionCode>,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    match result {
        Ok(()) => encode_response_success(
            buffer,
            instance_id,
            MSG_TYPE,
            discovery_cmd::CONFIGURE_EVENT_ACKNOWLEDGEMENT,
            0,
        ),
        Err(cc) => encode_response_failure(
            buffer,
            instance_id,
            MSG_TYPE,
            discovery_cmd::CONFIGURE_EVENT_ACKNOWLEDGEMENT,
            cc,
            0,
        ),
    }
}

pub fn decode_configure_event_acknowledgement_resp(buffer: &[u8]) -> Result<(), NsmCodecError> {
    let env = decode_response_envelope(buffer)?;
    if let Some(reason_code) = env.reason_code {
        return Err(NsmCodecError::CommandFail { reason_code });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_round_trip() {
        let mut buf = [0u8; 16];
        let n = encode_ping_req(5, &mut buf).unwrap();
        assert_eq!(decode_ping_req(&buf[..n]).unwrap(), 5);

        let mut resp = [0u8; 16];
        let n = encode_ping_resp(5, &mut resp).unwrap();
        decode_ping_resp(&resp[..n]).unwrap();
    }

    #[test]
    fn ping_resp_failure_carries_reason_code() {
        let mut resp = [0u8; 16];
        let n =
            encode_response_failure(&mut resp, 1, MSG_TYPE, discovery_cmd::PING, CompletionCode::ErrNotReady, 42)
                .unwrap();
        let err = decode_ping_resp(&resp[..n]).unwrap_err();
        assert_eq!(err, NsmCodecError::CommandFail { reason_code: 42 });
    }

    #[test]
    fn device_identification_round_trip() {
        let ident = DeviceIdentification {
            device_type: DeviceType::Gpu,
            instance_number: 0,
        };
        let mut buf = [0u8; 16];
        let n = encode_query_device_identification_resp(1, ident, &mut buf).unwrap();
        let decoded = decode_query_device_identification_resp(&buf[..n]).unwrap();
        assert_eq!(decoded, ident);
    }

    #[test]
    fn supported_command_codes_bit_accessors() {
        let mut codes = SupportedCommandCodes::default();
        codes.set(0x03);
        codes.set(200);
        assert!(codes.supports(0x03));
        assert!(codes.supports(200));
        assert!(!codes.supports(1));

        let mut buf = [0u8; 64];
        let n = encode_get_supported_command_codes_resp(2, &codes, &mut buf).unwrap();
        let decoded = decode_get_supported_command_codes_resp(&buf[..n]).unwrap();
        assert_eq!(decoded, codes);
    }

    #[test]
    fn event_sources_round_trip() {
        let sources = [(0x03, 1), (0x04, 2)];
        let mut buf = [0u8; 64];
        let n = encode_get_current_event_sources_resp(1, &sources, &mut buf).unwrap();
        let mut out = [(0u8, 0u8); MAX_EVENT_SOURCES];
        let count = decode_get_current_event_sources_resp(&buf[..n], &mut out).unwrap();
        assert_eq!(count, 2);
        assert_eq!(&out[..2], &sources[..]);
    }

    #[test]
    fn configure_event_acknowledgement_round_trip() {
        let mut req = [0u8; 16];
        let n = encode_configure_event_acknowledgement_req(1, 0x03, 5, true, &mut req).unwrap();
        assert_eq!(
            decode_configure_event_acknowledgement_req(&req[..n]).unwrap(),
            (0x03, 5, true)
        );

        let mut resp = [0u8; 16];
        let n = encode_configure_event_acknowledgement_resp(1, Ok(()), &mut resp).unwrap();
        decode_configure_event_acknowledgement_resp(&resp[..n]).unwrap();

        let mut failure = [0u8; 16];
        let n = encode_configure_event_acknowledgement_resp(
            1,
            Err(CompletionCode::ErrNotSupported),
            &mut failure,
        )
        .unwrap();
        assert!(decode_configure_event_acknowledgement_resp(&failure[..n]).is_err());
    }

    #[test]
    fn truncated_supported_command_codes_is_data_error() {
        let mut buf = [0u8; 64];
        let codes = SupportedCommandCodes::default();
        let n = encode_get_supported_command_codes_resp(1, &codes, &mut buf).unwrap();
        let err = decode_get_supported_command_codes_resp(&buf[..n - 1]).unwrap_err();
        assert!(matches!(err, NsmCodecError::Data | NsmCodecError::Length));
    }
}
