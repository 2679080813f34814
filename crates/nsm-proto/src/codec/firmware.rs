//! Firmware/security command family (message type 0x06).
//!
//! Covers: query ERoT state parameters, firmware security version query/update,
//! irreversible-config request (§6).

use crate::codec::{require_exact_len, require_len};
use crate::header::{decode_response_envelope, encode_request_header, encode_response_success, HEADER_LEN};
use crate::types::{firmware_cmd, MessageType};
use crate::InstanceId;
use crate::NsmCodecError;

const MSG_TYPE: u8 = MessageType::Firmware as u8;

// --- QueryErotStateParameters ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ErotStateParameters {
    pub active_slot: u8,
    pub firmware_version: [u8; 4],
    pub recovery_count: u8,
}

pub fn encode_query_erot_state_parameters_req(
    instance_id: InstanceId,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    encode_request_header(buffer, instance_id, MSG_TYPE)
}

pub fn encode_query_erot_state_parameters_resp(
    instance_id: InstanceId,
    params: ErotStateParameters,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_response_success(
        buffer,
        instance_id,
        MSG_TYPE,
        firmware_cmd::QUERY_EROT_STATE_PARAMETERS,
        6,
    )?;
    require_len(buffer, offset + 6)?;
    buffer[offset] = params.active_slot;
    buffer[offset + 1..offset + 5].copy_from_slice(&params.firmware_version);
    buffer[offset + 5] = params.recovery_count;
    Ok(offset + 6)
}

pub fn decode_query_erot_state_parameters_resp(
    buffer: &[u8],
) -> Result<ErotStateParameters, NsmCodecError> {
    let env = decode_response_envelope(buffer)?;
    if let Some(reason_code) = env.reason_code {
        return Err(NsmCodecError::CommandFail { reason_code });
    }
    if env.data_size < 6 {
        return Err(NsmCodecError::Data);
    }
    require_len(buffer, env.payload_offset + 6)?;
    let base = env.payload_offset;
    Ok(ErotStateParameters {
        active_slot: buffer[base],
        firmware_version: buffer[base + 1..base + 5].try_into()?,
        recovery_count: buffer[base + 5],
    })
}

// --- QueryFirmwareSecurityVersion ---

pub fn encode_query_firmware_security_version_req(
    instance_id: InstanceId,
    component_id: u8,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_request_header(buffer, instance_id, MSG_TYPE)?;
    require_len(buffer, offset + 1)?;
    buffer[offset] = component_id;
    Ok(offset + 1)
}

pub fn decode_query_firmware_security_version_req(buffer: &[u8]) -> Result<u8, NsmCodecError> {
    require_exact_len(buffer, HEADER_LEN + 1)?;
    Ok(buffer[HEADER_LEN])
}

pub fn encode_query_firmware_security_version_resp(
    instance_id: InstanceId,
    security_version: u16,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_response_success(
        buffer,
        instance_id,
        MSG_TYPE,
        firmware_cmd::QUERY_FIRMWARE_SECURITY_VERSION,
        2,
    )?;
    require_len(buffer, offset + 2)?;
    buffer[offset..offset + 2].copy_from_slice(&security_version.to_le_bytes());
    Ok(offset + 2)
}

pub fn decode_query_firmware_security_version_resp(buffer: &[u8]) -> Result<u16, NsmCodecError> {
    let env = decode_response_envelope(buffer)?;
    if let Some(reason_code) = env.reason_code {
        return Err(NsmCodecError::CommandFail { reason_code });
    }
    if env.data_size < 2 {
        return Err(NsmCodecError::Data);
    }
    require_len(buffer, env.payload_offset + 2)?;
    Ok(u16::from_le_bytes(
        buffer[env.payload_offset..env.payload_offset + 2].try_into()?,
    ))
}

// --- UpdateFirmwareSecurityVersion ---

pub fn encode_update_firmware_security_version_req(
    instance_id: InstanceId,
    component_id: u8,
    new_security_version: u16,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_request_header(buffer, instance_id, MSG_TYPE)?;
    require_len(buffer, offset + 3)?;
    buffer[offset] = component_id;
    buffer[offset + 1..offset + 3].copy_from_slice(&new_security_version.to_le_bytes());
    Ok(offset + 3)
}

pub fn decode_update_firmware_security_version_req(buffer: &[u8]) -> Result<(u8, u16), NsmCodecError> {
    require_exact_len(buffer, HEADER_LEN + 3)?;
    Ok((
        buffer[HEADER_LEN],
        u16::from_le_bytes([buffer[HEADER_LEN + 1], buffer[HEADER_LEN + 2]]),
    ))
}

pub fn encode_update_firmware_security_version_resp(
    instance_id: InstanceId,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    encode_response_success(
        buffer,
        instance_id,
        MSG_TYPE,
        firmware_cmd::UPDATE_FIRMWARE_SECURITY_VERSION,
        0,
    )
}

// --- IrreversibleConfigRequest ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IrreversibleConfigAction {
    QueryState = 0,
    Enable = 1,
    Disable = 2,
}

impl TryFrom<u8> for IrreversibleConfigAction {
    type Error = NsmCodecError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(IrreversibleConfigAction::QueryState),
            1 => Ok(IrreversibleConfigAction::Enable),
            2 => Ok(IrreversibleConfigAction::Disable),
            _ => Err(NsmCodecError::Data),
        }
    }
}

pub fn encode_irreversible_config_request_req(
    instance_id: InstanceId,
    action: IrreversibleConfigAction,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_request_header(buffer, instance_id, MSG_TYPE)?;
    require_len(buffer, offset + 1)?;
    buffer[offset] = action as u8;
    Ok(offset + 1)
}

pub fn decode_irreversible_config_request_req(
    buffer: &[u8],
) -> Result<IrreversibleConfigAction, NsmCodecError> {
    require_exact_len(buffer, HEADER_LEN + 1)?;
    IrreversibleConfigAction::try_from(buffer[HEADER_LEN])
}

pub fn encode_irreversible_config_request_resp(
    instance_id: InstanceId,
    enabled: bool,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_response_success(
        buffer,
        instance_id,
        MSG_TYPE,
        firmware_cmd::IRREVERSIBLE_CONFIG_REQUEST,
        1,
    )?;
    require_len(buffer, offset + 1)?;
    buffer[offset] = enabled as u8;
    Ok(offset + 1)
}

pub fn decode_irreversible_config_request_resp(buffer: &[u8]) -> Result<bool, NsmCodecError> {
    let env = decode_response_envelope(buffer)?;
    if let Some(reason_code) = env.reason_code {
        return Err(NsmCodecError::CommandFail { reason_code });
    }
    require_len(buffer, env.payload_offset + 1)?;
    Ok(buffer[env.payload_offset] != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn erot_state_parameters_round_trip() {
        let params = ErotStateParameters {
            active_slot: 1,
            firmware_version: [1, 2, 0, 0],
            recovery_count: 0,
        };
        let mut buf = [0u8; 32];
        let n = encode_query_erot_state_parameters_resp(1, params, &mut buf).unwrap();
        assert_eq!(decode_query_erot_state_parameters_resp(&buf[..n]).unwrap(), params);
    }

    #[test]
    fn firmware_security_version_round_trip() {
        let mut req = [0u8; 16];
        let n = encode_query_firmware_security_version_req(1, 3, &mut req).unwrap();
        assert_eq!(decode_query_firmware_security_version_req(&req[..n]).unwrap(), 3);

        let mut resp = [0u8; 16];
        let n = encode_query_firmware_security_version_resp(1, 7, &mut resp).unwrap();
        assert_eq!(decode_query_firmware_security_version_resp(&resp[..n]).unwrap(), 7);
    }

    #[test]
    fn update_firmware_security_version_round_trip() {
        let mut req = [0u8; 16];
        let n = encode_update_firmware_security_version_req(1, 3, 8, &mut req).unwrap();
        assert_eq!(
            decode_update_firmware_security_version_req(&req[..n]).unwrap(),
            (3, 8)
        );
    }

    #[test]
    fn irreversible_config_request_round_trip() {
        let mut req = [0u8; 16];
        let n =
            encode_irreversible_config_request_req(1, IrreversibleConfigAction::Enable, &mut req)
                .unwrap();
        assert_eq!(
            decode_irreversible_config_request_req(&req[..n]).unwrap(),
            IrreversibleConfigAction::Enable
        );
    }
}
