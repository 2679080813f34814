//! Diagnostics command family (message type 0x05).
//!
//! Covers: FPGA diagnostics settings, enable/disable write-protect, GPU IST mode,
//! read thermal parameter (§6).

use crate::codec::{require_exact_len, require_len};
use crate::header::{decode_response_envelope, encode_request_header, encode_response_success, HEADER_LEN};
use crate::types::{diagnostics_cmd, MessageType};
use crate::InstanceId;
use crate::NsmCodecError;

const MSG_TYPE: u8 = MessageType::Diagnostics as u8;

// --- GetFpgaDiagnosticsSettings ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FpgaDiagnosticsSettings(pub u32);

pub fn encode_get_fpga_diagnostics_settings_req(
    instance_id: InstanceId,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    encode_request_header(buffer, instance_id, MSG_TYPE)
}

pub fn encode_get_fpga_diagnostics_settings_resp(
    instance_id: InstanceId,
    settings: FpgaDiagnosticsSettings,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_response_success(
        buffer,
        instance_id,
        MSG_TYPE,
        diagnostics_cmd::GET_FPGA_DIAGNOSTICS_SETTINGS,
        4,
    )?;
    require_len(buffer, offset + 4)?;
    buffer[offset..offset + 4].copy_from_slice(&settings.0.to_le_bytes());
    Ok(offset + 4)
}

pub fn decode_get_fpga_diagnostics_settings_resp(
    buffer: &[u8],
) -> Result<FpgaDiagnosticsSettings, NsmCodecError> {
    let env = decode_response_envelope(buffer)?;
    if let Some(reason_code) = env.reason_code {
        return Err(NsmCodecError::CommandFail { reason_code });
    }
    if env.data_size < 4 {
        return Err(NsmCodecError::Data);
    }
    require_len(buffer, env.payload_offset + 4)?;
    Ok(FpgaDiagnosticsSettings(u32::from_le_bytes(
        buffer[env.payload_offset..env.payload_offset + 4].try_into()?,
    )))
}

// --- EnableDisableWriteProtect ---

/// The write-protectable component selector (FPGA retimer/EEPROM/etc are
/// device-specific; the codec only carries the raw id).
pub fn encode_enable_disable_write_protect_req(
    instance_id: InstanceId,
    component_id: u8,
    enable: bool,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_request_header(buffer, instance_id, MSG_TYPE)?;
    require_len(buffer, offset + 2)?;
    buffer[offset] = component_id;
    buffer[offset + 1] = enable as u8;
    Ok(offset + 2)
}

pub fn decode_enable_disable_write_protect_req(buffer: &[u8]) -> Result<(u8, bool), NsmCodecError> {
    require_exact_len(buffer, HEADER_LEN + 2)?;
    Ok((buffer[HEADER_LEN], buffer[HEADER_LEN + 1] != 0))
}

pub fn encode_enable_disable_write_protect_resp(
    instance_id: InstanceId,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    encode_response_success(
        buffer,
        instance_id,
        MSG_TYPE,
        diagnostics_cmd::ENABLE_DISABLE_WRITE_PROTECT,
        0,
    )
}

// --- Get/Set GPU IST mode ---

pub fn encode_get_gpu_ist_mode_req(
    instance_id: InstanceId,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    encode_request_header(buffer, instance_id, MSG_TYPE)
}

pub fn encode_get_gpu_ist_mode_resp(
    instance_id: InstanceId,
    enabled: bool,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_response_success(
        buffer,
        instance_id,
        MSG_TYPE,
        diagnostics_cmd::GET_GPU_IST_MODE,
        1,
    )?;
    require_len(buffer, offset + 1)?;
    buffer[offset] = enabled as u8;
    Ok(offset + 1)
}

pub fn decode_get_gpu_ist_mode_resp(buffer: &[u8]) -> Result<bool, NsmCodecError> {
    let env = decode_response_envelope(buffer)?;
    if let Some(reason_code) = env.reason_code {
        return Err(NsmCodecError::CommandFail { reason_code });
    }
    require_len(buffer, env.payload_offset + 1)?;
    Ok(buffer[env.payload_offset] != 0)
}

pub fn encode_set_gpu_ist_mode_req(
    instance_id: InstanceId,
    enable: bool,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_request_header(buffer, instance_id, MSG_TYPE)?;
    require_len(buffer, offset + 1)?;
    buffer[offset] = enable as u8;
    Ok(offset + 1)
}

pub fn decode_set_gpu_ist_mode_req(buffer: &[u8]) -> Result<bool, NsmCodecError> {
    require_exact_len(buffer, HEADER_LEN + 1)?;
    Ok(buffer[HEADER_LEN] != 0)
}

pub fn encode_set_gpu_ist_mode_resp(
    instance_id: InstanceId,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    encode_response_success(buffer, instance_id, MSG_TYPE, diagnostics_cmd::SET_GPU_IST_MODE, 0)
}

// --- ReadThermalParameter ---

pub fn encode_read_thermal_parameter_req(
    instance_id: InstanceId,
    parameter_id: u8,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_request_header(buffer, instance_id, MSG_TYPE)?;
    require_len(buffer, offset + 1)?;
    buffer[offset] = parameter_id;
    Ok(offset + 1)
}

pub fn decode_read_thermal_parameter_req(buffer: &[u8]) -> Result<u8, NsmCodecError> {
    require_exact_len(buffer, HEADER_LEN + 1)?;
    Ok(buffer[HEADER_LEN])
}

pub fn encode_read_thermal_parameter_resp(
    instance_id: InstanceId,
    value: i32,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_response_success(
        buffer,
        instance_id,
        MSG_TYPE,
        diagnostics_cmd::READ_THERMAL_PARAMETER,
        4,
    )?;
    require_len(buffer, offset + 4)?;
    buffer[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    Ok(offset + 4)
}

pub fn decode_read_thermal_parameter_resp(buffer: &[u8]) -> Result<i32, NsmCodecError> {
    let env = decode_response_envelope(buffer)?;
    if let Some(reason_code) = env.reason_code {
        return Err(NsmCodecError::CommandFail { reason_code });
    }
    if env.data_size < 4 {
        return Err(NsmCodecError::Data);
    }
    require_len(buffer, env.payload_offset + 4)?;
    Ok(i32::from_le_bytes(
        buffer[env.payload_offset..env.payload_offset + 4].try_into()?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fpga_diagnostics_settings_round_trip() {
        let mut buf = [0u8; 32];
        let n =
            encode_get_fpga_diagnostics_settings_resp(1, FpgaDiagnosticsSettings(0x0F), &mut buf)
                .unwrap();
        assert_eq!(
            decode_get_fpga_diagnostics_settings_resp(&buf[..n]).unwrap(),
            FpgaDiagnosticsSettings(0x0F)
        );
    }

    #[test]
    fn write_protect_round_trip() {
        let mut req = [0u8; 16];
        let n = encode_enable_disable_write_protect_req(1, 2, true, &mut req).unwrap();
        assert_eq!(
            decode_enable_disable_write_protect_req(&req[..n]).unwrap(),
            (2, true)
        );
    }

    #[test]
    fn gpu_ist_mode_round_trip() {
        let mut resp = [0u8; 16];
        let n = encode_get_gpu_ist_mode_resp(1, true, &mut resp).unwrap();
        assert!(decode_get_gpu_ist_mode_resp(&resp[..n]).unwrap());
    }

    #[test]
    fn thermal_parameter_round_trip_handles_negative_values() {
        let mut buf = [0u8; 16];
        let n = encode_read_thermal_parameter_resp(1, -15, &mut buf).unwrap();
        assert_eq!(decode_read_thermal_parameter_resp(&buf[..n]).unwrap(), -15);
    }
}
