//! Platform-environmental command family (message type 0x03).
//!
//! Covers: inventory info, temperature, power supply status, GPU presence/power,
//! current power draw, energy count, voltage, driver info, MIG mode, ECC mode,
//! clock limit, current clock frequency, row-remapping state (§6). Reset-required
//! and XID events for this family are decoded in `codec::event`, not here, per
//! spec.md §4.4's event/sensor split. `AggregateTemperatureAndVoltage` and
//! `AggregateEnergyAndPower` reuse `codec::aggregate`'s frame decoder directly;
//! they have no dedicated encode/decode pair here.

use alloc::string::String;

use crate::codec::{require_exact_len, require_len};
use crate::header::{decode_response_envelope, encode_request_header, encode_response_success, HEADER_LEN};
use crate::types::{platform_env_cmd, InventoryProperty, MessageType};
use crate::InstanceId;
use crate::NsmCodecError;

const MSG_TYPE: u8 = MessageType::PlatformEnvironmental as u8;

// --- GetInventoryInformation ---

pub fn encode_get_inventory_information_req(
    instance_id: InstanceId,
    property: InventoryProperty,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_request_header(buffer, instance_id, MSG_TYPE)?;
    require_len(buffer, offset + 1)?;
    buffer[offset] = property as u8;
    Ok(offset + 1)
}

pub fn decode_get_inventory_information_req(buffer: &[u8]) -> Result<u8, NsmCodecError> {
    require_exact_len(buffer, HEADER_LEN + 1)?;
    Ok(buffer[HEADER_LEN])
}

/// Inventory values are variable-length ASCII (no NUL terminator on the wire) for
/// string properties, or a raw 16-byte GUID for `DeviceGuid`.
pub fn encode_get_inventory_information_resp(
    instance_id: InstanceId,
    value: &[u8],
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_response_success(
        buffer,
        instance_id,
        MSG_TYPE,
        platform_env_cmd::GET_INVENTORY_INFORMATION,
        value.len() as u16,
    )?;
    require_len(buffer, offset + value.len())?;
    buffer[offset..offset + value.len()].copy_from_slice(value);
    Ok(offset + value.len())
}

pub fn decode_get_inventory_information_resp_bytes(buffer: &[u8]) -> Result<&[u8], NsmCodecError> {
    let env = decode_response_envelope(buffer)?;
    if let Some(reason_code) = env.reason_code {
        return Err(NsmCodecError::CommandFail { reason_code });
    }
    let len = env.data_size as usize;
    require_len(buffer, env.payload_offset + len)?;
    Ok(&buffer[env.payload_offset..env.payload_offset + len])
}

/// Convenience decoder for the ASCII string properties (board part number, serial
/// number, marketing name, build date). Non-UTF-8 bytes are lossily replaced, since
/// the wire guarantees ASCII but a defensive decoder should not panic on garbage.
pub fn decode_get_inventory_information_resp_string(buffer: &[u8]) -> Result<String, NsmCodecError> {
    let bytes = decode_get_inventory_information_resp_bytes(buffer)?;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

// --- GetTemperatureReading ---

pub fn encode_get_temperature_reading_req(
    instance_id: InstanceId,
    sensor_id: u8,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_request_header(buffer, instance_id, MSG_TYPE)?;
    require_len(buffer, offset + 1)?;
    buffer[offset] = sensor_id;
    Ok(offset + 1)
}

pub fn decode_get_temperature_reading_req(buffer: &[u8]) -> Result<u8, NsmCodecError> {
    require_exact_len(buffer, HEADER_LEN + 1)?;
    Ok(buffer[HEADER_LEN])
}

/// Temperature is a 32-bit IEEE-754 value in degrees Celsius, real_32 per §8 scenario 3.
pub fn encode_get_temperature_reading_resp(
    instance_id: InstanceId,
    celsius: f32,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_response_success(
        buffer,
        instance_id,
        MSG_TYPE,
        platform_env_cmd::GET_TEMPERATURE_READING,
        4,
    )?;
    require_len(buffer, offset + 4)?;
    buffer[offset..offset + 4].copy_from_slice(&celsius.to_le_bytes());
    Ok(offset + 4)
}

pub fn decode_get_temperature_reading_resp(buffer: &[u8]) -> Result<f32, NsmCodecError> {
    let env = decode_response_envelope(buffer)?;
    if let Some(reason_code) = env.reason_code {
        return Err(NsmCodecError::CommandFail { reason_code });
    }
    if env.data_size < 4 {
        return Err(NsmCodecError::Data);
    }
    require_len(buffer, env.payload_offset + 4)?;
    let raw: [u8; 4] = buffer[env.payload_offset..env.payload_offset + 4].try_into()?;
    Ok(f32::from_le_bytes(raw))
}

// --- GetCurrentPowerDraw (milliwatts) ---

pub fn encode_get_current_power_draw_req(
    instance_id: InstanceId,
    sensor_id: u8,
    averaging_interval: u8,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_request_header(buffer, instance_id, MSG_TYPE)?;
    require_len(buffer, offset + 2)?;
    buffer[offset] = sensor_id;
    buffer[offset + 1] = averaging_interval;
    Ok(offset + 2)
}

pub fn decode_get_current_power_draw_req(buffer: &[u8]) -> Result<(u8, u8), NsmCodecError> {
    require_exact_len(buffer, HEADER_LEN + 2)?;
    Ok((buffer[HEADER_LEN], buffer[HEADER_LEN + 1]))
}

pub fn encode_get_current_power_draw_resp(
    instance_id: InstanceId,
    milliwatts: u32,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_response_success(
        buffer,
        instance_id,
        MSG_TYPE,
        platform_env_cmd::GET_CURRENT_POWER_DRAW,
        4,
    )?;
    require_len(buffer, offset + 4)?;
    buffer[offset..offset + 4].copy_from_slice(&milliwatts.to_le_bytes());
    Ok(offset + 4)
}

pub fn decode_get_current_power_draw_resp(buffer: &[u8]) -> Result<u32, NsmCodecError> {
    let env = decode_response_envelope(buffer)?;
    if let Some(reason_code) = env.reason_code {
        return Err(NsmCodecError::CommandFail { reason_code });
    }
    if env.data_size < 4 {
        return Err(NsmCodecError::Data);
    }
    require_len(buffer, env.payload_offset + 4)?;
    Ok(u32::from_le_bytes(
        buffer[env.payload_offset..env.payload_offset + 4].try_into()?,
    ))
}

// --- GetEnergyCount ---

pub fn encode_get_energy_count_req(
    instance_id: InstanceId,
    sensor_id: u8,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_request_header(buffer, instance_id, MSG_TYPE)?;
    require_len(buffer, offset + 1)?;
    buffer[offset] = sensor_id;
    Ok(offset + 1)
}

pub fn decode_get_energy_count_req(buffer: &[u8]) -> Result<u8, NsmCodecError> {
    require_exact_len(buffer, HEADER_LEN + 1)?;
    Ok(buffer[HEADER_LEN])
}

pub fn encode_get_energy_count_resp(
    instance_id: InstanceId,
    millijoules: u64,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_response_success(
        buffer,
        instance_id,
        MSG_TYPE,
        platform_env_cmd::GET_ENERGY_COUNT,
        8,
    )?;
    require_len(buffer, offset + 8)?;
    buffer[offset..offset + 8].copy_from_slice(&millijoules.to_le_bytes());
    Ok(offset + 8)
}

pub fn decode_get_energy_count_resp(buffer: &[u8]) -> Result<u64, NsmCodecError> {
    let env = decode_response_envelope(buffer)?;
    if let Some(reason_code) = env.reason_code {
        return Err(NsmCodecError::CommandFail { reason_code });
    }
    if env.data_size < 8 {
        return Err(NsmCodecError::Data);
    }
    require_len(buffer, env.payload_offset + 8)?;
    Ok(u64::from_le_bytes(
        buffer[env.payload_offset..env.payload_offset + 8].try_into()?,
    ))
}

// --- GetVoltage (millivolts) ---

pub fn encode_get_voltage_req(
    instance_id: InstanceId,
    sensor_id: u8,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_request_header(buffer, instance_id, MSG_TYPE)?;
    require_len(buffer, offset + 1)?;
    buffer[offset] = sensor_id;
    Ok(offset + 1)
}

pub fn decode_get_voltage_req(buffer: &[u8]) -> Result<u8, NsmCodecError> {
    require_exact_len(buffer, HEADER_LEN + 1)?;
    Ok(buffer[HEADER_LEN])
}

pub fn encode_get_voltage_resp(
    instance_id: InstanceId,
    millivolts: u32,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset =
        encode_response_success(buffer, instance_id, MSG_TYPE, platform_env_cmd::GET_VOLTAGE, 4)?;
    require_len(buffer, offset + 4)?;
    buffer[offset..offset + 4].copy_from_slice(&millivolts.to_le_bytes());
    Ok(offset + 4)
}

pub fn decode_get_voltage_resp(buffer: &[u8]) -> Result<u32, NsmCodecError> {
    let env = decode_response_envelope(buffer)?;
    if let Some(reason_code) = env.reason_code {
        return Err(NsmCodecError::CommandFail { reason_code });
    }
    if env.data_size < 4 {
        return Err(NsmCodecError::Data);
    }
    require_len(buffer, env.payload_offset + 4)?;
    Ok(u32::from_le_bytes(
        buffer[env.payload_offset..env.payload_offset + 4].try_into()?,
    ))
}

// --- Get/Set MIG mode ---

pub fn encode_get_mig_mode_req(
    instance_id: InstanceId,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    encode_request_header(buffer, instance_id, MSG_TYPE)
}

pub fn encode_get_mig_mode_resp(
    instance_id: InstanceId,
    enabled: bool,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_response_success(
        buffer,
        instance_id,
        MSG_TYPE,
        platform_env_cmd::GET_MIG_MODE,
        1,
    )?;
    require_len(buffer, offset + 1)?;
    buffer[offset] = enabled as u8;
    Ok(offset + 1)
}

pub fn decode_get_mig_mode_resp(buffer: &[u8]) -> Result<bool, NsmCodecError> {
    let env = decode_response_envelope(buffer)?;
    if let Some(reason_code) = env.reason_code {
        return Err(NsmCodecError::CommandFail { reason_code });
    }
    require_len(buffer, env.payload_offset + 1)?;
    Ok(buffer[env.payload_offset] != 0)
}

pub fn encode_set_mig_mode_req(
    instance_id: InstanceId,
    enable: bool,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_request_header(buffer, instance_id, MSG_TYPE)?;
    require_len(buffer, offset + 1)?;
    buffer[offset] = enable as u8;
    Ok(offset + 1)
}

pub fn decode_set_mig_mode_req(buffer: &[u8]) -> Result<bool, NsmCodecError> {
    require_exact_len(buffer, HEADER_LEN + 1)?;
    Ok(buffer[HEADER_LEN] != 0)
}

pub fn encode_set_mig_mode_resp(
    instance_id: InstanceId,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    encode_response_success(buffer, instance_id, MSG_TYPE, platform_env_cmd::SET_MIG_MODE, 0)
}

// --- Get/Set ECC mode ---

pub fn encode_get_ecc_mode_req(
    instance_id: InstanceId,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    encode_request_header(buffer, instance_id, MSG_TYPE)
}

pub fn encode_get_ecc_mode_resp(
    instance_id: InstanceId,
    enabled: bool,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_response_success(
        buffer,
        instance_id,
        MSG_TYPE,
        platform_env_cmd::GET_ECC_MODE,
        1,
    )?;
    require_len(buffer, offset + 1)?;
    buffer[offset] = enabled as u8;
    Ok(offset + 1)
}

pub fn decode_get_ecc_mode_resp(buffer: &[u8]) -> Result<bool, NsmCodecError> {
    let env = decode_response_envelope(buffer)?;
    if let Some(reason_code) = env.reason_code {
        return Err(NsmCodecError::CommandFail { reason_code });
    }
    require_len(buffer, env.payload_offset + 1)?;
    Ok(buffer[env.payload_offset] != 0)
}

pub fn encode_set_ecc_mode_req(
    instance_id: InstanceId,
    enable: bool,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_request_header(buffer, instance_id, MSG_TYPE)?;
    require_len(buffer, offset + 1)?;
    buffer[offset] = enable as u8;
    Ok(offset + 1)
}

pub fn decode_set_ecc_mode_req(buffer: &[u8]) -> Result<bool, NsmCodecError> {
    require_exact_len(buffer, HEADER_LEN + 1)?;
    Ok(buffer[HEADER_LEN] != 0)
}

pub fn encode_set_ecc_mode_resp(
    instance_id: InstanceId,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    encode_response_success(buffer, instance_id, MSG_TYPE, platform_env_cmd::SET_ECC_MODE, 0)
}

// --- GetClockLimit ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClockLimit {
    pub present_limit_min_mhz: u32,
    pub present_limit_max_mhz: u32,
    pub requested_limit_min_mhz: u32,
    pub requested_limit_max_mhz: u32,
}

pub fn encode_get_clock_limit_req(
    instance_id: InstanceId,
    clock_id: u8,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_request_header(buffer, instance_id, MSG_TYPE)?;
    require_len(buffer, offset + 1)?;
    buffer[offset] = clock_id;
    Ok(offset + 1)
}

pub fn decode_get_clock_limit_req(buffer: &[u8]) -> Result<u8, NsmCodecError> {
    require_exact_len(buffer, HEADER_LEN + 1)?;
    Ok(buffer[HEADER_LEN])
}

pub fn encode_get_clock_limit_resp(
    instance_id: InstanceId,
    limit: ClockLimit,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_response_success(
        buffer,
        instance_id,
        MSG_TYPE,
        platform_env_cmd::GET_CLOCK_LIMIT,
        16,
    )?;
    require_len(buffer, offset + 16)?;
    buffer[offset..offset + 4].copy_from_slice(&limit.present_limit_min_mhz.to_le_bytes());
    buffer[offset + 4..offset + 8].copy_from_slice(&limit.present_limit_max_mhz.to_le_bytes());
    buffer[offset + 8..offset + 12].copy_from_slice(&limit.requested_limit_min_mhz.to_le_bytes());
    buffer[offset + 12..offset + 16].copy_from_slice(&limit.requested_limit_max_mhz.to_le_bytes());
    Ok(offset + 16)
}

pub fn decode_get_clock_limit_resp(buffer: &[u8]) -> Result<ClockLimit, NsmCodecError> {
    let env = decode_response_envelope(buffer)?;
    if let Some(reason_code) = env.reason_code {
        return Err(NsmCodecError::CommandFail { reason_code });
    }
    if env.data_size < 16 {
        return Err(NsmCodecError::Data);
    }
    require_len(buffer, env.payload_offset + 16)?;
    let base = env.payload_offset;
    Ok(ClockLimit {
        present_limit_min_mhz: u32::from_le_bytes(buffer[base..base + 4].try_into()?),
        present_limit_max_mhz: u32::from_le_bytes(buffer[base + 4..base + 8].try_into()?),
        requested_limit_min_mhz: u32::from_le_bytes(buffer[base + 8..base + 12].try_into()?),
        requested_limit_max_mhz: u32::from_le_bytes(buffer[base + 12..base + 16].try_into()?),
    })
}

// --- GetCurrentClockFrequency ---

pub fn encode_get_current_clock_frequency_req(
    instance_id: InstanceId,
    clock_id: u8,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_request_header(buffer, instance_id, MSG_TYPE)?;
    require_len(buffer, offset + 1)?;
    buffer[offset] = clock_id;
    Ok(offset + 1)
}

pub fn decode_get_current_clock_frequency_req(buffer: &[u8]) -> Result<u8, NsmCodecError> {
    require_exact_len(buffer, HEADER_LEN + 1)?;
    Ok(buffer[HEADER_LEN])
}

pub fn encode_get_current_clock_frequency_resp(
    instance_id: InstanceId,
    mhz: u32,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_response_success(
        buffer,
        instance_id,
        MSG_TYPE,
        platform_env_cmd::GET_CURRENT_CLOCK_FREQUENCY,
        4,
    )?;
    require_len(buffer, offset + 4)?;
    buffer[offset..offset + 4].copy_from_slice(&mhz.to_le_bytes());
    Ok(offset + 4)
}

pub fn decode_get_current_clock_frequency_resp(buffer: &[u8]) -> Result<u32, NsmCodecError> {
    let env = decode_response_envelope(buffer)?;
    if let Some(reason_code) = env.reason_code {
        return Err(NsmCodecError::CommandFail { reason_code });
    }
    if env.data_size < 4 {
        return Err(NsmCodecError::Data);
    }
    require_len(buffer, env.payload_offset + 4)?;
    Ok(u32::from_le_bytes(
        buffer[env.payload_offset..env.payload_offset + 4].try_into()?,
    ))
}

// --- GetRowRemappingState ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowRemappingState {
    pub correctable_error_count: u32,
    pub uncorrectable_error_count: u32,
    pub pending_remapping: bool,
    pub remapping_failed: bool,
}

pub fn encode_get_row_remapping_state_req(
    instance_id: InstanceId,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    encode_request_header(buffer, instance_id, MSG_TYPE)
}

pub fn encode_get_row_remapping_state_resp(
    instance_id: InstanceId,
    state: RowRemappingState,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_response_success(
        buffer,
        instance_id,
        MSG_TYPE,
        platform_env_cmd::GET_ROW_REMAPPING_STATE,
        10,
    )?;
    require_len(buffer, offset + 10)?;
    buffer[offset..offset + 4].copy_from_slice(&state.correctable_error_count.to_le_bytes());
    buffer[offset + 4..offset + 8].copy_from_slice(&state.uncorrectable_error_count.to_le_bytes());
    buffer[offset + 8] = state.pending_remapping as u8;
    buffer[offset + 9] = state.remapping_failed as u8;
    Ok(offset + 10)
}

pub fn decode_get_row_remapping_state_resp(buffer: &[u8]) -> Result<RowRemappingState, NsmCodecError> {
    let env = decode_response_envelope(buffer)?;
    if let Some(reason_code) = env.reason_code {
        return Err(NsmCodecError::CommandFail { reason_code });
    }
    if env.data_size < 10 {
        return Err(NsmCodecError::Data);
    }
    require_len(buffer, env.payload_offset + 10)?;
    let base = env.payload_offset;
    Ok(RowRemappingState {
        correctable_error_count: u32::from_le_bytes(buffer[base..base + 4].try_into()?),
        uncorrectable_error_count: u32::from_le_bytes(buffer[base + 4..base + 8].try_into()?),
        pending_remapping: buffer[base + 8] != 0,
        remapping_failed: buffer[base + 9] != 0,
    })
}

// --- GetPowerSupplyStatus ---

pub fn encode_get_power_supply_status_req(
    instance_id: InstanceId,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    encode_request_header(buffer, instance_id, MSG_TYPE)
}

/// Bitmask of power-supply-present/power-good flags, one bit per supply rail.
pub fn encode_get_power_supply_status_resp(
    instance_id: InstanceId,
    status: u8,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_response_success(
        buffer,
        instance_id,
        MSG_TYPE,
        platform_env_cmd::GET_POWER_SUPPLY_STATUS,
        1,
    )?;
    require_len(buffer, offset + 1)?;
    buffer[offset] = status;
    Ok(offset + 1)
}

pub fn decode_get_power_supply_status_resp(buffer: &[u8]) -> Result<u8, NsmCodecError> {
    let env = decode_response_envelope(buffer)?;
    if let Some(reason_code) = env.reason_code {
        return Err(NsmCodecError::CommandFail { reason_code });
    }
    require_len(buffer, env.payload_offset + 1)?;
    Ok(buffer[env.payload_offset])
}

// --- GetGpuPresenceAndPowerStatus ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GpuPresenceAndPowerStatus {
    pub presence: bool,
    pub power_good: bool,
}

pub fn encode_get_gpu_presence_and_power_status_req(
    instance_id: InstanceId,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    encode_request_header(buffer, instance_id, MSG_TYPE)
}

pub fn encode_get_gpu_presence_and_power_status_resp(
    instance_id: InstanceId,
    status: GpuPresenceAndPowerStatus,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_response_success(
        buffer,
        instance_id,
        MSG_TYPE,
        platform_env_cmd::GET_GPU_PRESENCE_AND_POWER_STATUS,
        2,
    )?;
    require_len(buffer, offset + 2)?;
    buffer[offset] = status.presence as u8;
    buffer[offset + 1] = status.power_good as u8;
    Ok(offset + 2)
}

pub fn decode_get_gpu_presence_and_power_status_resp(
    buffer: &[u8],
) -> Result<GpuPresenceAndPowerStatus, NsmCodecError> {
    let env = decode_response_envelope(buffer)?;
    if let Some(reason_code) = env.reason_code {
        return Err(NsmCodecError::CommandFail { reason_code });
    }
    if env.data_size < 2 {
        return Err(NsmCodecError::Data);
    }
    require_len(buffer, env.payload_offset + 2)?;
    Ok(GpuPresenceAndPowerStatus {
        presence: buffer[env.payload_offset] != 0,
        power_good: buffer[env.payload_offset + 1] != 0,
    })
}

// --- GetAltitudePressure (pascals) ---

pub fn encode_get_altitude_pressure_req(
    instance_id: InstanceId,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    encode_request_header(buffer, instance_id, MSG_TYPE)
}

pub fn encode_get_altitude_pressure_resp(
    instance_id: InstanceId,
    pascals: u32,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_response_success(
        buffer,
        instance_id,
        MSG_TYPE,
        platform_env_cmd::GET_ALTITUDE_PRESSURE,
        4,
    )?;
    require_len(buffer, offset + 4)?;
    buffer[offset..offset + 4].copy_from_slice(&pascals.to_le_bytes());
    Ok(offset + 4)
}

pub fn decode_get_altitude_pressure_resp(buffer: &[u8]) -> Result<u32, NsmCodecError> {
    let env = decode_response_envelope(buffer)?;
    if let Some(reason_code) = env.reason_code {
        return Err(NsmCodecError::CommandFail { reason_code });
    }
    if env.data_size < 4 {
        return Err(NsmCodecError::Data);
    }
    require_len(buffer, env.payload_offset + 4)?;
    Ok(u32::from_le_bytes(
        buffer[env.payload_offset..env.payload_offset + 4].try_into()?,
    ))
}

// --- GetDriverInfo ---

/// Driver state byte followed by a NUL-terminated ASCII version string, matching
/// `original_source/mockupResponder/mockupResponder.cpp`'s
/// `getDriverInfoHandler` (state byte, then the string bytes, then one trailing
/// `\0`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DriverInfo {
    pub driver_state: u8,
    pub version: String,
}

pub fn encode_get_driver_info_req(
    instance_id: InstanceId,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    encode_request_header(buffer, instance_id, MSG_TYPE)
}

pub fn encode_get_driver_info_resp(
    instance_id: InstanceId,
    info: &DriverInfo,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let payload_len = 1 + info.version.len() + 1;
    let offset = encode_response_success(
        buffer,
        instance_id,
        MSG_TYPE,
        platform_env_cmd::GET_DRIVER_INFO,
        payload_len as u16,
    )?;
    require_len(buffer, offset + payload_len)?;
    buffer[offset] = info.driver_state;
    let version_bytes = info.version.as_bytes();
    buffer[offset + 1..offset + 1 + version_bytes.len()].copy_from_slice(version_bytes);
    buffer[offset + 1 + version_bytes.len()] = 0;
    Ok(offset + payload_len)
}

pub fn decode_get_driver_info_resp(buffer: &[u8]) -> Result<DriverInfo, NsmCodecError> {
    let env = decode_response_envelope(buffer)?;
    if let Some(reason_code) = env.reason_code {
        return Err(NsmCodecError::CommandFail { reason_code });
    }
    if env.data_size < 2 {
        return Err(NsmCodecError::Data);
    }
    let len = env.data_size as usize;
    require_len(buffer, env.payload_offset + len)?;
    let driver_state = buffer[env.payload_offset];
    let rest = &buffer[env.payload_offset + 1..env.payload_offset + len];
    let nul_at = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
    Ok(DriverInfo {
        driver_state,
        version: String::from_utf8_lossy(&rest[..nul_at]).into_owned(),
    })
}

// --- GetAccumulatedGpuUtilizationTime ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccumulatedGpuUtilizationTime {
    pub context_util_time_ms: u32,
    pub sm_util_time_ms: u32,
}

pub fn encode_get_accumulated_gpu_utilization_time_req(
    instance_id: InstanceId,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    encode_request_header(buffer, instance_id, MSG_TYPE)
}

pub fn encode_get_accumulated_gpu_utilization_time_resp(
    instance_id: InstanceId,
    util: AccumulatedGpuUtilizationTime,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_response_success(
        buffer,
        instance_id,
        MSG_TYPE,
        platform_env_cmd::GET_ACCUMULATED_GPU_UTILIZATION_TIME,
        8,
    )?;
    require_len(buffer, offset + 8)?;
    buffer[offset..offset + 4].copy_from_slice(&util.context_util_time_ms.to_le_bytes());
    buffer[offset + 4..offset + 8].copy_from_slice(&util.sm_util_time_ms.to_le_bytes());
    Ok(offset + 8)
}

pub fn decode_get_accumulated_gpu_utilization_time_resp(
    buffer: &[u8],
) -> Result<AccumulatedGpuUtilizationTime, NsmCodecError> {
    let env = decode_response_envelope(buffer)?;
    if let Some(reason_code) = env.reason_code {
        return Err(NsmCodecError::CommandFail { reason_code });
    }
    if env.data_size < 8 {
        return Err(NsmCodecError::Data);
    }
    require_len(buffer, env.payload_offset + 8)?;
    let base = env.payload_offset;
    Ok(AccumulatedGpuUtilizationTime {
        context_util_time_ms: u32::from_le_bytes(buffer[base..base + 4].try_into()?),
        sm_util_time_ms: u32::from_le_bytes(buffer[base + 4..base + 8].try_into()?),
    })
}

// --- GetMemoryCapacityUtilization ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryCapacityUtilization {
    pub reserved_memory_kib: u32,
    pub used_memory_kib: u32,
}

pub fn encode_get_memory_capacity_utilization_req(
    instance_id: InstanceId,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    encode_request_header(buffer, instance_id, MSG_TYPE)
}

pub fn encode_get_memory_capacity_utilization_resp(
    instance_id: InstanceId,
    util: MemoryCapacityUtilization,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_response_success(
        buffer,
        instance_id,
        MSG_TYPE,
        platform_env_cmd::GET_MEMORY_CAPACITY_UTILIZATION,
        8,
    )?;
    require_len(buffer, offset + 8)?;
    buffer[offset..offset + 4].copy_from_slice(&util.reserved_memory_kib.to_le_bytes());
    buffer[offset + 4..offset + 8].copy_from_slice(&util.used_memory_kib.to_le_bytes());
    Ok(offset + 8)
}

pub fn decode_get_memory_capacity_utilization_resp(
    buffer: &[u8],
) -> Result<MemoryCapacityUtilization, NsmCodecError> {
    let env = decode_response_envelope(buffer)?;
    if let Some(reason_code) = env.reason_code {
        return Err(NsmCodecError::CommandFail { reason_code });
    }
    if env.data_size < 8 {
        return Err(NsmCodecError::Data);
    }
    require_len(buffer, env.payload_offset + 8)?;
    let base = env.payload_offset;
    Ok(MemoryCapacityUtilization {
        reserved_memory_kib: u32::from_le_bytes(buffer[base..base + 4].try_into()?),
        used_memory_kib: u32::from_le_bytes(buffer[base + 4..base + 8].try_into()?),
    })
}

// --- GetProgrammableEDPpScalingFactor ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EdppScalingFactors {
    pub default_scaling_factor: u8,
    pub maximum_scaling_factor: u8,
    pub minimum_scaling_factor: u8,
}

pub fn encode_get_edpp_scaling_factors_req(
    instance_id: InstanceId,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    encode_request_header(buffer, instance_id, MSG_TYPE)
}

pub fn encode_get_edpp_scaling_factors_resp(
    instance_id: InstanceId,
    factors: EdppScalingFactors,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_response_success(
        buffer,
        instance_id,
        MSG_TYPE,
        platform_env_cmd::GET_PROGRAMMABLE_EDPP_SCALING_FACTOR,
        3,
    )?;
    require_len(buffer, offset + 3)?;
    buffer[offset] = factors.default_scaling_factor;
    buffer[offset + 1] = factors.maximum_scaling_factor;
    buffer[offset + 2] = factors.minimum_scaling_factor;
    Ok(offset + 3)
}

pub fn decode_get_edpp_scaling_factors_resp(buffer: &[u8]) -> Result<EdppScalingFactors, NsmCodecError> {
    let env = decode_response_envelope(buffer)?;
    if let Some(reason_code) = env.reason_code {
        return Err(NsmCodecError::CommandFail { reason_code });
    }
    if env.data_size < 3 {
        return Err(NsmCodecError::Data);
    }
    require_len(buffer, env.payload_offset + 3)?;
    let base = env.payload_offset;
    Ok(EdppScalingFactors {
        default_scaling_factor: buffer[base],
        maximum_scaling_factor: buffer[base + 1],
        minimum_scaling_factor: buffer[base + 2],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inventory_information_round_trip_scenario_from_spec() {
        let mut buf = [0u8; 64];
        let n =
            encode_get_inventory_information_resp(1, b"MCX750500B-0D00_DK", &mut buf).unwrap();
        let value = decode_get_inventory_information_resp_string(&buf[..n]).unwrap();
        assert_eq!(value, "MCX750500B-0D00_DK");
    }

    #[test]
    fn temperature_round_trip_scenario_from_spec() {
        let mut buf = [0u8; 32];
        let n = encode_get_temperature_reading_resp(1, 46.189, &mut buf).unwrap();
        let value = decode_get_temperature_reading_resp(&buf[..n]).unwrap();
        assert!((value - 46.189).abs() < 0.01);
    }

    #[test]
    fn power_draw_round_trip() {
        let mut buf = [0u8; 32];
        let n = encode_get_current_power_draw_resp(1, 275_000, &mut buf).unwrap();
        assert_eq!(decode_get_current_power_draw_resp(&buf[..n]).unwrap(), 275_000);
    }

    #[test]
    fn mig_mode_round_trip() {
        let mut req = [0u8; 16];
        let n = encode_set_mig_mode_req(1, true, &mut req).unwrap();
        assert!(decode_set_mig_mode_req(&req[..n]).unwrap());

        let mut resp = [0u8; 16];
        let n = encode_get_mig_mode_resp(1, true, &mut resp).unwrap();
        assert!(decode_get_mig_mode_resp(&resp[..n]).unwrap());
    }

    #[test]
    fn clock_limit_round_trip() {
        let limit = ClockLimit {
            present_limit_min_mhz: 210,
            present_limit_max_mhz: 1980,
            requested_limit_min_mhz: 210,
            requested_limit_max_mhz: 1980,
        };
        let mut buf = [0u8; 32];
        let n = encode_get_clock_limit_resp(1, limit, &mut buf).unwrap();
        assert_eq!(decode_get_clock_limit_resp(&buf[..n]).unwrap(), limit);
    }

    #[test]
    fn row_remapping_state_round_trip() {
        let state = RowRemappingState {
            correctable_error_count: 3,
            uncorrectable_error_count: 0,
            pending_remapping: true,
            remapping_failed: false,
        };
        let mut buf = [0u8; 32];
        let n = encode_get_row_remapping_state_resp(1, state, &mut buf).unwrap();
        assert_eq!(decode_get_row_remapping_state_resp(&buf[..n]).unwrap(), state);
    }

    #[test]
    fn power_supply_status_round_trip() {
        let mut buf = [0u8; 16];
        let n = encode_get_power_supply_status_resp(1, 0x01, &mut buf).unwrap();
        assert_eq!(decode_get_power_supply_status_resp(&buf[..n]).unwrap(), 0x01);
    }

    #[test]
    fn gpu_presence_and_power_status_round_trip() {
        let status = GpuPresenceAndPowerStatus {
            presence: true,
            power_good: true,
        };
        let mut buf = [0u8; 16];
        let n = encode_get_gpu_presence_and_power_status_resp(1, status, &mut buf).unwrap();
        assert_eq!(
            decode_get_gpu_presence_and_power_status_resp(&buf[..n]).unwrap(),
            status
        );
    }

    #[test]
    fn altitude_pressure_round_trip() {
        let mut buf = [0u8; 16];
        let n = encode_get_altitude_pressure_resp(1, 943_730, &mut buf).unwrap();
        assert_eq!(decode_get_altitude_pressure_resp(&buf[..n]).unwrap(), 943_730);
    }

    #[test]
    fn driver_info_round_trip() {
        let info = DriverInfo {
            driver_state: 2,
            version: "MockDriverVersion 1.0.0".into(),
        };
        let mut buf = [0u8; 64];
        let n = encode_get_driver_info_resp(1, &info, &mut buf).unwrap();
        assert_eq!(decode_get_driver_info_resp(&buf[..n]).unwrap(), info);
    }

    #[test]
    fn accumulated_gpu_utilization_time_round_trip() {
        let util = AccumulatedGpuUtilizationTime {
            context_util_time_ms: 4987,
            sm_util_time_ms: 2564,
        };
        let mut buf = [0u8; 32];
        let n = encode_get_accumulated_gpu_utilization_time_resp(1, util, &mut buf).unwrap();
        assert_eq!(
            decode_get_accumulated_gpu_utilization_time_resp(&buf[..n]).unwrap(),
            util
        );
    }

    #[test]
    fn memory_capacity_utilization_round_trip() {
        let util = MemoryCapacityUtilization {
            reserved_memory_kib: 2_345_567,
            used_memory_kib: 128_888,
        };
        let mut buf = [0u8; 32];
        let n = encode_get_memory_capacity_utilization_resp(1, util, &mut buf).unwrap();
        assert_eq!(
            decode_get_memory_capacity_utilization_resp(&buf[..n]).unwrap(),
            util
        );
    }

    #[test]
    fn edpp_scaling_factors_round_trip() {
        let factors = EdppScalingFactors {
            default_scaling_factor: 70,
            maximum_scaling_factor: 90,
            minimum_scaling_factor: 60,
        };
        let mut buf = [0u8; 16];
        let n = encode_get_edpp_scaling_factors_resp(1, factors, &mut buf).unwrap();
        assert_eq!(decode_get_edpp_scaling_factors_resp(&buf[..n]).unwrap(), factors);
    }
}
