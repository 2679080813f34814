//! PCIe link command family (message type 0x04).
//!
//! Covers: scalar group telemetry (groups 0-9), clear-data-source,
//! assert-pcie-fundamental-reset (§6).

use crate::codec::{require_exact_len, require_len};
use crate::header::{decode_response_envelope, encode_request_header, encode_response_success, HEADER_LEN};
use crate::types::{pci_link_cmd, MessageType};
use crate::InstanceId;
use crate::NsmCodecError;

const MSG_TYPE: u8 = MessageType::PciLink as u8;

/// Highest valid scalar telemetry group index (groups 0..=9, per §6).
pub const MAX_SCALAR_GROUP: u8 = 9;

// --- QueryScalarGroupTelemetry ---

pub fn encode_query_scalar_group_telemetry_req(
    instance_id: InstanceId,
    device_index: u8,
    group_id: u8,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    if group_id > MAX_SCALAR_GROUP {
        return Err(NsmCodecError::Data);
    }
    let offset = encode_request_header(buffer, instance_id, MSG_TYPE)?;
    require_len(buffer, offset + 2)?;
    buffer[offset] = device_index;
    buffer[offset + 1] = group_id;
    Ok(offset + 2)
}

pub fn decode_query_scalar_group_telemetry_req(buffer: &[u8]) -> Result<(u8, u8), NsmCodecError> {
    require_exact_len(buffer, HEADER_LEN + 2)?;
    let group_id = buffer[HEADER_LEN + 1];
    if group_id > MAX_SCALAR_GROUP {
        return Err(NsmCodecError::Data);
    }
    Ok((buffer[HEADER_LEN], group_id))
}

/// A scalar telemetry group's values are a fixed-width vector of `u32` counters;
/// callers interpret them per group id (group semantics are command-specific and
/// owned by the sensor layer, not the codec).
pub fn encode_query_scalar_group_telemetry_resp(
    instance_id: InstanceId,
    values: &[u32],
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let payload_len = values.len() * 4;
    let offset = encode_response_success(
        buffer,
        instance_id,
        MSG_TYPE,
        pci_link_cmd::QUERY_SCALAR_GROUP_TELEMETRY,
        payload_len as u16,
    )?;
    require_len(buffer, offset + payload_len)?;
    for (i, value) in values.iter().enumerate() {
        let base = offset + i * 4;
        buffer[base..base + 4].copy_from_slice(&value.to_le_bytes());
    }
    Ok(offset + payload_len)
}

pub fn decode_query_scalar_group_telemetry_resp(
    buffer: &[u8],
    out: &mut [u32],
) -> Result<usize, NsmCodecError> {
    let env = decode_response_envelope(buffer)?;
    if let Some(reason_code) = env.reason_code {
        return Err(NsmCodecError::CommandFail { reason_code });
    }
    let count = (env.data_size as usize) / 4;
    if count * 4 != env.data_size as usize {
        return Err(NsmCodecError::Data);
    }
    if count > out.len() {
        return Err(NsmCodecError::Data);
    }
    require_len(buffer, env.payload_offset + count * 4)?;
    for (i, slot) in out.iter_mut().enumerate().take(count) {
        let base = env.payload_offset + i * 4;
        *slot = u32::from_le_bytes(buffer[base..base + 4].try_into()?);
    }
    Ok(count)
}

// --- ClearDataSourceV1 ---

pub fn encode_clear_data_source_req(
    instance_id: InstanceId,
    group_id: u8,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_request_header(buffer, instance_id, MSG_TYPE)?;
    require_len(buffer, offset + 1)?;
    buffer[offset] = group_id;
    Ok(offset + 1)
}

pub fn decode_clear_data_source_req(buffer: &[u8]) -> Result<u8, NsmCodecError> {
    require_exact_len(buffer, HEADER_LEN + 1)?;
    Ok(buffer[HEADER_LEN])
}

pub fn encode_clear_data_source_resp(
    instance_id: InstanceId,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    encode_response_success(buffer, instance_id, MSG_TYPE, pci_link_cmd::CLEAR_DATA_SOURCE_V1, 0)
}

// --- AssertPcieFundamentalReset ---

pub fn encode_assert_pcie_fundamental_reset_req(
    instance_id: InstanceId,
    assert_reset: bool,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_request_header(buffer, instance_id, MSG_TYPE)?;
    require_len(buffer, offset + 1)?;
    buffer[offset] = assert_reset as u8;
    Ok(offset + 1)
}

pub fn decode_assert_pcie_fundamental_reset_req(buffer: &[u8]) -> Result<bool, NsmCodecError> {
    require_exact_len(buffer, HEADER_LEN + 1)?;
    Ok(buffer[HEADER_LEN] != 0)
}

pub fn encode_assert_pcie_fundamental_reset_resp(
    instance_id: InstanceId,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    encode_response_success(
        buffer,
        instance_id,
        MSG_TYPE,
        pci_link_cmd::ASSERT_PCIE_FUNDAMENTAL_RESET,
        0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_group_telemetry_round_trip() {
        let values = [1u32, 2, 3, 4];
        let mut buf = [0u8; 64];
        let n = encode_query_scalar_group_telemetry_resp(1, &values, &mut buf).unwrap();
        let mut out = [0u32; 8];
        let count = decode_query_scalar_group_telemetry_resp(&buf[..n], &mut out).unwrap();
        assert_eq!(count, 4);
        assert_eq!(&out[..4], &values);
    }

    #[test]
    fn scalar_group_telemetry_rejects_group_out_of_range() {
        let mut buf = [0u8; 32];
        assert_eq!(
            encode_query_scalar_group_telemetry_req(1, 0, 10, &mut buf),
            Err(NsmCodecError::Data)
        );
    }

    #[test]
    fn clear_data_source_round_trip() {
        let mut req = [0u8; 16];
        let n = encode_clear_data_source_req(1, 2, &mut req).unwrap();
        assert_eq!(decode_clear_data_source_req(&req[..n]).unwrap(), 2);
    }

    #[test]
    fn assert_pcie_fundamental_reset_round_trip() {
        let mut req = [0u8; 16];
        let n = encode_assert_pcie_fundamental_reset_req(1, true, &mut req).unwrap();
        assert!(decode_assert_pcie_fundamental_reset_req(&req[..n]).unwrap());
    }
}
