//! Network-port command family (message type 0x01).
//!
//! Covers: telemetry counters, port status, port characteristics, ports available,
//! thresholds, set/get system GUID, set/get link-disable-sticky, isolation mode,
//! power mode/profile (§6). The telemetry-counter wire layout is grounded exactly on
//! `original_source/libnsm/network-ports.h`'s `nsm_supported_port_counter` (a 25-bit
//! bitfield over a u32) and `nsm_port_counter_data` (25 LE u64 counters in bitfield
//! declaration order), per SPEC_FULL.md §6 supplemental note.

use crate::codec::{require_exact_len, require_len};
use crate::header::{decode_response_envelope, encode_request_header, encode_response_success, HEADER_LEN};
use crate::types::{network_port_cmd, InstanceId, MessageType};
use crate::NsmCodecError;

const MSG_TYPE: u8 = MessageType::NetworkPort as u8;

/// Number of distinct counters in `nsm_port_counter_data`, and thus the number of
/// significant bits in `SupportedPortCounters`.
pub const NUM_PORT_COUNTERS: usize = 25;

/// The 25-bit `nsm_supported_port_counter` bitfield, explicit as a named-accessor
/// `u32` rather than a language bitfield so the byte order is unambiguous (§9
/// "Bitfield wire structs").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SupportedPortCounters(pub u32);

/// Counter index, in the exact declaration order of `nsm_port_counter_data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PortCounter {
    PortRcvPkts = 0,
    PortRcvData = 1,
    PortMulticastRcvPkts = 2,
    PortUnicastRcvPkts = 3,
    PortMalformedPkts = 4,
    Vl15Dropped = 5,
    PortRcvErrors = 6,
    PortXmitPkts = 7,
    PortXmitPktsVl15 = 8,
    PortXmitData = 9,
    PortXmitDataVl15 = 10,
    PortUnicastXmitPkts = 11,
    PortMulticastXmitPkts = 12,
    PortBcastXmitPkts = 13,
    PortXmitDiscard = 14,
    PortNeighborMtuDiscards = 15,
    PortRcvIbg2Pkts = 16,
    PortXmitIbg2Pkts = 17,
    SymbolError = 18,
    LinkErrorRecoveryCounter = 19,
    LinkDownedCounter = 20,
    PortRcvRemotePhysicalErrors = 21,
    PortRcvSwitchRelayErrors = 22,
    Qp1Dropped = 23,
    XmitWait = 24,
}

impl SupportedPortCounters {
    pub fn is_set(&self, counter: PortCounter) -> bool {
        self.0 & (1 << (counter as u32)) != 0
    }

    pub fn set(&mut self, counter: PortCounter) {
        self.0 |= 1 << (counter as u32);
    }
}

/// Decoded port telemetry counters: the supported-counter mask plus the subset of
/// the 25 LE u64 values whose bit was set (unsupported counters are left `None`
/// and never surfaced to consumer sensors, per the scenario in spec.md §8.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PortCounterData {
    pub supported: SupportedPortCounters,
    pub values: [Option<u64>; NUM_PORT_COUNTERS],
}

impl PortCounterData {
    pub fn get(&self, counter: PortCounter) -> Option<u64> {
        self.values[counter as usize]
    }

    pub fn set(&mut self, counter: PortCounter, value: u64) {
        self.supported.set(counter);
        self.values[counter as usize] = Some(value);
    }
}

const PORT_COUNTER_DATA_LEN: usize = 4 + NUM_PORT_COUNTERS * 8;

pub fn encode_get_port_telemetry_counter_req(
    instance_id: InstanceId,
    port_number: u8,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_request_header(buffer, instance_id, MSG_TYPE)?;
    require_len(buffer, offset + 1)?;
    buffer[offset] = port_number;
    Ok(offset + 1)
}

pub fn decode_get_port_telemetry_counter_req(buffer: &[u8]) -> Result<u8, NsmCodecError> {
    require_exact_len(buffer, HEADER_LEN + 1)?;
    Ok(buffer[HEADER_LEN])
}

pub fn encode_get_port_telemetry_counter_resp(
    instance_id: InstanceId,
    data: &PortCounterData,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_response_success(
        buffer,
        instance_id,
        MSG_TYPE,
        network_port_cmd::GET_PORT_TELEMETRY_COUNTER,
        PORT_COUNTER_DATA_LEN as u16,
    )?;
    require_len(buffer, offset + PORT_COUNTER_DATA_LEN)?;
    buffer[offset..offset + 4].copy_from_slice(&data.supported.0.to_le_bytes());
    for i in 0..NUM_PORT_COUNTERS {
        let value = data.values[i].unwrap_or(0);
        let base = offset + 4 + i * 8;
        buffer[base..base + 8].copy_from_slice(&value.to_le_bytes());
    }
    Ok(offset + PORT_COUNTER_DATA_LEN)
}

pub fn decode_get_port_telemetry_counter_resp(
    buffer: &[u8],
) -> Result<PortCounterData, NsmCodecError> {
    let env = decode_response_envelope(buffer)?;
    if let Some(reason_code) = env.reason_code {
        return Err(NsmCodecError::CommandFail { reason_code });
    }
    if (env.data_size as usize) < PORT_COUNTER_DATA_LEN {
        return Err(NsmCodecError::Data);
    }
    require_len(buffer, env.payload_offset + PORT_COUNTER_DATA_LEN)?;
    let base = env.payload_offset;
    let mask = u32::from_le_bytes(buffer[base..base + 4].try_into()?);
    let supported = SupportedPortCounters(mask);
    let mut values = [None; NUM_PORT_COUNTERS];
    for (i, slot) in values.iter_mut().enumerate() {
        if supported.0 & (1 << i) != 0 {
            let counter_base = base + 4 + i * 8;
            let raw = u64::from_le_bytes(buffer[counter_base..counter_base + 8].try_into()?);
            *slot = Some(raw);
        }
    }
    Ok(PortCounterData { supported, values })
}

// --- QueryPortStatus ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PortState {
    Down = 0x01,
    Up = 0x02,
    Reserved = 0x03,
    Sleep = 0x04,
    DownLock = 0x05,
    Polling = 0x06,
    Training = 0x07,
    TrainingFailure = 0x08,
}

impl TryFrom<u8> for PortState {
    type Error = NsmCodecError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(PortState::Down),
            0x02 => Ok(PortState::Up),
            0x03 => Ok(PortState::Reserved),
            0x04 => Ok(PortState::Sleep),
            0x05 => Ok(PortState::DownLock),
            0x06 => Ok(PortState::Polling),
            0x07 => Ok(PortState::Training),
            0x08 => Ok(PortState::TrainingFailure),
            _ => Err(NsmCodecError::Data),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PortStatus {
    Disabled = 0x01,
    Enabled = 0x02,
}

impl TryFrom<u8> for PortStatus {
    type Error = NsmCodecError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(PortStatus::Disabled),
            0x02 => Ok(PortStatus::Enabled),
            _ => Err(NsmCodecError::Data),
        }
    }
}

pub fn encode_query_port_status_req(
    instance_id: InstanceId,
    port_number: u8,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_request_header(buffer, instance_id, MSG_TYPE)?;
    require_len(buffer, offset + 1)?;
    buffer[offset] = port_number;
    Ok(offset + 1)
}

pub fn decode_query_port_status_req(buffer: &[u8]) -> Result<u8, NsmCodecError> {
    require_exact_len(buffer, HEADER_LEN + 1)?;
    Ok(buffer[HEADER_LEN])
}

pub fn encode_query_port_status_resp(
    instance_id: InstanceId,
    state: PortState,
    status: PortStatus,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_response_success(
        buffer,
        instance_id,
        MSG_TYPE,
        network_port_cmd::QUERY_PORT_STATUS,
        2,
    )?;
    require_len(buffer, offset + 2)?;
    buffer[offset] = state as u8;
    buffer[offset + 1] = status as u8;
    Ok(offset + 2)
}

pub fn decode_query_port_status_resp(
    buffer: &[u8],
) -> Result<(PortState, PortStatus), NsmCodecError> {
    let env = decode_response_envelope(buffer)?;
    if let Some(reason_code) = env.reason_code {
        return Err(NsmCodecError::CommandFail { reason_code });
    }
    if env.data_size < 2 {
        return Err(NsmCodecError::Data);
    }
    require_len(buffer, env.payload_offset + 2)?;
    Ok((
        PortState::try_from(buffer[env.payload_offset])?,
        PortStatus::try_from(buffer[env.payload_offset + 1])?,
    ))
}

// --- QueryPortCharacteristics ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PortCharacteristics {
    pub status: u32,
    pub line_rate_mbps: u32,
    pub data_rate_kbps: u32,
    pub status_lane_info: u32,
}

pub fn encode_query_port_characteristics_req(
    instance_id: InstanceId,
    port_number: u8,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_request_header(buffer, instance_id, MSG_TYPE)?;
    require_len(buffer, offset + 1)?;
    buffer[offset] = port_number;
    Ok(offset + 1)
}

pub fn decode_query_port_characteristics_req(buffer: &[u8]) -> Result<u8, NsmCodecError> {
    require_exact_len(buffer, HEADER_LEN + 1)?;
    Ok(buffer[HEADER_LEN])
}

pub fn encode_query_port_characteristics_resp(
    instance_id: InstanceId,
    characteristics: PortCharacteristics,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_response_success(
        buffer,
        instance_id,
        MSG_TYPE,
        network_port_cmd::QUERY_PORT_CHARACTERISTICS,
        16,
    )?;
    require_len(buffer, offset + 16)?;
    buffer[offset..offset + 4].copy_from_slice(&characteristics.status.to_le_bytes());
    buffer[offset + 4..offset + 8].copy_from_slice(&characteristics.line_rate_mbps.to_le_bytes());
    buffer[offset + 8..offset + 12].copy_from_slice(&characteristics.data_rate_kbps.to_le_bytes());
    buffer[offset + 12..offset + 16]
        .copy_from_slice(&characteristics.status_lane_info.to_le_bytes());
    Ok(offset + 16)
}

pub fn decode_query_port_characteristics_resp(
    buffer: &[u8],
) -> Result<PortCharacteristics, NsmCodecError> {
    let env = decode_response_envelope(buffer)?;
    if let Some(reason_code) = env.reason_code {
        return Err(NsmCodecError::CommandFail { reason_code });
    }
    if env.data_size < 16 {
        return Err(NsmCodecError::Data);
    }
    require_len(buffer, env.payload_offset + 16)?;
    let base = env.payload_offset;
    Ok(PortCharacteristics {
        status: u32::from_le_bytes(buffer[base..base + 4].try_into()?),
        line_rate_mbps: u32::from_le_bytes(buffer[base + 4..base + 8].try_into()?),
        data_rate_kbps: u32::from_le_bytes(buffer[base + 8..base + 12].try_into()?),
        status_lane_info: u32::from_le_bytes(buffer[base + 12..base + 16].try_into()?),
    })
}

// --- QueryPortsAvailable ---

pub fn encode_query_ports_available_req(
    instance_id: InstanceId,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    encode_request_header(buffer, instance_id, MSG_TYPE)
}

pub fn encode_query_ports_available_resp(
    instance_id: InstanceId,
    port_count: u8,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_response_success(
        buffer,
        instance_id,
        MSG_TYPE,
        network_port_cmd::QUERY_PORTS_AVAILABLE,
        1,
    )?;
    require_len(buffer, offset + 1)?;
    buffer[offset] = port_count;
    Ok(offset + 1)
}

pub fn decode_query_ports_available_resp(buffer: &[u8]) -> Result<u8, NsmCodecError> {
    let env = decode_response_envelope(buffer)?;
    if let Some(reason_code) = env.reason_code {
        return Err(NsmCodecError::CommandFail { reason_code });
    }
    require_len(buffer, env.payload_offset + 1)?;
    Ok(buffer[env.payload_offset])
}

// --- Set/Get System GUID ---

pub fn encode_get_system_guid_req(
    instance_id: InstanceId,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    encode_request_header(buffer, instance_id, MSG_TYPE)
}

pub fn encode_get_system_guid_resp(
    instance_id: InstanceId,
    guid: [u8; 8],
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset =
        encode_response_success(buffer, instance_id, MSG_TYPE, network_port_cmd::GET_SYSTEM_GUID, 8)?;
    require_len(buffer, offset + 8)?;
    buffer[offset..offset + 8].copy_from_slice(&guid);
    Ok(offset + 8)
}

pub fn decode_get_system_guid_resp(buffer: &[u8]) -> Result<[u8; 8], NsmCodecError> {
    let env = decode_response_envelope(buffer)?;
    if let Some(reason_code) = env.reason_code {
        return Err(NsmCodecError::CommandFail { reason_code });
    }
    if env.data_size < 8 {
        return Err(NsmCodecError::Data);
    }
    require_len(buffer, env.payload_offset + 8)?;
    Ok(buffer[env.payload_offset..env.payload_offset + 8].try_into()?)
}

pub fn encode_set_system_guid_req(
    instance_id: InstanceId,
    guid: [u8; 8],
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_request_header(buffer, instance_id, MSG_TYPE)?;
    require_len(buffer, offset + 8)?;
    buffer[offset..offset + 8].copy_from_slice(&guid);
    Ok(offset + 8)
}

pub fn decode_set_system_guid_req(buffer: &[u8]) -> Result<[u8; 8], NsmCodecError> {
    require_exact_len(buffer, HEADER_LEN + 8)?;
    Ok(buffer[HEADER_LEN..HEADER_LEN + 8].try_into()?)
}

pub fn encode_set_system_guid_resp(
    instance_id: InstanceId,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    encode_response_success(buffer, instance_id, MSG_TYPE, network_port_cmd::SET_SYSTEM_GUID, 0)
}

// --- Power mode ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PowerMode {
    Low = 0,
    High = 1,
}

pub fn encode_get_power_mode_req(
    instance_id: InstanceId,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    encode_request_header(buffer, instance_id, MSG_TYPE)
}

pub fn encode_get_power_mode_resp(
    instance_id: InstanceId,
    mode: PowerMode,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset =
        encode_response_success(buffer, instance_id, MSG_TYPE, network_port_cmd::GET_POWER_MODE, 1)?;
    require_len(buffer, offset + 1)?;
    buffer[offset] = mode as u8;
    Ok(offset + 1)
}

pub fn decode_get_power_mode_resp(buffer: &[u8]) -> Result<PowerMode, NsmCodecError> {
    let env = decode_response_envelope(buffer)?;
    if let Some(reason_code) = env.reason_code {
        return Err(NsmCodecError::CommandFail { reason_code });
    }
    require_len(buffer, env.payload_offset + 1)?;
    match buffer[env.payload_offset] {
        0 => Ok(PowerMode::Low),
        1 => Ok(PowerMode::High),
        _ => Err(NsmCodecError::Data),
    }
}

pub fn encode_set_power_mode_req(
    instance_id: InstanceId,
    mode: PowerMode,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_request_header(buffer, instance_id, MSG_TYPE)?;
    require_len(buffer, offset + 1)?;
    buffer[offset] = mode as u8;
    Ok(offset + 1)
}

pub fn decode_set_power_mode_req(buffer: &[u8]) -> Result<PowerMode, NsmCodecError> {
    require_exact_len(buffer, HEADER_LEN + 1)?;
    match buffer[HEADER_LEN] {
        0 => Ok(PowerMode::Low),
        1 => Ok(PowerMode::High),
        _ => Err(NsmCodecError::Data),
    }
}

pub fn encode_set_power_mode_resp(
    instance_id: InstanceId,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    encode_response_success(buffer, instance_id, MSG_TYPE, network_port_cmd::SET_POWER_MODE, 0)
}

// --- Port disable-future (link-disable-sticky / isolation mode) ---

/// Whether a port is disabled for future link bring-up attempts (persists across a
/// link reset, i.e. "sticky"), which is the mechanism spec.md's family list calls
/// both "link-disable-sticky" and "isolation mode" — a port with this set stays
/// isolated from the fabric until explicitly cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PortDisableFuture {
    Enabled = 0,
    Disabled = 1,
}

impl TryFrom<u8> for PortDisableFuture {
    type Error = NsmCodecError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PortDisableFuture::Enabled),
            1 => Ok(PortDisableFuture::Disabled),
            _ => Err(NsmCodecError::Data),
        }
    }
}

pub fn encode_get_port_disable_future_req(
    instance_id: InstanceId,
    port_number: u8,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_request_header(buffer, instance_id, MSG_TYPE)?;
    require_len(buffer, offset + 1)?;
    buffer[offset] = port_number;
    Ok(offset + 1)
}

pub fn decode_get_port_disable_future_req(buffer: &[u8]) -> Result<u8, NsmCodecError> {
    require_exact_len(buffer, HEADER_LEN + 1)?;
    Ok(buffer[HEADER_LEN])
}

pub fn encode_get_port_disable_future_resp(
    instance_id: InstanceId,
    state: PortDisableFuture,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_response_success(
        buffer,
        instance_id,
        MSG_TYPE,
        network_port_cmd::GET_PORT_DISABLE_FUTURE,
        1,
    )?;
    require_len(buffer, offset + 1)?;
    buffer[offset] = state as u8;
    Ok(offset + 1)
}

pub fn decode_get_port_disable_future_resp(buffer: &[u8]) -> Result<PortDisableFuture, NsmCodecError> {
    let env = decode_response_envelope(buffer)?;
    if let Some(reason_code) = env.reason_code {
        return Err(NsmCodecError::CommandFail { reason_code });
    }
    require_len(buffer, env.payload_offset + 1)?;
    PortDisableFuture::try_from(buffer[env.payload_offset])
}

pub fn encode_set_port_disable_future_req(
    instance_id: InstanceId,
    port_number: u8,
    state: PortDisableFuture,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let offset = encode_request_header(buffer, instance_id, MSG_TYPE)?;
    require_len(buffer, offset + 2)?;
    buffer[offset] = port_number;
    buffer[offset + 1] = state as u8;
    Ok(offset + 2)
}

pub fn decode_set_port_disable_future_req(
    buffer: &[u8],
) -> Result<(u8, PortDisableFuture), NsmCodecError> {
    require_exact_len(buffer, HEADER_LEN + 2)?;
    Ok((
        buffer[HEADER_LEN],
        PortDisableFuture::try_from(buffer[HEADER_LEN + 1])?,
    ))
}

pub fn encode_set_port_disable_future_resp(
    instance_id: InstanceId,
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    encode_response_success(
        buffer,
        instance_id,
        MSG_TYPE,
        network_port_cmd::SET_PORT_DISABLE_FUTURE,
        0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_telemetry_counters_scenario_from_spec() {
        // §8 scenario 2: supported_counter mask=0x003E5AF7, port_rcv_pkts=1,
        // port_rcv_data=2, ..., xmit_wait=25.
        let mut data = PortCounterData::default();
        data.set(PortCounter::PortRcvPkts, 1);
        data.set(PortCounter::PortRcvData, 2);
        data.set(PortCounter::XmitWait, 25);

        let mut buf = [0u8; 256];
        let n = encode_get_port_telemetry_counter_resp(1, &data, &mut buf).unwrap();
        let decoded = decode_get_port_telemetry_counter_resp(&buf[..n]).unwrap();

        assert_eq!(decoded.get(PortCounter::PortRcvPkts), Some(1));
        assert_eq!(decoded.get(PortCounter::PortRcvData), Some(2));
        assert_eq!(decoded.get(PortCounter::XmitWait), Some(25));
        // Unsupported counters must not be surfaced at all.
        assert_eq!(decoded.get(PortCounter::PortMalformedPkts), None);
    }

    #[test]
    fn port_telemetry_round_trip_all_counters() {
        let mut data = PortCounterData::default();
        for i in 0..NUM_PORT_COUNTERS {
            data.supported.0 |= 1 << i;
            data.values[i] = Some(i as u64 * 7);
        }
        let mut buf = [0u8; 256];
        let n = encode_get_port_telemetry_counter_resp(2, &data, &mut buf).unwrap();
        let decoded = decode_get_port_telemetry_counter_resp(&buf[..n]).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn port_status_round_trip() {
        let mut buf = [0u8; 32];
        let n = encode_query_port_status_resp(1, PortState::Up, PortStatus::Enabled, &mut buf).unwrap();
        assert_eq!(
            decode_query_port_status_resp(&buf[..n]).unwrap(),
            (PortState::Up, PortStatus::Enabled)
        );
    }

    #[test]
    fn port_characteristics_round_trip() {
        let characteristics = PortCharacteristics {
            status: 1,
            line_rate_mbps: 200_000,
            data_rate_kbps: 195_000,
            status_lane_info: 4,
        };
        let mut buf = [0u8; 32];
        let n = encode_query_port_characteristics_resp(1, characteristics, &mut buf).unwrap();
        assert_eq!(
            decode_query_port_characteristics_resp(&buf[..n]).unwrap(),
            characteristics
        );
    }

    #[test]
    fn system_guid_round_trip() {
        let guid = [1, 2, 3, 4, 5, 6, 7, 8];
        let mut buf = [0u8; 32];
        let n = encode_get_system_guid_resp(1, guid, &mut buf).unwrap();
        assert_eq!(decode_get_system_guid_resp(&buf[..n]).unwrap(), guid);

        let mut req = [0u8; 32];
        let n = encode_set_system_guid_req(1, guid, &mut req).unwrap();
        assert_eq!(decode_set_system_guid_req(&req[..n]).unwrap(), guid);
    }

    #[test]
    fn power_mode_round_trip() {
        let mut req = [0u8; 16];
        let n = encode_set_power_mode_req(1, PowerMode::High, &mut req).unwrap();
        assert_eq!(decode_set_power_mode_req(&req[..n]).unwrap(), PowerMode::High);

        let mut resp = [0u8; 16];
        let n = encode_get_power_mode_resp(1, PowerMode::Low, &mut resp).unwrap();
        assert_eq!(decode_get_power_mode_resp(&resp[..n]).unwrap(), PowerMode::Low);
    }

    #[test]
    fn port_disable_future_round_trip() {
        let mut req = [0u8; 16];
        let n = encode_set_port_disable_future_req(1, 3, PortDisableFuture::Disabled, &mut req).unwrap();
        assert_eq!(
            decode_set_port_disable_future_req(&req[..n]).unwrap(),
            (3, PortDisableFuture::Disabled)
        );

        let mut resp = [0u8; 16];
        let n = encode_get_port_disable_future_resp(1, PortDisableFuture::Enabled, &mut resp).unwrap();
        assert_eq!(
            decode_get_port_disable_future_resp(&resp[..n]).unwrap(),
            PortDisableFuture::Enabled
        );
    }
}
