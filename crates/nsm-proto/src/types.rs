//! Primitive aliases and protocol-wide identifiers for the NSM wire format.

use core::convert::TryFrom;

/// NSM instance ID space is 5 bits wide (0..=31).
pub type InstanceId = u8;

/// MCTP Endpoint ID, assigned by the MCTP layer.
pub type Eid = u8;

/// Maximum value an instance id may take (5-bit field).
pub const MAX_INSTANCE_ID: InstanceId = 0x1F;

/// MCTP message type byte for NVIDIA Vendor-Defined Messages (VDM, PCI based).
pub const MCTP_MSG_TYPE_VDM: u8 = 0x7E;

/// OEM/PCI vendor id NSM headers are stamped with (placeholder NVIDIA class value).
pub const NSM_PCI_VENDOR_ID: u8 = 0xDE;

/// Direction bit carried in the NSM header (byte 1, bit 7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Direction {
    Request = 0,
    Response = 1,
    Event = 2,
}

impl TryFrom<u8> for Direction {
    type Error = InvalidEnumValueError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Direction::Request),
            1 => Ok(Direction::Response),
            2 => Ok(Direction::Event),
            _ => Err(InvalidEnumValueError),
        }
    }
}

/// Marker error for an enum value that does not correspond to any known variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidEnumValueError;

/// The NVIDIA message type byte (command family selector), header byte 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    DeviceCapabilityDiscovery = 0x00,
    NetworkPort = 0x01,
    PlatformEnvironmental = 0x03,
    PciLink = 0x04,
    Diagnostics = 0x05,
    Firmware = 0x06,
}

impl TryFrom<u8> for MessageType {
    type Error = InvalidEnumValueError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(MessageType::DeviceCapabilityDiscovery),
            0x01 => Ok(MessageType::NetworkPort),
            0x03 => Ok(MessageType::PlatformEnvironmental),
            0x04 => Ok(MessageType::PciLink),
            0x05 => Ok(MessageType::Diagnostics),
            0x06 => Ok(MessageType::Firmware),
            _ => Err(InvalidEnumValueError),
        }
    }
}

/// Number of message-type columns in the capability matrix (§3 Device).
pub const NUM_MESSAGE_TYPES: usize = 7;
/// Number of command-code rows in the capability matrix (§3 Device).
pub const NUM_COMMAND_CODES: usize = 256;

/// NSM completion codes (response byte 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompletionCode {
    Success = 0x00,
    Accepted = 0x01,
    ErrNotReady = 0x02,
    ErrUnsupportedCommandCode = 0x03,
    ErrInvalidData = 0x04,
    ErrInvalidDataLength = 0x05,
    ErrNotSupported = 0x06,
}

impl CompletionCode {
    pub fn is_success(self) -> bool {
        matches!(self, CompletionCode::Success)
    }

    pub fn is_accepted(self) -> bool {
        matches!(self, CompletionCode::Accepted)
    }
}

impl TryFrom<u8> for CompletionCode {
    type Error = InvalidEnumValueError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(CompletionCode::Success),
            0x01 => Ok(CompletionCode::Accepted),
            0x02 => Ok(CompletionCode::ErrNotReady),
            0x03 => Ok(CompletionCode::ErrUnsupportedCommandCode),
            0x04 => Ok(CompletionCode::ErrInvalidData),
            0x05 => Ok(CompletionCode::ErrInvalidDataLength),
            0x06 => Ok(CompletionCode::ErrNotSupported),
            _ => Err(InvalidEnumValueError),
        }
    }
}

/// Device type as reported by `QueryDeviceIdentification` (§3 Device).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DeviceType {
    Gpu = 0,
    Switch = 1,
    PcieBridge = 2,
    Baseboard = 3,
    Erot = 4,
    Unknown = 0xFF,
}

impl From<u8> for DeviceType {
    fn from(value: u8) -> Self {
        match value {
            0 => DeviceType::Gpu,
            1 => DeviceType::Switch,
            2 => DeviceType::PcieBridge,
            3 => DeviceType::Baseboard,
            4 => DeviceType::Erot,
            _ => DeviceType::Unknown,
        }
    }
}

/// Command codes for the device-capability-discovery family (0x00).
pub mod discovery_cmd {
    pub const PING: u8 = 0x00;
    pub const GET_SUPPORTED_NVIDIA_MESSAGE_TYPES: u8 = 0x01;
    pub const GET_SUPPORTED_COMMAND_CODES: u8 = 0x02;
    pub const QUERY_DEVICE_IDENTIFICATION: u8 = 0x03;
    pub const EVENT_SUBSCRIBE: u8 = 0x04;
    pub const GET_CURRENT_EVENT_SOURCES: u8 = 0x05;
    pub const CONFIGURE_EVENT_ACKNOWLEDGEMENT: u8 = 0x06;
}

/// Command codes for the network-port family (0x01).
pub mod network_port_cmd {
    pub const GET_PORT_TELEMETRY_COUNTER: u8 = 0x00;
    pub const QUERY_PORT_STATUS: u8 = 0x01;
    pub const QUERY_PORT_CHARACTERISTICS: u8 = 0x02;
    pub const QUERY_PORTS_AVAILABLE: u8 = 0x03;
    pub const GET_PORT_DISABLE_FUTURE: u8 = 0x04;
    pub const SET_PORT_DISABLE_FUTURE: u8 = 0x05;
    pub const GET_SYSTEM_GUID: u8 = 0x06;
    pub const SET_SYSTEM_GUID: u8 = 0x07;
    pub const GET_POWER_MODE: u8 = 0x0B;
    pub const SET_POWER_MODE: u8 = 0x0A;
}

/// Command codes for the platform-environmental family (0x03).
pub mod platform_env_cmd {
    pub const GET_INVENTORY_INFORMATION: u8 = 0x00;
    pub const GET_TEMPERATURE_READING: u8 = 0x01;
    pub const GET_POWER_SUPPLY_STATUS: u8 = 0x02;
    pub const GET_GPU_PRESENCE_AND_POWER_STATUS: u8 = 0x03;
    pub const GET_CURRENT_POWER_DRAW: u8 = 0x04;
    pub const GET_ENERGY_COUNT: u8 = 0x05;
    pub const GET_VOLTAGE: u8 = 0x06;
    pub const GET_ALTITUDE_PRESSURE: u8 = 0x07;
    pub const GET_DRIVER_INFO: u8 = 0x08;
    pub const GET_MIG_MODE: u8 = 0x09;
    pub const SET_MIG_MODE: u8 = 0x0A;
    pub const GET_ECC_MODE: u8 = 0x0B;
    pub const SET_ECC_MODE: u8 = 0x0C;
    pub const GET_PROGRAMMABLE_EDPP_SCALING_FACTOR: u8 = 0x0D;
    pub const GET_CLOCK_LIMIT: u8 = 0x0E;
    pub const GET_CURRENT_CLOCK_FREQUENCY: u8 = 0x0F;
    pub const GET_ACCUMULATED_GPU_UTILIZATION_TIME: u8 = 0x10;
    pub const GET_ROW_REMAPPING_STATE: u8 = 0x11;
    pub const GET_MEMORY_CAPACITY_UTILIZATION: u8 = 0x12;
    pub const AGGREGATE_TEMPERATURE_AND_VOLTAGE: u8 = 0x13;
    pub const AGGREGATE_ENERGY_AND_POWER: u8 = 0x14;
}

/// Command codes for the PCIe link family (0x04).
pub mod pci_link_cmd {
    pub const QUERY_SCALAR_GROUP_TELEMETRY: u8 = 0x00;
    pub const CLEAR_DATA_SOURCE_V1: u8 = 0x01;
    pub const ASSERT_PCIE_FUNDAMENTAL_RESET: u8 = 0x02;
}

/// Command codes for the diagnostics family (0x05).
pub mod diagnostics_cmd {
    pub const GET_FPGA_DIAGNOSTICS_SETTINGS: u8 = 0x00;
    pub const ENABLE_DISABLE_WRITE_PROTECT: u8 = 0x01;
    pub const GET_GPU_IST_MODE: u8 = 0x02;
    pub const SET_GPU_IST_MODE: u8 = 0x03;
    pub const READ_THERMAL_PARAMETER: u8 = 0x04;
}

/// Command codes for the firmware/security family (0x06).
pub mod firmware_cmd {
    pub const QUERY_EROT_STATE_PARAMETERS: u8 = 0x00;
    pub const QUERY_FIRMWARE_SECURITY_VERSION: u8 = 0x01;
    pub const UPDATE_FIRMWARE_SECURITY_VERSION: u8 = 0x02;
    pub const IRREVERSIBLE_CONFIG_REQUEST: u8 = 0x03;
}

/// FRU inventory property identifiers used by `GetInventoryInformation` (§4.5 step 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InventoryProperty {
    BoardPartNumber = 0,
    SerialNumber = 1,
    MarketingName = 2,
    DeviceGuid = 3,
    BuildDate = 4,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_round_trips() {
        assert_eq!(Direction::try_from(0), Ok(Direction::Request));
        assert_eq!(Direction::try_from(1), Ok(Direction::Response));
        assert_eq!(Direction::try_from(2), Ok(Direction::Event));
        assert!(Direction::try_from(3).is_err());
    }

    #[test]
    fn completion_code_round_trips() {
        assert!(CompletionCode::try_from(0x00).unwrap().is_success());
        assert!(CompletionCode::try_from(0x01).unwrap().is_accepted());
        assert!(CompletionCode::try_from(0x07).is_err());
    }

    #[test]
    fn device_type_unknown_is_fallback() {
        assert_eq!(DeviceType::from(200), DeviceType::Unknown);
        assert_eq!(DeviceType::from(1), DeviceType::Switch);
    }
}
