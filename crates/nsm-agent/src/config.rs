//! Agent configuration (ambient stack addition, §2 "(ambient) Configuration").
//!
//! A `serde`-deserializable `AgentConfig` covers the process-wide tunables; the
//! per-sensor creation parameters from spec.md §6 ("Configuration inputs") are
//! fetched through the `ConfigSource` trait so the bundled TOML table can later be
//! swapped for a real EM-backed property store without touching the core.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

/// Top-level agent configuration, loaded from a TOML file at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Path to the `AF_UNIX`/`SOCK_SEQPACKET` MCTP demux socket (§6 "MCTP framing").
    #[serde(default = "default_mctp_socket_path")]
    pub mctp_socket_path: String,
    /// Local MCTP endpoint id the agent identifies itself with on connect.
    #[serde(default = "default_local_eid")]
    pub local_eid: u8,
    /// Retry count for non-long-running requests (§4.2 "Retries and timeouts").
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Per-attempt deadline in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Long-running companion deadline in milliseconds (§4.2 "Long-running companion").
    #[serde(default = "default_long_running_timeout_ms")]
    pub long_running_timeout_ms: u64,
    /// Polling-pass interval per device, in milliseconds (§4.7 step 2).
    #[serde(default = "default_polling_interval_ms")]
    pub polling_interval_ms: u64,
    /// Async set-operation result pool capacity (§3 "default 32").
    #[serde(default = "default_async_op_pool_capacity")]
    pub async_op_pool_capacity: usize,
    /// Tokio runtime flavor: `"current_thread"` or `"multi_thread"` (§5).
    #[serde(default = "default_runtime_flavor")]
    pub runtime_flavor: String,
    /// Instance-number remap table, keyed in priority order by `deviceInstanceId`,
    /// `eid`, then `uuid` stringified (§4.5 step 4); first match wins.
    #[serde(default)]
    pub instance_remap: HashMap<String, u8>,
    /// Seed discovery feed: the `(eid, uuid, medium, networkId, binding)` rows
    /// that would otherwise arrive from the out-of-scope MCTP topology service
    /// (§1 Non-goals, §4.5 step 1). Queued to the device manager at startup.
    #[serde(default)]
    pub discovery_targets: Vec<DiscoveryTargetConfig>,
    /// The bundled EM-PDI stand-in: one row per sensor/async-settable property
    /// object path, applied to every newly discovered device (§4.5 step 6, §6
    /// "Configuration inputs"). `build_config_source` turns these into the
    /// `ConfigKey`/`ConfigValue` pairs the sensor factory reads back out.
    #[serde(default = "default_sensors")]
    pub sensors: Vec<SensorRowConfig>,
}

/// One configured discovery seed row, TOML's equivalent of the MCTP
/// endpoint-discovery feed's per-endpoint tuple.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryTargetConfig {
    pub eid: u8,
    /// 32 lowercase hex characters, no separators.
    pub uuid: String,
    #[serde(default)]
    pub medium: String,
    #[serde(default)]
    pub network_id: u32,
    #[serde(default)]
    pub binding: String,
}

/// One configured sensor/async-settable-property object path, the TOML
/// equivalent of one EM PDI entry read by the original's
/// `nsmNumericSensorFactory` (`[[sensors]]` table, §6 "Configuration inputs").
/// `kind` selects the concrete codec/sink pair the sensor factory builds;
/// every other field parameterizes it and is otherwise opaque to this crate.
#[derive(Debug, Clone, Deserialize)]
pub struct SensorRowConfig {
    pub object_path: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub sensor_id: u8,
    #[serde(default)]
    pub priority: bool,
    /// Number of sensor-id-contiguous instances this row expands into (§6
    /// "Count"); 0 and 1 both mean "one instance".
    #[serde(default)]
    pub count: u8,
    #[serde(default)]
    pub averaging_interval: u8,
    #[serde(default)]
    pub long_running: bool,
    #[serde(default)]
    pub max_allowable_value: Option<f64>,
    #[serde(default)]
    pub physical_context: Option<String>,
    #[serde(default)]
    pub associations: Vec<String>,
}

fn default_mctp_socket_path() -> String {
    "\0mctp-pcie-mux".to_string()
}
fn default_local_eid() -> u8 {
    0x08
}
fn default_retries() -> u32 {
    3
}
fn default_request_timeout_ms() -> u64 {
    2_000
}
fn default_long_running_timeout_ms() -> u64 {
    30_000
}
fn default_polling_interval_ms() -> u64 {
    1_000
}
fn default_async_op_pool_capacity() -> usize {
    32
}
fn default_runtime_flavor() -> String {
    "multi_thread".to_string()
}

/// Baseline GPU sensor set so a freshly started `nsm-agentd` with no
/// operator-supplied config already reports telemetry, matching the
/// original's EM default match rules for a single-GPU baseboard
/// (`nsmNumericSensorFactory.hpp`'s object-path-per-sensor convention).
fn default_sensors() -> Vec<SensorRowConfig> {
    let gpu0 = "/xyz/openbmc_project/inventory/system/chassis/GPU0";
    vec![
        SensorRowConfig {
            object_path: gpu0.to_string(),
            kind: "Temperature".to_string(),
            name: "GPU0_TEMP".to_string(),
            sensor_id: 0,
            priority: true,
            count: 1,
            averaging_interval: 0,
            long_running: false,
            max_allowable_value: None,
            physical_context: Some("GPU".to_string()),
            associations: Vec::new(),
        },
        SensorRowConfig {
            object_path: gpu0.to_string(),
            kind: "PowerDraw".to_string(),
            name: "GPU0_POWER".to_string(),
            sensor_id: 0,
            priority: true,
            count: 1,
            averaging_interval: 0,
            long_running: false,
            max_allowable_value: None,
            physical_context: Some("GPU".to_string()),
            associations: Vec::new(),
        },
        SensorRowConfig {
            object_path: gpu0.to_string(),
            kind: "EnergyCount".to_string(),
            name: "GPU0_ENERGY".to_string(),
            sensor_id: 0,
            priority: false,
            count: 1,
            averaging_interval: 0,
            long_running: false,
            max_allowable_value: None,
            physical_context: Some("GPU".to_string()),
            associations: Vec::new(),
        },
        SensorRowConfig {
            object_path: gpu0.to_string(),
            kind: "Voltage".to_string(),
            name: "GPU0_VOLTAGE".to_string(),
            sensor_id: 0,
            priority: false,
            count: 1,
            averaging_interval: 0,
            long_running: false,
            max_allowable_value: None,
            physical_context: Some("GPU".to_string()),
            associations: Vec::new(),
        },
        SensorRowConfig {
            object_path: "/xyz/openbmc_project/inventory/system/chassis/GPU0/AltitudePressure".to_string(),
            kind: "AltitudePressure".to_string(),
            name: "GPU0_ALTITUDE_PRESSURE".to_string(),
            sensor_id: 0,
            priority: false,
            count: 1,
            averaging_interval: 0,
            long_running: false,
            max_allowable_value: None,
            physical_context: None,
            associations: Vec::new(),
        },
        SensorRowConfig {
            object_path: "/xyz/openbmc_project/inventory/system/chassis/GPU0/MigMode".to_string(),
            kind: "MigMode".to_string(),
            name: "GPU0_MIG_MODE".to_string(),
            sensor_id: 0,
            priority: true,
            count: 1,
            averaging_interval: 0,
            long_running: true,
            max_allowable_value: None,
            physical_context: None,
            associations: vec![gpu0.to_string()],
        },
        SensorRowConfig {
            object_path: "/xyz/openbmc_project/inventory/system/chassis/GPU0/EccMode".to_string(),
            kind: "EccMode".to_string(),
            name: "GPU0_ECC_MODE".to_string(),
            sensor_id: 0,
            priority: true,
            count: 1,
            averaging_interval: 0,
            long_running: true,
            max_allowable_value: None,
            physical_context: None,
            associations: vec![gpu0.to_string()],
        },
    ]
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            mctp_socket_path: default_mctp_socket_path(),
            local_eid: default_local_eid(),
            retries: default_retries(),
            request_timeout_ms: default_request_timeout_ms(),
            long_running_timeout_ms: default_long_running_timeout_ms(),
            polling_interval_ms: default_polling_interval_ms(),
            async_op_pool_capacity: default_async_op_pool_capacity(),
            runtime_flavor: default_runtime_flavor(),
            instance_remap: HashMap::new(),
            discovery_targets: Vec::new(),
            sensors: default_sensors(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: String, #[source] source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse { path: String, #[source] source: toml::de::Error },
}

impl AgentConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Per-sensor creation parameter key, `(objectPath, propertyName, interfaceName)`
/// per spec.md §6 "Configuration inputs".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigKey {
    pub object_path: String,
    pub property_name: String,
    pub interface_name: String,
}

/// A fetched configuration value; recognized keys per family are documented in
/// spec.md §6 (`Name`, `Type`, `UUID`, `InventoryObjPath`, `Priority`, `Count`,
/// `DeviceIndex`, `InstanceNumber`, `SensorId`, `AveragingInterval`,
/// `AggregateSensor`, `MaxAllowableValue`, `PhysicalContext`, `Associations`,
/// `LongRunning`). `UUID`/`InventoryObjPath`/`DeviceIndex`/`InstanceNumber` are
/// device-identity keys consumed by `DeviceManager::resolve_instance_number`
/// and the discovery path, not by the sensor factory.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Str(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    StrList(Vec<String>),
}

/// Abstract property-fetch interface (§4.5, §6). The real implementation (an
/// EM-style static configuration service) is out of scope; this repo ships an
/// in-memory table used by the reference binary and by tests.
pub trait ConfigSource: Send + Sync {
    fn get(&self, key: &ConfigKey) -> Option<ConfigValue>;
}

/// In-memory `ConfigSource` backed by a flat map, the bundled stand-in named in
/// SPEC_FULL.md §2.
#[derive(Debug, Default)]
pub struct StaticConfigSource {
    values: HashMap<ConfigKey, ConfigValue>,
}

impl StaticConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: ConfigKey, value: ConfigValue) -> &mut Self {
        self.values.insert(key, value);
        self
    }
}

impl ConfigSource for StaticConfigSource {
    fn get(&self, key: &ConfigKey) -> Option<ConfigValue> {
        self.values.get(key).cloned()
    }
}

/// Interface name every `SensorRowConfig`-derived key is published under.
/// The sensor factory looks nothing up directly from `AgentConfig`; this
/// constant is the only coupling point between the bundled TOML table and the
/// `ConfigSource` seam it is turned into.
pub const SENSOR_CONFIG_INTERFACE: &str = "xyz.openbmc_project.Configuration.NsmSensor";

/// Turns the bundled `[[sensors]]` TOML rows into the `ConfigSource` the
/// sensor factory reads from, one `ConfigKey` per recognized property name
/// (§6 "Configuration inputs"). This is the seam a real EM-backed
/// `ConfigSource` would replace without the factory changing at all.
pub fn build_config_source(rows: &[SensorRowConfig]) -> StaticConfigSource {
    let mut source = StaticConfigSource::new();
    for row in rows {
        let key = |property_name: &str| ConfigKey {
            object_path: row.object_path.clone(),
            property_name: property_name.to_string(),
            interface_name: SENSOR_CONFIG_INTERFACE.to_string(),
        };
        source.insert(key("Type"), ConfigValue::Str(row.kind.clone()));
        source.insert(key("Name"), ConfigValue::Str(row.name.clone()));
        source.insert(key("SensorId"), ConfigValue::Int(row.sensor_id as i64));
        source.insert(key("Priority"), ConfigValue::Bool(row.priority));
        source.insert(key("Count"), ConfigValue::Int(row.count as i64));
        source.insert(key("AveragingInterval"), ConfigValue::Int(row.averaging_interval as i64));
        source.insert(key("LongRunning"), ConfigValue::Bool(row.long_running));
        if let Some(max) = row.max_allowable_value {
            source.insert(key("MaxAllowableValue"), ConfigValue::Float(max));
        }
        if let Some(context) = &row.physical_context {
            source.insert(key("PhysicalContext"), ConfigValue::Str(context.clone()));
        }
        if !row.associations.is_empty() {
            source.insert(key("Associations"), ConfigValue::StrList(row.associations.clone()));
        }
    }
    source
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_values() {
        let config = AgentConfig::default();
        assert_eq!(config.retries, 3);
        assert_eq!(config.async_op_pool_capacity, 32);
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let config: AgentConfig = toml::from_str("local_eid = 30\nretries = 5\n").unwrap();
        assert_eq!(config.local_eid, 30);
        assert_eq!(config.retries, 5);
        assert_eq!(config.polling_interval_ms, 1_000);
    }

    #[test]
    fn static_config_source_roundtrip() {
        let mut source = StaticConfigSource::new();
        let key = ConfigKey {
            object_path: "/xyz/gpu0".to_string(),
            property_name: "Name".to_string(),
            interface_name: "xyz.nsm.Sensor".to_string(),
        };
        source.insert(key.clone(), ConfigValue::Str("gpu0_temp".to_string()));
        assert_eq!(source.get(&key), Some(ConfigValue::Str("gpu0_temp".to_string())));
    }
}
