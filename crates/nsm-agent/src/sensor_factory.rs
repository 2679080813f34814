//! Sensor factory: bring-up wiring that turns configured object paths into
//! concrete sensors and async set-operation handlers (§4.5 step 6, §6
//! "Configuration inputs").
//!
//! Grounded on `original_source/nsmd/nsmNumericSensor/nsmNumericSensorFactory.hpp`'s
//! `Type`-dispatched `make(manager, interface, objPath)` and
//! `original_source/nsmd/sensorManager.hpp`'s "register callback function to
//! create sensor when there is new NSM device inventory added to D-Bus". Every
//! parameter is read through `ConfigSource::get`, never from `AgentConfig`
//! directly, so the bundled TOML table stays swappable for a real EM-backed
//! store without this module changing.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use nsm_proto::codec::{diagnostics, pci_link, platform_env};
use nsm_proto::types::InstanceId;
use nsm_proto::NsmCodecError;

use crate::async_op::{AsyncOpValue, AsyncOperationManager, AsyncSetOperationHandler, AsyncSetOperationInfo};
use crate::config::{ConfigKey, ConfigSource, ConfigValue, SENSOR_CONFIG_INTERFACE};
use crate::device_manager::Device;
use crate::error::AsyncOpError;
use crate::model::{CompositeValueSink, LoggingStatusSink, LoggingValueSink, PeakValueSink};
use crate::sensor::{EncodeRequestFn, LongRunningSensor, PolledSensor, ReadingSink, Sensor, SensorContext};

/// Interface names the async-settable boolean properties are published under.
/// `GpuIstMode`/`PcieFundamentalReset` stand in for device-family operations
/// spec.md's scenarios don't name a wire codec for (EGM mode, error
/// injection, CPU operating config) -- see DESIGN.md.
mod interfaces {
    pub const MIG_MODE: &str = "com.nvidia.MigMode";
    pub const ECC_MODE: &str = "xyz.openbmc_project.Memory.MemoryECC";
    pub const GPU_IST_MODE: &str = "com.nvidia.GpuIstMode";
    pub const PCIE_FUNDAMENTAL_RESET: &str = "com.nvidia.PcieFundamentalReset";
}

/// A device's sensor lists are flat vectors of this plus a scheduling
/// discipline; this is only the in-flight placement decision, not stored
/// anywhere past `populate`.
#[derive(Clone, Copy)]
enum Placement {
    Static,
    Priority,
    RoundRobin,
    CapabilityRefresh,
}

fn clamp(value: f64, max: Option<f64>) -> f64 {
    match max {
        Some(max) => value.min(max),
        None => value,
    }
}

/// Only suffixes `name` with the `Count`-expansion offset when there's more
/// than one instance, so the common single-instance row keeps its plain name.
fn indexed_name(name: &str, offset: u8, total: u8) -> String {
    if total > 1 {
        format!("{name}[{offset}]")
    } else {
        name.to_string()
    }
}

type EncodeSetFn = fn(InstanceId, bool, &mut [u8]) -> Result<usize, NsmCodecError>;

/// Drives a boolean mode's set round trip through C8, the same way the
/// original's `setMigModeEnabled`/`setECCModeOnDevice` decode the DBus
/// variant, encode the device-facing request, and round-trip it
/// (`original_source/nsmd/nsmSetAsync/nsmSetMigMode.{hpp,cpp}`). `encode_set`
/// is captured at registration time since `AsyncSetOperationHandler::handle`
/// is not given a `SensorContext`.
struct BoolModeHandler {
    name: String,
    encode_set: EncodeSetFn,
    context: SensorContext,
}

#[async_trait]
impl AsyncSetOperationHandler for BoolModeHandler {
    async fn handle(&self, value: &AsyncOpValue, _device: &Arc<Device>) -> Result<(), AsyncOpError> {
        let enable = match value {
            AsyncOpValue::Bool(enable) => *enable,
            _ => return Err(AsyncOpError::InvalidArgument),
        };
        let encode_set = self.encode_set;
        let sensor = LongRunningSensor::new(
            self.name.clone(),
            Box::new(move |instance_id, buf| encode_set(instance_id, enable, buf)),
            |_bytes: &[u8]| Ok(()),
        );
        sensor.execute(&self.context).await
    }
}

/// Builds sensors and registers async set-operations for one device's
/// configured object paths (§4.5 step 6).
pub struct SensorFactory {
    config: Arc<dyn ConfigSource>,
    async_ops: Arc<AsyncOperationManager>,
}

impl SensorFactory {
    pub fn new(config: Arc<dyn ConfigSource>, async_ops: Arc<AsyncOperationManager>) -> Self {
        Self { config, async_ops }
    }

    fn get(&self, object_path: &str, property_name: &str) -> Option<ConfigValue> {
        self.config.get(&ConfigKey {
            object_path: object_path.to_string(),
            property_name: property_name.to_string(),
            interface_name: SENSOR_CONFIG_INTERFACE.to_string(),
        })
    }

    fn get_str(&self, object_path: &str, property_name: &str) -> Option<String> {
        match self.get(object_path, property_name)? {
            ConfigValue::Str(s) => Some(s),
            _ => None,
        }
    }

    fn get_str_list(&self, object_path: &str, property_name: &str) -> Vec<String> {
        match self.get(object_path, property_name) {
            Some(ConfigValue::StrList(list)) => list,
            _ => Vec::new(),
        }
    }

    fn get_bool(&self, object_path: &str, property_name: &str) -> bool {
        matches!(self.get(object_path, property_name), Some(ConfigValue::Bool(true)))
    }

    fn get_int(&self, object_path: &str, property_name: &str) -> Option<i64> {
        match self.get(object_path, property_name)? {
            ConfigValue::Int(i) => Some(i),
            _ => None,
        }
    }

    fn get_float(&self, object_path: &str, property_name: &str) -> Option<f64> {
        match self.get(object_path, property_name)? {
            ConfigValue::Float(f) => Some(f),
            _ => None,
        }
    }

    fn max_allowable(&self, object_path: &str) -> Option<f64> {
        self.get_float(object_path, "MaxAllowableValue")
    }

    /// `Count` contiguous `SensorId`-offset instances this row expands into;
    /// 0 and 1 both mean one instance (§6 "Count").
    fn instance_count(&self, object_path: &str) -> u8 {
        match self.get_int(object_path, "Count") {
            Some(n) if n > 1 => n as u8,
            _ => 1,
        }
    }

    fn reading_sink(&self, name: &str) -> ReadingSink {
        ReadingSink {
            value: Arc::new(
                CompositeValueSink::new()
                    .push(Arc::new(LoggingValueSink::new(name.to_string())))
                    .push(Arc::new(PeakValueSink::new())),
            ),
            status: Arc::new(LoggingStatusSink::new(name.to_string())),
        }
    }

    /// Builds every sensor named by `object_paths` and installs them into
    /// `device`'s four scheduling lists, registering any async set-operation
    /// a `LongRunning` row calls for against `self`'s dispatcher (§4.5 step 6,
    /// §4.7, §4.8 "Handler registration").
    pub async fn populate(&self, device: &Arc<Device>, ctx: &SensorContext, object_paths: &[String]) {
        let mut static_sensors = Vec::new();
        let mut priority_sensors = Vec::new();
        let mut round_robin_sensors = Vec::new();
        let mut capability_refresh_sensors = Vec::new();

        for object_path in object_paths {
            let Some(kind) = self.get_str(object_path, "Type") else {
                debug!("sensor_factory: no Type configured for {object_path}, skipping");
                continue;
            };
            let physical_context = self.get_str(object_path, "PhysicalContext");
            let associations = self.get_str_list(object_path, "Associations");
            debug!(
                "sensor_factory: building {kind} at {object_path} (physical_context={physical_context:?}, associations={associations:?})"
            );

            for (sensor, placement) in self.build_for_row(object_path, &kind, device, ctx) {
                match placement {
                    Placement::Static => static_sensors.push(sensor),
                    Placement::Priority => priority_sensors.push(sensor),
                    Placement::RoundRobin => round_robin_sensors.push(sensor),
                    Placement::CapabilityRefresh => capability_refresh_sensors.push(sensor),
                }
            }
        }

        let mut sensors = device.sensors.lock().await;
        sensors.static_sensors = static_sensors;
        sensors.priority_sensors = priority_sensors;
        sensors.round_robin_sensors = round_robin_sensors;
        sensors.capability_refresh_sensors = capability_refresh_sensors;
    }

    fn build_for_row(
        &self,
        object_path: &str,
        kind: &str,
        device: &Arc<Device>,
        ctx: &SensorContext,
    ) -> Vec<(Arc<Sensor>, Placement)> {
        let name = self.get_str(object_path, "Name").unwrap_or_else(|| object_path.to_string());
        let metric_placement = if self.get_bool(object_path, "Priority") {
            Placement::Priority
        } else {
            Placement::RoundRobin
        };

        match kind {
            "Temperature" => {
                let base_sensor_id = self.get_int(object_path, "SensorId").unwrap_or(0) as u8;
                let max = self.max_allowable(object_path);
                let total = self.instance_count(object_path);
                (0..total)
                    .map(|offset| {
                        let sensor_id = base_sensor_id.wrapping_add(offset);
                        let sensor_name = indexed_name(&name, offset, total);
                        let sink = self.reading_sink(&sensor_name);
                        let sensor = Arc::new(Sensor::Polled(PolledSensor::new(
                            sensor_name,
                            Box::new(move |instance_id, buf| {
                                platform_env::encode_get_temperature_reading_req(instance_id, sensor_id, buf)
                            }) as EncodeRequestFn,
                            move |bytes: &[u8]| {
                                platform_env::decode_get_temperature_reading_resp(bytes).map(|v| clamp(v as f64, max))
                            },
                            sink,
                        )));
                        (sensor, metric_placement)
                    })
                    .collect()
            }
            "PowerDraw" => {
                let base_sensor_id = self.get_int(object_path, "SensorId").unwrap_or(0) as u8;
                let averaging_interval = self.get_int(object_path, "AveragingInterval").unwrap_or(0) as u8;
                let max = self.max_allowable(object_path);
                let total = self.instance_count(object_path);
                (0..total)
                    .map(|offset| {
                        let sensor_id = base_sensor_id.wrapping_add(offset);
                        let sensor_name = indexed_name(&name, offset, total);
                        let sink = self.reading_sink(&sensor_name);
                        let sensor = Arc::new(Sensor::Polled(PolledSensor::new(
                            sensor_name,
                            Box::new(move |instance_id, buf| {
                                platform_env::encode_get_current_power_draw_req(instance_id, sensor_id, averaging_interval, buf)
                            }) as EncodeRequestFn,
                            move |bytes: &[u8]| {
                                platform_env::decode_get_current_power_draw_resp(bytes).map(|v| clamp(v as f64, max))
                            },
                            sink,
                        )));
                        (sensor, metric_placement)
                    })
                    .collect()
            }
            "EnergyCount" => {
                let base_sensor_id = self.get_int(object_path, "SensorId").unwrap_or(0) as u8;
                let max = self.max_allowable(object_path);
                let total = self.instance_count(object_path);
                (0..total)
                    .map(|offset| {
                        let sensor_id = base_sensor_id.wrapping_add(offset);
                        let sensor_name = indexed_name(&name, offset, total);
                        let sink = self.reading_sink(&sensor_name);
                        let sensor = Arc::new(Sensor::Polled(PolledSensor::new(
                            sensor_name,
                            Box::new(move |instance_id, buf| {
                                platform_env::encode_get_energy_count_req(instance_id, sensor_id, buf)
                            }) as EncodeRequestFn,
                            move |bytes: &[u8]| platform_env::decode_get_energy_count_resp(bytes).map(|v| clamp(v as f64, max)),
                            sink,
                        )));
                        (sensor, metric_placement)
                    })
                    .collect()
            }
            "Voltage" => {
                let base_sensor_id = self.get_int(object_path, "SensorId").unwrap_or(0) as u8;
                let max = self.max_allowable(object_path);
                let total = self.instance_count(object_path);
                (0..total)
                    .map(|offset| {
                        let sensor_id = base_sensor_id.wrapping_add(offset);
                        let sensor_name = indexed_name(&name, offset, total);
                        let sink = self.reading_sink(&sensor_name);
                        let sensor = Arc::new(Sensor::Polled(PolledSensor::new(
                            sensor_name,
                            Box::new(move |instance_id, buf| platform_env::encode_get_voltage_req(instance_id, sensor_id, buf))
                                as EncodeRequestFn,
                            move |bytes: &[u8]| platform_env::decode_get_voltage_resp(bytes).map(|v| clamp(v as f64, max)),
                            sink,
                        )));
                        (sensor, metric_placement)
                    })
                    .collect()
            }
            "AltitudePressure" => {
                let sink = self.reading_sink(&name);
                let sensor = Arc::new(Sensor::Polled(PolledSensor::new(
                    name,
                    Box::new(|instance_id, buf| platform_env::encode_get_altitude_pressure_req(instance_id, buf)) as EncodeRequestFn,
                    |bytes: &[u8]| platform_env::decode_get_altitude_pressure_resp(bytes).map(|v| v as f64),
                    sink,
                )));
                vec![(sensor, Placement::Static)]
            }
            "MigMode" => vec![self.build_bool_mode(
                object_path,
                &name,
                device,
                ctx,
                interfaces::MIG_MODE,
                platform_env::encode_get_mig_mode_req,
                platform_env::decode_get_mig_mode_resp,
                platform_env::encode_set_mig_mode_req,
            )],
            "EccMode" => vec![self.build_bool_mode(
                object_path,
                &name,
                device,
                ctx,
                interfaces::ECC_MODE,
                platform_env::encode_get_ecc_mode_req,
                platform_env::decode_get_ecc_mode_resp,
                platform_env::encode_set_ecc_mode_req,
            )],
            "GpuIstMode" => vec![self.build_bool_mode(
                object_path,
                &name,
                device,
                ctx,
                interfaces::GPU_IST_MODE,
                diagnostics::encode_get_gpu_ist_mode_req,
                diagnostics::decode_get_gpu_ist_mode_resp,
                diagnostics::encode_set_gpu_ist_mode_req,
            )],
            "PcieFundamentalReset" => {
                if self.get_bool(object_path, "LongRunning") {
                    self.register_handler(
                        object_path,
                        &name,
                        device,
                        ctx,
                        interfaces::PCIE_FUNDAMENTAL_RESET,
                        pci_link::encode_assert_pcie_fundamental_reset_req,
                        None,
                    );
                }
                Vec::new()
            }
            other => {
                warn!("sensor_factory: unrecognized sensor Type {other:?} at {object_path}, skipping");
                Vec::new()
            }
        }
    }

    /// Builds the GET-polled sensor for a boolean mode (re-run on capability
    /// refresh, §4.5 step 5) and, if the row is `LongRunning`, registers the
    /// matching async SET handler against it.
    #[allow(clippy::too_many_arguments)]
    fn build_bool_mode(
        &self,
        object_path: &str,
        name: &str,
        device: &Arc<Device>,
        ctx: &SensorContext,
        interface: &str,
        encode_get: impl Fn(InstanceId, &mut [u8]) -> Result<usize, NsmCodecError> + Send + Sync + 'static,
        decode_get: fn(&[u8]) -> Result<bool, NsmCodecError>,
        encode_set: EncodeSetFn,
    ) -> (Arc<Sensor>, Placement) {
        let sink = self.reading_sink(name);
        let get_sensor = Arc::new(Sensor::Polled(PolledSensor::new(
            name.to_string(),
            Box::new(encode_get) as EncodeRequestFn,
            move |bytes: &[u8]| decode_get(bytes).map(|enabled| if enabled { 1.0 } else { 0.0 }),
            sink,
        )));

        if self.get_bool(object_path, "LongRunning") {
            self.register_handler(object_path, name, device, ctx, interface, encode_set, Some(get_sensor.clone()));
        }

        (get_sensor, Placement::CapabilityRefresh)
    }

    #[allow(clippy::too_many_arguments)]
    fn register_handler(
        &self,
        object_path: &str,
        name: &str,
        device: &Arc<Device>,
        ctx: &SensorContext,
        interface: &str,
        encode_set: EncodeSetFn,
        sensor: Option<Arc<Sensor>>,
    ) {
        let handler = Arc::new(BoolModeHandler {
            name: name.to_string(),
            encode_set,
            context: ctx.clone(),
        });
        let dispatcher = self.async_ops.dispatcher(object_path);
        dispatcher.add_async_set_operation(
            interface,
            "Enabled",
            AsyncSetOperationInfo {
                handler,
                sensor,
                device: device.clone(),
                context: ctx.clone(),
            },
        );
    }
}
