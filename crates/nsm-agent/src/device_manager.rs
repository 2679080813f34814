//! Device manager (C5, §4.5).
//!
//! A single background task drains a FIFO of discovery inputs one at a time,
//! matching the original's `discoverNsmDeviceTask`: ping, then either refresh an
//! already-known device by UUID or resolve identity through
//! `QueryDeviceIdentification`, apply the instance-number remap, record the FRU
//! inventory, and run one sensor pass (`original_source/nsmd/deviceManager.cpp`).
//! The per-device scheduler (C7) owns the device's steady-state polling after
//! that first pass; this module only drives bring-up and offline/online
//! transitions.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use nsm_proto::codec::discovery::{
    decode_ping_resp, decode_query_device_identification_resp, decode_get_supported_command_codes_resp,
    decode_get_supported_message_types_resp, encode_get_supported_command_codes_req,
    encode_get_supported_message_types_req, encode_ping_req, encode_query_device_identification_req,
    SupportedCommandCodes,
};
use nsm_proto::codec::platform_env::{
    decode_get_inventory_information_resp_bytes, decode_get_inventory_information_resp_string,
    encode_get_inventory_information_req,
};
use nsm_proto::model::{DeviceIdentity, DeviceLifecycle, DeviceUuid, FruInventory};
use nsm_proto::types::{DeviceType, Eid, InventoryProperty, MessageType, NUM_MESSAGE_TYPES};
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};

use crate::error::{DeviceManagerError, TransportError};
use crate::events::EventDispatcher;
use crate::exchange;
use crate::scheduler::DeviceScheduler;
use crate::sensor::Sensor;
use crate::timing::DeviceSemaphore;
use crate::transport::MctpTransport;

/// One row out of the MCTP endpoint-discovery feed (§4.5 step 1, "`(eid, uuid,
/// medium, networkId, binding)`"). The medium/binding/network-id fields are
/// opaque to this agent (§1 Non-goals: MCTP topology management) and are kept
/// only to echo into the eid table.
#[derive(Debug, Clone)]
pub struct DiscoveryInput {
    pub eid: Eid,
    pub uuid: DeviceUuid,
    pub medium: String,
    pub network_id: u32,
    pub binding: String,
}

/// The 256-bit/32-byte-per-message-type capability matrix built from
/// `GetSupportedNvidiaMessageTypes` + `GetSupportedCommandCodes` (§4.5 step 5,
/// §3 "Device: capability matrix").
#[derive(Debug, Clone, Default)]
pub struct CapabilityMatrix {
    per_message_type: [Option<SupportedCommandCodes>; NUM_MESSAGE_TYPES],
}

impl CapabilityMatrix {
    pub fn supports(&self, message_type: MessageType, command_code: u8) -> bool {
        self.per_message_type
            .get(message_type as usize)
            .and_then(|codes| codes.as_ref())
            .is_some_and(|codes| codes.supports(command_code))
    }

    fn set_message_type(&mut self, message_type: u8, codes: SupportedCommandCodes) {
        if let Some(slot) = self.per_message_type.get_mut(message_type as usize) {
            *slot = Some(codes);
        }
    }

    fn clear(&mut self) {
        self.per_message_type = Default::default();
    }
}

/// Sensors partitioned by the scheduling discipline the scheduler (C7) applies
/// to them (§4.7 "one tokio task per device ... static sensors once at
/// bring-up, then interleave priority sensors with a round-robin pass").
#[derive(Default)]
pub struct DeviceSensors {
    pub static_sensors: Vec<Arc<Sensor>>,
    pub priority_sensors: Vec<Arc<Sensor>>,
    pub round_robin_sensors: Vec<Arc<Sensor>>,
    /// Re-run every time the capability matrix is refreshed (§4.5 step 5, after
    /// `updateNsmDevice`'s capability query).
    pub capability_refresh_sensors: Vec<Arc<Sensor>>,
}

/// Everything the agent tracks about one discovered device (§3 "Device").
pub struct Device {
    pub identity: std::sync::Mutex<DeviceIdentity>,
    pub lifecycle: std::sync::Mutex<DeviceLifecycle>,
    pub capabilities: std::sync::Mutex<CapabilityMatrix>,
    pub fru: std::sync::Mutex<FruInventory>,
    pub sensors: AsyncMutex<DeviceSensors>,
    pub semaphore: Arc<DeviceSemaphore>,
    /// Broadcasts online/offline transitions to the device's scheduler loop.
    pub online: watch::Sender<bool>,
    /// Set once the steady-state scheduler (C7) has been spawned for this
    /// device, so a later re-discovery (UUID match) does not spawn a second
    /// competing loop over the same sensor lists.
    scheduler_spawned: std::sync::atomic::AtomicBool,
    /// Set once the sensor factory has populated this device's sensor lists,
    /// so a later re-discovery does not rebuild (and re-register async-op
    /// handlers for) the same object paths a second time.
    sensors_built: std::sync::atomic::AtomicBool,
}

impl Device {
    fn new(identity: DeviceIdentity) -> Arc<Self> {
        let (online_tx, _online_rx) = watch::channel(false);
        Arc::new(Self {
            identity: std::sync::Mutex::new(identity),
            lifecycle: std::sync::Mutex::new(DeviceLifecycle::Inactive),
            capabilities: std::sync::Mutex::new(CapabilityMatrix::default()),
            fru: std::sync::Mutex::new(FruInventory::default()),
            sensors: AsyncMutex::new(DeviceSensors::default()),
            semaphore: Arc::new(DeviceSemaphore::new()),
            online: online_tx,
            scheduler_spawned: std::sync::atomic::AtomicBool::new(false),
            sensors_built: std::sync::atomic::AtomicBool::new(false),
        })
    }

    pub fn eid(&self) -> Eid {
        self.identity.lock().expect("device identity mutex poisoned").eid
    }

    pub fn online_rx(&self) -> watch::Receiver<bool> {
        self.online.subscribe()
    }

    fn mark_online(&self) {
        *self.lifecycle.lock().expect("device lifecycle mutex poisoned") = DeviceLifecycle::ActiveOnline;
        let _ = self.online.send(true);
    }

    fn mark_offline(&self) {
        *self.lifecycle.lock().expect("device lifecycle mutex poisoned") = DeviceLifecycle::ActiveOffline;
        let _ = self.online.send(false);
    }
}

/// The inventory properties populated during bring-up (§4.5 step 5).
const FRU_PROPERTIES: [InventoryProperty; 5] = [
    InventoryProperty::BoardPartNumber,
    InventoryProperty::SerialNumber,
    InventoryProperty::MarketingName,
    InventoryProperty::DeviceGuid,
    InventoryProperty::BuildDate,
];

/// Owns the discovery FIFO, the device registry, and the eid table (C5). A
/// single drain task consumes `DiscoveryInput`s serially, matching the
/// original's single coroutine handle guarding re-entrant drains.
pub struct DeviceManager {
    transport: Arc<MctpTransport>,
    events: Arc<EventDispatcher>,
    retries: u32,
    request_timeout: Duration,
    long_running_timeout: Duration,
    polling_interval: Duration,
    by_eid: std::sync::Mutex<HashMap<Eid, Arc<Device>>>,
    by_uuid: std::sync::Mutex<HashMap<DeviceUuid, Eid>>,
    by_identification: std::sync::Mutex<HashMap<(DeviceType, u8), Eid>>,
    /// `uuid -> (eid, medium, binding)`, mirroring the original's `eidTable`
    /// (§4.5 step 5 "update eid table").
    eid_table: std::sync::Mutex<HashMap<DeviceUuid, (Eid, String, String)>>,
    instance_remap: HashMap<String, u8>,
    sensor_factory: crate::sensor_factory::SensorFactory,
    sensor_object_paths: Vec<String>,
}

impl DeviceManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transport: Arc<MctpTransport>,
        events: Arc<EventDispatcher>,
        retries: u32,
        request_timeout: Duration,
        long_running_timeout: Duration,
        polling_interval: Duration,
        instance_remap: HashMap<String, u8>,
        config: Arc<dyn crate::config::ConfigSource>,
        sensor_object_paths: Vec<String>,
        async_ops: Arc<crate::async_op::AsyncOperationManager>,
    ) -> Arc<Self> {
        Arc::new(Self {
            transport,
            events,
            retries,
            request_timeout,
            long_running_timeout,
            polling_interval,
            by_eid: std::sync::Mutex::new(HashMap::new()),
            by_uuid: std::sync::Mutex::new(HashMap::new()),
            by_identification: std::sync::Mutex::new(HashMap::new()),
            eid_table: std::sync::Mutex::new(HashMap::new()),
            instance_remap,
            sensor_factory: crate::sensor_factory::SensorFactory::new(config, async_ops),
            sensor_object_paths,
        })
    }

    pub fn device_for(&self, eid: Eid) -> Option<Arc<Device>> {
        self.by_eid.lock().expect("device manager mutex poisoned").get(&eid).cloned()
    }

    /// Spawns the drain task that consumes `inputs` one at a time for the
    /// lifetime of the manager, matching `discoverNsmDeviceTask`'s "while queue
    /// not empty" loop over a persistent queue rather than a one-shot batch.
    pub fn spawn_drain_task(self: Arc<Self>, mut inputs: mpsc::UnboundedReceiver<DiscoveryInput>) {
        tokio::spawn(async move {
            while let Some(input) = inputs.recv().await {
                self.discover_one(input).await;
            }
        });
    }

    /// Handles the loss of an MCTP endpoint: marks the device offline, which
    /// pauses its scheduler loop, and fails every in-flight request for it so
    /// awaiting callers unwind instead of hanging (§5 "Cancellation").
    pub fn handle_endpoint_removed(&self, eid: Eid) {
        self.transport.fail_all_for_eid(eid);
        if let Some(device) = self.by_eid.lock().expect("device manager mutex poisoned").get(&eid) {
            device.mark_offline();
        }
    }

    async fn discover_one(&self, input: DiscoveryInput) {
        if let Err(err) = self.ping(input.eid).await {
            error!("NSM ping failed, eid={}: {err}", input.eid);
            return;
        }
        info!("found NSM device, eid={} uuid={:02x?}", input.eid, input.uuid);

        let existing_eid = self.by_uuid.lock().expect("device manager mutex poisoned").get(&input.uuid).copied();
        if let Some(known_eid) = existing_eid {
            info!("device has been discovered before, uuid={:02x?}", input.uuid);
            if let Some(device) = self.device_for(known_eid) {
                {
                    let mut identity = device.identity.lock().expect("device identity mutex poisoned");
                    identity.eid = input.eid;
                }
                self.by_eid.lock().expect("device manager mutex poisoned").insert(input.eid, device.clone());
                self.populate_sensors_once(&device, input.eid).await;
                self.update_nsm_device(&device, input.eid).await;
                device.mark_online();
                self.spawn_scheduler_once(&device);
            }
            self.record_eid_table(&input);
            return;
        }

        let identification = match self.query_device_identification(input.eid).await {
            Ok(identification) => identification,
            Err(err) => {
                error!("NSM getQueryDeviceIdentification failed, eid={}: {err}", input.eid);
                return;
            }
        };

        let device_key = (identification.device_type, identification.instance_number);
        let device = match self.by_identification.lock().expect("device manager mutex poisoned").get(&device_key) {
            Some(eid) => self.device_for(*eid).expect("identification map points at a live device"),
            None => {
                let instance_number = self.resolve_instance_number(&input, &identification);
                let identity = DeviceIdentity {
                    uuid: input.uuid,
                    eid: input.eid,
                    device_type: identification.device_type,
                    instance_number,
                };
                let device = Device::new(identity);
                info!(
                    "DeviceManager: deviceType:{:?} InstanceNumber:{} gets ACTIVE",
                    identification.device_type, instance_number
                );
                device
            }
        };

        {
            let mut identity = device.identity.lock().expect("device identity mutex poisoned");
            identity.eid = input.eid;
            identity.uuid = input.uuid;
        }

        self.populate_sensors_once(&device, input.eid).await;
        self.update_nsm_device(&device, input.eid).await;

        self.by_eid.lock().expect("device manager mutex poisoned").insert(input.eid, device.clone());
        self.by_uuid.lock().expect("device manager mutex poisoned").insert(input.uuid, input.eid);
        self.by_identification.lock().expect("device manager mutex poisoned").insert(device_key, input.eid);
        self.record_eid_table(&input);

        if let Err(err) = self.update_fru_inventory(&device, input.eid).await {
            error!("updateFruDeviceIntf failed, eid={}: {err}", input.eid);
            return;
        }

        self.run_sensor_pass(&device).await;
        device.mark_online();
        self.spawn_scheduler_once(&device);
    }

    /// Runs the sensor factory against `device` the first time it is
    /// discovered, populating all four of its sensor lists and registering
    /// any async set-operation handlers named by the configured object paths
    /// (§4.5 step 6). A later re-discovery (UUID match) is a no-op here, same
    /// guard shape as `spawn_scheduler_once`.
    async fn populate_sensors_once(&self, device: &Arc<Device>, eid: Eid) {
        if device.sensors_built.swap(true, std::sync::atomic::Ordering::SeqCst) {
            return;
        }
        let ctx = self.sensor_context(device, eid);
        self.sensor_factory.populate(device, &ctx, &self.sensor_object_paths).await;
    }

    fn record_eid_table(&self, input: &DiscoveryInput) {
        self.eid_table
            .lock()
            .expect("device manager mutex poisoned")
            .insert(input.uuid, (input.eid, input.medium.clone(), input.binding.clone()));
    }

    /// Looks up a configured instance-number override in priority order:
    /// `deviceInstanceId`, then `eid`, then `uuid` (§4.5 step 4). The device's
    /// identified instance number is used if none match.
    fn resolve_instance_number(
        &self,
        input: &DiscoveryInput,
        identification: &nsm_proto::codec::discovery::DeviceIdentification,
    ) -> u8 {
        let device_instance_id = format!("{:?}:{}", identification.device_type, identification.instance_number);
        if let Some(remapped) = self.instance_remap.get(&device_instance_id) {
            return *remapped;
        }
        if let Some(remapped) = self.instance_remap.get(&input.eid.to_string()) {
            return *remapped;
        }
        let uuid_key = input.uuid.iter().map(|b| format!("{b:02x}")).collect::<String>();
        if let Some(remapped) = self.instance_remap.get(&uuid_key) {
            return *remapped;
        }
        identification.instance_number
    }

    async fn ping(&self, eid: Eid) -> Result<(), DeviceManagerError> {
        let response = exchange::send_recv_nsm_msg(&self.transport, eid, self.request_timeout, self.retries, |instance_id, buf| {
            encode_ping_req(instance_id, buf)
        })
        .await
        .map_err(|source| DeviceManagerError::PingFailed { eid, source })?;
        decode_ping_resp(&response).map_err(|err| DeviceManagerError::PingFailed {
            eid,
            source: TransportError::Codec(err),
        })
    }

    async fn query_device_identification(
        &self,
        eid: Eid,
    ) -> Result<nsm_proto::codec::discovery::DeviceIdentification, DeviceManagerError> {
        let response = exchange::send_recv_nsm_msg(&self.transport, eid, self.request_timeout, self.retries, |instance_id, buf| {
            encode_query_device_identification_req(instance_id, buf)
        })
        .await
        .map_err(|source| DeviceManagerError::IdentificationFailed { eid, source })?;
        decode_query_device_identification_resp(&response).map_err(|err| DeviceManagerError::IdentificationFailed {
            eid,
            source: TransportError::Codec(err),
        })
    }

    /// Refreshes the capability matrix for `eid`: `GetSupportedNvidiaMessageTypes`
    /// then one `GetSupportedCommandCodes` per supported message type, matching
    /// the original's `updateNsmDevice` capability re-query (§4.5 step 5).
    async fn update_nsm_device(&self, device: &Arc<Device>, eid: Eid) {
        let supported_types = match exchange::send_recv_nsm_msg(
            &self.transport,
            eid,
            self.request_timeout,
            self.retries,
            |instance_id, buf| encode_get_supported_message_types_req(instance_id, buf),
        )
        .await
        .map_err(TransportError::from)
        .and_then(|bytes| decode_get_supported_message_types_resp(&bytes).map_err(TransportError::Codec))
        {
            Ok(types) => types,
            Err(err) => {
                warn!("updateNsmDevice: GetSupportedNvidiaMessageTypes failed for eid {eid}: {err}");
                return;
            }
        };

        let mut matrix = CapabilityMatrix::default();
        for message_type_value in 0u8..NUM_MESSAGE_TYPES as u8 {
            let Ok(message_type) = MessageType::try_from(message_type_value) else {
                continue;
            };
            if !supported_types.supports(message_type) {
                continue;
            }
            let codes = exchange::send_recv_nsm_msg(&self.transport, eid, self.request_timeout, self.retries, |instance_id, buf| {
                encode_get_supported_command_codes_req(instance_id, message_type_value, buf)
            })
            .await
            .map_err(TransportError::from)
            .and_then(|bytes| decode_get_supported_command_codes_resp(&bytes).map_err(TransportError::Codec));
            match codes {
                Ok(codes) => matrix.set_message_type(message_type_value, codes),
                Err(err) => warn!("updateNsmDevice: GetSupportedCommandCodes({message_type_value}) failed for eid {eid}: {err}"),
            }
        }
        *device.capabilities.lock().expect("device capabilities mutex poisoned") = matrix;

        let refresh_sensors = device.sensors.lock().await.capability_refresh_sensors.clone();
        if !refresh_sensors.is_empty() {
            let ctx = self.sensor_context(device, eid);
            for sensor in &refresh_sensors {
                sensor.update(&ctx).await;
            }
        }
    }

    async fn update_fru_inventory(&self, device: &Arc<Device>, eid: Eid) -> Result<(), TransportError> {
        let mut fru = FruInventory::default();
        for property in FRU_PROPERTIES {
            let response = exchange::send_recv_nsm_msg(&self.transport, eid, self.request_timeout, self.retries, |instance_id, buf| {
                encode_get_inventory_information_req(instance_id, property, buf)
            })
            .await?;

            match property {
                InventoryProperty::DeviceGuid => {
                    if let Ok(bytes) = decode_get_inventory_information_resp_bytes(&response) {
                        if let Ok(guid) = DeviceUuid::try_from(bytes) {
                            fru.device_guid = Some(guid);
                        }
                    }
                }
                InventoryProperty::BoardPartNumber => {
                    fru.board_part_number = decode_get_inventory_information_resp_string(&response).ok();
                }
                InventoryProperty::SerialNumber => {
                    fru.serial_number = decode_get_inventory_information_resp_string(&response).ok();
                }
                InventoryProperty::MarketingName => {
                    fru.marketing_name = decode_get_inventory_information_resp_string(&response).ok();
                }
                InventoryProperty::BuildDate => {
                    fru.build_date = decode_get_inventory_information_resp_string(&response).ok();
                }
            }
        }
        *device.fru.lock().expect("device fru mutex poisoned") = fru;
        Ok(())
    }

    /// Runs every static sensor once, then every priority sensor once, then one
    /// round-robin sensor (§4.5 step 6, §4.7 "bring-up pass").
    async fn run_sensor_pass(&self, device: &Arc<Device>) {
        let ctx = self.sensor_context(device, device.eid());
        let sensors = device.sensors.lock().await;
        for sensor in &sensors.static_sensors {
            sensor.update(&ctx).await;
        }
        for sensor in &sensors.priority_sensors {
            sensor.update(&ctx).await;
        }
        if let Some(sensor) = sensors.round_robin_sensors.first() {
            sensor.update(&ctx).await;
        }
    }

    pub fn sensor_context(&self, device: &Arc<Device>, eid: Eid) -> crate::sensor::SensorContext {
        crate::sensor::SensorContext {
            transport: self.transport.clone(),
            events: self.events.clone(),
            semaphore: device.semaphore.clone(),
            eid,
            retries: self.retries,
            request_timeout: self.request_timeout,
            long_running_timeout: self.long_running_timeout,
        }
    }

    /// Spawns the steady-state scheduler (C7) for `device` the first time it
    /// comes online; a later re-discovery of the same device (UUID match) must
    /// not spawn a second loop racing the first over the same sensor lists.
    fn spawn_scheduler_once(&self, device: &Arc<Device>) {
        if device
            .scheduler_spawned
            .swap(true, std::sync::atomic::Ordering::SeqCst)
        {
            return;
        }
        let context = self.sensor_context(device, device.eid());
        DeviceScheduler::new(device.clone(), context, self.polling_interval).spawn();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_matrix_reports_unset_message_type_as_unsupported() {
        let matrix = CapabilityMatrix::default();
        assert!(!matrix.supports(MessageType::PlatformEnvironmental, 1));
    }

    #[test]
    fn capability_matrix_round_trips_command_codes() {
        let mut matrix = CapabilityMatrix::default();
        let mut codes = SupportedCommandCodes::default();
        codes.set(5);
        matrix.set_message_type(MessageType::PlatformEnvironmental as u8, codes);
        assert!(matrix.supports(MessageType::PlatformEnvironmental, 5));
        assert!(!matrix.supports(MessageType::PlatformEnvironmental, 6));
    }
}
