//! `nsm-agentd`: binary entry point wiring C2-C9 together (§5 Concurrency &
//! Resource Model, §2 ambient logging/configuration).
//!
//! Flow: load configuration, connect the MCTP transport, spin up the event
//! dispatcher and device manager, queue the configured discovery seeds, then
//! park the main task until `SIGINT`/`SIGTERM`, at which point every
//! in-flight long-running operation is left to its own completion timer and
//! the process exits.

use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use nsm_agent::async_op::AsyncOperationManager;
use nsm_agent::config::{self, AgentConfig};
use nsm_agent::device_manager::{DeviceManager, DiscoveryInput};
use nsm_agent::events::EventDispatcher;
use nsm_agent::transport::MctpTransport;
use tokio::sync::mpsc;

const ASYNC_OP_OBJECT_PATH_PREFIX: &str = "/xyz/nsm/AsyncOperation";

fn main() {
    env_logger::init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "nsm-agentd.toml".to_string());
    let config = match AgentConfig::load_from_file(&config_path) {
        Ok(config) => config,
        Err(err) => {
            log::warn!("could not load config from {config_path} ({err}), using defaults");
            AgentConfig::default()
        }
    };

    let runtime = build_runtime(&config.runtime_flavor);
    runtime.block_on(run(config));
}

fn build_runtime(flavor: &str) -> tokio::runtime::Runtime {
    match flavor {
        "current_thread" => tokio::runtime::Builder::new_current_thread().enable_all().build(),
        _ => tokio::runtime::Builder::new_multi_thread().enable_all().build(),
    }
    .expect("failed to build tokio runtime")
}

async fn run(config: AgentConfig) {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    let transport = match MctpTransport::connect(&config.mctp_socket_path, config.local_eid, event_tx) {
        Ok(transport) => transport,
        Err(err) => {
            error!("failed to connect to MCTP demux at {}: {err}", config.mctp_socket_path);
            return;
        }
    };
    info!("connected to MCTP demux at {}", config.mctp_socket_path);

    let events = Arc::new(EventDispatcher::new());
    let async_ops = AsyncOperationManager::new(config.async_op_pool_capacity, ASYNC_OP_OBJECT_PATH_PREFIX);
    let sensor_config = Arc::new(config::build_config_source(&config.sensors));
    let sensor_object_paths: Vec<String> = config.sensors.iter().map(|row| row.object_path.clone()).collect();
    let device_manager = DeviceManager::new(
        transport.clone(),
        events.clone(),
        config.retries,
        Duration::from_millis(config.request_timeout_ms),
        Duration::from_millis(config.long_running_timeout_ms),
        Duration::from_millis(config.polling_interval_ms),
        config.instance_remap.clone(),
        sensor_config,
        sensor_object_paths,
        async_ops.clone(),
    );

    {
        let events = events.clone();
        tokio::spawn(async move {
            while let Some(frame) = event_rx.recv().await {
                events.dispatch(frame);
            }
        });
    }

    let (discovery_tx, discovery_rx) = mpsc::unbounded_channel();
    device_manager.spawn_drain_task(discovery_rx);
    for target in &config.discovery_targets {
        match parse_uuid(&target.uuid) {
            Ok(uuid) => {
                let _ = discovery_tx.send(DiscoveryInput {
                    eid: target.eid,
                    uuid,
                    medium: target.medium.clone(),
                    network_id: target.network_id,
                    binding: target.binding.clone(),
                });
            }
            Err(err) => error!("discovery_targets: invalid uuid {:?} for eid {}: {err}", target.uuid, target.eid),
        }
    }

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, exiting");
}

/// Parses a hyphenated or bare 32-hex-character UUID string into the wire's
/// 16-byte representation (§4.5 "DiscoveryInput" `uuid` field).
fn parse_uuid(text: &str) -> Result<[u8; 16], uuid::Error> {
    Ok(*uuid::Uuid::parse_str(text)?.as_bytes())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_uuid_accepts_bare_hex_chars() {
        let uuid = parse_uuid("000102030405060708090a0b0c0d0e0f").unwrap();
        assert_eq!(uuid[0], 0x00);
        assert_eq!(uuid[15], 0x0f);
    }

    #[test]
    fn parse_uuid_accepts_hyphenated_form() {
        let uuid = parse_uuid("00010203-0405-0607-0809-0a0b0c0d0e0f").unwrap();
        assert_eq!(uuid[0], 0x00);
        assert_eq!(uuid[15], 0x0f);
    }

    #[test]
    fn parse_uuid_rejects_wrong_length() {
        assert!(parse_uuid("abcd").is_err());
    }
}
