//! Management-plane agent for a fleet of NSM-speaking accelerator devices
//! reachable over MCTP (§1 Purpose & Scope).
//!
//! Module-to-component mapping (SPEC_FULL.md §4):
//! - [`transport`] -- C2, MCTP socket transport
//! - [`exchange`] -- C3, request/response handler
//! - [`events`] -- C4, event dispatcher
//! - [`device_manager`] -- C5, device manager
//! - [`sensor`] -- C6, sensor model
//! - [`scheduler`] -- C7, per-device scheduler
//! - [`async_op`] -- C8, async set-operation manager
//! - [`timing`] -- C9, timers and the per-device semaphore
//!
//! [`model`] and [`config`] are the ambient object-model and configuration
//! seams; [`error`] collects the agent-level error taxonomies built on top of
//! `nsm_proto::NsmCodecError`; [`sensor_factory`] is the bring-up wiring that
//! turns configured object paths into C6 sensors and C8 handlers.

pub mod async_op;
pub mod config;
pub mod device_manager;
pub mod error;
pub mod events;
pub mod exchange;
pub mod model;
pub mod scheduler;
pub mod sensor;
pub mod sensor_factory;
pub mod timing;
pub mod transport;
