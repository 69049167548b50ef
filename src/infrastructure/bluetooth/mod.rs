//! Bluetooth Module
//!
//! Synchronizes the clock of an InfiniTime watch over BLE.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    TimeSyncService                       │
//! │  (Session driver - scan, connect, discover, write)       │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │ BleStack / BleLink
//!         ┌─────────────┼─────────────┐
//!         │             │             │
//!         ▼             ▼             ▼
//! ┌───────────┐  ┌────────────┐  ┌──────────┐
//! │  Scanner  │  │ Connection │  │ Protocol │
//! │           │  │            │  │          │
//! │ - BLE     │  │ - Adapter  │  │ - UUIDs  │
//! │ discovery │  │ - GATT     │  │ - Names  │
//! │           │  │   access   │  │          │
//! └───────────┘  └────────────┘  └──────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - UUID constants and parsing
//! - [`scanner`] - BLE advertisement stream
//! - [`connection`] - btleplug implementation of [`BleStack`] and [`BleLink`]
//! - [`service`] - Session driver

pub mod connection;
pub mod protocol;
pub mod scanner;
pub mod service;

use crate::domain::models::{Advertisement, GattCharacteristic, GattService, WriteMode};
use crate::error::BleError;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::fmt;

pub use connection::BtleplugStack;
pub use service::{SessionConfig, TimeSyncService};

/// Stream of advertisements produced by an active scan
pub type AdvertisementStream<Id> = BoxStream<'static, Advertisement<Id>>;

/// Local radio adapter operations
#[async_trait]
pub trait BleStack: Send + Sync {
    /// Handle used to connect to a device seen during a scan
    type DeviceId: Clone + fmt::Debug + Send + Sync + 'static;
    type Link: BleLink;

    /// Acquire and power up the local adapter
    async fn enable(&mut self) -> Result<(), BleError>;

    /// Start scanning. The stream ends only if the stack stops delivering events.
    async fn scan(&self) -> Result<AdvertisementStream<Self::DeviceId>, BleError>;

    async fn stop_scan(&self) -> Result<(), BleError>;

    async fn connect(&self, device: &Self::DeviceId) -> Result<Self::Link, BleError>;
}

/// An established connection to a peripheral
#[async_trait]
pub trait BleLink: Send + Sync {
    async fn discover_services(&self) -> Result<Vec<GattService>, BleError>;

    async fn discover_characteristics(
        &self,
        service: &GattService,
    ) -> Result<Vec<GattCharacteristic>, BleError>;

    async fn write(
        &self,
        characteristic: &GattCharacteristic,
        payload: &[u8],
        mode: WriteMode,
    ) -> Result<(), BleError>;

    async fn disconnect(&self) -> Result<(), BleError>;
}
