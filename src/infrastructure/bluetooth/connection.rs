//! BLE Connection Module
//!
//! btleplug-backed adapter handling, device connection and GATT access.

use crate::domain::models::{CharProps, GattCharacteristic, GattService, WriteMode};
use crate::error::BleError;
use crate::infrastructure::bluetooth::scanner::BleScanner;
use crate::infrastructure::bluetooth::{AdvertisementStream, BleLink, BleStack};
use async_trait::async_trait;
use btleplug::api::{
    CharPropFlags, Characteristic, Central, Manager as _, Peripheral as _, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use tracing::{debug, info, warn};

/// Host Bluetooth stack accessed through btleplug
pub struct BtleplugStack {
    adapter_index: usize,
    adapter: Option<Adapter>,
    scanner: Option<BleScanner>,
}

impl BtleplugStack {
    /// Create a stack that will use the adapter at `adapter_index` once enabled
    pub fn new(adapter_index: usize) -> Self {
        Self {
            adapter_index,
            adapter: None,
            scanner: None,
        }
    }

    fn adapter(&self) -> Result<&Adapter, BleError> {
        self.adapter.as_ref().ok_or(BleError::NotEnabled)
    }

    fn scanner(&self) -> Result<&BleScanner, BleError> {
        self.scanner.as_ref().ok_or(BleError::NotEnabled)
    }
}

#[async_trait]
impl BleStack for BtleplugStack {
    type DeviceId = PeripheralId;
    type Link = BtleplugLink;

    async fn enable(&mut self) -> Result<(), BleError> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;
        if adapters.is_empty() {
            return Err(BleError::NoAdapter);
        }

        let available = adapters.len();
        let adapter = adapters
            .into_iter()
            .nth(self.adapter_index)
            .ok_or(BleError::AdapterIndex {
                index: self.adapter_index,
                available,
            })?;

        match adapter.adapter_info().await {
            Ok(info) => info!("Using Bluetooth adapter {}: {}", self.adapter_index, info),
            Err(e) => debug!("Adapter info unavailable: {}", e),
        }

        self.scanner = Some(BleScanner::new(adapter.clone()));
        self.adapter = Some(adapter);
        Ok(())
    }

    async fn scan(&self) -> Result<AdvertisementStream<PeripheralId>, BleError> {
        self.scanner()?.start().await
    }

    async fn stop_scan(&self) -> Result<(), BleError> {
        self.scanner()?.stop().await
    }

    async fn connect(&self, device: &PeripheralId) -> Result<BtleplugLink, BleError> {
        let peripheral = self
            .adapter()?
            .peripheral(device)
            .await
            .map_err(|source| BleError::UnknownDevice {
                device: format!("{:?}", device),
                source,
            })?;

        if !peripheral.is_connected().await? {
            info!("Connecting to device...");
            peripheral.connect().await?;
        }

        Ok(BtleplugLink { peripheral })
    }
}

/// Connected btleplug peripheral
pub struct BtleplugLink {
    peripheral: Peripheral,
}

impl BtleplugLink {
    /// Find the btleplug handle matching a discovered characteristic
    fn find_characteristic(&self, wanted: &GattCharacteristic) -> Result<Characteristic, BleError> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == wanted.uuid && c.service_uuid == wanted.service_uuid)
            .ok_or_else(|| {
                BleError::Backend(format!("characteristic {} no longer present", wanted.uuid))
            })
    }
}

#[async_trait]
impl BleLink for BtleplugLink {
    async fn discover_services(&self) -> Result<Vec<GattService>, BleError> {
        self.peripheral.discover_services().await?;

        let services: Vec<GattService> = self
            .peripheral
            .services()
            .into_iter()
            .map(|s| GattService {
                uuid: s.uuid,
                primary: s.primary,
            })
            .collect();
        debug!("Discovered {} services", services.len());
        Ok(services)
    }

    async fn discover_characteristics(
        &self,
        service: &GattService,
    ) -> Result<Vec<GattCharacteristic>, BleError> {
        let found = self
            .peripheral
            .services()
            .into_iter()
            .find(|s| s.uuid == service.uuid)
            .ok_or_else(|| {
                BleError::Backend(format!("service {} no longer present", service.uuid))
            })?;

        Ok(found
            .characteristics
            .iter()
            .map(|c| GattCharacteristic {
                uuid: c.uuid,
                service_uuid: c.service_uuid,
                properties: char_props(c.properties),
            })
            .collect())
    }

    async fn write(
        &self,
        characteristic: &GattCharacteristic,
        payload: &[u8],
        mode: WriteMode,
    ) -> Result<(), BleError> {
        let target = self.find_characteristic(characteristic)?;
        let write_type = match mode {
            WriteMode::WithoutResponse => WriteType::WithoutResponse,
            WriteMode::WithResponse => WriteType::WithResponse,
        };
        self.peripheral.write(&target, payload, write_type).await?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BleError> {
        let connected = self.peripheral.is_connected().await;
        if !should_disconnect(&connected) {
            return Ok(());
        }
        if let Err(e) = connected {
            warn!("Connection state unknown ({}), disconnecting anyway", e);
        }
        self.peripheral.disconnect().await?;
        Ok(())
    }
}

/// Only a peripheral known to be disconnected is left alone
fn should_disconnect<E>(connected: &Result<bool, E>) -> bool {
    !matches!(connected, Ok(false))
}

fn char_props(flags: CharPropFlags) -> CharProps {
    CharProps {
        read: flags.contains(CharPropFlags::READ),
        write: flags.contains(CharPropFlags::WRITE),
        write_without_response: flags.contains(CharPropFlags::WRITE_WITHOUT_RESPONSE),
    }
}
