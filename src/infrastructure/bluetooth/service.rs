//! Bluetooth Service Module
//!
//! Session driver that finds the watch, locates the Current Time
//! characteristic and writes the host time to it.

use crate::domain::cts::CtsTimeRecord;
use crate::domain::models::{
    Advertisement, GattCharacteristic, SessionState, SyncReport, WriteMode,
};
use crate::domain::settings::Settings;
use crate::error::{InvalidUuid, SyncError};
use crate::infrastructure::bluetooth::{protocol, BleLink, BleStack};
use futures::StreamExt;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Deadline used when the requested scan duration cannot be represented
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// `now + duration`, saturating to a far-future deadline instead of overflowing
fn deadline_after(duration: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(duration).unwrap_or_else(|| now + FAR_FUTURE)
}

/// Configuration for one synchronization session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Exact advertised local name to look for
    pub device_name: String,
    /// Characteristic the time record is written to
    pub characteristic_uuid: Uuid,
    /// Upper bound on the scan
    pub scan_timeout: Duration,
    pub write_mode: WriteMode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            device_name: protocol::DEFAULT_DEVICE_NAME.to_string(),
            characteristic_uuid: protocol::CURRENT_TIME_CHAR_UUID,
            scan_timeout: Duration::from_secs(protocol::DEFAULT_SCAN_TIMEOUT_SECS),
            write_mode: WriteMode::default(),
        }
    }
}

impl TryFrom<&Settings> for SessionConfig {
    type Error = InvalidUuid;

    fn try_from(settings: &Settings) -> Result<Self, Self::Error> {
        Ok(Self {
            device_name: settings.device_name.clone(),
            characteristic_uuid: protocol::parse_uuid(&settings.characteristic_uuid)?,
            scan_timeout: Duration::from_secs(settings.scan_timeout_secs),
            write_mode: settings.write_mode,
        })
    }
}

/// Drives Idle -> Scanning -> Found -> Connected -> ... -> Disconnected
pub struct TimeSyncService<S: BleStack> {
    stack: S,
    config: SessionConfig,
    state: SessionState,
}

impl<S: BleStack> TimeSyncService<S> {
    pub fn new(stack: S, config: SessionConfig) -> Self {
        Self {
            stack,
            config,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Write the current local time to the device
    pub async fn sync(&mut self) -> Result<SyncReport, SyncError> {
        self.sync_with(CtsTimeRecord::now).await
    }

    /// Run one session, building the payload with `make_record` once the
    /// characteristic has been located.
    pub async fn sync_with<F>(&mut self, make_record: F) -> Result<SyncReport, SyncError>
    where
        F: FnOnce() -> CtsTimeRecord + Send,
    {
        self.enable().await?;

        info!("Scan for {}...", self.config.device_name);
        let device = self.find_device().await?;
        info!(
            "Found {} at {}",
            device.display_name(),
            device.address.as_deref().unwrap_or("unknown address")
        );

        let link = self
            .stack
            .connect(&device.id)
            .await
            .map_err(SyncError::Connection)?;
        self.transition(SessionState::Connected);

        let outcome = self.write_time(&link, make_record).await;

        match link.disconnect().await {
            Ok(()) => info!("Disconnected from device"),
            Err(e) => warn!("Failed to disconnect cleanly: {}", e),
        }
        self.transition(SessionState::Disconnected);

        let record = outcome?;
        Ok(SyncReport {
            device_name: device.display_name().to_string(),
            address: device.address,
            characteristic: self.config.characteristic_uuid,
            record,
        })
    }

    /// List every device advertising within `duration`
    pub async fn scan_devices(
        &mut self,
        duration: Duration,
    ) -> Result<Vec<Advertisement<S::DeviceId>>, SyncError>
    where
        S::DeviceId: Eq + Hash,
    {
        self.enable().await?;
        self.transition(SessionState::Scanning);

        let mut advertisements = self.stack.scan().await.map_err(SyncError::Scan)?;
        let deadline = deadline_after(duration);

        let mut order = Vec::new();
        let mut seen: HashMap<S::DeviceId, Advertisement<S::DeviceId>> = HashMap::new();
        while let Ok(Some(adv)) = tokio::time::timeout_at(deadline, advertisements.next()).await {
            if !seen.contains_key(&adv.id) {
                order.push(adv.id.clone());
            }
            let merged = match seen.remove(&adv.id) {
                Some(previous) => Advertisement {
                    local_name: adv.local_name.or(previous.local_name),
                    address: adv.address.or(previous.address),
                    rssi: adv.rssi.or(previous.rssi),
                    id: adv.id,
                },
                None => adv,
            };
            seen.insert(merged.id.clone(), merged);
        }
        drop(advertisements);
        self.stop_scan().await;
        self.transition(SessionState::Idle);

        Ok(order.into_iter().filter_map(|id| seen.remove(&id)).collect())
    }

    async fn enable(&mut self) -> Result<(), SyncError> {
        self.stack.enable().await.map_err(SyncError::AdapterEnable)
    }

    async fn stop_scan(&self) {
        if let Err(e) = self.stack.stop_scan().await {
            warn!("Failed to stop scan: {}", e);
        }
    }

    /// Consume advertisements until the first exact name match or the timeout
    async fn find_device(&mut self) -> Result<Advertisement<S::DeviceId>, SyncError> {
        self.transition(SessionState::Scanning);
        let mut advertisements = self.stack.scan().await.map_err(SyncError::Scan)?;
        let deadline = deadline_after(self.config.scan_timeout);

        let target = Some(self.config.device_name.as_str());
        let found = loop {
            match tokio::time::timeout_at(deadline, advertisements.next()).await {
                Ok(Some(adv)) if adv.local_name.as_deref() == target => break Some(adv),
                Ok(Some(adv)) => debug!("Skipping {} ({:?})", adv.display_name(), adv.id),
                Ok(None) => {
                    debug!("Advertisement stream ended");
                    break None;
                }
                Err(_) => break None,
            }
        };
        drop(advertisements);
        self.stop_scan().await;

        match found {
            Some(adv) => {
                self.transition(SessionState::Found);
                Ok(adv)
            }
            None => {
                self.transition(SessionState::NotFound);
                Err(SyncError::DeviceNotFound {
                    name: self.config.device_name.clone(),
                    timeout: self.config.scan_timeout,
                })
            }
        }
    }

    async fn write_time<F>(
        &mut self,
        link: &S::Link,
        make_record: F,
    ) -> Result<CtsTimeRecord, SyncError>
    where
        F: FnOnce() -> CtsTimeRecord + Send,
    {
        let characteristic = self.locate_characteristic(link).await?;

        if !characteristic.supports(self.config.write_mode) {
            warn!(
                "Characteristic {} does not advertise write {}; trying anyway",
                characteristic.uuid, self.config.write_mode
            );
        }

        let record = make_record();
        info!("Setting time: {}", record);

        link.write(&characteristic, record.as_bytes(), self.config.write_mode)
            .await
            .map_err(SyncError::Write)?;
        self.transition(SessionState::Written);
        Ok(record)
    }

    async fn locate_characteristic(
        &mut self,
        link: &S::Link,
    ) -> Result<GattCharacteristic, SyncError> {
        let services = link
            .discover_services()
            .await
            .map_err(SyncError::ServiceDiscovery)?;
        self.transition(SessionState::ServicesDiscovered);

        for service in &services {
            let characteristics = link
                .discover_characteristics(service)
                .await
                .map_err(SyncError::CharacteristicDiscovery)?;

            if let Some(found) = characteristics
                .into_iter()
                .find(|c| c.uuid == self.config.characteristic_uuid)
            {
                debug!(
                    "Found characteristic {} in {} service {} \
                     (read: {}, write: {}, write without response: {})",
                    found.uuid,
                    if service.primary { "primary" } else { "secondary" },
                    service.uuid,
                    found.properties.read,
                    found.properties.write,
                    found.properties.write_without_response
                );
                if service.uuid != protocol::CURRENT_TIME_SERVICE_UUID {
                    debug!("Characteristic is outside the Current Time Service");
                }
                self.transition(SessionState::CharacteristicLocated);
                return Ok(found);
            }
        }

        Err(SyncError::CharacteristicNotFound(self.config.characteristic_uuid))
    }

    fn transition(&mut self, next: SessionState) {
        debug!("Session state {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}
