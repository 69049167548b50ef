//! BLE Scanner Module
//!
//! Turns btleplug central events into a stream of advertisements.

use crate::domain::models::Advertisement;
use crate::error::BleError;
use crate::infrastructure::bluetooth::AdvertisementStream;
use btleplug::api::{Central, CentralEvent, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, PeripheralId};
use futures::StreamExt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, trace, warn};

/// BLE Scanner bound to one adapter
pub struct BleScanner {
    adapter: Adapter,
    scanning: AtomicBool,
}

impl BleScanner {
    pub fn new(adapter: Adapter) -> Self {
        Self {
            adapter,
            scanning: AtomicBool::new(false),
        }
    }

    /// Start scanning and return every advertisement as it arrives.
    ///
    /// The event subscription is taken before the scan starts so no early
    /// advertisement is missed.
    pub async fn start(&self) -> Result<AdvertisementStream<PeripheralId>, BleError> {
        let events = self.adapter.events().await?;

        info!("Starting BLE scan...");
        self.adapter.start_scan(ScanFilter::default()).await?;
        self.scanning.store(true, Ordering::SeqCst);

        let adapter = self.adapter.clone();
        let stream = events.filter_map(move |event| {
            let adapter = adapter.clone();
            async move {
                let id = match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
                    _ => return None,
                };
                advertisement_for(&adapter, id).await
            }
        });

        Ok(stream.boxed())
    }

    /// Stop scanning
    pub async fn stop(&self) -> Result<(), BleError> {
        if self.scanning.swap(false, Ordering::SeqCst) {
            info!("Stopping BLE scan...");
            self.adapter.stop_scan().await?;
        }
        Ok(())
    }

    /// Check if currently scanning
    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::SeqCst)
    }
}

impl Drop for BleScanner {
    fn drop(&mut self) {
        if !self.is_scanning() {
            return;
        }
        // Best effort: the adapter keeps scanning otherwise.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let adapter = self.adapter.clone();
            handle.spawn(async move {
                stop_detached(adapter.stop_scan()).await;
            });
        }
    }
}

/// Await a scan stop whose caller has nowhere to return the error
async fn stop_detached<E, F>(stop: F) -> bool
where
    E: std::fmt::Display,
    F: Future<Output = Result<(), E>>,
{
    match stop.await {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to stop scan: {}", e);
            false
        }
    }
}

async fn advertisement_for(
    adapter: &Adapter,
    id: PeripheralId,
) -> Option<Advertisement<PeripheralId>> {
    let peripheral = adapter.peripheral(&id).await.ok()?;
    let properties = peripheral.properties().await.ok()??;

    trace!(
        "Advertisement from {} ({:?}), rssi {:?}",
        properties.address,
        properties.local_name,
        properties.rssi
    );

    Some(Advertisement {
        id,
        local_name: properties.local_name,
        address: Some(properties.address.to_string()),
        rssi: properties.rssi,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future;

    #[tokio::test]
    async fn test_detached_stop_reports_failure() {
        assert!(stop_detached(future::ready(Ok::<(), BleError>(()))).await);
        assert!(!stop_detached(future::ready(Err(BleError::NotEnabled))).await);
    }
}
