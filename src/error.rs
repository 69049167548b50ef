use std::time::Duration;
use uuid::Uuid;

/// Failure reported by the underlying BLE stack
#[derive(Debug, thiserror::Error)]
pub enum BleError {
    #[error("btleplug error: {0}")]
    Btleplug(#[from] btleplug::Error),

    #[error("no Bluetooth adapter found")]
    NoAdapter,

    #[error("adapter index {index} out of range ({available} available)")]
    AdapterIndex { index: usize, available: usize },

    #[error("adapter not enabled")]
    NotEnabled,

    #[error("unknown device {device}")]
    UnknownDevice {
        device: String,
        #[source]
        source: btleplug::Error,
    },

    #[error("{0}")]
    Backend(String),
}

/// One variant per stage of a synchronization attempt. All of them are fatal.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("failed to enable Bluetooth adapter")]
    AdapterEnable(#[source] BleError),

    #[error("error scanning for device")]
    Scan(#[source] BleError),

    #[error("device '{name}' not found within {timeout:?}")]
    DeviceNotFound { name: String, timeout: Duration },

    #[error("error connecting to device")]
    Connection(#[source] BleError),

    #[error("error discovering services")]
    ServiceDiscovery(#[source] BleError),

    #[error("error discovering characteristics")]
    CharacteristicDiscovery(#[source] BleError),

    #[error("characteristic {0} not found")]
    CharacteristicNotFound(Uuid),

    #[error("error writing characteristic")]
    Write(#[source] BleError),
}

impl SyncError {
    /// Short name of the stage that failed
    pub fn stage(&self) -> &'static str {
        match self {
            Self::AdapterEnable(_) => "adapter-enable",
            Self::Scan(_) => "scan",
            Self::DeviceNotFound { .. } => "scan",
            Self::Connection(_) => "connect",
            Self::ServiceDiscovery(_) => "service-discovery",
            Self::CharacteristicDiscovery(_) => "characteristic-discovery",
            Self::CharacteristicNotFound(_) => "characteristic-discovery",
            Self::Write(_) => "write",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid UUID '{0}'")]
pub struct InvalidUuid(pub String);

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_source_chain() {
        let err = SyncError::Write(BleError::Backend("link lost".to_string()));
        assert_eq!(err.to_string(), "error writing characteristic");
        assert_eq!(err.source().unwrap().to_string(), "link lost");
        assert_eq!(err.stage(), "write");
    }

    #[test]
    fn test_unknown_device_keeps_cause() {
        let err = BleError::UnknownDevice {
            device: "hci0/dev_AA".to_string(),
            source: btleplug::Error::DeviceNotFound,
        };
        assert_eq!(err.to_string(), "unknown device hci0/dev_AA");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_not_found_message() {
        let err = SyncError::DeviceNotFound {
            name: "InfiniTime".to_string(),
            timeout: Duration::from_secs(30),
        };
        assert_eq!(err.to_string(), "device 'InfiniTime' not found within 30s");
    }
}
