use crate::domain::cts::CtsTimeRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A single advertisement observed while scanning.
///
/// `id` is whatever handle the BLE stack needs to connect to the device again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement<Id> {
    pub id: Id,
    pub local_name: Option<String>,
    pub address: Option<String>,
    pub rssi: Option<i16>,
}

impl<Id> Advertisement<Id> {
    pub fn display_name(&self) -> &str {
        match self.local_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => "Unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattService {
    pub uuid: Uuid,
    pub primary: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CharProps {
    pub read: bool,
    pub write: bool,
    pub write_without_response: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattCharacteristic {
    pub uuid: Uuid,
    pub service_uuid: Uuid,
    pub properties: CharProps,
}

impl GattCharacteristic {
    pub fn supports(&self, mode: WriteMode) -> bool {
        match mode {
            WriteMode::WithoutResponse => self.properties.write_without_response,
            WriteMode::WithResponse => self.properties.write,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WriteMode {
    /// Fire-and-forget write command
    #[default]
    WithoutResponse,
    /// Write request acknowledged by the peripheral
    WithResponse,
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WithoutResponse => f.write_str("without response"),
            Self::WithResponse => f.write_str("with response"),
        }
    }
}

/// Progress of one synchronization attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Scanning,
    Found,
    NotFound,
    Connected,
    ServicesDiscovered,
    CharacteristicLocated,
    Written,
    Disconnected,
}

/// Outcome of a successful synchronization
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub device_name: String,
    pub address: Option<String>,
    pub characteristic: Uuid,
    pub record: CtsTimeRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_fallback() {
        let mut adv = Advertisement {
            id: 1u32,
            local_name: None,
            address: None,
            rssi: None,
        };
        assert_eq!(adv.display_name(), "Unknown");
        adv.local_name = Some(String::new());
        assert_eq!(adv.display_name(), "Unknown");
        adv.local_name = Some("InfiniTime".to_string());
        assert_eq!(adv.display_name(), "InfiniTime");
    }

    #[test]
    fn test_write_mode_serde() {
        let mode: WriteMode = serde_json::from_str("\"with-response\"").unwrap();
        assert_eq!(mode, WriteMode::WithResponse);
        assert_eq!(
            serde_json::to_string(&WriteMode::WithoutResponse).unwrap(),
            "\"without-response\""
        );
    }
}
