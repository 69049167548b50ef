//! InfiniTime / Current Time Service Protocol
//!
//! UUID constants and helpers for addressing the Bluetooth SIG
//! Current Time Service exposed by InfiniTime watches.

use crate::error::InvalidUuid;
use uuid::Uuid;

/// Advertised local name of an InfiniTime watch
pub const DEFAULT_DEVICE_NAME: &str = "InfiniTime";

/// Bluetooth SIG base UUID: 0000xxxx-0000-1000-8000-00805f9b34fb
pub const BLUETOOTH_BASE_UUID: u128 = 0x00000000_0000_1000_8000_00805f9b34fb;

/// Current Time Service
pub const CURRENT_TIME_SERVICE_UUID: Uuid = uuid_from_u16(0x1805);

/// Current Time characteristic - where the time record is written
pub const CURRENT_TIME_CHAR_UUID: Uuid = uuid_from_u16(0x2a2b);

/// Default scan timeout in seconds
pub const DEFAULT_SCAN_TIMEOUT_SECS: u64 = 30;

/// Expand a 16-bit SIG-assigned number into a full UUID
pub const fn uuid_from_u16(short: u16) -> Uuid {
    uuid_from_u32(short as u32)
}

/// Expand a 32-bit SIG-assigned number into a full UUID
pub const fn uuid_from_u32(short: u32) -> Uuid {
    Uuid::from_u128(BLUETOOTH_BASE_UUID | ((short as u128) << 96))
}

/// Parse a UUID string.
///
/// Accepts the full hyphenated form as well as 16-bit and 32-bit short
/// forms (`2a2b`, `0x2A2B`, `00002a2b`).
pub fn parse_uuid(uuid_str: &str) -> Result<Uuid, InvalidUuid> {
    let trimmed = uuid_str.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    let is_hex = !digits.is_empty() && digits.chars().all(|c| c.is_ascii_hexdigit());
    match digits.len() {
        4 if is_hex => u16::from_str_radix(digits, 16)
            .map(uuid_from_u16)
            .map_err(|_| InvalidUuid(uuid_str.to_string())),
        8 if is_hex => u32::from_str_radix(digits, 16)
            .map(uuid_from_u32)
            .map_err(|_| InvalidUuid(uuid_str.to_string())),
        _ => Uuid::parse_str(trimmed).map_err(|_| InvalidUuid(uuid_str.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_time_uuid() {
        assert_eq!(
            CURRENT_TIME_CHAR_UUID.to_string(),
            "00002a2b-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(
            CURRENT_TIME_SERVICE_UUID.to_string(),
            "00001805-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn test_parse_uuid_forms() {
        let full = parse_uuid("00002a2b-0000-1000-8000-00805f9b34fb").unwrap();
        assert_eq!(full, CURRENT_TIME_CHAR_UUID);
        assert_eq!(parse_uuid("2a2b").unwrap(), CURRENT_TIME_CHAR_UUID);
        assert_eq!(parse_uuid("0x2A2B").unwrap(), CURRENT_TIME_CHAR_UUID);
        assert_eq!(parse_uuid(" 00002a2b ").unwrap(), CURRENT_TIME_CHAR_UUID);
    }

    #[test]
    fn test_parse_uuid_invalid() {
        assert!(parse_uuid("").is_err());
        assert!(parse_uuid("zz2b").is_err());
        assert!(parse_uuid("00002a2b-0000-1000-8000").is_err());
    }
}
