//! Current Time Service encoding
//!
//! Converts a local wall-clock reading into the 8-byte record written to the
//! Bluetooth SIG "Current Time" characteristic.
//!
//! # Record Layout (8 bytes)
//!
//! ```text
//! [0-1] : Year (u16 little-endian)
//! [2]   : Month (1-12)
//! [3]   : Day (1-31)
//! [4]   : Hours (0-23)
//! [5]   : Minutes (0-59)
//! [6]   : Seconds (0-59)
//! [7]   : Day of week (1 = Monday ... 7 = Sunday)
//! ```

use chrono::{DateTime, Datelike, Local, TimeZone, Timelike};
use std::fmt;

/// Length of the exact-time record written to the device
pub const CTS_RECORD_LEN: usize = 8;

/// Calendar fields of a single wall-clock reading.
///
/// `weekday` uses the common native convention: Sunday = 0 ... Saturday = 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CtsTimestamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub weekday: u8,
}

impl CtsTimestamp {
    /// Read the host's local wall clock
    pub fn now() -> Self {
        Self::from_datetime(&Local::now())
    }

    pub fn from_datetime<Tz: TimeZone>(dt: &DateTime<Tz>) -> Self {
        Self {
            year: dt.year().clamp(0, i32::from(u16::MAX)) as u16,
            month: dt.month() as u8,
            day: dt.day() as u8,
            hour: dt.hour() as u8,
            minute: dt.minute() as u8,
            second: dt.second() as u8,
            weekday: dt.weekday().num_days_from_sunday() as u8,
        }
    }
}

/// Encoded exact-time record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CtsTimeRecord([u8; CTS_RECORD_LEN]);

impl CtsTimeRecord {
    /// Encode the current local time
    pub fn now() -> Self {
        encode(&CtsTimestamp::now())
    }

    pub fn as_bytes(&self) -> &[u8; CTS_RECORD_LEN] {
        &self.0
    }

    pub fn year(&self) -> u16 {
        u16::from_le_bytes([self.0[0], self.0[1]])
    }

    pub fn month(&self) -> u8 {
        self.0[2]
    }

    pub fn day(&self) -> u8 {
        self.0[3]
    }

    pub fn hour(&self) -> u8 {
        self.0[4]
    }

    pub fn minute(&self) -> u8 {
        self.0[5]
    }

    pub fn second(&self) -> u8 {
        self.0[6]
    }

    /// ISO day of week, Monday = 1 ... Sunday = 7
    pub fn weekday(&self) -> u8 {
        self.0[7]
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Display for CtsTimeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Map a Sunday = 0 weekday index onto the CTS day-of-week range.
///
/// Monday..Saturday keep their index, Sunday becomes 7. The result is never 0.
pub fn cts_weekday(native_sunday_zero: u8) -> u8 {
    match native_sunday_zero % 7 {
        0 => 7,
        day => day,
    }
}

/// Serialize a timestamp into the CTS exact-time record
pub fn encode(ts: &CtsTimestamp) -> CtsTimeRecord {
    let [year_lo, year_hi] = ts.year.to_le_bytes();
    CtsTimeRecord([
        year_lo,
        year_hi,
        ts.month,
        ts.day,
        ts.hour,
        ts.minute,
        ts.second,
        cts_weekday(ts.weekday),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn timestamp(year: u16, weekday: u8) -> CtsTimestamp {
        CtsTimestamp {
            year,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
            weekday,
        }
    }

    #[test]
    fn test_weekday_table() {
        assert_eq!(cts_weekday(0), 7); // Sunday
        assert_eq!(cts_weekday(1), 1); // Monday
        assert_eq!(cts_weekday(2), 2);
        assert_eq!(cts_weekday(3), 3);
        assert_eq!(cts_weekday(4), 4);
        assert_eq!(cts_weekday(5), 5);
        assert_eq!(cts_weekday(6), 6); // Saturday
    }

    #[test]
    fn test_weekday_never_zero() {
        for native in 0..=u8::MAX {
            let day = cts_weekday(native);
            assert!((1..=7).contains(&day), "native {} -> {}", native, day);
        }
    }

    #[test]
    fn test_friday_scenario() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 15, 14, 5, 9).unwrap();
        let ts = CtsTimestamp::from_datetime(&dt);
        assert_eq!(ts.weekday, 5);

        let record = encode(&ts);
        assert_eq!(
            record.as_bytes(),
            &[0xE8, 0x07, 0x03, 0x0F, 0x0E, 0x05, 0x09, 0x05]
        );
        assert_eq!(record.to_string(), "e807030f0e050905");
    }

    #[test]
    fn test_chrono_weekdays_match_iso() {
        // 2024-03-11 is a Monday
        let monday = Utc.with_ymd_and_hms(2024, 3, 11, 12, 0, 0).unwrap();
        for offset in 0..7 {
            let dt = monday + Duration::days(offset);
            let record = encode(&CtsTimestamp::from_datetime(&dt));
            assert_eq!(
                u32::from(record.weekday()),
                dt.weekday().number_from_monday()
            );
        }
    }

    #[test]
    fn test_year_little_endian_full_range() {
        for year in 0..=u16::MAX {
            let record = encode(&timestamp(year, 1));
            assert_eq!(record.as_bytes().len(), CTS_RECORD_LEN);
            assert_eq!(record.year(), year);
        }
    }

    #[test]
    fn test_end_of_year_boundary() {
        let ts = CtsTimestamp {
            year: 2023,
            month: 12,
            day: 31,
            hour: 23,
            minute: 59,
            second: 59,
            weekday: 0,
        };
        let record = encode(&ts);
        assert_eq!(
            record.as_bytes(),
            &[0xE7, 0x07, 12, 31, 23, 59, 59, 7]
        );
        assert_eq!(record.month(), 12);
        assert_eq!(record.day(), 31);
        assert_eq!(record.hour(), 23);
        assert_eq!(record.minute(), 59);
        assert_eq!(record.second(), 59);
    }

    #[test]
    fn test_encode_is_pure() {
        let dt = Utc.with_ymd_and_hms(2025, 7, 4, 8, 30, 0).unwrap();
        let ts = CtsTimestamp::from_datetime(&dt);
        assert_eq!(encode(&ts), encode(&ts));
    }
}
