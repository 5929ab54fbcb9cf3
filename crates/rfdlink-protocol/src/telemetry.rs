//! Balloon position reports carried on `GPS,` telemetry lines.

use crate::constants::{FEET_PER_METER, TELEMETRY_FIELD_COUNT, TELEMETRY_PREFIX};
use crate::error::{ProtocolError, ProtocolResult};

/// A position fix reported by the balloon's GPS.
///
/// Field order on the wire: hours, minutes, seconds, latitude, longitude,
/// altitude (meters above sea level), satellite count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryRecord {
    /// Hour of the fix (UTC).
    pub hours: u32,
    /// Minute of the fix.
    pub minutes: u32,
    /// Seconds of the fix, with fraction.
    pub seconds: f64,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Altitude in meters.
    pub altitude_m: f64,
    /// Number of satellites in the fix.
    pub satellite_count: u32,
}

impl TelemetryRecord {
    /// Parse the fields of a telemetry line, prefix already stripped.
    pub fn parse_fields(fields: &str) -> ProtocolResult<TelemetryRecord> {
        let parts: Vec<&str> = fields.trim_end().split(',').map(str::trim).collect();
        if parts.len() != TELEMETRY_FIELD_COUNT {
            return Err(ProtocolError::TelemetryFieldCount {
                expected: TELEMETRY_FIELD_COUNT,
                actual: parts.len(),
            });
        }

        Ok(TelemetryRecord {
            hours: whole(parts[0], "hours")?,
            minutes: whole(parts[1], "minutes")?,
            seconds: number(parts[2], "seconds")?,
            latitude: number(parts[3], "latitude")?,
            longitude: number(parts[4], "longitude")?,
            altitude_m: number(parts[5], "altitude")?,
            satellite_count: whole(parts[6], "satellites")?,
        })
    }

    /// Parse a full telemetry line, prefix included.
    pub fn parse_line(line: &str) -> ProtocolResult<TelemetryRecord> {
        let fields = line.strip_prefix(TELEMETRY_PREFIX).unwrap_or(line);
        Self::parse_fields(fields)
    }

    /// Seconds elapsed since midnight at the fix.
    pub fn seconds_of_day(&self) -> f64 {
        f64::from(self.hours) * 3600.0 + f64::from(self.minutes) * 60.0 + self.seconds
    }

    /// Altitude in feet.
    pub fn altitude_ft(&self) -> f64 {
        self.altitude_m * FEET_PER_METER
    }

    /// Fix time as `HH:MM:SS`, whole seconds.
    pub fn fix_time(&self) -> String {
        format!(
            "{:02}:{:02}:{:02}",
            self.hours,
            self.minutes,
            self.seconds.trunc() as u32
        )
    }
}

fn number(value: &str, field: &'static str) -> ProtocolResult<f64> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ProtocolError::TelemetryField {
            field,
            value: value.to_string(),
        })
}

/// Whole-number field; the payload sometimes formats these as `7.0`.
fn whole(value: &str, field: &'static str) -> ProtocolResult<u32> {
    if let Ok(v) = value.parse::<u32>() {
        return Ok(v);
    }
    let v = number(value, field)?;
    if v < 0.0 || v.fract() != 0.0 || v > f64::from(u32::MAX) {
        return Err(ProtocolError::TelemetryField {
            field,
            value: value.to_string(),
        });
    }
    Ok(v as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        let record = TelemetryRecord::parse_line("GPS,12,34,56.7,45.123,-93.456,1200.0,7").unwrap();
        assert_eq!(record.hours, 12);
        assert_eq!(record.minutes, 34);
        assert!((record.seconds - 56.7).abs() < 1e-9);
        assert!((record.latitude - 45.123).abs() < 1e-9);
        assert!((record.longitude + 93.456).abs() < 1e-9);
        assert!((record.altitude_m - 1200.0).abs() < 1e-9);
        assert_eq!(record.satellite_count, 7);
    }

    #[test]
    fn test_derived_values() {
        let record = TelemetryRecord::parse_fields("1,2,3.5,0,0,100,9").unwrap();
        assert!((record.seconds_of_day() - 3723.5).abs() < 1e-9);
        assert!((record.altitude_ft() - 328.08).abs() < 1e-9);
        assert_eq!(record.fix_time(), "01:02:03");
    }

    #[test]
    fn test_float_formatted_counts() {
        let record = TelemetryRecord::parse_fields("12,34,56,45,-93,1200,7.0").unwrap();
        assert_eq!(record.satellite_count, 7);
        assert!(TelemetryRecord::parse_fields("12,34,56,45,-93,1200,7.5").is_err());
    }

    #[test]
    fn test_wrong_field_count() {
        let err = TelemetryRecord::parse_fields("12,34,56").unwrap_err();
        assert_eq!(
            err,
            ProtocolError::TelemetryFieldCount {
                expected: 7,
                actual: 3
            }
        );
    }

    #[test]
    fn test_non_numeric_field() {
        let err = TelemetryRecord::parse_fields("12,34,56,north,-93,1200,7").unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::TelemetryField {
                field: "latitude",
                ..
            }
        ));
    }
}
