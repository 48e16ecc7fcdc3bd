//! Profile/measurement parser (C2, spec §4.2). Decodes a self-describing
//! big-endian binary format: a repeated sequence of profile blocks, each
//! followed by its level measurements. No system dependency beyond this
//! module's own byte reader.
//!
//! Layout (all multi-byte fields big-endian):
//! ```text
//! magic: [u8; 4] = b"AFMT"
//! version: u16
//! repeated until EOF {
//!     float_id_len: u16, float_id: [u8; float_id_len]
//!     cycle_number: i64
//!     latitude: f64      (sentinel 99999.0 => missing)
//!     longitude: f64     (sentinel 99999.0 => missing)
//!     datetime_len: u16, datetime: [u8; datetime_len]  (RFC 3339, empty => missing)
//!     level_count: u32
//!     repeated level_count times {
//!         pressure: f64     (sentinel 99999.0 => missing)
//!         temperature: f64  (sentinel 99999.0 => missing)
//!         salinity: f64     (sentinel 99999.0 => missing)
//!         quality_flag: i16 (sentinel -1 => missing)
//!     }
//! }
//! ```

use byteorder::{BigEndian, ReadBytesExt};
use chrono::{DateTime, Utc};
use std::io::{Cursor, Read};

use crate::error::ParseError;
use crate::models::{ParsedMeasurement, ParsedProfile};

const MAGIC: &[u8; 4] = b"AFMT";
const SUPPORTED_VERSION: u16 = 1;
const FLOAT_FILL: f64 = 99999.0;
const FLAG_FILL: i16 = -1;

/// Non-fatal issues recorded while parsing one file (spec §4.2: the parser
/// never raises on content errors).
#[derive(Debug, Clone, Default)]
pub struct ParseDiagnostics {
    pub warnings: Vec<String>,
}

impl ParseDiagnostics {
    fn note(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }
}

/// Parse one downloaded file into zero or more profiles plus diagnostics.
pub fn parse_profile_file(bytes: &[u8]) -> Result<(Vec<ParsedProfile>, ParseDiagnostics), ParseError> {
    let mut cursor = Cursor::new(bytes);
    let mut diagnostics = ParseDiagnostics::default();

    let mut magic = [0u8; 4];
    cursor.read_exact(&mut magic).map_err(|_| ParseError::Truncated { expected: 4, found: bytes.len() })?;
    if &magic != MAGIC {
        return Err(ParseError::BadMagic(magic.to_vec()));
    }

    let version = cursor.read_u16::<BigEndian>()?;
    if version != SUPPORTED_VERSION {
        return Err(ParseError::UnsupportedVersion(version));
    }

    let mut profiles = Vec::new();
    loop {
        match parse_one_profile(&mut cursor, &mut diagnostics) {
            Ok(Some(profile)) => profiles.push(profile),
            Ok(None) => break,
            Err(e) => return Err(e),
        }
    }

    Ok((profiles, diagnostics))
}

fn parse_one_profile(
    cursor: &mut Cursor<&[u8]>,
    diagnostics: &mut ParseDiagnostics,
) -> Result<Option<ParsedProfile>, ParseError> {
    let float_id_len = match cursor.read_u16::<BigEndian>() {
        Ok(v) => v,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut float_id_bytes = vec![0u8; float_id_len as usize];
    cursor.read_exact(&mut float_id_bytes)?;
    let float_id = String::from_utf8_lossy(&float_id_bytes).into_owned();

    let cycle_number = cursor.read_i64::<BigEndian>()?;

    let raw_lat = cursor.read_f64::<BigEndian>()?;
    let raw_lon = cursor.read_f64::<BigEndian>()?;
    let (latitude, longitude) = resolve_position(raw_lat, raw_lon, &float_id, cycle_number, diagnostics);

    let datetime_len = cursor.read_u16::<BigEndian>()?;
    let mut datetime_bytes = vec![0u8; datetime_len as usize];
    cursor.read_exact(&mut datetime_bytes)?;
    let datetime_str = String::from_utf8_lossy(&datetime_bytes).into_owned();
    let datetime = resolve_datetime(&datetime_str, &float_id, cycle_number, diagnostics);

    let level_count = cursor.read_u32::<BigEndian>()?;
    let mut measurements = Vec::with_capacity(level_count as usize);
    for level in 0..level_count {
        let raw_pressure = cursor.read_f64::<BigEndian>()?;
        let raw_temperature = cursor.read_f64::<BigEndian>()?;
        let raw_salinity = cursor.read_f64::<BigEndian>()?;
        let raw_flag = cursor.read_i16::<BigEndian>()?;

        measurements.push(ParsedMeasurement {
            level: level as i64,
            pressure: non_sentinel(raw_pressure),
            temperature: non_sentinel(raw_temperature),
            salinity: non_sentinel(raw_salinity),
            quality_flag: if raw_flag == FLAG_FILL { None } else { Some(raw_flag) },
        });
    }

    Ok(Some(ParsedProfile { float_id, cycle_number, latitude, longitude, datetime, measurements }))
}

fn non_sentinel(value: f64) -> Option<f64> {
    if (value - FLOAT_FILL).abs() < f64::EPSILON { None } else { Some(value) }
}

fn resolve_position(
    raw_lat: f64,
    raw_lon: f64,
    float_id: &str,
    cycle_number: i64,
    diagnostics: &mut ParseDiagnostics,
) -> (Option<f64>, Option<f64>) {
    let lat = non_sentinel(raw_lat);
    let lon = non_sentinel(raw_lon);

    match (lat, lon) {
        (Some(lat), Some(lon)) if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) => {
            (Some(lat), Some(lon))
        },
        (Some(_), Some(_)) => {
            diagnostics.note(format!(
                "float {float_id} cycle {cycle_number}: coordinates out of bounds, treated as missing"
            ));
            (None, None)
        },
        _ => (None, None),
    }
}

fn resolve_datetime(
    raw: &str,
    float_id: &str,
    cycle_number: i64,
    diagnostics: &mut ParseDiagnostics,
) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(_) => {
            diagnostics.note(format!(
                "float {float_id} cycle {cycle_number}: unparseable datetime '{raw}', field nulled"
            ));
            None
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;
    use std::io::Write;

    fn write_profile(
        buf: &mut Vec<u8>,
        float_id: &str,
        cycle: i64,
        lat: f64,
        lon: f64,
        datetime: &str,
        levels: &[(f64, f64, f64, i16)],
    ) {
        buf.write_u16::<BigEndian>(float_id.len() as u16).unwrap();
        buf.write_all(float_id.as_bytes()).unwrap();
        buf.write_i64::<BigEndian>(cycle).unwrap();
        buf.write_f64::<BigEndian>(lat).unwrap();
        buf.write_f64::<BigEndian>(lon).unwrap();
        buf.write_u16::<BigEndian>(datetime.len() as u16).unwrap();
        buf.write_all(datetime.as_bytes()).unwrap();
        buf.write_u32::<BigEndian>(levels.len() as u32).unwrap();
        for (p, t, s, f) in levels {
            buf.write_f64::<BigEndian>(*p).unwrap();
            buf.write_f64::<BigEndian>(*t).unwrap();
            buf.write_f64::<BigEndian>(*s).unwrap();
            buf.write_i16::<BigEndian>(*f).unwrap();
        }
    }

    fn header(buf: &mut Vec<u8>) {
        buf.extend_from_slice(MAGIC);
        buf.write_u16::<BigEndian>(SUPPORTED_VERSION).unwrap();
    }

    #[test]
    fn parses_one_profile_with_levels() {
        let mut buf = Vec::new();
        header(&mut buf);
        write_profile(
            &mut buf,
            "1902482",
            12,
            15.0,
            70.0,
            "2024-01-01T00:00:00Z",
            &[(10.0, 28.5, 35.1, 1), (20.0, 27.9, 35.2, 1)],
        );

        let (profiles, diagnostics) = parse_profile_file(&buf).unwrap();
        assert_eq!(profiles.len(), 1);
        assert!(diagnostics.warnings.is_empty());
        let p = &profiles[0];
        assert_eq!(p.float_id, "1902482");
        assert_eq!(p.latitude, Some(15.0));
        assert_eq!(p.measurements.len(), 2);
        assert_eq!(p.measurements[0].level, 0);
        assert_eq!(p.measurements[1].level, 1);
    }

    #[test]
    fn zero_measurement_profile_is_still_emitted() {
        let mut buf = Vec::new();
        header(&mut buf);
        write_profile(&mut buf, "1902482", 1, 15.0, 70.0, "2024-01-01T00:00:00Z", &[]);

        let (profiles, _) = parse_profile_file(&buf).unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].measurements.len(), 0);
    }

    #[test]
    fn out_of_range_coordinates_become_missing_with_diagnostic() {
        let mut buf = Vec::new();
        header(&mut buf);
        write_profile(&mut buf, "1902482", 1, 200.0, 70.0, "2024-01-01T00:00:00Z", &[]);

        let (profiles, diagnostics) = parse_profile_file(&buf).unwrap();
        assert_eq!(profiles[0].latitude, None);
        assert_eq!(profiles[0].longitude, None);
        assert_eq!(diagnostics.warnings.len(), 1);
    }

    #[test]
    fn bad_datetime_nulls_field_without_dropping_profile() {
        let mut buf = Vec::new();
        header(&mut buf);
        write_profile(&mut buf, "1902482", 1, 15.0, 70.0, "not-a-date", &[]);

        let (profiles, diagnostics) = parse_profile_file(&buf).unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].datetime, None);
        assert_eq!(diagnostics.warnings.len(), 1);
    }

    #[test]
    fn sentinel_values_become_null_measurements() {
        let mut buf = Vec::new();
        header(&mut buf);
        write_profile(
            &mut buf,
            "1902482",
            1,
            15.0,
            70.0,
            "2024-01-01T00:00:00Z",
            &[(FLOAT_FILL, FLOAT_FILL, FLOAT_FILL, FLAG_FILL)],
        );

        let (profiles, _) = parse_profile_file(&buf).unwrap();
        let m = &profiles[0].measurements[0];
        assert_eq!(m.pressure, None);
        assert_eq!(m.temperature, None);
        assert_eq!(m.salinity, None);
        assert_eq!(m.quality_flag, None);
    }

    #[test]
    fn rejects_bad_magic() {
        let buf = vec![0, 0, 0, 0];
        assert!(matches!(parse_profile_file(&buf), Err(ParseError::BadMagic(_))));
    }

    #[test]
    fn multiple_profiles_in_one_file() {
        let mut buf = Vec::new();
        header(&mut buf);
        write_profile(&mut buf, "1902482", 1, 15.0, 70.0, "2024-01-01T00:00:00Z", &[]);
        write_profile(&mut buf, "1902482", 2, 15.1, 70.1, "2024-02-01T00:00:00Z", &[]);

        let (profiles, _) = parse_profile_file(&buf).unwrap();
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[1].cycle_number, 2);
    }
}
