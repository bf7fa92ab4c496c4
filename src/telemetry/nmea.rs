// Copyright 2026 The Dashcam Core Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Parses NMEA-0183 GPS telemetry (`$GPRMC`/`$GNRMC`, `$GPGGA`/`$GNGGA`) into [`GpsPoint`]s.
//!
//! Field splitting uses `nom`, the corpus's established choice for line-oriented text/telemetry
//! parsing; `chrono` composes the `HHMMSS`/`DDMMYY` fields into a wallclock timestamp. Malformed
//! lines are not fatal: following the teacher's tolerance for individual non-compliant stream
//! units (`codec/h265/parser.rs` logs and continues rather than aborting), [`GpsStreamBuilder`]
//! logs a warning and skips the offending sentence.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use nom::bytes::complete::{take_while, take_while1};
use nom::character::complete::char;
use nom::sequence::preceded;
use nom::IResult;
use thiserror::Error;

use super::GpsPoint;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NmeaParseError {
    #[error("empty line")]
    Empty,
    #[error("checksum mismatch: expected {expected:02X}, line carried {found:02X}")]
    ChecksumMismatch { expected: u8, found: u8 },
    #[error("malformed field: {0}")]
    MalformedField(String),
    #[error("unrecognized sentence type: {0}")]
    Unrecognized(String),
}

/// A successfully parsed, non-void sentence, before being merged into a [`GpsPoint`] sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum RawSentence {
    Rmc {
        time: NaiveTime,
        date: NaiveDate,
        latitude: f64,
        longitude: f64,
        speed_kmh: f64,
        heading_deg: Option<f64>,
    },
    Gga {
        time: NaiveTime,
        latitude: f64,
        longitude: f64,
        satellite_count: u32,
        hdop: f64,
        altitude: Option<f64>,
    },
}

fn field(input: &str) -> IResult<&str, &str> {
    preceded(char(','), take_while1(|c: char| c != ',' && c != '*'))(input)
}

fn opt_field(input: &str) -> IResult<&str, Option<&str>> {
    let (input, _) = char(',')(input)?;
    let (input, value) = take_while(|c: char| c != ',' && c != '*')(input)?;
    Ok((input, if value.is_empty() { None } else { Some(value) }))
}

/// Verifies the `*HH` checksum suffix, if present, and strips it. A sentence with no checksum
/// suffix is accepted as-is (some dashcam GPS units omit it).
fn verify_and_strip_checksum(line: &str) -> Result<&str, NmeaParseError> {
    let body = line.strip_prefix('$').ok_or(NmeaParseError::Empty)?;
    match body.rfind('*') {
        None => Ok(body),
        Some(idx) => {
            let (payload, suffix) = body.split_at(idx);
            let hex = &suffix[1..];
            let found = u8::from_str_radix(hex, 16)
                .map_err(|_| NmeaParseError::MalformedField(format!("bad checksum hex: {hex}")))?;
            let computed = payload.bytes().fold(0u8, |acc, b| acc ^ b);
            if computed != found {
                return Err(NmeaParseError::ChecksumMismatch { expected: computed, found });
            }
            Ok(payload)
        }
    }
}

/// Splits a `DDMM.MMMM`/`DDDMM.MMMM`-shaped coordinate field into its degrees and minutes parts.
/// NMEA minutes always carry exactly 2 integer digits before the decimal point regardless of
/// fractional precision, so the split point is derived from the `.` position, not a fixed tail
/// length (a fixed-length split breaks on any sentence whose fractional digit count differs from
/// the fixture it was tuned against).
fn split_degrees_minutes(raw: &str) -> Result<(&str, &str), NmeaParseError> {
    let dot = raw.find('.').ok_or_else(|| NmeaParseError::MalformedField(raw.to_string()))?;
    if dot < 2 {
        return Err(NmeaParseError::MalformedField(raw.to_string()));
    }
    Ok(raw.split_at(dot - 2))
}

fn parse_lat(raw: &str, hemi: &str) -> Result<f64, NmeaParseError> {
    if raw.len() < 4 {
        return Err(NmeaParseError::MalformedField(format!("lat too short: {raw}")));
    }
    let (deg, min) = split_degrees_minutes(raw)?;
    let deg: f64 = deg.parse().map_err(|_| NmeaParseError::MalformedField(raw.to_string()))?;
    let min: f64 = min.parse().map_err(|_| NmeaParseError::MalformedField(raw.to_string()))?;
    let value = deg + min / 60.0;
    Ok(if hemi == "S" { -value } else { value })
}

fn parse_lon(raw: &str, hemi: &str) -> Result<f64, NmeaParseError> {
    if raw.len() < 5 {
        return Err(NmeaParseError::MalformedField(format!("lon too short: {raw}")));
    }
    let (deg, min) = split_degrees_minutes(raw)?;
    let deg: f64 = deg.parse().map_err(|_| NmeaParseError::MalformedField(raw.to_string()))?;
    let min: f64 = min.parse().map_err(|_| NmeaParseError::MalformedField(raw.to_string()))?;
    let value = deg + min / 60.0;
    Ok(if hemi == "W" { -value } else { value })
}

fn parse_time(raw: &str) -> Result<NaiveTime, NmeaParseError> {
    let whole = raw.split('.').next().unwrap_or(raw);
    if whole.len() != 6 {
        return Err(NmeaParseError::MalformedField(format!("bad HHMMSS: {raw}")));
    }
    let h: u32 = whole[0..2].parse().map_err(|_| NmeaParseError::MalformedField(raw.to_string()))?;
    let m: u32 = whole[2..4].parse().map_err(|_| NmeaParseError::MalformedField(raw.to_string()))?;
    let s: u32 = whole[4..6].parse().map_err(|_| NmeaParseError::MalformedField(raw.to_string()))?;
    NaiveTime::from_hms_opt(h, m, s).ok_or_else(|| NmeaParseError::MalformedField(raw.to_string()))
}

fn parse_date(raw: &str) -> Result<NaiveDate, NmeaParseError> {
    if raw.len() != 6 {
        return Err(NmeaParseError::MalformedField(format!("bad DDMMYY: {raw}")));
    }
    let d: u32 = raw[0..2].parse().map_err(|_| NmeaParseError::MalformedField(raw.to_string()))?;
    let m: u32 = raw[2..4].parse().map_err(|_| NmeaParseError::MalformedField(raw.to_string()))?;
    let yy: i32 = raw[4..6].parse().map_err(|_| NmeaParseError::MalformedField(raw.to_string()))?;
    let year = 2000 + yy;
    NaiveDate::from_ymd_opt(year, m, d).ok_or_else(|| NmeaParseError::MalformedField(raw.to_string()))
}

fn parse_rmc(rest: &str) -> Result<Option<RawSentence>, NmeaParseError> {
    // Fields after "RMC": time,status,lat,N/S,lon,E/W,speed_knots,heading,date,...
    // `time` is read tolerantly (it may be blank on a void fix) so status is checked before any
    // field is required to be well-formed.
    let (rest, time_s) = opt_field(rest).map_err(|_| NmeaParseError::MalformedField("time".into()))?;
    let (rest, status) = field(rest).map_err(|_| NmeaParseError::MalformedField("status".into()))?;
    if status != "A" {
        return Ok(None);
    }
    let time_s = time_s.ok_or_else(|| NmeaParseError::MalformedField("time".into()))?;
    let (rest, lat_s) = field(rest).map_err(|_| NmeaParseError::MalformedField("lat".into()))?;
    let (rest, ns) = field(rest).map_err(|_| NmeaParseError::MalformedField("N/S".into()))?;
    let (rest, lon_s) = field(rest).map_err(|_| NmeaParseError::MalformedField("lon".into()))?;
    let (rest, ew) = field(rest).map_err(|_| NmeaParseError::MalformedField("E/W".into()))?;
    let (rest, speed_s) = field(rest).map_err(|_| NmeaParseError::MalformedField("speed".into()))?;
    let (rest, heading_s) = opt_field(rest).map_err(|_| NmeaParseError::MalformedField("heading".into()))?;
    let (rest, date_s) = opt_field(rest).map_err(|_| NmeaParseError::MalformedField("date".into()))?;
    let _ = rest;

    let time = parse_time(time_s)?;
    let date = date_s
        .map(parse_date)
        .transpose()?
        .ok_or_else(|| NmeaParseError::MalformedField("missing date".into()))?;
    let latitude = parse_lat(lat_s, ns)?;
    let longitude = parse_lon(lon_s, ew)?;
    let speed_knots: f64 =
        speed_s.parse().map_err(|_| NmeaParseError::MalformedField(speed_s.to_string()))?;
    let heading_deg = match heading_s {
        Some(s) if !s.is_empty() => {
            Some(s.parse::<f64>().map_err(|_| NmeaParseError::MalformedField(s.to_string()))?)
        }
        _ => None,
    };

    Ok(Some(RawSentence::Rmc {
        time,
        date,
        latitude,
        longitude,
        speed_kmh: speed_knots * 1.852,
        heading_deg,
    }))
}

fn parse_gga(rest: &str) -> Result<Option<RawSentence>, NmeaParseError> {
    // Fields after "GGA": time,lat,N/S,lon,E/W,quality,sat_count,hdop,altitude,M,...
    let (rest, time_s) = field(rest).map_err(|_| NmeaParseError::MalformedField("time".into()))?;
    let (rest, lat_s) = field(rest).map_err(|_| NmeaParseError::MalformedField("lat".into()))?;
    let (rest, ns) = field(rest).map_err(|_| NmeaParseError::MalformedField("N/S".into()))?;
    let (rest, lon_s) = field(rest).map_err(|_| NmeaParseError::MalformedField("lon".into()))?;
    let (rest, ew) = field(rest).map_err(|_| NmeaParseError::MalformedField("E/W".into()))?;
    let (rest, quality_s) =
        field(rest).map_err(|_| NmeaParseError::MalformedField("quality".into()))?;
    let quality: u32 =
        quality_s.parse().map_err(|_| NmeaParseError::MalformedField(quality_s.to_string()))?;
    if quality == 0 {
        return Ok(None);
    }
    let (rest, sat_s) =
        field(rest).map_err(|_| NmeaParseError::MalformedField("satellites".into()))?;
    let (rest, hdop_s) = field(rest).map_err(|_| NmeaParseError::MalformedField("hdop".into()))?;
    let (rest, alt_s) = opt_field(rest).map_err(|_| NmeaParseError::MalformedField("altitude".into()))?;
    let _ = rest;

    let time = parse_time(time_s)?;
    let latitude = parse_lat(lat_s, ns)?;
    let longitude = parse_lon(lon_s, ew)?;
    let satellite_count: u32 =
        sat_s.parse().map_err(|_| NmeaParseError::MalformedField(sat_s.to_string()))?;
    let hdop: f64 = hdop_s.parse().map_err(|_| NmeaParseError::MalformedField(hdop_s.to_string()))?;
    let altitude = match alt_s {
        Some(s) if !s.is_empty() => {
            Some(s.parse::<f64>().map_err(|_| NmeaParseError::MalformedField(s.to_string()))?)
        }
        _ => None,
    };

    Ok(Some(RawSentence::Gga { time, latitude, longitude, satellite_count, hdop, altitude }))
}

/// Parses one NMEA-0183 line. Returns `Ok(None)` for a recognized-but-void sentence (RMC status
/// `V`, GGA fix quality `0`) or an unrecognized sentence type — neither is an error.
pub fn parse_sentence(line: &str) -> Result<Option<RawSentence>, NmeaParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(NmeaParseError::Empty);
    }
    let payload = verify_and_strip_checksum(line)?;

    let (prefix, rest) = payload.split_at(5.min(payload.len()));
    match prefix {
        "GPRMC" | "GNRMC" => parse_rmc(rest),
        "GPGGA" | "GNGGA" => parse_gga(rest),
        _ => Ok(None),
    }
}

fn is_recognized_but_unsupported(line: &str) -> bool {
    let t = line.trim_start_matches('$');
    !(t.starts_with("GPRMC")
        || t.starts_with("GNRMC")
        || t.starts_with("GPGGA")
        || t.starts_with("GNGGA"))
}

/// Accumulates [`RawSentence`]s into a time-sorted `Vec<GpsPoint>`, merging a GGA sentence into
/// the most recently produced RMC-derived point sharing the same wallclock second.
#[derive(Default)]
pub struct GpsStreamBuilder {
    points: Vec<GpsPoint>,
    last_rmc_second: Option<DateTime<Utc>>,
}

impl GpsStreamBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_rmc(&mut self, time: NaiveTime, date: NaiveDate, latitude: f64, longitude: f64, speed_kmh: f64, heading_deg: Option<f64>) {
        let naive = date.and_time(time);
        let wallclock = Utc.from_utc_datetime(&naive);
        self.last_rmc_second = Some(wallclock);
        self.points.push(GpsPoint {
            wallclock_timestamp: wallclock,
            latitude,
            longitude,
            altitude: None,
            speed_kmh: Some(speed_kmh),
            heading_deg,
            horizontal_accuracy_m: None,
            satellite_count: None,
        });
    }

    fn merge_gga(&mut self, altitude: Option<f64>, satellite_count: u32, hdop: f64) {
        if let Some(last) = self.points.last_mut() {
            last.altitude = altitude;
            last.satellite_count = Some(satellite_count);
            // HDOP*10m is a coarse heuristic, documented on the field itself (see §9).
            last.horizontal_accuracy_m = Some(hdop * 10.0);
        }
    }

    pub fn push(&mut self, sentence: RawSentence) {
        match sentence {
            RawSentence::Rmc { time, date, latitude, longitude, speed_kmh, heading_deg } => {
                self.push_rmc(time, date, latitude, longitude, speed_kmh, heading_deg);
            }
            RawSentence::Gga { altitude, satellite_count, hdop, .. } => {
                self.merge_gga(altitude, satellite_count, hdop);
            }
        }
    }

    /// Parses `text` (one sentence per line) and feeds every recognized, non-void sentence
    /// through [`Self::push`]. Malformed lines are logged and skipped rather than aborting the
    /// whole stream.
    pub fn ingest_text(&mut self, text: &str) {
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_sentence(line) {
                Ok(Some(sentence)) => self.push(sentence),
                Ok(None) => {
                    if is_recognized_but_unsupported(line) {
                        log::debug!("nmea: unrecognized sentence type, skipping: {line}");
                    } else {
                        log::debug!("nmea: void/no-fix sentence, skipping: {line}");
                    }
                }
                Err(e) => log::warn!("nmea: malformed sentence, skipping ({e}): {line}"),
            }
        }
    }

    /// Consumes the builder, returning points sorted by `wallclock_timestamp`.
    pub fn finish(mut self) -> Vec<GpsPoint> {
        self.points.sort_by_key(|p| p.wallclock_timestamp);
        self.points
    }
}
