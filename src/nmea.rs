//! Decoding of the handful of NMEA 0183 sentences the GPS self-test cares about.
//!
//! Only the fields needed to judge a fix are extracted. Anything that does not decode cleanly
//! yields `None`, which callers treat as "not available yet" rather than as an error.

use std::str::FromStr;

/// Which coordinate a `DDMM.MMMM` / `DDDMM.MMMM` string encodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Latitude,
    Longitude,
}

impl Axis {
    fn degree_digits(self) -> usize {
        match self {
            Axis::Latitude => 2,
            Axis::Longitude => 3,
        }
    }

    fn max_degrees(self) -> f64 {
        match self {
            Axis::Latitude => 90.0,
            Axis::Longitude => 180.0,
        }
    }
}

/// Converts an NMEA coordinate and its hemisphere letter into signed decimal degrees.
///
/// `coord` is `DDMM.MMMM` for latitudes and `DDDMM.MMMM` for longitudes. Southern and western
/// hemispheres are negative. Returns `None` if the string is too short or not numeric, the
/// minutes are not below 60, the value lies beyond 90° latitude or 180° longitude, or the
/// hemisphere letter does not belong to `axis`.
pub fn decode_coordinate(coord: &str, hemisphere: &str, axis: Axis) -> Option<f64> {
    let degree_digits = axis.degree_digits();
    if coord.len() <= degree_digits || !coord.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return None;
    }

    let (degrees, minutes) = coord.split_at(degree_digits);
    if !degrees.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let degrees: f64 = degrees.parse().ok()?;
    let minutes: f64 = minutes.parse().ok()?;
    if minutes >= 60.0 {
        return None;
    }

    let value = degrees + minutes / 60.0;
    if value > axis.max_degrees() {
        return None;
    }

    match (axis, hemisphere) {
        (Axis::Latitude, "N") | (Axis::Longitude, "E") => Some(value),
        (Axis::Latitude, "S") | (Axis::Longitude, "W") => Some(-value),
        _ => None,
    }
}

/// XOR of all bytes between `$` and `*`
pub fn checksum(body: &str) -> u8 {
    body.trim_start_matches('$').bytes().fold(0, |acc, b| acc ^ b)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum SentenceKind {
    Rmc,
    Gga,
    Gsv,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sentence {
    /// Recommended minimum data. Carries the fix status and the position.
    Rmc { active: bool, latitude: Option<f64>, longitude: Option<f64> },
    /// Fix data. Only the number of satellites used in the solution is kept.
    Gga { satellites_used: Option<u8> },
    /// Satellites in view
    Gsv { satellites_in_view: Option<u8> },
}

impl Sentence {
    pub const ACTIVE: &'static str = "A";

    /// Parses a single trimmed line. Returns `None` for lines that are not one of the known
    /// sentences, have too few fields or carry a checksum that does not match.
    /// The talker id (`GP`, `GN`, `GL`, ...) is not checked.
    pub fn parse(line: &str) -> Option<Sentence> {
        let body = line.strip_prefix('$')?;
        let body = match body.split_once('*') {
            Some((body, sum)) => {
                let expected = u8::from_str_radix(sum.trim(), 16).ok()?;
                if checksum(body) != expected {
                    log::debug!("Checksum mismatch in {line:?}");
                    return None;
                }
                body
            }
            None => body,
        };

        let fields: Vec<&str> = body.split(',').collect();
        let tag = fields[0];
        if tag.len() != 5 || !tag.is_ascii() {
            return None;
        }
        let kind = SentenceKind::from_str(&tag[2..]).ok()?;

        match kind {
            SentenceKind::Rmc if fields.len() > 6 => Some(Sentence::Rmc {
                active: fields[2] == Self::ACTIVE,
                latitude: decode_coordinate(fields[3], fields[4], Axis::Latitude),
                longitude: decode_coordinate(fields[5], fields[6], Axis::Longitude),
            }),
            SentenceKind::Gga if fields.len() > 7 => {
                Some(Sentence::Gga { satellites_used: fields[7].parse().ok() })
            }
            SentenceKind::Gsv if fields.len() > 3 => {
                Some(Sentence::Gsv { satellites_in_view: fields[3].parse().ok() })
            }
            _ => None,
        }
    }
}
