//! Codec catalogue
//!
//! Maps RTP payload types (RFC 3551 plus the dynamic-range conventions seen on
//! FXS gateways) to codecs, and codecs to their E-Model equipment impairment.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Payload types in the dynamic range that are assumed to carry Opus
pub const OPUS_DYNAMIC_TYPES: [u8; 5] = [96, 111, 120, 121, 122];

/// Audio codecs the monitor knows how to score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Codec {
    /// PCMU / PCMA
    #[serde(rename = "G.711")]
    G711,
    #[serde(rename = "G.729")]
    G729,
    #[serde(rename = "G.729A")]
    G729A,
    #[serde(rename = "G.723.1")]
    G7231,
    #[serde(rename = "GSM")]
    Gsm,
    #[serde(rename = "iLBC")]
    Ilbc,
    #[serde(rename = "Opus")]
    Opus,
    /// Dynamic payload type with no known mapping
    #[serde(rename = "Unknown")]
    Unknown,
}

impl Codec {
    /// Display name, as reported in metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Codec::G711 => "G.711",
            Codec::G729 => "G.729",
            Codec::G729A => "G.729A",
            Codec::G7231 => "G.723.1",
            Codec::Gsm => "GSM",
            Codec::Ilbc => "iLBC",
            Codec::Opus => "Opus",
            Codec::Unknown => "Unknown",
        }
    }

    /// Lenient lookup by name; anything unrecognised is `Unknown`
    pub fn from_name(name: &str) -> Self {
        name.parse().unwrap_or(Codec::Unknown)
    }

    /// Map an RTP payload type to a codec.
    ///
    /// Explicit entries win over the dynamic-range heuristic, so 97 is iLBC
    /// and 98/99 are G.729 variants. Other dynamic types are Opus when they
    /// fall in [`OPUS_DYNAMIC_TYPES`], otherwise `Unknown`. Unassigned static
    /// types fall back to G.711.
    pub fn from_payload_type(payload_type: u8) -> Self {
        match payload_type & 0x7F {
            0 | 8 => Codec::G711,
            3 => Codec::Gsm,
            4 => Codec::G7231,
            18 | 19 | 98 => Codec::G729,
            99 => Codec::G729A,
            97 => Codec::Ilbc,
            pt @ 96..=127 if OPUS_DYNAMIC_TYPES.contains(&pt) => Codec::Opus,
            96..=127 => Codec::Unknown,
            _ => Codec::G711,
        }
    }

    /// Base equipment impairment `Ie` used by the E-Model
    pub fn equipment_impairment(&self) -> f64 {
        match self {
            Codec::G711 | Codec::Opus | Codec::Unknown => 0.0,
            Codec::G729 | Codec::G729A => 10.0,
            Codec::G7231 => 15.0,
            Codec::Gsm => 20.0,
            Codec::Ilbc => 8.0,
        }
    }
}

impl Default for Codec {
    fn default() -> Self {
        Codec::G711
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Codec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        match normalized.as_str() {
            "G.711" | "G711" | "PCMU" | "PCMA" | "G.711U" | "G.711A" => Ok(Codec::G711),
            "G.729" | "G729" => Ok(Codec::G729),
            "G.729A" | "G729A" => Ok(Codec::G729A),
            "G.723.1" | "G.723" | "G723" => Ok(Codec::G7231),
            "GSM" => Ok(Codec::Gsm),
            "ILBC" => Ok(Codec::Ilbc),
            "OPUS" => Ok(Codec::Opus),
            "UNKNOWN" => Ok(Codec::Unknown),
            _ => Err(Error::UnknownCodec(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_payload_types() {
        assert_eq!(Codec::from_payload_type(0), Codec::G711);
        assert_eq!(Codec::from_payload_type(8), Codec::G711);
        assert_eq!(Codec::from_payload_type(18), Codec::G729);
        assert_eq!(Codec::from_payload_type(19), Codec::G729);
        assert_eq!(Codec::from_payload_type(4), Codec::G7231);
        assert_eq!(Codec::from_payload_type(3), Codec::Gsm);
    }

    #[test]
    fn unassigned_static_type_defaults_to_g711() {
        assert_eq!(Codec::from_payload_type(13), Codec::G711);
        assert_eq!(Codec::from_payload_type(34), Codec::G711);
    }

    #[test]
    fn dynamic_range() {
        assert_eq!(Codec::from_payload_type(97), Codec::Ilbc);
        assert_eq!(Codec::from_payload_type(98), Codec::G729);
        assert_eq!(Codec::from_payload_type(99), Codec::G729A);
        assert_eq!(Codec::from_payload_type(96), Codec::Opus);
        assert_eq!(Codec::from_payload_type(111), Codec::Opus);
        assert_eq!(Codec::from_payload_type(122), Codec::Opus);
        assert_eq!(Codec::from_payload_type(101), Codec::Unknown);
        assert_eq!(Codec::from_payload_type(127), Codec::Unknown);
    }

    #[test]
    fn names_round_trip_through_display() {
        for codec in [
            Codec::G711,
            Codec::G729,
            Codec::G729A,
            Codec::G7231,
            Codec::Gsm,
            Codec::Ilbc,
            Codec::Opus,
            Codec::Unknown,
        ] {
            assert_eq!(codec.as_str().parse::<Codec>(), Ok(codec));
        }
        assert_eq!(Codec::from_name("pcma"), Codec::G711);
        assert_eq!(Codec::from_name("No RTP"), Codec::Unknown);
        assert!("AMR-WB".parse::<Codec>().is_err());
    }

    #[test]
    fn impairments() {
        assert_eq!(Codec::G711.equipment_impairment(), 0.0);
        assert_eq!(Codec::G729A.equipment_impairment(), 10.0);
        assert_eq!(Codec::Gsm.equipment_impairment(), 20.0);
        assert_eq!(Codec::Unknown.equipment_impairment(), 0.0);
    }
}
