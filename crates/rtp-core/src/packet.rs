//! RTP fixed header (RFC 3550 section 5.1)

use bytes::Buf;
use voipmon_quality_core::Codec;

use crate::error::{Error, Result};

/// RTP protocol version
pub const RTP_VERSION: u8 = 2;

/// Size of the fixed header, without CSRCs or extensions
pub const RTP_MIN_HEADER_SIZE: usize = 12;

/// Fixed part of an RTP header. CSRC lists, extensions and payload are not
/// needed for quality analysis and are left unparsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
    pub version: u8,
    pub padding: bool,
    pub extension: bool,
    pub csrc_count: u8,
    pub marker: bool,
    pub payload_type: u8,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub ssrc: u32,
}

impl RtpHeader {
    /// Parse an RTP header from bytes
    pub fn parse(buf: &mut impl Buf) -> Result<Self> {
        if buf.remaining() < RTP_MIN_HEADER_SIZE {
            return Err(Error::BufferTooSmall {
                required: RTP_MIN_HEADER_SIZE,
                available: buf.remaining(),
            });
        }

        // V(2) P(1) X(1) CC(4)
        let first = buf.get_u8();
        let version = first >> 6;
        if version != RTP_VERSION {
            return Err(Error::InvalidPacket(format!("Invalid RTP version: {}", version)));
        }

        // M(1) PT(7)
        let second = buf.get_u8();

        Ok(Self {
            version,
            padding: first & 0x20 != 0,
            extension: first & 0x10 != 0,
            csrc_count: first & 0x0F,
            marker: second & 0x80 != 0,
            payload_type: second & 0x7F,
            sequence_number: buf.get_u16(),
            timestamp: buf.get_u32(),
            ssrc: buf.get_u32(),
        })
    }

    /// Parse from a received datagram
    pub fn from_slice(mut data: &[u8]) -> Result<Self> {
        Self::parse(&mut data)
    }

    /// Codec inferred from the payload type
    pub fn codec(&self) -> Codec {
        Codec::from_payload_type(self.payload_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(first: u8, second: u8, seq: u16) -> Vec<u8> {
        let mut data = vec![first, second];
        data.extend_from_slice(&seq.to_be_bytes());
        data.extend_from_slice(&0x0102_0304u32.to_be_bytes());
        data.extend_from_slice(&0xdead_beefu32.to_be_bytes());
        data.extend_from_slice(&[0xAA; 160]);
        data
    }

    #[test]
    fn parses_fixed_header() {
        let data = packet(0x80, 0x80 | 18, 4242);
        let header = RtpHeader::from_slice(&data).unwrap();

        assert_eq!(header.version, 2);
        assert!(!header.padding);
        assert!(!header.extension);
        assert_eq!(header.csrc_count, 0);
        assert!(header.marker);
        assert_eq!(header.payload_type, 18);
        assert_eq!(header.sequence_number, 4242);
        assert_eq!(header.timestamp, 0x0102_0304);
        assert_eq!(header.ssrc, 0xdead_beef);
        assert_eq!(header.codec(), Codec::G729);
    }

    #[test]
    fn parses_flag_bits() {
        let data = packet(0b1011_0011, 8, 1);
        let header = RtpHeader::from_slice(&data).unwrap();
        assert!(header.padding);
        assert!(header.extension);
        assert_eq!(header.csrc_count, 3);
        assert!(!header.marker);
        assert_eq!(header.codec(), Codec::G711);
    }

    #[test]
    fn rejects_short_packet() {
        let err = RtpHeader::from_slice(&[0x80, 0x00, 0x00]).unwrap_err();
        assert_eq!(err, Error::BufferTooSmall { required: 12, available: 3 });
    }

    #[test]
    fn rejects_wrong_version() {
        let data = packet(0x40, 0, 1);
        assert!(matches!(
            RtpHeader::from_slice(&data),
            Err(Error::InvalidPacket(_))
        ));
    }
}
