//! Sonar packet decoding.
//!
//! Both packet types share one framing: a fixed packet header followed by
//! named, length-prefixed sections. See [`header`] for the wire format.
//!
//! - [`Bth0`]: bathymetry, complete in one packet
//! - [`Aid0`]: acoustic image data, one fragment of a ping's image

mod aid0;
mod bth0;
pub mod header;
mod writer;

#[cfg(test)]
pub(crate) mod fixtures;

use bytes::Bytes;

pub use aid0::{Aid0, IMAGE_PART_HEADER_SIZE, ImagePart};
pub use bth0::Bth0;
pub use header::{BeamAngles, PacketHeader, PingHeader, Section, Sections};
pub use writer::{MAX_SECTION_BODY, PacketWriter};

use crate::core::{DecodeError, PacketKind, PingKey, SonarPacket};

/// A packet that decoded and passed its type check.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedPacket {
    /// Complete bathymetry for one ping.
    Bathymetry(Bth0),
    /// One part of a ping's acoustic image.
    ImageFragment(Aid0),
}

impl DecodedPacket {
    /// Kind of the packet.
    pub fn kind(&self) -> PacketKind {
        match self {
            Self::Bathymetry(_) => PacketKind::Bth0,
            Self::ImageFragment(_) => PacketKind::Aid0,
        }
    }

    /// Ping number of the packet.
    pub fn ping_number(&self) -> PingKey {
        match self {
            Self::Bathymetry(p) => p.ping_number(),
            Self::ImageFragment(p) => p.ping_number(),
        }
    }

    /// The datagram the packet was decoded from.
    pub fn raw(&self) -> &Bytes {
        match self {
            Self::Bathymetry(p) => p.raw(),
            Self::ImageFragment(p) => p.raw(),
        }
    }
}

/// Decode a packet of whatever kind its name says.
///
/// Returns `Ok(None)` for packet names this crate does not handle.
pub fn decode_any(frame: &Bytes) -> Result<Option<DecodedPacket>, DecodeError> {
    match PacketKind::from_tag(frame) {
        Some(PacketKind::Bth0) => decode_checked::<Bth0>(frame),
        Some(PacketKind::Aid0) => decode_checked::<Aid0>(frame),
        None => Ok(None),
    }
}

fn decode_checked<T: SonarPacket>(frame: &Bytes) -> Result<Option<DecodedPacket>, DecodeError> {
    let packet = T::decode(frame)?;
    Ok(packet.is_type().then(|| packet.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::fixtures::{aid0_frame, bth0_frame};

    #[test]
    fn test_decode_any_by_name() {
        let bth0 = decode_any(&bth0_frame(3, 4)).unwrap().unwrap();
        assert_eq!(bth0.kind(), PacketKind::Bth0);
        assert_eq!(bth0.ping_number(), 3);

        let aid0 = decode_any(&aid0_frame(4, 4, 0, 1, 2)).unwrap().unwrap();
        assert_eq!(aid0.kind(), PacketKind::Aid0);
        assert_eq!(aid0.ping_number(), 4);
        assert_eq!(aid0.raw().len(), aid0_frame(4, 4, 0, 1, 2).len());
    }

    #[test]
    fn test_decode_any_unknown_name() {
        let frame = PacketWriter::new(*b"SNI0", 0).finish();
        assert_eq!(decode_any(&frame).unwrap(), None);
        assert_eq!(decode_any(&Bytes::new()).unwrap(), None);
    }

    #[test]
    fn test_decode_any_malformed() {
        let frame = bth0_frame(3, 4);
        assert!(decode_any(&frame.slice(..20)).is_err());
    }
}
