//! Acoustic image data packet (`AID0`).
//!
//! A ping's water-column image is larger than one datagram, so the sonar
//! splits it into parts, each sent as its own AID0 packet:
//!
//! - `H0` ping header (required)
//! - `A0` beam angles (optional)
//! - `M0` image part (required)
//!
//! `M0` body:
//!
//! ```text
//! +-------------+------------+---------------+--------------+--------------+-------------------+
//! | Part number | Part total | Total samples | First sample | Sample count | Amplitudes        |
//! | u16         | u16        | u32           | u32          | u32          | count*beams * u16 |
//! +-------------+------------+---------------+--------------+--------------+-------------------+
//! ```
//!
//! Amplitudes are sample-major: all beams of sample `n`, then all beams of
//! sample `n + 1`.

use bytes::Bytes;

use super::DecodedPacket;
use super::header::{BeamAngles, PacketHeader, PingHeader, Reader, Sections};
use crate::core::{
    AID0_TAG, DecodeError, PacketKind, PingKey, SECTION_BEAM_ANGLES, SECTION_IMAGE_PART,
    SECTION_PING_HEADER, SonarPacket,
};

/// Size of the fixed part of an `M0` section body.
pub const IMAGE_PART_HEADER_SIZE: usize = 16;

/// One part of a ping's acoustic image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePart {
    /// Index of this part, from zero.
    pub part_number: u16,
    /// Number of parts the ping's image is split into.
    pub part_total: u16,
    /// Samples per beam in the whole image.
    pub total_samples: u32,
    /// Index of the first sample carried by this part.
    pub first_sample: u32,
    /// Number of samples carried by this part.
    pub sample_count: u32,
    /// Amplitudes, sample-major.
    pub amplitudes: Vec<u16>,
}

impl ImagePart {
    /// Parse an `M0` section body for a ping with `beams` beams.
    pub fn parse(body: &[u8], beams: usize) -> Result<Self, DecodeError> {
        let mut r = Reader::new(body);
        let part_number = r.u16()?;
        let part_total = r.u16()?;
        let total_samples = r.u32()?;
        let first_sample = r.u32()?;
        let sample_count = r.u32()?;

        let expected = (sample_count as usize)
            .checked_mul(beams)
            .ok_or(DecodeError::CountMismatch {
                section: "M0",
                expected: usize::MAX,
                actual: r.remaining() / 2,
            })?;
        let amplitudes = r.u16_array(expected, "M0")?;

        Ok(Self {
            part_number,
            part_total,
            total_samples,
            first_sample,
            sample_count,
            amplitudes,
        })
    }

    /// Serialize to an `M0` section body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(IMAGE_PART_HEADER_SIZE + self.amplitudes.len() * 2);
        buf.extend_from_slice(&self.part_number.to_be_bytes());
        buf.extend_from_slice(&self.part_total.to_be_bytes());
        buf.extend_from_slice(&self.total_samples.to_be_bytes());
        buf.extend_from_slice(&self.first_sample.to_be_bytes());
        buf.extend_from_slice(&self.sample_count.to_be_bytes());
        for a in &self.amplitudes {
            buf.extend_from_slice(&a.to_be_bytes());
        }
        buf
    }
}

/// Decoded acoustic image data packet.
#[derive(Debug, Clone, PartialEq)]
pub struct Aid0 {
    /// Packet header.
    pub header: PacketHeader,
    /// Ping header.
    pub ping: PingHeader,
    /// Beam angles, if the sonar sent them.
    pub angles: Option<BeamAngles>,
    /// Image part. Always present when [`is_type`](SonarPacket::is_type) holds.
    pub part: Option<ImagePart>,
    raw: Bytes,
}

impl Aid0 {
    /// Ping number of this packet.
    pub fn ping_number(&self) -> PingKey {
        self.ping.ping_number
    }

    /// Number of beams declared by the ping header.
    pub fn beam_count(&self) -> usize {
        self.ping.beam_count as usize
    }

    /// The datagram this packet was decoded from.
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }
}

impl SonarPacket for Aid0 {
    const KIND: PacketKind = PacketKind::Aid0;

    fn decode(frame: &Bytes) -> Result<Self, DecodeError> {
        let (header, body) = PacketHeader::parse(frame)?;
        let own = header.name == AID0_TAG;

        let mut ping = None;
        let mut angles = None;
        let mut part = None;
        for section in Sections::new(body) {
            let section = section?;
            match section.name {
                SECTION_PING_HEADER => ping = Some(PingHeader::parse(section.body)?),
                SECTION_BEAM_ANGLES => angles = Some(BeamAngles::parse(section.body)?),
                SECTION_IMAGE_PART if own => part = Some(section.body),
                _ => {}
            }
        }

        // H0 precedes M0 on the wire but section order is not guaranteed,
        // so the part is parsed once the beam count is known.
        let ping = ping.ok_or(DecodeError::MissingSection("H0"))?;
        let part = match part {
            Some(body) => Some(ImagePart::parse(body, ping.beam_count as usize)?),
            None if own => return Err(DecodeError::MissingSection("M0")),
            None => None,
        };

        Ok(Self {
            header,
            ping,
            angles,
            part,
            raw: frame.clone(),
        })
    }

    fn is_type(&self) -> bool {
        self.header.name == AID0_TAG
    }
}

impl From<Aid0> for DecodedPacket {
    fn from(packet: Aid0) -> Self {
        DecodedPacket::ImageFragment(packet)
    }
}
