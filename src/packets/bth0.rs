//! Bathymetry packet (`BTH0`).
//!
//! One BTH0 packet carries the bottom detections of a whole ping:
//!
//! - `H0` ping header (required)
//! - `R0` ranges: scale `f32` + one `u16` per beam (required)
//! - `A0` beam angles (optional)
//! - `I1` intensities: scale `f32` + one `u16` per beam (optional)

use bytes::Bytes;

use super::DecodedPacket;
use super::header::{BeamAngles, PacketHeader, PingHeader, Reader, Sections};
use crate::core::{
    BTH0_TAG, DecodeError, PacketKind, PingKey, SECTION_BEAM_ANGLES, SECTION_INTENSITIES,
    SECTION_PING_HEADER, SECTION_RANGES, SonarPacket,
};

/// Decoded bathymetry packet.
#[derive(Debug, Clone, PartialEq)]
pub struct Bth0 {
    /// Packet header.
    pub header: PacketHeader,
    /// Ping header.
    pub ping: PingHeader,
    /// Beam angles, if the sonar sent them.
    pub angles: Option<BeamAngles>,
    /// Seconds per range unit.
    pub range_scale: f32,
    /// Two-way travel time per beam, in range units.
    pub ranges: Vec<u16>,
    /// Intensity units per count.
    pub intensity_scale: f32,
    /// Intensity per beam. Empty when the sonar did not send `I1`.
    pub intensities: Vec<u16>,
    raw: Bytes,
}

impl Bth0 {
    /// Ping number of this packet.
    pub fn ping_number(&self) -> PingKey {
        self.ping.ping_number
    }

    /// Number of beams declared by the ping header.
    pub fn beam_count(&self) -> usize {
        self.ping.beam_count as usize
    }

    /// Two-way travel time per beam, seconds.
    pub fn travel_times(&self) -> Vec<f32> {
        self.ranges
            .iter()
            .map(|&r| r as f32 * self.range_scale)
            .collect()
    }

    /// Scaled intensity per beam.
    pub fn scaled_intensities(&self) -> Vec<f32> {
        self.intensities
            .iter()
            .map(|&i| i as f32 * self.intensity_scale)
            .collect()
    }

    /// Receive angle per beam, radians. Empty without an `A0` section.
    pub fn beam_angles(&self) -> Vec<f32> {
        self.angles
            .map(|a| a.expand(self.beam_count()))
            .unwrap_or_default()
    }

    /// The datagram this packet was decoded from.
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }
}

fn scaled_section(
    body: &[u8],
    count: usize,
    section: &'static str,
) -> Result<(f32, Vec<u16>), DecodeError> {
    let mut r = Reader::new(body);
    let scale = r.f32()?;
    let samples = r.u16_array(count, section)?;
    Ok((scale, samples))
}

impl SonarPacket for Bth0 {
    const KIND: PacketKind = PacketKind::Bth0;

    fn decode(frame: &Bytes) -> Result<Self, DecodeError> {
        let (header, body) = PacketHeader::parse(frame)?;
        // Sections of other packet types are not interpreted; is_type() rejects them.
        let own = header.name == BTH0_TAG;

        let mut ping = None;
        let mut angles = None;
        let mut ranges = None;
        let mut intensities = None;
        for section in Sections::new(body) {
            let section = section?;
            match section.name {
                SECTION_PING_HEADER => ping = Some(PingHeader::parse(section.body)?),
                SECTION_BEAM_ANGLES => angles = Some(BeamAngles::parse(section.body)?),
                SECTION_RANGES if own => ranges = Some(section.body),
                SECTION_INTENSITIES if own => intensities = Some(section.body),
                _ => {}
            }
        }

        let ping = ping.ok_or(DecodeError::MissingSection("H0"))?;
        let beams = ping.beam_count as usize;

        let (range_scale, ranges) = match ranges {
            Some(body) => scaled_section(body, beams, "R0")?,
            None if own => return Err(DecodeError::MissingSection("R0")),
            None => (0.0, Vec::new()),
        };
        let (intensity_scale, intensities) = match intensities {
            Some(body) => scaled_section(body, beams, "I1")?,
            None => (0.0, Vec::new()),
        };

        Ok(Self {
            header,
            ping,
            angles,
            range_scale,
            ranges,
            intensity_scale,
            intensities,
            raw: frame.clone(),
        })
    }

    fn is_type(&self) -> bool {
        self.header.name == BTH0_TAG
    }
}

impl From<Bth0> for DecodedPacket {
    fn from(packet: Bth0) -> Self {
        DecodedPacket::Bathymetry(packet)
    }
}
