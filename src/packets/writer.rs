//! Packet encoder.
//!
//! Produces the same section layout the decoders read. Used by simulators,
//! replay tooling and tests.

use bytes::{BufMut, Bytes, BytesMut};

use super::header::{BeamAngles, PingHeader};
use crate::core::{
    PACKET_HEADER_SIZE, PacketKind, SECTION_BEAM_ANGLES, SECTION_HEADER_SIZE, SECTION_PING_HEADER,
};

/// Largest body a single section can carry.
pub const MAX_SECTION_BODY: usize = u16::MAX as usize - SECTION_HEADER_SIZE;

/// Builder for one sonar packet.
#[derive(Debug, Clone)]
pub struct PacketWriter {
    buf: BytesMut,
}

impl PacketWriter {
    /// Start a packet with the given name and data stream id.
    pub fn new(name: [u8; 4], stream_id: u32) -> Self {
        let mut buf = BytesMut::with_capacity(1024);
        buf.put_slice(&name);
        buf.put_u32(0); // patched in finish()
        buf.put_u32(stream_id);
        Self { buf }
    }

    /// Start a packet of a known kind.
    pub fn for_kind(kind: PacketKind, stream_id: u32) -> Self {
        Self::new(kind.tag(), stream_id)
    }

    /// Append a section.
    ///
    /// # Panics
    ///
    /// Panics if `body` is longer than [`MAX_SECTION_BODY`].
    pub fn section(mut self, name: [u8; 2], body: &[u8]) -> Self {
        assert!(
            body.len() <= MAX_SECTION_BODY,
            "section body of {} bytes exceeds {}",
            body.len(),
            MAX_SECTION_BODY
        );
        self.buf.put_slice(&name);
        self.buf.put_u16((body.len() + SECTION_HEADER_SIZE) as u16);
        self.buf.put_slice(body);
        self
    }

    /// Append an `H0` ping header section.
    pub fn ping_header(self, ping: &PingHeader) -> Self {
        self.section(SECTION_PING_HEADER, &ping.to_bytes())
    }

    /// Append an `A0` beam angle section.
    pub fn beam_angles(self, angles: &BeamAngles) -> Self {
        self.section(SECTION_BEAM_ANGLES, &angles.to_bytes())
    }

    /// Append a section holding a scale factor followed by `u16` samples.
    pub fn scaled_samples(self, name: [u8; 2], scale: f32, samples: &[u16]) -> Self {
        let mut body = Vec::with_capacity(4 + samples.len() * 2);
        body.extend_from_slice(&scale.to_be_bytes());
        for s in samples {
            body.extend_from_slice(&s.to_be_bytes());
        }
        self.section(name, &body)
    }

    /// Current encoded length.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if only the packet header has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.len() == PACKET_HEADER_SIZE
    }

    /// Patch the packet size and return the encoded packet.
    pub fn finish(mut self) -> Bytes {
        let size = self.buf.len() as u32;
        self.buf[4..8].copy_from_slice(&size.to_be_bytes());
        self.buf.freeze()
    }
}
