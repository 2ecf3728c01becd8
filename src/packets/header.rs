//! Packet header, section framing and the per-ping header shared by all
//! packet types.
//!
//! Wire format (all integers and floats big-endian):
//!
//! ```text
//! +----------+-------------+----------------+------------------------+
//! | Name     | Packet size | Data stream id | Sections ...           |
//! | 4 bytes  | u32         | u32            | (packet size - 12)     |
//! +----------+-------------+----------------+------------------------+
//!
//! Section:
//! +----------+--------------+--------------------------------+
//! | Name     | Section size | Body                           |
//! | 2 bytes  | u16          | (section size - 4)             |
//! +----------+--------------+--------------------------------+
//! ```

use crate::core::{DecodeError, PACKET_HEADER_SIZE, PingKey, SECTION_HEADER_SIZE};

/// Size of the `H0` section body.
pub const PING_HEADER_BODY_SIZE: usize = 80;

/// Size of the `A0` section body.
pub const BEAM_ANGLES_BODY_SIZE: usize = 8;

/// Big-endian cursor over a byte slice.
#[derive(Debug, Clone)]
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::TooShort {
                expected: self.pos + n,
                actual: self.buf.len(),
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub(crate) fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub(crate) fn u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    pub(crate) fn u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    pub(crate) fn f32(&mut self) -> Result<f32, DecodeError> {
        Ok(f32::from_be_bytes(self.array()?))
    }

    /// Read `count` u16 values, requiring them to fill the rest of the buffer.
    pub(crate) fn u16_array(
        &mut self,
        count: usize,
        section: &'static str,
    ) -> Result<Vec<u16>, DecodeError> {
        let actual = self.remaining() / 2;
        if self.remaining() % 2 != 0 || actual != count {
            return Err(DecodeError::CountMismatch {
                section,
                expected: count,
                actual,
            });
        }
        let body = self.take(count * 2)?;
        Ok(body
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect())
    }
}

/// Fixed packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Packet name (`BTH0`, `AID0`, ...).
    pub name: [u8; 4],
    /// Total packet size including this header.
    pub size: u32,
    /// Data stream identifier assigned by the sonar.
    pub stream_id: u32,
}

impl PacketHeader {
    /// Parse the header and return it with the section area it frames.
    ///
    /// Bytes past the declared packet size are ignored.
    pub fn parse(buf: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        let mut r = Reader::new(buf);
        let name = r.array::<4>()?;
        let size = r.u32()?;
        let stream_id = r.u32()?;

        let declared = size as usize;
        if declared < PACKET_HEADER_SIZE || declared > buf.len() {
            return Err(DecodeError::PacketSize {
                declared: size,
                actual: buf.len(),
            });
        }

        Ok((
            Self {
                name,
                size,
                stream_id,
            },
            &buf[PACKET_HEADER_SIZE..declared],
        ))
    }

    /// Packet name as text, for logs.
    pub fn name_str(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }
}

/// One section of a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section<'a> {
    /// Section name.
    pub name: [u8; 2],
    /// Section body, excluding the 4-byte section header.
    pub body: &'a [u8],
}

/// Iterator over the sections of a packet body.
///
/// Yields one error and then stops if the framing is broken.
#[derive(Debug, Clone)]
pub struct Sections<'a> {
    rest: &'a [u8],
}

impl<'a> Sections<'a> {
    /// Iterate the sections in a packet body.
    pub fn new(body: &'a [u8]) -> Self {
        Self { rest: body }
    }
}

impl<'a> Iterator for Sections<'a> {
    type Item = Result<Section<'a>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        if self.rest.len() < SECTION_HEADER_SIZE {
            let actual = self.rest.len();
            self.rest = &[];
            return Some(Err(DecodeError::TooShort {
                expected: SECTION_HEADER_SIZE,
                actual,
            }));
        }

        let name = [self.rest[0], self.rest[1]];
        let declared = u16::from_be_bytes([self.rest[2], self.rest[3]]) as usize;
        if declared < SECTION_HEADER_SIZE || declared > self.rest.len() {
            let remaining = self.rest.len();
            self.rest = &[];
            return Some(Err(DecodeError::SectionOverrun {
                name: String::from_utf8_lossy(&name).into_owned(),
                declared,
                remaining,
            }));
        }

        let body = &self.rest[SECTION_HEADER_SIZE..declared];
        self.rest = &self.rest[declared..];
        Some(Ok(Section { name, body }))
    }
}

/// Per-ping header (`H0` section), present in every packet type.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PingHeader {
    /// Sonar model, NUL padded.
    pub model: [u8; 12],
    /// Sonar serial number, NUL padded.
    pub serial: [u8; 12],
    /// Ping time, seconds since the Unix epoch.
    pub time_seconds: u32,
    /// Ping time, nanoseconds part.
    pub time_nanoseconds: u32,
    /// Ping number.
    pub ping_number: PingKey,
    /// Time between pings, seconds.
    pub ping_period: f32,
    /// Sound speed at the transducer, m/s.
    pub sound_speed: f32,
    /// Center frequency, Hz.
    pub frequency: f32,
    /// Transmit power, dB re 1 µPa at 1 m.
    pub tx_power: f32,
    /// Transmit pulse width, seconds.
    pub tx_pulse_width: f32,
    /// Transmit beamwidth along track, radians.
    pub tx_beamwidth_vert: f32,
    /// Transmit beamwidth across track, radians.
    pub tx_beamwidth_horiz: f32,
    /// Receiver bandwidth, Hz.
    pub rx_bandwidth: f32,
    /// Receiver sample rate, Hz.
    pub rx_sample_rate: f32,
    /// Receiver range setting, meters.
    pub rx_range: f32,
    /// Number of beams in this ping.
    pub beam_count: u16,
}

impl PingHeader {
    /// Parse an `H0` section body.
    pub fn parse(body: &[u8]) -> Result<Self, DecodeError> {
        let mut r = Reader::new(body);
        let mut header = Self {
            model: r.array()?,
            serial: r.array()?,
            time_seconds: r.u32()?,
            time_nanoseconds: r.u32()?,
            ping_number: r.u32()?,
            ping_period: r.f32()?,
            sound_speed: r.f32()?,
            frequency: r.f32()?,
            tx_power: r.f32()?,
            tx_pulse_width: r.f32()?,
            tx_beamwidth_vert: r.f32()?,
            tx_beamwidth_horiz: r.f32()?,
            rx_bandwidth: r.f32()?,
            rx_sample_rate: r.f32()?,
            rx_range: r.f32()?,
            beam_count: 0,
        };
        let _reserved = r.u16()?;
        header.beam_count = r.u16()?;
        Ok(header)
    }

    /// Serialize to an `H0` section body.
    pub fn to_bytes(&self) -> [u8; PING_HEADER_BODY_SIZE] {
        let mut buf = [0u8; PING_HEADER_BODY_SIZE];
        buf[0..12].copy_from_slice(&self.model);
        buf[12..24].copy_from_slice(&self.serial);
        buf[24..28].copy_from_slice(&self.time_seconds.to_be_bytes());
        buf[28..32].copy_from_slice(&self.time_nanoseconds.to_be_bytes());
        buf[32..36].copy_from_slice(&self.ping_number.to_be_bytes());
        let floats = [
            self.ping_period,
            self.sound_speed,
            self.frequency,
            self.tx_power,
            self.tx_pulse_width,
            self.tx_beamwidth_vert,
            self.tx_beamwidth_horiz,
            self.rx_bandwidth,
            self.rx_sample_rate,
            self.rx_range,
        ];
        for (i, value) in floats.iter().enumerate() {
            let at = 36 + i * 4;
            buf[at..at + 4].copy_from_slice(&value.to_be_bytes());
        }
        // 76..78 reserved
        buf[78..80].copy_from_slice(&self.beam_count.to_be_bytes());
        buf
    }

    /// Sonar model as text.
    pub fn model_str(&self) -> String {
        padded_str(&self.model)
    }

    /// Serial number as text.
    pub fn serial_str(&self) -> String {
        padded_str(&self.serial)
    }
}

fn padded_str(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Uniformly spaced receive beam angles (`A0` section).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeamAngles {
    /// Angle of the first beam, radians.
    pub first: f32,
    /// Angle of the last beam, radians.
    pub last: f32,
}

impl BeamAngles {
    /// Parse an `A0` section body.
    pub fn parse(body: &[u8]) -> Result<Self, DecodeError> {
        let mut r = Reader::new(body);
        Ok(Self {
            first: r.f32()?,
            last: r.f32()?,
        })
    }

    /// Serialize to an `A0` section body.
    pub fn to_bytes(&self) -> [u8; BEAM_ANGLES_BODY_SIZE] {
        let mut buf = [0u8; BEAM_ANGLES_BODY_SIZE];
        buf[0..4].copy_from_slice(&self.first.to_be_bytes());
        buf[4..8].copy_from_slice(&self.last.to_be_bytes());
        buf
    }

    /// Expand to one angle per beam.
    pub fn expand(&self, beam_count: usize) -> Vec<f32> {
        match beam_count {
            0 => Vec::new(),
            1 => vec![self.first],
            n => {
                let step = (self.last - self.first) / (n - 1) as f32;
                (0..n).map(|i| self.first + step * i as f32).collect()
            }
        }
    }
}
