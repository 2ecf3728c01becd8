//! Records published to consumers.
//!
//! Each record is built from decoded packets by a conversion:
//!
//! - [`SonarDetections`]: one per BTH0 packet
//! - [`AcousticImage`]: one per ping, reassembled from AID0 fragments
//! - [`RawPacket`]: a copy of every valid packet, for recording downstream

mod detections;
mod image;
mod raw;

use serde::Serialize;

pub use detections::SonarDetections;
pub use image::{AcousticImage, MAX_IMAGE_VALUES};
pub use raw::RawPacket;

use crate::core::PingKey;
use crate::packets::PingHeader;

/// Coordinate frame names stamped onto published records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameIds {
    /// Transmitter frame, used as the record's frame id.
    pub tx: String,
    /// Receiver frame, carried in the ping info.
    pub rx: String,
}

impl FrameIds {
    /// Create frame ids.
    pub fn new(tx: impl Into<String>, rx: impl Into<String>) -> Self {
        Self {
            tx: tx.into(),
            rx: rx.into(),
        }
    }
}

/// Ping time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Stamp {
    /// Seconds since the Unix epoch.
    pub sec: u32,
    /// Nanoseconds part.
    pub nanosec: u32,
}

impl Stamp {
    /// Ping time from a ping header.
    pub fn from_ping(ping: &PingHeader) -> Self {
        Self {
            sec: ping.time_seconds,
            nanosec: ping.time_nanoseconds,
        }
    }
}

/// Acquisition settings of one ping.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PingInfo {
    /// Center frequency, Hz.
    pub frequency: f32,
    /// Sound speed at the transducer, m/s.
    pub sound_speed: f32,
    /// Time between pings, seconds.
    pub ping_period: f32,
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
    /// Receiver frame id.
    pub rx_frame_id: String,
}

impl PingInfo {
    /// Ping info from a ping header, without frame id.
    pub fn from_ping(ping: &PingHeader) -> Self {
        Self {
            frequency: ping.frequency,
            sound_speed: ping.sound_speed,
            ping_period: ping.ping_period,
            tx_power: ping.tx_power,
            tx_pulse_width: ping.tx_pulse_width,
            tx_beamwidth_vert: ping.tx_beamwidth_vert,
            tx_beamwidth_horiz: ping.tx_beamwidth_horiz,
            rx_bandwidth: ping.rx_bandwidth,
            rx_frame_id: String::new(),
        }
    }
}

/// Any record the pipeline publishes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Record {
    /// Bottom detections of one ping.
    Detections(SonarDetections),
    /// Water-column image of one ping.
    AcousticImage(AcousticImage),
    /// Unmodified packet.
    Raw(RawPacket),
}

impl Record {
    /// Short name of the record type, for logs.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Detections(_) => "detections",
            Self::AcousticImage(_) => "acoustic_image",
            Self::Raw(_) => "raw",
        }
    }

    /// Ping the record belongs to, if it was decoded from one.
    pub fn ping_number(&self) -> Option<PingKey> {
        match self {
            Self::Detections(d) => Some(d.ping_number),
            Self::AcousticImage(i) => Some(i.ping_number),
            Self::Raw(_) => None,
        }
    }
}

impl From<SonarDetections> for Record {
    fn from(record: SonarDetections) -> Self {
        Self::Detections(record)
    }
}

impl From<AcousticImage> for Record {
    fn from(record: AcousticImage) -> Self {
        Self::AcousticImage(record)
    }
}

impl From<RawPacket> for Record {
    fn from(record: RawPacket) -> Self {
        Self::Raw(record)
    }
}
