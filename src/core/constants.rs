//! Constants shared across the ingestion pipeline.
//!
//! Wire values are fixed by the sonar packet format. Defaults can be overridden
//! through [`IngestConfig`](crate::config::IngestConfig).

use std::net::{IpAddr, Ipv4Addr};

// =============================================================================
// PACKET FORMAT
// =============================================================================

/// Packet name of a bathymetry packet.
pub const BTH0_TAG: [u8; 4] = *b"BTH0";

/// Packet name of an acoustic image data packet.
pub const AID0_TAG: [u8; 4] = *b"AID0";

/// Packet header size (name + packet size + data stream id).
pub const PACKET_HEADER_SIZE: usize = 12;

/// Section header size (name + section size).
pub const SECTION_HEADER_SIZE: usize = 4;

/// Section name of the per-ping header.
pub const SECTION_PING_HEADER: [u8; 2] = *b"H0";

/// Section name of uniformly spaced beam angles.
pub const SECTION_BEAM_ANGLES: [u8; 2] = *b"A0";

/// Section name of bathymetry ranges.
pub const SECTION_RANGES: [u8; 2] = *b"R0";

/// Section name of bathymetry intensities.
pub const SECTION_INTENSITIES: [u8; 2] = *b"I1";

/// Section name of one acoustic image part.
pub const SECTION_IMAGE_PART: [u8; 2] = *b"M0";

/// Largest datagram the sonar emits.
pub const MAX_DATAGRAM_SIZE: usize = 65535;

// =============================================================================
// REASSEMBLY
// =============================================================================

/// Default retention window, in pings.
///
/// An unfinished entry is evicted once the newest observed ping number is more
/// than this many pings ahead of it.
pub const DEFAULT_RETENTION_WINDOW: u32 = 10;

/// Default jump, in pings, that needs confirmation as a sonar restart.
pub const DEFAULT_RESTART_GAP: u32 = 1000;

/// Most beams an acoustic image may declare.
pub const MAX_IMAGE_BEAMS: usize = 1024;

/// Most samples per beam an acoustic image may declare.
pub const MAX_IMAGE_SAMPLES_PER_BEAM: usize = 16384;

// =============================================================================
// TRANSPORT DEFAULTS
// =============================================================================

/// Default UDP port carrying BTH0 packets.
pub const DEFAULT_BATHY_PORT: u16 = 65500;

/// Default UDP port carrying AID0 packets.
pub const DEFAULT_ACOUSTIC_IMAGE_PORT: u16 = 65503;

/// Default sonar head address.
pub const DEFAULT_SONAR_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 86));

/// Default local interface to listen on.
pub const DEFAULT_INTERFACE_IP: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

// =============================================================================
// PUBLICATION DEFAULTS
// =============================================================================

/// Default topic for detections converted from BTH0.
pub const DEFAULT_DETECTIONS_TOPIC: &str = "detections";

/// Default topic for raw BTH0 packets.
pub const DEFAULT_BTH0_TOPIC: &str = "raw/bth0";

/// Default topic for raw AID0 packets.
pub const DEFAULT_AID0_TOPIC: &str = "raw/aid0";

/// Default topic for reassembled acoustic images.
pub const DEFAULT_ACOUSTIC_IMAGE_TOPIC: &str = "acoustic_image";

/// Default transmitter frame id.
pub const DEFAULT_TX_FRAME_ID: &str = "r2sonic_tx";

/// Default receiver frame id.
pub const DEFAULT_RX_FRAME_ID: &str = "r2sonic_rx";

/// Default per-topic broadcast buffer depth.
pub const DEFAULT_TOPIC_CAPACITY: usize = 100;

// =============================================================================
// RAW CAPTURE DEFAULTS
// =============================================================================

/// Default directory for raw capture logs.
pub const DEFAULT_RAW_LOG_DIRECTORY: &str = "raw_logs";

/// Default device name prefix for capture files.
pub const DEFAULT_DEVICE_PREFIX: &str = "r2sonic";

/// Default number of frames queued for the capture writer before dropping.
pub const DEFAULT_CAPTURE_QUEUE_DEPTH: usize = 1024;
