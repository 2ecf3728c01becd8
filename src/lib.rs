//! # mbes-ingest
//!
//! Ingestion node for multibeam sonar UDP output.
//!
//! The sonar sends two packet streams on separate ports:
//!
//! - **BTH0**: bathymetry, one packet per ping, converted and published as is
//! - **AID0**: acoustic image data, one ping's water-column image split over
//!   several packets that may arrive late, duplicated or out of order
//!
//! Every datagram is appended to a raw capture log before decoding. Decoded
//! image fragments are merged per ping in a [`ReassemblyCache`]; a ping is
//! published once its last part arrives, and dropped once it falls more than
//! the retention window (10 pings by default) behind the newest ping.
//!
//! ## Feature Flags
//!
//! - `transport` (default): sockets, raw capture writer, broadcast publisher,
//!   receivers and the [`IngestService`]
//! - `cli` (default): the `mbes-ingest` binary
//!
//! ## Modules
//!
//! - [`core`]: Core traits, constants, and error types (always included)
//! - [`packets`]: BTH0/AID0 decoding and encoding
//! - [`records`]: Records published to consumers
//! - [`reassembly`]: Ping-keyed reassembly cache
//! - [`dispatch`]: Routing of decoded packets
//! - [`config`]: TOML configuration
//! - [`transport`], [`receiver`], [`publish`], [`service`]: the live node
//!   (requires `transport` feature)
//!
//! ## Example Usage
//!
//! ```rust
//! use mbes_ingest::prelude::*;
//! use mbes_ingest::packets::{ImagePart, PacketWriter, PingHeader};
//! use mbes_ingest::core::SECTION_IMAGE_PART;
//!
//! #[derive(Default)]
//! struct Count(std::sync::atomic::AtomicUsize);
//!
//! impl Publish for Count {
//!     fn publish(&self, _topic: &Topic, _record: Record) {
//!         self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
//!     }
//! }
//!
//! let topics = Topics {
//!     detections: Topic::disabled(),
//!     bth0: Topic::disabled(),
//!     aid0: Topic::disabled(),
//!     acoustic_image: Topic::new("acoustic_image"),
//! };
//! let dispatcher = Dispatcher::new(
//!     Count::default(),
//!     topics,
//!     FrameIds::new("tx", "rx"),
//!     RetentionWindow::default(),
//! );
//!
//! let ping = PingHeader {
//!     ping_number: 100,
//!     beam_count: 2,
//!     ..PingHeader::default()
//! };
//! for part_number in 0..2 {
//!     let part = ImagePart {
//!         part_number,
//!         part_total: 2,
//!         total_samples: 2,
//!         first_sample: part_number as u32,
//!         sample_count: 1,
//!         amplitudes: vec![1, 2],
//!     };
//!     let frame = PacketWriter::for_kind(PacketKind::Aid0, 0)
//!         .ping_header(&ping)
//!         .section(SECTION_IMAGE_PART, &part.to_bytes())
//!         .finish();
//!     dispatcher.dispatch(decode_any(&frame).unwrap().unwrap());
//! }
//!
//! assert_eq!(dispatcher.publisher().0.load(std::sync::atomic::Ordering::Relaxed), 1);
//! assert_eq!(dispatcher.pending_images(), 0);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

pub mod capture;
pub mod config;
pub mod dispatch;
pub mod packets;
pub mod reassembly;
pub mod records;
pub mod replay;

// Live node (feature-gated)
#[cfg(feature = "transport")]
#[cfg_attr(docsrs, doc(cfg(feature = "transport")))]
pub mod transport;

#[cfg(feature = "transport")]
#[cfg_attr(docsrs, doc(cfg(feature = "transport")))]
pub mod publish;

#[cfg(feature = "transport")]
#[cfg_attr(docsrs, doc(cfg(feature = "transport")))]
pub mod receiver;

#[cfg(feature = "transport")]
#[cfg_attr(docsrs, doc(cfg(feature = "transport")))]
pub mod service;

/// Prelude module for convenient imports.
pub mod prelude {
    // Core traits and types
    pub use crate::core::*;

    pub use crate::capture::CaptureReader;
    pub use crate::config::IngestConfig;
    pub use crate::dispatch::{DispatchStats, Dispatcher, Topics};
    pub use crate::packets::{Aid0, Bth0, DecodedPacket, decode_any};
    pub use crate::reassembly::{MergeOutcome, ReassemblyCache, RetentionWindow};
    pub use crate::records::{AcousticImage, FrameIds, RawPacket, Record, SonarDetections};
    pub use crate::replay::{ReplayStats, replay};

    // Live node (when enabled)
    #[cfg(feature = "transport")]
    pub use crate::capture::{CaptureReport, RawCapture};
    #[cfg(feature = "transport")]
    pub use crate::publish::BroadcastPublisher;
    #[cfg(feature = "transport")]
    pub use crate::receiver::{ReceiveOutcome, ReceiverStats, TypedReceiver};
    #[cfg(feature = "transport")]
    pub use crate::service::{IngestService, RunningService, ServiceError, ServiceReport};
    #[cfg(feature = "transport")]
    pub use crate::transport::{SonarSocket, SonarSocketBuilder};
}

// Re-export commonly used items at crate root
pub use core::{
    Accumulate, CaptureError, ConfigError, DecodeError, IngestError, PacketKind, PingKey,
    Publish, SonarPacket, Topic,
};
pub use dispatch::Dispatcher;
pub use reassembly::ReassemblyCache;

#[cfg(feature = "transport")]
pub use service::IngestService;
