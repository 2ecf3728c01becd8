//! Routing of decoded packets to conversions and the reassembly cache.
//!
//! BTH0 is complete in one packet and is converted and published directly.
//! AID0 fragments go through a shared [`ReassemblyCache`]; one mutex guards
//! merge, completion, publication and eviction as a single step per fragment,
//! so each ping is published at most once no matter which receiver delivers
//! its last fragment.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::core::{
    DEFAULT_ACOUSTIC_IMAGE_TOPIC, DEFAULT_AID0_TOPIC, DEFAULT_BTH0_TOPIC,
    DEFAULT_DETECTIONS_TOPIC, PacketKind, Publish, Topic,
};
use crate::packets::{Aid0, Bth0, DecodedPacket};
use crate::reassembly::{CacheStats, MergeOutcome, ReassemblyCache, RetentionWindow};
use crate::records::{AcousticImage, FrameIds, RawPacket, SonarDetections};

/// Topic names records are published on.
///
/// A [disabled](Topic::disabled) topic is skipped entirely: nothing is
/// converted for it, and for the acoustic image nothing is reassembled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    /// Detections converted from BTH0.
    pub detections: Topic,
    /// Raw BTH0 packets.
    pub bth0: Topic,
    /// Raw AID0 packets.
    pub aid0: Topic,
    /// Reassembled acoustic images.
    pub acoustic_image: Topic,
}

impl Topics {
    /// Every advertised topic.
    pub fn advertised(&self) -> impl Iterator<Item = &Topic> {
        [&self.detections, &self.bth0, &self.aid0, &self.acoustic_image]
            .into_iter()
            .filter(|t| t.is_advertised())
    }
}

impl Default for Topics {
    fn default() -> Self {
        Self {
            detections: Topic::new(DEFAULT_DETECTIONS_TOPIC),
            bth0: Topic::new(DEFAULT_BTH0_TOPIC),
            aid0: Topic::new(DEFAULT_AID0_TOPIC),
            acoustic_image: Topic::new(DEFAULT_ACOUSTIC_IMAGE_TOPIC),
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    detections: AtomicU64,
    raw_bth0: AtomicU64,
    raw_aid0: AtomicU64,
    images: AtomicU64,
}

/// Dispatcher counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Detection records published.
    pub detections: u64,
    /// Raw BTH0 records published.
    pub raw_bth0: u64,
    /// Raw AID0 records published.
    pub raw_aid0: u64,
    /// Acoustic images published.
    pub images: u64,
    /// Pings still accumulating.
    pub pending_images: usize,
    /// Reassembly counters.
    pub cache: CacheStats,
}

/// Routes decoded packets to publication.
///
/// Shared by every receiver through an `Arc`; safe to call concurrently.
#[derive(Debug)]
pub struct Dispatcher<P: Publish> {
    publisher: P,
    topics: Topics,
    frames: FrameIds,
    images: Mutex<ReassemblyCache<AcousticImage>>,
    counters: Counters,
}

impl<P: Publish> Dispatcher<P> {
    /// Create a dispatcher.
    pub fn new(publisher: P, topics: Topics, frames: FrameIds, window: RetentionWindow) -> Self {
        Self {
            publisher,
            topics,
            frames,
            images: Mutex::new(ReassemblyCache::with_window(window)),
            counters: Counters::default(),
        }
    }

    /// Route one decoded packet.
    pub fn dispatch(&self, packet: DecodedPacket) {
        match packet {
            DecodedPacket::Bathymetry(packet) => self.on_bathymetry(packet),
            DecodedPacket::ImageFragment(packet) => self.on_image_fragment(packet),
        }
    }

    fn on_bathymetry(&self, packet: Bth0) {
        if self.topics.bth0.is_advertised() {
            let raw = RawPacket::new(PacketKind::Bth0, packet.raw().clone(), &self.frames.tx);
            self.publisher.publish(&self.topics.bth0, raw.into());
            self.counters.raw_bth0.fetch_add(1, Ordering::Relaxed);
        }

        if self.topics.detections.is_advertised() {
            let detections = SonarDetections::from_bth0(&packet, &self.frames);
            trace!(ping = detections.ping_number, beams = detections.beam_count(), "detections");
            self.publisher.publish(&self.topics.detections, detections.into());
            self.counters.detections.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn on_image_fragment(&self, packet: Aid0) {
        if self.topics.aid0.is_advertised() {
            let raw = RawPacket::new(PacketKind::Aid0, packet.raw().clone(), &self.frames.tx);
            self.publisher.publish(&self.topics.aid0, raw.into());
            self.counters.raw_aid0.fetch_add(1, Ordering::Relaxed);
        }

        if !self.topics.acoustic_image.is_advertised() {
            return;
        }

        let key = packet.ping_number();
        let mut images = self.images.lock();
        if let MergeOutcome::Complete(image) = images.merge(key, &packet) {
            debug!(
                ping = key,
                parts = image.part_total(),
                beams = image.beam_count,
                samples = image.samples_per_beam,
                "acoustic image complete"
            );
            let image = image.with_frame_ids(&self.frames);
            self.publisher.publish(&self.topics.acoustic_image, image.into());
            self.counters.images.fetch_add(1, Ordering::Relaxed);
        }
        images.evict_stale(key);
    }

    /// Number of pings still accumulating.
    pub fn pending_images(&self) -> usize {
        self.images.lock().len()
    }

    /// The topics in use.
    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// The publisher records are handed to.
    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Counters so far.
    pub fn stats(&self) -> DispatchStats {
        let images = self.images.lock();
        DispatchStats {
            detections: self.counters.detections.load(Ordering::Relaxed),
            raw_bth0: self.counters.raw_bth0.load(Ordering::Relaxed),
            raw_aid0: self.counters.raw_aid0.load(Ordering::Relaxed),
            images: self.counters.images.load(Ordering::Relaxed),
            pending_images: images.len(),
            cache: images.stats(),
        }
    }
}
