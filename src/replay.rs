//! Offline replay of raw capture logs.
//!
//! Captured packets are fed to a [`Dispatcher`] exactly as the receivers
//! would, so eviction and publication reproduce the live session.

use tracing::debug;

use crate::capture::CaptureReader;
use crate::core::Publish;
use crate::dispatch::Dispatcher;
use crate::packets::decode_any;

/// Counters of one replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Packets read from the log.
    pub frames: u64,
    /// Packets handed to the dispatcher.
    pub dispatched: u64,
    /// Packets of a type this crate does not handle.
    pub unknown: u64,
    /// Packets that failed to decode.
    pub malformed: u64,
    /// Set when the log ended in an unreadable frame.
    pub truncated: bool,
}

impl ReplayStats {
    /// Add the counters of another replay.
    pub fn merge(&mut self, other: ReplayStats) {
        self.frames += other.frames;
        self.dispatched += other.dispatched;
        self.unknown += other.unknown;
        self.malformed += other.malformed;
        self.truncated |= other.truncated;
    }
}

/// Dispatch every packet of a capture log.
pub fn replay<P: Publish>(reader: CaptureReader, dispatcher: &Dispatcher<P>) -> ReplayStats {
    let mut stats = ReplayStats::default();

    for frame in reader {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                debug!(error = %e, "capture log ends in an unreadable frame");
                stats.truncated = true;
                break;
            }
        };
        stats.frames += 1;

        match decode_any(&frame) {
            Ok(Some(packet)) => {
                dispatcher.dispatch(packet);
                stats.dispatched += 1;
            }
            Ok(None) => stats.unknown += 1,
            Err(e) => {
                debug!(error = %e, "skipping malformed captured packet");
                stats.malformed += 1;
            }
        }
    }
    stats
}
