//! Water-column image reassembled from AID0 fragments.

use serde::Serialize;
use tracing::debug;

use super::{FrameIds, PingInfo, Stamp};
use crate::core::{Accumulate, MAX_IMAGE_BEAMS, MAX_IMAGE_SAMPLES_PER_BEAM, PingKey};
use crate::packets::Aid0;

/// Largest image accepted, in amplitude values (32 MiB of `u16`).
///
/// Geometry beyond [`MAX_IMAGE_BEAMS`] or [`MAX_IMAGE_SAMPLES_PER_BEAM`] is
/// treated as corrupt and the ping never completes.
pub const MAX_IMAGE_VALUES: usize = MAX_IMAGE_BEAMS * MAX_IMAGE_SAMPLES_PER_BEAM;

/// Water-column image of one ping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcousticImage {
    /// Transmitter frame id.
    pub frame_id: String,
    /// Ping time.
    pub stamp: Stamp,
    /// Ping number.
    pub ping_number: PingKey,
    /// Acquisition settings.
    pub ping_info: PingInfo,
    /// Receiver sample rate, Hz.
    pub sample_rate: f32,
    /// Samples per beam.
    pub samples_per_beam: u32,
    /// Number of beams.
    pub beam_count: u16,
    /// Receive angle per beam, radians. Empty if the sonar sent none.
    pub rx_angles: Vec<f32>,
    /// Amplitudes, sample-major (`samples_per_beam × beam_count`).
    pub amplitudes: Vec<u16>,
    #[serde(skip)]
    parts: Vec<bool>,
    #[serde(skip)]
    parts_received: usize,
}

impl AcousticImage {
    /// Stamp frame ids before publication.
    pub fn with_frame_ids(mut self, frames: &FrameIds) -> Self {
        self.frame_id = frames.tx.clone();
        self.ping_info.rx_frame_id = frames.rx.clone();
        self
    }

    /// Number of parts the image is split into.
    pub fn part_total(&self) -> usize {
        self.parts.len()
    }

    /// Number of distinct parts merged so far.
    pub fn parts_received(&self) -> usize {
        self.parts_received
    }

    /// Check if every part has been merged.
    pub fn is_complete(&self) -> bool {
        !self.parts.is_empty() && self.parts_received == self.parts.len()
    }

    /// Amplitudes of one sample row, across all beams.
    pub fn sample_row(&self, sample: usize) -> Option<&[u16]> {
        let beams = self.beam_count as usize;
        self.amplitudes.get(sample * beams..(sample + 1) * beams)
    }
}

impl Accumulate for AcousticImage {
    type Fragment = Aid0;

    fn seed(fragment: &Aid0) -> Self {
        let beams = fragment.beam_count();
        let (samples_per_beam, part_total) = fragment
            .part
            .as_ref()
            .map(|p| (p.total_samples, p.part_total as usize))
            .unwrap_or_default();

        let values = (samples_per_beam as usize).saturating_mul(beams);
        let plausible =
            beams <= MAX_IMAGE_BEAMS && samples_per_beam as usize <= MAX_IMAGE_SAMPLES_PER_BEAM;
        let (amplitudes, parts) = if plausible {
            (vec![0u16; values], vec![false; part_total])
        } else {
            debug!(
                ping = fragment.ping_number(),
                values, "acoustic image geometry too large, ping will not complete"
            );
            (Vec::new(), Vec::new())
        };

        Self {
            frame_id: String::new(),
            stamp: Stamp::from_ping(&fragment.ping),
            ping_number: fragment.ping_number(),
            ping_info: PingInfo::from_ping(&fragment.ping),
            sample_rate: fragment.ping.rx_sample_rate,
            samples_per_beam,
            beam_count: fragment.ping.beam_count,
            rx_angles: fragment
                .angles
                .map(|a| a.expand(beams))
                .unwrap_or_default(),
            amplitudes,
            parts,
            parts_received: 0,
        }
    }

    fn merge(&mut self, fragment: &Aid0) -> bool {
        let Some(part) = fragment.part.as_ref() else {
            return self.is_complete();
        };

        let beams = self.beam_count as usize;
        let index = part.part_number as usize;
        let geometry_matches = fragment.ping.beam_count == self.beam_count
            && part.total_samples == self.samples_per_beam
            && part.part_total as usize == self.parts.len();
        if !geometry_matches || index >= self.parts.len() {
            debug!(
                ping = self.ping_number,
                part = part.part_number,
                part_total = part.part_total,
                "image fragment does not match ping geometry, ignored"
            );
            return self.is_complete();
        }

        let start = part.first_sample as usize * beams;
        let end = start + part.amplitudes.len();
        let Some(target) = self.amplitudes.get_mut(start..end) else {
            debug!(
                ping = self.ping_number,
                part = part.part_number,
                first_sample = part.first_sample,
                sample_count = part.sample_count,
                "image fragment out of bounds, ignored"
            );
            return self.is_complete();
        };
        target.copy_from_slice(&part.amplitudes);

        if !self.parts[index] {
            self.parts[index] = true;
            self.parts_received += 1;
        }
        self.is_complete()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SonarPacket;
    use crate::packets::fixtures::{aid0_frame, aid0_frame_with, image_part};

    fn fragment(ping: PingKey, part: u16, total: u16) -> Aid0 {
        Aid0::decode(&aid0_frame(ping, 4, part, total, 10)).unwrap()
    }

    fn merged(order: &[u16], total: u16) -> (AcousticImage, Vec<bool>) {
        let first = fragment(7, order[0], total);
        let mut image = AcousticImage::seed(&first);
        let done = order
            .iter()
            .map(|&p| image.merge(&fragment(7, p, total)))
            .collect();
        (image, done)
    }

    #[test]
    fn test_seed_geometry() {
        let image = AcousticImage::seed(&fragment(7, 0, 3));
        assert_eq!(image.ping_number, 7);
        assert_eq!(image.samples_per_beam, 10);
        assert_eq!(image.beam_count, 4);
        assert_eq!(image.part_total(), 3);
        assert_eq!(image.amplitudes.len(), 40);
        assert_eq!(image.rx_angles.len(), 4);
        assert!(!image.is_complete());
    }

    #[test]
    fn test_merge_in_order() {
        let (image, done) = merged(&[0, 1, 2], 3);
        assert_eq!(done, vec![false, false, true]);
        let expected: Vec<u16> = (0..40).collect();
        assert_eq!(image.amplitudes, expected);
        assert_eq!(image.sample_row(9), Some(&[36, 37, 38, 39][..]));
    }

    #[test]
    fn test_merge_out_of_order() {
        let (image, done) = merged(&[2, 0, 1], 3);
        assert_eq!(done, vec![false, false, true]);
        assert_eq!(image.amplitudes, (0..40).collect::<Vec<u16>>());
    }

    #[test]
    fn test_repeated_part_not_double_counted() {
        let (image, done) = merged(&[0, 0, 1, 1], 3);
        assert_eq!(done, vec![false, false, false, false]);
        assert_eq!(image.parts_received(), 2);
    }

    #[test]
    fn test_single_part_image() {
        let (image, done) = merged(&[0], 1);
        assert_eq!(done, vec![true]);
        assert!(image.is_complete());
    }

    #[test]
    fn test_geometry_mismatch_ignored() {
        let mut image = AcousticImage::seed(&fragment(7, 0, 2));
        assert!(!image.merge(&fragment(7, 0, 2)));

        // Same ping, different part total
        assert!(!image.merge(&fragment(7, 1, 3)));
        // Different beam count
        let other = Aid0::decode(&aid0_frame(7, 2, 1, 2, 10)).unwrap();
        assert!(!image.merge(&other));

        assert_eq!(image.parts_received(), 1);
        assert!(image.merge(&fragment(7, 1, 2)));
    }

    #[test]
    fn test_out_of_bounds_part_ignored() {
        let mut image = AcousticImage::seed(&fragment(7, 0, 2));

        let mut part = image_part(4, 1, 2, 10);
        part.first_sample = 9; // 5 samples from 9 overruns 10
        let bad = Aid0::decode(&aid0_frame_with(7, 4, &part)).unwrap();
        assert!(!image.merge(&bad));

        let mut part = image_part(4, 1, 2, 10);
        part.part_number = 5;
        let bad = Aid0::decode(&aid0_frame_with(7, 4, &part)).unwrap();
        assert!(!image.merge(&bad));

        assert_eq!(image.parts_received(), 0);
    }

    #[test]
    fn test_oversized_geometry_never_completes() {
        let mut part = image_part(4, 0, 1, 1);
        part.total_samples = u32::MAX;
        let huge = Aid0::decode(&aid0_frame_with(7, 4, &part)).unwrap();

        let mut image = AcousticImage::seed(&huge);
        assert!(image.amplitudes.is_empty());
        assert!(!image.merge(&huge));
    }

    #[test]
    fn test_geometry_limits() {
        let mut part = image_part(4, 0, 1, 1);
        part.total_samples = MAX_IMAGE_SAMPLES_PER_BEAM as u32;
        let largest = Aid0::decode(&aid0_frame_with(7, 4, &part)).unwrap();
        let image = AcousticImage::seed(&largest);
        assert_eq!(image.amplitudes.len(), 4 * MAX_IMAGE_SAMPLES_PER_BEAM);
        assert_eq!(image.part_total(), 1);

        part.total_samples += 1;
        let too_deep = Aid0::decode(&aid0_frame_with(7, 4, &part)).unwrap();
        let image = AcousticImage::seed(&too_deep);
        assert!(image.amplitudes.is_empty());
        assert_eq!(image.part_total(), 0);
    }

    #[test]
    fn test_frame_ids_applied() {
        let (image, _) = merged(&[0], 1);
        let image = image.with_frame_ids(&FrameIds::new("tx", "rx"));
        assert_eq!(image.frame_id, "tx");
        assert_eq!(image.ping_info.rx_frame_id, "rx");
    }
}
