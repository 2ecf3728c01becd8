//! Packet builders shared by unit tests.

use bytes::Bytes;

use super::{BeamAngles, ImagePart, PacketWriter, PingHeader};
use crate::core::{PacketKind, PingKey, SECTION_IMAGE_PART, SECTION_INTENSITIES, SECTION_RANGES};

pub(crate) fn sample_ping(ping_number: PingKey, beam_count: u16) -> PingHeader {
    let mut model = [0u8; 12];
    model[..5].copy_from_slice(b"2024M");
    let mut serial = [0u8; 12];
    serial[..6].copy_from_slice(b"103512");
    PingHeader {
        model,
        serial,
        time_seconds: 1_700_000_000,
        time_nanoseconds: 250_000_000,
        ping_number,
        ping_period: 0.1,
        sound_speed: 1500.0,
        frequency: 400_000.0,
        tx_power: 221.0,
        tx_pulse_width: 0.000_015,
        tx_beamwidth_vert: 0.017,
        tx_beamwidth_horiz: 0.009,
        rx_bandwidth: 60_000.0,
        rx_sample_rate: 75_000.0,
        rx_range: 50.0,
        beam_count,
    }
}

pub(crate) fn sample_angles() -> BeamAngles {
    BeamAngles {
        first: -1.0,
        last: 1.0,
    }
}

/// BTH0 with ranges `1000 + beam` (scale 1e-5) and intensities `10 + beam`.
pub(crate) fn bth0_frame(ping_number: PingKey, beams: u16) -> Bytes {
    let ranges: Vec<u16> = (0..beams).map(|b| 1000 + b).collect();
    let intensities: Vec<u16> = (0..beams).map(|b| 10 + b).collect();
    PacketWriter::for_kind(PacketKind::Bth0, 1)
        .ping_header(&sample_ping(ping_number, beams))
        .beam_angles(&sample_angles())
        .scaled_samples(SECTION_RANGES, 0.000_01, &ranges)
        .scaled_samples(SECTION_INTENSITIES, 1.0, &intensities)
        .finish()
}

/// Part `part_number` of an image split evenly into `part_total` parts.
///
/// The amplitude at flat index `i` of the full image is `i as u16`.
pub(crate) fn image_part(
    beams: u16,
    part_number: u16,
    part_total: u16,
    total_samples: u32,
) -> ImagePart {
    let per_part = total_samples.div_ceil(part_total as u32);
    let first_sample = (part_number as u32 * per_part).min(total_samples);
    let sample_count = per_part.min(total_samples - first_sample);
    let start = first_sample as usize * beams as usize;
    let len = sample_count as usize * beams as usize;
    ImagePart {
        part_number,
        part_total,
        total_samples,
        first_sample,
        sample_count,
        amplitudes: (start..start + len).map(|i| i as u16).collect(),
    }
}

pub(crate) fn aid0_frame(
    ping_number: PingKey,
    beams: u16,
    part_number: u16,
    part_total: u16,
    total_samples: u32,
) -> Bytes {
    let part = image_part(beams, part_number, part_total, total_samples);
    aid0_frame_with(ping_number, beams, &part)
}

pub(crate) fn aid0_frame_with(ping_number: PingKey, beams: u16, part: &ImagePart) -> Bytes {
    PacketWriter::for_kind(PacketKind::Aid0, 2)
        .ping_header(&sample_ping(ping_number, beams))
        .beam_angles(&sample_angles())
        .section(SECTION_IMAGE_PART, &part.to_bytes())
        .finish()
}
