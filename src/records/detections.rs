//! Bottom detections converted from BTH0.

use serde::Serialize;

use super::{FrameIds, PingInfo, Stamp};
use crate::core::PingKey;
use crate::packets::Bth0;

/// Bottom detections of one ping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SonarDetections {
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
    /// Two-way travel time per beam, seconds.
    pub two_way_travel_times: Vec<f32>,
    /// Receive angle per beam, radians. Empty if the sonar sent none.
    pub rx_angles: Vec<f32>,
    /// Intensity per beam. Empty if the sonar sent none.
    pub intensities: Vec<f32>,
}

impl SonarDetections {
    /// Convert a bathymetry packet.
    pub fn from_bth0(packet: &Bth0, frames: &FrameIds) -> Self {
        let mut ping_info = PingInfo::from_ping(&packet.ping);
        ping_info.rx_frame_id = frames.rx.clone();

        Self {
            frame_id: frames.tx.clone(),
            stamp: Stamp::from_ping(&packet.ping),
            ping_number: packet.ping_number(),
            ping_info,
            sample_rate: packet.ping.rx_sample_rate,
            two_way_travel_times: packet.travel_times(),
            rx_angles: packet.beam_angles(),
            intensities: packet.scaled_intensities(),
        }
    }

    /// Number of beams.
    pub fn beam_count(&self) -> usize {
        self.two_way_travel_times.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SonarPacket;
    use crate::packets::fixtures::bth0_frame;

    #[test]
    fn test_from_bth0() {
        let packet = Bth0::decode(&bth0_frame(31, 3)).unwrap();
        let frames = FrameIds::new("sonar_tx", "sonar_rx");
        let detections = SonarDetections::from_bth0(&packet, &frames);

        assert_eq!(detections.frame_id, "sonar_tx");
        assert_eq!(detections.ping_info.rx_frame_id, "sonar_rx");
        assert_eq!(detections.ping_number, 31);
        assert_eq!(detections.stamp.sec, 1_700_000_000);
        assert_eq!(detections.stamp.nanosec, 250_000_000);
        assert_eq!(detections.ping_info.sound_speed, 1500.0);
        assert_eq!(detections.sample_rate, 75_000.0);
        assert_eq!(detections.beam_count(), 3);
        assert_eq!(detections.rx_angles, vec![-1.0, 0.0, 1.0]);
        assert_eq!(detections.intensities, vec![10.0, 11.0, 12.0]);
        assert!((detections.two_way_travel_times[2] - 0.010_02).abs() < 1e-6);
    }
}
