//! End-to-end scenarios over loopback UDP.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tokio::net::UdpSocket;
use tokio::sync::broadcast;

use mbes_ingest::core::{SECTION_IMAGE_PART, SECTION_RANGES};
use mbes_ingest::packets::{BeamAngles, ImagePart, PacketWriter, PingHeader};
use mbes_ingest::prelude::*;

const BEAMS: u16 = 8;
const SAMPLES: u32 = 12;

fn ping(ping_number: u32) -> PingHeader {
    PingHeader {
        ping_number,
        beam_count: BEAMS,
        time_seconds: 1_700_000_000 + ping_number,
        sound_speed: 1500.0,
        rx_sample_rate: 75_000.0,
        ..PingHeader::default()
    }
}

fn bth0(ping_number: u32) -> Bytes {
    let ranges: Vec<u16> = (0..BEAMS).map(|b| 100 + b).collect();
    PacketWriter::for_kind(PacketKind::Bth0, 1)
        .ping_header(&ping(ping_number))
        .beam_angles(&BeamAngles {
            first: -1.0,
            last: 1.0,
        })
        .scaled_samples(SECTION_RANGES, 0.001, &ranges)
        .finish()
}

/// Part `part` of `total`, each part carrying `SAMPLES / total` samples.
fn aid0(ping_number: u32, part: u16, total: u16) -> Bytes {
    let per_part = SAMPLES / total as u32;
    let first_sample = part as u32 * per_part;
    let start = first_sample as usize * BEAMS as usize;
    let len = per_part as usize * BEAMS as usize;
    let image_part = ImagePart {
        part_number: part,
        part_total: total,
        total_samples: SAMPLES,
        first_sample,
        sample_count: per_part,
        amplitudes: (start..start + len).map(|i| i as u16).collect(),
    };
    PacketWriter::for_kind(PacketKind::Aid0, 2)
        .ping_header(&ping(ping_number))
        .section(SECTION_IMAGE_PART, &image_part.to_bytes())
        .finish()
}

struct Node {
    running: RunningService<Arc<BroadcastPublisher>>,
    images: broadcast::Receiver<Arc<Record>>,
    detections: broadcast::Receiver<Arc<Record>>,
    head: UdpSocket,
    bathy: SocketAddr,
    image: SocketAddr,
}

impl Node {
    async fn start(capture: Option<&std::path::Path>) -> Self {
        let config = IngestConfig::builder()
            .interface_ip(IpAddr::from([127, 0, 0, 1]))
            .ports(0, 0)
            .capture_dir(capture)
            .build()
            .unwrap();

        let publisher = Arc::new(BroadcastPublisher::with_capacity(1024));
        let images = publisher.subscribe(&Topic::new("acoustic_image"));
        let detections = publisher.subscribe(&Topic::new("detections"));

        let running = IngestService::bind(config, publisher).await.unwrap().start();
        Self {
            bathy: running.bathy_addr().unwrap(),
            image: running.acoustic_image_addr().unwrap(),
            running,
            images,
            detections,
            head: UdpSocket::bind("127.0.0.1:0").await.unwrap(),
        }
    }

    async fn send_image(&self, frame: &[u8]) {
        self.head.send_to(frame, self.image).await.unwrap();
    }

    async fn send_bathy(&self, frame: &[u8]) {
        self.head.send_to(frame, self.bathy).await.unwrap();
    }

    /// Send a BTH0 marker and wait for its detections, so everything sent to
    /// the image port before it has had time to be processed.
    async fn settle(&mut self, marker: u32) {
        self.send_bathy(&bth0(marker)).await;
        let record = tokio::time::timeout(Duration::from_secs(5), self.detections.recv())
            .await
            .expect("detections within timeout")
            .unwrap();
        assert_eq!(record.ping_number(), Some(marker));
        // Image port is a separate socket; give it a moment as well
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    fn drain_images(&mut self) -> Vec<AcousticImage> {
        let mut out = Vec::new();
        while let Ok(record) = self.images.try_recv() {
            if let Record::AcousticImage(image) = &*record {
                out.push(image.clone());
            }
        }
        out
    }
}

#[tokio::test]
async fn test_ping_reassembled_from_two_fragments() {
    let mut node = Node::start(None).await;

    node.send_image(&aid0(100, 0, 2)).await;
    node.send_image(&aid0(100, 1, 2)).await;
    node.settle(1).await;

    let images = node.drain_images();
    assert_eq!(images.len(), 1);
    let image = &images[0];
    assert_eq!(image.ping_number, 100);
    assert_eq!(image.beam_count, BEAMS);
    assert_eq!(image.samples_per_beam, SAMPLES);
    let expected: Vec<u16> = (0..(SAMPLES as u16 * BEAMS)).collect();
    assert_eq!(image.amplitudes, expected);
    assert_eq!(image.frame_id, "r2sonic_tx");
    assert_eq!(image.ping_info.rx_frame_id, "r2sonic_rx");

    let report = node.running.shutdown().await.unwrap();
    assert_eq!(report.dispatch.images, 1);
    assert_eq!(report.dispatch.pending_images, 0);
}

#[tokio::test]
async fn test_incomplete_ping_evicted_without_publish() {
    let mut node = Node::start(None).await;

    node.send_image(&aid0(5, 0, 2)).await;
    for p in 6..=20 {
        node.send_image(&aid0(p, 0, 1)).await;
    }
    node.settle(1).await;

    let images = node.drain_images();
    assert_eq!(images.len(), 15);
    assert!(images.iter().all(|i| i.ping_number != 5));

    let report = node.running.shutdown().await.unwrap();
    assert_eq!(report.dispatch.cache.evicted, 1);
    assert_eq!(report.dispatch.pending_images, 0);
}

#[tokio::test]
async fn test_noise_and_cross_talk_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let mut node = Node::start(Some(dir.path())).await;

    // Empty, garbage, and a bathymetry packet on the image port
    node.send_image(&[]).await;
    node.send_image(b"\xde\xad\xbe\xef").await;
    node.send_image(&bth0(3)).await;
    node.settle(1).await;

    assert!(node.drain_images().is_empty());

    let report = node.running.shutdown().await.unwrap();
    let image_rx = report
        .receivers
        .iter()
        .find(|r| r.kind == PacketKind::Aid0)
        .unwrap();
    assert_eq!(image_rx.stats.empty, 1);
    assert_eq!(image_rx.stats.malformed, 1);
    assert_eq!(image_rx.stats.mismatched, 1);
    assert_eq!(image_rx.stats.dispatched, 0);
    // Everything but the empty datagram was captured
    assert_eq!(image_rx.capture.frames_written, 2);
    assert_eq!(report.dispatch.cache.started, 0);
}

#[tokio::test]
async fn test_shuffled_fragments_then_replay_matches() {
    let dir = tempfile::tempdir().unwrap();
    let mut node = Node::start(Some(dir.path())).await;

    let mut frames: Vec<Bytes> = (0..6)
        .flat_map(|p| (0..4).map(move |part| aid0(p, part, 4)))
        .collect();
    let dupes: Vec<Bytes> = frames.iter().step_by(5).cloned().collect();
    frames.extend(dupes);
    frames.shuffle(&mut StdRng::seed_from_u64(11));

    for frame in &frames {
        node.send_image(frame).await;
    }
    node.settle(1).await;

    let mut live: Vec<u32> = node.drain_images().iter().map(|i| i.ping_number).collect();
    live.sort_unstable();
    assert_eq!(live, (0..6).collect::<Vec<_>>());

    let report = node.running.shutdown().await.unwrap();
    let image_log = report
        .receivers
        .iter()
        .find(|r| r.kind == PacketKind::Aid0)
        .and_then(|r| r.capture.path.clone())
        .unwrap();

    // Offline replay of the capture reproduces the same images
    let publisher = Arc::new(BroadcastPublisher::with_capacity(64));
    let mut replayed = publisher.subscribe(&Topic::new("acoustic_image"));
    let dispatcher = Dispatcher::new(
        Arc::clone(&publisher),
        Topics::default(),
        FrameIds::new("r2sonic_tx", "r2sonic_rx"),
        RetentionWindow::default(),
    );
    let stats = replay(CaptureReader::open(&image_log).unwrap(), &dispatcher);
    assert_eq!(stats.frames as usize, frames.len());
    assert!(!stats.truncated);

    let mut offline = Vec::new();
    while let Ok(record) = replayed.try_recv() {
        offline.extend(record.ping_number());
    }
    offline.sort_unstable();
    assert_eq!(offline, live);
}
