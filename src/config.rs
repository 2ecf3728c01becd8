//! Node configuration.
//!
//! Loaded from a TOML file; every field has a default, so an empty file (or
//! no file) gives a node listening on the sonar's standard ports:
//!
//! ```toml
//! interface_ip = "0.0.0.0"
//! bathy_port = 65500
//! acoustic_image_port = 65503
//!
//! [topics]
//! detections = "detections"
//! acoustic_image = ""          # not advertised, no reassembly
//!
//! [reassembly]
//! retention_window = 10
//!
//! [capture]
//! directory = "/data/raw_logs" # "" disables raw capture
//! ```

use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::{
    ConfigError, DEFAULT_ACOUSTIC_IMAGE_PORT, DEFAULT_ACOUSTIC_IMAGE_TOPIC, DEFAULT_AID0_TOPIC,
    DEFAULT_BATHY_PORT, DEFAULT_BTH0_TOPIC, DEFAULT_CAPTURE_QUEUE_DEPTH,
    DEFAULT_DETECTIONS_TOPIC, DEFAULT_DEVICE_PREFIX, DEFAULT_INTERFACE_IP,
    DEFAULT_RAW_LOG_DIRECTORY, DEFAULT_RESTART_GAP, DEFAULT_RETENTION_WINDOW,
    DEFAULT_RX_FRAME_ID, DEFAULT_SONAR_IP, DEFAULT_TOPIC_CAPACITY, DEFAULT_TX_FRAME_ID,
    MAX_DATAGRAM_SIZE, PACKET_HEADER_SIZE, PacketKind, Topic,
};
use crate::dispatch::Topics;
use crate::reassembly::RetentionWindow;
use crate::records::FrameIds;

/// Topic names. An empty name disables the topic.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TopicsConfig {
    /// Detections converted from BTH0.
    pub detections: String,
    /// Raw BTH0 packets.
    pub bth0: String,
    /// Raw AID0 packets.
    pub aid0: String,
    /// Reassembled acoustic images.
    pub acoustic_image: String,
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            detections: DEFAULT_DETECTIONS_TOPIC.to_string(),
            bth0: DEFAULT_BTH0_TOPIC.to_string(),
            aid0: DEFAULT_AID0_TOPIC.to_string(),
            acoustic_image: DEFAULT_ACOUSTIC_IMAGE_TOPIC.to_string(),
        }
    }
}

impl TopicsConfig {
    /// Topics for the dispatcher.
    pub fn to_topics(&self) -> Topics {
        Topics {
            detections: Topic::new(&self.detections),
            bth0: Topic::new(&self.bth0),
            aid0: Topic::new(&self.aid0),
            acoustic_image: Topic::new(&self.acoustic_image),
        }
    }
}

/// Reassembly settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReassemblyConfig {
    /// Pings an unfinished image may lag the newest ping before eviction.
    pub retention_window: u32,
    /// Backwards jump in ping number treated as a sonar restart.
    pub restart_gap: u32,
}

impl Default for ReassemblyConfig {
    fn default() -> Self {
        Self {
            retention_window: DEFAULT_RETENTION_WINDOW,
            restart_gap: DEFAULT_RESTART_GAP,
        }
    }
}

/// Raw capture settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptureConfig {
    /// Directory for capture logs. Empty disables capture.
    pub directory: PathBuf,
    /// Prefix of the device names (`<prefix>_bth0`, `<prefix>_aid0`).
    pub device_prefix: String,
    /// Frames queued per stream before new ones are dropped.
    pub queue_depth: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(DEFAULT_RAW_LOG_DIRECTORY),
            device_prefix: DEFAULT_DEVICE_PREFIX.to_string(),
            queue_depth: DEFAULT_CAPTURE_QUEUE_DEPTH,
        }
    }
}

/// Ingestion node configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestConfig {
    /// Sonar head address. Only reported; datagrams are accepted from any peer.
    pub sonar_ip: IpAddr,
    /// Local interface the receivers bind to.
    pub interface_ip: IpAddr,
    /// Port carrying BTH0.
    pub bathy_port: u16,
    /// Port carrying AID0.
    pub acoustic_image_port: u16,
    /// Frame id stamped on every record.
    pub tx_frame_id: String,
    /// Receiver frame id stamped into ping info.
    pub rx_frame_id: String,
    /// Socket receive buffer, bytes. Longer datagrams are truncated.
    pub recv_buffer_size: usize,
    /// Records buffered per topic for slow subscribers.
    pub topic_capacity: usize,
    /// Topic names.
    pub topics: TopicsConfig,
    /// Reassembly settings.
    pub reassembly: ReassemblyConfig,
    /// Raw capture settings.
    pub capture: CaptureConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            sonar_ip: DEFAULT_SONAR_IP,
            interface_ip: DEFAULT_INTERFACE_IP,
            bathy_port: DEFAULT_BATHY_PORT,
            acoustic_image_port: DEFAULT_ACOUSTIC_IMAGE_PORT,
            tx_frame_id: DEFAULT_TX_FRAME_ID.to_string(),
            rx_frame_id: DEFAULT_RX_FRAME_ID.to_string(),
            recv_buffer_size: MAX_DATAGRAM_SIZE,
            topic_capacity: DEFAULT_TOPIC_CAPACITY,
            topics: TopicsConfig::default(),
            reassembly: ReassemblyConfig::default(),
            capture: CaptureConfig::default(),
        }
    }
}

impl IngestConfig {
    /// Load and validate a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate TOML configuration.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Start building a configuration from the defaults.
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder::new()
    }

    /// Check values that parse but cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.reassembly.retention_window == 0 {
            return invalid("reassembly.retention_window must be at least 1".into());
        }
        if self.reassembly.restart_gap <= self.reassembly.retention_window {
            return invalid(format!(
                "reassembly.restart_gap ({}) must exceed retention_window ({})",
                self.reassembly.restart_gap, self.reassembly.retention_window
            ));
        }
        if self.bathy_port != 0 && self.bathy_port == self.acoustic_image_port {
            return invalid(format!(
                "bathy_port and acoustic_image_port are both {}",
                self.bathy_port
            ));
        }
        if self.recv_buffer_size < PACKET_HEADER_SIZE {
            return invalid(format!(
                "recv_buffer_size must be at least {PACKET_HEADER_SIZE}"
            ));
        }
        if self.topic_capacity == 0 {
            return invalid("topic_capacity must be at least 1".into());
        }
        if self.capture.queue_depth == 0 {
            return invalid("capture.queue_depth must be at least 1".into());
        }
        Ok(())
    }

    /// Address the BTH0 receiver binds to.
    pub fn bathy_addr(&self) -> SocketAddr {
        SocketAddr::new(self.interface_ip, self.bathy_port)
    }

    /// Address the AID0 receiver binds to.
    pub fn acoustic_image_addr(&self) -> SocketAddr {
        SocketAddr::new(self.interface_ip, self.acoustic_image_port)
    }

    /// Bind address for a packet kind.
    pub fn addr_for(&self, kind: PacketKind) -> SocketAddr {
        match kind {
            PacketKind::Bth0 => self.bathy_addr(),
            PacketKind::Aid0 => self.acoustic_image_addr(),
        }
    }

    /// Frame ids stamped on records.
    pub fn frame_ids(&self) -> FrameIds {
        FrameIds::new(&self.tx_frame_id, &self.rx_frame_id)
    }

    /// Retention window for the reassembly cache.
    pub fn retention(&self) -> RetentionWindow {
        RetentionWindow::new(self.reassembly.retention_window, self.reassembly.restart_gap)
    }

    /// Capture directory, or `None` if capture is disabled.
    pub fn capture_dir(&self) -> Option<&Path> {
        let dir = self.capture.directory.as_path();
        (!dir.as_os_str().is_empty()).then_some(dir)
    }

    /// Capture device name for a packet kind, e.g. `r2sonic_bth0`.
    pub fn device_name(&self, kind: PacketKind) -> String {
        format!("{}_{}", self.capture.device_prefix, kind.name())
    }
}

/// Builder for [`IngestConfig`].
#[derive(Debug, Clone, Default)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
}

impl IngestConfigBuilder {
    /// Create a builder holding the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the local interface.
    pub fn interface_ip(mut self, ip: IpAddr) -> Self {
        self.config.interface_ip = ip;
        self
    }

    /// Set the sonar head address.
    pub fn sonar_ip(mut self, ip: IpAddr) -> Self {
        self.config.sonar_ip = ip;
        self
    }

    /// Set both receive ports. Port 0 picks an ephemeral port.
    pub fn ports(mut self, bathy: u16, acoustic_image: u16) -> Self {
        self.config.bathy_port = bathy;
        self.config.acoustic_image_port = acoustic_image;
        self
    }

    /// Set the frame ids.
    pub fn frame_ids(mut self, tx: impl Into<String>, rx: impl Into<String>) -> Self {
        self.config.tx_frame_id = tx.into();
        self.config.rx_frame_id = rx.into();
        self
    }

    /// Set the topic names.
    pub fn topics(mut self, topics: TopicsConfig) -> Self {
        self.config.topics = topics;
        self
    }

    /// Set the retention window.
    pub fn retention_window(mut self, pings: u32) -> Self {
        self.config.reassembly.retention_window = pings;
        self
    }

    /// Set the restart gap.
    pub fn restart_gap(mut self, pings: u32) -> Self {
        self.config.reassembly.restart_gap = pings;
        self
    }

    /// Set the capture directory; `None` disables capture.
    pub fn capture_dir(mut self, dir: Option<&Path>) -> Self {
        self.config.capture.directory = dir.map(Path::to_path_buf).unwrap_or_default();
        self
    }

    /// Set the capture queue depth.
    pub fn capture_queue_depth(mut self, depth: usize) -> Self {
        self.config.capture.queue_depth = depth;
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<IngestConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
