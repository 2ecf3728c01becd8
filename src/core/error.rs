//! Error types for the ingestion pipeline.
//!
//! Nothing on the receive path is fatal: decode and capture errors are reported
//! to the log and the datagram is dropped. Only startup (configuration, socket
//! binding) surfaces errors to the caller.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when decoding a sonar packet.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Buffer shorter than a fixed-size structure.
    #[error("buffer too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        /// Minimum number of bytes required.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },

    /// Declared packet size disagrees with the datagram.
    #[error("declared packet size {declared} does not fit datagram of {actual} bytes")]
    PacketSize {
        /// Size from the packet header.
        declared: u32,
        /// Datagram length.
        actual: usize,
    },

    /// Section header declares a size that runs past the packet.
    #[error("section {name} declares {declared} bytes, only {remaining} remain")]
    SectionOverrun {
        /// Section name.
        name: String,
        /// Size from the section header.
        declared: usize,
        /// Bytes left in the packet.
        remaining: usize,
    },

    /// A section required by the packet type is absent.
    #[error("missing required section {0}")]
    MissingSection(&'static str),

    /// Per-beam array length disagrees with the ping header.
    #[error("section {section} carries {actual} values, expected {expected}")]
    CountMismatch {
        /// Section name.
        section: &'static str,
        /// Count derived from the ping header.
        expected: usize,
        /// Count found in the section.
        actual: usize,
    },
}

impl DecodeError {
    /// Check if the error indicates a cut-off datagram rather than corrupt content.
    pub fn is_truncation(&self) -> bool {
        matches!(
            self,
            DecodeError::TooShort { .. }
                | DecodeError::PacketSize { .. }
                | DecodeError::SectionOverrun { .. }
        )
    }
}

/// Errors in the raw capture side channel.
///
/// These are logged and swallowed; they never reach the receive path.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Capture directory could not be created.
    #[error("cannot create capture directory {path}: {source}")]
    CreateDir {
        /// Directory path.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },

    /// Capture file could not be opened.
    #[error("cannot open capture file {path}: {source}")]
    Open {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },

    /// Write or flush failed.
    #[error("capture i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("cannot read config {path}: {source}")]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },

    /// Configuration file is not valid TOML for this schema.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Top-level ingestion errors.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Decode error.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Capture error.
    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}
