//! Capability traits at the seams of the ingestion pipeline.
//!
//! The pipeline itself owns only receiving, capture, routing and the
//! reassembly lifecycle. Packet layouts, record conversion and delivery to
//! consumers are plugged in through these traits.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;

use super::constants::{AID0_TAG, BTH0_TAG};
use super::error::DecodeError;
use crate::packets::DecodedPacket;
use crate::records::Record;

/// Identifier of one sonar ping.
pub type PingKey = u32;

/// Packet types carried by the sonar feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PacketKind {
    /// Bathymetry, complete in one packet.
    Bth0,
    /// Acoustic image data, one fragment of a ping's image.
    Aid0,
}

impl PacketKind {
    /// Packet name as it appears on the wire.
    pub fn tag(self) -> [u8; 4] {
        match self {
            Self::Bth0 => BTH0_TAG,
            Self::Aid0 => AID0_TAG,
        }
    }

    /// Parse a packet kind from the first four bytes of a packet.
    pub fn from_tag(bytes: &[u8]) -> Option<Self> {
        match bytes.get(..4)? {
            t if t == BTH0_TAG => Some(Self::Bth0),
            t if t == AID0_TAG => Some(Self::Aid0),
            _ => None,
        }
    }

    /// Lowercase name, used for capture files and logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::Bth0 => "bth0",
            Self::Aid0 => "aid0",
        }
    }

    /// Check if packets of this kind carry only part of a ping's record.
    pub fn is_fragment(self) -> bool {
        matches!(self, Self::Aid0)
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A packet type that can be decoded from one datagram.
///
/// Decoding may structurally succeed on bytes of another packet type (the
/// section layout is shared), so receivers must also check [`is_type`].
///
/// [`is_type`]: SonarPacket::is_type
pub trait SonarPacket: Sized + Send + Into<DecodedPacket> + 'static {
    /// The kind this type decodes.
    const KIND: PacketKind;

    /// Decode a packet from one datagram.
    fn decode(frame: &Bytes) -> Result<Self, DecodeError>;

    /// Check that the decoded packet really is of this type.
    fn is_type(&self) -> bool;
}

/// Output state built up from several fragments.
///
/// The reassembly cache owns the entry lifecycle; implementors own the
/// field-level merge.
pub trait Accumulate: Sized + Send {
    /// Fragment type merged into this state.
    type Fragment;

    /// Create empty state shaped after the first fragment of a ping.
    ///
    /// The fragment itself is merged afterwards through [`merge`](Self::merge).
    fn seed(fragment: &Self::Fragment) -> Self;

    /// Merge one fragment. Returns `true` once the state is complete.
    fn merge(&mut self, fragment: &Self::Fragment) -> bool;
}

/// Name of a publication channel.
///
/// An empty name means the topic is not advertised and nothing is published
/// on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic(Arc<str>);

impl Topic {
    /// Create a topic from its name.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// A topic that is never advertised.
    pub fn disabled() -> Self {
        Self::new("")
    }

    /// Topic name.
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Check if records should be produced for this topic at all.
    pub fn is_advertised(&self) -> bool {
        !self.0.is_empty()
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Delivery of finished records to consumers.
///
/// Publishing to a topic without consumers is a cheap no-op. Implementations
/// must not block the caller: it may hold the reassembly lock.
pub trait Publish: Send + Sync + 'static {
    /// Publish a record on a topic.
    fn publish(&self, topic: &Topic, record: Record);
}

impl<P: Publish> Publish for Arc<P> {
    fn publish(&self, topic: &Topic, record: Record) {
        (**self).publish(topic, record);
    }
}
