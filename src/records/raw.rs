//! Unmodified packet record.

use bytes::Bytes;
use serde::Serialize;

use crate::core::PacketKind;

/// A copy of one valid packet as it arrived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawPacket {
    /// Transmitter frame id.
    pub frame_id: String,
    /// Packet kind.
    pub kind: PacketKind,
    /// Packet bytes.
    pub data: Bytes,
}

impl RawPacket {
    /// Wrap packet bytes. `Bytes` clones share the receive buffer.
    pub fn new(kind: PacketKind, data: Bytes, frame_id: impl Into<String>) -> Self {
        Self {
            frame_id: frame_id.into(),
            kind,
            data,
        }
    }
}
