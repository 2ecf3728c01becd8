//! Splits a capture log back into packets.

use std::path::Path;

use bytes::Bytes;

use crate::core::{CaptureError, DecodeError};
use crate::packets::PacketHeader;

/// Iterator over the packets stored in a capture log.
///
/// Each packet is sliced out using the size field of its header. A frame whose
/// header is unreadable ends the iteration with one error, since the position
/// of the next packet is then unknown.
#[derive(Debug, Clone)]
pub struct CaptureReader {
    data: Bytes,
    offset: usize,
    failed: bool,
}

impl CaptureReader {
    /// Read a whole capture file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|source| CaptureError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_bytes(Bytes::from(data)))
    }

    /// Iterate over packets in an in-memory capture.
    pub fn from_bytes(data: Bytes) -> Self {
        Self {
            data,
            offset: 0,
            failed: false,
        }
    }

    /// Byte offset of the next packet.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }
}

impl Iterator for CaptureReader {
    type Item = Result<Bytes, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.data.len() {
            return None;
        }

        let rest = &self.data[self.offset..];
        match PacketHeader::parse(rest) {
            Ok((header, _)) => {
                let end = self.offset + header.size as usize;
                let frame = self.data.slice(self.offset..end);
                self.offset = end;
                Some(Ok(frame))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
