//! Typed datagram receivers.
//!
//! A [`TypedReceiver`] owns the socket for one packet type. For every
//! datagram it records the bytes, decodes them as its type, checks the type
//! tag and hands the packet to the shared [`Dispatcher`], all before the next
//! datagram is read.

use std::marker::PhantomData;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use crate::capture::{CaptureReport, RawCapture};
use crate::core::{DecodeError, PacketKind, Publish, SonarPacket};
use crate::dispatch::Dispatcher;
use crate::transport::SonarSocket;

/// What happened to one datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// Zero-length datagram, ignored.
    Empty,
    /// Could not be decoded as this receiver's type.
    Malformed(DecodeError),
    /// Decoded, but the packet name belongs to another type.
    Mismatch,
    /// Handed to the dispatcher.
    Dispatched,
}

/// Per-receiver counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    /// Datagrams read from the socket.
    pub received: u64,
    /// Zero-length datagrams.
    pub empty: u64,
    /// Datagrams that failed to decode.
    pub malformed: u64,
    /// Datagrams of the wrong packet type.
    pub mismatched: u64,
    /// Packets handed to the dispatcher.
    pub dispatched: u64,
}

impl ReceiverStats {
    fn record(&mut self, outcome: &ReceiveOutcome) {
        self.received += 1;
        match outcome {
            ReceiveOutcome::Empty => self.empty += 1,
            ReceiveOutcome::Malformed(_) => self.malformed += 1,
            ReceiveOutcome::Mismatch => self.mismatched += 1,
            ReceiveOutcome::Dispatched => self.dispatched += 1,
        }
    }
}

/// Final state of a receiver after shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverReport {
    /// Packet type handled.
    pub kind: PacketKind,
    /// Datagram counters.
    pub stats: ReceiverStats,
    /// Raw capture summary.
    pub capture: CaptureReport,
}

/// Receiver for packets of type `T`.
pub struct TypedReceiver<T: SonarPacket, P: Publish> {
    socket: SonarSocket,
    capture: RawCapture,
    dispatcher: Arc<Dispatcher<P>>,
    stats: ReceiverStats,
    _packet: PhantomData<fn() -> T>,
}

impl<T: SonarPacket, P: Publish> TypedReceiver<T, P> {
    /// Create a receiver.
    pub fn new(socket: SonarSocket, capture: RawCapture, dispatcher: Arc<Dispatcher<P>>) -> Self {
        Self {
            socket,
            capture,
            dispatcher,
            stats: ReceiverStats::default(),
            _packet: PhantomData,
        }
    }

    /// Packet type handled.
    pub fn kind(&self) -> PacketKind {
        T::KIND
    }

    /// Counters so far.
    pub fn stats(&self) -> ReceiverStats {
        self.stats
    }

    /// The socket datagrams are read from.
    pub fn socket(&self) -> &SonarSocket {
        &self.socket
    }

    /// Process one datagram.
    ///
    /// Non-empty bytes are captured before decoding, whether or not they
    /// decode. Decode failures and foreign packet types are dropped.
    pub fn on_bytes_received(&mut self, frame: Bytes) -> ReceiveOutcome {
        let outcome = self.handle(frame);
        self.stats.record(&outcome);
        outcome
    }

    fn handle(&self, frame: Bytes) -> ReceiveOutcome {
        if frame.is_empty() {
            return ReceiveOutcome::Empty;
        }
        self.capture.write(&frame);

        let packet = match T::decode(&frame) {
            Ok(packet) => packet,
            Err(e) => {
                debug!(
                    kind = %T::KIND,
                    len = frame.len(),
                    error = %e,
                    "dropping malformed datagram"
                );
                return ReceiveOutcome::Malformed(e);
            }
        };
        if !packet.is_type() {
            debug!(kind = %T::KIND, len = frame.len(), "dropping datagram of another packet type");
            return ReceiveOutcome::Mismatch;
        }

        self.dispatcher.dispatch(packet.into());
        ReceiveOutcome::Dispatched
    }

    /// Receive until `shutdown` turns `true` or its sender is dropped, then
    /// close the capture stream.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> ReceiverReport {
        info!(
            kind = %T::KIND,
            addr = ?self.socket.local_addr().ok(),
            capture = ?self.capture.path(),
            "receiver started"
        );

        while !*shutdown.borrow() {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                received = self.socket.recv_frame() => match received {
                    Ok((frame, from)) => {
                        trace!(kind = %T::KIND, %from, len = frame.len(), "datagram");
                        self.on_bytes_received(frame);
                    }
                    // ICMP errors and the like; the socket stays usable
                    Err(e) => warn!(kind = %T::KIND, error = %e, "receive failed"),
                },
            }
        }

        let capture = self.capture.close().await;
        info!(kind = %T::KIND, stats = ?self.stats, "receiver stopped");
        ReceiverReport {
            kind: T::KIND,
            stats: self.stats,
            capture,
        }
    }
}
