//! High-level ingestion service.
//!
//! Owns the two typed receivers and the dispatcher they share. Receivers hold
//! the dispatcher through an `Arc`; the dispatcher knows nothing about them.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::capture::RawCapture;
use crate::config::IngestConfig;
use crate::core::{ConfigError, PacketKind, Publish};
use crate::dispatch::{DispatchStats, Dispatcher};
use crate::packets::{Aid0, Bth0};
use crate::receiver::{ReceiverReport, TypedReceiver};
use crate::transport::{SonarSocket, SonarSocketBuilder};

/// Errors that can occur starting or stopping the service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A receiver socket could not be bound.
    #[error("cannot bind {kind} receiver to {addr}: {source}")]
    Bind {
        /// Packet type of the receiver.
        kind: PacketKind,
        /// Requested address.
        addr: SocketAddr,
        /// Underlying error.
        source: io::Error,
    },

    /// Configuration rejected.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// A receiver task panicked or was cancelled.
    #[error("receiver task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Final counters of a stopped service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceReport {
    /// One report per receiver.
    pub receivers: Vec<ReceiverReport>,
    /// Dispatcher counters.
    pub dispatch: DispatchStats,
}

/// A bound, not yet running, ingestion service.
///
/// # Example
///
/// ```ignore
/// use mbes_ingest::prelude::*;
///
/// let publisher = Arc::new(BroadcastPublisher::new());
/// let mut images = publisher.subscribe(&Topic::new("acoustic_image"));
///
/// let service = IngestService::bind(IngestConfig::default(), publisher).await?;
/// let running = service.start();
///
/// while let Ok(record) = images.recv().await {
///     println!("ping {:?}", record.ping_number());
/// }
///
/// let report = running.shutdown().await?;
/// ```
pub struct IngestService<P: Publish> {
    config: IngestConfig,
    dispatcher: Arc<Dispatcher<P>>,
    bathy: TypedReceiver<Bth0, P>,
    image: TypedReceiver<Aid0, P>,
}

impl<P: Publish> IngestService<P> {
    /// Validate the configuration, bind both sockets and open capture streams.
    ///
    /// Must be called inside a tokio runtime.
    pub async fn bind(config: IngestConfig, publisher: P) -> Result<Self, ServiceError> {
        config.validate()?;

        let bathy_socket = bind_socket(&config, PacketKind::Bth0).await?;
        let image_socket = bind_socket(&config, PacketKind::Aid0).await?;

        let dispatcher = Arc::new(Dispatcher::new(
            publisher,
            config.topics.to_topics(),
            config.frame_ids(),
            config.retention(),
        ));

        let capture = |kind| {
            RawCapture::open(
                config.capture_dir(),
                &config.device_name(kind),
                config.capture.queue_depth,
            )
        };
        let bathy = TypedReceiver::new(
            bathy_socket,
            capture(PacketKind::Bth0),
            Arc::clone(&dispatcher),
        );
        let image = TypedReceiver::new(
            image_socket,
            capture(PacketKind::Aid0),
            Arc::clone(&dispatcher),
        );

        Ok(Self {
            config,
            dispatcher,
            bathy,
            image,
        })
    }

    /// Address the BTH0 receiver is bound to.
    pub fn bathy_addr(&self) -> io::Result<SocketAddr> {
        self.bathy.socket().local_addr()
    }

    /// Address the AID0 receiver is bound to.
    pub fn acoustic_image_addr(&self) -> io::Result<SocketAddr> {
        self.image.socket().local_addr()
    }

    /// The shared dispatcher.
    pub fn dispatcher(&self) -> &Arc<Dispatcher<P>> {
        &self.dispatcher
    }

    /// The configuration in use.
    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Spawn one task per receiver.
    pub fn start(self) -> RunningService<P> {
        let bathy_addr = self.bathy_addr().ok();
        let image_addr = self.acoustic_image_addr().ok();
        info!(
            sonar = %self.config.sonar_ip,
            ?bathy_addr,
            ?image_addr,
            capture = ?self.config.capture_dir(),
            "ingestion started"
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let tasks = vec![
            tokio::spawn(self.bathy.run(shutdown_rx.clone())),
            tokio::spawn(self.image.run(shutdown_rx)),
        ];

        RunningService {
            dispatcher: self.dispatcher,
            shutdown_tx,
            tasks,
            bathy_addr,
            image_addr,
        }
    }
}

async fn bind_socket(config: &IngestConfig, kind: PacketKind) -> Result<SonarSocket, ServiceError> {
    let addr = config.addr_for(kind);
    SonarSocketBuilder::new()
        .recv_buffer_size(config.recv_buffer_size)
        .bind(addr)
        .await
        .map_err(|source| ServiceError::Bind { kind, addr, source })
}

/// Handle to a running service.
///
/// Dropping the handle signals the receivers to stop without waiting for
/// capture streams to flush; call [`shutdown`](Self::shutdown) for that.
pub struct RunningService<P: Publish> {
    dispatcher: Arc<Dispatcher<P>>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<ReceiverReport>>,
    bathy_addr: Option<SocketAddr>,
    image_addr: Option<SocketAddr>,
}

impl<P: Publish> RunningService<P> {
    /// Address the BTH0 receiver is bound to.
    pub fn bathy_addr(&self) -> Option<SocketAddr> {
        self.bathy_addr
    }

    /// Address the AID0 receiver is bound to.
    pub fn acoustic_image_addr(&self) -> Option<SocketAddr> {
        self.image_addr
    }

    /// The shared dispatcher.
    pub fn dispatcher(&self) -> &Arc<Dispatcher<P>> {
        &self.dispatcher
    }

    /// Stop both receivers, flush capture streams and collect counters.
    pub async fn shutdown(mut self) -> Result<ServiceReport, ServiceError> {
        let _ = self.shutdown_tx.send(true);

        let mut receivers = Vec::with_capacity(self.tasks.len());
        for task in std::mem::take(&mut self.tasks) {
            receivers.push(task.await?);
        }

        let dispatch = self.dispatcher.stats();
        if dispatch.pending_images > 0 {
            warn!(pending = dispatch.pending_images, "incomplete acoustic images discarded");
        }
        info!(?dispatch, "ingestion stopped");
        Ok(ServiceReport {
            receivers,
            dispatch,
        })
    }
}

impl<P: Publish> Drop for RunningService<P> {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}
