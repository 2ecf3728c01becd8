//! Background capture writer.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::capture_path;
use crate::core::CaptureError;

#[derive(Debug, Default)]
struct Counters {
    frames_written: AtomicU64,
    bytes_written: AtomicU64,
    frames_dropped: AtomicU64,
    write_failures: AtomicU64,
}

/// Summary of a capture stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureReport {
    /// Device name of the stream.
    pub device: String,
    /// Capture file, if the stream was open.
    pub path: Option<PathBuf>,
    /// Frames written to the file.
    pub frames_written: u64,
    /// Bytes written to the file.
    pub bytes_written: u64,
    /// Frames dropped because the writer queue was full or closed.
    pub frames_dropped: u64,
    /// Failed writes or flushes.
    pub write_failures: u64,
}

/// Fire-and-forget append log for one device.
///
/// [`write`](Self::write) only queues the frame; a background task owns the
/// file. When the queue is full the frame is dropped and counted, so the
/// receive path never waits on storage.
///
/// Must be opened inside a tokio runtime.
#[derive(Debug)]
pub struct RawCapture {
    device: String,
    path: Option<PathBuf>,
    tx: Option<mpsc::Sender<Bytes>>,
    task: Option<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl RawCapture {
    /// Open a capture stream for `device_name` in `dir`.
    ///
    /// Never fails: when `dir` is `None` or the file cannot be opened the
    /// returned capture is disabled and the reason is logged.
    pub fn open(dir: Option<&Path>, device_name: &str, queue_depth: usize) -> Self {
        let Some(dir) = dir else {
            debug!(device = device_name, "raw capture disabled");
            return Self::disabled(device_name);
        };

        match open_file(dir, device_name) {
            Ok((file, path)) => {
                info!(device = device_name, path = %path.display(), "raw capture opened");
                Self::spawn(device_name, path, file, queue_depth)
            }
            Err(e) => {
                warn!(
                    device = device_name,
                    error = %e,
                    "raw capture unavailable, continuing without it"
                );
                Self::disabled(device_name)
            }
        }
    }

    /// A capture that discards everything.
    pub fn disabled(device_name: &str) -> Self {
        Self {
            device: device_name.to_string(),
            path: None,
            tx: None,
            task: None,
            counters: Arc::default(),
        }
    }

    fn spawn(device_name: &str, path: PathBuf, file: fs::File, queue_depth: usize) -> Self {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let counters = Arc::new(Counters::default());
        let task = tokio::spawn(drain(
            rx,
            tokio::fs::File::from_std(file),
            device_name.to_string(),
            Arc::clone(&counters),
        ));

        Self {
            device: device_name.to_string(),
            path: Some(path),
            tx: Some(tx),
            task: Some(task),
            counters,
        }
    }

    /// Queue a frame for appending. Never blocks and never fails.
    pub fn write(&self, frame: &Bytes) {
        let Some(tx) = &self.tx else {
            return;
        };

        match tx.try_send(frame.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                let dropped = self.counters.frames_dropped.fetch_add(1, Ordering::Relaxed);
                if dropped == 0 {
                    warn!(device = %self.device, "raw capture queue full, dropping frames");
                } else {
                    debug!(
                        device = %self.device,
                        dropped = dropped + 1,
                        "raw capture frame dropped"
                    );
                }
            }
            Err(TrySendError::Closed(_)) => {
                self.counters.frames_dropped.fetch_add(1, Ordering::Relaxed);
                debug!(device = %self.device, "raw capture writer gone, frame dropped");
            }
        }
    }

    /// Check if frames are being recorded.
    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Device name of the stream.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Capture file, if open.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Counters so far.
    pub fn report(&self) -> CaptureReport {
        CaptureReport {
            device: self.device.clone(),
            path: self.path.clone(),
            frames_written: self.counters.frames_written.load(Ordering::Relaxed),
            bytes_written: self.counters.bytes_written.load(Ordering::Relaxed),
            frames_dropped: self.counters.frames_dropped.load(Ordering::Relaxed),
            write_failures: self.counters.write_failures.load(Ordering::Relaxed),
        }
    }

    /// Write out queued frames, flush and close the file.
    pub async fn close(mut self) -> CaptureReport {
        self.tx.take();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(device = %self.device, error = %e, "raw capture writer task failed");
            }
        }
        self.report()
    }
}

fn open_file(dir: &Path, device_name: &str) -> Result<(fs::File, PathBuf), CaptureError> {
    fs::create_dir_all(dir).map_err(|source| CaptureError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let path = capture_path(dir, device_name);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|source| CaptureError::Open {
            path: path.clone(),
            source,
        })?;
    Ok((file, path))
}

async fn drain(
    mut rx: mpsc::Receiver<Bytes>,
    file: tokio::fs::File,
    device: String,
    counters: Arc<Counters>,
) {
    let mut out = BufWriter::new(file);

    while let Some(frame) = rx.recv().await {
        match out.write_all(&frame).await {
            Ok(()) => {
                counters.frames_written.fetch_add(1, Ordering::Relaxed);
                counters
                    .bytes_written
                    .fetch_add(frame.len() as u64, Ordering::Relaxed);
            }
            Err(e) => {
                let failures = counters.write_failures.fetch_add(1, Ordering::Relaxed);
                if failures == 0 {
                    warn!(%device, error = %CaptureError::from(e), "raw capture write failed");
                }
            }
        }
    }

    if let Err(e) = out.flush().await {
        counters.write_failures.fetch_add(1, Ordering::Relaxed);
        warn!(%device, error = %CaptureError::from(e), "raw capture flush failed");
    }
    if let Err(e) = out.into_inner().sync_all().await {
        debug!(%device, error = %e, "raw capture sync failed");
    }
    debug!(%device, "raw capture closed");
}
