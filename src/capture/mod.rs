//! Raw capture side channel.
//!
//! Every non-empty datagram is appended to a per-device log before it is
//! decoded, so a session can be replayed offline even when parsing fails.
//! Packets carry their own size, so a log needs no extra framing.

mod reader;
#[cfg(feature = "transport")]
mod writer;

pub use reader::CaptureReader;
#[cfg(feature = "transport")]
pub use writer::{CaptureReport, RawCapture};

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Capture file path for a device in `dir`: `<device>_<unix-seconds>.bin`.
pub fn capture_path(dir: &Path, device_name: &str) -> PathBuf {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    dir.join(format!("{device_name}_{secs}.bin"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_path_naming() {
        let path = capture_path(Path::new("/tmp/logs"), "r2sonic_bth0");
        assert_eq!(path.parent(), Some(Path::new("/tmp/logs")));

        let name = path.file_name().unwrap().to_str().unwrap();
        let secs = name
            .strip_prefix("r2sonic_bth0_")
            .and_then(|rest| rest.strip_suffix(".bin"))
            .unwrap();
        assert!(secs.parse::<u64>().unwrap() > 1_600_000_000);
    }
}
