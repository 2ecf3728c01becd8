//! Retention window over ping numbers.
//!
//! Staleness is measured in pings, not wall-clock time, so eviction is
//! deterministic and replays identically from captured logs.

use crate::core::{DEFAULT_RESTART_GAP, DEFAULT_RETENTION_WINDOW, PingKey};

/// Classification of an arriving ping number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// Inside the window (or newer than anything seen).
    Fresh,
    /// Older than the window allows.
    Stale,
    /// More than the restart gap away from the newest ping, with nothing yet
    /// backing it up. Held as a restart candidate and treated as stale.
    Unconfirmed,
    /// A second far ping landed within the window of the held candidate: the
    /// sonar restarted or its counter wrapped. The window now follows the new
    /// numbering.
    Restart,
}

/// Tracks the newest ping number and decides which pings are stale.
///
/// A ping `k` is stale when `newest - k > width`. The difference saturates,
/// so ping numbers at or ahead of `newest` are never stale, and during
/// startup (`newest < width`) nothing is.
///
/// A ping more than `restart_gap` away from `newest`, in either direction,
/// never moves the window on its own. It takes two distinct far pings within
/// `width` of each other to switch numbering, so one stray or late datagram
/// cannot reset the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionWindow {
    width: u32,
    restart_gap: u32,
    newest: Option<PingKey>,
    candidate: Option<PingKey>,
}

impl RetentionWindow {
    /// Create a window of `width` pings.
    pub fn new(width: u32, restart_gap: u32) -> Self {
        Self {
            width,
            restart_gap,
            newest: None,
            candidate: None,
        }
    }

    /// Window width, in pings.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Backwards jump treated as a sonar restart.
    pub fn restart_gap(&self) -> u32 {
        self.restart_gap
    }

    /// Newest ping number observed.
    pub fn newest(&self) -> Option<PingKey> {
        self.newest
    }

    /// Pending restart candidate, if any.
    pub fn candidate(&self) -> Option<PingKey> {
        self.candidate
    }

    /// Check if `key` is more than the restart gap away from the newest ping.
    pub fn is_far(&self, key: PingKey) -> bool {
        self.newest
            .is_some_and(|newest| newest.abs_diff(key) > self.restart_gap)
    }

    /// Classify an arriving ping number and advance the window.
    pub fn observe(&mut self, key: PingKey) -> Observation {
        let Some(newest) = self.newest else {
            self.newest = Some(key);
            return Observation::Fresh;
        };

        if self.is_far(key) {
            return match self.candidate {
                Some(candidate) if candidate != key && candidate.abs_diff(key) <= self.width => {
                    self.newest = Some(candidate.max(key));
                    self.candidate = None;
                    Observation::Restart
                }
                _ => {
                    self.candidate = Some(key);
                    Observation::Unconfirmed
                }
            };
        }

        if key > newest {
            self.newest = Some(key);
            Observation::Fresh
        } else if newest - key > self.width {
            Observation::Stale
        } else {
            Observation::Fresh
        }
    }

    /// Raise the newest ping number without classifying.
    ///
    /// Jumps beyond the restart gap are ignored; only [`observe`](Self::observe)
    /// can switch numbering.
    pub fn advance_to(&mut self, key: PingKey) {
        match self.newest {
            None => self.newest = Some(key),
            Some(newest) if key > newest && key - newest <= self.restart_gap => {
                self.newest = Some(key);
            }
            Some(_) => {}
        }
    }

    /// Check if `key` falls outside the window.
    pub fn is_stale(&self, key: PingKey) -> bool {
        self.newest
            .is_some_and(|newest| newest.saturating_sub(key) > self.width)
    }

    /// Forget the newest ping number and any restart candidate.
    pub fn reset(&mut self) {
        self.newest = None;
        self.candidate = None;
    }
}

impl Default for RetentionWindow {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION_WINDOW, DEFAULT_RESTART_GAP)
    }
}
