//! Ping-indexed reassembly of multi-packet records.
//!
//! - [`RetentionWindow`]: key-driven staleness, derived from the newest ping seen
//! - [`ReassemblyCache`]: entry lifecycle `Absent → Accumulating → {Published | Evicted}`
//!
//! The cache is a plain single-threaded structure. Callers that share it
//! across receivers wrap it in one lock and keep merge, publish and eviction
//! inside the same critical section.

mod cache;
mod window;

pub use cache::{CacheStats, MergeOutcome, ReassemblyCache};
pub use window::{Observation, RetentionWindow};
