//! Reassembly cache keyed by ping number.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use super::window::{Observation, RetentionWindow};
use crate::core::{Accumulate, DEFAULT_RESTART_GAP, DEFAULT_RETENTION_WINDOW, PingKey};

/// Result of merging one fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome<A> {
    /// First fragment of a ping; a new entry is accumulating.
    Started,
    /// Merged into an accumulating entry, still incomplete.
    Merged,
    /// The entry became complete and was removed. The caller publishes it.
    Complete(A),
    /// The ping was already published; fragment dropped.
    Duplicate,
    /// The ping is outside the retention window, or too far from it to trust
    /// without confirmation; fragment dropped.
    Stale,
}

/// Lifetime counters of a cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries created.
    pub started: u64,
    /// Fragments merged into existing entries.
    pub merged: u64,
    /// Entries completed.
    pub completed: u64,
    /// Fragments for already published pings.
    pub duplicates: u64,
    /// Fragments outside the window.
    pub stale: u64,
    /// Entries evicted without completing.
    pub evicted: u64,
    /// Sonar restarts detected.
    pub restarts: u64,
}

/// Partially built records keyed by ping number.
///
/// At most one entry exists per ping. Memory is bounded by eviction: after
/// every fragment, entries more than the window width behind the newest ping
/// are dropped, so at most `width + 1` pings accumulate at once.
///
/// Published pings are remembered while they are inside the window so that a
/// late duplicate cannot resurrect them. Evicted pings need no marker: they
/// are stale by construction and any late fragment is dropped as such.
///
/// On a sonar restart the markers of the previous numbering are retired, not
/// forgotten. They keep rejecting duplicates until the new numbering comes
/// within the restart gap of them.
#[derive(Debug)]
pub struct ReassemblyCache<A: Accumulate> {
    entries: BTreeMap<PingKey, A>,
    published: BTreeSet<PingKey>,
    retired: BTreeSet<PingKey>,
    window: RetentionWindow,
    stats: CacheStats,
}

impl<A: Accumulate> ReassemblyCache<A> {
    /// Create a cache retaining `width` pings.
    pub fn new(width: u32) -> Self {
        Self::with_window(RetentionWindow::new(width, DEFAULT_RESTART_GAP))
    }

    /// Create a cache with an explicit window.
    pub fn with_window(window: RetentionWindow) -> Self {
        Self {
            entries: BTreeMap::new(),
            published: BTreeSet::new(),
            retired: BTreeSet::new(),
            window,
            stats: CacheStats::default(),
        }
    }

    /// Merge a fragment into the entry for `key`.
    pub fn merge(&mut self, key: PingKey, fragment: &A::Fragment) -> MergeOutcome<A> {
        if self.was_published(key) {
            self.stats.duplicates += 1;
            debug!(ping = key, "fragment for published ping, dropped");
            return MergeOutcome::Duplicate;
        }

        match self.window.observe(key) {
            Observation::Fresh => {}
            Observation::Stale => {
                self.stats.stale += 1;
                debug!(
                    ping = key,
                    newest = self.window.newest(),
                    "fragment outside retention window, dropped"
                );
                return MergeOutcome::Stale;
            }
            Observation::Unconfirmed => {
                self.stats.stale += 1;
                debug!(
                    ping = key,
                    newest = self.window.newest(),
                    "ping number far from window, held as restart candidate"
                );
                return MergeOutcome::Stale;
            }
            Observation::Restart => self.restart(),
        }

        let (complete, started) = match self.entries.entry(key) {
            Entry::Vacant(slot) => {
                self.stats.started += 1;
                (slot.insert(A::seed(fragment)).merge(fragment), true)
            }
            Entry::Occupied(slot) => {
                self.stats.merged += 1;
                (slot.into_mut().merge(fragment), false)
            }
        };

        if !complete {
            return if started {
                MergeOutcome::Started
            } else {
                MergeOutcome::Merged
            };
        }

        self.published.insert(key);
        self.stats.completed += 1;
        match self.entries.remove(&key) {
            Some(record) => MergeOutcome::Complete(record),
            None => MergeOutcome::Merged,
        }
    }

    /// Switch to the window's new numbering.
    ///
    /// Accumulating entries belong to the old numbering and are evicted.
    /// Markers near the new window stay live; the rest are retired.
    fn restart(&mut self) {
        self.stats.restarts += 1;
        self.stats.evicted += self.entries.len() as u64;
        info!(
            newest = self.window.newest(),
            dropped = self.entries.len(),
            "ping numbering changed, assuming sonar restart"
        );
        self.entries.clear();

        let markers = std::mem::take(&mut self.published)
            .into_iter()
            .chain(std::mem::take(&mut self.retired));
        for key in markers {
            if self.window.is_far(key) {
                self.retired.insert(key);
            } else if !self.window.is_stale(key) {
                self.published.insert(key);
            }
        }
    }

    /// Drop every entry outside the window ending at `latest`.
    ///
    /// Returns the evicted ping numbers in ascending order.
    pub fn evict_stale(&mut self, latest: PingKey) -> Vec<PingKey> {
        self.window.advance_to(latest);
        let window = &self.window;

        let mut evicted = Vec::new();
        self.entries.retain(|&key, _| {
            let stale = window.is_stale(key);
            if stale {
                evicted.push(key);
            }
            !stale
        });
        self.published.retain(|&key| !window.is_stale(key));
        self.retired.retain(|&key| window.is_far(key));

        if !evicted.is_empty() {
            self.stats.evicted += evicted.len() as u64;
            debug!(
                ?evicted,
                newest = window.newest(),
                "evicted incomplete pings"
            );
        }
        evicted
    }

    /// Number of accumulating entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is accumulating.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check if `key` is accumulating.
    pub fn contains(&self, key: PingKey) -> bool {
        self.entries.contains_key(&key)
    }

    /// Accumulating entry for `key`.
    pub fn get(&self, key: PingKey) -> Option<&A> {
        self.entries.get(&key)
    }

    /// Accumulating ping numbers, ascending.
    pub fn keys(&self) -> impl Iterator<Item = PingKey> + '_ {
        self.entries.keys().copied()
    }

    /// Check if `key` was published and is still remembered.
    pub fn was_published(&self, key: PingKey) -> bool {
        self.published.contains(&key) || self.retired.contains(&key)
    }

    /// The retention window.
    pub fn window(&self) -> &RetentionWindow {
        &self.window
    }

    /// Lifetime counters.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

impl<A: Accumulate> Default for ReassemblyCache<A> {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;

    /// Fragment: (part index, part total, payload).
    type Part = (usize, usize, u32);

    /// Collects payloads by part index; complete when every slot is filled.
    #[derive(Debug, Clone, PartialEq)]
    struct Slots(Vec<Option<u32>>);

    impl Accumulate for Slots {
        type Fragment = Part;

        fn seed(fragment: &Part) -> Self {
            Slots(vec![None; fragment.1])
        }

        fn merge(&mut self, &(index, _, payload): &Part) -> bool {
            if let Some(slot) = self.0.get_mut(index) {
                *slot = Some(payload);
            }
            self.0.iter().all(Option::is_some)
        }
    }

    /// Merge then evict, as the dispatcher does for every fragment.
    fn deliver(
        cache: &mut ReassemblyCache<Slots>,
        key: PingKey,
        part: Part,
    ) -> MergeOutcome<Slots> {
        let outcome = cache.merge(key, &part);
        cache.evict_stale(key);
        outcome
    }

    #[test]
    fn test_two_fragments_publish_once() {
        let mut cache = ReassemblyCache::new(10);

        assert_eq!(deliver(&mut cache, 100, (0, 2, 7)), MergeOutcome::Started);
        assert!(cache.contains(100));

        let outcome = deliver(&mut cache, 100, (1, 2, 8));
        assert_eq!(outcome, MergeOutcome::Complete(Slots(vec![Some(7), Some(8)])));
        assert!(!cache.contains(100));
        assert!(cache.is_empty());
        assert!(cache.was_published(100));
        assert_eq!(cache.stats().completed, 1);
    }

    #[test]
    fn test_incomplete_ping_evicted() {
        let mut cache = ReassemblyCache::new(10);
        assert_eq!(deliver(&mut cache, 5, (0, 2, 1)), MergeOutcome::Started);

        let mut completed = Vec::new();
        for key in 6..=20 {
            for part in 0..2 {
                if let MergeOutcome::Complete(_) = deliver(&mut cache, key, (part, 2, key)) {
                    completed.push(key);
                }
            }
        }

        assert!(!cache.contains(5));
        assert!(!completed.contains(&5));
        assert_eq!(completed, (6..=20).collect::<Vec<_>>());
        assert_eq!(cache.stats().evicted, 1);
        assert_eq!(cache.stats().completed, 15);
    }

    #[test]
    fn test_eviction_boundary() {
        let mut cache = ReassemblyCache::new(10);
        for key in [1, 5, 9, 10] {
            deliver(&mut cache, key, (0, 2, 0));
        }
        // newest 19: 19 - 9 = 10 is kept, 5 and 1 go
        deliver(&mut cache, 19, (0, 2, 0));
        assert_eq!(cache.keys().collect::<Vec<_>>(), vec![9, 10, 19]);

        let evicted = cache.evict_stale(21);
        assert_eq!(evicted, vec![9, 10]);
        assert_eq!(cache.keys().collect::<Vec<_>>(), vec![19]);
    }

    #[test]
    fn test_evict_visits_every_entry() {
        let mut cache: ReassemblyCache<Slots> = ReassemblyCache::new(3);
        for key in 0..50 {
            cache.merge(key, &(0, 2, 0));
        }
        let evicted = cache.evict_stale(49);
        assert_eq!(evicted, (0..46).collect::<Vec<_>>());
        assert_eq!(cache.keys().collect::<Vec<_>>(), vec![46, 47, 48, 49]);
    }

    #[test]
    fn test_duplicate_after_publish() {
        let mut cache = ReassemblyCache::new(10);
        deliver(&mut cache, 100, (0, 1, 1));
        assert!(cache.was_published(100));

        assert_eq!(deliver(&mut cache, 100, (0, 1, 1)), MergeOutcome::Duplicate);
        assert!(!cache.contains(100));
        assert_eq!(cache.stats().duplicates, 1);
        assert_eq!(cache.stats().completed, 1);
    }

    #[test]
    fn test_late_fragment_after_eviction() {
        let mut cache = ReassemblyCache::new(10);
        deliver(&mut cache, 5, (0, 2, 1));
        deliver(&mut cache, 20, (0, 2, 1));
        assert!(!cache.contains(5));

        // The missing half of ping 5 arrives late
        assert_eq!(deliver(&mut cache, 5, (1, 2, 2)), MergeOutcome::Stale);
        assert!(!cache.contains(5));
        assert_eq!(cache.stats().stale, 1);
    }

    #[test]
    fn test_published_marker_expires_with_window() {
        let mut cache = ReassemblyCache::new(10);
        deliver(&mut cache, 100, (0, 1, 1));
        deliver(&mut cache, 111, (0, 2, 1));
        assert!(!cache.was_published(100));

        // Still not resurrected: now stale instead of duplicate
        assert_eq!(deliver(&mut cache, 100, (0, 1, 1)), MergeOutcome::Stale);
        assert!(cache.get(100).is_none());
    }

    #[test]
    fn test_older_key_inside_window_merges() {
        let mut cache = ReassemblyCache::new(10);
        deliver(&mut cache, 50, (0, 2, 0));
        assert_eq!(deliver(&mut cache, 42, (0, 2, 0)), MergeOutcome::Started);
        assert_eq!(cache.keys().collect::<Vec<_>>(), vec![42, 50]);
        assert!(matches!(
            deliver(&mut cache, 42, (1, 2, 0)),
            MergeOutcome::Complete(_)
        ));
    }

    #[test]
    fn test_startup_keys_not_evicted() {
        let mut cache = ReassemblyCache::new(10);
        for key in 0..=10 {
            deliver(&mut cache, key, (0, 2, 0));
        }
        assert_eq!(cache.len(), 11);
        deliver(&mut cache, 11, (0, 2, 0));
        assert!(!cache.contains(0));
        assert_eq!(cache.len(), 11);
    }

    #[test]
    fn test_stray_far_fragment_keeps_state() {
        let mut cache = ReassemblyCache::new(10);
        assert_eq!(deliver(&mut cache, 4999, (0, 2, 1)), MergeOutcome::Started);
        assert!(matches!(
            deliver(&mut cache, 5000, (0, 1, 9)),
            MergeOutcome::Complete(_)
        ));

        assert_eq!(deliver(&mut cache, 1, (0, 2, 0)), MergeOutcome::Stale);
        assert!(cache.contains(4999));
        assert!(!cache.contains(1));
        assert_eq!(cache.window().newest(), Some(5000));

        assert_eq!(deliver(&mut cache, 5000, (0, 1, 9)), MergeOutcome::Duplicate);
        assert!(matches!(
            deliver(&mut cache, 4999, (1, 2, 2)),
            MergeOutcome::Complete(_)
        ));
        let stats = cache.stats();
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.restarts, 0);
    }

    #[test]
    fn test_confirmed_restart_switches_numbering() {
        let mut cache = ReassemblyCache::with_window(RetentionWindow::new(10, 100));
        deliver(&mut cache, 5000, (0, 2, 0));
        deliver(&mut cache, 5001, (0, 1, 0));
        assert!(cache.was_published(5001));

        // First fragment of the new numbering is only a candidate
        assert_eq!(deliver(&mut cache, 1, (0, 2, 0)), MergeOutcome::Stale);
        assert!(cache.contains(5000));

        assert_eq!(deliver(&mut cache, 2, (0, 2, 0)), MergeOutcome::Started);
        assert_eq!(cache.keys().collect::<Vec<_>>(), vec![2]);
        assert_eq!(cache.window().newest(), Some(2));
        let stats = cache.stats();
        assert_eq!(stats.restarts, 1);
        assert_eq!(stats.evicted, 1);

        // Ping 1 is inside the new window now
        assert_eq!(deliver(&mut cache, 1, (0, 2, 0)), MergeOutcome::Started);
        assert_eq!(cache.keys().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_restart_never_republishes_old_pings() {
        let mut cache = ReassemblyCache::with_window(RetentionWindow::new(10, 100));
        deliver(&mut cache, 5000, (0, 1, 0));
        deliver(&mut cache, 1, (0, 1, 0));
        deliver(&mut cache, 2, (0, 1, 0));
        assert_eq!(cache.stats().restarts, 1);

        // Late duplicate from before the restart
        assert_eq!(deliver(&mut cache, 5000, (0, 1, 0)), MergeOutcome::Duplicate);
        assert_eq!(cache.window().newest(), Some(2));

        // Two late fragments of the old numbering switch back, still no repeat
        assert_eq!(deliver(&mut cache, 4998, (0, 2, 0)), MergeOutcome::Stale);
        assert_eq!(deliver(&mut cache, 4999, (0, 2, 0)), MergeOutcome::Started);
        assert_eq!(cache.stats().restarts, 2);
        assert_eq!(deliver(&mut cache, 5000, (0, 1, 0)), MergeOutcome::Duplicate);
        assert_eq!(deliver(&mut cache, 2, (0, 1, 0)), MergeOutcome::Duplicate);
        assert_eq!(cache.stats().completed, 2);
    }

    #[test]
    fn test_retired_markers_expire() {
        let mut cache = ReassemblyCache::with_window(RetentionWindow::new(10, 100));
        deliver(&mut cache, 5000, (0, 1, 0));
        deliver(&mut cache, 1, (0, 1, 0));
        deliver(&mut cache, 2, (0, 1, 0));
        assert!(cache.was_published(5000));

        // The new numbering climbs toward the old one, within the gap
        for key in (2..=4950).step_by(10) {
            deliver(&mut cache, key, (0, 2, 0));
        }
        assert!(!cache.was_published(5000));
        assert!(!cache.was_published(2));
    }

    #[test]
    fn test_shuffled_delivery_publishes_each_ping_once() {
        let parts = 4;
        let mut fragments: Vec<(PingKey, Part)> = (0..30)
            .flat_map(|key| (0..parts).map(move |p| (key, (p, parts, key * 10 + p as u32))))
            .collect();
        // Duplicate a third of the fragments
        let dupes: Vec<_> = fragments.iter().step_by(3).cloned().collect();
        fragments.extend(dupes);

        for seed in 0..20 {
            let mut order = fragments.clone();
            order.shuffle(&mut StdRng::seed_from_u64(seed));

            let mut cache = ReassemblyCache::new(1000);
            let mut published = Vec::new();
            for (key, part) in &order {
                if let MergeOutcome::Complete(record) = deliver(&mut cache, *key, *part) {
                    let expected: Vec<_> =
                        (0..parts).map(|p| Some(key * 10 + p as u32)).collect();
                    assert_eq!(record, Slots(expected));
                    published.push(*key);
                }
            }

            published.sort_unstable();
            assert_eq!(published, (0..30).collect::<Vec<_>>(), "seed {seed}");
            assert!(cache.is_empty());
        }
    }

    #[test]
    fn test_shuffled_delivery_with_small_window() {
        let mut fragments: Vec<(PingKey, Part)> = (0..200)
            .flat_map(|key| (0..3).map(move |p| (key, (p, 3, key))))
            .collect();
        fragments.shuffle(&mut StdRng::seed_from_u64(7));

        let mut cache = ReassemblyCache::new(10);
        let mut published = BTreeSet::new();
        for (key, part) in &fragments {
            if let MergeOutcome::Complete(_) = deliver(&mut cache, *key, *part) {
                assert!(published.insert(*key), "ping {key} published twice");
            }
            let newest = cache.window().newest().unwrap_or_default();
            assert!(cache.keys().all(|k| newest - k <= 10));
            assert!(cache.len() <= 11);
        }
        let stats = cache.stats();
        assert_eq!(stats.completed as usize, published.len());
    }
}
