//! Mining statistics: a sliding window of per-second hash-rate samples plus
//! a running found-blocks counter.
//!
//! Ticked once per second by a background timer; the miner increments
//! `last_hashes` on every nonce attempt between ticks.

use std::collections::VecDeque;

use crate::constants::STATS_WINDOW_SECS;

/// Rolling hash-rate tracker.
#[derive(Debug, Default)]
pub struct Stats {
    /// Hash attempts counted since the last tick.
    last_hashes: u64,
    /// Per-second hash-rate samples, oldest first, capped at
    /// [`STATS_WINDOW_SECS`].
    samples: VecDeque<u64>,
    /// Total blocks successfully mined by this node.
    found_blocks: u64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called by the miner on every nonce attempt.
    pub fn record_hash(&mut self) {
        self.last_hashes += 1;
    }

    /// Called once per second by the stats ticker: push the current
    /// attempt count as a sample and reset the counter.
    pub fn tick(&mut self) {
        if self.samples.len() == STATS_WINDOW_SECS {
            self.samples.pop_front();
        }
        self.samples.push_back(self.last_hashes);
        self.last_hashes = 0;
    }

    /// Mark that this node successfully mined a block.
    pub fn record_found_block(&mut self) {
        self.found_blocks += 1;
    }

    /// Fold a locally-accumulated `Stats` into this one: used when a
    /// miner thread owns a private `Stats` for the duration of one mining
    /// session (so the hot hashing loop never touches a shared lock) and
    /// publishes its counts here once the session ends.
    pub fn absorb(&mut self, other: &Stats) {
        self.last_hashes += other.last_hashes;
        for _ in 0..other.found_blocks {
            self.record_found_block();
        }
    }

    /// Running average hashes/second over the current window.
    pub fn average_hash_rate(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let total: u64 = self.samples.iter().sum();
        total as f64 / self.samples.len() as f64
    }

    /// Most recent per-second sample, if any tick has occurred yet.
    pub fn current_hash_rate(&self) -> Option<u64> {
        self.samples.back().copied()
    }

    pub fn found_blocks(&self) -> u64 {
        self.found_blocks
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_stats_has_no_samples() {
        let stats = Stats::new();
        assert_eq!(stats.sample_count(), 0);
        assert_eq!(stats.average_hash_rate(), 0.0);
        assert!(stats.current_hash_rate().is_none());
    }

    #[test]
    fn record_hash_accumulates_until_tick() {
        let mut stats = Stats::new();
        stats.record_hash();
        stats.record_hash();
        stats.record_hash();
        stats.tick();
        assert_eq!(stats.current_hash_rate(), Some(3));
    }

    #[test]
    fn tick_resets_the_counter() {
        let mut stats = Stats::new();
        stats.record_hash();
        stats.tick();
        stats.tick();
        assert_eq!(stats.current_hash_rate(), Some(0));
    }

    #[test]
    fn average_hash_rate_over_multiple_samples() {
        let mut stats = Stats::new();
        for _ in 0..10 {
            stats.record_hash();
        }
        stats.tick();
        for _ in 0..20 {
            stats.record_hash();
        }
        stats.tick();
        assert_eq!(stats.average_hash_rate(), 15.0);
    }

    #[test]
    fn window_caps_at_max_samples() {
        let mut stats = Stats::new();
        for _ in 0..(STATS_WINDOW_SECS + 10) {
            stats.tick();
        }
        assert_eq!(stats.sample_count(), STATS_WINDOW_SECS);
    }

    #[test]
    fn absorb_merges_pending_hashes_and_found_blocks() {
        let mut shared = Stats::new();
        let mut local = Stats::new();
        local.record_hash();
        local.record_hash();
        local.record_found_block();

        shared.absorb(&local);
        shared.tick();

        assert_eq!(shared.current_hash_rate(), Some(2));
        assert_eq!(shared.found_blocks(), 1);
    }

    #[test]
    fn found_blocks_counter_increments() {
        let mut stats = Stats::new();
        assert_eq!(stats.found_blocks(), 0);
        stats.record_found_block();
        stats.record_found_block();
        assert_eq!(stats.found_blocks(), 2);
    }
}
