//! Occupied time blocks.
//!
//! Tracks time already consumed by exclusive placements as a sorted list
//! of merged, non-overlapping half-open intervals, and finds gaps in it.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// A consumed `[start, end)` interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OccupiedBlock {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl OccupiedBlock {
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && self.end > start
    }
}

/// Sorted, merged set of occupied blocks.
#[derive(Debug, Clone, Default)]
pub struct OccupiedBlocks {
    blocks: Vec<OccupiedBlock>,
}

impl OccupiedBlocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blocks(&self) -> &[OccupiedBlock] {
        &self.blocks
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Add `[start, end)`, merging with any block it touches or overlaps.
    /// Empty and inverted intervals are ignored.
    pub fn insert(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) {
        if end <= start {
            return;
        }
        let mut merged = OccupiedBlock { start, end };

        // First block whose end reaches the new start.
        let first = self.blocks.partition_point(|b| b.end < merged.start);
        let mut last = first;
        while last < self.blocks.len() && self.blocks[last].start <= merged.end {
            merged.start = merged.start.min(self.blocks[last].start);
            merged.end = merged.end.max(self.blocks[last].end);
            last += 1;
        }
        self.blocks.splice(first..last, std::iter::once(merged));
    }

    /// True when `[start, end)` intersects any block.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        let idx = self.blocks.partition_point(|b| b.end <= start);
        self.blocks
            .get(idx)
            .map(|b| b.overlaps(start, end))
            .unwrap_or(false)
    }

    /// Earliest start `s >= from` such that `[s, s + duration)` fits before
    /// `until` without touching a block.
    pub fn first_fit(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
        duration: Duration,
    ) -> Option<DateTime<Utc>> {
        let mut candidate = from;
        for block in &self.blocks {
            if block.end <= candidate {
                continue;
            }
            if candidate + duration <= block.start {
                break;
            }
            candidate = candidate.max(block.end);
        }
        (candidate + duration <= until).then_some(candidate)
    }

    /// Latest start `s <= latest` with `s >= from` such that
    /// `[s, s + duration)` does not touch a block.
    pub fn last_fit(
        &self,
        from: DateTime<Utc>,
        latest: DateTime<Utc>,
        duration: Duration,
    ) -> Option<DateTime<Utc>> {
        let mut candidate = latest;
        for block in self.blocks.iter().rev() {
            if block.start >= candidate + duration {
                continue;
            }
            if block.end <= candidate {
                break;
            }
            candidate = candidate.min(block.start - duration);
        }
        (candidate >= from).then_some(candidate)
    }
}
