//! Per-occurrence availability cursors.
//!
//! Every window occurrence starts fully available. Placing a FRONT-anchored
//! item advances its front; placing a BACK-anchored item pulls its back in.
//! Bounds only ever narrow.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{ResolvedWindow, WindowKey};

/// Remaining `[front, back)` range of a window occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AvailabilityBounds {
    pub front: DateTime<Utc>,
    pub back: DateTime<Utc>,
}

/// Run-scoped availability for every window occurrence touched so far.
#[derive(Debug, Default)]
pub struct AvailabilityMap {
    bounds: HashMap<WindowKey, AvailabilityBounds>,
}

impl AvailabilityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current bounds of `window`; untouched windows are fully available.
    pub fn bounds(&self, window: &ResolvedWindow) -> AvailabilityBounds {
        self.bounds
            .get(&window.key)
            .copied()
            .unwrap_or(AvailabilityBounds { front: window.start, back: window.end })
    }

    /// Move the front to `to` if that narrows the range.
    pub fn advance_front(&mut self, window: &ResolvedWindow, to: DateTime<Utc>) {
        let mut current = self.bounds(window);
        if to > current.front {
            current.front = to.min(current.back.max(current.front));
            self.bounds.insert(window.key.clone(), current);
        }
    }

    /// Move the back to `to` if that narrows the range.
    pub fn retreat_back(&mut self, window: &ResolvedWindow, to: DateTime<Utc>) {
        let mut current = self.bounds(window);
        if to < current.back {
            current.back = to.max(current.front);
            self.bounds.insert(window.key.clone(), current);
        }
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }
}
