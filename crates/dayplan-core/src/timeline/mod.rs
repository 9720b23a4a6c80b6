//! Timeline bookkeeping for a scheduling run.
//!
//! This module provides:
//! - Occupied-block tracking with first-fit and last-fit gap search
//! - The timeline entries a run reports back to its caller

mod entry;
mod occupied;

pub use entry::{sort_timeline, Decision, HabitEntry, PlacementContext, ProjectEntry, TimelineEntry};
pub use occupied::{OccupiedBlock, OccupiedBlocks};
