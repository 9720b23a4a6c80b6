//! # Dayplan Core Library
//!
//! This library provides the scheduling engine behind the `dayplan` CLI.
//! It places recurring habits and backlog project work into bounded daily
//! time windows, reconciling each run against the placements already in
//! the store.
//!
//! ## Architecture
//!
//! - **Recurrence**: Pure due-ness checks for habits, calendar- or
//!   completion-anchored
//! - **Windows**: Per-date window resolution, availability cursors and
//!   occupied-time tracking
//! - **Scheduler**: The multi-phase pipeline (queue, dedupe, habit and
//!   project passes, persistence)
//! - **Storage**: SQLite and in-memory stores behind one trait, plus
//!   TOML-based configuration
//!
//! ## Key Components
//!
//! - [`schedule_backlog`]: Runs one scheduling pass for a user
//! - [`ScheduleStore`]: Read/write contract the scheduler runs against
//! - [`ScheduleDb`]: SQLite-backed store
//! - [`Config`]: Application configuration management

pub mod energy;
pub mod error;
pub mod recurrence;
pub mod schedule;
pub mod scheduler;
pub mod storage;
pub mod sunlight;
pub mod timeline;
pub mod timezone;
pub mod weight;
pub mod windows;

pub use energy::EnergyLevel;
pub use error::{ConfigError, CoreError, StoreError, ValidationError};
pub use recurrence::{evaluate_due, is_due, DueEvaluation, DueReason, Recurrence};
pub use schedule::{
    DaylightPreference, Habit, HabitType, InstanceStatus, Project, ScheduleInstance, SourceType, Task,
    Window, WindowEdgePreference,
};
pub use scheduler::{
    schedule_backlog, FailureReason, ProgressEvent, ProgressSink, RunError, ScheduleBacklogResult,
    ScheduleFailure, ScheduleOptions, SchedulerMode,
};
pub use storage::{Config, Dataset, MemoryStore, ScheduleDb, ScheduleStore};
pub use sunlight::Coordinates;
pub use timeline::{Decision, TimelineEntry};
pub use windows::{resolve_windows_for_date, windows_for_date, ResolvedWindow};
