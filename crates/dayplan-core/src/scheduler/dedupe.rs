//! Reconciliation against instances already in the store.
//!
//! Runs before any placement so that at most one active instance per
//! project survives in the dedupe range and habit placements can be
//! re-derived from scratch.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::schedule::{InstanceStatus, ScheduleInstance, SourceType};
use crate::storage::ScheduleStore;

/// Minimum forward range scanned for duplicates, in days.
pub const MIN_DEDUPE_DAYS: i64 = 28;

/// A cancel that failed during reconciliation.
#[derive(Debug, Clone)]
pub struct DedupeFailure {
    pub source_id: String,
    pub error: StoreError,
}

/// What reconciliation left behind.
#[derive(Debug, Default)]
pub struct DedupeOutcome {
    /// Scheduled project rows left in place for projects not queued this run.
    pub keepers: Vec<ScheduleInstance>,
    /// Earliest scheduled row per queued project, recycled by the placement write.
    pub reusable: HashMap<String, ScheduleInstance>,
    /// Active rows this run does not re-derive (completed or missed);
    /// new exclusive placements must steer around them.
    pub blocking: Vec<ScheduleInstance>,
    pub canceled_project_instances: usize,
    pub canceled_habit_instances: usize,
    /// Habits that had scheduled rows before this run.
    pub previously_scheduled_habits: BTreeSet<String>,
    pub failures: Vec<DedupeFailure>,
}

/// Collapse duplicate project placements and clear habit placements in
/// `[start, end)`.
///
/// # Arguments
/// * `queued` - Queued project ids, each with the missed instance it
///   already reuses (if any)
///
/// # Errors
/// Returns the fetch error; cancel failures are collected instead.
pub fn dedupe_existing(
    store: &dyn ScheduleStore,
    user_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    queued: &BTreeMap<String, Option<String>>,
) -> Result<DedupeOutcome, StoreError> {
    let existing = store.fetch_instances_for_range(user_id, start, end)?;
    let mut outcome = DedupeOutcome::default();

    let reused_rows: BTreeSet<&str> = queued.values().flatten().map(String::as_str).collect();

    // 1. Group scheduled project rows by source, earliest first
    let mut by_project: BTreeMap<&str, Vec<&ScheduleInstance>> = BTreeMap::new();
    for instance in &existing {
        match (instance.source_type, instance.status) {
            (SourceType::Project, InstanceStatus::Scheduled) => {
                by_project.entry(instance.source_id.as_str()).or_default().push(instance);
            }
            (SourceType::Habit, InstanceStatus::Scheduled) => {}
            _ if reused_rows.contains(instance.id.as_str()) => {}
            _ => outcome.blocking.push(instance.clone()),
        }
    }

    let cancel = |outcome: &mut DedupeOutcome, instance: &ScheduleInstance| -> bool {
        match store.cancel_instance(&instance.id) {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(instance = %instance.id, source = %instance.source_id, "failed to cancel duplicate: {error}");
                outcome.failures.push(DedupeFailure {
                    source_id: instance.source_id.clone(),
                    error,
                });
                false
            }
        }
    };

    // 2. Keep or reuse the earliest, cancel the rest
    for (source_id, mut rows) in by_project {
        rows.sort_by(|a, b| a.start_utc.cmp(&b.start_utc).then_with(|| a.id.cmp(&b.id)));
        let (first, extras) = match rows.split_first() {
            Some((first, extras)) => (*first, extras),
            None => continue,
        };

        let to_cancel: Vec<&ScheduleInstance> = match queued.get(source_id) {
            // Already reusing a missed row: every scheduled row is surplus.
            Some(Some(_)) => rows.iter().copied().collect(),
            Some(None) => {
                outcome.reusable.insert(source_id.to_string(), first.clone());
                extras.to_vec()
            }
            None => {
                outcome.keepers.push(first.clone());
                extras.to_vec()
            }
        };
        for instance in to_cancel {
            if cancel(&mut outcome, instance) {
                outcome.canceled_project_instances += 1;
            }
        }
    }

    // 3. Habit placements are re-derived every run
    for instance in existing
        .iter()
        .filter(|i| i.source_type == SourceType::Habit && i.status == InstanceStatus::Scheduled)
    {
        outcome.previously_scheduled_habits.insert(instance.source_id.clone());
        if cancel(&mut outcome, instance) {
            outcome.canceled_habit_instances += 1;
        } else {
            outcome.blocking.push(instance.clone());
        }
    }

    tracing::info!(
        keepers = outcome.keepers.len(),
        reused = outcome.reusable.len(),
        canceled_projects = outcome.canceled_project_instances,
        canceled_habits = outcome.canceled_habit_instances,
        "dedupe complete"
    );
    Ok(outcome)
}
