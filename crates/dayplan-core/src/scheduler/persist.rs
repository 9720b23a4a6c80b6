//! Habit placement writes.
//!
//! Stores created before habit placements existed reject HABIT rows. The
//! persister checks for that once per run, remediates it once, and retries
//! a write that still trips over it.

use crate::error::StoreError;
use crate::schedule::{NewInstance, ScheduleInstance, SourceType};
use crate::storage::ScheduleStore;

/// Write attempts per habit placement.
const MAX_ATTEMPTS: usize = 2;

/// Whether the store is known to accept HABIT rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HabitCapability {
    Unknown,
    Ready,
    Failed,
}

/// Run-scoped writer for habit instances.
pub struct HabitPersister<'a> {
    store: &'a dyn ScheduleStore,
    capability: HabitCapability,
    remediated: bool,
}

impl<'a> HabitPersister<'a> {
    pub fn new(store: &'a dyn ScheduleStore) -> Self {
        Self {
            store,
            capability: HabitCapability::Unknown,
            remediated: false,
        }
    }

    pub fn capability(&self) -> HabitCapability {
        self.capability
    }

    /// Probe the store and remediate once if it rejects HABIT rows.
    fn ensure_ready(&mut self) -> HabitCapability {
        if self.capability != HabitCapability::Unknown {
            return self.capability;
        }

        // 1. Probe
        let supported = match self.store.habit_source_type_supported() {
            Ok(supported) => supported,
            Err(e) => {
                tracing::warn!("habit capability probe failed: {e}");
                false
            }
        };

        // 2. Remediate at most once per run
        self.capability = if supported {
            HabitCapability::Ready
        } else if self.remediated {
            HabitCapability::Failed
        } else {
            self.remediated = true;
            tracing::warn!("store rejects habit placements, upgrading");
            match self.store.ensure_habit_source_type() {
                Ok(()) => HabitCapability::Ready,
                Err(e) => {
                    tracing::warn!("habit source type remediation failed: {e}");
                    HabitCapability::Failed
                }
            }
        };
        self.capability
    }

    /// Insert one habit placement.
    ///
    /// # Errors
    /// Returns the last store error once the attempts are used up.
    pub fn insert(&mut self, input: &NewInstance) -> Result<ScheduleInstance, StoreError> {
        let mut last_error = StoreError::UnsupportedSourceType {
            source_type: SourceType::Habit,
        };
        for attempt in 1..=MAX_ATTEMPTS {
            if self.ensure_ready() == HabitCapability::Failed {
                return Err(last_error);
            }
            match self.store.create_instance(input) {
                Ok(instance) => return Ok(instance),
                Err(e @ StoreError::UnsupportedSourceType { .. }) if attempt < MAX_ATTEMPTS => {
                    tracing::warn!(habit = %input.source_id, "habit insert rejected, retrying after remediation");
                    self.remediate_after_rejection();
                    last_error = e;
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error)
    }

    /// The probe said yes but the insert said no: remediate directly.
    fn remediate_after_rejection(&mut self) {
        if self.remediated {
            self.capability = HabitCapability::Failed;
            return;
        }
        self.remediated = true;
        self.capability = match self.store.ensure_habit_source_type() {
            Ok(()) => HabitCapability::Ready,
            Err(e) => {
                tracing::warn!("habit source type remediation failed: {e}");
                HabitCapability::Failed
            }
        };
    }
}
