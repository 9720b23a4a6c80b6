//! Progress events emitted while a run advances through its phases.

use serde::Serialize;

/// Failure summary carried by the final events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventError {
    pub message: String,
    pub code: String,
}

/// One progress notification. Payloads are counts and labels only.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ProgressEvent {
    Start {
        user_id: String,
        base_date: String,
        mode: String,
        horizon_days: u32,
    },
    MissedFetched {
        marked_missed: usize,
        backlog: usize,
    },
    InputsFetched {
        tasks: usize,
        projects: usize,
        habits: usize,
        sync_habits: usize,
        windows: usize,
    },
    QueueBuilt {
        queued: usize,
        mode_filtered: usize,
    },
    DedupeComplete {
        reused_projects: usize,
        canceled_project_instances: usize,
        canceled_habit_instances: usize,
    },
    HabitPassComplete {
        stage: String,
        placements: usize,
        offsets_with_placements: usize,
    },
    ProjectsScheduled {
        attempted: usize,
        placed: usize,
        failed: usize,
    },
    HabitsPersisted {
        inserted: usize,
        failures: usize,
    },
    Complete {
        placed: usize,
        failures: usize,
        timeline: usize,
        error: Option<EventError>,
    },
    Error {
        stage: String,
        message: String,
        code: String,
    },
}

impl ProgressEvent {
    /// The `type` tag as serialized.
    pub fn kind(&self) -> &'static str {
        match self {
            ProgressEvent::Start { .. } => "start",
            ProgressEvent::MissedFetched { .. } => "missed-fetched",
            ProgressEvent::InputsFetched { .. } => "inputs-fetched",
            ProgressEvent::QueueBuilt { .. } => "queue-built",
            ProgressEvent::DedupeComplete { .. } => "dedupe-complete",
            ProgressEvent::HabitPassComplete { .. } => "habit-pass-complete",
            ProgressEvent::ProjectsScheduled { .. } => "projects-scheduled",
            ProgressEvent::HabitsPersisted { .. } => "habits-persisted",
            ProgressEvent::Complete { .. } => "complete",
            ProgressEvent::Error { .. } => "error",
        }
    }
}

/// Receiver for progress events. Delivery is fire-and-forget.
pub trait ProgressSink {
    fn emit(&self, event: &ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent),
{
    fn emit(&self, event: &ProgressEvent) {
        self(event)
    }
}

/// Forwards events to an optional sink and to the `tracing` log.
pub(crate) struct Reporter<'a> {
    sink: Option<&'a dyn ProgressSink>,
}

impl<'a> Reporter<'a> {
    pub(crate) fn new(sink: Option<&'a dyn ProgressSink>) -> Self {
        Self { sink }
    }

    pub(crate) fn emit(&self, event: ProgressEvent) {
        tracing::debug!(event = event.kind(), ?event, "scheduler progress");
        if let Some(sink) = self.sink {
            sink.emit(&event);
        }
    }
}
