//! Project work queue.
//!
//! Projects are rolled up from their tasks into [`SchedulableProject`]s,
//! then queued: missed instances first (keeping their ids for reuse),
//! then every other project. Mode-ineligible projects are reported, not
//! dropped silently.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use super::mode::{ModeFilter, SchedulerMode};
use crate::energy::EnergyLevel;
use crate::schedule::{Project, ScheduleInstance, SourceType, Task};
use crate::weight::{project_weight, task_weight};

/// Duration used when neither a project nor its tasks give one.
pub const DEFAULT_PROJECT_DURATION_MINUTES: i64 = 60;

/// A project with its task roll-up applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulableProject {
    pub id: String,
    pub name: String,
    pub priority: String,
    pub stage: String,
    pub energy: EnergyLevel,
    pub duration_minutes: i64,
    pub weight: f64,
    /// Project skills plus the skills of its tasks.
    pub skill_ids: BTreeSet<String>,
    pub task_count: usize,
}

#[derive(Default)]
struct TaskRollup {
    duration_sum: i64,
    weight_sum: f64,
    energy: Option<EnergyLevel>,
    skills: BTreeSet<String>,
    count: usize,
}

/// Roll tasks up into their projects.
///
/// Duration is the project's own when positive, else the sum of its task
/// durations when positive, else [`DEFAULT_PROJECT_DURATION_MINUTES`].
/// Energy is the most demanding of the project's and its tasks'.
pub fn build_schedulable_projects(
    projects: &BTreeMap<String, Project>,
    tasks: &[Task],
) -> BTreeMap<String, SchedulableProject> {
    let mut rollups: HashMap<&str, TaskRollup> = HashMap::new();
    for task in tasks {
        let Some(project_id) = task.project_id.as_deref() else {
            continue;
        };
        let rollup = rollups.entry(project_id).or_default();
        rollup.duration_sum += task.duration_minutes.unwrap_or(0).max(0);
        rollup.weight_sum += task_weight(task);
        rollup.energy = EnergyLevel::merge(rollup.energy, task.energy);
        if let Some(skill) = &task.skill_id {
            rollup.skills.insert(skill.clone());
        }
        rollup.count += 1;
    }

    projects
        .values()
        .map(|project| {
            let rollup = rollups.get(project.id.as_str());
            let duration_minutes = project
                .duration_minutes
                .filter(|d| *d > 0)
                .or_else(|| rollup.map(|r| r.duration_sum).filter(|d| *d > 0))
                .unwrap_or(DEFAULT_PROJECT_DURATION_MINUTES);
            let energy = EnergyLevel::merge(project.energy, rollup.and_then(|r| r.energy))
                .unwrap_or_default();
            let mut skill_ids: BTreeSet<String> = project.skill_ids.iter().cloned().collect();
            if let Some(r) = rollup {
                skill_ids.extend(r.skills.iter().cloned());
            }

            let schedulable = SchedulableProject {
                id: project.id.clone(),
                name: project.name.clone(),
                priority: project.priority.clone(),
                stage: project.stage.clone(),
                energy,
                duration_minutes,
                weight: project_weight(project, rollup.map_or(0.0, |r| r.weight_sum)),
                skill_ids,
                task_count: rollup.map_or(0, |r| r.count),
            };
            (project.id.clone(), schedulable)
        })
        .collect()
}

/// One project waiting for placement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueItem {
    pub project_id: String,
    pub duration_minutes: i64,
    pub energy: EnergyLevel,
    pub weight: f64,
    /// Existing instance to move instead of inserting a new row.
    pub instance_id: Option<String>,
}

/// Result of queue construction.
#[derive(Debug, Default)]
pub struct ProjectQueue {
    pub items: Vec<QueueItem>,
    /// Projects excluded by the mode, in first-seen order.
    pub mode_filtered: Vec<String>,
    /// Duplicate missed instances that should be canceled.
    pub redundant_missed: Vec<ScheduleInstance>,
}

/// Build the sorted project queue.
///
/// # Arguments
/// * `missed` - Missed instances, heaviest first
/// * `projects` - Rolled-up projects keyed by id
/// * `mode` - Run mode, for duration and eligibility
/// * `filter` - Eligibility check for the mode
///
/// # Returns
/// Queue sorted by energy (desc), weight (desc), then id.
pub fn build_queue(
    missed: &[ScheduleInstance],
    projects: &BTreeMap<String, SchedulableProject>,
    mode: &SchedulerMode,
    filter: &ModeFilter<'_>,
) -> ProjectQueue {
    let mut queue = ProjectQueue::default();
    let mut queued: BTreeSet<String> = BTreeSet::new();
    let mut filtered: BTreeSet<String> = BTreeSet::new();

    let mut note_filtered = |queue: &mut ProjectQueue, id: &str| {
        if filtered.insert(id.to_string()) {
            queue.mode_filtered.push(id.to_string());
        }
    };

    // 1. Missed project instances, reusing their rows
    for inst in missed.iter().filter(|i| i.source_type == SourceType::Project) {
        if queued.contains(&inst.source_id) {
            queue.redundant_missed.push(inst.clone());
            continue;
        }
        let Some(def) = projects.get(&inst.source_id) else {
            continue;
        };
        if !filter.allows(&def.skill_ids) {
            note_filtered(&mut queue, &def.id);
            continue;
        }

        let base_duration = if def.duration_minutes > 0 {
            def.duration_minutes
        } else if inst.duration_minutes > 0 {
            inst.duration_minutes
        } else {
            DEFAULT_PROJECT_DURATION_MINUTES
        };
        queue.items.push(QueueItem {
            project_id: def.id.clone(),
            duration_minutes: mode.adjust_duration(base_duration),
            energy: def.energy,
            weight: inst.weight_snapshot.unwrap_or(def.weight),
            instance_id: Some(inst.id.clone()),
        });
        queued.insert(def.id.clone());
    }

    // 2. Every other project
    for def in projects.values() {
        if queued.contains(&def.id) || def.duration_minutes <= 0 {
            continue;
        }
        if !filter.allows(&def.skill_ids) {
            note_filtered(&mut queue, &def.id);
            continue;
        }
        queue.items.push(QueueItem {
            project_id: def.id.clone(),
            duration_minutes: mode.adjust_duration(def.duration_minutes),
            energy: def.energy,
            weight: def.weight,
            instance_id: None,
        });
        queued.insert(def.id.clone());
    }

    sort_queue(&mut queue.items);
    queue
}

/// Order by energy (desc), weight (desc), then id.
pub fn sort_queue(items: &mut [QueueItem]) {
    items.sort_by(|a, b| {
        b.energy
            .cmp(&a.energy)
            .then_with(|| b.weight.total_cmp(&a.weight))
            .then_with(|| a.project_id.cmp(&b.project_id))
    });
}
