//! Priority weights for backlog items.
//!
//! Weights order the project queue: higher runs first. A project's weight
//! is dominated by its own priority and stage; task weights contribute a
//! small fractional tie-breaker.

use crate::schedule::{Project, Task};

const TASK_PRIORITY: &[(&str, f64)] = &[
    ("NO", 0.0),
    ("LOW", 1.0),
    ("MEDIUM", 2.0),
    ("HIGH", 3.0),
    ("CRITICAL", 4.0),
    ("ULTRA-CRITICAL", 5.0),
];

const TASK_STAGE: &[(&str, f64)] = &[("PREPARE", 30.0), ("PRODUCE", 20.0), ("PERFECT", 10.0)];

const PROJECT_PRIORITY: &[(&str, f64)] = TASK_PRIORITY;

const PROJECT_STAGE: &[(&str, f64)] = &[
    ("RESEARCH", 50.0),
    ("TEST", 40.0),
    ("BUILD", 30.0),
    ("REFINE", 20.0),
    ("RELEASE", 10.0),
];

const GOAL_PRIORITY: &[(&str, f64)] = &[
    ("NO", 0.0),
    ("LOW", 10.0),
    ("MEDIUM", 200.0),
    ("HIGH", 300.0),
    ("CRITICAL", 500.0),
    ("ULTRA-CRITICAL", 1000.0),
];

/// Divisor applied to child weights rolled into their parent.
const ROLLUP_DIVISOR: f64 = 1000.0;

fn lookup(table: &[(&str, f64)], label: &str) -> f64 {
    let key = label.trim();
    table
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(key))
        .map(|(_, value)| *value)
        .unwrap_or(0.0)
}

/// Weight of a single task: priority plus stage.
pub fn task_weight(task: &Task) -> f64 {
    lookup(TASK_PRIORITY, &task.priority) + lookup(TASK_STAGE, &task.stage)
}

/// Weight of a project given the weights of its tasks.
pub fn project_weight(project: &Project, task_weight_sum: f64) -> f64 {
    task_weight_sum / ROLLUP_DIVISOR
        + lookup(PROJECT_PRIORITY, &project.priority)
        + lookup(PROJECT_STAGE, &project.stage)
}

/// Weight of a goal given the weights of its projects.
pub fn goal_weight(priority: &str, project_weight_sum: f64) -> f64 {
    project_weight_sum / ROLLUP_DIVISOR + lookup(GOAL_PRIORITY, priority)
}
