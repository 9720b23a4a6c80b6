use serde::{Deserialize, Serialize};

use crate::energy::EnergyLevel;

/// A unit of project work. Never scheduled directly; its duration,
/// weight, energy and skill roll up into the owning [`Project`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub stage: String,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub energy: Option<EnergyLevel>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub skill_id: Option<String>,
}

/// Backlog project as stored. See `scheduler::queue` for the derived,
/// schedulable form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub stage: String,
    #[serde(default)]
    pub energy: Option<EnergyLevel>,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub goal_id: Option<String>,
    /// Skills linked directly to the project.
    #[serde(default)]
    pub skill_ids: Vec<String>,
}
