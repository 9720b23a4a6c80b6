//! Run-wide scheduling modes.
//!
//! A mode is chosen once per run and never changes during it:
//! - `REGULAR`: no adjustments
//! - `RUSH`: every duration shrinks to 80%
//! - `REST`: every window is treated as low energy
//! - `MONUMENTAL` / `SKILLED`: only matching projects, and only today

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::energy::EnergyLevel;
use crate::error::ValidationError;

/// Duration factor applied in RUSH mode.
const RUSH_DURATION_FACTOR: f64 = 0.8;

/// Scheduling mode for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum SchedulerMode {
    #[default]
    Regular,
    Rush,
    Rest,
    Monumental {
        monument_id: String,
    },
    Skilled {
        skill_ids: Vec<String>,
    },
}

impl SchedulerMode {
    /// Collapse degenerate payloads: a MONUMENTAL mode without a monument
    /// or a SKILLED mode without skills runs as REGULAR. Skill ids are
    /// trimmed and deduplicated.
    pub fn normalize(self) -> Self {
        match self {
            SchedulerMode::Monumental { monument_id } => {
                let monument_id = monument_id.trim().to_string();
                if monument_id.is_empty() {
                    SchedulerMode::Regular
                } else {
                    SchedulerMode::Monumental { monument_id }
                }
            }
            SchedulerMode::Skilled { skill_ids } => {
                let mut seen = BTreeSet::new();
                let skill_ids: Vec<String> = skill_ids
                    .into_iter()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty() && seen.insert(s.clone()))
                    .collect();
                if skill_ids.is_empty() {
                    SchedulerMode::Regular
                } else {
                    SchedulerMode::Skilled { skill_ids }
                }
            }
            other => other,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SchedulerMode::Regular => "REGULAR",
            SchedulerMode::Rush => "RUSH",
            SchedulerMode::Rest => "REST",
            SchedulerMode::Monumental { .. } => "MONUMENTAL",
            SchedulerMode::Skilled { .. } => "SKILLED",
        }
    }

    pub fn is_rest(&self) -> bool {
        matches!(self, SchedulerMode::Rest)
    }

    /// MONUMENTAL and SKILLED runs only place projects on the base day.
    pub fn restricts_projects_to_today(&self) -> bool {
        matches!(self, SchedulerMode::Monumental { .. } | SchedulerMode::Skilled { .. })
    }

    /// Apply the mode's duration policy. Non-positive durations pass through.
    pub fn adjust_duration(&self, minutes: i64) -> i64 {
        match self {
            SchedulerMode::Rush if minutes > 0 => {
                ((minutes as f64 * RUSH_DURATION_FACTOR).round() as i64).max(1)
            }
            _ => minutes,
        }
    }

    /// Effective energy of a window under this mode. REST keeps NO and
    /// turns everything else, unlabeled windows included, into LOW.
    pub fn window_energy(&self, energy: Option<EnergyLevel>) -> Option<EnergyLevel> {
        if self.is_rest() {
            Some(energy.map_or(EnergyLevel::Low, EnergyLevel::rested))
        } else {
            energy
        }
    }
}

impl fmt::Display for SchedulerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerMode::Monumental { monument_id } => write!(f, "monumental:{monument_id}"),
            SchedulerMode::Skilled { skill_ids } => write!(f, "skilled:{}", skill_ids.join(",")),
            other => f.write_str(&other.label().to_ascii_lowercase()),
        }
    }
}

impl FromStr for SchedulerMode {
    type Err = ValidationError;

    /// Parse `regular`, `rush`, `rest`, `monumental:<id>` or `skilled:<id,id>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, arg) = match s.split_once(':') {
            Some((kind, arg)) => (kind, Some(arg)),
            None => (s, None),
        };
        let mode = match (kind.trim().to_ascii_uppercase().as_str(), arg) {
            ("REGULAR", None) => SchedulerMode::Regular,
            ("RUSH", None) => SchedulerMode::Rush,
            ("REST", None) => SchedulerMode::Rest,
            ("MONUMENTAL", arg) => SchedulerMode::Monumental {
                monument_id: arg.unwrap_or_default().to_string(),
            },
            ("SKILLED", arg) => SchedulerMode::Skilled {
                skill_ids: arg
                    .unwrap_or_default()
                    .split(',')
                    .map(str::to_string)
                    .collect(),
            },
            _ => {
                return Err(ValidationError::InvalidValue {
                    field: "mode".into(),
                    message: format!("unknown scheduling mode '{s}'"),
                })
            }
        };
        Ok(mode.normalize())
    }
}

/// Project eligibility under a mode.
///
/// Holds the skill-to-monument lookup MONUMENTAL mode needs; other modes
/// admit every project.
#[derive(Debug)]
pub struct ModeFilter<'a> {
    mode: &'a SchedulerMode,
    skill_monuments: &'a HashMap<String, String>,
}

impl<'a> ModeFilter<'a> {
    pub fn new(mode: &'a SchedulerMode, skill_monuments: &'a HashMap<String, String>) -> Self {
        Self { mode, skill_monuments }
    }

    /// Whether a project with `skills` (its own plus its tasks') may be scheduled.
    pub fn allows(&self, skills: &BTreeSet<String>) -> bool {
        match self.mode {
            SchedulerMode::Monumental { monument_id } => skills
                .iter()
                .filter_map(|skill| self.skill_monuments.get(skill))
                .any(|m| m == monument_id),
            SchedulerMode::Skilled { skill_ids } => skill_ids.iter().any(|s| skills.contains(s)),
            _ => true,
        }
    }
}
