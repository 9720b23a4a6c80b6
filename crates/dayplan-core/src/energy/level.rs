use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Ordinal energy tag: `NO < LOW < MEDIUM < HIGH < ULTRA < EXTREME`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum EnergyLevel {
    #[default]
    No,
    Low,
    Medium,
    High,
    Ultra,
    Extreme,
}

impl EnergyLevel {
    /// All levels in ascending order.
    pub const ALL: [EnergyLevel; 6] = [
        EnergyLevel::No,
        EnergyLevel::Low,
        EnergyLevel::Medium,
        EnergyLevel::High,
        EnergyLevel::Ultra,
        EnergyLevel::Extreme,
    ];

    /// Position in the ordering, `NO` = 0.
    pub fn ordinal(self) -> usize {
        self as usize
    }

    /// Case-insensitive parse; `None` for unknown labels.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "NO" => Some(EnergyLevel::No),
            "LOW" => Some(EnergyLevel::Low),
            "MEDIUM" => Some(EnergyLevel::Medium),
            "HIGH" => Some(EnergyLevel::High),
            "ULTRA" => Some(EnergyLevel::Ultra),
            "EXTREME" => Some(EnergyLevel::Extreme),
            _ => None,
        }
    }

    /// The more demanding of two optional levels.
    pub fn merge(a: Option<Self>, b: Option<Self>) -> Option<Self> {
        match (a, b) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, None) => a,
            (None, b) => b,
        }
    }

    /// Level a window presents under REST mode.
    pub fn rested(self) -> Self {
        if self == EnergyLevel::No {
            EnergyLevel::No
        } else {
            EnergyLevel::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EnergyLevel::No => "NO",
            EnergyLevel::Low => "LOW",
            EnergyLevel::Medium => "MEDIUM",
            EnergyLevel::High => "HIGH",
            EnergyLevel::Ultra => "ULTRA",
            EnergyLevel::Extreme => "EXTREME",
        }
    }
}

impl fmt::Display for EnergyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnergyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EnergyLevel::parse(s).ok_or_else(|| format!("unknown energy level: {s}"))
    }
}
