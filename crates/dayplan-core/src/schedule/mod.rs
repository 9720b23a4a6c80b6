//! Schedule types: windows, projects and tasks, habits, and the persisted
//! placement instances the scheduler produces.
//!
//! These are the typed records every store decodes into. Windows, habits,
//! projects and tasks are read fresh on every run; only
//! [`ScheduleInstance`] rows are written back.

mod habit;
mod instance;
mod project;
mod window;

pub use habit::{DaylightPreference, Habit, HabitType, WindowEdgePreference};
pub use instance::{InstancePlacement, InstanceStatus, NewInstance, ScheduleInstance, SourceType};
pub use project::{Project, Task};
pub use window::Window;
