//! Energy levels used to admit items into windows.
//!
//! Windows and schedulable items both carry an energy tag. A window admits
//! an item when its level is at least as demanding as the item's, or, for
//! habits, exactly equal.

mod level;

pub use level::EnergyLevel;
