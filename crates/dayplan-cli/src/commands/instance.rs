use chrono::Utc;
use clap::Subcommand;
use dayplan_core::{Config, InstanceStatus, ScheduleStore};

use super::open_store;

#[derive(Subcommand)]
pub enum InstanceAction {
    /// Mark an instance completed
    Complete {
        /// Instance ID
        id: String,
    },
    /// Cancel an instance
    Cancel {
        /// Instance ID
        id: String,
    },
}

pub fn run(action: InstanceAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let store = open_store(&config)?;

    match action {
        InstanceAction::Complete { id } => {
            store.update_instance_status(&id, InstanceStatus::Completed, Some(Utc::now()))?;
            println!("completed {id}");
        }
        InstanceAction::Cancel { id } => {
            store.cancel_instance(&id)?;
            println!("canceled {id}");
        }
    }
    Ok(())
}
