use std::path::PathBuf;

use clap::Args;
use dayplan_core::{Config, Dataset};

use super::open_store;

#[derive(Args)]
pub struct ImportArgs {
    /// JSON file with `windows`, `projects`, `tasks`, `habits` and `skills`
    file: PathBuf,
}

pub fn run(args: ImportArgs) -> Result<(), Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(&args.file)
        .map_err(|e| format!("cannot read {}: {e}", args.file.display()))?;
    let dataset = Dataset::from_json(&content)?;

    let config = Config::load()?;
    let store = open_store(&config)?;
    let summary = store.import_dataset(&dataset)?;
    println!(
        "imported {} windows, {} projects, {} tasks, {} habits, {} skills",
        summary.windows, summary.projects, summary.tasks, summary.habits, summary.skills
    );
    Ok(())
}
