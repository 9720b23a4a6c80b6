use clap::Args;
use dayplan_core::timezone::{add_days, start_of_day};
use dayplan_core::{Config, ScheduleStore};

use super::{open_store, resolve_date, resolve_time_zone};

#[derive(Args)]
pub struct InstancesArgs {
    /// First day (YYYY-MM-DD), today by default
    #[arg(long)]
    from: Option<String>,
    /// Number of days to list
    #[arg(long, default_value = "7")]
    days: i64,
    /// IANA time zone, the configured one by default
    #[arg(long)]
    tz: Option<String>,
    /// Print as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: InstancesArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let tz = resolve_time_zone(args.tz.as_deref(), &config)?;
    let from = resolve_date(args.from.as_deref(), tz)?;
    let store = open_store(&config)?;
    let user_id = &config.storage.user_id;

    let start = start_of_day(from, tz);
    let end = start_of_day(add_days(from, args.days.max(1)), tz);
    let instances = store.fetch_instances_for_range(user_id, start, end)?;
    let project_ids = store.fetch_scheduled_project_ids(user_id)?;

    if args.json {
        let output = serde_json::json!({
            "instances": instances,
            "scheduled_project_ids": project_ids,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for instance in &instances {
        println!(
            "{}  {}-{}  {:<7}  {:<24}  {}",
            instance.id,
            instance.start_utc.with_timezone(&tz).format("%Y-%m-%d %H:%M"),
            instance.end_utc.with_timezone(&tz).format("%H:%M"),
            instance.source_type.as_str(),
            instance.source_id,
            instance.status.as_str(),
        );
    }
    println!("{} instances", instances.len());
    if !project_ids.is_empty() {
        let ids: Vec<&str> = project_ids.iter().map(String::as_str).collect();
        println!("projects with placements: {}", ids.join(", "));
    }
    Ok(())
}
