//! `dayplan run`: one scheduling pass against the local database.

use chrono::NaiveTime;
use chrono_tz::Tz;
use clap::Args;
use dayplan_core::timezone::at_local_time;
use dayplan_core::{
    schedule_backlog, Config, ProgressEvent, ProgressSink, ScheduleBacklogResult, ScheduleOptions, SchedulerMode,
    TimelineEntry,
};

use super::{open_store, resolve_date, resolve_time_zone};

#[derive(Args)]
pub struct RunArgs {
    /// Base date (YYYY-MM-DD), today by default
    #[arg(long)]
    date: Option<String>,
    /// Local clock time (HH:MM) to schedule from, now by default
    #[arg(long)]
    time: Option<String>,
    /// IANA time zone, the configured one by default
    #[arg(long)]
    tz: Option<String>,
    /// regular, rush, rest, monumental:<id> or skilled:<id,id>
    #[arg(long)]
    mode: Option<String>,
    /// Days to scan (1-365)
    #[arg(long)]
    horizon: Option<u32>,
    /// Print the full result as JSON
    #[arg(long)]
    json: bool,
    /// Print progress events to stderr
    #[arg(long)]
    verbose: bool,
}

pub fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let tz = resolve_time_zone(args.tz.as_deref(), &config)?;
    let date = resolve_date(args.date.as_deref(), tz)?;

    // 1. Options: config first, flags on top
    let mut options = ScheduleOptions::from_config(&config)?;
    options.time_zone = tz;
    if let Some(mode) = &args.mode {
        options = options.with_mode(mode.parse::<SchedulerMode>()?);
    }
    if let Some(horizon) = args.horizon {
        options = options.with_horizon_days(horizon);
    }
    if let Some(time) = &args.time {
        let time = NaiveTime::parse_from_str(time, "%H:%M").map_err(|e| format!("invalid time '{time}': {e}"))?;
        options = options.with_now(at_local_time(date, time, tz));
    }

    // 2. Run
    let store = open_store(&config)?;
    let print_event = |event: &ProgressEvent| match serde_json::to_string(event) {
        Ok(line) => eprintln!("{line}"),
        Err(e) => tracing::warn!("unprintable progress event: {e}"),
    };
    let sink: Option<&dyn ProgressSink> = if args.verbose { Some(&print_event) } else { None };
    let result = schedule_backlog(&store, &config.storage.user_id, date, &options, sink)?;

    // 3. Report
    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result, tz);
    }

    match result.error {
        Some(error) => Err(format!("run aborted during {}: {}", error.stage, error.message).into()),
        None => Ok(()),
    }
}

fn print_summary(result: &ScheduleBacklogResult, tz: Tz) {
    for entry in &result.timeline {
        let start = entry.start_utc().with_timezone(&tz).format("%Y-%m-%d %H:%M");
        let end = entry.end_utc().with_timezone(&tz).format("%H:%M");
        let (kind, id, window) = match entry {
            TimelineEntry::Project(p) => ("PROJECT", p.project_id.as_str(), p.instance.window_id.as_deref()),
            TimelineEntry::Habit(h) => ("HABIT", h.habit_id.as_str(), h.window_id.as_deref()),
        };
        println!(
            "{start}-{end}  {kind:<7}  {id:<24}  {:<11}  {}",
            entry.decision().as_str(),
            window.unwrap_or("-")
        );
    }
    for failure in &result.failures {
        let reason = failure.reason.as_str();
        match &failure.detail {
            Some(detail) => println!("failed  {:<24}  {reason}: {detail}", failure.item_id),
            None => println!("failed  {:<24}  {reason}", failure.item_id),
        }
    }
    println!(
        "{} placed, {} on timeline, {} failed",
        result.placed.len(),
        result.timeline.len(),
        result.failures.len()
    );
}
