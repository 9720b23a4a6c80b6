use clap::Args;
use dayplan_core::{is_due, Config, ScheduleStore};

use super::{open_store, resolve_date, resolve_time_zone};

#[derive(Args)]
pub struct DueArgs {
    /// Habit ID
    habit_id: String,
    /// Date (YYYY-MM-DD), today by default
    #[arg(long)]
    date: Option<String>,
    /// IANA time zone, the configured one by default
    #[arg(long)]
    tz: Option<String>,
    /// Print as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: DueArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let tz = resolve_time_zone(args.tz.as_deref(), &config)?;
    let date = resolve_date(args.date.as_deref(), tz)?;
    let store = open_store(&config)?;

    let habits = store.fetch_habits_for_schedule()?;
    let habit = habits
        .iter()
        .find(|h| h.id == args.habit_id)
        .ok_or_else(|| format!("habit not found: {}", args.habit_id))?;

    // The habit's window days stand in when it has none of its own
    let windows = store.fetch_all_windows()?;
    let window_days = habit
        .window_id
        .as_ref()
        .and_then(|id| windows.iter().find(|w| &w.id == id))
        .and_then(|w| w.days.as_deref());

    let evaluation = is_due(habit, date, tz, window_days);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&evaluation)?);
        return Ok(());
    }

    let verdict = if evaluation.is_due { "due" } else { "not due" };
    match evaluation.due_start {
        Some(start) => println!(
            "{} {verdict} on {date} ({}, due from {})",
            habit.id,
            evaluation.reason,
            start.with_timezone(&tz).format("%Y-%m-%d")
        ),
        None => println!("{} {verdict} on {date} ({})", habit.id, evaluation.reason),
    }
    Ok(())
}
