use clap::Args;
use dayplan_core::{Config, ResolvedWindow, ScheduleStore};

use super::{open_store, resolve_date, resolve_time_zone};

#[derive(Args)]
pub struct WindowsArgs {
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

pub fn run(args: WindowsArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let tz = resolve_time_zone(args.tz.as_deref(), &config)?;
    let date = resolve_date(args.date.as_deref(), tz)?;
    let store = open_store(&config)?;

    let windows: Vec<ResolvedWindow> = store
        .fetch_windows_for_date(date, tz)?
        .iter()
        .map(|w| ResolvedWindow::resolve(w, date, tz))
        .collect();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&windows)?);
        return Ok(());
    }

    if windows.is_empty() {
        println!("no windows on {date}");
    }
    for resolved in &windows {
        let energy = resolved.window.energy.map(|e| e.as_str()).unwrap_or("-");
        let carried = if resolved.window.from_prev_day { "  (from previous day)" } else { "" };
        println!(
            "{:<20}  {} - {}  {energy}{carried}",
            resolved.window.id,
            resolved.start.with_timezone(&tz).format("%Y-%m-%d %H:%M"),
            resolved.end.with_timezone(&tz).format("%Y-%m-%d %H:%M"),
        );
    }
    Ok(())
}
