//! Subcommands and the helpers they share.

pub mod config;
pub mod due;
pub mod import;
pub mod instance;
pub mod instances;
pub mod run;
pub mod windows;

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use dayplan_core::timezone::{local_date, parse_time_zone};
use dayplan_core::{Config, ScheduleDb};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Open the configured database for the configured user.
pub fn open_store(config: &Config) -> CliResult<ScheduleDb> {
    let path = config.database_path()?;
    Ok(ScheduleDb::open(&path, config.storage.user_id.clone())?)
}

/// `--tz` when given, else the configured zone.
pub fn resolve_time_zone(flag: Option<&str>, config: &Config) -> CliResult<Tz> {
    let name = flag.unwrap_or(&config.scheduler.time_zone);
    Ok(parse_time_zone(Some(name))?)
}

/// `--date` when given, else today in `tz`.
pub fn resolve_date(flag: Option<&str>, tz: Tz) -> CliResult<NaiveDate> {
    match flag {
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map_err(|e| format!("invalid date '{value}': {e}").into()),
        None => Ok(local_date(Utc::now(), tz)),
    }
}
