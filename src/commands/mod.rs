pub mod context;
pub mod providers;
pub mod summary;

use anyhow::Result;
use chrono::{Datelike, Local, NaiveDate};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;

use crate::error::ReflectError;
use crate::reflect::entries::JsonlEntryStore;
use crate::reflect::paths::ReflectPaths;

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
            data: None,
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }

    pub fn attach<T: Serialize>(&mut self, data: &T) -> Result<()> {
        self.data = Some(serde_json::to_value(data)?);
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct PeriodOptions {
    pub user_id: String,
    pub month: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub display_name: Option<String>,
    pub entries_file: Option<PathBuf>,
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

/// Parse `YYYY-MM` into the first and last day of that month.
pub fn month_bounds(raw: &str) -> Result<(NaiveDate, NaiveDate), ReflectError> {
    let invalid = || ReflectError::InvalidMonth(raw.to_string());
    let (year, month) = raw.trim().split_once('-').ok_or_else(invalid)?;
    let year = year.parse::<i32>().map_err(|_| invalid())?;
    let month = month.parse::<u32>().map_err(|_| invalid())?;
    let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let end = last_day_of_month(year, month).ok_or_else(invalid)?;
    Ok((start, end))
}

fn previous_month(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let (year, month) = if today.month() == 1 {
        (today.year() - 1, 12)
    } else {
        (today.year(), today.month() - 1)
    };
    let start = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(today);
    let end = last_day_of_month(year, month).unwrap_or(today);
    (start, end)
}

/// Explicit range, else `--month`, else the previous calendar month.
pub fn resolve_period(opts: &PeriodOptions) -> Result<(NaiveDate, NaiveDate), ReflectError> {
    match (opts.from, opts.to, opts.month.as_deref()) {
        (Some(from), Some(to), _) => Ok((from, to)),
        (Some(_), None, _) | (None, Some(_), _) => Err(ReflectError::InvalidInput(
            "--from and --to must be given together".to_string(),
        )),
        (None, None, Some(month)) => month_bounds(month),
        (None, None, None) => Ok(previous_month(Local::now().date_naive())),
    }
}

pub fn entry_store(paths: &ReflectPaths, opts: &PeriodOptions) -> JsonlEntryStore {
    JsonlEntryStore::new(
        opts.entries_file
            .clone()
            .unwrap_or_else(|| paths.entries_file.clone()),
    )
}
