use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReflectError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid period: start {start} is after end {end}")]
    InvalidPeriod { start: NaiveDate, end: NaiveDate },
    #[error("invalid month `{0}`: expected YYYY-MM")]
    InvalidMonth(String),
}
