use chrono::NaiveDate;
use thiserror::Error;

/// Failures of the pure calendar computations.
///
/// Callers treat any of these as "cannot resolve": the affected element
/// is not rendered and no page name is produced for it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalendarError {
  #[error("week {week} is outside 1..=53 (year {year})")]
  InvalidWeek { year: i32, week: i64 },

  #[error("year {0} is outside the supported range 1..=9999")]
  InvalidYear(i32),

  #[error("month {0} is outside 1..=12")]
  InvalidMonth(u32),

  #[error("quarter {0} is outside 1..=4")]
  InvalidQuarter(u32),

  #[error("date arithmetic overflowed near {0}")]
  DateOverflow(NaiveDate),

  #[error("no holiday rules for country {0:?}")]
  UnknownCountry(String),

  #[error("invalid value for {key}: {value:?}")]
  InvalidSetting { key: String, value: String }
}
