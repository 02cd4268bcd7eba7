use chrono::{
  Datelike,
  Duration,
  NaiveDate
};

use crate::conventions::{
  CalendarConventions,
  WeekStartDay
};
use crate::error::CalendarError;
use crate::quarter::Quarter;
use crate::week::start_of_week;

pub fn add_days(
  date: NaiveDate,
  days: i64
) -> Result<NaiveDate, CalendarError> {
  Duration::try_days(days)
    .and_then(|delta| {
      date.checked_add_signed(delta)
    })
    .ok_or(CalendarError::DateOverflow(
      date
    ))
}

/// Start of the week holding `day` for a
/// week beginning on `week_start`.
pub fn start_of_week_containing(
  day: NaiveDate,
  week_start: WeekStartDay
) -> Result<NaiveDate, CalendarError> {
  let diff = week_start
    .position_of(day.weekday());
  add_days(day, -i64::from(diff))
}

pub fn last_day_of_week(
  start: NaiveDate
) -> Result<NaiveDate, CalendarError> {
  add_days(start, 6)
}

pub fn first_day_of_month(
  year: i32,
  month: u32
) -> Result<NaiveDate, CalendarError> {
  if !(1..=12).contains(&month) {
    return Err(
      CalendarError::InvalidMonth(month)
    );
  }
  NaiveDate::from_ymd_opt(
    year, month, 1
  )
  .ok_or(CalendarError::InvalidYear(
    year
  ))
}

pub fn last_day_of_month(
  year: i32,
  month: u32
) -> Result<NaiveDate, CalendarError> {
  let (next_year, next_month) =
    if month >= 12 {
      (year.saturating_add(1), 1_u32)
    } else {
      (year, month + 1)
    };
  first_day_of_month(year, month)?;
  add_days(
    first_day_of_month(
      next_year, next_month
    )?,
    -1
  )
}

pub fn days_in_month(
  year: i32,
  month: u32
) -> Result<u32, CalendarError> {
  Ok(last_day_of_month(year, month)?.day())
}

pub fn start_of_month(
  date: NaiveDate
) -> NaiveDate {
  date.with_day(1).unwrap_or(date)
}

pub fn end_of_month(
  date: NaiveDate
) -> Result<NaiveDate, CalendarError> {
  last_day_of_month(
    date.year(),
    date.month()
  )
}

/// First day of week 1 under the active
/// conventions.
pub fn start_of_year(
  year: i32,
  conventions: &CalendarConventions
) -> Result<NaiveDate, CalendarError> {
  start_of_week(
    year,
    1,
    conventions.week_standard,
    conventions.week_start_override
  )
}

/// First day of the quarter, composed from
/// the start of the quarter's first week.
pub fn start_of_quarter(
  year: i32,
  quarter: Quarter,
  conventions: &CalendarConventions
) -> Result<NaiveDate, CalendarError> {
  start_of_week(
    year,
    quarter.first_week(),
    conventions.week_standard,
    conventions.week_start_override
  )
}

/// Last day of the quarter: the day before
/// the next quarter (or next year) starts.
pub fn end_of_quarter(
  year: i32,
  quarter: Quarter,
  conventions: &CalendarConventions
) -> Result<NaiveDate, CalendarError> {
  let next_start = match quarter {
    | Quarter::Q4 => {
      start_of_year(
        year.saturating_add(1),
        conventions
      )?
    }
    | other => {
      let next = Quarter::from_number(
        other.number() + 1
      )?;
      start_of_quarter(
        year,
        next,
        conventions
      )?
    }
  };
  add_days(next_start, -1)
}
