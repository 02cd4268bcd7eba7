use std::fmt;

use chrono::{
  Datelike,
  NaiveDate
};
use serde::Serialize;
use tracing::{
  debug,
  warn
};

use crate::boundary::{
  add_days,
  start_of_week_containing
};
use crate::conventions::{
  CalendarConventions,
  WeekStandard,
  WeekStartDay
};
use crate::error::CalendarError;
use crate::quarter::{
  Quarter,
  quarter_of
};

pub const MIN_YEAR: i32 = 1;
pub const MAX_YEAR: i32 = 9999;

/// A numbered week. The year is the
/// week-year, which can differ from the
/// calendar year of dates at either end
/// of it.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize
)]
pub struct WeekIdentity {
  year: i32,
  week: u32
}

impl WeekIdentity {
  pub fn new(
    year: i32,
    week: u32
  ) -> Result<Self, CalendarError> {
    validate_year(year)?;
    if !(1..=53).contains(&week) {
      return Err(
        CalendarError::InvalidWeek {
          year,
          week: i64::from(week)
        }
      );
    }
    Ok(Self { year, week })
  }

  pub fn year(self) -> i32 {
    self.year
  }

  pub fn week(self) -> u32 {
    self.week
  }

  /// Two-digit week, as used in page
  /// names.
  pub fn week_string(self) -> String {
    format!("{:02}", self.week)
  }

  pub fn quarter(self) -> Quarter {
    quarter_of(self.week)
  }
}

impl fmt::Display for WeekIdentity {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    write!(
      f,
      "{:04}-W{:02}",
      self.year, self.week
    )
  }
}

pub(crate) fn validate_year(
  year: i32
) -> Result<i32, CalendarError> {
  if (MIN_YEAR..=MAX_YEAR)
    .contains(&year)
  {
    Ok(year)
  } else {
    Err(CalendarError::InvalidYear(year))
  }
}

/// Resolves the week a date belongs to.
#[tracing::instrument(level = "trace")]
pub fn resolve(
  date: NaiveDate,
  standard: WeekStandard
) -> Result<WeekIdentity, CalendarError> {
  let (year, week) = match standard {
    | WeekStandard::Iso => {
      let iso = date.iso_week();
      (iso.year(), i64::from(iso.week()))
    }
    | WeekStandard::Us => us_week(date)?
  };

  let identity = u32::try_from(week)
    .map_err(|_| {
      CalendarError::InvalidWeek {
        year,
        week
      }
    })
    .and_then(|week| {
      WeekIdentity::new(year, week)
    });
  if let Err(error) = &identity {
    warn!(
      %date,
      ?standard,
      %error,
      "week resolution produced an invalid identity"
    );
  }
  identity
}

/// Sunday-start week-year in which week 1
/// is the week holding January 1.
fn us_week(
  date: NaiveDate
) -> Result<(i32, i64), CalendarError> {
  let start = WeekStartDay::Sunday;
  let year = date.year();
  let next_year = year
    .checked_add(1)
    .ok_or(CalendarError::InvalidYear(
      year
    ))?;
  let next_anchor =
    first_week_start(next_year, start)?;
  let week_year = if date >= next_anchor
  {
    next_year
  } else {
    year
  };

  let anchor =
    first_week_start(week_year, start)?;
  let row =
    start_of_week_containing(date, start)?;
  let days =
    row.signed_duration_since(anchor)
      .num_days();
  Ok((week_year, days / 7 + 1))
}

/// Start of the week (beginning on
/// `start`) that holds January 1.
fn first_week_start(
  year: i32,
  start: WeekStartDay
) -> Result<NaiveDate, CalendarError> {
  let jan1 =
    NaiveDate::from_ymd_opt(year, 1, 1)
      .ok_or(CalendarError::InvalidYear(
        year
      ))?;
  start_of_week_containing(jan1, start)
}

/// First day of `week` in `year`.
///
/// Without an override, or when the
/// override equals the standard's own start
/// day, this is the numbering start of the
/// week. With a differing override it is
/// the start of the grid row whose middle
/// day falls inside the week, which keeps
/// it consistent with [`row_identity`].
#[tracing::instrument(level = "trace")]
pub fn start_of_week(
  year: i32,
  week: u32,
  standard: WeekStandard,
  override_start: Option<WeekStartDay>
) -> Result<NaiveDate, CalendarError> {
  validate_year(year)?;
  if !(1..=53).contains(&week) {
    return Err(
      CalendarError::InvalidWeek {
        year,
        week: i64::from(week)
      }
    );
  }
  let whole_weeks = i64::from(week);

  let numbering_start = match standard {
    | WeekStandard::Iso => {
      let jan4 =
        NaiveDate::from_ymd_opt(
          year, 1, 4
        )
        .ok_or(
          CalendarError::InvalidYear(
            year
          )
        )?;
      let first =
        start_of_week_containing(
          jan4,
          WeekStartDay::Monday
        )?;
      let candidate = add_days(
        first,
        (whole_weeks - 1) * 7
      )?;
      if candidate.iso_week().year()
        == year
      {
        candidate
      } else {
        debug!(
          year,
          week,
          %candidate,
          "ISO week left its year; \
           using whole-week fallback"
        );
        add_days(first, whole_weeks * 7)?
      }
    }
    | WeekStandard::Us => {
      let anchor = first_week_start(
        year,
        WeekStartDay::Sunday
      )?;
      add_days(
        anchor,
        (whole_weeks - 1) * 7
      )?
    }
  };

  match override_start {
    | Some(grid)
      if grid
        != standard.weeks_start_on() =>
    {
      start_of_week_containing(
        add_days(numbering_start, 3)?,
        grid
      )
    }
    | _ => Ok(numbering_start)
  }
}

/// [`start_of_week`] for an identity under
/// the given conventions.
pub fn start_of_identity(
  identity: WeekIdentity,
  conventions: &CalendarConventions
) -> Result<NaiveDate, CalendarError> {
  start_of_week(
    identity.year(),
    identity.week(),
    conventions.week_standard,
    conventions.week_start_override
  )
}

/// Identity shown beside a seven-day grid
/// row: the week of the row's middle day.
/// At least four of the row's days share
/// it whatever day the grid starts on.
pub fn row_identity(
  row_start: NaiveDate,
  standard: WeekStandard
) -> Result<WeekIdentity, CalendarError> {
  resolve(add_days(row_start, 3)?, standard)
}

/// Number of weeks in a week-year (52 or
/// 53).
pub fn weeks_in_year(
  year: i32,
  standard: WeekStandard
) -> Result<u32, CalendarError> {
  validate_year(year)?;
  match standard {
    | WeekStandard::Iso => {
      let dec28 =
        NaiveDate::from_ymd_opt(
          year, 12, 28
        )
        .ok_or(
          CalendarError::InvalidYear(
            year
          )
        )?;
      Ok(dec28.iso_week().week())
    }
    | WeekStandard::Us => {
      let next_anchor = first_week_start(
        year.saturating_add(1),
        WeekStartDay::Sunday
      )?;
      let last_day =
        add_days(next_anchor, -1)?;
      Ok(
        resolve(
          last_day,
          WeekStandard::Us
        )?
        .week()
      )
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::{
    Duration,
    NaiveDate
  };
  use proptest::prelude::*;

  use super::*;

  fn day(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  fn identity(
    year: i32,
    week: u32
  ) -> WeekIdentity {
    WeekIdentity::new(year, week)
      .expect("valid identity")
  }

  #[test]
  fn iso_new_year_belongs_to_previous_year(
  ) {
    let resolved = resolve(
      day(2023, 1, 1),
      WeekStandard::Iso
    )
    .expect("resolve");
    assert_eq!(resolved, identity(2022, 52));
    assert_eq!(resolved.week_string(), "52");
    assert_eq!(resolved.quarter(), Quarter::Q4);
  }

  #[test]
  fn us_new_year_is_week_one() {
    assert_eq!(
      resolve(
        day(2023, 1, 1),
        WeekStandard::Us
      ),
      Ok(identity(2023, 1))
    );
    assert_eq!(
      WeekStandard::Us.weeks_start_on(),
      WeekStartDay::Sunday
    );
  }

  #[test]
  fn us_year_end_rolls_into_next_week_year(
  ) {
    // 2023-12-31 is a Sunday and its week
    // holds 2024-01-01.
    assert_eq!(
      resolve(
        day(2023, 12, 31),
        WeekStandard::Us
      ),
      Ok(identity(2024, 1))
    );
    assert_eq!(
      resolve(
        day(2022, 12, 31),
        WeekStandard::Us
      ),
      Ok(identity(2022, 53))
    );
  }

  #[test]
  fn iso_week_53_years() {
    assert_eq!(
      resolve(
        day(2021, 1, 3),
        WeekStandard::Iso
      ),
      Ok(identity(2020, 53))
    );
    assert_eq!(
      weeks_in_year(2020, WeekStandard::Iso),
      Ok(53)
    );
    assert_eq!(
      weeks_in_year(2023, WeekStandard::Iso),
      Ok(52)
    );
    assert_eq!(
      weeks_in_year(2022, WeekStandard::Us),
      Ok(53)
    );
  }

  #[test]
  fn start_of_week_matches_known_dates() {
    assert_eq!(
      start_of_week(
        2022,
        52,
        WeekStandard::Iso,
        None
      ),
      Ok(day(2022, 12, 26))
    );
    assert_eq!(
      start_of_week(
        2023,
        1,
        WeekStandard::Us,
        None
      ),
      Ok(day(2023, 1, 1))
    );
    assert_eq!(
      start_of_week(
        2024,
        1,
        WeekStandard::Us,
        None
      ),
      Ok(day(2023, 12, 31))
    );
  }

  #[test]
  fn iso_week_past_year_end_uses_whole_week_fallback(
  ) {
    // 2023 has 52 ISO weeks, so week 53
    // falls into 2024 and the fallback
    // adds a further week.
    assert_eq!(
      start_of_week(
        2023,
        53,
        WeekStandard::Iso,
        None
      ),
      Ok(day(2024, 1, 8))
    );
  }

  #[test]
  fn override_moves_grid_start_not_identity(
  ) {
    let sunday_grid = start_of_week(
      2024,
      10,
      WeekStandard::Iso,
      Some(WeekStartDay::Sunday)
    )
    .expect("start");
    assert_eq!(sunday_grid, day(2024, 3, 3));
    assert_eq!(
      row_identity(
        sunday_grid,
        WeekStandard::Iso
      ),
      Ok(identity(2024, 10))
    );

    let monday_grid = start_of_week(
      2024,
      2,
      WeekStandard::Us,
      Some(WeekStartDay::Monday)
    )
    .expect("start");
    assert_eq!(monday_grid, day(2024, 1, 8));
    assert_eq!(
      row_identity(
        monday_grid,
        WeekStandard::Us
      ),
      Ok(identity(2024, 2))
    );

    assert_eq!(
      start_of_week(
        2024,
        10,
        WeekStandard::Iso,
        Some(WeekStartDay::Monday)
      ),
      start_of_week(
        2024,
        10,
        WeekStandard::Iso,
        None
      )
    );
  }

  #[test]
  fn rejects_out_of_range_inputs() {
    assert!(WeekIdentity::new(2024, 0).is_err());
    assert!(WeekIdentity::new(2024, 54).is_err());
    assert!(WeekIdentity::new(0, 1).is_err());
    assert!(
      start_of_week(
        2024,
        60,
        WeekStandard::Iso,
        None
      )
      .is_err()
    );
    assert!(
      resolve(
        day(10000, 6, 1),
        WeekStandard::Iso
      )
      .is_err()
    );
  }

  proptest! {
    #[test]
    fn iso_start_of_week_contains_date(offset in 0_i64..3_000_000) {
      let date = day(1, 1, 8) + Duration::days(offset);
      prop_assume!(date.year() < MAX_YEAR);
      let id = resolve(date, WeekStandard::Iso).expect("resolve");
      let start = start_of_week(id.year(), id.week(), WeekStandard::Iso, None)
        .expect("start of week");
      prop_assert!(start <= date);
      prop_assert!(date < start + Duration::days(7));
    }

    #[test]
    fn us_start_of_week_contains_date(offset in 0_i64..3_000_000) {
      let date = day(1, 1, 8) + Duration::days(offset);
      prop_assume!(date.year() < MAX_YEAR);
      let id = resolve(date, WeekStandard::Us).expect("resolve");
      let start = start_of_week(id.year(), id.week(), WeekStandard::Us, None)
        .expect("start of week");
      prop_assert!(start <= date);
      prop_assert!(date < start + Duration::days(7));
    }
  }
}
