use std::fmt;
use std::ops::RangeInclusive;

use serde::Serialize;

use crate::error::CalendarError;

/// Quarter of a week-numbered year.
///
/// Bands are fixed at 13/13/13/14 weeks so
/// a week page and its quarter page never
/// disagree, even where that drifts from
/// calendar-month quarters.
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
pub enum Quarter {
  Q1,
  Q2,
  Q3,
  Q4
}

impl Quarter {
  pub const ALL: [Quarter; 4] = [
    Quarter::Q1,
    Quarter::Q2,
    Quarter::Q3,
    Quarter::Q4
  ];

  pub fn from_number(
    number: u32
  ) -> Result<Self, CalendarError> {
    match number {
      | 1 => Ok(Quarter::Q1),
      | 2 => Ok(Quarter::Q2),
      | 3 => Ok(Quarter::Q3),
      | 4 => Ok(Quarter::Q4),
      | other => {
        Err(CalendarError::InvalidQuarter(
          other
        ))
      }
    }
  }

  pub fn number(self) -> u32 {
    match self {
      | Quarter::Q1 => 1,
      | Quarter::Q2 => 2,
      | Quarter::Q3 => 3,
      | Quarter::Q4 => 4
    }
  }

  pub fn first_week(self) -> u32 {
    match self {
      | Quarter::Q1 => 1,
      | Quarter::Q2 => 14,
      | Quarter::Q3 => 27,
      | Quarter::Q4 => 40
    }
  }

  /// Last week of the band; Q4 absorbs
  /// week 53 when the year has one.
  pub fn last_week(self) -> u32 {
    match self {
      | Quarter::Q1 => 13,
      | Quarter::Q2 => 26,
      | Quarter::Q3 => 39,
      | Quarter::Q4 => 53
    }
  }

  pub fn weeks(
    self
  ) -> RangeInclusive<u32> {
    self.first_week()..=self.last_week()
  }

  /// Calendar months listed on the
  /// quarter's rollup page.
  pub fn months(
    self
  ) -> RangeInclusive<u32> {
    let first = (self.number() - 1) * 3 + 1;
    first..=first + 2
  }
}

impl fmt::Display for Quarter {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    write!(f, "Q{}", self.number())
  }
}

/// Maps a week number to its quarter.
/// Total: week 0 lands in Q1 and anything
/// past 53 in Q4.
pub fn quarter_of(week: u32) -> Quarter {
  match week {
    | 0..=13 => Quarter::Q1,
    | 14..=26 => Quarter::Q2,
    | 27..=39 => Quarter::Q3,
    | _ => Quarter::Q4
  }
}
