use chrono::{Datelike, NaiveDate};
use tracing::debug;

use crate::boundary::{add_days, first_day_of_month, last_day_of_month, start_of_week_containing};
use crate::conventions::WeekStartDay;
use crate::error::CalendarError;

pub const TWO_WEEK_DAYS: usize = 14;
pub const THREE_WEEK_DAYS: usize = 21;
pub const MONTH_GRID_DAYS: usize = 35;

/// Two consecutive weeks around a target date, as offsets from the start of
/// the target's week.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TwoWeekWindow {
    pub anchor: NaiveDate,
    pub offsets: [i64; TWO_WEEK_DAYS],
    pub anchor_is_next_week: bool,
}

impl TwoWeekWindow {
    pub fn dates(&self) -> Result<Vec<NaiveDate>, CalendarError> {
        offsets_to_dates(self.anchor, &self.offsets)
    }

    /// First day of the upper row.
    pub fn first_day(&self) -> Result<NaiveDate, CalendarError> {
        add_days(self.anchor, self.offsets[0])
    }
}

/// Whether the two-week strip for `day` shows the following week instead of
/// the previous one. True for the last three columns of a week.
pub fn shows_next_week(day: chrono::Weekday, week_start: WeekStartDay) -> bool {
    week_start.position_of(day) >= 4
}

pub fn build_two_week_offsets(
    target: NaiveDate,
    week_start: WeekStartDay,
) -> Result<TwoWeekWindow, CalendarError> {
    let anchor = start_of_week_containing(target, week_start)?;
    let anchor_is_next_week = shows_next_week(target.weekday(), week_start);
    let first = if anchor_is_next_week { 0 } else { -7 };
    let offsets = std::array::from_fn(|i| first + i as i64);
    debug!(%target, %anchor, anchor_is_next_week, "built two-week window");
    Ok(TwoWeekWindow {
        anchor,
        offsets,
        anchor_is_next_week,
    })
}

/// Previous, current and next week: -7..=13.
pub fn build_three_week_offsets() -> [i64; THREE_WEEK_DAYS] {
    std::array::from_fn(|i| i as i64 - 7)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreeWeekWindow {
    pub anchor: NaiveDate,
    pub offsets: [i64; THREE_WEEK_DAYS],
}

impl ThreeWeekWindow {
    pub fn dates(&self) -> Result<Vec<NaiveDate>, CalendarError> {
        offsets_to_dates(self.anchor, &self.offsets)
    }

    /// Start dates of the three rows.
    pub fn week_starts(&self) -> Result<[NaiveDate; 3], CalendarError> {
        Ok([
            add_days(self.anchor, -7)?,
            self.anchor,
            add_days(self.anchor, 7)?,
        ])
    }
}

pub fn build_three_week_window(
    target: NaiveDate,
    week_start: WeekStartDay,
) -> Result<ThreeWeekWindow, CalendarError> {
    Ok(ThreeWeekWindow {
        anchor: start_of_week_containing(target, week_start)?,
        offsets: build_three_week_offsets(),
    })
}

/// Five-row month grid starting at the week that holds the 1st.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthGrid {
    pub year: i32,
    pub month: u32,
    pub first_grid_day: NaiveDate,
    pub offsets: [i64; MONTH_GRID_DAYS],
}

impl MonthGrid {
    pub fn dates(&self) -> Result<Vec<NaiveDate>, CalendarError> {
        offsets_to_dates(self.first_grid_day, &self.offsets)
    }

    pub fn row_starts(&self) -> Result<[NaiveDate; 5], CalendarError> {
        let mut starts = [self.first_grid_day; 5];
        for (row, start) in starts.iter_mut().enumerate() {
            *start = add_days(self.first_grid_day, row as i64 * 7)?;
        }
        Ok(starts)
    }

    pub fn in_month(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// Days of the month that fall after the fifth row. A 31-day month
    /// starting late in the week needs a sixth row that this grid never
    /// draws.
    pub fn truncated_days(&self) -> Result<Vec<NaiveDate>, CalendarError> {
        let last_shown = add_days(self.first_grid_day, MONTH_GRID_DAYS as i64 - 1)?;
        let last = last_day_of_month(self.year, self.month)?;
        let mut hidden = Vec::new();
        let mut day = add_days(last_shown, 1)?;
        while day <= last {
            hidden.push(day);
            day = add_days(day, 1)?;
        }
        Ok(hidden)
    }
}

pub fn build_month_grid(
    year: i32,
    month: u32,
    week_start: WeekStartDay,
) -> Result<MonthGrid, CalendarError> {
    let first = first_day_of_month(year, month)?;
    let first_grid_day = start_of_week_containing(first, week_start)?;
    let grid = MonthGrid {
        year,
        month,
        first_grid_day,
        offsets: std::array::from_fn(|i| i as i64),
    };
    let hidden = grid.truncated_days()?;
    if !hidden.is_empty() {
        debug!(year, month, hidden = hidden.len(), "month grid truncates trailing days");
    }
    Ok(grid)
}

fn offsets_to_dates(anchor: NaiveDate, offsets: &[i64]) -> Result<Vec<NaiveDate>, CalendarError> {
    offsets
        .iter()
        .map(|offset| add_days(anchor, *offset))
        .collect()
}
