//! Period page names.
//!
//! The strings produced here are the only artefact this crate persists:
//! hosts look pages up by them and re-parse titles to decide whether a page
//! is a period page. Every formatter therefore has a parser that accepts
//! exactly what the formatter produces for the same format.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::boundary::first_day_of_month;
use crate::conventions::PageNameFormat;
use crate::error::CalendarError;
use crate::quarter::Quarter;
use crate::week::{validate_year, WeekIdentity};

const WEEK_PATTERN: &str =
    r"^(?P<year>\d{4})[-/](?:Q(?P<quarter>[1-4])[-/])?W(?P<week>\d{2})$";
const MONTH_PATTERN: &str = r"^(?P<year>\d{4})[-/](?P<month>\d{2})$";
const QUARTER_PATTERN: &str = r"^(?P<year>\d{4})[-/]Q(?P<quarter>[1-4])$";
const YEAR_PATTERN: &str = r"^(?P<year>\d{4})$";

/// A page whose title encodes a calendar period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PeriodPage {
    Week { identity: WeekIdentity },
    Month { year: i32, month: u32 },
    Quarter { year: i32, quarter: Quarter },
    Year { year: i32 },
}

impl PeriodPage {
    pub fn kind(&self) -> &'static str {
        match self {
            PeriodPage::Week { .. } => "week",
            PeriodPage::Month { .. } => "month",
            PeriodPage::Quarter { .. } => "quarter",
            PeriodPage::Year { .. } => "year",
        }
    }

    pub fn page_name(&self, format: PageNameFormat) -> Result<String, CalendarError> {
        match *self {
            PeriodPage::Week { identity } => Ok(format_week_page(identity, format)),
            PeriodPage::Month { year, month } => format_month_page(year, month, format),
            PeriodPage::Quarter { year, quarter } => format_quarter_page(year, quarter, format),
            PeriodPage::Year { year } => format_year_page(year),
        }
    }
}

/// Week page name; the embedded quarter (where the format has one) is always
/// the week's own band so names cannot contradict themselves.
pub fn format_week_page(identity: WeekIdentity, format: PageNameFormat) -> String {
    let year = identity.year();
    let week = identity.week_string();
    let quarter = identity.quarter();
    match format {
        PageNameFormat::YyyyWww => format!("{year:04}-W{week}"),
        PageNameFormat::YyyySlashQqqSlashWww => format!("{year:04}/{quarter}/W{week}"),
        PageNameFormat::YyyyQqqWww => format!("{year:04}-{quarter}-W{week}"),
        PageNameFormat::YyyySlashWww => format!("{year:04}/W{week}"),
    }
}

pub fn format_month_page(
    year: i32,
    month: u32,
    format: PageNameFormat,
) -> Result<String, CalendarError> {
    validate_year(year)?;
    first_day_of_month(year, month)?;
    Ok(format!("{year:04}{}{month:02}", format.separator()))
}

pub fn format_quarter_page(
    year: i32,
    quarter: Quarter,
    format: PageNameFormat,
) -> Result<String, CalendarError> {
    validate_year(year)?;
    Ok(format!("{year:04}{}{quarter}", format.separator()))
}

pub fn format_year_page(year: i32) -> Result<String, CalendarError> {
    validate_year(year)?;
    Ok(format!("{year:04}"))
}

pub fn parse_week_page(name: &str, format: PageNameFormat) -> Option<WeekIdentity> {
    let caps = compiled(&WEEK_RE, WEEK_PATTERN)?.captures(name.trim())?;
    let year = caps.name("year")?.as_str().parse().ok()?;
    let week = caps.name("week")?.as_str().parse().ok()?;
    let identity = WeekIdentity::new(year, week).ok()?;
    (format_week_page(identity, format) == name.trim()).then_some(identity)
}

pub fn parse_month_page(name: &str, format: PageNameFormat) -> Option<(i32, u32)> {
    let caps = compiled(&MONTH_RE, MONTH_PATTERN)?.captures(name.trim())?;
    let year = caps.name("year")?.as_str().parse().ok()?;
    let month = caps.name("month")?.as_str().parse().ok()?;
    let formatted = format_month_page(year, month, format).ok()?;
    (formatted == name.trim()).then_some((year, month))
}

pub fn parse_quarter_page(name: &str, format: PageNameFormat) -> Option<(i32, Quarter)> {
    let caps = compiled(&QUARTER_RE, QUARTER_PATTERN)?.captures(name.trim())?;
    let year = caps.name("year")?.as_str().parse().ok()?;
    let quarter = Quarter::from_number(caps.name("quarter")?.as_str().parse().ok()?).ok()?;
    let formatted = format_quarter_page(year, quarter, format).ok()?;
    (formatted == name.trim()).then_some((year, quarter))
}

pub fn parse_year_page(name: &str) -> Option<i32> {
    let caps = compiled(&YEAR_RE, YEAR_PATTERN)?.captures(name.trim())?;
    let year = caps.name("year")?.as_str().parse().ok()?;
    validate_year(year).ok()
}

/// Decides whether `name` is a period page under `format`.
pub fn classify_page(name: &str, format: PageNameFormat) -> Option<PeriodPage> {
    if let Some(identity) = parse_week_page(name, format) {
        return Some(PeriodPage::Week { identity });
    }
    if let Some((year, month)) = parse_month_page(name, format) {
        return Some(PeriodPage::Month { year, month });
    }
    if let Some((year, quarter)) = parse_quarter_page(name, format) {
        return Some(PeriodPage::Quarter { year, quarter });
    }
    parse_year_page(name).map(|year| PeriodPage::Year { year })
}

static WEEK_RE: OnceLock<Option<Regex>> = OnceLock::new();
static MONTH_RE: OnceLock<Option<Regex>> = OnceLock::new();
static QUARTER_RE: OnceLock<Option<Regex>> = OnceLock::new();
static YEAR_RE: OnceLock<Option<Regex>> = OnceLock::new();

fn compiled(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| match Regex::new(pattern) {
        Ok(regex) => Some(regex),
        Err(error) => {
            tracing::error!(pattern, %error, "internal page-name regex failed to compile");
            None
        }
    })
    .as_ref()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn week(year: i32, week: u32) -> WeekIdentity {
        WeekIdentity::new(year, week).expect("valid identity")
    }

    #[test]
    fn formats_every_variant() {
        let id = week(2023, 5);
        assert_eq!(format_week_page(id, PageNameFormat::YyyyWww), "2023-W05");
        assert_eq!(
            format_week_page(id, PageNameFormat::YyyySlashQqqSlashWww),
            "2023/Q1/W05"
        );
        assert_eq!(format_week_page(id, PageNameFormat::YyyyQqqWww), "2023-Q1-W05");
        assert_eq!(format_week_page(id, PageNameFormat::YyyySlashWww), "2023/W05");
        assert_eq!(
            format_week_page(week(2022, 52), PageNameFormat::YyyyWww),
            "2022-W52"
        );
        assert_eq!(
            format_month_page(2023, 1, PageNameFormat::YyyySlashWww).as_deref(),
            Ok("2023/01")
        );
        assert_eq!(
            format_quarter_page(2023, Quarter::Q4, PageNameFormat::YyyyQqqWww).as_deref(),
            Ok("2023-Q4")
        );
        assert_eq!(format_year_page(812).as_deref(), Ok("0812"));
        assert!(format_month_page(2023, 13, PageNameFormat::YyyyWww).is_err());
    }

    #[test]
    fn parsers_reject_other_formats_and_inconsistent_quarters() {
        assert_eq!(parse_week_page("2023/W05", PageNameFormat::YyyyWww), None);
        assert_eq!(
            parse_week_page("2023/Q2/W05", PageNameFormat::YyyySlashQqqSlashWww),
            None
        );
        assert_eq!(parse_month_page("2023-01", PageNameFormat::YyyySlashWww), None);
        assert_eq!(parse_week_page("2023-W54", PageNameFormat::YyyyWww), None);
        assert_eq!(parse_week_page("2023-W5", PageNameFormat::YyyyWww), None);
    }

    #[test]
    fn classifies_period_pages() {
        let format = PageNameFormat::YyyySlashQqqSlashWww;
        assert_eq!(
            classify_page("2024/Q3/W27", format),
            Some(PeriodPage::Week { identity: week(2024, 27) })
        );
        assert_eq!(
            classify_page("2024/07", format),
            Some(PeriodPage::Month { year: 2024, month: 7 })
        );
        assert_eq!(
            classify_page("2024/Q3", format),
            Some(PeriodPage::Quarter { year: 2024, quarter: Quarter::Q3 })
        );
        assert_eq!(classify_page("2024", format), Some(PeriodPage::Year { year: 2024 }));
        assert_eq!(classify_page("Groceries", format), None);
        assert_eq!(classify_page("2024-07", format), None);
    }

    fn any_format() -> impl Strategy<Value = PageNameFormat> {
        prop::sample::select(PageNameFormat::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn week_names_round_trip(year in 1_i32..=9999, wk in 1_u32..=53, format in any_format()) {
            let id = week(year, wk);
            let name = format_week_page(id, format);
            prop_assert_eq!(parse_week_page(&name, format), Some(id));
            prop_assert_eq!(classify_page(&name, format), Some(PeriodPage::Week { identity: id }));
        }

        #[test]
        fn month_names_round_trip(year in 1_i32..=9999, month in 1_u32..=12, format in any_format()) {
            let name = format_month_page(year, month, format).expect("format month");
            prop_assert_eq!(parse_month_page(&name, format), Some((year, month)));
        }
    }
}
