//! Public holidays from built-in rule sets.

use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate, Weekday};
use tracing::{debug, info};

use crate::boundary::{add_days, first_day_of_month, last_day_of_month};
use crate::error::CalendarError;

pub const SUPPORTED_COUNTRIES: [&str; 4] = ["US", "GB", "DE", "FR"];

/// Anything that can name the holiday on a date.
pub trait HolidayLookup {
    fn holiday_name(&self, date: NaiveDate) -> anyhow::Result<Option<String>>;

    /// Switches the country; lookups without a country answer `None`.
    fn set_country(&mut self, _country: Option<&str>) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateRule {
    Fixed { month: u32, day: u32 },
    /// `nth` occurrence (1-based) of `weekday` in `month`.
    NthWeekday { month: u32, weekday: Weekday, nth: u32 },
    LastWeekday { month: u32, weekday: Weekday },
    /// Days after Easter Sunday.
    Easter { offset: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HolidayRule {
    name: &'static str,
    rule: DateRule,
    since: Option<i32>,
}

const fn fixed(name: &'static str, month: u32, day: u32) -> HolidayRule {
    HolidayRule {
        name,
        rule: DateRule::Fixed { month, day },
        since: None,
    }
}

const fn nth(name: &'static str, month: u32, weekday: Weekday, nth: u32) -> HolidayRule {
    HolidayRule {
        name,
        rule: DateRule::NthWeekday { month, weekday, nth },
        since: None,
    }
}

const fn last(name: &'static str, month: u32, weekday: Weekday) -> HolidayRule {
    HolidayRule {
        name,
        rule: DateRule::LastWeekday { month, weekday },
        since: None,
    }
}

const fn easter(name: &'static str, offset: i64) -> HolidayRule {
    HolidayRule {
        name,
        rule: DateRule::Easter { offset },
        since: None,
    }
}

const fn since(rule: HolidayRule, year: i32) -> HolidayRule {
    HolidayRule {
        since: Some(year),
        ..rule
    }
}

const US_RULES: &[HolidayRule] = &[
    fixed("New Year's Day", 1, 1),
    nth("Martin Luther King Jr. Day", 1, Weekday::Mon, 3),
    nth("Washington's Birthday", 2, Weekday::Mon, 3),
    last("Memorial Day", 5, Weekday::Mon),
    since(fixed("Juneteenth", 6, 19), 2021),
    fixed("Independence Day", 7, 4),
    nth("Labor Day", 9, Weekday::Mon, 1),
    nth("Columbus Day", 10, Weekday::Mon, 2),
    fixed("Veterans Day", 11, 11),
    nth("Thanksgiving Day", 11, Weekday::Thu, 4),
    fixed("Christmas Day", 12, 25),
];

const GB_RULES: &[HolidayRule] = &[
    fixed("New Year's Day", 1, 1),
    easter("Good Friday", -2),
    easter("Easter Monday", 1),
    nth("Early May bank holiday", 5, Weekday::Mon, 1),
    last("Spring bank holiday", 5, Weekday::Mon),
    last("Summer bank holiday", 8, Weekday::Mon),
    fixed("Christmas Day", 12, 25),
    fixed("Boxing Day", 12, 26),
];

const DE_RULES: &[HolidayRule] = &[
    fixed("Neujahr", 1, 1),
    easter("Karfreitag", -2),
    easter("Ostermontag", 1),
    fixed("Tag der Arbeit", 5, 1),
    easter("Christi Himmelfahrt", 39),
    easter("Pfingstmontag", 50),
    since(fixed("Tag der Deutschen Einheit", 10, 3), 1990),
    fixed("1. Weihnachtstag", 12, 25),
    fixed("2. Weihnachtstag", 12, 26),
];

const FR_RULES: &[HolidayRule] = &[
    fixed("Jour de l'an", 1, 1),
    easter("Lundi de Pâques", 1),
    fixed("Fête du Travail", 5, 1),
    fixed("Victoire 1945", 5, 8),
    easter("Ascension", 39),
    easter("Lundi de Pentecôte", 50),
    fixed("Fête nationale", 7, 14),
    fixed("Assomption", 8, 15),
    fixed("Toussaint", 11, 1),
    fixed("Armistice 1918", 11, 11),
    fixed("Noël", 12, 25),
];

/// Easter Sunday in the Gregorian calendar (anonymous computus).
pub fn easter_sunday(year: i32) -> Result<NaiveDate, CalendarError> {
    let a = year.rem_euclid(19);
    let b = year.div_euclid(100);
    let c = year.rem_euclid(100);
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    u32::try_from(month)
        .ok()
        .zip(u32::try_from(day).ok())
        .and_then(|(month, day)| NaiveDate::from_ymd_opt(year, month, day))
        .ok_or(CalendarError::InvalidYear(year))
}

fn nth_weekday(year: i32, month: u32, weekday: Weekday, nth: u32) -> Result<NaiveDate, CalendarError> {
    let first = first_day_of_month(year, month)?;
    let lead = (7 + weekday.num_days_from_monday() - first.weekday().num_days_from_monday()) % 7;
    add_days(first, i64::from(lead + (nth.max(1) - 1) * 7))
}

fn last_weekday(year: i32, month: u32, weekday: Weekday) -> Result<NaiveDate, CalendarError> {
    let last = last_day_of_month(year, month)?;
    let back = (7 + last.weekday().num_days_from_monday() - weekday.num_days_from_monday()) % 7;
    add_days(last, -i64::from(back))
}

impl HolidayRule {
    fn date_in(&self, year: i32) -> Result<Option<NaiveDate>, CalendarError> {
        if self.since.is_some_and(|first| year < first) {
            return Ok(None);
        }
        let date = match self.rule {
            DateRule::Fixed { month, day } => NaiveDate::from_ymd_opt(year, month, day),
            DateRule::NthWeekday { month, weekday, nth } => {
                Some(nth_weekday(year, month, weekday, nth)?)
            }
            DateRule::LastWeekday { month, weekday } => Some(last_weekday(year, month, weekday)?),
            DateRule::Easter { offset } => Some(add_days(easter_sunday(year)?, offset)?),
        };
        Ok(date)
    }
}

/// Rule-based holidays for one country.
#[derive(Debug, Clone)]
pub struct RuleHolidays {
    country: String,
    rules: &'static [HolidayRule],
}

impl RuleHolidays {
    pub fn for_country(country: &str) -> Result<Self, CalendarError> {
        let code = country.trim().to_ascii_uppercase();
        let rules = match code.as_str() {
            "US" => US_RULES,
            "GB" | "UK" => GB_RULES,
            "DE" => DE_RULES,
            "FR" => FR_RULES,
            _ => return Err(CalendarError::UnknownCountry(country.trim().to_string())),
        };
        Ok(Self {
            country: code,
            rules,
        })
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    /// All holidays of `year`, in date order.
    pub fn holidays_in(&self, year: i32) -> Result<Vec<(NaiveDate, &'static str)>, CalendarError> {
        let mut out = Vec::with_capacity(self.rules.len());
        for rule in self.rules {
            if let Some(date) = rule.date_in(year)? {
                out.push((date, rule.name));
            }
        }
        out.sort();
        Ok(out)
    }
}

impl HolidayLookup for RuleHolidays {
    fn holiday_name(&self, date: NaiveDate) -> anyhow::Result<Option<String>> {
        let names = self
            .holidays_in(date.year())?
            .into_iter()
            .filter(|(day, _)| *day == date)
            .map(|(_, name)| name)
            .collect::<Vec<_>>();
        Ok((!names.is_empty()).then(|| names.join(", ")))
    }
}

/// Holiday provider that is built on first use and rebuilt when the
/// configured country changes.
#[derive(Debug, Default)]
pub struct HolidayService {
    country: Option<String>,
    provider: OnceLock<Result<Option<RuleHolidays>, CalendarError>>,
}

impl HolidayService {
    pub fn new(country: Option<&str>) -> Self {
        Self {
            country: normalize_country(country),
            provider: OnceLock::new(),
        }
    }

    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }

    fn provider(&self) -> &Result<Option<RuleHolidays>, CalendarError> {
        self.provider.get_or_init(|| {
            let Some(country) = self.country.as_deref() else {
                return Ok(None);
            };
            let provider = RuleHolidays::for_country(country)?;
            info!(country, "initialised holiday provider");
            Ok(Some(provider))
        })
    }

    /// The error from the last initialisation, if it failed.
    pub fn init_error(&self) -> Option<CalendarError> {
        self.provider().as_ref().err().cloned()
    }
}

impl HolidayLookup for HolidayService {
    fn holiday_name(&self, date: NaiveDate) -> anyhow::Result<Option<String>> {
        match self.provider() {
            Ok(Some(provider)) => provider.holiday_name(date),
            Ok(None) => Ok(None),
            Err(error) => Err(error.clone().into()),
        }
    }

    fn set_country(&mut self, country: Option<&str>) {
        let country = normalize_country(country);
        if country != self.country {
            debug!(from = ?self.country, to = ?country, "holiday country changed");
            self.country = country;
            self.provider = OnceLock::new();
        }
    }
}

fn normalize_country(country: Option<&str>) -> Option<String> {
    country
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_ascii_uppercase)
}
