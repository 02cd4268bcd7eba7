use std::fmt::{self, Write as _};
use std::str::FromStr;

use chrono::format::{Item, StrftimeItems};
use chrono::{NaiveDate, Weekday};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::CalendarError;

pub const DEFAULT_JOURNAL_FORMAT: &str = "%Y/%m/%d";

/// Which week-numbering algorithm is in force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekStandard {
    #[default]
    Iso,
    Us,
}

impl WeekStandard {
    /// The day numbered weeks begin on.
    pub fn weeks_start_on(self) -> WeekStartDay {
        match self {
            WeekStandard::Iso => WeekStartDay::Monday,
            WeekStandard::Us => WeekStartDay::Sunday,
        }
    }
}

impl FromStr for WeekStandard {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "iso" | "iso8601" | "iso-8601" => Ok(WeekStandard::Iso),
            "us" | "usa" => Ok(WeekStandard::Us),
            other => Err(CalendarError::InvalidSetting {
                key: "week.standard".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekStartDay {
    Sunday,
    Monday,
    Saturday,
}

impl WeekStartDay {
    pub fn weekday(self) -> Weekday {
        match self {
            WeekStartDay::Sunday => Weekday::Sun,
            WeekStartDay::Monday => Weekday::Mon,
            WeekStartDay::Saturday => Weekday::Sat,
        }
    }

    /// Zero-based column of `day` in a week that starts on `self`.
    pub fn position_of(self, day: Weekday) -> u32 {
        (7 + day.num_days_from_monday() - self.weekday().num_days_from_monday()) % 7
    }

    /// The seven weekdays in column order.
    pub fn columns(self) -> [Weekday; 7] {
        let mut day = self.weekday();
        std::array::from_fn(|_| {
            let current = day;
            day = day.succ();
            current
        })
    }
}

impl FromStr for WeekStartDay {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sunday" | "sun" => Ok(WeekStartDay::Sunday),
            "monday" | "mon" => Ok(WeekStartDay::Monday),
            "saturday" | "sat" => Ok(WeekStartDay::Saturday),
            other => Err(CalendarError::InvalidSetting {
                key: "week.start".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Page-name grammar for period pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum PageNameFormat {
    /// `2023-W05`
    #[default]
    YyyyWww,
    /// `2023/Q1/W05`
    YyyySlashQqqSlashWww,
    /// `2023-Q1-W05`
    YyyyQqqWww,
    /// `2023/W05`
    YyyySlashWww,
}

impl PageNameFormat {
    pub const ALL: [PageNameFormat; 4] = [
        PageNameFormat::YyyyWww,
        PageNameFormat::YyyySlashQqqSlashWww,
        PageNameFormat::YyyyQqqWww,
        PageNameFormat::YyyySlashWww,
    ];

    pub fn as_setting(self) -> &'static str {
        match self {
            PageNameFormat::YyyyWww => "YYYY-Www",
            PageNameFormat::YyyySlashQqqSlashWww => "YYYY/qqq/Www",
            PageNameFormat::YyyyQqqWww => "YYYY-qqq-Www",
            PageNameFormat::YyyySlashWww => "YYYY/Www",
        }
    }

    pub fn separator(self) -> char {
        match self {
            PageNameFormat::YyyyWww | PageNameFormat::YyyyQqqWww => '-',
            PageNameFormat::YyyySlashQqqSlashWww | PageNameFormat::YyyySlashWww => '/',
        }
    }

    pub fn embeds_quarter(self) -> bool {
        matches!(
            self,
            PageNameFormat::YyyySlashQqqSlashWww | PageNameFormat::YyyyQqqWww
        )
    }
}

impl fmt::Display for PageNameFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_setting())
    }
}

impl FromStr for PageNameFormat {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        PageNameFormat::ALL
            .into_iter()
            .find(|format| format.as_setting().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| CalendarError::InvalidSetting {
                key: "page.format".to_string(),
                value: wanted.to_string(),
            })
    }
}

/// Locale used for labels; `default` falls back to English.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LocaleTag(String);

impl LocaleTag {
    pub fn new(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Self("default".to_string())
        } else {
            Self(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lower-case primary language subtag (`de-DE` -> `de`).
    pub fn language(&self) -> String {
        if self.0.eq_ignore_ascii_case("default") {
            return "en".to_string();
        }
        self.0
            .split(['-', '_'])
            .next()
            .unwrap_or("en")
            .to_ascii_lowercase()
    }
}

impl Default for LocaleTag {
    fn default() -> Self {
        Self::new("default")
    }
}

/// The canonical parameter set every resolver call receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarConventions {
    pub week_standard: WeekStandard,
    pub week_start_override: Option<WeekStartDay>,
    pub page_name_format: PageNameFormat,
    pub locale: LocaleTag,
    pub journal_format: String,
}

impl Default for CalendarConventions {
    fn default() -> Self {
        Self {
            week_standard: WeekStandard::Iso,
            week_start_override: None,
            page_name_format: PageNameFormat::YyyyWww,
            locale: LocaleTag::default(),
            journal_format: DEFAULT_JOURNAL_FORMAT.to_string(),
        }
    }
}

impl CalendarConventions {
    #[tracing::instrument(skip(cfg))]
    pub fn from_config(cfg: &Config) -> Self {
        let defaults = Self::default();
        let journal_format = match cfg.get("journal.format") {
            Some(raw) if is_valid_strftime(&raw) => raw,
            Some(raw) => {
                warn!(value = %raw, "invalid journal.format; using default");
                defaults.journal_format.clone()
            }
            None => defaults.journal_format.clone(),
        };

        let conventions = Self {
            week_standard: setting(cfg, "week.standard").unwrap_or(defaults.week_standard),
            week_start_override: setting(cfg, "week.start"),
            page_name_format: setting(cfg, "page.format").unwrap_or(defaults.page_name_format),
            locale: cfg
                .get("locale")
                .map(|raw| LocaleTag::new(&raw))
                .unwrap_or_default(),
            journal_format,
        };
        debug!(
            standard = ?conventions.week_standard,
            week_start = ?conventions.week_start_override,
            format = %conventions.page_name_format,
            locale = conventions.locale.as_str(),
            "resolved calendar conventions"
        );
        conventions
    }

    pub fn numbering_week_start(&self) -> WeekStartDay {
        self.week_standard.weeks_start_on()
    }

    /// First column of rendered grids.
    pub fn grid_week_start(&self) -> WeekStartDay {
        self.week_start_override
            .unwrap_or_else(|| self.numbering_week_start())
    }

    /// Title of the host's daily journal page for `date`.
    pub fn journal_page_name(&self, date: NaiveDate) -> String {
        let mut out = String::new();
        if write!(out, "{}", date.format(&self.journal_format)).is_err() {
            out.clear();
            out.push_str(&date.format(DEFAULT_JOURNAL_FORMAT).to_string());
        }
        out
    }
}

fn setting<T>(cfg: &Config, key: &str) -> Option<T>
where
    T: FromStr<Err = CalendarError>,
{
    let raw = cfg.get(key)?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(key, %error, "ignoring invalid setting");
            None
        }
    }
}

fn is_valid_strftime(pattern: &str) -> bool {
    !StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error))
}
