//! User-maintained event lists.
//!
//! Each list is a plain text file with one `dateSpec::eventName` entry per
//! line. A two-part spec (`MM/dd`) recurs every year, a three-part spec
//! (`yyyy/MM/dd`) fires once. Numbers are compared as numbers, so `7/21`
//! and `07/21` name the same day.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{Config, expand_tilde};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct EventStyle {
    pub color: Option<String>,
    pub bold: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "repeat", rename_all = "lowercase")]
pub enum DateSpec {
    Yearly { month: u32, day: u32 },
    Once { year: i32, month: u32, day: u32 },
}

impl DateSpec {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let parts = raw.trim().split('/').map(str::trim).collect::<Vec<_>>();
        let number = |part: &str| -> anyhow::Result<u32> {
            part.parse::<u32>()
                .with_context(|| format!("invalid number {part:?} in date spec {raw:?}"))
        };
        let spec = match parts.as_slice() {
            [month, day] => DateSpec::Yearly {
                month: number(month)?,
                day: number(day)?,
            },
            [year, month, day] => DateSpec::Once {
                year: year
                    .parse::<i32>()
                    .with_context(|| format!("invalid year in date spec {raw:?}"))?,
                month: number(month)?,
                day: number(day)?,
            },
            _ => return Err(anyhow!("date spec {raw:?} must be MM/dd or yyyy/MM/dd")),
        };
        spec.validate()
            .with_context(|| format!("date spec {raw:?} names no calendar day"))?;
        Ok(spec)
    }

    fn validate(self) -> anyhow::Result<()> {
        let valid = match self {
            // A leap year accepts every real month/day pair.
            DateSpec::Yearly { month, day } => NaiveDate::from_ymd_opt(2000, month, day).is_some(),
            DateSpec::Once { year, month, day } => NaiveDate::from_ymd_opt(year, month, day).is_some(),
        };
        if valid {
            Ok(())
        } else {
            Err(anyhow!("out of range"))
        }
    }

    pub fn matches(self, date: NaiveDate) -> bool {
        match self {
            DateSpec::Yearly { month, day } => date.month() == month && date.day() == day,
            DateSpec::Once { year, month, day } => {
                date.year() == year && date.month() == month && date.day() == day
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserEvent {
    pub spec: DateSpec,
    pub name: String,
}

pub fn parse_event_line(line: &str) -> anyhow::Result<UserEvent> {
    let (spec, name) = line
        .split_once("::")
        .ok_or_else(|| anyhow!("expected dateSpec::eventName, got {line:?}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(anyhow!("event name is empty in {line:?}"));
    }
    Ok(UserEvent {
        spec: DateSpec::parse(spec)?,
        name: name.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserEventList {
    pub name: String,
    pub style: EventStyle,
    pub events: Vec<UserEvent>,
}

impl UserEventList {
    /// Parses list text. Blank lines and `#` comments are ignored; malformed
    /// lines are logged and skipped.
    pub fn parse(name: &str, style: EventStyle, text: &str) -> Self {
        let mut events = Vec::new();
        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match parse_event_line(line) {
                Ok(event) => events.push(event),
                Err(err) => {
                    warn!(list = name, line = index + 1, error = %err, "skipping event line")
                }
            }
        }
        Self {
            name: name.to_string(),
            style,
            events,
        }
    }

    #[tracing::instrument(skip(style))]
    pub fn load(name: &str, style: EventStyle, path: &Path) -> anyhow::Result<Self> {
        let path = expand_tilde(path);
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read event list {}", path.display()))?;
        let list = Self::parse(name, style, &text);
        debug!(list = name, events = list.events.len(), "loaded event list");
        Ok(list)
    }

    pub fn names_on(&self, date: NaiveDate) -> impl Iterator<Item = &str> {
        self.events
            .iter()
            .filter(move |event| event.spec.matches(date))
            .map(|event| event.name.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserEventMatch {
    pub names: Vec<String>,
    pub style: Option<EventStyle>,
}

impl UserEventMatch {
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Matched names, one per line.
    pub fn text(&self) -> String {
        self.names.join("\n")
    }
}

/// Collects every event on `date` across `lists`. The first list with a
/// match decides the style.
pub fn match_events(lists: &[UserEventList], date: NaiveDate) -> UserEventMatch {
    let mut found = UserEventMatch::default();
    for list in lists {
        let before = found.names.len();
        found.names.extend(list.names_on(date).map(str::to_string));
        if found.style.is_none() && found.names.len() > before {
            found.style = Some(list.style.clone());
        }
    }
    found
}

/// Where each configured list lives, sorted by list name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserEventSource {
    pub name: String,
    pub path: PathBuf,
    pub style: EventStyle,
}

pub fn user_event_sources(cfg: &Config) -> Vec<UserEventSource> {
    let mut sources = cfg
        .iter()
        .filter_map(|(key, _)| {
            let list = key.strip_prefix("events.")?.strip_suffix(".file")?;
            let path = cfg.get(key)?;
            Some(UserEventSource {
                name: list.to_string(),
                path: PathBuf::from(path),
                style: EventStyle {
                    color: cfg.get(&format!("events.{list}.color")),
                    bold: cfg.get_bool(&format!("events.{list}.bold")).unwrap_or(false),
                },
            })
        })
        .collect::<Vec<_>>();
    sources.sort_by(|a, b| a.name.cmp(&b.name));
    sources
}

/// Loads every configured list. A list that cannot be read contributes
/// nothing.
pub fn load_user_event_lists(sources: &[UserEventSource]) -> Vec<UserEventList> {
    sources
        .iter()
        .filter_map(
            |source| match UserEventList::load(&source.name, source.style.clone(), &source.path) {
                Ok(list) => Some(list),
                Err(err) => {
                    warn!(list = %source.name, error = %err, "event list unavailable");
                    None
                }
            },
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn yearly_specs_ignore_zero_padding() {
        let padded = parse_event_line("07/21::Anniversary").expect("padded");
        let bare = parse_event_line("7/21::Anniversary").expect("bare");
        assert_eq!(padded, bare);
        for year in [1999, 2024, 2031] {
            assert!(padded.spec.matches(day(year, 7, 21)));
        }
        assert!(!padded.spec.matches(day(2024, 7, 22)));
    }

    #[test]
    fn one_off_specs_fire_once() {
        let event = parse_event_line("2024/03/09 :: Launch").expect("parse");
        assert_eq!(event.name, "Launch");
        assert!(event.spec.matches(day(2024, 3, 9)));
        assert!(!event.spec.matches(day(2025, 3, 9)));
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(parse_event_line("Anniversary").is_err());
        assert!(parse_event_line("13/01::Nope").is_err());
        assert!(parse_event_line("02/30::Nope").is_err());
        assert!(parse_event_line("07/21::").is_err());
        assert!(parse_event_line("1/2/3/4::Nope").is_err());
    }

    #[test]
    fn first_matching_list_sets_style() {
        let family = UserEventList::parse(
            "family",
            EventStyle {
                color: Some("#ff0000".to_string()),
                bold: true,
            },
            "# birthdays\n07/21::Anniversary\nnot a line\n",
        );
        let work = UserEventList::parse(
            "work",
            EventStyle::default(),
            "7/21::Review\n7/21::Offsite\n",
        );
        assert_eq!(family.events.len(), 1);

        let found = match_events(&[work.clone(), family.clone()], day(2024, 7, 21));
        assert_eq!(found.text(), "Review\nOffsite\nAnniversary");
        assert_eq!(found.style, Some(EventStyle::default()));

        let found = match_events(&[family, work], day(2024, 7, 21));
        assert_eq!(found.names[0], "Anniversary");
        assert_eq!(found.style.map(|style| style.bold), Some(true));
    }

    #[test]
    fn loads_lists_from_config() {
        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(file, "12/25::Family dinner").expect("write");
        let path = file.path().display().to_string();
        let cfg = Config::from_pairs([
            ("events.home.file", path.as_str()),
            ("events.home.color", "#00aa00"),
            ("events.home.bold", "yes"),
            ("events.gone.file", "/nonexistent/almanac-events.txt"),
        ]);

        let sources = user_event_sources(&cfg);
        assert_eq!(
            sources.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            vec!["gone", "home"]
        );
        let lists = load_user_event_lists(&sources);
        assert_eq!(lists.len(), 1);
        assert_eq!(lists[0].style.color.as_deref(), Some("#00aa00"));
        assert!(lists[0].style.bold);
        assert_eq!(match_events(&lists, day(2030, 12, 25)).text(), "Family dinner");
    }
}
