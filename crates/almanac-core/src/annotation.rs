//! Per-date decorations from holidays, user event lists and ICS feeds.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::holiday::HolidayLookup;
use crate::ics::IcsEvent;
use crate::user_events::{
    EventStyle, UserEventList, UserEventMatch, UserEventSource, load_user_event_lists,
    match_events, user_event_sources,
};

/// Where an annotation came from, highest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationSource {
    User,
    Holiday,
    Ics,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateAnnotation {
    pub date: NaiveDate,
    pub holiday: Option<String>,
    pub user_events: UserEventMatch,
    pub ics_events: Vec<IcsEvent>,
}

impl DateAnnotation {
    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            holiday: None,
            user_events: UserEventMatch::default(),
            ics_events: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.holiday.is_none() && self.user_events.is_empty() && self.ics_events.is_empty()
    }

    /// Every label with its source, in precedence order.
    pub fn labels(&self) -> Vec<(AnnotationSource, String)> {
        let mut labels = self
            .user_events
            .names
            .iter()
            .map(|name| (AnnotationSource::User, name.clone()))
            .collect::<Vec<_>>();
        labels.extend(
            self.holiday
                .iter()
                .map(|name| (AnnotationSource::Holiday, name.clone())),
        );
        labels.extend(
            self.ics_events
                .iter()
                .map(|event| (AnnotationSource::Ics, event.summary.clone())),
        );
        labels
    }

    /// Source that decides how the day is drawn.
    pub fn primary_source(&self) -> Option<AnnotationSource> {
        self.labels().first().map(|(source, _)| *source)
    }

    pub fn user_style(&self) -> Option<&EventStyle> {
        self.user_events.style.as_ref()
    }

    /// Tooltip-style text: all labels, one per line.
    pub fn text(&self) -> String {
        self.labels()
            .into_iter()
            .map(|(_, label)| label)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Inputs whose change invalidates cached annotations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationSettings {
    pub holiday_country: Option<String>,
    pub user_sources: Vec<UserEventSource>,
    pub ics_locations: Vec<String>,
}

impl AnnotationSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            holiday_country: cfg.get("holiday.country"),
            user_sources: user_event_sources(cfg),
            ics_locations: cfg.get_list("ics.urls"),
        }
    }
}

/// Builds and caches [`DateAnnotation`]s keyed by ISO date.
#[derive(Debug)]
pub struct EventAnnotationIndex<H> {
    settings: AnnotationSettings,
    holidays: H,
    user_lists: Vec<UserEventList>,
    ics_events: Arc<Vec<IcsEvent>>,
    cache: HashMap<String, DateAnnotation>,
}

impl<H: HolidayLookup> EventAnnotationIndex<H> {
    pub fn new(settings: AnnotationSettings, mut holidays: H) -> Self {
        holidays.set_country(settings.holiday_country.as_deref());
        let user_lists = load_user_event_lists(&settings.user_sources);
        Self {
            settings,
            holidays,
            user_lists,
            ics_events: Arc::new(Vec::new()),
            cache: HashMap::new(),
        }
    }

    pub fn settings(&self) -> &AnnotationSettings {
        &self.settings
    }

    /// Applies new settings; returns whether anything changed.
    pub fn set_settings(&mut self, settings: AnnotationSettings) -> bool {
        if settings == self.settings {
            return false;
        }
        if settings.holiday_country != self.settings.holiday_country {
            self.holidays
                .set_country(settings.holiday_country.as_deref());
        }
        if settings.user_sources != self.settings.user_sources {
            self.user_lists = load_user_event_lists(&settings.user_sources);
        }
        self.settings = settings;
        self.invalidate();
        true
    }

    /// Replaces the loaded user lists directly.
    pub fn set_user_lists(&mut self, lists: Vec<UserEventList>) {
        if lists != self.user_lists {
            self.user_lists = lists;
            self.invalidate();
        }
    }

    pub fn set_ics_events(&mut self, events: Arc<Vec<IcsEvent>>) {
        if !Arc::ptr_eq(&events, &self.ics_events) && events != self.ics_events {
            self.ics_events = events;
            self.invalidate();
        }
    }

    pub fn invalidate(&mut self) {
        if !self.cache.is_empty() {
            debug!(entries = self.cache.len(), "annotation cache cleared");
        }
        self.cache.clear();
    }

    pub fn annotate(&mut self, date: NaiveDate) -> DateAnnotation {
        let key = date.to_string();
        if let Some(cached) = self.cache.get(&key) {
            return cached.clone();
        }
        let annotation = self.compose(date);
        self.cache.insert(key, annotation.clone());
        annotation
    }

    pub fn annotate_window(&mut self, dates: &[NaiveDate]) -> Vec<DateAnnotation> {
        dates.iter().map(|date| self.annotate(*date)).collect()
    }

    fn compose(&self, date: NaiveDate) -> DateAnnotation {
        let mut annotation = DateAnnotation::empty(date);
        annotation.user_events = match_events(&self.user_lists, date);

        annotation.holiday = match self.holidays.holiday_name(date) {
            Ok(name) => name,
            Err(error) => {
                warn!(%date, error = %format!("{error:#}"), "holiday lookup failed");
                None
            }
        };
        let user_names = &annotation.user_events.names;
        if annotation
            .holiday
            .as_ref()
            .is_some_and(|holiday| user_names.contains(holiday))
        {
            annotation.holiday = None;
        }

        annotation.ics_events = self
            .ics_events
            .iter()
            .filter(|event| event.occurs_on(date))
            .filter(|event| !user_names.contains(&event.summary))
            .cloned()
            .collect();
        annotation
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::holiday::HolidayService;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn ics(summary: &str, date: NaiveDate) -> IcsEvent {
        let start = date.and_hms_opt(0, 0, 0).expect("midnight").and_utc();
        IcsEvent {
            uid: summary.to_string(),
            summary: summary.to_string(),
            description: None,
            location: None,
            start,
            end: None,
            all_day: true,
            first_day: date,
            last_day: date,
        }
    }

    fn index() -> EventAnnotationIndex<HolidayService> {
        let settings = AnnotationSettings {
            holiday_country: Some("US".to_string()),
            ..AnnotationSettings::default()
        };
        let mut index = EventAnnotationIndex::new(settings, HolidayService::default());
        index.set_user_lists(vec![UserEventList::parse(
            "family",
            EventStyle {
                color: Some("#aa0000".to_string()),
                bold: false,
            },
            "07/04::Independence Day\n07/04::Barbecue\n12/24::Eve\n",
        )]);
        index
    }

    #[test]
    fn user_names_shadow_holidays_and_ics() {
        let mut index = index();
        let date = day(2024, 7, 4);
        index.set_ics_events(Arc::new(vec![
            ics("Barbecue", date),
            ics("Fireworks", date),
        ]));

        let annotation = index.annotate(date);
        assert_eq!(annotation.holiday, None);
        assert_eq!(annotation.user_events.text(), "Independence Day\nBarbecue");
        assert_eq!(
            annotation
                .ics_events
                .iter()
                .map(|event| event.summary.as_str())
                .collect::<Vec<_>>(),
            vec!["Fireworks"]
        );
        assert_eq!(annotation.primary_source(), Some(AnnotationSource::User));
        assert_eq!(
            annotation.user_style().and_then(|style| style.color.as_deref()),
            Some("#aa0000")
        );
    }

    #[test]
    fn holidays_fill_in_when_no_user_event() {
        let mut index = index();
        let annotation = index.annotate(day(2024, 12, 25));
        assert_eq!(annotation.holiday.as_deref(), Some("Christmas Day"));
        assert_eq!(annotation.primary_source(), Some(AnnotationSource::Holiday));
        assert!(index.annotate(day(2024, 3, 5)).is_empty());
    }

    #[test]
    fn feed_event_named_like_a_holiday_keeps_both() {
        let mut index = index();
        let date = day(2024, 12, 25);
        index.set_ics_events(Arc::new(vec![ics("Christmas Day", date)]));

        let annotation = index.annotate(date);
        assert_eq!(annotation.holiday.as_deref(), Some("Christmas Day"));
        assert_eq!(annotation.ics_events.len(), 1);
        assert_eq!(annotation.ics_events[0].summary, "Christmas Day");
        assert_eq!(annotation.primary_source(), Some(AnnotationSource::Holiday));
    }

    #[test]
    fn annotation_is_idempotent() {
        let mut index = index();
        let dates = [day(2024, 7, 4), day(2024, 12, 24), day(2024, 12, 25)];
        let first = index.annotate_window(&dates);
        let second = index.annotate_window(&dates);
        assert_eq!(first, second);
        index.invalidate();
        assert_eq!(index.annotate_window(&dates), first);
    }

    struct FailingHolidays {
        calls: Cell<usize>,
    }

    impl HolidayLookup for FailingHolidays {
        fn holiday_name(&self, _date: NaiveDate) -> anyhow::Result<Option<String>> {
            self.calls.set(self.calls.get() + 1);
            Err(anyhow::anyhow!("provider offline"))
        }
    }

    #[test]
    fn failing_source_contributes_nothing_and_cache_resets_on_change() {
        let mut index = EventAnnotationIndex::new(
            AnnotationSettings::default(),
            FailingHolidays {
                calls: Cell::new(0),
            },
        );
        let date = day(2024, 1, 1);
        assert!(index.annotate(date).is_empty());
        index.annotate(date);
        assert_eq!(index.holidays.calls.get(), 1);

        assert!(!index.set_settings(AnnotationSettings::default()));
        assert!(index.set_settings(AnnotationSettings {
            ics_locations: vec!["webcal://example.com/cal.ics".to_string()],
            ..AnnotationSettings::default()
        }));
        index.annotate(date);
        assert_eq!(index.holidays.calls.get(), 2);
    }
}
