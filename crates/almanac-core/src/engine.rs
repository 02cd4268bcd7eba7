//! Glue between the host, the pure calendar computations and the page
//! store: turns host events into render models and page writes.

use std::ops::RangeInclusive;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::annotation::{AnnotationSettings, DateAnnotation, EventAnnotationIndex};
use crate::boundary::{first_day_of_month, start_of_quarter, start_of_year};
use crate::config::Config;
use crate::conventions::{CalendarConventions, PageNameFormat};
use crate::coordinator::{Coordinator, OperationKind};
use crate::documents::{DocumentService, PageExistenceCache};
use crate::holiday::{HolidayLookup, HolidayService};
use crate::ics::IcsEvent;
use crate::migrate::{MigrationReport, migrate_period_pages};
use crate::notice::{CollectedNotices, Notice};
use crate::page_name::{PeriodPage, classify_page, format_week_page};
use crate::quarter::Quarter;
use crate::relative::{LabelWidth, month_label, relative, weekday_label};
use crate::rollup::{RollupTemplates, RollupWriter};
use crate::week::{WeekIdentity, row_identity, start_of_identity};
use crate::window::{build_month_grid, build_three_week_window, build_two_week_offsets};

/// Lifecycle notifications from the host application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    RouteChanged { page: Option<String> },
    SettingsChanged,
    TodayJournalCreated { date: NaiveDate },
    SidebarVisibilityChanged { visible: bool },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayCell {
    pub date: NaiveDate,
    pub day: u32,
    /// Inside the period being shown (the month of a month grid).
    pub in_focus: bool,
    pub is_today: bool,
    pub journal_page: String,
    pub journal_exists: bool,
    pub relative: String,
    pub annotation: DateAnnotation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekRow {
    /// `None` when the row's week cannot be resolved; such rows get no link.
    pub identity: Option<WeekIdentity>,
    pub page_name: Option<String>,
    pub quarter: Option<Quarter>,
    pub page_exists: bool,
    pub days: Vec<DayCell>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderModel {
    pub title: String,
    pub weekday_headers: Vec<String>,
    pub rows: Vec<WeekRow>,
}

pub struct CalendarEngine<D, H = HolidayService> {
    conventions: CalendarConventions,
    templates: RollupTemplates,
    docs: D,
    annotations: EventAnnotationIndex<H>,
    pages: PageExistenceCache,
    coordinator: Coordinator,
    notices: CollectedNotices,
    sidebar_visible: bool,
    current_page: Option<String>,
}

impl<D: DocumentService, H: HolidayLookup> CalendarEngine<D, H> {
    pub fn new(cfg: &Config, docs: D, holidays: H) -> Self {
        Self {
            conventions: CalendarConventions::from_config(cfg),
            templates: RollupTemplates::from_config(cfg),
            docs,
            annotations: EventAnnotationIndex::new(AnnotationSettings::from_config(cfg), holidays),
            pages: PageExistenceCache::new(),
            coordinator: Coordinator::default(),
            notices: CollectedNotices::default(),
            sidebar_visible: true,
            current_page: None,
        }
    }

    pub fn conventions(&self) -> &CalendarConventions {
        &self.conventions
    }

    pub fn docs(&self) -> &D {
        &self.docs
    }

    pub fn docs_mut(&mut self) -> &mut D {
        self.pages.invalidate();
        &mut self.docs
    }

    pub fn annotations_mut(&mut self) -> &mut EventAnnotationIndex<H> {
        &mut self.annotations
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn sidebar_visible(&self) -> bool {
        self.sidebar_visible
    }

    pub fn current_page(&self) -> Option<&str> {
        self.current_page.as_deref()
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.take()
    }

    /// Re-derives conventions and annotation inputs; returns whether any
    /// changed.
    #[instrument(skip(self, cfg))]
    pub fn apply_settings(&mut self, cfg: &Config) -> bool {
        let conventions = CalendarConventions::from_config(cfg);
        let templates = RollupTemplates::from_config(cfg);
        let mut changed = self
            .annotations
            .set_settings(AnnotationSettings::from_config(cfg));
        if conventions != self.conventions || templates != self.templates {
            self.conventions = conventions;
            self.templates = templates;
            changed = true;
        }
        if changed {
            self.pages.invalidate();
            debug!("settings changed");
        }
        changed
    }

    pub fn set_ics_events(&mut self, events: Arc<Vec<IcsEvent>>) {
        self.annotations.set_ics_events(events);
    }

    /// Two-week strip around `target`. `None` while another render runs.
    #[instrument(skip(self))]
    pub fn two_line(
        &mut self,
        target: NaiveDate,
        today: NaiveDate,
    ) -> anyhow::Result<Option<RenderModel>> {
        let Some(_ticket) = self.coordinator.try_begin(OperationKind::RenderWindow) else {
            return Ok(None);
        };
        let window = build_two_week_offsets(target, self.conventions.grid_week_start())?;
        let title = self.month_title(target.year(), target.month());
        let model = self.build_model(title, window.dates()?, |_| true, today)?;
        Ok(Some(model))
    }

    /// Previous, current and next week around `target`.
    #[instrument(skip(self))]
    pub fn three_week(
        &mut self,
        target: NaiveDate,
        today: NaiveDate,
    ) -> anyhow::Result<Option<RenderModel>> {
        let Some(_ticket) = self.coordinator.try_begin(OperationKind::RenderWindow) else {
            return Ok(None);
        };
        let window = build_three_week_window(target, self.conventions.grid_week_start())?;
        let title = self.month_title(target.year(), target.month());
        let model = self.build_model(title, window.dates()?, |_| true, today)?;
        Ok(Some(model))
    }

    /// Five-row month grid.
    #[instrument(skip(self))]
    pub fn month(
        &mut self,
        year: i32,
        month: u32,
        today: NaiveDate,
    ) -> anyhow::Result<Option<RenderModel>> {
        let Some(_ticket) = self.coordinator.try_begin(OperationKind::RenderWindow) else {
            return Ok(None);
        };
        let grid = build_month_grid(year, month, self.conventions.grid_week_start())?;
        let hidden = grid.truncated_days()?;
        if !hidden.is_empty() {
            debug!(year, month, hidden = hidden.len(), "month grid omits trailing days");
        }
        let title = self.month_title(year, month);
        let model = self.build_model(title, grid.dates()?, |date| grid.in_month(date), today)?;
        Ok(Some(model))
    }

    pub fn annotate(&mut self, date: NaiveDate) -> DateAnnotation {
        self.annotations.annotate(date)
    }

    /// Creates the week, month, quarter and year pages of `date`.
    #[instrument(skip(self))]
    pub fn ensure_rollups(&mut self, date: NaiveDate) -> anyhow::Result<Vec<String>> {
        let Some(_ticket) = self.coordinator.try_begin(OperationKind::Rollup) else {
            return Ok(Vec::new());
        };
        RollupWriter::new(
            &mut self.docs,
            &mut self.pages,
            &mut self.notices,
            &self.conventions,
            &self.templates,
        )
        .ensure_rollups_for(date)
    }

    #[instrument(skip(self))]
    pub fn weekly_desk(&mut self, date: NaiveDate) -> anyhow::Result<Option<String>> {
        let Some(_ticket) = self.coordinator.try_begin(OperationKind::WeeklyDesk) else {
            return Ok(None);
        };
        RollupWriter::new(
            &mut self.docs,
            &mut self.pages,
            &mut self.notices,
            &self.conventions,
            &self.templates,
        )
        .write_weekly_desk(date)
        .map(Some)
    }

    #[instrument(skip(self))]
    pub fn migrate(
        &mut self,
        from: PageNameFormat,
        to: PageNameFormat,
        years: RangeInclusive<i32>,
    ) -> anyhow::Result<Option<MigrationReport>> {
        migrate_period_pages(
            &mut self.docs,
            &self.coordinator,
            &mut self.notices,
            &mut self.pages,
            from,
            to,
            years,
            self.conventions.week_standard,
        )
    }

    /// Reacts to a host event; returns the model to redraw, if any.
    #[instrument(skip(self, cfg))]
    pub fn handle(
        &mut self,
        event: HostEvent,
        cfg: &Config,
        today: NaiveDate,
    ) -> anyhow::Result<Option<RenderModel>> {
        match event {
            HostEvent::RouteChanged { page } => {
                let anchor = page
                    .as_deref()
                    .and_then(|name| self.period_anchor(name))
                    .unwrap_or(today);
                self.current_page = page;
                if !self.sidebar_visible {
                    return Ok(None);
                }
                self.two_line(anchor, today)
            }
            HostEvent::SettingsChanged => {
                if !self.apply_settings(cfg) {
                    return Ok(None);
                }
                self.two_line(today, today)
            }
            HostEvent::TodayJournalCreated { date } => {
                let created = self.ensure_rollups(date)?;
                info!(%date, created = created.len(), "journal day created");
                self.pages.forget(&self.conventions.journal_page_name(date));
                self.two_line(date, today)
            }
            HostEvent::SidebarVisibilityChanged { visible } => {
                self.sidebar_visible = visible;
                if visible {
                    self.month(today.year(), today.month(), today)
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// First day of the period a page names, if it names one.
    fn period_anchor(&self, name: &str) -> Option<NaiveDate> {
        let period = classify_page(name, self.conventions.page_name_format)?;
        let anchor = match period {
            PeriodPage::Week { identity } => start_of_identity(identity, &self.conventions),
            PeriodPage::Month { year, month } => first_day_of_month(year, month),
            PeriodPage::Quarter { year, quarter } => {
                start_of_quarter(year, quarter, &self.conventions)
            }
            PeriodPage::Year { year } => start_of_year(year, &self.conventions),
        };
        match anchor {
            Ok(date) => Some(date),
            Err(error) => {
                warn!(page = %name, %error, "period page has no start date");
                None
            }
        }
    }

    fn month_title(&self, year: i32, month: u32) -> String {
        let label = month_label(month, &self.conventions.locale, LabelWidth::Long).unwrap_or("");
        format!("{label} {year}")
    }

    fn build_model(
        &mut self,
        title: String,
        dates: Vec<NaiveDate>,
        in_focus: impl Fn(NaiveDate) -> bool,
        today: NaiveDate,
    ) -> anyhow::Result<RenderModel> {
        let locale = self.conventions.locale.clone();
        let weekday_headers = self
            .conventions
            .grid_week_start()
            .columns()
            .iter()
            .map(|day| weekday_label(*day, &locale, LabelWidth::Short).to_string())
            .collect();

        let mut rows = Vec::with_capacity(dates.len() / 7);
        for week in dates.chunks(7) {
            let Some(row_start) = week.first().copied() else {
                continue;
            };
            let identity = match row_identity(row_start, self.conventions.week_standard) {
                Ok(identity) => Some(identity),
                Err(error) => {
                    warn!(%row_start, %error, "row has no week identity");
                    None
                }
            };
            let page_name =
                identity.map(|id| format_week_page(id, self.conventions.page_name_format));
            let page_exists = match &page_name {
                Some(name) => self.page_exists(name),
                None => false,
            };

            let mut days = Vec::with_capacity(7);
            for date in week {
                let journal_page = self.conventions.journal_page_name(*date);
                days.push(DayCell {
                    date: *date,
                    day: date.day(),
                    in_focus: in_focus(*date),
                    is_today: *date == today,
                    journal_exists: self.page_exists(&journal_page),
                    journal_page,
                    relative: relative(*date, today, &locale),
                    annotation: self.annotations.annotate(*date),
                });
            }
            rows.push(WeekRow {
                identity,
                page_name,
                quarter: identity.map(WeekIdentity::quarter),
                page_exists,
                days,
            });
        }

        Ok(RenderModel {
            title,
            weekday_headers,
            rows,
        })
    }

    fn page_exists(&mut self, name: &str) -> bool {
        match self.pages.exists(&self.docs, name) {
            Ok(exists) => exists,
            Err(error) => {
                warn!(page = %name, error = %format!("{error:#}"), "page lookup failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::{MemoryDocuments, PageOptions};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn engine(pairs: &[(&str, &str)]) -> CalendarEngine<MemoryDocuments> {
        let cfg = Config::from_pairs(pairs.iter().copied());
        CalendarEngine::new(&cfg, MemoryDocuments::new(), HolidayService::default())
    }

    #[test]
    fn two_line_labels_rows_with_week_pages() {
        let mut engine = engine(&[("holiday.country", "US")]);
        engine
            .docs_mut()
            .create_page("2024-W10", PageOptions::default())
            .expect("create");
        let model = engine
            .two_line(day(2024, 3, 9), day(2024, 3, 9))
            .expect("render")
            .expect("not busy");

        assert_eq!(model.title, "March 2024");
        assert_eq!(model.weekday_headers[0], "Mon");
        assert_eq!(model.rows.len(), 2);
        assert_eq!(model.rows[0].page_name.as_deref(), Some("2024-W10"));
        assert!(model.rows[0].page_exists);
        assert_eq!(model.rows[1].page_name.as_deref(), Some("2024-W11"));
        assert!(!model.rows[1].page_exists);

        let saturday = &model.rows[0].days[5];
        assert!(saturday.is_today);
        assert_eq!(saturday.relative, "Today");
        assert_eq!(saturday.journal_page, "2024/03/09");
    }

    #[test]
    fn sunday_grid_keeps_iso_numbering() {
        let mut engine = engine(&[("week.start", "sunday")]);
        let model = engine
            .two_line(day(2024, 3, 5), day(2024, 3, 5))
            .expect("render")
            .expect("not busy");
        assert_eq!(model.weekday_headers[0], "Sun");
        assert_eq!(model.rows[0].days[0].date, day(2024, 2, 25));
        assert_eq!(model.rows[0].page_name.as_deref(), Some("2024-W09"));
        assert_eq!(model.rows[1].page_name.as_deref(), Some("2024-W10"));
    }

    #[test]
    fn rows_outside_supported_years_render_without_identity() {
        let mut engine = engine(&[]);
        engine
            .docs_mut()
            .create_page("0001-W01", PageOptions::default())
            .expect("create");
        let model = engine
            .two_line(day(1, 1, 1), day(1, 1, 1))
            .expect("render")
            .expect("not busy");

        assert_eq!(model.rows.len(), 2);
        let before = &model.rows[0];
        assert_eq!(before.days[0].date, day(0, 12, 25));
        assert_eq!(before.identity, None);
        assert_eq!(before.page_name, None);
        assert_eq!(before.quarter, None);
        assert!(!before.page_exists);
        assert_eq!(before.days.len(), 7);

        assert_eq!(model.rows[1].page_name.as_deref(), Some("0001-W01"));
        assert!(model.rows[1].page_exists);
    }

    #[test]
    fn month_grid_marks_focus_days() {
        let mut engine = engine(&[("locale", "de")]);
        let model = engine
            .month(2024, 9, day(2024, 9, 15))
            .expect("render")
            .expect("not busy");
        assert_eq!(model.title, "September 2024");
        assert_eq!(model.rows.len(), 5);
        assert!(!model.rows[0].days[0].in_focus);
        assert!(model.rows[0].days[6].in_focus);
        assert_eq!(model.weekday_headers[0], "Mo");
    }

    #[test]
    fn route_to_period_page_anchors_the_strip() {
        let mut engine = engine(&[]);
        let cfg = Config::default();
        let model = engine
            .handle(
                HostEvent::RouteChanged {
                    page: Some("2023-W05".to_string()),
                },
                &cfg,
                day(2024, 3, 9),
            )
            .expect("handle")
            .expect("model");
        assert_eq!(engine.current_page(), Some("2023-W05"));
        assert!(
            model
                .rows
                .iter()
                .any(|row| row.page_name.as_deref() == Some("2023-W05"))
        );
    }

    #[test]
    fn journal_creation_builds_rollups_and_settings_refresh() {
        let mut engine = engine(&[]);
        let cfg = Config::default();
        engine
            .handle(
                HostEvent::TodayJournalCreated {
                    date: day(2024, 3, 9),
                },
                &cfg,
                day(2024, 3, 9),
            )
            .expect("handle");
        assert!(engine.docs().page_exists("2024-W10").expect("exists"));
        assert!(engine.docs().page_exists("2024").expect("exists"));
        assert_eq!(engine.take_notices().len(), 1);

        assert!(
            engine
                .handle(HostEvent::SettingsChanged, &cfg, day(2024, 3, 9))
                .expect("handle")
                .is_none()
        );
        let changed = Config::from_pairs([("page.format", "YYYY/Www")]);
        assert!(
            engine
                .handle(HostEvent::SettingsChanged, &changed, day(2024, 3, 9))
                .expect("handle")
                .is_some()
        );
        assert_eq!(
            engine.conventions().page_name_format,
            PageNameFormat::YyyySlashWww
        );

        assert!(
            engine
                .handle(
                    HostEvent::SidebarVisibilityChanged { visible: false },
                    &changed,
                    day(2024, 3, 9)
                )
                .expect("handle")
                .is_none()
        );
        assert!(!engine.sidebar_visible());
        assert!(
            engine
                .handle(
                    HostEvent::RouteChanged { page: None },
                    &changed,
                    day(2024, 3, 9)
                )
                .expect("handle")
                .is_none()
        );
    }
}
