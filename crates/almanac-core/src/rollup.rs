//! Content of week, month, quarter and year pages, and the weekly desk.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use tracing::{debug, info, instrument};

use crate::boundary::{add_days, first_day_of_month, last_day_of_month};
use crate::config::Config;
use crate::conventions::CalendarConventions;
use crate::documents::{DocumentService, NewBlock, PageExistenceCache, PageOptions};
use crate::error::CalendarError;
use crate::notice::{Notice, NoticeSink};
use crate::page_name::{PeriodPage, format_week_page};
use crate::quarter::Quarter;
use crate::relative::{LabelWidth, month_label, weekday_label};
use crate::week::{WeekIdentity, resolve, row_identity, start_of_identity, weeks_in_year};
use crate::window::build_three_week_window;

/// Page property naming the period kind of a generated page.
pub const PERIOD_PROPERTY: &str = "period";
/// Content of the block that holds the weekly desk.
pub const DESK_MARKER: &str = "Weekly desk";

/// Host templates applied to new period pages, by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollupTemplates {
    pub week: Option<String>,
    pub month: Option<String>,
    pub quarter: Option<String>,
    pub year: Option<String>,
}

impl RollupTemplates {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            week: cfg.get("template.week"),
            month: cfg.get("template.month"),
            quarter: cfg.get("template.quarter"),
            year: cfg.get("template.year"),
        }
    }

    pub fn for_period(&self, period: &PeriodPage) -> Option<&str> {
        match period {
            PeriodPage::Week { .. } => self.week.as_deref(),
            PeriodPage::Month { .. } => self.month.as_deref(),
            PeriodPage::Quarter { .. } => self.quarter.as_deref(),
            PeriodPage::Year { .. } => self.year.as_deref(),
        }
    }
}

fn link(name: &str) -> String {
    format!("[[{name}]]")
}

fn section(title: &str, links: Vec<String>) -> NewBlock {
    NewBlock::with_children(title, links.into_iter().map(NewBlock::new).collect())
}

/// One block per day, each linking the day's journal page.
pub fn week_page_blocks(
    identity: WeekIdentity,
    conventions: &CalendarConventions,
) -> Result<Vec<NewBlock>, CalendarError> {
    let start = start_of_identity(identity, conventions)?;
    let format = conventions.page_name_format;
    let mut days = Vec::with_capacity(7);
    for offset in 0..7 {
        let date = add_days(start, offset)?;
        let label = weekday_label(date.weekday(), &conventions.locale, LabelWidth::Long);
        days.push(format!(
            "{label} {}",
            link(&conventions.journal_page_name(date))
        ));
    }
    let quarter = PeriodPage::Quarter {
        year: identity.year(),
        quarter: identity.quarter(),
    }
    .page_name(format)?;
    Ok(vec![
        NewBlock::new(format!("Quarter: {}", link(&quarter))),
        section("Days", days),
    ])
}

/// Week pages overlapping a month, in order.
pub fn weeks_of_month(
    year: i32,
    month: u32,
    conventions: &CalendarConventions,
) -> Result<Vec<WeekIdentity>, CalendarError> {
    let mut day = first_day_of_month(year, month)?;
    let last = last_day_of_month(year, month)?;
    let mut weeks: Vec<WeekIdentity> = Vec::new();
    while day <= last {
        let identity = resolve(day, conventions.week_standard)?;
        if weeks.last() != Some(&identity) {
            weeks.push(identity);
        }
        day = add_days(day, 1)?;
    }
    Ok(weeks)
}

pub fn month_page_blocks(
    year: i32,
    month: u32,
    conventions: &CalendarConventions,
) -> Result<Vec<NewBlock>, CalendarError> {
    let format = conventions.page_name_format;
    let weeks = weeks_of_month(year, month, conventions)?
        .into_iter()
        .map(|identity| link(&format_week_page(identity, format)))
        .collect();
    Ok(vec![section("Weeks", weeks)])
}

pub fn quarter_page_blocks(
    year: i32,
    quarter: Quarter,
    conventions: &CalendarConventions,
) -> Result<Vec<NewBlock>, CalendarError> {
    let format = conventions.page_name_format;
    let mut months = Vec::new();
    for month in quarter.months() {
        let name = PeriodPage::Month { year, month }.page_name(format)?;
        months.push(link(&name));
    }
    let last_week = quarter
        .last_week()
        .min(weeks_in_year(year, conventions.week_standard)?);
    let mut weeks = Vec::new();
    for week in quarter.first_week()..=last_week {
        weeks.push(link(&format_week_page(WeekIdentity::new(year, week)?, format)));
    }
    Ok(vec![section("Months", months), section("Weeks", weeks)])
}

pub fn year_page_blocks(
    year: i32,
    conventions: &CalendarConventions,
) -> Result<Vec<NewBlock>, CalendarError> {
    let format = conventions.page_name_format;
    let mut quarters = Vec::new();
    for quarter in Quarter::ALL {
        quarters.push(link(&PeriodPage::Quarter { year, quarter }.page_name(format)?));
    }
    let mut months = Vec::new();
    for month in 1..=12 {
        let name = PeriodPage::Month { year, month }.page_name(format)?;
        let label = month_label(month, &conventions.locale, LabelWidth::Long).unwrap_or_default();
        months.push(format!("{label} {}", link(&name)));
    }
    Ok(vec![section("Quarters", quarters), section("Months", months)])
}

pub fn period_blocks(
    period: &PeriodPage,
    conventions: &CalendarConventions,
) -> Result<Vec<NewBlock>, CalendarError> {
    match *period {
        PeriodPage::Week { identity } => week_page_blocks(identity, conventions),
        PeriodPage::Month { year, month } => month_page_blocks(year, month, conventions),
        PeriodPage::Quarter { year, quarter } => quarter_page_blocks(year, quarter, conventions),
        PeriodPage::Year { year } => year_page_blocks(year, conventions),
    }
}

/// The period pages a date belongs to: its week, month, quarter and year.
pub fn periods_for(
    date: NaiveDate,
    conventions: &CalendarConventions,
) -> Result<[PeriodPage; 4], CalendarError> {
    let identity = resolve(date, conventions.week_standard)?;
    Ok([
        PeriodPage::Week { identity },
        PeriodPage::Month {
            year: date.year(),
            month: date.month(),
        },
        PeriodPage::Quarter {
            year: identity.year(),
            quarter: identity.quarter(),
        },
        PeriodPage::Year {
            year: identity.year(),
        },
    ])
}

/// Writes period pages through a [`DocumentService`].
pub struct RollupWriter<'a, D: DocumentService + ?Sized> {
    docs: &'a mut D,
    cache: &'a mut PageExistenceCache,
    notices: &'a mut dyn NoticeSink,
    conventions: &'a CalendarConventions,
    templates: &'a RollupTemplates,
}

impl<'a, D: DocumentService + ?Sized> RollupWriter<'a, D> {
    pub fn new(
        docs: &'a mut D,
        cache: &'a mut PageExistenceCache,
        notices: &'a mut dyn NoticeSink,
        conventions: &'a CalendarConventions,
        templates: &'a RollupTemplates,
    ) -> Self {
        Self {
            docs,
            cache,
            notices,
            conventions,
            templates,
        }
    }

    /// Creates the page for `period` unless it exists. Returns the page name
    /// when it was created.
    #[instrument(skip(self), fields(kind = period.kind()))]
    pub fn ensure_period_page(&mut self, period: &PeriodPage) -> anyhow::Result<Option<String>> {
        let name = period.page_name(self.conventions.page_name_format)?;
        if self.cache.exists(&*self.docs, &name)? {
            debug!(page = %name, "period page already exists");
            return Ok(None);
        }

        let mut properties = BTreeMap::new();
        properties.insert(PERIOD_PROPERTY.to_string(), period.kind().to_string());
        self.docs.create_page(&name, PageOptions { properties })?;
        self.cache.mark(&name);

        let templated = match self.templates.for_period(period) {
            Some(template) => {
                let applied = self.docs.apply_template(&name, template)?;
                if !applied {
                    self.notices.notify(Notice::warning(format!(
                        "Template \"{template}\" not found; {name} uses the default layout"
                    )));
                }
                applied
            }
            None => false,
        };
        if !templated {
            self.docs
                .insert_blocks(&name, period_blocks(period, self.conventions)?)?;
        }
        info!(page = %name, templated, "created period page");
        Ok(Some(name))
    }

    /// Ensures the week, month, quarter and year pages of `date`.
    #[instrument(skip(self))]
    pub fn ensure_rollups_for(&mut self, date: NaiveDate) -> anyhow::Result<Vec<String>> {
        let mut created = Vec::new();
        for period in periods_for(date, self.conventions)? {
            if let Some(name) = self.ensure_period_page(&period)? {
                created.push(name);
            }
        }
        if !created.is_empty() {
            self.notices.notify(Notice::info(format!(
                "Created {}",
                created.join(", ")
            )));
        }
        Ok(created)
    }

    /// Writes the three-week desk onto the week page of `date`, replacing an
    /// earlier desk. Returns the page written.
    #[instrument(skip(self))]
    pub fn write_weekly_desk(&mut self, date: NaiveDate) -> anyhow::Result<String> {
        let identity = resolve(date, self.conventions.week_standard)?;
        let week = PeriodPage::Week { identity };
        self.ensure_period_page(&week)?;
        let page_name = week.page_name(self.conventions.page_name_format)?;

        let blocks = weekly_desk_blocks(date, self.conventions)?;
        if let Some(page) = self.docs.get_page(&page_name)? {
            for old in page.blocks.iter().filter(|block| block.content == DESK_MARKER) {
                self.docs.remove_block(&page_name, old.uuid)?;
            }
        }
        self.docs
            .insert_block(&page_name, NewBlock::with_children(DESK_MARKER, blocks))?;
        info!(page = %page_name, "wrote weekly desk");
        Ok(page_name)
    }
}

/// Previous, current and next week grouped under their week-page links.
pub fn weekly_desk_blocks(
    date: NaiveDate,
    conventions: &CalendarConventions,
) -> Result<Vec<NewBlock>, CalendarError> {
    let window = build_three_week_window(date, conventions.grid_week_start())?;
    let mut rows = Vec::with_capacity(3);
    for row_start in window.week_starts()? {
        let identity = row_identity(row_start, conventions.week_standard)?;
        let heading = link(&format_week_page(identity, conventions.page_name_format));
        let mut days = Vec::with_capacity(7);
        for offset in 0..7 {
            let day = add_days(row_start, offset)?;
            let label = weekday_label(day.weekday(), &conventions.locale, LabelWidth::Short);
            days.push(format!("{label} {}", link(&conventions.journal_page_name(day))));
        }
        rows.push(section(&heading, days));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conventions::PageNameFormat;
    use crate::documents::MemoryDocuments;
    use crate::notice::{CollectedNotices, NoticeLevel};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn week(year: i32, week: u32) -> WeekIdentity {
        WeekIdentity::new(year, week).expect("identity")
    }

    #[test]
    fn week_page_links_each_journal_day() {
        let conventions = CalendarConventions::default();
        let blocks = week_page_blocks(week(2024, 10), &conventions).expect("blocks");
        assert_eq!(blocks[0].content, "Quarter: [[2024-Q1]]");
        let days = &blocks[1].children;
        assert_eq!(days.len(), 7);
        assert_eq!(days[0].content, "Monday [[2024/03/04]]");
        assert_eq!(days[6].content, "Sunday [[2024/03/10]]");
    }

    #[test]
    fn month_lists_overlapping_weeks() {
        let conventions = CalendarConventions::default();
        let weeks = weeks_of_month(2023, 1, &conventions).expect("weeks");
        assert_eq!(weeks.first(), Some(&week(2022, 52)));
        assert_eq!(weeks.last(), Some(&week(2023, 5)));
        assert_eq!(weeks.len(), 6);
    }

    #[test]
    fn quarter_page_clips_to_year_length() {
        let conventions = CalendarConventions {
            page_name_format: PageNameFormat::YyyySlashQqqSlashWww,
            ..CalendarConventions::default()
        };
        let blocks = quarter_page_blocks(2023, Quarter::Q4, &conventions).expect("blocks");
        assert_eq!(
            blocks[0]
                .children
                .iter()
                .map(|block| block.content.as_str())
                .collect::<Vec<_>>(),
            vec!["[[2023/10]]", "[[2023/11]]", "[[2023/12]]"]
        );
        let weeks = &blocks[1].children;
        assert_eq!(weeks.first().map(|b| b.content.as_str()), Some("[[2023/Q4/W40]]"));
        assert_eq!(weeks.last().map(|b| b.content.as_str()), Some("[[2023/Q4/W52]]"));
    }

    #[test]
    fn ensure_creates_missing_pages_once() {
        let mut docs = MemoryDocuments::new();
        let mut cache = PageExistenceCache::new();
        let mut notices = CollectedNotices::default();
        let conventions = CalendarConventions::default();
        let templates = RollupTemplates {
            month: Some("Monthly".to_string()),
            ..RollupTemplates::default()
        };
        let mut writer = RollupWriter::new(
            &mut docs,
            &mut cache,
            &mut notices,
            &conventions,
            &templates,
        );

        let created = writer.ensure_rollups_for(day(2024, 3, 9)).expect("ensure");
        assert_eq!(created, vec!["2024-W10", "2024-03", "2024-Q1", "2024"]);
        assert!(writer.ensure_rollups_for(day(2024, 3, 9)).expect("again").is_empty());

        let taken = notices.take();
        assert_eq!(taken[0].level, NoticeLevel::Warning);
        assert!(taken[0].message.contains("Monthly"));
        assert_eq!(taken[1].level, NoticeLevel::Info);

        let month = docs.get_page("2024-03").expect("get").expect("month page");
        assert_eq!(month.properties.get(PERIOD_PROPERTY).map(String::as_str), Some("month"));
        assert_eq!(month.blocks[0].content, "Weeks");
    }

    #[test]
    fn weekly_desk_is_replaced_not_duplicated() {
        let mut docs = MemoryDocuments::new();
        let mut cache = PageExistenceCache::new();
        let mut notices = CollectedNotices::default();
        let conventions = CalendarConventions::default();
        let templates = RollupTemplates::default();
        let mut writer = RollupWriter::new(
            &mut docs,
            &mut cache,
            &mut notices,
            &conventions,
            &templates,
        );

        let page = writer.write_weekly_desk(day(2024, 3, 6)).expect("desk");
        assert_eq!(page, "2024-W10");
        writer.write_weekly_desk(day(2024, 3, 6)).expect("desk again");

        let page = docs.get_page("2024-W10").expect("get").expect("page");
        let desks = page
            .blocks
            .iter()
            .filter(|block| block.content == DESK_MARKER)
            .collect::<Vec<_>>();
        assert_eq!(desks.len(), 1);
        let rows = &desks[0].children;
        assert_eq!(
            rows.iter().map(|row| row.content.as_str()).collect::<Vec<_>>(),
            vec!["[[2024-W09]]", "[[2024-W10]]", "[[2024-W11]]"]
        );
        assert_eq!(rows[1].children[0].content, "Mon [[2024/03/04]]");
    }
}
