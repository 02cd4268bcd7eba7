use std::ops::RangeInclusive;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::conventions::{PageNameFormat, WeekStandard};
use crate::coordinator::{Coordinator, OperationKind};
use crate::documents::{DocumentService, PageExistenceCache};
use crate::notice::{Notice, NoticeSink};
use crate::page_name::PeriodPage;
use crate::quarter::Quarter;
use crate::week::{WeekIdentity, weeks_in_year};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub renamed: Vec<(String, String)>,
    pub skipped: usize,
    pub failed: Vec<(String, String)>,
}

impl MigrationReport {
    pub fn summary(&self) -> String {
        format!(
            "Renamed {} period pages, {} unchanged, {} failed",
            self.renamed.len(),
            self.skipped,
            self.failed.len()
        )
    }
}

/// Every week, month and quarter page of `years`.
pub fn period_pages_in(
    years: RangeInclusive<i32>,
    standard: WeekStandard,
) -> anyhow::Result<Vec<PeriodPage>> {
    let mut pages = Vec::new();
    for year in years {
        for week in 1..=weeks_in_year(year, standard)? {
            pages.push(PeriodPage::Week {
                identity: WeekIdentity::new(year, week)?,
            });
        }
        pages.extend((1..=12).map(|month| PeriodPage::Month { year, month }));
        pages.extend(
            Quarter::ALL
                .into_iter()
                .map(|quarter| PeriodPage::Quarter { year, quarter }),
        );
    }
    Ok(pages)
}

/// Renames period pages of `years` from `from` names to `to` names.
///
/// Pages are renamed one at a time. A page that is missing, or whose new
/// name is already taken, is skipped; a failed rename is recorded and the
/// loop moves on. Returns `None` when a migration is already running.
#[allow(clippy::too_many_arguments)]
#[instrument(skip(docs, coordinator, notices, cache))]
pub fn migrate_period_pages<D>(
    docs: &mut D,
    coordinator: &Coordinator,
    notices: &mut dyn NoticeSink,
    cache: &mut PageExistenceCache,
    from: PageNameFormat,
    to: PageNameFormat,
    years: RangeInclusive<i32>,
    standard: WeekStandard,
) -> anyhow::Result<Option<MigrationReport>>
where
    D: DocumentService + ?Sized,
{
    let Some(_ticket) = coordinator.try_begin(OperationKind::Migration) else {
        return Ok(None);
    };

    let mut report = MigrationReport::default();
    for page in period_pages_in(years, standard)? {
        let old = page.page_name(from)?;
        let new = page.page_name(to)?;
        if old == new {
            report.skipped += 1;
            continue;
        }
        match docs.page_exists(&old) {
            Ok(true) => {}
            Ok(false) => {
                report.skipped += 1;
                continue;
            }
            Err(err) => {
                warn!(page = %old, error = %format!("{err:#}"), "lookup failed");
                report.failed.push((old, format!("{err:#}")));
                continue;
            }
        }
        match docs.page_exists(&new) {
            Ok(false) => {}
            Ok(true) => {
                warn!(from = %old, to = %new, "target page exists; skipping");
                report.skipped += 1;
                continue;
            }
            Err(err) => {
                warn!(page = %new, error = %format!("{err:#}"), "lookup failed");
                report.failed.push((old, format!("{err:#}")));
                continue;
            }
        }
        match docs.rename_page(&old, &new) {
            Ok(()) => {
                debug!(from = %old, to = %new, "renamed period page");
                cache.forget(&old);
                cache.mark(&new);
                report.renamed.push((old, new));
            }
            Err(err) => {
                warn!(page = %old, error = %format!("{err:#}"), "rename failed");
                report.failed.push((old, format!("{err:#}")));
            }
        }
    }

    info!(
        renamed = report.renamed.len(),
        skipped = report.skipped,
        failed = report.failed.len(),
        "period page migration finished"
    );
    let summary = report.summary();
    notices.notify(if report.failed.is_empty() {
        Notice::info(summary)
    } else {
        Notice::warning(summary)
    });
    Ok(Some(report))
}
