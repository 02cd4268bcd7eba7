use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow, bail};
use chrono::{Datelike, NaiveDate};
use tracing::{debug, info, instrument};

use crate::boundary::last_day_of_week;
use crate::cli::Invocation;
use crate::config::Config;
use crate::conventions::PageNameFormat;
use crate::datastore::FileDocuments;
use crate::datetime::{parse_date_expr, parse_month_expr, project_timezone};
use crate::documents::DocumentService;
use crate::engine::{CalendarEngine, RenderModel};
use crate::ics::{HttpFeedFetcher, IcsEvent, IcsFeedCache};
use crate::migrate::period_pages_in;
use crate::page_name::format_week_page;
use crate::relative::relative;
use crate::render::Renderer;
use crate::week::{resolve, start_of_identity};

const DEFAULT_ICS_MAX_AGE_MINUTES: u64 = 60;

pub type Engine = CalendarEngine<FileDocuments>;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "week",
        "twoline",
        "threeweek",
        "month",
        "desk",
        "ensure",
        "migrate",
        "relative",
        "annotate",
        "pages",
        "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(engine, cfg, renderer, inv))]
pub fn dispatch(
    engine: &mut Engine,
    cfg: &Config,
    renderer: &mut Renderer,
    inv: Invocation,
    today: NaiveDate,
) -> anyhow::Result<()> {
    let command = inv.command.as_str();
    debug!(command, args = ?inv.args, "dispatching command");

    let result = match command {
        "week" => cmd_week(engine, &inv.args, today),
        "twoline" | "threeweek" | "month" => {
            load_ics_events(engine, cfg)?;
            cmd_render(engine, renderer, command, &inv.args, today)
        }
        "desk" => cmd_desk(engine, &inv.args, today),
        "ensure" => cmd_ensure(engine, &inv.args, today),
        "migrate" => cmd_migrate(engine, renderer, &inv.args, today),
        "relative" => cmd_relative(engine, &inv.args, today),
        "annotate" => {
            load_ics_events(engine, cfg)?;
            cmd_annotate(engine, renderer, &inv.args, today)
        }
        "pages" => cmd_pages(engine, &inv.args, today),
        "help" => cmd_help(),
        "version" => {
            println!("almanac {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    };

    renderer.print_notices(&engine.take_notices())?;
    result
}

fn date_arg(args: &[String], today: NaiveDate) -> anyhow::Result<NaiveDate> {
    match args.first() {
        Some(raw) => parse_date_expr(raw, today),
        None => Ok(today),
    }
}

/// `2023`, `2020..2024` or `2020..=2024`.
fn parse_year_range(raw: &str) -> anyhow::Result<RangeInclusive<i32>> {
    let parse = |s: &str| {
        s.trim()
            .parse::<i32>()
            .with_context(|| format!("invalid year: {s}"))
    };
    let range = match raw.split_once("..") {
        Some((start, end)) => parse(start)?..=parse(end.trim_start_matches('='))?,
        None => {
            let year = parse(raw)?;
            year..=year
        }
    };
    if range.is_empty() {
        bail!("empty year range: {raw}");
    }
    Ok(range)
}

fn ics_max_age(cfg: &Config) -> Duration {
    let minutes = cfg
        .get_u64("ics.max_age_minutes")
        .unwrap_or(DEFAULT_ICS_MAX_AGE_MINUTES);
    Duration::from_secs(minutes.saturating_mul(60))
}

/// Fetches the configured ICS feeds once, blocking on a local runtime.
fn load_ics_events(engine: &mut Engine, cfg: &Config) -> anyhow::Result<()> {
    let locations = cfg.get_list("ics.urls");
    if locations.is_empty() {
        return Ok(());
    }
    let cache = IcsFeedCache::new(HttpFeedFetcher::new()?, *project_timezone(), ics_max_age(cfg));
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start runtime for calendar feeds")?;
    let events: Arc<Vec<IcsEvent>> = runtime.block_on(cache.events(&locations));
    info!(feeds = locations.len(), events = events.len(), "loaded ICS events");
    engine.set_ics_events(events);
    Ok(())
}

fn cmd_week(engine: &mut Engine, args: &[String], today: NaiveDate) -> anyhow::Result<()> {
    let date = date_arg(args, today)?;
    let conventions = engine.conventions().clone();
    let identity = resolve(date, conventions.week_standard)?;
    let start = start_of_identity(identity, &conventions)?;
    let end = last_day_of_week(start)?;
    let page = format_week_page(identity, conventions.page_name_format);
    let exists = engine.docs().page_exists(&page)?;

    println!("date      {date}");
    println!("week      {identity}");
    println!("quarter   {}", identity.quarter());
    println!("page      {page}{}", if exists { "" } else { " (missing)" });
    println!("range     {start} .. {end}");
    Ok(())
}

fn cmd_render(
    engine: &mut Engine,
    renderer: &Renderer,
    command: &str,
    args: &[String],
    today: NaiveDate,
) -> anyhow::Result<()> {
    let model: Option<RenderModel> = match command {
        "month" => {
            let (year, month) = match args.first() {
                Some(raw) => parse_month_expr(raw, today)?,
                None => (today.year(), today.month()),
            };
            engine.month(year, month, today)?
        }
        "threeweek" => engine.three_week(date_arg(args, today)?, today)?,
        _ => engine.two_line(date_arg(args, today)?, today)?,
    };
    match model {
        Some(model) => renderer.print_model(&model),
        None => {
            println!("A render is already in progress.");
            Ok(())
        }
    }
}

fn cmd_desk(engine: &mut Engine, args: &[String], today: NaiveDate) -> anyhow::Result<()> {
    let date = date_arg(args, today)?;
    match engine.weekly_desk(date)? {
        Some(page) => println!("Wrote weekly desk to {page}"),
        None => println!("A weekly desk is already being written."),
    }
    Ok(())
}

fn cmd_ensure(engine: &mut Engine, args: &[String], today: NaiveDate) -> anyhow::Result<()> {
    let date = date_arg(args, today)?;
    let created = engine.ensure_rollups(date)?;
    if created.is_empty() {
        println!("All period pages for {date} exist.");
    } else {
        for name in created {
            println!("created {name}");
        }
    }
    Ok(())
}

fn cmd_migrate(
    engine: &mut Engine,
    renderer: &Renderer,
    args: &[String],
    today: NaiveDate,
) -> anyhow::Result<()> {
    let [from, to, years @ ..] = args else {
        bail!("usage: almanac migrate FROM TO [START-YEAR] [END-YEAR]");
    };
    let from: PageNameFormat = from.parse()?;
    let to: PageNameFormat = to.parse()?;
    let years = match years {
        [] => today.year()..=today.year(),
        [range] => parse_year_range(range)?,
        [start, end] => parse_year_range(&format!("{start}..{end}"))?,
        _ => bail!("usage: almanac migrate FROM TO [START-YEAR] [END-YEAR]"),
    };
    match engine.migrate(from, to, years)? {
        Some(report) => renderer.print_report(&report),
        None => {
            println!("A migration is already running.");
            Ok(())
        }
    }
}

fn cmd_relative(engine: &mut Engine, args: &[String], today: NaiveDate) -> anyhow::Result<()> {
    let Some(raw) = args.first() else {
        bail!("usage: almanac relative DATE");
    };
    let date = parse_date_expr(raw, today)?;
    println!("{}", relative(date, today, &engine.conventions().locale));
    Ok(())
}

fn cmd_annotate(
    engine: &mut Engine,
    renderer: &Renderer,
    args: &[String],
    today: NaiveDate,
) -> anyhow::Result<()> {
    let json = args.iter().any(|arg| arg == "--json");
    let dates = args
        .iter()
        .filter(|arg| *arg != "--json")
        .map(|raw| parse_date_expr(raw, today))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let dates = if dates.is_empty() { vec![today] } else { dates };

    let annotations = dates
        .into_iter()
        .map(|date| engine.annotate(date))
        .collect::<Vec<_>>();
    if json {
        println!("{}", serde_json::to_string_pretty(&annotations)?);
        return Ok(());
    }
    for annotation in &annotations {
        renderer.print_annotation(annotation)?;
    }
    Ok(())
}

fn cmd_pages(engine: &mut Engine, args: &[String], today: NaiveDate) -> anyhow::Result<()> {
    let years = match args.first() {
        Some(raw) => parse_year_range(raw)?,
        None => today.year()..=today.year(),
    };
    let conventions = engine.conventions().clone();
    let mut present = 0usize;
    for page in period_pages_in(years, conventions.week_standard)? {
        let name = page.page_name(conventions.page_name_format)?;
        if engine.docs().page_exists(&name)? {
            present += 1;
            println!("{:<8} {name}", page.kind());
        }
    }
    println!("{present} period pages");
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!("almanac [options] <command> [args]");
    println!();
    println!("  week [DATE]          week identity, quarter and page of DATE");
    println!("  twoline [DATE]       two-week strip around DATE");
    println!("  threeweek [DATE]     previous, current and next week");
    println!("  month [YYYY-MM]      five-row month grid");
    println!("  desk [DATE]          write the weekly desk onto DATE's week page");
    println!("  ensure [DATE]        create week, month, quarter and year pages");
    println!("  migrate FROM TO [START] [END]  rename period pages between name formats");
    println!("  relative DATE        relative label of DATE");
    println!("  annotate [DATE...]   holidays and events (--json for JSON)");
    println!("  pages [YEARS]        period pages that exist");
    println!("  version              print version");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abbreviations_must_be_unique() {
        let known = known_command_names();
        assert_eq!(expand_command_abbrev("tw", &known), Some("twoline"));
        assert_eq!(expand_command_abbrev("th", &known), Some("threeweek"));
        assert_eq!(expand_command_abbrev("m", &known), None);
        assert_eq!(expand_command_abbrev("mi", &known), Some("migrate"));
        assert_eq!(expand_command_abbrev("week", &known), Some("week"));
        assert_eq!(expand_command_abbrev("x", &known), None);
    }

    #[test]
    fn year_ranges() {
        assert_eq!(parse_year_range("2023").expect("single"), 2023..=2023);
        assert_eq!(parse_year_range("2020..2024").expect("range"), 2020..=2024);
        assert_eq!(parse_year_range("2020..=2021").expect("range"), 2020..=2021);
        assert!(parse_year_range("2024..2020").is_err());
        assert!(parse_year_range("soon").is_err());
    }

    #[test]
    fn ics_max_age_saturates() {
        assert_eq!(ics_max_age(&Config::default()), Duration::from_secs(3600));
        let cfg = Config::from_pairs([("ics.max_age_minutes", "5")]);
        assert_eq!(ics_max_age(&cfg), Duration::from_secs(300));
        let cfg = Config::from_pairs([("ics.max_age_minutes", u64::MAX.to_string())]);
        assert_eq!(ics_max_age(&cfg), Duration::from_secs(u64::MAX));
    }
}
