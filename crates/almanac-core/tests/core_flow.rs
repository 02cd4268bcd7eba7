use almanac_core::config::Config;
use almanac_core::conventions::PageNameFormat;
use almanac_core::datastore::FileDocuments;
use almanac_core::documents::DocumentService;
use almanac_core::engine::{CalendarEngine, HostEvent};
use almanac_core::holiday::HolidayService;
use almanac_core::rollup::DESK_MARKER;
use chrono::NaiveDate;
use tempfile::tempdir;

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

#[test]
fn journal_day_rollups_persist_across_reopen() {
    let temp = tempdir().expect("tempdir");
    let cfg = Config::default();
    let docs = FileDocuments::open(temp.path()).expect("open store");
    let mut engine = CalendarEngine::new(&cfg, docs, HolidayService::default());

    let model = engine
        .handle(
            HostEvent::TodayJournalCreated {
                date: day(2024, 3, 9),
            },
            &cfg,
            day(2024, 3, 9),
        )
        .expect("handle journal creation")
        .expect("render model");
    assert!(model.rows.iter().any(|row| row.page_exists));

    engine.weekly_desk(day(2024, 3, 9)).expect("desk");
    engine.weekly_desk(day(2024, 3, 9)).expect("desk again");
    drop(engine);

    let reopened = FileDocuments::open(temp.path()).expect("reopen store");
    for name in ["2024-W10", "2024-03", "2024-Q1", "2024"] {
        assert!(reopened.page_exists(name).expect("lookup"), "{name} missing");
    }
    let week = reopened
        .get_page("2024-W10")
        .expect("lookup")
        .expect("week page");
    assert_eq!(
        week.blocks
            .iter()
            .filter(|block| block.content == DESK_MARKER)
            .count(),
        1
    );
}

#[test]
fn user_event_files_annotate_rendered_days() {
    let temp = tempdir().expect("tempdir");
    let events_path = temp.path().join("family.txt");
    std::fs::write(&events_path, "03/09::Grandma's birthday\n").expect("write events");
    let cfg = Config::from_pairs([
        ("events.family.file", events_path.to_string_lossy().to_string()),
        ("events.family.color", "#336699".to_string()),
        ("holiday.country", "US".to_string()),
    ]);

    let docs = FileDocuments::open(&temp.path().join("data")).expect("open store");
    let mut engine = CalendarEngine::new(&cfg, docs, HolidayService::default());
    let model = engine
        .two_line(day(2024, 3, 9), day(2024, 3, 9))
        .expect("render")
        .expect("not busy");
    let cell = model
        .rows
        .iter()
        .flat_map(|row| row.days.iter())
        .find(|cell| cell.date == day(2024, 3, 9))
        .expect("saturday shown");
    assert_eq!(cell.annotation.user_events.text(), "Grandma's birthday");
    assert_eq!(
        cell.annotation
            .user_style()
            .and_then(|style| style.color.as_deref()),
        Some("#336699")
    );

    let independence = engine.annotate(day(2024, 7, 4));
    assert_eq!(independence.holiday.as_deref(), Some("Independence Day"));
}

#[test]
fn migration_renames_persisted_pages() {
    let temp = tempdir().expect("tempdir");
    let cfg = Config::default();
    let docs = FileDocuments::open(temp.path()).expect("open store");
    let mut engine = CalendarEngine::new(&cfg, docs, HolidayService::default());
    engine.ensure_rollups(day(2023, 2, 1)).expect("rollups");

    let report = engine
        .migrate(
            PageNameFormat::YyyyWww,
            PageNameFormat::YyyySlashQqqSlashWww,
            2023..=2023,
        )
        .expect("migrate")
        .expect("not busy");
    assert!(
        report
            .renamed
            .contains(&("2023-W05".to_string(), "2023/Q1/W05".to_string()))
    );
    drop(engine);

    let reopened = FileDocuments::open(temp.path()).expect("reopen store");
    assert!(reopened.page_exists("2023/Q1/W05").expect("lookup"));
    assert!(!reopened.page_exists("2023-W05").expect("lookup"));
}
