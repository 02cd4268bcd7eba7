//! Locale-aware relative day phrases and calendar labels.

use chrono::{NaiveDate, NaiveDateTime, Weekday};

use crate::conventions::LocaleTag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelWidth {
    Long,
    Short,
}

struct LocaleTable {
    language: &'static str,
    today: &'static str,
    yesterday: &'static str,
    tomorrow: &'static str,
    day_before_yesterday: Option<&'static str>,
    day_after_tomorrow: Option<&'static str>,
    future: &'static str,
    past: &'static str,
    weekdays_long: [&'static str; 7],
    weekdays_short: [&'static str; 7],
    months_long: [&'static str; 12],
    months_short: [&'static str; 12],
}

static EN: LocaleTable = LocaleTable {
    language: "en",
    today: "today",
    yesterday: "yesterday",
    tomorrow: "tomorrow",
    day_before_yesterday: None,
    day_after_tomorrow: None,
    future: "in {n} days",
    past: "{n} days ago",
    weekdays_long: [
        "Monday",
        "Tuesday",
        "Wednesday",
        "Thursday",
        "Friday",
        "Saturday",
        "Sunday",
    ],
    weekdays_short: ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"],
    months_long: [
        "January",
        "February",
        "March",
        "April",
        "May",
        "June",
        "July",
        "August",
        "September",
        "October",
        "November",
        "December",
    ],
    months_short: [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ],
};

static DE: LocaleTable = LocaleTable {
    language: "de",
    today: "heute",
    yesterday: "gestern",
    tomorrow: "morgen",
    day_before_yesterday: Some("vorgestern"),
    day_after_tomorrow: Some("übermorgen"),
    future: "in {n} Tagen",
    past: "vor {n} Tagen",
    weekdays_long: [
        "Montag",
        "Dienstag",
        "Mittwoch",
        "Donnerstag",
        "Freitag",
        "Samstag",
        "Sonntag",
    ],
    weekdays_short: ["Mo", "Di", "Mi", "Do", "Fr", "Sa", "So"],
    months_long: [
        "Januar",
        "Februar",
        "März",
        "April",
        "Mai",
        "Juni",
        "Juli",
        "August",
        "September",
        "Oktober",
        "November",
        "Dezember",
    ],
    months_short: [
        "Jan", "Feb", "Mär", "Apr", "Mai", "Jun", "Jul", "Aug", "Sep", "Okt", "Nov", "Dez",
    ],
};

static FR: LocaleTable = LocaleTable {
    language: "fr",
    today: "aujourd’hui",
    yesterday: "hier",
    tomorrow: "demain",
    day_before_yesterday: Some("avant-hier"),
    day_after_tomorrow: Some("après-demain"),
    future: "dans {n} jours",
    past: "il y a {n} jours",
    weekdays_long: [
        "lundi", "mardi", "mercredi", "jeudi", "vendredi", "samedi", "dimanche",
    ],
    weekdays_short: ["lun.", "mar.", "mer.", "jeu.", "ven.", "sam.", "dim."],
    months_long: [
        "janvier",
        "février",
        "mars",
        "avril",
        "mai",
        "juin",
        "juillet",
        "août",
        "septembre",
        "octobre",
        "novembre",
        "décembre",
    ],
    months_short: [
        "janv.", "févr.", "mars", "avr.", "mai", "juin", "juil.", "août", "sept.", "oct.", "nov.",
        "déc.",
    ],
};

static ES: LocaleTable = LocaleTable {
    language: "es",
    today: "hoy",
    yesterday: "ayer",
    tomorrow: "mañana",
    day_before_yesterday: Some("anteayer"),
    day_after_tomorrow: Some("pasado mañana"),
    future: "dentro de {n} días",
    past: "hace {n} días",
    weekdays_long: [
        "lunes",
        "martes",
        "miércoles",
        "jueves",
        "viernes",
        "sábado",
        "domingo",
    ],
    weekdays_short: ["lun", "mar", "mié", "jue", "vie", "sáb", "dom"],
    months_long: [
        "enero",
        "febrero",
        "marzo",
        "abril",
        "mayo",
        "junio",
        "julio",
        "agosto",
        "septiembre",
        "octubre",
        "noviembre",
        "diciembre",
    ],
    months_short: [
        "ene", "feb", "mar", "abr", "may", "jun", "jul", "ago", "sept", "oct", "nov", "dic",
    ],
};

static JA: LocaleTable = LocaleTable {
    language: "ja",
    today: "今日",
    yesterday: "昨日",
    tomorrow: "明日",
    day_before_yesterday: Some("一昨日"),
    day_after_tomorrow: Some("明後日"),
    future: "{n} 日後",
    past: "{n} 日前",
    weekdays_long: [
        "月曜日", "火曜日", "水曜日", "木曜日", "金曜日", "土曜日", "日曜日",
    ],
    weekdays_short: ["月", "火", "水", "木", "金", "土", "日"],
    months_long: [
        "1月", "2月", "3月", "4月", "5月", "6月", "7月", "8月", "9月", "10月", "11月", "12月",
    ],
    months_short: [
        "1月", "2月", "3月", "4月", "5月", "6月", "7月", "8月", "9月", "10月", "11月", "12月",
    ],
};

static TABLES: [&LocaleTable; 5] = [&EN, &DE, &FR, &ES, &JA];

fn table_for(locale: &LocaleTag) -> &'static LocaleTable {
    let language = locale.language();
    TABLES
        .iter()
        .copied()
        .find(|table| table.language == language)
        .unwrap_or(&EN)
}

/// Whole calendar days from `today` to `target`.
pub fn day_difference(target: NaiveDate, today: NaiveDate) -> i64 {
    target.signed_duration_since(today).num_days()
}

#[tracing::instrument(level = "trace")]
pub fn relative(target: NaiveDate, today: NaiveDate, locale: &LocaleTag) -> String {
    let table = table_for(locale);
    let days = day_difference(target, today);
    let word = match days {
        0 => Some(table.today),
        -1 => Some(table.yesterday),
        1 => Some(table.tomorrow),
        -2 => table.day_before_yesterday,
        2 => table.day_after_tomorrow,
        _ => None,
    };
    let phrase = match word {
        Some(word) => word.to_string(),
        None if days > 0 => table.future.replace("{n}", &days.to_string()),
        None => table.past.replace("{n}", &days.unsigned_abs().to_string()),
    };
    capitalize(&phrase)
}

/// Same as [`relative`] but for timestamps; only their dates count.
pub fn relative_between(target: NaiveDateTime, now: NaiveDateTime, locale: &LocaleTag) -> String {
    relative(target.date(), now.date(), locale)
}

pub fn weekday_label(day: Weekday, locale: &LocaleTag, width: LabelWidth) -> &'static str {
    let table = table_for(locale);
    let index = day.num_days_from_monday() as usize;
    match width {
        LabelWidth::Long => table.weekdays_long[index],
        LabelWidth::Short => table.weekdays_short[index],
    }
}

pub fn month_label(month: u32, locale: &LocaleTag, width: LabelWidth) -> Option<&'static str> {
    let index = usize::try_from(month.checked_sub(1)?).ok()?;
    let table = table_for(locale);
    match width {
        LabelWidth::Long => table.months_long.get(index).copied(),
        LabelWidth::Short => table.months_short.get(index).copied(),
    }
}

fn capitalize(phrase: &str) -> String {
    let mut chars = phrase.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
