use std::future::Future;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::{
  Duration,
  Instant
};

use anyhow::Context;
use chrono::offset::LocalResult;
use chrono::{
  DateTime,
  NaiveDate,
  NaiveDateTime,
  TimeZone,
  Utc
};
use chrono_tz::Tz;
use ical::IcalParser;
use ical::parser::ical::component::IcalEvent;
use ical::property::Property;
use serde::Serialize;
use tracing::{
  debug,
  info,
  warn
};

use crate::boundary::add_days;

/// One VEVENT placed on local calendar
/// days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IcsEvent {
  pub uid:         String,
  pub summary:     String,
  pub description: Option<String>,
  pub location:    Option<String>,
  pub start:       DateTime<Utc>,
  pub end:         Option<DateTime<Utc>>,
  pub all_day:     bool,
  pub first_day:   NaiveDate,
  pub last_day:    NaiveDate
}

impl IcsEvent {
  pub fn occurs_on(
    &self,
    date: NaiveDate
  ) -> bool {
    self.first_day <= date
      && date <= self.last_day
  }
}

/// Parses every VEVENT in `ics_text`.
/// Events without a usable DTSTART are
/// skipped; a malformed calendar is an
/// error.
#[tracing::instrument(skip(ics_text), fields(bytes = ics_text.len()))]
pub fn parse_ics(
  ics_text: &str,
  timezone: Tz
) -> anyhow::Result<Vec<IcsEvent>> {
  let reader =
    BufReader::new(ics_text.as_bytes());
  let parser = IcalParser::new(reader);

  let mut events = Vec::new();
  for calendar in parser {
    let calendar = calendar.context(
      "failed parsing iCalendar \
       payload"
    )?;
    for event in calendar.events {
      match normalize_event(
        &event, timezone
      ) {
        | Some(normalized) => {
          events.push(normalized)
        }
        | None => {
          debug!(
            uid = ?property_value(&event.properties, "UID"),
            "skipping VEVENT without usable DTSTART"
          );
        }
      }
    }
  }
  Ok(events)
}

fn normalize_event(
  event: &IcalEvent,
  timezone: Tz
) -> Option<IcsEvent> {
  let start_prop = find_property(
    &event.properties,
    "DTSTART"
  )?;
  let (start, all_day) =
    parse_ics_datetime(
      start_prop, timezone
    )?;
  let end = find_property(
    &event.properties,
    "DTEND"
  )
  .and_then(|prop| {
    parse_ics_datetime(prop, timezone)
  })
  .map(|(end, _)| end)
  .filter(|end| *end > start);

  let first_day = start
    .with_timezone(&timezone)
    .date_naive();
  let last_day = match end {
    // DTEND is exclusive.
    | Some(end) if all_day => {
      add_days(
        end
          .with_timezone(&timezone)
          .date_naive(),
        -1
      )
      .ok()?
    }
    | Some(end) => {
      (end - chrono::Duration::seconds(1))
        .with_timezone(&timezone)
        .date_naive()
    }
    | None => first_day
  }
  .max(first_day);

  let summary = property_value(
    &event.properties,
    "SUMMARY"
  )
  .filter(|value| !value.is_empty())
  .unwrap_or_else(|| {
    "Calendar Event".to_string()
  });
  let uid = property_value(
    &event.properties,
    "UID"
  )
  .unwrap_or_else(|| {
    format!("{start}-{summary}")
  });

  Some(IcsEvent {
    uid,
    summary,
    description: property_value(
      &event.properties,
      "DESCRIPTION"
    )
    .filter(|value| !value.is_empty()),
    location: property_value(
      &event.properties,
      "LOCATION"
    )
    .filter(|value| !value.is_empty()),
    start,
    end,
    all_day,
    first_day,
    last_day
  })
}

/// Returns the instant and whether the
/// value was a bare date.
fn parse_ics_datetime(
  property: &Property,
  fallback: Tz
) -> Option<(DateTime<Utc>, bool)> {
  let raw =
    property.value.as_ref()?.trim();
  if raw.is_empty() {
    return None;
  }

  if let Ok(parsed) =
    DateTime::parse_from_rfc3339(raw)
  {
    return Some((
      parsed.with_timezone(&Utc),
      false
    ));
  }

  if raw.ends_with('Z')
    && let Ok(naive) =
      NaiveDateTime::parse_from_str(
        raw,
        "%Y%m%dT%H%M%SZ"
      )
  {
    return Some((
      DateTime::<Utc>::from_naive_utc_and_offset(
        naive, Utc
      ),
      false
    ));
  }

  let timezone =
    timezone_from_property(
      property, fallback
    );

  if raw.len() == 8
    && let Ok(date) =
      NaiveDate::parse_from_str(
        raw, "%Y%m%d"
      )
  {
    let naive =
      date.and_hms_opt(0, 0, 0)?;
    return local_naive_to_utc(
      timezone, naive
    )
    .map(|dt| (dt, true));
  }

  NaiveDateTime::parse_from_str(
    raw,
    "%Y%m%dT%H%M%S"
  )
  .ok()
  .and_then(|naive| {
    local_naive_to_utc(timezone, naive)
  })
  .map(|dt| (dt, false))
}

fn timezone_from_property(
  property: &Property,
  fallback: Tz
) -> Tz {
  let Some(params) =
    property.params.as_ref()
  else {
    return fallback;
  };
  for (key, values) in params {
    if key != "TZID" {
      continue;
    }
    let Some(value) = values.first()
    else {
      continue;
    };
    match value.trim().parse::<Tz>() {
      | Ok(tz) => return tz,
      | Err(error) => {
        warn!(
          tzid = %value,
          error = %error,
          "invalid TZID in ICS; using project timezone"
        );
      }
    }
  }
  fallback
}

fn local_naive_to_utc(
  timezone: Tz,
  naive: NaiveDateTime
) -> Option<DateTime<Utc>> {
  match timezone
    .from_local_datetime(&naive)
  {
    | LocalResult::Single(dt) => {
      Some(dt.with_timezone(&Utc))
    }
    | LocalResult::Ambiguous(
      first,
      second
    ) => {
      Some(
        first
          .min(second)
          .with_timezone(&Utc)
      )
    }
    | LocalResult::None => None
  }
}

fn find_property<'a>(
  properties: &'a [Property],
  name: &str
) -> Option<&'a Property> {
  properties.iter().find(|property| {
    property.name == name
  })
}

fn property_value(
  properties: &[Property],
  name: &str
) -> Option<String> {
  find_property(properties, name)?
    .value
    .as_ref()
    .map(|value| {
      value.trim().to_string()
    })
}

/// Source of raw ICS documents.
pub trait FeedFetcher {
  fn fetch(
    &self,
    location: &str
  ) -> impl Future<
    Output = anyhow::Result<String>
  > + Send;
}

/// Fetches `http(s)://` and `webcal://`
/// feeds over HTTP and anything else from
/// the local filesystem.
#[derive(Debug, Clone)]
pub struct HttpFeedFetcher {
  client: reqwest::Client
}

impl HttpFeedFetcher {
  pub fn new() -> anyhow::Result<Self> {
    let client =
      reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context(
          "failed building HTTP client \
           for calendar feeds"
        )?;
    Ok(Self { client })
  }

  async fn fetch_url(
    &self,
    candidates: &[String]
  ) -> anyhow::Result<String> {
    let mut last_error =
      None::<anyhow::Error>;
    for candidate in candidates {
      let response = match self
        .client
        .get(candidate.as_str())
        .header(
          reqwest::header::ACCEPT,
          "text/calendar, */*;q=0.5"
        )
        .send()
        .await
      {
        | Ok(response) => response,
        | Err(error) => {
          warn!(
            candidate = %candidate,
            error = %error,
            "failed requesting calendar feed"
          );
          last_error = Some(
            anyhow::Error::new(error)
              .context(format!(
                "failed requesting \
                 calendar URL: \
                 {candidate}"
              ))
          );
          continue;
        }
      };

      let status = response.status();
      if !status.is_success() {
        warn!(
          candidate = %candidate,
          status = %status,
          "calendar feed returned non-success status"
        );
        last_error = Some(anyhow::anyhow!(
          "calendar URL returned HTTP \
           {status} for {candidate}"
        ));
        continue;
      }

      return response
        .text()
        .await
        .with_context(|| {
          format!(
            "failed reading calendar \
             body for {candidate}"
          )
        });
    }

    Err(last_error.unwrap_or_else(|| {
      anyhow::anyhow!(
        "unable to fetch calendar from \
         any candidate URL"
      )
    }))
  }
}

impl FeedFetcher for HttpFeedFetcher {
  async fn fetch(
    &self,
    location: &str
  ) -> anyhow::Result<String> {
    let trimmed = location.trim();
    if trimmed.is_empty() {
      anyhow::bail!(
        "calendar location is empty"
      );
    }
    let candidates =
      normalized_calendar_locations(
        trimmed
      );
    if candidates.iter().any(|url| {
      url.starts_with("http://")
        || url.starts_with("https://")
    }) {
      return self
        .fetch_url(&candidates)
        .await;
    }

    let path = trimmed
      .strip_prefix("file://")
      .unwrap_or(trimmed);
    let path = crate::config::expand_tilde(
      Path::new(path)
    );
    tokio::fs::read_to_string(&path)
      .await
      .with_context(|| {
        format!(
          "failed to read calendar \
           file {}",
          path.display()
        )
      })
  }
}

fn normalized_calendar_locations(
  location: &str
) -> Vec<String> {
  let trimmed = location.trim();
  let lower =
    trimmed.to_ascii_lowercase();

  if lower.starts_with("webcal://") {
    let remainder = &trimmed[9..];
    let https =
      format!("https://{remainder}");
    let http =
      format!("http://{remainder}");
    debug!(
      raw = %trimmed,
      normalized = %https,
      fallback = %http,
      "rewrote webcal calendar URL"
    );
    return vec![https, http];
  }

  if lower.starts_with("webcals://") {
    let remainder = &trimmed[10..];
    return vec![format!(
      "https://{remainder}"
    )];
  }

  vec![trimmed.to_string()]
}

#[derive(Debug, Default)]
struct FeedState {
  locations:  Vec<String>,
  fetched_at: Option<Instant>,
  events:     Arc<Vec<IcsEvent>>
}

/// Cached, merged view of a set of ICS
/// feeds.
///
/// Callers asking for the same feed set
/// while a fetch is running wait for it
/// and share its result instead of
/// fetching again.
#[derive(Debug)]
pub struct IcsFeedCache<F> {
  fetcher:  F,
  timezone: Tz,
  max_age:  Duration,
  feed:     tokio::sync::Mutex<FeedState>,
  snapshot:
    parking_lot::RwLock<Arc<Vec<IcsEvent>>>
}

impl<F: FeedFetcher> IcsFeedCache<F> {
  pub fn new(
    fetcher: F,
    timezone: Tz,
    max_age: Duration
  ) -> Self {
    Self {
      fetcher,
      timezone,
      max_age,
      feed: tokio::sync::Mutex::new(
        FeedState::default()
      ),
      snapshot: parking_lot::RwLock::new(
        Arc::new(Vec::new())
      )
    }
  }

  /// The last merged result, without
  /// waiting.
  pub fn snapshot(
    &self
  ) -> Arc<Vec<IcsEvent>> {
    Arc::clone(&self.snapshot.read())
  }

  /// Events of `locations`, fetched only
  /// when the cached set differs or is
  /// older than the age threshold.
  pub async fn events(
    &self,
    locations: &[String]
  ) -> Arc<Vec<IcsEvent>> {
    self.load(locations, false).await
  }

  /// Refetches regardless of age.
  pub async fn refresh(
    &self,
    locations: &[String]
  ) -> Arc<Vec<IcsEvent>> {
    self.load(locations, true).await
  }

  async fn load(
    &self,
    locations: &[String],
    force: bool
  ) -> Arc<Vec<IcsEvent>> {
    let mut state =
      self.feed.lock().await;
    let fresh = state
      .fetched_at
      .is_some_and(|at| {
        at.elapsed() < self.max_age
      });
    if !force
      && fresh
      && state.locations == locations
    {
      debug!(
        feeds = locations.len(),
        "serving cached ICS events"
      );
      return Arc::clone(&state.events);
    }

    let mut merged = Vec::new();
    for location in locations {
      match self
        .fetch_one(location)
        .await
      {
        | Ok(events) => {
          merged.extend(events)
        }
        | Err(error) => {
          warn!(
            location = %location,
            error = %format!("{error:#}"),
            "ICS feed unavailable"
          );
        }
      }
    }
    merged.sort_by(|a, b| {
      a.start.cmp(&b.start).then_with(
        || a.summary.cmp(&b.summary)
      )
    });
    info!(
      feeds = locations.len(),
      events = merged.len(),
      "refreshed ICS events"
    );

    let events = Arc::new(merged);
    state.locations = locations.to_vec();
    state.fetched_at = Some(Instant::now());
    state.events = Arc::clone(&events);
    *self.snapshot.write() =
      Arc::clone(&events);
    events
  }

  async fn fetch_one(
    &self,
    location: &str
  ) -> anyhow::Result<Vec<IcsEvent>> {
    let text = self
      .fetcher
      .fetch(location)
      .await?;
    parse_ics(&text, self.timezone)
  }
}

impl<F> IcsFeedCache<F>
where
  F: FeedFetcher + Send + Sync + 'static
{
  /// Refreshes `locations` every
  /// `period` until the task is aborted.
  pub fn spawn_refresh(
    self: Arc<Self>,
    locations: Vec<String>,
    period: Duration
  ) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
      let mut interval =
        tokio::time::interval(period);
      interval.set_missed_tick_behavior(
        tokio::time::MissedTickBehavior::Skip
      );
      loop {
        interval.tick().await;
        self.refresh(&locations).await;
      }
    })
  }
}

/// Events that touch `date`.
pub fn events_on(
  events: &[IcsEvent],
  date: NaiveDate
) -> Vec<&IcsEvent> {
  events
    .iter()
    .filter(|event| event.occurs_on(date))
    .collect()
}
