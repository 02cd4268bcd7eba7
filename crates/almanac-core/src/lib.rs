pub mod annotation;
pub mod boundary;
pub mod cli;
pub mod commands;
pub mod config;
pub mod conventions;
pub mod coordinator;
pub mod datastore;
pub mod datetime;
pub mod documents;
pub mod engine;
pub mod error;
pub mod holiday;
pub mod ics;
pub mod migrate;
pub mod notice;
pub mod page_name;
pub mod quarter;
pub mod relative;
pub mod render;
pub mod rollup;
pub mod user_events;
pub mod week;
pub mod window;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting almanac"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.almanacrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let today = match cli.today.as_deref()
  {
    | Some(raw) => {
      datetime::parse_date_expr(
        raw,
        datetime::today()
      )
      .context("invalid --today")?
    }
    | None => datetime::today()
  };

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let docs =
    datastore::FileDocuments::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open page store at \
         {}",
        data_dir.display()
      )
    })?;

  let holidays =
    holiday::HolidayService::default();
  let mut engine =
    engine::CalendarEngine::new(
      &cfg, docs, holidays
    );
  let mut renderer =
    render::Renderer::new(&cfg)?;
  let inv = cli::Invocation::parse(
    &cfg, cli.rest
  )?;

  commands::dispatch(
    &mut engine,
    &cfg,
    &mut renderer,
    inv,
    today
  )?;

  info!("done");
  Ok(())
}
