pub mod cli;
pub mod commands;
pub mod config;
pub mod countdown;
pub mod dashboard;
pub mod datetime;
pub mod error;
pub mod render;
pub mod rotation;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

pub use countdown::{
  Countdown,
  CountdownBoard,
  Event,
  Recurrence
};
pub use datetime::{
  CalendarDate,
  day_of_year,
  days_remaining
};
pub use error::ConfigError;
pub use rotation::{
  CandidateGroup,
  Duty,
  select_today
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting dinkydash"
  );

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg
    .apply_overrides(
      cli
        .overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
    .context(
      "failed to apply --set \
       overrides"
    )?;

  // Sampled once so every widget in the
  // pass agrees on the date.
  let today = match cli.today {
    | Some(pinned) => pinned,
    | None => cfg.clock()?.today()
  };
  debug!(%today, day_of_year = day_of_year(today), "rendering date");

  let mut renderer =
    render::Renderer::new(
      cli.color.as_deref()
    )?;

  commands::dispatch(
    &cfg,
    &mut renderer,
    cli
      .command
      .unwrap_or(cli::Command::Show),
    today
  )?;

  info!("done");
  Ok(())
}
