use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::datetime::CalendarDate;
use crate::rotation::MAX_SCHEDULE_DAYS;

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "dinkydash",
    version,
    about = "DinkyDash: household duty rotation and countdown board",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Dashboard config file (TOML).
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Render as if today were this date (YYYY-MM-DD or MM/DD/YYYY).
    #[arg(long = "today", global = true, value_parser = parse_date_arg)]
    pub today: Option<CalendarDate>,

    /// Override a board setting, e.g. --set board.include_past=on
    #[arg(
        long = "set",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub overrides: Vec<KeyVal>,

    #[arg(long = "color", global = true)]
    pub color: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print today's dashboard.
    Show,
    /// Write the dashboard as JSON for a web page or kiosk.
    Snapshot {
        /// Output file; `-` writes to stdout.
        #[arg(short, long, default_value = "dashboard_data.json")]
        output: PathBuf,
    },
    /// Preview who is on duty over the coming days.
    Schedule {
        /// Duty title as written in the config.
        duty: String,
        /// Number of days to preview.
        #[arg(long, default_value_t = 14, value_parser = parse_days_arg)]
        days: usize,
        /// First day of the preview; defaults to today.
        #[arg(long, value_parser = parse_date_arg)]
        from: Option<CalendarDate>,
    },
    /// Load and validate the config without rendering.
    Check,
}

fn parse_date_arg(s: &str) -> Result<CalendarDate, String> {
    CalendarDate::parse(s).map_err(|e| e.to_string())
}

fn parse_days_arg(s: &str) -> Result<usize, String> {
    let days: usize = s.parse().map_err(|_| format!("`{s}` is not a day count"))?;
    if (1..=MAX_SCHEDULE_DAYS).contains(&days) {
        Ok(days)
    } else {
        Err(format!("must be between 1 and {MAX_SCHEDULE_DAYS}"))
    }
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}
