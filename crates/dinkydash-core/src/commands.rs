use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, anyhow};
use tracing::{debug, info, instrument};

use crate::cli::Command;
use crate::config::Config;
use crate::dashboard::{self, DashboardView};
use crate::datetime::CalendarDate;
use crate::render::Renderer;
use crate::rotation;

#[instrument(skip(cfg, renderer))]
pub fn dispatch(
    cfg: &Config,
    renderer: &mut Renderer,
    command: Command,
    today: CalendarDate,
) -> anyhow::Result<()> {
    debug!(?command, %today, "dispatching command");

    match command {
        Command::Show => {
            let view = dashboard::build(cfg, today);
            renderer.print_dashboard(&view)
        }
        Command::Snapshot { output } => {
            let view = dashboard::build(cfg, today);
            write_snapshot(&view, &output)
        }
        Command::Schedule { duty, days, from } => {
            let found = cfg.duty(&duty).ok_or_else(|| {
                let known: Vec<&str> = cfg.duties.iter().map(|d| d.title.as_str()).collect();
                anyhow!("unknown duty `{duty}`; configured duties: {}", known.join(", "))
            })?;
            let assignments = rotation::schedule(found, from.unwrap_or(today), days)
                .with_context(|| format!("cannot schedule duty `{duty}`"))?;
            renderer.print_schedule(&found.title, &assignments)
        }
        Command::Check => {
            let summary = check_summary(cfg)?;
            info!(%summary, "config check passed");
            writeln!(io::stdout().lock(), "{summary}")?;
            Ok(())
        }
    }
}

fn check_summary(cfg: &Config) -> anyhow::Result<String> {
    let source = cfg
        .loaded_from
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults".to_string());
    let clock = cfg.clock()?;
    Ok(format!(
        "config OK ({source}): {} duties, {} events, {} people, timezone {}",
        cfg.duties.len(),
        cfg.events.len(),
        cfg.people.len(),
        clock.label()
    ))
}

fn write_snapshot(view: &DashboardView, output: &Path) -> anyhow::Result<()> {
    if output == Path::new("-") {
        let mut out = io::stdout().lock();
        serde_json::to_writer_pretty(&mut out, view)?;
        writeln!(out)?;
        return Ok(());
    }

    dashboard::write_snapshot(view, output)
        .with_context(|| format!("failed to write snapshot to {}", output.display()))
}

#[cfg(test)]
mod tests {
    use super::check_summary;
    use crate::config::Config;

    #[test]
    fn check_names_counts_and_timezone() {
        let cfg = Config::from_toml_str(
            "[board]\ntimezone = \"Europe/Berlin\"\n\n[[duty]]\ntitle = \"🗑\"\ngroups = [\"a\", \"b\"]\n",
        )
        .expect("valid config");
        assert_eq!(
            check_summary(&cfg).expect("summary"),
            "config OK (defaults): 1 duties, 0 events, 0 people, timezone Europe/Berlin"
        );
    }
}
