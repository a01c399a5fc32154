use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use anyhow::anyhow;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::countdown::Countdown;
use crate::datetime::{CalendarDate, day_of_year};
use crate::rotation::{Duty, select_today};

/// Everything one rendering pass shows, computed from a single `today`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardView {
    pub generated_date: CalendarDate,
    pub today_display: String,
    pub day_of_year: u32,
    pub people_images: BTreeMap<String, String>,
    pub duties: Vec<DutyView>,
    pub countdowns: Vec<CountdownView>,
}

/// A widget either renders or shows a placeholder with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "data", rename_all = "snake_case")]
pub enum WidgetState<T> {
    Ready(T),
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DutyView {
    pub title: String,
    pub tooltip: Option<String>,
    pub assigned: WidgetState<Vec<CandidateView>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateView {
    pub id: String,
    pub name: Option<String>,
    pub image: Option<String>,
}

impl CandidateView {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountdownView {
    pub title: String,
    pub date: CalendarDate,
    pub days_remaining: i64,
    pub label: String,
    pub image: Option<String>,
    pub tooltip: Option<String>,
    pub turning: Option<u32>,
}

impl From<&Countdown<'_>> for CountdownView {
    fn from(row: &Countdown<'_>) -> Self {
        Self {
            title: row.event.title.clone(),
            date: row.occurs_on,
            days_remaining: row.days_remaining,
            label: row.label(),
            image: row.event.image.clone(),
            tooltip: row.event.tooltip.clone(),
            turning: row.turning,
        }
    }
}

#[tracing::instrument(skip(cfg))]
pub fn build(cfg: &Config, today: CalendarDate) -> DashboardView {
    let duties = cfg.duties.iter().map(|duty| duty_view(cfg, duty, today)).collect();

    let countdowns = cfg
        .board()
        .visible_sorted(&cfg.events, today)
        .iter()
        .map(CountdownView::from)
        .collect();

    let people_images = cfg
        .people
        .iter()
        .filter_map(|p| p.image.clone().map(|img| (p.name.clone(), img)))
        .collect();

    DashboardView {
        generated_date: today,
        today_display: today.format_long(),
        day_of_year: day_of_year(today),
        people_images,
        duties,
        countdowns,
    }
}

fn duty_view(cfg: &Config, duty: &Duty, today: CalendarDate) -> DutyView {
    let assigned = match select_today(duty, today) {
        Ok(group) => WidgetState::Ready(
            group
                .members()
                .iter()
                .map(|id| {
                    let person = cfg.person(id);
                    CandidateView {
                        id: id.clone(),
                        name: person.map(|p| p.name.clone()),
                        image: person.and_then(|p| p.image.clone()),
                    }
                })
                .collect(),
        ),
        Err(err) => {
            warn!(duty = %duty.title, error = %err, "duty widget unavailable");
            WidgetState::Error {
                message: err.to_string(),
            }
        }
    };

    DutyView {
        title: duty.title.clone(),
        tooltip: duty.tooltip.clone(),
        assigned,
    }
}

/// Writes the view as pretty JSON, replacing `path` atomically.
#[tracing::instrument(skip(view))]
pub fn write_snapshot(view: &DashboardView, path: &Path) -> anyhow::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    debug!(file = %path.display(), "writing snapshot atomically");

    let mut temp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut temp, view)?;
    writeln!(temp)?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    info!(file = %path.display(), "dashboard snapshot written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{WidgetState, build};
    use crate::config::Config;
    use crate::datetime::CalendarDate;
    use crate::rotation::Duty;

    const SAMPLE: &str = r#"
[[person]]
name = "Josephine"
image = "josephine.jpg"

[[duty]]
title = "👑"
groups = ["josephine.jpg", "estelle.jpg"]

[[event]]
title = "🎂"
date = "03/09/2023"
image = "caspar.jpg"

[[event]]
title = "🎄"
date = "12/24/2022"
"#;

    fn date(s: &str) -> CalendarDate {
        CalendarDate::parse(s).expect("valid date")
    }

    #[test]
    fn builds_one_consistent_pass() {
        let cfg = Config::from_toml_str(SAMPLE).expect("config");
        let view = build(&cfg, date("2023-01-02"));

        assert_eq!(view.today_display, "Monday, January 02");
        assert_eq!(view.day_of_year, 2);
        assert_eq!(view.countdowns.len(), 1);
        assert_eq!(view.countdowns[0].days_remaining, 66);
        assert_eq!(view.countdowns[0].label, "66 days");

        let WidgetState::Ready(ref assigned) = view.duties[0].assigned else {
            panic!("duty should render");
        };
        assert_eq!(assigned[0].display_name(), "Josephine");
        assert_eq!(assigned[0].image.as_deref(), Some("josephine.jpg"));
    }

    #[test]
    fn broken_duty_becomes_placeholder() {
        let mut cfg = Config::from_toml_str(SAMPLE).expect("config");
        cfg.duties.push(Duty {
            title: "🐩".to_string(),
            tooltip: None,
            repeat_period_days: 1,
            candidate_groups: vec![],
        });

        let view = build(&cfg, date("2023-01-02"));
        assert!(matches!(view.duties[0].assigned, WidgetState::Ready(_)));
        assert_eq!(
            view.duties[1].assigned,
            WidgetState::Error {
                message: "duty `🐩` has no candidate groups".to_string()
            }
        );
    }

    #[test]
    fn snapshot_json_shape() {
        let cfg = Config::from_toml_str(SAMPLE).expect("config");
        let view = build(&cfg, date("2023-01-02"));
        let json = serde_json::to_value(&view).expect("serialize");

        assert_eq!(json["generated_date"], "2023-01-02");
        assert_eq!(json["duties"][0]["assigned"]["state"], "ready");
        assert_eq!(json["duties"][0]["assigned"]["data"][0]["id"], "josephine.jpg");
        assert_eq!(json["countdowns"][0]["date"], "2023-03-09");
        assert_eq!(json["people_images"]["Josephine"], "josephine.jpg");
    }
}
