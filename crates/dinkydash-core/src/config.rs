use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::Context;
use serde::{
  Deserialize,
  Serialize
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::countdown::{
  CountdownBoard,
  Event,
  Recurrence
};
use crate::datetime::{
  CalendarDate,
  HostClock
};
use crate::error::ConfigError;
use crate::rotation::{
  CandidateGroup,
  Duty
};

pub const CONFIG_ENV_VAR: &str =
  "DINKYDASH_CONFIG";
pub const CONFIG_FILE_NAME: &str =
  "dinkydash.toml";

#[derive(
  Debug, Clone, PartialEq, Eq, Serialize, Deserialize,
)]
pub struct Person {
  pub name:  String,
  #[serde(default)]
  pub image: Option<String>
}

#[derive(
  Debug, Clone, Default, PartialEq, Eq,
)]
pub struct BoardSettings {
  pub include_past: bool,
  pub limit:        Option<usize>,
  pub timezone:     Option<String>
}

/// Validated dashboard configuration.
/// Read-only once loaded.
#[derive(Debug, Clone, Default)]
pub struct Config {
  pub board:       BoardSettings,
  pub people:      Vec<Person>,
  pub duties:      Vec<Duty>,
  pub events:      Vec<Event>,
  pub loaded_from: Option<PathBuf>
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
  #[serde(default)]
  board:  RawBoard,
  #[serde(default, rename = "person")]
  people: Vec<Person>,
  #[serde(default, rename = "duty")]
  duties: Vec<RawDuty>,
  #[serde(default, rename = "event")]
  events: Vec<RawEvent>
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawBoard {
  include_past: Option<bool>,
  limit:        Option<usize>,
  timezone:     Option<String>
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDuty {
  title:              Option<String>,
  tooltip:            Option<String>,
  repeat_period_days: Option<u32>,
  #[serde(default)]
  groups:             Vec<GroupSpec>
}

/// A rotation turn written either as
/// one identifier or a list of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GroupSpec {
  One(String),
  Many(Vec<String>)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEvent {
  title:      Option<String>,
  date:       Option<String>,
  image:      Option<String>,
  tooltip:    Option<String>,
  recurrence: Option<Recurrence>,
  since_year: Option<i32>
}

impl Config {
  #[tracing::instrument(skip(
    config_override
  ))]
  pub fn load(
    config_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let Some(path) =
      resolve_config_path(
        config_override
      )?
    else {
      warn!(
        "no dashboard config found; \
         showing an empty dashboard"
      );
      return Ok(Self::default());
    };

    info!(config = %path.display(), "loading dashboard config");
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    let mut cfg = Self::from_toml_str(
      &text
    )
    .with_context(|| {
      format!(
        "invalid dashboard config {}",
        path.display()
      )
    })?;
    cfg.loaded_from = Some(path);
    Ok(cfg)
  }

  /// Parses and validates a whole
  /// config document. The first invalid
  /// widget rejects the document.
  pub fn from_toml_str(
    text: &str
  ) -> anyhow::Result<Self> {
    let raw: RawConfig =
      toml::from_str(text).context(
        "failed to parse TOML"
      )?;

    let duties = raw
      .duties
      .into_iter()
      .enumerate()
      .map(|(idx, d)| {
        build_duty(idx + 1, d)
      })
      .collect::<Result<Vec<_>, _>>()?;

    let events = raw
      .events
      .into_iter()
      .enumerate()
      .map(|(idx, e)| {
        build_event(idx + 1, e)
      })
      .collect::<Result<Vec<_>, _>>()?;

    for (idx, person) in
      raw.people.iter().enumerate()
    {
      if person.name.trim().is_empty()
      {
        return Err(
          ConfigError::MissingField {
            widget: format!(
              "person #{}",
              idx + 1
            ),
            field:  "name"
          }
          .into()
        );
      }
    }

    let board = BoardSettings {
      include_past: raw
        .board
        .include_past
        .unwrap_or(false),
      limit:        raw.board.limit,
      timezone:     raw.board.timezone
    };

    let cfg = Self {
      board,
      people: raw.people,
      duties,
      events,
      loaded_from: None
    };
    cfg.clock()?;

    debug!(
      duties = cfg.duties.len(),
      events = cfg.events.len(),
      people = cfg.people.len(),
      "validated dashboard config"
    );
    Ok(cfg)
  }

  /// Applies `board.*` overrides given
  /// as key/value pairs. A leading
  /// `set.` is ignored.
  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) -> Result<(), ConfigError>
  where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("set.")
        .unwrap_or(&k)
        .trim()
        .to_string();
      let value = v.trim();
      debug!(key = %key, value = %value, "applying override");

      match key.as_str() {
        | "board.include_past" => {
          self.board.include_past =
            parse_bool(value).ok_or_else(
              || {
                ConfigError::InvalidSetting {
                  key:    key.clone(),
                  reason: format!(
                    "expected on/off, \
                     got `{value}`"
                  )
                }
              }
            )?;
        }
        | "board.limit" => {
          self.board.limit =
            if value.is_empty()
              || value == "none"
            {
              None
            } else {
              Some(
                value.parse().map_err(
                  |_| {
                    ConfigError::InvalidSetting {
                      key:    key.clone(),
                      reason: format!(
                        "expected a count, \
                         got `{value}`"
                      )
                    }
                  }
                )?
              )
            };
        }
        | "board.timezone" => {
          let timezone =
            if value.is_empty() {
              None
            } else {
              Some(value.to_string())
            };
          HostClock::resolve(
            timezone.as_deref()
          )?;
          self.board.timezone = timezone;
        }
        | _ => {
          return Err(
            ConfigError::InvalidSetting {
              key:    key.clone(),
              reason: "unknown setting"
                .to_string()
            }
          );
        }
      }
    }
    Ok(())
  }

  #[must_use]
  pub fn board(&self) -> CountdownBoard {
    CountdownBoard {
      include_past: self
        .board
        .include_past,
      limit:        self.board.limit
    }
  }

  pub fn clock(
    &self
  ) -> Result<HostClock, ConfigError> {
    HostClock::resolve(
      self.board.timezone.as_deref()
    )
  }

  /// Looks a candidate identifier up by
  /// person name or image file.
  #[must_use]
  pub fn person(
    &self,
    id: &str
  ) -> Option<&Person> {
    self.people.iter().find(|p| {
      p.name == id
        || p.image.as_deref() == Some(id)
    })
  }

  #[must_use]
  pub fn duty(
    &self,
    title: &str
  ) -> Option<&Duty> {
    self
      .duties
      .iter()
      .find(|d| d.title == title)
  }
}

fn build_duty(
  position: usize,
  raw: RawDuty
) -> Result<Duty, ConfigError> {
  let title = required(
    raw.title,
    || format!("duty #{position}"),
    "title"
  )?;

  let candidate_groups = raw
    .groups
    .into_iter()
    .map(|group| match group {
      | GroupSpec::One(id) => {
        CandidateGroup::single(
          id.trim()
        )
      }
      | GroupSpec::Many(ids) => {
        CandidateGroup::new(
          ids.iter().map(|id| id.trim())
        )
      }
    })
    .collect();

  let duty = Duty {
    title,
    tooltip: raw.tooltip,
    repeat_period_days: raw
      .repeat_period_days
      .unwrap_or(1),
    candidate_groups
  };
  duty.validate()?;
  trace!(duty = %duty.title, groups = duty.candidate_groups.len(), "loaded duty");
  Ok(duty)
}

fn build_event(
  position: usize,
  raw: RawEvent
) -> Result<Event, ConfigError> {
  let widget =
    || format!("event #{position}");
  let title =
    required(raw.title, widget, "title")?;
  let date = CalendarDate::parse(
    &required(raw.date, widget, "date")?
  )?;
  let recurrence =
    raw.recurrence.unwrap_or_default();

  if raw.since_year.is_some()
    && recurrence == Recurrence::Once
  {
    warn!(
      event = %title,
      "since_year only applies to \
       yearly events; ignoring"
    );
  }

  let event = Event {
    title,
    date,
    image: raw
      .image
      .filter(|s| !s.trim().is_empty()),
    tooltip: raw.tooltip,
    recurrence,
    since_year: raw.since_year.filter(
      |_| recurrence == Recurrence::Yearly
    )
  };
  event.validate()?;
  trace!(event = %event.title, date = %event.date, "loaded event");
  Ok(event)
}

fn required(
  value: Option<String>,
  widget: impl Fn() -> String,
  field: &'static str
) -> Result<String, ConfigError> {
  match value {
    | Some(v) if !v.trim().is_empty() => {
      Ok(v)
    }
    | _ => {
      Err(ConfigError::MissingField {
        widget: widget(),
        field
      })
    }
  }
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_config_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(expand_tilde(path)));
  }

  if let Ok(env_path) =
    std::env::var(CONFIG_ENV_VAR)
  {
    if env_path == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(expand_tilde(
      Path::new(&env_path)
    )));
  }

  let local = std::env::current_dir()
    .context(
      "cannot determine current \
       directory"
    )?
    .join(CONFIG_FILE_NAME);
  if local.exists() {
    return Ok(Some(local));
  }

  if let Some(dir) = dirs::config_dir()
  {
    let candidate = dir
      .join("dinkydash")
      .join(CONFIG_FILE_NAME);
    if candidate.exists() {
      return Ok(Some(candidate));
    }
  }

  Ok(None)
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

pub fn parse_bool(
  s: &str
) -> Option<bool> {
  match s
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "1" | "y" | "yes" | "on"
    | "true" => Some(true),
    | "0" | "n" | "no" | "off"
    | "false" => Some(false),
    | _ => None
  }
}

#[cfg(test)]
mod tests {
  use super::{
    Config,
    parse_bool
  };
  use crate::countdown::Recurrence;
  use crate::error::ConfigError;

  const SAMPLE: &str = r#"
[board]
limit = 5

[[person]]
name = "Caspar"
image = "caspar.jpg"

[[duty]]
title = "🗑"
tooltip = "Who's turn to take out the trash?"
groups = ["josephine.jpg", "estelle.jpg"]

[[duty]]
title = "🛏"
repeat_period_days = 7
groups = [["caspar.jpg", "jessica.jpg"], "estelle.jpg"]

[[event]]
title = "🎂"
date = "03/09/2023"
image = "caspar.jpg"
recurrence = "yearly"
since_year = 2016

[[event]]
title = "🎄"
date = "2023-12-25"
image = ""
"#;

  #[test]
  fn parses_sample() {
    let cfg =
      Config::from_toml_str(SAMPLE)
        .expect("valid config");
    assert_eq!(cfg.duties.len(), 2);
    assert_eq!(
      cfg.duties[1].candidate_groups[0]
        .members(),
      ["caspar.jpg", "jessica.jpg"]
    );
    assert_eq!(
      cfg.duties[1].repeat_period_days,
      7
    );
    assert_eq!(
      cfg.events[0].recurrence,
      Recurrence::Yearly
    );
    assert_eq!(
      cfg.events[0].since_year,
      Some(2016)
    );
    assert_eq!(cfg.events[1].image, None);
    assert_eq!(cfg.board().limit, Some(5));
    assert!(!cfg.board().include_past);
    assert_eq!(
      cfg
        .person("caspar.jpg")
        .map(|p| p.name.as_str()),
      Some("Caspar")
    );
  }

  #[test]
  fn rejects_empty_rotation() {
    let err = Config::from_toml_str(
      "[[duty]]\ntitle = \"🐩\"\ngroups \
       = []\n"
    )
    .expect_err("empty rotation");
    assert_eq!(
      err.downcast_ref::<ConfigError>(),
      Some(&ConfigError::EmptyRotation {
        duty: "🐩".to_string()
      })
    );
  }

  #[test]
  fn rejects_empty_group() {
    let err = Config::from_toml_str(
      "[[duty]]\ntitle = \"🐩\"\ngroups \
       = [\"a\", []]\n"
    )
    .expect_err("empty group");
    assert!(matches!(
      err.downcast_ref::<ConfigError>(),
      Some(ConfigError::EmptyGroup {
        position: 2,
        ..
      })
    ));
  }

  #[test]
  fn rejects_blank_member_in_joint_group() {
    let err = Config::from_toml_str(
      "[[duty]]\ntitle = \"🛏\"\ngroups \
       = [[\"a\", \"\"], \"b\"]\n"
    )
    .expect_err("blank member");
    assert_eq!(
      err.downcast_ref::<ConfigError>(),
      Some(&ConfigError::EmptyGroup {
        duty:     "🛏".to_string(),
        position: 1
      })
    );
  }

  #[test]
  fn rejects_since_year_after_date() {
    let err = Config::from_toml_str(
      "[[event]]\ntitle = \"🎂\"\ndate = \
       \"2016-03-09\"\nrecurrence = \
       \"yearly\"\nsince_year = \
       2147483647\n"
    )
    .expect_err("future since_year");
    assert!(matches!(
      err.downcast_ref::<ConfigError>(),
      Some(ConfigError::InvalidSinceYear {
        since_year: 2147483647,
        year: 2016,
        ..
      })
    ));
  }

  #[test]
  fn rejects_wrapped_month() {
    let err = Config::from_toml_str(
      "[[event]]\ntitle = \"🎂\"\ndate = \
       \"13/01/2023\"\n"
    )
    .expect_err("bad month");
    assert!(matches!(
      err.downcast_ref::<ConfigError>(),
      Some(ConfigError::InvalidDate {
        ..
      })
    ));
  }

  #[test]
  fn rejects_missing_fields() {
    let err = Config::from_toml_str(
      "[[event]]\ntitle = \"🎂\"\n"
    )
    .expect_err("missing date");
    assert_eq!(
      err.downcast_ref::<ConfigError>(),
      Some(&ConfigError::MissingField {
        widget: "event #1".to_string(),
        field:  "date"
      })
    );
  }

  #[test]
  fn rejects_unknown_keys_and_zones() {
    assert!(
      Config::from_toml_str(
        "[board]\ncolour = true\n"
      )
      .is_err()
    );
    let err = Config::from_toml_str(
      "[board]\ntimezone = \
       \"Nowhere/Town\"\n"
    )
    .expect_err("bad zone");
    assert!(matches!(
      err.downcast_ref::<ConfigError>(),
      Some(ConfigError::UnknownTimezone(
        _
      ))
    ));
  }

  #[test]
  fn overrides_update_board() {
    let mut cfg =
      Config::from_toml_str(SAMPLE)
        .expect("valid config");
    cfg
      .apply_overrides([
        (
          "board.include_past"
            .to_string(),
          "on".to_string()
        ),
        (
          "set.board.limit".to_string(),
          "none".to_string()
        )
      ])
      .expect("overrides");
    assert!(cfg.board().include_past);
    assert_eq!(cfg.board().limit, None);

    assert!(matches!(
      cfg.apply_overrides([(
        "board.include_past"
          .to_string(),
        "maybe".to_string()
      )]),
      Err(ConfigError::InvalidSetting {
        ..
      })
    ));
    assert!(
      cfg
        .apply_overrides([(
          "board.colour".to_string(),
          "on".to_string()
        )])
        .is_err()
    );
  }

  #[test]
  fn bools() {
    assert_eq!(parse_bool("Yes"), Some(true));
    assert_eq!(parse_bool("off"), Some(false));
    assert_eq!(parse_bool("sure"), None);
  }
}
