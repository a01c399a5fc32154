use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{
  DateTime,
  Datelike,
  Local,
  NaiveDate,
  Utc
};
use chrono_tz::Tz;
use regex::Regex;
use serde::{
  Deserialize,
  Serialize
};

use crate::error::ConfigError;

pub const TIMEZONE_ENV_VAR: &str =
  "DINKYDASH_TIMEZONE";

static US_DATE: LazyLock<Regex> =
  LazyLock::new(|| {
    Regex::new(
      r"^(?P<month>\d{1,2})/(?P<day>\d{1,2})/(?P<year>\d{4})$"
    )
    .expect("US date pattern compiles")
  });

static ISO_DATE: LazyLock<Regex> =
  LazyLock::new(|| {
    Regex::new(
      r"^(?P<year>\d{4})-(?P<month>\d{2})-(?P<day>\d{2})$"
    )
    .expect("ISO date pattern compiles")
  });

/// A year/month/day value without any
/// time-of-day component. Ordering is
/// calendar ordering.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize
)]
#[serde(
  try_from = "String",
  into = "String"
)]
pub struct CalendarDate(NaiveDate);

impl CalendarDate {
  pub fn from_ymd(
    year: i32,
    month: u32,
    day: u32
  ) -> Result<Self, ConfigError> {
    if !(1..=12).contains(&month) {
      return Err(
        ConfigError::invalid_date(
          &format!(
            "{year:04}-{month:02}-\
             {day:02}"
          ),
          format!(
            "month {month} is out of \
             range"
          )
        )
      );
    }
    NaiveDate::from_ymd_opt(
      year, month, day
    )
    .map(Self)
    .ok_or_else(|| {
      ConfigError::invalid_date(
        &format!(
          "{year:04}-{month:02}-\
           {day:02}"
        ),
        format!(
          "day {day} does not exist \
           in that month"
        )
      )
    })
  }

  /// Parses `MM/DD/YYYY` or
  /// `YYYY-MM-DD`. Components are never
  /// wrapped into a neighbouring month or
  /// year.
  #[tracing::instrument(level = "trace")]
  pub fn parse(
    input: &str
  ) -> Result<Self, ConfigError> {
    let token = input.trim();
    if token.is_empty() {
      return Err(
        ConfigError::invalid_date(
          input,
          "date is empty"
        )
      );
    }

    let caps = US_DATE
      .captures(token)
      .or_else(|| ISO_DATE.captures(token))
      .ok_or_else(|| {
        ConfigError::invalid_date(
          input,
          "expected MM/DD/YYYY or \
           YYYY-MM-DD"
        )
      })?;

    let field = |name: &str| {
      caps
        .name(name)
        .map(|m| m.as_str())
        .unwrap_or_default()
    };
    let year: i32 =
      field("year").parse().map_err(
        |_| {
          ConfigError::invalid_date(
            input,
            "invalid year"
          )
        }
      )?;
    let month: u32 =
      field("month").parse().map_err(
        |_| {
          ConfigError::invalid_date(
            input,
            "invalid month"
          )
        }
      )?;
    let day: u32 =
      field("day").parse().map_err(
        |_| {
          ConfigError::invalid_date(
            input,
            "invalid day"
          )
        }
      )?;

    Self::from_ymd(year, month, day)
      .map_err(|err| match err {
        | ConfigError::InvalidDate {
          reason,
          ..
        } => {
          ConfigError::invalid_date(
            input, reason
          )
        }
        | other => other
      })
  }

  #[must_use]
  pub fn year(&self) -> i32 {
    self.0.year()
  }

  #[must_use]
  pub fn month(&self) -> u32 {
    self.0.month()
  }

  #[must_use]
  pub fn day(&self) -> u32 {
    self.0.day()
  }

  /// The following calendar day, or
  /// `None` past chrono's range.
  #[must_use]
  pub fn succ(&self) -> Option<Self> {
    self.0.succ_opt().map(Self)
  }

  #[must_use]
  pub fn format_long(&self) -> String {
    self
      .0
      .format("%A, %B %d")
      .to_string()
  }
}

impl From<NaiveDate> for CalendarDate {
  fn from(date: NaiveDate) -> Self {
    Self(date)
  }
}

impl FromStr for CalendarDate {
  type Err = ConfigError;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    Self::parse(s)
  }
}

impl TryFrom<String> for CalendarDate {
  type Error = ConfigError;

  fn try_from(
    value: String
  ) -> Result<Self, Self::Error> {
    Self::parse(&value)
  }
}

impl From<CalendarDate> for String {
  fn from(date: CalendarDate) -> Self {
    date.to_string()
  }
}

impl fmt::Display for CalendarDate {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    write!(
      f,
      "{}",
      self.0.format("%Y-%m-%d")
    )
  }
}

/// Whole calendar days from `today` to
/// `target`: positive in the future, zero
/// today, negative in the past.
///
/// Both values are already local
/// midnights, so the ceiling of the
/// elapsed days is the exact calendar-day
/// difference. DST shifts between the two
/// dates do not change the count.
#[must_use]
pub fn days_remaining(
  today: CalendarDate,
  target: CalendarDate
) -> i64 {
  target
    .0
    .signed_duration_since(today.0)
    .num_days()
}

/// 1-based ordinal of `today` within its
/// year, numbered on UTC calendar
/// boundaries.
///
/// `today` is read from the host clock in
/// local time, but numbering is done on the
/// date alone (as a UTC day), so a local
/// midnight or DST transition can never
/// skip or repeat a rotation slot. Keep the
/// two clocks separate: switching this to
/// local-instant arithmetic changes who is
/// on duty around Jan 1.
#[must_use]
pub fn day_of_year(
  today: CalendarDate
) -> u32 {
  today.0.ordinal()
}

/// The next occurrence of `date`'s
/// month/day on or after `today`. Feb 29
/// falls on Feb 28 in common years.
#[must_use]
pub fn next_anniversary(
  date: CalendarDate,
  today: CalendarDate
) -> CalendarDate {
  let this_year = anniversary_in(
    date,
    today.year()
  );
  if this_year >= today {
    this_year
  } else {
    anniversary_in(
      date,
      today.year().saturating_add(1)
    )
  }
}

fn anniversary_in(
  date: CalendarDate,
  year: i32
) -> CalendarDate {
  NaiveDate::from_ymd_opt(
    year,
    date.month(),
    date.day()
  )
  .or_else(|| {
    NaiveDate::from_ymd_opt(
      year,
      date.month(),
      date.day().saturating_sub(1)
    )
  })
  .map(CalendarDate)
  .unwrap_or(date)
}

/// Where "today" is read from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostClock {
  Local,
  Zone(Tz)
}

impl HostClock {
  /// Resolves the clock from an explicit
  /// timezone id, then
  /// `DINKYDASH_TIMEZONE`, then the host
  /// local zone.
  #[tracing::instrument]
  pub fn resolve(
    explicit: Option<&str>
  ) -> Result<Self, ConfigError> {
    if let Some(raw) = explicit {
      return parse_timezone(
        raw, "config"
      )
      .map(Self::Zone);
    }

    if let Ok(raw) =
      std::env::var(TIMEZONE_ENV_VAR)
      && !raw.trim().is_empty()
    {
      return parse_timezone(
        &raw,
        TIMEZONE_ENV_VAR
      )
      .map(Self::Zone);
    }

    tracing::debug!(
      "no timezone configured; using \
       host local time"
    );
    Ok(Self::Local)
  }

  /// Samples the host clock once.
  #[must_use]
  pub fn today(&self) -> CalendarDate {
    self.today_at(Utc::now())
  }

  #[must_use]
  pub fn today_at(
    &self,
    now: DateTime<Utc>
  ) -> CalendarDate {
    let date = match self {
      | Self::Local => {
        now
          .with_timezone(&Local)
          .date_naive()
      }
      | Self::Zone(tz) => {
        now.with_timezone(tz).date_naive()
      }
    };
    CalendarDate(date)
  }

  #[must_use]
  pub fn label(&self) -> String {
    match self {
      | Self::Local => {
        "local".to_string()
      }
      | Self::Zone(tz) => {
        tz.name().to_string()
      }
    }
  }
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Result<Tz, ConfigError> {
  let trimmed = raw.trim();
  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured dashboard timezone"
      );
      Ok(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      Err(ConfigError::UnknownTimezone(
        trimmed.to_string()
      ))
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::{
    TimeZone,
    Utc
  };

  use super::{
    CalendarDate,
    HostClock,
    day_of_year,
    days_remaining,
    next_anniversary
  };
  use crate::error::ConfigError;

  fn date(s: &str) -> CalendarDate {
    CalendarDate::parse(s)
      .expect("valid date")
  }

  #[test]
  fn day_of_year_is_one_based() {
    assert_eq!(
      day_of_year(date("2023-01-01")),
      1
    );
    assert_eq!(
      day_of_year(date("2023-12-31")),
      365
    );
    assert_eq!(
      day_of_year(date("2024-12-31")),
      366
    );
  }

  #[test]
  fn days_remaining_signs() {
    let target = date("2023-03-09");
    assert_eq!(
      days_remaining(
        date("2023-03-01"),
        target
      ),
      8
    );
    assert_eq!(
      days_remaining(target, target),
      0
    );
    assert_eq!(
      days_remaining(
        date("2023-03-10"),
        target
      ),
      -1
    );
  }

  #[test]
  fn days_remaining_across_dst_change() {
    // Europe and the US both switch
    // clocks in March.
    assert_eq!(
      days_remaining(
        date("2023-03-25"),
        date("2023-03-27")
      ),
      2
    );
  }

  #[test]
  fn parses_both_formats() {
    assert_eq!(
      date("03/09/2023"),
      date("2023-03-09")
    );
    assert_eq!(
      date(" 1/2/2024 ").to_string(),
      "2024-01-02"
    );
  }

  #[test]
  fn rejects_out_of_range_components() {
    for bad in [
      "13/01/2023",
      "00/10/2023",
      "02/29/2023",
      "04/31/2023",
      "2023-13-01",
      "",
      "   ",
      "March 9"
    ] {
      let err = CalendarDate::parse(bad)
        .expect_err(bad);
      assert!(
        matches!(
          err,
          ConfigError::InvalidDate {
            ..
          }
        ),
        "{bad}: {err}"
      );
    }
  }

  #[test]
  fn leap_day_is_accepted_in_leap_year() {
    assert_eq!(
      day_of_year(date("02/29/2024")),
      60
    );
  }

  #[test]
  fn anniversary_rolls_to_next_year() {
    let today = date("2023-06-01");
    assert_eq!(
      next_anniversary(
        date("2016-03-09"),
        today
      ),
      date("2024-03-09")
    );
    assert_eq!(
      next_anniversary(
        date("2016-06-01"),
        today
      ),
      today
    );
    assert_eq!(
      next_anniversary(
        date("2020-02-29"),
        date("2023-01-10")
      ),
      date("2023-02-28")
    );
  }

  #[test]
  fn zone_clock_reads_date_in_zone() {
    let now = Utc
      .with_ymd_and_hms(
        2023, 12, 31, 23, 30, 0
      )
      .single()
      .expect("valid now");
    let clock = HostClock::resolve(Some(
      "Europe/Copenhagen"
    ))
    .expect("known zone");
    assert_eq!(
      clock.today_at(now),
      date("2024-01-01")
    );
    assert_eq!(
      HostClock::resolve(Some("UTC"))
        .expect("utc")
        .today_at(now),
      date("2023-12-31")
    );
  }

  #[test]
  fn unknown_zone_is_a_config_error() {
    assert_eq!(
      HostClock::resolve(Some(
        "Mars/Olympus"
      )),
      Err(
        ConfigError::UnknownTimezone(
          "Mars/Olympus".to_string()
        )
      )
    );
  }

  #[test]
  fn serde_uses_iso_strings() {
    let parsed: CalendarDate =
      serde_json::from_str(
        "\"03/09/2023\""
      )
      .expect("deserialize");
    assert_eq!(
      serde_json::to_string(&parsed)
        .expect("serialize"),
      "\"2023-03-09\""
    );
    assert!(
      serde_json::from_str::<
        CalendarDate
      >("\"13/09/2023\"")
      .is_err()
    );
  }
}
