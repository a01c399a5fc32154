use serde::Serialize;
use tracing::trace;

use crate::datetime::{CalendarDate, day_of_year};
use crate::error::ConfigError;

/// Longest preview `schedule` will build, ten years of days.
pub const MAX_SCHEDULE_DAYS: usize = 3660;

/// One or more candidates jointly on duty for a rotation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CandidateGroup {
    members: Vec<String>,
}

impl CandidateGroup {
    pub fn new<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            members: members.into_iter().map(Into::into).collect(),
        }
    }

    pub fn single(member: impl Into<String>) -> Self {
        Self {
            members: vec![member.into()],
        }
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    /// The candidate a single-slot display shows.
    pub fn primary(&self) -> Option<&str> {
        self.members.first().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// True when the group is empty or any member identifier is blank.
    pub fn has_blank_member(&self) -> bool {
        self.members.is_empty() || self.members.iter().any(|m| m.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Duty {
    pub title: String,
    pub tooltip: Option<String>,
    pub repeat_period_days: u32,
    pub candidate_groups: Vec<CandidateGroup>,
}

impl Duty {
    /// Builds a duty that changes hands every day.
    pub fn new(
        title: impl Into<String>,
        candidate_groups: Vec<CandidateGroup>,
    ) -> Result<Self, ConfigError> {
        let duty = Self {
            title: title.into(),
            tooltip: None,
            repeat_period_days: 1,
            candidate_groups,
        };
        duty.validate()?;
        Ok(duty)
    }

    pub fn with_tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = Some(tooltip.into());
        self
    }

    pub fn with_period(mut self, days: u32) -> Result<Self, ConfigError> {
        self.repeat_period_days = days;
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.title.trim().is_empty() {
            return Err(ConfigError::MissingField {
                widget: "duty".to_string(),
                field: "title",
            });
        }
        if self.repeat_period_days == 0 {
            return Err(ConfigError::InvalidPeriod {
                duty: self.title.clone(),
                period: self.repeat_period_days,
            });
        }
        if self.candidate_groups.is_empty() {
            return Err(ConfigError::EmptyRotation {
                duty: self.title.clone(),
            });
        }
        if let Some(idx) = self.candidate_groups.iter().position(CandidateGroup::has_blank_member) {
            return Err(ConfigError::EmptyGroup {
                duty: self.title.clone(),
                position: idx + 1,
            });
        }
        Ok(())
    }
}

/// Picks the group on duty for `today`: `candidate_groups[day_of_year mod n]`.
///
/// The cycle is pinned to the calendar year and restarts every Jan 1, so the
/// same date always yields the same group no matter when the dashboard
/// started. When `n` does not divide the year length the rotation visibly
/// jumps on Jan 1. Do not replace this with an epoch-based counter.
///
/// With `repeat_period_days = p > 1` each group holds the duty for `p`
/// consecutive day numbers: `candidate_groups[(day_of_year / p) mod n]`.
#[tracing::instrument(skip(duty), fields(duty = %duty.title))]
pub fn select_today(duty: &Duty, today: CalendarDate) -> Result<&CandidateGroup, ConfigError> {
    duty.validate()?;

    let slots = duty.candidate_groups.len();
    let day = day_of_year(today) as usize;
    let turn = day / duty.repeat_period_days as usize;
    let index = turn % slots;

    trace!(slots, day, index, "selected rotation slot");
    Ok(&duty.candidate_groups[index])
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment<'a> {
    pub date: CalendarDate,
    pub group: &'a CandidateGroup,
}

/// Assignments for `days` consecutive days starting at `start`, at most
/// [`MAX_SCHEDULE_DAYS`]. Stops early at the end of chrono's date range.
#[tracing::instrument(skip(duty), fields(duty = %duty.title))]
pub fn schedule(
    duty: &Duty,
    start: CalendarDate,
    days: usize,
) -> Result<Vec<Assignment<'_>>, ConfigError> {
    if days > MAX_SCHEDULE_DAYS {
        return Err(ConfigError::InvalidSetting {
            key: "days".to_string(),
            reason: format!("{days} exceeds the {MAX_SCHEDULE_DAYS}-day preview limit"),
        });
    }

    std::iter::successors(Some(start), CalendarDate::succ)
        .take(days)
        .map(|date| select_today(duty, date).map(|group| Assignment { date, group }))
        .collect()
}
