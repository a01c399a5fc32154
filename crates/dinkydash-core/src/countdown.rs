use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::datetime::{CalendarDate, days_remaining, next_anniversary};
use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    /// Happens on its date only.
    #[default]
    Once,
    /// Happens every year on its month/day.
    Yearly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub title: String,
    pub date: CalendarDate,
    pub image: Option<String>,
    pub tooltip: Option<String>,
    pub recurrence: Recurrence,
    /// Year of the first occurrence, for anniversaries.
    pub since_year: Option<i32>,
}

impl Event {
    pub fn new(title: impl Into<String>, date: CalendarDate) -> Self {
        Self {
            title: title.into(),
            date,
            image: None,
            tooltip: None,
            recurrence: Recurrence::Once,
            since_year: None,
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn with_tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = Some(tooltip.into());
        self
    }

    pub fn yearly(mut self, since_year: Option<i32>) -> Self {
        self.recurrence = Recurrence::Yearly;
        self.since_year = since_year;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.title.trim().is_empty() {
            return Err(ConfigError::MissingField {
                widget: format!("event on {}", self.date),
                field: "title",
            });
        }
        if let Some(since_year) = self.since_year
            && since_year > self.date.year()
        {
            return Err(ConfigError::InvalidSinceYear {
                event: self.title.clone(),
                since_year,
                year: self.date.year(),
            });
        }
        Ok(())
    }

    /// The date this event counts down to, as seen from `today`.
    pub fn occurrence(&self, today: CalendarDate) -> CalendarDate {
        match self.recurrence {
            Recurrence::Once => self.date,
            Recurrence::Yearly => next_anniversary(self.date, today),
        }
    }
}

/// One row of the countdown list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown<'a> {
    pub event: &'a Event,
    pub occurs_on: CalendarDate,
    pub days_remaining: i64,
    /// Anniversary number of this occurrence ("turning 7").
    pub turning: Option<u32>,
}

impl<'a> Countdown<'a> {
    fn new(event: &'a Event, today: CalendarDate) -> Self {
        let occurs_on = event.occurrence(today);
        let turning = match (event.recurrence, event.since_year) {
            (Recurrence::Yearly, Some(since)) => occurs_on
                .year()
                .checked_sub(since)
                .and_then(|n| u32::try_from(n).ok())
                .filter(|n| *n > 0),
            _ => None,
        };

        Self {
            event,
            occurs_on,
            days_remaining: days_remaining(today, occurs_on),
            turning,
        }
    }

    pub fn label(&self) -> String {
        countdown_label(self.days_remaining)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountdownBoard {
    /// Keep events whose date has passed.
    pub include_past: bool,
    /// Show at most this many entries.
    pub limit: Option<usize>,
}

impl CountdownBoard {
    /// Today's and upcoming events, soonest first.
    ///
    /// Events sharing a date keep their input order. Past events are
    /// dropped unless `include_past` is set.
    #[tracing::instrument(skip(self, events), fields(events = events.len()))]
    pub fn visible_sorted<'a>(&self, events: &'a [Event], today: CalendarDate) -> Vec<Countdown<'a>> {
        let mut rows: Vec<Countdown<'a>> = events
            .iter()
            .map(|event| Countdown::new(event, today))
            .filter(|row| self.include_past || row.days_remaining >= 0)
            .collect();

        // sort_by_key is stable
        rows.sort_by_key(|row| row.occurs_on);

        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }

        debug!(visible = rows.len(), "built countdown list");
        rows
    }
}

/// Short text for a countdown value.
pub fn countdown_label(days: i64) -> String {
    match days {
        0 => "Today!".to_string(),
        1 => "Tomorrow".to_string(),
        -1 => "Yesterday".to_string(),
        d if d < 0 => format!("{} days ago", -d),
        d => format!("{d} days"),
    }
}
