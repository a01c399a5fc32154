//! Configuration errors raised while loading or evaluating dashboard widgets.

/// Invalid dashboard data. Raised at load time, or by a core function that is
/// handed a value that never went through the loader.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A duty has no candidate groups to rotate through.
    #[error("duty `{duty}` has no candidate groups")]
    EmptyRotation {
        /// Title of the offending duty.
        duty: String,
    },

    /// A candidate group is empty or has a blank identifier.
    #[error("duty `{duty}` has an empty candidate group at position {position}")]
    EmptyGroup {
        /// Title of the offending duty.
        duty: String,
        /// 1-based position of the group in the rotation.
        position: usize,
    },

    /// A duty's repeat period is zero.
    #[error("duty `{duty}` has repeat period {period}; it must be at least 1 day")]
    InvalidPeriod {
        /// Title of the offending duty.
        duty: String,
        /// The rejected period, in days.
        period: u32,
    },

    /// A date string that is not a real calendar date.
    #[error("invalid date `{input}`: {reason}")]
    InvalidDate {
        /// The text as written.
        input: String,
        /// Which component is wrong.
        reason: String,
    },

    /// A required field is missing or blank.
    #[error("{widget} is missing required field `{field}`")]
    MissingField {
        /// Widget label, e.g. `event #2`.
        widget: String,
        /// Name of the missing field.
        field: &'static str,
    },

    /// A timezone id that chrono-tz does not know.
    #[error("unknown timezone `{0}`")]
    UnknownTimezone(
        /// The zone id as given.
        String,
    ),

    /// A board setting override that cannot be applied.
    #[error("invalid setting `{key}`: {reason}")]
    InvalidSetting {
        /// Setting key, e.g. `board.limit`.
        key: String,
        /// Why the value was refused.
        reason: String,
    },

    /// A yearly event whose `since_year` lies after its own date.
    #[error("event `{event}` has since_year {since_year}, after its date in {year}")]
    InvalidSinceYear {
        /// Title of the offending event.
        event: String,
        /// The configured first year.
        since_year: i32,
        /// Year of the event's date.
        year: i32,
    },
}

impl ConfigError {
    pub(crate) fn invalid_date(input: &str, reason: impl Into<String>) -> Self {
        Self::InvalidDate {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ConfigError;

    #[test]
    fn messages_name_the_widget() {
        let err = ConfigError::EmptyGroup {
            duty: "🗑".to_string(),
            position: 2,
        };
        assert_eq!(
            err.to_string(),
            "duty `🗑` has an empty candidate group at position 2"
        );

        let err = ConfigError::invalid_date("13/01/2023", "month out of range");
        assert!(err.to_string().contains("13/01/2023"));
    }
}
