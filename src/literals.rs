//! Named constants shared across the service, plus the small value types
//! built around them.

use std::{fmt, str::FromStr, time::Duration};

use thiserror::Error;

pub const DEFAULT_HOME_VIEW: &str = "common:home";
/// Seconds between sweeps of stale uploads (10 minutes).
pub const DELETE_STALE_UPLOADS_INTERVAL: u64 = 60 * 10;
pub const POSTGRES_BACKEND: &str = "postgres";
pub const SQLITE_BACKEND: &str = "sqlite";
pub const PACKAGE_NAME: &str = "papertext";
pub const MESSAGE_SQLITE_WARNING: &str = "Your database backend is set to use SQLite. SQLite \
     should only be used for development and testing, not for production.";
pub const PACKAGE_INDEX_URL: &str = "https://crates.io/crates";

pub const TEXT_LIST_AS_ITEMS_PARAMETER: &str = "_list_mode";
pub const TEXT_LIST_AS_ITEMS: &str = "list_as_items";
pub const TEXT_CHOICE_ITEMS: &str = "items";
pub const TEXT_CHOICE_LIST: &str = "list";

pub const TIME_DELTA_UNIT_DAYS: &str = "days";
pub const TIME_DELTA_UNIT_HOURS: &str = "hours";
pub const TIME_DELTA_UNIT_MINUTES: &str = "minutes";

pub const TIME_DELTA_UNIT_CHOICES: [(&str, &str); 3] = [
    (TIME_DELTA_UNIT_DAYS, "Days"),
    (TIME_DELTA_UNIT_HOURS, "Hours"),
    (TIME_DELTA_UNIT_MINUTES, "Minutes"),
];

/// Highest page number a document version may have; longer documents are
/// rejected rather than stored.
pub const MAX_PAGE_NUMBER: i32 = 50_000;

/// Seconds an upload is kept before it expires (7 days).
pub const UPLOAD_EXPIRATION_INTERVAL: u64 = 60 * 60 * 24 * 7;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeDeltaError {
    #[error("unknown time delta unit: {0}")]
    UnknownUnit(String),
    #[error("invalid time delta amount: {0}")]
    InvalidAmount(String),
    #[error("time delta must look like \"<amount> <unit>\", got {0:?}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeDeltaUnit {
    Days,
    Hours,
    Minutes,
}

impl TimeDeltaUnit {
    pub const ALL: [TimeDeltaUnit; 3] = [Self::Days, Self::Hours, Self::Minutes];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Days => TIME_DELTA_UNIT_DAYS,
            Self::Hours => TIME_DELTA_UNIT_HOURS,
            Self::Minutes => TIME_DELTA_UNIT_MINUTES,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Days => "Days",
            Self::Hours => "Hours",
            Self::Minutes => "Minutes",
        }
    }

    pub fn seconds(&self) -> u64 {
        match self {
            Self::Days => 60 * 60 * 24,
            Self::Hours => 60 * 60,
            Self::Minutes => 60,
        }
    }

    /// `(value, label)` pairs in display order.
    pub fn choices() -> Vec<(&'static str, &'static str)> {
        Self::ALL
            .iter()
            .map(|unit| (unit.as_str(), unit.label()))
            .collect()
    }
}

impl fmt::Display for TimeDeltaUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeDeltaUnit {
    type Err = TimeDeltaError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            TIME_DELTA_UNIT_DAYS | "day" => Ok(Self::Days),
            TIME_DELTA_UNIT_HOURS | "hour" => Ok(Self::Hours),
            TIME_DELTA_UNIT_MINUTES | "minute" => Ok(Self::Minutes),
            _ => Err(TimeDeltaError::UnknownUnit(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeDelta {
    pub amount: u64,
    pub unit: TimeDeltaUnit,
}

impl TimeDelta {
    pub fn new(amount: u64, unit: TimeDeltaUnit) -> Self {
        Self { amount, unit }
    }

    pub fn zero() -> Self {
        Self::new(0, TimeDeltaUnit::Minutes)
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.amount.saturating_mul(self.unit.seconds()))
    }
}

impl fmt::Display for TimeDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.unit)
    }
}

impl FromStr for TimeDelta {
    type Err = TimeDeltaError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut parts = value.split_whitespace();
        let (Some(amount), Some(unit), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(TimeDeltaError::Malformed(value.to_string()));
        };
        let amount = amount
            .parse()
            .map_err(|_| TimeDeltaError::InvalidAmount(amount.to_string()))?;
        Ok(Self::new(amount, unit.parse()?))
    }
}

/// Rendering mode selected through [`TEXT_LIST_AS_ITEMS_PARAMETER`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListMode {
    Items,
    #[default]
    List,
}

impl ListMode {
    pub fn from_param(value: Option<&str>) -> Self {
        match value {
            Some(TEXT_CHOICE_ITEMS) | Some(TEXT_LIST_AS_ITEMS) => Self::Items,
            _ => Self::List,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Items => TEXT_CHOICE_ITEMS,
            Self::List => TEXT_CHOICE_LIST,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_constants_match_their_units() {
        assert_eq!(DELETE_STALE_UPLOADS_INTERVAL, 600);
        assert_eq!(UPLOAD_EXPIRATION_INTERVAL, 604_800);
        assert_eq!(
            UPLOAD_EXPIRATION_INTERVAL,
            7 * TimeDeltaUnit::Days.seconds()
        );
    }

    #[test]
    fn identifiers_are_stable() {
        assert_eq!(DEFAULT_HOME_VIEW, "common:home");
        assert_eq!(PACKAGE_NAME, "papertext");
        assert!(PACKAGE_INDEX_URL.starts_with("https://"));
        assert!(MESSAGE_SQLITE_WARNING.contains("not for production"));
        assert_eq!(TEXT_LIST_AS_ITEMS_PARAMETER, "_list_mode");
    }

    #[test]
    fn choices_keep_days_hours_minutes_order() {
        assert_eq!(
            TimeDeltaUnit::choices(),
            vec![("days", "Days"), ("hours", "Hours"), ("minutes", "Minutes")]
        );
        assert_eq!(TimeDeltaUnit::choices(), TIME_DELTA_UNIT_CHOICES.to_vec());
    }

    #[test]
    fn parses_time_delta() {
        let delta: TimeDelta = "5 minutes".parse().unwrap();
        assert_eq!(delta, TimeDelta::new(5, TimeDeltaUnit::Minutes));
        assert_eq!(delta.as_duration(), Duration::from_secs(300));

        let delta: TimeDelta = " 2  Hours ".parse().unwrap();
        assert_eq!(delta.as_duration(), Duration::from_secs(7200));
        assert_eq!(delta.to_string(), "2 hours");
    }

    #[test]
    fn rejects_bad_time_delta() {
        assert_eq!(
            "5 weeks".parse::<TimeDelta>(),
            Err(TimeDeltaError::UnknownUnit("weeks".into()))
        );
        assert_eq!(
            "x days".parse::<TimeDelta>(),
            Err(TimeDeltaError::InvalidAmount("x".into()))
        );
        assert!(matches!(
            "5".parse::<TimeDelta>(),
            Err(TimeDeltaError::Malformed(_))
        ));
    }

    #[test]
    fn list_mode_defaults_to_list() {
        assert_eq!(ListMode::from_param(None), ListMode::List);
        assert_eq!(ListMode::from_param(Some("bogus")), ListMode::List);
        assert_eq!(ListMode::from_param(Some(TEXT_LIST_AS_ITEMS)), ListMode::Items);
        assert_eq!(ListMode::from_param(Some("items")).as_str(), "items");
    }
}
