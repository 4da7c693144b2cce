use std::fmt;
use std::str::FromStr;

use chrono::{Month, Weekday};
use thiserror::Error;

use super::model::{TripRecord, TripTable};

// ---------------------------------------------------------------------------
// Allowed inputs
// ---------------------------------------------------------------------------

pub const CITY_CHOICES: [&str; 3] = ["chicago", "new york", "washington"];

pub const MONTH_CHOICES: [&str; 7] = [
    "january", "february", "march", "april", "may", "june", "all",
];

pub const DAY_CHOICES: [&str; 8] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
    "all",
];

/// Return the allowed entry matching `input` (trimmed, case-insensitive).
pub fn validate<'a>(input: &str, allowed: &[&'a str]) -> Option<&'a str> {
    let needle = input.trim().to_lowercase();
    allowed.iter().copied().find(|choice| *choice == needle)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("invalid city name: '{0}'")]
    City(String),
    #[error("invalid month name: '{0}'")]
    Month(String),
    #[error("invalid day name: '{0}'")]
    Day(String),
}

// ---------------------------------------------------------------------------
// City
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum City {
    Chicago,
    NewYork,
    Washington,
}

impl City {
    pub const ALL: [City; 3] = [City::Chicago, City::NewYork, City::Washington];

    /// Lowercase name, as typed at the prompt.
    pub fn name(self) -> &'static str {
        match self {
            City::Chicago => "chicago",
            City::NewYork => "new york",
            City::Washington => "washington",
        }
    }
}

impl fmt::Display for City {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for City {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match validate(s, &CITY_CHOICES) {
            Some("chicago") => Ok(City::Chicago),
            Some("new york") => Ok(City::NewYork),
            Some("washington") => Ok(City::Washington),
            _ => Err(SelectionError::City(s.trim().to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Month / day filters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonthFilter {
    All,
    Only(Month),
}

impl MonthFilter {
    pub fn matches(self, month: Month) -> bool {
        match self {
            MonthFilter::All => true,
            MonthFilter::Only(m) => m == month,
        }
    }
}

impl FromStr for MonthFilter {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || SelectionError::Month(s.trim().to_string());
        match validate(s, &MONTH_CHOICES) {
            Some("all") => Ok(MonthFilter::All),
            Some(name) => name.parse::<Month>().map(MonthFilter::Only).map_err(|_| err()),
            None => Err(err()),
        }
    }
}

impl fmt::Display for MonthFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonthFilter::All => f.write_str("all"),
            MonthFilter::Only(m) => f.write_str(&m.name().to_lowercase()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayFilter {
    All,
    Only(Weekday),
}

impl DayFilter {
    pub fn matches(self, day: Weekday) -> bool {
        match self {
            DayFilter::All => true,
            DayFilter::Only(d) => d == day,
        }
    }
}

impl FromStr for DayFilter {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || SelectionError::Day(s.trim().to_string());
        match validate(s, &DAY_CHOICES) {
            Some("all") => Ok(DayFilter::All),
            Some(name) => name.parse::<Weekday>().map(DayFilter::Only).map_err(|_| err()),
            None => Err(err()),
        }
    }
}

impl fmt::Display for DayFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayFilter::All => f.write_str("all"),
            DayFilter::Only(d) => {
                f.write_str(&super::model::weekday_name(*d).to_lowercase())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// One session's validated filter choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub city: City,
    pub month: MonthFilter,
    pub day: DayFilter,
}

impl Selection {
    /// A trip passes when it matches both the month and the day filter.
    pub fn matches(&self, trip: &TripRecord) -> bool {
        self.month.matches(trip.month()) && self.day.matches(trip.day_of_week())
    }

    /// Keep the trips passing the filters, in their original order.
    pub fn apply(&self, table: TripTable) -> TripTable {
        let total = table.len();
        if self.month == MonthFilter::All && self.day == DayFilter::All {
            log::info!("No month/day filter; keeping all {total} trips");
            return table;
        }
        let kept: Vec<TripRecord> = table
            .trips
            .iter()
            .filter(|trip| self.matches(trip))
            .cloned()
            .collect();
        log::info!(
            "Filter month={} day={} kept {} of {total} trips",
            self.month,
            self.day,
            kept.len()
        );
        table.with_trips(kept)
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "city={} month={} day={}", self.city, self.month, self.day)
    }
}
