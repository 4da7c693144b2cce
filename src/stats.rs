//! Aggregates behind the four reports.
//!
//! Every computation works on the filtered [`TripTable`] and treats blank
//! cells as missing.  Ties are broken by first appearance, so results are
//! stable across runs on the same input.

use std::collections::HashMap;
use std::hash::Hash;

use chrono::{Month, Weekday};

use crate::data::model::{Column, TripTable};

/// Most frequent value; on a tie, the one seen first.  `None` when empty.
pub fn mode<T, I>(values: I) -> Option<T>
where
    T: Eq + Hash + Clone,
    I: IntoIterator<Item = T>,
{
    value_counts(values).into_iter().next().map(|(value, _)| value)
}

/// Distinct values with their counts, most frequent first, ties by first
/// appearance.
pub fn value_counts<T, I>(values: I) -> Vec<(T, usize)>
where
    T: Eq + Hash + Clone,
    I: IntoIterator<Item = T>,
{
    // value -> (first index, count)
    let mut seen: HashMap<T, (usize, usize)> = HashMap::new();
    for (i, value) in values.into_iter().enumerate() {
        seen.entry(value).or_insert((i, 0)).1 += 1;
    }
    let mut counts: Vec<(T, usize, usize)> = seen
        .into_iter()
        .map(|(value, (first, count))| (value, first, count))
        .collect();
    counts.sort_by(|a, b| b.2.cmp(&a.2).then(a.1.cmp(&b.1)));
    counts
        .into_iter()
        .map(|(value, _, count)| (value, count))
        .collect()
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeStats {
    pub month: Option<Month>,
    pub day_of_week: Option<Weekday>,
    pub hour: Option<u32>,
}

pub fn time_stats(table: &TripTable) -> TimeStats {
    TimeStats {
        month: mode(table.trips.iter().map(|t| t.month())),
        day_of_week: mode(table.trips.iter().map(|t| t.day_of_week())),
        hour: mode(table.trips.iter().map(|t| t.hour())),
    }
}

// ---------------------------------------------------------------------------
// Stations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationStats {
    pub start_station: Option<String>,
    pub end_station: Option<String>,
    /// `"<start> → <end>"`
    pub trip: Option<String>,
}

pub fn station_stats(table: &TripTable) -> StationStats {
    StationStats {
        start_station: mode(table.trips.iter().map(|t| t.start_station.as_str()))
            .map(str::to_string),
        end_station: mode(table.trips.iter().map(|t| t.end_station.as_str()))
            .map(str::to_string),
        trip: mode(table.trips.iter().map(|t| t.route())),
    }
}

// ---------------------------------------------------------------------------
// Trip duration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct DurationStats {
    /// Seconds, rounded to two decimals.
    pub total: f64,
    /// Seconds, rounded to two decimals.  `None` for an empty table.
    pub mean: Option<f64>,
}

pub fn duration_stats(table: &TripTable) -> DurationStats {
    let total: f64 = table.trips.iter().map(|t| t.trip_duration).sum();
    let count = table.len();
    let mean = (count > 0).then(|| round2(total / count as f64));
    DurationStats {
        total: round2(total),
        mean,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BirthYearStats {
    pub earliest: i32,
    pub most_recent: i32,
    pub most_common: i32,
}

/// Per-attribute result for columns a source may not expose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability<T> {
    /// The source file has no such column.
    NotAvailable,
    Available(T),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserStats {
    pub user_types: Vec<(String, usize)>,
    pub genders: Availability<Vec<(String, usize)>>,
    /// `Available(None)` when the column exists but every filtered row is blank.
    pub birth_years: Availability<Option<BirthYearStats>>,
}

pub fn user_stats(table: &TripTable) -> UserStats {
    let user_types = owned_counts(table.trips.iter().filter_map(|t| t.user_type.as_deref()));

    let genders = if table.has_column(Column::Gender) {
        Availability::Available(owned_counts(
            table.trips.iter().filter_map(|t| t.gender.as_deref()),
        ))
    } else {
        Availability::NotAvailable
    };

    let birth_years = if table.has_column(Column::BirthYear) {
        let years: Vec<i32> = table
            .trips
            .iter()
            .filter_map(|t| t.birth_year)
            .map(|y| y.trunc() as i32)
            .collect();
        Availability::Available(birth_year_stats(&years))
    } else {
        Availability::NotAvailable
    };

    UserStats {
        user_types,
        genders,
        birth_years,
    }
}

fn owned_counts<'a>(values: impl Iterator<Item = &'a str>) -> Vec<(String, usize)> {
    value_counts(values)
        .into_iter()
        .map(|(value, count)| (value.to_string(), count))
        .collect()
}

fn birth_year_stats(years: &[i32]) -> Option<BirthYearStats> {
    Some(BirthYearStats {
        earliest: *years.iter().min()?,
        most_recent: *years.iter().max()?,
        most_common: mode(years.iter().copied())?,
    })
}
