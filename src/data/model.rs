use std::collections::BTreeSet;
use std::fmt;

use chrono::{Datelike, Month, NaiveDateTime, Timelike, Weekday};

// ---------------------------------------------------------------------------
// Column – the schema of a trip table
// ---------------------------------------------------------------------------

/// Columns a trip source may expose.  The first five are required by the
/// loader; the rest depend on the city's file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Column {
    StartTime,
    TripDuration,
    StartStation,
    EndStation,
    UserType,
    EndTime,
    Gender,
    BirthYear,
}

impl Column {
    pub const REQUIRED: [Column; 5] = [
        Column::StartTime,
        Column::TripDuration,
        Column::StartStation,
        Column::EndStation,
        Column::UserType,
    ];

    pub const OPTIONAL: [Column; 3] = [Column::EndTime, Column::Gender, Column::BirthYear];

    /// Header name as it appears in the source files.
    pub fn header(self) -> &'static str {
        match self {
            Column::StartTime => "Start Time",
            Column::TripDuration => "Trip Duration",
            Column::StartStation => "Start Station",
            Column::EndStation => "End Station",
            Column::UserType => "User Type",
            Column::EndTime => "End Time",
            Column::Gender => "Gender",
            Column::BirthYear => "Birth Year",
        }
    }

    pub fn from_header(name: &str) -> Option<Column> {
        Column::REQUIRED
            .into_iter()
            .chain(Column::OPTIONAL)
            .find(|c| c.header() == name)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

// ---------------------------------------------------------------------------
// TimeParts – derived columns
// ---------------------------------------------------------------------------

/// Month, weekday and hour derived from a trip's start time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeParts {
    pub month: Month,
    pub day_of_week: Weekday,
    /// 0–23
    pub hour: u32,
}

impl TimeParts {
    pub fn derive(start_time: &NaiveDateTime) -> Self {
        // `month()` is always 1..=12, so the conversion cannot fail.
        let month = Month::try_from(start_time.month() as u8).unwrap_or(Month::January);
        TimeParts {
            month,
            day_of_week: start_time.weekday(),
            hour: start_time.hour(),
        }
    }
}

/// Full English weekday name, e.g. `"Monday"`.
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

// ---------------------------------------------------------------------------
// TripRecord – one row of the table
// ---------------------------------------------------------------------------

/// A single bikeshare trip.
///
/// Categorical fields are `Option` because the source files leave cells
/// blank; blanks are treated as missing values everywhere downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct TripRecord {
    /// Position of the row in the source file (0-based).
    pub row: usize,
    pub start_time: NaiveDateTime,
    pub end_time: Option<NaiveDateTime>,
    /// Seconds.
    pub trip_duration: f64,
    pub start_station: String,
    pub end_station: String,
    pub user_type: Option<String>,
    pub gender: Option<String>,
    pub birth_year: Option<f64>,
    time_parts: TimeParts,
}

/// Loader-facing field bundle; derived columns are computed from it once.
#[derive(Debug, Clone, Default)]
pub struct TripFields {
    pub end_time: Option<NaiveDateTime>,
    pub trip_duration: f64,
    pub start_station: String,
    pub end_station: String,
    pub user_type: Option<String>,
    pub gender: Option<String>,
    pub birth_year: Option<f64>,
}

impl TripRecord {
    pub fn new(row: usize, start_time: NaiveDateTime, fields: TripFields) -> Self {
        TripRecord {
            row,
            time_parts: TimeParts::derive(&start_time),
            start_time,
            end_time: fields.end_time,
            trip_duration: fields.trip_duration,
            start_station: fields.start_station,
            end_station: fields.end_station,
            user_type: fields.user_type,
            gender: fields.gender,
            birth_year: fields.birth_year,
        }
    }

    #[cfg(test)]
    pub fn time_parts(&self) -> TimeParts {
        self.time_parts
    }

    pub fn month(&self) -> Month {
        self.time_parts.month
    }

    pub fn day_of_week(&self) -> Weekday {
        self.time_parts.day_of_week
    }

    pub fn hour(&self) -> u32 {
        self.time_parts.hour
    }

    /// `"<start> → <end>"`
    pub fn route(&self) -> String {
        format!("{} → {}", self.start_station, self.end_station)
    }
}

// ---------------------------------------------------------------------------
// TripTable – the loaded (and possibly filtered) dataset
// ---------------------------------------------------------------------------

/// Trips plus the set of columns the source file exposed.
#[derive(Debug, Clone)]
pub struct TripTable {
    pub trips: Vec<TripRecord>,
    columns: BTreeSet<Column>,
}

impl TripTable {
    pub fn new(trips: Vec<TripRecord>, columns: BTreeSet<Column>) -> Self {
        TripTable { trips, columns }
    }

    /// Whether the source exposes `column`.  Filtering never changes this.
    pub fn has_column(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }

    pub fn columns(&self) -> impl Iterator<Item = Column> + '_ {
        self.columns.iter().copied()
    }

    /// Same schema, different rows.
    pub fn with_trips(&self, trips: Vec<TripRecord>) -> Self {
        TripTable {
            trips,
            columns: self.columns.clone(),
        }
    }

    /// Rows `[start, start + len)`, clamped to the table end.
    pub fn slice(&self, start: usize, len: usize) -> &[TripRecord] {
        let start = start.min(self.trips.len());
        let end = start.saturating_add(len).min(self.trips.len());
        &self.trips[start..end]
    }

    pub fn len(&self) -> usize {
        self.trips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trips.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::NaiveDate;

    pub(crate) fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 15, 0)
            .unwrap()
    }

    pub(crate) fn trip(row: usize, start: NaiveDateTime, from: &str, to: &str) -> TripRecord {
        TripRecord::new(
            row,
            start,
            TripFields {
                trip_duration: 600.0,
                start_station: from.to_string(),
                end_station: to.to_string(),
                user_type: Some("Subscriber".to_string()),
                ..Default::default()
            },
        )
    }

    #[test]
    fn derives_time_parts_from_start_time() {
        // 2017-06-05 was a Monday.
        let parts = TimeParts::derive(&at(2017, 6, 5, 17));
        assert_eq!(parts.month, Month::June);
        assert_eq!(parts.day_of_week, Weekday::Mon);
        assert_eq!(parts.hour, 17);
    }

    #[test]
    fn record_keeps_derived_parts_consistent() {
        let rec = trip(0, at(2017, 1, 1, 0), "A", "B");
        assert_eq!(rec.time_parts(), TimeParts::derive(&rec.start_time));
        assert_eq!(rec.day_of_week(), Weekday::Sun);
        assert_eq!(rec.route(), "A → B");
    }

    #[test]
    fn header_lookup_covers_every_column() {
        for col in Column::REQUIRED.into_iter().chain(Column::OPTIONAL) {
            assert_eq!(Column::from_header(col.header()), Some(col));
        }
        assert_eq!(Column::from_header(""), None);
    }

    #[test]
    fn slice_clamps_past_the_end() {
        let trips = (0..7).map(|i| trip(i, at(2017, 3, 1, 8), "A", "B")).collect();
        let table = TripTable::new(trips, Column::REQUIRED.into_iter().collect());
        assert_eq!(table.slice(5, 5).len(), 2);
        assert!(table.slice(10, 5).is_empty());
        assert_eq!(table.slice(0, 5)[4].row, 4);
    }
}
