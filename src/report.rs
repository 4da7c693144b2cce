//! Console rendering: two-column "Item | Value" grids for the statistics
//! and row dumps for the raw data viewer, both printed through Arrow's
//! pretty printer.

use std::fmt::Display;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, StringArray, UInt32Array, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;

use crate::data::model::{weekday_name, Column, TripRecord, TripTable};
use crate::stats::{Availability, DurationStats, StationStats, TimeStats, UserStats};

pub const NOT_AVAILABLE: &str = "Not available";
pub const NO_DATA: &str = "No data";

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A titled list of label/value rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub title: &'static str,
    pub rows: Vec<(String, String)>,
}

impl Report {
    pub fn new(title: &'static str) -> Self {
        Report {
            title,
            rows: Vec::new(),
        }
    }

    pub fn row(mut self, label: impl Into<String>, value: impl Display) -> Self {
        self.rows.push((label.into(), value.to_string()));
        self
    }

    fn row_or_no_data<T: Display>(self, label: &str, value: Option<T>) -> Self {
        match value {
            Some(v) => self.row(label, v),
            None => self.row(label, NO_DATA),
        }
    }

    /// Title line followed by the grid.
    pub fn render(&self) -> Result<String> {
        let (labels, values): (Vec<&str>, Vec<&str>) = self
            .rows
            .iter()
            .map(|(l, v)| (l.as_str(), v.as_str()))
            .unzip();
        let schema = Arc::new(Schema::new(vec![
            Field::new("Item", DataType::Utf8, false),
            Field::new("Value", DataType::Utf8, false),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(labels)),
                Arc::new(StringArray::from(values)),
            ],
        )
        .context("building report batch")?;
        let grid = pretty_format_batches(&[batch]).context("formatting report")?;
        Ok(format!("\n{}:\n{grid}", self.title))
    }
}

#[cfg(test)]
impl Report {
    /// Value for `label`, if present.
    pub fn get(&self, label: &str) -> Option<&str> {
        self.rows
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v.as_str())
    }
}

// ---------------------------------------------------------------------------
// Statistics → Report
// ---------------------------------------------------------------------------

pub fn time_report(stats: &TimeStats) -> Report {
    Report::new("📊 Time Statistics")
        .row_or_no_data("Most common month", stats.month.map(|m| m.name()))
        .row_or_no_data(
            "Most common day",
            stats.day_of_week.map(weekday_name),
        )
        .row_or_no_data("Most common hour", stats.hour)
}

pub fn station_report(stats: &StationStats) -> Report {
    Report::new("📍 Station Statistics")
        .row_or_no_data("Most common start station", stats.start_station.as_deref())
        .row_or_no_data("Most common end station", stats.end_station.as_deref())
        .row_or_no_data("Most common trip", stats.trip.as_deref())
}

pub fn duration_report(stats: &DurationStats) -> Report {
    Report::new("⏱ Trip Duration Statistics")
        .row("Total duration (seconds)", stats.total)
        .row_or_no_data(
            "Average duration (seconds)",
            stats.mean.map(|m| format!("{m:.2}")),
        )
}

pub fn user_report(stats: &UserStats) -> Report {
    let mut report = Report::new("🧑‍💼 User Statistics");
    for (user_type, count) in &stats.user_types {
        report = report.row(format!("Number of {user_type}"), count);
    }

    report = match &stats.genders {
        Availability::Available(genders) => genders.iter().fold(report, |r, (gender, count)| {
            r.row(format!("Number of {gender}"), count)
        }),
        Availability::NotAvailable => report.row("Gender", NOT_AVAILABLE),
    };

    match &stats.birth_years {
        Availability::Available(years) => report
            .row_or_no_data("Earliest birth year", years.as_ref().map(|y| y.earliest))
            .row_or_no_data("Most recent birth year", years.as_ref().map(|y| y.most_recent))
            .row_or_no_data("Most common birth year", years.as_ref().map(|y| y.most_common)),
        Availability::NotAvailable => report.row("Birth year", NOT_AVAILABLE),
    }
}

// ---------------------------------------------------------------------------
// Raw rows
// ---------------------------------------------------------------------------

/// Render `trips` with the table's source columns plus the derived ones.
/// An empty slice renders as an empty string.
pub fn render_rows(table: &TripTable, trips: &[TripRecord]) -> Result<String> {
    if trips.is_empty() {
        return Ok(String::new());
    }
    let batch = rows_batch(table, trips)?;
    let grid = pretty_format_batches(&[batch]).context("formatting rows")?;
    Ok(grid.to_string())
}

fn rows_batch(table: &TripTable, trips: &[TripRecord]) -> Result<RecordBatch> {
    let text = |f: fn(&TripRecord) -> Option<String>| -> ArrayRef {
        Arc::new(trips.iter().map(f).collect::<StringArray>())
    };

    let mut fields = vec![Field::new("", DataType::UInt64, false)];
    let mut columns: Vec<ArrayRef> = vec![Arc::new(UInt64Array::from_iter_values(
        trips.iter().map(|t| t.row as u64),
    ))];

    fields.push(Field::new(Column::StartTime.header(), DataType::Utf8, false));
    columns.push(text(|t| Some(t.start_time.format(DATETIME_FORMAT).to_string())));

    if table.has_column(Column::EndTime) {
        fields.push(Field::new(Column::EndTime.header(), DataType::Utf8, true));
        columns.push(text(|t| {
            t.end_time.map(|e| e.format(DATETIME_FORMAT).to_string())
        }));
    }

    fields.push(Field::new(Column::TripDuration.header(), DataType::Float64, false));
    columns.push(Arc::new(Float64Array::from_iter_values(
        trips.iter().map(|t| t.trip_duration),
    )));

    fields.push(Field::new(Column::StartStation.header(), DataType::Utf8, false));
    columns.push(text(|t| Some(t.start_station.clone())));
    fields.push(Field::new(Column::EndStation.header(), DataType::Utf8, false));
    columns.push(text(|t| Some(t.end_station.clone())));
    fields.push(Field::new(Column::UserType.header(), DataType::Utf8, true));
    columns.push(text(|t| t.user_type.clone()));

    if table.has_column(Column::Gender) {
        fields.push(Field::new(Column::Gender.header(), DataType::Utf8, true));
        columns.push(text(|t| t.gender.clone()));
    }
    if table.has_column(Column::BirthYear) {
        fields.push(Field::new(Column::BirthYear.header(), DataType::Float64, true));
        columns.push(Arc::new(
            trips.iter().map(|t| t.birth_year).collect::<Float64Array>(),
        ));
    }

    fields.push(Field::new("month", DataType::Utf8, false));
    columns.push(text(|t| Some(t.month().name().to_lowercase())));
    fields.push(Field::new("day_of_week", DataType::Utf8, false));
    columns.push(text(|t| Some(weekday_name(t.day_of_week()).to_lowercase())));
    fields.push(Field::new("hour", DataType::UInt32, false));
    columns.push(Arc::new(UInt32Array::from_iter_values(
        trips.iter().map(|t| t.hour()),
    )));

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).context("building row batch")
}
