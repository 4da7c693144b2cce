use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result, bail};
use arrow::array::{Array, ArrayRef, AsArray, StringArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDateTime;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use super::filter::Selection;
use super::model::{Column, TripFields, TripRecord, TripTable};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unsupported file extension: .{0}")]
    UnsupportedExtension(String),
    #[error("missing required column '{0}'")]
    MissingColumn(Column),
    #[error("row {row}: missing value in required column '{column}'")]
    MissingValue { row: usize, column: Column },
    #[error("row {row}: cannot parse '{value}' as a date-time")]
    DateTime { row: usize, value: String },
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load the trips at `path` and keep the rows passing `selection`.
///
/// Derived month/day/hour columns are computed while loading, so they exist
/// before any filter looks at them.
pub fn load_data(path: &Path, selection: &Selection) -> Result<TripTable> {
    let table = load_file(path)
        .with_context(|| format!("loading {} data from {}", selection.city, path.display()))?;
    Ok(selection.apply(table))
}

/// Load a trip file, dispatching by extension.
///
/// Supported formats:
/// * `.csv`     – header row with the canonical column names (default)
/// * `.parquet` – same column names; types are cast as needed
/// * `.json`    – `[{ "Start Time": "...", "Trip Duration": 600, ... }, ...]`
pub fn load_file(path: &Path) -> Result<TripTable> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let table = match ext.as_str() {
        "csv" => load_csv(path)?,
        "parquet" | "pq" => load_parquet(path)?,
        "json" => load_json(path)?,
        other => return Err(LoadError::UnsupportedExtension(other.to_string()).into()),
    };

    log::info!(
        "Loaded {} trips from {} (columns: {})",
        table.len(),
        path.display(),
        table
            .columns()
            .map(Column::header)
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(table)
}

/// Parse a start/end time cell.  Accepts `YYYY-MM-DD HH:MM:SS` and the
/// `T`-separated ISO form, with or without fractional seconds.
pub fn parse_datetime(value: &str, row: usize) -> Result<NaiveDateTime, LoadError> {
    const FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
    let trimmed = value.trim();
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .ok_or_else(|| LoadError::DateTime {
            row,
            value: value.to_string(),
        })
}

fn check_schema(columns: &BTreeSet<Column>) -> Result<(), LoadError> {
    match Column::REQUIRED.into_iter().find(|c| !columns.contains(c)) {
        Some(missing) => Err(LoadError::MissingColumn(missing)),
        None => Ok(()),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Row shape shared by the CSV and JSON loaders
// ---------------------------------------------------------------------------

/// One source row before derivation.  Unknown columns (such as the unnamed
/// leading index column of the canonical files) are ignored.
#[derive(Debug, Deserialize)]
struct RawTrip {
    #[serde(rename = "Start Time")]
    start_time: String,
    #[serde(rename = "End Time", default)]
    end_time: Option<String>,
    #[serde(rename = "Trip Duration")]
    trip_duration: f64,
    #[serde(rename = "Start Station", default)]
    start_station: Option<String>,
    #[serde(rename = "End Station", default)]
    end_station: Option<String>,
    #[serde(rename = "User Type", default)]
    user_type: Option<String>,
    #[serde(rename = "Gender", default)]
    gender: Option<String>,
    #[serde(rename = "Birth Year", default)]
    birth_year: Option<f64>,
}

impl RawTrip {
    fn into_record(self, row: usize) -> Result<TripRecord, LoadError> {
        let start_time = parse_datetime(&self.start_time, row)?;
        let end_time = non_empty(self.end_time)
            .map(|s| parse_datetime(&s, row))
            .transpose()?;
        let start_station = non_empty(self.start_station).ok_or(LoadError::MissingValue {
            row,
            column: Column::StartStation,
        })?;
        let end_station = non_empty(self.end_station).ok_or(LoadError::MissingValue {
            row,
            column: Column::EndStation,
        })?;

        Ok(TripRecord::new(
            row,
            start_time,
            TripFields {
                end_time,
                trip_duration: self.trip_duration,
                start_station,
                end_station,
                user_type: non_empty(self.user_type),
                gender: non_empty(self.gender),
                birth_year: self.birth_year.filter(|y| y.is_finite()),
            },
        ))
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

fn load_csv(path: &Path) -> Result<TripTable> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    // Row deserialization matches on these names, so trim them once here.
    let headers: csv::StringRecord = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(str::trim)
        .collect();
    reader.set_headers(headers.clone());
    let columns: BTreeSet<Column> = headers.iter().filter_map(Column::from_header).collect();
    check_schema(&columns)?;

    let mut trips = Vec::new();
    for (row, result) in reader.deserialize::<RawTrip>().enumerate() {
        let raw = result.with_context(|| format!("CSV row {row}"))?;
        trips.push(raw.into_record(row)?);
    }

    Ok(TripTable::new(trips, columns))
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Records-oriented JSON, the default `to_json(orient='records')` layout.
/// A column counts as present when any record carries its key.
fn load_json(path: &Path) -> Result<TripTable> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let records: Vec<Map<String, JsonValue>> =
        serde_json::from_str(&text).context("Expected a JSON array of objects")?;

    let columns: BTreeSet<Column> = records
        .iter()
        .flat_map(|rec| rec.keys())
        .filter_map(|k| Column::from_header(k))
        .collect();
    check_schema(&columns)?;

    let mut trips = Vec::with_capacity(records.len());
    for (row, rec) in records.into_iter().enumerate() {
        let raw: RawTrip = serde_json::from_value(JsonValue::Object(rec))
            .with_context(|| format!("JSON row {row}"))?;
        trips.push(raw.into_record(row)?);
    }

    Ok(TripTable::new(trips, columns))
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Parquet with the canonical column names.  Text columns may be any type
/// castable to Utf8 (timestamps included); numeric columns any type
/// castable to Float64.
fn load_parquet(path: &Path) -> Result<TripTable> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let columns: BTreeSet<Column> = builder
        .schema()
        .fields()
        .iter()
        .filter_map(|f| Column::from_header(f.name()))
        .collect();
    check_schema(&columns)?;
    let reader = builder.build().context("building parquet reader")?;

    let mut trips = Vec::new();
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        read_batch(&batch, trips.len(), &mut trips)?;
    }

    Ok(TripTable::new(trips, columns))
}

fn read_batch(batch: &RecordBatch, first_row: usize, out: &mut Vec<TripRecord>) -> Result<()> {
    let text = |col| cast_column(batch, col, &DataType::Utf8);
    let number = |col| cast_column(batch, col, &DataType::Float64);

    let required = |col: Column, arr: Option<ArrayRef>| arr.ok_or(LoadError::MissingColumn(col));
    let start_times = required(Column::StartTime, text(Column::StartTime)?)?;
    let durations = required(Column::TripDuration, number(Column::TripDuration)?)?;
    let start_stations = required(Column::StartStation, text(Column::StartStation)?)?;
    let end_stations = required(Column::EndStation, text(Column::EndStation)?)?;
    let user_types = required(Column::UserType, text(Column::UserType)?)?;
    let end_times = text(Column::EndTime)?;
    let genders = text(Column::Gender)?;
    let birth_years = number(Column::BirthYear)?;

    let start_times = start_times.as_string::<i32>();
    let durations = durations.as_primitive::<Float64Type>();
    let start_stations = start_stations.as_string::<i32>();
    let end_stations = end_stations.as_string::<i32>();
    let user_types = user_types.as_string::<i32>();
    let end_times = end_times.as_ref().map(|a| a.as_string::<i32>());
    let genders = genders.as_ref().map(|a| a.as_string::<i32>());
    let birth_years = birth_years.as_ref().map(|a| a.as_primitive::<Float64Type>());

    for i in 0..batch.num_rows() {
        let row = first_row + i;
        let missing = |column| LoadError::MissingValue { row, column };

        let start_time = text_at(start_times, i).ok_or(missing(Column::StartTime))?;
        let start_time = parse_datetime(start_time, row)?;
        if durations.is_null(i) {
            return Err(missing(Column::TripDuration).into());
        }
        let end_time = end_times
            .and_then(|arr| text_at(arr, i))
            .map(|s| parse_datetime(s, row))
            .transpose()?;

        out.push(TripRecord::new(
            row,
            start_time,
            TripFields {
                end_time,
                trip_duration: durations.value(i),
                start_station: text_at(start_stations, i)
                    .ok_or(missing(Column::StartStation))?
                    .to_string(),
                end_station: text_at(end_stations, i)
                    .ok_or(missing(Column::EndStation))?
                    .to_string(),
                user_type: text_at(user_types, i).map(str::to_string),
                gender: genders.and_then(|arr| text_at(arr, i)).map(str::to_string),
                birth_year: birth_years
                    .filter(|arr| !arr.is_null(i))
                    .map(|arr| arr.value(i))
                    .filter(|y| y.is_finite()),
            },
        ));
    }
    Ok(())
}

/// Cast the named column to `to`; `None` when the batch lacks it.
fn cast_column(batch: &RecordBatch, column: Column, to: &DataType) -> Result<Option<ArrayRef>> {
    let Ok(idx) = batch.schema().index_of(column.header()) else {
        return Ok(None);
    };
    let source = batch.column(idx);
    if source.data_type() == to {
        return Ok(Some(source.clone()));
    }
    match cast(source, to) {
        Ok(arr) => Ok(Some(arr)),
        Err(e) => bail!("column '{column}' of type {:?}: {e}", source.data_type()),
    }
}

/// Non-null, non-blank text at `i`.
fn text_at(arr: &StringArray, i: usize) -> Option<&str> {
    if arr.is_null(i) {
        return None;
    }
    Some(arr.value(i)).filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;

    use arrow::array::{Float64Array, Int64Array};
    use arrow::datatypes::{Field, Schema};
    use chrono::{Month, Weekday};
    use parquet::arrow::ArrowWriter;

    use super::*;
    use crate::data::filter::{City, DayFilter, MonthFilter};
    use crate::data::model::TimeParts;

    const CHICAGO_CSV: &str = "\
,Start Time,End Time,Trip Duration,Start Station,End Station,User Type,Gender,Birth Year
1423854,2017-06-23 15:09:32,2017-06-23 15:14:53,321,Wood St & Hubbard St,Damen Ave & Chicago Ave,Subscriber,Male,1992.0
955915,2017-05-25 18:19:03,2017-05-25 18:45:53,1610,Theater on the Lake,Sheffield Ave & Waveland Ave,Subscriber,Female,1992.0
9031,2017-01-04 08:27:49,2017-01-04 08:34:45,416,May St & Taylor St,Wood St & Taylor St,Subscriber,Male,1981.0
304487,2017-03-06 13:49:38,2017-03-06 13:55:28,350,Christiana Ave & Lawrence Ave,St. Louis Ave & Balmoral Ave,Customer,,
";

    const WASHINGTON_CSV: &str = "\
,Start Time,End Time,Trip Duration,Start Station,End Station,User Type
1621326,2017-06-21 08:36:34,2017-06-21 08:44:43,489.066,14th & Belmont St NW,15th & K St NW,Subscriber
482740,2017-03-11 10:40:00,2017-03-11 10:46:00,402.549,Yuma St & Tenley Circle NW,Connecticut Ave & Yuma St NW,Subscriber
";

    fn write_fixture(name: &str, contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn loads_canonical_csv_with_optional_columns() {
        let (_dir, path) = write_fixture("chicago.csv", CHICAGO_CSV);
        let table = load_file(&path).unwrap();

        assert_eq!(table.len(), 4);
        assert!(table.has_column(Column::Gender));
        assert!(table.has_column(Column::BirthYear));

        let first = &table.trips[0];
        assert_eq!(first.row, 0);
        assert_eq!(first.trip_duration, 321.0);
        assert_eq!(first.start_station, "Wood St & Hubbard St");
        assert_eq!(first.gender.as_deref(), Some("Male"));
        assert_eq!(first.birth_year, Some(1992.0));
        assert_eq!(first.month(), Month::June);
        assert_eq!(first.day_of_week(), Weekday::Fri);
        assert_eq!(first.hour(), 15);

        let blank = &table.trips[3];
        assert_eq!(blank.gender, None);
        assert_eq!(blank.birth_year, None);
    }

    #[test]
    fn padded_headers_still_feed_their_columns() {
        let (_dir, path) = write_fixture(
            "padded.csv",
            "Start Time, Trip Duration ,Start Station,End Station,User Type, Gender,Birth Year \n\
             2017-02-01 07:00:00,90,A,B,Customer,Female,1990.0\n",
        );
        let table = load_file(&path).unwrap();
        assert!(table.has_column(Column::Gender));
        assert_eq!(table.trips[0].gender.as_deref(), Some("Female"));
        assert_eq!(table.trips[0].birth_year, Some(1990.0));
        assert_eq!(table.trips[0].trip_duration, 90.0);
    }

    #[test]
    fn washington_lacks_demographics() {
        let (_dir, path) = write_fixture("washington.csv", WASHINGTON_CSV);
        let table = load_file(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert!(!table.has_column(Column::Gender));
        assert!(!table.has_column(Column::BirthYear));
        assert!(table.has_column(Column::EndTime));
        assert!((table.trips[0].trip_duration - 489.066).abs() < 1e-9);
    }

    #[test]
    fn derived_columns_round_trip_through_start_time() {
        let (_dir, path) = write_fixture("chicago.csv", CHICAGO_CSV);
        let table = load_file(&path).unwrap();
        for trip in &table.trips {
            assert_eq!(trip.time_parts(), TimeParts::derive(&trip.start_time));
        }
    }

    #[test]
    fn load_data_applies_selection() {
        let (_dir, path) = write_fixture("chicago.csv", CHICAGO_CSV);
        let selection = Selection {
            city: City::Chicago,
            month: MonthFilter::Only(Month::June),
            day: DayFilter::All,
        };
        let table = load_data(&path, &selection).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.trips[0].row, 0);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_file(&dir.path().join("nope.csv")).is_err());
    }

    #[test]
    fn missing_required_column_is_reported() {
        let (_dir, path) = write_fixture(
            "bad.csv",
            "Start Time,Trip Duration,Start Station,End Station\n2017-01-01 00:00:00,1,A,B\n",
        );
        let err = load_file(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LoadError>(),
            Some(LoadError::MissingColumn(Column::UserType))
        ));
    }

    #[test]
    fn malformed_start_time_is_fatal() {
        let (_dir, path) = write_fixture(
            "bad.csv",
            "Start Time,Trip Duration,Start Station,End Station,User Type\nyesterday,1,A,B,Customer\n",
        );
        let err = load_file(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LoadError>(),
            Some(LoadError::DateTime { row: 0, .. })
        ));
    }

    #[test]
    fn unsupported_extension() {
        let err = load_file(Path::new("trips.xlsx")).unwrap_err();
        assert!(err.to_string().contains(".xlsx"));
    }

    #[test]
    fn parses_iso_and_fractional_timestamps() {
        assert!(parse_datetime("2017-01-01T09:07:57", 0).is_ok());
        assert!(parse_datetime("2017-01-01 09:07:57.250", 0).is_ok());
        assert!(parse_datetime("01/01/2017 09:07", 0).is_err());
    }

    #[test]
    fn loads_json_records() {
        let (_dir, path) = write_fixture(
            "trips.json",
            r#"[
                {"Start Time": "2017-02-01 07:00:00", "Trip Duration": 90,
                 "Start Station": "A", "End Station": "B", "User Type": "Customer",
                 "Gender": null},
                {"Start Time": "2017-02-02 08:00:00", "Trip Duration": 120.5,
                 "Start Station": "B", "End Station": "A", "User Type": "Subscriber",
                 "Gender": "Female"}
            ]"#,
        );
        let table = load_file(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.has_column(Column::Gender));
        assert!(!table.has_column(Column::BirthYear));
        assert_eq!(table.trips[0].gender, None);
        assert_eq!(table.trips[1].gender.as_deref(), Some("Female"));
    }

    #[test]
    fn loads_parquet_with_cast_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trips.parquet");

        let schema = Arc::new(Schema::new(vec![
            Field::new("Start Time", DataType::Utf8, false),
            Field::new("Trip Duration", DataType::Int64, false),
            Field::new("Start Station", DataType::Utf8, false),
            Field::new("End Station", DataType::Utf8, false),
            Field::new("User Type", DataType::Utf8, true),
            Field::new("Birth Year", DataType::Float64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(vec![
                    "2017-04-03 06:30:00",
                    "2017-04-04T18:05:00",
                ])),
                Arc::new(Int64Array::from(vec![300, 900])),
                Arc::new(StringArray::from(vec!["A", "B"])),
                Arc::new(StringArray::from(vec!["B", "A"])),
                Arc::new(StringArray::from(vec![Some("Subscriber"), None])),
                Arc::new(Float64Array::from(vec![Some(1988.0), None])),
            ],
        )
        .unwrap();
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let table = load_file(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.has_column(Column::BirthYear));
        assert!(!table.has_column(Column::Gender));
        assert_eq!(table.trips[1].trip_duration, 900.0);
        assert_eq!(table.trips[1].user_type, None);
        assert_eq!(table.trips[1].hour(), 18);
        assert_eq!(table.trips[0].birth_year, Some(1988.0));
    }
}
