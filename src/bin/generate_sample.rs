use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use clap::{Parser, ValueEnum};
use parquet::arrow::ArrowWriter;

/// Write deterministic synthetic bikeshare files for chicago, new york and
/// washington.
#[derive(Debug, Parser)]
struct Args {
    /// Output directory
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Trips per city
    #[arg(long, default_value_t = 500)]
    rows: usize,

    #[arg(long, value_enum, default_value_t = Format::Csv)]
    format: Format,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Csv,
    Parquet,
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next_f64() * n as f64) as usize % n.max(1)
    }

    /// Index into `weights`, proportional to weight.
    fn weighted(&mut self, weights: &[f64]) -> usize {
        let total: f64 = weights.iter().sum();
        let mut pick = self.next_f64() * total;
        for (i, w) in weights.iter().enumerate() {
            if pick < *w {
                return i;
            }
            pick -= w;
        }
        weights.len() - 1
    }
}

struct CityProfile {
    file_stem: &'static str,
    seed: u64,
    stations: &'static [&'static str],
    demographics: bool,
}

const CITIES: [CityProfile; 3] = [
    CityProfile {
        file_stem: "chicago",
        seed: 42,
        stations: &[
            "Streeter Dr & Grand Ave",
            "Clinton St & Washington Blvd",
            "Lake Shore Dr & Monroe St",
            "Canal St & Adams St",
            "Theater on the Lake",
            "Michigan Ave & Oak St",
        ],
        demographics: true,
    },
    CityProfile {
        file_stem: "new_york_city",
        seed: 7,
        stations: &[
            "Pershing Square North",
            "E 17 St & Broadway",
            "W 21 St & 6 Ave",
            "West St & Chambers St",
            "Broadway & E 22 St",
            "Central Park S & 6 Ave",
        ],
        demographics: true,
    },
    CityProfile {
        file_stem: "washington",
        seed: 1999,
        stations: &[
            "Columbus Circle / Union Station",
            "Lincoln Memorial",
            "Jefferson Dr & 14th St SW",
            "Massachusetts Ave & Dupont Circle NW",
            "15th & P St NW",
        ],
        demographics: false,
    },
];

/// Commute-shaped hour weights: morning and evening peaks.
const HOUR_WEIGHTS: [f64; 24] = [
    0.2, 0.1, 0.1, 0.1, 0.2, 0.6, 1.5, 3.5, 5.0, 3.0, 2.0, 2.2, 2.6, 2.5, 2.4, 2.8, 4.0, 5.5,
    4.2, 3.0, 2.0, 1.4, 0.9, 0.5,
];

struct Trip {
    start: NaiveDateTime,
    end: NaiveDateTime,
    duration: f64,
    start_station: &'static str,
    end_station: &'static str,
    user_type: Option<&'static str>,
    gender: Option<&'static str>,
    birth_year: Option<f64>,
}

fn generate_trips(profile: &CityProfile, rows: usize) -> Result<Vec<Trip>> {
    let mut rng = SimpleRng::new(profile.seed);
    // 2017-01-01 through 2017-06-30
    let first_day = NaiveDate::from_ymd_opt(2017, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .context("invalid first day")?;

    let mut trips: Vec<Trip> = (0..rows)
        .map(|_| {
            let start = first_day
                + Duration::days(rng.below(181) as i64)
                + Duration::hours(rng.weighted(&HOUR_WEIGHTS) as i64)
                + Duration::seconds(rng.below(3600) as i64);
            let duration = 120.0 + (rng.next_f64() * 2400.0).round();
            let end = start + Duration::seconds(duration as i64);

            let start_station = profile.stations[rng.below(profile.stations.len())];
            let end_station = profile.stations[rng.below(profile.stations.len())];
            let subscriber = rng.next_f64() < 0.8;
            let user_type = match rng.below(50) {
                0 => None,
                _ if subscriber => Some("Subscriber"),
                _ => Some("Customer"),
            };

            let (gender, birth_year) = if profile.demographics && subscriber {
                let gender = if rng.next_f64() < 0.7 { "Male" } else { "Female" };
                let year = 1950.0 + rng.below(50) as f64;
                (Some(gender), Some(year))
            } else {
                (None, None)
            };

            Trip {
                start,
                end,
                duration,
                start_station,
                end_station,
                user_type,
                gender,
                birth_year,
            }
        })
        .collect();

    trips.sort_by_key(|t| t.start);
    Ok(trips)
}

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn write_csv(path: &Path, profile: &CityProfile, trips: &[Trip]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating CSV")?;

    let mut header = vec![
        "",
        "Start Time",
        "End Time",
        "Trip Duration",
        "Start Station",
        "End Station",
        "User Type",
    ];
    if profile.demographics {
        header.extend(["Gender", "Birth Year"]);
    }
    writer.write_record(&header)?;

    for (i, trip) in trips.iter().enumerate() {
        let mut record = vec![
            i.to_string(),
            trip.start.format(DATETIME_FORMAT).to_string(),
            trip.end.format(DATETIME_FORMAT).to_string(),
            trip.duration.to_string(),
            trip.start_station.to_string(),
            trip.end_station.to_string(),
            trip.user_type.unwrap_or_default().to_string(),
        ];
        if profile.demographics {
            record.push(trip.gender.unwrap_or_default().to_string());
            record.push(
                trip.birth_year
                    .map(|y| format!("{y:.1}"))
                    .unwrap_or_default(),
            );
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_parquet(path: &Path, profile: &CityProfile, trips: &[Trip]) -> Result<()> {
    let text = |f: fn(&Trip) -> Option<String>| -> ArrayRef {
        Arc::new(trips.iter().map(f).collect::<StringArray>())
    };

    let mut fields = vec![
        Field::new("Start Time", DataType::Utf8, false),
        Field::new("End Time", DataType::Utf8, false),
        Field::new("Trip Duration", DataType::Float64, false),
        Field::new("Start Station", DataType::Utf8, false),
        Field::new("End Station", DataType::Utf8, false),
        Field::new("User Type", DataType::Utf8, true),
    ];
    let mut columns: Vec<ArrayRef> = vec![
        text(|t| Some(t.start.format(DATETIME_FORMAT).to_string())),
        text(|t| Some(t.end.format(DATETIME_FORMAT).to_string())),
        Arc::new(Float64Array::from_iter_values(trips.iter().map(|t| t.duration))),
        text(|t| Some(t.start_station.to_string())),
        text(|t| Some(t.end_station.to_string())),
        text(|t| t.user_type.map(str::to_string)),
    ];
    if profile.demographics {
        fields.push(Field::new("Gender", DataType::Utf8, true));
        columns.push(text(|t| t.gender.map(str::to_string)));
        fields.push(Field::new("Birth Year", DataType::Float64, true));
        columns.push(Arc::new(
            trips.iter().map(|t| t.birth_year).collect::<Float64Array>(),
        ));
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), columns).context("building record batch")?;

    let file = std::fs::File::create(path).context("creating parquet file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating {}", args.out_dir.display()))?;

    for profile in &CITIES {
        let trips = generate_trips(profile, args.rows)?;
        let path = match args.format {
            Format::Csv => {
                let path = args.out_dir.join(format!("{}.csv", profile.file_stem));
                write_csv(&path, profile, &trips)?;
                path
            }
            Format::Parquet => {
                let path = args.out_dir.join(format!("{}.parquet", profile.file_stem));
                write_parquet(&path, profile, &trips)?;
                path
            }
        };
        println!("Wrote {} trips to {}", trips.len(), path.display());
    }
    Ok(())
}
