/// Data layer: trip types, loading, and filtering.
///
/// Architecture:
/// ```text
///  .csv / .parquet / .json
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → TripTable (+ month / weekday / hour)
///   └──────────┘
///        │
///        ▼
///   ┌───────────┐
///   │ TripTable  │  Vec<TripRecord>, available columns
///   └───────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  month / day selection → filtered TripTable
///   └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
