use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use thiserror::Error;

use crate::data::filter::City;
use crate::viewer::DEFAULT_PAGE_SIZE;

/// Explore US bikeshare trip data interactively.
#[derive(Debug, Parser)]
#[command(name = "bikeshare", author, version, about, long_about = None)]
pub struct Args {
    /// Directory holding the city files
    #[arg(long, env = "BIKESHARE_DATA_DIR", default_value = ".")]
    pub data_dir: PathBuf,

    /// JSON object mapping city names to file names, overriding the defaults
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Rows shown per raw data page
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::PageSize);
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("catalog names unknown city '{0}' (expected chicago, new york or washington)")]
    UnknownCity(String),
    #[error("--page-size must be at least 1")]
    PageSize,
}

// ---------------------------------------------------------------------------
// City catalog
// ---------------------------------------------------------------------------

/// Fixed mapping from city to trip file.  Built once at start-up and only
/// read afterwards.
#[derive(Debug, Clone)]
pub struct CityCatalog {
    data_dir: PathBuf,
    files: BTreeMap<City, PathBuf>,
}

impl CityCatalog {
    /// The canonical file names.
    pub fn builtin(data_dir: impl Into<PathBuf>) -> Self {
        let files = City::ALL
            .into_iter()
            .map(|city| (city, PathBuf::from(default_file(city))))
            .collect();
        CityCatalog {
            data_dir: data_dir.into(),
            files,
        }
    }

    /// Built-in catalog with entries replaced from a JSON override file.
    pub fn from_args(args: &Args) -> Result<Self> {
        let mut catalog = CityCatalog::builtin(&args.data_dir);
        if let Some(path) = &args.catalog {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading catalog {}", path.display()))?;
            catalog
                .apply_overrides(&text)
                .with_context(|| format!("parsing catalog {}", path.display()))?;
        }
        for city in City::ALL {
            log::debug!("{city} -> {}", catalog.path_for(city).display());
        }
        Ok(catalog)
    }

    /// Apply `{ "<city>": "<file>" }` overrides.
    pub fn apply_overrides(&mut self, json: &str) -> Result<()> {
        let overrides: BTreeMap<String, PathBuf> = serde_json::from_str(json)?;
        for (name, file) in overrides {
            let city = name
                .parse::<City>()
                .map_err(|_| ConfigError::UnknownCity(name.clone()))?;
            self.files.insert(city, file);
        }
        Ok(())
    }

    /// Location of the city's file; relative names resolve against the
    /// data directory.
    pub fn path_for(&self, city: City) -> PathBuf {
        let file = self
            .files
            .get(&city)
            .map(PathBuf::as_path)
            .unwrap_or_else(|| Path::new(default_file(city)));
        self.data_dir.join(file)
    }
}

fn default_file(city: City) -> &'static str {
    match city {
        City::Chicago => "chicago.csv",
        City::NewYork => "new_york_city.csv",
        City::Washington => "washington.csv",
    }
}
