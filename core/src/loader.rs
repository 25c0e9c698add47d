use std::{
    fs::File,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim};
use tracing::{debug, warn};

use crate::config::{format_loss, Configuration};

/// Unit the traffic generator appends to each throughput row.
pub const UNIT_SUFFIX: &str = "Mbits/sec";

/// Result of looking up the sample file for one configuration.
#[derive(Clone, Debug, PartialEq)]
pub enum LoadOutcome {
    /// No file exists for the configuration.
    Missing { path: PathBuf },
    /// The file was read; `values` may still be empty if no row parsed.
    Loaded {
        path: PathBuf,
        values: Vec<f64>,
        dropped_rows: usize,
    },
}

impl LoadOutcome {
    pub fn path(&self) -> &Path {
        match self {
            Self::Missing { path } | Self::Loaded { path, .. } => path,
        }
    }

    /// Samples for the configuration; a missing file reads as an empty set.
    pub fn values(&self) -> &[f64] {
        match self {
            Self::Missing { .. } => &[],
            Self::Loaded { values, .. } => values,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing { .. })
    }
}

/// Anything that can produce the raw sample set for a configuration.
pub trait SampleSource {
    fn load(&self, configuration: &Configuration<'_>) -> Result<LoadOutcome>;
}

/// A directory of `results_{variant}{delay}{loss}.csv` files.
#[derive(Clone, Debug)]
pub struct ResultsDir {
    root: PathBuf,
}

impl ResultsDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, configuration: &Configuration<'_>) -> PathBuf {
        self.root.join(results_file_name(configuration))
    }
}

impl SampleSource for ResultsDir {
    fn load(&self, configuration: &Configuration<'_>) -> Result<LoadOutcome> {
        load_samples(&self.path_for(configuration))
    }
}

pub fn results_file_name(configuration: &Configuration<'_>) -> String {
    format!(
        "results_{}{}{}.csv",
        configuration.variant,
        configuration.delay_ms,
        format_loss(configuration.loss_pct)
    )
}

/// Read one throughput value per row from `path`.
///
/// Only the first field of each row is considered. Rows that do not parse to a finite
/// number are dropped.
pub fn load_samples(path: &Path) -> Result<LoadOutcome> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            warn!("{} not found", path.display());
            return Ok(LoadOutcome::Missing {
                path: path.to_path_buf(),
            });
        }
        Err(err) => {
            return Err(err).with_context(|| format!("failed to open {}", path.display()));
        }
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(file);

    let mut values = Vec::new();
    let mut dropped_rows = 0usize;
    for (row, record) in reader.records().enumerate() {
        let record =
            record.with_context(|| format!("failed to read row {} of {}", row + 1, path.display()))?;
        let raw = record.get(0).unwrap_or_default();
        match parse_throughput(raw) {
            Some(value) => values.push(value),
            None => {
                debug!("dropping unparseable row {} of {}: {:?}", row + 1, path.display(), raw);
                dropped_rows += 1;
            }
        }
    }

    debug!(
        "loaded {} samples from {} ({} rows dropped): {:?}",
        values.len(),
        path.display(),
        dropped_rows,
        values
    );

    Ok(LoadOutcome::Loaded {
        path: path.to_path_buf(),
        values,
        dropped_rows,
    })
}

/// Parse a single raw row such as `"12.3Mbits/sec"` or `" 7.5 "`.
pub fn parse_throughput(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let number = trimmed.strip_suffix(UNIT_SUFFIX).unwrap_or(trimmed).trim();
    number.parse::<f64>().ok().filter(|value| value.is_finite())
}
