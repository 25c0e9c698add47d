use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

pub const DEFAULT_VARIANTS: [&str; 2] = ["reno", "cubic"];
pub const DEFAULT_DELAYS_MS: [u32; 3] = [10, 50, 100];
pub const DEFAULT_LOSSES_PCT: [f64; 3] = [0.1, 0.5, 1.0];
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.90;

/// Load a JSON configuration from disk, creating it with the provided initializer if missing.
pub fn load_or_init<T, F>(path: &Path, initializer: F) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> T,
{
    if path.exists() {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        let value = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse config from {}", path.display()))?;
        Ok(value)
    } else {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        let value = initializer();
        let serialized = serde_json::to_string_pretty(&value)?;
        fs::write(path, serialized)
            .with_context(|| format!("failed to write config to {}", path.display()))?;
        Ok(value)
    }
}

/// The experiment grid and where its inputs and outputs live.
///
/// Lists are iterated in the order they are stored, which fixes line draw
/// order and legend order in every chart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StudyConfig {
    data_dir: PathBuf,
    output_dir: PathBuf,
    variants: Vec<String>,
    delays_ms: Vec<u32>,
    losses_pct: Vec<f64>,
    confidence_level: f64,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            output_dir: PathBuf::from("plots"),
            variants: DEFAULT_VARIANTS.iter().map(|v| v.to_string()).collect(),
            delays_ms: DEFAULT_DELAYS_MS.to_vec(),
            losses_pct: DEFAULT_LOSSES_PCT.to_vec(),
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
        }
    }
}

impl StudyConfig {
    pub fn new(
        variants: Vec<String>,
        delays_ms: Vec<u32>,
        losses_pct: Vec<f64>,
        confidence_level: f64,
    ) -> Result<Self> {
        let config = Self {
            variants,
            delays_ms,
            losses_pct,
            confidence_level,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Load the config at `path`, writing the default grid there first if it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = load_or_init(path, Self::default)?;
        config
            .validate()
            .with_context(|| format!("invalid study config in {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.variants.is_empty() {
            bail!("at least one congestion-control variant is required");
        }
        for variant in &self.variants {
            if variant.is_empty() || !variant.chars().all(|c| c.is_ascii_alphanumeric()) {
                bail!("invalid variant name {:?}: expected ASCII letters or digits", variant);
            }
        }
        if self.delays_ms.is_empty() {
            bail!("at least one delay level is required");
        }
        if self.losses_pct.is_empty() {
            bail!("at least one loss level is required");
        }
        if let Some(loss) = self
            .losses_pct
            .iter()
            .find(|loss| !loss.is_finite() || **loss < 0.0)
        {
            bail!("invalid loss level {}: expected a non-negative percentage", loss);
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            bail!(
                "confidence level {} must lie strictly between 0 and 1",
                self.confidence_level
            );
        }
        Ok(())
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn variants(&self) -> &[String] {
        &self.variants
    }

    pub fn delays_ms(&self) -> &[u32] {
        &self.delays_ms
    }

    pub fn losses_pct(&self) -> &[f64] {
        &self.losses_pct
    }

    pub fn confidence_level(&self) -> f64 {
        self.confidence_level
    }
}

/// One cell of the experiment grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Configuration<'a> {
    pub variant: &'a str,
    pub delay_ms: u32,
    pub loss_pct: f64,
}

impl<'a> Configuration<'a> {
    pub fn new(variant: &'a str, delay_ms: u32, loss_pct: f64) -> Self {
        Self {
            variant,
            delay_ms,
            loss_pct,
        }
    }
}

impl fmt::Display for Configuration<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} delay={}ms loss={}%",
            self.variant,
            self.delay_ms,
            format_loss(self.loss_pct)
        )
    }
}

/// Render a loss level the way result files and chart titles spell it.
///
/// Shortest round-trip digits, always with a fractional part (`1.0`, not `1`), and
/// switching to exponent form below `1e-4` or from `1e16` upward (`1e-05`, `1e+16`).
pub fn format_loss(loss_pct: f64) -> String {
    if !loss_pct.is_finite() {
        return loss_pct.to_string();
    }

    let scientific = format!("{loss_pct:e}");
    let (mantissa, exponent) = scientific
        .split_once('e')
        .unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if loss_pct != 0.0 && !(-4..16).contains(&exponent) {
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{mantissa}e{sign}{:02}", exponent.abs());
    }

    let rendered = loss_pct.to_string();
    if rendered.contains('.') {
        rendered
    } else {
        format!("{rendered}.0")
    }
}
