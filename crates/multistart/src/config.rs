//! Configuration types for multi-start refinement runs.
//!
//! A multi-start file is an ordinary design file with three extra sections:
//! the `[multistart]` marker, a `[[starts.axes]]` grid of starting values
//! and an `[output]` table for the ranked CSV.
//!
//! # Example
//!
//! ```toml
//! delta_phi = 2.69
//!
//! [multistart]
//! threads = 4
//!
//! [upper]
//! depths = [0.59, 0.57, 0.43]
//!
//! [lower]
//! depths = [0.45, 1.1, 0.0]
//!
//! [objective]
//! target_orders = [-1, 1]
//! suppress_orders = [0]
//!
//! [search]
//! method = "local"
//!
//! [[search.free]]
//! slot = { kind = "differential_phase" }
//!
//! [[starts.axes]]
//! slot = { kind = "differential_phase" }
//! range = { min = 0.0, max = 6.0, step = 0.5 }
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use trimod_core::{
    io::{ConfigError as DesignConfigError, DesignConfig},
    params::ParameterSlot,
};

// ============================================================================
// Range Specification
// ============================================================================

/// Inclusive grid `min, min+step, ..., max`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeSpec {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl RangeSpec {
    pub fn values(&self) -> Vec<f64> {
        (0..self.count())
            .map(|i| (self.min + i as f64 * self.step).min(self.max))
            .collect()
    }

    pub fn count(&self) -> usize {
        if self.step <= 0.0 || self.max < self.min {
            return 0;
        }
        // Tolerate accumulated rounding at the upper end.
        ((self.max - self.min) / self.step + 1e-9).floor() as usize + 1
    }

    fn validate(&self, slot: ParameterSlot) -> Result<(), ConfigError> {
        if ![self.min, self.max, self.step].iter().all(|v| v.is_finite()) {
            return Err(ConfigError::InvalidRange(format!("{slot}: range must be finite")));
        }
        if self.step <= 0.0 {
            return Err(ConfigError::InvalidRange(format!("{slot}: step must be positive")));
        }
        if self.min > self.max {
            return Err(ConfigError::InvalidRange(format!("{slot}: min > max")));
        }
        Ok(())
    }
}

// ============================================================================
// Start Grid
// ============================================================================

/// Starting values for one free parameter, given as a range or a list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartAxis {
    pub slot: ParameterSlot,
    #[serde(default)]
    pub range: Option<RangeSpec>,
    #[serde(default)]
    pub values: Option<Vec<f64>>,
}

impl StartAxis {
    pub fn values(&self) -> Vec<f64> {
        match (&self.range, &self.values) {
            (_, Some(values)) => values.clone(),
            (Some(range), None) => range.values(),
            (None, None) => Vec::new(),
        }
    }

    pub fn count(&self) -> usize {
        match (&self.range, &self.values) {
            (_, Some(values)) => values.len(),
            (Some(range), None) => range.count(),
            (None, None) => 0,
        }
    }
}

/// Cartesian grid of starting points. Free parameters without an axis start
/// from their base value.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StartGrid {
    #[serde(default)]
    pub axes: Vec<StartAxis>,
}

impl StartGrid {
    pub fn total_starts(&self) -> usize {
        self.axes.iter().map(StartAxis::count).product()
    }
}

// ============================================================================
// Output Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Ranked results CSV.
    #[serde(default = "default_output_path")]
    pub path: PathBuf,

    /// Write only the best `top` rows.
    #[serde(default)]
    pub top: Option<usize>,
}

fn default_output_path() -> PathBuf {
    PathBuf::from("./multistart_results.csv")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            top: None,
        }
    }
}

// ============================================================================
// Multi-start Section
// ============================================================================

/// The `[multistart]` section that marks a TOML as a multi-start request.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MultiStartSection {
    /// Worker threads (default: physical cores).
    #[serde(default)]
    pub threads: Option<usize>,

    /// Log every finished start.
    #[serde(default)]
    pub verbose: bool,

    /// Expand and report the starts without refining.
    #[serde(default)]
    pub dry_run: bool,
}

// ============================================================================
// Complete Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiStartConfig {
    /// Presence marks the file as a multi-start request.
    pub multistart: MultiStartSection,

    #[serde(default)]
    pub starts: StartGrid,

    #[serde(default)]
    pub output: OutputConfig,

    /// The design every start refines.
    #[serde(flatten)]
    pub design: DesignConfig,
}

impl MultiStartConfig {
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        if !s.contains("[multistart]") {
            return Err(ConfigError::NotMultiStartConfig);
        }
        let config: MultiStartConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.design.validate()?;
        let free = &self.design.search.free;
        if free.is_empty() {
            return Err(ConfigError::InvalidStarts(
                "multi-start needs at least one [[search.free]] entry".into(),
            ));
        }
        for (idx, axis) in self.starts.axes.iter().enumerate() {
            if !free.iter().any(|spec| spec.slot == axis.slot) {
                return Err(ConfigError::InvalidStarts(format!(
                    "axis {idx} sweeps {} which is not a free parameter",
                    axis.slot
                )));
            }
            if self.starts.axes[..idx].iter().any(|other| other.slot == axis.slot) {
                return Err(ConfigError::InvalidStarts(format!(
                    "slot {} has more than one axis",
                    axis.slot
                )));
            }
            match (&axis.range, &axis.values) {
                (Some(_), Some(_)) => {
                    return Err(ConfigError::InvalidStarts(format!(
                        "axis {} sets both range and values",
                        axis.slot
                    )))
                }
                (None, None) => {
                    return Err(ConfigError::InvalidStarts(format!(
                        "axis {} needs a range or a values list",
                        axis.slot
                    )))
                }
                (Some(range), None) => range.validate(axis.slot)?,
                (None, Some(values)) => {
                    if values.is_empty() || values.iter().any(|v| !v.is_finite()) {
                        return Err(ConfigError::InvalidStarts(format!(
                            "axis {} needs finite values",
                            axis.slot
                        )));
                    }
                }
            }
        }
        if self.output.top == Some(0) {
            return Err(ConfigError::InvalidOutput("top must be positive".into()));
        }
        Ok(())
    }

    /// Defaults to physical CPU cores.
    pub fn effective_threads(&self) -> usize {
        self.multistart
            .threads
            .filter(|&n| n > 0)
            .unwrap_or_else(num_cpus::get_physical)
    }

    pub fn total_starts(&self) -> usize {
        self.starts.total_starts()
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("TOML file does not contain [multistart] section - not a multi-start configuration")]
    NotMultiStartConfig,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Design(#[from] DesignConfigError),

    #[error("Invalid parameter range: {0}")]
    InvalidRange(String),

    #[error("Invalid start grid: {0}")]
    InvalidStarts(String),

    #[error("Invalid output configuration: {0}")]
    InvalidOutput(String),
}

// ============================================================================
// Tests
// ============================================================================
