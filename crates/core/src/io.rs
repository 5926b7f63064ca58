//! Configuration file parsing and validation.
//!
//! A design run is described by a TOML file that `DesignConfig` parses and
//! converts into a [`DesignJob`].
//!
//! # File Format
//!
//! ```toml
//! delta_phi = 2.69056597
//!
//! [spectral]
//! fundamental_ghz = 10.0
//! truncation = 5
//! half_width = 10
//!
//! [upper]
//! depths = [0.59, 0.57, 0.43]
//! phases = [2.356, 3.491, 0.323]
//!
//! [lower]
//! depths = [0.45, 1.1, 0.0]
//! phases = [0.910, 3.075, 2.356]
//!
//! [objective]
//! mode = "min_equalized"
//! target_orders = [-1, 1]
//!
//! [search]
//! method = "global_local"
//!
//! [[search.free]]
//! slot = { kind = "differential_phase" }
//! bounds = { lo = 0.0, hi = 6.283185307179586 }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    analyzer::SpectralConfig,
    design::DesignJob,
    metrics::MetricsConfig,
    objective::ObjectiveConfig,
    params::{
        FreeParameter, ModulationParameters, MzmParameters, ParameterLayout, ParameterSlot,
        SpectrumError, MAX_DEPTH, TONES,
    },
    search::{validate_bounds, Bounds, GlobalOptions, LocalOptions, SearchError},
};

// ============================================================================
// Search Section
// ============================================================================

/// Which optimisers a design run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SearchMethod {
    /// Quasi-Newton refinement from the configured parameters.
    Local,
    /// Differential evolution only.
    Global,
    /// Differential evolution followed by local refinement of its best point.
    #[default]
    #[serde(alias = "global+local")]
    GlobalLocal,
    /// Evaluate the configured parameters without searching.
    Evaluate,
}

impl SearchMethod {
    pub fn needs_free_parameters(self) -> bool {
        !matches!(self, SearchMethod::Evaluate)
    }
}

impl std::fmt::Display for SearchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchMethod::Local => write!(f, "local"),
            SearchMethod::Global => write!(f, "global"),
            SearchMethod::GlobalLocal => write!(f, "global+local"),
            SearchMethod::Evaluate => write!(f, "evaluate"),
        }
    }
}

/// A searched slot; bounds default to the slot's conventional range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreeParameterSpec {
    pub slot: ParameterSlot,
    #[serde(default)]
    pub bounds: Option<Bounds>,
}

impl FreeParameterSpec {
    pub fn resolve(&self) -> FreeParameter {
        FreeParameter {
            slot: self.slot,
            bounds: self.bounds.unwrap_or_else(|| self.slot.default_bounds()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SearchSection {
    #[serde(default)]
    pub method: SearchMethod,
    #[serde(default)]
    pub free: Vec<FreeParameterSpec>,
    #[serde(default)]
    pub local: LocalOptions,
    #[serde(default)]
    pub global: GlobalOptions,
}

// ============================================================================
// Design Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesignConfig {
    /// Differential phase between the arms.
    #[serde(default)]
    pub delta_phi: f64,
    #[serde(default)]
    pub spectral: SpectralConfig,
    pub upper: ModulationParameters,
    pub lower: ModulationParameters,
    pub objective: ObjectiveConfig,
    #[serde(default)]
    pub search: SearchSection,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl DesignConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        let config: DesignConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn base_parameters(&self) -> MzmParameters {
        MzmParameters {
            upper: self.upper,
            lower: self.lower,
            delta_phi: self.delta_phi,
        }
    }

    pub fn layout(&self) -> ParameterLayout {
        ParameterLayout::new(
            self.base_parameters(),
            self.search.free.iter().map(FreeParameterSpec::resolve).collect(),
        )
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.spectral.validate()?;
        self.base_parameters().validate()?;
        self.validate_objective()?;
        self.validate_search()
    }

    fn validate_objective(&self) -> Result<(), ConfigError> {
        let objective = &self.objective;
        let w = self.spectral.half_width as i32;
        if objective.target_orders.is_empty() {
            return Err(ConfigError::InvalidObjective(
                "target_orders must name at least one sideband".into(),
            ));
        }
        for &order in objective.target_orders.iter().chain(&objective.suppress_orders) {
            if order < -w || order > w {
                return Err(ConfigError::InvalidObjective(format!(
                    "order {order} lies outside the reporting window ±{w}"
                )));
            }
        }
        let weights = [
            ("target_weight", objective.target_weight),
            ("suppress_weight", objective.suppress_weight),
            ("leakage_weight", objective.leakage_weight),
            ("mismatch_weight", objective.mismatch_weight),
            ("mismatch_tolerance", objective.mismatch_tolerance),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidObjective(format!(
                    "{name} must be finite and non-negative"
                )));
            }
        }
        if !(objective.epsilon.is_finite() && objective.epsilon > 0.0) {
            return Err(ConfigError::InvalidObjective("epsilon must be positive".into()));
        }
        if !objective.failure_penalty.is_finite() {
            return Err(ConfigError::InvalidObjective(
                "failure_penalty must be finite".into(),
            ));
        }
        Ok(())
    }

    fn validate_search(&self) -> Result<(), ConfigError> {
        let search = &self.search;
        if !search.method.needs_free_parameters() {
            return Ok(());
        }
        if search.free.is_empty() {
            return Err(ConfigError::InvalidSearch(format!(
                "method '{}' requires at least one [[search.free]] entry",
                search.method
            )));
        }
        for (idx, spec) in search.free.iter().enumerate() {
            if let Some(tone) = spec.slot.tone() {
                if tone >= TONES {
                    return Err(ConfigError::InvalidSearch(format!(
                        "free parameter {idx} names tone {tone}; tones are 0..{TONES}"
                    )));
                }
            }
            if search.free[..idx].iter().any(|other| other.slot == spec.slot) {
                return Err(ConfigError::InvalidSearch(format!(
                    "slot {} is listed more than once",
                    spec.slot
                )));
            }
            if let Some(bounds) = spec.bounds {
                if spec.slot.is_depth() && bounds.lo < 0.0 {
                    return Err(ConfigError::InvalidSearch(format!(
                        "depth slot {} has a negative lower bound",
                        spec.slot
                    )));
                }
                if spec.slot.is_depth() && bounds.hi > MAX_DEPTH {
                    return Err(ConfigError::InvalidSearch(format!(
                        "depth slot {} has an upper bound above {MAX_DEPTH}",
                        spec.slot
                    )));
                }
            }
        }
        validate_bounds(&self.layout().bounds())?;
        if search.local.max_iter == 0 {
            return Err(ConfigError::InvalidSearch("local.max_iter must be positive".into()));
        }
        if matches!(search.method, SearchMethod::Global | SearchMethod::GlobalLocal)
            && search.global.population_size < 4
        {
            return Err(SearchError::PopulationTooSmall(search.global.population_size).into());
        }
        Ok(())
    }
}

impl From<DesignConfig> for DesignJob {
    fn from(value: DesignConfig) -> Self {
        let layout = value.layout();
        DesignJob {
            spectral: value.spectral,
            layout,
            objective: value.objective,
            method: value.search.method,
            local: value.search.local,
            global: value.search.global,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid spectral configuration: {0}")]
    Spectral(#[from] SpectrumError),

    #[error("Invalid objective configuration: {0}")]
    InvalidObjective(String),

    #[error("Invalid search configuration: {0}")]
    InvalidSearch(String),

    #[error("Invalid search bounds: {0}")]
    Bounds(#[from] SearchError),
}
