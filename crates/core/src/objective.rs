//! Figures of merit over a combined spectrum.
//!
//! Every mode is minimised. Scores that come out non-finite are reported as
//! [`Evaluation::Failed`] rather than propagated, and the search layer turns
//! them into a large finite penalty.

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

use crate::{
    analyzer::MzmAnalyzer,
    params::{ParameterLayout, SpectrumError},
    search::{Bounds, Objective, DEFAULT_FAILURE_PENALTY},
    spectrum::SpectrumMap,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveMode {
    /// `Σ|suppress| / (Σ|target| + ε)`
    #[default]
    SuppressionRatio,
    /// `-min|target| + λ Σ|non-target| + μ Σ_pairs max(0, ||a_i| - |a_j|| - tol)`
    MinEqualized,
    /// `-α Σ|target| + β Σ|suppress|`
    WeightedContrast,
}

impl std::fmt::Display for ObjectiveMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectiveMode::SuppressionRatio => write!(f, "suppression-ratio"),
            ObjectiveMode::MinEqualized => write!(f, "min-equalized"),
            ObjectiveMode::WeightedContrast => write!(f, "weighted-contrast"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectiveConfig {
    #[serde(default)]
    pub mode: ObjectiveMode,
    /// Sideband orders the design wants strong.
    pub target_orders: Vec<i32>,
    /// Sideband orders the design wants suppressed.
    #[serde(default)]
    pub suppress_orders: Vec<i32>,
    /// α: reward on target magnitude (weighted contrast).
    #[serde(default = "default_unit_weight")]
    pub target_weight: f64,
    /// β: penalty on suppressed magnitude (weighted contrast).
    #[serde(default = "default_unit_weight")]
    pub suppress_weight: f64,
    /// λ: penalty on non-target leakage (min-equalized).
    #[serde(default = "default_leakage_weight")]
    pub leakage_weight: f64,
    /// μ: penalty on target imbalance (min-equalized).
    #[serde(default = "default_mismatch_weight")]
    pub mismatch_weight: f64,
    /// Imbalance tolerated between target magnitudes before μ applies.
    #[serde(default = "default_mismatch_tolerance")]
    pub mismatch_tolerance: f64,
    /// Guards the ratio and dB conversions against zero power.
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    /// Score substituted for failed evaluations.
    #[serde(default = "default_failure_penalty")]
    pub failure_penalty: f64,
}

fn default_unit_weight() -> f64 {
    1.0
}

fn default_leakage_weight() -> f64 {
    0.5
}

fn default_mismatch_weight() -> f64 {
    10.0
}

fn default_mismatch_tolerance() -> f64 {
    0.01
}

fn default_epsilon() -> f64 {
    1e-12
}

fn default_failure_penalty() -> f64 {
    DEFAULT_FAILURE_PENALTY
}

impl ObjectiveConfig {
    pub fn new(mode: ObjectiveMode, target_orders: Vec<i32>, suppress_orders: Vec<i32>) -> Self {
        Self {
            mode,
            target_orders,
            suppress_orders,
            target_weight: default_unit_weight(),
            suppress_weight: default_unit_weight(),
            leakage_weight: default_leakage_weight(),
            mismatch_weight: default_mismatch_weight(),
            mismatch_tolerance: default_mismatch_tolerance(),
            epsilon: default_epsilon(),
            failure_penalty: default_failure_penalty(),
        }
    }
}

/// Why a parameter vector could not be scored.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationFailure {
    #[error("spectral expansion rejected parameters: {0}")]
    Domain(#[from] SpectrumError),

    #[error("objective produced a non-finite score ({0})")]
    NonFinite(f64),

    #[error("search vector has {actual} components but the layout has {expected}")]
    Dimension { expected: usize, actual: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Valid(f64),
    Failed(EvaluationFailure),
}

impl Evaluation {
    /// Wrap a raw score, flagging NaN and infinities.
    pub fn from_score(score: f64) -> Self {
        if score.is_finite() {
            Evaluation::Valid(score)
        } else {
            Evaluation::Failed(EvaluationFailure::NonFinite(score))
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Evaluation::Valid(_))
    }

    pub fn score_or(&self, penalty: f64) -> f64 {
        match self {
            Evaluation::Valid(score) => *score,
            Evaluation::Failed(_) => penalty,
        }
    }

    pub fn failure(&self) -> Option<&EvaluationFailure> {
        match self {
            Evaluation::Valid(_) => None,
            Evaluation::Failed(reason) => Some(reason),
        }
    }
}

fn magnitude_sum(spectrum: &SpectrumMap, orders: &[i32]) -> f64 {
    orders.iter().map(|&o| spectrum.magnitude(o)).sum()
}

/// Score a combined spectrum under `config`.
pub fn score(spectrum: &SpectrumMap, config: &ObjectiveConfig) -> Evaluation {
    let raw = match config.mode {
        ObjectiveMode::SuppressionRatio => suppression_ratio(spectrum, config),
        ObjectiveMode::MinEqualized => min_equalized(spectrum, config),
        ObjectiveMode::WeightedContrast => {
            -config.target_weight * magnitude_sum(spectrum, &config.target_orders)
                + config.suppress_weight * magnitude_sum(spectrum, &config.suppress_orders)
        }
    };
    Evaluation::from_score(raw)
}

fn suppression_ratio(spectrum: &SpectrumMap, config: &ObjectiveConfig) -> f64 {
    let unwanted = magnitude_sum(spectrum, &config.suppress_orders);
    let wanted = magnitude_sum(spectrum, &config.target_orders);
    unwanted / (wanted + config.epsilon)
}

fn min_equalized(spectrum: &SpectrumMap, config: &ObjectiveConfig) -> f64 {
    let targets: Vec<f64> = config
        .target_orders
        .iter()
        .map(|&o| spectrum.magnitude(o))
        .collect();
    let weakest = targets.iter().copied().fold(f64::INFINITY, f64::min);
    let weakest = if weakest.is_finite() { weakest } else { 0.0 };

    let leakage: f64 = spectrum
        .orders()
        .filter(|order| !config.target_orders.contains(order))
        .map(|order| spectrum.magnitude(order))
        .sum();

    let mut imbalance = 0.0;
    for (i, a) in targets.iter().enumerate() {
        for b in &targets[i + 1..] {
            imbalance += ((a - b).abs() - config.mismatch_tolerance).max(0.0);
        }
    }

    -weakest + config.leakage_weight * leakage + config.mismatch_weight * imbalance
}

/// Search objective over a [`ParameterLayout`]: vector → spectrum → score.
pub struct SpectralObjective<'a> {
    analyzer: &'a MzmAnalyzer,
    layout: &'a ParameterLayout,
    config: &'a ObjectiveConfig,
    failures: AtomicUsize,
}

impl<'a> SpectralObjective<'a> {
    pub fn new(
        analyzer: &'a MzmAnalyzer,
        layout: &'a ParameterLayout,
        config: &'a ObjectiveConfig,
    ) -> Self {
        Self {
            analyzer,
            layout,
            config,
            failures: AtomicUsize::new(0),
        }
    }

    /// Number of evaluations that fell back to the penalty so far.
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn layout(&self) -> &ParameterLayout {
        self.layout
    }

    /// Search bounds matching the layout's vector, in layout order.
    pub fn bounds(&self) -> Vec<Bounds> {
        self.layout.bounds()
    }
}

impl Objective for SpectralObjective<'_> {
    fn evaluate(&self, x: &[f64]) -> Evaluation {
        let evaluation = if x.len() != self.layout.dimension() {
            Evaluation::Failed(EvaluationFailure::Dimension {
                expected: self.layout.dimension(),
                actual: x.len(),
            })
        } else {
            match self.analyzer.analyze(&self.layout.apply(x)) {
                Ok(spectra) => score(&spectra.combined, self.config),
                Err(err) => Evaluation::Failed(EvaluationFailure::Domain(err)),
            }
        };
        if let Evaluation::Failed(reason) = &evaluation {
            let count = self.failures.fetch_add(1, Ordering::Relaxed) + 1;
            if count == 1 {
                log::warn!("objective evaluation failed, substituting penalty: {reason}");
            } else {
                log::debug!("objective evaluation failed (#{count}): {reason}");
            }
        }
        evaluation
    }

    fn failure_penalty(&self) -> f64 {
        self.config.failure_penalty
    }
}
