//! Modulation parameters for the two MZM arms and the mapping between flat
//! search vectors and physical quantities.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::search::Bounds;

/// Number of drive tones per arm (fundamental, second and third harmonic).
pub const TONES: usize = 3;

/// Largest modulation depth accepted for any tone.
///
/// Practical drives stay near `β ≲ 2`; the limit only keeps the Bessel
/// recurrence length bounded.
pub const MAX_DEPTH: f64 = 100.0;

/// Errors raised before a spectrum is expanded.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpectrumError {
    #[error("modulation depth {value} for tone {tone} is negative")]
    NegativeDepth { tone: usize, value: f64 },

    #[error("modulation depth {value} for tone {tone} exceeds the limit of {}", MAX_DEPTH)]
    DepthOutOfRange { tone: usize, value: f64 },

    #[error("{quantity} for tone {tone} is not finite ({value})")]
    NonFinite {
        quantity: &'static str,
        tone: usize,
        value: f64,
    },

    #[error("differential phase is not finite ({0})")]
    NonFiniteDifferentialPhase(f64),

    #[error("truncation order must be positive")]
    InvalidTruncation,

    #[error("reporting window half-width must be positive")]
    InvalidWindow,

    #[error("prune threshold must be finite and non-negative (got {0})")]
    InvalidThreshold(f64),
}

/// Drive settings of one modulator arm: three depths `β` and three phases `φ`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModulationParameters {
    pub depths: [f64; TONES],
    #[serde(default)]
    pub phases: [f64; TONES],
}

impl ModulationParameters {
    pub fn new(depths: [f64; TONES], phases: [f64; TONES]) -> Self {
        Self { depths, phases }
    }

    /// An undriven arm: all depths and phases zero.
    pub fn idle() -> Self {
        Self::new([0.0; TONES], [0.0; TONES])
    }

    /// Reject depths the Bessel expansion is not defined for in this model.
    pub fn validate(&self) -> Result<(), SpectrumError> {
        for (tone, (&depth, &phase)) in self.depths.iter().zip(&self.phases).enumerate() {
            if !depth.is_finite() {
                return Err(SpectrumError::NonFinite {
                    quantity: "depth",
                    tone,
                    value: depth,
                });
            }
            if depth < 0.0 {
                return Err(SpectrumError::NegativeDepth { tone, value: depth });
            }
            if depth > MAX_DEPTH {
                return Err(SpectrumError::DepthOutOfRange { tone, value: depth });
            }
            if !phase.is_finite() {
                return Err(SpectrumError::NonFinite {
                    quantity: "phase",
                    tone,
                    value: phase,
                });
            }
        }
        Ok(())
    }

    /// Exact bit pattern of all six values, used as a memoisation key.
    pub fn cache_key(&self) -> [u64; 2 * TONES] {
        let mut key = [0u64; 2 * TONES];
        for tone in 0..TONES {
            key[tone] = self.depths[tone].to_bits();
            key[TONES + tone] = self.phases[tone].to_bits();
        }
        key
    }
}

/// Complete parameter set of the dual-arm modulator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MzmParameters {
    pub upper: ModulationParameters,
    pub lower: ModulationParameters,
    /// Differential phase `Δφ` applied to the lower arm before combination.
    #[serde(default)]
    pub delta_phi: f64,
}

impl MzmParameters {
    pub fn validate(&self) -> Result<(), SpectrumError> {
        self.upper.validate()?;
        self.lower.validate()?;
        if !self.delta_phi.is_finite() {
            return Err(SpectrumError::NonFiniteDifferentialPhase(self.delta_phi));
        }
        Ok(())
    }

    pub fn get(&self, slot: ParameterSlot) -> f64 {
        match slot {
            ParameterSlot::UpperDepth(t) => self.upper.depths[t],
            ParameterSlot::UpperPhase(t) => self.upper.phases[t],
            ParameterSlot::LowerDepth(t) => self.lower.depths[t],
            ParameterSlot::LowerPhase(t) => self.lower.phases[t],
            ParameterSlot::DifferentialPhase => self.delta_phi,
        }
    }

    pub fn set(&mut self, slot: ParameterSlot, value: f64) {
        match slot {
            ParameterSlot::UpperDepth(t) => self.upper.depths[t] = value,
            ParameterSlot::UpperPhase(t) => self.upper.phases[t] = value,
            ParameterSlot::LowerDepth(t) => self.lower.depths[t] = value,
            ParameterSlot::LowerPhase(t) => self.lower.phases[t] = value,
            ParameterSlot::DifferentialPhase => self.delta_phi = value,
        }
    }
}

/// One physical quantity of the modulator that a search may vary.
///
/// Tone indices are 0-based (0 = fundamental).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "tone")]
pub enum ParameterSlot {
    UpperDepth(usize),
    UpperPhase(usize),
    LowerDepth(usize),
    LowerPhase(usize),
    DifferentialPhase,
}

impl ParameterSlot {
    pub fn tone(&self) -> Option<usize> {
        match *self {
            ParameterSlot::UpperDepth(t)
            | ParameterSlot::UpperPhase(t)
            | ParameterSlot::LowerDepth(t)
            | ParameterSlot::LowerPhase(t) => Some(t),
            ParameterSlot::DifferentialPhase => None,
        }
    }

    pub fn is_depth(&self) -> bool {
        matches!(
            self,
            ParameterSlot::UpperDepth(_) | ParameterSlot::LowerDepth(_)
        )
    }

    /// Conventional search range: depths in `[0, 2]`, phases in `[0, 2π]`.
    pub fn default_bounds(&self) -> Bounds {
        if self.is_depth() {
            Bounds::new(0.0, 2.0)
        } else {
            Bounds::new(0.0, TAU)
        }
    }
}

impl std::fmt::Display for ParameterSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterSlot::UpperDepth(t) => write!(f, "upper_beta{}", t + 1),
            ParameterSlot::UpperPhase(t) => write!(f, "upper_phi{}", t + 1),
            ParameterSlot::LowerDepth(t) => write!(f, "lower_beta{}", t + 1),
            ParameterSlot::LowerPhase(t) => write!(f, "lower_phi{}", t + 1),
            ParameterSlot::DifferentialPhase => write!(f, "delta_phi"),
        }
    }
}

/// A searched quantity together with its box constraint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FreeParameter {
    pub slot: ParameterSlot,
    pub bounds: Bounds,
}

/// Maps a flat search vector onto a full [`MzmParameters`].
///
/// Slots not listed in `free` keep the value from `base`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterLayout {
    base: MzmParameters,
    free: Vec<FreeParameter>,
}

impl ParameterLayout {
    pub fn new(base: MzmParameters, free: Vec<FreeParameter>) -> Self {
        Self { base, free }
    }

    pub fn dimension(&self) -> usize {
        self.free.len()
    }

    pub fn base(&self) -> &MzmParameters {
        &self.base
    }

    pub fn free(&self) -> &[FreeParameter] {
        &self.free
    }

    pub fn bounds(&self) -> Vec<Bounds> {
        self.free.iter().map(|p| p.bounds).collect()
    }

    /// Build the parameter set for a search vector of length `dimension()`.
    ///
    /// Extra components are ignored and missing ones keep their base value;
    /// [`SpectralObjective`](crate::objective::SpectralObjective) rejects
    /// mismatched vectors before calling this.
    pub fn apply(&self, x: &[f64]) -> MzmParameters {
        let mut params = self.base;
        for (param, &value) in self.free.iter().zip(x) {
            params.set(param.slot, value);
        }
        params
    }

    /// Read the free slots of `params` back into a search vector.
    pub fn extract(&self, params: &MzmParameters) -> Vec<f64> {
        self.free.iter().map(|p| params.get(p.slot)).collect()
    }

    /// The base values of the free slots, clamped into their bounds.
    pub fn initial_point(&self) -> Vec<f64> {
        self.free
            .iter()
            .map(|p| p.bounds.clamp(self.base.get(p.slot)))
            .collect()
    }
}
