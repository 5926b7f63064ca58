//! Triple Bessel expansion of one phase-modulated arm.
//!
//! An arm driven by `Σ_t β_t sin(t·Ωτ + φ_t)` for `t = 1, 2, 3` decomposes as
//!
//! ```text
//! exp(i Σ β_t sin(tΩτ + φ_t)) = Σ_{n1,n2,n3} J_n1(β1) J_n2(β2) J_n3(β3)
//!                                  · exp(i(n1φ1 + n2φ2 + n3φ3))
//!                                  · exp(i(n1 + 2n2 + 3n3)Ωτ)
//! ```
//!
//! so every index triple feeds sideband order `n1 + 2n2 + 3n3`. Triples
//! landing on the same order interfere coherently.

use num_complex::Complex64;

use crate::{
    bessel::BesselRow,
    params::{ModulationParameters, SpectrumError, TONES},
    spectrum::{SpectrumMap, DEFAULT_HALF_WIDTH, DEFAULT_PRUNE_THRESHOLD},
};

/// Default bound `M` on each summation index.
pub const DEFAULT_TRUNCATION: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BesselExpander {
    truncation: usize,
    half_width: usize,
    prune_threshold: f64,
}

impl Default for BesselExpander {
    fn default() -> Self {
        Self {
            truncation: DEFAULT_TRUNCATION,
            half_width: DEFAULT_HALF_WIDTH,
            prune_threshold: DEFAULT_PRUNE_THRESHOLD,
        }
    }
}

impl BesselExpander {
    pub fn new(
        truncation: usize,
        half_width: usize,
        prune_threshold: f64,
    ) -> Result<Self, SpectrumError> {
        if truncation == 0 {
            return Err(SpectrumError::InvalidTruncation);
        }
        if half_width == 0 {
            return Err(SpectrumError::InvalidWindow);
        }
        if !prune_threshold.is_finite() || prune_threshold < 0.0 {
            return Err(SpectrumError::InvalidThreshold(prune_threshold));
        }
        Ok(Self {
            truncation,
            half_width,
            prune_threshold,
        })
    }

    pub fn truncation(&self) -> usize {
        self.truncation
    }

    pub fn half_width(&self) -> usize {
        self.half_width
    }

    pub fn prune_threshold(&self) -> f64 {
        self.prune_threshold
    }

    /// Highest order any index triple can reach: `M + 2M + 3M`.
    pub fn reach(&self) -> usize {
        6 * self.truncation
    }

    /// Whether some triples fall outside the reporting window and are dropped.
    pub fn truncates_at_window(&self) -> bool {
        self.reach() > self.half_width
    }

    /// Expand one arm into its windowed sideband spectrum.
    pub fn expand(&self, params: &ModulationParameters) -> Result<SpectrumMap, SpectrumError> {
        params.validate()?;

        let m = self.truncation as i32;
        let w = self.half_width as i32;
        let rows: [BesselRow; TONES] =
            std::array::from_fn(|tone| BesselRow::new(self.truncation, params.depths[tone]));
        let [phi1, phi2, phi3] = params.phases;

        let mut spectrum = SpectrumMap::zeros(self.half_width, self.prune_threshold);
        for n1 in -m..=m {
            let j1 = rows[0].get(n1);
            for n2 in -m..=m {
                let j12 = j1 * rows[1].get(n2);
                for n3 in -m..=m {
                    let order = n1 + 2 * n2 + 3 * n3;
                    if order < -w || order > w {
                        continue;
                    }
                    let amplitude = j12 * rows[2].get(n3);
                    if amplitude.abs() <= self.prune_threshold {
                        continue;
                    }
                    let phase = n1 as f64 * phi1 + n2 as f64 * phi2 + n3 as f64 * phi3;
                    spectrum.accumulate(order, Complex64::from_polar(amplitude, phase));
                }
            }
        }
        Ok(spectrum)
    }
}
