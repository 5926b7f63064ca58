//! Coherent combination of the two interferometer arms.

use crate::spectrum::SpectrumMap;

/// Both arm spectra and their interference, as seen at the MZM output.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedSpectrum {
    pub upper: SpectrumMap,
    /// Lower arm after the uniform `exp(iΔφ)` rotation.
    pub lower_shifted: SpectrumMap,
    pub combined: SpectrumMap,
}

/// Rotate `lower` by `delta_phi` and add it to `upper` order by order.
///
/// The result spans the upper arm's reporting window. Orders missing from
/// either arm contribute exact zero; energy beyond the window is not carried.
pub fn combine(upper: SpectrumMap, lower: SpectrumMap, delta_phi: f64) -> CombinedSpectrum {
    let lower_shifted = lower.rotated(delta_phi);
    let combined = SpectrumMap::from_entries(
        upper.half_width(),
        upper.threshold(),
        upper
            .orders()
            .map(|order| (order, upper.amplitude(order) + lower_shifted.amplitude(order))),
    );
    CombinedSpectrum {
        upper,
        lower_shifted,
        combined,
    }
}
