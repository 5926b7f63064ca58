//! Scalar power metrics derived from a spectrum, in dB.

use serde::Serialize;

use crate::spectrum::SpectrumMap;

/// `10·log10(power + ε)`.
pub fn power_db(power: f64, epsilon: f64) -> f64 {
    10.0 * (power + epsilon).log10()
}

/// Combined power of the `±n` sideband pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SidebandPair {
    pub order: u32,
    pub power: f64,
    pub power_db: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpectrumSummary {
    pub carrier_power: f64,
    pub carrier_power_db: f64,
    /// Pairs `±1..=±W`.
    pub pairs: Vec<SidebandPair>,
    pub target_power: f64,
    pub target_power_db: f64,
    pub suppressed_power: f64,
    pub suppressed_power_db: f64,
    /// `target_power_db - suppressed_power_db`; larger is better.
    pub suppression_ratio_db: f64,
    pub total_power: f64,
}

impl SpectrumSummary {
    pub fn from_spectrum(
        spectrum: &SpectrumMap,
        target_orders: &[i32],
        suppress_orders: &[i32],
        epsilon: f64,
    ) -> Self {
        let group_power = |orders: &[i32]| -> f64 { orders.iter().map(|&o| spectrum.power(o)).sum() };

        let carrier_power = spectrum.power(0);
        let pairs = (1..=spectrum.half_width() as u32)
            .map(|n| {
                let power = spectrum.power(n as i32) + spectrum.power(-(n as i32));
                SidebandPair {
                    order: n,
                    power,
                    power_db: power_db(power, epsilon),
                }
            })
            .collect();
        let target_power = group_power(target_orders);
        let suppressed_power = group_power(suppress_orders);
        let target_power_db = power_db(target_power, epsilon);
        let suppressed_power_db = power_db(suppressed_power, epsilon);

        Self {
            carrier_power,
            carrier_power_db: power_db(carrier_power, epsilon),
            pairs,
            target_power,
            target_power_db,
            suppressed_power,
            suppressed_power_db,
            suppression_ratio_db: target_power_db - suppressed_power_db,
            total_power: spectrum.total_power(),
        }
    }
}
