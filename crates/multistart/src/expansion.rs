//! Start-point expansion from the configured grid.
//!
//! Every combination of axis values becomes one [`ExpandedStart`]. Free
//! parameters without an axis take their base value, and every component is
//! clamped into the parameter's bounds.

use trimod_core::params::{FreeParameter, ParameterSlot};

use crate::config::MultiStartConfig;

// ============================================================================
// Expanded Start
// ============================================================================

#[derive(Debug, Clone)]
pub struct ExpandedStart {
    /// Unique start index (0-based, grid order).
    pub index: usize,

    /// Starting vector in layout order.
    pub x: Vec<f64>,
}

impl ExpandedStart {
    /// `(column name, value)` pairs naming each start component.
    pub fn to_columns(&self, free: &[FreeParameter]) -> Vec<(String, String)> {
        free.iter()
            .zip(&self.x)
            .map(|(param, value)| (format!("start_{}", param.slot), format!("{value:.6}")))
            .collect()
    }
}

// ============================================================================
// Expansion Logic
// ============================================================================

/// Expand the start grid of `config` into concrete starting vectors.
///
/// The last axis varies fastest. A grid with no axes yields the single base
/// start.
pub fn expand_starts(config: &MultiStartConfig) -> Vec<ExpandedStart> {
    let layout = config.design.layout();
    let base = layout.initial_point();
    let free = layout.free();

    let axes: Vec<(usize, Vec<f64>)> = config
        .starts
        .axes
        .iter()
        .filter_map(|axis| {
            slot_position(free, axis.slot).map(|position| (position, axis.values()))
        })
        .collect();

    let total: usize = axes.iter().map(|(_, values)| values.len()).product();
    let mut starts = Vec::with_capacity(total);
    if total == 0 {
        return starts;
    }

    let mut odometer = vec![0usize; axes.len()];
    for index in 0..total {
        let mut x = base.clone();
        for ((position, values), &digit) in axes.iter().zip(&odometer) {
            x[*position] = free[*position].bounds.clamp(values[digit]);
        }
        starts.push(ExpandedStart { index, x });

        for (digit, (_, values)) in odometer.iter_mut().zip(&axes).rev() {
            *digit += 1;
            if *digit < values.len() {
                break;
            }
            *digit = 0;
        }
    }
    starts
}

fn slot_position(free: &[FreeParameter], slot: ParameterSlot) -> Option<usize> {
    free.iter().position(|param| param.slot == slot)
}

// ============================================================================
// Tests
// ============================================================================
