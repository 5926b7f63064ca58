//! Bessel functions of the first kind for integer order.
//!
//! All orders `J_0..J_N` at one argument are produced in a single pass with
//! Miller's backward recurrence
//!
//! ```text
//! J_{k-1}(x) = (2k / x) J_k(x) - J_{k+1}(x)
//! ```
//!
//! started well above `max(N, x)` and normalised with the identity
//! `J_0(x) + 2 Σ_{k≥1} J_{2k}(x) = 1`. Negative orders and negative arguments
//! follow from `J_{-n}(x) = (-1)^n J_n(x)` and `J_n(-x) = (-1)^n J_n(x)`.
//!
//! The recurrence length grows with `x`, so arguments far above the requested
//! orders switch to Hankel's asymptotic form for `J_0` and `J_1` followed by
//! the (stable for `n < x`) upward recurrence.

use std::f64::consts::{FRAC_PI_4, PI};

/// Values beyond this magnitude trigger a rescale of the running recurrence.
const RESCALE_LIMIT: f64 = 1e250;
const RESCALE_FACTOR: f64 = 1e-250;

/// Arguments above this (and above `10 N²`) use the asymptotic branch.
const ASYMPTOTIC_ARGUMENT: f64 = 1e4;

/// Evaluate `J_n(x)` for any integer order and real argument.
pub fn bessel_j(n: i32, x: f64) -> f64 {
    let order = n.unsigned_abs() as usize;
    let row = bessel_j_orders(order, x.abs());
    let mut value = row[order];
    if n < 0 && order % 2 == 1 {
        value = -value;
    }
    if x < 0.0 && order % 2 == 1 {
        value = -value;
    }
    value
}

/// Evaluate `J_0(x)..=J_max_order(x)` for a non-negative argument.
///
/// Negative arguments are folded through the parity identity, so callers may
/// pass any finite `x`. `J_n(0)` is exactly `1` for `n = 0` and `0` otherwise.
pub fn bessel_j_orders(max_order: usize, x: f64) -> Vec<f64> {
    let mut out = vec![0.0; max_order + 1];
    if x == 0.0 {
        out[0] = 1.0;
        return out;
    }
    let ax = x.abs();
    if !ax.is_finite() {
        return out;
    }
    let order_sq = max_order as f64 * max_order as f64;
    if ax > ASYMPTOTIC_ARGUMENT.max(10.0 * order_sq) {
        asymptotic_orders(&mut out, ax);
    } else {
        miller_orders(&mut out, ax);
    }
    if x < 0.0 {
        for (order, value) in out.iter_mut().enumerate() {
            if order % 2 == 1 {
                *value = -*value;
            }
        }
    }
    out
}

/// Fill `out` with `J_0(x)..` by normalised backward recurrence.
fn miller_orders(out: &mut [f64], ax: f64) {
    let max_order = out.len() - 1;

    // Start index must be even and far enough above both the requested order
    // and the argument for the downward recurrence to settle.
    let top = max_order.max(ax.ceil() as usize);
    let mut start = top
        .saturating_add((40.0 * top as f64).sqrt() as usize)
        .saturating_add(16);
    if start % 2 == 1 {
        start -= 1;
    }

    let two_over_x = 2.0 / ax;
    let mut j_above = 0.0; // J_{k+1}
    let mut j_here = 1e-30; // J_k at k = start
    let mut norm = 2.0 * j_here;
    for k in (1..=start).rev() {
        let j_below = k as f64 * two_over_x * j_here - j_above;
        j_above = j_here;
        j_here = j_below;
        let idx = k - 1;
        if idx <= max_order {
            out[idx] = j_here;
        }
        if idx > 0 && idx % 2 == 0 {
            norm += 2.0 * j_here;
        }
        if j_here.abs() > RESCALE_LIMIT {
            j_here *= RESCALE_FACTOR;
            j_above *= RESCALE_FACTOR;
            norm *= RESCALE_FACTOR;
            for value in out.iter_mut() {
                *value *= RESCALE_FACTOR;
            }
        }
    }
    norm += j_here;

    for value in out.iter_mut() {
        *value /= norm;
    }
}

/// Fill `out` from Hankel's expansion of `J_0`, `J_1` and upward recurrence.
fn asymptotic_orders(out: &mut [f64], ax: f64) {
    out[0] = hankel(0, ax);
    if out.len() == 1 {
        return;
    }
    out[1] = hankel(1, ax);
    for k in 1..out.len() - 1 {
        out[k + 1] = 2.0 * k as f64 / ax * out[k] - out[k - 1];
    }
}

/// `J_n(x)` for large `x` with the first two correction terms of `P` and `Q`.
fn hankel(n: u32, x: f64) -> f64 {
    let mu = 4.0 * f64::from(n * n);
    let z = 8.0 * x;
    let p = 1.0 - (mu - 1.0) * (mu - 9.0) / (2.0 * z * z);
    let q = (mu - 1.0) / z - (mu - 1.0) * (mu - 9.0) * (mu - 25.0) / (6.0 * z * z * z);
    let chi = x - f64::from(n) * PI / 2.0 - FRAC_PI_4;
    (2.0 / (PI * x)).sqrt() * (p * chi.cos() - q * chi.sin())
}

/// `J_n(β)` tabulated for `n ∈ [-M, M]` at one modulation depth.
#[derive(Debug, Clone)]
pub struct BesselRow {
    max_order: usize,
    values: Vec<f64>,
}

impl BesselRow {
    pub fn new(max_order: usize, x: f64) -> Self {
        let positive = bessel_j_orders(max_order, x);
        let mut values = Vec::with_capacity(2 * max_order + 1);
        for order in (1..=max_order).rev() {
            let value = positive[order];
            values.push(if order % 2 == 1 { -value } else { value });
        }
        values.extend_from_slice(&positive);
        Self { max_order, values }
    }

    pub fn max_order(&self) -> usize {
        self.max_order
    }

    /// `J_n(β)`; `n` must lie in `[-M, M]`.
    #[inline]
    pub fn get(&self, n: i32) -> f64 {
        self.values[(n + self.max_order as i32) as usize]
    }

    /// Values ordered from `n = -M` to `n = M`.
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}
