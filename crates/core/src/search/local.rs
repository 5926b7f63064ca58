//! Bounded quasi-Newton refinement.
//!
//! Projected BFGS: the inverse-Hessian estimate is built from finite-difference
//! gradients, variables pinned at a bound with the gradient pushing outward are
//! frozen for the step, and trial points are projected back into the box
//! before the Armijo test.

use serde::{Deserialize, Serialize};

use super::{check_dimension, clamp_into, validate_bounds, Bounds, Objective, SearchError};

const ARMIJO_C1: f64 = 1e-4;
const MAX_BACKTRACKS: usize = 40;
const CURVATURE_FLOOR: f64 = 1e-12;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalOptions {
    pub max_iter: usize,
    /// Stop when the projected gradient's largest component falls below this.
    pub gtol: f64,
    /// Stop when the relative score change of an accepted step falls below this.
    pub ftol: f64,
    /// Stop when the largest component of an accepted step falls below this.
    pub xtol: f64,
    /// Relative finite-difference step.
    pub fd_step: f64,
}

impl Default for LocalOptions {
    fn default() -> Self {
        Self {
            max_iter: 200,
            gtol: 1e-6,
            ftol: 1e-12,
            xtol: 1e-10,
            fd_step: 1e-7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalStatus {
    GradientTolerance,
    StepTolerance,
    FunctionTolerance,
    MaxIterations,
    LineSearchFailed,
}

impl LocalStatus {
    pub fn converged(self) -> bool {
        matches!(
            self,
            LocalStatus::GradientTolerance
                | LocalStatus::StepTolerance
                | LocalStatus::FunctionTolerance
        )
    }
}

impl std::fmt::Display for LocalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            LocalStatus::GradientTolerance => "projected gradient below tolerance",
            LocalStatus::StepTolerance => "step below tolerance",
            LocalStatus::FunctionTolerance => "score change below tolerance",
            LocalStatus::MaxIterations => "iteration limit reached",
            LocalStatus::LineSearchFailed => "line search found no descent",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalResult {
    pub x: Vec<f64>,
    pub score: f64,
    pub converged: bool,
    pub status: LocalStatus,
    pub iterations: usize,
    pub evaluations: usize,
}

struct Counted<'a, O: ?Sized> {
    objective: &'a O,
    evaluations: usize,
}

impl<O: Objective + ?Sized> Counted<'_, O> {
    fn score(&mut self, x: &[f64]) -> f64 {
        self.evaluations += 1;
        self.objective.score(x)
    }

    /// Central differences, one-sided where a bound leaves no room.
    fn gradient(&mut self, x: &[f64], fx: f64, bounds: &[Bounds], rel_step: f64) -> Vec<f64> {
        let mut grad = vec![0.0; x.len()];
        let mut shifted = x.to_vec();
        for i in 0..x.len() {
            let b = bounds[i];
            let h = rel_step * x[i].abs().max(1.0);
            if b.span() <= 0.0 {
                continue;
            }
            let up = (x[i] + h).min(b.hi);
            let down = (x[i] - h).max(b.lo);
            grad[i] = if up > x[i] && down < x[i] {
                shifted[i] = up;
                let f_up = self.score(&shifted);
                shifted[i] = down;
                let f_down = self.score(&shifted);
                (f_up - f_down) / (up - down)
            } else if up > x[i] {
                shifted[i] = up;
                (self.score(&shifted) - fx) / (up - x[i])
            } else {
                shifted[i] = down;
                (fx - self.score(&shifted)) / (x[i] - down)
            };
            shifted[i] = x[i];
        }
        grad
    }
}

/// Gradient with components zeroed where the bound blocks a descent move.
fn project_gradient(x: &[f64], grad: &[f64], bounds: &[Bounds]) -> Vec<f64> {
    x.iter()
        .zip(grad)
        .zip(bounds)
        .map(|((&xi, &gi), b)| {
            let pinned_low = xi <= b.lo && gi > 0.0;
            let pinned_high = xi >= b.hi && gi < 0.0;
            if pinned_low || pinned_high || b.span() <= 0.0 {
                0.0
            } else {
                gi
            }
        })
        .collect()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn max_abs(v: &[f64]) -> f64 {
    v.iter().fold(0.0_f64, |acc, x| acc.max(x.abs()))
}

fn identity(n: usize) -> Vec<f64> {
    let mut m = vec![0.0; n * n];
    for i in 0..n {
        m[i * n + i] = 1.0;
    }
    m
}

/// `H ← (I - ρ s yᵀ) H (I - ρ y sᵀ) + ρ s sᵀ` on a row-major `n×n` matrix.
fn bfgs_update(h: &mut [f64], s: &[f64], y: &[f64], rho: f64) {
    let n = s.len();
    let hy: Vec<f64> = (0..n).map(|i| dot(&h[i * n..(i + 1) * n], y)).collect();
    let yhy = dot(y, &hy);
    for i in 0..n {
        for j in 0..n {
            h[i * n + j] += -rho * (hy[i] * s[j] + s[i] * hy[j])
                + (rho * rho * yhy + rho) * s[i] * s[j];
        }
    }
}

/// Minimise `objective` inside `bounds` starting from `initial`.
///
/// The start point is clamped into the box first. Every trial point is
/// projected, so the returned vector always satisfies the bounds.
pub fn refine<O: Objective + ?Sized>(
    initial: &[f64],
    bounds: &[Bounds],
    objective: &O,
    options: &LocalOptions,
) -> Result<LocalResult, SearchError> {
    validate_bounds(bounds)?;
    check_dimension(bounds, initial)?;

    let n = initial.len();
    let mut eval = Counted {
        objective,
        evaluations: 0,
    };
    let mut x = initial.to_vec();
    clamp_into(bounds, &mut x);
    let mut fx = eval.score(&x);
    let mut grad = eval.gradient(&x, fx, bounds, options.fd_step);
    let mut h = identity(n);
    let mut fresh_hessian = true;

    let mut status = LocalStatus::MaxIterations;
    let mut iterations = 0;
    while iterations < options.max_iter {
        let pg = project_gradient(&x, &grad, bounds);
        if max_abs(&pg) < options.gtol {
            status = LocalStatus::GradientTolerance;
            break;
        }
        iterations += 1;

        let mut direction: Vec<f64> = (0..n)
            .map(|i| {
                if pg[i] == 0.0 {
                    0.0
                } else {
                    -dot(&h[i * n..(i + 1) * n], &pg)
                }
            })
            .collect();
        if dot(&direction, &pg) >= 0.0 {
            h = identity(n);
            fresh_hessian = true;
            direction = pg.iter().map(|g| -g).collect();
        }

        // First trial step never leaves the box by more than one full span.
        let mut alpha = 1.0;
        for (d, b) in direction.iter().zip(bounds) {
            if d.abs() * alpha > b.span() && b.span() > 0.0 {
                alpha = b.span() / d.abs();
            }
        }

        let mut accepted = None;
        for _ in 0..MAX_BACKTRACKS {
            let mut trial: Vec<f64> = x.iter().zip(&direction).map(|(xi, di)| xi + alpha * di).collect();
            clamp_into(bounds, &mut trial);
            let step: Vec<f64> = trial.iter().zip(&x).map(|(t, xi)| t - xi).collect();
            let f_trial = eval.score(&trial);
            if f_trial <= fx + ARMIJO_C1 * dot(&pg, &step) && f_trial <= fx {
                accepted = Some((trial, step, f_trial));
                break;
            }
            alpha *= 0.5;
        }

        let Some((x_new, step, f_new)) = accepted else {
            if fresh_hessian {
                status = LocalStatus::LineSearchFailed;
                break;
            }
            h = identity(n);
            fresh_hessian = true;
            continue;
        };

        let g_new = eval.gradient(&x_new, f_new, bounds, options.fd_step);
        let f_change = (fx - f_new).abs();
        let scale = fx.abs().max(f_new.abs()).max(1.0);
        let step_size = max_abs(&step);

        let y: Vec<f64> = g_new.iter().zip(&grad).map(|(a, b)| a - b).collect();
        let sy = dot(&step, &y);
        x = x_new;
        fx = f_new;
        grad = g_new;

        if step_size < options.xtol {
            status = LocalStatus::StepTolerance;
            break;
        }
        if f_change <= options.ftol * scale {
            status = LocalStatus::FunctionTolerance;
            break;
        }
        if sy > CURVATURE_FLOOR {
            bfgs_update(&mut h, &step, &y, 1.0 / sy);
            fresh_hessian = false;
        }
    }

    Ok(LocalResult {
        converged: status.converged(),
        x,
        score: fx,
        status,
        iterations,
        evaluations: eval.evaluations,
    })
}
