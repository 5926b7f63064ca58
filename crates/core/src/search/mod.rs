//! Bounded parameter search over an arbitrary-length real vector.
//!
//! The search layer knows nothing about modulators: it minimises an
//! [`Objective`] over a box given by one [`Bounds`] per dimension.
//!
//! - [`local::refine`]: projected BFGS with finite-difference gradients,
//!   deterministic for a given start point.
//! - [`global::search`]: seeded differential evolution with optional polish.
//! - [`multi_start`]: independent local refinements from many start points.

pub mod global;
pub mod local;

use serde::{Deserialize, Serialize};

use crate::objective::Evaluation;

pub use global::{GlobalOptions, GlobalResult, Strategy};
pub use local::{LocalOptions, LocalResult, LocalStatus};

/// Score handed to optimisers when an evaluation fails.
pub const DEFAULT_FAILURE_PENALTY: f64 = 1e6;

/// Inclusive box constraint for one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub lo: f64,
    pub hi: f64,
}

impl Bounds {
    pub fn new(lo: f64, hi: f64) -> Self {
        Self { lo, hi }
    }

    #[inline]
    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.lo).min(self.hi)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lo && value <= self.hi
    }

    pub fn span(&self) -> f64 {
        self.hi - self.lo
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SearchError {
    #[error("search requires at least one dimension")]
    EmptyBounds,

    #[error("bounds for dimension {index} are invalid: [{lo}, {hi}]")]
    InvalidBounds { index: usize, lo: f64, hi: f64 },

    #[error("vector has {actual} components but {expected} bounds were given")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("population size {0} is below the minimum of 4")]
    PopulationTooSmall(usize),

    #[error("thread pool setup failed: {0}")]
    ThreadPool(String),
}

/// Check that every bound is finite with `lo <= hi`.
pub fn validate_bounds(bounds: &[Bounds]) -> Result<(), SearchError> {
    if bounds.is_empty() {
        return Err(SearchError::EmptyBounds);
    }
    for (index, b) in bounds.iter().enumerate() {
        if !b.lo.is_finite() || !b.hi.is_finite() || b.lo > b.hi {
            return Err(SearchError::InvalidBounds {
                index,
                lo: b.lo,
                hi: b.hi,
            });
        }
    }
    Ok(())
}

pub(crate) fn check_dimension(bounds: &[Bounds], x: &[f64]) -> Result<(), SearchError> {
    if bounds.len() != x.len() {
        return Err(SearchError::DimensionMismatch {
            expected: bounds.len(),
            actual: x.len(),
        });
    }
    Ok(())
}

pub(crate) fn clamp_into(bounds: &[Bounds], x: &mut [f64]) {
    for (value, b) in x.iter_mut().zip(bounds) {
        *value = b.clamp(*value);
    }
}

/// A scalar function to minimise.
///
/// Implementations must be pure: the same vector always yields the same
/// evaluation, and no shared state is mutated, so populations can be scored
/// from several threads at once.
pub trait Objective: Sync {
    fn evaluate(&self, x: &[f64]) -> Evaluation;

    /// Finite score substituted for failed evaluations.
    fn failure_penalty(&self) -> f64 {
        DEFAULT_FAILURE_PENALTY
    }

    /// Evaluation collapsed to a finite score.
    fn score(&self, x: &[f64]) -> f64 {
        self.evaluate(x).score_or(self.failure_penalty())
    }
}

impl<F> Objective for F
where
    F: Fn(&[f64]) -> f64 + Sync,
{
    fn evaluate(&self, x: &[f64]) -> Evaluation {
        Evaluation::from_score(self(x))
    }
}

/// Outcome of one start of [`multi_start`].
#[derive(Debug, Clone)]
pub struct StartOutcome {
    pub start_index: usize,
    pub start: Vec<f64>,
    pub result: LocalResult,
}

/// Refine from every start point and return outcomes sorted by score.
///
/// Starts are independent, so with the `parallel` feature they run on the
/// current rayon pool. Ordering among equal scores follows start index.
pub fn multi_start<O: Objective + ?Sized>(
    starts: &[Vec<f64>],
    bounds: &[Bounds],
    objective: &O,
    options: &LocalOptions,
) -> Result<Vec<StartOutcome>, SearchError> {
    validate_bounds(bounds)?;
    for start in starts {
        check_dimension(bounds, start)?;
    }

    let run_one = |(start_index, start): (usize, &Vec<f64>)| -> Result<StartOutcome, SearchError> {
        let result = local::refine(start, bounds, objective, options)?;
        Ok(StartOutcome {
            start_index,
            start: start.clone(),
            result,
        })
    };

    #[cfg(feature = "parallel")]
    let outcomes: Result<Vec<_>, _> = {
        use rayon::prelude::*;
        starts.par_iter().enumerate().map(run_one).collect()
    };
    #[cfg(not(feature = "parallel"))]
    let outcomes: Result<Vec<_>, _> = starts.iter().enumerate().map(run_one).collect();

    let mut outcomes = outcomes?;
    outcomes.sort_by(|a, b| {
        a.result
            .score
            .total_cmp(&b.result.score)
            .then(a.start_index.cmp(&b.start_index))
    });
    Ok(outcomes)
}
