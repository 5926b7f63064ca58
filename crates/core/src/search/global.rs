//! Differential evolution over a bounded box.
//!
//! The population is initialised by Latin hypercube sampling. Each generation
//! builds one trial vector per member (mutation + binomial crossover) from the
//! current population, scores all trials, then replaces members whose trial
//! scored no worse. Because trials are generated before any are scored, the
//! scoring step can run in parallel without changing the random stream.

use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{local, validate_bounds, Bounds, LocalOptions, Objective, SearchError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// `v = best + F (r1 - r2)`
    #[default]
    Best1Bin,
    /// `v = r0 + F (r1 - r2)`
    Rand1Bin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalOptions {
    /// Number of population members (at least 4).
    pub population_size: usize,
    pub max_generations: usize,
    pub seed: u64,
    pub strategy: Strategy,
    /// Differential weight range; a fresh `F` is drawn per generation.
    pub mutation: (f64, f64),
    /// Crossover probability.
    pub recombination: f64,
    /// Relative convergence tolerance on the spread of population scores.
    pub tol: f64,
    /// Absolute convergence tolerance on the spread of population scores.
    pub atol: f64,
    /// Refine the best member with the local optimiser afterwards.
    pub polish: bool,
    /// Score each generation on the rayon pool.
    pub parallel: bool,
}

impl Default for GlobalOptions {
    fn default() -> Self {
        Self {
            population_size: 30,
            max_generations: 300,
            seed: 0,
            strategy: Strategy::Best1Bin,
            mutation: (0.5, 1.0),
            recombination: 0.7,
            tol: 0.01,
            atol: 0.0,
            polish: true,
            parallel: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalResult {
    pub x: Vec<f64>,
    pub score: f64,
    /// Whether the population met the spread criterion; says nothing about
    /// whether the score is good enough for the caller.
    pub success: bool,
    pub generations: usize,
    pub evaluations: usize,
    /// Whether polishing improved on the best population member.
    pub polished: bool,
}

/// Per-generation progress handed to an observer.
#[derive(Debug, Clone, Copy)]
pub struct GenerationReport {
    pub generation: usize,
    pub best_score: f64,
    pub mean_score: f64,
    pub spread: f64,
    pub evaluations: usize,
}

/// Run differential evolution with a generator seeded from `options.seed`.
pub fn search<O: Objective + ?Sized>(
    bounds: &[Bounds],
    objective: &O,
    options: &GlobalOptions,
) -> Result<GlobalResult, SearchError> {
    let mut rng = StdRng::seed_from_u64(options.seed);
    search_with_rng(bounds, objective, options, &mut rng, |_| {})
}

/// Run differential evolution drawing from a caller-owned generator.
///
/// `observer` is called once per completed generation.
pub fn search_with_rng<O, R, F>(
    bounds: &[Bounds],
    objective: &O,
    options: &GlobalOptions,
    rng: &mut R,
    mut observer: F,
) -> Result<GlobalResult, SearchError>
where
    O: Objective + ?Sized,
    R: Rng + ?Sized,
    F: FnMut(&GenerationReport),
{
    validate_bounds(bounds)?;
    let pop_size = options.population_size;
    if pop_size < 4 {
        return Err(SearchError::PopulationTooSmall(pop_size));
    }
    let dim = bounds.len();

    let mut population = latin_hypercube(bounds, pop_size, rng);
    let mut energies = score_all(&population, objective, options.parallel);
    let mut evaluations = pop_size;

    let mut success = false;
    let mut generations = 0;
    while generations < options.max_generations {
        if converged(&energies, options) {
            success = true;
            break;
        }
        generations += 1;

        let best = argmin(&energies);
        let (f_lo, f_hi) = options.mutation;
        let weight = if f_hi > f_lo {
            rng.gen_range(f_lo..f_hi)
        } else {
            f_lo
        };

        let mut trials = Vec::with_capacity(pop_size);
        for target in 0..pop_size {
            let picks = pick_distinct(rng, pop_size, target, 3);
            let base = match options.strategy {
                Strategy::Best1Bin => &population[best],
                Strategy::Rand1Bin => &population[picks[2]],
            };
            let r1 = &population[picks[0]];
            let r2 = &population[picks[1]];

            let forced = rng.gen_range(0..dim);
            let mut trial = population[target].clone();
            for j in 0..dim {
                if j == forced || rng.gen::<f64>() < options.recombination {
                    let mut value = base[j] + weight * (r1[j] - r2[j]);
                    if !bounds[j].contains(value) {
                        value = bounds[j].lo + rng.gen::<f64>() * bounds[j].span();
                    }
                    trial[j] = value;
                }
            }
            trials.push(trial);
        }

        let trial_energies = score_all(&trials, objective, options.parallel);
        evaluations += pop_size;
        for (idx, (trial, energy)) in trials.into_iter().zip(trial_energies).enumerate() {
            if energy <= energies[idx] {
                population[idx] = trial;
                energies[idx] = energy;
            }
        }

        let (mean, spread) = mean_and_std(&energies);
        let report = GenerationReport {
            generation: generations,
            best_score: energies[argmin(&energies)],
            mean_score: mean,
            spread,
            evaluations,
        };
        log::debug!(
            "[de] gen={} best={:.6e} mean={:.6e} spread={:.3e}",
            report.generation,
            report.best_score,
            report.mean_score,
            report.spread
        );
        observer(&report);
    }
    if !success && converged(&energies, options) {
        success = true;
    }

    let best = argmin(&energies);
    let mut x = population[best].clone();
    let mut score = energies[best];
    let mut polished = false;
    if options.polish {
        let refined = local::refine(&x, bounds, objective, &LocalOptions::default())?;
        evaluations += refined.evaluations;
        if refined.score < score {
            x = refined.x;
            score = refined.score;
            polished = true;
        }
    }

    Ok(GlobalResult {
        x,
        score,
        success,
        generations,
        evaluations,
        polished,
    })
}

fn latin_hypercube<R: Rng + ?Sized>(bounds: &[Bounds], count: usize, rng: &mut R) -> Vec<Vec<f64>> {
    let mut population = vec![vec![0.0; bounds.len()]; count];
    let segment = 1.0 / count as f64;
    for (j, b) in bounds.iter().enumerate() {
        let mut strata: Vec<usize> = (0..count).collect();
        strata.shuffle(rng);
        for (member, stratum) in population.iter_mut().zip(strata) {
            let unit = (stratum as f64 + rng.gen::<f64>()) * segment;
            member[j] = b.clamp(b.lo + unit * b.span());
        }
    }
    population
}

fn score_all<O: Objective + ?Sized>(members: &[Vec<f64>], objective: &O, parallel: bool) -> Vec<f64> {
    #[cfg(feature = "parallel")]
    if parallel {
        use rayon::prelude::*;
        return members.par_iter().map(|x| objective.score(x)).collect();
    }
    #[cfg(not(feature = "parallel"))]
    let _ = parallel;
    members.iter().map(|x| objective.score(x)).collect()
}

/// `count` distinct indices in `0..size`, none equal to `exclude`.
fn pick_distinct<R: Rng + ?Sized>(rng: &mut R, size: usize, exclude: usize, count: usize) -> Vec<usize> {
    let mut picks = Vec::with_capacity(count);
    while picks.len() < count {
        let candidate = rng.gen_range(0..size);
        if candidate != exclude && !picks.contains(&candidate) {
            picks.push(candidate);
        }
    }
    picks
}

fn argmin(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

fn mean_and_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

fn converged(energies: &[f64], options: &GlobalOptions) -> bool {
    let (mean, spread) = mean_and_std(energies);
    spread <= options.atol + options.tol * mean.abs()
}
