#![cfg(test)]

use rand::{rngs::StdRng, SeedableRng};

use super::objective::Evaluation;
use super::search::{
    global, local, multi_start, validate_bounds, Bounds, GlobalOptions, LocalOptions, LocalStatus,
    Objective, SearchError, Strategy,
};

fn bowl(x: &[f64]) -> f64 {
    (x[0] - 0.3).powi(2) + 2.0 * (x[1] + 0.2).powi(2) + 0.5 * (x[0] - 0.3) * (x[1] + 0.2)
}

fn unit_box(dim: usize) -> Vec<Bounds> {
    vec![Bounds::new(-1.0, 1.0); dim]
}

// ============================================================================
// Local refinement
// ============================================================================

#[test]
fn local_finds_interior_minimum() {
    let result = local::refine(&[0.9, 0.9], &unit_box(2), &bowl, &LocalOptions::default())
        .expect("refine");
    assert!(result.converged, "status: {}", result.status);
    assert!((result.x[0] - 0.3).abs() < 1e-4, "x = {:?}", result.x);
    assert!((result.x[1] + 0.2).abs() < 1e-4, "x = {:?}", result.x);
    assert!(result.score < 1e-8);
    assert!(result.evaluations > result.iterations);
}

#[test]
fn local_stops_on_an_active_bound() {
    let target = |x: &[f64]| (x[0] - 2.0).powi(2);
    let result = local::refine(&[0.5], &[Bounds::new(0.0, 1.0)], &target, &LocalOptions::default())
        .expect("refine");
    assert_eq!(result.x, vec![1.0]);
    assert_eq!(result.status, LocalStatus::GradientTolerance);
}

#[test]
fn local_clamps_a_start_outside_the_box() {
    let result = local::refine(&[5.0, -5.0], &unit_box(2), &bowl, &LocalOptions::default())
        .expect("refine");
    assert!(result
        .x
        .iter()
        .all(|v| (-1.0..=1.0).contains(v)));
    assert!(result.score < 1e-8);
}

#[test]
fn local_is_deterministic() {
    let options = LocalOptions::default();
    let a = local::refine(&[-0.7, 0.4], &unit_box(2), &bowl, &options).expect("refine");
    let b = local::refine(&[-0.7, 0.4], &unit_box(2), &bowl, &options).expect("refine");
    assert_eq!(a.x, b.x);
    assert_eq!(a.score, b.score);
    assert_eq!(a.evaluations, b.evaluations);
}

#[test]
fn local_respects_iteration_limit() {
    let options = LocalOptions {
        max_iter: 1,
        ..LocalOptions::default()
    };
    let result = local::refine(&[0.9, 0.9], &unit_box(2), &bowl, &options).expect("refine");
    assert!(result.iterations <= 1);
    assert!(result.score <= bowl(&[0.9, 0.9]));
}

struct Cliff;

impl Objective for Cliff {
    fn evaluate(&self, x: &[f64]) -> Evaluation {
        if x[0] < 0.0 {
            Evaluation::from_score(f64::NAN)
        } else {
            Evaluation::Valid((x[0] - 0.5).powi(2))
        }
    }
}

#[test]
fn failed_evaluations_score_as_penalty() {
    assert_eq!(Cliff.score(&[-0.5]), 1e6);
    let result = local::refine(&[0.1], &[Bounds::new(-1.0, 1.0)], &Cliff, &LocalOptions::default())
        .expect("refine");
    assert!((result.x[0] - 0.5).abs() < 1e-4);
    assert!(result.score.is_finite());
}

#[test]
fn mismatched_start_is_rejected() {
    let err = local::refine(&[0.0], &unit_box(2), &bowl, &LocalOptions::default()).unwrap_err();
    assert_eq!(
        err,
        SearchError::DimensionMismatch {
            expected: 2,
            actual: 1
        }
    );
}

// ============================================================================
// Bounds
// ============================================================================

#[test]
fn bounds_validation() {
    assert_eq!(validate_bounds(&[]), Err(SearchError::EmptyBounds));
    assert!(matches!(
        validate_bounds(&[Bounds::new(0.0, 1.0), Bounds::new(2.0, 1.0)]),
        Err(SearchError::InvalidBounds { index: 1, .. })
    ));
    assert!(matches!(
        validate_bounds(&[Bounds::new(f64::NEG_INFINITY, 1.0)]),
        Err(SearchError::InvalidBounds { index: 0, .. })
    ));
    assert!(validate_bounds(&[Bounds::new(0.5, 0.5)]).is_ok());
    assert_eq!(Bounds::new(-1.0, 1.0).clamp(3.0), 1.0);
}

// ============================================================================
// Differential evolution
// ============================================================================

fn sphere(x: &[f64]) -> f64 {
    x.iter().map(|v| v * v).sum()
}

fn de_options(seed: u64) -> GlobalOptions {
    GlobalOptions {
        population_size: 20,
        max_generations: 150,
        seed,
        ..GlobalOptions::default()
    }
}

#[test]
fn global_search_finds_sphere_minimum() {
    let bounds = vec![Bounds::new(-5.0, 5.0); 2];
    let result = global::search(&bounds, &sphere, &de_options(7)).expect("search");
    assert!(result.score < 1e-8, "score = {}", result.score);
    assert!(result.x.iter().all(|v| (-5.0..=5.0).contains(v)));
}

#[test]
fn global_search_is_reproducible_for_a_seed() {
    let bounds = vec![Bounds::new(-2.0, 3.0), Bounds::new(0.0, 1.0), Bounds::new(-1.0, 1.0)];
    let a = global::search(&bounds, &sphere, &de_options(42)).expect("search");
    let b = global::search(&bounds, &sphere, &de_options(42)).expect("search");
    assert_eq!(a.x, b.x);
    assert_eq!(a.score, b.score);
    assert_eq!(a.generations, b.generations);
    assert_eq!(a.evaluations, b.evaluations);
}

#[test]
fn sequential_and_parallel_scoring_agree() {
    let bounds = vec![Bounds::new(-2.0, 2.0); 3];
    let parallel = global::search(&bounds, &sphere, &de_options(3)).expect("search");
    let sequential = global::search(
        &bounds,
        &sphere,
        &GlobalOptions {
            parallel: false,
            ..de_options(3)
        },
    )
    .expect("search");
    assert_eq!(parallel.x, sequential.x);
}

#[test]
fn rand_strategy_keeps_members_in_bounds() {
    let bounds = vec![Bounds::new(0.0, 0.1), Bounds::new(10.0, 12.0)];
    let options = GlobalOptions {
        strategy: Strategy::Rand1Bin,
        polish: false,
        ..de_options(11)
    };
    let result = global::search(&bounds, &sphere, &options).expect("search");
    assert!(bounds[0].contains(result.x[0]) && bounds[1].contains(result.x[1]));
    assert!(!result.polished);
    assert!((result.x[1] - 10.0).abs() < 0.1);
}

#[test]
fn observer_sees_every_generation() {
    let bounds = unit_box(2);
    let mut rng = StdRng::seed_from_u64(5);
    let mut seen = Vec::new();
    let result = global::search_with_rng(
        &bounds,
        &bowl,
        &GlobalOptions {
            polish: false,
            ..de_options(5)
        },
        &mut rng,
        |report| seen.push((report.generation, report.best_score)),
    )
    .expect("search");
    assert_eq!(seen.len(), result.generations);
    assert!(seen.windows(2).all(|w| w[1].1 <= w[0].1));
    if let Some(&(_, best)) = seen.last() {
        assert_eq!(best, result.score);
    }
}

#[test]
fn tiny_population_is_rejected() {
    let options = GlobalOptions {
        population_size: 3,
        ..GlobalOptions::default()
    };
    assert_eq!(
        global::search(&unit_box(2), &sphere, &options).unwrap_err(),
        SearchError::PopulationTooSmall(3)
    );
}

// ============================================================================
// Multi-start
// ============================================================================

fn tilted_double_well(x: &[f64]) -> f64 {
    (x[0] * x[0] - 1.0).powi(2) + 0.1 * x[0]
}

#[test]
fn multi_start_ranks_outcomes_by_score() {
    let bounds = vec![Bounds::new(-2.0, 2.0)];
    // Only the -0.8 start settles in the lower (negative) well; the other two
    // stay in the positive one.
    let starts = vec![vec![0.8], vec![-0.8], vec![0.95]];
    let outcomes =
        multi_start(&starts, &bounds, &tilted_double_well, &LocalOptions::default()).expect("run");
    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0].start_index, 1);
    assert!(outcomes[0].result.x[0] < 0.0);
    assert!(outcomes[1..].iter().all(|o| o.result.x[0] > 0.0));
    assert!(outcomes[0].result.score < outcomes[1].result.score - 0.1);
    assert!(outcomes
        .windows(2)
        .all(|w| w[0].result.score <= w[1].result.score));
    assert_eq!(outcomes[0].start, vec![-0.8]);
}

#[test]
fn multi_start_breaks_score_ties_by_start_index() {
    let bounds = vec![Bounds::new(-2.0, 2.0)];
    let starts = vec![vec![0.5], vec![-0.5], vec![0.5]];
    let outcomes =
        multi_start(&starts, &bounds, &tilted_double_well, &LocalOptions::default()).expect("run");
    let (first, second) = if outcomes[0].start_index == 1 {
        (&outcomes[1], &outcomes[2])
    } else {
        (&outcomes[0], &outcomes[1])
    };
    assert_eq!(first.result.score, second.result.score);
    assert_eq!((first.start_index, second.start_index), (0, 2));
}

#[test]
fn multi_start_validates_every_start() {
    let bounds = vec![Bounds::new(-2.0, 2.0)];
    let starts = vec![vec![0.0], vec![0.0, 1.0]];
    assert!(matches!(
        multi_start(&starts, &bounds, &tilted_double_well, &LocalOptions::default()),
        Err(SearchError::DimensionMismatch { .. })
    ));
}
