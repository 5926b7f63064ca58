//! High-level design run orchestration.

use std::time::Instant;

use rand::{rngs::StdRng, SeedableRng};

use crate::{
    analyzer::{MzmAnalyzer, SpectralConfig},
    combiner::CombinedSpectrum,
    io::SearchMethod,
    metrics::{MetricsEvent, MetricsRecorder},
    objective::{ObjectiveConfig, SpectralObjective},
    params::{MzmParameters, ParameterLayout, SpectrumError},
    search::{global, local, GlobalOptions, GlobalResult, LocalOptions, LocalResult, Objective, SearchError},
    summary::SpectrumSummary,
};

#[derive(Debug, Clone)]
pub struct DesignJob {
    pub spectral: SpectralConfig,
    pub layout: ParameterLayout,
    pub objective: ObjectiveConfig,
    pub method: SearchMethod,
    pub local: LocalOptions,
    pub global: GlobalOptions,
}

#[derive(Debug, Clone)]
pub struct DesignResult {
    pub initial: MzmParameters,
    pub initial_score: f64,
    pub parameters: MzmParameters,
    pub score: f64,
    pub spectra: CombinedSpectrum,
    pub summary: SpectrumSummary,
    pub global: Option<GlobalResult>,
    pub local: Option<LocalResult>,
    pub failed_evaluations: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum DesignError {
    #[error("spectral model error: {0}")]
    Spectrum(#[from] SpectrumError),

    #[error("search error: {0}")]
    Search(#[from] SearchError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Verbose,
}

impl Verbosity {
    fn enabled(self) -> bool {
        matches!(self, Verbosity::Verbose)
    }
}

pub fn run(job: &DesignJob, verbosity: Verbosity) -> Result<DesignResult, DesignError> {
    run_with_metrics(job, verbosity, None)
}

pub fn run_with_metrics(
    job: &DesignJob,
    verbosity: Verbosity,
    metrics: Option<&MetricsRecorder>,
) -> Result<DesignResult, DesignError> {
    let pipeline_start = Instant::now();
    let analyzer = MzmAnalyzer::new(job.spectral.clone())?;
    let objective = SpectralObjective::new(&analyzer, &job.layout, &job.objective);
    let bounds = objective.bounds();
    let initial_x = job.layout.initial_point();
    let initial = job.layout.apply(&initial_x);
    let initial_score = objective.score(&initial_x);

    if verbosity.enabled() {
        eprintln!(
            "[setup] method={} objective={} free={} M={} window=±{} fundamental={} GHz",
            job.method,
            job.objective.mode,
            job.layout.dimension(),
            job.spectral.truncation,
            job.spectral.half_width,
            job.spectral.fundamental_ghz
        );
        eprintln!(
            "[setup] targets={:?} suppress={:?} initial_score={:+.6e}",
            job.objective.target_orders, job.objective.suppress_orders, initial_score
        );
    }
    if let Some(recorder) = metrics {
        recorder.emit(MetricsEvent::PipelineStart {
            method: &job.method.to_string(),
            objective: &job.objective.mode.to_string(),
            dimension: job.layout.dimension(),
            truncation: job.spectral.truncation,
            half_width: job.spectral.half_width,
            initial_score,
        });
    }

    let mut best_x = initial_x;
    let mut best_score = initial_score;

    let global_result = if matches!(job.method, SearchMethod::Global | SearchMethod::GlobalLocal) {
        let timer = Instant::now();
        let mut rng = StdRng::seed_from_u64(job.global.seed);
        let mut options = job.global.clone();
        // The local stage below replaces the built-in polish.
        if job.method == SearchMethod::GlobalLocal {
            options.polish = false;
        }
        let result = global::search_with_rng(&bounds, &objective, &options, &mut rng, |report| {
            if let Some(recorder) = metrics {
                recorder.emit(MetricsEvent::Generation {
                    generation: report.generation,
                    best_score: report.best_score,
                    mean_score: report.mean_score,
                    spread: report.spread,
                    evaluations: report.evaluations,
                });
            }
        })?;
        let elapsed = timer.elapsed();
        if verbosity.enabled() {
            eprintln!(
                "[search] global success={} generations={} evals={} best={:+.6e} elapsed={:.2?}",
                result.success, result.generations, result.evaluations, result.score, elapsed
            );
        }
        if let Some(recorder) = metrics {
            recorder.emit(MetricsEvent::GlobalDone {
                score: result.score,
                success: result.success,
                generations: result.generations,
                evaluations: result.evaluations,
                polished: result.polished,
                duration_ms: elapsed.as_secs_f64() * 1000.0,
            });
        }
        best_x = result.x.clone();
        best_score = result.score;
        Some(result)
    } else {
        None
    };

    let local_result = if matches!(job.method, SearchMethod::Local | SearchMethod::GlobalLocal) {
        let timer = Instant::now();
        let result = local::refine(&best_x, &bounds, &objective, &job.local)?;
        let elapsed = timer.elapsed();
        if verbosity.enabled() {
            eprintln!(
                "[search] local status=\"{}\" iters={} evals={} score={:+.6e} elapsed={:.2?}",
                result.status, result.iterations, result.evaluations, result.score, elapsed
            );
        }
        if let Some(recorder) = metrics {
            recorder.emit(MetricsEvent::LocalRefine {
                score: result.score,
                converged: result.converged,
                status: &result.status.to_string(),
                iterations: result.iterations,
                evaluations: result.evaluations,
                duration_ms: elapsed.as_secs_f64() * 1000.0,
            });
        }
        if result.score <= best_score {
            best_x = result.x.clone();
            best_score = result.score;
        }
        Some(result)
    } else {
        None
    };

    let parameters = job.layout.apply(&best_x);
    let spectra = analyzer.analyze(&parameters)?;
    let summary = SpectrumSummary::from_spectrum(
        &spectra.combined,
        &job.objective.target_orders,
        &job.objective.suppress_orders,
        job.objective.epsilon,
    );
    let failed_evaluations = objective.failures();
    if failed_evaluations > 0 {
        log::warn!("{failed_evaluations} evaluations fell back to the failure penalty");
    }

    let cache = analyzer.cache_stats().unwrap_or_default();
    if verbosity.enabled() {
        eprintln!(
            "[done] score={:+.6e} carrier={:.2} dB suppression={:.2} dB in {:.2?}",
            best_score,
            summary.carrier_power_db,
            summary.suppression_ratio_db,
            pipeline_start.elapsed()
        );
    }
    if let Some(recorder) = metrics {
        recorder.emit(MetricsEvent::PipelineDone {
            final_score: best_score,
            failed_evaluations,
            cache_hits: cache.hits,
            cache_misses: cache.misses,
            duration_ms: pipeline_start.elapsed().as_secs_f64() * 1000.0,
        });
    }
    log::info!(
        "design finished: score {:.6e} -> {:.6e}",
        initial_score,
        best_score
    );

    Ok(DesignResult {
        initial,
        initial_score,
        parameters,
        score: best_score,
        spectra,
        summary,
        global: global_result,
        local: local_result,
        failed_evaluations,
    })
}
