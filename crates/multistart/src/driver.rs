//! Multi-threaded driver for multi-start refinement.
//!
//! Every expanded start is refined independently on a rayon pool. The
//! spectral analyzer (and its cache) is shared by all workers; results are
//! collected under a mutex, ranked by score and written as CSV.

use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use rayon::prelude::*;

use trimod_core::{
    analyzer::MzmAnalyzer,
    objective::SpectralObjective,
    params::{MzmParameters, SpectrumError},
    search::{local, LocalResult},
    summary::SpectrumSummary,
};

use crate::config::MultiStartConfig;
use crate::expansion::{expand_starts, ExpandedStart};
use crate::output::OutputWriter;

// ============================================================================
// Start Result
// ============================================================================

#[derive(Debug, Clone)]
pub struct StartResult {
    /// Start index (matches `ExpandedStart::index`).
    pub index: usize,

    pub start: Vec<f64>,

    pub result: LocalResult,

    pub duration: Duration,
}

#[derive(Debug)]
pub struct StartError {
    pub index: usize,
    pub message: String,
}

// ============================================================================
// Pre-Run Report
// ============================================================================

pub struct PreRunReport {
    lines: Vec<String>,
}

impl PreRunReport {
    pub fn build(config: &MultiStartConfig, starts: &[ExpandedStart], threads: usize) -> Self {
        let mut lines = Vec::new();

        lines.push(String::from("╭─────────────────────────────────────────────────╮"));
        lines.push(String::from("│            trimod multi-start                   │"));
        lines.push(String::from("╰─────────────────────────────────────────────────╯"));
        lines.push(String::new());

        lines.push(format!("  Starts: {}  │  Threads: {}", starts.len(), threads));
        lines.push(format!(
            "  Objective: {}  targets={:?} suppress={:?}",
            config.design.objective.mode,
            config.design.objective.target_orders,
            config.design.objective.suppress_orders
        ));
        lines.push(format!(
            "  Model: M={} window=±{}",
            config.design.spectral.truncation, config.design.spectral.half_width
        ));
        lines.push(String::new());

        let layout = config.design.layout();
        let mut fixed = Vec::new();
        let mut swept = Vec::new();
        for param in layout.free() {
            match config.starts.axes.iter().find(|axis| axis.slot == param.slot) {
                Some(axis) => {
                    let values = axis.values();
                    let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
                    let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                    swept.push(format!("{}: {:.3}→{:.3} ({})", param.slot, lo, hi, values.len()));
                }
                None => fixed.push(format!("{}={:.3}", param.slot, layout.base().get(param.slot))),
            }
        }
        if !fixed.is_empty() {
            lines.push(format!("  Base: {}", fixed.join(", ")));
        }
        if !swept.is_empty() {
            lines.push(format!("  Swept: {}", swept.join(", ")));
        }
        lines.push(format!("  Output: {}", config.output.path.display()));
        lines.push(String::new());

        Self { lines }
    }

    pub fn print(&self) {
        for line in &self.lines {
            println!("{}", line);
        }
        let _ = io::stdout().flush();
    }
}

// ============================================================================
// Multi-start Driver
// ============================================================================

pub struct MultiStartDriver {
    config: MultiStartConfig,
    starts: Vec<ExpandedStart>,
    threads: usize,
    verbose: bool,
}

impl MultiStartDriver {
    /// `requested_threads` overrides the configured thread count when positive.
    pub fn new(config: MultiStartConfig, requested_threads: Option<usize>) -> Self {
        let threads = requested_threads
            .filter(|&n| n > 0)
            .unwrap_or_else(|| config.effective_threads());
        let verbose = config.multistart.verbose;
        let starts = expand_starts(&config);
        Self {
            config,
            starts,
            threads,
            verbose,
        }
    }

    pub fn start_count(&self) -> usize {
        self.starts.len()
    }

    pub fn starts(&self) -> &[ExpandedStart] {
        &self.starts
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn dry_run(&self) -> DryRunStats {
        DryRunStats {
            total_starts: self.starts.len(),
            threads: self.threads,
            report: PreRunReport::build(&self.config, &self.starts, self.threads),
        }
    }

    /// Refine every start, rank the outcomes and write the CSV.
    pub fn run(&self) -> Result<DriverStats, DriverError> {
        if self.starts.is_empty() {
            warn!("no starts to refine (start grid resulted in zero points)");
            return Ok(DriverStats::default());
        }

        PreRunReport::build(&self.config, &self.starts, self.threads).print();

        let design = &self.config.design;
        let analyzer = MzmAnalyzer::new(design.spectral.clone())?;
        let layout = design.layout();
        let objective = SpectralObjective::new(&analyzer, &layout, &design.objective);
        let bounds = objective.bounds();
        let local_options = &design.search.local;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()
            .map_err(|e| DriverError::ThreadPoolError(e.to_string()))?;

        let results = Mutex::new(Vec::with_capacity(self.starts.len()));
        let errors = Mutex::new(Vec::new());
        let completed = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);

        let pb = ProgressBar::new(self.starts.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓░"),
        );

        let start_time = Instant::now();
        let verbose = self.verbose;

        pool.install(|| {
            self.starts.par_iter().for_each(|start| {
                let timer = Instant::now();
                match local::refine(&start.x, &bounds, &objective, local_options) {
                    Ok(result) => {
                        if verbose {
                            debug!(
                                "[start {}] score={:+.6e} status=\"{}\" iters={}",
                                start.index, result.score, result.status, result.iterations
                            );
                        }
                        results.lock().push(StartResult {
                            index: start.index,
                            start: start.x.clone(),
                            result,
                            duration: timer.elapsed(),
                        });
                        completed.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        failed.fetch_add(1, Ordering::Relaxed);
                        errors.lock().push(StartError {
                            index: start.index,
                            message: e.to_string(),
                        });
                    }
                }
                pb.inc(1);
            });
        });
        pb.finish_and_clear();

        let mut ranked = results.into_inner();
        ranked.sort_by(|a, b| {
            a.result
                .score
                .total_cmp(&b.result.score)
                .then(a.index.cmp(&b.index))
        });

        let mut writer = OutputWriter::new(&self.config.output, layout.free())
            .map_err(|e| DriverError::OutputError(e.to_string()))?;
        for (rank, result) in ranked.iter().enumerate() {
            writer
                .write_result(rank + 1, result)
                .map_err(|e| DriverError::OutputError(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| DriverError::OutputError(e.to_string()))?;

        let total_time = start_time.elapsed();
        let completed_count = completed.load(Ordering::Relaxed);
        let failed_count = failed.load(Ordering::Relaxed);

        let best = match ranked.first() {
            Some(top) => {
                let parameters = layout.apply(&top.result.x);
                let spectra = analyzer.analyze(&parameters)?;
                let summary = SpectrumSummary::from_spectrum(
                    &spectra.combined,
                    &design.objective.target_orders,
                    &design.objective.suppress_orders,
                    design.objective.epsilon,
                );
                Some(BestStart {
                    index: top.index,
                    score: top.result.score,
                    parameters,
                    summary,
                })
            }
            None => None,
        };

        println!();
        if failed_count == 0 {
            println!(
                "✓ {} starts refined in {:.2}s",
                completed_count,
                total_time.as_secs_f64()
            );
        } else {
            println!(
                "⚠ {}/{} starts refined, {} failed in {:.2}s",
                completed_count,
                self.starts.len(),
                failed_count,
                total_time.as_secs_f64()
            );
        }
        if let Some(best) = &best {
            println!(
                "  best: start {} score={:+.6e} carrier={:.2} dB suppression={:.2} dB",
                best.index, best.score, best.summary.carrier_power_db, best.summary.suppression_ratio_db
            );
        }
        println!(
            "  wrote {} rows to {}",
            writer.rows_written(),
            self.config.output.path.display()
        );

        let errors = errors.into_inner();
        for err in errors.iter().take(5) {
            error!("start {} failed: {}", err.index, err.message);
        }
        if errors.len() > 5 {
            error!("... and {} more errors", errors.len() - 5);
        }
        if objective.failures() > 0 {
            warn!(
                "{} evaluations fell back to the failure penalty",
                objective.failures()
            );
        }
        if let Some(cache) = analyzer.cache_stats() {
            info!(
                "spectrum cache: {} hits, {} misses, {} entries",
                cache.hits, cache.misses, cache.entries
            );
        }

        Ok(DriverStats {
            total_starts: self.starts.len(),
            completed: completed_count,
            failed: failed_count,
            total_time,
            errors,
            ranked,
            best,
        })
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// The top-ranked start, re-analysed for reporting.
#[derive(Debug, Clone)]
pub struct BestStart {
    pub index: usize,
    pub score: f64,
    pub parameters: MzmParameters,
    pub summary: SpectrumSummary,
}

#[derive(Debug, Default)]
pub struct DriverStats {
    pub total_starts: usize,
    pub completed: usize,
    pub failed: usize,
    pub total_time: Duration,
    pub errors: Vec<StartError>,
    /// Successful starts, best first.
    pub ranked: Vec<StartResult>,
    pub best: Option<BestStart>,
}

pub struct DryRunStats {
    pub total_starts: usize,
    pub threads: usize,
    report: PreRunReport,
}

impl DryRunStats {
    pub fn print_report(&self) {
        self.report.print();
        println!("  [DRY RUN - no starts will be refined]");
        println!();
    }
}

impl std::fmt::Display for DryRunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Dry Run Statistics")?;
        writeln!(f, "==================")?;
        writeln!(f, "Total starts: {}", self.total_starts)?;
        writeln!(f, "Threads: {}", self.threads)
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("failed to create thread pool: {0}")]
    ThreadPoolError(String),

    #[error("output error: {0}")]
    OutputError(String),

    #[error("spectral model error: {0}")]
    Spectrum(#[from] SpectrumError),
}

// ============================================================================
// Tests
// ============================================================================
