use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use trimod_core::{
    analyzer::{MzmAnalyzer, SpectralConfig},
    combiner::CombinedSpectrum,
    design::{self, DesignJob, Verbosity},
    io::DesignConfig,
    params::MzmParameters,
    summary::{power_db, SpectrumSummary},
};
use trimod_multistart::{MultiStartConfig, MultiStartDriver};

#[derive(Parser, Debug)]
#[command(name = "trimod", about = "Three-tone dual-arm MZM sideband analysis and design")]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// Suppress progress logs (stderr)
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Expand the configured parameters and print the spectra as CSV
    Analyze {
        /// Path to a TOML configuration file
        #[arg(short, long)]
        config: PathBuf,
        /// Path to CSV output (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run the configured search and print the optimized spectra as CSV
    Optimize {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Override the differential evolution seed
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Refine from every start of a `[multistart]` grid in parallel
    Multistart {
        #[arg(short, long)]
        config: PathBuf,
        /// Worker threads (defaults to the config, then physical cores)
        #[arg(short = 'j', long)]
        threads: Option<usize>,
        /// Expand and report the starts without refining
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let verbosity = if cli.quiet {
        Verbosity::Quiet
    } else {
        Verbosity::Verbose
    };

    match cli.command {
        Command::Analyze { config, output } => {
            if !cli.quiet {
                eprintln!("[cli] loading config {}", config.display());
            }
            let config = DesignConfig::from_file(&config)?;
            let analyzer = MzmAnalyzer::new(config.spectral.clone())?;
            let params = config.base_parameters();
            let spectra = analyzer.analyze(&params)?;
            emit_csv(&spectra, &config.spectral, output.as_deref())?;
            if !cli.quiet {
                let summary = SpectrumSummary::from_spectrum(
                    &spectra.combined,
                    &config.objective.target_orders,
                    &config.objective.suppress_orders,
                    config.objective.epsilon,
                );
                report_summary(&params, &summary);
                report_destination(spectra.combined.orders().count(), output.as_deref());
            }
        }
        Command::Optimize {
            config,
            output,
            seed,
        } => {
            if !cli.quiet {
                eprintln!("[cli] loading config {}", config.display());
            }
            let mut config = DesignConfig::from_file(&config)?;
            if let Some(seed) = seed {
                config.search.global.seed = seed;
            }
            let metrics_recorder = config.metrics.build_recorder()?;
            let spectral = config.spectral.clone();
            let job = DesignJob::from(config);
            let result = design::run_with_metrics(&job, verbosity, metrics_recorder.as_ref())?;
            emit_csv(&result.spectra, &spectral, output.as_deref())?;
            if !cli.quiet {
                report_summary(&result.parameters, &result.summary);
                report_destination(result.spectra.combined.orders().count(), output.as_deref());
            }
        }
        Command::Multistart {
            config,
            threads,
            dry_run,
        } => {
            if !cli.quiet {
                eprintln!("[cli] loading multi-start config {}", config.display());
            }
            let config = MultiStartConfig::from_file(&config)?;
            let dry_run = dry_run || config.multistart.dry_run;
            let driver = MultiStartDriver::new(config, threads);
            if dry_run {
                driver.dry_run().print_report();
                return Ok(());
            }
            let stats = driver.run()?;
            if let Some(best) = &stats.best {
                if !cli.quiet {
                    report_summary(&best.parameters, &best.summary);
                }
            }
            if stats.failed > 0 {
                return Err(format!("{} of {} starts failed", stats.failed, stats.total_starts).into());
            }
        }
    }
    Ok(())
}

fn report_summary(params: &MzmParameters, summary: &SpectrumSummary) {
    eprintln!(
        "[result] upper β={:?} φ={:?}",
        params.upper.depths, params.upper.phases
    );
    eprintln!(
        "[result] lower β={:?} φ={:?} Δφ={:.6}",
        params.lower.depths, params.lower.phases, params.delta_phi
    );
    eprintln!(
        "[result] carrier={:.2} dB target={:.2} dB suppressed={:.2} dB ratio={:.2} dB",
        summary.carrier_power_db,
        summary.target_power_db,
        summary.suppressed_power_db,
        summary.suppression_ratio_db
    );
    for pair in summary.pairs.iter().take(4) {
        eprintln!("[result] ±{} pair power={:.2} dB", pair.order, pair.power_db);
    }
}

fn report_destination(rows: usize, dest: Option<&Path>) {
    match dest {
        Some(path) => eprintln!("wrote {} rows to {}", rows, path.display()),
        None => eprintln!("wrote {} rows to stdout", rows),
    }
}

fn emit_csv(spectra: &CombinedSpectrum, spectral: &SpectralConfig, dest: Option<&Path>) -> io::Result<()> {
    let mut writer: Box<dyn Write> = match dest {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout())),
    };
    writeln!(
        writer,
        "order,offset_ghz,upper_re,upper_im,upper_mag,lower_re,lower_im,lower_mag,combined_re,combined_im,combined_mag,combined_power_db"
    )?;
    for order in spectra.combined.orders() {
        let upper = spectra.upper.amplitude(order);
        let lower = spectra.lower_shifted.amplitude(order);
        let combined = spectra.combined.amplitude(order);
        write!(writer, "{order},{}", spectral.offset_ghz(order))?;
        for value in [upper, lower, combined] {
            write!(writer, ",{},{},{}", value.re, value.im, value.norm())?;
        }
        writeln!(writer, ",{}", power_db(combined.norm_sqr(), 1e-12))?;
    }
    writer.flush()
}
