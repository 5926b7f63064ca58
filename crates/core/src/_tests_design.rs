#![cfg(test)]

use super::analyzer::SpectralConfig;
use super::design::{run, run_with_metrics, DesignJob, Verbosity};
use super::io::SearchMethod;
use super::metrics::{MetricsConfig, MetricsRecorder};
use super::objective::{ObjectiveConfig, ObjectiveMode};
use super::params::{
    FreeParameter, ModulationParameters, MzmParameters, ParameterLayout, ParameterSlot,
};
use super::search::{Bounds, GlobalOptions, LocalOptions};

fn base() -> MzmParameters {
    MzmParameters {
        upper: ModulationParameters::new(
            [0.5911418, 0.57029264, 0.43456265],
            [2.35619449, 3.4906585, 0.32345053],
        ),
        lower: ModulationParameters::new([0.45, 1.1, 0.0], [0.91040133, 3.07532239, 2.35619449]),
        delta_phi: 2.69056597,
    }
}

fn job(method: SearchMethod, free: Vec<FreeParameter>) -> DesignJob {
    DesignJob {
        spectral: SpectralConfig {
            cache_capacity: 64,
            ..SpectralConfig::default()
        },
        layout: ParameterLayout::new(base(), free),
        objective: ObjectiveConfig::new(ObjectiveMode::SuppressionRatio, vec![-1, 1], vec![0]),
        method,
        local: LocalOptions::default(),
        global: GlobalOptions {
            population_size: 8,
            max_generations: 10,
            seed: 1,
            ..GlobalOptions::default()
        },
    }
}

fn phase_slots() -> Vec<FreeParameter> {
    vec![
        FreeParameter {
            slot: ParameterSlot::DifferentialPhase,
            bounds: Bounds::new(0.0, std::f64::consts::TAU),
        },
        FreeParameter {
            slot: ParameterSlot::LowerDepth(0),
            bounds: Bounds::new(0.0, 2.0),
        },
    ]
}

#[test]
fn evaluate_reports_the_configured_point() {
    let result = run(&job(SearchMethod::Evaluate, Vec::new()), Verbosity::Quiet).expect("run");
    assert_eq!(result.parameters, base());
    assert_eq!(result.initial, base());
    assert_eq!(result.score, result.initial_score);
    assert!(result.global.is_none() && result.local.is_none());
    assert_eq!(result.failed_evaluations, 0);
    assert!(result.summary.carrier_power > 0.0);
}

#[test]
fn local_refinement_never_worsens_the_start() {
    let result = run(&job(SearchMethod::Local, phase_slots()), Verbosity::Quiet).expect("run");
    assert!(result.score <= result.initial_score);
    assert!(result.local.is_some() && result.global.is_none());
    assert_eq!(result.parameters.upper, base().upper);
    assert!((0.0..=std::f64::consts::TAU).contains(&result.parameters.delta_phi));
}

#[test]
fn global_then_local_is_reproducible() {
    let design = job(SearchMethod::GlobalLocal, phase_slots());
    let first = run(&design, Verbosity::Quiet).expect("run");
    let second = run(&design, Verbosity::Quiet).expect("run");
    assert_eq!(first.parameters, second.parameters);
    assert_eq!(first.score, second.score);
    let global = first.global.as_ref().expect("global stage ran");
    assert!(!global.polished);
    assert!(first.score <= global.score);
}

#[test]
fn reported_score_matches_reported_spectrum() {
    let design = job(SearchMethod::Global, phase_slots());
    let result = run(&design, Verbosity::Quiet).expect("run");
    let wanted = result.spectra.combined.magnitude(-1) + result.spectra.combined.magnitude(1);
    let unwanted = result.spectra.combined.magnitude(0);
    let expected = unwanted / (wanted + design.objective.epsilon);
    assert!((result.score - expected).abs() <= 1e-12 * expected.abs().max(1.0));
}

#[test]
fn metrics_stream_brackets_the_run() {
    let path = std::env::temp_dir().join(format!(
        "trimod-design-metrics-{}.jsonl",
        std::process::id()
    ));
    let recorder = MetricsRecorder::new(&path).expect("recorder");
    let result = run_with_metrics(
        &job(SearchMethod::GlobalLocal, phase_slots()),
        Verbosity::Quiet,
        Some(&recorder),
    )
    .expect("run");
    drop(recorder);

    let text = std::fs::read_to_string(&path).expect("metrics file");
    let events: Vec<serde_json::Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();
    let names: Vec<&str> = events
        .iter()
        .map(|event| event["event"].as_str().expect("event tag"))
        .collect();
    assert_eq!(names.first(), Some(&"pipeline_start"));
    assert_eq!(names.last(), Some(&"pipeline_done"));
    let generations = names.iter().filter(|name| **name == "generation").count();
    assert_eq!(generations, result.global.as_ref().expect("global").generations);
    assert!(names.contains(&"global_done") && names.contains(&"local_refine"));
    assert_eq!(events[0]["method"], "global+local");
    assert!(events.last().expect("done")["cache_hits"].as_u64().is_some());
    let stamps: Vec<f64> = events
        .iter()
        .map(|event| event["elapsed_ms"].as_f64().expect("elapsed stamp"))
        .collect();
    assert!(stamps[0] >= 0.0);
    assert!(stamps.windows(2).all(|w| w[0] <= w[1]));

    let _ = std::fs::remove_file(&path);
}

#[test]
fn metrics_config_opens_a_recorder_only_when_enabled() {
    assert!(MetricsConfig::default().build_recorder().expect("disabled").is_none());

    let missing_path = MetricsConfig {
        enabled: true,
        output: None,
    };
    let err = missing_path.build_recorder().err().expect("output is required");
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);

    let path = std::env::temp_dir()
        .join(format!("trimod-metrics-{}", std::process::id()))
        .join("run.jsonl");
    let enabled = MetricsConfig {
        enabled: true,
        output: Some(path.clone()),
    };
    assert!(enabled.build_recorder().expect("opens").is_some());
    assert!(path.exists());
    let _ = std::fs::remove_dir_all(path.parent().expect("parent"));
}
