#![cfg(test)]

use std::f64::consts::TAU;

use super::design::DesignJob;
use super::io::{ConfigError, DesignConfig, SearchMethod};
use super::objective::ObjectiveMode;
use super::params::{ParameterSlot, SpectrumError};
use super::search::{SearchError, Strategy};

const BASE: &str = r#"
delta_phi = 2.69056597

[spectral]
fundamental_ghz = 10.0
truncation = 5
half_width = 10

[upper]
depths = [0.5911418, 0.57029264, 0.43456265]
phases = [2.35619449, 3.4906585, 0.32345053]

[lower]
depths = [0.45, 1.1, 0.0]
phases = [0.91040133, 3.07532239, 2.35619449]

[objective]
mode = "min_equalized"
target_orders = [-1, 1]
suppress_orders = [0, 2, -2]
"#;

fn with_search(search: &str) -> String {
    format!("{BASE}\n{search}")
}

#[test]
fn parses_full_design_file() {
    let text = with_search(
        r#"
[search]
method = "global+local"

[[search.free]]
slot = { kind = "differential_phase" }
bounds = { lo = 0.0, hi = 6.283185307179586 }

[[search.free]]
slot = { kind = "lower_depth", tone = 1 }

[search.global]
population_size = 12
seed = 9
strategy = "rand1_bin"
mutation = [0.4, 0.9]

[search.local]
max_iter = 50

[metrics]
enabled = true
output = "out/metrics.jsonl"
"#,
    );
    let config = DesignConfig::from_str(&text).expect("valid config");
    assert_eq!(config.delta_phi, 2.69056597);
    assert_eq!(config.objective.mode, ObjectiveMode::MinEqualized);
    assert_eq!(config.objective.suppress_orders, vec![0, 2, -2]);
    assert_eq!(config.search.method, SearchMethod::GlobalLocal);
    assert_eq!(config.search.global.population_size, 12);
    assert_eq!(config.search.global.strategy, Strategy::Rand1Bin);
    assert_eq!(config.search.global.mutation, (0.4, 0.9));
    assert_eq!(config.search.local.max_iter, 50);
    assert!(config.metrics.enabled);

    let layout = config.layout();
    assert_eq!(layout.dimension(), 2);
    assert_eq!(layout.free()[0].slot, ParameterSlot::DifferentialPhase);
    assert_eq!(layout.free()[1].slot, ParameterSlot::LowerDepth(1));
    // Depth slots without explicit bounds fall back to [0, 2].
    assert_eq!(layout.bounds()[1].hi, 2.0);
    assert_eq!(layout.bounds()[0].hi, TAU);
}

#[test]
fn defaults_fill_optional_sections() {
    let text = with_search("[search]\nmethod = \"evaluate\"\n");
    let config = DesignConfig::from_str(&text).expect("valid config");
    assert_eq!(config.spectral.prune_threshold, 1e-8);
    assert_eq!(config.spectral.cache_capacity, 0);
    assert_eq!(config.objective.leakage_weight, 0.5);
    assert_eq!(config.objective.mismatch_weight, 10.0);
    assert_eq!(config.objective.failure_penalty, 1e6);
    assert_eq!(config.search.global.population_size, 30);
    assert!(!config.metrics.enabled);

    let job = DesignJob::from(config);
    assert_eq!(job.method, SearchMethod::Evaluate);
    assert_eq!(job.layout.dimension(), 0);
}

#[test]
fn missing_phases_default_to_zero() {
    let text = BASE.replace("phases = [0.91040133, 3.07532239, 2.35619449]\n", "")
        + "[search]\nmethod = \"evaluate\"\n";
    let config = DesignConfig::from_str(&text).expect("valid config");
    assert_eq!(config.lower.phases, [0.0; 3]);
}

#[test]
fn rejects_zero_truncation() {
    let text = with_search("[search]\nmethod = \"evaluate\"\n").replace("truncation = 5", "truncation = 0");
    assert!(matches!(
        DesignConfig::from_str(&text),
        Err(ConfigError::Spectral(SpectrumError::InvalidTruncation))
    ));
}

#[test]
fn rejects_orders_outside_window() {
    let text = with_search("[search]\nmethod = \"evaluate\"\n").replace("half_width = 10", "half_width = 1");
    assert!(matches!(
        DesignConfig::from_str(&text),
        Err(ConfigError::InvalidObjective(_))
    ));
}

#[test]
fn rejects_negative_base_depth() {
    let text = with_search("[search]\nmethod = \"evaluate\"\n")
        .replace("depths = [0.45, 1.1, 0.0]", "depths = [0.45, -1.1, 0.0]");
    assert!(matches!(
        DesignConfig::from_str(&text),
        Err(ConfigError::Spectral(SpectrumError::NegativeDepth { tone: 1, .. }))
    ));
}

#[test]
fn rejects_depths_above_the_limit() {
    let base = with_search("[search]\nmethod = \"evaluate\"\n")
        .replace("depths = [0.45, 1.1, 0.0]", "depths = [0.45, 1e20, 0.0]");
    assert!(matches!(
        DesignConfig::from_str(&base),
        Err(ConfigError::Spectral(SpectrumError::DepthOutOfRange { tone: 1, .. }))
    ));

    let bound = with_search(
        r#"
[search]
method = "local"

[[search.free]]
slot = { kind = "upper_depth", tone = 0 }
bounds = { lo = 0.0, hi = 3e8 }
"#,
    );
    assert!(matches!(
        DesignConfig::from_str(&bound),
        Err(ConfigError::InvalidSearch(_))
    ));
}

#[test]
fn search_methods_require_free_parameters() {
    let text = with_search("[search]\nmethod = \"local\"\n");
    assert!(matches!(
        DesignConfig::from_str(&text),
        Err(ConfigError::InvalidSearch(_))
    ));
}

#[test]
fn rejects_duplicate_and_out_of_range_slots() {
    let duplicate = with_search(
        r#"
[search]
method = "local"

[[search.free]]
slot = { kind = "upper_phase", tone = 0 }

[[search.free]]
slot = { kind = "upper_phase", tone = 0 }
"#,
    );
    assert!(matches!(
        DesignConfig::from_str(&duplicate),
        Err(ConfigError::InvalidSearch(_))
    ));

    let bad_tone = with_search(
        r#"
[search]
method = "local"

[[search.free]]
slot = { kind = "upper_depth", tone = 3 }
"#,
    );
    assert!(matches!(
        DesignConfig::from_str(&bad_tone),
        Err(ConfigError::InvalidSearch(_))
    ));
}

#[test]
fn rejects_inverted_bounds_and_negative_depth_bounds() {
    let inverted = with_search(
        r#"
[search]
method = "local"

[[search.free]]
slot = { kind = "lower_phase", tone = 2 }
bounds = { lo = 3.0, hi = 1.0 }
"#,
    );
    assert!(matches!(
        DesignConfig::from_str(&inverted),
        Err(ConfigError::Bounds(SearchError::InvalidBounds { index: 0, .. }))
    ));

    let negative = with_search(
        r#"
[search]
method = "local"

[[search.free]]
slot = { kind = "upper_depth", tone = 0 }
bounds = { lo = -0.5, hi = 1.0 }
"#,
    );
    assert!(matches!(
        DesignConfig::from_str(&negative),
        Err(ConfigError::InvalidSearch(_))
    ));
}

#[test]
fn rejects_small_population_for_global_methods() {
    let text = with_search(
        r#"
[search]
method = "global"

[[search.free]]
slot = { kind = "differential_phase" }

[search.global]
population_size = 2
"#,
    );
    assert!(matches!(
        DesignConfig::from_str(&text),
        Err(ConfigError::Bounds(SearchError::PopulationTooSmall(2)))
    ));
}

#[test]
fn malformed_toml_reports_parse_error() {
    assert!(matches!(
        DesignConfig::from_str("delta_phi = [1, 2"),
        Err(ConfigError::Toml(_))
    ));
}

#[test]
fn missing_file_reports_io_error() {
    let path = std::env::temp_dir().join("trimod-core-missing-config.toml");
    let _ = std::fs::remove_file(&path);
    assert!(matches!(
        DesignConfig::from_file(&path),
        Err(ConfigError::Io(_))
    ));
}
