#![cfg(test)]

use num_complex::Complex64;

use super::bessel::bessel_j;
use super::expander::BesselExpander;
use super::params::{ModulationParameters, SpectrumError, MAX_DEPTH};

fn expander() -> BesselExpander {
    BesselExpander::new(5, 10, 1e-8).expect("valid expander")
}

#[test]
fn zero_depths_collapse_to_the_carrier() {
    let spectrum = expander()
        .expand(&ModulationParameters::new([0.0; 3], [0.4, 1.2, 2.0]))
        .expect("expansion");
    assert_eq!(spectrum.populated_orders(), vec![0]);
    let carrier = spectrum.amplitude(0);
    assert!((carrier - Complex64::new(1.0, 0.0)).norm() < 1e-12);
}

#[test]
fn single_tone_reproduces_bessel_amplitudes() {
    let beta = 1.3;
    let spectrum = expander()
        .expand(&ModulationParameters::new([beta, 0.0, 0.0], [0.0; 3]))
        .expect("expansion");
    for n in -5..=5 {
        let expected = bessel_j(n, beta);
        let actual = spectrum.amplitude(n);
        assert!(
            (actual.re - expected).abs() < 1e-8 && actual.im.abs() < 1e-12,
            "order {n}: expected {expected}, got {actual}"
        );
    }
    // Negative orders follow J(-n, β) = (-1)^n J(n, β).
    assert!((spectrum.amplitude(-1).re + spectrum.amplitude(1).re).abs() < 1e-12);
    assert!((spectrum.amplitude(-2).re - spectrum.amplitude(2).re).abs() < 1e-12);
}

#[test]
fn second_tone_only_populates_even_orders() {
    let spectrum = expander()
        .expand(&ModulationParameters::new([0.0, 0.9, 0.0], [0.0, 0.7, 0.0]))
        .expect("expansion");
    assert!(spectrum.populated_orders().iter().all(|order| order % 2 == 0));
    let expected = bessel_j(1, 0.9);
    assert!((spectrum.magnitude(2) - expected.abs()).abs() < 1e-12);
    assert!((spectrum.amplitude(2).arg() - 0.7).abs() < 1e-12);
}

#[test]
fn phase_changes_leave_single_tone_magnitudes_untouched() {
    let depths = [0.8, 0.0, 0.0];
    let base = expander()
        .expand(&ModulationParameters::new(depths, [0.0; 3]))
        .expect("expansion");
    let shifted = expander()
        .expand(&ModulationParameters::new(depths, [2.1, 0.0, 0.0]))
        .expect("expansion");
    assert_eq!(base.populated_orders(), shifted.populated_orders());
    for order in base.populated_orders() {
        assert!((base.magnitude(order) - shifted.magnitude(order)).abs() < 1e-12);
        let expected = Complex64::from_polar(1.0, 2.1 * order as f64) * base.amplitude(order);
        assert!((shifted.amplitude(order) - expected).norm() < 1e-12);
    }
}

#[test]
fn tone_proportional_phase_shift_rotates_each_order() {
    // φ_t → φ_t + t·θ adds (n1 + 2n2 + 3n3)·θ = order·θ to every path of an order.
    let depths = [0.6, 0.5, 0.4];
    let phases = [0.3, 0.9, 1.4];
    let theta = 0.37;
    let base = expander()
        .expand(&ModulationParameters::new(depths, phases))
        .expect("expansion");
    let shifted = expander()
        .expand(&ModulationParameters::new(
            depths,
            [phases[0] + theta, phases[1] + 2.0 * theta, phases[2] + 3.0 * theta],
        ))
        .expect("expansion");
    for order in base.orders() {
        assert!((base.magnitude(order) - shifted.magnitude(order)).abs() < 1e-9);
        let expected = base.amplitude(order) * Complex64::from_polar(1.0, theta * order as f64);
        assert!((shifted.amplitude(order) - expected).norm() < 1e-9);
    }
}

#[test]
fn orders_stay_inside_the_window() {
    let expander = BesselExpander::new(6, 4, 1e-8).expect("valid expander");
    let spectrum = expander
        .expand(&ModulationParameters::new([2.0, 2.0, 2.0], [0.1, 0.2, 0.3]))
        .expect("expansion");
    assert!(spectrum.populated_orders().iter().all(|order| order.abs() <= 4));
    assert!(expander.truncates_at_window());
}

#[test]
fn negative_depth_is_rejected() {
    let err = expander()
        .expand(&ModulationParameters::new([0.5, -0.1, 0.0], [0.0; 3]))
        .unwrap_err();
    assert_eq!(err, SpectrumError::NegativeDepth { tone: 1, value: -0.1 });
}

#[test]
fn depth_above_the_limit_is_rejected() {
    let err = expander()
        .expand(&ModulationParameters::new([1e20, 0.0, 0.0], [0.0; 3]))
        .unwrap_err();
    assert_eq!(err, SpectrumError::DepthOutOfRange { tone: 0, value: 1e20 });
    assert!(matches!(
        expander().expand(&ModulationParameters::new([0.0, 0.0, 3e8], [0.0; 3])),
        Err(SpectrumError::DepthOutOfRange { tone: 2, .. })
    ));
}

#[test]
fn depth_at_the_limit_expands() {
    let spectrum = expander()
        .expand(&ModulationParameters::new([MAX_DEPTH, 0.0, 0.0], [0.0; 3]))
        .expect("limit is inclusive");
    assert!((spectrum.amplitude(0).re - bessel_j(0, MAX_DEPTH)).abs() < 1e-12);
    assert!(spectrum.total_power() < 1.0);
}

#[test]
fn non_finite_phase_is_rejected() {
    let err = expander()
        .expand(&ModulationParameters::new([0.5, 0.1, 0.0], [f64::NAN, 0.0, 0.0]))
        .unwrap_err();
    assert!(matches!(err, SpectrumError::NonFinite { quantity: "phase", tone: 0, .. }));
}

#[test]
fn invalid_settings_fail_at_construction() {
    assert_eq!(
        BesselExpander::new(0, 10, 1e-8).unwrap_err(),
        SpectrumError::InvalidTruncation
    );
    assert_eq!(
        BesselExpander::new(5, 0, 1e-8).unwrap_err(),
        SpectrumError::InvalidWindow
    );
    assert!(matches!(
        BesselExpander::new(5, 10, -1.0),
        Err(SpectrumError::InvalidThreshold(_))
    ));
}

#[test]
fn expansion_is_deterministic() {
    let params = ModulationParameters::new(
        [0.5911418, 0.57029264, 0.43456265],
        [2.35619449, 3.4906585, 0.32345053],
    );
    let first = expander().expand(&params).expect("expansion");
    let second = expander().expand(&params).expect("expansion");
    assert_eq!(first, second);
}

#[test]
fn small_depths_conserve_power_within_the_window() {
    let spectrum = expander()
        .expand(&ModulationParameters::new([0.3, 0.2, 0.1], [0.5, 1.0, 1.5]))
        .expect("expansion");
    // A pure phase modulation is lossless; with small depths nothing leaks past ±10.
    assert!((spectrum.total_power() - 1.0).abs() < 1e-6);
}
