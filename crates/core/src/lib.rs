//! Sideband synthesis and parameter search for a dual-arm Mach-Zehnder
//! modulator driven by three harmonic tones per arm.

pub mod analyzer;
pub mod bessel;
pub mod combiner;
pub mod design;
pub mod expander;
pub mod io;
pub mod metrics;
pub mod objective;
pub mod params;
pub mod search;
pub mod spectrum;
pub mod summary;

#[cfg(test)]
mod _tests_design;
#[cfg(test)]
mod _tests_expander;
#[cfg(test)]
mod _tests_io;
#[cfg(test)]
mod _tests_search;
