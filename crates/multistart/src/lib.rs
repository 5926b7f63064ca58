//! trimod multi-start driver: parallel local refinement from a grid of starts.
//!
//! This crate refines one modulator design from many starting points at once.
//! It handles:
//!
//! - **Start grid definition**: ranges or value lists per free parameter
//! - **Start expansion**: Cartesian expansion of the grid into start vectors
//! - **Thread pool management**: rayon pool with a configurable thread count
//! - **Progress tracking**: a single progress bar without per-thread noise
//! - **Ranked output**: one CSV row per start, best score first
//!
//! # Usage
//!
//! The driver reads a design TOML file extended with a `[multistart]` section,
//! which marks it as a multi-start request, and `[[starts.axes]]` entries that
//! name a free parameter and its starting values.

pub mod config;
pub mod driver;
pub mod expansion;
pub mod output;

pub use config::{ConfigError, MultiStartConfig, OutputConfig, RangeSpec, StartAxis, StartGrid};
pub use driver::{DriverError, DriverStats, MultiStartDriver, StartResult};
pub use expansion::{expand_starts, ExpandedStart};
pub use output::OutputWriter;
