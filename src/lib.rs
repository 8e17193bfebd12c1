//! corebench - calibrated synthetic device benchmark
//!
//! Runs a fixed set of CPU kernels single-threaded and fanned out across
//! every core, probes memory bandwidth per cache tier, and optionally times a
//! rendering loop. Scores are ratios against reference timings from a
//! baseline device, so 1000 means "as fast as the baseline".
//!
//! A thermal gate checks the platform status first; a warm device either
//! gets a flagged result or no run at all, depending on configuration.

pub mod barrier;
pub mod calibration;
pub mod clock;
pub mod config;
pub mod cpu_suite;
pub mod device;
pub mod kernels;
pub mod memory;
pub mod progress;
pub mod render;
pub mod report;
pub mod session;
pub mod thermal;

pub use calibration::{Calibration, ReferenceTimings};
pub use config::Config;
pub use progress::{ProgressUpdate, RunOptions};
pub use session::{run_full_benchmark, BenchmarkResult, BenchmarkSession};
pub use thermal::{GateAction, ThermalCapability, ThermalLevel, ThermalState};
