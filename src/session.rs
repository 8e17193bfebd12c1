//! Benchmark session
//!
//! One session is one pass through the whole pipeline: thermal gate, CPU
//! suite, memory probe, then the optional rendering suite. Failures never
//! escape as errors; they are folded into the [`BenchmarkResult`] the host
//! receives.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::calibration::{KernelTimings, ScoreHistory};
use crate::clock::MonotonicClock;
use crate::config::Config;
use crate::cpu_suite::{CpuSuite, Scores, SuiteError};
use crate::device::DeviceInfo;
use crate::kernels::KernelSet;
use crate::memory::{MemoryError, MemoryProbe, MemoryScores};
use crate::progress::RunOptions;
use crate::render::{RenderingSuite, SoftwareSurface};
use crate::thermal::{
    GateDecision, ThermalCapability, ThermalGate, ThermalMonitor, ThermalPoint, ThermalState,
};

pub const THERMAL_ABORT_MESSAGE: &str =
    "Device is too hot. Please let it cool down and try again.";

/// Reasons a session stops after the gate let it through.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("CPU benchmark failed: {0}")]
    Cpu(#[from] SuiteError),

    #[error("Memory benchmark failed: {0}")]
    Memory(#[from] MemoryError),
}

/// Everything one session produced, in the shape the host app consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkResult {
    pub id: Uuid,
    pub success: bool,
    pub message: String,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub thermal_state: ThermalState,

    pub single_core: f64,
    pub multi_core: f64,
    pub ram_score: f64,
    #[serde(rename = "ramGBs")]
    pub ram_gbs: f64,
    #[serde(rename = "l1GBs")]
    pub l1_gbs: f64,
    #[serde(rename = "l2GBs")]
    pub l2_gbs: f64,
    pub single_core_history: ScoreHistory,
    pub multi_core_history: ScoreHistory,

    pub kernel_timings: KernelTimings,
    pub lu_failures: usize,
    pub threads: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_score: Option<f64>,
    #[serde(default)]
    pub thermal_history: Vec<ThermalPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceInfo>,
}

impl BenchmarkResult {
    fn empty(started_at: DateTime<Utc>, thermal_state: ThermalState) -> Self {
        Self {
            id: Uuid::new_v4(),
            success: false,
            message: String::new(),
            started_at,
            duration_secs: 0.0,
            thermal_state,
            single_core: 0.0,
            multi_core: 0.0,
            ram_score: 0.0,
            ram_gbs: 0.0,
            l1_gbs: 0.0,
            l2_gbs: 0.0,
            single_core_history: ScoreHistory::default(),
            multi_core_history: ScoreHistory::default(),
            kernel_timings: KernelTimings::default(),
            lu_failures: 0,
            threads: 0,
            render_score: None,
            thermal_history: Vec::new(),
            device: None,
        }
    }

    fn apply_cpu(&mut self, scores: Scores) {
        self.single_core = scores.single_core;
        self.multi_core = scores.multi_core;
        self.single_core_history = scores.single_core_history;
        self.multi_core_history = scores.multi_core_history;
        self.kernel_timings = scores.kernel_timings;
        self.lu_failures = scores.lu_failures;
        self.threads = scores.threads;
    }

    fn apply_memory(&mut self, scores: MemoryScores) {
        self.ram_score = scores.ram_score;
        self.ram_gbs = scores.ram_gbs;
        self.l1_gbs = scores.l1_gbs;
        self.l2_gbs = scores.l2_gbs;
    }

    /// Highest temperature the monitor recorded, if any.
    pub fn peak_celsius(&self) -> Option<f32> {
        self.thermal_history
            .iter()
            .map(|point| point.celsius)
            .reduce(f32::max)
    }
}

/// A configured, not yet started benchmark run.
pub struct BenchmarkSession {
    config: Config,
    capability: Option<ThermalCapability>,
    detect_device: bool,
}

impl BenchmarkSession {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            capability: None,
            detect_device: true,
        }
    }

    /// Use `capability` instead of probing the platform.
    pub fn with_capability(mut self, capability: ThermalCapability) -> Self {
        self.capability = Some(capability);
        self
    }

    /// Skip attaching a [`DeviceInfo`] to the result.
    pub fn without_device_info(mut self) -> Self {
        self.detect_device = false;
        self
    }

    pub fn run(self, options: &RunOptions) -> BenchmarkResult {
        let started_at = Utc::now();
        let timer = Instant::now();

        let capability = match self.capability {
            Some(capability) => capability,
            None => ThermalCapability::probe(),
        };
        debug!(?capability, "Thermal capability resolved");

        let gate = ThermalGate::new(capability, self.config.gate.action);
        let decision = gate.check();

        let mut result = BenchmarkResult::empty(started_at, decision.state());
        if self.detect_device {
            result.device = match DeviceInfo::detect() {
                Ok(device) => Some(device),
                Err(err) => {
                    debug!(error = %err, "Device detection failed");
                    None
                }
            };
        }

        if !decision.should_run() {
            result.message = THERMAL_ABORT_MESSAGE.to_string();
            result.duration_secs = timer.elapsed().as_secs_f64();
            return result;
        }

        let mut monitor = self.config.gate.monitor.then(|| {
            ThermalMonitor::start(Duration::from_millis(
                self.config.gate.monitor_interval_ms.max(1),
            ))
        });

        let outcome = run_suites(&self.config, options, &mut result);

        if let Some(monitor) = monitor.as_mut() {
            result.thermal_history = monitor.finish();
        }
        result.duration_secs = timer.elapsed().as_secs_f64();

        match outcome {
            Ok(()) => {
                result.success = true;
                result.message = completion_message(decision);
                info!(
                    id = %result.id,
                    single_core = result.single_core,
                    multi_core = result.multi_core,
                    ram_score = result.ram_score,
                    "Benchmark complete"
                );
            }
            Err(err) => {
                warn!(error = %err, "Benchmark failed");
                result.message = err.to_string();
            }
        }

        result
    }
}

/// Run with the default configuration and the platform thermal source.
pub fn run_full_benchmark() -> BenchmarkResult {
    BenchmarkSession::new(Config::default()).run(&RunOptions::default())
}

fn run_suites(
    config: &Config,
    options: &RunOptions,
    result: &mut BenchmarkResult,
) -> Result<(), SessionError> {
    let suite = CpuSuite::new(
        config.suite,
        config.calibration,
        KernelSet::new(config.sizes),
        MonotonicClock::new(),
    )?;
    result.apply_cpu(suite.run_full_suite(options)?);

    options.report(0, 0, "Measuring memory bandwidth");
    let probe = MemoryProbe::new(config.memory, MonotonicClock::new())?;
    result.apply_memory(probe.run_memory_suite()?);

    if config.render.enabled {
        options.report(0, 0, "Rendering");
        let rendering = RenderingSuite::new(&config.render);
        let mut surface = SoftwareSurface::new(config.render.width, config.render.height);
        let clock = MonotonicClock::new();
        let score = rendering.run(&mut surface, &clock, |fps| {
            options.report(0, 0, &format!("Rendering: {fps} fps"));
        });
        result.render_score = Some(score);
    }

    Ok(())
}

fn completion_message(decision: GateDecision) -> String {
    match decision {
        GateDecision::ProceedWithWarning(level) => format!(
            "Benchmark completed, but thermal status was {level} at start; scores may be throttled."
        ),
        _ => "Benchmark completed successfully.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::ProblemSizes;
    use crate::memory::{MemoryConfig, TierConfig};
    use crate::thermal::tests::FixedSensor;
    use crate::thermal::{GateAction, ThermalLevel};

    fn small_config() -> Config {
        let mut config = Config::default();
        config.suite.iterations = 2;
        config.suite.warmup_passes = 0;
        config.suite.threads = Some(2);
        config.gate.monitor = false;
        config.sizes = ProblemSizes {
            matrix: 16,
            integer_rounds: 5_000,
            lu: 12,
            compression: 4_000,
            fractal_size: 16,
            fractal_iterations: 40,
        };
        config.memory = MemoryConfig {
            l1: TierConfig {
                buffer_bytes: 4 * 1024,
                iterations: 100,
            },
            l2: TierConfig {
                buffer_bytes: 64 * 1024,
                iterations: 20,
            },
            ram: TierConfig {
                buffer_bytes: 1024 * 1024,
                iterations: 2,
            },
            ..MemoryConfig::default()
        };
        config
    }

    fn session(config: Config, reading: Option<ThermalLevel>) -> BenchmarkSession {
        BenchmarkSession::new(config)
            .with_capability(ThermalCapability::Available(Box::new(FixedSensor(reading))))
            .without_device_info()
    }

    #[test]
    fn cool_device_completes() {
        let result = session(small_config(), Some(ThermalLevel::None)).run(&RunOptions::quiet());

        assert!(result.success, "{}", result.message);
        assert_eq!(result.thermal_state, ThermalState::Cool);
        assert_eq!(result.single_core_history.len(), 2);
        assert_eq!(result.multi_core_history.len(), 2);
        assert_eq!(result.threads, 2);
        assert!(result.single_core > 0.0 && result.multi_core > 0.0);
        assert!(result.ram_gbs > 0.0 && result.ram_score > 0.0);
        assert!(result.render_score.is_none());
        assert!(result.device.is_none());
    }

    #[test]
    fn unavailable_capability_is_treated_as_cool() {
        let result = BenchmarkSession::new(small_config())
            .with_capability(ThermalCapability::Unavailable)
            .without_device_info()
            .run(&RunOptions::quiet());

        assert!(result.success);
        assert_eq!(result.thermal_state, ThermalState::Cool);
    }

    #[test]
    fn hot_device_aborts_before_running() {
        let mut config = small_config();
        config.gate.action = GateAction::Abort;

        let result = session(config, Some(ThermalLevel::Severe)).run(&RunOptions::quiet());

        assert!(!result.success);
        assert_eq!(result.message, THERMAL_ABORT_MESSAGE);
        assert_eq!(result.thermal_state, ThermalState::ThrottleRisk);
        assert!(result.single_core_history.is_empty());
        assert_eq!(result.single_core, 0.0);
    }

    #[test]
    fn warm_device_runs_with_warning() {
        let result = session(small_config(), Some(ThermalLevel::Moderate)).run(&RunOptions::quiet());

        assert!(result.success);
        assert_eq!(result.thermal_state, ThermalState::ThrottleRisk);
        assert!(result.message.contains("moderate"), "{}", result.message);
        assert_eq!(result.single_core_history.len(), 2);
    }

    #[test]
    fn cpu_suite_error_is_reported() {
        let mut config = small_config();
        config.suite.iterations = 0;

        let result = session(config, None).run(&RunOptions::quiet());

        assert!(!result.success);
        assert!(result.message.contains("Iteration count"), "{}", result.message);
        assert_eq!(result.ram_score, 0.0);
    }

    #[test]
    fn memory_failure_keeps_cpu_scores() {
        let mut config = small_config();
        config.memory.ram = TierConfig {
            buffer_bytes: usize::MAX / 2,
            iterations: 1,
        };

        let result = session(config, None).run(&RunOptions::quiet());

        assert!(!result.success);
        assert!(result.message.starts_with("Memory benchmark failed"));
        assert!(result.message.contains("RAM"), "{}", result.message);
        assert_eq!(result.single_core_history.len(), 2);
        assert!(result.single_core > 0.0);
    }

    #[test]
    fn rendering_runs_when_enabled() {
        let mut config = small_config();
        config.render.enabled = true;
        config.render.duration_ms = 50;
        config.render.width = 16;
        config.render.height = 16;

        let result = session(config, None).run(&RunOptions::quiet());

        assert!(result.success);
        assert!(result.render_score.is_some_and(|score| score > 0.0));
    }

    #[test]
    fn result_uses_host_field_names() {
        let mut result = BenchmarkResult::empty(Utc::now(), ThermalState::Cool);
        result.single_core_history.push(1000.0);
        result.thermal_history.push(ThermalPoint {
            elapsed_ms: 500,
            celsius: 48.5,
        });
        let json = serde_json::to_value(&result).unwrap();

        for field in [
            "success",
            "message",
            "singleCore",
            "multiCore",
            "ramScore",
            "ramGBs",
            "l1GBs",
            "l2GBs",
            "singleCoreHistory",
            "multiCoreHistory",
            "startedAt",
            "thermalState",
            "kernelTimings",
            "luFailures",
            "thermalHistory",
        ] {
            assert!(json.get(field).is_some(), "missing {field}");
        }
        assert_eq!(json["singleCoreHistory"][0], 1000.0);
        assert_eq!(json["thermalState"], "cool");
        assert!(json.get("renderScore").is_none());
        assert!(json.get("device").is_none());

        let back: BenchmarkResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn peak_celsius_is_highest_sample() {
        let mut result = BenchmarkResult::empty(Utc::now(), ThermalState::Cool);
        assert_eq!(result.peak_celsius(), None);
        for (elapsed_ms, celsius) in [(0, 41.0), (500, 57.5), (1000, 52.0)] {
            result.thermal_history.push(ThermalPoint {
                elapsed_ms,
                celsius,
            });
        }
        assert_eq!(result.peak_celsius(), Some(57.5));
    }
}
