//! CPU suite orchestrator
//!
//! Warm-up, then a single-core stability loop timing each kernel on the
//! calling thread, then a multi-core loop fanning the fractal kernel out to
//! one worker per logical core. Every iteration lands in a history so drift
//! across the run stays visible.

use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::barrier::{prevent_elimination, prevent_reordering, timed};
use crate::calibration::{Calibration, CalibrationError, KernelTimings, ScoreHistory};
use crate::clock::{as_millis_f64, Clock};
use crate::kernels::{Kernel, Workloads};
use crate::progress::RunOptions;

/// Worker count used when the core count cannot be determined.
pub const FALLBACK_THREADS: usize = 4;

/// CPU suite errors
#[derive(Error, Debug)]
pub enum SuiteError {
    #[error("Iteration count must be at least 1")]
    NoIterations,

    #[error("Worker thread count must be at least 1")]
    NoThreads,

    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    #[error("Failed to spawn worker thread in multi-core iteration {iteration}: {source}")]
    WorkerSpawn {
        iteration: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker {worker} panicked in multi-core iteration {iteration}")]
    WorkerPanicked { iteration: usize, worker: usize },
}

/// Loop configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteConfig {
    /// Timed iterations for both the single-core and the multi-core loop
    #[serde(default = "default_iterations")]
    pub iterations: usize,

    /// Untimed passes over every kernel before measuring
    #[serde(default = "default_warmup_passes")]
    pub warmup_passes: usize,

    /// Worker threads for the multi-core loop (default: logical core count)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            warmup_passes: default_warmup_passes(),
            threads: None,
        }
    }
}

fn default_iterations() -> usize {
    10
}

fn default_warmup_passes() -> usize {
    1
}

impl SuiteConfig {
    pub fn validate(&self) -> Result<(), SuiteError> {
        if self.iterations == 0 {
            return Err(SuiteError::NoIterations);
        }
        if self.threads == Some(0) {
            return Err(SuiteError::NoThreads);
        }
        Ok(())
    }

    /// Configured worker count, else the logical core count, else [`FALLBACK_THREADS`].
    pub fn resolve_threads(&self) -> usize {
        self.threads.unwrap_or_else(|| {
            thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(FALLBACK_THREADS)
        })
    }
}

/// CPU suite output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scores {
    pub single_core: f64,
    pub multi_core: f64,
    pub single_core_history: ScoreHistory,
    pub multi_core_history: ScoreHistory,
    /// Mean duration per kernel over all iterations
    pub kernel_timings: KernelTimings,
    /// Iterations in which LU decomposition hit a singular pivot
    pub lu_failures: usize,
    pub threads: usize,
}

/// Runs the CPU suite against a set of workloads and a clock.
pub struct CpuSuite<W, C> {
    config: SuiteConfig,
    calibration: Calibration,
    workloads: W,
    clock: C,
}

impl<W: Workloads, C: Clock> CpuSuite<W, C> {
    pub fn new(
        config: SuiteConfig,
        calibration: Calibration,
        workloads: W,
        clock: C,
    ) -> Result<Self, SuiteError> {
        config.validate()?;
        calibration.validate()?;
        Ok(Self {
            config,
            calibration,
            workloads,
            clock,
        })
    }

    /// Progress steps `run_full_suite` reports.
    pub fn total_steps(&self) -> usize {
        1 + self.config.iterations * 2
    }

    pub fn run_full_suite(&self, options: &RunOptions) -> Result<Scores, SuiteError> {
        let iterations = self.config.iterations;
        let threads = self.config.resolve_threads();
        let total_steps = self.total_steps();
        let mut step = 0;

        info!(iterations, threads, "Starting CPU suite");

        options.report(step, total_steps, "Warming up");
        self.warm_up();
        step += 1;

        let mut single_core_history = ScoreHistory::with_capacity(iterations);
        let mut sums = KernelTimings::default();
        let mut lu_failures = 0;

        for iteration in 0..iterations {
            let (timings, lu_failed) = self.run_single_core_iteration();
            if lu_failed {
                lu_failures += 1;
                warn!(iteration, "LU decomposition hit a singular pivot");
            }
            for kernel in Kernel::SINGLE_CORE {
                let ms = timings.get(kernel).unwrap_or(0.0);
                sums.set(kernel, sums.get(kernel).unwrap_or(0.0) + ms);
            }

            let score = self.calibration.single_core_score(&timings);
            debug!(iteration, score, ?timings, "Single-core iteration");
            single_core_history.push(score);

            step += 1;
            options.report(
                step,
                total_steps,
                &format!("Single-core {}/{}", iteration + 1, iterations),
            );
        }

        let mut multi_core_history = ScoreHistory::with_capacity(iterations);
        let mut fan_out_total = Duration::ZERO;

        for iteration in 0..iterations {
            let elapsed = self.run_multi_core_iteration(iteration, threads)?;
            fan_out_total += elapsed;

            let score = self.calibration.multi_core_score(elapsed);
            debug!(
                iteration,
                score,
                elapsed_ms = as_millis_f64(elapsed),
                "Multi-core iteration"
            );
            multi_core_history.push(score);

            step += 1;
            options.report(
                step,
                total_steps,
                &format!("Multi-core {}/{}", iteration + 1, iterations),
            );
        }

        let mut kernel_timings = KernelTimings::default();
        for kernel in Kernel::SINGLE_CORE {
            kernel_timings.set(kernel, sums.get(kernel).unwrap_or(0.0) / iterations as f64);
        }
        kernel_timings.set(
            Kernel::Mandelbrot,
            as_millis_f64(fan_out_total) / iterations as f64,
        );

        let scores = Scores {
            single_core: single_core_history.mean(),
            multi_core: multi_core_history.mean(),
            single_core_history,
            multi_core_history,
            kernel_timings,
            lu_failures,
            threads,
        };

        info!(
            single_core = scores.single_core,
            multi_core = scores.multi_core,
            "CPU suite complete"
        );
        Ok(scores)
    }

    /// Run every kernel untimed to settle clocks and caches.
    pub fn warm_up(&self) {
        for _ in 0..self.config.warmup_passes {
            for kernel in Kernel::ALL {
                prevent_elimination(self.workloads.run(kernel));
            }
        }
    }

    /// Time each single-core kernel once. Also reports whether LU was singular.
    ///
    /// A singular LU run still contributes its duration.
    pub fn run_single_core_iteration(&self) -> (KernelTimings, bool) {
        let mut timings = KernelTimings::default();
        let mut lu_failed = false;

        for kernel in Kernel::SINGLE_CORE {
            let (output, elapsed) = timed(&self.clock, || self.workloads.run(kernel));
            lu_failed |= output.is_failure();
            timings.set(kernel, as_millis_f64(elapsed));
        }

        (timings, lu_failed)
    }

    /// Spawn `threads` fractal workers, join them all, and return the span.
    ///
    /// Any worker that fails to start or panics fails the iteration.
    pub fn run_multi_core_iteration(
        &self,
        iteration: usize,
        threads: usize,
    ) -> Result<Duration, SuiteError> {
        let workloads = &self.workloads;

        let start = self.clock.now();
        prevent_reordering();

        let outcome = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(threads);
            let mut spawn_error = None;

            for worker in 0..threads {
                let spawned = thread::Builder::new()
                    .name(format!("fan-out-{worker}"))
                    .spawn_scoped(scope, move || {
                        prevent_elimination(workloads.run(Kernel::Mandelbrot));
                    });
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(source) => {
                        spawn_error = Some(source);
                        break;
                    }
                }
            }

            // Join everything before deciding, so no panic escapes the scope.
            let mut panicked = None;
            for (worker, handle) in handles.into_iter().enumerate() {
                if handle.join().is_err() && panicked.is_none() {
                    panicked = Some(worker);
                }
            }

            if let Some(source) = spawn_error {
                return Err(SuiteError::WorkerSpawn { iteration, source });
            }
            match panicked {
                Some(worker) => Err(SuiteError::WorkerPanicked { iteration, worker }),
                None => Ok(()),
            }
        });

        prevent_reordering();
        let elapsed = self.clock.now().saturating_sub(start);

        outcome.map(|()| elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::ReferenceTimings;
    use crate::clock::{ManualClock, MonotonicClock};
    use crate::kernels::{KernelOutput, KernelSet, ProblemSizes};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Workloads that take exactly their reference time on a manual clock.
    struct ScriptedWorkloads<'a> {
        clock: &'a ManualClock,
        reference: ReferenceTimings,
        lu_singular: bool,
        panic_in_fractal: bool,
        calls: AtomicUsize,
    }

    impl<'a> ScriptedWorkloads<'a> {
        fn new(clock: &'a ManualClock) -> Self {
            Self {
                clock,
                reference: ReferenceTimings::default(),
                lu_singular: false,
                panic_in_fractal: false,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Workloads for ScriptedWorkloads<'_> {
        fn run(&self, kernel: Kernel) -> KernelOutput {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let ms = self.reference.get(kernel) as u64;
            self.clock.advance(Duration::from_millis(ms));
            match kernel {
                Kernel::LuDecomposition => KernelOutput::Factored(!self.lu_singular),
                Kernel::Mandelbrot if self.panic_in_fractal => panic!("fractal worker failed"),
                _ => KernelOutput::Encoded(0),
            }
        }
    }

    fn config(iterations: usize, warmup_passes: usize, threads: usize) -> SuiteConfig {
        SuiteConfig {
            iterations,
            warmup_passes,
            threads: Some(threads),
        }
    }

    #[test]
    fn test_default_suite_config() {
        let config = SuiteConfig::default();
        assert_eq!(config.iterations, 10);
        assert_eq!(config.warmup_passes, 1);
        assert_eq!(config.threads, None);
        assert!(config.resolve_threads() >= 1);
    }

    #[test]
    fn reference_speed_scores_exactly_1000() {
        let clock = ManualClock::new();
        let workloads = ScriptedWorkloads::new(&clock);
        let suite =
            CpuSuite::new(config(1, 0, 1), Calibration::default(), &workloads, &clock).unwrap();

        let scores = suite.run_full_suite(&RunOptions::quiet()).unwrap();

        assert_eq!(scores.single_core_history.as_slice(), &[1000.0]);
        assert_eq!(scores.multi_core_history.as_slice(), &[1000.0]);
        assert_eq!(scores.single_core, 1000.0);
        assert_eq!(scores.multi_core, 1000.0);
        assert_eq!(scores.kernel_timings.get(Kernel::IntegerMix), Some(647.0));
        assert_eq!(scores.kernel_timings.get(Kernel::Mandelbrot), Some(11_516.0));
    }

    #[test]
    fn history_lengths_match_iteration_count() {
        let clock = ManualClock::new();
        let workloads = ScriptedWorkloads::new(&clock);
        let suite =
            CpuSuite::new(config(7, 0, 2), Calibration::default(), &workloads, &clock).unwrap();

        let scores = suite.run_full_suite(&RunOptions::quiet()).unwrap();

        assert_eq!(scores.single_core_history.len(), 7);
        assert_eq!(scores.multi_core_history.len(), 7);
        assert_eq!(scores.threads, 2);
    }

    #[test]
    fn fan_out_span_covers_every_worker() {
        // Each worker advances the shared clock, so four workers read as 4x slower.
        let clock = ManualClock::new();
        let workloads = ScriptedWorkloads::new(&clock);
        let suite =
            CpuSuite::new(config(1, 0, 4), Calibration::default(), &workloads, &clock).unwrap();

        let elapsed = suite.run_multi_core_iteration(0, 4).unwrap();
        assert_eq!(elapsed, Duration::from_millis(4 * 11_516));
        assert_eq!(workloads.calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn warm_up_runs_every_kernel_untimed() {
        let clock = ManualClock::new();
        let workloads = ScriptedWorkloads::new(&clock);
        let suite =
            CpuSuite::new(config(1, 2, 1), Calibration::default(), &workloads, &clock).unwrap();

        suite.warm_up();
        assert_eq!(workloads.calls.load(Ordering::SeqCst), 2 * Kernel::ALL.len());

        // Warm-up time never reaches the history.
        let scores = suite.run_full_suite(&RunOptions::quiet()).unwrap();
        assert_eq!(scores.single_core_history.as_slice(), &[1000.0]);
    }

    #[test]
    fn singular_lu_is_counted_but_keeps_history() {
        let clock = ManualClock::new();
        let mut workloads = ScriptedWorkloads::new(&clock);
        workloads.lu_singular = true;
        let suite =
            CpuSuite::new(config(3, 0, 1), Calibration::default(), &workloads, &clock).unwrap();

        let scores = suite.run_full_suite(&RunOptions::quiet()).unwrap();

        assert_eq!(scores.lu_failures, 3);
        assert_eq!(scores.single_core_history.len(), 3);
        assert_eq!(scores.single_core, 1000.0);
    }

    #[test]
    fn worker_panic_fails_the_suite() {
        let clock = ManualClock::new();
        let mut workloads = ScriptedWorkloads::new(&clock);
        workloads.panic_in_fractal = true;
        let suite =
            CpuSuite::new(config(2, 0, 3), Calibration::default(), &workloads, &clock).unwrap();

        let err = suite.run_full_suite(&RunOptions::quiet()).unwrap_err();
        assert!(matches!(
            err,
            SuiteError::WorkerPanicked {
                iteration: 0,
                worker: 0
            }
        ));
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let clock = ManualClock::new();
        let workloads = ScriptedWorkloads::new(&clock);

        let no_iterations = CpuSuite::new(config(0, 0, 1), Calibration::default(), &workloads, &clock);
        assert!(matches!(no_iterations, Err(SuiteError::NoIterations)));

        let no_threads = CpuSuite::new(config(1, 0, 0), Calibration::default(), &workloads, &clock);
        assert!(matches!(no_threads, Err(SuiteError::NoThreads)));

        let mut calibration = Calibration::default();
        calibration.reference.compression_ms = -1.0;
        let bad_reference = CpuSuite::new(config(1, 0, 1), calibration, &workloads, &clock);
        assert!(matches!(bad_reference, Err(SuiteError::Calibration(_))));
    }

    #[test]
    fn real_kernels_produce_finite_scores() {
        let sizes = ProblemSizes {
            matrix: 32,
            integer_rounds: 20_000,
            lu: 24,
            compression: 10_000,
            fractal_size: 24,
            fractal_iterations: 50,
        };
        let suite = CpuSuite::new(
            config(3, 1, 2),
            Calibration::default(),
            KernelSet::new(sizes),
            MonotonicClock::new(),
        )
        .unwrap();

        let scores = suite.run_full_suite(&RunOptions::quiet()).unwrap();

        assert_eq!(scores.single_core_history.len(), 3);
        assert_eq!(scores.multi_core_history.len(), 3);
        assert_eq!(scores.lu_failures, 0);
        assert!(scores.single_core.is_finite() && scores.single_core > 0.0);
        assert!(scores.multi_core.is_finite() && scores.multi_core > 0.0);
    }
}
