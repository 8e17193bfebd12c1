//! Timing calibration and scoring
//!
//! Measured durations are turned into dimensionless ratios against reference
//! timings captured once on a baseline device (a Huawei P30 Lite). Scores are
//! comparable across runs of the same build, not across builds with different
//! reference sets.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::clock::as_millis_f64;
use crate::kernels::Kernel;

/// Calibration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("Reference timing for {kernel} must be strictly positive (got {value_ms} ms)")]
    NonPositiveReference { kernel: Kernel, value_ms: f64 },

    #[error("Duration floor must be strictly positive (got {0} ms)")]
    NonPositiveFloor(f64),

    #[error("Score scale must be strictly positive (got {0})")]
    NonPositiveScale(f64),
}

/// Baseline durations in milliseconds.
///
/// `multi_core` is the wall-clock span of one full fractal fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceTimings {
    #[serde(default = "default_ref_matrix")]
    pub matrix_multiply_ms: f64,
    #[serde(default = "default_ref_integer")]
    pub integer_mix_ms: f64,
    #[serde(default = "default_ref_lu")]
    pub lu_decomposition_ms: f64,
    #[serde(default = "default_ref_compression")]
    pub compression_ms: f64,
    #[serde(default = "default_ref_multi")]
    pub multi_core_ms: f64,
}

impl Default for ReferenceTimings {
    fn default() -> Self {
        Self {
            matrix_multiply_ms: default_ref_matrix(),
            integer_mix_ms: default_ref_integer(),
            lu_decomposition_ms: default_ref_lu(),
            compression_ms: default_ref_compression(),
            multi_core_ms: default_ref_multi(),
        }
    }
}

fn default_ref_matrix() -> f64 {
    600.0
}

fn default_ref_integer() -> f64 {
    647.0
}

fn default_ref_lu() -> f64 {
    955.0
}

fn default_ref_compression() -> f64 {
    128.0
}

fn default_ref_multi() -> f64 {
    11_516.0
}

impl ReferenceTimings {
    /// Reference for `kernel`. The fractal kernel maps to the multi-core span.
    pub fn get(&self, kernel: Kernel) -> f64 {
        match kernel {
            Kernel::MatrixMultiply => self.matrix_multiply_ms,
            Kernel::IntegerMix => self.integer_mix_ms,
            Kernel::LuDecomposition => self.lu_decomposition_ms,
            Kernel::Compression => self.compression_ms,
            Kernel::Mandelbrot => self.multi_core_ms,
        }
    }

    pub fn validate(&self) -> Result<(), CalibrationError> {
        for kernel in Kernel::ALL {
            let value_ms = self.get(kernel);
            // NaN fails this comparison too.
            if !(value_ms > 0.0) {
                return Err(CalibrationError::NonPositiveReference { kernel, value_ms });
            }
        }
        Ok(())
    }
}

/// Immutable calibration set handed to the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    /// Measured durations are clamped up to this before division
    #[serde(default = "default_floor_ms")]
    pub floor_ms: f64,

    /// Multiplier turning a ratio into a human-scale number
    #[serde(default = "default_score_scale")]
    pub score_scale: f64,

    #[serde(default)]
    pub reference: ReferenceTimings,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            reference: ReferenceTimings::default(),
            floor_ms: default_floor_ms(),
            score_scale: default_score_scale(),
        }
    }
}

fn default_floor_ms() -> f64 {
    0.001
}

fn default_score_scale() -> f64 {
    1000.0
}

impl Calibration {
    pub fn new(
        reference: ReferenceTimings,
        floor_ms: f64,
        score_scale: f64,
    ) -> Result<Self, CalibrationError> {
        let calibration = Self {
            reference,
            floor_ms,
            score_scale,
        };
        calibration.validate()?;
        Ok(calibration)
    }

    pub fn validate(&self) -> Result<(), CalibrationError> {
        self.reference.validate()?;
        if !(self.floor_ms > 0.0) {
            return Err(CalibrationError::NonPositiveFloor(self.floor_ms));
        }
        if !(self.score_scale > 0.0) {
            return Err(CalibrationError::NonPositiveScale(self.score_scale));
        }
        Ok(())
    }

    /// reference / max(measured, floor)
    pub fn ratio(&self, kernel: Kernel, measured: Duration) -> f64 {
        self.reference.get(kernel) / as_millis_f64(measured).max(self.floor_ms)
    }

    /// Geometric mean of the four single-core ratios, scaled.
    pub fn single_core_score(&self, timings: &KernelTimings) -> f64 {
        let ratios = Kernel::SINGLE_CORE.map(|kernel| {
            let ms = timings.get(kernel).unwrap_or(0.0);
            self.reference.get(kernel) / ms.max(self.floor_ms)
        });
        geometric_mean(&ratios) * self.score_scale
    }

    /// Ratio of one fan-out span to the multi-core reference, scaled.
    pub fn multi_core_score(&self, fan_out: Duration) -> f64 {
        self.ratio(Kernel::Mandelbrot, fan_out) * self.score_scale
    }
}

/// nth root of the product of `values`. Empty input yields 0.
pub fn geometric_mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let product: f64 = values.iter().product();
    product.powf(1.0 / values.len() as f64)
}

/// Per-kernel durations in milliseconds.
///
/// Inside an iteration these are single measurements; in [`crate::cpu_suite::Scores`]
/// they are means over all iterations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KernelTimings {
    pub matrix_multiply_ms: Option<f64>,
    pub integer_mix_ms: Option<f64>,
    pub lu_decomposition_ms: Option<f64>,
    pub compression_ms: Option<f64>,
    pub multi_core_ms: Option<f64>,
}

impl KernelTimings {
    pub fn get(&self, kernel: Kernel) -> Option<f64> {
        match kernel {
            Kernel::MatrixMultiply => self.matrix_multiply_ms,
            Kernel::IntegerMix => self.integer_mix_ms,
            Kernel::LuDecomposition => self.lu_decomposition_ms,
            Kernel::Compression => self.compression_ms,
            Kernel::Mandelbrot => self.multi_core_ms,
        }
    }

    pub fn set(&mut self, kernel: Kernel, ms: f64) {
        let slot = match kernel {
            Kernel::MatrixMultiply => &mut self.matrix_multiply_ms,
            Kernel::IntegerMix => &mut self.integer_mix_ms,
            Kernel::LuDecomposition => &mut self.lu_decomposition_ms,
            Kernel::Compression => &mut self.compression_ms,
            Kernel::Mandelbrot => &mut self.multi_core_ms,
        };
        *slot = Some(ms);
    }
}

/// Append-only, iteration-ordered record of scores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreHistory {
    scores: Vec<f64>,
}

impl ScoreHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            scores: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, score: f64) {
        self.scores.push(score);
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.scores
    }

    /// Arithmetic mean; 0 for an empty history.
    pub fn mean(&self) -> f64 {
        if self.scores.is_empty() {
            return 0.0;
        }
        self.scores.iter().sum::<f64>() / self.scores.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timings(ms: [f64; 4]) -> KernelTimings {
        let mut t = KernelTimings::default();
        for (kernel, value) in Kernel::SINGLE_CORE.into_iter().zip(ms) {
            t.set(kernel, value);
        }
        t
    }

    #[test]
    fn test_default_reference_timings() {
        let reference = ReferenceTimings::default();
        assert_eq!(reference.get(Kernel::MatrixMultiply), 600.0);
        assert_eq!(reference.get(Kernel::IntegerMix), 647.0);
        assert_eq!(reference.get(Kernel::LuDecomposition), 955.0);
        assert_eq!(reference.get(Kernel::Compression), 128.0);
        assert_eq!(reference.get(Kernel::Mandelbrot), 11_516.0);
        assert!(reference.validate().is_ok());
    }

    #[test]
    fn geometric_mean_matches_fourth_root_of_product() {
        let cases: [[f64; 4]; 3] = [
            [1.0, 2.0, 3.0, 4.0],
            [0.5, 0.25, 8.0, 16.0],
            [1e-3, 1e3, 7.0, 0.9],
        ];
        for r in cases {
            let expected = (r[0] * r[1] * r[2] * r[3]).powf(0.25);
            let actual = geometric_mean(&r);
            assert!((actual - expected).abs() <= expected * 1e-12, "{r:?}");
        }
        assert_eq!(geometric_mean(&[]), 0.0);
    }

    #[test]
    fn matching_timings_score_exactly_scale() {
        let calibration = Calibration::default();
        let score = calibration.single_core_score(&timings([600.0, 647.0, 955.0, 128.0]));
        assert_eq!(score, 1000.0);
        assert_eq!(
            calibration.multi_core_score(Duration::from_millis(11_516)),
            1000.0
        );
    }

    #[test]
    fn score_decreases_as_any_duration_grows() {
        let calibration = Calibration::default();
        let base = [600.0, 647.0, 955.0, 128.0];
        let base_score = calibration.single_core_score(&timings(base));
        for idx in 0..4 {
            let mut slower = base;
            slower[idx] *= 1.5;
            let slower_score = calibration.single_core_score(&timings(slower));
            assert!(slower_score < base_score, "kernel {idx} did not lower the score");
        }
        let fast = calibration.multi_core_score(Duration::from_millis(100));
        let slow = calibration.multi_core_score(Duration::from_millis(200));
        assert!(slow < fast);
    }

    #[test]
    fn zero_duration_is_clamped_to_floor() {
        let calibration = Calibration::default();
        let ratio = calibration.ratio(Kernel::Compression, Duration::ZERO);
        assert!(ratio.is_finite());
        assert_eq!(ratio, 128.0 / 0.001);
    }

    #[test]
    fn non_positive_references_are_rejected() {
        let reference = ReferenceTimings {
            lu_decomposition_ms: 0.0,
            ..ReferenceTimings::default()
        };
        assert_eq!(
            reference.validate(),
            Err(CalibrationError::NonPositiveReference {
                kernel: Kernel::LuDecomposition,
                value_ms: 0.0
            })
        );

        let nan = ReferenceTimings {
            multi_core_ms: f64::NAN,
            ..ReferenceTimings::default()
        };
        assert!(nan.validate().is_err());

        assert_eq!(
            Calibration::new(ReferenceTimings::default(), 0.0, 1000.0),
            Err(CalibrationError::NonPositiveFloor(0.0))
        );
        assert_eq!(
            Calibration::new(ReferenceTimings::default(), 0.001, -1.0),
            Err(CalibrationError::NonPositiveScale(-1.0))
        );
    }

    #[test]
    fn history_keeps_order_and_averages() {
        let mut history = ScoreHistory::with_capacity(3);
        assert_eq!(history.mean(), 0.0);
        history.push(900.0);
        history.push(1000.0);
        history.push(1100.0);
        assert_eq!(history.len(), 3);
        assert_eq!(history.as_slice(), &[900.0, 1000.0, 1100.0]);
        assert_eq!(history.mean(), 1000.0);
    }

    #[test]
    fn history_serializes_as_plain_array() {
        let mut history = ScoreHistory::default();
        history.push(1.5);
        history.push(2.5);
        assert_eq!(serde_json::to_string(&history).unwrap(), "[1.5,2.5]");
    }
}
