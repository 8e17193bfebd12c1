//! Thermal gate
//!
//! Decides whether a benchmark run should start, based on the platform's
//! thermal status if one can be obtained. Probing fails open: a missing or
//! broken sensor is treated as "cool".

#[cfg(target_os = "android")]
mod android;
mod monitor;
mod sensors;

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

pub use monitor::{ThermalMonitor, ThermalPoint};
pub use sensors::{hottest_component_celsius, level_from_celsius, ComponentSensor};

/// Platform thermal status, coolest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThermalLevel {
    None,
    Light,
    Moderate,
    Severe,
    Critical,
    Emergency,
    Shutdown,
}

impl ThermalLevel {
    /// Lowest level that counts as elevated.
    pub const ELEVATED: ThermalLevel = ThermalLevel::Light;

    /// Map the platform status codes (0 = none .. 6 = shutdown).
    pub fn from_status_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(ThermalLevel::None),
            1 => Some(ThermalLevel::Light),
            2 => Some(ThermalLevel::Moderate),
            3 => Some(ThermalLevel::Severe),
            4 => Some(ThermalLevel::Critical),
            5 => Some(ThermalLevel::Emergency),
            6 => Some(ThermalLevel::Shutdown),
            _ => None,
        }
    }

    pub fn is_elevated(&self) -> bool {
        *self >= Self::ELEVATED
    }
}

impl fmt::Display for ThermalLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ThermalLevel::None => "none",
            ThermalLevel::Light => "light",
            ThermalLevel::Moderate => "moderate",
            ThermalLevel::Severe => "severe",
            ThermalLevel::Critical => "critical",
            ThermalLevel::Emergency => "emergency",
            ThermalLevel::Shutdown => "shutdown",
        };
        f.write_str(label)
    }
}

/// A resolved thermal status source.
pub trait ThermalSensor: Send + Sync {
    /// Current status, or `None` if this query failed.
    fn current_status(&self) -> Option<ThermalLevel>;

    fn name(&self) -> &str;
}

/// Outcome of probing for a thermal sensor, resolved once per session.
pub enum ThermalCapability {
    Available(Box<dyn ThermalSensor>),
    Unavailable,
}

impl fmt::Debug for ThermalCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThermalCapability::Available(sensor) => {
                f.debug_tuple("Available").field(&sensor.name()).finish()
            }
            ThermalCapability::Unavailable => f.write_str("Unavailable"),
        }
    }
}

impl ThermalCapability {
    /// Probe the platform for a thermal source.
    pub fn probe() -> Self {
        #[cfg(target_os = "android")]
        {
            if let Some(sensor) = android::NdkThermalSensor::load() {
                return ThermalCapability::Available(Box::new(sensor));
            }
        }

        match ComponentSensor::detect() {
            Some(sensor) => ThermalCapability::Available(Box::new(sensor)),
            None => {
                debug!("No temperature sensors found; thermal gate fails open");
                ThermalCapability::Unavailable
            }
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, ThermalCapability::Available(_))
    }

    /// Current level. Unavailable capability or a failed query reads as `None`.
    pub fn query(&self) -> ThermalLevel {
        match self {
            ThermalCapability::Available(sensor) => sensor.current_status().unwrap_or_else(|| {
                debug!(sensor = sensor.name(), "Thermal query failed; treating as none");
                ThermalLevel::None
            }),
            ThermalCapability::Unavailable => ThermalLevel::None,
        }
    }
}

/// Gate state derived from the current level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThermalState {
    Cool,
    ThrottleRisk,
}

impl ThermalState {
    pub fn from_level(level: ThermalLevel) -> Self {
        if level.is_elevated() {
            ThermalState::ThrottleRisk
        } else {
            ThermalState::Cool
        }
    }
}

/// What the gate does when the device is at throttle risk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum GateAction {
    /// Run anyway and flag the result
    #[default]
    Warn,
    /// Refuse to run
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Proceed,
    ProceedWithWarning(ThermalLevel),
    Abort(ThermalLevel),
}

impl GateDecision {
    pub fn should_run(&self) -> bool {
        !matches!(self, GateDecision::Abort(_))
    }

    pub fn state(&self) -> ThermalState {
        match self {
            GateDecision::Proceed => ThermalState::Cool,
            GateDecision::ProceedWithWarning(_) | GateDecision::Abort(_) => {
                ThermalState::ThrottleRisk
            }
        }
    }
}

/// Thermal go/no-go check.
#[derive(Debug)]
pub struct ThermalGate {
    capability: ThermalCapability,
    action: GateAction,
}

impl ThermalGate {
    pub fn new(capability: ThermalCapability, action: GateAction) -> Self {
        Self { capability, action }
    }

    pub fn check(&self) -> GateDecision {
        if !self.capability.is_available() {
            info!("Thermal status unavailable; proceeding");
            return GateDecision::Proceed;
        }

        let level = self.capability.query();
        info!(%level, "Current thermal status");

        match (ThermalState::from_level(level), self.action) {
            (ThermalState::Cool, _) => GateDecision::Proceed,
            (ThermalState::ThrottleRisk, GateAction::Warn) => {
                warn!(%level, "Device is warm; results may be throttled");
                GateDecision::ProceedWithWarning(level)
            }
            (ThermalState::ThrottleRisk, GateAction::Abort) => {
                warn!(%level, "Device is too hot; aborting benchmark");
                GateDecision::Abort(level)
            }
        }
    }
}
