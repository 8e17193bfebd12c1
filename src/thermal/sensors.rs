//! Temperature-sensor thermal source
//!
//! Used on platforms without a native thermal-status API. Readings come from
//! `sysinfo` components (hwmon on Linux, SMC on macOS, WMI on Windows).

use sysinfo::Components;

use super::{ThermalLevel, ThermalSensor};

/// Temperature bands, in degrees Celsius, for each elevated level.
const LEVEL_BANDS: [(f32, ThermalLevel); 6] = [
    (60.0, ThermalLevel::Light),
    (70.0, ThermalLevel::Moderate),
    (80.0, ThermalLevel::Severe),
    (90.0, ThermalLevel::Critical),
    (95.0, ThermalLevel::Emergency),
    (100.0, ThermalLevel::Shutdown),
];

/// Map a temperature onto a thermal level.
///
/// A reading at or past the sensor's own critical threshold is at least
/// [`ThermalLevel::Critical`].
pub fn level_from_celsius(celsius: f32, critical: Option<f32>) -> ThermalLevel {
    let banded = LEVEL_BANDS
        .iter()
        .rev()
        .find(|(threshold, _)| celsius >= *threshold)
        .map(|(_, level)| *level)
        .unwrap_or(ThermalLevel::None);

    match critical {
        Some(limit) if limit > 0.0 && celsius >= limit => banded.max(ThermalLevel::Critical),
        _ => banded,
    }
}

/// Hottest valid reading across all components, with its critical threshold.
pub fn hottest_component_celsius() -> Option<(f32, Option<f32>)> {
    let components = Components::new_with_refreshed_list();
    components
        .list()
        .iter()
        .filter_map(|component| {
            let celsius = component.temperature()?;
            (celsius.is_finite() && celsius > 0.0).then_some((celsius, component.critical()))
        })
        .max_by(|a, b| a.0.total_cmp(&b.0))
}

/// Thermal status derived from the hottest temperature sensor.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComponentSensor;

impl ComponentSensor {
    /// `Some` if at least one sensor currently reports a temperature.
    pub fn detect() -> Option<Self> {
        hottest_component_celsius().map(|_| ComponentSensor)
    }
}

impl ThermalSensor for ComponentSensor {
    fn current_status(&self) -> Option<ThermalLevel> {
        let (celsius, critical) = hottest_component_celsius()?;
        Some(level_from_celsius(celsius, critical))
    }

    fn name(&self) -> &str {
        "temperature sensors"
    }
}
