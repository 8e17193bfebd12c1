//! Device description attached to benchmark results
//!
//! Detects CPU information using:
//! - Cross-platform: sysinfo crate
//! - Linux/Android: cpufreq sysfs for the maximum clock

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sysinfo::System;

/// Device information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// CPU name (e.g., "AMD Ryzen 7 5800X")
    pub cpu_name: String,
    /// CPU vendor
    pub vendor: String,
    /// Number of physical cores (if reported)
    pub cores: Option<usize>,
    /// Number of logical threads
    pub threads: usize,
    /// Current frequency in MHz (if available)
    pub frequency_mhz: Option<u64>,
    /// Max turbo/boost frequency in MHz (if available)
    pub max_frequency_mhz: Option<u64>,
    /// Target architecture of this build
    pub architecture: String,
    /// Total RAM in MB
    pub total_memory_mb: u64,
    /// Operating system
    pub os: String,
    /// OS version
    pub os_version: Option<String>,
}

impl DeviceInfo {
    /// Detect device information
    pub fn detect() -> Result<Self> {
        let mut sys = System::new();
        sys.refresh_cpu_all();
        sys.refresh_memory();

        let cpus = sys.cpus();
        if cpus.is_empty() {
            anyhow::bail!("No CPU detected");
        }

        let first_cpu = &cpus[0];
        let frequency_mhz = Some(first_cpu.frequency()).filter(|mhz| *mhz > 0);

        Ok(DeviceInfo {
            cpu_name: first_cpu.brand().trim().to_string(),
            vendor: first_cpu.vendor_id().to_string(),
            cores: sys.physical_core_count(),
            threads: cpus.len(),
            frequency_mhz,
            max_frequency_mhz: max_frequency_mhz(),
            architecture: std::env::consts::ARCH.to_string(),
            total_memory_mb: sys.total_memory() / 1024 / 1024,
            os: System::name().unwrap_or_else(|| "Unknown".to_string()),
            os_version: System::os_version(),
        })
    }

    /// One-line summary, e.g. "AMD Ryzen 7 5800X (8C/16T, x86_64)"
    pub fn summary(&self) -> String {
        let cores = self
            .cores
            .map(|c| format!("{c}C/"))
            .unwrap_or_default();
        let name = if self.cpu_name.is_empty() {
            "Unknown CPU"
        } else {
            self.cpu_name.as_str()
        };
        format!("{name} ({cores}{}T, {})", self.threads, self.architecture)
    }
}

/// Highest `cpufreq` ceiling across all cores, in MHz.
///
/// Big.LITTLE parts report a different ceiling per cluster, so cpu0 alone is
/// not enough.
#[cfg(any(target_os = "linux", target_os = "android"))]
fn max_frequency_mhz() -> Option<u64> {
    let entries = std::fs::read_dir("/sys/devices/system/cpu").ok()?;
    entries
        .flatten()
        .filter(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name.strip_prefix("cpu")
                .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
        })
        .filter_map(|entry| {
            let raw = std::fs::read_to_string(entry.path().join("cpufreq/cpuinfo_max_freq")).ok()?;
            parse_khz_as_mhz(&raw)
        })
        .max()
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn max_frequency_mhz() -> Option<u64> {
    None
}

#[cfg_attr(not(any(target_os = "linux", target_os = "android")), allow(dead_code))]
fn parse_khz_as_mhz(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok().map(|khz| khz / 1000).filter(|mhz| *mhz > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DeviceInfo {
        DeviceInfo {
            cpu_name: "AMD Ryzen 7 5800X".to_string(),
            vendor: "AuthenticAMD".to_string(),
            cores: Some(8),
            threads: 16,
            frequency_mhz: Some(3800),
            max_frequency_mhz: Some(4850),
            architecture: "x86_64".to_string(),
            total_memory_mb: 32_768,
            os: "Linux".to_string(),
            os_version: Some("6.8".to_string()),
        }
    }

    #[test]
    fn summary_includes_topology() {
        assert_eq!(sample().summary(), "AMD Ryzen 7 5800X (8C/16T, x86_64)");

        let unknown = DeviceInfo {
            cpu_name: String::new(),
            cores: None,
            ..sample()
        };
        assert_eq!(unknown.summary(), "Unknown CPU (16T, x86_64)");
    }

    #[test]
    fn cpufreq_values_are_khz() {
        assert_eq!(parse_khz_as_mhz("2841600\n"), Some(2841));
        assert_eq!(parse_khz_as_mhz("0"), None);
        assert_eq!(parse_khz_as_mhz("n/a"), None);
    }

    #[test]
    fn detect_does_not_panic() {
        if let Ok(info) = DeviceInfo::detect() {
            assert!(info.threads >= 1);
        }
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["cpuName"], "AMD Ryzen 7 5800X");
        assert_eq!(json["maxFrequencyMhz"], 4850);
    }
}
