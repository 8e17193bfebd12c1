//! Memory bandwidth probe
//!
//! Copies buffers sized to sit in L1, in L2, and far outside any cache, and
//! reports the copy throughput of each tier in decimal GB/s.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::barrier::{prevent_elimination, prevent_reordering};
use crate::clock::Clock;

/// Memory probe errors
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Could not allocate {bytes} bytes for the {tier} buffer")]
    Allocation {
        tier: MemoryTier,
        bytes: usize,
        #[source]
        source: std::collections::TryReserveError,
    },

    #[error("The {0} tier needs a non-zero buffer size and iteration count")]
    EmptyTier(MemoryTier),

    #[error("The {0} tier copies more bytes than a 64-bit counter can hold")]
    TierTooLarge(MemoryTier),

    #[error("Reference RAM throughput must be strictly positive (got {0} GB/s)")]
    NonPositiveReference(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryTier {
    L1,
    L2,
    Ram,
}

impl std::fmt::Display for MemoryTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            MemoryTier::L1 => "L1 cache",
            MemoryTier::L2 => "L2 cache",
            MemoryTier::Ram => "RAM",
        };
        f.write_str(label)
    }
}

/// Buffer size and copy count for one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfig {
    pub buffer_bytes: usize,
    /// Copies per measurement; fewer for larger buffers so each tier takes
    /// roughly the same time
    pub iterations: usize,
}

impl TierConfig {
    /// Bytes moved by one measurement, `None` on overflow.
    pub fn total_bytes(&self) -> Option<u64> {
        (self.buffer_bytes as u64).checked_mul(self.iterations as u64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Baseline device RAM copy throughput in GB/s
    #[serde(default = "default_reference_ram_gbs")]
    pub reference_ram_gbs: f64,

    /// Elapsed time is clamped up to this before division, in seconds
    #[serde(default = "default_floor_secs")]
    pub floor_secs: f64,

    #[serde(default = "default_l1")]
    pub l1: TierConfig,

    #[serde(default = "default_l2")]
    pub l2: TierConfig,

    #[serde(default = "default_ram")]
    pub ram: TierConfig,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            l1: default_l1(),
            l2: default_l2(),
            ram: default_ram(),
            reference_ram_gbs: default_reference_ram_gbs(),
            floor_secs: default_floor_secs(),
        }
    }
}

fn default_l1() -> TierConfig {
    TierConfig {
        buffer_bytes: 32 * 1024,
        iterations: 50_000,
    }
}

fn default_l2() -> TierConfig {
    TierConfig {
        buffer_bytes: 512 * 1024,
        iterations: 50_000,
    }
}

fn default_ram() -> TierConfig {
    TierConfig {
        buffer_bytes: 64 * 1024 * 1024,
        iterations: 500,
    }
}

fn default_reference_ram_gbs() -> f64 {
    7.0
}

fn default_floor_secs() -> f64 {
    1e-6
}

impl MemoryConfig {
    pub fn tier(&self, tier: MemoryTier) -> TierConfig {
        match tier {
            MemoryTier::L1 => self.l1,
            MemoryTier::L2 => self.l2,
            MemoryTier::Ram => self.ram,
        }
    }

    pub fn validate(&self) -> Result<(), MemoryError> {
        for tier in [MemoryTier::L1, MemoryTier::L2, MemoryTier::Ram] {
            let cfg = self.tier(tier);
            if cfg.buffer_bytes == 0 || cfg.iterations == 0 {
                return Err(MemoryError::EmptyTier(tier));
            }
            if cfg.total_bytes().is_none() {
                return Err(MemoryError::TierTooLarge(tier));
            }
        }
        if !(self.reference_ram_gbs > 0.0) {
            return Err(MemoryError::NonPositiveReference(self.reference_ram_gbs));
        }
        Ok(())
    }
}

/// Memory suite output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryScores {
    #[serde(rename = "l1GBs")]
    pub l1_gbs: f64,
    #[serde(rename = "l2GBs")]
    pub l2_gbs: f64,
    #[serde(rename = "ramGBs")]
    pub ram_gbs: f64,
    pub ram_score: f64,
}

/// RAM term normalized to the baseline device, plus a small L1 bonus.
///
/// Main memory dominates perceived performance, so cache speed only nudges
/// the score.
pub fn composite_score(l1_gbs: f64, ram_gbs: f64, reference_ram_gbs: f64) -> f64 {
    let ram_term = (ram_gbs / reference_ram_gbs) * 1000.0;
    let cache_bonus = (l1_gbs / 100.0) * 100.0;
    ram_term + cache_bonus
}

/// Decimal GB/s for `bytes` moved in `elapsed`.
pub fn throughput_gbs(bytes: u64, elapsed: Duration, floor_secs: f64) -> f64 {
    bytes as f64 / 1e9 / elapsed.as_secs_f64().max(floor_secs)
}

pub struct MemoryProbe<C> {
    config: MemoryConfig,
    clock: C,
}

impl<C: Clock> MemoryProbe<C> {
    pub fn new(config: MemoryConfig, clock: C) -> Result<Self, MemoryError> {
        config.validate()?;
        Ok(Self { config, clock })
    }

    pub fn run_memory_suite(&self) -> Result<MemoryScores, MemoryError> {
        info!("Starting memory suite");

        let l1_gbs = self.measure_tier(MemoryTier::L1)?;
        let l2_gbs = self.measure_tier(MemoryTier::L2)?;
        let ram_gbs = self.measure_tier(MemoryTier::Ram)?;

        let ram_score = composite_score(l1_gbs, ram_gbs, self.config.reference_ram_gbs);
        info!(l1_gbs, l2_gbs, ram_gbs, ram_score, "Memory suite complete");

        Ok(MemoryScores {
            l1_gbs,
            l2_gbs,
            ram_gbs,
            ram_score,
        })
    }

    pub fn measure_tier(&self, tier: MemoryTier) -> Result<f64, MemoryError> {
        let config = self.config.tier(tier);
        let bytes = config
            .total_bytes()
            .ok_or(MemoryError::TierTooLarge(tier))?;
        let TierConfig {
            buffer_bytes,
            iterations,
        } = config;

        let src = allocate(tier, buffer_bytes, 1)?;
        let mut dst = allocate(tier, buffer_bytes, 0)?;

        let start = self.clock.now();
        for _ in 0..iterations {
            dst.copy_from_slice(&src);
            prevent_elimination(dst.as_mut_slice());
            prevent_reordering();
        }
        let elapsed = self.clock.now().saturating_sub(start);
        prevent_elimination(dst.last().copied());

        let gbs = throughput_gbs(bytes, elapsed, self.config.floor_secs);
        debug!(%tier, buffer_bytes, iterations, gbs, "Memory tier measured");
        Ok(gbs)
    }
}

fn allocate(tier: MemoryTier, bytes: usize, fill: u8) -> Result<Vec<u8>, MemoryError> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(bytes)
        .map_err(|source| MemoryError::Allocation {
            tier,
            bytes,
            source,
        })?;
    buffer.resize(bytes, fill);
    Ok(buffer)
}
