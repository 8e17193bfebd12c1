//! Rendering throughput suite
//!
//! The graphics context itself is platform glue behind [`RenderSurface`].
//! This module owns the timing model: a fixed sampling window, a periodic
//! frames-per-second callback, and a score of average fps times a scale.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::barrier::prevent_elimination;
use crate::clock::{as_millis_f64, Clock};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Could not establish rendering context: {0}")]
    Establish(String),

    #[error("Rendering surface lost: {0}")]
    Lost(String),
}

/// A platform drawing target.
pub trait RenderSurface {
    /// Create the rendering context. Called once before the window starts.
    fn establish(&mut self) -> Result<(), RenderError>;

    /// Draw and present one frame. `elapsed` is time since the window began.
    fn draw_frame(&mut self, elapsed: Duration) -> Result<(), RenderError>;

    /// Tear the context down. Called once, also after a failed frame.
    fn release(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Run the rendering suite as part of a session
    #[serde(default)]
    pub enabled: bool,

    /// Length of the sampling window in milliseconds
    #[serde(default = "default_duration_ms")]
    pub duration_ms: u64,

    /// Minimum spacing of fps callbacks in milliseconds
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,

    /// Score = average fps x this
    #[serde(default = "default_score_scale")]
    pub score_scale: f64,

    /// Software surface resolution
    #[serde(default = "default_width")]
    pub width: usize,
    #[serde(default = "default_height")]
    pub height: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            duration_ms: default_duration_ms(),
            sample_interval_ms: default_sample_interval_ms(),
            score_scale: default_score_scale(),
            width: default_width(),
            height: default_height(),
        }
    }
}

fn default_duration_ms() -> u64 {
    20_000
}

fn default_sample_interval_ms() -> u64 {
    1_000
}

fn default_score_scale() -> f64 {
    100.0
}

fn default_width() -> usize {
    640
}

fn default_height() -> usize {
    360
}

#[derive(Debug, Clone, Copy)]
pub struct RenderingSuite {
    duration: Duration,
    sample_interval: Duration,
    score_scale: f64,
}

impl RenderingSuite {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            duration: Duration::from_millis(config.duration_ms),
            sample_interval: Duration::from_millis(config.sample_interval_ms.max(1)),
            score_scale: config.score_scale,
        }
    }

    /// Render for the whole window and return average fps x scale.
    ///
    /// Returns 0.0 when the surface cannot be established. A surface lost
    /// mid-window ends the window early; frames drawn so far still count.
    pub fn run<S, C, F>(&self, surface: &mut S, clock: &C, mut on_fps: F) -> f64
    where
        S: RenderSurface + ?Sized,
        C: Clock + ?Sized,
        F: FnMut(u32),
    {
        if let Err(err) = surface.establish() {
            warn!(error = %err, "Rendering suite skipped");
            return 0.0;
        }

        let start = clock.now();
        let mut last_sample = start;
        let mut frames: u64 = 0;
        let mut window_frames: u64 = 0;
        let mut elapsed = Duration::ZERO;

        while elapsed < self.duration {
            if let Err(err) = surface.draw_frame(elapsed) {
                warn!(error = %err, frames, "Rendering window ended early");
                break;
            }
            frames += 1;
            window_frames += 1;

            let now = clock.now();
            elapsed = now.saturating_sub(start);

            let since_sample = now.saturating_sub(last_sample);
            if since_sample >= self.sample_interval {
                let fps = window_frames as f64 / (as_millis_f64(since_sample) / 1000.0);
                on_fps(fps as u32);
                window_frames = 0;
                last_sample = now;
            }
        }

        surface.release();

        let secs = as_millis_f64(elapsed) / 1000.0;
        if secs <= 0.0 {
            return 0.0;
        }
        let average_fps = frames as f64 / secs;
        let score = average_fps * self.score_scale;
        info!(average_fps, score, "Rendering suite complete");
        score
    }
}

/// Headless CPU framebuffer that shades an animated interference pattern.
pub struct SoftwareSurface {
    width: usize,
    height: usize,
    framebuffer: Vec<u32>,
}

impl SoftwareSurface {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            framebuffer: Vec::new(),
        }
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<u32> {
        self.framebuffer.get(y * self.width + x).copied()
    }
}

impl RenderSurface for SoftwareSurface {
    fn establish(&mut self) -> Result<(), RenderError> {
        let pixels = self
            .width
            .checked_mul(self.height)
            .filter(|&n| n > 0)
            .ok_or_else(|| {
                RenderError::Establish(format!("invalid resolution {}x{}", self.width, self.height))
            })?;
        self.framebuffer
            .try_reserve_exact(pixels)
            .map_err(|err| RenderError::Establish(err.to_string()))?;
        self.framebuffer.resize(pixels, 0);
        Ok(())
    }

    fn draw_frame(&mut self, elapsed: Duration) -> Result<(), RenderError> {
        if self.framebuffer.is_empty() {
            return Err(RenderError::Lost("framebuffer not established".to_string()));
        }

        let t = elapsed.as_secs_f32();
        let (w, h) = (self.width as f32, self.height as f32);
        for (idx, pixel) in self.framebuffer.iter_mut().enumerate() {
            let u = (idx % self.width) as f32 / w;
            let v = (idx / self.width) as f32 / h;
            let wave = (u * 12.0 + t).sin() * (v * 12.0 - t * 0.5).cos();
            let shade = ((wave * 0.5 + 0.5) * 255.0) as u32;
            *pixel = 0xFF00_0000 | (shade << 16) | ((255 - shade) << 8) | (shade / 2);
        }
        prevent_elimination(self.framebuffer[0]);
        Ok(())
    }

    fn release(&mut self) {
        self.framebuffer = Vec::new();
    }
}
