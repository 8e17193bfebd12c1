//! Progress reporting for long benchmark runs

use colored::*;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressUpdate {
    pub completed_steps: usize,
    pub total_steps: usize,
    pub status: String,
}

pub type ProgressCallback = Arc<dyn Fn(ProgressUpdate) + Send + Sync + 'static>;

#[derive(Clone, Default)]
pub struct RunOptions {
    /// Suppress the terminal progress bar.
    pub quiet: bool,
    /// Optional callback for progress updates.
    ///
    /// This receives progress events even when `quiet` is true.
    pub progress: Option<ProgressCallback>,
}

impl RunOptions {
    pub fn quiet() -> Self {
        Self {
            quiet: true,
            progress: None,
        }
    }

    pub fn report(&self, completed_steps: usize, total_steps: usize, status: &str) {
        if let Some(on_progress) = self.progress.as_ref() {
            on_progress(ProgressUpdate {
                completed_steps: completed_steps.min(total_steps),
                total_steps,
                status: status.to_string(),
            });
        }

        if self.quiet {
            return;
        }
        eprintln!("{}", progress_line(completed_steps, total_steps, status));
    }
}

fn progress_line(completed_steps: usize, total_steps: usize, status: &str) -> String {
    if total_steps == 0 {
        return format!("   {}", status.bright_white());
    }

    let width = 26usize;
    let completed = completed_steps.min(total_steps);
    let filled = ((completed as f64 / total_steps as f64) * width as f64).round() as usize;
    let bar = format!(
        "{}{}",
        "#".repeat(filled),
        "-".repeat(width.saturating_sub(filled))
    );
    let percent = ((completed as f64 / total_steps as f64) * 100.0).round() as u64;

    format!(
        "   [{}] {:>3}% {}",
        bar.bright_cyan(),
        percent,
        status.bright_white()
    )
}
