//! Background temperature sampling while a benchmark runs

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::debug;

use super::sensors::hottest_component_celsius;

/// One temperature sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThermalPoint {
    /// Milliseconds since the monitor started
    pub elapsed_ms: u64,
    pub celsius: f32,
}

type Reader = Box<dyn Fn() -> Option<f32> + Send + 'static>;

/// Samples the hottest sensor on a fixed interval until finished.
pub struct ThermalMonitor {
    stop: Arc<AtomicBool>,
    samples: Arc<Mutex<Vec<ThermalPoint>>>,
    handle: Option<JoinHandle<()>>,
}

impl ThermalMonitor {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

    /// Start sampling the platform temperature sensors.
    pub fn start(interval: Duration) -> Self {
        Self::start_with_reader(
            interval,
            Box::new(|| hottest_component_celsius().map(|(celsius, _)| celsius)),
        )
    }

    fn start_with_reader(interval: Duration, read: Reader) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let samples = Arc::new(Mutex::new(Vec::new()));
        let stop_for_thread = Arc::clone(&stop);
        let samples_for_thread = Arc::clone(&samples);

        let spawned = std::thread::Builder::new()
            .name("thermal-monitor".to_string())
            .spawn(move || {
                let started = Instant::now();
                while !stop_for_thread.load(Ordering::Relaxed) {
                    if let Some(celsius) = read() {
                        let point = ThermalPoint {
                            elapsed_ms: started.elapsed().as_millis() as u64,
                            celsius,
                        };
                        if let Ok(mut guard) = samples_for_thread.lock() {
                            guard.push(point);
                        }
                    }
                    sleep_unless_stopped(&stop_for_thread, interval);
                }
            });

        // Without a monitor thread the run simply has no thermal history.
        let handle = match spawned {
            Ok(handle) => Some(handle),
            Err(err) => {
                debug!(error = %err, "Could not start thermal monitor");
                None
            }
        };

        Self {
            stop,
            samples,
            handle,
        }
    }

    /// Stop sampling and return everything collected so far.
    pub fn finish(&mut self) -> Vec<ThermalPoint> {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        self.samples
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl Drop for ThermalMonitor {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Sleep in short slices so `finish` does not wait out a whole interval.
fn sleep_unless_stopped(stop: &AtomicBool, interval: Duration) {
    const SLICE: Duration = Duration::from_millis(20);
    let deadline = Instant::now() + interval;
    while !stop.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        std::thread::sleep(SLICE.min(deadline - now));
    }
}
