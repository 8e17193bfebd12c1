//! NDK thermal API (`AThermal_*`, API level 30+)
//!
//! Looked up at runtime so the binary still loads on older releases, where the
//! symbols are missing and the capability resolves as unavailable.

use libloading::Library;
use std::ffi::c_void;
use tracing::debug;

use super::{ThermalLevel, ThermalSensor};

type AcquireManagerFn = unsafe extern "C" fn() -> *mut c_void;
type GetCurrentStatusFn = unsafe extern "C" fn(*mut c_void) -> i32;
type ReleaseManagerFn = unsafe extern "C" fn(*mut c_void);

pub struct NdkThermalSensor {
    acquire: AcquireManagerFn,
    status: GetCurrentStatusFn,
    release: ReleaseManagerFn,
    // Keeps the function pointers above valid.
    _library: Library,
}

impl NdkThermalSensor {
    pub fn load() -> Option<Self> {
        // SAFETY: libandroid.so has no initialisers with preconditions.
        let library = match unsafe { Library::new("libandroid.so") } {
            Ok(library) => library,
            Err(err) => {
                debug!(error = %err, "Could not open libandroid.so");
                return None;
            }
        };

        let (acquire, status, release) = {
            // SAFETY: the signatures match the NDK declarations in <android/thermal.h>.
            let symbols = unsafe {
                (
                    library.get::<AcquireManagerFn>(b"AThermal_acquireManager\0"),
                    library.get::<GetCurrentStatusFn>(b"AThermal_getCurrentThermalStatus\0"),
                    library.get::<ReleaseManagerFn>(b"AThermal_releaseManager\0"),
                )
            };
            match symbols {
                (Ok(acquire), Ok(status), Ok(release)) => (*acquire, *status, *release),
                _ => {
                    debug!("Thermal API symbols missing (API level < 30?)");
                    return None;
                }
            }
        };

        let sensor = Self {
            acquire,
            status,
            release,
            _library: library,
        };

        // A manager that cannot be acquired now will not be acquired later.
        sensor.read_status_code().map(|_| sensor)
    }

    fn read_status_code(&self) -> Option<i32> {
        // SAFETY: the manager is released before returning and never escapes.
        unsafe {
            let manager = (self.acquire)();
            if manager.is_null() {
                debug!("Failed to acquire thermal manager");
                return None;
            }
            let code = (self.status)(manager);
            (self.release)(manager);
            Some(code)
        }
    }
}

impl ThermalSensor for NdkThermalSensor {
    fn current_status(&self) -> Option<ThermalLevel> {
        let code = self.read_status_code()?;
        debug!(code, "AThermal status");
        ThermalLevel::from_status_code(code)
    }

    fn name(&self) -> &str {
        "android thermal service"
    }
}
