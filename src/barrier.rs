//! Optimization barriers
//!
//! Every timed region is bracketed by these so the optimizer cannot hoist,
//! cache or delete the work being measured.

use std::hint::black_box;
use std::sync::atomic::{compiler_fence, Ordering};
use std::time::Duration;

use crate::clock::Clock;

/// Force the optimizer to treat `value` as read.
#[inline(always)]
pub fn prevent_elimination<T>(value: T) -> T {
    black_box(value)
}

/// Keep every memory effect issued so far on this side of the fence.
#[inline(always)]
pub fn prevent_reordering() {
    compiler_fence(Ordering::SeqCst);
}

/// Run `work` inside a barrier-bracketed timed region.
pub fn timed<C, R, F>(clock: &C, work: F) -> (R, Duration)
where
    C: Clock + ?Sized,
    F: FnOnce() -> R,
{
    let start = clock.now();
    prevent_reordering();
    let result = work();
    prevent_reordering();
    let end = clock.now();
    (prevent_elimination(result), end.saturating_sub(start))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn prevent_elimination_is_identity() {
        assert_eq!(prevent_elimination(42u32), 42);
        assert_eq!(prevent_elimination("value"), "value");
    }

    #[test]
    fn timed_reports_clock_delta() {
        let clock = ManualClock::new();
        let (value, elapsed) = timed(&clock, || {
            clock.advance(Duration::from_millis(12));
            7
        });
        assert_eq!(value, 7);
        assert_eq!(elapsed, Duration::from_millis(12));
    }
}
