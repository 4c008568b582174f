//! Hybrid precision timer
//!
//! General-purpose operating systems overshoot plain sleeps by far more
//! than this engine can tolerate, so the timer sleeps in short slices while
//! plenty of time remains and burns the final stretch on a monotonic
//! busy-wait. The pump callback runs between slices; the player uses it to
//! drain peer announcements while it would otherwise be idle.

use std::thread;
use std::time::{Duration, Instant};

use crate::constants::{BUSY_WAIT_WINDOW_US, SLEEP_SLICE_US};

/// Sleep for `duration_us` microseconds, landing within the busy-wait
/// window's precision.
///
/// `pump` is invoked after every coarse slice. It must stay well under a
/// millisecond; an overrun simply shrinks the next slice, it cannot make
/// the timer return early.
pub fn precision_sleep(duration_us: u64, mut pump: impl FnMut()) {
    let start = Instant::now();
    let target = Duration::from_micros(duration_us);
    let busy_window = Duration::from_micros(BUSY_WAIT_WINDOW_US);

    loop {
        let elapsed = start.elapsed();
        if elapsed >= target {
            return;
        }
        if target - elapsed <= busy_window {
            break;
        }
        thread::sleep(Duration::from_micros(SLEEP_SLICE_US));
        pump();
    }

    while start.elapsed() < target {
        std::hint::spin_loop();
    }
}
