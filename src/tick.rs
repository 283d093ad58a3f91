//! # Tick
//!
//! The executive's time base: a wrapping `u32` counter advanced once per
//! SysTick interrupt. All deadlines are absolute tick values compared with
//! wrapping arithmetic, so the counter can roll over without disturbing
//! periodic activities.

use core::sync::atomic::{AtomicU32, Ordering};

use fugit::MillisDurationU32;

use crate::config::TICK_HZ;

/// Absolute or relative time in executive ticks.
pub type Ticks = u32;

static TICK_COUNT: AtomicU32 = AtomicU32::new(0);

/// Current tick count.
#[inline]
pub fn now() -> Ticks {
    TICK_COUNT.load(Ordering::Relaxed)
}

/// Advance the tick count by one. Called from the SysTick handler only.
#[inline]
pub fn advance() -> Ticks {
    TICK_COUNT.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
}

/// `true` once `now` has reached `deadline`.
///
/// Valid while the two are less than half the counter range apart, which
/// holds for every period the harness uses.
#[inline]
pub const fn is_due(now: Ticks, deadline: Ticks) -> bool {
    (now.wrapping_sub(deadline) as i32) >= 0
}

/// Convert a millisecond duration to ticks, rounding down but never to zero.
#[inline]
pub const fn ms_to_ticks(duration: MillisDurationU32) -> Ticks {
    let ticks = (duration.ticks() as u64 * TICK_HZ as u64 / 1000) as u32;
    if ticks == 0 {
        1
    } else {
        ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_due_plain() {
        assert!(!is_due(99, 100));
        assert!(is_due(100, 100));
        assert!(is_due(101, 100));
    }

    #[test]
    fn test_is_due_across_wrap() {
        let deadline = 5u32; // reached after the counter wrapped
        assert!(!is_due(u32::MAX - 2, deadline));
        assert!(is_due(5, deadline));
        assert!(is_due(6, deadline));
    }

    #[test]
    fn test_ms_to_ticks_at_one_khz() {
        assert_eq!(ms_to_ticks(MillisDurationU32::from_ticks(3000)), 3000);
        assert_eq!(ms_to_ticks(MillisDurationU32::from_ticks(0)), 1);
    }

    #[test]
    fn test_advance_returns_new_count() {
        let before = now();
        let after = advance();
        assert_eq!(after, before.wrapping_add(1));
    }
}
