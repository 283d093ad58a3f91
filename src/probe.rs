//! # Liveness Probes
//!
//! Everything the watchdog polls. A probe is owned by the subsystem it
//! watches; the watchdog only asks it, once per cycle, whether that subsystem
//! is still making progress without having detected an internal error.
//!
//! Loop counters are the other half of the contract: a register integrity
//! activity bumps its counter on every clean pass, and the watchdog treats a
//! counter that did not move between two cycles as a stalled activity.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::tick::Ticks;

/// A named health query for one monitored subsystem.
pub trait LivenessProbe {
    /// Status tag latched by the watchdog when this probe reports a fault.
    fn tag(&self) -> &'static str;

    /// Whether the subsystem is still running without a detected error since
    /// the previous call.
    ///
    /// `period` is always the normal polling period, even once the watchdog
    /// has switched to the fast one. It is the nominal check interval, not
    /// the time since the previous call.
    fn still_running(&mut self, period: Ticks) -> bool;
}

/// Monotonic progress counter owned by one activity.
///
/// Single writer (the owning activity), single reader (the watchdog).
#[derive(Debug)]
pub struct LoopCounter {
    value: AtomicU32,
}

impl LoopCounter {
    pub const fn new() -> Self {
        Self { value: AtomicU32::new(0) }
    }

    /// Record one completed loop.
    #[inline]
    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Release);
    }

    #[inline]
    pub fn get(&self) -> u32 {
        self.value.load(Ordering::Acquire)
    }
}

impl Default for LoopCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// The watchdog's view of a [`LoopCounter`]: the counter plus the value seen
/// on the previous cycle.
#[derive(Debug)]
pub struct CounterWatch<'a> {
    tag: &'static str,
    counter: &'a LoopCounter,
    last_seen: u32,
}

impl<'a> CounterWatch<'a> {
    /// The first snapshot is zero, so an activity that never ran is flagged
    /// on the very first cycle.
    pub const fn new(tag: &'static str, counter: &'a LoopCounter) -> Self {
        Self { tag, counter, last_seen: 0 }
    }

    pub fn tag(&self) -> &'static str {
        self.tag
    }

    /// Snapshot the counter. Returns `false` if it has not advanced since the
    /// previous snapshot.
    pub fn advanced(&mut self) -> bool {
        let current = self.counter.get();
        let moved = current != self.last_seen;
        self.last_seen = current;
        moved
    }
}

/// A probe backed by a plain closure. Handy for glue code and tests.
pub struct FnProbe<F> {
    tag: &'static str,
    check: F,
}

impl<F> FnProbe<F>
where
    F: FnMut(Ticks) -> bool,
{
    pub const fn new(tag: &'static str, check: F) -> Self {
        Self { tag, check }
    }
}

impl<F> LivenessProbe for FnProbe<F>
where
    F: FnMut(Ticks) -> bool,
{
    fn tag(&self) -> &'static str {
        self.tag
    }

    fn still_running(&mut self, period: Ticks) -> bool {
        (self.check)(period)
    }
}
