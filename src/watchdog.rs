//! # Watchdog
//!
//! The check activity. Every cycle it polls all registered liveness probes in
//! registration order, snapshots the loop counters, toggles the check LED and,
//! once anything has faulted, switches itself to the fast period for good.
//!
//! ## Period state machine
//!
//! ```text
//!   ┌────────┐   status is Degraded   ┌──────┐
//!   │ Normal │ ─────────────────────► │ Fast │ ──┐
//!   └────────┘                        └──────┘   │ (terminal)
//!                                         ▲      │
//!                                         └──────┘
//! ```
//!
//! ## Status aggregation
//!
//! Each faulting probe overwrites the status with its own tag, so when several
//! fault in the same cycle the last one in polling order is what the operator
//! sees. Faults are never cleared: the harness surfaces kernel-port bugs, it
//! does not recover from them. The LED toggling every 3 s means all is well;
//! toggling every 200 ms means at least one subsystem has faulted.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::cell::Cell;

use embedded_hal::digital::StatefulOutputPin;
use log::{error, trace, warn};

use crate::config::{
    CHECK_PERIOD_FAST, CHECK_PERIOD_NORMAL, MAX_PROBES, NOMINAL_MESSAGE,
};
use crate::error::ConfigError;
use crate::executive::Activity;
use crate::probe::{CounterWatch, LivenessProbe, LoopCounter};
use crate::sync::{self, Mutex};
use crate::tick::{self, Ticks};

// ---------------------------------------------------------------------------
// Health status
// ---------------------------------------------------------------------------

/// Latched system health.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// No probe has faulted since start-up.
    Nominal,
    /// At least one probe has faulted; carries the tag of the most recent one.
    Degraded(&'static str),
}

impl HealthStatus {
    /// Human-readable status line.
    pub const fn message(&self) -> &'static str {
        match self {
            HealthStatus::Nominal => NOMINAL_MESSAGE,
            HealthStatus::Degraded(tag) => *tag,
        }
    }

    #[inline]
    pub const fn is_degraded(&self) -> bool {
        matches!(self, HealthStatus::Degraded(_))
    }
}

// ---------------------------------------------------------------------------
// Polling period
// ---------------------------------------------------------------------------

/// The watchdog's polling period. Only ever moves from `Normal` to `Fast`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollingPeriod {
    Normal,
    Fast,
}

impl PollingPeriod {
    pub const fn ticks(self) -> Ticks {
        match self {
            PollingPeriod::Normal => tick::ms_to_ticks(CHECK_PERIOD_NORMAL),
            PollingPeriod::Fast => tick::ms_to_ticks(CHECK_PERIOD_FAST),
        }
    }

    /// Switch to `Fast`. Returns `true` on the transition, `false` if already
    /// fast.
    pub fn escalate(&mut self) -> bool {
        let changed = *self == PollingPeriod::Normal;
        *self = PollingPeriod::Fast;
        changed
    }
}

// ---------------------------------------------------------------------------
// Status board
// ---------------------------------------------------------------------------

/// Where the watchdog publishes what it found. Written by the watchdog only;
/// readable from any context, interrupts included.
pub struct StatusBoard {
    inner: Mutex<Cell<(HealthStatus, PollingPeriod)>>,
}

impl StatusBoard {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(Cell::new((HealthStatus::Nominal, PollingPeriod::Normal))),
        }
    }

    pub fn status(&self) -> HealthStatus {
        sync::critical_section(|cs| self.inner.borrow(cs).get().0)
    }

    pub fn period(&self) -> PollingPeriod {
        sync::critical_section(|cs| self.inner.borrow(cs).get().1)
    }

    fn publish(&self, status: HealthStatus, period: PollingPeriod) {
        sync::critical_section(|cs| self.inner.borrow(cs).set((status, period)));
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Watchdog
// ---------------------------------------------------------------------------

/// Outcome of one polling cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Cycle number, starting at 0.
    pub cycle: u32,
    /// Probes and counters that reported a fault in this cycle.
    pub faults: u8,
    /// Latched status after the cycle.
    pub status: HealthStatus,
    /// Period that will be used to schedule the next cycle.
    pub period: PollingPeriod,
}

/// The supervisory check activity.
pub struct Watchdog<'a, L> {
    probes: Vec<Box<dyn LivenessProbe + 'a>>,
    counters: Vec<CounterWatch<'a>>,
    led: L,
    board: &'a StatusBoard,
    status: HealthStatus,
    period: PollingPeriod,
    deadline: Ticks,
    cycle: u32,
}

impl<'a, L> Watchdog<'a, L>
where
    L: StatefulOutputPin,
{
    /// Create a watchdog whose first cycle is due one normal period after
    /// `start`.
    pub fn new(led: L, board: &'a StatusBoard, start: Ticks) -> Self {
        board.publish(HealthStatus::Nominal, PollingPeriod::Normal);
        Self {
            probes: Vec::new(),
            counters: Vec::new(),
            led,
            board,
            status: HealthStatus::Nominal,
            period: PollingPeriod::Normal,
            deadline: start.wrapping_add(PollingPeriod::Normal.ticks()),
            cycle: 0,
        }
    }

    /// Append a probe. Probes are polled in the order they were registered.
    pub fn register<P>(&mut self, probe: P) -> Result<(), ConfigError>
    where
        P: LivenessProbe + 'a,
    {
        if self.probes.len() + self.counters.len() >= MAX_PROBES {
            return Err(ConfigError::TooManyProbes);
        }
        self.probes.push(Box::new(probe));
        Ok(())
    }

    /// Watch a loop counter. Counters are checked after every probe, in the
    /// order they were added.
    pub fn watch_counter(
        &mut self,
        tag: &'static str,
        counter: &'a LoopCounter,
    ) -> Result<(), ConfigError> {
        if self.probes.len() + self.counters.len() >= MAX_PROBES {
            return Err(ConfigError::TooManyProbes);
        }
        self.counters.push(CounterWatch::new(tag, counter));
        Ok(())
    }

    pub fn status(&self) -> HealthStatus {
        self.status
    }

    pub fn period(&self) -> PollingPeriod {
        self.period
    }

    /// Absolute tick of the next cycle.
    pub fn deadline(&self) -> Ticks {
        self.deadline
    }

    /// Run one polling cycle without sleeping.
    ///
    /// Probes are always handed the normal period, whatever the current one.
    pub fn poll_cycle(&mut self) -> CycleReport {
        let period = PollingPeriod::Normal.ticks();
        let mut faults: u8 = 0;
        let mut latest = self.status;

        for probe in self.probes.iter_mut() {
            if !probe.still_running(period) {
                faults = faults.saturating_add(1);
                latest = HealthStatus::Degraded(probe.tag());
            }
        }

        for watch in self.counters.iter_mut() {
            if !watch.advanced() {
                faults = faults.saturating_add(1);
                latest = HealthStatus::Degraded(watch.tag());
            }
        }

        if latest != self.status {
            error!("check: {} (cycle {})", latest.message(), self.cycle);
            self.status = latest;
        }

        // Heartbeat, whatever the status
        if self.led.toggle().is_err() {
            warn!("check: LED toggle failed");
        }

        if self.status.is_degraded() && self.period.escalate() {
            warn!(
                "check: escalating to {} ms period",
                CHECK_PERIOD_FAST.ticks()
            );
        }

        self.board.publish(self.status, self.period);

        let report = CycleReport {
            cycle: self.cycle,
            faults,
            status: self.status,
            period: self.period,
        };
        trace!("check: cycle {} faults {}", self.cycle, faults);
        self.cycle = self.cycle.wrapping_add(1);
        report
    }
}

impl<'a, L> Activity for Watchdog<'a, L>
where
    L: StatefulOutputPin,
{
    fn name(&self) -> &'static str {
        "Check"
    }

    /// Poll, then sleep until the previous deadline plus the (possibly just
    /// shortened) period.
    fn run(&mut self, _now: Ticks) -> Ticks {
        self.poll_cycle();
        self.deadline = self.deadline.wrapping_add(self.period.ticks());
        self.deadline
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
