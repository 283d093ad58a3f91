//! # Executive
//!
//! A tick-driven, run-to-completion dispatcher for the harness's own
//! activities (watchdog, perturber, demo collaborators). It is deliberately
//! small: the kernel under test does the real preemptive scheduling, and this
//! only has to keep the foreground running when the harness is flashed on
//! its own.
//!
//! ## Dispatch Algorithm
//!
//! On every call to [`Executive::dispatch`]:
//! 1. **Collect due slots**: a slot is due once `now` has reached its
//!    `wake_at` (wrap-safe, see [`tick::is_due`])
//! 2. **Select**: highest priority first; among equals, the oldest deadline;
//!    among those, registration order
//! 3. **Run**: the chosen activity runs to completion and returns its next
//!    wake-up time
//! 4. **Idle**: if nothing is due, the idle hook runs instead
//!
//! Interrupts preempt all of this at any point. They never call into the
//! executive.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::idle::{IdleHook, IdleReport};
use crate::tick::{self, Ticks};

/// A foreground activity.
pub trait Activity {
    /// Short name, used in logs.
    fn name(&self) -> &'static str;

    /// Do one unit of work and return the tick at which to run again.
    fn run(&mut self, now: Ticks) -> Ticks;
}

/// What one dispatch did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The named activity ran.
    Ran(&'static str),
    /// Nothing was due; the idle hook ran.
    Idle(IdleReport),
    /// Nothing was due and there is no idle hook.
    Nothing,
}

struct Slot<'a> {
    priority: u8,
    wake_at: Ticks,
    activity: Box<dyn Activity + 'a>,
}

pub struct Executive<'a> {
    slots: Vec<Slot<'a>>,
    idle: Option<Box<dyn IdleHook + 'a>>,
}

impl<'a> Executive<'a> {
    pub fn new() -> Self {
        Self { slots: Vec::new(), idle: None }
    }

    /// Add an activity. Higher `priority` wins.
    pub fn spawn(
        &mut self,
        priority: u8,
        activity: impl Activity + 'a,
        first_wake: Ticks,
    ) {
        self.slots.push(Slot {
            priority,
            wake_at: first_wake,
            activity: Box::new(activity),
        });
    }

    pub fn set_idle_hook(&mut self, hook: impl IdleHook + 'a) {
        self.idle = Some(Box::new(hook));
    }

    /// Run at most one activity, or the idle hook.
    pub fn dispatch(&mut self, now: Ticks) -> Dispatch {
        match self.select(now) {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.wake_at = slot.activity.run(now);
                Dispatch::Ran(slot.activity.name())
            }
            None => match self.idle.as_mut() {
                Some(hook) => Dispatch::Idle(hook.on_idle()),
                None => Dispatch::Nothing,
            },
        }
    }

    /// Ticks until the earliest wake-up, or `None` with no activities.
    /// Zero if something is already due.
    pub fn next_wake_in(&self, now: Ticks) -> Option<Ticks> {
        self.slots
            .iter()
            .map(|slot| {
                if tick::is_due(now, slot.wake_at) {
                    0
                } else {
                    slot.wake_at.wrapping_sub(now)
                }
            })
            .min()
    }

    fn select(&self, now: Ticks) -> Option<usize> {
        let mut best: Option<usize> = None;

        for (i, slot) in self.slots.iter().enumerate() {
            if !tick::is_due(now, slot.wake_at) {
                continue;
            }
            best = match best {
                None => Some(i),
                Some(b) => {
                    let current = &self.slots[b];
                    // Overdue by more means an older deadline
                    let older = now.wrapping_sub(slot.wake_at) > now.wrapping_sub(current.wake_at);
                    if slot.priority > current.priority
                        || (slot.priority == current.priority && older)
                    {
                        Some(i)
                    } else {
                        Some(b)
                    }
                }
            };
        }

        best
    }
}

impl Default for Executive<'_> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::HeapSample;
    use core::cell::RefCell;

    /// Records its name into a shared log and reschedules itself `period`
    /// ticks later.
    struct Recorder<'a> {
        name: &'static str,
        period: Ticks,
        log: &'a RefCell<Vec<&'static str>>,
    }

    impl Activity for Recorder<'_> {
        fn name(&self) -> &'static str {
            self.name
        }

        fn run(&mut self, now: Ticks) -> Ticks {
            self.log.borrow_mut().push(self.name);
            now.wrapping_add(self.period)
        }
    }

    struct CountingIdle<'a>(&'a RefCell<u32>);

    impl IdleHook for CountingIdle<'_> {
        fn on_idle(&mut self) -> IdleReport {
            *self.0.borrow_mut() += 1;
            IdleReport { registry_ops: 0, heap: HeapSample::default() }
        }
    }

    #[test]
    fn test_highest_priority_due_runs_first() {
        let log = RefCell::new(Vec::new());
        let mut exec = Executive::new();
        exec.spawn(0, Recorder { name: "low", period: 10, log: &log }, 0);
        exec.spawn(7, Recorder { name: "high", period: 10, log: &log }, 0);
        exec.spawn(3, Recorder { name: "mid", period: 10, log: &log }, 0);

        for _ in 0..3 {
            exec.dispatch(0);
        }
        assert_eq!(*log.borrow(), ["high", "mid", "low"]);
    }

    #[test]
    fn test_equal_priority_oldest_deadline_then_registration_order() {
        let log = RefCell::new(Vec::new());
        let mut exec = Executive::new();
        exec.spawn(5, Recorder { name: "a", period: 100, log: &log }, 5);
        exec.spawn(5, Recorder { name: "b", period: 100, log: &log }, 2);
        exec.spawn(5, Recorder { name: "c", period: 100, log: &log }, 5);

        for _ in 0..3 {
            exec.dispatch(10);
        }
        assert_eq!(*log.borrow(), ["b", "a", "c"]);
    }

    #[test]
    fn test_not_due_is_skipped() {
        let log = RefCell::new(Vec::new());
        let mut exec = Executive::new();
        exec.spawn(7, Recorder { name: "later", period: 10, log: &log }, 50);
        exec.spawn(0, Recorder { name: "now", period: 10, log: &log }, 0);

        assert_eq!(exec.dispatch(0), Dispatch::Ran("now"));
        assert_eq!(exec.dispatch(0), Dispatch::Nothing);
        assert_eq!(exec.next_wake_in(0), Some(10));
        assert_eq!(exec.dispatch(50), Dispatch::Ran("later"));
    }

    #[test]
    fn test_wake_times_survive_tick_wrap() {
        let log = RefCell::new(Vec::new());
        let mut exec = Executive::new();
        let start = u32::MAX - 5;
        exec.spawn(1, Recorder { name: "w", period: 10, log: &log }, start);

        assert_eq!(exec.dispatch(start), Dispatch::Ran("w"));
        // Next wake is start + 10, past the wrap
        assert_eq!(exec.dispatch(start.wrapping_add(9)), Dispatch::Nothing);
        assert_eq!(exec.dispatch(start.wrapping_add(10)), Dispatch::Ran("w"));
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn test_idle_hook_runs_when_nothing_due() {
        let log = RefCell::new(Vec::new());
        let idles = RefCell::new(0);
        let mut exec = Executive::new();
        exec.spawn(1, Recorder { name: "p", period: 10, log: &log }, 0);
        exec.set_idle_hook(CountingIdle(&idles));

        assert_eq!(exec.dispatch(0), Dispatch::Ran("p"));
        assert!(matches!(exec.dispatch(1), Dispatch::Idle(_)));
        assert!(matches!(exec.dispatch(2), Dispatch::Idle(_)));
        assert_eq!(*idles.borrow(), 2);
    }

    #[test]
    fn test_no_activities_has_no_wake() {
        let mut exec = Executive::new();
        assert_eq!(exec.next_wake_in(0), None);
        assert_eq!(exec.dispatch(0), Dispatch::Nothing);
    }
}
