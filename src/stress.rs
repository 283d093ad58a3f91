//! # Interrupt Stress Generator
//!
//! Two independent periodic timer interrupts that call into the interrupt
//! side of the primitives under test while foreground activities use the
//! task side of the same structures.
//!
//! ## Frequency choice
//!
//! The channels run at near-adjacent, non-harmonic frequencies (2000 Hz and
//! 2001 Hz by default). Their relative phase therefore advances by a fixed
//! amount every cycle and sweeps through every offset over time, instead of
//! replaying the one interleaving a harmonic pair would produce.
//! [`StressGenerator::new`] rejects configurations that would not drift.
//!
//! ## Interrupt path
//!
//! ```text
//! TIMx vector (arch)
//!   └─► clear update flag
//!   └─► dispatch(channel, port)
//!         ├─► handler()            → "a higher-priority activity is ready"
//!         └─► port.yield_from_isr() (only if requested, always last)
//! ```
//!
//! Handlers never perform the yield themselves; they report the request and
//! the epilogue performs it through the [`YieldPort`].

use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

use fugit::HertzU32;
use log::info;

use crate::config::MAX_SYSCALL_INTERRUPT_PRIORITY;
use crate::error::ConfigError;
use crate::sync;

/// Interrupt-side handler bound to a channel. Returns `true` when it made a
/// higher-priority activity runnable and a context switch should follow.
pub type IsrHandler = fn() -> bool;

/// Which stress channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelId {
    First,
    Second,
}

impl ChannelId {
    pub const ALL: [ChannelId; 2] = [ChannelId::First, ChannelId::Second];

    #[inline]
    pub const fn index(self) -> usize {
        match self {
            ChannelId::First => 0,
            ChannelId::Second => 1,
        }
    }
}

/// Requested behavior of one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelConfig {
    pub frequency: HertzU32,
    /// Raw NVIC priority byte. Must not be more urgent than
    /// [`MAX_SYSCALL_INTERRUPT_PRIORITY`].
    pub priority: u8,
}

/// Timer peripheral seam. Implemented by the STM32F4 port and by test doubles.
pub trait TimerHardware {
    /// Counter clock of the channel, after any prescaler.
    fn input_clock(&self, channel: ChannelId) -> HertzU32;

    /// Largest value the channel's auto-reload register accepts.
    fn counter_max(&self, channel: ChannelId) -> u32;

    /// Stop the channel and program free-running, auto-reload operation with
    /// an interrupt on every reload at `compare`, at NVIC `priority`. The
    /// channel stays stopped.
    fn program(&mut self, channel: ChannelId, compare: u32, priority: u8);

    /// Enable the channel's interrupt and start counting.
    fn start(&mut self, channel: ChannelId);
}

/// Privileged end-of-interrupt scheduling action.
pub trait YieldPort {
    /// Request a context switch once the interrupt returns.
    fn yield_from_isr(&self);
}

/// Derive the auto-reload value for `target` from the channel's input clock.
///
/// Fails if the value would be zero (frequency too high) or would not fit in
/// `counter_max` (frequency too low).
pub fn compare_value(
    input_clock: HertzU32,
    target: HertzU32,
    counter_max: u32,
) -> Result<u32, ConfigError> {
    let frequency_hz = target.raw();
    if frequency_hz == 0 {
        return Err(ConfigError::CompareValueOverflow {
            frequency_hz,
            compare: u32::MAX,
            max: counter_max,
        });
    }

    let ticks = input_clock.raw() / frequency_hz;
    if ticks <= 1 {
        return Err(ConfigError::CompareValueZero { frequency_hz });
    }

    let compare = ticks - 1;
    if compare > counter_max {
        return Err(ConfigError::CompareValueOverflow { frequency_hz, compare, max: counter_max });
    }
    Ok(compare)
}

/// One configured timer interrupt source.
#[derive(Debug, Clone, Copy)]
pub struct TimerChannel {
    id: ChannelId,
    config: ChannelConfig,
    input_clock: HertzU32,
    compare: u32,
    handler: IsrHandler,
}

impl TimerChannel {
    /// Validate `config` against the hardware and bind `handler`.
    pub fn new<H: TimerHardware>(
        hw: &H,
        id: ChannelId,
        config: ChannelConfig,
        handler: IsrHandler,
    ) -> Result<Self, ConfigError> {
        if config.priority < MAX_SYSCALL_INTERRUPT_PRIORITY {
            return Err(ConfigError::PriorityAboveSyscall {
                priority: config.priority,
                ceiling: MAX_SYSCALL_INTERRUPT_PRIORITY,
            });
        }

        let input_clock = hw.input_clock(id);
        let compare = compare_value(input_clock, config.frequency, hw.counter_max(id))?;
        Ok(Self { id, config, input_clock, compare, handler })
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn compare(&self) -> u32 {
        self.compare
    }

    /// Effective period in input clock ticks.
    pub fn period_ticks(&self) -> u32 {
        self.compare + 1
    }

    /// Interrupt entry: run the handler, then yield if it asked for one.
    #[inline]
    pub fn on_fire<P: YieldPort + ?Sized>(&self, port: &P) -> bool {
        fire(self.handler, port)
    }
}

/// Per-cycle phase advance between two channels, in ticks of `a`'s clock.
pub fn phase_drift(a: &TimerChannel, b: &TimerChannel) -> u32 {
    // Express b's period in a's clock before comparing
    let b_in_a = b.period_ticks() as u64 * a.input_clock.raw() as u64 / b.input_clock.raw() as u64;
    (a.period_ticks() as u64).abs_diff(b_in_a) as u32
}

/// `true` if one channel's period is an integer multiple of the other's.
fn harmonic(a: &TimerChannel, b: &TimerChannel) -> bool {
    // Periods in seconds are ticks / clock; cross-multiply to stay integral
    let pa = a.period_ticks() as u64 * b.input_clock.raw() as u64;
    let pb = b.period_ticks() as u64 * a.input_clock.raw() as u64;
    pa % pb == 0 || pb % pa == 0
}

fn fire<P: YieldPort + ?Sized>(handler: IsrHandler, port: &P) -> bool {
    let switch_required = handler();
    if switch_required {
        port.yield_from_isr();
    }
    switch_required
}

/// Handlers looked up by the interrupt vectors, null until bound. Read
/// without masking so the two channels can still nest.
static HANDLERS: [AtomicPtr<()>; 2] = [AtomicPtr::new(ptr::null_mut()), AtomicPtr::new(ptr::null_mut())];

fn bind(channel: ChannelId, handler: IsrHandler) {
    HANDLERS[channel.index()].store(handler as *mut (), Ordering::Release);
}

fn bound(channel: ChannelId) -> Option<IsrHandler> {
    let raw = HANDLERS[channel.index()].load(Ordering::Acquire);
    if raw.is_null() {
        return None;
    }
    // SAFETY: only `bind` stores non-null values, and it stores an
    // `IsrHandler`.
    Some(unsafe { core::mem::transmute::<*mut (), IsrHandler>(raw) })
}

/// Both stress channels.
#[derive(Debug)]
pub struct StressGenerator {
    channels: [TimerChannel; 2],
}

impl StressGenerator {
    pub fn new<H: TimerHardware>(
        hw: &H,
        first: (ChannelConfig, IsrHandler),
        second: (ChannelConfig, IsrHandler),
    ) -> Result<Self, ConfigError> {
        let a = TimerChannel::new(hw, ChannelId::First, first.0, first.1)?;
        let b = TimerChannel::new(hw, ChannelId::Second, second.0, second.1)?;

        if harmonic(&a, &b) {
            return Err(ConfigError::HarmonicChannels {
                first_ticks: a.period_ticks(),
                second_ticks: b.period_ticks(),
            });
        }

        Ok(Self { channels: [a, b] })
    }

    pub fn channel(&self, id: ChannelId) -> &TimerChannel {
        &self.channels[id.index()]
    }

    /// Program and start both channels with interrupts masked, so neither can
    /// fire while the other is half configured.
    pub fn configure<H: TimerHardware>(&self, hw: &mut H) {
        sync::critical_section(|_| {
            for ch in &self.channels {
                hw.program(ch.id, ch.compare, ch.config.priority);
                bind(ch.id, ch.handler);
            }
            for ch in &self.channels {
                hw.start(ch.id);
            }
        });

        info!(
            "stress: {} Hz / {} Hz, drift {} ticks per cycle",
            self.channels[0].config.frequency.raw(),
            self.channels[1].config.frequency.raw(),
            phase_drift(&self.channels[0], &self.channels[1]),
        );
    }
}

/// Interrupt entry point for `channel`. Called from the timer vector after
/// the hardware flag has been cleared. Returns whether a yield was requested.
pub fn dispatch<P: YieldPort + ?Sized>(channel: ChannelId, port: &P) -> bool {
    match bound(channel) {
        Some(handler) => fire(handler, port),
        None => false,
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        STRESS_FIRST_FREQUENCY, STRESS_FIRST_PRIORITY, STRESS_SECOND_FREQUENCY,
        STRESS_SECOND_PRIORITY, TIMER_CLOCK,
    };

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Op {
        Program(ChannelId, u32, u8),
        Start(ChannelId),
    }

    struct MockTimers {
        ops: Vec<Op>,
        max: u32,
    }

    impl MockTimers {
        fn new(max: u32) -> Self {
            Self { ops: Vec::new(), max }
        }
    }

    impl TimerHardware for MockTimers {
        fn input_clock(&self, _channel: ChannelId) -> HertzU32 {
            TIMER_CLOCK
        }

        fn counter_max(&self, _channel: ChannelId) -> u32 {
            self.max
        }

        fn program(&mut self, channel: ChannelId, compare: u32, priority: u8) {
            self.ops.push(Op::Program(channel, compare, priority));
        }

        fn start(&mut self, channel: ChannelId) {
            self.ops.push(Op::Start(channel));
        }
    }

    struct CountingPort(core::cell::Cell<u32>);

    impl YieldPort for CountingPort {
        fn yield_from_isr(&self) {
            self.0.set(self.0.get() + 1);
        }
    }

    fn wants_switch() -> bool {
        true
    }

    fn no_switch() -> bool {
        false
    }

    fn first() -> (ChannelConfig, IsrHandler) {
        (
            ChannelConfig { frequency: STRESS_FIRST_FREQUENCY, priority: STRESS_FIRST_PRIORITY },
            wants_switch,
        )
    }

    fn second() -> (ChannelConfig, IsrHandler) {
        (
            ChannelConfig { frequency: STRESS_SECOND_FREQUENCY, priority: STRESS_SECOND_PRIORITY },
            no_switch,
        )
    }

    #[test]
    fn test_compare_value_derivation() {
        let clock = HertzU32::from_raw(16_000_000);
        assert_eq!(compare_value(clock, HertzU32::from_raw(2000), 0xFFFF), Ok(7999));
        assert_eq!(compare_value(clock, HertzU32::from_raw(2001), 0xFFFF), Ok(7995));
    }

    #[test]
    fn test_compare_value_zero_is_rejected() {
        let clock = HertzU32::from_raw(16_000_000);
        assert_eq!(
            compare_value(clock, HertzU32::from_raw(8_000_001), 0xFFFF),
            Err(ConfigError::CompareValueZero { frequency_hz: 8_000_001 })
        );
        assert!(compare_value(clock, HertzU32::from_raw(32_000_000), 0xFFFF).is_err());
    }

    #[test]
    fn test_compare_value_overflow_is_rejected() {
        let clock = HertzU32::from_raw(16_000_000);
        assert_eq!(
            compare_value(clock, HertzU32::from_raw(200), 0xFFFF),
            Err(ConfigError::CompareValueOverflow { frequency_hz: 200, compare: 79_999, max: 0xFFFF })
        );
        // Fits a 32-bit counter
        assert_eq!(compare_value(clock, HertzU32::from_raw(200), u32::MAX), Ok(79_999));
        assert!(compare_value(clock, HertzU32::from_raw(0), u32::MAX).is_err());
    }

    #[test]
    fn test_priority_above_ceiling_rejected() {
        let hw = MockTimers::new(0xFFFF);
        let config = ChannelConfig { frequency: STRESS_FIRST_FREQUENCY, priority: 0x10 };
        let err = TimerChannel::new(&hw, ChannelId::First, config, no_switch).unwrap_err();
        assert_eq!(err, ConfigError::PriorityAboveSyscall { priority: 0x10, ceiling: 0x50 });

        // Exactly at the ceiling is allowed
        let config = ChannelConfig { frequency: STRESS_FIRST_FREQUENCY, priority: 0x50 };
        assert!(TimerChannel::new(&hw, ChannelId::First, config, no_switch).is_ok());
    }

    #[test]
    fn test_equal_and_harmonic_channels_rejected() {
        let hw = MockTimers::new(0xFFFF);
        let same = (first().0, no_switch as IsrHandler);
        assert!(matches!(
            StressGenerator::new(&hw, first(), same),
            Err(ConfigError::HarmonicChannels { .. })
        ));

        let double = (
            ChannelConfig { frequency: HertzU32::from_raw(4000), priority: STRESS_SECOND_PRIORITY },
            no_switch as IsrHandler,
        );
        assert!(matches!(
            StressGenerator::new(&hw, first(), double),
            Err(ConfigError::HarmonicChannels { .. })
        ));
    }

    #[test]
    fn test_phase_offset_strictly_increases() {
        let hw = MockTimers::new(0xFFFF);
        let gen = StressGenerator::new(&hw, first(), second()).unwrap();
        let a = gen.channel(ChannelId::First).period_ticks() as u64;
        let b = gen.channel(ChannelId::Second).period_ticks() as u64;
        let drift = phase_drift(gen.channel(ChannelId::First), gen.channel(ChannelId::Second));
        assert_eq!(drift, 4);

        // Offset of the second channel's n-th fire behind the first's
        let window = a / drift as u64;
        let mut previous = 0u64;
        for n in 1..window {
            let offset = (n * a - n * b) % a;
            assert!(offset > previous, "phase repeated at cycle {}", n);
            previous = offset;
        }
    }

    #[test]
    fn test_configure_programs_both_before_starting_either() {
        let mut hw = MockTimers::new(0xFFFF);
        let gen = StressGenerator::new(&hw, first(), second()).unwrap();
        gen.configure(&mut hw);

        assert_eq!(
            hw.ops,
            [
                Op::Program(ChannelId::First, 7999, STRESS_FIRST_PRIORITY),
                Op::Program(ChannelId::Second, 7995, STRESS_SECOND_PRIORITY),
                Op::Start(ChannelId::First),
                Op::Start(ChannelId::Second),
            ]
        );
    }

    #[test]
    fn test_on_fire_yields_only_when_requested() {
        let hw = MockTimers::new(0xFFFF);
        let gen = StressGenerator::new(&hw, first(), second()).unwrap();
        let port = CountingPort(core::cell::Cell::new(0));

        assert!(gen.channel(ChannelId::First).on_fire(&port));
        assert!(!gen.channel(ChannelId::Second).on_fire(&port));
        assert_eq!(port.0.get(), 1);
    }

    #[test]
    fn test_dispatch_after_configure() {
        let mut hw = MockTimers::new(0xFFFF);
        let gen = StressGenerator::new(&hw, first(), second()).unwrap();
        gen.configure(&mut hw);

        let port = CountingPort(core::cell::Cell::new(0));
        assert!(dispatch(ChannelId::First, &port));
        assert!(!dispatch(ChannelId::Second, &port));
        assert_eq!(port.0.get(), 1);
    }

    #[test]
    fn test_bound_handlers_read_back() {
        bind(ChannelId::First, wants_switch);
        bind(ChannelId::Second, no_switch);

        let first = bound(ChannelId::First).unwrap();
        let second = bound(ChannelId::Second).unwrap();
        assert!(first());
        assert!(!second());
    }
}
