//! # Errors
//!
//! Configuration-time failures. Anything in here means the harness cannot
//! run in a defined state; callers at start-up hand it to [`fatal`].
//! Runtime liveness faults are not errors: the watchdog latches them as a
//! [`HealthStatus`](crate::watchdog::HealthStatus).

use core::fmt;

use log::error;

/// Fatal configuration errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The requested frequency is too high for the timer clock; the derived
    /// compare value would be zero.
    CompareValueZero { frequency_hz: u32 },
    /// The requested frequency is too low; the derived compare value does not
    /// fit the counter.
    CompareValueOverflow { frequency_hz: u32, compare: u32, max: u32 },
    /// A stress channel priority is more urgent than the syscall ceiling.
    PriorityAboveSyscall { priority: u8, ceiling: u8 },
    /// The two stress channels run at the same effective period, or one is a
    /// multiple of the other, so their phase would not drift.
    HarmonicChannels { first_ticks: u32, second_ticks: u32 },
    /// The probe list is full.
    TooManyProbes,
    /// The name registry is full.
    RegistryFull,
    /// A hardware peripheral was already taken.
    PeripheralsTaken,
    /// An idle-time diagnostic assertion failed.
    Diagnostic(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::CompareValueZero { frequency_hz } => {
                write!(f, "{} Hz is too fast for the timer clock", frequency_hz)
            }
            ConfigError::CompareValueOverflow { frequency_hz, compare, max } => write!(
                f,
                "{} Hz needs compare value {} but the counter tops out at {}",
                frequency_hz, compare, max
            ),
            ConfigError::PriorityAboveSyscall { priority, ceiling } => write!(
                f,
                "interrupt priority {:#04x} is above the syscall ceiling {:#04x}",
                priority, ceiling
            ),
            ConfigError::HarmonicChannels { first_ticks, second_ticks } => write!(
                f,
                "stress periods {} and {} ticks do not drift",
                first_ticks, second_ticks
            ),
            ConfigError::TooManyProbes => write!(f, "probe list full"),
            ConfigError::RegistryFull => write!(f, "registry full"),
            ConfigError::PeripheralsTaken => write!(f, "peripherals already taken"),
            ConfigError::Diagnostic(what) => write!(f, "diagnostic failed: {}", what),
        }
    }
}

/// Report a fatal error and halt.
///
/// On target the panic handler is `panic-halt`, so this never returns and the
/// debugger finds the core parked with the message in the log.
#[cold]
pub fn fatal(err: ConfigError) -> ! {
    error!("fatal: {}", err);
    panic!("fatal: {}", err)
}

/// Unwrap a configuration result or halt.
pub trait OrFatal<T> {
    fn or_fatal(self) -> T;
}

impl<T> OrFatal<T> for Result<T, ConfigError> {
    #[inline]
    fn or_fatal(self) -> T {
        match self {
            Ok(value) => value,
            Err(err) => fatal(err),
        }
    }
}
