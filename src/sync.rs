//! # Synchronization Primitives
//!
//! Interrupt-safe critical sections. On target the implementation comes from
//! `cortex-m`'s single-core critical section (PRIMASK); host tests link the
//! `std` implementation of the `critical-section` crate.
//!
//! Shared state that is written from one context and read from another lives
//! in a [`Mutex`] borrowed through the token handed out here, or in an atomic
//! when it is a single word with a single writer.

pub use critical_section::{CriticalSection, Mutex};

/// Execute a closure within a critical section (interrupts disabled).
///
/// Used when configuring the stress timers so a half-programmed channel can
/// never fire, and for every access to state shared with interrupt handlers.
///
/// # Usage
/// ```ignore
/// sync::critical_section(|cs| {
///     // Access shared state safely
/// });
/// ```
///
/// Keep critical sections short; they delay both stress interrupts.
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(CriticalSection<'_>) -> R,
{
    critical_section::with(f)
}
