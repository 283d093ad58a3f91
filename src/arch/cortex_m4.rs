//! # Cortex-M4 Port Layer
//!
//! Core-level pieces of the harness: the SysTick time base, the PendSV yield
//! used by the stress interrupts, and the system handler priorities.
//!
//! ## Interrupt Priorities
//!
//! - SysTick: 0xFF (lowest)
//! - PendSV: 0xFF (lowest), so a requested yield only runs once every
//!   stress interrupt has returned
//! - TIM2/TIM3: set by the stress generator, below the syscall ceiling

use core::sync::atomic::{AtomicU32, Ordering};

use cortex_m::peripheral::syst::SystClkSource;
use cortex_m_rt::exception;

use crate::config::{SYSTEM_CLOCK_HZ, TICK_HZ};
use crate::stress::YieldPort;
use crate::tick;

// ---------------------------------------------------------------------------
// SysTick configuration
// ---------------------------------------------------------------------------

/// Configure SysTick to fire at `TICK_HZ` from the processor clock.
pub fn configure_systick(syst: &mut cortex_m::peripheral::SYST) {
    let reload = SYSTEM_CLOCK_HZ / TICK_HZ - 1;
    syst.set_reload(reload);
    syst.clear_current();
    syst.set_clock_source(SystClkSource::Core);
    syst.enable_counter();
    syst.enable_interrupt();
}

// ---------------------------------------------------------------------------
// PendSV
// ---------------------------------------------------------------------------

/// Pend a PendSV exception.
///
/// Sets PENDSVSET in the Interrupt Control and State Register (ICSR).
#[inline]
pub fn trigger_pendsv() {
    // ICSR address: 0xE000_ED04, PENDSVSET = bit 28
    const ICSR: *mut u32 = 0xE000_ED04 as *mut u32;
    unsafe {
        core::ptr::write_volatile(ICSR, 1 << 28);
    }
}

/// Yields requested by interrupt handlers and honoured by PendSV. Read it
/// from the debugger.
#[no_mangle]
static PORTCHECK_YIELDS: AtomicU32 = AtomicU32::new(0);

/// The [`YieldPort`] used by the stress vectors.
pub struct CortexM4Port;

impl YieldPort for CortexM4Port {
    #[inline]
    fn yield_from_isr(&self) {
        trigger_pendsv();
    }
}

// ---------------------------------------------------------------------------
// Interrupt priority configuration
// ---------------------------------------------------------------------------

/// Set PendSV and SysTick to the lowest interrupt priority.
pub fn set_interrupt_priorities() {
    unsafe {
        // System Handler Priority Register 3 (SHPR3): 0xE000_ED20
        // Bits [23:16] = PendSV priority
        // Bits [31:24] = SysTick priority
        let shpr3: *mut u32 = 0xE000_ED20 as *mut u32;
        let val = core::ptr::read_volatile(shpr3);
        let val = val | (0xFF << 16) | (0xFF << 24);
        core::ptr::write_volatile(shpr3, val);
    }
}

// ---------------------------------------------------------------------------
// Exception handlers
// ---------------------------------------------------------------------------

#[exception]
fn SysTick() {
    tick::advance();
}

/// The foreground executive is run-to-completion, so there is no context to
/// switch: returning from PendSV lands back in the dispatch loop, which picks
/// up whatever the interrupt made due.
#[exception]
fn PendSV() {
    PORTCHECK_YIELDS.fetch_add(1, Ordering::Relaxed);
}
