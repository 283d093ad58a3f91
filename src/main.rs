//! # portcheck Firmware
//!
//! Runs the port stress harness on an STM32F4-Discovery.
//!
//! | Activity | Priority | Behavior |
//! |----------|----------|----------|
//! | `Check` | 7 | Polls probes and loop counters, toggles LD3 |
//! | `Rnd` | 7 | Sleeps and spins for pseudo-random lengths |
//! | `IntQ` | 3 | Drains the TIM2/TIM3 interrupt queue |
//! | `Reg1`, `Reg2` | 0 | Register integrity loops |
//!
//! LD3 blinks every 3 s while everything is healthy and every 200 ms once
//! any fault has been seen. The status text is in `kernel::STATUS` and on
//! the ITM log.

#![no_std]
#![no_main]

use core::mem::MaybeUninit;
use core::ptr::addr_of_mut;

use cortex_m_rt::entry;
use panic_halt as _;

use portcheck::config::HEAP_SIZE;
use portcheck::error::{ConfigError, OrFatal};
use portcheck::heap::TrackedHeap;
use portcheck::kernel;

#[global_allocator]
static HEAP: TrackedHeap = TrackedHeap::empty();

/// Firmware entry point. Does not return.
#[entry]
fn main() -> ! {
    {
        static mut HEAP_MEM: [MaybeUninit<u8>; HEAP_SIZE] = [MaybeUninit::uninit(); HEAP_SIZE];
        // SAFETY: runs once, before anything allocates; HEAP_MEM is used
        // by nothing else.
        unsafe { HEAP.init(addr_of_mut!(HEAP_MEM) as *mut u8, HEAP_SIZE) }
    }

    let cp = cortex_m::Peripherals::take()
        .ok_or(ConfigError::PeripheralsTaken)
        .or_fatal();

    kernel::start(cp, &HEAP)
}
