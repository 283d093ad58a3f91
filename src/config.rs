//! # Harness Configuration
//!
//! Compile-time constants governing the watchdog, the interrupt stress
//! generator and the foreground executive. Everything is fixed at compile
//! time; nothing here is read from the environment.

use fugit::{HertzU32, MillisDurationU32};

// ---------------------------------------------------------------------------
// Clocks and tick
// ---------------------------------------------------------------------------

/// SysTick frequency in Hz. One executive tick is one millisecond.
pub const TICK_HZ: u32 = 1000;

/// System clock frequency in Hz (STM32F4 at 16 MHz HSI after reset).
pub const SYSTEM_CLOCK_HZ: u32 = 16_000_000;

/// Clock feeding TIM2/TIM3. With the APB1 prescaler at 1 the timer kernel
/// clock equals the system clock.
pub const TIMER_CLOCK: HertzU32 = HertzU32::from_raw(SYSTEM_CLOCK_HZ);

// ---------------------------------------------------------------------------
// Watchdog
// ---------------------------------------------------------------------------

/// Watchdog period while no fault has been seen.
pub const CHECK_PERIOD_NORMAL: MillisDurationU32 = MillisDurationU32::from_ticks(3000);

/// Watchdog period once any fault has been latched. The check LED toggles at
/// this rate for the rest of the run.
pub const CHECK_PERIOD_FAST: MillisDurationU32 = MillisDurationU32::from_ticks(200);

/// Upper bound on registered liveness probes.
pub const MAX_PROBES: usize = 32;

/// Message reported while every probe is healthy.
pub const NOMINAL_MESSAGE: &str = "All tasks running without error";

// ---------------------------------------------------------------------------
// Interrupt stress generator
// ---------------------------------------------------------------------------

/// Frequency of the first stress timer.
pub const STRESS_FIRST_FREQUENCY: HertzU32 = HertzU32::from_raw(2000);

/// Frequency of the second stress timer. One hertz away from the first so the
/// relative phase of the two interrupt streams keeps drifting.
pub const STRESS_SECOND_FREQUENCY: HertzU32 = HertzU32::from_raw(2001);

/// Number of NVIC priority bits implemented by the STM32F4.
pub const NVIC_PRIO_BITS: u8 = 4;

/// Most urgent NVIC priority allowed to call primitive operations from an
/// interrupt. Numerically lower values are more urgent on Cortex-M.
pub const MAX_SYSCALL_INTERRUPT_PRIORITY: u8 = 5 << (8 - NVIC_PRIO_BITS);

/// First stress channel: one level below the syscall ceiling.
pub const STRESS_FIRST_PRIORITY: u8 = 6 << (8 - NVIC_PRIO_BITS);

/// Second stress channel: two levels below the ceiling, so the first channel
/// can nest on top of it.
pub const STRESS_SECOND_PRIORITY: u8 = 7 << (8 - NVIC_PRIO_BITS);

/// Items an ISR enqueues between yield requests to the queue consumer.
pub const INT_QUEUE_BATCH: u32 = 8;

// ---------------------------------------------------------------------------
// Scheduling perturber
// ---------------------------------------------------------------------------

/// LCG multiplier.
pub const PERTURBER_MULTIPLIER: u32 = 0x015A_4E35;

/// LCG increment.
pub const PERTURBER_INCREMENT: u32 = 1;

/// Shortest sleep the perturber takes between bursts.
pub const PERTURBER_MIN_DELAY: MillisDurationU32 = MillisDurationU32::from_ticks(35);

/// Seed used by the firmware.
pub const PERTURBER_SEED: u32 = 0x2000_7F3C;

// ---------------------------------------------------------------------------
// Register integrity activities
// ---------------------------------------------------------------------------

/// Start parameter the first register activity must be created with.
pub const REG_TEST_1_PARAMETER: u32 = 0x1234_5678;

/// Start parameter the second register activity must be created with.
pub const REG_TEST_2_PARAMETER: u32 = 0x8765_4321;

/// Spin iterations between loading and verifying the register pattern.
pub const REG_TEST_SPINS: u32 = 2_000;

// ---------------------------------------------------------------------------
// Foreground priorities (higher runs first)
// ---------------------------------------------------------------------------

pub const CHECK_PRIORITY: u8 = 7;
pub const PERTURBER_PRIORITY: u8 = 7;
pub const INT_QUEUE_PRIORITY: u8 = 3;
pub const REG_TEST_PRIORITY: u8 = 0;

// ---------------------------------------------------------------------------
// Memory and registry
// ---------------------------------------------------------------------------

/// Heap handed to the global allocator, in bytes.
pub const HEAP_SIZE: usize = 16 * 1024;

/// Capacity of the resource name registry.
pub const REGISTRY_CAPACITY: usize = 8;

/// Name the idle hook registers the test resource under.
pub const TEST_RESOURCE_NAME: &str = "Test_Mutex";

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Maximum level forwarded by the firmware logger.
pub const LOG_LEVEL: log::LevelFilter = log::LevelFilter::Info;
