//! # STM32F4 Peripherals
//!
//! Just enough of the STM32F407 to run the harness: TIM2 and TIM3 as the two
//! stress interrupt sources, their NVIC lines and vectors, and the check LED
//! on PD13 (LD3 on the STM32F4-Discovery).
//!
//! ## Channel Mapping
//!
//! | Channel  | Timer | Width  | IRQ |
//! |----------|-------|--------|-----|
//! | `First`  | TIM2  | 32-bit | 28  |
//! | `Second` | TIM3  | 16-bit | 29  |

use core::convert::Infallible;
use core::ptr::{read_volatile, write_volatile};
use core::sync::atomic::{AtomicBool, Ordering};

use cortex_m::interrupt::InterruptNumber;
use cortex_m::peripheral::NVIC;
use embedded_hal::digital::{ErrorType, OutputPin, StatefulOutputPin};
use fugit::HertzU32;

use crate::arch::cortex_m4::CortexM4Port;
use crate::config::TIMER_CLOCK;
use crate::error::ConfigError;
use crate::stress::{self, ChannelId, TimerHardware};

// ---------------------------------------------------------------------------
// Register map
// ---------------------------------------------------------------------------

const RCC_AHB1ENR: usize = 0x4002_3830;
const RCC_APB1ENR: usize = 0x4002_3840;

const GPIOD: usize = 0x4002_0C00;
const GPIOD_EN: u32 = 1 << 3;
const GPIO_MODER: usize = 0x00;
const GPIO_ODR: usize = 0x14;
const GPIO_BSRR: usize = 0x18;

const TIM_CR1: usize = 0x00;
const TIM_DIER: usize = 0x0C;
const TIM_SR: usize = 0x10;
const TIM_EGR: usize = 0x14;
const TIM_PSC: usize = 0x28;
const TIM_ARR: usize = 0x2C;

const CR1_CEN: u32 = 1 << 0;
const DIER_UIE: u32 = 1 << 0;
const SR_UIF: u32 = 1 << 0;
const EGR_UG: u32 = 1 << 0;

#[inline(always)]
fn read(addr: usize) -> u32 {
    unsafe { read_volatile(addr as *const u32) }
}

#[inline(always)]
fn write(addr: usize, value: u32) {
    unsafe { write_volatile(addr as *mut u32, value) }
}

#[inline(always)]
fn modify(addr: usize, f: impl FnOnce(u32) -> u32) {
    write(addr, f(read(addr)));
}

// ---------------------------------------------------------------------------
// Interrupt numbers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Irq {
    Tim2 = 28,
    Tim3 = 29,
}

// SAFETY: both numbers are valid STM32F407 interrupt lines.
unsafe impl InterruptNumber for Irq {
    #[inline]
    fn number(self) -> u16 {
        self as u16
    }
}

// ---------------------------------------------------------------------------
// Timers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Timer {
    base: usize,
    apb1_bit: u32,
    irq: Irq,
    counter_max: u32,
}

const TIM2_REGS: Timer = Timer { base: 0x4000_0000, apb1_bit: 1 << 0, irq: Irq::Tim2, counter_max: u32::MAX };
const TIM3_REGS: Timer = Timer { base: 0x4000_0400, apb1_bit: 1 << 1, irq: Irq::Tim3, counter_max: 0xFFFF };

impl Timer {
    const fn of(channel: ChannelId) -> Timer {
        match channel {
            ChannelId::First => TIM2_REGS,
            ChannelId::Second => TIM3_REGS,
        }
    }

    #[inline(always)]
    fn clear_update(&self) {
        // rc_w0: writing 1 elsewhere leaves the other flags alone
        write(self.base + TIM_SR, !SR_UIF);
    }
}

/// TIM2/TIM3 behind the stress generator's [`TimerHardware`] seam.
pub struct Stm32Timers {
    nvic: NVIC,
}

impl Stm32Timers {
    pub fn new(nvic: NVIC) -> Self {
        Self { nvic }
    }
}

impl TimerHardware for Stm32Timers {
    fn input_clock(&self, _channel: ChannelId) -> HertzU32 {
        TIMER_CLOCK
    }

    fn counter_max(&self, channel: ChannelId) -> u32 {
        Timer::of(channel).counter_max
    }

    fn program(&mut self, channel: ChannelId, compare: u32, priority: u8) {
        let tim = Timer::of(channel);
        modify(RCC_APB1ENR, |v| v | tim.apb1_bit);
        // Read back so the clock is running before the first register write
        let _ = read(RCC_APB1ENR);

        write(tim.base + TIM_CR1, 0);
        write(tim.base + TIM_PSC, 0);
        write(tim.base + TIM_ARR, compare);
        // Latch PSC/ARR now, then clear the update flag UG raises
        write(tim.base + TIM_EGR, EGR_UG);
        write(tim.base + TIM_SR, 0);
        write(tim.base + TIM_DIER, DIER_UIE);

        unsafe {
            self.nvic.set_priority(tim.irq, priority);
            NVIC::unmask(tim.irq);
        }
    }

    fn start(&mut self, channel: ChannelId) {
        let tim = Timer::of(channel);
        modify(tim.base + TIM_CR1, |v| v | CR1_CEN);
    }
}

// ---------------------------------------------------------------------------
// Vectors
// ---------------------------------------------------------------------------

#[no_mangle]
unsafe extern "C" fn TIM2() {
    TIM2_REGS.clear_update();
    stress::dispatch(ChannelId::First, &CortexM4Port);
}

#[no_mangle]
unsafe extern "C" fn TIM3() {
    TIM3_REGS.clear_update();
    stress::dispatch(ChannelId::Second, &CortexM4Port);
}

extern "C" {
    fn DefaultHandler();
}

#[doc(hidden)]
pub union Vector {
    handler: unsafe extern "C" fn(),
    _reserved: u32,
}

/// Device interrupt table up to TIM3. Every unused line goes to the
/// runtime's default handler.
#[doc(hidden)]
#[link_section = ".vector_table.interrupts"]
#[no_mangle]
pub static __INTERRUPTS: [Vector; 30] = {
    const DEFAULT: Vector = Vector { handler: DefaultHandler };
    let mut table = [DEFAULT; 30];
    table[Irq::Tim2 as usize] = Vector { handler: TIM2 };
    table[Irq::Tim3 as usize] = Vector { handler: TIM3 };
    table
};

// ---------------------------------------------------------------------------
// Check LED
// ---------------------------------------------------------------------------

const LED_PIN: u32 = 13;

static LED_TAKEN: AtomicBool = AtomicBool::new(false);

/// PD13, push-pull output.
pub struct CheckLed {
    _private: (),
}

impl CheckLed {
    /// Configure PD13 and hand out the only instance.
    pub fn take() -> Result<Self, ConfigError> {
        if LED_TAKEN.swap(true, Ordering::AcqRel) {
            return Err(ConfigError::PeripheralsTaken);
        }

        modify(RCC_AHB1ENR, |v| v | GPIOD_EN);
        let _ = read(RCC_AHB1ENR);
        modify(GPIOD + GPIO_MODER, |v| {
            (v & !(0b11 << (LED_PIN * 2))) | (0b01 << (LED_PIN * 2))
        });

        Ok(Self { _private: () })
    }
}

impl ErrorType for CheckLed {
    type Error = Infallible;
}

impl OutputPin for CheckLed {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        write(GPIOD + GPIO_BSRR, 1 << (LED_PIN + 16));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        write(GPIOD + GPIO_BSRR, 1 << LED_PIN);
        Ok(())
    }
}

impl StatefulOutputPin for CheckLed {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok(read(GPIOD + GPIO_ODR) & (1 << LED_PIN) != 0)
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        self.is_set_high().map(|high| !high)
    }
}
