//! # portcheck: RTOS Port Stress Harness
//!
//! A self-checking stress harness for a preemptive kernel port on ARM
//! Cortex-M4 (STM32F4). It drives two near-harmonic timer interrupts into
//! the port, perturbs the foreground with pseudo-random sleeps and bursts,
//! and runs a watchdog that polls every monitored subsystem and reports the
//! verdict on an LED and as status text.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │              Firmware start-up (kernel.rs)              │
//! ├────────────────────────────────────────────────────────┤
//! │            Foreground executive (executive.rs)          │
//! │     Watchdog · Perturber · IntQueue · RegTest · Idle    │
//! ├──────────────┬────────────────────┬───────────────────┤
//! │  Watchdog    │  Stress generator  │  Idle diagnostics  │
//! │  watchdog.rs │  stress.rs         │  idle.rs           │
//! │  ─ probes    │  ─ compare values  │  ─ registry trip   │
//! │  ─ counters  │  ─ ISR dispatch    │  ─ heap telemetry  │
//! │  ─ LED       │  ─ yield port      │                    │
//! ├──────────────┴────────────────────┴───────────────────┤
//! │   probe.rs · tick.rs · registry.rs · heap.rs · sync.rs  │
//! ├────────────────────────────────────────────────────────┤
//! │     Arch Port (arch/cortex_m4.rs, arch/stm32f4.rs)      │
//! │       SysTick · PendSV · TIM2/TIM3 · NVIC · PD13        │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Verdict
//!
//! The watchdog latches the first fault it sees and never clears it. From
//! that cycle on it polls, and blinks, at the fast period. The last probe to
//! fault in a cycle names the status.
//!
//! ## Host Testing
//!
//! Everything above the arch port is plain `no_std` + `alloc` and builds on
//! the host with `std` for unit tests. The port modules, the logger and the
//! start-up code only exist with the `firmware` feature on a bare-metal
//! target.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod arch;
pub mod config;
pub mod demo;
pub mod error;
pub mod executive;
pub mod heap;
pub mod idle;
pub mod perturber;
pub mod probe;
pub mod registry;
pub mod stress;
pub mod sync;
pub mod tick;
pub mod watchdog;

#[cfg(all(feature = "firmware", target_os = "none"))]
pub mod kernel;
#[cfg(all(feature = "firmware", target_os = "none"))]
pub mod logger;
