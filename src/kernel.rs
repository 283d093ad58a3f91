//! # Harness Start-up
//!
//! Builds every component, wires probes and counters into the watchdog,
//! starts the time base and the stress timers, and then runs the foreground
//! executive forever.
//!
//! ## Startup Sequence
//!
//! ```text
//! reset_handler (cortex-m-rt)
//!   └─► main()
//!         ├─► heap init
//!         └─► kernel::start()          (no return)
//!               ├─► logger, registry names, check LED
//!               ├─► watchdog probes and counters
//!               ├─► executive activities and idle hook
//!               ├─► SysTick / PendSV priorities, SysTick
//!               ├─► stress generator configure (TIM2 + TIM3)
//!               └─► dispatch loop, wfi when idle
//! ```

use log::info;

use crate::arch::cortex_m4;
use crate::arch::stm32f4::{CheckLed, Stm32Timers};
use crate::config::{
    CHECK_PRIORITY, INT_QUEUE_PRIORITY, PERTURBER_PRIORITY, PERTURBER_SEED, REG_TEST_1_PARAMETER,
    REG_TEST_2_PARAMETER, REG_TEST_PRIORITY, STRESS_FIRST_FREQUENCY, STRESS_FIRST_PRIORITY,
    STRESS_SECOND_FREQUENCY, STRESS_SECOND_PRIORITY,
};
use crate::demo::int_queue::{self, IntQueueProbe, QueueConsumer, INT_QUEUE};
use crate::demo::reg_test::RegTest;
use crate::error::OrFatal;
use crate::executive::{Dispatch, Executive};
use crate::heap::TrackedHeap;
use crate::idle::IdleDiagnostics;
use crate::logger;
use crate::perturber::Perturber;
use crate::probe::LoopCounter;
use crate::registry::{Registry, ResourceId};
use crate::stress::{ChannelConfig, StressGenerator};
use crate::tick;
use crate::watchdog::{StatusBoard, Watchdog};

// ---------------------------------------------------------------------------
// Global state
// ---------------------------------------------------------------------------

/// Resource names, for the debugger.
pub static REGISTRY: Registry = Registry::new();

/// Latest watchdog verdict, for the debugger and any display task.
pub static STATUS: StatusBoard = StatusBoard::new();

static REG_TEST_1_LOOPS: LoopCounter = LoopCounter::new();
static REG_TEST_2_LOOPS: LoopCounter = LoopCounter::new();

const INT_QUEUE_ID: ResourceId = ResourceId::new(1);
const TEST_RESOURCE_ID: ResourceId = ResourceId::new(2);

// ---------------------------------------------------------------------------
// Start
// ---------------------------------------------------------------------------

/// Start the harness. **Does not return.**
///
/// Any configuration error on the way is fatal.
pub fn start(mut core_peripherals: cortex_m::Peripherals, heap: &'static TrackedHeap) -> ! {
    logger::init(core_peripherals.ITM).or_fatal();
    info!("portcheck: starting, heap {} bytes free", heap.free());

    REGISTRY.add(INT_QUEUE_ID, "IntQueue").or_fatal();

    let start = tick::now();

    let mut check = Watchdog::new(CheckLed::take().or_fatal(), &STATUS, start);
    check
        .register(IntQueueProbe::new(&INT_QUEUE))
        .or_fatal();
    check.watch_counter("Error: Register 1", &REG_TEST_1_LOOPS).or_fatal();
    check.watch_counter("Error: Register 2", &REG_TEST_2_LOOPS).or_fatal();
    let first_check = check.deadline();

    let mut exec = Executive::new();
    exec.spawn(CHECK_PRIORITY, check, first_check);
    exec.spawn(PERTURBER_PRIORITY, Perturber::new(PERTURBER_SEED), start);
    exec.spawn(INT_QUEUE_PRIORITY, QueueConsumer::new(&INT_QUEUE), start);
    exec.spawn(
        REG_TEST_PRIORITY,
        RegTest::new("Reg1", REG_TEST_1_PARAMETER, REG_TEST_1_PARAMETER, 0x1111_1111, &REG_TEST_1_LOOPS),
        start,
    );
    exec.spawn(
        REG_TEST_PRIORITY,
        RegTest::new("Reg2", REG_TEST_2_PARAMETER, REG_TEST_2_PARAMETER, 0x2222_2222, &REG_TEST_2_LOOPS),
        start,
    );
    exec.set_idle_hook(IdleDiagnostics::new(&REGISTRY, heap, TEST_RESOURCE_ID));
    info!("portcheck: activities spawned, heap {} used {} free", heap.used(), heap.free());

    let mut timers = Stm32Timers::new(core_peripherals.NVIC);
    let stress = StressGenerator::new(
        &timers,
        (
            ChannelConfig { frequency: STRESS_FIRST_FREQUENCY, priority: STRESS_FIRST_PRIORITY },
            int_queue::first_timer_handler,
        ),
        (
            ChannelConfig { frequency: STRESS_SECOND_FREQUENCY, priority: STRESS_SECOND_PRIORITY },
            int_queue::second_timer_handler,
        ),
    )
    .or_fatal();

    cortex_m4::set_interrupt_priorities();
    cortex_m4::configure_systick(&mut core_peripherals.SYST);
    stress.configure(&mut timers);

    loop {
        match exec.dispatch(tick::now()) {
            Dispatch::Ran(_) => {}
            // SysTick wakes us at the latest on the next tick
            Dispatch::Idle(_) | Dispatch::Nothing => {
                if exec.next_wake_in(tick::now()) != Some(0) {
                    cortex_m::asm::wfi();
                }
            }
        }
    }
}
