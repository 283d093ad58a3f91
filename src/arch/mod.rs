//! # Architecture Abstraction Layer
//!
//! The few operations the portable code needs from the core, plus the
//! Cortex-M4 and STM32F4 port modules. On the host the primitives fall back
//! to plain Rust so every portable module can be unit tested.

#[cfg(all(feature = "firmware", target_os = "none"))]
pub mod cortex_m4;
#[cfg(all(feature = "firmware", target_os = "none"))]
pub mod stm32f4;

/// One no-op instruction.
#[inline(always)]
pub fn nop() {
    #[cfg(target_os = "none")]
    cortex_m::asm::nop();
    #[cfg(not(target_os = "none"))]
    core::hint::spin_loop();
}

/// Load seven core registers with values derived from `seed`, spin `spins`
/// times while holding them, then check none of them changed.
///
/// Registers chosen are the caller-saved set plus the callee-saved registers
/// the compiler lets inline assembly name. A context save or restore path
/// that drops any of them shows up as `false`.
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub fn register_pattern_holds(seed: u32, spins: u32) -> bool {
    let mismatch: u32;
    // SAFETY: only touches the registers declared as outputs below.
    unsafe {
        core::arch::asm!(
            "adds r2, r0, #1",
            "adds r3, r0, #2",
            "adds r4, r0, #3",
            "adds r5, r0, #4",
            "add r8, r0, #5",
            "add r10, r0, #6",
            "add r12, r0, #7",
            "2:",
            "subs r1, r1, #1",
            "bne 2b",
            // Each register minus its expected value must be zero
            "sub r2, r2, r0",
            "sub r2, r2, #1",
            "sub r3, r3, r0",
            "sub r3, r3, #2",
            "orr r2, r2, r3",
            "sub r4, r4, r0",
            "sub r4, r4, #3",
            "orr r2, r2, r4",
            "sub r5, r5, r0",
            "sub r5, r5, #4",
            "orr r2, r2, r5",
            "sub r8, r8, r0",
            "sub r8, r8, #5",
            "orr r2, r2, r8",
            "sub r10, r10, r0",
            "sub r10, r10, #6",
            "orr r2, r2, r10",
            "sub r12, r12, r0",
            "sub r12, r12, #7",
            "orr r2, r2, r12",
            in("r0") seed,
            inout("r1") spins.max(1) => _,
            lateout("r2") mismatch,
            out("r3") _,
            out("r4") _,
            out("r5") _,
            out("r8") _,
            out("r10") _,
            out("r12") _,
            options(nomem, nostack),
        );
    }
    mismatch == 0
}

/// Host rendition: same shape, with the optimizer kept from folding it away.
#[cfg(not(all(target_arch = "arm", target_os = "none")))]
pub fn register_pattern_holds(seed: u32, spins: u32) -> bool {
    use core::hint::black_box;

    let pattern: [u32; 7] = core::array::from_fn(|i| black_box(seed.wrapping_add(i as u32 + 1)));
    for _ in 0..spins {
        core::hint::spin_loop();
    }
    pattern
        .iter()
        .enumerate()
        .all(|(i, &value)| black_box(value) == seed.wrapping_add(i as u32 + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_holds_on_host() {
        assert!(register_pattern_holds(0x1234_5678, 100));
        assert!(register_pattern_holds(u32::MAX, 0));
    }
}
