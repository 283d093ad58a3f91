//! # Scheduling Perturber
//!
//! A high-priority activity that does nothing but wake at pseudo-random
//! times and burn a pseudo-random amount of CPU, so the other periodic
//! activities never settle into a repeating relative phase. The interrupt
//! stress generator does the same thing one level down with its
//! near-adjacent timer frequencies.
//!
//! The sequence is a classic 32-bit LCG, so a given seed always produces the
//! same run; the jitter is unpredictable to the activities it disturbs, not
//! to whoever is debugging them.

use log::debug;

use crate::arch;
use crate::config::{PERTURBER_INCREMENT, PERTURBER_MIN_DELAY, PERTURBER_MULTIPLIER};
use crate::executive::Activity;
use crate::tick::{self, Ticks};

/// Linear congruential generator, modulus 2^32.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lcg {
    seed: u32,
}

impl Lcg {
    pub const fn new(seed: u32) -> Self {
        Self { seed }
    }

    /// Advance the seed and return it.
    #[inline]
    pub fn step(&mut self) -> u32 {
        self.seed = PERTURBER_MULTIPLIER
            .wrapping_mul(self.seed)
            .wrapping_add(PERTURBER_INCREMENT);
        self.seed
    }
}

/// The perturber activity.
///
/// Each activation spins off the burst drawn on the previous one, then draws
/// the next value and sleeps for it. Seen from outside this is the loop
/// "draw, sleep, spin" with the sleep first.
#[derive(Debug)]
pub struct Perturber {
    rng: Lcg,
    min_delay: Ticks,
    pending_spin: u32,
}

impl Perturber {
    pub const fn new(seed: u32) -> Self {
        Self {
            rng: Lcg::new(seed),
            min_delay: tick::ms_to_ticks(PERTURBER_MIN_DELAY),
            pending_spin: 0,
        }
    }

    /// Draw the next delay: bits 16..24 of the seed, clamped to the minimum.
    pub fn next_delay(&mut self) -> Ticks {
        let value = (self.rng.step() >> 16) & 0xFF;
        value.max(self.min_delay)
    }

    /// Busy-wait for `rounds` rounds of three no-ops. Returns the number of
    /// rounds executed.
    pub fn spin(rounds: u32) -> u32 {
        let mut remaining = rounds;
        while remaining > 0 {
            arch::nop();
            arch::nop();
            arch::nop();
            remaining -= 1;
        }
        rounds
    }
}

impl Activity for Perturber {
    fn name(&self) -> &'static str {
        "Rnd"
    }

    fn run(&mut self, now: Ticks) -> Ticks {
        Self::spin(self.pending_spin);
        let delay = self.next_delay();
        self.pending_spin = delay;
        debug!("rnd: sleeping {} ticks", delay);
        now.wrapping_add(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lcg_sequence() {
        let mut rng = Lcg::new(1);
        assert_eq!(rng.step(), 0x015A_4E36);
        let expected = 0x015A_4E35u32.wrapping_mul(0x015A_4E36).wrapping_add(1);
        assert_eq!(rng.step(), expected);
    }

    #[test]
    fn test_same_seed_same_delays() {
        let mut a = Perturber::new(0xDEAD_BEEF);
        let mut b = Perturber::new(0xDEAD_BEEF);
        for _ in 0..64 {
            assert_eq!(a.next_delay(), b.next_delay());
        }
    }

    #[test]
    fn test_delay_is_bounded_and_clamped() {
        let mut p = Perturber::new(0x2000_7F3C);
        for _ in 0..1000 {
            let d = p.next_delay();
            assert!(d >= 35, "delay {} below minimum", d);
            assert!(d <= 0xFF, "delay {} above 8 bits", d);
        }
    }

    #[test]
    fn test_zero_seed_clamps_to_minimum() {
        // Seed 0 steps to 1: the high bits are zero, so the clamp applies
        let mut p = Perturber::new(0);
        assert_eq!(p.next_delay(), 35);
    }

    #[test]
    fn test_delays_vary() {
        let mut p = Perturber::new(12345);
        let first = p.next_delay();
        assert!((0..32).any(|_| p.next_delay() != first));
    }

    #[test]
    fn test_run_sleeps_then_spins_previous_draw() {
        let mut p = Perturber::new(7);
        let mut shadow = Perturber::new(7);

        let wake = p.run(1000);
        let first = shadow.next_delay();
        assert_eq!(wake, 1000 + first);
        assert_eq!(p.pending_spin, first);

        let wake = p.run(wake);
        let second = shadow.next_delay();
        assert_eq!(wake, 1000 + first + second);
        assert_eq!(p.pending_spin, second);
    }

    #[test]
    fn test_spin_counts_rounds() {
        assert_eq!(Perturber::spin(0), 0);
        assert_eq!(Perturber::spin(40), 40);
    }
}
