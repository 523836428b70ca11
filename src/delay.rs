//! Busy-wait delay
//!
//! Implements [`DelayNs`](embedded_hal::delay::DelayNs) by spinning for a number of loop
//! iterations derived from the core clock. Accuracy is a few cycles per call, which is enough for
//! bit-banged bus timing and for coarse millisecond waits.

use crate::clock::Clock;
use core::marker::PhantomData;
use embedded_hal::delay::DelayNs;

// Cycles taken by one iteration of the spin loop
const CYCLES_PER_ITER: u32 = 4;

/// Delay provider for a CPU running at `CLOCK`
pub struct Delay<CLOCK> {
    _clock: PhantomData<CLOCK>,
}

impl<CLOCK: Clock> Delay<CLOCK> {
    /// Create a delay provider
    pub const fn new() -> Self {
        Delay {
            _clock: PhantomData,
        }
    }

    #[inline(always)]
    fn spin(iters: u32) {
        for _ in 0..iters {
            core::hint::spin_loop();
        }
    }

    // Iterations needed for `ns`, rounded up so short delays never collapse to nothing
    #[inline(always)]
    fn iters_for_ns(ns: u32) -> u32 {
        let cycles = (ns as u64 * CLOCK::FREQ as u64).div_ceil(1_000_000_000);
        (cycles as u32).div_ceil(CYCLES_PER_ITER)
    }
}

impl<CLOCK: Clock> Default for Delay<CLOCK> {
    fn default() -> Self {
        Self::new()
    }
}

impl<CLOCK: Clock> DelayNs for Delay<CLOCK> {
    #[inline]
    fn delay_ns(&mut self, ns: u32) {
        Self::spin(Self::iters_for_ns(ns));
    }

    #[inline]
    fn delay_us(&mut self, us: u32) {
        for _ in 0..us {
            Self::spin(Self::iters_for_ns(1_000));
        }
    }

    #[inline]
    fn delay_ms(&mut self, ms: u32) {
        for _ in 0..ms {
            self.delay_us(1_000);
        }
    }
}

#[cfg(feature = "embedded-hal-02")]
mod ehal02 {
    use super::*;
    use embedded_hal_02::blocking::delay::{DelayMs, DelayUs};

    impl<CLOCK: Clock> DelayMs<u16> for Delay<CLOCK> {
        #[inline]
        fn delay_ms(&mut self, ms: u16) {
            DelayNs::delay_ms(self, ms as u32);
        }
    }

    impl<CLOCK: Clock> DelayUs<u16> for Delay<CLOCK> {
        #[inline]
        fn delay_us(&mut self, us: u16) {
            DelayNs::delay_us(self, us as u32);
        }
    }
}
