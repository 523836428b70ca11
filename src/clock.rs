//! Core clock
//!
//! The AVR system clock is fixed by fuses and the oscillator on the board, so it is described at
//! the type level. Drivers that derive timing from the CPU clock (baud rates, TWI bit rate, busy
//! delays) are parameterised by a [`Clock`].

/// Frequency of the CPU clock
pub trait Clock {
    /// Frequency in Hz
    const FREQ: u32;

    /// Frequency in Hz
    #[inline(always)]
    fn freq() -> u32 {
        Self::FREQ
    }
}

macro_rules! clock {
    ($(#[$meta:meta])* $name:ident, $freq:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
        pub struct $name;

        impl Clock for $name {
            const FREQ: u32 = $freq;
        }
    };
}

clock!(
    /// 1 MHz, the factory default on parts shipped with CKDIV8 programmed
    MHz1,
    1_000_000
);
clock!(
    /// 8 MHz internal RC oscillator
    MHz8,
    8_000_000
);
clock!(
    /// 16 MHz crystal, as on the Arduino Uno and Nano
    MHz16,
    16_000_000
);
clock!(
    /// 20 MHz crystal
    MHz20,
    20_000_000
);
