//! Register-level access traits
//!
//! Drivers in this crate talk to peripherals only through these traits. Firmware builds implement
//! them over the `avr-device` register blocks; host tests implement them over a simulated data
//! space.

#[cfg(not(test))]
use crate::pac;

#[cfg(not(test))]
macro_rules! reg_methods {
    ($reg:ident, $rd:ident, $wr:ident) => {
        reg_methods!($reg: u8, $rd, $wr);
    };

    ($reg:ident: $ty:ty, $rd:ident, $wr:ident) => {
        #[inline(always)]
        fn $rd(&self) -> $ty {
            self.$reg.read().bits()
        }

        #[inline(always)]
        fn $wr(&self, bits: $ty) {
            self.$reg.write(|w| unsafe { w.bits(bits) });
        }
    };

    ($reg:ident, $rd:ident, $wr:ident, $set:ident, $clear:ident) => {
        reg_methods!($reg, $rd, $wr);

        #[inline(always)]
        fn $set(&self, bits: u8) {
            self.$reg.modify(|r, w| unsafe { w.bits(r.bits() | bits) });
        }

        #[inline(always)]
        fn $clear(&self, bits: u8) {
            self.$reg.modify(|r, w| unsafe { w.bits(r.bits() & !bits) });
        }
    };
}

pub mod adc;
pub mod exti;
pub mod gpio;
pub mod spi;
pub mod timer;
pub mod twi;
pub mod usart;
pub mod usi;

/// Conjure a peripheral handle out of thin air
pub trait Steal {
    /// Create a handle without checking that it is the only one.
    ///
    /// # Safety
    /// The caller must ensure no other code concurrently drives the same peripheral.
    unsafe fn steal() -> Self;
}

#[cfg(not(test))]
macro_rules! steal_impl {
    ($($P:ident),+) => {
        $(
            impl Steal for pac::$P {
                #[inline(always)]
                unsafe fn steal() -> Self {
                    pac::Peripherals::steal().$P
                }
            }
        )+
    };
}

#[cfg(all(not(test), feature = "atmega328p"))]
steal_impl!(PORTB, PORTC, PORTD, TWI, SPI, USART0, ADC, EXINT, TC0, TC1, TC2);

#[cfg(all(not(test), feature = "attiny85"))]
steal_impl!(PORTB, USI, ADC, EXINT, TC0);

/// Replace the bits of `reg` under `mask` with those of `value`
#[inline(always)]
pub fn with_field(reg: u8, mask: u8, value: u8) -> u8 {
    (reg & !mask) | (value & mask)
}
