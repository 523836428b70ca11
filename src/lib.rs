//! Implementation of [`embedded_hal`] traits for 8-bit AVR microcontrollers.
//!
//! Supported devices, selected with a Cargo feature:
//!
//! * `atmega328p` (default): hardware TWI, SPI and USART, two 8-bit timers and one 16-bit timer
//! * `attiny85`: the USI stands in for TWI and SPI, one 8-bit timer
//!
//! The centrepiece is the TWI (I2C) master in [`twi`]. Its transaction engine runs on top of
//! either the dedicated TWI peripheral or a bit-banged bus on the USI, so drivers written against
//! [`twi::TwiMaster`] work on both families.
//!
//! [`embedded_hal`]: https://github.com/rust-embedded/embedded-hal
//!
//! # Usage
//!
//! ```ignore
//! use avr8_hal::{clock::MHz16, pac, prelude::*, twi::{Twi, TwiConfig, HardwareTwi}};
//!
//! let dp = pac::Peripherals::take().unwrap();
//! let portc = dp.PORTC.split();
//! let backend = HardwareTwi::new(
//!     dp.TWI,
//!     portc.pin4.into_pull_up_input(),
//!     portc.pin5.into_pull_up_input(),
//!     MHz16,
//!     TwiConfig::default(),
//! );
//! let mut twi = Twi::new(backend);
//! let id = twi.read_register(0x68, 0x75)?;
//! ```
//!
//! Registers are reached through the `avr-device` crate, re-exported as [`pac`]. Host builds
//! (`cargo test`) swap it for a simulated data space, so the drivers can be exercised without
//! hardware.

#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]

#[cfg(not(any(feature = "atmega328p", feature = "attiny85")))]
compile_error!("Select a target device feature: `atmega328p` or `attiny85`");

#[cfg(all(feature = "atmega328p", feature = "attiny85"))]
compile_error!("Select only one target device feature; `attiny85` needs `default-features = false`");

/// Reexport of `atmega328p` from `avr-device`
#[cfg(all(feature = "atmega328p", not(test)))]
pub use avr_device::atmega328p as pac;
/// Reexport of `attiny85` from `avr-device`
#[cfg(all(feature = "attiny85", not(test)))]
pub use avr_device::attiny85 as pac;
#[cfg(test)]
pub use sim::pac;

// Logging is compiled out entirely unless the `defmt` feature is enabled
macro_rules! trace {
    ($($arg:tt)*) => {
        #[cfg(feature = "defmt")]
        defmt::trace!($($arg)*);
    };
}

macro_rules! debug {
    ($($arg:tt)*) => {
        #[cfg(feature = "defmt")]
        defmt::debug!($($arg)*);
    };
}

pub mod adc;
pub mod clock;
pub mod delay;
pub mod exti;
pub mod gpio;
pub mod prelude;
pub mod pwm;
#[cfg(feature = "usart")]
pub mod serial;
pub mod spi;
pub mod timer;
pub mod twi;

mod hw_traits;
#[cfg(test)]
mod sim;
mod util;

pub use util::PollLimit;
