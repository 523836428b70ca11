//! Prelude

pub use crate::adc::AdcPin as _avr8_hal_AdcPin;
pub use crate::clock::Clock as _avr8_hal_Clock;
pub use crate::exti::ExtIntExt as _avr8_hal_ExtIntExt;
pub use crate::gpio::GpioExt as _avr8_hal_GpioExt;
pub use crate::gpio::PinNum as _avr8_hal_PinNum;
pub use crate::pwm::PwmPeriph as _avr8_hal_PwmPeriph;
#[cfg(feature = "usart")]
pub use crate::serial::SerialUsart as _avr8_hal_SerialUsart;
#[cfg(feature = "spi")]
pub use crate::spi::SpiBusPins as _avr8_hal_SpiBusPins;
pub use crate::spi::UsiSpiBus as _avr8_hal_UsiSpiBus;
pub use crate::twi::TwiBackend as _avr8_hal_TwiBackend;
pub use embedded_hal::delay::DelayNs as _avr8_hal_DelayNs;
