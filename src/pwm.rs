//! PWM channels
//!
//! A timer switched into a PWM waveform mode with `into_pwm` yields one uninitialized channel per
//! output compare unit. A channel starts driving its OCnx pin once it is initialized with that
//! pin configured as an output. All channels of a timer share its period; each has its own duty
//! cycle.
//!
//! ```ignore
//! let pwm = Timer8::new(dp.TC0, ClockSource::Div64, Wavegen8::Normal).into_pwm(Wavegen8::FastPwm);
//! let mut led = pwm.a.init(portd.pin6.into_output());
//! led.set_duty_cycle_percent(25)?;
//! ```
//!
//! Pins:
//!
//! ATmega328P: OC0A (PD6), OC0B (PD5), OC1A (PB1), OC1B (PB2), OC2A (PB3), OC2B (PD3)
//!
//! ATtiny85: OC0A (PB0), OC0B (PB1)

use crate::timer::CompareMode;
use core::convert::Infallible;
use core::marker::PhantomData;

/// Output compare unit A
pub struct ChA;
/// Output compare unit B
pub struct ChB;

/// Associates a timer's compare unit `C` with its output pin
pub trait PwmPeriph<C> {
    /// GPIO pin driven by the compare unit
    type Gpio;

    #[doc(hidden)]
    fn connect(mode: CompareMode);
    #[doc(hidden)]
    fn duty() -> u16;
    #[doc(hidden)]
    fn set_duty(duty: u16);
    #[doc(hidden)]
    fn top() -> u16;
}

/// The uninitialized PWM channels of one timer
pub struct PwmParts<T> {
    /// Channel driven by compare unit A
    pub a: PwmUninit<T, ChA>,
    /// Channel driven by compare unit B
    pub b: PwmUninit<T, ChB>,
}

impl<T> PwmParts<T> {
    pub(crate) fn new() -> Self {
        PwmParts {
            a: PwmUninit(PhantomData, PhantomData),
            b: PwmUninit(PhantomData, PhantomData),
        }
    }
}

/// Uninitialized PWM channel
pub struct PwmUninit<T, C>(PhantomData<T>, PhantomData<C>);

impl<T: PwmPeriph<C>, C> PwmUninit<T, C> {
    /// Start driving `pin` with a non-inverted waveform. The duty cycle is whatever the compare
    /// register currently holds.
    pub fn init(self, pin: T::Gpio) -> Pwm<T, C> {
        T::connect(CompareMode::Clear);
        Pwm {
            _timer: PhantomData,
            _ch: PhantomData,
            pin,
        }
    }
}

/// An initialized PWM channel
pub struct Pwm<T: PwmPeriph<C>, C> {
    _timer: PhantomData<T>,
    _ch: PhantomData<C>,
    pin: T::Gpio,
}

impl<T: PwmPeriph<C>, C> Pwm<T, C> {
    /// Current compare value
    #[inline]
    pub fn duty(&self) -> u16 {
        T::duty()
    }

    /// Hand the pin back to the port; it keeps its last GPIO level
    #[inline]
    pub fn disable(&mut self) {
        T::connect(CompareMode::Disconnected);
    }

    /// Drive the pin from the compare unit again
    #[inline]
    pub fn enable(&mut self) {
        T::connect(CompareMode::Clear);
    }

    /// Drive the pin with the inverted waveform
    #[inline]
    pub fn invert(&mut self) {
        T::connect(CompareMode::Set);
    }

    /// Disconnect the compare unit and release the pin
    pub fn free(self) -> T::Gpio {
        T::connect(CompareMode::Disconnected);
        self.pin
    }
}

impl<T: PwmPeriph<C>, C> embedded_hal::pwm::ErrorType for Pwm<T, C> {
    type Error = Infallible;
}

impl<T: PwmPeriph<C>, C> embedded_hal::pwm::SetDutyCycle for Pwm<T, C> {
    /// TOP of the current waveform mode
    #[inline]
    fn max_duty_cycle(&self) -> u16 {
        T::top()
    }

    /// Values above TOP are clamped to TOP
    #[inline]
    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        T::set_duty(duty.min(T::top()));
        Ok(())
    }
}

#[cfg(feature = "embedded-hal-02")]
impl<T: PwmPeriph<C>, C> embedded_hal_02::PwmPin for Pwm<T, C> {
    type Duty = u16;

    #[inline]
    fn disable(&mut self) {
        Pwm::disable(self)
    }

    #[inline]
    fn enable(&mut self) {
        Pwm::enable(self)
    }

    #[inline]
    fn get_duty(&self) -> u16 {
        T::duty()
    }

    #[inline]
    fn get_max_duty(&self) -> u16 {
        T::top()
    }

    #[inline]
    fn set_duty(&mut self, duty: u16) {
        T::set_duty(duty.min(T::top()))
    }
}

macro_rules! pwm8 {
    ($Timer:ty, $Ch:ty, $ocr_rd:ident, $ocr_wr:ident, $shift:expr, $Port:ty, $Pin:ty) => {
        impl PwmPeriph<$Ch> for $Timer {
            type Gpio = $crate::gpio::Pin<$Port, $Pin, $crate::gpio::Output>;

            #[inline]
            fn connect(mode: CompareMode) {
                let timer = unsafe { <$Timer>::steal() };
                let (mask, bits) = $crate::timer::com_field($shift, mode);
                timer.tccra_wr(with_field(timer.tccra_rd(), mask, bits));
            }

            #[inline]
            fn duty() -> u16 {
                let timer = unsafe { <$Timer>::steal() };
                timer.$ocr_rd().into()
            }

            #[inline]
            fn set_duty(duty: u16) {
                let timer = unsafe { <$Timer>::steal() };
                timer.$ocr_wr(duty as u8)
            }

            #[inline]
            fn top() -> u16 {
                let timer = unsafe { <$Timer>::steal() };
                $crate::timer::top8(&timer).into()
            }
        }
    };
}

#[cfg(feature = "timer16")]
macro_rules! pwm16 {
    ($Timer:ty, $Ch:ty, $ocr_rd:ident, $ocr_wr:ident, $shift:expr, $Port:ty, $Pin:ty) => {
        impl PwmPeriph<$Ch> for $Timer {
            type Gpio = $crate::gpio::Pin<$Port, $Pin, $crate::gpio::Output>;

            #[inline]
            fn connect(mode: CompareMode) {
                let timer = unsafe { <$Timer>::steal() };
                let (mask, bits) = $crate::timer::com_field($shift, mode);
                timer.tccra_wr(with_field(timer.tccra_rd(), mask, bits));
            }

            #[inline]
            fn duty() -> u16 {
                let timer = unsafe { <$Timer>::steal() };
                timer.$ocr_rd()
            }

            #[inline]
            fn set_duty(duty: u16) {
                let timer = unsafe { <$Timer>::steal() };
                timer.$ocr_wr(duty)
            }

            #[inline]
            fn top() -> u16 {
                let timer = unsafe { <$Timer>::steal() };
                $crate::timer::top16(&timer)
            }
        }
    };
}

#[cfg(feature = "atmega328p")]
mod atmega328p {
    use super::*;
    use crate::gpio::{Pin1, Pin2, Pin3, Pin5, Pin6};
    use crate::hw_traits::timer::{Timer16Periph, Timer8Periph, COMA_SHIFT, COMB_SHIFT};
    use crate::hw_traits::{with_field, Steal};
    use crate::pac::{PORTB, PORTD, TC0, TC1, TC2};

    pwm8!(TC0, ChA, ocra_rd, ocra_wr, COMA_SHIFT, PORTD, Pin6);
    pwm8!(TC0, ChB, ocrb_rd, ocrb_wr, COMB_SHIFT, PORTD, Pin5);
    pwm16!(TC1, ChA, ocra_rd, ocra_wr, COMA_SHIFT, PORTB, Pin1);
    pwm16!(TC1, ChB, ocrb_rd, ocrb_wr, COMB_SHIFT, PORTB, Pin2);
    pwm8!(TC2, ChA, ocra_rd, ocra_wr, COMA_SHIFT, PORTB, Pin3);
    pwm8!(TC2, ChB, ocrb_rd, ocrb_wr, COMB_SHIFT, PORTD, Pin3);
}

#[cfg(feature = "attiny85")]
mod attiny85 {
    use super::*;
    use crate::gpio::{Pin0, Pin1};
    use crate::hw_traits::timer::{Timer8Periph, COMA_SHIFT, COMB_SHIFT};
    use crate::hw_traits::{with_field, Steal};
    use crate::pac::{PORTB, TC0};

    pwm8!(TC0, ChA, ocra_rd, ocra_wr, COMA_SHIFT, PORTB, Pin0);
    pwm8!(TC0, ChB, ocrb_rd, ocrb_wr, COMB_SHIFT, PORTB, Pin1);
}
