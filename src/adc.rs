//! Analog to Digital Converter (ADC)
//!
//! The converter is used in single-conversion mode: select a channel, start, wait for ADSC to
//! clear and read the 10-bit result.
//!
//! The ADC may read from any of the following pins:
//!
//! ATmega328P: PC0 - PC5 (channels 0 to 5). Channels 6 and 7 are only bonded out on the TQFP
//! package and channel 8 is the temperature sensor.
//!
//! ATtiny85: PB5 (channel 0), PB2 (channel 1), PB4 (channel 2), PB3 (channel 3)
//!

use crate::gpio::{Floating, Input, Pin};
use crate::hw_traits::adc::{AdcPeriph, Adcsra, MUX_MASK};
use crate::hw_traits::with_field;

/// Reference voltage of the conversion.
///
/// Default: AVcc
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VRef {
    /// Voltage on the AREF pin
    External,
    /// Supply voltage (Vcc on the tinies)
    #[default]
    AVcc,
    /// Internal 1.1V bandgap
    Internal1V1,
    /// Internal 2.56V reference. Not available on the ATmega328P.
    Internal2V56,
}

impl VRef {
    #[inline(always)]
    fn index(self) -> usize {
        self as usize
    }
}

/// Divider from the core clock to the ADC clock, which should stay between 50 and 200 kHz for
/// full resolution.
///
/// Default: divide by 128
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Prescaler {
    /// Divide by 2
    Div2 = 1,
    /// Divide by 4
    Div4 = 2,
    /// Divide by 8
    Div8 = 3,
    /// Divide by 16
    Div16 = 4,
    /// Divide by 32
    Div32 = 5,
    /// Divide by 64
    Div64 = 6,
    /// Divide by 128
    #[default]
    Div128 = 7,
}

impl Prescaler {
    #[inline(always)]
    fn adps(self) -> u8 {
        self as u8
    }
}

/// Configuration object for the ADC
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AdcConfig {
    /// Reference voltage
    pub vref: VRef,
    /// ADC clock divider
    pub prescaler: Prescaler,
}

impl AdcConfig {
    /// Creates an ADC configuration. A default implementation is also available through
    /// `::default()`
    pub fn new(vref: VRef, prescaler: Prescaler) -> Self {
        AdcConfig { vref, prescaler }
    }
}

/// ADC setup errors
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdcError {
    /// The device has no such reference
    ReferenceUnavailable,
}

/// Pins wired to an ADC channel
pub trait AdcPin<A: AdcPeriph> {
    /// Channel index
    const CHANNEL: u8;
}

/// Controls the onboard ADC
pub struct Adc<A: AdcPeriph> {
    adc: A,
    #[cfg(feature = "embedded-hal-02")]
    is_waiting: bool,
}

impl<A: AdcPeriph> Adc<A> {
    /// Apply `config` and enable the converter
    pub fn new(adc: A, config: AdcConfig) -> Result<Self, AdcError> {
        let refs = A::REFS[config.vref.index()].ok_or(AdcError::ReferenceUnavailable)?;
        adc.admux_wr(with_field(adc.admux_rd(), A::REFS_MASK, refs));
        // Auto-trigger source back to free running; conversions are only started by ADSC here
        adc.adcsrb_wr(0);
        adc.adcsra_wr((Adcsra::ADEN | Adcsra::from_bits_retain(config.prescaler.adps())).bits());
        Ok(Adc {
            adc,
            #[cfg(feature = "embedded-hal-02")]
            is_waiting: false,
        })
    }

    /// Start a conversion of `channel`. Only the low four bits of the channel are used.
    #[inline]
    pub fn start_conversion(&mut self, channel: u8) {
        self.adc
            .admux_wr(with_field(self.adc.admux_rd(), MUX_MASK, channel));
        self.adc.adcsra_set(Adcsra::ADSC.bits());
    }

    /// Whether a conversion is underway
    #[inline]
    pub fn is_converting(&self) -> bool {
        self.adc.status().contains(Adcsra::ADSC)
    }

    /// The latest conversion result
    #[inline]
    pub fn result(&self) -> u16 {
        self.adc.adc_rd()
    }

    /// Convert `channel` and block until the result is ready
    pub fn read_channel(&mut self, channel: u8) -> u16 {
        self.start_conversion(channel);
        while self.is_converting() {}
        self.result()
    }

    /// Convert the channel `pin` is wired to
    #[inline]
    pub fn read_pin<P: AdcPin<A>>(&mut self, _pin: &P) -> u16 {
        self.read_channel(P::CHANNEL)
    }

    /// Disconnect the digital input buffer of an analog channel to save power. Only channels 0
    /// to 7 have one; others are ignored.
    pub fn disable_digital_input(&mut self, channel: u8) {
        if channel < 8 {
            self.adc.didr0_set(1 << channel);
        }
    }

    /// Switch the converter off and release the peripheral
    pub fn free(self) -> A {
        self.adc.adcsra_clear(Adcsra::ADEN.bits());
        self.adc
    }
}

/// A channel with the scaling applied to its readings
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnalogInput {
    channel: u8,
    zero: f32,
    span: f32,
    sectors: u8,
}

impl AnalogInput {
    /// Channel with the default scaling: 0 to 100 and 16 sectors
    pub fn raw(channel: u8) -> Self {
        AnalogInput {
            channel,
            zero: 0.0,
            span: 100.0,
            sectors: 16,
        }
    }

    /// Channel whose full-scale reading maps linearly onto `zero..span`
    pub fn engineering(channel: u8, zero: f32, span: f32) -> Self {
        AnalogInput {
            zero,
            span,
            ..Self::raw(channel)
        }
    }

    /// Channel whose readings are split into `n` equal sectors
    pub fn sectors(channel: u8, n: u8) -> Self {
        AnalogInput {
            sectors: n,
            ..Self::raw(channel)
        }
    }

    /// ADC channel
    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Raw conversion result
    pub fn read_raw<A: AdcPeriph>(&self, adc: &mut Adc<A>) -> u16 {
        adc.read_channel(self.channel)
    }

    /// Conversion result in engineering units
    pub fn read_eng<A: AdcPeriph>(&self, adc: &mut Adc<A>) -> f32 {
        self.scale(self.read_raw(adc))
    }

    /// Sector the conversion result falls in
    pub fn read_sector<A: AdcPeriph>(&self, adc: &mut Adc<A>) -> u8 {
        self.sector_of(self.read_raw(adc))
    }

    /// Scale a raw reading to engineering units
    pub fn scale(&self, raw: u16) -> f32 {
        raw as f32 * (self.span - self.zero) / 1023.0 + self.zero
    }

    /// Sector of a raw reading. Fewer than two sectors is a single sector, 0.
    pub fn sector_of(&self, raw: u16) -> u8 {
        if self.sectors < 2 {
            return 0;
        }
        let width = 1023 / (self.sectors as u16 - 1);
        (raw / width).min(u8::MAX as u16) as u8
    }
}

// Pins corresponding to an ADC channel
macro_rules! impl_adc_channel {
    ($Adc: ty, $port: ty, $pin: ty, $channel: literal) => {
        impl AdcPin<$Adc> for Pin<$port, $pin, Input<Floating>> {
            const CHANNEL: u8 = $channel;
        }

        #[cfg(feature = "embedded-hal-02")]
        impl embedded_hal_02::adc::Channel<Adc<$Adc>> for Pin<$port, $pin, Input<Floating>> {
            type ID = u8;

            fn channel() -> Self::ID {
                $channel
            }
        }
    };
}

#[cfg(feature = "atmega328p")]
mod atmega328p {
    use super::*;
    use crate::gpio::{Pin0, Pin1, Pin2, Pin3, Pin4, Pin5};
    use crate::pac::{ADC, PORTC};

    impl_adc_channel!(ADC, PORTC, Pin0, 0);
    impl_adc_channel!(ADC, PORTC, Pin1, 1);
    impl_adc_channel!(ADC, PORTC, Pin2, 2);
    impl_adc_channel!(ADC, PORTC, Pin3, 3);
    impl_adc_channel!(ADC, PORTC, Pin4, 4);
    impl_adc_channel!(ADC, PORTC, Pin5, 5);
}

#[cfg(feature = "attiny85")]
mod attiny85 {
    use super::*;
    use crate::gpio::{Pin2, Pin3, Pin4, Pin5};
    use crate::pac::{ADC, PORTB};

    impl_adc_channel!(ADC, PORTB, Pin5, 0);
    impl_adc_channel!(ADC, PORTB, Pin2, 1);
    impl_adc_channel!(ADC, PORTB, Pin4, 2);
    impl_adc_channel!(ADC, PORTB, Pin3, 3);
}

#[cfg(feature = "embedded-hal-02")]
mod ehal02 {
    use super::*;
    use embedded_hal_02::adc::{Channel, OneShot};

    impl<A, WORD, PIN> OneShot<Adc<A>, WORD, PIN> for Adc<A>
    where
        A: AdcPeriph,
        WORD: From<u16>,
        PIN: Channel<Adc<A>, ID = u8>,
    {
        type Error = void::Void;

        /// Begins a conversion if one is not already underway.
        ///
        /// If the result is ready it is returned, otherwise returns `WouldBlock`
        fn read(&mut self, _pin: &mut PIN) -> nb::Result<WORD, Self::Error> {
            if self.is_waiting {
                if self.is_converting() {
                    return Err(nb::Error::WouldBlock);
                }
                self.is_waiting = false;
                return Ok(self.result().into());
            }

            self.start_conversion(PIN::channel());
            self.is_waiting = true;
            Err(nb::Error::WouldBlock)
        }
    }
}
