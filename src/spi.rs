//! SPI master
//!
//! [`Spi`] drives the hardware SPI peripheral and [`UsiSpi`] runs the USI in three-wire mode.
//! Both implement embedded-hal's [`SpiBus`](embedded_hal::spi::SpiBus) and embedded-hal-nb's
//! [`FullDuplex`](embedded_hal_nb::spi::FullDuplex). Chip select is left to the application,
//! usually through an `embedded-hal-bus` device wrapper around a GPIO output.
//!
//! Pins:
//!
//! ATmega328P: SCK (PB5), MOSI (PB3), MISO (PB4), SS (PB2)
//!
//! ATtiny85 USI: USCK (PB2), DO (PB1), DI (PB0)

use crate::hw_traits::usi::{UsiPeriph, Usicr, Usisr};
#[cfg(feature = "spi")]
use crate::hw_traits::spi::{Spcr, SpiPeriph, Spsr};
use core::convert::Infallible;

/// Clock polarity and phase
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// CPOL 0, CPHA 0
    #[default]
    Mode0 = 0,
    /// CPOL 0, CPHA 1
    Mode1 = 1,
    /// CPOL 1, CPHA 0
    Mode2 = 2,
    /// CPOL 1, CPHA 1
    Mode3 = 3,
}

impl Mode {
    #[inline(always)]
    fn cpol(self) -> bool {
        (self as u8) & 0b10 != 0
    }

    #[inline(always)]
    fn cpha(self) -> bool {
        (self as u8) & 0b01 != 0
    }

    #[inline(always)]
    fn from_bits(cpol: bool, cpha: bool) -> Self {
        match (cpol, cpha) {
            (false, false) => Mode::Mode0,
            (false, true) => Mode::Mode1,
            (true, false) => Mode::Mode2,
            (true, true) => Mode::Mode3,
        }
    }
}

impl From<embedded_hal::spi::Mode> for Mode {
    fn from(mode: embedded_hal::spi::Mode) -> Self {
        use embedded_hal::spi::{Phase, Polarity};
        Mode::from_bits(
            mode.polarity == Polarity::IdleHigh,
            mode.phase == Phase::CaptureOnSecondTransition,
        )
    }
}

impl From<Mode> for embedded_hal::spi::Mode {
    fn from(mode: Mode) -> Self {
        use embedded_hal::spi::{Phase, Polarity};
        embedded_hal::spi::Mode {
            polarity: if mode.cpol() {
                Polarity::IdleHigh
            } else {
                Polarity::IdleLow
            },
            phase: if mode.cpha() {
                Phase::CaptureOnSecondTransition
            } else {
                Phase::CaptureOnFirstTransition
            },
        }
    }
}

/// Order in which the bits of a byte are shifted out
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BitOrder {
    /// Most significant bit first
    #[default]
    MsbFirst,
    /// Least significant bit first
    LsbFirst,
}

/// SCK frequency as a fraction of the core clock
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Prescaler {
    /// fosc/2
    Div2,
    /// fosc/4
    Div4,
    /// fosc/8
    Div8,
    /// fosc/16
    #[default]
    Div16,
    /// fosc/32
    Div32,
    /// fosc/64
    Div64,
    /// fosc/128
    Div128,
}

impl Prescaler {
    // SPR1:0 and SPI2X
    #[cfg(feature = "spi")]
    #[inline(always)]
    fn bits(self) -> (Spcr, bool) {
        match self {
            Prescaler::Div2 => (Spcr::empty(), true),
            Prescaler::Div4 => (Spcr::empty(), false),
            Prescaler::Div8 => (Spcr::SPR0, true),
            Prescaler::Div16 => (Spcr::SPR0, false),
            Prescaler::Div32 => (Spcr::SPR1, true),
            Prescaler::Div64 => (Spcr::SPR1, false),
            Prescaler::Div128 => (Spcr::SPR1 | Spcr::SPR0, false),
        }
    }
}

/// Settings of the hardware SPI
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SpiConfig {
    /// Clock polarity and phase
    pub mode: Mode,
    /// Bit order
    pub order: BitOrder,
    /// SCK divider
    pub prescaler: Prescaler,
}

impl SpiConfig {
    /// Collect the settings
    pub const fn new(mode: Mode, order: BitOrder, prescaler: Prescaler) -> Self {
        SpiConfig {
            mode,
            order,
            prescaler,
        }
    }
}

/// Marks an SPI peripheral and the pins it drives
#[cfg(feature = "spi")]
pub trait SpiBusPins: SpiPeriph {
    /// Serial clock
    type Sck;
    /// Master out, slave in
    type Mosi;
    /// Master in, slave out
    type Miso;
    /// Slave select. The SPI drops out of master mode if this pin is an input pulled low.
    type Ss;

    #[doc(hidden)]
    fn ss_high(&self);
}

#[cfg(feature = "atmega328p")]
mod atmega328p {
    use super::SpiBusPins;
    use crate::gpio::{Input, Output, Pin, Pin2, Pin3, Pin4, Pin5, Pull};
    use crate::hw_traits::gpio::GpioPeriph;
    use crate::hw_traits::Steal;
    use crate::pac::{PORTB, SPI};

    macro_rules! impl_spi_pin {
        ($struct_name: ident, $port: ty, $pin: ty, $mode: ty $(, $gen: ident: $bound: ident)?) => {
            impl$(<$gen: $bound>)? From<Pin<$port, $pin, $mode>> for $struct_name {
                #[inline(always)]
                fn from(_val: Pin<$port, $pin, $mode>) -> Self {
                    $struct_name
                }
            }
        };
    }

    /// SPI SCK pin
    pub struct SpiSckPin;
    impl_spi_pin!(SpiSckPin, PORTB, Pin5, Output);

    /// SPI MOSI pin
    pub struct SpiMosiPin;
    impl_spi_pin!(SpiMosiPin, PORTB, Pin3, Output);

    /// SPI MISO pin
    pub struct SpiMisoPin;
    impl_spi_pin!(SpiMisoPin, PORTB, Pin4, Input<PULL>, PULL: Pull);

    /// SPI SS pin
    pub struct SpiSsPin;
    impl_spi_pin!(SpiSsPin, PORTB, Pin2, Output);

    impl SpiBusPins for SPI {
        type Sck = SpiSckPin;
        type Mosi = SpiMosiPin;
        type Miso = SpiMisoPin;
        type Ss = SpiSsPin;

        #[inline(always)]
        fn ss_high(&self) {
            let portb = unsafe { PORTB::steal() };
            portb.port_set(1 << 2);
        }
    }
}
#[cfg(feature = "atmega328p")]
pub use atmega328p::*;

/// Hardware SPI master
#[cfg(feature = "spi")]
pub struct Spi<P: SpiBusPins> {
    spi: P,
}

#[cfg(feature = "spi")]
impl<P: SpiBusPins> Spi<P> {
    /// Enable the SPI as master. SS must be an output; it is driven high and left alone.
    pub fn new(
        spi: P,
        _sck: impl Into<P::Sck>,
        _mosi: impl Into<P::Mosi>,
        _miso: impl Into<P::Miso>,
        _ss: impl Into<P::Ss>,
        config: SpiConfig,
    ) -> Self {
        spi.ss_high();
        let (spr, spi2x) = config.prescaler.bits();
        spi.spsr_wr(if spi2x { Spsr::SPI2X } else { Spsr::empty() });
        let mut spcr = Spcr::SPE | Spcr::MSTR | spr;
        if config.order == BitOrder::LsbFirst {
            spcr |= Spcr::DORD;
        }
        spcr |= mode_bits(config.mode);
        spi.spcr_wr(spcr);
        Spi { spi }
    }

    /// Exchange one byte
    pub fn transfer_byte(&mut self, byte: u8) -> u8 {
        self.spi.spdr_wr(byte);
        while !self.spi.spsr_rd().contains(Spsr::SPIF) {}
        self.spi.spdr_rd()
    }

    /// Exchange a block. Runs for the longer of the two buffers, sending zeros after `tx` and
    /// discarding input after `rx`.
    pub fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) {
        for i in 0..tx.len().max(rx.len()) {
            let byte = self.transfer_byte(tx.get(i).copied().unwrap_or(0));
            if let Some(slot) = rx.get_mut(i) {
                *slot = byte;
            }
        }
    }

    /// Send an address or command byte, then exchange a block
    pub fn transfer_with_address(&mut self, addr: u8, tx: &[u8], rx: &mut [u8]) {
        self.transfer_byte(addr);
        self.transfer(tx, rx);
    }

    /// Exchange a 16-bit word, most significant byte first unless the bit order is LSB first
    pub fn transfer16(&mut self, word: u16) -> u16 {
        let [hi, lo] = word.to_be_bytes();
        if self.bit_order() == BitOrder::LsbFirst {
            let lo = self.transfer_byte(lo);
            let hi = self.transfer_byte(hi);
            u16::from_be_bytes([hi, lo])
        } else {
            let hi = self.transfer_byte(hi);
            let lo = self.transfer_byte(lo);
            u16::from_be_bytes([hi, lo])
        }
    }

    /// Current clock mode
    pub fn mode(&self) -> Mode {
        let spcr = self.spi.spcr_rd();
        Mode::from_bits(spcr.contains(Spcr::CPOL), spcr.contains(Spcr::CPHA))
    }

    /// Change the clock mode, returning the previous one
    pub fn set_mode(&mut self, mode: Mode) -> Mode {
        let old = self.mode();
        let spcr = self.spi.spcr_rd() - (Spcr::CPOL | Spcr::CPHA);
        self.spi.spcr_wr(spcr | mode_bits(mode));
        old
    }

    /// Current bit order
    pub fn bit_order(&self) -> BitOrder {
        if self.spi.spcr_rd().contains(Spcr::DORD) {
            BitOrder::LsbFirst
        } else {
            BitOrder::MsbFirst
        }
    }

    /// Disable the SPI and release it
    pub fn free(self) -> P {
        self.spi.spcr_wr(Spcr::empty());
        self.spi
    }
}

#[cfg(feature = "spi")]
#[inline(always)]
fn mode_bits(mode: Mode) -> Spcr {
    let mut spcr = Spcr::empty();
    spcr.set(Spcr::CPOL, mode.cpol());
    spcr.set(Spcr::CPHA, mode.cpha());
    spcr
}

/// Marks a USI and the pins it drives in three-wire mode
pub trait UsiSpiBus: UsiPeriph {
    /// USCK, an output
    type Sck;
    /// DO, an output
    type Do;
    /// DI, an input
    type Di;
}

#[cfg(feature = "attiny85")]
mod attiny85 {
    use super::UsiSpiBus;
    use crate::gpio::{Input, Output, Pin, Pin0, Pin1, Pin2, Pull};
    use crate::pac::{PORTB, USI};

    /// USI USCK pin
    pub struct UsiSckPin;
    impl From<Pin<PORTB, Pin2, Output>> for UsiSckPin {
        #[inline(always)]
        fn from(_val: Pin<PORTB, Pin2, Output>) -> Self {
            UsiSckPin
        }
    }

    /// USI DO pin
    pub struct UsiDoPin;
    impl From<Pin<PORTB, Pin1, Output>> for UsiDoPin {
        #[inline(always)]
        fn from(_val: Pin<PORTB, Pin1, Output>) -> Self {
            UsiDoPin
        }
    }

    /// USI DI pin
    pub struct UsiDiPin;
    impl<PULL: Pull> From<Pin<PORTB, Pin0, Input<PULL>>> for UsiDiPin {
        #[inline(always)]
        fn from(_val: Pin<PORTB, Pin0, Input<PULL>>) -> Self {
            UsiDiPin
        }
    }

    impl UsiSpiBus for USI {
        type Sck = UsiSckPin;
        type Do = UsiDoPin;
        type Di = UsiDiPin;
    }
}
#[cfg(feature = "attiny85")]
pub use attiny85::*;

// Three-wire mode, software clock strobe
const USI_STROBE: Usicr = Usicr::USIWM0
    .union(Usicr::USICS1)
    .union(Usicr::USICLK)
    .union(Usicr::USITC);

/// SPI master on the USI. Mode 0, MSB first only.
pub struct UsiSpi<U: UsiSpiBus> {
    usi: U,
    // Byte received by the last nb write, until read
    received: Option<u8>,
}

impl<U: UsiSpiBus> UsiSpi<U> {
    /// Take the USI and its pins
    pub fn new(
        usi: U,
        _sck: impl Into<U::Sck>,
        _do: impl Into<U::Do>,
        _di: impl Into<U::Di>,
    ) -> Self {
        usi.usicr_wr(Usicr::USIWM0);
        UsiSpi {
            usi,
            received: None,
        }
    }

    /// Exchange one byte
    pub fn transfer_byte(&mut self, byte: u8) -> u8 {
        self.usi.usidr_wr(byte);
        // Also zeroes the edge counter
        self.usi.usisr_wr(Usisr::USIOIF);
        while !self.usi.usisr_rd().contains(Usisr::USIOIF) {
            self.usi.usicr_wr(USI_STROBE);
        }
        self.usi.usibr_rd()
    }

    /// Exchange a block. Runs for the longer of the two buffers, sending zeros after `tx` and
    /// discarding input after `rx`.
    pub fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) {
        for i in 0..tx.len().max(rx.len()) {
            let byte = self.transfer_byte(tx.get(i).copied().unwrap_or(0));
            if let Some(slot) = rx.get_mut(i) {
                *slot = byte;
            }
        }
    }

    /// Release the USI
    pub fn free(self) -> U {
        self.usi.usicr_wr(Usicr::empty());
        self.usi
    }
}

mod ehal1 {
    use super::*;
    use embedded_hal::spi::{ErrorType, SpiBus};

    macro_rules! spi_bus {
        ($Spi:ident, $Bound:ident) => {
            impl<P: $Bound> ErrorType for $Spi<P> {
                type Error = Infallible;
            }

            impl<P: $Bound> SpiBus for $Spi<P> {
                /// Clocks out zeros
                fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
                    for word in words {
                        *word = self.transfer_byte(0);
                    }
                    Ok(())
                }

                fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
                    for &word in words {
                        self.transfer_byte(word);
                    }
                    Ok(())
                }

                fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
                    $Spi::transfer(self, write, read);
                    Ok(())
                }

                fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
                    for word in words {
                        *word = self.transfer_byte(*word);
                    }
                    Ok(())
                }

                /// Transfers complete before returning, so this is a no-op
                fn flush(&mut self) -> Result<(), Self::Error> {
                    Ok(())
                }
            }
        };
    }

    #[cfg(feature = "spi")]
    spi_bus!(Spi, SpiBusPins);
    spi_bus!(UsiSpi, UsiSpiBus);
}

mod ehal_nb1 {
    use super::*;
    use embedded_hal_nb::spi::FullDuplex;

    #[cfg(feature = "spi")]
    impl<P: SpiBusPins> FullDuplex<u8> for Spi<P> {
        /// Completes once the byte started by `write` has been exchanged
        fn read(&mut self) -> nb::Result<u8, Self::Error> {
            if self.spi.spsr_rd().contains(Spsr::SPIF) {
                Ok(self.spi.spdr_rd())
            } else {
                Err(nb::Error::WouldBlock)
            }
        }

        fn write(&mut self, word: u8) -> nb::Result<(), Self::Error> {
            self.spi.spdr_wr(word);
            Ok(())
        }
    }

    impl<U: UsiSpiBus> FullDuplex<u8> for UsiSpi<U> {
        fn read(&mut self) -> nb::Result<u8, Self::Error> {
            self.received.take().ok_or(nb::Error::WouldBlock)
        }

        /// The exchange runs to completion here; the received byte waits for `read`
        fn write(&mut self, word: u8) -> nb::Result<(), Self::Error> {
            if self.received.is_some() {
                return Err(nb::Error::WouldBlock);
            }
            self.received = Some(self.transfer_byte(word));
            Ok(())
        }
    }
}

#[cfg(feature = "embedded-hal-02")]
mod ehal02 {
    use super::*;
    use embedded_hal_02::spi::FullDuplex;

    macro_rules! full_duplex02 {
        ($Spi:ident, $Bound:ident) => {
            impl<P: $Bound> FullDuplex<u8> for $Spi<P> {
                type Error = void::Void;

                fn read(&mut self) -> nb::Result<u8, Self::Error> {
                    embedded_hal_nb::spi::FullDuplex::read(self).map_err(|_| nb::Error::WouldBlock)
                }

                fn send(&mut self, word: u8) -> nb::Result<(), Self::Error> {
                    embedded_hal_nb::spi::FullDuplex::write(self, word)
                        .map_err(|_| nb::Error::WouldBlock)
                }
            }

            // Implementing FullDuplex above gets us a blocking write and transfer implementation for free
            impl<P: $Bound> embedded_hal_02::blocking::spi::write::Default<u8> for $Spi<P> {}
            impl<P: $Bound> embedded_hal_02::blocking::spi::transfer::Default<u8> for $Spi<P> {}
        };
    }

    #[cfg(feature = "spi")]
    full_duplex02!(Spi, SpiBusPins);
    full_duplex02!(UsiSpi, UsiSpiBus);
}
