//! Serial UART
//!
//! USART0 can be used as an asynchronous serial UART.
//!
//! Begin configuration by calling [`SerialConfig::new()`] and select the CPU clock the baud rate
//! is derived from with [`SerialConfig::use_clock()`]. After configuration, [`Rx`] and/or [`Tx`]
//! structs are produced by providing the corresponding GPIO pins.
//!
//! The [`Tx`] and [`Rx`] structs implement both [`embedded-io`](embedded_io)'s buffer-based,
//! blocking traits and the single-byte non-blocking [`embedded-hal-nb`](embedded_hal_nb::serial)
//! version. The USART has a one byte buffer, so `embedded-io`'s
//! [`write`](embedded_io::Write::write) and [`read`](embedded_io::Read::read) move one byte per
//! call; use [`write_all`](embedded_io::Write::write_all) and
//! [`read_exact`](embedded_io::Read::read_exact) for whole buffers.
//!
//! [`Tx`] also implements [`core::fmt::Write`], so `write!` and `writeln!` work on it directly.
//! Line feeds go out as CR LF.
//!
//! Pins: TXD (PD1), RXD (PD0)

use crate::clock::Clock;
use crate::hw_traits::usart::{Ucsra, Ucsrb, UsartPeriph, UCSZ_SHIFT, UPM_SHIFT, USBS};
use crate::hw_traits::Steal;
use core::convert::Infallible;
use core::marker::PhantomData;
use core::num::NonZeroU32;

/// Number of data bits per frame
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataBits {
    /// 5 bits
    Five,
    /// 6 bits
    Six,
    /// 7 bits
    Seven,
    /// 8 bits
    #[default]
    Eight,
    /// 9 bits. The ninth bit is sent from [`Tx::set_ninth_bit`] and read with
    /// [`Rx::ninth_bit`].
    Nine,
}

impl DataBits {
    // UCSZn2:0
    #[inline(always)]
    fn ucsz(self) -> u8 {
        match self {
            DataBits::Five => 0,
            DataBits::Six => 1,
            DataBits::Seven => 2,
            DataBits::Eight => 3,
            DataBits::Nine => 7,
        }
    }
}

/// Parity bit for error checking
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parity {
    /// No parity
    #[default]
    None = 0,
    /// Even parity
    Even = 2,
    /// Odd parity
    Odd = 3,
}

/// Number of stop bits at end of each frame
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopBits {
    /// 1 stop bit
    #[default]
    One,
    /// 2 stop bits
    Two,
}

/// Marks a USART that can be used as a serial UART
pub trait SerialUsart: UsartPeriph {
    /// Pin used for serial TX
    type TxPin;
    /// Pin used for serial RX
    type RxPin;
}

#[cfg(feature = "atmega328p")]
mod atmega328p {
    use super::SerialUsart;
    use crate::gpio::{Pin, Pin0, Pin1, PinMode};
    use crate::pac::{PORTD, USART0};

    // TXEN/RXEN take the pins over regardless of DDR
    macro_rules! impl_serial_pin {
        ($struct_name: ident, $port: ty, $pin: ty) => {
            impl<MODE: PinMode> From<Pin<$port, $pin, MODE>> for $struct_name {
                #[inline(always)]
                fn from(_val: Pin<$port, $pin, MODE>) -> Self {
                    $struct_name
                }
            }
        };
    }

    /// USART0 TX pin
    pub struct Usart0TxPin;
    impl_serial_pin!(Usart0TxPin, PORTD, Pin1);

    /// USART0 RX pin
    pub struct Usart0RxPin;
    impl_serial_pin!(Usart0RxPin, PORTD, Pin0);

    impl SerialUsart for USART0 {
        type TxPin = Usart0TxPin;
        type RxPin = Usart0RxPin;
    }
}
#[cfg(feature = "atmega328p")]
pub use atmega328p::*;

/// Typestate for a serial interface with an unspecified clock
pub struct NoClockSet {
    baudrate: NonZeroU32,
}

/// Typestate for a serial interface with a computed baud divider
pub struct ClockSet {
    baud_config: BaudConfig,
}

/// Builder object for configuring a serial UART
///
/// Once the clock has been selected, the builder can be converted into pins that can transmit or
/// receive bytes via a serial connection.
pub struct SerialConfig<USART: SerialUsart, S> {
    usart: USART,
    data: DataBits,
    parity: Parity,
    stopbits: StopBits,
    state: S,
}

impl<USART: SerialUsart> SerialConfig<USART, NoClockSet> {
    /// Create a new serial configuration. A baud rate of 0 is treated as 1.
    #[inline]
    pub fn new(
        usart: USART,
        baudrate: u32,
        data: DataBits,
        parity: Parity,
        stopbits: StopBits,
    ) -> Self {
        const ONE: NonZeroU32 = NonZeroU32::MIN;
        SerialConfig {
            usart,
            data,
            parity,
            stopbits,
            state: NoClockSet {
                baudrate: NonZeroU32::new(baudrate).unwrap_or(ONE),
            },
        }
    }

    /// Derive the baud rate from the CPU clock
    #[inline(always)]
    pub fn use_clock<CLOCK: Clock>(self, _clock: CLOCK) -> SerialConfig<USART, ClockSet> {
        SerialConfig {
            usart: self.usart,
            data: self.data,
            parity: self.parity,
            stopbits: self.stopbits,
            state: ClockSet {
                baud_config: calculate_baud_config(CLOCK::FREQ, self.state.baudrate),
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct BaudConfig {
    ubrr: u16,
    u2x: bool,
}

// UBRR is 12 bits wide
const UBRR_MAX: u32 = 0x0FFF;
// Percent
const BAUD_TOL: u32 = 2;

// Pick the divider the same way avr-libc's setbaud.h does: normal speed unless the rounded
// divider misses the requested rate by more than the tolerance, then double speed.
fn calculate_baud_config(clk_freq: u32, bps: NonZeroU32) -> BaudConfig {
    let bps = bps.get();
    let normal = ubrr_for(clk_freq, bps, 16);
    if within_tolerance(clk_freq, bps, 16, normal) {
        BaudConfig {
            ubrr: normal as u16,
            u2x: false,
        }
    } else {
        BaudConfig {
            ubrr: ubrr_for(clk_freq, bps, 8) as u16,
            u2x: true,
        }
    }
}

#[inline]
fn ubrr_for(clk_freq: u32, bps: u32, div: u32) -> u32 {
    let ubrr = (clk_freq as u64 + (div as u64 / 2) * bps as u64) / (div as u64 * bps as u64);
    (ubrr as u32).saturating_sub(1).min(UBRR_MAX)
}

#[inline]
fn within_tolerance(clk_freq: u32, bps: u32, div: u32, ubrr: u32) -> bool {
    let clk = 100 * clk_freq as u64;
    let per_bit = div as u64 * (ubrr as u64 + 1);
    let too_slow = clk > per_bit * (100 * bps as u64 + bps as u64 * BAUD_TOL as u64);
    let too_fast = clk < per_bit * (100 * bps as u64 - bps as u64 * BAUD_TOL as u64);
    !(too_slow || too_fast)
}

impl<USART: SerialUsart> SerialConfig<USART, ClockSet> {
    #[inline]
    fn config_hw(self, enable: Ucsrb) {
        let BaudConfig { ubrr, u2x } = self.state.baud_config;
        // The handle is consumed; Tx and Rx reach the registers through the type
        let usart = self.usart;

        usart.ucsrb_wr(0);
        usart.ubrr_wr(ubrr);
        usart.ucsra_wr(if u2x { Ucsra::U2X.bits() } else { 0 });
        let ucsz = self.data.ucsz();
        let stop = match self.stopbits {
            StopBits::One => 0,
            StopBits::Two => USBS,
        };
        usart.ucsrc_wr(((self.parity as u8) << UPM_SHIFT) | stop | ((ucsz & 0x03) << UCSZ_SHIFT));
        let mut ucsrb = enable;
        if ucsz & 0x04 != 0 {
            ucsrb |= Ucsrb::UCSZ2;
        }
        usart.ucsrb_wr(ucsrb.bits());
    }

    /// Perform hardware configuration and split into Tx and Rx pins from appropriate GPIOs
    #[inline]
    pub fn split<T: Into<USART::TxPin>, R: Into<USART::RxPin>>(
        self,
        _tx: T,
        _rx: R,
    ) -> (Tx<USART>, Rx<USART>) {
        self.config_hw(Ucsrb::TXEN | Ucsrb::RXEN);
        (Tx::new(), Rx(PhantomData))
    }

    /// Perform hardware configuration and create Tx pin from appropriate GPIO
    #[inline]
    pub fn tx_only<T: Into<USART::TxPin>>(self, _tx: T) -> Tx<USART> {
        self.config_hw(Ucsrb::TXEN);
        Tx::new()
    }

    /// Perform hardware configuration and create Rx pin from appropriate GPIO
    #[inline]
    pub fn rx_only<R: Into<USART::RxPin>>(self, _rx: R) -> Rx<USART> {
        self.config_hw(Ucsrb::RXEN);
        Rx(PhantomData)
    }
}

/// Serial transmitter pin
pub struct Tx<USART: SerialUsart> {
    _usart: PhantomData<USART>,
    // A frame has been queued since the last completed flush
    pending: bool,
}

impl<USART: SerialUsart> Tx<USART> {
    fn new() -> Self {
        Tx {
            _usart: PhantomData,
            pending: false,
        }
    }

    /// Enable the transmit-complete interrupt
    #[inline(always)]
    pub fn enable_tx_interrupts(&mut self) {
        let usart = unsafe { USART::steal() };
        usart.ucsrb_set(Ucsrb::TXCIE.bits());
    }

    /// Disable the transmit-complete interrupt
    #[inline(always)]
    pub fn disable_tx_interrupts(&mut self) {
        let usart = unsafe { USART::steal() };
        usart.ucsrb_clear(Ucsrb::TXCIE.bits());
    }

    /// Enable the data-register-empty interrupt, which fires while ready to send
    #[inline(always)]
    pub fn enable_udre_interrupts(&mut self) {
        let usart = unsafe { USART::steal() };
        usart.ucsrb_set(Ucsrb::UDRIE.bits());
    }

    /// Disable the data-register-empty interrupt
    #[inline(always)]
    pub fn disable_udre_interrupts(&mut self) {
        let usart = unsafe { USART::steal() };
        usart.ucsrb_clear(Ucsrb::UDRIE.bits());
    }

    /// Ninth data bit of the following frames, in 9-bit mode
    #[inline(always)]
    pub fn set_ninth_bit(&mut self, bit: bool) {
        let usart = unsafe { USART::steal() };
        if bit {
            usart.ucsrb_set(Ucsrb::TXB8.bits());
        } else {
            usart.ucsrb_clear(Ucsrb::TXB8.bits());
        }
    }

    /// Writes a byte into the Tx buffer with no checks for validity
    /// # Safety
    /// May clobber unsent data still in the buffer
    #[inline(always)]
    pub unsafe fn write_no_check(&mut self, data: u8) {
        let usart = USART::steal();
        usart.udr_wr(data);
    }

    // Completes once the shift register has emptied
    #[inline]
    fn flush(&mut self) -> nb::Result<(), Infallible> {
        if !self.pending {
            return Ok(());
        }
        let usart = unsafe { USART::steal() };
        if usart.status().contains(Ucsra::UDRE | Ucsra::TXC) {
            self.pending = false;
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    #[inline]
    fn send(&mut self, data: u8) -> nb::Result<(), Infallible> {
        let usart = unsafe { USART::steal() };
        let status = usart.status();
        if status.contains(Ucsra::UDRE) {
            // TXC clears by writing 1; keep the speed and multiprocessor bits
            let keep = status & (Ucsra::U2X | Ucsra::MPCM);
            usart.ucsra_wr((keep | Ucsra::TXC).bits());
            usart.udr_wr(data);
            self.pending = true;
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }
}

impl<USART: SerialUsart> core::fmt::Write for Tx<USART> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for byte in s.bytes() {
            if byte == b'\n' {
                nb::block!(self.send(b'\r')).unwrap_or_else(|never| match never {});
            }
            nb::block!(self.send(byte)).unwrap_or_else(|never| match never {});
        }
        Ok(())
    }
}

/// Serial receiver pin
pub struct Rx<USART: SerialUsart>(PhantomData<USART>);

impl<USART: SerialUsart> Rx<USART> {
    /// Enable Rx interrupts, which fire when a byte is ready to read
    #[inline(always)]
    pub fn enable_rx_interrupts(&mut self) {
        let usart = unsafe { USART::steal() };
        usart.ucsrb_set(Ucsrb::RXCIE.bits());
    }

    /// Disable Rx interrupts
    #[inline(always)]
    pub fn disable_rx_interrupts(&mut self) {
        let usart = unsafe { USART::steal() };
        usart.ucsrb_clear(Ucsrb::RXCIE.bits());
    }

    /// Ninth data bit of the frame about to be read, in 9-bit mode. Must be read before the byte.
    #[inline(always)]
    pub fn ninth_bit(&self) -> bool {
        let usart = unsafe { USART::steal() };
        usart.ucsrb_rd() & Ucsrb::RXB8.bits() != 0
    }

    /// Reads raw value from Rx buffer with no checks for validity
    /// # Safety
    /// May read duplicate data
    #[inline(always)]
    pub unsafe fn read_no_check(&mut self) -> u8 {
        let usart = USART::steal();
        usart.udr_rd()
    }

    fn recv(&mut self) -> nb::Result<u8, RecvError> {
        // Error flags belong to the byte at the head of the buffer and must be read first
        let usart = unsafe { USART::steal() };
        let status = usart.status();
        if !status.contains(Ucsra::RXC) {
            return Err(nb::Error::WouldBlock);
        }
        let data = usart.udr_rd();

        if status.contains(Ucsra::FE) {
            Err(nb::Error::Other(RecvError::Framing))
        } else if status.contains(Ucsra::UPE) {
            Err(nb::Error::Other(RecvError::Parity))
        } else if status.contains(Ucsra::DOR) {
            Err(nb::Error::Other(RecvError::Overrun(data)))
        } else {
            Ok(data)
        }
    }
}

/// Serial receive errors
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecvError {
    /// Framing error
    Framing,
    /// Parity error
    Parity,
    /// Buffer overrun error. Contains the byte at the head of the buffer, which is still valid.
    Overrun(u8),
}

mod emb_io {
    use super::*;
    use embedded_io::{Error, ErrorType, Read, ReadReady, Write, WriteReady};
    use nb::block;

    impl<USART: SerialUsart> ErrorType for Rx<USART> {
        type Error = RecvError;
    }

    impl Error for RecvError {
        fn kind(&self) -> embedded_io::ErrorKind {
            match self {
                RecvError::Framing | RecvError::Parity => embedded_io::ErrorKind::InvalidData,
                RecvError::Overrun(_) => embedded_io::ErrorKind::Other,
            }
        }
    }

    impl<USART: SerialUsart> Read for Rx<USART> {
        /// Read one byte into the buffer and return 1, blocking until a byte arrives.
        ///
        /// If `buf` is empty, returns `Ok(0)` without blocking.
        #[inline]
        fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
            let Some(slot) = buf.first_mut() else {
                return Ok(0);
            };
            *slot = block!(self.recv())?;
            Ok(1)
        }
    }

    impl<USART: SerialUsart> ReadReady for Rx<USART> {
        fn read_ready(&mut self) -> Result<bool, Self::Error> {
            Ok(unsafe { USART::steal() }.status().contains(Ucsra::RXC))
        }
    }

    impl<USART: SerialUsart> ErrorType for Tx<USART> {
        type Error = Infallible;
    }

    impl<USART: SerialUsart> Write for Tx<USART> {
        /// Blocks until the last frame has left the shift register.
        #[inline]
        fn flush(&mut self) -> Result<(), Self::Error> {
            block!(Tx::flush(self))
        }

        /// Sends only **the first** byte of `buf`, blocking until the data register is free, then
        /// returns `Ok(1)`. Use `write_all()` to send the whole buffer.
        ///
        /// If `buf` is empty, returns `Ok(0)` without blocking.
        #[inline]
        fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
            let Some(&byte) = buf.first() else {
                return Ok(0);
            };
            block!(self.send(byte))?;
            Ok(1)
        }
    }

    impl<USART: SerialUsart> WriteReady for Tx<USART> {
        /// If this returns `true`, the next call to [`Write::write`] will not block.
        fn write_ready(&mut self) -> Result<bool, Self::Error> {
            Ok(unsafe { USART::steal() }.status().contains(Ucsra::UDRE))
        }
    }
}

mod ehal_nb1 {
    use super::*;
    use embedded_hal_nb::serial::{Error, ErrorKind, ErrorType, Read, Write};

    impl Error for RecvError {
        fn kind(&self) -> ErrorKind {
            match self {
                RecvError::Framing => ErrorKind::FrameFormat,
                RecvError::Parity => ErrorKind::Parity,
                RecvError::Overrun(_) => ErrorKind::Overrun,
            }
        }
    }

    impl<USART: SerialUsart> ErrorType for Rx<USART> {
        type Error = RecvError;
    }

    impl<USART: SerialUsart> Read<u8> for Rx<USART> {
        /// Return the received byte if one is waiting, otherwise `WouldBlock`. Reading clears
        /// the receive flag.
        #[inline]
        fn read(&mut self) -> nb::Result<u8, Self::Error> {
            self.recv()
        }
    }

    impl<USART: SerialUsart> ErrorType for Tx<USART> {
        type Error = Infallible;
    }

    impl<USART: SerialUsart> Write<u8> for Tx<USART> {
        #[inline]
        fn flush(&mut self) -> nb::Result<(), Self::Error> {
            Tx::flush(self)
        }

        /// Queue a byte if the data register is free, otherwise `WouldBlock`
        #[inline]
        fn write(&mut self, data: u8) -> nb::Result<(), Self::Error> {
            self.send(data)
        }
    }
}

#[cfg(feature = "embedded-hal-02")]
mod ehal02 {
    use super::*;
    use embedded_hal_02::serial::{Read, Write};

    impl<USART: SerialUsart> Read<u8> for Rx<USART> {
        type Error = RecvError;

        #[inline]
        fn read(&mut self) -> nb::Result<u8, Self::Error> {
            self.recv()
        }
    }

    impl<USART: SerialUsart> Write<u8> for Tx<USART> {
        type Error = void::Void;

        #[inline]
        fn flush(&mut self) -> nb::Result<(), Self::Error> {
            Tx::flush(self).map_err(|_| nb::Error::WouldBlock)
        }

        #[inline]
        fn write(&mut self, data: u8) -> nb::Result<(), Self::Error> {
            self.send(data).map_err(|_| nb::Error::WouldBlock)
        }
    }

    impl<USART: SerialUsart> embedded_hal_02::blocking::serial::write::Default<u8> for Tx<USART> {}
}
