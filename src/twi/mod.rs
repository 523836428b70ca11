//! TWI (I2C) master
//!
//! The bus protocol is split in two layers:
//!
//! * A [`TwiBackend`] drives the individual bus primitives: start/repeated start with the address
//!   phase, single byte writes and reads, and stop. [`HardwareTwi`] uses the dedicated TWI
//!   peripheral of the megaAVR parts; [`UsiTwi`] bit-bangs the protocol through the USI of the
//!   small tinies.
//! * [`TwiMaster`] builds whole transactions out of those primitives: buffer reads and writes,
//!   register access with the usual write-address-then-read idiom, and a bus scan. It also
//!   implements the `embedded-hal` I2C traits.
//!
//! Every primitive blocks until the bus finishes the step. By default the waits are unbounded, so
//! a bus with SCL held low hangs the caller; pass a bounded [`PollLimit`] in [`TwiConfig`] to turn
//! that into [`TwiError::Timeout`].
//!
//! Failures are reported as soon as they happen and abort the rest of the transaction. When one of
//! the composite operations of [`TwiMaster`] fails before a stop was issued the bus may still be
//! held; on the hardware TWI a following start is then sent as a repeated start, which keeps the
//! engine usable. The `embedded-hal` trait methods, 1.0 and 0.2 alike, always end with a stop
//! instead.
//!
//! The chip's native backend is available as [`Twi`].
//!
//! Pins used:
//!
//! ATmega328P (hardware TWI): {SDA:PC4, SCL:PC5}
//!
//! ATtiny85 (USI): {SDA:PB0, SCL:PB2}

pub mod hardware;
pub mod usi;

pub use hardware::{HardwareTwi, TwiBus};
pub use usi::{UsiBus, UsiTwi};

use crate::util::PollLimit;

/// Transfer direction, sent as the R/W bit after the address
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Master transmits
    Write = 0,
    /// Master receives
    Read = 1,
}

impl Direction {
    /// SLA+R/W byte for a 7-bit device address
    #[inline(always)]
    pub const fn address_byte(self, address: u8) -> u8 {
        (address << 1) | self as u8
    }
}

/// TWI transaction errors
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TwiError {
    /// The start or repeated start condition was not confirmed by the bus
    StartFailed,
    /// No device acknowledged the address
    AddressNack,
    /// The device declined a data byte
    DataNack,
    /// Another master won arbitration
    ArbitrationLost,
    /// Illegal start or stop condition detected on the bus
    BusError,
    /// The TWI reported a status that does not fit the current step
    UnexpectedStatus(u8),
    /// A bounded wait ran out before the bus finished the step
    Timeout,
}

impl embedded_hal::i2c::Error for TwiError {
    fn kind(&self) -> embedded_hal::i2c::ErrorKind {
        use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
        match self {
            TwiError::AddressNack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
            TwiError::DataNack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data),
            TwiError::ArbitrationLost => ErrorKind::ArbitrationLoss,
            TwiError::BusError => ErrorKind::Bus,
            TwiError::StartFailed | TwiError::UnexpectedStatus(_) | TwiError::Timeout => {
                ErrorKind::Other
            }
        }
    }
}

/// SCL frequency
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusSpeed {
    /// 100 kHz
    #[default]
    Standard,
    /// 400 kHz
    Fast,
}

impl BusSpeed {
    /// Frequency in Hz
    #[inline(always)]
    pub const fn hz(self) -> u32 {
        match self {
            BusSpeed::Standard => 100_000,
            BusSpeed::Fast => 400_000,
        }
    }
}

/// Settings shared by both backends
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TwiConfig {
    speed: BusSpeed,
    limit: PollLimit,
}

impl TwiConfig {
    /// Configuration for `speed` with unbounded waits
    #[inline]
    pub const fn new(speed: BusSpeed) -> Self {
        TwiConfig {
            speed,
            limit: PollLimit::UNBOUNDED,
        }
    }

    /// Bound every busy-wait on the bus to `limit` polls
    #[inline]
    pub const fn poll_limit(mut self, limit: PollLimit) -> Self {
        self.limit = limit;
        self
    }
}

/// Bus primitives of a TWI master.
///
/// The address passed to [`start`](TwiBackend::start) is a 7-bit device address; backends send
/// [`Direction::address_byte`] in the address phase.
pub trait TwiBackend {
    /// Issue a start condition (a repeated start if the bus is already held) and address
    /// `address` for `dir`. Succeeds only if the start was confirmed and the address ACKed.
    fn start(&mut self, address: u8, dir: Direction) -> Result<(), TwiError>;

    /// Same as [`start`](TwiBackend::start); used mid-transaction to change direction
    #[inline]
    fn repeat_start(&mut self, address: u8, dir: Direction) -> Result<(), TwiError> {
        self.start(address, dir)
    }

    /// Issue a stop condition and wait for the bus to be released.
    ///
    /// Safe on an idle bus, though a bit-banged backend may put a lone START/STOP pair on the wire
    /// there. Slaves treat that as an empty transfer.
    fn stop(&mut self);

    /// Send one byte to the addressed device. Fails with [`TwiError::DataNack`] if it is not
    /// acknowledged.
    fn write_device(&mut self, data: u8) -> Result<(), TwiError>;

    /// Receive one byte and ACK it, asking the device for more
    fn read_device_with_ack(&mut self) -> Result<u8, TwiError>;

    /// Receive one byte and NAK it, ending the read
    fn read_device_with_nak(&mut self) -> Result<u8, TwiError>;
}

impl<B: TwiBackend + ?Sized> TwiBackend for &mut B {
    #[inline]
    fn start(&mut self, address: u8, dir: Direction) -> Result<(), TwiError> {
        (**self).start(address, dir)
    }

    #[inline]
    fn repeat_start(&mut self, address: u8, dir: Direction) -> Result<(), TwiError> {
        (**self).repeat_start(address, dir)
    }

    #[inline]
    fn stop(&mut self) {
        (**self).stop()
    }

    #[inline]
    fn write_device(&mut self, data: u8) -> Result<(), TwiError> {
        (**self).write_device(data)
    }

    #[inline]
    fn read_device_with_ack(&mut self) -> Result<u8, TwiError> {
        (**self).read_device_with_ack()
    }

    #[inline]
    fn read_device_with_nak(&mut self) -> Result<u8, TwiError> {
        (**self).read_device_with_nak()
    }
}

/// Native TWI master of the ATmega328P
#[cfg(feature = "twi")]
pub type Twi = TwiMaster<HardwareTwi<crate::pac::TWI>>;

/// Native TWI master of the ATtiny85, timed by the delay provider `D`
#[cfg(feature = "usi")]
pub type Twi<D> = TwiMaster<UsiTwi<crate::pac::USI, D>>;

/// Blocking TWI master, generic over the backend
pub struct TwiMaster<B: TwiBackend> {
    backend: B,
}

impl<B: TwiBackend> TwiMaster<B> {
    /// Wrap a backend
    #[inline]
    pub fn new(backend: B) -> Self {
        TwiMaster { backend }
    }

    /// Release the backend
    #[inline]
    pub fn free(self) -> B {
        self.backend
    }

    /// Direct access to the bus primitives, for transactions the composite operations do not
    /// cover
    #[inline]
    pub fn backend(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Write `data` to `device`, optionally leaving the bus held for a following repeated start.
    ///
    /// Writing stops at the first byte the device declines, which is reported as
    /// [`TwiError::DataNack`]; the stop is still sent if requested. An empty `data` addresses the
    /// device and does nothing else, which makes a cheap presence probe. If the address itself is
    /// refused nothing follows the start, not even the stop.
    pub fn write_bytes(&mut self, device: u8, data: &[u8], send_stop: bool) -> Result<(), TwiError> {
        self.backend.start(device, Direction::Write)?;
        let res = data
            .iter()
            .try_for_each(|&byte| self.backend.write_device(byte));
        if send_stop {
            self.backend.stop();
        }
        if res.is_err() {
            debug!("twi: write to {=u8:#x} declined", device);
        }
        res
    }

    /// Read `buffer.len()` bytes from `device`, NAKing the last one.
    ///
    /// An empty buffer performs no bus activity: a master receiver cannot end a read without
    /// clocking in a byte.
    pub fn read_bytes(
        &mut self,
        device: u8,
        buffer: &mut [u8],
        send_stop: bool,
    ) -> Result<(), TwiError> {
        if buffer.is_empty() {
            return Ok(());
        }
        self.backend.start(device, Direction::Read)?;
        let res = self.read_into(buffer);
        if send_stop {
            self.backend.stop();
        }
        res
    }

    /// Write one byte to register `register` of `device`.
    ///
    /// Stops at the first failure without sending a stop condition.
    pub fn write_register(&mut self, device: u8, register: u8, value: u8) -> Result<(), TwiError> {
        self.backend.start(device, Direction::Write)?;
        self.backend.write_device(register)?;
        self.backend.write_device(value)?;
        self.backend.stop();
        Ok(())
    }

    /// Write `data` to consecutive registers of `device` starting at `register`.
    ///
    /// Once the register byte is acknowledged every data byte is sent and the bus is stopped,
    /// even if some bytes were declined; the result is [`TwiError::DataNack`] if any were.
    pub fn write_register_bytes(
        &mut self,
        device: u8,
        register: u8,
        data: &[u8],
    ) -> Result<(), TwiError> {
        self.backend.start(device, Direction::Write)?;
        self.backend.write_device(register)?;
        let mut res = Ok(());
        for &byte in data {
            let sent = self.backend.write_device(byte);
            if res.is_ok() {
                res = sent;
            }
        }
        self.backend.stop();
        res
    }

    /// Read one byte from register `register` of `device`
    pub fn read_register(&mut self, device: u8, register: u8) -> Result<u8, TwiError> {
        self.select_register(device, register)?;
        let res = self.backend.read_device_with_nak();
        self.backend.stop();
        res
    }

    /// Read consecutive registers of `device` starting at `register` into `buffer`.
    ///
    /// An empty buffer performs no bus activity.
    pub fn read_register_bytes(
        &mut self,
        device: u8,
        register: u8,
        buffer: &mut [u8],
    ) -> Result<(), TwiError> {
        if buffer.is_empty() {
            return Ok(());
        }
        self.select_register(device, register)?;
        let res = self.read_into(buffer);
        self.backend.stop();
        res
    }

    /// Probe every address from 1 to 126 for a read, calling `found` with each address that
    /// answers, as soon as it answers.
    ///
    /// Devices that answer get a dummy single-byte read and a stop before `found` runs.
    pub fn scan_bus<F: FnMut(u8)>(&mut self, mut found: F) {
        for device in 1..0x7F {
            if self.backend.start(device, Direction::Read).is_ok() {
                let _ = self.backend.read_device_with_nak();
                self.backend.stop();
                trace!("twi: device answered at {=u8:#x}", device);
                found(device);
            }
        }
    }

    // Address `device` for writing, send the register, then turn the bus around for reading
    #[inline]
    fn select_register(&mut self, device: u8, register: u8) -> Result<(), TwiError> {
        self.backend.start(device, Direction::Write)?;
        self.backend.write_device(register)?;
        self.backend.repeat_start(device, Direction::Read)
    }

    #[inline]
    fn read_into(&mut self, buffer: &mut [u8]) -> Result<(), TwiError> {
        if let Some((last, head)) = buffer.split_last_mut() {
            for byte in head {
                *byte = self.backend.read_device_with_ack()?;
            }
            *last = self.backend.read_device_with_nak()?;
        }
        Ok(())
    }

    // Address the device for `dir` unless the bus is already addressed that way
    #[inline]
    fn turn(
        &mut self,
        device: u8,
        dir: Direction,
        current: &mut Option<Direction>,
    ) -> Result<(), TwiError> {
        match *current {
            Some(d) if d == dir => return Ok(()),
            Some(_) => self.backend.repeat_start(device, dir)?,
            None => self.backend.start(device, dir)?,
        }
        *current = Some(dir);
        Ok(())
    }

    fn run_transaction(
        &mut self,
        device: u8,
        operations: &mut [embedded_hal::i2c::Operation<'_>],
        current: &mut Option<Direction>,
    ) -> Result<(), TwiError> {
        use embedded_hal::i2c::Operation;

        for i in 0..operations.len() {
            // The last byte of a run of reads is NAKed, so look ahead for more read data
            let more_reads = operations[i + 1..]
                .iter()
                .take_while(|op| matches!(op, Operation::Read(_)))
                .any(|op| matches!(op, Operation::Read(buf) if !buf.is_empty()));

            match &mut operations[i] {
                Operation::Write(bytes) => {
                    self.turn(device, Direction::Write, current)?;
                    for &byte in bytes.iter() {
                        self.backend.write_device(byte)?;
                    }
                }
                Operation::Read(buffer) => {
                    let Some((last, head)) = buffer.split_last_mut() else {
                        continue;
                    };
                    self.turn(device, Direction::Read, current)?;
                    for byte in head {
                        *byte = self.backend.read_device_with_ack()?;
                    }
                    *last = if more_reads {
                        self.backend.read_device_with_ack()?
                    } else {
                        self.backend.read_device_with_nak()?
                    };
                }
            }
        }
        Ok(())
    }
}

mod ehal1 {
    use super::*;
    use embedded_hal::i2c::{ErrorType, I2c, Operation, SevenBitAddress};

    impl<B: TwiBackend> ErrorType for TwiMaster<B> {
        type Error = TwiError;
    }

    impl<B: TwiBackend> I2c<SevenBitAddress> for TwiMaster<B> {
        /// Adjacent operations of the same direction share one addressing phase; a change of
        /// direction is a repeated start. The bus is stopped at the end, and also after any
        /// failure so it is never left held.
        fn transaction(
            &mut self,
            address: SevenBitAddress,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            let mut current = None;
            let res = self.run_transaction(address, operations, &mut current);
            if current.is_some() || res.is_err() {
                self.backend.stop();
            }
            res
        }
    }
}

#[cfg(feature = "embedded-hal-02")]
mod ehal02 {
    use super::*;
    use embedded_hal::i2c::{I2c, Operation};
    use embedded_hal_02::blocking::i2c::{Read, Write, WriteRead};

    impl<B: TwiBackend> Read for TwiMaster<B> {
        type Error = TwiError;

        fn read(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), Self::Error> {
            self.transaction(address, &mut [Operation::Read(buffer)])
        }
    }

    impl<B: TwiBackend> Write for TwiMaster<B> {
        type Error = TwiError;

        fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), Self::Error> {
            self.transaction(address, &mut [Operation::Write(bytes)])
        }
    }

    impl<B: TwiBackend> WriteRead for TwiMaster<B> {
        type Error = TwiError;

        fn write_read(
            &mut self,
            address: u8,
            bytes: &[u8],
            buffer: &mut [u8],
        ) -> Result<(), Self::Error> {
            self.transaction(address, &mut [Operation::Write(bytes), Operation::Read(buffer)])
        }
    }
}
