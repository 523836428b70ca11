//! TWI backend that drives the USI of the ATtiny parts in two-wire mode.
//!
//! The USI only shifts bits and counts clock edges; SCL is strobed in software and the bus timing
//! comes from a delay provider. Start and stop conditions are made by toggling the port bits
//! directly. Each byte takes 16 counter edges, each acknowledge bit 2.

use super::{BusSpeed, Direction, TwiBackend, TwiConfig, TwiError};
use crate::hw_traits::usi::{UsiPeriph, Usicr, Usisr};
use crate::util::PollLimit;
use embedded_hal::delay::DelayNs;

// Two-wire mode, shift on the external positive edge, counter clocked by USITC strobes
const CR_TWO_WIRE: Usicr = Usicr::USIWM1
    .union(Usicr::USICS1)
    .union(Usicr::USICLK);
const CR_STROBE: Usicr = CR_TWO_WIRE.union(Usicr::USITC);

const SR_CLEAR_FLAGS: Usisr = Usisr::USISIF
    .union(Usisr::USIOIF)
    .union(Usisr::USIPF)
    .union(Usisr::USIDC);
// Counter preloaded so it overflows after 16 edges (one byte)
const SR_BYTE: Usisr = SR_CLEAR_FLAGS;
// Counter preloaded so it overflows after 2 edges (one bit)
const SR_BIT: Usisr = SR_CLEAR_FLAGS.union(Usisr::from_bits_retain(0x0E));

/// SCL low and high periods
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Timing {
    low_ns: u32,
    high_ns: u32,
}

impl Timing {
    const fn for_speed(speed: BusSpeed) -> Self {
        match speed {
            BusSpeed::Standard => Timing {
                low_ns: 4_700,
                high_ns: 4_000,
            },
            BusSpeed::Fast => Timing {
                low_ns: 1_300,
                high_ns: 600,
            },
        }
    }
}

/// A USI together with the pins it drives in two-wire mode
pub trait UsiBus: UsiPeriph {
    /// SDA pin
    type Sda;
    /// SCL pin
    type Scl;
}

/// Bit-banged TWI master on the USI
pub struct UsiTwi<U: UsiBus, D: DelayNs> {
    usi: U,
    delay: D,
    timing: Timing,
    limit: PollLimit,
}

impl<U: UsiBus, D: DelayNs> UsiTwi<U, D> {
    /// Put the USI in two-wire mode with both lines released high
    pub fn new(
        usi: U,
        _sda: impl Into<U::Sda>,
        _scl: impl Into<U::Scl>,
        delay: D,
        config: TwiConfig,
    ) -> Self {
        usi.usidr_wr(0xFF);
        usi.sda_wr(true);
        usi.scl_wr(true);
        usi.scl_dir_out(true);
        usi.sda_dir_out(true);
        usi.usicr_wr(CR_TWO_WIRE);
        usi.usisr_wr(SR_CLEAR_FLAGS);
        UsiTwi {
            usi,
            delay,
            timing: Timing::for_speed(config.speed),
            limit: config.limit,
        }
    }

    /// Change the SCL timing. Only call this between transactions.
    pub fn set_speed(&mut self, speed: BusSpeed) {
        self.timing = Timing::for_speed(speed);
    }

    /// Leave two-wire mode, release both lines and return the parts
    pub fn free(self) -> (U, D) {
        self.usi.usicr_wr(Usicr::empty());
        self.usi.sda_dir_out(false);
        self.usi.scl_dir_out(false);
        (self.usi, self.delay)
    }

    // Slaves may stretch the clock by holding SCL low
    #[inline]
    fn wait_scl_high(&self) -> Result<(), TwiError> {
        self.limit
            .wait(|| self.usi.scl_rd())
            .map_err(|_| TwiError::Timeout)
    }

    // Clock bits until the counter overflows, then return what was shifted in and release SDA
    fn transfer(&mut self, sr: Usisr) -> Result<u8, TwiError> {
        self.usi.usisr_wr(sr);
        loop {
            self.delay.delay_ns(self.timing.low_ns);
            self.usi.usicr_wr(CR_STROBE);
            self.wait_scl_high()?;
            self.delay.delay_ns(self.timing.high_ns);
            self.usi.usicr_wr(CR_STROBE);
            if self.usi.usisr_rd().contains(Usisr::USIOIF) {
                break;
            }
        }
        self.delay.delay_ns(self.timing.low_ns);
        let data = self.usi.usidr_rd();
        self.usi.usidr_wr(0xFF);
        self.usi.sda_dir_out(true);
        Ok(data)
    }

    // Shift out a byte and clock in the acknowledge bit
    fn write_byte(&mut self, data: u8) -> Result<bool, TwiError> {
        self.usi.scl_wr(false);
        self.usi.usidr_wr(data);
        self.transfer(SR_BYTE)?;

        self.usi.sda_dir_out(false);
        let ack = self.transfer(SR_BIT)?;
        Ok((ack & 0x01) == 0)
    }

    fn read_byte(&mut self, ack: bool) -> Result<u8, TwiError> {
        self.usi.sda_dir_out(false);
        let data = self.transfer(SR_BYTE)?;

        self.usi.usidr_wr(if ack { 0x00 } else { 0xFF });
        self.transfer(SR_BIT)?;
        Ok(data)
    }

    fn start_condition(&mut self) -> Result<(), TwiError> {
        self.usi.usisr_wr(SR_CLEAR_FLAGS);
        self.usi.scl_wr(true);
        self.wait_scl_high()?;
        self.delay.delay_ns(self.timing.low_ns);

        self.usi.sda_wr(false);
        self.delay.delay_ns(self.timing.high_ns);
        self.usi.scl_wr(false);
        self.usi.sda_wr(true);

        if self.usi.usisr_rd().contains(Usisr::USISIF) {
            Ok(())
        } else {
            debug!("usi: start condition not detected");
            Err(TwiError::StartFailed)
        }
    }
}

impl<U: UsiBus, D: DelayNs> TwiBackend for UsiTwi<U, D> {
    fn start(&mut self, address: u8, dir: Direction) -> Result<(), TwiError> {
        self.start_condition()?;
        if self.write_byte(dir.address_byte(address))? {
            Ok(())
        } else {
            Err(TwiError::AddressNack)
        }
    }

    // SDA is pulled low with SCL still high when the bus is idle, so an idle stop shows up as a
    // START immediately followed by a STOP
    fn stop(&mut self) {
        self.usi.sda_wr(false);
        self.usi.scl_wr(true);
        if self.wait_scl_high().is_err() {
            debug!("usi: SCL held low during stop");
        }
        self.delay.delay_ns(self.timing.high_ns);
        self.usi.sda_wr(true);
        self.delay.delay_ns(self.timing.low_ns);
    }

    fn write_device(&mut self, data: u8) -> Result<(), TwiError> {
        if self.write_byte(data)? {
            Ok(())
        } else {
            Err(TwiError::DataNack)
        }
    }

    fn read_device_with_ack(&mut self) -> Result<u8, TwiError> {
        self.read_byte(true)
    }

    fn read_device_with_nak(&mut self) -> Result<u8, TwiError> {
        self.read_byte(false)
    }
}

#[cfg(feature = "attiny85")]
pub use self::attiny85::*;

#[cfg(feature = "attiny85")]
mod attiny85 {
    use super::UsiBus;
    use crate::gpio::{Pin, Pin0, Pin2, PinMode};
    use crate::pac::{PORTB, USI};

    // The driver takes over direction and output of both lines
    macro_rules! impl_usi_twi_pin {
        ($struct_name: ident, $port: ty, $pin: ty) => {
            impl<MODE: PinMode> From<Pin<$port, $pin, MODE>> for $struct_name {
                #[inline(always)]
                fn from(_val: Pin<$port, $pin, MODE>) -> Self {
                    $struct_name
                }
            }
        };
    }

    /// USI two-wire SDA pin
    pub struct UsiSdaPin;
    impl_usi_twi_pin!(UsiSdaPin, PORTB, Pin0);

    /// USI two-wire SCL pin
    pub struct UsiSclPin;
    impl_usi_twi_pin!(UsiSclPin, PORTB, Pin2);

    impl UsiBus for USI {
        type Sda = UsiSdaPin;
        type Scl = UsiSclPin;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::twi::TwiMaster;
    use core::cell::RefCell;
    use std::collections::VecDeque;
    use std::vec;
    use std::vec::Vec;

    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum Ev {
        Start,
        Addr(u8, bool),
        Tx(u8, bool),
        Rx(u8, bool),
        Stop,
    }

    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Phase {
        Idle,
        Addr { bits: u8, byte: u8 },
        AddrAck { ack: bool, read: bool },
        Write { bits: u8, byte: u8 },
        WriteAck { ack: bool },
        Read { bits: u8, byte: u8 },
        ReadAck { byte: u8 },
    }

    // Wire-level model: the USI and port bits of the master plus one slave sampling on SCL edges
    struct Bus {
        usidr: u8,
        counter: u8,
        flags: Usisr,
        two_wire: bool,
        sda_ddr: bool,
        sda_port: bool,
        scl_ddr: bool,
        scl_port: bool,
        scl_stuck_low: bool,
        slave: u8,
        nack_tx: Vec<usize>,
        sent: usize,
        rx: VecDeque<u8>,
        phase: Phase,
        log: Vec<Ev>,
    }

    impl Bus {
        fn master_sda(&self) -> bool {
            !self.sda_ddr || (self.sda_port && (!self.two_wire || self.usidr & 0x80 != 0))
        }

        fn slave_sda(&self) -> bool {
            match self.phase {
                Phase::AddrAck { ack, .. } | Phase::WriteAck { ack } => !ack,
                Phase::Read { bits, byte } => byte & (0x80 >> bits) != 0,
                _ => true,
            }
        }

        fn sda(&self) -> bool {
            self.master_sda() && self.slave_sda()
        }

        fn scl(&self) -> bool {
            (!self.scl_ddr || self.scl_port) && !self.scl_stuck_low
        }

        // Apply a change of the master's SDA drive, watching for start and stop conditions
        fn drive_sda(&mut self, change: impl FnOnce(&mut Self)) {
            let before = self.sda();
            change(self);
            let after = self.sda();
            if self.scl() && before && !after {
                self.log.push(Ev::Start);
                self.flags.insert(Usisr::USISIF);
                self.phase = Phase::Addr { bits: 0, byte: 0 };
            } else if self.scl() && !before && after {
                self.log.push(Ev::Stop);
                self.flags.insert(Usisr::USIPF);
                self.phase = Phase::Idle;
            }
        }

        fn drive_scl(&mut self, change: impl FnOnce(&mut Self)) {
            let before = self.scl();
            change(self);
            if !before && self.scl() {
                self.rising_edge();
            }
        }

        fn rising_edge(&mut self) {
            let bit = self.sda();
            if self.two_wire {
                self.usidr = (self.usidr << 1) | bit as u8;
            }
            let bit = bit as u8;
            self.phase = match self.phase {
                Phase::Idle => Phase::Idle,
                Phase::Addr { bits, byte } => {
                    let byte = (byte << 1) | bit;
                    if bits + 1 < 8 {
                        Phase::Addr { bits: bits + 1, byte }
                    } else {
                        let ack = byte >> 1 == self.slave;
                        self.log.push(Ev::Addr(byte, ack));
                        Phase::AddrAck {
                            ack,
                            read: byte & 1 == 1,
                        }
                    }
                }
                Phase::AddrAck { ack: false, .. } => Phase::Idle,
                Phase::AddrAck { read: false, .. } | Phase::WriteAck { .. } => {
                    Phase::Write { bits: 0, byte: 0 }
                }
                Phase::AddrAck { read: true, .. } => Phase::Read {
                    bits: 0,
                    byte: self.rx.pop_front().unwrap_or(0xFF),
                },
                Phase::Write { bits, byte } => {
                    let byte = (byte << 1) | bit;
                    if bits + 1 < 8 {
                        Phase::Write { bits: bits + 1, byte }
                    } else {
                        let ack = !self.nack_tx.contains(&self.sent);
                        self.sent += 1;
                        self.log.push(Ev::Tx(byte, ack));
                        Phase::WriteAck { ack }
                    }
                }
                Phase::Read { bits, byte } => {
                    if bits + 1 < 8 {
                        Phase::Read { bits: bits + 1, byte }
                    } else {
                        Phase::ReadAck { byte }
                    }
                }
                Phase::ReadAck { byte } => {
                    let acked = bit == 0;
                    self.log.push(Ev::Rx(byte, acked));
                    if acked {
                        Phase::Read {
                            bits: 0,
                            byte: self.rx.pop_front().unwrap_or(0xFF),
                        }
                    } else {
                        Phase::Idle
                    }
                }
            };
        }
    }

    struct SimUsi(RefCell<Bus>);

    impl SimUsi {
        fn new(slave: u8) -> Self {
            SimUsi(RefCell::new(Bus {
                usidr: 0,
                counter: 0,
                flags: Usisr::empty(),
                two_wire: false,
                sda_ddr: false,
                sda_port: false,
                scl_ddr: false,
                scl_port: false,
                scl_stuck_low: false,
                slave,
                nack_tx: vec![],
                sent: 0,
                rx: VecDeque::new(),
                phase: Phase::Idle,
                log: vec![],
            }))
        }
    }

    impl UsiBus for SimUsi {
        type Sda = ();
        type Scl = ();
    }

    impl UsiPeriph for SimUsi {
        fn usicr_wr(&self, val: Usicr) {
            let mut bus = self.0.borrow_mut();
            bus.two_wire = val.contains(Usicr::USIWM1);
            if val.contains(Usicr::USITC) {
                bus.drive_scl(|b| b.scl_port = !b.scl_port);
                bus.counter = (bus.counter + 1) & 0x0F;
                if bus.counter == 0 {
                    bus.flags.insert(Usisr::USIOIF);
                }
            }
        }

        fn usisr_rd(&self) -> Usisr {
            let bus = self.0.borrow();
            bus.flags | Usisr::from_bits_retain(bus.counter)
        }

        fn usisr_wr(&self, val: Usisr) {
            let mut bus = self.0.borrow_mut();
            bus.flags
                .remove(val & (Usisr::USISIF | Usisr::USIOIF | Usisr::USIPF));
            bus.counter = (val & Usisr::USICNT).bits();
        }

        fn usidr_rd(&self) -> u8 {
            self.0.borrow().usidr
        }

        fn usidr_wr(&self, val: u8) {
            self.0.borrow_mut().usidr = val;
        }

        fn usibr_rd(&self) -> u8 {
            self.0.borrow().usidr
        }

        fn sda_dir_out(&self, output: bool) {
            self.0.borrow_mut().drive_sda(|b| b.sda_ddr = output);
        }

        fn sda_wr(&self, high: bool) {
            self.0.borrow_mut().drive_sda(|b| b.sda_port = high);
        }

        fn sda_rd(&self) -> bool {
            self.0.borrow().sda()
        }

        fn scl_dir_out(&self, output: bool) {
            self.0.borrow_mut().drive_scl(|b| b.scl_ddr = output);
        }

        fn scl_wr(&self, high: bool) {
            self.0.borrow_mut().drive_scl(|b| b.scl_port = high);
        }

        fn scl_rd(&self) -> bool {
            self.0.borrow().scl()
        }
    }

    fn backend(sim: SimUsi, limit: PollLimit) -> UsiTwi<SimUsi, NoDelay> {
        UsiTwi::new(
            sim,
            (),
            (),
            NoDelay,
            TwiConfig::new(BusSpeed::Standard).poll_limit(limit),
        )
    }

    fn log(twi: UsiTwi<SimUsi, NoDelay>) -> Vec<Ev> {
        twi.usi.0.into_inner().log
    }

    #[test]
    fn init_leaves_bus_idle() {
        let twi = backend(SimUsi::new(0x50), PollLimit::UNBOUNDED);
        {
            let bus = twi.usi.0.borrow();
            assert!(bus.sda() && bus.scl());
            assert!(bus.two_wire);
        }
        assert!(log(twi).is_empty());
    }

    #[test]
    fn counter_presets() {
        assert_eq!((SR_BYTE & Usisr::USICNT).bits(), 0);
        assert_eq!((SR_BIT & Usisr::USICNT).bits(), 14);
    }

    #[test]
    fn timing_per_speed() {
        assert_eq!(
            Timing::for_speed(BusSpeed::Standard),
            Timing {
                low_ns: 4_700,
                high_ns: 4_000
            }
        );
        assert_eq!(
            Timing::for_speed(BusSpeed::Fast),
            Timing {
                low_ns: 1_300,
                high_ns: 600
            }
        );
    }

    #[test]
    fn set_speed_swaps_timing() {
        let mut twi = backend(SimUsi::new(0x50), PollLimit::UNBOUNDED);
        assert_eq!(twi.timing, Timing::for_speed(BusSpeed::Standard));
        twi.set_speed(BusSpeed::Fast);
        assert_eq!(twi.timing, Timing::for_speed(BusSpeed::Fast));
        // Bus state is untouched
        assert!(log(twi).is_empty());
    }

    #[test]
    fn stop_on_idle_bus_then_start() {
        let mut twi = backend(SimUsi::new(0x50), PollLimit::UNBOUNDED);
        twi.stop();
        {
            let bus = twi.usi.0.borrow();
            assert!(bus.sda() && bus.scl());
        }
        assert_eq!(twi.start(0x50, Direction::Write), Ok(()));
        twi.stop();
        assert_eq!(twi.start(0x50, Direction::Write), Ok(()));
        assert_eq!(
            log(twi),
            [
                Ev::Start,
                Ev::Stop,
                Ev::Start,
                Ev::Addr(0xA0, true),
                Ev::Stop,
                Ev::Start,
                Ev::Addr(0xA0, true)
            ]
        );
    }

    #[test]
    fn write_register_on_the_wire() {
        let mut master = TwiMaster::new(backend(SimUsi::new(0x50), PollLimit::UNBOUNDED));
        assert_eq!(master.write_register(0x50, 0x10, 0xAB), Ok(()));
        assert_eq!(
            log(master.free()),
            [
                Ev::Start,
                Ev::Addr(0xA0, true),
                Ev::Tx(0x10, true),
                Ev::Tx(0xAB, true),
                Ev::Stop
            ]
        );
    }

    #[test]
    fn read_register_bytes_on_the_wire() {
        let sim = SimUsi::new(0x68);
        sim.0.borrow_mut().rx = [0x5A, 0xC3].into();
        let mut master = TwiMaster::new(backend(sim, PollLimit::UNBOUNDED));
        let mut buf = [0; 2];
        assert_eq!(master.read_register_bytes(0x68, 0x3B, &mut buf), Ok(()));
        assert_eq!(buf, [0x5A, 0xC3]);
        assert_eq!(
            log(master.free()),
            [
                Ev::Start,
                Ev::Addr(0xD0, true),
                Ev::Tx(0x3B, true),
                Ev::Start,
                Ev::Addr(0xD1, true),
                Ev::Rx(0x5A, true),
                Ev::Rx(0xC3, false),
                Ev::Stop
            ]
        );
    }

    #[test]
    fn address_nack() {
        let mut master = TwiMaster::new(backend(SimUsi::new(0x50), PollLimit::UNBOUNDED));
        assert_eq!(master.read_register(0x51, 0), Err(TwiError::AddressNack));
        assert_eq!(log(master.free()), [Ev::Start, Ev::Addr(0xA2, false)]);
    }

    #[test]
    fn data_nack_stops_write() {
        let sim = SimUsi::new(0x50);
        sim.0.borrow_mut().nack_tx = vec![0];
        let mut master = TwiMaster::new(backend(sim, PollLimit::UNBOUNDED));
        assert_eq!(
            master.write_bytes(0x50, &[1, 2], true),
            Err(TwiError::DataNack)
        );
        assert_eq!(
            log(master.free()),
            [Ev::Start, Ev::Addr(0xA0, true), Ev::Tx(1, false), Ev::Stop]
        );
    }

    #[test]
    fn held_clock_times_out() {
        let sim = SimUsi::new(0x50);
        let mut twi = backend(sim, PollLimit::iterations(50));
        twi.usi.0.borrow_mut().scl_stuck_low = true;
        assert_eq!(twi.start(0x50, Direction::Write), Err(TwiError::Timeout));
        // Stop still returns
        twi.stop();
    }

    #[test]
    fn scan_finds_the_device() {
        let mut master = TwiMaster::new(backend(SimUsi::new(0x27), PollLimit::UNBOUNDED));
        let mut found = Vec::new();
        master.scan_bus(|addr| found.push(addr));
        assert_eq!(found, [0x27]);
    }
}
