//! TWI backend for the hardware two-wire interface of the megaAVR parts.
//!
//! Every bus step is started by writing TWCR with TWINT set and finishes when the hardware sets
//! TWINT again; the outcome is then read from the status bits of TWSR.

use super::{BusSpeed, Direction, TwiBackend, TwiConfig, TwiError};
use crate::clock::Clock;
use crate::hw_traits::twi::{status, Twcr, TwiPeriph, TWSR_STATUS_MASK};
use crate::util::PollLimit;

/// TWBR value giving `scl_hz` from a `cpu_hz` core clock with the prescaler at 1.
///
/// SCL = F_CPU / (16 + 2 * TWBR). Rates the divider cannot reach are clamped to the nearest
/// setting.
pub const fn bit_rate(cpu_hz: u32, scl_hz: u32) -> u8 {
    let div = cpu_hz / scl_hz;
    if div <= 16 {
        0
    } else if (div - 16) / 2 > u8::MAX as u32 {
        u8::MAX
    } else {
        ((div - 16) / 2) as u8
    }
}

/// A TWI peripheral together with the pins it drives
pub trait TwiBus: TwiPeriph {
    /// SDA pin
    type Sda;
    /// SCL pin
    type Scl;
}

/// Hardware TWI in master mode
pub struct HardwareTwi<T: TwiBus> {
    twi: T,
    cpu_hz: u32,
    limit: PollLimit,
}

impl<T: TwiBus> HardwareTwi<T> {
    /// Enable the TWI as a master clocked at `config`'s bus speed from the `CLOCK` core clock
    pub fn new<CLOCK: Clock>(
        twi: T,
        _sda: impl Into<T::Sda>,
        _scl: impl Into<T::Scl>,
        _clock: CLOCK,
        config: TwiConfig,
    ) -> Self {
        twi.twsr_wr(0);
        twi.twbr_wr(bit_rate(CLOCK::FREQ, config.speed.hz()));
        twi.twcr_wr(Twcr::TWEN);
        HardwareTwi {
            twi,
            cpu_hz: CLOCK::FREQ,
            limit: config.limit,
        }
    }

    /// Change the SCL frequency. Only call this between transactions.
    pub fn set_speed(&mut self, speed: BusSpeed) {
        self.twi.twbr_wr(bit_rate(self.cpu_hz, speed.hz()));
    }

    /// Disable the TWI and release the peripheral
    pub fn free(self) -> T {
        self.twi.twcr_wr(Twcr::empty());
        self.twi
    }

    #[inline(always)]
    fn status(&self) -> u8 {
        self.twi.twsr_rd() & TWSR_STATUS_MASK
    }

    // Kick off the next bus step and wait for it to finish
    #[inline]
    fn execute(&mut self, ctrl: Twcr) -> Result<u8, TwiError> {
        self.twi.twcr_wr(ctrl | Twcr::TWINT | Twcr::TWEN);
        self.limit
            .wait(|| self.twi.twcr_rd().contains(Twcr::TWINT))
            .map_err(|_| TwiError::Timeout)?;
        Ok(self.status())
    }
}

// Translate a status that is not the expected one
fn status_error(code: u8) -> TwiError {
    match code {
        status::MT_SLA_NACK | status::MR_SLA_NACK => TwiError::AddressNack,
        status::MT_DATA_NACK => TwiError::DataNack,
        status::ARB_LOST => TwiError::ArbitrationLost,
        status::BUS_ERROR => TwiError::BusError,
        code => TwiError::UnexpectedStatus(code),
    }
}

impl<T: TwiBus> TwiBackend for HardwareTwi<T> {
    fn start(&mut self, address: u8, dir: Direction) -> Result<(), TwiError> {
        match self.execute(Twcr::TWSTA)? {
            status::START | status::REP_START => {}
            status::ARB_LOST => return Err(TwiError::ArbitrationLost),
            status::BUS_ERROR => return Err(TwiError::BusError),
            _code => {
                debug!("twi: start refused, status {=u8:#x}", _code);
                return Err(TwiError::StartFailed);
            }
        }

        self.twi.twdr_wr(dir.address_byte(address));
        match self.execute(Twcr::empty())? {
            status::MT_SLA_ACK | status::MR_SLA_ACK => Ok(()),
            code => Err(status_error(code)),
        }
    }

    fn stop(&mut self) {
        self.twi
            .twcr_wr(Twcr::TWINT | Twcr::TWEN | Twcr::TWSTO);
        // TWSTO clears itself once the stop condition is on the bus; TWINT is not set
        if self
            .limit
            .wait(|| !self.twi.twcr_rd().contains(Twcr::TWSTO))
            .is_err()
        {
            debug!("twi: stop not confirmed");
        }
    }

    fn write_device(&mut self, data: u8) -> Result<(), TwiError> {
        self.twi.twdr_wr(data);
        match self.execute(Twcr::empty())? {
            status::MT_DATA_ACK => Ok(()),
            code => Err(status_error(code)),
        }
    }

    fn read_device_with_ack(&mut self) -> Result<u8, TwiError> {
        self.execute(Twcr::TWEA)?;
        Ok(self.twi.twdr_rd())
    }

    fn read_device_with_nak(&mut self) -> Result<u8, TwiError> {
        self.execute(Twcr::empty())?;
        Ok(self.twi.twdr_rd())
    }
}

#[cfg(feature = "atmega328p")]
pub use self::atmega328p::*;

#[cfg(feature = "atmega328p")]
mod atmega328p {
    use super::TwiBus;
    use crate::gpio::{Input, Pin, Pin4, Pin5, Pull};
    use crate::pac::{PORTC, TWI};

    // The TWI overrides the pin drivers once enabled; inputs keep their pull-up setting
    macro_rules! impl_twi_pin {
        ($struct_name: ident, $port: ty, $pin: ty) => {
            impl<PULL: Pull> From<Pin<$port, $pin, Input<PULL>>> for $struct_name {
                #[inline(always)]
                fn from(_val: Pin<$port, $pin, Input<PULL>>) -> Self {
                    $struct_name
                }
            }
        };
    }

    /// TWI SDA pin
    pub struct TwiSdaPin;
    impl_twi_pin!(TwiSdaPin, PORTC, Pin4);

    /// TWI SCL pin
    pub struct TwiSclPin;
    impl_twi_pin!(TwiSclPin, PORTC, Pin5);

    impl TwiBus for TWI {
        type Sda = TwiSdaPin;
        type Scl = TwiSclPin;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{MHz1, MHz16, MHz8};
    use crate::twi::{BusSpeed, TwiMaster};
    use core::cell::RefCell;
    use std::collections::VecDeque;
    use std::vec;
    use std::vec::Vec;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum Ev {
        Start(u8),
        Addr(u8, bool),
        Tx(u8, bool),
        Rx(u8, bool),
        Stop,
    }

    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mode {
        Idle,
        Addressing,
        Transmit,
        Receive,
    }

    // One slave device behind a register-level model of the TWI master
    struct Bus {
        twcr: Twcr,
        twbr: u8,
        prescaler: u8,
        status: u8,
        twdr: u8,
        held: bool,
        mode: Mode,
        slave: u8,
        nack_tx: Vec<usize>,
        sent: usize,
        rx: VecDeque<u8>,
        lose_arbitration: bool,
        hang: bool,
        stuck_stop: bool,
        log: Vec<Ev>,
    }

    struct SimTwi(RefCell<Bus>);

    impl SimTwi {
        fn new(slave: u8) -> Self {
            SimTwi(RefCell::new(Bus {
                twcr: Twcr::empty(),
                twbr: 0,
                prescaler: 3,
                status: status::NO_INFO,
                twdr: 0,
                held: false,
                mode: Mode::Idle,
                slave,
                nack_tx: vec![],
                sent: 0,
                rx: VecDeque::new(),
                lose_arbitration: false,
                hang: false,
                stuck_stop: false,
                log: vec![],
            }))
        }
    }

    impl TwiBus for SimTwi {
        type Sda = ();
        type Scl = ();
    }

    impl TwiPeriph for SimTwi {
        fn twbr_wr(&self, val: u8) {
            self.0.borrow_mut().twbr = val;
        }

        fn twsr_rd(&self) -> u8 {
            let bus = self.0.borrow();
            bus.status | bus.prescaler
        }

        fn twsr_wr(&self, val: u8) {
            self.0.borrow_mut().prescaler = val & 0x03;
        }

        fn twdr_rd(&self) -> u8 {
            self.0.borrow().twdr
        }

        fn twdr_wr(&self, val: u8) {
            self.0.borrow_mut().twdr = val;
        }

        fn twcr_rd(&self) -> Twcr {
            self.0.borrow().twcr
        }

        fn twcr_wr(&self, val: Twcr) {
            let mut bus = self.0.borrow_mut();
            let bus = &mut *bus;
            if !val.contains(Twcr::TWINT) {
                bus.twcr = val;
                return;
            }
            bus.twcr = val - Twcr::TWINT;
            if bus.hang {
                return;
            }

            if val.contains(Twcr::TWSTA) {
                if bus.lose_arbitration {
                    bus.status = status::ARB_LOST;
                } else {
                    bus.status = if bus.held { status::REP_START } else { status::START };
                    bus.log.push(Ev::Start(bus.status));
                    bus.held = true;
                    bus.mode = Mode::Addressing;
                }
            } else if val.contains(Twcr::TWSTO) {
                bus.log.push(Ev::Stop);
                bus.held = false;
                bus.mode = Mode::Idle;
                bus.status = status::NO_INFO;
                if !bus.stuck_stop {
                    bus.twcr.remove(Twcr::TWSTO);
                }
                return;
            } else {
                match bus.mode {
                    Mode::Addressing => {
                        let read = bus.twdr & 1 == 1;
                        let ack = bus.twdr >> 1 == bus.slave;
                        bus.log.push(Ev::Addr(bus.twdr, ack));
                        bus.status = match (read, ack) {
                            (false, true) => status::MT_SLA_ACK,
                            (false, false) => status::MT_SLA_NACK,
                            (true, true) => status::MR_SLA_ACK,
                            (true, false) => status::MR_SLA_NACK,
                        };
                        bus.mode = match (read, ack) {
                            (_, false) => Mode::Idle,
                            (false, true) => Mode::Transmit,
                            (true, true) => Mode::Receive,
                        };
                    }
                    Mode::Transmit => {
                        let ack = !bus.nack_tx.contains(&bus.sent);
                        bus.sent += 1;
                        bus.log.push(Ev::Tx(bus.twdr, ack));
                        bus.status = if ack {
                            status::MT_DATA_ACK
                        } else {
                            status::MT_DATA_NACK
                        };
                    }
                    Mode::Receive => {
                        let ack = val.contains(Twcr::TWEA);
                        bus.twdr = bus.rx.pop_front().unwrap_or(0xFF);
                        bus.log.push(Ev::Rx(bus.twdr, ack));
                        bus.status = if ack {
                            status::MR_DATA_ACK
                        } else {
                            status::MR_DATA_NACK
                        };
                    }
                    Mode::Idle => bus.status = status::BUS_ERROR,
                }
            }
            bus.twcr.insert(Twcr::TWINT);
        }
    }

    fn backend(sim: SimTwi, limit: PollLimit) -> HardwareTwi<SimTwi> {
        HardwareTwi::new(
            sim,
            (),
            (),
            MHz16,
            TwiConfig::new(BusSpeed::Standard).poll_limit(limit),
        )
    }

    fn log(twi: HardwareTwi<SimTwi>) -> Vec<Ev> {
        twi.twi.0.into_inner().log
    }

    #[test]
    fn bit_rates() {
        assert_eq!(bit_rate(MHz16::FREQ, BusSpeed::Standard.hz()), 72);
        assert_eq!(bit_rate(MHz16::FREQ, BusSpeed::Fast.hz()), 12);
        assert_eq!(bit_rate(MHz8::FREQ, BusSpeed::Standard.hz()), 32);
        // Too slow a core for fast mode; fastest setting
        assert_eq!(bit_rate(MHz1::FREQ, BusSpeed::Fast.hz()), 0);
        assert_eq!(bit_rate(MHz16::FREQ, 1_000), u8::MAX);
    }

    #[test]
    fn init_enables_twi() {
        let twi = HardwareTwi::new(
            SimTwi::new(0x50),
            (),
            (),
            MHz16,
            TwiConfig::new(BusSpeed::Fast),
        );
        let bus = twi.twi.0.borrow();
        assert_eq!(bus.twbr, 12);
        assert_eq!(bus.prescaler, 0);
        assert_eq!(bus.twcr, Twcr::TWEN);
    }

    #[test]
    fn set_speed_rewrites_bit_rate() {
        let mut twi = backend(SimTwi::new(0x50), PollLimit::UNBOUNDED);
        assert_eq!(twi.twi.0.borrow().twbr, 72);
        twi.set_speed(BusSpeed::Fast);
        assert_eq!(twi.twi.0.borrow().twbr, 12);
        twi.set_speed(BusSpeed::Standard);
        assert_eq!(twi.twi.0.borrow().twbr, 72);
        assert_eq!(twi.twi.0.borrow().twcr, Twcr::TWEN);
    }

    #[test]
    fn start_confirms_and_addresses() {
        let mut twi = backend(SimTwi::new(0x50), PollLimit::UNBOUNDED);
        assert_eq!(twi.start(0x50, Direction::Write), Ok(()));
        assert_eq!(twi.repeat_start(0x50, Direction::Read), Ok(()));
        assert_eq!(
            log(twi),
            [
                Ev::Start(status::START),
                Ev::Addr(0xA0, true),
                Ev::Start(status::REP_START),
                Ev::Addr(0xA1, true)
            ]
        );
    }

    #[test]
    fn address_nack_for_both_directions() {
        let mut twi = backend(SimTwi::new(0x50), PollLimit::UNBOUNDED);
        assert_eq!(twi.start(0x51, Direction::Write), Err(TwiError::AddressNack));
        assert_eq!(twi.start(0x51, Direction::Read), Err(TwiError::AddressNack));
    }

    #[test]
    fn data_nack_is_reported() {
        let sim = SimTwi::new(0x50);
        sim.0.borrow_mut().nack_tx = vec![1];
        let mut twi = backend(sim, PollLimit::UNBOUNDED);
        twi.start(0x50, Direction::Write).unwrap();
        assert_eq!(twi.write_device(1), Ok(()));
        assert_eq!(twi.write_device(2), Err(TwiError::DataNack));
    }

    #[test]
    fn arbitration_loss_on_start() {
        let sim = SimTwi::new(0x50);
        sim.0.borrow_mut().lose_arbitration = true;
        let mut twi = backend(sim, PollLimit::UNBOUNDED);
        assert_eq!(
            twi.start(0x50, Direction::Write),
            Err(TwiError::ArbitrationLost)
        );
    }

    #[test]
    fn reads_ack_then_nak() {
        let sim = SimTwi::new(0x50);
        sim.0.borrow_mut().rx = [0x12, 0x34].into();
        let mut twi = backend(sim, PollLimit::UNBOUNDED);
        twi.start(0x50, Direction::Read).unwrap();
        assert_eq!(twi.read_device_with_ack(), Ok(0x12));
        assert_eq!(twi.read_device_with_nak(), Ok(0x34));
        twi.stop();
        assert_eq!(
            log(twi)[2..],
            [Ev::Rx(0x12, true), Ev::Rx(0x34, false), Ev::Stop]
        );
    }

    #[test]
    fn hung_bus_times_out() {
        let sim = SimTwi::new(0x50);
        sim.0.borrow_mut().hang = true;
        let mut twi = backend(sim, PollLimit::iterations(100));
        assert_eq!(twi.start(0x50, Direction::Write), Err(TwiError::Timeout));
        assert_eq!(twi.write_device(0), Err(TwiError::Timeout));
        assert_eq!(twi.read_device_with_nak(), Err(TwiError::Timeout));
    }

    #[test]
    fn stuck_stop_returns_with_bounded_limit() {
        let sim = SimTwi::new(0x50);
        sim.0.borrow_mut().stuck_stop = true;
        let mut twi = backend(sim, PollLimit::iterations(10));
        twi.stop();
        assert_eq!(log(twi), [Ev::Stop]);
    }

    #[test]
    fn stop_on_idle_bus_then_start() {
        let mut twi = backend(SimTwi::new(0x50), PollLimit::UNBOUNDED);
        twi.stop();
        assert_eq!(twi.start(0x50, Direction::Write), Ok(()));
        assert_eq!(
            log(twi),
            [Ev::Stop, Ev::Start(status::START), Ev::Addr(0xA0, true)]
        );
    }

    #[test]
    fn write_register_on_the_wire() {
        let mut master = TwiMaster::new(backend(SimTwi::new(0x50), PollLimit::UNBOUNDED));
        assert_eq!(master.write_register(0x50, 0x10, 0xAB), Ok(()));
        assert_eq!(
            log(master.free()),
            [
                Ev::Start(status::START),
                Ev::Addr(0xA0, true),
                Ev::Tx(0x10, true),
                Ev::Tx(0xAB, true),
                Ev::Stop
            ]
        );
    }

    #[test]
    fn read_register_on_the_wire() {
        let sim = SimTwi::new(0x68);
        sim.0.borrow_mut().rx = [0x71].into();
        let mut master = TwiMaster::new(backend(sim, PollLimit::UNBOUNDED));
        assert_eq!(master.read_register(0x68, 0x75), Ok(0x71));
        assert_eq!(
            log(master.free()),
            [
                Ev::Start(status::START),
                Ev::Addr(0xD0, true),
                Ev::Tx(0x75, true),
                Ev::Start(status::REP_START),
                Ev::Addr(0xD1, true),
                Ev::Rx(0x71, false),
                Ev::Stop
            ]
        );
    }

    #[test]
    fn read_register_address_nack_leaves_bus_alone() {
        let mut master = TwiMaster::new(backend(SimTwi::new(0x68), PollLimit::UNBOUNDED));
        assert_eq!(master.read_register(0x69, 0x75), Err(TwiError::AddressNack));
        assert_eq!(
            log(master.free()),
            [Ev::Start(status::START), Ev::Addr(0xD2, false)]
        );
    }

    #[test]
    fn scan_finds_the_device() {
        let mut master = TwiMaster::new(backend(SimTwi::new(0x3C), PollLimit::UNBOUNDED));
        let mut found = Vec::new();
        master.scan_bus(|addr| found.push(addr));
        assert_eq!(found, [0x3C]);
    }
}
