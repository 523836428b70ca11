//! Simulated data space for host tests
//!
//! Stands in for the register blocks of the selected device. [`pac`] mirrors the peripheral
//! handles of the device crate and implements the access traits over data-space addresses, so
//! register traffic can be inspected without hardware.
#![allow(missing_docs)]

use std::cell::RefCell;
use std::vec::Vec;

const SIZE: usize = 0x100;

std::thread_local! {
    static MEM: RefCell<[u8; SIZE]> = const { RefCell::new([0; SIZE]) };
    static WRITES: RefCell<Vec<(u16, u8)>> = const { RefCell::new(Vec::new()) };
    static HOOKS: RefCell<Vec<(u16, fn(u8))>> = const { RefCell::new(Vec::new()) };
}

pub fn read(addr: u16) -> u8 {
    MEM.with(|m| m.borrow()[addr as usize % SIZE])
}

pub fn write(addr: u16, val: u8) {
    MEM.with(|m| m.borrow_mut()[addr as usize % SIZE] = val);
    WRITES.with(|w| w.borrow_mut().push((addr, val)));
    let hooks: Vec<fn(u8)> = HOOKS.with(|h| {
        h.borrow()
            .iter()
            .filter(|(a, _)| *a == addr)
            .map(|(_, f)| *f)
            .collect()
    });
    for hook in hooks {
        hook(val);
    }
}

// Register pairs go through TEMP: low byte read first, high byte written first
pub fn read16(addr: u16) -> u16 {
    let lo = read(addr);
    let hi = read(addr + 1);
    u16::from_le_bytes([lo, hi])
}

pub fn write16(addr: u16, val: u16) {
    let [lo, hi] = val.to_le_bytes();
    write(addr + 1, hi);
    write(addr, lo);
}

/// Zero the data space, forget recorded writes and drop all hooks
pub fn reset() {
    MEM.with(|m| *m.borrow_mut() = [0; SIZE]);
    WRITES.with(|w| w.borrow_mut().clear());
    HOOKS.with(|h| h.borrow_mut().clear());
}

/// Call `hook` with the value after every write to `addr`, standing in for the peripheral
/// reacting to the write. Hooks change memory through [`poke`].
pub fn on_write(addr: u16, hook: fn(u8)) {
    HOOKS.with(|h| h.borrow_mut().push((addr, hook)));
}

/// Read a location without going through a register
pub fn peek(addr: u16) -> u8 {
    read(addr)
}

/// Preload a location as hardware would, without recording a write
pub fn poke(addr: u16, val: u8) {
    MEM.with(|m| m.borrow_mut()[addr as usize % SIZE] = val);
}

/// Every value written to `addr` since the last reset, in order
pub fn writes_to(addr: u16) -> Vec<u8> {
    WRITES.with(|w| {
        w.borrow()
            .iter()
            .filter(|(a, _)| *a == addr)
            .map(|(_, v)| *v)
            .collect()
    })
}

macro_rules! sim_regs {
    (u16 $addr:expr, $rd:ident, $wr:ident) => {
        fn $rd(&self) -> u16 {
            $crate::sim::read16($addr)
        }

        fn $wr(&self, bits: u16) {
            $crate::sim::write16($addr, bits)
        }
    };

    ($addr:expr, $rd:ident, $wr:ident) => {
        fn $rd(&self) -> u8 {
            $crate::sim::read($addr)
        }

        fn $wr(&self, bits: u8) {
            $crate::sim::write($addr, bits)
        }
    };

    ($addr:expr, $rd:ident, $wr:ident, $set:ident, $clear:ident) => {
        sim_regs!($addr, $rd, $wr);

        fn $set(&self, bits: u8) {
            $crate::sim::write($addr, $crate::sim::read($addr) | bits)
        }

        fn $clear(&self, bits: u8) {
            $crate::sim::write($addr, $crate::sim::read($addr) & !bits)
        }
    };
}

macro_rules! handles {
    ($($P:ident),+ $(,)?) => {
        $(
            pub struct $P {
                _private: (),
            }

            impl $crate::hw_traits::Steal for $P {
                unsafe fn steal() -> Self {
                    $P { _private: () }
                }
            }
        )+
    };
}

macro_rules! sim_gpio {
    ($Px:ident => $pin:expr, $ddr:expr, $port:expr) => {
        impl GpioPeriph for $Px {
            sim_regs!($pin, pin_rd, pin_toggle);
            sim_regs!($port, port_rd, port_wr, port_set, port_clear);
            sim_regs!($ddr, ddr_rd, ddr_wr, ddr_set, ddr_clear);
        }
    };
}

macro_rules! sim_adc {
    ($refs_mask:expr, $refs:expr => $adc:expr, $adcsra:expr, $adcsrb:expr, $admux:expr, $didr0:expr) => {
        impl AdcPeriph for ADC {
            const REFS_MASK: u8 = $refs_mask;
            const REFS: [Option<u8>; 4] = $refs;

            fn adc_rd(&self) -> u16 {
                $crate::sim::read16($adc)
            }

            sim_regs!($adcsra, adcsra_rd, adcsra_wr, adcsra_set, adcsra_clear);
            sim_regs!($adcsrb, adcsrb_rd, adcsrb_wr);
            sim_regs!($admux, admux_rd, admux_wr);
            sim_regs!($didr0, didr0_rd, didr0_wr, didr0_set, didr0_clear);
        }
    };
}

macro_rules! sim_timer8 {
    ($Tc:ident, $ClockSource:ty, $bits:expr => $tccra:expr, $tccrb:expr, $tcnt:expr, $ocra:expr,
     $ocrb:expr, $timsk:expr, $tifr:expr) => {
        impl Timer8Periph for $Tc {
            type ClockSource = $ClockSource;
            const INT_BITS: IntBits = $bits;

            sim_regs!($tccra, tccra_rd, tccra_wr);
            sim_regs!($tccrb, tccrb_rd, tccrb_wr);
            sim_regs!($tcnt, tcnt_rd, tcnt_wr);
            sim_regs!($ocra, ocra_rd, ocra_wr);
            sim_regs!($ocrb, ocrb_rd, ocrb_wr);
            sim_regs!($timsk, timsk_rd, timsk_wr, timsk_set, timsk_clear);
            sim_regs!($tifr, tifr_rd, tifr_wr);
        }
    };
}

#[cfg(feature = "atmega328p")]
pub mod pac {
    use crate::exti::{Pcint0, Pcint1, Pcint2};
    use crate::hw_traits::adc::AdcPeriph;
    use crate::hw_traits::exti::{ExtIntPeriph, PcIntPeriph};
    use crate::hw_traits::gpio::GpioPeriph;
    use crate::hw_traits::spi::{SpiPeriph, Spcr, Spsr};
    use crate::hw_traits::timer::{IntBits, Timer16Periph, Timer8Periph, MEGA_INT_BITS};
    use crate::hw_traits::twi::{TwiPeriph, Twcr};
    use crate::hw_traits::usart::UsartPeriph;
    use crate::timer::{ClockSource, ClockSource2};

    handles!(PORTB, PORTC, PORTD, TWI, SPI, USART0, ADC, EXINT, TC0, TC1, TC2);

    sim_gpio!(PORTB => 0x23, 0x24, 0x25);
    sim_gpio!(PORTC => 0x26, 0x27, 0x28);
    sim_gpio!(PORTD => 0x29, 0x2A, 0x2B);

    impl TwiPeriph for TWI {
        fn twbr_wr(&self, val: u8) {
            super::write(0xB8, val)
        }

        fn twsr_rd(&self) -> u8 {
            super::read(0xB9)
        }

        fn twsr_wr(&self, val: u8) {
            super::write(0xB9, val)
        }

        fn twdr_rd(&self) -> u8 {
            super::read(0xBB)
        }

        fn twdr_wr(&self, val: u8) {
            super::write(0xBB, val)
        }

        fn twcr_rd(&self) -> Twcr {
            Twcr::from_bits_retain(super::read(0xBC))
        }

        fn twcr_wr(&self, val: Twcr) {
            super::write(0xBC, val.bits())
        }
    }

    impl SpiPeriph for SPI {
        fn spcr_rd(&self) -> Spcr {
            Spcr::from_bits_retain(super::read(0x4C))
        }

        fn spcr_wr(&self, val: Spcr) {
            super::write(0x4C, val.bits())
        }

        fn spsr_rd(&self) -> Spsr {
            Spsr::from_bits_retain(super::read(0x4D))
        }

        fn spsr_wr(&self, val: Spsr) {
            super::write(0x4D, val.bits())
        }

        sim_regs!(0x4E, spdr_rd, spdr_wr);
    }

    impl UsartPeriph for USART0 {
        sim_regs!(0xC0, ucsra_rd, ucsra_wr);
        sim_regs!(0xC1, ucsrb_rd, ucsrb_wr, ucsrb_set, ucsrb_clear);
        sim_regs!(0xC2, ucsrc_rd, ucsrc_wr);
        sim_regs!(u16 0xC4, ubrr_rd, ubrr_wr);
        sim_regs!(0xC6, udr_rd, udr_wr);
    }

    sim_adc!(0xC0, [Some(0x00), Some(0x40), Some(0xC0), None] =>
        0x78, 0x7A, 0x7B, 0x7C, 0x7E);

    impl ExtIntPeriph for EXINT {
        const LINES: u8 = 2;
        const LINE_BITS: [u8; 2] = [1 << 0, 1 << 1];

        sim_regs!(0x69, eicr_rd, eicr_wr);
        sim_regs!(0x3D, eimsk_rd, eimsk_wr, eimsk_set, eimsk_clear);
        sim_regs!(0x3C, eifr_rd, eifr_wr);
        sim_regs!(0x68, pcicr_rd, pcicr_wr, pcicr_set, pcicr_clear);
        sim_regs!(0x3B, pcifr_rd, pcifr_wr);
    }

    impl PcIntPeriph<Pcint0> for EXINT {
        const BIT: u8 = 1 << 0;
        sim_regs!(0x6B, pcmsk_rd, pcmsk_wr, pcmsk_set, pcmsk_clear);
    }

    impl PcIntPeriph<Pcint1> for EXINT {
        const BIT: u8 = 1 << 1;
        sim_regs!(0x6C, pcmsk_rd, pcmsk_wr, pcmsk_set, pcmsk_clear);
    }

    impl PcIntPeriph<Pcint2> for EXINT {
        const BIT: u8 = 1 << 2;
        sim_regs!(0x6D, pcmsk_rd, pcmsk_wr, pcmsk_set, pcmsk_clear);
    }

    sim_timer8!(TC0, ClockSource, MEGA_INT_BITS =>
        0x44, 0x45, 0x46, 0x47, 0x48, 0x6E, 0x35);
    sim_timer8!(TC2, ClockSource2, MEGA_INT_BITS =>
        0xB0, 0xB1, 0xB2, 0xB3, 0xB4, 0x70, 0x37);

    impl Timer16Periph for TC1 {
        type ClockSource = ClockSource;
        const INT_BITS: IntBits = MEGA_INT_BITS;
        const HAS_COMPARE_C: bool = false;

        sim_regs!(0x80, tccra_rd, tccra_wr);
        sim_regs!(0x81, tccrb_rd, tccrb_wr);
        sim_regs!(0x82, tccrc_rd, tccrc_wr);
        sim_regs!(u16 0x84, tcnt_rd, tcnt_wr);
        sim_regs!(u16 0x86, icr_rd, icr_wr);
        sim_regs!(u16 0x88, ocra_rd, ocra_wr);
        sim_regs!(u16 0x8A, ocrb_rd, ocrb_wr);

        fn ocrc_rd(&self) -> u16 {
            0
        }

        fn ocrc_wr(&self, _bits: u16) {}

        sim_regs!(0x6F, timsk_rd, timsk_wr, timsk_set, timsk_clear);
        sim_regs!(0x36, tifr_rd, tifr_wr);
    }
}

#[cfg(feature = "attiny85")]
pub mod pac {
    use crate::exti::Pcint0;
    use crate::hw_traits::adc::AdcPeriph;
    use crate::hw_traits::exti::{ExtIntPeriph, PcIntPeriph};
    use crate::hw_traits::gpio::GpioPeriph;
    use crate::hw_traits::timer::{IntBits, Timer8Periph};
    use crate::hw_traits::usi::{UsiPeriph, Usicr, Usisr};
    use crate::hw_traits::Steal;
    use crate::timer::ClockSource;

    handles!(PORTB, USI, ADC, EXINT, TC0);

    sim_gpio!(PORTB => 0x36, 0x37, 0x38);

    const SDA: u8 = 1 << 0;
    const SCL: u8 = 1 << 2;

    fn port() -> PORTB {
        unsafe { PORTB::steal() }
    }

    impl UsiPeriph for USI {
        fn usicr_wr(&self, val: Usicr) {
            super::write(0x2D, val.bits())
        }

        fn usisr_rd(&self) -> Usisr {
            Usisr::from_bits_retain(super::read(0x2E))
        }

        fn usisr_wr(&self, val: Usisr) {
            super::write(0x2E, val.bits())
        }

        sim_regs!(0x2F, usidr_rd, usidr_wr);

        fn usibr_rd(&self) -> u8 {
            super::read(0x30)
        }

        fn sda_dir_out(&self, output: bool) {
            if output {
                port().ddr_set(SDA)
            } else {
                port().ddr_clear(SDA)
            }
        }

        fn sda_wr(&self, high: bool) {
            if high {
                port().port_set(SDA)
            } else {
                port().port_clear(SDA)
            }
        }

        fn sda_rd(&self) -> bool {
            port().pin_rd() & SDA != 0
        }

        fn scl_dir_out(&self, output: bool) {
            if output {
                port().ddr_set(SCL)
            } else {
                port().ddr_clear(SCL)
            }
        }

        fn scl_wr(&self, high: bool) {
            if high {
                port().port_set(SCL)
            } else {
                port().port_clear(SCL)
            }
        }

        fn scl_rd(&self) -> bool {
            port().pin_rd() & SCL != 0
        }
    }

    sim_adc!(0xD0, [Some(0x40), Some(0x00), Some(0x80), Some(0x90)] =>
        0x24, 0x26, 0x23, 0x27, 0x34);

    impl ExtIntPeriph for EXINT {
        const LINES: u8 = 1;
        const LINE_BITS: [u8; 2] = [1 << 6, 0];

        sim_regs!(0x55, eicr_rd, eicr_wr);
        sim_regs!(0x5B, eimsk_rd, eimsk_wr, eimsk_set, eimsk_clear);
        sim_regs!(0x5A, eifr_rd, eifr_wr);
        sim_regs!(0x5B, pcicr_rd, pcicr_wr, pcicr_set, pcicr_clear);
        sim_regs!(0x5A, pcifr_rd, pcifr_wr);
    }

    impl PcIntPeriph<Pcint0> for EXINT {
        const BIT: u8 = 1 << 5;
        sim_regs!(0x35, pcmsk_rd, pcmsk_wr, pcmsk_set, pcmsk_clear);
    }

    sim_timer8!(TC0, ClockSource, IntBits {
        overflow: 1 << 1,
        compare_a: 1 << 4,
        compare_b: 1 << 3,
        compare_c: 0,
        capture: 0,
    } => 0x4A, 0x53, 0x52, 0x49, 0x48, 0x59, 0x58);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_pair_writes_high_byte_first() {
        reset();
        write16(0x88, 0x1234);
        assert_eq!(writes_to(0x89), [0x12]);
        assert_eq!(writes_to(0x88), [0x34]);
        assert_eq!(read16(0x88), 0x1234);
    }

    #[test]
    fn hooks_see_each_write() {
        reset();
        on_write(0x40, |v| poke(0x41, v.wrapping_add(1)));
        write(0x40, 7);
        write(0x42, 9);
        assert_eq!(peek(0x41), 8);
        assert_eq!(writes_to(0x40), [7]);
        assert!(writes_to(0x41).is_empty());
    }
}
