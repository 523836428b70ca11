//! External and pin-change interrupts
//!
//! These types configure the interrupt lines and poll their flags. Interrupt handlers are left to
//! the application; a flag is cleared automatically when its handler runs, and with
//! [`clear_flag`](ExtInt::clear_flag) when polling.
//!
//! External interrupt lines:
//!
//! ATmega328P: INT0 (PD2), INT1 (PD3)
//!
//! ATtiny85: INT0 (PB2)

use crate::hw_traits::exti::{ExtIntPeriph, PcIntPeriph};
use crate::hw_traits::{with_field, Steal};
use core::marker::PhantomData;

/// Condition that raises an external interrupt
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Sense {
    /// While the line is low
    #[default]
    LowLevel = 0,
    /// On every logic change
    AnyEdge = 1,
    /// On a falling edge
    Falling = 2,
    /// On a rising edge
    Rising = 3,
}

/// One external interrupt line
pub struct ExtInt<E: ExtIntPeriph, const N: u8> {
    _periph: PhantomData<E>,
}

impl<E: ExtIntPeriph, const N: u8> ExtInt<E, N> {
    const LINE_EXISTS: () = assert!(N < E::LINES, "no such external interrupt line");
    const SHIFT: u8 = 2 * N;
    const BIT: u8 = E::LINE_BITS[N as usize];

    #[inline(always)]
    fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::LINE_EXISTS;
        ExtInt {
            _periph: PhantomData,
        }
    }

    /// Choose what triggers the interrupt
    #[inline]
    pub fn set_sense(&mut self, sense: Sense) {
        let e = unsafe { E::steal() };
        let eicr = with_field(e.eicr_rd(), 0b11 << Self::SHIFT, (sense as u8) << Self::SHIFT);
        e.eicr_wr(eicr);
    }

    /// Enable the interrupt
    #[inline]
    pub fn enable(&mut self) {
        let e = unsafe { E::steal() };
        e.eimsk_set(Self::BIT);
    }

    /// Disable the interrupt
    #[inline]
    pub fn disable(&mut self) {
        let e = unsafe { E::steal() };
        e.eimsk_clear(Self::BIT);
    }

    /// Whether the trigger condition has occurred
    #[inline]
    pub fn is_flagged(&self) -> bool {
        let e = unsafe { E::steal() };
        e.eifr_rd() & Self::BIT != 0
    }

    /// Clear the flag
    #[inline]
    pub fn clear_flag(&mut self) {
        let e = unsafe { E::steal() };
        // Flags clear by writing 1; zeros leave the other flags alone
        e.eifr_wr(Self::BIT);
    }
}

/// Pin-change group 0: port B on both devices
pub struct Pcint0;
/// Pin-change group 1: port C
#[cfg(feature = "atmega328p")]
pub struct Pcint1;
/// Pin-change group 2: port D
#[cfg(feature = "atmega328p")]
pub struct Pcint2;

/// A pin-change interrupt group.
///
/// Any change on a pin selected by the mask raises the group's interrupt.
pub struct PinChange<E, G> {
    _periph: PhantomData<E>,
    _group: PhantomData<G>,
}

impl<E: PcIntPeriph<G>, G> PinChange<E, G> {
    #[inline(always)]
    fn new() -> Self {
        PinChange {
            _periph: PhantomData,
            _group: PhantomData,
        }
    }

    /// Watch the pins in `mask` and enable the group interrupt
    pub fn listen(&mut self, mask: u8) {
        let e = unsafe { E::steal() };
        e.pcmsk_set(mask);
        e.pcicr_set(E::BIT);
    }

    /// Disable the group and stop watching every pin
    pub fn unlisten(&mut self) {
        let e = unsafe { E::steal() };
        e.pcicr_clear(E::BIT);
        e.pcmsk_wr(0);
    }

    /// Enable the group interrupt
    #[inline]
    pub fn enable_group(&mut self) {
        let e = unsafe { E::steal() };
        e.pcicr_set(E::BIT);
    }

    /// Disable the group interrupt
    #[inline]
    pub fn disable_group(&mut self) {
        let e = unsafe { E::steal() };
        e.pcicr_clear(E::BIT);
    }

    /// Add the pins in `mask` to the watched set
    #[inline]
    pub fn enable_pin(&mut self, mask: u8) {
        let e = unsafe { E::steal() };
        e.pcmsk_set(mask);
    }

    /// Remove the pins in `mask` from the watched set
    #[inline]
    pub fn disable_pin(&mut self, mask: u8) {
        let e = unsafe { E::steal() };
        e.pcmsk_clear(mask);
    }

    /// Watch exactly the pins in `mask`
    #[inline]
    pub fn set_mask(&mut self, mask: u8) {
        let e = unsafe { E::steal() };
        e.pcmsk_wr(mask);
    }

    /// Whether a watched pin has changed
    #[inline]
    pub fn is_flagged(&self) -> bool {
        let e = unsafe { E::steal() };
        e.pcifr_rd() & E::BIT != 0
    }

    /// Clear the group flag
    #[inline]
    pub fn clear_flag(&mut self) {
        let e = unsafe { E::steal() };
        e.pcifr_wr(E::BIT);
    }
}

/// External interrupt lines and pin-change groups of the device
pub struct Lines<E: ExtIntPeriph> {
    /// INT0
    pub int0: ExtInt<E, 0>,
    /// INT1
    #[cfg(feature = "atmega328p")]
    pub int1: ExtInt<E, 1>,
    /// PCINT0..7 on the ATmega328P, PCINT0..5 on the ATtiny85
    pub pcint0: PinChange<E, Pcint0>,
    /// PCINT8..14
    #[cfg(feature = "atmega328p")]
    pub pcint1: PinChange<E, Pcint1>,
    /// PCINT16..23
    #[cfg(feature = "atmega328p")]
    pub pcint2: PinChange<E, Pcint2>,
}

/// Extension trait for splitting the external interrupt controller into its lines
pub trait ExtIntExt: ExtIntPeriph + Sized {
    /// Split into individual lines and pin-change groups
    fn split(self) -> Lines<Self>;
}

#[cfg(feature = "atmega328p")]
impl<E> ExtIntExt for E
where
    E: PcIntPeriph<Pcint0> + PcIntPeriph<Pcint1> + PcIntPeriph<Pcint2>,
{
    #[inline]
    fn split(self) -> Lines<Self> {
        Lines {
            int0: ExtInt::new(),
            int1: ExtInt::new(),
            pcint0: PinChange::new(),
            pcint1: PinChange::new(),
            pcint2: PinChange::new(),
        }
    }
}

#[cfg(feature = "attiny85")]
impl<E: PcIntPeriph<Pcint0>> ExtIntExt for E {
    #[inline]
    fn split(self) -> Lines<Self> {
        Lines {
            int0: ExtInt::new(),
            pcint0: PinChange::new(),
        }
    }
}
