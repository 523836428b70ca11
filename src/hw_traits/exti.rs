use super::Steal;
#[cfg(not(test))]
use crate::pac;

/// External interrupt controller: the INTn lines and the pin-change group enables.
///
/// The tinies keep these bits in MCUCR, GIMSK and GIFR; the megas in EICRA, EIMSK/EIFR and
/// PCICR/PCIFR. The method names follow the mega.
pub trait ExtIntPeriph: Steal {
    /// Lines present on the device
    const LINES: u8;
    /// Enable/flag bit of each line
    const LINE_BITS: [u8; 2];

    // Sense control, two bits per line starting at bit 0
    fn eicr_rd(&self) -> u8;
    fn eicr_wr(&self, bits: u8);

    fn eimsk_rd(&self) -> u8;
    fn eimsk_wr(&self, bits: u8);
    fn eimsk_set(&self, bits: u8);
    fn eimsk_clear(&self, bits: u8);

    // Flags clear by writing 1
    fn eifr_rd(&self) -> u8;
    fn eifr_wr(&self, bits: u8);

    fn pcicr_rd(&self) -> u8;
    fn pcicr_wr(&self, bits: u8);
    fn pcicr_set(&self, bits: u8);
    fn pcicr_clear(&self, bits: u8);

    fn pcifr_rd(&self) -> u8;
    fn pcifr_wr(&self, bits: u8);
}

/// One pin-change group of the controller
pub trait PcIntPeriph<G>: ExtIntPeriph {
    /// Enable/flag bit of the group
    const BIT: u8;

    fn pcmsk_rd(&self) -> u8;
    fn pcmsk_wr(&self, bits: u8);
    fn pcmsk_set(&self, bits: u8);
    fn pcmsk_clear(&self, bits: u8);
}

#[cfg(not(test))]
macro_rules! pcint_impl {
    ($Group:ident, $pcmsk:ident, $bit:expr) => {
        impl PcIntPeriph<crate::exti::$Group> for pac::EXINT {
            const BIT: u8 = $bit;

            reg_methods!($pcmsk, pcmsk_rd, pcmsk_wr, pcmsk_set, pcmsk_clear);
        }
    };
}

#[cfg(all(not(test), feature = "atmega328p"))]
mod atmega328p {
    use super::*;

    impl ExtIntPeriph for pac::EXINT {
        const LINES: u8 = 2;
        const LINE_BITS: [u8; 2] = [1 << 0, 1 << 1];

        reg_methods!(eicra, eicr_rd, eicr_wr);
        reg_methods!(eimsk, eimsk_rd, eimsk_wr, eimsk_set, eimsk_clear);
        reg_methods!(eifr, eifr_rd, eifr_wr);
        reg_methods!(pcicr, pcicr_rd, pcicr_wr, pcicr_set, pcicr_clear);
        reg_methods!(pcifr, pcifr_rd, pcifr_wr);
    }

    pcint_impl!(Pcint0, pcmsk0, 1 << 0);
    pcint_impl!(Pcint1, pcmsk1, 1 << 1);
    pcint_impl!(Pcint2, pcmsk2, 1 << 2);
}

#[cfg(all(not(test), feature = "attiny85"))]
mod attiny85 {
    use super::*;

    // INT0 and the pin-change group share GIMSK and GIFR
    impl ExtIntPeriph for pac::EXINT {
        const LINES: u8 = 1;
        const LINE_BITS: [u8; 2] = [1 << 6, 0];

        reg_methods!(mcucr, eicr_rd, eicr_wr);
        reg_methods!(gimsk, eimsk_rd, eimsk_wr, eimsk_set, eimsk_clear);
        reg_methods!(gifr, eifr_rd, eifr_wr);
        reg_methods!(gimsk, pcicr_rd, pcicr_wr, pcicr_set, pcicr_clear);
        reg_methods!(gifr, pcifr_rd, pcifr_wr);
    }

    pcint_impl!(Pcint0, pcmsk, 1 << 5);
}
