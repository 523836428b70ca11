use super::Steal;
#[cfg(not(test))]
use crate::pac;

/// TCCRnB bits shared by every timer
pub const FOCA: u8 = 1 << 7;
pub const FOCB: u8 = 1 << 6;
pub const WGM2: u8 = 1 << 3;
pub const CS_MASK: u8 = 0x07;

/// TCCR1B bits of the 16-bit timer
pub const ICNC: u8 = 1 << 7;
pub const ICES: u8 = 1 << 6;
pub const WGM3: u8 = 1 << 4;

/// TCCRnA fields
pub const COMA_SHIFT: u8 = 6;
pub const COMB_SHIFT: u8 = 4;
pub const COMC_SHIFT: u8 = 2;
pub const WGM_LOW_MASK: u8 = 0x03;

/// Interrupt mask/flag bit positions of one timer inside TIMSK/TIFR.
///
/// Most parts give each timer its own TIMSKn/TIFRn, but the small tinies share one register
/// between timers.
#[derive(Clone, Copy, Debug)]
pub struct IntBits {
    pub overflow: u8,
    pub compare_a: u8,
    pub compare_b: u8,
    pub compare_c: u8,
    pub capture: u8,
}

/// Standard TIMSKn/TIFRn layout of the megaAVR parts
pub const MEGA_INT_BITS: IntBits = IntBits {
    overflow: 1 << 0,
    compare_a: 1 << 1,
    compare_b: 1 << 2,
    compare_c: 1 << 3,
    capture: 1 << 5,
};

/// 8-bit timer/counter peripheral
pub trait Timer8Periph: Steal {
    /// CSn2:0 encoding accepted by this timer
    type ClockSource: Copy + Into<u8>;
    const INT_BITS: IntBits;

    fn tccra_rd(&self) -> u8;
    fn tccra_wr(&self, bits: u8);
    fn tccrb_rd(&self) -> u8;
    fn tccrb_wr(&self, bits: u8);

    fn tcnt_rd(&self) -> u8;
    fn tcnt_wr(&self, bits: u8);
    fn ocra_rd(&self) -> u8;
    fn ocra_wr(&self, bits: u8);
    fn ocrb_rd(&self) -> u8;
    fn ocrb_wr(&self, bits: u8);

    fn timsk_rd(&self) -> u8;
    fn timsk_wr(&self, bits: u8);
    fn timsk_set(&self, bits: u8);
    fn timsk_clear(&self, bits: u8);

    // Flags clear by writing 1
    fn tifr_rd(&self) -> u8;
    fn tifr_wr(&self, bits: u8);
}

/// 16-bit timer/counter peripheral.
///
/// 16-bit accesses go through the shared TEMP register, so an ISR touching the same timer must
/// not run between the two halves.
pub trait Timer16Periph: Steal {
    /// CSn2:0 encoding accepted by this timer
    type ClockSource: Copy + Into<u8>;
    const INT_BITS: IntBits;
    /// Whether OCRnC and its output exist
    const HAS_COMPARE_C: bool;

    fn tccra_rd(&self) -> u8;
    fn tccra_wr(&self, bits: u8);
    fn tccrb_rd(&self) -> u8;
    fn tccrb_wr(&self, bits: u8);
    // Force-compare strobes live in TCCRnC on 16-bit timers
    fn tccrc_rd(&self) -> u8;
    fn tccrc_wr(&self, bits: u8);

    fn tcnt_rd(&self) -> u16;
    fn tcnt_wr(&self, bits: u16);
    fn icr_rd(&self) -> u16;
    fn icr_wr(&self, bits: u16);
    fn ocra_rd(&self) -> u16;
    fn ocra_wr(&self, bits: u16);
    fn ocrb_rd(&self) -> u16;
    fn ocrb_wr(&self, bits: u16);
    // Only meaningful when HAS_COMPARE_C
    fn ocrc_rd(&self) -> u16;
    fn ocrc_wr(&self, bits: u16);

    fn timsk_rd(&self) -> u8;
    fn timsk_wr(&self, bits: u8);
    fn timsk_set(&self, bits: u8);
    fn timsk_clear(&self, bits: u8);

    fn tifr_rd(&self) -> u8;
    fn tifr_wr(&self, bits: u8);
}

#[cfg(not(test))]
macro_rules! timer8_impl {
    ($Tc:ident, $ClockSource:ty, $bits:expr => $tccra:ident, $tccrb:ident, $tcnt:ident,
     $ocra:ident, $ocrb:ident, $timsk:ident, $tifr:ident) => {
        impl Timer8Periph for pac::$Tc {
            type ClockSource = $ClockSource;
            const INT_BITS: IntBits = $bits;

            reg_methods!($tccra, tccra_rd, tccra_wr);
            reg_methods!($tccrb, tccrb_rd, tccrb_wr);
            reg_methods!($tcnt, tcnt_rd, tcnt_wr);
            reg_methods!($ocra, ocra_rd, ocra_wr);
            reg_methods!($ocrb, ocrb_rd, ocrb_wr);
            reg_methods!($timsk, timsk_rd, timsk_wr, timsk_set, timsk_clear);
            reg_methods!($tifr, tifr_rd, tifr_wr);
        }
    };
}

#[cfg(all(not(test), feature = "atmega328p"))]
mod atmega328p {
    use super::*;
    use crate::timer::{ClockSource, ClockSource2};

    timer8_impl!(TC0, ClockSource, MEGA_INT_BITS =>
        tccr0a, tccr0b, tcnt0, ocr0a, ocr0b, timsk0, tifr0);
    timer8_impl!(TC2, ClockSource2, MEGA_INT_BITS =>
        tccr2a, tccr2b, tcnt2, ocr2a, ocr2b, timsk2, tifr2);

    impl Timer16Periph for pac::TC1 {
        type ClockSource = ClockSource;
        const INT_BITS: IntBits = MEGA_INT_BITS;
        const HAS_COMPARE_C: bool = false;

        reg_methods!(tccr1a, tccra_rd, tccra_wr);
        reg_methods!(tccr1b, tccrb_rd, tccrb_wr);
        reg_methods!(tccr1c, tccrc_rd, tccrc_wr);
        reg_methods!(tcnt1: u16, tcnt_rd, tcnt_wr);
        reg_methods!(icr1: u16, icr_rd, icr_wr);
        reg_methods!(ocr1a: u16, ocra_rd, ocra_wr);
        reg_methods!(ocr1b: u16, ocrb_rd, ocrb_wr);

        #[inline(always)]
        fn ocrc_rd(&self) -> u16 {
            0
        }

        #[inline(always)]
        fn ocrc_wr(&self, _bits: u16) {}

        reg_methods!(timsk1, timsk_rd, timsk_wr, timsk_set, timsk_clear);
        reg_methods!(tifr1, tifr_rd, tifr_wr);
    }
}

#[cfg(all(not(test), feature = "attiny85"))]
mod attiny85 {
    use super::*;
    use crate::timer::ClockSource;

    // TIMSK/TIFR are shared with Timer1
    const TINY_INT_BITS: IntBits = IntBits {
        overflow: 1 << 1,
        compare_a: 1 << 4,
        compare_b: 1 << 3,
        compare_c: 0,
        capture: 0,
    };

    timer8_impl!(TC0, ClockSource, TINY_INT_BITS =>
        tccr0a, tccr0b, tcnt0, ocr0a, ocr0b, timsk, tifr);
}
