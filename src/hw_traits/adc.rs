use super::Steal;
#[cfg(not(test))]
use crate::pac;
use bitflags::bitflags;

bitflags! {
    /// ADCSRA control and status
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Adcsra: u8 {
        const ADEN = 1 << 7;
        const ADSC = 1 << 6;
        const ADATE = 1 << 5;
        const ADIF = 1 << 4;
        const ADIE = 1 << 3;
        const ADPS = 0x07;
    }
}

/// ADMUX channel field
pub const MUX_MASK: u8 = 0x0F;

pub trait AdcPeriph: Steal {
    /// Bits of ADMUX holding the reference selection
    const REFS_MASK: u8;
    /// ADMUX reference bits for External, AVcc, 1.1V and 2.56V, or `None` if absent
    const REFS: [Option<u8>; 4];

    // ADCL then ADCH
    fn adc_rd(&self) -> u16;

    fn adcsra_rd(&self) -> u8;
    fn adcsra_wr(&self, bits: u8);
    fn adcsra_set(&self, bits: u8);
    fn adcsra_clear(&self, bits: u8);

    fn adcsrb_rd(&self) -> u8;
    fn adcsrb_wr(&self, bits: u8);

    fn admux_rd(&self) -> u8;
    fn admux_wr(&self, bits: u8);

    fn didr0_rd(&self) -> u8;
    fn didr0_wr(&self, bits: u8);
    fn didr0_set(&self, bits: u8);
    fn didr0_clear(&self, bits: u8);

    #[inline(always)]
    fn status(&self) -> Adcsra {
        Adcsra::from_bits_retain(self.adcsra_rd())
    }
}

#[cfg(all(not(test), feature = "atmega328p"))]
impl AdcPeriph for pac::ADC {
    const REFS_MASK: u8 = 0xC0;
    // REFS1:0 = 00 AREF, 01 AVcc, 11 internal 1.1V
    const REFS: [Option<u8>; 4] = [Some(0x00), Some(0x40), Some(0xC0), None];

    #[inline(always)]
    fn adc_rd(&self) -> u16 {
        self.adc.read().bits()
    }

    reg_methods!(adcsra, adcsra_rd, adcsra_wr, adcsra_set, adcsra_clear);
    reg_methods!(adcsrb, adcsrb_rd, adcsrb_wr);
    reg_methods!(admux, admux_rd, admux_wr);
    reg_methods!(didr0, didr0_rd, didr0_wr, didr0_set, didr0_clear);
}

#[cfg(all(not(test), feature = "attiny85"))]
impl AdcPeriph for pac::ADC {
    // REFS1, REFS0 and REFS2
    const REFS_MASK: u8 = 0xD0;
    // 000 Vcc, 001 AREF, 010 internal 1.1V, 110 internal 2.56V without bypass capacitor
    const REFS: [Option<u8>; 4] = [Some(0x40), Some(0x00), Some(0x80), Some(0x90)];

    #[inline(always)]
    fn adc_rd(&self) -> u16 {
        self.adc.read().bits()
    }

    reg_methods!(adcsra, adcsra_rd, adcsra_wr, adcsra_set, adcsra_clear);
    reg_methods!(adcsrb, adcsrb_rd, adcsrb_wr);
    reg_methods!(admux, admux_rd, admux_wr);
    reg_methods!(didr0, didr0_rd, didr0_wr, didr0_set, didr0_clear);
}
