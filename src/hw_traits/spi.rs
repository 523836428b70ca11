use super::Steal;
#[cfg(not(test))]
use crate::pac;
use bitflags::bitflags;

bitflags! {
    /// SPCR control bits
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Spcr: u8 {
        const SPIE = 1 << 7;
        const SPE = 1 << 6;
        const DORD = 1 << 5;
        const MSTR = 1 << 4;
        const CPOL = 1 << 3;
        const CPHA = 1 << 2;
        const SPR1 = 1 << 1;
        const SPR0 = 1 << 0;
    }
}

bitflags! {
    /// SPSR status bits
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Spsr: u8 {
        const SPIF = 1 << 7;
        const WCOL = 1 << 6;
        const SPI2X = 1 << 0;
    }
}

pub trait SpiPeriph: Steal {
    fn spcr_rd(&self) -> Spcr;
    fn spcr_wr(&self, val: Spcr);

    fn spsr_rd(&self) -> Spsr;
    fn spsr_wr(&self, val: Spsr);

    fn spdr_rd(&self) -> u8;
    fn spdr_wr(&self, val: u8);
}

#[cfg(all(not(test), feature = "spi"))]
impl SpiPeriph for pac::SPI {
    #[inline(always)]
    fn spcr_rd(&self) -> Spcr {
        Spcr::from_bits_retain(self.spcr.read().bits())
    }

    #[inline(always)]
    fn spcr_wr(&self, val: Spcr) {
        self.spcr.write(|w| unsafe { w.bits(val.bits()) });
    }

    #[inline(always)]
    fn spsr_rd(&self) -> Spsr {
        Spsr::from_bits_retain(self.spsr.read().bits())
    }

    #[inline(always)]
    fn spsr_wr(&self, val: Spsr) {
        self.spsr.write(|w| unsafe { w.bits(val.bits()) });
    }

    reg_methods!(spdr, spdr_rd, spdr_wr);
}
