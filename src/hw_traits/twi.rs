#[cfg(not(test))]
use crate::pac;
use bitflags::bitflags;

bitflags! {
    /// TWCR control bits
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Twcr: u8 {
        const TWINT = 1 << 7;
        const TWEA = 1 << 6;
        const TWSTA = 1 << 5;
        const TWSTO = 1 << 4;
        const TWWC = 1 << 3;
        const TWEN = 1 << 2;
        const TWIE = 1 << 0;
    }
}

/// TWSR bits holding the bus status; the low bits are the bit-rate prescaler
pub const TWSR_STATUS_MASK: u8 = 0xF8;

/// Master-mode status codes read from TWSR
pub mod status {
    pub const BUS_ERROR: u8 = 0x00;
    pub const START: u8 = 0x08;
    pub const REP_START: u8 = 0x10;
    pub const MT_SLA_ACK: u8 = 0x18;
    pub const MT_SLA_NACK: u8 = 0x20;
    pub const MT_DATA_ACK: u8 = 0x28;
    pub const MT_DATA_NACK: u8 = 0x30;
    pub const ARB_LOST: u8 = 0x38;
    pub const MR_SLA_ACK: u8 = 0x40;
    pub const MR_SLA_NACK: u8 = 0x48;
    pub const MR_DATA_ACK: u8 = 0x50;
    pub const MR_DATA_NACK: u8 = 0x58;
    pub const NO_INFO: u8 = 0xF8;
}

/// Hardware two-wire interface
pub trait TwiPeriph {
    fn twbr_wr(&self, val: u8);

    fn twsr_rd(&self) -> u8;
    // Only the prescaler bits are writable
    fn twsr_wr(&self, val: u8);

    fn twdr_rd(&self) -> u8;
    fn twdr_wr(&self, val: u8);

    fn twcr_rd(&self) -> Twcr;
    fn twcr_wr(&self, val: Twcr);
}

#[cfg(all(not(test), feature = "twi"))]
impl TwiPeriph for pac::TWI {
    #[inline(always)]
    fn twbr_wr(&self, val: u8) {
        self.twbr.write(|w| unsafe { w.bits(val) });
    }

    #[inline(always)]
    fn twsr_rd(&self) -> u8 {
        self.twsr.read().bits()
    }

    #[inline(always)]
    fn twsr_wr(&self, val: u8) {
        self.twsr.write(|w| unsafe { w.bits(val) });
    }

    #[inline(always)]
    fn twdr_rd(&self) -> u8 {
        self.twdr.read().bits()
    }

    #[inline(always)]
    fn twdr_wr(&self, val: u8) {
        self.twdr.write(|w| unsafe { w.bits(val) });
    }

    #[inline(always)]
    fn twcr_rd(&self) -> Twcr {
        Twcr::from_bits_retain(self.twcr.read().bits())
    }

    #[inline(always)]
    fn twcr_wr(&self, val: Twcr) {
        self.twcr.write(|w| unsafe { w.bits(val.bits()) });
    }
}
