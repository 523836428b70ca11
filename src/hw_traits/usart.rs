use super::Steal;
#[cfg(not(test))]
use crate::pac;
use bitflags::bitflags;

bitflags! {
    /// UCSRnA status and double-speed bits
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Ucsra: u8 {
        const RXC = 1 << 7;
        const TXC = 1 << 6;
        const UDRE = 1 << 5;
        const FE = 1 << 4;
        const DOR = 1 << 3;
        const UPE = 1 << 2;
        const U2X = 1 << 1;
        const MPCM = 1 << 0;
    }
}

bitflags! {
    /// UCSRnB enables
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Ucsrb: u8 {
        const RXCIE = 1 << 7;
        const TXCIE = 1 << 6;
        const UDRIE = 1 << 5;
        const RXEN = 1 << 4;
        const TXEN = 1 << 3;
        const UCSZ2 = 1 << 2;
        const RXB8 = 1 << 1;
        const TXB8 = 1 << 0;
    }
}

/// UCSRnC frame format fields
pub const UPM_SHIFT: u8 = 4;
pub const USBS: u8 = 1 << 3;
pub const UCSZ_SHIFT: u8 = 1;

pub trait UsartPeriph: Steal {
    fn ucsra_rd(&self) -> u8;
    fn ucsra_wr(&self, bits: u8);

    fn ucsrb_rd(&self) -> u8;
    fn ucsrb_wr(&self, bits: u8);
    fn ucsrb_set(&self, bits: u8);
    fn ucsrb_clear(&self, bits: u8);

    fn ucsrc_rd(&self) -> u8;
    fn ucsrc_wr(&self, bits: u8);

    fn ubrr_rd(&self) -> u16;
    fn ubrr_wr(&self, bits: u16);

    fn udr_rd(&self) -> u8;
    fn udr_wr(&self, bits: u8);

    #[inline(always)]
    fn status(&self) -> Ucsra {
        Ucsra::from_bits_retain(self.ucsra_rd())
    }
}

#[cfg(all(not(test), feature = "usart"))]
impl UsartPeriph for pac::USART0 {
    reg_methods!(ucsr0a, ucsra_rd, ucsra_wr);
    reg_methods!(ucsr0b, ucsrb_rd, ucsrb_wr, ucsrb_set, ucsrb_clear);
    reg_methods!(ucsr0c, ucsrc_rd, ucsrc_wr);
    reg_methods!(ubrr0: u16, ubrr_rd, ubrr_wr);
    reg_methods!(udr0, udr_rd, udr_wr);
}
