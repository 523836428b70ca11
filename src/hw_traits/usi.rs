use bitflags::bitflags;

bitflags! {
    /// USICR control bits
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Usicr: u8 {
        const USISIE = 1 << 7;
        const USIOIE = 1 << 6;
        const USIWM1 = 1 << 5;
        const USIWM0 = 1 << 4;
        const USICS1 = 1 << 3;
        const USICS0 = 1 << 2;
        const USICLK = 1 << 1;
        const USITC = 1 << 0;
    }
}

bitflags! {
    /// USISR flags. Flags are cleared by writing 1; the low nibble is the edge counter.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Usisr: u8 {
        const USISIF = 1 << 7;
        const USIOIF = 1 << 6;
        const USIPF = 1 << 5;
        const USIDC = 1 << 4;
        const USICNT = 0x0F;
    }
}

/// Universal serial interface, plus the port bits of the lines it shares with GPIO.
///
/// In two-wire mode the USI only holds SDA low through its output latch; direction and the
/// start/stop edges are driven through the port registers, so the line accessors live here too.
pub trait UsiPeriph {
    fn usicr_wr(&self, val: Usicr);

    fn usisr_rd(&self) -> Usisr;
    fn usisr_wr(&self, val: Usisr);

    fn usidr_rd(&self) -> u8;
    fn usidr_wr(&self, val: u8);

    fn usibr_rd(&self) -> u8;

    // DI/SDA line
    fn sda_dir_out(&self, output: bool);
    fn sda_wr(&self, high: bool);
    fn sda_rd(&self) -> bool;

    // USCK/SCL line
    fn scl_dir_out(&self, output: bool);
    fn scl_wr(&self, high: bool);
    fn scl_rd(&self) -> bool;
}

#[cfg(all(not(test), feature = "attiny85"))]
mod attiny85 {
    use super::*;
    use crate::hw_traits::gpio::GpioPeriph;
    use crate::hw_traits::Steal;
    use crate::pac;

    // DI/SDA on PB0, USCK/SCL on PB2
    const SDA: u8 = 1 << 0;
    const SCL: u8 = 1 << 2;

    #[inline(always)]
    fn port() -> pac::PORTB {
        // SAFETY: only the two bits owned by the USI are touched
        unsafe { pac::PORTB::steal() }
    }

    impl UsiPeriph for pac::USI {
        #[inline(always)]
        fn usicr_wr(&self, val: Usicr) {
            self.usicr.write(|w| unsafe { w.bits(val.bits()) });
        }

        #[inline(always)]
        fn usisr_rd(&self) -> Usisr {
            Usisr::from_bits_retain(self.usisr.read().bits())
        }

        #[inline(always)]
        fn usisr_wr(&self, val: Usisr) {
            self.usisr.write(|w| unsafe { w.bits(val.bits()) });
        }

        #[inline(always)]
        fn usidr_rd(&self) -> u8 {
            self.usidr.read().bits()
        }

        #[inline(always)]
        fn usidr_wr(&self, val: u8) {
            self.usidr.write(|w| unsafe { w.bits(val) });
        }

        #[inline(always)]
        fn usibr_rd(&self) -> u8 {
            self.usibr.read().bits()
        }

        #[inline(always)]
        fn sda_dir_out(&self, output: bool) {
            if output {
                port().ddr_set(SDA)
            } else {
                port().ddr_clear(SDA)
            }
        }

        #[inline(always)]
        fn sda_wr(&self, high: bool) {
            if high {
                port().port_set(SDA)
            } else {
                port().port_clear(SDA)
            }
        }

        #[inline(always)]
        fn sda_rd(&self) -> bool {
            port().pin_rd() & SDA != 0
        }

        #[inline(always)]
        fn scl_dir_out(&self, output: bool) {
            if output {
                port().ddr_set(SCL)
            } else {
                port().ddr_clear(SCL)
            }
        }

        #[inline(always)]
        fn scl_wr(&self, high: bool) {
            if high {
                port().port_set(SCL)
            } else {
                port().port_clear(SCL)
            }
        }

        #[inline(always)]
        fn scl_rd(&self) -> bool {
            port().pin_rd() & SCL != 0
        }
    }
}
