use super::Steal;
#[cfg(not(test))]
use crate::pac;

pub trait GpioPeriph: Steal {
    fn pin_rd(&self) -> u8;
    // Hardware toggles PORT for every 1 written
    fn pin_toggle(&self, bits: u8);

    fn port_rd(&self) -> u8;
    fn port_wr(&self, bits: u8);
    fn port_set(&self, bits: u8);
    fn port_clear(&self, bits: u8);

    fn ddr_rd(&self) -> u8;
    fn ddr_wr(&self, bits: u8);
    fn ddr_set(&self, bits: u8);
    fn ddr_clear(&self, bits: u8);
}

#[cfg(not(test))]
macro_rules! gpio_impl {
    ($Px:ident => $pinx:ident, $ddrx:ident, $portx:ident) => {
        impl GpioPeriph for pac::$Px {
            #[inline(always)]
            fn pin_rd(&self) -> u8 {
                self.$pinx.read().bits()
            }

            #[inline(always)]
            fn pin_toggle(&self, bits: u8) {
                self.$pinx.write(|w| unsafe { w.bits(bits) });
            }

            reg_methods!($portx, port_rd, port_wr, port_set, port_clear);
            reg_methods!($ddrx, ddr_rd, ddr_wr, ddr_set, ddr_clear);
        }
    };
}

#[cfg(all(not(test), feature = "atmega328p"))]
gpio_impl!(PORTB => pinb, ddrb, portb);
#[cfg(all(not(test), feature = "atmega328p"))]
gpio_impl!(PORTC => pinc, ddrc, portc);
#[cfg(all(not(test), feature = "atmega328p"))]
gpio_impl!(PORTD => pind, ddrd, portd);

#[cfg(all(not(test), feature = "attiny85"))]
gpio_impl!(PORTB => pinb, ddrb, portb);
