//! GPIO pins and bit-field ports
//!
//! Call [`GpioExt::split`] on a port handle to get its pins in the reset state (floating inputs).
//! Pins are typestated on direction and pull-up, and are converted by consuming them:
//!
//! ```ignore
//! let portb = dp.PORTB.split();
//! let mut led = portb.pin5.into_output();
//! led.toggle();
//! ```
//!
//! Peripheral drivers take ownership of the pins they use through `From` conversions from the
//! appropriate `Pin` types, so a pin cannot be driven by GPIO code and a peripheral at once.
//!
//! For parallel interfaces, [`OutputPort`] and [`InputPort`] claim a contiguous run of bits on a
//! port and read or write them as one value.

use crate::hw_traits::gpio::GpioPeriph;
use crate::hw_traits::{with_field, Steal};
use core::convert::Infallible;
use core::marker::PhantomData;

mod sealed {
    pub trait SealedPinNum {}
    pub trait SealedPull {}
    pub trait SealedMode {}
}

/// Pin number within a port
pub trait PinNum: sealed::SealedPinNum {
    /// Bit index
    const NUM: u8;
    /// Bit mask
    const MASK: u8 = 1 << Self::NUM;
}

macro_rules! pin_nums {
    ($($Pin:ident: $num:expr,)+) => {
        $(
            /// Pin number type
            pub struct $Pin;
            impl sealed::SealedPinNum for $Pin {}
            impl PinNum for $Pin {
                const NUM: u8 = $num;
            }
        )+
    };
}

pin_nums! {
    Pin0: 0,
    Pin1: 1,
    Pin2: 2,
    Pin3: 3,
    Pin4: 4,
    Pin5: 5,
    Pin6: 6,
    Pin7: 7,
}

/// Output direction typestate
pub struct Output;
/// Input direction typestate
pub struct Input<PULL>(PhantomData<PULL>);
/// Input without pull-up
pub struct Floating;
/// Input with the internal pull-up enabled
pub struct PullUp;

/// Pull setting of an input pin
pub trait Pull: sealed::SealedPull {}
impl sealed::SealedPull for Floating {}
impl sealed::SealedPull for PullUp {}
impl Pull for Floating {}
impl Pull for PullUp {}

/// Direction/pull typestate of a pin
pub trait PinMode: sealed::SealedMode {}
impl sealed::SealedMode for Output {}
impl<PULL: Pull> sealed::SealedMode for Input<PULL> {}
impl PinMode for Output {}
impl<PULL: Pull> PinMode for Input<PULL> {}

/// A single GPIO pin
pub struct Pin<PORT: GpioPeriph, PIN: PinNum, MODE: PinMode> {
    _port: PhantomData<PORT>,
    _pin: PhantomData<PIN>,
    _mode: PhantomData<MODE>,
}

macro_rules! make_pin {
    () => {
        Pin {
            _port: PhantomData,
            _pin: PhantomData,
            _mode: PhantomData,
        }
    };
}

impl<PORT: GpioPeriph, PIN: PinNum, MODE: PinMode> Pin<PORT, PIN, MODE> {
    /// Configure as a push-pull output, initially low
    #[inline]
    pub fn into_output(self) -> Pin<PORT, PIN, Output> {
        let p = unsafe { PORT::steal() };
        p.port_clear(PIN::MASK);
        p.ddr_set(PIN::MASK);
        make_pin!()
    }

    /// Configure as a push-pull output, initially high
    #[inline]
    pub fn into_output_high(self) -> Pin<PORT, PIN, Output> {
        let p = unsafe { PORT::steal() };
        // PORT first, so the pin never glitches low
        p.port_set(PIN::MASK);
        p.ddr_set(PIN::MASK);
        make_pin!()
    }

    /// Configure as an input with no pull-up
    #[inline]
    pub fn into_floating_input(self) -> Pin<PORT, PIN, Input<Floating>> {
        let p = unsafe { PORT::steal() };
        p.ddr_clear(PIN::MASK);
        p.port_clear(PIN::MASK);
        make_pin!()
    }

    /// Configure as an input with the internal pull-up enabled
    #[inline]
    pub fn into_pull_up_input(self) -> Pin<PORT, PIN, Input<PullUp>> {
        let p = unsafe { PORT::steal() };
        p.ddr_clear(PIN::MASK);
        p.port_set(PIN::MASK);
        make_pin!()
    }
}

impl<PORT: GpioPeriph, PIN: PinNum> Pin<PORT, PIN, Output> {
    /// Drive the pin high
    #[inline(always)]
    pub fn set_high(&mut self) {
        let p = unsafe { PORT::steal() };
        p.port_set(PIN::MASK);
    }

    /// Drive the pin low
    #[inline(always)]
    pub fn set_low(&mut self) {
        let p = unsafe { PORT::steal() };
        p.port_clear(PIN::MASK);
    }

    /// Invert the output level
    #[inline(always)]
    pub fn toggle(&mut self) {
        let p = unsafe { PORT::steal() };
        p.pin_toggle(PIN::MASK);
    }

    /// Level the pin is being driven to
    #[inline(always)]
    pub fn is_set_high(&self) -> bool {
        let p = unsafe { PORT::steal() };
        p.port_rd() & PIN::MASK != 0
    }
}

impl<PORT: GpioPeriph, PIN: PinNum, PULL: Pull> Pin<PORT, PIN, Input<PULL>> {
    /// Input level is high
    #[inline(always)]
    pub fn is_high(&self) -> bool {
        let p = unsafe { PORT::steal() };
        p.pin_rd() & PIN::MASK != 0
    }

    /// Input level is low
    #[inline(always)]
    pub fn is_low(&self) -> bool {
        !self.is_high()
    }
}

/// All pins of a port, in the reset state
///
/// Pins that the package does not bond out are still handed out; they behave as unconnected
/// inputs.
#[allow(missing_docs)]
pub struct Parts<PORT: GpioPeriph> {
    pub pin0: Pin<PORT, Pin0, Input<Floating>>,
    pub pin1: Pin<PORT, Pin1, Input<Floating>>,
    pub pin2: Pin<PORT, Pin2, Input<Floating>>,
    pub pin3: Pin<PORT, Pin3, Input<Floating>>,
    pub pin4: Pin<PORT, Pin4, Input<Floating>>,
    pub pin5: Pin<PORT, Pin5, Input<Floating>>,
    pub pin6: Pin<PORT, Pin6, Input<Floating>>,
    pub pin7: Pin<PORT, Pin7, Input<Floating>>,
}

/// Extension trait to split a port handle into pins
pub trait GpioExt: GpioPeriph + Sized {
    /// Split into individual pins
    fn split(self) -> Parts<Self>;
}

impl<PORT: GpioPeriph> GpioExt for PORT {
    #[inline]
    fn split(self) -> Parts<Self> {
        Parts {
            pin0: make_pin!(),
            pin1: make_pin!(),
            pin2: make_pin!(),
            pin3: make_pin!(),
            pin4: make_pin!(),
            pin5: make_pin!(),
            pin6: make_pin!(),
            pin7: make_pin!(),
        }
    }
}

// Mask of WIDTH bits starting at START, rejected at compile time if it leaves the port
const fn field_mask(start: u8, width: u8) -> u8 {
    assert!(width >= 1 && start as u16 + width as u16 <= 8, "bit field does not fit in a port");
    (((1u16 << width) - 1) as u8) << start
}

/// `WIDTH` contiguous output bits of a port starting at bit `START`
pub struct OutputPort<PORT: GpioPeriph, const START: u8, const WIDTH: u8> {
    port: PORT,
}

impl<PORT: GpioPeriph, const START: u8, const WIDTH: u8> OutputPort<PORT, START, WIDTH> {
    /// Bits of the port covered by this field
    pub const MASK: u8 = field_mask(START, WIDTH);

    /// Claim the port and make the field's bits outputs
    #[inline]
    pub fn new(port: PORT) -> Self {
        port.ddr_set(Self::MASK);
        OutputPort { port }
    }

    /// Write `value` to the field, leaving other bits of the port untouched
    #[inline]
    pub fn write(&mut self, value: u8) {
        if Self::MASK == 0xFF {
            self.port.port_wr(value);
        } else {
            let old = self.port.port_rd();
            self.port.port_wr(with_field(old, Self::MASK, value << START));
        }
    }

    /// Input level of the field, right-aligned
    #[inline]
    pub fn read(&self) -> u8 {
        (self.port.pin_rd() & Self::MASK) >> START
    }

    // Port mask of one field bit; bits outside the field map to nothing
    #[inline(always)]
    fn bit_mask(bit: u8) -> u8 {
        1u8.checked_shl(bit as u32 + START as u32).unwrap_or(0) & Self::MASK
    }

    /// Set one bit of the field
    #[inline]
    pub fn set_bit(&mut self, bit: u8) {
        self.port.port_set(Self::bit_mask(bit));
    }

    /// Clear one bit of the field
    #[inline]
    pub fn clear_bit(&mut self, bit: u8) {
        self.port.port_clear(Self::bit_mask(bit));
    }

    /// Write one bit of the field
    #[inline]
    pub fn write_bit(&mut self, bit: u8, high: bool) {
        if high {
            self.set_bit(bit)
        } else {
            self.clear_bit(bit)
        }
    }

    /// Invert one bit of the field
    #[inline]
    pub fn toggle_bit(&mut self, bit: u8) {
        self.port.pin_toggle(Self::bit_mask(bit));
    }

    /// Release the port
    #[inline]
    pub fn free(self) -> PORT {
        self.port
    }
}

/// `WIDTH` contiguous input bits of a port starting at bit `START`
pub struct InputPort<PORT: GpioPeriph, const START: u8, const WIDTH: u8> {
    port: PORT,
}

impl<PORT: GpioPeriph, const START: u8, const WIDTH: u8> InputPort<PORT, START, WIDTH> {
    /// Bits of the port covered by this field
    pub const MASK: u8 = field_mask(START, WIDTH);

    /// Claim the port and make the field's bits inputs, optionally with pull-ups
    #[inline]
    pub fn new(port: PORT, pullup: bool) -> Self {
        port.ddr_clear(Self::MASK);
        port.port_clear(Self::MASK);
        let mut p = InputPort { port };
        if pullup {
            p.enable_pullups();
        }
        p
    }

    /// Input level of the field, right-aligned
    #[inline]
    pub fn read(&self) -> u8 {
        (self.port.pin_rd() & Self::MASK) >> START
    }

    /// Enable the pull-ups of every bit in the field
    #[inline]
    pub fn enable_pullups(&mut self) {
        self.port.port_set(Self::MASK);
    }

    /// Release the port
    #[inline]
    pub fn free(self) -> PORT {
        self.port
    }
}

mod ehal1 {
    use super::*;
    use embedded_hal::digital::{ErrorType, InputPin, OutputPin, StatefulOutputPin};

    impl<PORT: GpioPeriph, PIN: PinNum, MODE: PinMode> ErrorType for Pin<PORT, PIN, MODE> {
        type Error = Infallible;
    }

    impl<PORT: GpioPeriph, PIN: PinNum> OutputPin for Pin<PORT, PIN, Output> {
        #[inline(always)]
        fn set_low(&mut self) -> Result<(), Self::Error> {
            Pin::set_low(self);
            Ok(())
        }

        #[inline(always)]
        fn set_high(&mut self) -> Result<(), Self::Error> {
            Pin::set_high(self);
            Ok(())
        }
    }

    impl<PORT: GpioPeriph, PIN: PinNum> StatefulOutputPin for Pin<PORT, PIN, Output> {
        #[inline(always)]
        fn is_set_high(&mut self) -> Result<bool, Self::Error> {
            Ok(Pin::is_set_high(self))
        }

        #[inline(always)]
        fn is_set_low(&mut self) -> Result<bool, Self::Error> {
            Ok(!Pin::is_set_high(self))
        }

        #[inline(always)]
        fn toggle(&mut self) -> Result<(), Self::Error> {
            Pin::toggle(self);
            Ok(())
        }
    }

    impl<PORT: GpioPeriph, PIN: PinNum, PULL: Pull> InputPin for Pin<PORT, PIN, Input<PULL>> {
        #[inline(always)]
        fn is_high(&mut self) -> Result<bool, Self::Error> {
            Ok(Pin::is_high(self))
        }

        #[inline(always)]
        fn is_low(&mut self) -> Result<bool, Self::Error> {
            Ok(Pin::is_low(self))
        }
    }
}

#[cfg(feature = "embedded-hal-02")]
mod ehal02 {
    use super::*;
    use embedded_hal_02::digital::v2::{InputPin, OutputPin, StatefulOutputPin, ToggleableOutputPin};

    impl<PORT: GpioPeriph, PIN: PinNum> OutputPin for Pin<PORT, PIN, Output> {
        type Error = void::Void;

        #[inline(always)]
        fn set_low(&mut self) -> Result<(), Self::Error> {
            Pin::set_low(self);
            Ok(())
        }

        #[inline(always)]
        fn set_high(&mut self) -> Result<(), Self::Error> {
            Pin::set_high(self);
            Ok(())
        }
    }

    impl<PORT: GpioPeriph, PIN: PinNum> StatefulOutputPin for Pin<PORT, PIN, Output> {
        #[inline(always)]
        fn is_set_high(&self) -> Result<bool, Self::Error> {
            Ok(Pin::is_set_high(self))
        }

        #[inline(always)]
        fn is_set_low(&self) -> Result<bool, Self::Error> {
            Ok(!Pin::is_set_high(self))
        }
    }

    impl<PORT: GpioPeriph, PIN: PinNum> ToggleableOutputPin for Pin<PORT, PIN, Output> {
        type Error = void::Void;

        #[inline(always)]
        fn toggle(&mut self) -> Result<(), Self::Error> {
            Pin::toggle(self);
            Ok(())
        }
    }

    impl<PORT: GpioPeriph, PIN: PinNum, PULL: Pull> InputPin for Pin<PORT, PIN, Input<PULL>> {
        type Error = void::Void;

        #[inline(always)]
        fn is_high(&self) -> Result<bool, Self::Error> {
            Ok(Pin::is_high(self))
        }

        #[inline(always)]
        fn is_low(&self) -> Result<bool, Self::Error> {
            Ok(Pin::is_low(self))
        }
    }
}
