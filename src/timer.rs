//! Timer/counters
//!
//! [`Timer8`] drives the 8-bit timer/counters and [`Timer16`] the 16-bit Timer1. Both expose the
//! counter, the output compare units and the overflow/compare interrupts. The 16-bit timer adds
//! the input capture unit.
//!
//! Either timer can be turned into PWM channels with `into_pwm`; see [`crate::pwm`].

use crate::hw_traits::timer::{
    Timer8Periph, CS_MASK, COMA_SHIFT, COMB_SHIFT, FOCA, FOCB, WGM2, WGM_LOW_MASK,
};
#[cfg(feature = "timer16")]
use crate::hw_traits::timer::{Timer16Periph, COMC_SHIFT, ICES, ICNC, WGM3};
use crate::hw_traits::with_field;
use crate::pwm::PwmParts;
use core::convert::Infallible;

/// Clock source of Timer0 and Timer1 (CSn2:0)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockSource {
    /// Timer stopped
    #[default]
    Stopped = 0,
    /// Core clock
    Div1 = 1,
    /// Core clock / 8
    Div8 = 2,
    /// Core clock / 64
    Div64 = 3,
    /// Core clock / 256
    Div256 = 4,
    /// Core clock / 1024
    Div1024 = 5,
    /// External clock on Tn, falling edge
    ExtFalling = 6,
    /// External clock on Tn, rising edge
    ExtRising = 7,
}

impl From<ClockSource> for u8 {
    #[inline(always)]
    fn from(cs: ClockSource) -> u8 {
        cs as u8
    }
}

/// Clock source of the asynchronous-capable Timer2 (CS22:0)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockSource2 {
    /// Timer stopped
    #[default]
    Stopped = 0,
    /// Core clock
    Div1 = 1,
    /// Core clock / 8
    Div8 = 2,
    /// Core clock / 32
    Div32 = 3,
    /// Core clock / 64
    Div64 = 4,
    /// Core clock / 128
    Div128 = 5,
    /// Core clock / 256
    Div256 = 6,
    /// Core clock / 1024
    Div1024 = 7,
}

impl From<ClockSource2> for u8 {
    #[inline(always)]
    fn from(cs: ClockSource2) -> u8 {
        cs as u8
    }
}

/// Waveform generation modes of the 8-bit timers (WGMn2:0)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Wavegen8 {
    /// Count up to 0xFF and wrap
    #[default]
    Normal = 0,
    /// Phase correct PWM, TOP = 0xFF
    PhaseCorrectPwm = 1,
    /// Clear timer on compare match with OCRnA
    Ctc = 2,
    /// Fast PWM, TOP = 0xFF
    FastPwm = 3,
    /// Phase correct PWM, TOP = OCRnA
    PhaseCorrectPwmOcrA = 5,
    /// Fast PWM, TOP = OCRnA
    FastPwmOcrA = 7,
}

/// Waveform generation modes of the 16-bit timer (WGM13:0)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Wavegen16 {
    /// Count up to 0xFFFF and wrap
    #[default]
    Normal = 0,
    /// Phase correct PWM, 8-bit
    PhaseCorrect8 = 1,
    /// Phase correct PWM, 9-bit
    PhaseCorrect9 = 2,
    /// Phase correct PWM, 10-bit
    PhaseCorrect10 = 3,
    /// Clear timer on compare match with OCR1A
    CtcOcrA = 4,
    /// Fast PWM, 8-bit
    FastPwm8 = 5,
    /// Fast PWM, 9-bit
    FastPwm9 = 6,
    /// Fast PWM, 10-bit
    FastPwm10 = 7,
    /// Phase and frequency correct PWM, TOP = ICR1
    PhaseFreqCorrectIcr = 8,
    /// Phase and frequency correct PWM, TOP = OCR1A
    PhaseFreqCorrectOcrA = 9,
    /// Phase correct PWM, TOP = ICR1
    PhaseCorrectIcr = 10,
    /// Phase correct PWM, TOP = OCR1A
    PhaseCorrectOcrA = 11,
    /// Clear timer on compare match with ICR1
    CtcIcr = 12,
    /// Fast PWM, TOP = ICR1
    FastPwmIcr = 14,
    /// Fast PWM, TOP = OCR1A
    FastPwmOcrA = 15,
}

/// Behaviour of an OCnx pin on compare match
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CompareMode {
    /// Pin works as normal GPIO
    #[default]
    Disconnected = 0,
    /// Toggle on match
    Toggle = 1,
    /// Clear on match (non-inverting PWM)
    Clear = 2,
    /// Set on match (inverting PWM)
    Set = 3,
}

/// Input capture trigger edge
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    /// Falling edge on ICPn
    #[default]
    Falling = 0,
    /// Rising edge on ICPn
    Rising = 1,
}

#[inline(always)]
pub(crate) fn com_field(shift: u8, mode: CompareMode) -> (u8, u8) {
    (0b11 << shift, (mode as u8) << shift)
}

// Modes 5 and 7 count up to OCRnA
pub(crate) fn top8<T: Timer8Periph>(timer: &T) -> u8 {
    if timer.tccrb_rd() & WGM2 != 0 {
        timer.ocra_rd()
    } else {
        u8::MAX
    }
}

#[cfg(feature = "timer16")]
pub(crate) fn top16<T: Timer16Periph>(timer: &T) -> u16 {
    let wgm = (timer.tccra_rd() & WGM_LOW_MASK) | ((timer.tccrb_rd() & (WGM3 | WGM2)) >> 1);
    match wgm {
        1 | 5 => 0x00FF,
        2 | 6 => 0x01FF,
        3 | 7 => 0x03FF,
        8 | 10 | 12 | 14 => timer.icr_rd(),
        4 | 9 | 11 | 15 => timer.ocra_rd(),
        _ => u16::MAX,
    }
}

/// 8-bit timer/counter
pub struct Timer8<T: Timer8Periph> {
    timer: T,
}

impl<T: Timer8Periph> Timer8<T> {
    /// Set the waveform mode and start counting from `clock`
    pub fn new(timer: T, clock: T::ClockSource, wavegen: Wavegen8) -> Self {
        let mut tmr = Timer8 { timer };
        tmr.set_wavegen(wavegen);
        tmr.set_clock(clock);
        tmr
    }

    /// Select the clock; `Stopped` halts the counter
    #[inline]
    pub fn set_clock(&mut self, clock: T::ClockSource) {
        self.timer.tccrb_wr(with_field(self.timer.tccrb_rd(), CS_MASK, clock.into()));
    }

    /// Select the waveform generation mode
    #[inline]
    pub fn set_wavegen(&mut self, mode: Wavegen8) {
        let mode = mode as u8;
        self.timer.tccra_wr(with_field(self.timer.tccra_rd(), WGM_LOW_MASK, mode));
        self.timer.tccrb_wr(with_field(self.timer.tccrb_rd(), WGM2, (mode & 0x04) << 1));
    }

    /// Counter value
    #[inline]
    pub fn read(&self) -> u8 {
        self.timer.tcnt_rd()
    }

    /// Overwrite the counter
    #[inline]
    pub fn write(&mut self, value: u8) {
        self.timer.tcnt_wr(value)
    }

    /// Set what OCnA does on a compare match
    #[inline]
    pub fn set_compare_a_mode(&mut self, mode: CompareMode) {
        let (mask, bits) = com_field(COMA_SHIFT, mode);
        self.timer.tccra_wr(with_field(self.timer.tccra_rd(), mask, bits));
    }

    /// Set what OCnB does on a compare match
    #[inline]
    pub fn set_compare_b_mode(&mut self, mode: CompareMode) {
        let (mask, bits) = com_field(COMB_SHIFT, mode);
        self.timer.tccra_wr(with_field(self.timer.tccra_rd(), mask, bits));
    }

    /// Write output compare register A
    #[inline]
    pub fn write_compare_a(&mut self, value: u8) {
        self.timer.ocra_wr(value)
    }

    /// Read output compare register A
    #[inline]
    pub fn read_compare_a(&self) -> u8 {
        self.timer.ocra_rd()
    }

    /// Write output compare register B
    #[inline]
    pub fn write_compare_b(&mut self, value: u8) {
        self.timer.ocrb_wr(value)
    }

    /// Read output compare register B
    #[inline]
    pub fn read_compare_b(&self) -> u8 {
        self.timer.ocrb_rd()
    }

    /// Force a compare match on OCnA. Only effective in non-PWM modes; raises no interrupt.
    #[inline]
    pub fn force_compare_a(&mut self) {
        self.timer.tccrb_wr(self.timer.tccrb_rd() | FOCA);
    }

    /// Force a compare match on OCnB. Only effective in non-PWM modes; raises no interrupt.
    #[inline]
    pub fn force_compare_b(&mut self) {
        self.timer.tccrb_wr(self.timer.tccrb_rd() | FOCB);
    }

    /// Value the counter wraps at in the current mode
    #[inline]
    pub fn top(&self) -> u8 {
        top8(&self.timer)
    }

    /// Enable the overflow interrupt
    pub fn enable_overflow_int(&mut self) {
        self.timer.timsk_set(T::INT_BITS.overflow);
    }

    /// Disable the overflow interrupt
    pub fn disable_overflow_int(&mut self) {
        self.timer.timsk_clear(T::INT_BITS.overflow);
    }

    /// Whether the counter has overflowed
    pub fn is_overflow(&self) -> bool {
        self.timer.tifr_rd() & T::INT_BITS.overflow != 0
    }

    /// Clear the overflow flag
    pub fn clear_overflow(&mut self) {
        self.timer.tifr_wr(T::INT_BITS.overflow);
    }

    /// Enable the compare match A interrupt
    pub fn enable_compare_a_int(&mut self) {
        self.timer.timsk_set(T::INT_BITS.compare_a);
    }

    /// Disable the compare match A interrupt
    pub fn disable_compare_a_int(&mut self) {
        self.timer.timsk_clear(T::INT_BITS.compare_a);
    }

    /// Whether compare match A has occurred
    pub fn is_compare_a(&self) -> bool {
        self.timer.tifr_rd() & T::INT_BITS.compare_a != 0
    }

    /// Clear the compare match A flag
    pub fn clear_compare_a(&mut self) {
        self.timer.tifr_wr(T::INT_BITS.compare_a);
    }

    /// Enable the compare match B interrupt
    pub fn enable_compare_b_int(&mut self) {
        self.timer.timsk_set(T::INT_BITS.compare_b);
    }

    /// Disable the compare match B interrupt
    pub fn disable_compare_b_int(&mut self) {
        self.timer.timsk_clear(T::INT_BITS.compare_b);
    }

    /// Whether compare match B has occurred
    pub fn is_compare_b(&self) -> bool {
        self.timer.tifr_rd() & T::INT_BITS.compare_b != 0
    }

    /// Clear the compare match B flag
    pub fn clear_compare_b(&mut self) {
        self.timer.tifr_wr(T::INT_BITS.compare_b);
    }

    /// Completes, clearing the flag, once the counter has overflowed
    pub fn wait_overflow(&mut self) -> nb::Result<(), Infallible> {
        if self.is_overflow() {
            self.clear_overflow();
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    /// Switch to a PWM mode and split the compare units into PWM channels
    pub fn into_pwm(mut self, mode: Wavegen8) -> PwmParts<T> {
        self.set_wavegen(mode);
        PwmParts::new()
    }

    /// Stop the counter and release the peripheral
    pub fn free(self) -> T {
        self.timer.tccrb_wr(self.timer.tccrb_rd() & !CS_MASK);
        self.timer
    }
}

/// 16-bit timer/counter
#[cfg(feature = "timer16")]
pub struct Timer16<T: Timer16Periph> {
    timer: T,
}

#[cfg(feature = "timer16")]
impl<T: Timer16Periph> Timer16<T> {
    /// Set the waveform mode and start counting from `clock`
    pub fn new(timer: T, clock: T::ClockSource, wavegen: Wavegen16) -> Self {
        let mut tmr = Timer16 { timer };
        tmr.set_wavegen(wavegen);
        tmr.set_clock(clock);
        tmr
    }

    /// Select the clock; `Stopped` halts the counter
    #[inline]
    pub fn set_clock(&mut self, clock: T::ClockSource) {
        self.timer.tccrb_wr(with_field(self.timer.tccrb_rd(), CS_MASK, clock.into()));
    }

    /// Select the waveform generation mode
    #[inline]
    pub fn set_wavegen(&mut self, mode: Wavegen16) {
        let mode = mode as u8;
        self.timer.tccra_wr(with_field(self.timer.tccra_rd(), WGM_LOW_MASK, mode));
        self.timer.tccrb_wr(with_field(self.timer.tccrb_rd(), WGM3 | WGM2, (mode & 0x0C) << 1));
    }

    /// Counter value
    #[inline]
    pub fn read(&self) -> u16 {
        self.timer.tcnt_rd()
    }

    /// Overwrite the counter
    #[inline]
    pub fn write(&mut self, value: u16) {
        self.timer.tcnt_wr(value)
    }

    /// Set what OCnA does on a compare match
    #[inline]
    pub fn set_compare_a_mode(&mut self, mode: CompareMode) {
        let (mask, bits) = com_field(COMA_SHIFT, mode);
        self.timer.tccra_wr(with_field(self.timer.tccra_rd(), mask, bits));
    }

    /// Set what OCnB does on a compare match
    #[inline]
    pub fn set_compare_b_mode(&mut self, mode: CompareMode) {
        let (mask, bits) = com_field(COMB_SHIFT, mode);
        self.timer.tccra_wr(with_field(self.timer.tccra_rd(), mask, bits));
    }

    /// Set what OCnC does on a compare match. No effect without a compare unit C.
    #[inline]
    pub fn set_compare_c_mode(&mut self, mode: CompareMode) {
        if T::HAS_COMPARE_C {
            let (mask, bits) = com_field(COMC_SHIFT, mode);
            self.timer.tccra_wr(with_field(self.timer.tccra_rd(), mask, bits));
        }
    }

    /// Write output compare register A
    #[inline]
    pub fn write_compare_a(&mut self, value: u16) {
        self.timer.ocra_wr(value)
    }

    /// Read output compare register A
    #[inline]
    pub fn read_compare_a(&self) -> u16 {
        self.timer.ocra_rd()
    }

    /// Write output compare register B
    #[inline]
    pub fn write_compare_b(&mut self, value: u16) {
        self.timer.ocrb_wr(value)
    }

    /// Read output compare register B
    #[inline]
    pub fn read_compare_b(&self) -> u16 {
        self.timer.ocrb_rd()
    }

    /// Write output compare register C, if the timer has one
    #[inline]
    pub fn write_compare_c(&mut self, value: u16) {
        if T::HAS_COMPARE_C {
            self.timer.ocrc_wr(value)
        }
    }

    /// Read output compare register C, or `None` if the timer has no compare unit C
    #[inline]
    pub fn read_compare_c(&self) -> Option<u16> {
        T::HAS_COMPARE_C.then(|| self.timer.ocrc_rd())
    }

    /// Force a compare match on OCnA. Only effective in non-PWM modes; raises no interrupt.
    #[inline]
    pub fn force_compare_a(&mut self) {
        self.timer.tccrc_wr(self.timer.tccrc_rd() | FOCA);
    }

    /// Force a compare match on OCnB. Only effective in non-PWM modes; raises no interrupt.
    #[inline]
    pub fn force_compare_b(&mut self) {
        self.timer.tccrc_wr(self.timer.tccrc_rd() | FOCB);
    }

    /// Value the counter wraps at in the current mode
    #[inline]
    pub fn top(&self) -> u16 {
        top16(&self.timer)
    }

    /// Trigger edge of the input capture unit
    #[inline]
    pub fn set_capture_edge(&mut self, edge: Edge) {
        self.timer.tccrb_wr(with_field(self.timer.tccrb_rd(), ICES, (edge as u8) * ICES));
    }

    /// Filter the capture input over four samples
    #[inline]
    pub fn set_noise_canceler(&mut self, enable: bool) {
        let icnc = if enable { ICNC } else { 0 };
        self.timer.tccrb_wr(with_field(self.timer.tccrb_rd(), ICNC, icnc));
    }

    /// Counter value latched by the last capture event
    #[inline]
    pub fn read_capture(&self) -> u16 {
        self.timer.icr_rd()
    }

    /// Write ICRn, used as TOP by the ICR-based waveform modes
    #[inline]
    pub fn write_capture(&mut self, value: u16) {
        self.timer.icr_wr(value)
    }

    /// Enable the overflow interrupt
    pub fn enable_overflow_int(&mut self) {
        self.timer.timsk_set(T::INT_BITS.overflow);
    }

    /// Disable the overflow interrupt
    pub fn disable_overflow_int(&mut self) {
        self.timer.timsk_clear(T::INT_BITS.overflow);
    }

    /// Whether the counter has overflowed
    pub fn is_overflow(&self) -> bool {
        self.timer.tifr_rd() & T::INT_BITS.overflow != 0
    }

    /// Clear the overflow flag
    pub fn clear_overflow(&mut self) {
        self.timer.tifr_wr(T::INT_BITS.overflow);
    }

    /// Enable the compare match A interrupt
    pub fn enable_compare_a_int(&mut self) {
        self.timer.timsk_set(T::INT_BITS.compare_a);
    }

    /// Disable the compare match A interrupt
    pub fn disable_compare_a_int(&mut self) {
        self.timer.timsk_clear(T::INT_BITS.compare_a);
    }

    /// Whether compare match A has occurred
    pub fn is_compare_a(&self) -> bool {
        self.timer.tifr_rd() & T::INT_BITS.compare_a != 0
    }

    /// Clear the compare match A flag
    pub fn clear_compare_a(&mut self) {
        self.timer.tifr_wr(T::INT_BITS.compare_a);
    }

    /// Enable the compare match B interrupt
    pub fn enable_compare_b_int(&mut self) {
        self.timer.timsk_set(T::INT_BITS.compare_b);
    }

    /// Disable the compare match B interrupt
    pub fn disable_compare_b_int(&mut self) {
        self.timer.timsk_clear(T::INT_BITS.compare_b);
    }

    /// Whether compare match B has occurred
    pub fn is_compare_b(&self) -> bool {
        self.timer.tifr_rd() & T::INT_BITS.compare_b != 0
    }

    /// Clear the compare match B flag
    pub fn clear_compare_b(&mut self) {
        self.timer.tifr_wr(T::INT_BITS.compare_b);
    }

    /// Enable the input capture interrupt
    pub fn enable_capture_int(&mut self) {
        self.timer.timsk_set(T::INT_BITS.capture);
    }

    /// Disable the input capture interrupt
    pub fn disable_capture_int(&mut self) {
        self.timer.timsk_clear(T::INT_BITS.capture);
    }

    /// Whether a capture event has occurred
    pub fn is_capture(&self) -> bool {
        self.timer.tifr_rd() & T::INT_BITS.capture != 0
    }

    /// Clear the input capture flag
    pub fn clear_capture(&mut self) {
        self.timer.tifr_wr(T::INT_BITS.capture);
    }

    /// Completes, clearing the flag, once the counter has overflowed
    pub fn wait_overflow(&mut self) -> nb::Result<(), Infallible> {
        if self.is_overflow() {
            self.clear_overflow();
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    /// Completes with the captured value once a capture event has occurred
    pub fn wait_capture(&mut self) -> nb::Result<u16, Infallible> {
        if self.is_capture() {
            self.clear_capture();
            Ok(self.read_capture())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    /// Switch to a PWM mode and split the compare units into PWM channels
    pub fn into_pwm(mut self, mode: Wavegen16) -> PwmParts<T> {
        self.set_wavegen(mode);
        PwmParts::new()
    }

    /// Stop the counter and release the peripheral
    pub fn free(self) -> T {
        self.timer.tccrb_wr(self.timer.tccrb_rd() & !CS_MASK);
        self.timer
    }
}
