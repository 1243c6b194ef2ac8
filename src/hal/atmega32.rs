//! ATmega32 register-level backend.
//!
//! Timer/Counter0 and Timer/Counter2 are both 8-bit timers with the same
//! control register layout but different clock-select encodings. The I/O
//! ports are accessed through their `PORTx`/`DDRx`/`PINx` registers.
//!
//! All addresses are data-space addresses (I/O address + 0x20) from the
//! ATmega32 datasheet, assuming an 8 MHz system clock.
//!
//! # Interrupt vectors
//!
//! The backend does not install vectors. The application binds the
//! `TIMER2_OVF` vector to [`OverflowRegistry::on_overflow`] and the external
//! interrupt vectors to its start/stop callbacks.
//!
//! [`OverflowRegistry::on_overflow`]: crate::overflow::OverflowRegistry::on_overflow

use core::ptr::{read_volatile, write_volatile};

use crate::error::DioError;
use crate::traits::{
    check_pin, DigitalIo, PinDirection, PinLevel, Port, Prescaler, TimerId, TimerRegisters,
};

// Timer/Counter0
const TCCR0: *mut u8 = 0x53 as *mut u8;
const TCNT0: *mut u8 = 0x52 as *mut u8;

// Timer/Counter2
const TCCR2: *mut u8 = 0x45 as *mut u8;
const TCNT2: *mut u8 = 0x44 as *mut u8;

// Shared interrupt mask and flag registers
const TIMSK: *mut u8 = 0x59 as *mut u8;
const TIFR: *mut u8 = 0x58 as *mut u8;

const SREG: *mut u8 = 0x5F as *mut u8;
const SREG_I: u8 = 1 << 7;

// Waveform generation bits, same positions in TCCR0 and TCCR2
const WGM_0: u8 = 1 << 6;
const WGM_1: u8 = 1 << 3;
const CS_MASK: u8 = 0b0000_0111;

// Port registers: (PORTx, DDRx, PINx)
const PORT_REGS: [(*mut u8, *mut u8, *const u8); 4] = [
    (0x3B as *mut u8, 0x3A as *mut u8, 0x39 as *const u8), // A
    (0x38 as *mut u8, 0x37 as *mut u8, 0x36 as *const u8), // B
    (0x35 as *mut u8, 0x34 as *mut u8, 0x33 as *const u8), // C
    (0x32 as *mut u8, 0x31 as *mut u8, 0x30 as *const u8), // D
];

#[inline(always)]
unsafe fn modify(reg: *mut u8, f: impl FnOnce(u8) -> u8) {
    write_volatile(reg, f(read_volatile(reg)));
}

/// Sets the global interrupt enable bit.
///
/// # Safety
///
/// Every enabled interrupt source must have a handler installed.
pub unsafe fn enable_global_interrupts() {
    modify(SREG, |v| v | SREG_I);
}

/// Register bank of one ATmega32 8-bit timer.
#[derive(Debug)]
pub struct Atmega32Timer {
    id: TimerId,
    control: *mut u8,
    counter: *mut u8,
    overflow_bit: u8,
}

impl Atmega32Timer {
    /// Timer/Counter0.
    ///
    /// # Safety
    ///
    /// At most one handle per physical timer may exist.
    pub unsafe fn timer0() -> Self {
        Self {
            id: TimerId::Timer0,
            control: TCCR0,
            counter: TCNT0,
            overflow_bit: 1 << 0,
        }
    }

    /// Timer/Counter2.
    ///
    /// # Safety
    ///
    /// At most one handle per physical timer may exist.
    pub unsafe fn timer2() -> Self {
        Self {
            id: TimerId::Timer2,
            control: TCCR2,
            counter: TCNT2,
            overflow_bit: 1 << 6,
        }
    }

    /// Clock-select bits for a prescaler on this timer.
    fn clock_select(&self, prescaler: Prescaler) -> u8 {
        match (self.id, prescaler) {
            (_, Prescaler::Stopped) => 0b000,
            (_, Prescaler::Div1) => 0b001,
            (_, Prescaler::Div8) => 0b010,
            (TimerId::Timer0, Prescaler::Div64) => 0b011,
            (TimerId::Timer0, Prescaler::Div256) => 0b100,
            (TimerId::Timer0, Prescaler::Div1024) => 0b101,
            (TimerId::Timer2, Prescaler::Div64) => 0b100,
            (TimerId::Timer2, Prescaler::Div256) => 0b110,
            (TimerId::Timer2, Prescaler::Div1024) => 0b111,
        }
    }
}

impl TimerRegisters for Atmega32Timer {
    fn id(&self) -> TimerId {
        self.id
    }

    fn reset_control(&mut self) {
        unsafe { write_volatile(self.control, 0) }
    }

    fn select_normal_mode(&mut self) {
        unsafe { modify(self.control, |v| v & !(WGM_0 | WGM_1)) }
    }

    fn set_overflow_interrupt(&mut self, enabled: bool) {
        let bit = self.overflow_bit;
        critical_section::with(|_| unsafe {
            modify(TIMSK, |v| if enabled { v | bit } else { v & !bit });
        });
    }

    fn write_counter(&mut self, value: u8) {
        unsafe { write_volatile(self.counter, value) }
    }

    fn set_prescaler(&mut self, prescaler: Prescaler) {
        let cs = self.clock_select(prescaler);
        unsafe { modify(self.control, |v| (v & !CS_MASK) | cs) }
    }

    fn overflow_pending(&mut self) -> bool {
        unsafe { read_volatile(TIFR) & self.overflow_bit != 0 }
    }

    fn clear_overflow(&mut self) {
        // Flags clear on writing one; zeros leave the other timers alone.
        unsafe { write_volatile(TIFR, self.overflow_bit) }
    }
}

/// The four ATmega32 I/O ports.
#[derive(Debug)]
pub struct Atmega32Dio {
    _private: (),
}

impl Atmega32Dio {
    /// Takes the I/O ports.
    ///
    /// # Safety
    ///
    /// At most one handle may exist.
    pub unsafe fn new() -> Self {
        Self { _private: () }
    }

    fn regs(port: Port) -> (*mut u8, *mut u8, *const u8) {
        PORT_REGS[port.index()]
    }
}

impl DigitalIo for Atmega32Dio {
    fn pin_init(&mut self, pin: u8, port: Port, direction: PinDirection) -> Result<(), DioError> {
        check_pin(pin)?;
        let (_, ddr, _) = Self::regs(port);
        critical_section::with(|_| unsafe {
            modify(ddr, |v| match direction {
                PinDirection::Output => v | (1 << pin),
                PinDirection::Input => v & !(1 << pin),
            });
        });
        Ok(())
    }

    fn pin_write(&mut self, pin: u8, port: Port, level: PinLevel) -> Result<(), DioError> {
        check_pin(pin)?;
        let (out, _, _) = Self::regs(port);
        critical_section::with(|_| unsafe {
            modify(out, |v| match level {
                PinLevel::High => v | (1 << pin),
                PinLevel::Low => v & !(1 << pin),
            });
        });
        Ok(())
    }

    fn pin_toggle(&mut self, pin: u8, port: Port) -> Result<(), DioError> {
        check_pin(pin)?;
        let (out, _, _) = Self::regs(port);
        critical_section::with(|_| unsafe { modify(out, |v| v ^ (1 << pin)) });
        Ok(())
    }

    fn pin_read(&mut self, pin: u8, port: Port) -> Result<PinLevel, DioError> {
        check_pin(pin)?;
        let (_, _, input) = Self::regs(port);
        let value = unsafe { read_volatile(input) };
        Ok(PinLevel::from(value & (1 << pin) != 0))
    }

    fn port_write(&mut self, port: Port, value: u8, mask: u8) -> Result<(), DioError> {
        let (out, _, _) = Self::regs(port);
        critical_section::with(|_| unsafe { modify(out, |v| (v & !mask) | (value & mask)) });
        Ok(())
    }
}
