//! Hardware abstraction traits for 8-bit timers and digital I/O.
//!
//! This module defines the register-level interfaces the delay engine and
//! motor layer are written against, so the same control code runs on the
//! ATmega32 and on desktop mocks.
//!
//! # Key Traits
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`TimerRegisters`] | Control, counter and overflow flag of one 8-bit timer |
//! | [`DigitalIo`] | Pin/port init, read, write, toggle |
//!
//! # Implementation
//!
//! For testing and desktop development, use the mock implementations
//! from [`crate::hal::mock`]. For the real board, use `hal::atmega32`
//! (requires the `atmega32` feature).
//!
//! # Example
//!
//! ```rust
//! use moving_car::traits::{DigitalIo, PinDirection, PinLevel, Port};
//! use moving_car::hal::MockDio;
//!
//! let mut dio = MockDio::new();
//! dio.pin_init(4, Port::C, PinDirection::Output).unwrap();
//! dio.pin_write(4, Port::C, PinLevel::High).unwrap();
//! assert_eq!(dio.level(4, Port::C), PinLevel::High);
//!
//! // Pins are validated against the 8-bit port width
//! assert!(dio.pin_write(8, Port::C, PinLevel::High).is_err());
//! ```

use crate::error::{ControlError, DioError};

/// Highest valid pin number on an 8-bit port.
pub const MAX_PIN: u8 = 7;

/// Which physical timer a register bank drives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerId {
    /// 8-bit Timer/Counter0, used for blocking delays.
    Timer0,
    /// 8-bit Timer/Counter2, used for interrupt-driven countdowns.
    Timer2,
}

/// Clock source selection for an 8-bit timer.
///
/// [`Stopped`](Self::Stopped) removes the clock source; the counter holds
/// its value until a prescaler is set again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Prescaler {
    /// No clock source (timer stopped).
    #[default]
    Stopped,
    /// CLK/1.
    Div1,
    /// CLK/8.
    Div8,
    /// CLK/64.
    Div64,
    /// CLK/256.
    Div256,
    /// CLK/1024, the only prescaler used for delays.
    Div1024,
}

/// Overflow interrupt selector for normal-mode configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterruptMode {
    /// Arm the overflow interrupt.
    Enabled,
    /// Poll the overflow flag only.
    Disabled,
}

impl TryFrom<u8> for InterruptMode {
    type Error = ControlError;

    /// Converts a raw selector (`0` = enabled, `1` = disabled).
    ///
    /// ```
    /// use moving_car::traits::InterruptMode;
    /// use moving_car::ControlError;
    ///
    /// assert_eq!(InterruptMode::try_from(0), Ok(InterruptMode::Enabled));
    /// assert_eq!(InterruptMode::try_from(1), Ok(InterruptMode::Disabled));
    /// assert_eq!(InterruptMode::try_from(7), Err(ControlError::InvalidArgument));
    /// ```
    fn try_from(raw: u8) -> Result<Self, ControlError> {
        match raw {
            0 => Ok(InterruptMode::Enabled),
            1 => Ok(InterruptMode::Disabled),
            _ => Err(ControlError::InvalidArgument),
        }
    }
}

/// Register bank of one 8-bit timer/counter.
///
/// All methods are infallible: they map one-to-one onto register writes.
/// `overflow_pending` takes `&mut self` so simulated implementations can
/// advance their clock when polled.
///
/// # Implementation Notes
///
/// - `reset_control` clears the whole control register, which also selects
///   normal mode and removes the clock source
/// - `clear_overflow` must only clear the overflow flag of this timer
pub trait TimerRegisters {
    /// Identity of the physical timer.
    fn id(&self) -> TimerId;

    /// Writes the control register to its neutral value.
    fn reset_control(&mut self);

    /// Selects free-running counting with no waveform generation.
    fn select_normal_mode(&mut self);

    /// Arms or disarms the overflow interrupt.
    fn set_overflow_interrupt(&mut self, enabled: bool);

    /// Writes the counter register.
    fn write_counter(&mut self, value: u8);

    /// Sets the clock source; [`Prescaler::Stopped`] halts the timer.
    fn set_prescaler(&mut self, prescaler: Prescaler);

    /// Returns true if the overflow flag bit is set.
    fn overflow_pending(&mut self) -> bool;

    /// Clears the overflow flag bit.
    fn clear_overflow(&mut self);

    /// Convenience method to halt the timer.
    fn stop(&mut self) {
        self.set_prescaler(Prescaler::Stopped);
    }
}

/// I/O port of the microcontroller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Port {
    /// PORTA.
    A,
    /// PORTB.
    B,
    /// PORTC.
    C,
    /// PORTD.
    D,
}

impl Port {
    /// All ports in register order.
    pub const ALL: [Port; 4] = [Port::A, Port::B, Port::C, Port::D];

    /// Zero-based index of the port.
    #[inline]
    pub const fn index(&self) -> usize {
        match self {
            Port::A => 0,
            Port::B => 1,
            Port::C => 2,
            Port::D => 3,
        }
    }
}

/// Data direction of a pin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinDirection {
    /// High-impedance input (reset state).
    #[default]
    Input,
    /// Push-pull output.
    Output,
}

/// Logic level of a pin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinLevel {
    /// Logic 0.
    #[default]
    Low,
    /// Logic 1.
    High,
}

impl PinLevel {
    /// Returns the opposite level.
    #[inline]
    pub const fn toggled(self) -> Self {
        match self {
            PinLevel::Low => PinLevel::High,
            PinLevel::High => PinLevel::Low,
        }
    }

    /// Returns true for [`PinLevel::High`].
    #[inline]
    pub const fn is_high(self) -> bool {
        matches!(self, PinLevel::High)
    }
}

impl From<bool> for PinLevel {
    fn from(high: bool) -> Self {
        if high {
            PinLevel::High
        } else {
            PinLevel::Low
        }
    }
}

/// Validates a pin number against the 8-bit port width.
#[inline]
pub fn check_pin(pin: u8) -> Result<(), DioError> {
    if pin > MAX_PIN {
        Err(DioError::InvalidPin)
    } else {
        Ok(())
    }
}

/// Digital I/O adapter contract.
///
/// Implement this trait for your GPIO hardware. Pin numbers are validated
/// against [`MAX_PIN`]; implementations return [`DioError::InvalidPin`]
/// rather than touching a register for out-of-range pins.
pub trait DigitalIo {
    /// Sets the data direction of one pin.
    fn pin_init(&mut self, pin: u8, port: Port, direction: PinDirection) -> Result<(), DioError>;

    /// Drives one output pin.
    fn pin_write(&mut self, pin: u8, port: Port, level: PinLevel) -> Result<(), DioError>;

    /// Inverts one output pin.
    fn pin_toggle(&mut self, pin: u8, port: Port) -> Result<(), DioError>;

    /// Reads one pin.
    fn pin_read(&mut self, pin: u8, port: Port) -> Result<PinLevel, DioError>;

    /// Writes the bits of `value` selected by `mask`, leaving the rest.
    ///
    /// Default implementation writes each masked pin individually.
    fn port_write(&mut self, port: Port, value: u8, mask: u8) -> Result<(), DioError> {
        for pin in 0..=MAX_PIN {
            if mask & (1 << pin) != 0 {
                self.pin_write(pin, port, PinLevel::from(value & (1 << pin) != 0))?;
            }
        }
        Ok(())
    }
}
