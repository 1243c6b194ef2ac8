//! Digital I/O on top of `embedded-hal` 1.0 output pins.
//!
//! [`PinBank`] maps `(pin, port)` pairs onto HAL pin drivers so the motor
//! layer can run on any board with an `embedded-hal` implementation. The
//! bank only holds output pins: the motor layer never configures inputs.
//!
//! # Example
//!
//! ```ignore
//! use moving_car::hal::PinBank;
//! use moving_car::traits::Port;
//!
//! let mut bank: PinBank<_, 6> = PinBank::new();
//! bank.add(4, Port::C, pins.d4.into_output())?;
//! bank.add(5, Port::C, pins.d5.into_output())?;
//! bank.add(0, Port::C, pins.d6.into_output())?;
//! ```

use embedded_hal::digital::StatefulOutputPin;
use heapless::Vec as HVec;

use crate::error::DioError;
use crate::traits::{check_pin, DigitalIo, PinDirection, PinLevel, Port};

/// Fixed-capacity table of output pins addressed by `(pin, port)`.
pub struct PinBank<P, const N: usize> {
    pins: HVec<(u8, Port, P), N>,
}

impl<P: StatefulOutputPin, const N: usize> PinBank<P, N> {
    /// Creates an empty bank.
    pub const fn new() -> Self {
        Self { pins: HVec::new() }
    }

    /// Binds a HAL pin to `(pin, port)`.
    ///
    /// Fails with [`DioError::InvalidPin`] for an out-of-range pin number
    /// and [`DioError::Unsupported`] when the bank is full or the pair is
    /// already bound.
    pub fn add(&mut self, pin: u8, port: Port, driver: P) -> Result<(), DioError> {
        check_pin(pin)?;
        if self.pins.iter().any(|(p, q, _)| *p == pin && *q == port) {
            return Err(DioError::Unsupported);
        }
        self.pins
            .push((pin, port, driver))
            .map_err(|_| DioError::Unsupported)
    }

    /// Number of bound pins.
    pub fn len(&self) -> usize {
        self.pins.len()
    }

    /// Returns true if no pin is bound.
    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    fn driver(&mut self, pin: u8, port: Port) -> Result<&mut P, DioError> {
        check_pin(pin)?;
        self.pins
            .iter_mut()
            .find(|(p, q, _)| *p == pin && *q == port)
            .map(|(_, _, driver)| driver)
            .ok_or(DioError::InvalidPort)
    }
}

impl<P: StatefulOutputPin, const N: usize> Default for PinBank<P, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: StatefulOutputPin, const N: usize> DigitalIo for PinBank<P, N> {
    fn pin_init(&mut self, pin: u8, port: Port, direction: PinDirection) -> Result<(), DioError> {
        self.driver(pin, port)?;
        match direction {
            PinDirection::Output => Ok(()),
            PinDirection::Input => Err(DioError::Unsupported),
        }
    }

    fn pin_write(&mut self, pin: u8, port: Port, level: PinLevel) -> Result<(), DioError> {
        let driver = self.driver(pin, port)?;
        match level {
            PinLevel::High => driver.set_high(),
            PinLevel::Low => driver.set_low(),
        }
        .map_err(|_| DioError::Bus)
    }

    fn pin_toggle(&mut self, pin: u8, port: Port) -> Result<(), DioError> {
        self.driver(pin, port)?.toggle().map_err(|_| DioError::Bus)
    }

    fn pin_read(&mut self, pin: u8, port: Port) -> Result<PinLevel, DioError> {
        self.driver(pin, port)?
            .is_set_high()
            .map(PinLevel::from)
            .map_err(|_| DioError::Bus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::digital::{ErrorType, OutputPin};

    #[derive(Default)]
    struct FakePin {
        high: bool,
    }

    impl ErrorType for FakePin {
        type Error = Infallible;
    }

    impl OutputPin for FakePin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.high = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.high = true;
            Ok(())
        }
    }

    impl StatefulOutputPin for FakePin {
        fn is_set_high(&mut self) -> Result<bool, Infallible> {
            Ok(self.high)
        }

        fn is_set_low(&mut self) -> Result<bool, Infallible> {
            Ok(!self.high)
        }
    }

    #[test]
    fn write_toggle_read() {
        let mut bank: PinBank<FakePin, 2> = PinBank::new();
        bank.add(4, Port::C, FakePin::default()).unwrap();

        bank.pin_write(4, Port::C, PinLevel::High).unwrap();
        assert_eq!(bank.pin_read(4, Port::C), Ok(PinLevel::High));
        bank.pin_toggle(4, Port::C).unwrap();
        assert_eq!(bank.pin_read(4, Port::C), Ok(PinLevel::Low));
    }

    #[test]
    fn unbound_and_duplicate_pins() {
        let mut bank: PinBank<FakePin, 1> = PinBank::new();
        bank.add(0, Port::C, FakePin::default()).unwrap();

        assert_eq!(
            bank.add(0, Port::C, FakePin::default()),
            Err(DioError::Unsupported)
        );
        assert_eq!(
            bank.pin_write(1, Port::C, PinLevel::High),
            Err(DioError::InvalidPort)
        );
        assert_eq!(bank.pin_toggle(8, Port::C), Err(DioError::InvalidPin));
    }

    #[test]
    fn inputs_are_unsupported() {
        let mut bank: PinBank<FakePin, 1> = PinBank::new();
        bank.add(2, Port::D, FakePin::default()).unwrap();
        assert_eq!(
            bank.pin_init(2, Port::D, PinDirection::Input),
            Err(DioError::Unsupported)
        );
        assert!(bank.pin_init(2, Port::D, PinDirection::Output).is_ok());
    }
}
