//! Error types for the timer, motor and DIO layers.
//!
//! Every fallible operation in the crate returns [`ControlError`]. Errors are
//! plain result codes: nothing here escalates to a panic, and
//! [`ControlError::Aborted`] is ordinary control flow triggered by the stop
//! button rather than a fault.

use core::fmt;

/// Failure reported by a [`DigitalIo`](crate::traits::DigitalIo) implementation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DioError {
    /// Pin number outside `0..=7`.
    InvalidPin,
    /// Port not wired on this board.
    InvalidPort,
    /// Operation not supported by the pin (e.g. input on an output-only pin).
    Unsupported,
    /// The underlying pin driver reported an error.
    Bus,
}

impl fmt::Display for DioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPin => write!(f, "pin number out of range"),
            Self::InvalidPort => write!(f, "port not available"),
            Self::Unsupported => write!(f, "operation not supported by pin"),
            Self::Bus => write!(f, "pin driver error"),
        }
    }
}

/// Error returned by timer, motor and sequencer operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlError {
    /// Bad selector, missing callback, or unknown motor.
    InvalidArgument,
    /// Duty cycle or delay outside the representable bounds.
    RangeExceeded,
    /// Declined or cut short because the shutdown flag was Up.
    Aborted,
    /// Timer used before being configured for the requested operation.
    NotConfigured,
    /// Propagated from the Digital I/O adapter.
    Hardware(DioError),
}

impl ControlError {
    /// Returns true for [`ControlError::Aborted`].
    ///
    /// Callers use this to treat a stop-button cancellation as normal flow.
    ///
    /// ```
    /// use moving_car::ControlError;
    ///
    /// assert!(ControlError::Aborted.is_abort());
    /// assert!(!ControlError::RangeExceeded.is_abort());
    /// ```
    #[inline]
    pub const fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

impl From<DioError> for ControlError {
    fn from(err: DioError) -> Self {
        Self::Hardware(err)
    }
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::RangeExceeded => write!(f, "value outside representable range"),
            Self::Aborted => write!(f, "aborted by shutdown flag"),
            Self::NotConfigured => write!(f, "timer not configured"),
            Self::Hardware(e) => write!(f, "DIO error: {}", e),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DioError {}

#[cfg(feature = "std")]
impl std::error::Error for ControlError {}
