//! Shared stop flag written from interrupt context and polled by blocking loops.
//!
//! A [`StopFlag`] is owned by the application (usually a `static`) and handed
//! by reference to every layer that needs to observe it. Neither the timer
//! nor the motor layer allocates or owns the storage.
//!
//! # Atomicity
//!
//! The flag is a single byte accessed with plain atomic `load`/`store`. It
//! only ever transitions 0 → 1 (stop interrupt) or 1 → 0 (start interrupt or
//! end of a maneuver), and each transition has a single writer, so no
//! read-modify-write is needed. This also holds on 8-bit AVR, which has no
//! compare-and-swap.
//!
//! # Example
//!
//! ```rust
//! use moving_car::{BreakState, StopFlag};
//!
//! static SUDDEN_BREAK: StopFlag = StopFlag::new();
//!
//! assert_eq!(SUDDEN_BREAK.state(), BreakState::Down);
//! SUDDEN_BREAK.raise(); // from the stop-button interrupt
//! assert!(SUDDEN_BREAK.is_raised());
//! SUDDEN_BREAK.lower(); // from the start-button interrupt
//! assert!(!SUDDEN_BREAK.is_raised());
//! ```

use core::sync::atomic::{AtomicU8, Ordering};

use crate::overflow::OverflowListener;

/// State of a stop flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum BreakState {
    /// Operations may run.
    #[default]
    Down = 0,
    /// Abort current and future blocking operations.
    Up = 1,
}

/// Single-byte cancellation flag shared between interrupt handlers and
/// polling loops.
#[derive(Debug, Default)]
pub struct StopFlag {
    state: AtomicU8,
}

impl StopFlag {
    /// Creates a flag in the [`BreakState::Down`] state.
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(BreakState::Down as u8),
        }
    }

    /// Sets the flag to [`BreakState::Up`].
    #[inline]
    pub fn raise(&self) {
        self.state.store(BreakState::Up as u8, Ordering::Release);
    }

    /// Sets the flag to [`BreakState::Down`].
    #[inline]
    pub fn lower(&self) {
        self.state.store(BreakState::Down as u8, Ordering::Release);
    }

    /// Returns true while the flag is Up.
    #[inline]
    pub fn is_raised(&self) -> bool {
        self.state.load(Ordering::Acquire) != BreakState::Down as u8
    }

    /// Returns the current state.
    #[inline]
    pub fn state(&self) -> BreakState {
        if self.is_raised() {
            BreakState::Up
        } else {
            BreakState::Down
        }
    }
}

/// Raising a stop flag is the usual overflow notification: the duty-cycle
/// loop polls the flag and exits.
impl OverflowListener for StopFlag {
    fn on_overflow_complete(&self) {
        self.raise();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_flag_is_down() {
        let flag = StopFlag::new();
        assert_eq!(flag.state(), BreakState::Down);
        assert!(!flag.is_raised());
    }

    #[test]
    fn raise_and_lower() {
        let flag = StopFlag::new();
        flag.raise();
        assert_eq!(flag.state(), BreakState::Up);
        flag.raise();
        assert!(flag.is_raised());
        flag.lower();
        assert_eq!(flag.state(), BreakState::Down);
    }

    #[test]
    fn listener_raises_flag() {
        let flag = StopFlag::new();
        flag.on_overflow_complete();
        assert!(flag.is_raised());
    }

    #[test]
    fn break_state_discriminants() {
        assert_eq!(BreakState::Down as u8, 0);
        assert_eq!(BreakState::Up as u8, 1);
    }
}
