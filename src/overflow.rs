//! Single-slot callback registry driven by the timer overflow interrupt.
//!
//! The registry lets the motor layer learn that an interrupt-driven countdown
//! finished without the timer knowing what the motor layer does with it.
//! [`DelayTimer::start_countdown`](crate::timer::DelayTimer::start_countdown)
//! arms it with an overflow target; the overflow vector calls
//! [`OverflowRegistry::on_overflow`] once per hardware overflow.
//!
//! State lives in `critical_section::Mutex<Cell<_>>` so a `static` registry
//! can be shared between the main loop and the interrupt vector.
//!
//! # Example
//!
//! ```rust
//! use moving_car::{OverflowRegistry, StopFlag};
//! use moving_car::hal::MockTimer;
//! use moving_car::traits::TimerId;
//!
//! let shutdown = StopFlag::new();
//! let pwm_stop = StopFlag::new();
//! let registry = OverflowRegistry::new(&shutdown);
//! registry.set_overflow_callback(Some(&pwm_stop)).unwrap();
//!
//! registry.arm(2);
//! let mut timer2 = MockTimer::new(TimerId::Timer2);
//! assert!(!registry.on_overflow(&mut timer2));
//! assert!(registry.on_overflow(&mut timer2));
//! assert!(pwm_stop.is_raised());
//! ```

use core::cell::Cell;

use critical_section::Mutex;

use crate::error::ControlError;
use crate::flag::StopFlag;
use crate::traits::TimerRegisters;

/// Receiver of overflow-countdown completion.
///
/// Runs in interrupt context: implementations must be short and must not
/// block.
pub trait OverflowListener: Sync {
    /// Called once when the armed overflow count is reached.
    fn on_overflow_complete(&self);
}

/// Overflow interrupt callback slot plus the in-flight countdown counters.
pub struct OverflowRegistry<'a> {
    callback: Mutex<Cell<Option<&'a dyn OverflowListener>>>,
    ticks: Mutex<Cell<u16>>,
    needed: Mutex<Cell<u16>>,
    shutdown: &'a StopFlag,
}

impl<'a> OverflowRegistry<'a> {
    /// Creates an empty, disarmed registry observing `shutdown`.
    pub const fn new(shutdown: &'a StopFlag) -> Self {
        Self {
            callback: Mutex::new(Cell::new(None)),
            ticks: Mutex::new(Cell::new(0)),
            needed: Mutex::new(Cell::new(0)),
            shutdown,
        }
    }

    /// Stores the overflow subscriber, replacing any previous one.
    ///
    /// Returns [`ControlError::InvalidArgument`] for `None`.
    pub fn set_overflow_callback(
        &self,
        callback: Option<&'a dyn OverflowListener>,
    ) -> Result<(), ControlError> {
        let callback = callback.ok_or(ControlError::InvalidArgument)?;
        critical_section::with(|cs| self.callback.borrow(cs).set(Some(callback)));
        Ok(())
    }

    /// Returns true if a subscriber is registered.
    pub fn has_callback(&self) -> bool {
        critical_section::with(|cs| self.callback.borrow(cs).get().is_some())
    }

    /// Sets the overflow target for the next countdown and resets the counter.
    ///
    /// A target of zero disarms the registry.
    pub fn arm(&self, overflows: u16) {
        critical_section::with(|cs| {
            self.ticks.borrow(cs).set(0);
            self.needed.borrow(cs).set(overflows);
        });
    }

    /// Disarms the registry without notifying the subscriber.
    pub fn disarm(&self) {
        self.arm(0);
    }

    /// Returns true while a countdown is in flight.
    pub fn is_armed(&self) -> bool {
        critical_section::with(|cs| self.needed.borrow(cs).get() != 0)
    }

    /// Overflows counted so far in the current countdown.
    pub fn elapsed_overflows(&self) -> u16 {
        critical_section::with(|cs| self.ticks.borrow(cs).get())
    }

    /// Overflow interrupt entry point. Call once per hardware overflow.
    ///
    /// Counts the overflow; when the armed target is reached, or the shutdown
    /// flag is Up, resets the counter, disarms, stops the timer and notifies
    /// the subscriber. Returns true if the countdown finished on this call.
    /// Overflows while disarmed are ignored.
    pub fn on_overflow<R: TimerRegisters>(&self, regs: &mut R) -> bool {
        let finished = critical_section::with(|cs| {
            let needed = self.needed.borrow(cs);
            if needed.get() == 0 {
                return None;
            }

            let ticks = self.ticks.borrow(cs);
            let count = ticks.get().saturating_add(1);
            if count >= needed.get() || self.shutdown.is_raised() {
                ticks.set(0);
                needed.set(0);
                Some(self.callback.borrow(cs).get())
            } else {
                ticks.set(count);
                None
            }
        });

        match finished {
            Some(callback) => {
                regs.stop();
                if let Some(listener) = callback {
                    listener.on_overflow_complete();
                }
                true
            }
            None => false,
        }
    }
}
