//! Busy-wait delay engine on an 8-bit timer in normal mode.
//!
//! An 8-bit counter overflows every 256 ticks. At CLK/1024 on 8 MHz a tick is
//! 128 µs, so one overflow period is 32.768 ms. A delay of arbitrary length
//! is realised as a number of overflows plus a counter preload that shortens
//! the total by the fractional part; see [`OverflowPlan`].
//!
//! # Cancellation
//!
//! [`DelayTimer::delay`] polls the shutdown flag it was configured with at
//! the top of every overflow wait. Observing the flag Up ends the delay early
//! and silently: the call still returns `Ok(())` and the timer is left
//! stopped, exactly as on normal completion. Only a flag that is already Up
//! on entry is reported, as [`ControlError::Aborted`].
//!
//! # Example
//!
//! ```rust
//! use moving_car::{DelayTimer, StopFlag};
//! use moving_car::hal::MockTimer;
//! use moving_car::traits::{InterruptMode, Prescaler, TimerId};
//!
//! let shutdown = StopFlag::new();
//! let mut timer = DelayTimer::new(MockTimer::new(TimerId::Timer0));
//! timer.configure_normal_mode(InterruptMode::Disabled, &shutdown);
//!
//! timer.delay(100).unwrap();
//!
//! // 100 ms = 3 full overflows plus a partial one
//! assert_eq!(timer.registers().overflows, 4);
//! assert_eq!(timer.registers().prescaler, Prescaler::Stopped);
//! ```

use crate::config::{
    MAX_COUNTS, MAX_TIMER_DELAY_US, MICROS_PER_MILLI, OVERFLOW_PERIOD_US, TICK_TIME_US,
};
use crate::error::ControlError;
use crate::flag::StopFlag;
use crate::overflow::OverflowRegistry;
use crate::traits::{InterruptMode, Prescaler, TimerRegisters};

/// How a delay maps onto timer overflows.
///
/// `overflows` counts every overflow the delay waits for. `preload` is
/// written into the counter before the timer starts, so the first overflow
/// arrives after `256 - preload` ticks and every later one after a full
/// period. The partial period is therefore the first one, not the last.
/// The reconstructed duration is
/// `((256 - preload) + 256 * (overflows - 1)) * tick`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OverflowPlan {
    /// Overflows to wait for, always at least one.
    pub overflows: u16,
    /// Initial counter value.
    pub preload: u8,
}

impl OverflowPlan {
    /// Computes the plan for a delay in milliseconds.
    ///
    /// Fails with [`ControlError::RangeExceeded`] when the request needs more
    /// than 65 535 overflows.
    ///
    /// ```
    /// use moving_car::OverflowPlan;
    ///
    /// // One second: 30 full periods then 133 ticks of remainder
    /// let plan = OverflowPlan::for_millis(1000).unwrap();
    /// assert_eq!(plan.overflows, 31);
    /// assert_eq!(plan.preload, 123);
    /// ```
    pub fn for_millis(ms: u32) -> Result<Self, ControlError> {
        let elapsed_us = ms as u64 * MICROS_PER_MILLI;
        if elapsed_us > MAX_TIMER_DELAY_US {
            return Err(ControlError::RangeExceeded);
        }
        // Bounded by MAX_TIMER_DELAY_US, which fits in u32.
        let elapsed = elapsed_us as u32;
        let period = OVERFLOW_PERIOD_US;

        if elapsed < period {
            // Count only the part of one period the request covers. A zero
            // request still needs one tick to raise the overflow flag.
            let skipped = (period - elapsed).div_ceil(TICK_TIME_US);
            let preload = skipped.min(MAX_COUNTS - 1) as u8;
            return Ok(Self {
                overflows: 1,
                preload,
            });
        }

        if elapsed == period {
            return Ok(Self {
                overflows: 1,
                preload: 0,
            });
        }

        let mut overflows = elapsed.div_ceil(period);
        let remainder = elapsed - period * (overflows - 1);
        let remainder_ticks = (remainder + TICK_TIME_US / 2) / TICK_TIME_US;

        let preload = if remainder_ticks == 0 {
            // Remainder rounds away; the full periods alone are closest.
            overflows -= 1;
            0
        } else {
            (MAX_COUNTS - remainder_ticks.min(MAX_COUNTS)) as u8
        };

        Ok(Self {
            overflows: overflows as u16,
            preload,
        })
    }

    /// Total timer ticks the plan waits for.
    pub fn total_ticks(&self) -> u32 {
        if self.overflows == 0 {
            return 0;
        }
        (MAX_COUNTS - self.preload as u32) + MAX_COUNTS * (self.overflows as u32 - 1)
    }

    /// Reconstructed delay in microseconds.
    pub fn duration_us(&self) -> u64 {
        self.total_ticks() as u64 * TICK_TIME_US as u64
    }
}

/// Blocking delay engine on one 8-bit timer.
///
/// # Type Parameter
///
/// - `R`: the timer register bank ([`TimerRegisters`] trait)
///
/// The shutdown flag is borrowed, never owned: the application keeps the
/// storage and writes it from interrupt context.
pub struct DelayTimer<'a, R: TimerRegisters> {
    regs: R,
    shutdown: Option<&'a StopFlag>,
    interrupt: InterruptMode,
}

impl<'a, R: TimerRegisters> DelayTimer<'a, R> {
    /// Wraps a register bank. The timer must be configured before use.
    pub fn new(regs: R) -> Self {
        Self {
            regs,
            shutdown: None,
            interrupt: InterruptMode::Disabled,
        }
    }

    /// Selects free-running mode, arms or disarms the overflow interrupt and
    /// records the shutdown flag for later polling.
    ///
    /// Raw selectors are validated by `InterruptMode::try_from`, which is
    /// where an invalid selector is reported.
    pub fn configure_normal_mode(&mut self, interrupt: InterruptMode, shutdown: &'a StopFlag) {
        self.regs.select_normal_mode();
        self.regs
            .set_overflow_interrupt(interrupt == InterruptMode::Enabled);
        self.interrupt = interrupt;
        self.shutdown = Some(shutdown);
        log_debug!("{:?} normal mode, interrupt {:?}", self.regs.id(), interrupt);
    }

    /// Blocks for `ms` milliseconds or until the shutdown flag goes Up.
    ///
    /// # Errors
    ///
    /// - [`ControlError::RangeExceeded`]: request longer than the timer can count
    /// - [`ControlError::NotConfigured`]: [`configure_normal_mode`](Self::configure_normal_mode) never ran
    /// - [`ControlError::Aborted`]: shutdown flag already Up on entry
    ///
    /// None of these touch a register. Cancellation while waiting is not an
    /// error.
    pub fn delay(&mut self, ms: u32) -> Result<(), ControlError> {
        let (plan, shutdown) = self.prepare(ms)?;

        self.regs.reset_control();
        self.regs.write_counter(plan.preload);
        self.regs.set_prescaler(Prescaler::Div1024);

        let mut counted: u16 = 0;
        while counted < plan.overflows && !shutdown.is_raised() {
            while !self.regs.overflow_pending() {
                core::hint::spin_loop();
            }
            self.regs.clear_overflow();
            counted += 1;
        }

        self.regs.stop();
        if counted < plan.overflows {
            log_debug!(
                "{:?} delay cancelled after {}/{} overflows",
                self.regs.id(),
                counted,
                plan.overflows
            );
        }
        Ok(())
    }

    /// Starts an interrupt-driven countdown of `ms` milliseconds and returns
    /// immediately.
    ///
    /// The registry is armed with the overflow target; the overflow vector
    /// then drives [`OverflowRegistry::on_overflow`], which stops the timer
    /// and notifies the subscriber when the countdown ends.
    ///
    /// # Errors
    ///
    /// Same preconditions as [`delay`](Self::delay), plus
    /// [`ControlError::NotConfigured`] when the overflow interrupt is not
    /// armed. Nothing is written on error.
    pub fn start_countdown(
        &mut self,
        ms: u32,
        registry: &OverflowRegistry<'_>,
    ) -> Result<OverflowPlan, ControlError> {
        if self.interrupt != InterruptMode::Enabled {
            return Err(ControlError::NotConfigured);
        }
        let (plan, _) = self.prepare(ms)?;

        registry.arm(plan.overflows);
        self.regs.reset_control();
        self.regs.write_counter(plan.preload);
        self.regs.set_prescaler(Prescaler::Div1024);
        Ok(plan)
    }

    /// Halts the timer.
    pub fn stop(&mut self) {
        self.regs.stop();
    }

    /// Returns the configured overflow interrupt mode.
    #[inline]
    pub fn interrupt_mode(&self) -> InterruptMode {
        self.interrupt
    }

    /// Returns the register bank.
    #[inline]
    pub fn registers(&self) -> &R {
        &self.regs
    }

    /// Returns the register bank mutably.
    #[inline]
    pub fn registers_mut(&mut self) -> &mut R {
        &mut self.regs
    }

    /// Checks every precondition before any register is touched.
    fn prepare(&self, ms: u32) -> Result<(OverflowPlan, &'a StopFlag), ControlError> {
        let plan = OverflowPlan::for_millis(ms)?;
        let shutdown = self.shutdown.ok_or(ControlError::NotConfigured)?;
        if shutdown.is_raised() {
            return Err(ControlError::Aborted);
        }
        Ok((plan, shutdown))
    }
}
