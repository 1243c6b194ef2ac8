//! Mock implementations for testing without hardware.
//!
//! This module provides test doubles for the hardware traits, enabling
//! development and testing on desktop without the ATmega32.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockTimer`] | [`TimerRegisters`] | Records register writes, simulates overflow timing |
//! | [`MockDio`] | [`DigitalIo`] | Tracks pin levels, directions and toggles |
//!
//! # Simulated time
//!
//! A running [`MockTimer`] overflows every time it is polled: the first
//! overflow after a counter write takes `256 - counter` ticks, later ones a
//! full period. Hooks registered with [`MockTimer::on_overflow`] run on each
//! simulated overflow, which is how tests inject a stop button press or an
//! overflow interrupt while a blocking call is in progress.
//!
//! # Example
//!
//! ```rust
//! use moving_car::hal::MockTimer;
//! use moving_car::traits::{Prescaler, TimerId, TimerRegisters};
//!
//! let mut timer = MockTimer::new(TimerId::Timer0);
//! timer.write_counter(200);
//! timer.set_prescaler(Prescaler::Div1024);
//!
//! assert!(timer.overflow_pending());
//! assert_eq!(timer.elapsed_ticks, 56);
//! timer.clear_overflow();
//!
//! assert!(timer.overflow_pending());
//! assert_eq!(timer.elapsed_ticks, 56 + 256);
//! ```
//!
//! [`TimerRegisters`]: crate::traits::TimerRegisters
//! [`DigitalIo`]: crate::traits::DigitalIo

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Ref, RefCell, RefMut};
use core::fmt;

use crate::config::MAX_COUNTS;
use crate::error::DioError;
use crate::flag::StopFlag;
use crate::overflow::OverflowRegistry;
use crate::traits::{
    check_pin, DigitalIo, PinDirection, PinLevel, Port, Prescaler, TimerId, TimerRegisters,
};

// ============================================================================
// Timer Mock
// ============================================================================

/// One recorded register operation on a [`MockTimer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerOp {
    /// Control register cleared.
    ResetControl,
    /// Normal mode selected.
    NormalMode,
    /// Overflow interrupt armed (`true`) or disarmed.
    OverflowInterrupt(bool),
    /// Counter register written.
    Counter(u8),
    /// Clock source changed.
    Prescaler(Prescaler),
    /// Overflow flag cleared.
    ClearOverflow,
}

type OverflowHook<'a> = Box<dyn FnMut(u32) + 'a>;

/// Mock 8-bit timer for testing.
///
/// Every register write is appended to [`ops`](Self::ops), so tests can
/// check exact sequences or that nothing was written at all.
pub struct MockTimer<'a> {
    /// Timer identity.
    pub id: TimerId,
    /// Register operations in call order.
    pub ops: Vec<TimerOp>,
    /// Current clock source.
    pub prescaler: Prescaler,
    /// Current counter value.
    pub counter: u8,
    /// Whether normal mode is selected.
    pub normal_mode: bool,
    /// Whether the overflow interrupt is armed.
    pub interrupt_enabled: bool,
    /// Overflows simulated so far.
    pub overflows: u32,
    /// Ticks simulated so far.
    pub elapsed_ticks: u64,
    overflow_flag: bool,
    hooks: Vec<OverflowHook<'a>>,
}

impl<'a> MockTimer<'a> {
    /// Creates a stopped mock timer.
    pub fn new(id: TimerId) -> Self {
        Self {
            id,
            ops: Vec::new(),
            prescaler: Prescaler::Stopped,
            counter: 0,
            normal_mode: false,
            interrupt_enabled: false,
            overflows: 0,
            elapsed_ticks: 0,
            overflow_flag: false,
            hooks: Vec::new(),
        }
    }

    /// Registers a hook run on every simulated overflow.
    ///
    /// The hook receives the number of ticks the overflow took.
    pub fn on_overflow(mut self, hook: impl FnMut(u32) + 'a) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    /// Raises `flag` once `count` more overflows have been simulated.
    pub fn raise_after(self, count: u32, flag: &'a StopFlag) -> Self {
        let mut seen = 0;
        self.on_overflow(move |_| {
            seen += 1;
            if seen == count {
                flag.raise();
            }
        })
    }

    /// Chains a countdown timer to this one.
    ///
    /// Every simulated overflow here advances `countdown` by the same number
    /// of ticks, and each overflow of `countdown` runs the registry's
    /// overflow vector, as the hardware interrupt would.
    pub fn drive_countdown(
        self,
        countdown: &SharedTimer<'a>,
        registry: &'a OverflowRegistry<'a>,
    ) -> Self {
        let countdown = countdown.clone();
        self.on_overflow(move |ticks| {
            countdown.borrow_mut().advance(ticks, |timer| {
                registry.on_overflow(timer);
            });
        })
    }

    /// Advances a running timer by `ticks` in interrupt mode.
    ///
    /// The overflow flag is not latched: `isr` runs once per overflow
    /// instead. Stops early if `isr` halts the timer.
    pub fn advance(&mut self, ticks: u32, mut isr: impl FnMut(&mut Self)) {
        let mut remaining = ticks;
        while remaining > 0 && self.is_running() {
            let to_overflow = MAX_COUNTS - self.counter as u32;
            if remaining < to_overflow {
                self.counter += remaining as u8;
                self.elapsed_ticks += remaining as u64;
                return;
            }
            remaining -= to_overflow;
            self.elapsed_ticks += to_overflow as u64;
            self.counter = 0;
            self.overflows += 1;
            isr(self);
        }
    }

    /// Returns true while a clock source is selected.
    pub fn is_running(&self) -> bool {
        self.prescaler != Prescaler::Stopped
    }

    /// Elapsed simulated time in microseconds.
    pub fn elapsed_us(&self) -> u64 {
        self.elapsed_ticks * crate::config::TICK_TIME_US as u64
    }
}

impl fmt::Debug for MockTimer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockTimer")
            .field("id", &self.id)
            .field("prescaler", &self.prescaler)
            .field("counter", &self.counter)
            .field("overflows", &self.overflows)
            .field("elapsed_ticks", &self.elapsed_ticks)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl TimerRegisters for MockTimer<'_> {
    fn id(&self) -> TimerId {
        self.id
    }

    fn reset_control(&mut self) {
        self.prescaler = Prescaler::Stopped;
        self.normal_mode = true;
        self.ops.push(TimerOp::ResetControl);
    }

    fn select_normal_mode(&mut self) {
        self.normal_mode = true;
        self.ops.push(TimerOp::NormalMode);
    }

    fn set_overflow_interrupt(&mut self, enabled: bool) {
        self.interrupt_enabled = enabled;
        self.ops.push(TimerOp::OverflowInterrupt(enabled));
    }

    fn write_counter(&mut self, value: u8) {
        self.counter = value;
        self.ops.push(TimerOp::Counter(value));
    }

    fn set_prescaler(&mut self, prescaler: Prescaler) {
        self.prescaler = prescaler;
        self.ops.push(TimerOp::Prescaler(prescaler));
    }

    fn overflow_pending(&mut self) -> bool {
        if self.is_running() && !self.overflow_flag {
            let ticks = MAX_COUNTS - self.counter as u32;
            self.counter = 0;
            self.overflows += 1;
            self.elapsed_ticks += ticks as u64;
            self.overflow_flag = true;
            for hook in self.hooks.iter_mut() {
                hook(ticks);
            }
        }
        self.overflow_flag
    }

    fn clear_overflow(&mut self) {
        self.overflow_flag = false;
        self.ops.push(TimerOp::ClearOverflow);
    }
}

/// Shared handle to a [`MockTimer`].
///
/// Lets one component own the timer as a [`TimerRegisters`] bank while a
/// hook on another timer drives it.
pub struct SharedTimer<'a>(Rc<RefCell<MockTimer<'a>>>);

impl<'a> SharedTimer<'a> {
    /// Wraps a mock timer.
    pub fn new(timer: MockTimer<'a>) -> Self {
        Self(Rc::new(RefCell::new(timer)))
    }

    /// Borrows the timer.
    pub fn borrow(&self) -> Ref<'_, MockTimer<'a>> {
        self.0.borrow()
    }

    /// Borrows the timer mutably.
    pub fn borrow_mut(&self) -> RefMut<'_, MockTimer<'a>> {
        self.0.borrow_mut()
    }
}

impl Clone for SharedTimer<'_> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl fmt::Debug for SharedTimer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.borrow().fmt(f)
    }
}

impl TimerRegisters for SharedTimer<'_> {
    fn id(&self) -> TimerId {
        self.borrow().id
    }

    fn reset_control(&mut self) {
        self.borrow_mut().reset_control();
    }

    fn select_normal_mode(&mut self) {
        self.borrow_mut().select_normal_mode();
    }

    fn set_overflow_interrupt(&mut self, enabled: bool) {
        self.borrow_mut().set_overflow_interrupt(enabled);
    }

    fn write_counter(&mut self, value: u8) {
        self.borrow_mut().write_counter(value);
    }

    fn set_prescaler(&mut self, prescaler: Prescaler) {
        self.borrow_mut().set_prescaler(prescaler);
    }

    fn overflow_pending(&mut self) -> bool {
        self.borrow_mut().overflow_pending()
    }

    fn clear_overflow(&mut self) {
        self.borrow_mut().clear_overflow();
    }
}

// ============================================================================
// DIO Mock
// ============================================================================

const PORTS: usize = 4;
const PINS: usize = 8;

/// Mock digital I/O for testing.
///
/// Tracks the level, direction and toggle count of every pin. A single
/// pin can be set up to fail with [`MockDio::fail_on`].
///
/// # Example
///
/// ```rust
/// use moving_car::hal::MockDio;
/// use moving_car::traits::{DigitalIo, PinLevel, Port};
/// use moving_car::DioError;
///
/// let mut dio = MockDio::new().fail_on(3, Port::B, DioError::Bus);
///
/// dio.pin_toggle(0, Port::B).unwrap();
/// assert_eq!(dio.level(0, Port::B), PinLevel::High);
/// assert_eq!(dio.toggle_count(0, Port::B), 1);
///
/// assert_eq!(dio.pin_write(3, Port::B, PinLevel::High), Err(DioError::Bus));
/// ```
#[derive(Debug, Default)]
pub struct MockDio {
    levels: [[PinLevel; PINS]; PORTS],
    directions: [[PinDirection; PINS]; PORTS],
    toggles: [[u32; PINS]; PORTS],
    /// Number of successful `pin_write` calls.
    pub write_count: usize,
    failure: Option<(u8, Port, DioError)>,
}

impl MockDio {
    /// Creates a mock with every pin an input at low level.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every operation on one pin fail with `error`.
    pub fn fail_on(mut self, pin: u8, port: Port, error: DioError) -> Self {
        self.failure = Some((pin, port, error));
        self
    }

    /// Removes an injected failure.
    pub fn clear_failure(&mut self) {
        self.failure = None;
    }

    /// Current level of a pin.
    pub fn level(&self, pin: u8, port: Port) -> PinLevel {
        self.levels[port.index()][pin as usize]
    }

    /// Current direction of a pin.
    pub fn direction(&self, pin: u8, port: Port) -> PinDirection {
        self.directions[port.index()][pin as usize]
    }

    /// Times a pin was toggled.
    pub fn toggle_count(&self, pin: u8, port: Port) -> u32 {
        self.toggles[port.index()][pin as usize]
    }

    /// Toggles across all pins.
    pub fn total_toggles(&self) -> u32 {
        self.toggles.iter().flatten().sum()
    }

    /// Levels of a whole port as a byte.
    pub fn port_byte(&self, port: Port) -> u8 {
        self.levels[port.index()]
            .iter()
            .enumerate()
            .fold(0, |acc, (bit, level)| acc | ((level.is_high() as u8) << bit))
    }

    fn check(&self, pin: u8, port: Port) -> Result<(), DioError> {
        check_pin(pin)?;
        match self.failure {
            Some((p, q, err)) if p == pin && q == port => Err(err),
            _ => Ok(()),
        }
    }
}

impl DigitalIo for MockDio {
    fn pin_init(&mut self, pin: u8, port: Port, direction: PinDirection) -> Result<(), DioError> {
        self.check(pin, port)?;
        self.directions[port.index()][pin as usize] = direction;
        Ok(())
    }

    fn pin_write(&mut self, pin: u8, port: Port, level: PinLevel) -> Result<(), DioError> {
        self.check(pin, port)?;
        self.levels[port.index()][pin as usize] = level;
        self.write_count += 1;
        Ok(())
    }

    fn pin_toggle(&mut self, pin: u8, port: Port) -> Result<(), DioError> {
        self.check(pin, port)?;
        let level = &mut self.levels[port.index()][pin as usize];
        *level = level.toggled();
        self.toggles[port.index()][pin as usize] += 1;
        Ok(())
    }

    fn pin_read(&mut self, pin: u8, port: Port) -> Result<PinLevel, DioError> {
        self.check(pin, port)?;
        Ok(self.level(pin, port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopped_timer_never_overflows() {
        let mut timer = MockTimer::new(TimerId::Timer0);
        assert!(!timer.overflow_pending());
        assert_eq!(timer.overflows, 0);
    }

    #[test]
    fn overflow_flag_latches_until_cleared() {
        let mut timer = MockTimer::new(TimerId::Timer0);
        timer.set_prescaler(Prescaler::Div1024);
        assert!(timer.overflow_pending());
        assert!(timer.overflow_pending());
        assert_eq!(timer.overflows, 1);
        timer.clear_overflow();
        assert!(timer.overflow_pending());
        assert_eq!(timer.overflows, 2);
    }

    #[test]
    fn hooks_see_tick_counts() {
        let mut seen = Vec::new();
        {
            let mut timer = MockTimer::new(TimerId::Timer0).on_overflow(|t| seen.push(t));
            timer.write_counter(100);
            timer.set_prescaler(Prescaler::Div1024);
            timer.overflow_pending();
            timer.clear_overflow();
            timer.overflow_pending();
        }
        assert_eq!(seen, vec![156, 256]);
    }

    #[test]
    fn raise_after_counts_from_install() {
        let flag = StopFlag::new();
        let mut timer = MockTimer::new(TimerId::Timer0).raise_after(2, &flag);
        timer.set_prescaler(Prescaler::Div1024);
        timer.overflow_pending();
        timer.clear_overflow();
        assert!(!flag.is_raised());
        timer.overflow_pending();
        assert!(flag.is_raised());
    }

    #[test]
    fn advance_runs_isr_per_overflow() {
        let mut timer = MockTimer::new(TimerId::Timer2);
        timer.write_counter(250);
        timer.set_prescaler(Prescaler::Div1024);

        let mut calls = 0;
        timer.advance(6 + 256 + 10, |_| calls += 1);
        assert_eq!(calls, 2);
        assert_eq!(timer.counter, 10);
        assert_eq!(timer.elapsed_ticks, 272);
    }

    #[test]
    fn advance_stops_when_isr_halts_timer() {
        let mut timer = MockTimer::new(TimerId::Timer2);
        timer.set_prescaler(Prescaler::Div1024);

        timer.advance(10_000, |t| t.stop());
        assert_eq!(timer.overflows, 1);
        assert!(!timer.is_running());
    }

    #[test]
    fn countdown_follows_driving_timer() {
        let shutdown = StopFlag::new();
        let done = StopFlag::new();
        let registry = OverflowRegistry::new(&shutdown);
        registry.set_overflow_callback(Some(&done)).unwrap();

        let countdown = SharedTimer::new(MockTimer::new(TimerId::Timer2));
        let mut driver = MockTimer::new(TimerId::Timer0).drive_countdown(&countdown, &registry);

        registry.arm(2);
        countdown.borrow_mut().set_prescaler(Prescaler::Div1024);
        driver.set_prescaler(Prescaler::Div1024);

        driver.overflow_pending();
        driver.clear_overflow();
        assert!(!done.is_raised());
        driver.overflow_pending();
        assert!(done.is_raised());
        assert!(!countdown.borrow().is_running());
    }

    #[test]
    fn dio_rejects_out_of_range_pin() {
        let mut dio = MockDio::new();
        assert_eq!(
            dio.pin_init(8, Port::A, PinDirection::Output),
            Err(DioError::InvalidPin)
        );
        assert_eq!(dio.pin_toggle(9, Port::A), Err(DioError::InvalidPin));
    }

    #[test]
    fn dio_port_write_and_byte() {
        let mut dio = MockDio::new();
        dio.port_write(Port::A, 0b1010_0101, 0b0000_1111).unwrap();
        assert_eq!(dio.port_byte(Port::A), 0b0000_0101);
        assert_eq!(dio.write_count, 4);
    }

    #[test]
    fn dio_failure_only_on_chosen_pin() {
        let mut dio = MockDio::new().fail_on(2, Port::C, DioError::Bus);
        assert!(dio.pin_write(2, Port::D, PinLevel::High).is_ok());
        assert_eq!(dio.pin_read(2, Port::C), Err(DioError::Bus));
        dio.clear_failure();
        assert!(dio.pin_read(2, Port::C).is_ok());
    }
}
