//! DC motor control on top of the delay engine.
//!
//! This module provides [`DcMotors`], which owns the H-bridge enable pins and
//! PWM pins of every motor and drives them with a software PWM paced by a
//! [`DelayTimer`].
//!
//! # Overview
//!
//! - [`DcMotors::motor_init`] configures pins, records the shutdown flag and
//!   subscribes the PWM stop flag to the overflow registry
//! - [`DcMotors::set_duty_cycle`] runs the PWM loop **until cancelled**; it
//!   is not a one-shot setter
//! - [`DcMotors::rotate`] pivots by flipping the right motor around a
//!   duty-cycle run
//! - [`DcMotors::stop`] forces every PWM pin low
//!
//! The duty-cycle loop ends when either the PWM stop flag (raised by the
//! overflow registry when a countdown finishes) or the shutdown flag (raised
//! by the stop button) goes Up.
//!
//! # Example
//!
//! ```rust
//! use moving_car::{DcMotors, MotorSide, OverflowRegistry, StopFlag};
//! use moving_car::hal::{MockDio, MockTimer};
//! use moving_car::traits::{PinLevel, Port, TimerId};
//!
//! let shutdown = StopFlag::new();
//! let pwm_stop = StopFlag::new();
//! let registry = OverflowRegistry::new(&shutdown);
//!
//! // Simulate the countdown ending after two pacing overflows
//! let timer = MockTimer::new(TimerId::Timer0).raise_after(2, &pwm_stop);
//! let mut motors = DcMotors::new(MockDio::new(), timer, &pwm_stop);
//! motors.motor_init(&shutdown, &registry).unwrap();
//!
//! motors.set_duty_cycle(40).unwrap();
//!
//! // PWM pins are low and the stop flag is reset for the next run
//! assert_eq!(motors.dio().level(0, Port::C), PinLevel::Low);
//! assert!(!pwm_stop.is_raised());
//! ```

use crate::config::{
    MotorConfig, MotorTable, CAR_MOTORS, MAX_DUTY_CYCLE, PERIOD_TIME, ROTATION_DUTY_CYCLE,
};
use crate::error::ControlError;
use crate::flag::StopFlag;
use crate::overflow::OverflowRegistry;
use crate::timer::DelayTimer;
use crate::traits::{DigitalIo, InterruptMode, PinDirection, PinLevel, TimerRegisters};

/// Logical motor of the car.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotorSide {
    /// Motor 0.
    Right = 0,
    /// Motor 1.
    Left = 1,
}

impl MotorSide {
    /// Position of the motor in the wiring table.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Motion state of the motor pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotorState {
    /// PWM pins low.
    #[default]
    Stopped,
    /// Duty-cycle loop running at the given percentage.
    Driving(u8),
    /// Pivoting with the right motor reversed.
    Rotating,
}

/// Splits a duty cycle into on/off halves of the software PWM period.
///
/// The on time uses integer division, so fractional duty is truncated.
///
/// ```
/// use moving_car::motor::pwm_split;
/// use moving_car::ControlError;
///
/// assert_eq!(pwm_split(35), Ok((3, 7)));
/// assert_eq!(pwm_split(100), Ok((10, 0)));
/// assert_eq!(pwm_split(101), Err(ControlError::RangeExceeded));
/// ```
pub fn pwm_split(percent: u8) -> Result<(u8, u8), ControlError> {
    if percent > MAX_DUTY_CYCLE {
        return Err(ControlError::RangeExceeded);
    }
    let on = percent / (MAX_DUTY_CYCLE / PERIOD_TIME);
    Ok((on, PERIOD_TIME - on))
}

/// Motor pair behind H-bridges, driven by a software PWM.
///
/// # Type Parameters
///
/// - `D`: pin access ([`DigitalIo`] trait)
/// - `R`: register bank of the pacing timer ([`TimerRegisters`] trait)
///
/// The shutdown and PWM stop flags are borrowed from the application.
pub struct DcMotors<'a, D: DigitalIo, R: TimerRegisters> {
    dio: D,
    timer: DelayTimer<'a, R>,
    motors: MotorTable,
    shutdown: Option<&'a StopFlag>,
    pwm_stop: &'a StopFlag,
    state: MotorState,
}

impl<'a, D: DigitalIo, R: TimerRegisters> DcMotors<'a, D, R> {
    /// Creates the car's motor pair from [`CAR_MOTORS`].
    ///
    /// `regs` is the pacing timer; `pwm_stop` is the flag the duty-cycle loop
    /// polls and the overflow registry raises.
    pub fn new(dio: D, regs: R, pwm_stop: &'a StopFlag) -> Self {
        let mut motors = MotorTable::new();
        for config in CAR_MOTORS {
            // CAR_MOTORS is shorter than MAX_MOTORS.
            let _ = motors.push(config);
        }
        Self::from_table(dio, regs, pwm_stop, motors)
    }

    /// Creates a motor set from a custom wiring table.
    ///
    /// The table must cover both [`MotorSide`]s and fit in
    /// [`MAX_MOTORS`](crate::config::MAX_MOTORS); anything else is
    /// [`ControlError::InvalidArgument`].
    pub fn with_motors(
        dio: D,
        regs: R,
        pwm_stop: &'a StopFlag,
        configs: &[MotorConfig],
    ) -> Result<Self, ControlError> {
        if configs.len() < 2 {
            return Err(ControlError::InvalidArgument);
        }
        let motors =
            MotorTable::from_slice(configs).map_err(|_| ControlError::InvalidArgument)?;
        Ok(Self::from_table(dio, regs, pwm_stop, motors))
    }

    fn from_table(dio: D, regs: R, pwm_stop: &'a StopFlag, motors: MotorTable) -> Self {
        Self {
            dio,
            timer: DelayTimer::new(regs),
            motors,
            shutdown: None,
            pwm_stop,
            state: MotorState::Stopped,
        }
    }

    /// Configures every motor pin and subscribes to the overflow registry.
    ///
    /// Enable pins start in the forward pattern (A high, B low) and PWM pins
    /// low. The pacing timer is put into polled normal mode observing
    /// `shutdown`, and the PWM stop flag becomes the registry's callback.
    pub fn motor_init(
        &mut self,
        shutdown: &'a StopFlag,
        registry: &OverflowRegistry<'a>,
    ) -> Result<(), ControlError> {
        for motor in self.motors.iter() {
            for pin in [motor.enable_a, motor.enable_b, motor.pwm] {
                self.dio.pin_init(pin, motor.port, PinDirection::Output)?;
            }
            self.dio.pin_write(motor.enable_a, motor.port, PinLevel::High)?;
            self.dio.pin_write(motor.enable_b, motor.port, PinLevel::Low)?;
            self.dio.pin_write(motor.pwm, motor.port, PinLevel::Low)?;
        }

        self.timer
            .configure_normal_mode(InterruptMode::Disabled, shutdown);
        self.shutdown = Some(shutdown);
        registry.set_overflow_callback(Some(self.pwm_stop))?;
        self.state = MotorState::Stopped;

        log_info!("{} motors initialised", self.motors.len());
        Ok(())
    }

    /// Reverses one motor by toggling both of its enable pins.
    pub fn change_direction(&mut self, side: MotorSide) -> Result<(), ControlError> {
        let motor = self
            .motors
            .get(side.index())
            .copied()
            .ok_or(ControlError::InvalidArgument)?;
        self.dio.pin_toggle(motor.enable_a, motor.port)?;
        self.dio.pin_toggle(motor.enable_b, motor.port)?;
        log_debug!("direction flipped: {:?}", side);
        Ok(())
    }

    /// Runs the software PWM at `percent` until cancelled.
    ///
    /// Each period is [`PERIOD_TIME`] delay units: `percent / 10` with the
    /// PWM pins high, the rest low. The loop ends when the PWM stop flag or
    /// the shutdown flag goes Up. On every exit the PWM pins are driven low
    /// and the PWM stop flag is lowered, so the next call starts clean.
    ///
    /// # Errors
    ///
    /// - [`ControlError::RangeExceeded`]: `percent` above 100, nothing driven
    /// - [`ControlError::NotConfigured`]: [`motor_init`](Self::motor_init) never ran
    /// - [`ControlError::Hardware`]: a pin write failed
    ///
    /// Cancellation is not an error.
    pub fn set_duty_cycle(&mut self, percent: u8) -> Result<(), ControlError> {
        self.run_duty(percent, MotorState::Driving(percent))
    }

    /// Pivots the car: flips the right motor, runs at
    /// [`ROTATION_DUTY_CYCLE`] until cancelled, then flips it back.
    ///
    /// Only the right motor is reversed, and it is toggled twice so the
    /// original polarity is restored on return.
    ///
    /// # Errors
    ///
    /// [`ControlError::Aborted`] if the shutdown flag is already Up, before
    /// any pin is touched. Otherwise as [`set_duty_cycle`](Self::set_duty_cycle).
    pub fn rotate(&mut self) -> Result<(), ControlError> {
        let shutdown = self.shutdown.ok_or(ControlError::NotConfigured)?;
        if shutdown.is_raised() {
            return Err(ControlError::Aborted);
        }

        self.change_direction(MotorSide::Right)?;
        let run = self.run_duty(ROTATION_DUTY_CYCLE, MotorState::Rotating);
        let restore = self.change_direction(MotorSide::Right);
        run.and(restore)
    }

    /// Drives every PWM pin low and lowers the PWM stop flag.
    ///
    /// Never fails: a pin that can not be written is logged and skipped.
    pub fn stop(&mut self) {
        if let Err(err) = self.drive_pwm(PinLevel::Low) {
            log_warn!("stop: {:?}", err);
        }
        self.pwm_stop.lower();
        self.state = MotorState::Stopped;
    }

    /// Raises the PWM stop flag, ending the duty-cycle loop at its next poll.
    #[inline]
    pub fn update_stop_flag(&self) {
        self.pwm_stop.raise();
    }

    /// Current motion state.
    #[inline]
    pub fn state(&self) -> MotorState {
        self.state
    }

    /// Wiring table in use.
    pub fn motors(&self) -> &[MotorConfig] {
        &self.motors
    }

    /// Pin adapter.
    pub fn dio(&self) -> &D {
        &self.dio
    }

    /// Pin adapter, mutably.
    pub fn dio_mut(&mut self) -> &mut D {
        &mut self.dio
    }

    /// Pacing timer.
    pub fn timer(&self) -> &DelayTimer<'a, R> {
        &self.timer
    }

    /// Pacing timer, mutably.
    pub fn timer_mut(&mut self) -> &mut DelayTimer<'a, R> {
        &mut self.timer
    }

    fn cancelled(&self) -> bool {
        self.pwm_stop.is_raised() || self.shutdown.is_some_and(StopFlag::is_raised)
    }

    fn run_duty(&mut self, percent: u8, state: MotorState) -> Result<(), ControlError> {
        let (on, off) = pwm_split(percent)?;
        if self.shutdown.is_none() {
            return Err(ControlError::NotConfigured);
        }

        self.state = state;
        log_debug!("pwm {}%: on {} off {}", percent, on, off);
        let result = self.pwm_loop(on, off);

        let low = self.drive_pwm(PinLevel::Low);
        self.pwm_stop.lower();
        self.state = MotorState::Stopped;
        result.and(low)
    }

    fn pwm_loop(&mut self, on: u8, off: u8) -> Result<(), ControlError> {
        while !self.cancelled() {
            self.drive_pwm(PinLevel::High)?;
            if !self.pace(on)? || self.cancelled() {
                break;
            }
            self.drive_pwm(PinLevel::Low)?;
            if !self.pace(off)? {
                break;
            }
        }
        Ok(())
    }

    /// One half-period delay. Returns false if the delay was declined.
    fn pace(&mut self, units: u8) -> Result<bool, ControlError> {
        match self.timer.delay(units as u32) {
            Ok(()) => Ok(true),
            Err(err) if err.is_abort() => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn drive_pwm(&mut self, level: PinLevel) -> Result<(), ControlError> {
        let mut result = Ok(());
        for motor in self.motors.iter() {
            if let Err(err) = self.dio.pin_write(motor.pwm, motor.port, level) {
                result = Err(err.into());
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MOTOR_LEFT, MOTOR_RIGHT};
    use crate::error::DioError;
    use crate::hal::{MockDio, MockTimer};
    use crate::timer::OverflowPlan;
    use crate::traits::{Port, TimerId};

    fn pwm_pins_low(motors: &DcMotors<'_, MockDio, MockTimer<'_>>) -> bool {
        motors
            .motors()
            .iter()
            .all(|m| motors.dio().level(m.pwm, m.port) == PinLevel::Low)
    }

    #[test]
    fn split_truncates() {
        assert_eq!(pwm_split(0), Ok((0, 10)));
        assert_eq!(pwm_split(35), Ok((3, 7)));
        assert_eq!(pwm_split(99), Ok((9, 1)));
        for percent in 0..=100 {
            let (on, off) = pwm_split(percent).unwrap();
            assert_eq!(on + off, PERIOD_TIME);
            assert_eq!(on, percent / 10);
        }
    }

    #[test]
    fn init_sets_forward_pattern() {
        let shutdown = StopFlag::new();
        let pwm_stop = StopFlag::new();
        let registry = OverflowRegistry::new(&shutdown);
        let mut motors = DcMotors::new(MockDio::new(), MockTimer::new(TimerId::Timer0), &pwm_stop);
        motors.motor_init(&shutdown, &registry).unwrap();

        let dio = motors.dio();
        for m in [MOTOR_RIGHT, MOTOR_LEFT] {
            assert_eq!(dio.direction(m.enable_a, m.port), PinDirection::Output);
            assert_eq!(dio.direction(m.pwm, m.port), PinDirection::Output);
            assert_eq!(dio.level(m.enable_a, m.port), PinLevel::High);
            assert_eq!(dio.level(m.enable_b, m.port), PinLevel::Low);
            assert_eq!(dio.level(m.pwm, m.port), PinLevel::Low);
        }
        assert!(registry.has_callback());
        assert_eq!(motors.state(), MotorState::Stopped);
    }

    #[test]
    fn init_propagates_dio_error() {
        let shutdown = StopFlag::new();
        let pwm_stop = StopFlag::new();
        let registry = OverflowRegistry::new(&shutdown);
        let dio = MockDio::new().fail_on(5, Port::C, DioError::Bus);
        let mut motors = DcMotors::new(dio, MockTimer::new(TimerId::Timer0), &pwm_stop);

        assert_eq!(
            motors.motor_init(&shutdown, &registry),
            Err(ControlError::Hardware(DioError::Bus))
        );
        assert!(!registry.has_callback());
    }

    #[test]
    fn custom_table_must_cover_both_sides() {
        let pwm_stop = StopFlag::new();
        let one = [MOTOR_RIGHT];
        assert!(matches!(
            DcMotors::with_motors(MockDio::new(), MockTimer::new(TimerId::Timer0), &pwm_stop, &one),
            Err(ControlError::InvalidArgument)
        ));

        let five = [MOTOR_RIGHT; 5];
        assert!(matches!(
            DcMotors::with_motors(MockDio::new(), MockTimer::new(TimerId::Timer0), &pwm_stop, &five),
            Err(ControlError::InvalidArgument)
        ));
    }

    #[test]
    fn change_direction_toggles_both_enables() {
        let shutdown = StopFlag::new();
        let pwm_stop = StopFlag::new();
        let registry = OverflowRegistry::new(&shutdown);
        let mut motors = DcMotors::new(MockDio::new(), MockTimer::new(TimerId::Timer0), &pwm_stop);
        motors.motor_init(&shutdown, &registry).unwrap();

        motors.change_direction(MotorSide::Left).unwrap();
        let dio = motors.dio();
        assert_eq!(dio.level(6, Port::C), PinLevel::Low);
        assert_eq!(dio.level(7, Port::C), PinLevel::High);
        assert_eq!(dio.toggle_count(4, Port::C), 0);
    }

    #[test]
    fn duty_above_100_drives_nothing() {
        let shutdown = StopFlag::new();
        let pwm_stop = StopFlag::new();
        let registry = OverflowRegistry::new(&shutdown);
        let mut motors = DcMotors::new(MockDio::new(), MockTimer::new(TimerId::Timer0), &pwm_stop);
        motors.motor_init(&shutdown, &registry).unwrap();
        let writes = motors.dio().write_count;

        assert_eq!(motors.set_duty_cycle(101), Err(ControlError::RangeExceeded));
        assert_eq!(motors.dio().write_count, writes);
        assert_eq!(motors.timer().registers().overflows, 0);
    }

    #[test]
    fn duty_before_init_is_not_configured() {
        let pwm_stop = StopFlag::new();
        let mut motors = DcMotors::new(MockDio::new(), MockTimer::new(TimerId::Timer0), &pwm_stop);
        assert_eq!(motors.set_duty_cycle(50), Err(ControlError::NotConfigured));
        assert_eq!(motors.rotate(), Err(ControlError::NotConfigured));
    }

    #[test]
    fn duty_period_matches_split() {
        let shutdown = StopFlag::new();
        let pwm_stop = StopFlag::new();
        let registry = OverflowRegistry::new(&shutdown);
        // One on-half and one off-half, then the countdown ends
        let timer = MockTimer::new(TimerId::Timer0).raise_after(2, &pwm_stop);
        let mut motors = DcMotors::new(MockDio::new(), timer, &pwm_stop);
        motors.motor_init(&shutdown, &registry).unwrap();

        motors.set_duty_cycle(30).unwrap();

        let expected = OverflowPlan::for_millis(3).unwrap().total_ticks()
            + OverflowPlan::for_millis(7).unwrap().total_ticks();
        assert_eq!(motors.timer().registers().elapsed_ticks, expected as u64);
        assert!(pwm_pins_low(&motors));
        assert!(!pwm_stop.is_raised());
        assert_eq!(motors.state(), MotorState::Stopped);
    }

    #[test]
    fn pwm_stop_on_entry_returns_clean() {
        let shutdown = StopFlag::new();
        let pwm_stop = StopFlag::new();
        let registry = OverflowRegistry::new(&shutdown);
        let mut motors = DcMotors::new(MockDio::new(), MockTimer::new(TimerId::Timer0), &pwm_stop);
        motors.motor_init(&shutdown, &registry).unwrap();

        motors.update_stop_flag();
        assert_eq!(motors.set_duty_cycle(80), Ok(()));
        assert_eq!(motors.timer().registers().overflows, 0);
        assert!(!pwm_stop.is_raised());
    }

    #[test]
    fn shutdown_mid_period_leaves_pins_low() {
        let shutdown = StopFlag::new();
        let pwm_stop = StopFlag::new();
        let registry = OverflowRegistry::new(&shutdown);
        let timer = MockTimer::new(TimerId::Timer0).raise_after(5, &shutdown);
        let mut motors = DcMotors::new(MockDio::new(), timer, &pwm_stop);
        motors.motor_init(&shutdown, &registry).unwrap();

        assert_eq!(motors.set_duty_cycle(70), Ok(()));
        // Loop exits at the first poll after the flag went Up
        assert_eq!(motors.timer().registers().overflows, 5);
        assert!(pwm_pins_low(&motors));
        assert!(shutdown.is_raised());
    }

    #[test]
    fn rotate_flips_right_motor_twice() {
        let shutdown = StopFlag::new();
        let pwm_stop = StopFlag::new();
        let registry = OverflowRegistry::new(&shutdown);
        let timer = MockTimer::new(TimerId::Timer0).raise_after(2, &pwm_stop);
        let mut motors = DcMotors::new(MockDio::new(), timer, &pwm_stop);
        motors.motor_init(&shutdown, &registry).unwrap();

        motors.rotate().unwrap();

        let dio = motors.dio();
        assert_eq!(dio.toggle_count(4, Port::C), 2);
        assert_eq!(dio.toggle_count(5, Port::C), 2);
        assert_eq!(dio.toggle_count(6, Port::C), 0);
        assert_eq!(dio.level(4, Port::C), PinLevel::High);
        assert_eq!(dio.level(5, Port::C), PinLevel::Low);
    }

    #[test]
    fn rotate_during_shutdown_is_aborted() {
        let shutdown = StopFlag::new();
        let pwm_stop = StopFlag::new();
        let registry = OverflowRegistry::new(&shutdown);
        let mut motors = DcMotors::new(MockDio::new(), MockTimer::new(TimerId::Timer0), &pwm_stop);
        motors.motor_init(&shutdown, &registry).unwrap();

        shutdown.raise();
        assert_eq!(motors.rotate(), Err(ControlError::Aborted));
        assert_eq!(motors.dio().total_toggles(), 0);
    }

    #[test]
    fn stop_is_idempotent() {
        let shutdown = StopFlag::new();
        let pwm_stop = StopFlag::new();
        let registry = OverflowRegistry::new(&shutdown);
        let mut motors = DcMotors::new(MockDio::new(), MockTimer::new(TimerId::Timer0), &pwm_stop);
        motors.motor_init(&shutdown, &registry).unwrap();

        motors.update_stop_flag();
        motors.stop();
        let first = motors.dio().port_byte(Port::C);
        motors.stop();

        assert_eq!(motors.dio().port_byte(Port::C), first);
        assert!(pwm_pins_low(&motors));
        assert!(!pwm_stop.is_raised());
    }

    #[test]
    fn stop_survives_failing_pin() {
        let pwm_stop = StopFlag::new();
        let dio = MockDio::new().fail_on(0, Port::C, DioError::Bus);
        let mut motors = DcMotors::new(dio, MockTimer::new(TimerId::Timer0), &pwm_stop);
        pwm_stop.raise();

        motors.stop();
        assert!(!pwm_stop.is_raised());
    }
}
