//! Rectangle-path mode machine.
//!
//! The car loops through Start → MoveLongSide → Rotate90 → MoveShortSide →
//! Rotate90 → MoveLongSide → … until the stop button forces
//! [`AppMode::Stop`]. Two button interrupts drive [`CarSignals`]; the main
//! loop calls [`Sequencer::step`] forever.
//!
//! # Timers
//!
//! Timer 0 paces the software PWM and the standstill pauses (blocking
//! delays). Timer 2 counts down each drive or pivot with its overflow
//! interrupt; the [`OverflowRegistry`] raises the PWM stop flag when the
//! countdown ends, which releases the blocking duty-cycle loop.
//!
//! # Example
//!
//! ```rust
//! use moving_car::{AppMode, CarSignals, OverflowRegistry, Sequencer};
//! use moving_car::config::{DriveLeg, ManeuverConfig};
//! use moving_car::hal::{MockDio, MockTimer, SharedTimer};
//! use moving_car::traits::TimerId;
//!
//! let signals = CarSignals::new();
//! let registry = OverflowRegistry::new(signals.sudden_break());
//! let timer2 = SharedTimer::new(MockTimer::new(TimerId::Timer2));
//! let timer0 = MockTimer::new(TimerId::Timer0).drive_countdown(&timer2, &registry);
//!
//! let config = ManeuverConfig::default()
//!     .with_starting_delay_ms(20)
//!     .with_long_side(DriveLeg::new(100, 50));
//! let mut car = Sequencer::new(MockDio::new(), timer0, timer2.clone(), &signals, &registry)
//!     .with_config(config);
//! car.init().unwrap();
//!
//! assert_eq!(car.step(), Ok(AppMode::Stop));
//!
//! signals.start_car(); // start button interrupt
//! assert_eq!(car.step(), Ok(AppMode::MoveLongSide));
//! assert_eq!(car.step(), Ok(AppMode::Rotate90));
//! ```

use core::sync::atomic::{AtomicU8, Ordering};

use crate::config::{
    DriveLeg, ManeuverConfig, LED_LONG_SIDE, LED_ROTATE, LED_SHORT_SIDE, LED_STOP,
    STATUS_LED_MASK, STATUS_LED_PORT,
};
use crate::error::ControlError;
use crate::flag::StopFlag;
use crate::motor::DcMotors;
use crate::overflow::OverflowRegistry;
use crate::timer::DelayTimer;
use crate::traits::{DigitalIo, InterruptMode, PinDirection, TimerRegisters};

/// Application mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum AppMode {
    /// Motors stopped, waiting for the start button.
    #[default]
    Stop = 0,
    /// Start pressed; waiting out the starting delay.
    Start = 1,
    /// Driving the long side of the rectangle.
    MoveLongSide = 2,
    /// Pivoting 90 degrees.
    Rotate90 = 3,
    /// Driving the short side of the rectangle.
    MoveShortSide = 4,
}

impl AppMode {
    /// Decodes a stored mode. Unknown values map to [`AppMode::Stop`].
    pub const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => AppMode::Start,
            2 => AppMode::MoveLongSide,
            3 => AppMode::Rotate90,
            4 => AppMode::MoveShortSide,
            _ => AppMode::Stop,
        }
    }

    /// Status LED lit in this mode, if any.
    pub const fn status_led(self) -> Option<u8> {
        match self {
            AppMode::Stop => Some(LED_STOP),
            AppMode::Start => None,
            AppMode::MoveLongSide => Some(LED_LONG_SIDE),
            AppMode::Rotate90 => Some(LED_ROTATE),
            AppMode::MoveShortSide => Some(LED_SHORT_SIDE),
        }
    }
}

/// Which side of the rectangle was driven last.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Leg {
    /// Long side.
    Long,
    /// Short side.
    Short,
}

/// State shared between the button interrupts and the main loop.
///
/// Meant to live in a `static`:
///
/// ```rust
/// use moving_car::{AppMode, CarSignals};
///
/// static SIGNALS: CarSignals = CarSignals::new();
///
/// SIGNALS.start_car();
/// assert_eq!(SIGNALS.mode(), AppMode::Start);
/// SIGNALS.stop_car();
/// assert!(SIGNALS.sudden_break().is_raised());
/// ```
#[derive(Debug, Default)]
pub struct CarSignals {
    sudden_break: StopFlag,
    pwm_stop: StopFlag,
    mode: AtomicU8,
}

impl CarSignals {
    /// Creates signals in [`AppMode::Stop`] with both flags Down.
    pub const fn new() -> Self {
        Self {
            sudden_break: StopFlag::new(),
            pwm_stop: StopFlag::new(),
            mode: AtomicU8::new(AppMode::Stop as u8),
        }
    }

    /// Start button callback. Ignored unless the car is stopped.
    pub fn start_car(&self) {
        critical_section::with(|_| {
            if self.mode() != AppMode::Stop {
                return;
            }
            self.sudden_break.lower();
            self.set_mode(AppMode::Start);
        });
    }

    /// Stop button callback. Raises the sudden-break flag and forces
    /// [`AppMode::Stop`].
    pub fn stop_car(&self) {
        self.sudden_break.raise();
        self.set_mode(AppMode::Stop);
    }

    /// Current mode.
    pub fn mode(&self) -> AppMode {
        AppMode::from_u8(self.mode.load(Ordering::Acquire))
    }

    /// Shutdown flag observed by every blocking operation.
    pub fn sudden_break(&self) -> &StopFlag {
        &self.sudden_break
    }

    /// Flag that ends the duty-cycle loop.
    pub fn pwm_stop(&self) -> &StopFlag {
        &self.pwm_stop
    }

    /// Moves to `next` unless a stop arrived in the meantime.
    fn advance(&self, next: AppMode) -> bool {
        critical_section::with(|_| {
            if self.mode() == AppMode::Stop {
                return false;
            }
            self.set_mode(next);
            true
        })
    }

    fn set_mode(&self, mode: AppMode) {
        self.mode.store(mode as u8, Ordering::Release);
    }
}

/// Main-loop driver of the rectangle path.
///
/// # Type Parameters
///
/// - `D`: pin access for motors and status LEDs
/// - `P`: pacing timer (timer 0), polled
/// - `C`: countdown timer (timer 2), interrupt-driven
pub struct Sequencer<'a, D: DigitalIo, P: TimerRegisters, C: TimerRegisters> {
    motors: DcMotors<'a, D, P>,
    countdown: DelayTimer<'a, C>,
    registry: &'a OverflowRegistry<'a>,
    signals: &'a CarSignals,
    config: ManeuverConfig,
    leg: Leg,
}

impl<'a, D: DigitalIo, P: TimerRegisters, C: TimerRegisters> Sequencer<'a, D, P, C> {
    /// Creates a sequencer with the default [`ManeuverConfig`].
    ///
    /// `registry` must observe `signals.sudden_break()`, and its overflow
    /// vector must be driven by the `countdown` timer.
    pub fn new(
        dio: D,
        pacing: P,
        countdown: C,
        signals: &'a CarSignals,
        registry: &'a OverflowRegistry<'a>,
    ) -> Self {
        Self {
            motors: DcMotors::new(dio, pacing, signals.pwm_stop()),
            countdown: DelayTimer::new(countdown),
            registry,
            signals,
            config: ManeuverConfig::default(),
            leg: Leg::Long,
        }
    }

    /// Replaces the maneuver timings.
    pub fn with_config(mut self, config: ManeuverConfig) -> Self {
        self.config = config;
        self
    }

    /// Configures both timers, the motors and the status LEDs, and leaves
    /// the car stopped.
    pub fn init(&mut self) -> Result<(), ControlError> {
        let shutdown = self.signals.sudden_break();
        self.countdown
            .configure_normal_mode(InterruptMode::Enabled, shutdown);
        self.motors.motor_init(shutdown, self.registry)?;

        let dio = self.motors.dio_mut();
        for pin in [LED_LONG_SIDE, LED_SHORT_SIDE, LED_ROTATE, LED_STOP] {
            dio.pin_init(pin, STATUS_LED_PORT, PinDirection::Output)?;
        }
        self.show(AppMode::Stop)?;
        self.motors.stop();
        log_info!("car ready");
        Ok(())
    }

    /// Runs one main-loop iteration and returns the mode it left behind.
    ///
    /// Cancellation by the stop button is not an error. Any other failure
    /// stops the motors and the countdown, forces [`AppMode::Stop`] and is
    /// returned.
    pub fn step(&mut self) -> Result<AppMode, ControlError> {
        let mode = self.signals.mode();
        match self.run(mode) {
            Ok(Some(next)) => {
                if self.signals.advance(next) {
                    log_debug!("{:?} -> {:?}", mode, next);
                }
            }
            Ok(None) => {}
            Err(err) if err.is_abort() => {
                log_debug!("{:?} cancelled", mode);
            }
            Err(err) => {
                self.halt();
                self.signals.set_mode(AppMode::Stop);
                log_error!("{:?} failed: {:?}", mode, err);
                return Err(err);
            }
        }
        Ok(self.signals.mode())
    }

    /// Executes one mode and returns the mode that should follow it.
    fn run(&mut self, mode: AppMode) -> Result<Option<AppMode>, ControlError> {
        match mode {
            AppMode::Stop => {
                self.show(mode)?;
                self.halt();
                Ok(None)
            }
            AppMode::Start => {
                self.leg = Leg::Long;
                self.pause(self.config.starting_delay_ms)?;
                Ok(Some(AppMode::MoveLongSide))
            }
            AppMode::MoveLongSide => {
                self.leg = Leg::Long;
                self.show(mode)?;
                self.drive(self.config.long_side)?;
                Ok(Some(AppMode::Rotate90))
            }
            AppMode::Rotate90 => {
                self.show(mode)?;
                self.pause(self.config.rotation_pause_ms)?;
                self.countdown
                    .start_countdown(self.config.rotation_ms, self.registry)?;
                self.motors.rotate()?;
                self.motors.stop();
                self.pause(self.config.rotation_pause_ms)?;
                Ok(Some(match self.leg {
                    Leg::Long => AppMode::MoveShortSide,
                    Leg::Short => AppMode::MoveLongSide,
                }))
            }
            AppMode::MoveShortSide => {
                self.leg = Leg::Short;
                self.show(mode)?;
                self.drive(self.config.short_side)?;
                Ok(Some(AppMode::Rotate90))
            }
        }
    }

    /// Drives one side: timer 2 bounds the duty-cycle loop.
    fn drive(&mut self, leg: DriveLeg) -> Result<(), ControlError> {
        self.countdown
            .start_countdown(leg.duration_ms, self.registry)?;
        self.motors.set_duty_cycle(leg.duty_cycle)?;
        self.motors.stop();
        Ok(())
    }

    fn pause(&mut self, ms: u32) -> Result<(), ControlError> {
        self.motors.timer_mut().delay(ms)
    }

    /// Lights the LED of `mode` and clears the others.
    fn show(&mut self, mode: AppMode) -> Result<(), ControlError> {
        let Some(led) = mode.status_led() else {
            return Ok(());
        };
        self.motors
            .dio_mut()
            .port_write(STATUS_LED_PORT, 1 << led, STATUS_LED_MASK)?;
        Ok(())
    }

    /// Stops the motors and abandons any countdown in flight.
    fn halt(&mut self) {
        self.registry.disarm();
        self.countdown.stop();
        self.motors.stop();
    }

    /// Side driven last.
    pub fn leg(&self) -> Leg {
        self.leg
    }

    /// Motor layer.
    pub fn motors(&self) -> &DcMotors<'a, D, P> {
        &self.motors
    }

    /// Countdown timer.
    pub fn countdown(&self) -> &DelayTimer<'a, C> {
        &self.countdown
    }

    /// Maneuver timings in use.
    pub fn config(&self) -> &ManeuverConfig {
        &self.config
    }
}
