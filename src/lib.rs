//! # moving-car
//!
//! Timer delay engine and DC motor control for a small robot car that drives
//! a rectangle: long side, 90 degree turn, short side, turn, and again, until
//! the stop button is pressed.
//!
//! ## Features
//!
//! - **Overflow-counting delays**: arbitrary millisecond delays on an 8-bit
//!   timer, with a counter preload absorbing the fractional period
//! - **Cooperative cancellation**: a shared stop flag polled by every
//!   blocking loop, written from interrupt context
//! - **Overflow callback registry**: interrupt-driven countdowns that notify
//!   the motor layer without the timer knowing about motors
//! - **Software PWM**: duty-cycle loop on H-bridge driven DC motors
//! - **Hardware abstraction**: register-level traits with mock, ATmega32 and
//!   `embedded-hal` implementations
//!
//! ## Architecture
//!
//! The crate is structured to allow testing on desktop without hardware:
//!
//! - `traits` - Timer register and digital I/O abstractions
//! - `flag` - Shared stop flag
//! - `timer` - Busy-wait delay engine and interrupt-driven countdown
//! - `overflow` - Overflow interrupt callback registry
//! - `motor` - DC motor control layer
//! - `sequencer` - Rectangle-path mode machine
//! - `hal` - Concrete implementations (mock for testing, atmega32 for hardware)
//!
//! ## Example
//!
//! ```rust
//! use moving_car::{DcMotors, DelayTimer, OverflowRegistry, StopFlag};
//! use moving_car::hal::{MockDio, MockTimer};
//! use moving_car::traits::{InterruptMode, TimerId};
//!
//! // Flags are owned by the application, usually as statics
//! let shutdown = StopFlag::new();
//! let pwm_stop = StopFlag::new();
//! let registry = OverflowRegistry::new(&shutdown);
//!
//! // Blocking delay on timer 0
//! let mut timer = DelayTimer::new(MockTimer::new(TimerId::Timer0));
//! timer.configure_normal_mode(InterruptMode::Disabled, &shutdown);
//! timer.delay(1000).unwrap();
//! assert_eq!(timer.registers().overflows, 31);
//!
//! // Motors: the duty-cycle loop runs until the countdown raises pwm_stop
//! let pacing = MockTimer::new(TimerId::Timer0).raise_after(4, &pwm_stop);
//! let mut motors = DcMotors::new(MockDio::new(), pacing, &pwm_stop);
//! motors.motor_init(&shutdown, &registry).unwrap();
//! motors.set_duty_cycle(50).unwrap();
//! motors.stop();
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

#[cfg(feature = "std")]
extern crate alloc;

/// Logging macros for defmt and host tests.
#[macro_use]
pub mod logging;

/// Compile-time configuration: timer constants, wiring and maneuver timings.
pub mod config;
/// Error types for timer, motor and DIO operations.
pub mod error;
/// Shared stop flag for cooperative cancellation.
pub mod flag;
/// Hardware abstraction layer with mock implementations for testing.
pub mod hal;
/// DC motor control layer.
pub mod motor;
/// Overflow interrupt callback registry.
pub mod overflow;
/// Rectangle-path mode machine.
pub mod sequencer;
/// Delay engine on 8-bit timers.
pub mod timer;
/// Core traits for hardware abstraction.
pub mod traits;

// Re-exports for convenience
pub use error::{ControlError, DioError};
pub use flag::{BreakState, StopFlag};
pub use motor::{DcMotors, MotorSide, MotorState};
pub use overflow::{OverflowListener, OverflowRegistry};
pub use sequencer::{AppMode, CarSignals, Leg, Sequencer};
pub use timer::{DelayTimer, OverflowPlan};
pub use traits::{
    DigitalIo, InterruptMode, PinDirection, PinLevel, Port, Prescaler, TimerId, TimerRegisters,
};

// Config re-exports
pub use config::{DriveLeg, ManeuverConfig, MotorConfig};
