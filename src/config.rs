//! Compile-time configuration: timer constants, motor wiring and maneuver timings.
//!
//! Nothing here is read at runtime from storage. Board wiring lives in
//! [`CAR_MOTORS`]; the rectangle path timings live in [`ManeuverConfig`],
//! which uses the same builder style as the rest of the crate.
//!
//! # Example
//!
//! ```rust
//! use moving_car::config::{DriveLeg, ManeuverConfig};
//!
//! // Use defaults
//! let config = ManeuverConfig::default();
//! assert_eq!(config.long_side.duty_cycle, 50);
//!
//! // Or customize
//! let config = ManeuverConfig::default()
//!     .with_long_side(DriveLeg::new(4000, 60))
//!     .with_rotation_ms(700);
//! assert_eq!(config.rotation_ms, 700);
//! ```

use heapless::Vec as HVec;

use crate::traits::Port;

// ============================================================================
// Timer constants
// ============================================================================

/// Duration of one timer tick at CLK/1024 on an 8 MHz clock, in microseconds.
pub const TICK_TIME_US: u32 = 128;

/// Counter values per overflow of an 8-bit timer.
pub const MAX_COUNTS: u32 = 256;

/// Duration of one full overflow period, in microseconds (32.768 ms).
pub const OVERFLOW_PERIOD_US: u32 = TICK_TIME_US * MAX_COUNTS;

/// Largest overflow count a single delay may need.
pub const MAX_OVERFLOWS: u32 = 65_535;

/// Longest representable delay, in microseconds.
pub const MAX_TIMER_DELAY_US: u64 = OVERFLOW_PERIOD_US as u64 * MAX_OVERFLOWS as u64;

/// Milliseconds-to-microseconds factor.
pub const MICROS_PER_MILLI: u64 = 1000;

// ============================================================================
// Motor constants
// ============================================================================

/// Highest accepted duty cycle, in percent.
pub const MAX_DUTY_CYCLE: u8 = 100;

/// Software PWM period, in ticks of the pacing delay (milliseconds).
pub const PERIOD_TIME: u8 = 10;

/// Duty cycle used while pivoting.
pub const ROTATION_DUTY_CYCLE: u8 = 50;

/// Capacity of a motor table.
pub const MAX_MOTORS: usize = 4;

/// Bounded table of motor wirings.
pub type MotorTable = HVec<MotorConfig, MAX_MOTORS>;

/// Wiring of one DC motor behind an H-bridge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotorConfig {
    /// First H-bridge enable pin.
    pub enable_a: u8,
    /// Second H-bridge enable pin.
    pub enable_b: u8,
    /// PWM (speed) pin.
    pub pwm: u8,
    /// Port carrying all three pins.
    pub port: Port,
}

impl MotorConfig {
    /// Create a motor wiring
    pub const fn new(enable_a: u8, enable_b: u8, pwm: u8, port: Port) -> Self {
        Self {
            enable_a,
            enable_b,
            pwm,
            port,
        }
    }
}

/// Motor 0 (right side): enables on PC4/PC5, PWM on PC0.
pub const MOTOR_RIGHT: MotorConfig = MotorConfig::new(4, 5, 0, Port::C);

/// Motor 1 (left side): enables on PC6/PC7, PWM on PC1.
pub const MOTOR_LEFT: MotorConfig = MotorConfig::new(6, 7, 1, Port::C);

/// Wiring of the car, indexed by [`MotorSide`](crate::motor::MotorSide).
pub const CAR_MOTORS: [MotorConfig; 2] = [MOTOR_RIGHT, MOTOR_LEFT];

// ============================================================================
// Status LEDs
// ============================================================================

/// Port carrying the four mode LEDs.
pub const STATUS_LED_PORT: Port = Port::A;

/// LED lit while driving the long side.
pub const LED_LONG_SIDE: u8 = 0;

/// LED lit while driving the short side.
pub const LED_SHORT_SIDE: u8 = 1;

/// LED lit while rotating.
pub const LED_ROTATE: u8 = 2;

/// LED lit while stopped.
pub const LED_STOP: u8 = 3;

/// Bits of [`STATUS_LED_PORT`] owned by the mode LEDs.
pub const STATUS_LED_MASK: u8 = 0b0000_1111;

// ============================================================================
// Maneuver timings
// ============================================================================

/// One straight drive: how long and how hard.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DriveLeg {
    /// Drive duration in milliseconds.
    pub duration_ms: u32,
    /// Duty cycle in percent.
    pub duty_cycle: u8,
}

impl DriveLeg {
    /// Create a drive leg
    pub const fn new(duration_ms: u32, duty_cycle: u8) -> Self {
        Self {
            duration_ms,
            duty_cycle,
        }
    }
}

/// Rectangle path timings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ManeuverConfig {
    /// Pause after the start button before moving
    pub starting_delay_ms: u32,
    /// Long side of the rectangle
    pub long_side: DriveLeg,
    /// Short side of the rectangle
    pub short_side: DriveLeg,
    /// Standstill before and after each rotation
    pub rotation_pause_ms: u32,
    /// Pivot duration for a 90 degree turn
    pub rotation_ms: u32,
}

impl Default for ManeuverConfig {
    fn default() -> Self {
        Self {
            starting_delay_ms: 1000,
            long_side: DriveLeg::new(3000, 50),
            short_side: DriveLeg::new(2000, 30),
            rotation_pause_ms: 500,
            rotation_ms: 620,
        }
    }
}

impl ManeuverConfig {
    /// Set the starting delay
    pub fn with_starting_delay_ms(mut self, ms: u32) -> Self {
        self.starting_delay_ms = ms;
        self
    }

    /// Set the long side leg
    pub fn with_long_side(mut self, leg: DriveLeg) -> Self {
        self.long_side = leg;
        self
    }

    /// Set the short side leg
    pub fn with_short_side(mut self, leg: DriveLeg) -> Self {
        self.short_side = leg;
        self
    }

    /// Set the pause around rotations
    pub fn with_rotation_pause_ms(mut self, ms: u32) -> Self {
        self.rotation_pause_ms = ms;
        self
    }

    /// Set the rotation duration
    pub fn with_rotation_ms(mut self, ms: u32) -> Self {
        self.rotation_ms = ms;
        self
    }
}
