//! Motor control layer tests against the public API

use moving_car::config::{CAR_MOTORS, MAX_DUTY_CYCLE};
use moving_car::hal::{MockDio, MockTimer, SharedTimer, TimerOp};
use moving_car::motor::pwm_split;
use moving_car::{
    ControlError, DcMotors, DelayTimer, InterruptMode, MotorSide, MotorState, OverflowRegistry,
    PinLevel, Port, StopFlag, TimerId,
};

type Motors<'a> = DcMotors<'a, MockDio, MockTimer<'a>>;

fn pwm_low(motors: &Motors<'_>) -> bool {
    CAR_MOTORS
        .iter()
        .all(|m| motors.dio().level(m.pwm, m.port) == PinLevel::Low)
}

// ============================================================================
// Init and stop
// ============================================================================

#[test]
fn init_then_stop_is_never_an_error() {
    let shutdown = StopFlag::new();
    let pwm_stop = StopFlag::new();
    let registry = OverflowRegistry::new(&shutdown);
    let mut motors = DcMotors::new(MockDio::new(), MockTimer::new(TimerId::Timer0), &pwm_stop);

    motors.motor_init(&shutdown, &registry).unwrap();
    motors.stop();

    assert!(pwm_low(&motors));
    assert!(!pwm_stop.is_raised());
    assert_eq!(motors.state(), MotorState::Stopped);
}

#[test]
fn stop_twice_leaves_identical_pins() {
    let shutdown = StopFlag::new();
    let pwm_stop = StopFlag::new();
    let registry = OverflowRegistry::new(&shutdown);
    let mut motors = DcMotors::new(MockDio::new(), MockTimer::new(TimerId::Timer0), &pwm_stop);
    motors.motor_init(&shutdown, &registry).unwrap();

    motors.stop();
    let once = motors.dio().port_byte(Port::C);
    motors.stop();

    assert_eq!(motors.dio().port_byte(Port::C), once);
    assert!(!pwm_stop.is_raised());
}

// ============================================================================
// Duty cycle
// ============================================================================

#[test]
fn split_always_fills_the_period() {
    for percent in 0..=MAX_DUTY_CYCLE {
        let (on, off) = pwm_split(percent).unwrap();
        assert_eq!(on + off, 10, "percent={}", percent);
    }
    assert_eq!(pwm_split(35), Ok((3, 7)));
}

#[test]
fn duty_above_range_rejected_before_motion() {
    let shutdown = StopFlag::new();
    let pwm_stop = StopFlag::new();
    let registry = OverflowRegistry::new(&shutdown);
    let mut motors = DcMotors::new(MockDio::new(), MockTimer::new(TimerId::Timer0), &pwm_stop);
    motors.motor_init(&shutdown, &registry).unwrap();

    for percent in [101, 150, 255] {
        assert_eq!(
            motors.set_duty_cycle(percent),
            Err(ControlError::RangeExceeded)
        );
    }
    assert!(motors
        .timer()
        .registers()
        .ops
        .iter()
        .all(|op| !matches!(op, TimerOp::Counter(_))));
}

#[test]
fn stop_button_mid_drive_leaves_pwm_low() {
    let shutdown = StopFlag::new();
    let pwm_stop = StopFlag::new();
    let registry = OverflowRegistry::new(&shutdown);
    // Stop button pressed during the seventh pacing overflow
    let timer = MockTimer::new(TimerId::Timer0).raise_after(7, &shutdown);
    let mut motors = DcMotors::new(MockDio::new(), timer, &pwm_stop);
    motors.motor_init(&shutdown, &registry).unwrap();

    assert_eq!(motors.set_duty_cycle(50), Ok(()));

    // Returned at the first poll after the flag went Up
    assert_eq!(motors.timer().registers().overflows, 7);
    assert!(pwm_low(&motors));
    assert!(!pwm_stop.is_raised());

    // Everything is declined until the start button lowers the flag
    assert_eq!(motors.rotate(), Err(ControlError::Aborted));
}

#[test]
fn countdown_bounds_the_drive() {
    let shutdown = StopFlag::new();
    let pwm_stop = StopFlag::new();
    let registry = OverflowRegistry::new(&shutdown);

    let timer2 = SharedTimer::new(MockTimer::new(TimerId::Timer2));
    let timer0 = MockTimer::new(TimerId::Timer0).drive_countdown(&timer2, &registry);
    let mut countdown = DelayTimer::new(timer2.clone());
    countdown.configure_normal_mode(InterruptMode::Enabled, &shutdown);

    let mut motors = DcMotors::new(MockDio::new(), timer0, &pwm_stop);
    motors.motor_init(&shutdown, &registry).unwrap();

    let plan = countdown.start_countdown(300, &registry).unwrap();
    motors.set_duty_cycle(50).unwrap();

    // Loop ran until the countdown ended, and at most one period longer
    let drove = motors.timer().registers().elapsed_ticks;
    let target = plan.total_ticks() as u64;
    assert!(drove >= target, "drove {} of {} ticks", drove, target);
    assert!(drove < target + 2 * 40, "overran: {} vs {}", drove, target);
    assert!(!registry.is_armed());
    assert!(pwm_low(&motors));
}

// ============================================================================
// Rotation
// ============================================================================

#[test]
fn rotate_while_shutdown_touches_nothing() {
    let shutdown = StopFlag::new();
    let pwm_stop = StopFlag::new();
    let registry = OverflowRegistry::new(&shutdown);
    let mut motors = DcMotors::new(MockDio::new(), MockTimer::new(TimerId::Timer0), &pwm_stop);
    motors.motor_init(&shutdown, &registry).unwrap();
    let writes = motors.dio().write_count;

    shutdown.raise();
    assert_eq!(motors.rotate(), Err(ControlError::Aborted));

    assert_eq!(motors.dio().total_toggles(), 0);
    assert_eq!(motors.dio().write_count, writes);
}

#[test]
fn rotate_restores_polarity() {
    let shutdown = StopFlag::new();
    let pwm_stop = StopFlag::new();
    let registry = OverflowRegistry::new(&shutdown);
    let timer = MockTimer::new(TimerId::Timer0).raise_after(4, &pwm_stop);
    let mut motors = DcMotors::new(MockDio::new(), timer, &pwm_stop);
    motors.motor_init(&shutdown, &registry).unwrap();
    let before = motors.dio().port_byte(Port::C);

    motors.rotate().unwrap();

    assert_eq!(motors.dio().port_byte(Port::C), before);
    assert_eq!(motors.state(), MotorState::Stopped);
}

#[test]
fn direction_change_is_self_inverse() {
    let shutdown = StopFlag::new();
    let pwm_stop = StopFlag::new();
    let registry = OverflowRegistry::new(&shutdown);
    let mut motors = DcMotors::new(MockDio::new(), MockTimer::new(TimerId::Timer0), &pwm_stop);
    motors.motor_init(&shutdown, &registry).unwrap();
    let before = motors.dio().port_byte(Port::C);

    motors.change_direction(MotorSide::Right).unwrap();
    assert_ne!(motors.dio().port_byte(Port::C), before);
    motors.change_direction(MotorSide::Right).unwrap();
    assert_eq!(motors.dio().port_byte(Port::C), before);
}
