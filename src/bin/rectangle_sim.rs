//! Host simulation of the rectangle path.
//!
//! Wires the sequencer to mock timers and pins: every overflow of the pacing
//! timer advances the countdown timer by the same number of ticks, so drive
//! and pivot durations come out of the same simulated clock the software PWM
//! runs on. The stop button is pressed once the requested number of laps has
//! been driven.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin rectangle_sim -- [laps]
//! ```

use moving_car::config::{STATUS_LED_PORT, TICK_TIME_US};
use moving_car::hal::{MockDio, MockTimer, SharedTimer};
use moving_car::traits::TimerId;
use moving_car::{AppMode, CarSignals, OverflowRegistry, Sequencer};

/// Main-loop iterations per lap: two long sides, two short sides, four turns.
const STEPS_PER_LAP: usize = 8;

fn main() -> anyhow::Result<()> {
    let laps: usize = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => 1,
    };

    println!("================================");
    println!("  moving-car rectangle sim");
    println!("================================");

    let signals = CarSignals::new();
    let registry = OverflowRegistry::new(signals.sudden_break());
    let timer2 = SharedTimer::new(MockTimer::new(TimerId::Timer2));
    let timer0 = MockTimer::new(TimerId::Timer0).drive_countdown(&timer2, &registry);

    let mut car = Sequencer::new(MockDio::new(), timer0, timer2.clone(), &signals, &registry);
    car.init()?;

    let mut mode = car.step()?;
    report(&car, mode);

    signals.start_car();
    // Start, then the first long side begins the lap count
    mode = car.step()?;
    report(&car, mode);

    for _ in 0..laps * STEPS_PER_LAP {
        mode = car.step()?;
        report(&car, mode);
    }

    signals.stop_car();
    mode = car.step()?;
    report(&car, mode);

    anyhow::ensure!(mode == AppMode::Stop, "car did not stop: {:?}", mode);
    println!("done after {} lap(s)", laps);
    Ok(())
}

fn report(car: &Sequencer<'_, MockDio, MockTimer<'_>, SharedTimer<'_>>, mode: AppMode) {
    let ticks = car.motors().timer().registers().elapsed_ticks;
    let seconds = (ticks * TICK_TIME_US as u64) as f64 / 1_000_000.0;
    let leds = car.motors().dio().port_byte(STATUS_LED_PORT);
    let name = format!("{:?}", mode);
    println!("{:>10.3} s  {:<14} leds {:04b}", seconds, name, leds);
}
