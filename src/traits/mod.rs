//! Trait definitions for hardware abstraction.
//!
//! This module defines the seams that let the delay engine and motor layer
//! run on the ATmega32 or against desktop mocks:
//!
//! - [`TimerRegisters`]: one 8-bit timer/counter (control, counter, overflow flag)
//! - [`DigitalIo`]: the Digital I/O adapter (pin init, read, write, toggle)

pub mod hardware;

pub use hardware::*;
