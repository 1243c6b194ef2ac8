//! Hardware Abstraction Layer implementations.
//!
//! This module contains concrete implementations of the traits
//! defined in [`crate::traits`] for various platforms.
//!
//! # Available Implementations
//!
//! - `mock`: Test implementations for desktop development (requires `std`)
//! - `atmega32`: Memory-mapped ATmega32 timers and ports (requires `atmega32` feature)
//! - `ehal`: Bank of `embedded-hal` output pins behind the DIO contract
//!   (requires `embedded-hal` feature)

#[cfg(feature = "std")]
pub mod mock;

#[cfg(feature = "atmega32")]
pub mod atmega32;

#[cfg(feature = "embedded-hal")]
pub mod ehal;

#[cfg(feature = "std")]
pub use mock::*;

#[cfg(feature = "atmega32")]
pub use atmega32::*;

#[cfg(feature = "embedded-hal")]
pub use ehal::*;
