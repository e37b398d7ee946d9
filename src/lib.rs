//! PWM on any GPIO pin of a Pico 1, generated by PIO state machines instead of PWM slices.
//!
//! The RP2040 has 8 PWM slices, each tied to fixed pin pairs. Its 8 PIO state machines
//! can drive any pin. This crate runs a tiny counting program on a state machine and
//! exposes it as a [`PwmChannel`](pwm_channel::PwmChannel) with frequency and duty
//! setters.
//!
//! # Glossary
//!
//! - **PIO ([Programmable I/O](https://www.raspberrypi.com/documentation/microcontrollers/silicon.html)):**
//!   Pico 1 has 2 PIO blocks with 4 state machines each.
//! - **Channel:** one state machine running the PWM program. See
//!   [`ChannelPool`](channel_pool::ChannelPool).
//! - **Cycle length:** counted cycles per PWM period (the PWM resolution, 65535 by default).
//! - **Duty:** count (or pulse width) at which the output turns active each period.
//! - **Correction factor:** scale applied to duty counts when the state machine must count
//!   faster than the requested frequency implies. See
//!   [`FrequencyPlan`](frequency::FrequencyPlan).
//!
//! # Modules
//!
//! - [`channel_pool`]: allocation of the 8 state machines.
//! - [`frequency`]: frequency to state machine clock and cycle length.
//! - [`duty`]: duty requests to cycle counts.
//! - [`pwm_channel`]: the PWM output and its [`Sequencer`](pwm_channel::Sequencer) seam.
//! - `pio_pwm`: the embassy-rp PIO backend (embedded builds only).
#![cfg_attr(not(feature = "host"), no_std)]

// Compile-time checks: exactly one of board or host must be selected
#[cfg(all(not(feature = "pico1"), not(feature = "host")))]
compile_error!(
    "Must enable either the 'pico1' board feature (or 'embedded') or the 'host' feature"
);

#[cfg(all(feature = "pico1", feature = "host"))]
compile_error!(
    "Cannot enable both 'pico1' and 'host'; build firmware with --no-default-features --features embedded"
);

pub mod channel_pool;
pub mod duty;
mod error;
pub mod frequency;
mod logging;
// Requires embassy_rp and is excluded when testing on host
#[cfg(not(feature = "host"))]
pub mod pio_pwm;
pub mod pwm_channel;

// Re-export error types and result (used throughout)
pub use crate::error::{Error, Result};
