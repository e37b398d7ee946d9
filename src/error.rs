use derive_more::{Display, Error as DeriveError};

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Errors returned by `pio_pwm`.
///
/// Only channel allocation can fail. Frequency and duty updates always produce a valid
/// (possibly approximated) signal instead of an error.
#[derive(Debug, Display, DeriveError, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(not(feature = "host"), derive(defmt::Format))]
pub enum Error {
    /// No free PIO state machine, or the explicitly requested one is already in use.
    #[display("no free PIO state machine (requested: {requested:?})")]
    ResourceExhausted {
        /// The explicitly requested slot index, if any.
        requested: Option<u8>,
    },

    /// A channel index outside `0..CHANNEL_COUNT`.
    #[display("channel index {index} is out of range")]
    IndexOutOfBounds {
        /// The rejected index.
        index: u8,
    },
}
