//! Allocation of the PIO state machines that back [`PwmChannel`](crate::pwm_channel::PwmChannel)s.
//!
//! See [`ChannelPool`] for details.

use portable_atomic::{AtomicU8, Ordering};

use crate::logging::log_debug;
use crate::{Error, Result};

/// Number of sequencer channels: 2 PIO blocks with 4 state machines each.
pub const CHANNEL_COUNT: usize = 8;

/// State machines in one PIO block.
pub const STATE_MACHINES_PER_PIO: u8 = 4;

// One bit per channel; must cover CHANNEL_COUNT.
const ALL_IN_USE: u8 = u8::MAX;

/// Index of one sequencer channel, in `0..CHANNEL_COUNT`.
///
/// Channel `n` is state machine `n % 4` of PIO block `n / 4`.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(not(feature = "host"), derive(defmt::Format))]
pub struct ChannelId(u8);

impl ChannelId {
    /// Validate a channel index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfBounds`] if `index >= CHANNEL_COUNT`.
    pub const fn new(index: u8) -> Result<Self> {
        if (index as usize) < CHANNEL_COUNT {
            Ok(Self(index))
        } else {
            Err(Error::IndexOutOfBounds { index })
        }
    }

    /// The raw channel index.
    #[must_use]
    pub const fn index(self) -> u8 {
        self.0
    }

    /// The PIO block (0 or 1) this channel lives on.
    #[must_use]
    pub const fn pio_block(self) -> u8 {
        self.0 / STATE_MACHINES_PER_PIO
    }

    /// The state machine number within its PIO block.
    #[must_use]
    pub const fn state_machine(self) -> u8 {
        self.0 % STATE_MACHINES_PER_PIO
    }

    const fn mask(self) -> u8 {
        1 << self.0
    }
}

/// Tracks which sequencer channels are in use.
///
/// Allocation state lives in a single atomic bitmap, so [`acquire`](Self::acquire) and
/// [`release`](Self::release) are safe to call from several execution contexts at once.
/// The pool itself is a plain value: firmware keeps one for the whole process
/// (see [`PioPwm`](crate::pio_pwm::PioPwm)), tests construct their own.
///
/// # Example
///
/// ```rust
/// use pio_pwm::channel_pool::{ChannelId, ChannelPool};
///
/// let pool = ChannelPool::new();
/// let first = pool.acquire(None)?;
/// assert_eq!(first.id().index(), 0);
///
/// // An explicit request for a taken slot fails rather than falling back.
/// assert!(pool.acquire(Some(first.id())).is_err());
///
/// let third = pool.acquire(Some(ChannelId::new(2)?))?;
/// drop(first); // releases slot 0
/// assert_eq!(pool.acquire(None)?.id().index(), 0);
/// # drop(third);
/// # Ok::<(), pio_pwm::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct ChannelPool {
    in_use: AtomicU8,
}

impl ChannelPool {
    /// Create a pool with every channel free.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            in_use: AtomicU8::new(0),
        }
    }

    /// Claim a channel and return a guard that releases it when dropped.
    ///
    /// With `preferred`, claims exactly that channel. Without it, claims the
    /// lowest-indexed free channel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResourceExhausted`] if no channel is free, or if `preferred` is
    /// already allocated (even when other channels are free).
    pub fn acquire(&self, preferred: Option<ChannelId>) -> Result<ChannelSlot<'_>> {
        let previous = self
            .in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |in_use| {
                let id = match preferred {
                    Some(id) => (in_use & id.mask() == 0).then_some(id),
                    None => lowest_free(in_use),
                }?;
                Some(in_use | id.mask())
            })
            .map_err(|_| Error::ResourceExhausted {
                requested: preferred.map(ChannelId::index),
            })?;

        // The closure succeeded against `previous`, so this recomputes the same id.
        let id = match preferred {
            Some(id) => id,
            None => lowest_free(previous).ok_or(Error::ResourceExhausted { requested: None })?,
        };
        log_debug!("ChannelPool: acquired channel {}", id.index());
        Ok(ChannelSlot { pool: self, id })
    }

    /// Mark a channel free. Releasing a free channel does nothing.
    ///
    /// Returns `true` if the channel was allocated before the call.
    pub fn release(&self, id: ChannelId) -> bool {
        let previous = self.in_use.fetch_and(!id.mask(), Ordering::AcqRel);
        let was_allocated = previous & id.mask() != 0;
        if was_allocated {
            log_debug!("ChannelPool: released channel {}", id.index());
        }
        was_allocated
    }

    /// Whether `id` is currently allocated.
    #[must_use]
    pub fn is_allocated(&self, id: ChannelId) -> bool {
        self.in_use.load(Ordering::Acquire) & id.mask() != 0
    }

    /// Number of channels still available.
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.in_use.load(Ordering::Acquire).count_zeros() as usize
    }
}

fn lowest_free(in_use: u8) -> Option<ChannelId> {
    if in_use == ALL_IN_USE {
        return None;
    }
    // `!in_use` is non-zero here, so the index is below 8.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "trailing_zeros of a non-zero u8 is at most 7"
    )]
    let index = (!in_use).trailing_zeros() as u8;
    ChannelId::new(index).ok()
}

/// Ownership of one allocated channel.
///
/// Dropping the slot returns the channel to its [`ChannelPool`].
#[must_use = "dropping a ChannelSlot releases the channel immediately"]
#[derive(Debug)]
pub struct ChannelSlot<'p> {
    pool: &'p ChannelPool,
    id: ChannelId,
}

impl ChannelSlot<'_> {
    /// The allocated channel.
    #[must_use]
    pub const fn id(&self) -> ChannelId {
        self.id
    }
}

impl Drop for ChannelSlot<'_> {
    fn drop(&mut self) {
        self.pool.release(self.id);
    }
}
