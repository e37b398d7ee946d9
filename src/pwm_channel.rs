//! A PWM output driven by one sequencer channel.
//!
//! See [`PwmChannel`] for the lifecycle and [`Sequencer`] for the hardware seam.

use crate::channel_pool::{ChannelId, ChannelPool, ChannelSlot};
use crate::duty::{Duty, to_cycles};
use crate::frequency::FrequencyPlan;
use crate::logging::{log_debug, log_info, log_warn};
use crate::Result;

// ============================================================================
// Polarity
// ============================================================================

/// Which output level counts as "active" for the duty portion of each period.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(not(feature = "host"), derive(defmt::Format))]
pub enum Polarity {
    /// Output idles low and is driven high for the duty portion.
    #[default]
    ActiveHigh,

    /// Output idles high and is driven low for the duty portion.
    ActiveLow,
}

impl Polarity {
    /// Polarity from the conventional `invert` flag.
    #[must_use]
    pub const fn from_invert(invert: bool) -> Self {
        if invert { Self::ActiveLow } else { Self::ActiveHigh }
    }
}

// ============================================================================
// Sequencer - hardware seam
// ============================================================================

/// The operations a [`PwmChannel`] needs from its state machine.
///
/// The state machine runs a fixed PWM program: on start it latches a cycle-length
/// constant, then loops forever, taking the newest duty value if one is pending, counting
/// down from the cycle length and driving the pin active once the count reaches the duty
/// value.
///
/// [`PioSequencer`](crate::pio_pwm::PioSequencer) implements this on RP2040 PIO.
pub trait Sequencer {
    /// Current system clock rate (Hz) that the state machine clock is divided from.
    fn system_clock_hz(&self) -> u32;

    /// Stop the state machine and (re)load the program for `polarity` at
    /// `sequencer_clock_hz`, leaving the pin at its idle level.
    fn load_program(&mut self, polarity: Polarity, sequencer_clock_hz: u32);

    /// Restart the stopped state machine from the top of its program and latch
    /// `cycle_length` into its comparison register.
    fn load_cycle_length(&mut self, cycle_length: u32);

    /// Offer a new duty value. Replaces any value the program has not yet taken.
    fn push(&mut self, value: u32);

    /// Start the state machine clock.
    fn start(&mut self);

    /// Stop the state machine clock.
    fn stop(&mut self);
}

// ============================================================================
// PwmConfig
// ============================================================================

/// Construction options for a [`PwmChannel`].
///
/// # Example
///
/// ```rust
/// use pio_pwm::duty::Duty;
/// use pio_pwm::pwm_channel::PwmConfig;
///
/// let config = PwmConfig::new()
///     .with_frequency(38_000)
///     .with_duty(Duty::Fraction(6_500))
///     .inverted();
/// assert!(config.invert);
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PwmConfig {
    /// Drive the output active-low.
    pub invert: bool,
    /// Initial frequency (Hz). Without it the channel stays idle until
    /// [`PwmChannel::set_frequency`].
    pub frequency_hz: Option<u32>,
    /// Initial duty, applied after the initial frequency.
    pub duty: Option<Duty>,
    /// Claim this channel instead of the lowest free one.
    pub channel: Option<ChannelId>,
    /// Requested resolution (cycle length). Defaults to 65535.
    pub cycle_length: Option<u16>,
}

impl PwmConfig {
    /// Active-high output with no initial frequency or duty.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            invert: false,
            frequency_hz: None,
            duty: None,
            channel: None,
            cycle_length: None,
        }
    }

    /// Set the initial frequency.
    #[must_use]
    pub const fn with_frequency(mut self, frequency_hz: u32) -> Self {
        self.frequency_hz = Some(frequency_hz);
        self
    }

    /// Set the initial duty.
    #[must_use]
    pub const fn with_duty(mut self, duty: Duty) -> Self {
        self.duty = Some(duty);
        self
    }

    /// Claim a specific channel.
    #[must_use]
    pub const fn with_channel(mut self, channel: ChannelId) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Request a resolution other than 65535.
    #[must_use]
    pub const fn with_cycle_length(mut self, cycle_length: u16) -> Self {
        self.cycle_length = Some(cycle_length);
        self
    }

    /// Drive the output active-low.
    #[must_use]
    pub const fn inverted(mut self) -> Self {
        self.invert = true;
        self
    }
}

// ============================================================================
// PwmChannel
// ============================================================================

/// Whether the state machine is emitting pulses.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(not(feature = "host"), derive(defmt::Format))]
pub enum ProgramState {
    /// Stopped, or loaded without a cycle length latched. No duty value is pushed here.
    Idle,
    /// Counting; duty values are pushed directly.
    Running,
}

/// A PWM output on one pooled sequencer channel.
///
/// # Lifecycle
///
/// - [`set_frequency`](Self::set_frequency) reloads the program at a new clock rate and
///   leaves the channel [`Idle`](ProgramState::Idle). Any previous duty is discarded.
/// - [`set_duty`](Self::set_duty) arms an idle channel (latches the cycle length, starts
///   the clock) and then pushes the duty. Later calls only push.
/// - [`stop`](Self::stop) halts the clock; the next duty call re-arms.
/// - Dropping the channel (or [`dispose`](Self::dispose)) stops it, unbinds the state
///   machine and returns the slot to the pool.
///
/// Mutators take `&mut self`, so a channel can only be driven from one context at a
/// time. Share it across tasks behind a mutex if needed.
///
/// # Example
///
/// ```rust
/// use pio_pwm::channel_pool::ChannelPool;
/// use pio_pwm::pwm_channel::{Polarity, PwmChannel, PwmConfig, Sequencer};
///
/// struct NullSequencer;
///
/// impl Sequencer for NullSequencer {
///     fn system_clock_hz(&self) -> u32 { 125_000_000 }
///     fn load_program(&mut self, _: Polarity, _: u32) {}
///     fn load_cycle_length(&mut self, _: u32) {}
///     fn push(&mut self, _: u32) {}
///     fn start(&mut self) {}
///     fn stop(&mut self) {}
/// }
///
/// let pool = ChannelPool::new();
/// let mut pwm = PwmChannel::new(&pool, PwmConfig::new().with_frequency(38_000), |_| {
///     NullSequencer
/// })?;
/// pwm.set_duty_fraction(6_500);
/// assert_eq!(pwm.last_duty_cycles(), Some(163));
///
/// pwm.dispose();
/// assert_eq!(pool.free_count(), 8);
/// # Ok::<(), pio_pwm::Error>(())
/// ```
#[derive(Debug)]
pub struct PwmChannel<'p, S: Sequencer> {
    // Declared before `slot`: the sequencer is torn down before the slot is released.
    sequencer: S,
    slot: ChannelSlot<'p>,
    polarity: Polarity,
    requested_frequency_hz: Option<u32>,
    requested_cycle_length: Option<u16>,
    plan: Option<FrequencyPlan>,
    program_state: ProgramState,
    last_duty_cycles: Option<i32>,
}

impl<'p, S: Sequencer> PwmChannel<'p, S> {
    /// Claim a channel from `pool`, bind a sequencer to it and apply `config`.
    ///
    /// `make_sequencer` receives the claimed channel and returns the sequencer that drives
    /// it. If it panics, the channel is still released.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResourceExhausted`](crate::Error::ResourceExhausted) if no channel
    /// is free or `config.channel` is taken.
    pub fn new<F>(pool: &'p ChannelPool, config: PwmConfig, make_sequencer: F) -> Result<Self>
    where
        F: FnOnce(ChannelId) -> S,
    {
        let slot = pool.acquire(config.channel)?;
        let sequencer = make_sequencer(slot.id());
        let mut channel = Self {
            sequencer,
            slot,
            polarity: Polarity::from_invert(config.invert),
            requested_frequency_hz: None,
            requested_cycle_length: config.cycle_length,
            plan: None,
            program_state: ProgramState::Idle,
            last_duty_cycles: None,
        };
        log_info!(
            "PwmChannel: claimed channel {} (pio {} sm {}) invert={}",
            channel.id().index(),
            channel.id().pio_block(),
            channel.id().state_machine(),
            config.invert
        );

        if let Some(frequency_hz) = config.frequency_hz {
            channel.set_frequency(frequency_hz, config.cycle_length);
        }
        if let Some(duty) = config.duty {
            channel.set_duty(duty);
        }
        Ok(channel)
    }

    /// Change the PWM frequency (and optionally the requested resolution).
    ///
    /// `cycle_length = None` keeps the previously requested resolution (65535 if none was
    /// ever given). The program is reloaded at the new clock rate and the channel goes
    /// [`Idle`](ProgramState::Idle): output resumes at the next duty call.
    pub fn set_frequency(&mut self, frequency_hz: u32, cycle_length: Option<u16>) {
        let cycle_length = cycle_length.or(self.requested_cycle_length);
        let plan = FrequencyPlan::new(frequency_hz, cycle_length, self.sequencer.system_clock_hz());

        self.sequencer.load_program(self.polarity, plan.sequencer_clock_hz());
        self.requested_frequency_hz = Some(frequency_hz);
        self.requested_cycle_length = cycle_length;
        self.plan = Some(plan);
        self.program_state = ProgramState::Idle;
        self.last_duty_cycles = None;

        log_info!(
            "PwmChannel {}: {}Hz -> sm clock {}Hz, cycle length {}",
            self.id().index(),
            frequency_hz,
            plan.sequencer_clock_hz(),
            plan.effective_cycle_length()
        );
        if plan.is_resolution_reduced() {
            log_info!(
                "PwmChannel {}: resolution reduced from {} to {}",
                self.id().index(),
                plan.requested_cycle_length(),
                plan.effective_cycle_length()
            );
        }
        if !plan.correction().is_unity() {
            log_info!(
                "PwmChannel {}: counting at {}Hz instead of {}Hz",
                self.id().index(),
                plan.sequencer_pwm_hz(),
                plan.pwm_hz()
            );
        }
    }

    /// Set the duty, arming the channel first if it is idle.
    ///
    /// Before any frequency has been set there is nothing to arm; the duty is ignored.
    pub fn set_duty(&mut self, duty: Duty) {
        let Some(plan) = self.plan else {
            log_warn!(
                "PwmChannel {}: duty ignored, no frequency set",
                self.id().index()
            );
            return;
        };

        if self.program_state == ProgramState::Idle {
            self.arm(&plan);
        }

        let cycles = to_cycles(duty, &plan);
        // Two's complement: DUTY_OFF becomes 0xFFFF_FFFF.
        #[expect(clippy::cast_sign_loss, reason = "the program compares raw 32-bit patterns")]
        let value = cycles as u32;
        self.sequencer.push(value);
        self.last_duty_cycles = Some(cycles);
    }

    /// Set the duty as a count out of the requested cycle length (65535 by default).
    pub fn set_duty_fraction(&mut self, value: u16) {
        self.set_duty(Duty::Fraction(i32::from(value)));
    }

    /// Set the duty as an absolute pulse width in nanoseconds.
    pub fn set_duty_ns(&mut self, nanoseconds: u32) {
        self.set_duty(Duty::Nanoseconds(i64::from(nanoseconds)));
    }

    /// Stop the output. The next duty call re-arms the channel.
    pub fn stop(&mut self) {
        if self.program_state == ProgramState::Running {
            self.sequencer.stop();
            self.program_state = ProgramState::Idle;
            log_debug!("PwmChannel {}: stopped", self.id().index());
        }
    }

    /// Stop the output and release the channel back to its pool.
    ///
    /// Equivalent to dropping the channel.
    pub fn dispose(self) {
        drop(self);
    }

    /// The pooled channel this output runs on.
    #[must_use]
    pub const fn id(&self) -> ChannelId {
        self.slot.id()
    }

    /// Output polarity, fixed at construction.
    #[must_use]
    pub const fn polarity(&self) -> Polarity {
        self.polarity
    }

    /// Current program state.
    #[must_use]
    pub const fn program_state(&self) -> ProgramState {
        self.program_state
    }

    /// Parameters realized for the last [`set_frequency`](Self::set_frequency).
    #[must_use]
    pub const fn plan(&self) -> Option<FrequencyPlan> {
        self.plan
    }

    /// Frequency most recently requested.
    #[must_use]
    pub const fn requested_frequency_hz(&self) -> Option<u32> {
        self.requested_frequency_hz
    }

    /// Resolution most recently requested, if any.
    #[must_use]
    pub const fn requested_cycle_length(&self) -> Option<u16> {
        self.requested_cycle_length
    }

    /// Cycle count most recently pushed since the last frequency change.
    #[must_use]
    pub const fn last_duty_cycles(&self) -> Option<i32> {
        self.last_duty_cycles
    }

    /// The underlying sequencer.
    #[must_use]
    pub const fn sequencer(&self) -> &S {
        &self.sequencer
    }

    fn arm(&mut self, plan: &FrequencyPlan) {
        self.sequencer
            .load_cycle_length(u32::from(plan.effective_cycle_length()));
        self.sequencer.start();
        self.program_state = ProgramState::Running;
        log_debug!(
            "PwmChannel {}: armed with cycle length {}",
            self.id().index(),
            plan.effective_cycle_length()
        );
    }
}

impl<S: Sequencer> Drop for PwmChannel<'_, S> {
    fn drop(&mut self) {
        self.stop();
        log_debug!("PwmChannel {}: released", self.id().index());
    }
}
