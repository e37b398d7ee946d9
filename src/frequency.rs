//! Translation of a requested PWM frequency into state machine parameters.
//!
//! See [`FrequencyPlan`] for the algorithm.

// ============================================================================
// Hardware constants
// ============================================================================

/// Largest cycle length (the default PWM resolution).
///
/// The PWM program compares against a 32-bit scratch register, but duty values are
/// expressed as 16-bit fractions, so the period is capped at 16 bits.
pub const MAX_CYCLE_LENGTH: u16 = u16::MAX;

/// Slowest counted-cycle rate (Hz) the state machine is run at.
///
/// The RP2040 clock divider tops out at 65536, so slower rates are not reachable from
/// `clk_sys`. Below this rate the state machine runs at this rate instead and duty values
/// are scaled by the [`CorrectionFactor`].
pub const MIN_SEQUENCER_PWM_HZ: u32 = 2_030;

/// State machine clock ticks per counted cycle.
///
/// The counting loop is two instructions long: a compare jump and a decrement jump.
pub const TICKS_PER_CYCLE: u32 = 2;

// ============================================================================
// CorrectionFactor
// ============================================================================

/// Exact ratio `sequencer_pwm_hz / pwm_hz`, always `>= 1`.
///
/// Kept as a ratio of integers so duty conversion needs no floating point.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(not(feature = "host"), derive(defmt::Format))]
pub struct CorrectionFactor {
    numerator: u32,
    denominator: u32,
}

impl CorrectionFactor {
    /// No correction.
    pub const UNITY: Self = Self {
        numerator: 1,
        denominator: 1,
    };

    /// Numerator of the ratio (the rate the state machine actually counts at).
    #[must_use]
    pub const fn numerator(self) -> u32 {
        self.numerator
    }

    /// Denominator of the ratio (the nominal counted-cycle rate).
    #[must_use]
    pub const fn denominator(self) -> u32 {
        self.denominator
    }

    /// Whether this factor leaves values unchanged.
    #[must_use]
    pub const fn is_unity(self) -> bool {
        self.numerator == self.denominator
    }

    /// Scale `value` by this factor, truncating toward zero.
    #[must_use]
    pub const fn apply(self, value: i64) -> i64 {
        value
            .saturating_mul(self.numerator as i64)
            .wrapping_div(self.denominator as i64)
    }

    /// Approximate value of the ratio, for diagnostics.
    #[must_use]
    #[expect(
        clippy::cast_precision_loss,
        reason = "diagnostic value only; rates are far below 2^24"
    )]
    pub fn as_f32(self) -> f32 {
        self.numerator as f32 / self.denominator as f32
    }
}

// ============================================================================
// FrequencyPlan
// ============================================================================

/// State machine parameters realizing a requested PWM frequency.
///
/// Planning never fails. Requests that cannot be met exactly fall back in two tiers:
///
/// 1. **Resolution clamp.** When `target_hz * cycle_length` exceeds the fastest counting
///    rate (`system_clock_hz / 2`), the state machine counts at that fastest rate and the
///    cycle length shrinks to `round(fastest / target_hz)`. Compare
///    [`effective_cycle_length`](Self::effective_cycle_length) against
///    [`requested_cycle_length`](Self::requested_cycle_length) to detect this.
/// 2. **Minimum-rate compensation.** When the counting rate falls below
///    [`MIN_SEQUENCER_PWM_HZ`], the state machine counts at that minimum instead and
///    duty values are scaled by [`correction`](Self::correction).
///
/// # Example
///
/// ```rust
/// use pio_pwm::frequency::FrequencyPlan;
///
/// // 38 kHz at full 16-bit resolution needs 2.49 GHz; the cycle length shrinks instead.
/// let plan = FrequencyPlan::new(38_000, None, 125_000_000);
/// assert_eq!(plan.sequencer_clock_hz(), 125_000_000);
/// assert_eq!(plan.effective_cycle_length(), 1645);
/// assert!(plan.correction().is_unity());
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(not(feature = "host"), derive(defmt::Format))]
pub struct FrequencyPlan {
    pwm_hz: u32,
    sequencer_clock_hz: u32,
    requested_cycle_length: u16,
    effective_cycle_length: u16,
    correction: CorrectionFactor,
}

impl FrequencyPlan {
    /// Plan the state machine parameters for `target_hz`.
    ///
    /// `requested_cycle_length` defaults to [`MAX_CYCLE_LENGTH`]. A target of 0 Hz is
    /// planned as 1 Hz and a requested cycle length of 0 as 1.
    #[must_use]
    pub const fn new(
        target_hz: u32,
        requested_cycle_length: Option<u16>,
        system_clock_hz: u32,
    ) -> Self {
        let target_hz = if target_hz == 0 { 1 } else { target_hz };
        let requested_cycle_length = match requested_cycle_length {
            Some(0) => 1,
            Some(cycle_length) => cycle_length,
            None => MAX_CYCLE_LENGTH,
        };

        let fastest_pwm_hz = system_clock_hz / TICKS_PER_CYCLE;
        let ideal_pwm_hz = target_hz as u64 * requested_cycle_length as u64;

        let (pwm_hz, effective_cycle_length) = if ideal_pwm_hz <= fastest_pwm_hz as u64 {
            // Fits because ideal <= fastest <= u32::MAX / 2.
            (ideal_pwm_hz as u32, requested_cycle_length)
        } else {
            let rounded = (fastest_pwm_hz as u64 + target_hz as u64 / 2) / target_hz as u64;
            (fastest_pwm_hz, clamp_cycle_length(rounded))
        };
        // Only a degenerate system clock (< 2 Hz) yields zero here.
        let pwm_hz = if pwm_hz == 0 { 1 } else { pwm_hz };

        let (sequencer_pwm_hz, correction) = if pwm_hz < MIN_SEQUENCER_PWM_HZ {
            (
                MIN_SEQUENCER_PWM_HZ,
                CorrectionFactor {
                    numerator: MIN_SEQUENCER_PWM_HZ,
                    denominator: pwm_hz,
                },
            )
        } else {
            (pwm_hz, CorrectionFactor::UNITY)
        };

        Self {
            pwm_hz,
            sequencer_clock_hz: sequencer_pwm_hz * TICKS_PER_CYCLE,
            requested_cycle_length,
            effective_cycle_length,
            correction,
        }
    }

    /// Clock rate to program into the state machine (Hz).
    #[must_use]
    pub const fn sequencer_clock_hz(&self) -> u32 {
        self.sequencer_clock_hz
    }

    /// Rate at which the state machine counts cycles (Hz), after minimum-rate compensation.
    #[must_use]
    pub const fn sequencer_pwm_hz(&self) -> u32 {
        self.sequencer_clock_hz / TICKS_PER_CYCLE
    }

    /// Nominal counted-cycle rate (Hz) before minimum-rate compensation.
    #[must_use]
    pub const fn pwm_hz(&self) -> u32 {
        self.pwm_hz
    }

    /// The cycle length the caller asked for (duty fractions are relative to it).
    #[must_use]
    pub const fn requested_cycle_length(&self) -> u16 {
        self.requested_cycle_length
    }

    /// The cycle length realized in hardware.
    #[must_use]
    pub const fn effective_cycle_length(&self) -> u16 {
        self.effective_cycle_length
    }

    /// Whether the requested resolution had to be reduced.
    #[must_use]
    pub const fn is_resolution_reduced(&self) -> bool {
        self.effective_cycle_length != self.requested_cycle_length
    }

    /// Factor applied to duty values for minimum-rate compensation.
    #[must_use]
    pub const fn correction(&self) -> CorrectionFactor {
        self.correction
    }
}

const fn clamp_cycle_length(cycle_length: u64) -> u16 {
    if cycle_length == 0 {
        1
    } else if cycle_length > MAX_CYCLE_LENGTH as u64 {
        MAX_CYCLE_LENGTH
    } else {
        cycle_length as u16
    }
}
