//! Conversion of duty requests into state machine cycle counts.

use crate::frequency::FrequencyPlan;

/// Cycle count that keeps the output permanently inactive.
///
/// The counter never reaches `0xFFFF_FFFF`, so the compare never matches.
pub const DUTY_OFF: i32 = -1;

const NANOS_PER_SECOND: i128 = 1_000_000_000;

/// A duty request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(not(feature = "host"), derive(defmt::Format))]
pub enum Duty {
    /// Active portion as a count out of the requested cycle length
    /// (out of 65535 unless a cycle length was given).
    ///
    /// Negative and over-range values are clamped.
    Fraction(i32),

    /// Active portion as an absolute pulse width in nanoseconds.
    Nanoseconds(i64),
}

/// Convert `duty` into the cycle count to push to the state machine.
///
/// The result is always in `DUTY_OFF..=effective_cycle_length - 1`; see [`clamp_cycles`].
///
/// # Example
///
/// ```rust
/// use pio_pwm::duty::{Duty, to_cycles};
/// use pio_pwm::frequency::FrequencyPlan;
///
/// let plan = FrequencyPlan::new(1_000, Some(1_000), 125_000_000);
/// assert_eq!(to_cycles(Duty::Fraction(250), &plan), 250);
/// // 250 µs of a 1 ms period.
/// assert_eq!(to_cycles(Duty::Nanoseconds(250_000), &plan), 250);
/// ```
#[must_use]
pub fn to_cycles(duty: Duty, plan: &FrequencyPlan) -> i32 {
    let raw = match duty {
        Duty::Fraction(value) => fraction_to_raw(value, plan),
        Duty::Nanoseconds(nanoseconds) => nanoseconds_to_raw(nanoseconds, plan),
    };
    clamp_cycles(raw, plan.effective_cycle_length())
}

fn fraction_to_raw(value: i32, plan: &FrequencyPlan) -> i64 {
    let corrected = plan.correction().apply(i64::from(value));
    if plan.is_resolution_reduced() {
        // Re-project from the caller's resolution onto the hardware's.
        corrected.saturating_mul(i64::from(plan.effective_cycle_length()))
            / i64::from(plan.requested_cycle_length())
    } else {
        corrected
    }
}

fn nanoseconds_to_raw(nanoseconds: i64, plan: &FrequencyPlan) -> i64 {
    // pwm_hz * correction == sequencer_pwm_hz, so the correction is already in here.
    let raw = i128::from(nanoseconds) * i128::from(plan.sequencer_pwm_hz()) / NANOS_PER_SECOND;
    i64::try_from(raw).unwrap_or(if raw < 0 { i64::MIN } else { i64::MAX })
}

/// Clamp a raw cycle count into what the PWM program can emit.
///
/// - below -1 becomes [`DUTY_OFF`],
/// - exactly 0 becomes [`DUTY_OFF`] (a compare value of 0 still emits a one-cycle pulse
///   at the end of each period),
/// - above `effective_cycle_length - 1` becomes `effective_cycle_length - 1` (fully on).
#[must_use]
pub const fn clamp_cycles(raw: i64, effective_cycle_length: u16) -> i32 {
    let floored = if raw < DUTY_OFF as i64 { DUTY_OFF as i64 } else { raw };
    let floored = if floored == 0 { DUTY_OFF as i64 } else { floored };
    let ceiling = effective_cycle_length as i64 - 1;
    let clamped = if floored > ceiling { ceiling } else { floored };
    // In -1..=65534.
    clamped as i32
}
