#![allow(missing_docs, reason = "test crate")]
//! Host-level tests for frequency planning.

use pio_pwm::frequency::{
    FrequencyPlan, MAX_CYCLE_LENGTH, MIN_SEQUENCER_PWM_HZ, TICKS_PER_CYCLE,
};

const CLK_SYS: u32 = 125_000_000;

#[test]
fn planning_is_a_pure_function() {
    let first = FrequencyPlan::new(38_000, Some(1_000), CLK_SYS);
    let second = FrequencyPlan::new(38_000, Some(1_000), CLK_SYS);
    assert_eq!(first, second);
}

#[test]
fn achievable_resolution_is_kept() {
    let plan = FrequencyPlan::new(1_000, Some(1_000), CLK_SYS);
    assert_eq!(plan.effective_cycle_length(), 1_000);
    assert_eq!(plan.requested_cycle_length(), 1_000);
    assert_eq!(plan.pwm_hz(), 1_000_000);
    assert_eq!(plan.sequencer_clock_hz(), 2_000_000);
    assert!(!plan.is_resolution_reduced());
    assert!(plan.correction().is_unity());
}

#[test]
fn boundary_frequency_keeps_resolution() {
    // 62_500 * 1000 == 125 MHz / 2 exactly.
    let plan = FrequencyPlan::new(62_500, Some(1_000), CLK_SYS);
    assert_eq!(plan.effective_cycle_length(), 1_000);
    assert_eq!(plan.pwm_hz(), CLK_SYS / 2);
    assert_eq!(plan.sequencer_clock_hz(), CLK_SYS);
}

#[test]
fn unreachable_resolution_is_clamped() {
    // 38 kHz * 65535 needs 2.49 GHz.
    let plan = FrequencyPlan::new(38_000, None, CLK_SYS);
    assert_eq!(plan.requested_cycle_length(), MAX_CYCLE_LENGTH);
    assert_eq!(plan.pwm_hz(), CLK_SYS / 2);
    // round(62_500_000 / 38_000) = round(1644.7)
    assert_eq!(plan.effective_cycle_length(), 1_645);
    assert_eq!(plan.sequencer_clock_hz(), CLK_SYS);
    assert!(plan.is_resolution_reduced());
    assert!(plan.correction().is_unity());
}

#[test]
fn just_above_boundary_takes_clamp_branch() {
    let plan = FrequencyPlan::new(62_501, Some(1_000), CLK_SYS);
    assert_eq!(plan.pwm_hz(), CLK_SYS / 2);
    // round(999.98)
    assert_eq!(plan.effective_cycle_length(), 1_000);
}

#[test]
fn frequencies_above_the_counting_rate_keep_one_cycle() {
    let plan = FrequencyPlan::new(200_000_000, None, CLK_SYS);
    assert_eq!(plan.effective_cycle_length(), 1);
}

#[test]
fn slow_rate_is_compensated() {
    // 100 Hz * 10 cycles = 1000 counts/s, below the 2030 floor.
    let plan = FrequencyPlan::new(100, Some(10), CLK_SYS);
    assert_eq!(plan.pwm_hz(), 1_000);
    assert_eq!(plan.sequencer_pwm_hz(), MIN_SEQUENCER_PWM_HZ);
    assert_eq!(
        plan.sequencer_clock_hz(),
        MIN_SEQUENCER_PWM_HZ * TICKS_PER_CYCLE
    );
    assert_eq!(plan.effective_cycle_length(), 10);

    let correction = plan.correction();
    assert!(!correction.is_unity());
    assert_eq!(correction.numerator(), MIN_SEQUENCER_PWM_HZ);
    assert_eq!(correction.denominator(), 1_000);
    assert!((correction.as_f32() - 2.03).abs() < 1e-6);
}

#[test]
fn slow_frequency_at_full_resolution_needs_no_compensation() {
    // 100 Hz * 65535 = 6.55 MHz, well above the floor.
    let plan = FrequencyPlan::new(100, None, CLK_SYS);
    assert_eq!(plan.pwm_hz(), 6_553_500);
    assert!(plan.correction().is_unity());
    assert_eq!(plan.effective_cycle_length(), MAX_CYCLE_LENGTH);
}

#[test]
fn degenerate_inputs_still_produce_a_valid_plan() {
    let zero_hz = FrequencyPlan::new(0, None, CLK_SYS);
    assert_eq!(zero_hz, FrequencyPlan::new(1, None, CLK_SYS));

    let zero_length = FrequencyPlan::new(1_000, Some(0), CLK_SYS);
    assert_eq!(zero_length.requested_cycle_length(), 1);
    assert_eq!(zero_length.effective_cycle_length(), 1);

    let tiny_clock = FrequencyPlan::new(1_000, None, 1);
    assert_eq!(tiny_clock.effective_cycle_length(), 1);
    assert!(tiny_clock.sequencer_pwm_hz() >= MIN_SEQUENCER_PWM_HZ);
}

#[test]
fn effective_cycle_length_stays_in_range() {
    for target_hz in [1, 7, 100, 2_030, 38_000, 1_000_000, 62_500_000, u32::MAX] {
        for cycle_length in [None, Some(1), Some(2), Some(1_000), Some(u16::MAX)] {
            let plan = FrequencyPlan::new(target_hz, cycle_length, CLK_SYS);
            assert!(plan.effective_cycle_length() > 0);
            assert!(plan.correction().numerator() >= plan.correction().denominator());
            assert_eq!(
                plan.sequencer_clock_hz(),
                plan.sequencer_pwm_hz() * TICKS_PER_CYCLE
            );
        }
    }
}
