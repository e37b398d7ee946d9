#![allow(missing_docs, reason = "test crate")]
//! Host-level tests for duty conversion.

use pio_pwm::duty::{DUTY_OFF, Duty, clamp_cycles, to_cycles};
use pio_pwm::frequency::FrequencyPlan;

const CLK_SYS: u32 = 125_000_000;

#[test]
fn clamp_stays_within_program_range() {
    for effective_cycle_length in [2_u16, 3, 10, 1_645, u16::MAX] {
        let ceiling = i32::from(effective_cycle_length) - 1;
        for raw in [
            i64::MIN,
            -70_000,
            -2,
            -1,
            0,
            1,
            2,
            i64::from(ceiling) - 1,
            i64::from(ceiling),
            i64::from(ceiling) + 1,
            1_000_000,
            i64::MAX,
        ] {
            let cycles = clamp_cycles(raw, effective_cycle_length);
            assert!(
                (DUTY_OFF..=ceiling).contains(&cycles),
                "raw {raw} with length {effective_cycle_length} gave {cycles}"
            );
            assert_ne!(cycles, 0, "0 must map to off");
        }
    }
}

#[test]
fn clamp_maps_edges() {
    assert_eq!(clamp_cycles(-5, 1_000), DUTY_OFF);
    assert_eq!(clamp_cycles(-1, 1_000), DUTY_OFF);
    assert_eq!(clamp_cycles(0, 1_000), DUTY_OFF);
    assert_eq!(clamp_cycles(1, 1_000), 1);
    assert_eq!(clamp_cycles(999, 1_000), 999);
    assert_eq!(clamp_cycles(1_000, 1_000), 999);
    assert_eq!(clamp_cycles(65_535, u16::MAX), 65_534);
}

#[test]
fn single_cycle_resolution_has_two_levels() {
    let plan = FrequencyPlan::new(1_000, Some(1), CLK_SYS);
    assert_eq!(plan.effective_cycle_length(), 1);
    assert_eq!(to_cycles(Duty::Fraction(0), &plan), DUTY_OFF);
    assert_eq!(to_cycles(Duty::Fraction(1), &plan), 0);
    assert_eq!(to_cycles(Duty::Fraction(i32::MAX), &plan), 0);
}

#[test]
fn fraction_passes_through_at_full_resolution() {
    let plan = FrequencyPlan::new(1_000, Some(1_000), CLK_SYS);
    assert_eq!(to_cycles(Duty::Fraction(250), &plan), 250);
    assert_eq!(to_cycles(Duty::Fraction(999), &plan), 999);
    assert_eq!(to_cycles(Duty::Fraction(1_000), &plan), 999);
    assert_eq!(to_cycles(Duty::Fraction(0), &plan), DUTY_OFF);
    assert_eq!(to_cycles(Duty::Fraction(-300), &plan), DUTY_OFF);
}

#[test]
fn fraction_is_rescaled_when_resolution_is_reduced() {
    let plan = FrequencyPlan::new(38_000, None, CLK_SYS);
    assert_eq!(plan.effective_cycle_length(), 1_645);

    // 6500 / 65535 of 1645 cycles.
    assert_eq!(to_cycles(Duty::Fraction(6_500), &plan), 163);
    // Half duty stays half.
    assert_eq!(to_cycles(Duty::Fraction(32_768), &plan), 822);
    // Full scale lands on the last cycle.
    assert_eq!(to_cycles(Duty::Fraction(65_535), &plan), 1_644);
    // Rounds down to 0, which is off.
    assert_eq!(to_cycles(Duty::Fraction(30), &plan), DUTY_OFF);
}

#[test]
fn fraction_is_scaled_by_the_correction_factor() {
    // Counts at 2030 Hz instead of 1000 Hz.
    let plan = FrequencyPlan::new(100, Some(10), CLK_SYS);
    assert!(!plan.correction().is_unity());

    assert_eq!(to_cycles(Duty::Fraction(3), &plan), 6);
    assert_eq!(to_cycles(Duty::Fraction(4), &plan), 8);
    assert_eq!(to_cycles(Duty::Fraction(5), &plan), 9);
}

#[test]
fn nanoseconds_follow_the_counting_rate() {
    let plan = FrequencyPlan::new(1_000, Some(1_000), CLK_SYS);
    // 1 µs per cycle.
    assert_eq!(to_cycles(Duty::Nanoseconds(500_000), &plan), 500);
    assert_eq!(to_cycles(Duty::Nanoseconds(1_999), &plan), 1);
    assert_eq!(to_cycles(Duty::Nanoseconds(999), &plan), DUTY_OFF);
    assert_eq!(to_cycles(Duty::Nanoseconds(-1_000), &plan), DUTY_OFF);
    assert_eq!(to_cycles(Duty::Nanoseconds(i64::MAX), &plan), 999);
}

#[test]
fn nanoseconds_include_the_correction_once() {
    // 1 ms of a 10 ms period: nominally 1 cycle, 2.03 at the compensated rate.
    let plan = FrequencyPlan::new(100, Some(10), CLK_SYS);
    assert_eq!(to_cycles(Duty::Nanoseconds(1_000_000), &plan), 2);
    assert_eq!(to_cycles(Duty::Nanoseconds(4_000_000), &plan), 8);
}

#[test]
fn nanoseconds_at_reduced_resolution_use_the_fast_clock() {
    let plan = FrequencyPlan::new(38_000, None, CLK_SYS);
    // 62.5 MHz counting: 16 ns per cycle.
    assert_eq!(to_cycles(Duty::Nanoseconds(1_600), &plan), 100);
}
