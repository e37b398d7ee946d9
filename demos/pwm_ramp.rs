//! 38 kHz PWM on GPIO 12 with a squared brightness ramp.
//!
//! Wire an LED (with resistor) or a scope to GPIO 12.
#![no_std]
#![no_main]

use core::convert::Infallible;

use defmt::info;
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_time::Timer;
use panic_probe as _;
use pio_pwm::Result;
use pio_pwm::duty::Duty;
use pio_pwm::pio_pwm::PioPwm;
use pio_pwm::pwm_channel::PwmConfig;

#[embassy_executor::main]
async fn main(_spawner: Spawner) -> ! {
    let err = inner_main().await.unwrap_err();
    core::panic!("{err}");
}

async fn inner_main() -> Result<Infallible> {
    let p = embassy_rp::init(Default::default());
    let pio_pwm = PioPwm::new(p.PIO0, p.PIO1);

    let mut pwm = pio_pwm.channel(
        p.PIN_12,
        PwmConfig::new()
            .with_frequency(38_000)
            .with_duty(Duty::Fraction(6_500)),
    )?;
    if let Some(plan) = pwm.plan() {
        info!(
            "channel {}: sm clock {}Hz, cycle length {}",
            pwm.id().index(),
            plan.sequencer_clock_hz(),
            plan.effective_cycle_length()
        );
    }

    loop {
        for step in 0..=u8::MAX {
            let level = u16::from(step) * u16::from(step);
            pwm.set_duty_fraction(level);
            Timer::after_millis(10).await;
        }
    }
}
