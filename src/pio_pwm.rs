//! PIO-backed PWM for the Pico 1.
//!
//! [`PioPwm`] takes both PIO blocks, loads the PWM programs once per block and hands out
//! [`PwmChannel`]s on any GPIO pin, one state machine per channel.
//!
//! # Example
//!
//! ```rust,no_run
//! # #![no_std]
//! # #![no_main]
//! # use panic_probe as _;
//! use pio_pwm::{Result, duty::Duty, pio_pwm::PioPwm, pwm_channel::PwmConfig};
//!
//! fn example(p: embassy_rp::Peripherals) -> Result<()> {
//!     let pio_pwm = PioPwm::new(p.PIO0, p.PIO1);
//!
//!     // 38 kHz, ~10% duty on GPIO 12.
//!     let mut pwm = pio_pwm.channel(
//!         p.PIN_12,
//!         PwmConfig::new()
//!             .with_frequency(38_000)
//!             .with_duty(Duty::Fraction(6_500)),
//!     )?;
//!
//!     pwm.set_duty_ns(5_000); // 5 µs pulses
//!     pwm.stop();
//!     Ok(())
//! }
//! ```

use core::cell::RefCell;

use embassy_rp::clocks::clk_sys_freq;
use embassy_rp::gpio::Level;
use embassy_rp::peripherals::{PIO0, PIO1};
use embassy_rp::pio::{
    Common, Config, Direction, Instance, InterruptHandler, LoadedProgram, Pin, Pio, PioPin,
    StateMachine,
};
use embassy_rp::{Peri, bind_interrupts};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use fixed::types::U24F8;
use pio::{InstructionOperands, MovDestination, MovOperation, MovSource};
use static_cell::StaticCell;

use crate::Result;
use crate::channel_pool::{CHANNEL_COUNT, ChannelId, ChannelPool};
use crate::logging::{log_debug, log_info};
use crate::pwm_channel::{Polarity, PwmChannel, PwmConfig, Sequencer};

bind_interrupts!(struct Pio0Irqs {
    PIO0_IRQ_0 => InterruptHandler<PIO0>;
});

bind_interrupts!(struct Pio1Irqs {
    PIO1_IRQ_0 => InterruptHandler<PIO1>;
});

// Clock divider is 16.8 fixed point: at least 1, at most 65535 + 255/256.
const MIN_DIVIDER_BITS: u64 = 1 << 8;
const MAX_DIVIDER_BITS: u64 = 0x00FF_FFFF;

// ============================================================================
// PWM programs - one active-high and one active-low variant per PIO block
// ============================================================================

struct PwmPrograms<'d, PIO: Instance> {
    active_high: LoadedProgram<'d, PIO>,
    active_low: LoadedProgram<'d, PIO>,
}

impl<'d, PIO: Instance> PwmPrograms<'d, PIO> {
    fn load(common: &mut Common<'d, PIO>) -> Self {
        // x: duty, y: down-counter seeded from the cycle length latched in isr.
        // The pin goes active once y reaches x and stays there until the next period.
        let active_high = ::pio::pio_asm!(
            ".side_set 1 opt",
            "    pull noblock    side 0",
            "    mov x, osr",
            "    mov y, isr",
            "countloop:",
            "    jmp x!=y skip",
            "    nop             side 1",
            "skip:",
            "    jmp y-- countloop",
        );
        let active_low = ::pio::pio_asm!(
            ".side_set 1 opt",
            "    pull noblock    side 1",
            "    mov x, osr",
            "    mov y, isr",
            "countloop:",
            "    jmp x!=y skip",
            "    nop             side 0",
            "skip:",
            "    jmp y-- countloop",
        );
        Self {
            active_high: common.load_program(&active_high.program),
            active_low: common.load_program(&active_low.program),
        }
    }

    const fn get(&self, polarity: Polarity) -> &LoadedProgram<'d, PIO> {
        match polarity {
            Polarity::ActiveHigh => &self.active_high,
            Polarity::ActiveLow => &self.active_low,
        }
    }
}

// ============================================================================
// PIO bank - Common resource and programs of one PIO block
// ============================================================================

/// Shared state of one PIO block: the `Common` resource and the loaded PWM programs.
struct PioBank<PIO: Instance + 'static> {
    common: Mutex<CriticalSectionRawMutex, RefCell<Common<'static, PIO>>>,
    programs: PwmPrograms<'static, PIO>,
}

impl<PIO: Instance + 'static> PioBank<PIO> {
    fn new(mut common: Common<'static, PIO>) -> Self {
        let programs = PwmPrograms::load(&mut common);
        Self {
            common: Mutex::new(RefCell::new(common)),
            programs,
        }
    }

    fn with_common<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Common<'static, PIO>) -> R,
    {
        self.common.lock(|common_cell: &RefCell<Common<'static, PIO>>| {
            let mut common = common_cell.borrow_mut();
            f(&mut *common)
        })
    }
}

// ============================================================================
// PwmStateMachine - one state machine plus the pin bound to it
// ============================================================================

struct PwmStateMachine<PIO: Instance + 'static, const SM: usize> {
    bank: &'static PioBank<PIO>,
    state_machine: StateMachine<'static, PIO, SM>,
    pin: Option<Pin<'static, PIO>>,
    // Kept so arming can jump back to the program start with the same divider.
    config: Option<Config<'static, PIO>>,
}

impl<PIO: Instance + 'static, const SM: usize> PwmStateMachine<PIO, SM> {
    fn new(bank: &'static PioBank<PIO>, state_machine: StateMachine<'static, PIO, SM>) -> Self {
        Self {
            bank,
            state_machine,
            pin: None,
            config: None,
        }
    }

    fn attach(&mut self, pin: Peri<'static, impl PioPin>) {
        let pin = self.bank.with_common(|common| common.make_pio_pin(pin));
        self.pin = Some(pin);
        self.config = None;
    }

    fn detach(&mut self) {
        self.state_machine.set_enable(false);
        self.config = None;
        self.pin = None;
    }

    fn load_program(&mut self, polarity: Polarity, sequencer_clock_hz: u32, system_clock_hz: u32) {
        let Some(pin) = self.pin.as_ref() else {
            return;
        };
        self.state_machine.set_enable(false);

        let idle_level = match polarity {
            Polarity::ActiveHigh => Level::Low,
            Polarity::ActiveLow => Level::High,
        };
        self.state_machine.set_pins(idle_level, &[pin]);
        self.state_machine.set_pin_dirs(Direction::Out, &[pin]);

        let mut config = Config::default();
        config.use_program(self.bank.programs.get(polarity), &[pin]);
        config.clock_divider = clock_divider(system_clock_hz, sequencer_clock_hz);
        self.state_machine.set_config(&config);
        self.config = Some(config);
    }

    #[expect(unsafe_code, reason = "exec_instr runs raw instructions on the stopped state machine")]
    fn load_cycle_length(&mut self, cycle_length: u32) {
        let Some(config) = self.config.as_ref() else {
            return;
        };
        self.state_machine.set_enable(false);
        // set_config jumps back to the program origin.
        self.state_machine.set_config(config);
        self.state_machine.restart();
        self.state_machine.clear_fifos();
        if !self.state_machine.tx().try_push(cycle_length) {
            log_debug!("PioPwm: tx fifo full, cycle length {} dropped", cycle_length);
        }

        let pull = InstructionOperands::PULL {
            if_empty: false,
            block: false,
        };
        let latch = InstructionOperands::MOV {
            destination: MovDestination::ISR,
            op: MovOperation::None,
            source: MovSource::OSR,
        };
        // SAFETY: the state machine is stopped and both instructions only touch its own
        // OSR and ISR.
        unsafe {
            self.state_machine.exec_instr(pull.encode());
            self.state_machine.exec_instr(latch.encode());
        }
    }

    fn push(&mut self, value: u32) {
        // A duty value still queued is stale; the newest one replaces it.
        if !self.state_machine.tx().empty() {
            self.state_machine.clear_fifos();
        }
        if !self.state_machine.tx().try_push(value) {
            log_debug!("PioPwm: tx fifo full, value {} dropped", value);
        }
    }

    fn set_enable(&mut self, enable: bool) {
        self.state_machine.set_enable(enable);
    }
}

fn clock_divider(system_clock_hz: u32, sequencer_clock_hz: u32) -> U24F8 {
    let bits = (u64::from(system_clock_hz) << 8) / u64::from(sequencer_clock_hz.max(1));
    let bits = bits.clamp(MIN_DIVIDER_BITS, MAX_DIVIDER_BITS);
    #[expect(clippy::cast_possible_truncation, reason = "clamped to 24 bits above")]
    U24F8::from_bits(bits as u32)
}

// ============================================================================
// AnyPwmStateMachine - runtime-indexed view of the 8 typed state machines
// ============================================================================

enum AnyPwmStateMachine {
    Pio0Sm0(PwmStateMachine<PIO0, 0>),
    Pio0Sm1(PwmStateMachine<PIO0, 1>),
    Pio0Sm2(PwmStateMachine<PIO0, 2>),
    Pio0Sm3(PwmStateMachine<PIO0, 3>),
    Pio1Sm0(PwmStateMachine<PIO1, 0>),
    Pio1Sm1(PwmStateMachine<PIO1, 1>),
    Pio1Sm2(PwmStateMachine<PIO1, 2>),
    Pio1Sm3(PwmStateMachine<PIO1, 3>),
}

// Each arm is type-checked against its own PIO/SM type.
macro_rules! with_state_machine {
    ($any:expr, $state_machine:ident => $body:expr) => {
        match $any {
            AnyPwmStateMachine::Pio0Sm0($state_machine) => $body,
            AnyPwmStateMachine::Pio0Sm1($state_machine) => $body,
            AnyPwmStateMachine::Pio0Sm2($state_machine) => $body,
            AnyPwmStateMachine::Pio0Sm3($state_machine) => $body,
            AnyPwmStateMachine::Pio1Sm0($state_machine) => $body,
            AnyPwmStateMachine::Pio1Sm1($state_machine) => $body,
            AnyPwmStateMachine::Pio1Sm2($state_machine) => $body,
            AnyPwmStateMachine::Pio1Sm3($state_machine) => $body,
        }
    };
}

// ============================================================================
// PioPwm - process-wide owner of the pool and the state machines
// ============================================================================

/// Owner of both PIO blocks, their 8 state machines and the [`ChannelPool`] over them.
///
/// Create it once with [`PioPwm::new`], then call [`channel`](Self::channel) for each
/// PWM output. See the [module documentation](mod@crate::pio_pwm) for an example.
pub struct PioPwm {
    pool: ChannelPool,
    state_machines: Mutex<CriticalSectionRawMutex, RefCell<[AnyPwmStateMachine; CHANNEL_COUNT]>>,
}

impl PioPwm {
    /// Take both PIO blocks and load the PWM programs.
    ///
    /// # Panics
    ///
    /// Panics if called more than once.
    #[must_use]
    pub fn new(pio0: Peri<'static, PIO0>, pio1: Peri<'static, PIO1>) -> &'static Self {
        static BANK0: StaticCell<PioBank<PIO0>> = StaticCell::new();
        static BANK1: StaticCell<PioBank<PIO1>> = StaticCell::new();
        static PIO_PWM: StaticCell<PioPwm> = StaticCell::new();

        let Pio {
            common,
            sm0,
            sm1,
            sm2,
            sm3,
            ..
        } = Pio::new(pio0, Pio0Irqs);
        let bank0: &'static PioBank<PIO0> = BANK0.init(PioBank::new(common));

        let Pio {
            common: common1,
            sm0: sm4,
            sm1: sm5,
            sm2: sm6,
            sm3: sm7,
            ..
        } = Pio::new(pio1, Pio1Irqs);
        let bank1: &'static PioBank<PIO1> = BANK1.init(PioBank::new(common1));

        let state_machines = [
            AnyPwmStateMachine::Pio0Sm0(PwmStateMachine::new(bank0, sm0)),
            AnyPwmStateMachine::Pio0Sm1(PwmStateMachine::new(bank0, sm1)),
            AnyPwmStateMachine::Pio0Sm2(PwmStateMachine::new(bank0, sm2)),
            AnyPwmStateMachine::Pio0Sm3(PwmStateMachine::new(bank0, sm3)),
            AnyPwmStateMachine::Pio1Sm0(PwmStateMachine::new(bank1, sm4)),
            AnyPwmStateMachine::Pio1Sm1(PwmStateMachine::new(bank1, sm5)),
            AnyPwmStateMachine::Pio1Sm2(PwmStateMachine::new(bank1, sm6)),
            AnyPwmStateMachine::Pio1Sm3(PwmStateMachine::new(bank1, sm7)),
        ];
        log_info!("PioPwm: {} channels ready", CHANNEL_COUNT);

        PIO_PWM.init(Self {
            pool: ChannelPool::new(),
            state_machines: Mutex::new(RefCell::new(state_machines)),
        })
    }

    /// Create a PWM output on `pin`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResourceExhausted`](crate::Error::ResourceExhausted) if all 8 state
    /// machines are in use, or if `config.channel` is taken.
    pub fn channel(
        &'static self,
        pin: Peri<'static, impl PioPin>,
        config: PwmConfig,
    ) -> Result<PwmChannel<'static, PioSequencer>> {
        PwmChannel::new(&self.pool, config, |id| {
            self.with_slot(id, |any| with_state_machine!(any, sm => sm.attach(pin)));
            PioSequencer { pio_pwm: self, id }
        })
    }

    /// The pool tracking which state machines are in use.
    #[must_use]
    pub const fn pool(&self) -> &ChannelPool {
        &self.pool
    }

    fn with_slot<F, R>(&self, id: ChannelId, f: F) -> Option<R>
    where
        F: FnOnce(&mut AnyPwmStateMachine) -> R,
    {
        self.state_machines.lock(|cell| {
            let mut state_machines = cell.borrow_mut();
            state_machines.get_mut(usize::from(id.index())).map(f)
        })
    }
}

// ============================================================================
// PioSequencer - Sequencer implementation for one pooled state machine
// ============================================================================

/// [`Sequencer`] on one of the state machines owned by [`PioPwm`].
///
/// Dropping it stops the state machine and unbinds the pin.
pub struct PioSequencer {
    pio_pwm: &'static PioPwm,
    id: ChannelId,
}

impl Sequencer for PioSequencer {
    fn system_clock_hz(&self) -> u32 {
        clk_sys_freq()
    }

    fn load_program(&mut self, polarity: Polarity, sequencer_clock_hz: u32) {
        let system_clock_hz = self.system_clock_hz();
        self.pio_pwm.with_slot(self.id, |any| {
            with_state_machine!(any, sm => sm.load_program(polarity, sequencer_clock_hz, system_clock_hz));
        });
    }

    fn load_cycle_length(&mut self, cycle_length: u32) {
        self.pio_pwm.with_slot(self.id, |any| {
            with_state_machine!(any, sm => sm.load_cycle_length(cycle_length));
        });
    }

    fn push(&mut self, value: u32) {
        self.pio_pwm
            .with_slot(self.id, |any| with_state_machine!(any, sm => sm.push(value)));
    }

    fn start(&mut self) {
        self.pio_pwm
            .with_slot(self.id, |any| with_state_machine!(any, sm => sm.set_enable(true)));
    }

    fn stop(&mut self) {
        self.pio_pwm
            .with_slot(self.id, |any| with_state_machine!(any, sm => sm.set_enable(false)));
    }
}

impl Drop for PioSequencer {
    fn drop(&mut self) {
        self.pio_pwm
            .with_slot(self.id, |any| with_state_machine!(any, sm => sm.detach()));
    }
}
