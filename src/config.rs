//! Runtime configuration and reset defaults.

use crate::channel::ChannelKind;
use crate::event::{EVT_ADC, EVT_POKE_DIG_IN, EVT_POKE_DIOS_IN, EVT_POKE_IN};

/// Timer input clock of the reference board.
pub const DEFAULT_TIMER_CLOCK_HZ: u32 = 32_000_000;

/// Board parameters the core cannot discover on its own.
///
/// The scheduler tick (500 µs on the reference board) and the sampler period
/// (1 ms) are owned by the platform timers that call
/// [`on_tick`](crate::hal::InterruptHandlers::on_tick) and
/// [`on_sample`](crate::hal::InterruptHandlers::on_sample).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceConfig {
    /// Clock feeding the PWM, camera and servo timers before prescaling.
    pub timer_clock_hz: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            timer_clock_hz: DEFAULT_TIMER_CLOCK_HZ,
        }
    }
}

/// Values loaded at boot and by a reinitialize command.
pub mod defaults {
    use super::*;

    pub const PULSE_POKE_LED: u16 = 200;
    pub const PULSE_POKE_VALVE: u16 = 15;
    pub const PULSE_STATUS_LED: u16 = 500;
    pub const PULSE_RGB: u16 = 500;
    pub const PULSE_GENERAL_OUTPUT: u16 = 1000;

    pub const PWM_FREQUENCY_HZ: u16 = 1000;
    pub const PWM_DUTY_PERCENT: u8 = 50;

    pub const CAMERA_FREQUENCY_HZ: u16 = 100;
    pub const SERVO_PERIOD_US: u16 = 20_000;
    pub const SERVO_PULSE_US: u16 = 1_500;

    /// Indicator colours in bus order.
    pub const RGB0: [u8; 3] = [64, 16, 16];
    pub const RGB1: [u8; 3] = [16, 16, 64];

    pub const LED_CURRENT: u8 = 10;
    pub const LED_MAX_CURRENT: u8 = 30;

    pub const EVENT_ENABLE: u8 = EVT_POKE_IN | EVT_POKE_DIG_IN | EVT_POKE_DIOS_IN | EVT_ADC;

    /// Pulse length loaded for a channel of `kind`.
    pub const fn pulse_ticks(kind: ChannelKind) -> u16 {
        match kind {
            ChannelKind::PokeLed => PULSE_POKE_LED,
            ChannelKind::PokeValve => PULSE_POKE_VALVE,
            ChannelKind::StatusLed => PULSE_STATUS_LED,
            ChannelKind::RgbIndicator => PULSE_RGB,
            ChannelKind::GeneralOutput => PULSE_GENERAL_OUTPUT,
        }
    }
}
