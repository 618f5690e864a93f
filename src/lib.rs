#![cfg_attr(not(feature = "std"), no_std)]
#![doc = include_str!("../README.md")]

//! # Core Concepts
//!
//! - **`Device`**: The single owned context; validates host accesses and services interrupts
//! - **`RegisterBank`**: Address/type/arity validation and the stored register image
//! - **`OutputController`**: Direct/Pulsed state machine, pulse countdown and RGB batching
//! - **`PwmEngine`**: Frequency/duty solver with commit-at-period-boundary reconfiguration
//! - **`EventGate`**: Filters asynchronous events through the host's enable mask
//! - **`TriggerEngine`**: Camera frame triggers and servo outputs, committed like the PWM outputs
//! - **`Hardware`**: Trait bundle to implement for your board (pins, timers, ADC, bus, host link)
//! - **`InterruptHandlers`**: Entry points your interrupt vectors forward to
//!
//! Register payloads are little-endian. RGB colours are `Srgb<u8>` and travel in
//! green, red, blue order, matching the indicator chain.

// Re-export Srgb from palette for user convenience
pub use palette::Srgb;

pub mod bank;
pub mod channel;
pub mod colors;
pub mod command;
pub mod config;
pub mod device;
pub mod dio;
pub mod error;
pub mod event;
pub mod hal;
pub mod pwm;
pub mod registers;
pub mod trigger;

pub use bank::{RegisterBank, RegisterImage};
pub use channel::{ChannelId, ChannelKind, OutputController, OutputMode, OutputPins, Transition};
pub use colors::{COLOR_OFF, RgbColor};
pub use command::{OutputAction, OutputCommand};
pub use config::DeviceConfig;
pub use device::{Device, Peripherals};
pub use dio::PokeDios;
pub use error::{AccessError, ValueError};
pub use event::{EventGate, EventSource};
pub use hal::{
    AnalogInput, DigitalPin, EventSink, Hardware, InputLine, InterruptHandlers, PwmTimer,
    QuadratureEncoder, RgbBus,
};
pub use pwm::{Prescaler, PwmChannel, PwmChannelId, PwmEngine, TimerSettings};
pub use registers::{ElementType, Register, RegisterDescriptor, RegisterValue};
pub use trigger::{CameraChannel, CameraId, ServoChannel, ServoId, TriggerEngine};

#[cfg(test)]
mod tests {
    use super::*;
    use registers::Access;

    #[test]
    fn every_output_channel_has_mode_and_pulse_register() {
        for id in ChannelId::ALL {
            let mode = Register::from_address(Register::ModePoke0Led.address() + id.index() as u8);
            let pulse =
                Register::from_address(Register::PulsePoke0Led.address() + id.index() as u8);
            let (mode, pulse) = (mode.unwrap(), pulse.unwrap());
            assert_eq!(mode.block_offset(Register::ModePoke0Led), id.index());
            assert_eq!(mode.descriptor().element_type, ElementType::U8);
            assert_eq!(pulse.descriptor().element_type, ElementType::U16);
            assert_eq!(pulse.descriptor().access, Access::ReadWrite);
        }
        assert_eq!(Register::ModeDo3.block_offset(Register::ModePoke0Led), ChannelId::Do3.index());
    }

    #[test]
    fn pwm_channels_have_frequency_and_duty_registers() {
        for id in PwmChannelId::ALL {
            let frequency = Register::from_address(Register::FreqDo0.address() + id.index() as u8);
            let duty = Register::from_address(Register::DcycleDo0.address() + id.index() as u8);
            assert_eq!(frequency.map(|r| r.descriptor().element_type), Some(ElementType::U16));
            assert_eq!(duty.map(|r| r.descriptor().element_type), Some(ElementType::U8));
        }
        assert_eq!(Register::DcycleDo3.block_offset(Register::DcycleDo0), 3);
    }
}
