//! Event gate: forwards enabled asynchronous events to the host.

use crate::error::ValueError;
use crate::hal::EventSink;
use crate::registers::{Register, RegisterValue};

/// IR beam edge, reported through `POKE_IN`.
pub const EVT_POKE_IN: u8 = 1 << 0;
/// Polled poke digital lines changed, reported through `POKE_DIG_IN`.
pub const EVT_POKE_DIG_IN: u8 = 1 << 1;
/// DIO edge, reported through `POKE_DIOS_IN`.
pub const EVT_POKE_DIOS_IN: u8 = 1 << 2;
/// Analog sample ready, reported through `ADC`.
pub const EVT_ADC: u8 = 1 << 3;
/// Encoder sample ready, reported through `ENCODER`.
pub const EVT_ENCODER: u8 = 1 << 4;
/// Camera 0 trigger emitted a frame, reported through `CAMERA0_FRAME`.
pub const EVT_CAMERA0: u8 = 1 << 5;
/// Camera 1 trigger emitted a frame, reported through `CAMERA1_FRAME`.
pub const EVT_CAMERA1: u8 = 1 << 6;

/// Every defined enable bit.
pub const EVENT_MASK: u8 = EVT_POKE_IN
    | EVT_POKE_DIG_IN
    | EVT_POKE_DIOS_IN
    | EVT_ADC
    | EVT_ENCODER
    | EVT_CAMERA0
    | EVT_CAMERA1;

/// Maps an asynchronous occurrence to the register it is reported through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EventSource {
    pub register: Register,
    pub enable_bit: u8,
}

/// All event sources.
pub const EVENT_SOURCES: [EventSource; 7] = [
    EventSource {
        register: Register::PokeIn,
        enable_bit: EVT_POKE_IN,
    },
    EventSource {
        register: Register::PokeDigIn,
        enable_bit: EVT_POKE_DIG_IN,
    },
    EventSource {
        register: Register::PokeDiosIn,
        enable_bit: EVT_POKE_DIOS_IN,
    },
    EventSource {
        register: Register::Adc,
        enable_bit: EVT_ADC,
    },
    EventSource {
        register: Register::Encoder,
        enable_bit: EVT_ENCODER,
    },
    EventSource {
        register: Register::Camera0Frame,
        enable_bit: EVT_CAMERA0,
    },
    EventSource {
        register: Register::Camera1Frame,
        enable_bit: EVT_CAMERA1,
    },
];

impl EventSource {
    /// Source reported through `register`, if any.
    pub fn for_register(register: Register) -> Option<EventSource> {
        EVENT_SOURCES
            .iter()
            .find(|source| source.register == register)
            .copied()
    }
}

/// Filters event notifications through the `EVNT_ENABLE` mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EventGate {
    enabled: u8,
}

impl EventGate {
    pub const fn new(enabled: u8) -> Self {
        Self {
            enabled: enabled & EVENT_MASK,
        }
    }

    #[inline]
    pub fn enabled(&self) -> u8 {
        self.enabled
    }

    /// Replaces the enable mask. Undefined bits are rejected.
    pub fn set_enabled(&mut self, mask: u8) -> Result<(), ValueError> {
        if mask & !EVENT_MASK != 0 {
            return Err(ValueError::ReservedBits((mask & !EVENT_MASK) as u16));
        }
        self.enabled = mask;
        Ok(())
    }

    pub fn is_enabled(&self, source: EventSource) -> bool {
        self.enabled & source.enable_bit != 0
    }

    /// Emits `(address, value)` if the source of `register` is enabled.
    ///
    /// `value` is only evaluated when the event is emitted. Never blocks;
    /// delivery is up to the sink. Returns true if a notification was sent.
    pub fn notify_if_enabled<S, F>(&self, sink: &mut S, register: Register, value: F) -> bool
    where
        S: EventSink,
        F: FnOnce() -> RegisterValue,
    {
        let Some(source) = EventSource::for_register(register) else {
            return false;
        };
        if !self.is_enabled(source) {
            return false;
        }

        sink.notify(register.address(), &value());
        true
    }
}

impl Default for EventGate {
    fn default() -> Self {
        Self::new(crate::config::defaults::EVENT_ENABLE)
    }
}
