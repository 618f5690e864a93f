//! Register bank: access validation and the values no other component owns.
//!
//! Every host access passes [`RegisterBank::validate_read`] or
//! [`RegisterBank::validate_write`] before a handler runs. A failed
//! validation has no side effect.

use heapless::LinearMap;

use crate::config::defaults;
use crate::error::{AccessError, ValueError};
use crate::registers::{ElementType, Payload, Register, RegisterDescriptor};

/// Number of status LEDs with a current setting.
pub const LED_COUNT: usize = 2;

pub const MIN_LED_CURRENT: u8 = 1;
pub const MIN_LED_MAX_CURRENT: u8 = 2;
pub const MAX_LED_CURRENT: u8 = 100;

const COMMAND_REGISTERS: usize = 15;

/// Stored register values that belong to no other component.
///
/// Sensor caches are refreshed by interrupts and the sampler; command
/// registers keep the last accepted value so polling them succeeds.
#[derive(Debug, Clone)]
pub struct RegisterImage {
    pub(crate) poke_in: u8,
    pub(crate) poke_dig_in: u8,
    pub(crate) poke_dios_in: u8,
    pub(crate) adc: u16,
    pub(crate) encoder: u16,
    pub(crate) encoder_enabled: bool,
    led_current: [u8; LED_COUNT],
    led_max_current: [u8; LED_COUNT],
    commands: LinearMap<Register, u16, COMMAND_REGISTERS>,
}

impl Default for RegisterImage {
    fn default() -> Self {
        Self {
            poke_in: 0,
            poke_dig_in: 0,
            poke_dios_in: 0,
            adc: 0,
            encoder: 0,
            encoder_enabled: false,
            led_current: [defaults::LED_CURRENT; LED_COUNT],
            led_max_current: [defaults::LED_MAX_CURRENT; LED_COUNT],
            commands: LinearMap::new(),
        }
    }
}

impl RegisterImage {
    /// Cached IR beam state.
    pub fn poke_in(&self) -> u8 {
        self.poke_in
    }

    /// Poke digital lines as of the last sample.
    pub fn poke_dig_in(&self) -> u8 {
        self.poke_dig_in
    }

    /// Cached DIO input state.
    pub fn poke_dios_in(&self) -> u8 {
        self.poke_dios_in
    }

    /// Last analog sample.
    pub fn adc(&self) -> u16 {
        self.adc
    }

    /// Last encoder sample.
    pub fn encoder(&self) -> u16 {
        self.encoder
    }

    pub fn encoder_enabled(&self) -> bool {
        self.encoder_enabled
    }

    pub fn led_current(&self, led: usize) -> u8 {
        self.led_current[led]
    }

    pub fn led_max_current(&self, led: usize) -> u8 {
        self.led_max_current[led]
    }

    /// Sets the drive current of `led`, bounded by its maximum.
    pub fn set_led_current(&mut self, led: usize, current: u8) -> Result<(), ValueError> {
        if !(MIN_LED_CURRENT..=MAX_LED_CURRENT).contains(&current) {
            return Err(ValueError::OutOfRange {
                value: current as u16,
                min: MIN_LED_CURRENT as u16,
                max: MAX_LED_CURRENT as u16,
            });
        }
        let max = self.led_max_current[led];
        if current > max {
            return Err(ValueError::ExceedsMaxCurrent { current, max });
        }
        self.led_current[led] = current;
        Ok(())
    }

    /// Sets the maximum current of `led`.
    ///
    /// Returns the clamped current if the present one was above the new
    /// maximum, so the caller can push it to the hardware.
    pub fn set_led_max_current(&mut self, led: usize, max: u8) -> Result<Option<u8>, ValueError> {
        if !(MIN_LED_MAX_CURRENT..=MAX_LED_CURRENT).contains(&max) {
            return Err(ValueError::OutOfRange {
                value: max as u16,
                min: MIN_LED_MAX_CURRENT as u16,
                max: MAX_LED_CURRENT as u16,
            });
        }
        self.led_max_current[led] = max;
        if self.led_current[led] > max {
            self.led_current[led] = max;
            return Ok(Some(max));
        }
        Ok(None)
    }

    /// Last accepted value of a command register, zero before the first write.
    pub fn command(&self, register: Register) -> u16 {
        self.commands.get(&register).copied().unwrap_or(0)
    }

    pub(crate) fn latch_command(&mut self, register: Register, value: u16) {
        // Capacity equals the number of command registers
        let _ = self.commands.insert(register, value);
    }
}

/// The validating front door of the register map.
#[derive(Debug, Clone, Default)]
pub struct RegisterBank {
    image: RegisterImage,
}

impl RegisterBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores every stored value to its reset default.
    pub fn reset(&mut self) {
        self.image = RegisterImage::default();
    }

    pub fn image(&self) -> &RegisterImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RegisterImage {
        &mut self.image
    }

    fn lookup(address: u8, element_type: ElementType) -> Result<RegisterDescriptor, AccessError> {
        let register = Register::from_address(address).ok_or(AccessError::InvalidAddress(address))?;
        let descriptor = register.descriptor();
        if descriptor.element_type != element_type {
            return Err(AccessError::TypeMismatch {
                register,
                expected: descriptor.element_type,
                actual: element_type,
            });
        }
        Ok(descriptor)
    }

    /// Checks a read of `address` by a caller expecting `element_type`.
    pub fn validate_read(
        &self,
        address: u8,
        element_type: ElementType,
    ) -> Result<RegisterDescriptor, AccessError> {
        let result = Self::lookup(address, element_type);

        #[cfg(feature = "defmt")]
        if let Err(error) = &result {
            defmt::warn!("read rejected: {}", error);
        }

        result
    }

    /// Checks a write and returns the payload for the register's handler.
    ///
    /// Rejects bad addresses, a wrong element type or count, and a payload
    /// whose length disagrees with the count. Whether the register accepts
    /// writes at all is up to its handler.
    pub fn validate_write<'a>(
        &self,
        address: u8,
        element_type: ElementType,
        payload: &'a [u8],
        element_count: u16,
    ) -> Result<(RegisterDescriptor, Payload<'a>), AccessError> {
        let result = Self::check_write(address, element_type, payload, element_count);

        #[cfg(feature = "defmt")]
        if let Err(error) = &result {
            defmt::warn!("write rejected: {}", error);
        }

        result
    }

    fn check_write<'a>(
        address: u8,
        element_type: ElementType,
        payload: &'a [u8],
        element_count: u16,
    ) -> Result<(RegisterDescriptor, Payload<'a>), AccessError> {
        let descriptor = Self::lookup(address, element_type)?;
        let register = descriptor.register;

        if element_count != descriptor.arity {
            return Err(AccessError::ArityMismatch {
                register,
                expected: descriptor.arity,
                actual: element_count,
            });
        }
        if payload.len() != descriptor.payload_len() {
            return Err(AccessError::PayloadLength {
                register,
                expected: descriptor.payload_len(),
                actual: payload.len(),
            });
        }
        Ok((descriptor, Payload::new(payload)))
    }
}
