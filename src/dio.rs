//! Bidirectional poke DIO lines.
//!
//! Each poke has one DIO line that the host can configure as an input or an
//! output. The output latch is kept for every line; only lines configured as
//! outputs are driven from it.

use crate::error::ValueError;
use crate::hal::DigitalPin;

/// Number of poke DIO lines.
pub const DIO_COUNT: usize = 3;

/// Mask covering every DIO bit.
pub const DIO_MASK: u8 = (1 << DIO_COUNT) - 1;

fn check_mask(mask: u8) -> Result<u8, ValueError> {
    if mask & !DIO_MASK != 0 {
        Err(ValueError::ReservedBits((mask & !DIO_MASK) as u16))
    } else {
        Ok(mask)
    }
}

/// The three poke DIO lines with their direction and output latch.
pub struct PokeDios<P: DigitalPin> {
    pins: [P; DIO_COUNT],
    direction: u8,
    outputs: u8,
}

impl<P: DigitalPin> PokeDios<P> {
    /// Takes the pins and configures every line as an input.
    pub fn new(pins: [P; DIO_COUNT]) -> Self {
        let mut dios = Self {
            pins,
            direction: 0,
            outputs: 0,
        };
        dios.reset();
        dios
    }

    /// Returns every line to input with a cleared latch.
    pub fn reset(&mut self) {
        self.outputs = 0;
        self.direction = 0;
        for pin in self.pins.iter_mut() {
            pin.clear();
            pin.set_output_enabled(false);
        }
    }

    /// Direction mask, 1 = output.
    #[inline]
    pub fn direction(&self) -> u8 {
        self.direction
    }

    /// Output latch.
    #[inline]
    pub fn outputs(&self) -> u8 {
        self.outputs
    }

    /// Sets the direction of every line and drives new outputs from the latch.
    pub fn configure(&mut self, direction: u8) -> Result<(), ValueError> {
        let direction = check_mask(direction)?;
        self.direction = direction;
        for (line, pin) in self.pins.iter_mut().enumerate() {
            let output = direction & (1 << line) != 0;
            pin.set_output_enabled(output);
        }
        self.drive();
        Ok(())
    }

    pub fn set(&mut self, mask: u8) -> Result<(), ValueError> {
        self.outputs |= check_mask(mask)?;
        self.drive();
        Ok(())
    }

    pub fn clear(&mut self, mask: u8) -> Result<(), ValueError> {
        self.outputs &= !check_mask(mask)?;
        self.drive();
        Ok(())
    }

    pub fn toggle(&mut self, mask: u8) -> Result<(), ValueError> {
        self.outputs ^= check_mask(mask)?;
        self.drive();
        Ok(())
    }

    /// Replaces the whole latch.
    pub fn write(&mut self, mask: u8) -> Result<(), ValueError> {
        self.outputs = check_mask(mask)?;
        self.drive();
        Ok(())
    }

    fn drive(&mut self) {
        for (line, pin) in self.pins.iter_mut().enumerate() {
            let bit = 1 << line;
            if self.direction & bit == 0 {
                continue;
            }
            if self.outputs & bit != 0 {
                pin.set();
            } else {
                pin.clear();
            }
        }
    }

    /// Level of every line, read live.
    pub fn levels(&self) -> u8 {
        self.pins
            .iter()
            .enumerate()
            .filter(|(_, pin)| pin.read())
            .fold(0, |mask, (line, _)| mask | (1 << line))
    }

    /// Level of the lines configured as inputs.
    pub fn inputs(&self) -> u8 {
        self.levels() & !self.direction
    }
}
