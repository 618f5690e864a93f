//! RGB indicator colours and bus byte order.
//!
//! Colours are `palette::Srgb<u8>`. The indicator chain shifts each LED's
//! bytes in green, red, blue order, and the colour registers expose the same
//! order so a register payload is a valid bus frame slice as-is.

use palette::Srgb;

/// One indicator colour, 8 bits per component.
pub type RgbColor = Srgb<u8>;

/// Colour sent for an indicator that is off.
pub const COLOR_OFF: RgbColor = Srgb::new(0, 0, 0);

/// Number of chained indicators.
pub const RGB_COUNT: usize = 2;

/// Bytes in one complete bus frame.
pub const RGB_FRAME_LEN: usize = 3 * RGB_COUNT;

/// Converts a colour to its `[green, red, blue]` bus bytes.
#[inline]
pub fn to_bus_order(color: RgbColor) -> [u8; 3] {
    [color.green, color.red, color.blue]
}

/// Builds a colour from `[green, red, blue]` bus bytes.
#[inline]
pub fn from_bus_order(bytes: [u8; 3]) -> RgbColor {
    Srgb::new(bytes[1], bytes[0], bytes[2])
}

/// Builds the full chain frame, blanking indicators that are off.
pub fn frame(colors: &[RgbColor; RGB_COUNT], on: [bool; RGB_COUNT]) -> [u8; RGB_FRAME_LEN] {
    let mut out = [0u8; RGB_FRAME_LEN];
    for (slot, chunk) in out.chunks_exact_mut(3).enumerate() {
        let color = if on[slot] { colors[slot] } else { COLOR_OFF };
        chunk.copy_from_slice(&to_bus_order(color));
    }
    out
}
