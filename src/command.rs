//! Bitmask commands for the output channels.

use crate::channel::{ChannelId, OUTPUT_COUNT};

/// Action applied to a single output channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputAction {
    /// Activate (starts a pulse in Pulsed mode).
    Set,
    /// Deactivate and cancel any countdown.
    Clear,
    /// Clear if active, Set otherwise.
    Toggle,
    /// Make the channel's state match the level.
    Drive(bool),
}

/// Host command addressing several channels through a bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputCommand {
    /// `OUTPUTS_SET`
    Set(u16),
    /// `OUTPUTS_CLEAR`
    Clear(u16),
    /// `OUTPUTS_TOGGLE`
    Toggle(u16),
    /// `OUTPUTS_OUT`: every channel follows its bit.
    Write(u16),
}

impl OutputCommand {
    /// Expands the command into per-channel actions, in bit order.
    ///
    /// Bits above the last channel are ignored.
    pub fn actions(self) -> impl Iterator<Item = (ChannelId, OutputAction)> {
        ChannelId::ALL.into_iter().filter_map(move |id| {
            let selected = self.mask() & id.bit() != 0;
            match self {
                OutputCommand::Set(_) => selected.then_some((id, OutputAction::Set)),
                OutputCommand::Clear(_) => selected.then_some((id, OutputAction::Clear)),
                OutputCommand::Toggle(_) => selected.then_some((id, OutputAction::Toggle)),
                OutputCommand::Write(_) => Some((id, OutputAction::Drive(selected))),
            }
        })
    }

    /// The raw bitmask.
    pub fn mask(self) -> u16 {
        match self {
            OutputCommand::Set(mask)
            | OutputCommand::Clear(mask)
            | OutputCommand::Toggle(mask)
            | OutputCommand::Write(mask) => mask,
        }
    }
}

/// Mask covering every output channel bit.
pub const OUTPUT_MASK: u16 = (1 << OUTPUT_COUNT) - 1;
