//! Output channels and the pulse-countdown scheduler.
//!
//! Provides [`OutputController`], which owns every output channel and runs the
//! Direct/Pulsed state machine. Ordinary outputs drive a [`DigitalPin`]; the
//! two RGB indicators only keep an "on" flag and are rendered to the shared
//! bus in one batched frame.
//!
//! # Ownership of `remaining_ticks`
//!
//! Only [`OutputController::tick`] decrements a countdown. Command context
//! writes it once, as the initial value in [`OutputController::activate`], and
//! that assignment runs inside a critical section because the counter is wider
//! than a single store on 8-bit targets.

use crate::colors::{self, RGB_COUNT, RGB_FRAME_LEN, RgbColor};
use crate::command::{OutputAction, OutputCommand};
use crate::config::defaults;
use crate::error::ValueError;
use crate::hal::{DigitalPin, RgbBus};
use crate::pwm::PwmChannelId;

/// Number of output channels.
pub const OUTPUT_COUNT: usize = 14;

/// Output channels, numbered by their bit in the `OUTPUTS_*` registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ChannelId {
    Poke0Led = 0,
    Poke1Led,
    Poke2Led,
    Poke0Valve,
    Poke1Valve,
    Poke2Valve,
    Led0,
    Led1,
    Rgb0,
    Rgb1,
    Do0,
    Do1,
    Do2,
    Do3,
}

impl ChannelId {
    /// All channels in bit order.
    pub const ALL: [ChannelId; OUTPUT_COUNT] = [
        ChannelId::Poke0Led,
        ChannelId::Poke1Led,
        ChannelId::Poke2Led,
        ChannelId::Poke0Valve,
        ChannelId::Poke1Valve,
        ChannelId::Poke2Valve,
        ChannelId::Led0,
        ChannelId::Led1,
        ChannelId::Rgb0,
        ChannelId::Rgb1,
        ChannelId::Do0,
        ChannelId::Do1,
        ChannelId::Do2,
        ChannelId::Do3,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Bit of this channel in the `OUTPUTS_*` bitmasks.
    #[inline]
    pub const fn bit(self) -> u16 {
        1 << self as u16
    }

    pub const fn kind(self) -> ChannelKind {
        match self {
            ChannelId::Poke0Led | ChannelId::Poke1Led | ChannelId::Poke2Led => {
                ChannelKind::PokeLed
            }
            ChannelId::Poke0Valve | ChannelId::Poke1Valve | ChannelId::Poke2Valve => {
                ChannelKind::PokeValve
            }
            ChannelId::Led0 | ChannelId::Led1 => ChannelKind::StatusLed,
            ChannelId::Rgb0 | ChannelId::Rgb1 => ChannelKind::RgbIndicator,
            ChannelId::Do0 | ChannelId::Do1 | ChannelId::Do2 | ChannelId::Do3 => {
                ChannelKind::GeneralOutput
            }
        }
    }

    /// Indicator slot for RGB channels.
    pub const fn rgb_slot(self) -> Option<usize> {
        match self {
            ChannelId::Rgb0 => Some(0),
            ChannelId::Rgb1 => Some(1),
            _ => None,
        }
    }

    /// PWM timer paired with a general-purpose output.
    pub const fn pwm(self) -> Option<PwmChannelId> {
        match self {
            ChannelId::Do0 => Some(PwmChannelId::Do0),
            ChannelId::Do1 => Some(PwmChannelId::Do1),
            ChannelId::Do2 => Some(PwmChannelId::Do2),
            ChannelId::Do3 => Some(PwmChannelId::Do3),
            _ => None,
        }
    }
}

/// What an output physically drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelKind {
    PokeLed,
    PokeValve,
    StatusLed,
    RgbIndicator,
    GeneralOutput,
}

/// Operating mode of an output channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputMode {
    /// Stays in the last commanded state.
    #[default]
    Direct,
    /// Turns itself off after the configured number of ticks.
    Pulsed,
}

impl OutputMode {
    /// Decodes a `MODE_*` register value.
    pub fn from_register(value: u8) -> Result<Self, ValueError> {
        match value {
            0 => Ok(OutputMode::Direct),
            1 => Ok(OutputMode::Pulsed),
            other => Err(ValueError::InvalidMode(other)),
        }
    }

    /// Encodes for a `MODE_*` register.
    pub const fn to_register(self) -> u8 {
        match self {
            OutputMode::Direct => 0,
            OutputMode::Pulsed => 1,
        }
    }
}

/// Smallest accepted pulse length.
pub const MIN_PULSE_TICKS: u16 = 1;

/// Effect of an action on a channel's level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Transition {
    Activated,
    Deactivated,
    Unchanged,
}

/// Pins for every non-RGB output, grouped as on the board.
pub struct OutputPins<P> {
    pub poke_leds: [P; 3],
    pub poke_valves: [P; 3],
    pub leds: [P; 2],
    pub digital_outputs: [P; 4],
}

/// One output channel's state.
#[derive(Debug)]
pub struct OutputChannel<P> {
    id: ChannelId,
    mode: OutputMode,
    pulse_ticks: u16,
    remaining_ticks: u32,
    level: bool,
    pin: Option<P>,
}

impl<P: DigitalPin> OutputChannel<P> {
    fn new(id: ChannelId, pin: Option<P>) -> Self {
        Self {
            id,
            mode: OutputMode::Direct,
            pulse_ticks: defaults::pulse_ticks(id.kind()),
            remaining_ticks: 0,
            level: false,
            pin,
        }
    }

    fn drive(&mut self, level: bool) {
        self.level = level;
        if let Some(pin) = self.pin.as_mut() {
            if level {
                pin.set();
            } else {
                pin.clear();
            }
        }
    }

    #[inline]
    pub fn id(&self) -> ChannelId {
        self.id
    }

    #[inline]
    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    #[inline]
    pub fn pulse_ticks(&self) -> u16 {
        self.pulse_ticks
    }

    /// Ticks left before a pulse ends; zero when no pulse is running.
    #[inline]
    pub fn remaining_ticks(&self) -> u32 {
        self.remaining_ticks
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.level
    }

    /// Level seen on the line, or the "on" flag for RGB indicators.
    pub fn line_level(&self) -> bool {
        match self.pin.as_ref() {
            Some(pin) => pin.read(),
            None => self.level,
        }
    }
}

/// Owns all output channels and the batched RGB indicator state.
pub struct OutputController<P: DigitalPin> {
    channels: [OutputChannel<P>; OUTPUT_COUNT],
    colors: [RgbColor; RGB_COUNT],
    rgb_pending: bool,
    last_frame: Option<[u8; RGB_FRAME_LEN]>,
}

impl<P: DigitalPin> OutputController<P> {
    /// Creates the controller with every output low and in Direct mode.
    pub fn new(pins: OutputPins<P>) -> Self {
        let OutputPins {
            poke_leds,
            poke_valves,
            leds,
            digital_outputs,
        } = pins;
        let mut pins = poke_leds
            .into_iter()
            .chain(poke_valves)
            .chain(leds)
            .chain(digital_outputs);

        let channels = core::array::from_fn(|index| {
            let id = ChannelId::ALL[index];
            let pin = match id.kind() {
                ChannelKind::RgbIndicator => None,
                _ => pins.next(),
            };
            let mut channel = OutputChannel::new(id, pin);
            channel.drive(false);
            channel
        });

        Self {
            channels,
            colors: [
                colors::from_bus_order(defaults::RGB0),
                colors::from_bus_order(defaults::RGB1),
            ],
            rgb_pending: true,
            last_frame: None,
        }
    }

    /// Restores reset modes, pulse lengths and colours, and drives everything low.
    pub fn reset_defaults(&mut self) {
        for channel in self.channels.iter_mut() {
            channel.mode = OutputMode::Direct;
            channel.pulse_ticks = defaults::pulse_ticks(channel.id.kind());
        }
        self.set_color(0, colors::from_bus_order(defaults::RGB0));
        self.set_color(1, colors::from_bus_order(defaults::RGB1));
        self.all_off();
    }

    pub fn channel(&self, id: ChannelId) -> &OutputChannel<P> {
        &self.channels[id.index()]
    }

    pub fn mode(&self, id: ChannelId) -> OutputMode {
        self.channels[id.index()].mode
    }

    pub fn pulse_ticks(&self, id: ChannelId) -> u16 {
        self.channels[id.index()].pulse_ticks
    }

    pub fn remaining_ticks(&self, id: ChannelId) -> u32 {
        self.channels[id.index()].remaining_ticks
    }

    pub fn is_active(&self, id: ChannelId) -> bool {
        self.channels[id.index()].level
    }

    /// Changes the operating mode. Does not touch the output level.
    pub fn set_mode(&mut self, id: ChannelId, mode: OutputMode) {
        self.channels[id.index()].mode = mode;
    }

    /// Changes the pulse length used by the next activation.
    pub fn set_pulse_ticks(&mut self, id: ChannelId, ticks: u16) -> Result<(), ValueError> {
        if ticks < MIN_PULSE_TICKS {
            return Err(ValueError::OutOfRange {
                value: ticks,
                min: MIN_PULSE_TICKS,
                max: u16::MAX,
            });
        }
        self.channels[id.index()].pulse_ticks = ticks;
        Ok(())
    }

    /// Sets mode and pulse length together. Pure configuration.
    pub fn configure(
        &mut self,
        id: ChannelId,
        mode: OutputMode,
        pulse_ticks: u16,
    ) -> Result<(), ValueError> {
        self.set_pulse_ticks(id, pulse_ticks)?;
        self.set_mode(id, mode);
        Ok(())
    }

    /// Drives the channel high, arming the countdown in Pulsed mode.
    ///
    /// The countdown starts at `pulse_ticks + 1`: the first tick after
    /// activation arrives part-way through a period, so the extra tick makes
    /// the high time cover `pulse_ticks` whole periods.
    pub fn activate(&mut self, id: ChannelId) {
        let channel = &mut self.channels[id.index()];
        channel.drive(true);

        let remaining = match channel.mode {
            OutputMode::Pulsed => channel.pulse_ticks as u32 + 1,
            OutputMode::Direct => 0,
        };
        critical_section::with(|_| channel.remaining_ticks = remaining);

        if id.rgb_slot().is_some() {
            self.rgb_pending = true;
        }

        #[cfg(feature = "defmt")]
        defmt::trace!("{} activated, countdown {}", id, remaining);
    }

    /// Drives the channel low and cancels its countdown.
    pub fn deactivate(&mut self, id: ChannelId) {
        let channel = &mut self.channels[id.index()];
        channel.drive(false);
        critical_section::with(|_| channel.remaining_ticks = 0);

        if id.rgb_slot().is_some() {
            self.rgb_pending = true;
        }

        #[cfg(feature = "defmt")]
        defmt::trace!("{} deactivated", id);
    }

    /// Deactivates an active channel, activates an inactive one.
    ///
    /// On an inactive Pulsed channel this starts a fresh timed pulse.
    pub fn toggle(&mut self, id: ChannelId) -> Transition {
        if self.is_active(id) {
            self.deactivate(id);
            Transition::Deactivated
        } else {
            self.activate(id);
            Transition::Activated
        }
    }

    /// Applies a single action and reports what changed.
    pub fn handle_action(&mut self, id: ChannelId, action: OutputAction) -> Transition {
        match action {
            OutputAction::Set => {
                self.activate(id);
                Transition::Activated
            }
            OutputAction::Clear => {
                self.deactivate(id);
                Transition::Deactivated
            }
            OutputAction::Toggle => self.toggle(id),
            OutputAction::Drive(true) if !self.is_active(id) => {
                self.activate(id);
                Transition::Activated
            }
            OutputAction::Drive(true) => Transition::Unchanged,
            OutputAction::Drive(false) => {
                self.deactivate(id);
                Transition::Deactivated
            }
        }
    }

    /// Applies a bitmask command, returning the mask of deactivated channels.
    pub fn apply(&mut self, command: OutputCommand) -> u16 {
        let mut deactivated = 0;
        for (id, action) in command.actions() {
            if self.handle_action(id, action) == Transition::Deactivated {
                deactivated |= id.bit();
            }
        }
        deactivated
    }

    /// Advances every running countdown by one tick.
    ///
    /// Returns the mask of channels whose pulse ended on this tick.
    pub fn tick(&mut self) -> u16 {
        let mut expired = 0;
        for index in 0..OUTPUT_COUNT {
            let channel = &mut self.channels[index];
            if channel.remaining_ticks == 0 {
                continue;
            }
            channel.remaining_ticks -= 1;
            if channel.remaining_ticks == 0 {
                let id = channel.id;
                self.deactivate(id);
                expired |= id.bit();
            }
        }
        expired
    }

    /// Drives every output low and zeroes every countdown.
    pub fn all_off(&mut self) {
        for id in ChannelId::ALL {
            self.deactivate(id);
        }
    }

    /// Bitmask of channel levels, read back from the lines.
    pub fn state_mask(&self) -> u16 {
        self.channels
            .iter()
            .filter(|channel| channel.line_level())
            .fold(0, |mask, channel| mask | channel.id.bit())
    }

    pub fn color(&self, slot: usize) -> RgbColor {
        self.colors[slot]
    }

    /// Updates an indicator colour; the bus is refreshed on the next flush.
    pub fn set_color(&mut self, slot: usize, color: RgbColor) {
        if self.colors[slot] != color {
            self.colors[slot] = color;
            self.rgb_pending = true;
        }
    }

    /// Frame the bus should currently show.
    pub fn rgb_frame(&self) -> [u8; RGB_FRAME_LEN] {
        colors::frame(
            &self.colors,
            [
                self.is_active(ChannelId::Rgb0),
                self.is_active(ChannelId::Rgb1),
            ],
        )
    }

    /// Returns true if an RGB change is waiting for the bus.
    #[inline]
    pub fn rgb_pending(&self) -> bool {
        self.rgb_pending
    }

    /// Writes the combined frame if it changed since the last write.
    ///
    /// The transfer runs inside a critical section so no tick can interleave
    /// a second frame with a half-shifted one.
    pub fn flush_rgb<B: RgbBus>(&mut self, bus: &mut B) -> bool {
        if !self.rgb_pending {
            return false;
        }
        self.rgb_pending = false;

        let frame = self.rgb_frame();
        if self.last_frame == Some(frame) {
            return false;
        }

        critical_section::with(|_| bus.write_bus(&frame));
        self.last_frame = Some(frame);
        true
    }

    /// Blanks both indicators on the bus regardless of pending state.
    pub fn blank_rgb<B: RgbBus>(&mut self, bus: &mut B) {
        let frame = [0u8; RGB_FRAME_LEN];
        critical_section::with(|_| bus.write_bus(&frame));
        self.last_frame = Some(frame);
        self.rgb_pending = false;
    }
}
