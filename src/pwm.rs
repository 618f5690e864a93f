//! PWM reconfiguration engine for the general-purpose outputs.
//!
//! Each of DO0..DO3 has its own 16-bit timer. A frequency or duty request only
//! recomputes the settings and marks them pending. The new prescaler, period
//! and compare reach the hardware either when the timer is started, or from
//! the timer's own overflow interrupt through [`PwmEngine::on_overflow`], so no
//! emitted period ever mixes an old and a new configuration.

use crate::channel::ChannelId;
use crate::config::defaults;
use crate::error::ValueError;
use crate::hal::PwmTimer;

/// Number of PWM-capable outputs.
pub const PWM_COUNT: usize = 4;

pub const MIN_FREQUENCY_HZ: u16 = 1;
pub const MAX_FREQUENCY_HZ: u16 = 10_000;
pub const MIN_DUTY_PERCENT: u8 = 1;
pub const MAX_DUTY_PERCENT: u8 = 99;

/// Shortest period the timer can count.
pub const MIN_PERIOD: u16 = 2;

/// PWM-capable outputs, numbered by their bit in `PWM_START`/`PWM_STOP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PwmChannelId {
    Do0 = 0,
    Do1,
    Do2,
    Do3,
}

impl PwmChannelId {
    pub const ALL: [PwmChannelId; PWM_COUNT] = [
        PwmChannelId::Do0,
        PwmChannelId::Do1,
        PwmChannelId::Do2,
        PwmChannelId::Do3,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Bit in the `PWM_START`/`PWM_STOP` masks.
    #[inline]
    pub const fn bit(self) -> u8 {
        1 << self as u8
    }

    /// Output channel driven by this timer.
    pub const fn output(self) -> ChannelId {
        match self {
            PwmChannelId::Do0 => ChannelId::Do0,
            PwmChannelId::Do1 => ChannelId::Do1,
            PwmChannelId::Do2 => ChannelId::Do2,
            PwmChannelId::Do3 => ChannelId::Do3,
        }
    }
}

/// Timer clock dividers, smallest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Prescaler {
    Div1,
    Div2,
    Div4,
    Div8,
    Div64,
    Div256,
    Div1024,
}

impl Prescaler {
    pub const ALL: [Prescaler; 7] = [
        Prescaler::Div1,
        Prescaler::Div2,
        Prescaler::Div4,
        Prescaler::Div8,
        Prescaler::Div64,
        Prescaler::Div256,
        Prescaler::Div1024,
    ];

    pub const fn divisor(self) -> u32 {
        match self {
            Prescaler::Div1 => 1,
            Prescaler::Div2 => 2,
            Prescaler::Div4 => 4,
            Prescaler::Div8 => 8,
            Prescaler::Div64 => 64,
            Prescaler::Div256 => 256,
            Prescaler::Div1024 => 1024,
        }
    }

    /// Clock-select code of the reference timer's control register.
    pub const fn clock_select(self) -> u8 {
        self as u8 + 1
    }
}

/// Complete hardware configuration of one PWM timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerSettings {
    pub prescaler: Prescaler,
    /// Timer counts per output period.
    pub period: u16,
    /// Count at which the output drops within each period.
    pub compare: u16,
}

impl TimerSettings {
    /// Solves prescaler and period for `frequency_hz` and applies `duty_percent`.
    ///
    /// Picks the smallest prescaler whose rounded period fits the counter.
    /// Clocks too slow or too fast for the request saturate at the nearest
    /// representable period.
    pub fn for_frequency(timer_clock_hz: u32, frequency_hz: u16, duty_percent: u8) -> Self {
        let frequency = frequency_hz.max(1) as u64;
        let (prescaler, period) = solve_period(|prescaler| {
            rounded_div(timer_clock_hz as u64, prescaler.divisor() as u64 * frequency)
        });

        Self {
            prescaler,
            period,
            compare: 0,
        }
        .with_duty(duty_percent)
    }

    /// Solves prescaler and period for a period and high time given in
    /// microseconds.
    ///
    /// Uses the same prescaler rule as [`for_frequency`](Self::for_frequency).
    /// The compare never exceeds the period.
    pub fn for_period_micros(timer_clock_hz: u32, period_us: u16, pulse_us: u16) -> Self {
        let counts = |micros: u16, prescaler: Prescaler| {
            rounded_div(
                timer_clock_hz as u64 * micros as u64,
                prescaler.divisor() as u64 * 1_000_000,
            )
        };
        let (prescaler, period) = solve_period(|prescaler| counts(period_us, prescaler));
        let compare = counts(pulse_us, prescaler).min(period as u64) as u16;

        Self {
            prescaler,
            period,
            compare,
        }
    }

    /// Same period and prescaler with a new duty cycle.
    pub fn with_duty(self, duty_percent: u8) -> Self {
        let compare = (self.period as u32 * duty_percent as u32 + 50) / 100;
        Self {
            compare: compare as u16,
            ..self
        }
    }

    /// Output frequency these settings produce, in millihertz.
    pub fn output_millihertz(&self, timer_clock_hz: u32) -> u32 {
        let counts = self.prescaler.divisor() as u64 * self.period as u64;
        (timer_clock_hz as u64 * 1000 / counts) as u32
    }
}

fn rounded_div(numerator: u64, divisor: u64) -> u64 {
    (numerator + divisor / 2) / divisor
}

/// Smallest prescaler whose period, as computed by `counts_at`, fits 16 bits.
fn solve_period(counts_at: impl Fn(Prescaler) -> u64) -> (Prescaler, u16) {
    Prescaler::ALL
        .into_iter()
        .find_map(|prescaler| {
            let period = counts_at(prescaler);
            (period <= u16::MAX as u64).then(|| (prescaler, period.max(MIN_PERIOD as u64) as u16))
        })
        .unwrap_or((Prescaler::Div1024, u16::MAX))
}

/// Starts `timer` with `settings` unless it is already counting.
///
/// Starting loads everything pending, so `pending` is cleared. Returns true if
/// the timer was started.
pub(crate) fn start_timer<T: PwmTimer>(
    timer: &mut T,
    settings: TimerSettings,
    pending: &mut bool,
) -> bool {
    if timer.is_running() {
        return false;
    }
    timer.start(settings);
    *pending = false;
    true
}

/// Writes pending `settings` to a running timer. Overflow interrupts only.
pub(crate) fn commit_at_overflow<T: PwmTimer>(
    timer: &mut T,
    settings: TimerSettings,
    pending: &mut bool,
) -> bool {
    if !*pending || !timer.is_running() {
        return false;
    }
    timer.apply(settings);
    *pending = false;
    true
}

/// Requested and derived configuration of one PWM output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PwmChannel {
    id: PwmChannelId,
    frequency_hz: u16,
    duty_percent: u8,
    settings: TimerSettings,
    pending_commit: bool,
}

impl PwmChannel {
    #[inline]
    pub fn id(&self) -> PwmChannelId {
        self.id
    }

    #[inline]
    pub fn frequency_hz(&self) -> u16 {
        self.frequency_hz
    }

    #[inline]
    pub fn duty_percent(&self) -> u8 {
        self.duty_percent
    }

    /// Settings the hardware will run once committed.
    #[inline]
    pub fn settings(&self) -> TimerSettings {
        self.settings
    }

    /// Returns true while settings wait for the next period boundary.
    #[inline]
    pub fn pending_commit(&self) -> bool {
        self.pending_commit
    }
}

fn check_frequency(frequency_hz: u16) -> Result<(), ValueError> {
    if (MIN_FREQUENCY_HZ..=MAX_FREQUENCY_HZ).contains(&frequency_hz) {
        Ok(())
    } else {
        Err(ValueError::OutOfRange {
            value: frequency_hz,
            min: MIN_FREQUENCY_HZ,
            max: MAX_FREQUENCY_HZ,
        })
    }
}

fn check_duty(duty_percent: u8) -> Result<(), ValueError> {
    if (MIN_DUTY_PERCENT..=MAX_DUTY_PERCENT).contains(&duty_percent) {
        Ok(())
    } else {
        Err(ValueError::OutOfRange {
            value: duty_percent as u16,
            min: MIN_DUTY_PERCENT as u16,
            max: MAX_DUTY_PERCENT as u16,
        })
    }
}

/// Owns the four PWM timers and their pending configurations.
pub struct PwmEngine<T: PwmTimer> {
    channels: [PwmChannel; PWM_COUNT],
    timers: [T; PWM_COUNT],
    timer_clock_hz: u32,
}

impl<T: PwmTimer> PwmEngine<T> {
    /// Creates the engine with every channel at the reset frequency and duty.
    ///
    /// Timers are left as handed in; call [`stop_all`](Self::stop_all) to halt
    /// any that were running.
    pub fn new(timers: [T; PWM_COUNT], timer_clock_hz: u32) -> Self {
        let channels = core::array::from_fn(|index| {
            let id = PwmChannelId::ALL[index];
            Self::default_channel(id, timer_clock_hz)
        });
        Self {
            channels,
            timers,
            timer_clock_hz,
        }
    }

    fn default_channel(id: PwmChannelId, timer_clock_hz: u32) -> PwmChannel {
        PwmChannel {
            id,
            frequency_hz: defaults::PWM_FREQUENCY_HZ,
            duty_percent: defaults::PWM_DUTY_PERCENT,
            settings: TimerSettings::for_frequency(
                timer_clock_hz,
                defaults::PWM_FREQUENCY_HZ,
                defaults::PWM_DUTY_PERCENT,
            ),
            pending_commit: false,
        }
    }

    /// Stops every timer and restores the reset frequency and duty.
    pub fn reset_defaults(&mut self) {
        self.stop_all();
        for id in PwmChannelId::ALL {
            self.channels[id.index()] = Self::default_channel(id, self.timer_clock_hz);
        }
    }

    pub fn channel(&self, id: PwmChannelId) -> &PwmChannel {
        &self.channels[id.index()]
    }

    pub fn timer(&self, id: PwmChannelId) -> &T {
        &self.timers[id.index()]
    }

    pub fn is_running(&self, id: PwmChannelId) -> bool {
        self.timers[id.index()].is_running()
    }

    pub fn timer_clock_hz(&self) -> u32 {
        self.timer_clock_hz
    }

    /// Validates and stores a new frequency and duty.
    ///
    /// Hardware is not touched; the settings are committed at the next
    /// overflow of a running timer or by the next start.
    pub fn request_frequency_duty(
        &mut self,
        id: PwmChannelId,
        frequency_hz: u16,
        duty_percent: u8,
    ) -> Result<(), ValueError> {
        check_frequency(frequency_hz)?;
        check_duty(duty_percent)?;

        let settings =
            TimerSettings::for_frequency(self.timer_clock_hz, frequency_hz, duty_percent);
        let channel = &mut self.channels[id.index()];
        channel.frequency_hz = frequency_hz;
        channel.duty_percent = duty_percent;
        channel.settings = settings;
        channel.pending_commit = true;

        #[cfg(feature = "defmt")]
        defmt::debug!("{} requested {} Hz {}%: {}", id, frequency_hz, duty_percent, settings);

        Ok(())
    }

    /// Changes the frequency, keeping the current duty.
    pub fn set_frequency(&mut self, id: PwmChannelId, frequency_hz: u16) -> Result<(), ValueError> {
        let duty = self.channels[id.index()].duty_percent;
        self.request_frequency_duty(id, frequency_hz, duty)
    }

    /// Changes the duty against the period already derived for the channel.
    pub fn set_duty(&mut self, id: PwmChannelId, duty_percent: u8) -> Result<(), ValueError> {
        check_duty(duty_percent)?;

        let channel = &mut self.channels[id.index()];
        channel.duty_percent = duty_percent;
        channel.settings = channel.settings.with_duty(duty_percent);
        channel.pending_commit = true;

        #[cfg(feature = "defmt")]
        defmt::debug!("{} duty {}%: {}", id, duty_percent, channel.settings);

        Ok(())
    }

    /// Starts the timer with the latest settings unless it is already counting.
    ///
    /// Returns true if the timer was started.
    pub fn start_if_not_running(&mut self, id: PwmChannelId) -> bool {
        let channel = &mut self.channels[id.index()];
        let started = start_timer(
            &mut self.timers[id.index()],
            channel.settings,
            &mut channel.pending_commit,
        );

        #[cfg(feature = "defmt")]
        if started {
            defmt::debug!("{} started: {}", id, channel.settings);
        }

        started
    }

    /// Halts the timer. Returns true if it was running.
    pub fn stop(&mut self, id: PwmChannelId) -> bool {
        let timer = &mut self.timers[id.index()];
        let was_running = timer.is_running();
        timer.stop();

        #[cfg(feature = "defmt")]
        if was_running {
            defmt::debug!("{} stopped", id);
        }

        was_running
    }

    /// Halts every timer.
    pub fn stop_all(&mut self) {
        for timer in self.timers.iter_mut() {
            timer.stop();
        }
    }

    /// Period-rollover hook; commits pending settings in one write.
    ///
    /// Must only be called from the timer's overflow interrupt. Returns true
    /// if new settings were written.
    pub fn on_overflow(&mut self, id: PwmChannelId) -> bool {
        let channel = &mut self.channels[id.index()];
        let committed = commit_at_overflow(
            &mut self.timers[id.index()],
            channel.settings,
            &mut channel.pending_commit,
        );

        #[cfg(feature = "defmt")]
        if committed {
            defmt::trace!("{} committed {}", id, channel.settings);
        }

        committed
    }
}
