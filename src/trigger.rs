//! Camera trigger and servo outputs.
//!
//! Each camera trigger and each servo line has its own 16-bit timer. Cameras
//! run a square wave at a requested frame rate; servos run a fixed period
//! with a requested high time. Changes follow the same rule as the PWM
//! outputs: they are committed when the timer starts or at its next overflow.

use crate::config::defaults;
use crate::error::ValueError;
use crate::hal::PwmTimer;
use crate::pwm::{TimerSettings, commit_at_overflow, start_timer};

pub const CAMERA_COUNT: usize = 2;
pub const SERVO_COUNT: usize = 2;

pub const MIN_CAMERA_FREQUENCY_HZ: u16 = 1;
pub const MAX_CAMERA_FREQUENCY_HZ: u16 = 1_000;

/// Shortest servo period, in microseconds.
pub const MIN_SERVO_PERIOD_US: u16 = 2;

/// Trigger high time as a share of the frame period.
const CAMERA_DUTY_PERCENT: u8 = 50;

/// Camera trigger outputs, numbered by their bit in `START_CAMERAS`/`STOP_CAMERAS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CameraId {
    Camera0 = 0,
    Camera1,
}

impl CameraId {
    pub const ALL: [CameraId; CAMERA_COUNT] = [CameraId::Camera0, CameraId::Camera1];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub const fn bit(self) -> u8 {
        1 << self as u8
    }
}

/// Servo outputs. They share their numbering with DO2 and DO3, and so do
/// their bits in `ENABLE_SERVOS`/`DISABLE_SERVOS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ServoId {
    Servo2 = 0,
    Servo3,
}

impl ServoId {
    pub const ALL: [ServoId; SERVO_COUNT] = [ServoId::Servo2, ServoId::Servo3];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub const fn bit(self) -> u8 {
        1 << (self as u8 + 2)
    }
}

/// Frame rate and timer state of one camera trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CameraChannel {
    frequency_hz: u16,
    settings: TimerSettings,
    pending_commit: bool,
    frames: u32,
}

impl CameraChannel {
    #[inline]
    pub fn frequency_hz(&self) -> u16 {
        self.frequency_hz
    }

    #[inline]
    pub fn settings(&self) -> TimerSettings {
        self.settings
    }

    #[inline]
    pub fn pending_commit(&self) -> bool {
        self.pending_commit
    }

    /// Trigger pulses emitted since the last start.
    #[inline]
    pub fn frames(&self) -> u32 {
        self.frames
    }
}

/// Period, high time and timer state of one servo output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ServoChannel {
    period_us: u16,
    pulse_us: u16,
    settings: TimerSettings,
    pending_commit: bool,
}

impl ServoChannel {
    #[inline]
    pub fn period_us(&self) -> u16 {
        self.period_us
    }

    #[inline]
    pub fn pulse_us(&self) -> u16 {
        self.pulse_us
    }

    #[inline]
    pub fn settings(&self) -> TimerSettings {
        self.settings
    }

    #[inline]
    pub fn pending_commit(&self) -> bool {
        self.pending_commit
    }
}

/// Owns the camera and servo timers and their pending configurations.
pub struct TriggerEngine<T: PwmTimer> {
    cameras: [CameraChannel; CAMERA_COUNT],
    servos: [ServoChannel; SERVO_COUNT],
    camera_timers: [T; CAMERA_COUNT],
    servo_timers: [T; SERVO_COUNT],
    timer_clock_hz: u32,
}

impl<T: PwmTimer> TriggerEngine<T> {
    pub fn new(
        camera_timers: [T; CAMERA_COUNT],
        servo_timers: [T; SERVO_COUNT],
        timer_clock_hz: u32,
    ) -> Self {
        Self {
            cameras: [Self::default_camera(timer_clock_hz); CAMERA_COUNT],
            servos: [Self::default_servo(timer_clock_hz); SERVO_COUNT],
            camera_timers,
            servo_timers,
            timer_clock_hz,
        }
    }

    fn default_camera(timer_clock_hz: u32) -> CameraChannel {
        CameraChannel {
            frequency_hz: defaults::CAMERA_FREQUENCY_HZ,
            settings: TimerSettings::for_frequency(
                timer_clock_hz,
                defaults::CAMERA_FREQUENCY_HZ,
                CAMERA_DUTY_PERCENT,
            ),
            pending_commit: false,
            frames: 0,
        }
    }

    fn default_servo(timer_clock_hz: u32) -> ServoChannel {
        ServoChannel {
            period_us: defaults::SERVO_PERIOD_US,
            pulse_us: defaults::SERVO_PULSE_US,
            settings: TimerSettings::for_period_micros(
                timer_clock_hz,
                defaults::SERVO_PERIOD_US,
                defaults::SERVO_PULSE_US,
            ),
            pending_commit: false,
        }
    }

    /// Stops every timer and restores the reset frame rate, period and pulse.
    pub fn reset_defaults(&mut self) {
        self.stop_all();
        self.cameras = [Self::default_camera(self.timer_clock_hz); CAMERA_COUNT];
        self.servos = [Self::default_servo(self.timer_clock_hz); SERVO_COUNT];
    }

    pub fn camera(&self, id: CameraId) -> &CameraChannel {
        &self.cameras[id.index()]
    }

    pub fn servo(&self, id: ServoId) -> &ServoChannel {
        &self.servos[id.index()]
    }

    pub fn camera_timer(&self, id: CameraId) -> &T {
        &self.camera_timers[id.index()]
    }

    pub fn servo_timer(&self, id: ServoId) -> &T {
        &self.servo_timers[id.index()]
    }

    pub fn is_camera_running(&self, id: CameraId) -> bool {
        self.camera_timers[id.index()].is_running()
    }

    pub fn is_servo_running(&self, id: ServoId) -> bool {
        self.servo_timers[id.index()].is_running()
    }

    /// Stores a new frame rate, committed at the next overflow or start.
    pub fn set_camera_frequency(
        &mut self,
        id: CameraId,
        frequency_hz: u16,
    ) -> Result<(), ValueError> {
        if !(MIN_CAMERA_FREQUENCY_HZ..=MAX_CAMERA_FREQUENCY_HZ).contains(&frequency_hz) {
            return Err(ValueError::OutOfRange {
                value: frequency_hz,
                min: MIN_CAMERA_FREQUENCY_HZ,
                max: MAX_CAMERA_FREQUENCY_HZ,
            });
        }

        let camera = &mut self.cameras[id.index()];
        camera.frequency_hz = frequency_hz;
        camera.settings =
            TimerSettings::for_frequency(self.timer_clock_hz, frequency_hz, CAMERA_DUTY_PERCENT);
        camera.pending_commit = true;

        #[cfg(feature = "defmt")]
        defmt::debug!("{} requested {} Hz: {}", id, frequency_hz, camera.settings);

        Ok(())
    }

    /// Stores a new servo period. The pulse must stay shorter than it.
    pub fn set_servo_period(&mut self, id: ServoId, period_us: u16) -> Result<(), ValueError> {
        let pulse_us = self.servos[id.index()].pulse_us;
        let min = MIN_SERVO_PERIOD_US.max(pulse_us.saturating_add(1));
        if period_us < min {
            return Err(ValueError::OutOfRange {
                value: period_us,
                min,
                max: u16::MAX,
            });
        }
        self.request_servo(id, period_us, pulse_us);
        Ok(())
    }

    /// Stores a new servo high time, in [1, period - 1] microseconds.
    pub fn set_servo_pulse(&mut self, id: ServoId, pulse_us: u16) -> Result<(), ValueError> {
        let period_us = self.servos[id.index()].period_us;
        if pulse_us == 0 || pulse_us >= period_us {
            return Err(ValueError::OutOfRange {
                value: pulse_us,
                min: 1,
                max: period_us - 1,
            });
        }
        self.request_servo(id, period_us, pulse_us);
        Ok(())
    }

    fn request_servo(&mut self, id: ServoId, period_us: u16, pulse_us: u16) {
        let servo = &mut self.servos[id.index()];
        servo.period_us = period_us;
        servo.pulse_us = pulse_us;
        servo.settings = TimerSettings::for_period_micros(self.timer_clock_hz, period_us, pulse_us);
        servo.pending_commit = true;

        #[cfg(feature = "defmt")]
        defmt::debug!("{} requested {}/{} us: {}", id, pulse_us, period_us, servo.settings);
    }

    /// Starts the trigger unless it is running. Returns true if it started.
    pub fn start_camera(&mut self, id: CameraId) -> bool {
        let camera = &mut self.cameras[id.index()];
        let started = start_timer(
            &mut self.camera_timers[id.index()],
            camera.settings,
            &mut camera.pending_commit,
        );
        if started {
            camera.frames = 0;
        }
        started
    }

    pub fn stop_camera(&mut self, id: CameraId) {
        self.camera_timers[id.index()].stop();
    }

    /// Starts the servo output unless it is running. Returns true if it started.
    pub fn start_servo(&mut self, id: ServoId) -> bool {
        let servo = &mut self.servos[id.index()];
        start_timer(
            &mut self.servo_timers[id.index()],
            servo.settings,
            &mut servo.pending_commit,
        )
    }

    pub fn stop_servo(&mut self, id: ServoId) {
        self.servo_timers[id.index()].stop();
    }

    /// Halts every camera and servo timer.
    pub fn stop_all(&mut self) {
        for timer in self.camera_timers.iter_mut().chain(self.servo_timers.iter_mut()) {
            timer.stop();
        }
    }

    /// Frame boundary of a camera trigger.
    ///
    /// Commits pending settings and counts the frame. Returns true if the
    /// trigger is running, so a frame was actually emitted.
    pub fn on_camera_overflow(&mut self, id: CameraId) -> bool {
        let camera = &mut self.cameras[id.index()];
        let timer = &mut self.camera_timers[id.index()];
        commit_at_overflow(timer, camera.settings, &mut camera.pending_commit);
        if !timer.is_running() {
            return false;
        }
        camera.frames = camera.frames.wrapping_add(1);
        true
    }

    /// Period boundary of a servo output; commits pending settings.
    pub fn on_servo_overflow(&mut self, id: ServoId) -> bool {
        let servo = &mut self.servos[id.index()];
        commit_at_overflow(
            &mut self.servo_timers[id.index()],
            servo.settings,
            &mut servo.pending_commit,
        )
    }
}
