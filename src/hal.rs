//! Hardware abstraction traits.
//!
//! Implement these for your board's GPIO, timers, ADC, encoder, one-wire RGB
//! bus and host transport. The core never touches hardware except through
//! them, which keeps it testable on the host.

use crate::pwm::{PwmChannelId, TimerSettings};
use crate::trigger::{CameraId, ServoId};

/// A single digital line.
pub trait DigitalPin {
    /// Drives the line high.
    fn set(&mut self);

    /// Drives the line low.
    fn clear(&mut self);

    /// Inverts the driven level.
    fn toggle(&mut self);

    /// Reads the line level.
    fn read(&self) -> bool;

    /// Switches a bidirectional line between output and input.
    ///
    /// Lines with a fixed direction can ignore this.
    fn set_output_enabled(&mut self, _enabled: bool) {}
}

/// A 16-bit hardware timer able to generate PWM on one output.
///
/// Also drives the camera trigger and servo lines.
pub trait PwmTimer {
    /// Programs prescaler, period and compare and starts counting in PWM mode.
    fn start(&mut self, settings: TimerSettings);

    /// Writes prescaler, period and compare in one step.
    ///
    /// Only called from the timer's own overflow interrupt, so the new values
    /// take effect at a period boundary.
    fn apply(&mut self, settings: TimerSettings);

    /// Halts the counter and releases the output.
    fn stop(&mut self);

    /// Returns true while the counter is running.
    fn is_running(&self) -> bool;
}

/// Analog front end: the sampled input, its offset trim and the LED current DAC.
pub trait AnalogInput {
    /// Reads the latest conversion of `channel`.
    fn read_analog(&mut self, channel: u8) -> u16;

    /// Writes the offset correction for `channel`.
    fn write_analog_offset(&mut self, channel: u8, code: u16);

    /// Measures the input offset. May block while the converter settles.
    fn calibrate(&mut self) -> u16;

    /// Sets the drive current of status LED `led`, in percent of full scale.
    fn set_led_current(&mut self, led: u8, percent: u8);
}

/// Quadrature encoder counter.
pub trait QuadratureEncoder {
    /// Current count, wrapping.
    fn count(&self) -> u16;

    /// Zeroes the count.
    fn reset(&mut self);

    /// Enables or disables counting.
    fn set_enabled(&mut self, enabled: bool);
}

/// Shift-register bus driving the chained RGB indicators.
pub trait RgbBus {
    /// Transmits one complete frame. Must run to completion once started.
    fn write_bus(&mut self, bytes: &[u8]);
}

/// Host notification channel.
///
/// Fire-and-forget: retries and backpressure belong to the transport.
pub trait EventSink {
    /// Emits an event for `address` carrying the register's current value.
    fn notify(&mut self, address: u8, value: &crate::registers::RegisterValue);
}

/// Digital inputs that raise edge interrupts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InputLine {
    /// IR beam of poke 0..=2.
    PokeBeam(u8),
    /// Bidirectional DIO of poke 0..=2.
    PokeDio(u8),
}

/// Bundle of concrete hardware types for one board.
pub trait Hardware {
    type Pin: DigitalPin;
    type Timer: PwmTimer;
    type Analog: AnalogInput;
    type Encoder: QuadratureEncoder;
    type Bus: RgbBus;
    type Events: EventSink;
}

/// Entry points called from interrupt vectors.
///
/// The platform glue (vector table, register save/restore) stays outside the
/// core and only forwards to these methods.
pub trait InterruptHandlers {
    /// A pin-change interrupt fired on `line`.
    fn on_edge(&mut self, line: InputLine);

    /// The fixed-period scheduler tick fired.
    fn on_tick(&mut self);

    /// The PWM timer of `channel` rolled over to a new period.
    fn on_timer_overflow(&mut self, channel: PwmChannelId);

    /// The trigger timer of `camera` started a new frame.
    fn on_camera_overflow(&mut self, camera: CameraId);

    /// The timer of `servo` rolled over to a new period.
    fn on_servo_overflow(&mut self, servo: ServoId);

    /// The periodic ADC/encoder sampler fired.
    fn on_sample(&mut self);
}
