//! The device context: binds every register to its handler and services the
//! interrupt entry points.
//!
//! [`Device`] owns all state and all hardware handles. Host accesses go through
//! [`Device::read`] and [`Device::write`]; the platform's interrupt vectors
//! forward to the [`InterruptHandlers`] impl. On target the device usually
//! lives in a `critical_section::Mutex<RefCell<Device<_>>>` shared by the
//! command loop and the vectors.

use crate::bank::{LED_COUNT, RegisterBank};
use crate::channel::{ChannelId, OutputController, OutputMode, OutputPins};
use crate::colors::{self, RGB_FRAME_LEN};
use crate::command::OutputCommand;
use crate::config::DeviceConfig;
use crate::dio::{DIO_COUNT, PokeDios};
use crate::error::{AccessError, ForRegister, ValueError};
use crate::event::EventGate;
use crate::hal::{
    AnalogInput, DigitalPin, Hardware, InputLine, InterruptHandlers, QuadratureEncoder,
};
use crate::pwm::{PWM_COUNT, PwmChannelId, PwmEngine};
use crate::registers::{Access, ElementType, Payload, Register, RegisterValue};
use crate::trigger::{CAMERA_COUNT, CameraId, SERVO_COUNT, ServoId, TriggerEngine};

use Register::*;

/// Number of pokes.
pub const POKE_COUNT: usize = 3;

/// Analog channel sampled into `ADC`.
pub const ADC_CHANNEL: u8 = 0;

/// Hardware handles passed to [`Device::new`].
pub struct Peripherals<H: Hardware> {
    pub outputs: OutputPins<H::Pin>,
    /// IR beam inputs, one per poke.
    pub beams: [H::Pin; POKE_COUNT],
    /// Bidirectional poke lines.
    pub dios: [H::Pin; DIO_COUNT],
    /// PWM timers of DO0..DO3.
    pub timers: [H::Timer; PWM_COUNT],
    /// Camera trigger timers.
    pub cameras: [H::Timer; CAMERA_COUNT],
    /// Servo timers, servo 2 first.
    pub servos: [H::Timer; SERVO_COUNT],
    pub analog: H::Analog,
    pub encoder: H::Encoder,
    pub bus: H::Bus,
    pub events: H::Events,
}

/// Single owned context holding every piece of device state.
pub struct Device<H: Hardware> {
    config: DeviceConfig,
    bank: RegisterBank,
    outputs: OutputController<H::Pin>,
    pwm: PwmEngine<H::Timer>,
    trigger: TriggerEngine<H::Timer>,
    gate: EventGate,
    dios: PokeDios<H::Pin>,
    beams: [H::Pin; POKE_COUNT],
    analog: H::Analog,
    encoder: H::Encoder,
    bus: H::Bus,
    events: H::Events,
    adc_offset: u16,
}

impl<H: Hardware> Device<H> {
    /// Takes ownership of the hardware, calibrates the analog input and
    /// loads the reset defaults.
    pub fn new(peripherals: Peripherals<H>, config: DeviceConfig) -> Self {
        let Peripherals {
            outputs,
            beams,
            dios,
            timers,
            cameras,
            servos,
            mut analog,
            encoder,
            bus,
            events,
        } = peripherals;

        let adc_offset = analog.calibrate();
        analog.write_analog_offset(ADC_CHANNEL, adc_offset);

        let mut device = Self {
            config,
            bank: RegisterBank::new(),
            outputs: OutputController::new(outputs),
            pwm: PwmEngine::new(timers, config.timer_clock_hz),
            trigger: TriggerEngine::new(cameras, servos, config.timer_clock_hz),
            gate: EventGate::default(),
            dios: PokeDios::new(dios),
            beams,
            analog,
            encoder,
            bus,
            events,
            adc_offset,
        };
        device.reinitialize();

        #[cfg(feature = "defmt")]
        defmt::info!("device ready, adc offset {}, {}", adc_offset, config);

        device
    }

    /// Restores every register to its reset default and drives all outputs low.
    pub fn reinitialize(&mut self) {
        self.bank.reset();
        self.pwm.reset_defaults();
        self.trigger.reset_defaults();
        self.outputs.reset_defaults();
        self.gate = EventGate::default();
        self.dios.reset();
        self.encoder.set_enabled(false);

        for led in 0..LED_COUNT {
            let current = self.bank.image().led_current(led);
            self.analog.set_led_current(led as u8, current);
        }

        self.apply_outputs(OutputCommand::Write(0));

        let image = self.bank.image_mut();
        image.poke_in = beam_levels(&self.beams);
        image.poke_dios_in = self.dios.inputs();
        image.poke_dig_in = self.dios.levels();

        self.outputs.flush_rgb(&mut self.bus);
    }

    /// Safe-state sweep after an unrecoverable error.
    ///
    /// Stops every PWM, camera and servo timer, drives every output low and
    /// blanks both RGB indicators. Runs once and reports nothing.
    pub fn catastrophic_reset(&mut self) {
        self.pwm.stop_all();
        self.trigger.stop_all();
        self.outputs.all_off();
        self.dios.reset();
        self.outputs.blank_rgb(&mut self.bus);

        #[cfg(feature = "defmt")]
        defmt::error!("catastrophic reset: outputs forced to safe state");
    }

    /// Reads the register at `address` for a caller expecting `element_type`.
    pub fn read(
        &self,
        address: u8,
        element_type: ElementType,
    ) -> Result<RegisterValue, AccessError> {
        let descriptor = self.bank.validate_read(address, element_type)?;
        Ok(self.register_value(descriptor.register))
    }

    /// Writes `payload` to the register at `address`.
    ///
    /// `element_type` and `element_count` must match the register; the
    /// handler then validates the value. A failed write changes nothing.
    pub fn write(
        &mut self,
        address: u8,
        element_type: ElementType,
        payload: &[u8],
        element_count: u16,
    ) -> Result<(), AccessError> {
        let (descriptor, payload) =
            self.bank
                .validate_write(address, element_type, payload, element_count)?;
        let register = descriptor.register;

        let result = self.write_register(register, payload);

        match &result {
            Ok(()) if descriptor.access == Access::Command => {
                let value = match descriptor.element_type {
                    ElementType::U8 => payload.u8() as u16,
                    ElementType::U16 => payload.u16(),
                };
                self.bank.image_mut().latch_command(register, value);
            }
            Ok(()) => {}
            #[cfg(feature = "defmt")]
            Err(error) => defmt::warn!("write rejected: {}", error),
            #[cfg(not(feature = "defmt"))]
            Err(_) => {}
        }

        result
    }

    /// Current value of `register`, recomputed from hardware where it is live.
    fn register_value(&self, register: Register) -> RegisterValue {
        let image = self.bank.image();
        match register {
            PokeIn => RegisterValue::u8(image.poke_in()),
            PokeDigIn => RegisterValue::u8(self.dios.levels()),
            PokeDiosIn => RegisterValue::u8(image.poke_dios_in()),
            Adc => RegisterValue::u16(image.adc()),
            Encoder => RegisterValue::u16(image.encoder()),

            OutputsSet | OutputsClear | OutputsToggle => {
                RegisterValue::u16(image.command(register))
            }
            PokeDiosSet | PokeDiosClear | PokeDiosToggle | PwmStart | PwmStop | EncoderEnable
            | EncoderDisable | EncoderReset | StartCameras | StopCameras | EnableServos
            | DisableServos => RegisterValue::u8(image.command(register) as u8),

            OutputsOut => RegisterValue::u16(self.outputs.state_mask()),
            PokeDiosOut => RegisterValue::u8(self.dios.outputs()),
            PokeDiosConf => RegisterValue::u8(self.dios.direction()),

            ModePoke0Led | ModePoke1Led | ModePoke2Led | ModePoke0Valve | ModePoke1Valve
            | ModePoke2Valve | ModeLed0 | ModeLed1 | ModeRgb0 | ModeRgb1 | ModeDo0 | ModeDo1
            | ModeDo2 | ModeDo3 => {
                let id = ChannelId::ALL[register.block_offset(ModePoke0Led)];
                RegisterValue::u8(self.outputs.mode(id).to_register())
            }
            PulsePoke0Led | PulsePoke1Led | PulsePoke2Led | PulsePoke0Valve | PulsePoke1Valve
            | PulsePoke2Valve | PulseLed0 | PulseLed1 | PulseRgb0 | PulseRgb1 | PulseDo0
            | PulseDo1 | PulseDo2 | PulseDo3 => {
                let id = ChannelId::ALL[register.block_offset(PulsePoke0Led)];
                RegisterValue::u16(self.outputs.pulse_ticks(id))
            }
            FreqDo0 | FreqDo1 | FreqDo2 | FreqDo3 => {
                let id = PwmChannelId::ALL[register.block_offset(FreqDo0)];
                RegisterValue::u16(self.pwm.channel(id).frequency_hz())
            }
            DcycleDo0 | DcycleDo1 | DcycleDo2 | DcycleDo3 => {
                let id = PwmChannelId::ALL[register.block_offset(DcycleDo0)];
                RegisterValue::u8(self.pwm.channel(id).duty_percent())
            }

            Rgbs => {
                let mut bytes = [0u8; RGB_FRAME_LEN];
                bytes[..3].copy_from_slice(&colors::to_bus_order(self.outputs.color(0)));
                bytes[3..].copy_from_slice(&colors::to_bus_order(self.outputs.color(1)));
                RegisterValue::u8_array(&bytes)
            }
            Rgb0 => RegisterValue::u8_array(&colors::to_bus_order(self.outputs.color(0))),
            Rgb1 => RegisterValue::u8_array(&colors::to_bus_order(self.outputs.color(1))),

            Led0Current => RegisterValue::u8(image.led_current(0)),
            Led1Current => RegisterValue::u8(image.led_current(1)),
            Led0MaxCurrent => RegisterValue::u8(image.led_max_current(0)),
            Led1MaxCurrent => RegisterValue::u8(image.led_max_current(1)),

            EventEnable => RegisterValue::u8(self.gate.enabled()),

            Camera0Frame => self.frame_value(CameraId::Camera0),
            Camera1Frame => self.frame_value(CameraId::Camera1),
            Camera0Frequency => {
                RegisterValue::u16(self.trigger.camera(CameraId::Camera0).frequency_hz())
            }
            Camera1Frequency => {
                RegisterValue::u16(self.trigger.camera(CameraId::Camera1).frequency_hz())
            }
            Servo2Period => RegisterValue::u16(self.trigger.servo(ServoId::Servo2).period_us()),
            Servo2Pulse => RegisterValue::u16(self.trigger.servo(ServoId::Servo2).pulse_us()),
            Servo3Period => RegisterValue::u16(self.trigger.servo(ServoId::Servo3).period_us()),
            Servo3Pulse => RegisterValue::u16(self.trigger.servo(ServoId::Servo3).pulse_us()),
        }
    }

    /// 1 once the camera has emitted a frame since it was started.
    fn frame_value(&self, camera: CameraId) -> RegisterValue {
        RegisterValue::u8((self.trigger.camera(camera).frames() != 0) as u8)
    }

    /// Write handler of every register.
    fn write_register(
        &mut self,
        register: Register,
        payload: Payload<'_>,
    ) -> Result<(), AccessError> {
        match register {
            PokeIn | PokeDigIn | PokeDiosIn | Adc | Encoder | Camera0Frame | Camera1Frame => {
                Err(AccessError::ReadOnly(register))
            }

            OutputsSet => {
                self.apply_outputs(OutputCommand::Set(payload.u16()));
                Ok(())
            }
            OutputsClear => {
                self.apply_outputs(OutputCommand::Clear(payload.u16()));
                Ok(())
            }
            OutputsToggle => {
                self.apply_outputs(OutputCommand::Toggle(payload.u16()));
                Ok(())
            }
            OutputsOut => {
                self.apply_outputs(OutputCommand::Write(payload.u16()));
                Ok(())
            }

            PokeDiosSet => self.dios.set(payload.u8()).for_register(register),
            PokeDiosClear => self.dios.clear(payload.u8()).for_register(register),
            PokeDiosToggle => self.dios.toggle(payload.u8()).for_register(register),
            PokeDiosOut => self.dios.write(payload.u8()).for_register(register),
            PokeDiosConf => {
                self.dios.configure(payload.u8()).for_register(register)?;
                self.bank.image_mut().poke_dios_in = self.dios.inputs();
                Ok(())
            }

            ModePoke0Led | ModePoke1Led | ModePoke2Led | ModePoke0Valve | ModePoke1Valve
            | ModePoke2Valve | ModeLed0 | ModeLed1 | ModeRgb0 | ModeRgb1 | ModeDo0 | ModeDo1
            | ModeDo2 | ModeDo3 => {
                let id = ChannelId::ALL[register.block_offset(ModePoke0Led)];
                let mode = OutputMode::from_register(payload.u8()).for_register(register)?;
                self.outputs.set_mode(id, mode);

                #[cfg(feature = "defmt")]
                defmt::debug!("{} mode {}", id, mode);

                Ok(())
            }
            PulsePoke0Led | PulsePoke1Led | PulsePoke2Led | PulsePoke0Valve | PulsePoke1Valve
            | PulsePoke2Valve | PulseLed0 | PulseLed1 | PulseRgb0 | PulseRgb1 | PulseDo0
            | PulseDo1 | PulseDo2 | PulseDo3 => {
                let id = ChannelId::ALL[register.block_offset(PulsePoke0Led)];
                self.outputs
                    .set_pulse_ticks(id, payload.u16())
                    .for_register(register)
            }
            FreqDo0 | FreqDo1 | FreqDo2 | FreqDo3 => {
                let id = PwmChannelId::ALL[register.block_offset(FreqDo0)];
                self.pwm.set_frequency(id, payload.u16()).for_register(register)
            }
            DcycleDo0 | DcycleDo1 | DcycleDo2 | DcycleDo3 => {
                let id = PwmChannelId::ALL[register.block_offset(DcycleDo0)];
                self.pwm.set_duty(id, payload.u8()).for_register(register)
            }

            PwmStart => {
                self.start_pwm(payload.u8());
                Ok(())
            }
            PwmStop => {
                self.stop_pwm(payload.u8());
                Ok(())
            }

            Rgbs => {
                let bytes: [u8; RGB_FRAME_LEN] = payload.array();
                self.outputs
                    .set_color(0, colors::from_bus_order([bytes[0], bytes[1], bytes[2]]));
                self.outputs
                    .set_color(1, colors::from_bus_order([bytes[3], bytes[4], bytes[5]]));
                Ok(())
            }
            Rgb0 => {
                self.outputs.set_color(0, colors::from_bus_order(payload.array()));
                Ok(())
            }
            Rgb1 => {
                self.outputs.set_color(1, colors::from_bus_order(payload.array()));
                Ok(())
            }

            Led0Current => self.set_led_current(0, payload.u8()).for_register(register),
            Led1Current => self.set_led_current(1, payload.u8()).for_register(register),
            Led0MaxCurrent => self.set_led_max_current(0, payload.u8()).for_register(register),
            Led1MaxCurrent => self.set_led_max_current(1, payload.u8()).for_register(register),

            EventEnable => self.gate.set_enabled(payload.u8()).for_register(register),

            EncoderEnable => {
                if payload.u8() & 1 != 0 {
                    self.set_encoder_enabled(true);
                }
                Ok(())
            }
            EncoderDisable => {
                if payload.u8() & 1 != 0 {
                    self.set_encoder_enabled(false);
                }
                Ok(())
            }
            EncoderReset => {
                if payload.u8() & 1 != 0 {
                    self.encoder.reset();
                    self.bank.image_mut().encoder = 0;
                }
                Ok(())
            }

            StartCameras => {
                for id in CameraId::ALL {
                    if payload.u8() & id.bit() != 0 {
                        self.trigger.start_camera(id);
                    }
                }
                Ok(())
            }
            StopCameras => {
                for id in CameraId::ALL {
                    if payload.u8() & id.bit() != 0 {
                        self.trigger.stop_camera(id);
                    }
                }
                Ok(())
            }
            EnableServos => {
                for id in ServoId::ALL {
                    if payload.u8() & id.bit() != 0 {
                        self.trigger.start_servo(id);
                    }
                }
                Ok(())
            }
            DisableServos => {
                for id in ServoId::ALL {
                    if payload.u8() & id.bit() != 0 {
                        self.trigger.stop_servo(id);
                    }
                }
                Ok(())
            }
            Camera0Frequency => self
                .trigger
                .set_camera_frequency(CameraId::Camera0, payload.u16())
                .for_register(register),
            Camera1Frequency => self
                .trigger
                .set_camera_frequency(CameraId::Camera1, payload.u16())
                .for_register(register),
            Servo2Period => self
                .trigger
                .set_servo_period(ServoId::Servo2, payload.u16())
                .for_register(register),
            Servo2Pulse => self
                .trigger
                .set_servo_pulse(ServoId::Servo2, payload.u16())
                .for_register(register),
            Servo3Period => self
                .trigger
                .set_servo_period(ServoId::Servo3, payload.u16())
                .for_register(register),
            Servo3Pulse => self
                .trigger
                .set_servo_pulse(ServoId::Servo3, payload.u16())
                .for_register(register),
        }
    }

    /// Runs a bitmask command and stops the PWM of every DO it turned off.
    fn apply_outputs(&mut self, command: OutputCommand) {
        let deactivated = self.outputs.apply(command);
        self.stop_pwm_for(deactivated);
    }

    fn stop_pwm_for(&mut self, deactivated: u16) {
        for id in PwmChannelId::ALL {
            if deactivated & id.output().bit() != 0 {
                self.pwm.stop(id);
            }
        }
    }

    fn start_pwm(&mut self, mask: u8) {
        for id in PwmChannelId::ALL {
            if mask & id.bit() != 0 && self.pwm.start_if_not_running(id) {
                self.outputs.activate(id.output());
            }
        }
    }

    fn stop_pwm(&mut self, mask: u8) {
        for id in PwmChannelId::ALL {
            if mask & id.bit() != 0 {
                self.pwm.stop(id);
                self.outputs.deactivate(id.output());
            }
        }
    }

    fn set_led_current(&mut self, led: usize, current: u8) -> Result<(), ValueError> {
        self.bank.image_mut().set_led_current(led, current)?;
        self.analog.set_led_current(led as u8, current);
        Ok(())
    }

    fn set_led_max_current(&mut self, led: usize, max: u8) -> Result<(), ValueError> {
        if let Some(clamped) = self.bank.image_mut().set_led_max_current(led, max)? {
            self.analog.set_led_current(led as u8, clamped);
        }
        Ok(())
    }

    fn set_encoder_enabled(&mut self, enabled: bool) {
        self.encoder.set_enabled(enabled);
        self.bank.image_mut().encoder_enabled = enabled;
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn bank(&self) -> &RegisterBank {
        &self.bank
    }

    pub fn outputs(&self) -> &OutputController<H::Pin> {
        &self.outputs
    }

    pub fn pwm(&self) -> &PwmEngine<H::Timer> {
        &self.pwm
    }

    pub fn trigger(&self) -> &TriggerEngine<H::Timer> {
        &self.trigger
    }

    pub fn event_gate(&self) -> &EventGate {
        &self.gate
    }

    pub fn dios(&self) -> &PokeDios<H::Pin> {
        &self.dios
    }

    pub fn analog(&self) -> &H::Analog {
        &self.analog
    }

    pub fn encoder(&self) -> &H::Encoder {
        &self.encoder
    }

    pub fn bus(&self) -> &H::Bus {
        &self.bus
    }

    pub fn events(&self) -> &H::Events {
        &self.events
    }

    /// Offset measured by the boot calibration.
    pub fn adc_offset(&self) -> u16 {
        self.adc_offset
    }
}

fn beam_levels<P: DigitalPin>(beams: &[P; POKE_COUNT]) -> u8 {
    beams
        .iter()
        .enumerate()
        .filter(|(_, pin)| pin.read())
        .fold(0, |mask, (poke, _)| mask | (1 << poke))
}

impl<H: Hardware> InterruptHandlers for Device<H> {
    fn on_edge(&mut self, line: InputLine) {
        match line {
            InputLine::PokeBeam(_) => {
                let state = beam_levels(&self.beams);
                self.bank.image_mut().poke_in = state;
                self.gate
                    .notify_if_enabled(&mut self.events, PokeIn, || RegisterValue::u8(state));
            }
            InputLine::PokeDio(_) => {
                let state = self.dios.inputs();
                self.bank.image_mut().poke_dios_in = state;
                self.gate
                    .notify_if_enabled(&mut self.events, PokeDiosIn, || RegisterValue::u8(state));
            }
        }
    }

    fn on_tick(&mut self) {
        let expired = self.outputs.tick();
        if expired != 0 {
            self.stop_pwm_for(expired);
        }
        self.outputs.flush_rgb(&mut self.bus);
    }

    fn on_timer_overflow(&mut self, channel: PwmChannelId) {
        self.pwm.on_overflow(channel);
    }

    fn on_camera_overflow(&mut self, camera: CameraId) {
        if !self.trigger.on_camera_overflow(camera) {
            return;
        }
        let register = match camera {
            CameraId::Camera0 => Camera0Frame,
            CameraId::Camera1 => Camera1Frame,
        };
        self.gate
            .notify_if_enabled(&mut self.events, register, || RegisterValue::u8(1));
    }

    fn on_servo_overflow(&mut self, servo: ServoId) {
        self.trigger.on_servo_overflow(servo);
    }

    fn on_sample(&mut self) {
        let adc = self.analog.read_analog(ADC_CHANNEL);
        self.bank.image_mut().adc = adc;
        self.gate
            .notify_if_enabled(&mut self.events, Adc, || RegisterValue::u16(adc));

        let levels = self.dios.levels();
        if levels != self.bank.image().poke_dig_in() {
            self.bank.image_mut().poke_dig_in = levels;
            self.gate
                .notify_if_enabled(&mut self.events, PokeDigIn, || RegisterValue::u8(levels));
        }

        if self.bank.image().encoder_enabled() {
            let count = self.encoder.count();
            self.bank.image_mut().encoder = count;
            self.gate
                .notify_if_enabled(&mut self.events, Encoder, || RegisterValue::u16(count));
        }
    }
}
