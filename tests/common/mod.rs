//! Shared test infrastructure for behavior-core integration tests

#![allow(dead_code)] // Items used across multiple test files; Rust analyzes per-file

use std::cell::Cell;
use std::rc::Rc;

use behavior_core::colors::RGB_FRAME_LEN;
use behavior_core::pwm::{PWM_COUNT, TimerSettings};
use behavior_core::trigger::{CAMERA_COUNT, SERVO_COUNT};
use behavior_core::{
    AccessError, AnalogInput, CameraId, ChannelId, Device, DeviceConfig, DigitalPin,
    ElementType, EventSink, Hardware, OutputPins, Peripherals, PwmChannelId, PwmTimer,
    QuadratureEncoder, Register, RegisterValue, RgbBus, ServoId,
};

// ============================================================================
// Mock Pin
// ============================================================================

/// Mock digital line; clones share the same level so tests can observe and
/// drive lines the device owns
#[derive(Clone, Default)]
pub struct MockPin {
    level: Rc<Cell<bool>>,
    output_enabled: Rc<Cell<bool>>,
}

impl MockPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(&self) -> bool {
        self.level.get()
    }

    /// Drive the line from outside, as an external device would
    pub fn drive_external(&self, level: bool) {
        self.level.set(level);
    }

    pub fn is_output(&self) -> bool {
        self.output_enabled.get()
    }
}

impl DigitalPin for MockPin {
    fn set(&mut self) {
        self.level.set(true);
    }

    fn clear(&mut self) {
        self.level.set(false);
    }

    fn toggle(&mut self) {
        self.level.set(!self.level.get());
    }

    fn read(&self) -> bool {
        self.level.get()
    }

    fn set_output_enabled(&mut self, enabled: bool) {
        self.output_enabled.set(enabled);
    }
}

// ============================================================================
// Mock Timer
// ============================================================================

/// Operations the device performed on a timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerOp {
    Start(TimerSettings),
    Apply(TimerSettings),
    Stop,
}

/// Mock PWM timer that records every register write
#[derive(Default)]
pub struct MockTimer {
    running: bool,
    hardware: Option<TimerSettings>,
    history: heapless::Vec<TimerOp, 32>,
}

impl MockTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings currently loaded in the timer registers
    pub fn hardware(&self) -> Option<TimerSettings> {
        self.hardware
    }

    pub fn history(&self) -> &[TimerOp] {
        &self.history
    }
}

impl PwmTimer for MockTimer {
    fn start(&mut self, settings: TimerSettings) {
        self.running = true;
        self.hardware = Some(settings);
        let _ = self.history.push(TimerOp::Start(settings));
    }

    fn apply(&mut self, settings: TimerSettings) {
        self.hardware = Some(settings);
        let _ = self.history.push(TimerOp::Apply(settings));
    }

    fn stop(&mut self) {
        self.running = false;
        let _ = self.history.push(TimerOp::Stop);
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

// ============================================================================
// Mock Analog Front End
// ============================================================================

pub const CALIBRATION_OFFSET: u16 = 37;

/// Mock ADC and LED current DAC
pub struct MockAnalog {
    sample: Rc<Cell<u16>>,
    offsets: heapless::Vec<(u8, u16), 8>,
    calibrations: usize,
    led_currents: heapless::Vec<(u8, u8), 32>,
}

impl MockAnalog {
    pub fn new(sample: Rc<Cell<u16>>) -> Self {
        Self {
            sample,
            offsets: heapless::Vec::new(),
            calibrations: 0,
            led_currents: heapless::Vec::new(),
        }
    }

    pub fn offsets(&self) -> &[(u8, u16)] {
        &self.offsets
    }

    pub fn calibrations(&self) -> usize {
        self.calibrations
    }

    pub fn led_currents(&self) -> &[(u8, u8)] {
        &self.led_currents
    }

    /// Last current written for `led`
    pub fn last_led_current(&self, led: u8) -> Option<u8> {
        self.led_currents
            .iter()
            .rev()
            .find(|(l, _)| *l == led)
            .map(|(_, current)| *current)
    }
}

impl AnalogInput for MockAnalog {
    fn read_analog(&mut self, _channel: u8) -> u16 {
        self.sample.get()
    }

    fn write_analog_offset(&mut self, channel: u8, code: u16) {
        let _ = self.offsets.push((channel, code));
    }

    fn calibrate(&mut self) -> u16 {
        self.calibrations += 1;
        CALIBRATION_OFFSET
    }

    fn set_led_current(&mut self, led: u8, percent: u8) {
        let _ = self.led_currents.push((led, percent));
    }
}

// ============================================================================
// Mock Encoder
// ============================================================================

/// Mock quadrature counter; the count is shared with the test
pub struct MockEncoder {
    count: Rc<Cell<u16>>,
    enabled: bool,
    resets: usize,
}

impl MockEncoder {
    pub fn new(count: Rc<Cell<u16>>) -> Self {
        Self {
            count,
            enabled: false,
            resets: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn resets(&self) -> usize {
        self.resets
    }
}

impl QuadratureEncoder for MockEncoder {
    fn count(&self) -> u16 {
        self.count.get()
    }

    fn reset(&mut self) {
        self.resets += 1;
        self.count.set(0);
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

// ============================================================================
// Mock RGB Bus
// ============================================================================

/// Mock indicator bus that records every frame
#[derive(Default)]
pub struct MockBus {
    frames: heapless::Vec<[u8; RGB_FRAME_LEN], 32>,
}

impl MockBus {
    pub fn frames(&self) -> &[[u8; RGB_FRAME_LEN]] {
        &self.frames
    }

    pub fn last_frame(&self) -> Option<[u8; RGB_FRAME_LEN]> {
        self.frames.last().copied()
    }
}

impl RgbBus for MockBus {
    fn write_bus(&mut self, bytes: &[u8]) {
        let mut frame = [0u8; RGB_FRAME_LEN];
        frame.copy_from_slice(bytes);
        let _ = self.frames.push(frame);
    }
}

// ============================================================================
// Mock Host Link
// ============================================================================

/// Mock event sink recording `(address, value)` notifications
#[derive(Default)]
pub struct MockEvents {
    events: heapless::Vec<(u8, RegisterValue), 64>,
}

impl MockEvents {
    pub fn events(&self) -> &[(u8, RegisterValue)] {
        &self.events
    }

    /// Number of notifications referencing `register`
    pub fn count_for(&self, register: Register) -> usize {
        self.events
            .iter()
            .filter(|(address, _)| *address == register.address())
            .count()
    }

    pub fn last_for(&self, register: Register) -> Option<&RegisterValue> {
        self.events
            .iter()
            .rev()
            .find(|(address, _)| *address == register.address())
            .map(|(_, value)| value)
    }
}

impl EventSink for MockEvents {
    fn notify(&mut self, address: u8, value: &RegisterValue) {
        let _ = self.events.push((address, value.clone()));
    }
}

// ============================================================================
// Test Board
// ============================================================================

pub struct TestBoard;

impl Hardware for TestBoard {
    type Pin = MockPin;
    type Timer = MockTimer;
    type Analog = MockAnalog;
    type Encoder = MockEncoder;
    type Bus = MockBus;
    type Events = MockEvents;
}

/// Handles the test keeps on lines and sensors owned by the device
pub struct Wiring {
    /// Non-RGB outputs in board order: poke LEDs, poke valves, LED0/1, DO0..3
    pub outputs: [MockPin; 12],
    pub beams: [MockPin; 3],
    pub dios: [MockPin; 3],
    pub adc: Rc<Cell<u16>>,
    pub encoder: Rc<Cell<u16>>,
}

impl Wiring {
    /// Line of a non-RGB output channel
    pub fn line(&self, id: ChannelId) -> &MockPin {
        let index = match id {
            ChannelId::Rgb0 | ChannelId::Rgb1 => panic!("RGB indicators have no pin"),
            ChannelId::Do0 | ChannelId::Do1 | ChannelId::Do2 | ChannelId::Do3 => id.index() - 2,
            _ => id.index(),
        };
        &self.outputs[index]
    }
}

pub fn device() -> (Device<TestBoard>, Wiring) {
    device_with_config(DeviceConfig::default())
}

pub fn device_with_config(config: DeviceConfig) -> (Device<TestBoard>, Wiring) {
    let outputs: [MockPin; 12] = Default::default();
    let beams: [MockPin; 3] = Default::default();
    let dios: [MockPin; 3] = Default::default();
    let adc = Rc::new(Cell::new(0));
    let encoder = Rc::new(Cell::new(0));

    let o = |i: usize| outputs[i].clone();
    let peripherals = Peripherals::<TestBoard> {
        outputs: OutputPins {
            poke_leds: [o(0), o(1), o(2)],
            poke_valves: [o(3), o(4), o(5)],
            leds: [o(6), o(7)],
            digital_outputs: [o(8), o(9), o(10), o(11)],
        },
        beams: beams.clone(),
        dios: dios.clone(),
        timers: core::array::from_fn::<_, PWM_COUNT, _>(|_| MockTimer::new()),
        cameras: core::array::from_fn::<_, CAMERA_COUNT, _>(|_| MockTimer::new()),
        servos: core::array::from_fn::<_, SERVO_COUNT, _>(|_| MockTimer::new()),
        analog: MockAnalog::new(adc.clone()),
        encoder: MockEncoder::new(encoder.clone()),
        bus: MockBus::default(),
        events: MockEvents::default(),
    };

    let device = Device::new(peripherals, config);
    let wiring = Wiring {
        outputs,
        beams,
        dios,
        adc,
        encoder,
    };
    (device, wiring)
}

// ============================================================================
// Test Helper Functions
// ============================================================================

pub fn write_u8(
    device: &mut Device<TestBoard>,
    register: Register,
    value: u8,
) -> Result<(), AccessError> {
    device.write(register.address(), ElementType::U8, &[value], 1)
}

pub fn write_u16(
    device: &mut Device<TestBoard>,
    register: Register,
    value: u16,
) -> Result<(), AccessError> {
    device.write(register.address(), ElementType::U16, &value.to_le_bytes(), 1)
}

pub fn write_bytes(
    device: &mut Device<TestBoard>,
    register: Register,
    bytes: &[u8],
) -> Result<(), AccessError> {
    device.write(register.address(), ElementType::U8, bytes, bytes.len() as u16)
}

pub fn read_u8(device: &mut Device<TestBoard>, register: Register) -> u8 {
    device
        .read(register.address(), ElementType::U8)
        .ok()
        .and_then(|value| value.as_u8())
        .expect("u8 register read")
}

pub fn read_u16(device: &mut Device<TestBoard>, register: Register) -> u16 {
    device
        .read(register.address(), ElementType::U16)
        .ok()
        .and_then(|value| value.as_u16())
        .expect("u16 register read")
}

/// Run `n` scheduler ticks
pub fn tick(device: &mut Device<TestBoard>, n: usize) {
    use behavior_core::InterruptHandlers;
    for _ in 0..n {
        device.on_tick();
    }
}

pub fn timer(device: &Device<TestBoard>, id: PwmChannelId) -> &MockTimer {
    device.pwm().timer(id)
}

pub fn camera_timer(device: &Device<TestBoard>, id: CameraId) -> &MockTimer {
    device.trigger().camera_timer(id)
}

pub fn servo_timer(device: &Device<TestBoard>, id: ServoId) -> &MockTimer {
    device.trigger().servo_timer(id)
}
