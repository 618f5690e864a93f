//! Register address map and payload encoding.
//!
//! Addresses form one dense block from [`FIRST_ADDRESS`] to [`LAST_ADDRESS`].
//! Each address maps to exactly one [`Register`], and each register to exactly
//! one [`RegisterDescriptor`] whose type and arity never change.

use heapless::Vec;

/// Lowest application register address.
pub const FIRST_ADDRESS: u8 = 32;

/// Highest application register address.
pub const LAST_ADDRESS: u8 = 106;

/// Number of application registers.
pub const REGISTER_COUNT: usize = (LAST_ADDRESS - FIRST_ADDRESS + 1) as usize;

/// Largest payload any register carries, in bytes.
pub const MAX_PAYLOAD_BYTES: usize = 6;

/// Element type of a register's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ElementType {
    U8,
    U16,
}

impl ElementType {
    /// Size of one element in bytes.
    #[inline]
    pub const fn size(self) -> usize {
        match self {
            ElementType::U8 => 1,
            ElementType::U16 => 2,
        }
    }
}

/// How the host may use a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Access {
    /// Stored configuration or live state; readable and writable.
    ReadWrite,
    /// Sensor-backed; writes are rejected.
    ReadOnly,
    /// Write triggers an action; reads report the last accepted command.
    Command,
}

/// Every addressable register, numbered by its address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Register {
    PokeIn = FIRST_ADDRESS,
    PokeDigIn,
    OutputsSet,
    OutputsClear,
    OutputsToggle,
    OutputsOut,
    PokeDiosSet,
    PokeDiosClear,
    PokeDiosToggle,
    PokeDiosOut,
    PokeDiosConf,
    PokeDiosIn,
    Adc,
    ModePoke0Led,
    ModePoke1Led,
    ModePoke2Led,
    ModePoke0Valve,
    ModePoke1Valve,
    ModePoke2Valve,
    ModeLed0,
    ModeLed1,
    ModeRgb0,
    ModeRgb1,
    ModeDo0,
    ModeDo1,
    ModeDo2,
    ModeDo3,
    PulsePoke0Led,
    PulsePoke1Led,
    PulsePoke2Led,
    PulsePoke0Valve,
    PulsePoke1Valve,
    PulsePoke2Valve,
    PulseLed0,
    PulseLed1,
    PulseRgb0,
    PulseRgb1,
    PulseDo0,
    PulseDo1,
    PulseDo2,
    PulseDo3,
    FreqDo0,
    FreqDo1,
    FreqDo2,
    FreqDo3,
    DcycleDo0,
    DcycleDo1,
    DcycleDo2,
    DcycleDo3,
    PwmStart,
    PwmStop,
    Rgbs,
    Rgb0,
    Rgb1,
    Led0Current,
    Led1Current,
    Led0MaxCurrent,
    Led1MaxCurrent,
    EventEnable,
    EncoderEnable,
    EncoderDisable,
    EncoderReset,
    Encoder,
    StartCameras,
    StopCameras,
    EnableServos,
    DisableServos,
    Camera0Frame,
    Camera0Frequency,
    Camera1Frame,
    Camera1Frequency,
    Servo2Period,
    Servo2Pulse,
    Servo3Period,
    Servo3Pulse,
}

use Register::*;

impl Register {
    /// All registers in address order.
    #[rustfmt::skip] // one line per register block
    pub const ALL: [Register; REGISTER_COUNT] = [
        PokeIn, PokeDigIn, OutputsSet, OutputsClear, OutputsToggle, OutputsOut,
        PokeDiosSet, PokeDiosClear, PokeDiosToggle, PokeDiosOut, PokeDiosConf, PokeDiosIn,
        Adc,
        ModePoke0Led, ModePoke1Led, ModePoke2Led, ModePoke0Valve, ModePoke1Valve,
        ModePoke2Valve, ModeLed0, ModeLed1, ModeRgb0, ModeRgb1, ModeDo0, ModeDo1, ModeDo2,
        ModeDo3,
        PulsePoke0Led, PulsePoke1Led, PulsePoke2Led, PulsePoke0Valve, PulsePoke1Valve,
        PulsePoke2Valve, PulseLed0, PulseLed1, PulseRgb0, PulseRgb1, PulseDo0, PulseDo1,
        PulseDo2, PulseDo3,
        FreqDo0, FreqDo1, FreqDo2, FreqDo3,
        DcycleDo0, DcycleDo1, DcycleDo2, DcycleDo3,
        PwmStart, PwmStop,
        Rgbs, Rgb0, Rgb1,
        Led0Current, Led1Current, Led0MaxCurrent, Led1MaxCurrent,
        EventEnable,
        EncoderEnable, EncoderDisable, EncoderReset, Encoder,
        StartCameras, StopCameras, EnableServos, DisableServos,
        Camera0Frame, Camera0Frequency, Camera1Frame, Camera1Frequency,
        Servo2Period, Servo2Pulse, Servo3Period, Servo3Pulse,
    ];

    /// Looks up the register at `address`.
    pub fn from_address(address: u8) -> Option<Register> {
        let index = address.checked_sub(FIRST_ADDRESS)? as usize;
        Self::ALL.get(index).copied()
    }

    /// The register's address.
    #[inline]
    pub const fn address(self) -> u8 {
        self as u8
    }

    /// Type, arity and access kind of this register.
    pub const fn descriptor(self) -> RegisterDescriptor {
        let (element_type, arity, access) = match self {
            PokeIn | PokeDigIn | PokeDiosIn | Camera0Frame | Camera1Frame => {
                (ElementType::U8, 1, Access::ReadOnly)
            }
            Adc | Encoder => (ElementType::U16, 1, Access::ReadOnly),

            OutputsSet | OutputsClear | OutputsToggle => (ElementType::U16, 1, Access::Command),
            OutputsOut => (ElementType::U16, 1, Access::ReadWrite),

            PokeDiosSet | PokeDiosClear | PokeDiosToggle => (ElementType::U8, 1, Access::Command),
            PokeDiosOut | PokeDiosConf => (ElementType::U8, 1, Access::ReadWrite),

            ModePoke0Led | ModePoke1Led | ModePoke2Led | ModePoke0Valve | ModePoke1Valve
            | ModePoke2Valve | ModeLed0 | ModeLed1 | ModeRgb0 | ModeRgb1 | ModeDo0 | ModeDo1
            | ModeDo2 | ModeDo3 => (ElementType::U8, 1, Access::ReadWrite),

            PulsePoke0Led | PulsePoke1Led | PulsePoke2Led | PulsePoke0Valve | PulsePoke1Valve
            | PulsePoke2Valve | PulseLed0 | PulseLed1 | PulseRgb0 | PulseRgb1 | PulseDo0
            | PulseDo1 | PulseDo2 | PulseDo3 => (ElementType::U16, 1, Access::ReadWrite),

            FreqDo0 | FreqDo1 | FreqDo2 | FreqDo3 => (ElementType::U16, 1, Access::ReadWrite),
            DcycleDo0 | DcycleDo1 | DcycleDo2 | DcycleDo3 => {
                (ElementType::U8, 1, Access::ReadWrite)
            }

            PwmStart | PwmStop => (ElementType::U8, 1, Access::Command),

            Rgbs => (ElementType::U8, 6, Access::ReadWrite),
            Rgb0 | Rgb1 => (ElementType::U8, 3, Access::ReadWrite),

            Led0Current | Led1Current | Led0MaxCurrent | Led1MaxCurrent => {
                (ElementType::U8, 1, Access::ReadWrite)
            }

            EventEnable => (ElementType::U8, 1, Access::ReadWrite),

            EncoderEnable | EncoderDisable | EncoderReset => (ElementType::U8, 1, Access::Command),

            StartCameras | StopCameras | EnableServos | DisableServos => {
                (ElementType::U8, 1, Access::Command)
            }
            Camera0Frequency | Camera1Frequency | Servo2Period | Servo2Pulse | Servo3Period
            | Servo3Pulse => (ElementType::U16, 1, Access::ReadWrite),
        };

        RegisterDescriptor {
            register: self,
            element_type,
            arity,
            access,
        }
    }

    /// Position within the register block starting at `first`.
    ///
    /// Only meaningful for a register known to belong to that block; the
    /// device dispatch matches the block before asking.
    #[inline]
    pub const fn block_offset(self, first: Register) -> usize {
        self.address().wrapping_sub(first.address()) as usize
    }
}

/// Type/arity/access binding for one register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterDescriptor {
    pub register: Register,
    pub element_type: ElementType,
    pub arity: u16,
    pub access: Access,
}

impl RegisterDescriptor {
    /// Payload size in bytes.
    #[inline]
    pub const fn payload_len(&self) -> usize {
        self.element_type.size() * self.arity as usize
    }
}

/// A register's current value, encoded little-endian for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterValue {
    element_type: ElementType,
    bytes: Vec<u8, MAX_PAYLOAD_BYTES>,
}

impl RegisterValue {
    /// Single unsigned byte.
    pub fn u8(value: u8) -> Self {
        Self::from_bytes(ElementType::U8, &[value])
    }

    /// Single little-endian `u16`.
    pub fn u16(value: u16) -> Self {
        Self::from_bytes(ElementType::U16, &value.to_le_bytes())
    }

    /// Array of bytes, at most [`MAX_PAYLOAD_BYTES`] long.
    pub fn u8_array(values: &[u8]) -> Self {
        Self::from_bytes(ElementType::U8, values)
    }

    fn from_bytes(element_type: ElementType, bytes: &[u8]) -> Self {
        debug_assert!(bytes.len() <= MAX_PAYLOAD_BYTES);
        let mut buf = Vec::new();
        let _ = buf.extend_from_slice(bytes);
        Self {
            element_type,
            bytes: buf,
        }
    }

    #[inline]
    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// Number of elements carried.
    #[inline]
    pub fn element_count(&self) -> u16 {
        (self.bytes.len() / self.element_type.size()) as u16
    }

    /// Raw little-endian payload.
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// First element as `u8`.
    pub fn as_u8(&self) -> Option<u8> {
        match self.element_type {
            ElementType::U8 => self.bytes.first().copied(),
            ElementType::U16 => None,
        }
    }

    /// First element as `u16`.
    pub fn as_u16(&self) -> Option<u16> {
        match (self.element_type, self.bytes.as_slice()) {
            (ElementType::U16, [lo, hi, ..]) => Some(u16::from_le_bytes([*lo, *hi])),
            _ => None,
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for RegisterValue {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{}:{=[u8]}", self.element_type, self.bytes.as_slice())
    }
}

/// A write payload that already passed type and length validation.
#[derive(Debug, Clone, Copy)]
pub struct Payload<'a> {
    bytes: &'a [u8],
}

impl<'a> Payload<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// First byte.
    #[inline]
    pub fn u8(&self) -> u8 {
        self.bytes[0]
    }

    /// First little-endian `u16`.
    #[inline]
    pub fn u16(&self) -> u16 {
        u16::from_le_bytes([self.bytes[0], self.bytes[1]])
    }

    /// First `N` bytes as an array.
    pub fn array<const N: usize>(&self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[..N]);
        out
    }

    #[inline]
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }
}
