//! Register access errors.
//!
//! Protocol failures are caught by the register bank before any handler runs.
//! Value failures are raised by the handler bound to the register. In both
//! cases nothing is mutated; the transport turns the error into a failed reply.

use crate::registers::{ElementType, Register};

/// Value-domain rejections raised by register handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ValueError {
    /// Numeric value outside the register's accepted range.
    OutOfRange {
        /// Rejected value.
        value: u16,
        /// Smallest accepted value.
        min: u16,
        /// Largest accepted value.
        max: u16,
    },

    /// Mode register written with something other than Direct (0) or Pulsed (1).
    InvalidMode(u8),

    /// Bitmask contains bits with no meaning for this register.
    ReservedBits(u16),

    /// LED drive current above the configured maximum.
    ExceedsMaxCurrent {
        /// Requested current.
        current: u8,
        /// Configured maximum.
        max: u8,
    },
}

impl core::fmt::Display for ValueError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ValueError::OutOfRange { value, min, max } => {
                write!(f, "value {} outside [{}, {}]", value, min, max)
            }
            ValueError::InvalidMode(mode) => {
                write!(f, "unknown output mode {}", mode)
            }
            ValueError::ReservedBits(bits) => {
                write!(f, "reserved bits set: {:#06x}", bits)
            }
            ValueError::ExceedsMaxCurrent { current, max } => {
                write!(f, "current {} exceeds configured maximum {}", current, max)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ValueError {}

/// Reasons a host read or write was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AccessError {
    /// Address outside the device's register range.
    InvalidAddress(u8),

    /// Caller's element type differs from the register's declared type.
    TypeMismatch {
        register: Register,
        expected: ElementType,
        actual: ElementType,
    },

    /// Caller's element count differs from the register's arity.
    ArityMismatch {
        register: Register,
        expected: u16,
        actual: u16,
    },

    /// Payload byte count does not match the declared element count.
    PayloadLength {
        register: Register,
        expected: usize,
        actual: usize,
    },

    /// Register is backed by a sensor and cannot be written.
    ReadOnly(Register),

    /// Handler rejected the value.
    Value {
        register: Register,
        error: ValueError,
    },
}

impl AccessError {
    /// Returns true for failures detected before a handler was invoked.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            AccessError::InvalidAddress(_)
                | AccessError::TypeMismatch { .. }
                | AccessError::ArityMismatch { .. }
                | AccessError::PayloadLength { .. }
        )
    }
}

impl core::fmt::Display for AccessError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AccessError::InvalidAddress(address) => {
                write!(f, "address {} is not a register", address)
            }
            AccessError::TypeMismatch {
                register,
                expected,
                actual,
            } => write!(
                f,
                "{:?} holds {:?} elements, access used {:?}",
                register, expected, actual
            ),
            AccessError::ArityMismatch {
                register,
                expected,
                actual,
            } => write!(
                f,
                "{:?} holds {} elements, access carried {}",
                register, expected, actual
            ),
            AccessError::PayloadLength {
                register,
                expected,
                actual,
            } => write!(
                f,
                "{:?} expects {} payload bytes, got {}",
                register, expected, actual
            ),
            AccessError::ReadOnly(register) => {
                write!(f, "{:?} is read-only", register)
            }
            AccessError::Value { register, error } => {
                write!(f, "{:?} rejected value: {}", register, error)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AccessError {}

/// Tags a handler's value error with the register it came from.
pub(crate) trait ForRegister<T> {
    fn for_register(self, register: Register) -> Result<T, AccessError>;
}

impl<T> ForRegister<T> for Result<T, ValueError> {
    fn for_register(self, register: Register) -> Result<T, AccessError> {
        self.map_err(|error| AccessError::Value { register, error })
    }
}
