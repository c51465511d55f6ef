//! Command parameters and their packed type descriptor.

use std::fmt;
use std::ops::{Index, IndexMut};

use crate::error::ReeSessionError;
use crate::Result;

/// Number of parameter slots carried by every command.
pub const NUM_PARAMS: usize = 4;

const SLOT_BITS: u32 = 4;
const SLOT_MASK: u32 = 0xF;

/// Type of a single parameter slot, as encoded in one descriptor nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum ParamType {
    #[default]
    None = 0,
    ValueInput = 1,
    ValueOutput = 2,
    ValueInout = 3,
    MemrefInput = 5,
    MemrefOutput = 6,
    MemrefInout = 7,
}

impl ParamType {
    /// Decode a descriptor nibble.
    pub fn from_nibble(nibble: u32) -> Result<Self> {
        match nibble {
            0 => Ok(Self::None),
            1 => Ok(Self::ValueInput),
            2 => Ok(Self::ValueOutput),
            3 => Ok(Self::ValueInout),
            5 => Ok(Self::MemrefInput),
            6 => Ok(Self::MemrefOutput),
            7 => Ok(Self::MemrefInout),
            other => Err(ReeSessionError::InvalidParamType(other)),
        }
    }

    pub fn is_value(&self) -> bool {
        matches!(
            self,
            Self::ValueInput | Self::ValueOutput | Self::ValueInout
        )
    }

    pub fn is_memref(&self) -> bool {
        matches!(
            self,
            Self::MemrefInput | Self::MemrefOutput | Self::MemrefInout
        )
    }
}

/// Four parameter types packed into one integer, one nibble per slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ParamTypes(u32);

impl ParamTypes {
    /// All four slots unused.
    pub const NONE: Self = Self(0);

    pub const fn new(t0: ParamType, t1: ParamType, t2: ParamType, t3: ParamType) -> Self {
        Self(
            (t0 as u32)
                | ((t1 as u32) << SLOT_BITS)
                | ((t2 as u32) << (2 * SLOT_BITS))
                | ((t3 as u32) << (3 * SLOT_BITS)),
        )
    }

    /// Wrap a raw descriptor without validating it.
    pub const fn from_raw(value: u32) -> Self {
        Self(value)
    }

    /// Get the raw u32 value.
    pub const fn raw(&self) -> u32 {
        self.0
    }

    /// Decode the type of slot `index`.
    pub fn get(&self, index: usize) -> Result<ParamType> {
        let shift = slot_shift(index)?;
        ParamType::from_nibble((self.0 >> shift) & SLOT_MASK)
    }

    /// Replace the type of slot `index`, leaving the other nibbles untouched.
    pub fn with_slot(self, index: usize, ty: ParamType) -> Result<Self> {
        let shift = slot_shift(index)?;
        Ok(Self((self.0 & !(SLOT_MASK << shift)) | ((ty as u32) << shift)))
    }

    /// Mark slot 0 as the session token: a value input.
    pub fn with_session_slot(self) -> Self {
        Self((self.0 & !SLOT_MASK) | ParamType::ValueInput as u32)
    }
}

fn slot_shift(index: usize) -> Result<u32> {
    if index >= NUM_PARAMS {
        return Err(ReeSessionError::BadParameters(format!(
            "parameter slot {} out of range",
            index
        )));
    }
    Ok(index as u32 * SLOT_BITS)
}

impl fmt::Display for ParamTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Content of a single parameter slot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Param {
    #[default]
    None,
    /// Two 32-bit value words.
    Value { a: u32, b: u32 },
    /// A memory reference; its length is the buffer size.
    Memref(Vec<u8>),
}

impl Param {
    pub fn value(a: u32, b: u32) -> Self {
        Self::Value { a, b }
    }

    pub fn memref(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Memref(bytes.into())
    }
}

/// The four parameter slots of one command.
///
/// Slot 0 belongs to the session: whatever the caller puts there is replaced
/// by the service handle before the command leaves the process.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Params([Param; NUM_PARAMS]);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_slots(slots: [Param; NUM_PARAMS]) -> Self {
        Self(slots)
    }

    /// Builder-style setter for one slot.
    ///
    /// # Panics
    ///
    /// Panics if `index >= NUM_PARAMS`, like slice indexing.
    pub fn with(mut self, index: usize, param: Param) -> Self {
        self.0[index] = param;
        self
    }

    /// Value words of slot `index`, if it holds a value.
    pub fn value(&self, index: usize) -> Option<(u32, u32)> {
        match self.0.get(index)? {
            Param::Value { a, b } => Some((*a, *b)),
            _ => None,
        }
    }

    /// Buffer of slot `index`, if it holds a memory reference.
    pub fn memref(&self, index: usize) -> Option<&[u8]> {
        match self.0.get(index)? {
            Param::Memref(buf) => Some(buf),
            _ => None,
        }
    }

    pub fn slots(&self) -> &[Param; NUM_PARAMS] {
        &self.0
    }
}

impl Index<usize> for Params {
    type Output = Param;

    fn index(&self, index: usize) -> &Param {
        &self.0[index]
    }
}

impl IndexMut<usize> for Params {
    fn index_mut(&mut self, index: usize) -> &mut Param {
        &mut self.0[index]
    }
}
