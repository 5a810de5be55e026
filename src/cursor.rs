//! Bounds-checked, endian-aware byte reading for the ELF container.
//!
//! DWARF streams are read through `gimli::read`; [`Endian`] converts to the
//! byte order gimli expects.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CursorError {
    #[error("Truncated at {offset:#x}, needed {needed} bytes")]
    Truncated { offset: usize, needed: usize },

    #[error("Unterminated string at {offset:#x}")]
    UnterminatedString { offset: usize },
}

pub type Result<T> = std::result::Result<T, CursorError>;

/// Byte order of the data being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    /// Byte order of the host.
    pub const fn native() -> Self {
        if cfg!(target_endian = "little") {
            Endian::Little
        } else {
            Endian::Big
        }
    }

    pub fn is_little_endian(&self) -> bool {
        matches!(self, Endian::Little)
    }
}

impl From<Endian> for gimli::RunTimeEndian {
    fn from(endian: Endian) -> Self {
        match endian {
            Endian::Little => gimli::RunTimeEndian::Little,
            Endian::Big => gimli::RunTimeEndian::Big,
        }
    }
}

fn fixed<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N]> {
    offset
        .checked_add(N)
        .and_then(|end| data.get(offset..end))
        .and_then(|s| <[u8; N]>::try_from(s).ok())
        .ok_or(CursorError::Truncated { offset, needed: N })
}

/// Trait for reading values with endianness support
pub trait EndianRead {
    fn read_u8(&self, offset: usize) -> Result<u8>;
    fn read_u16(&self, offset: usize, endian: Endian) -> Result<u16>;
    fn read_u32(&self, offset: usize, endian: Endian) -> Result<u32>;
    fn read_u64(&self, offset: usize, endian: Endian) -> Result<u64>;
}

impl EndianRead for [u8] {
    fn read_u8(&self, offset: usize) -> Result<u8> {
        self.get(offset)
            .copied()
            .ok_or(CursorError::Truncated { offset, needed: 1 })
    }

    fn read_u16(&self, offset: usize, endian: Endian) -> Result<u16> {
        let bytes = fixed::<2>(self, offset)?;
        Ok(match endian {
            Endian::Little => u16::from_le_bytes(bytes),
            Endian::Big => u16::from_be_bytes(bytes),
        })
    }

    fn read_u32(&self, offset: usize, endian: Endian) -> Result<u32> {
        let bytes = fixed::<4>(self, offset)?;
        Ok(match endian {
            Endian::Little => u32::from_le_bytes(bytes),
            Endian::Big => u32::from_be_bytes(bytes),
        })
    }

    fn read_u64(&self, offset: usize, endian: Endian) -> Result<u64> {
        let bytes = fixed::<8>(self, offset)?;
        Ok(match endian {
            Endian::Little => u64::from_le_bytes(bytes),
            Endian::Big => u64::from_be_bytes(bytes),
        })
    }
}

/// Read a null-terminated string from data
pub fn read_cstring(data: &[u8], offset: usize) -> Result<&[u8]> {
    let slice = data
        .get(offset..)
        .filter(|s| !s.is_empty())
        .ok_or(CursorError::Truncated { offset, needed: 1 })?;
    let end = memchr::memchr(0, slice).ok_or(CursorError::UnterminatedString { offset })?;
    Ok(&slice[..end])
}

/// Align a value up to the specified alignment
pub fn align_up(value: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        value
    } else {
        value.div_ceil(alignment).saturating_mul(alignment)
    }
}
