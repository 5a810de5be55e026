//! Ownership-tagged byte buffers.
//!
//! Section data and synthesized attribute payloads either borrow from the
//! backing image (or a unit's section bytes) or own a heap buffer. The variant
//! records which, so callers never have to guess whether a buffer outlives the
//! object it came from.

use bytes::Bytes;
use std::fmt;
use std::ops::Deref;

#[derive(Clone)]
pub enum DataBuffer<'a> {
    /// Bytes borrowed from the backing image or a section's data.
    Borrowed(&'a [u8]),
    /// Heap bytes: converted, synthesized, or supplied by the caller.
    Owned(Bytes),
}

impl<'a> DataBuffer<'a> {
    pub const EMPTY: DataBuffer<'static> = DataBuffer::Borrowed(&[]);

    pub fn as_slice(&self) -> &[u8] {
        match self {
            DataBuffer::Borrowed(b) => b,
            DataBuffer::Owned(b) => b,
        }
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, DataBuffer::Owned(_))
    }

    /// Detach from the source bytes, copying if currently borrowed.
    pub fn into_owned(self) -> DataBuffer<'static> {
        match self {
            DataBuffer::Borrowed(b) => DataBuffer::Owned(Bytes::copy_from_slice(b)),
            DataBuffer::Owned(b) => DataBuffer::Owned(b),
        }
    }

    /// Sub-range view. Borrowed buffers stay borrowed; owned ones share the
    /// allocation.
    pub fn slice(&self, start: usize, end: usize) -> Option<DataBuffer<'a>> {
        if start > end || end > self.len() {
            return None;
        }
        Some(match self {
            DataBuffer::Borrowed(b) => DataBuffer::Borrowed(&b[start..end]),
            DataBuffer::Owned(b) => DataBuffer::Owned(b.slice(start..end)),
        })
    }
}

impl Deref for DataBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl Default for DataBuffer<'_> {
    fn default() -> Self {
        DataBuffer::Borrowed(&[])
    }
}

impl PartialEq for DataBuffer<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for DataBuffer<'_> {}

impl fmt::Debug for DataBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_owned() { "Owned" } else { "Borrowed" };
        write!(f, "{}({} bytes)", kind, self.len())
    }
}

impl<'a> From<&'a [u8]> for DataBuffer<'a> {
    fn from(b: &'a [u8]) -> Self {
        DataBuffer::Borrowed(b)
    }
}

impl From<Vec<u8>> for DataBuffer<'_> {
    fn from(v: Vec<u8>) -> Self {
        DataBuffer::Owned(Bytes::from(v))
    }
}

impl From<Bytes> for DataBuffer<'_> {
    fn from(b: Bytes) -> Self {
        DataBuffer::Owned(b)
    }
}
