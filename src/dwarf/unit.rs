//! Unit headers of `.debug_info` and `.debug_types`.

use gimli::{Encoding, UnitType};
use tracing::trace;

use crate::dwarf::{Result, Slice};

/// Position of a unit in [`crate::dwarf::DebugInfo`]'s unit list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(pub(crate) usize);

impl UnitId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Section a unit was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitSection {
    Info,
    /// DWARF 4 type units.
    Types,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Compile,
    Partial,
    Type { signature: u64, type_offset: u64 },
    Skeleton { dwo_id: u64 },
    SplitCompile { dwo_id: u64 },
    SplitType { signature: u64, type_offset: u64 },
}

impl UnitKind {
    /// Signature and unit-relative type die offset of a type unit.
    pub fn type_signature(&self) -> Option<(u64, u64)> {
        match *self {
            UnitKind::Type {
                signature,
                type_offset,
            }
            | UnitKind::SplitType {
                signature,
                type_offset,
            } => Some((signature, type_offset)),
            _ => None,
        }
    }
}

impl From<UnitType<usize>> for UnitKind {
    fn from(unit_type: UnitType<usize>) -> Self {
        match unit_type {
            UnitType::Compilation => UnitKind::Compile,
            UnitType::Partial => UnitKind::Partial,
            UnitType::Type {
                type_signature,
                type_offset,
            } => UnitKind::Type {
                signature: type_signature.0,
                type_offset: type_offset.0 as u64,
            },
            UnitType::SplitType {
                type_signature,
                type_offset,
            } => UnitKind::SplitType {
                signature: type_signature.0,
                type_offset: type_offset.0 as u64,
            },
            UnitType::Skeleton(dwo_id) => UnitKind::Skeleton { dwo_id: dwo_id.0 },
            UnitType::SplitCompilation(dwo_id) => UnitKind::SplitCompile { dwo_id: dwo_id.0 },
        }
    }
}

/// The parts of a gimli unit header the die tree needs, detached from the
/// section reader so [`crate::dwarf::DebugInfo`] can own it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitHeader {
    pub section: UnitSection,
    /// Section offset of the first byte of the unit (its length field).
    pub offset: u64,
    pub unit_length: u64,
    pub encoding: Encoding,
    pub kind: UnitKind,
    pub abbrev_offset: u64,
    /// Unit-relative offset of the first die.
    pub(crate) entries_offset: u64,
}

impl UnitHeader {
    fn from_gimli(header: &gimli::UnitHeader<Slice<'_>>, section: UnitSection) -> Self {
        Self {
            section,
            offset: header.offset().0 as u64,
            unit_length: header.unit_length() as u64,
            encoding: header.encoding(),
            kind: header.type_().into(),
            abbrev_offset: header.debug_abbrev_offset().0 as u64,
            entries_offset: header.header_size() as u64,
        }
    }

    /// Section offset one past the last byte of the unit.
    pub fn end(&self) -> u64 {
        self.offset + u64::from(self.encoding.format.initial_length_size()) + self.unit_length
    }

    /// Whether a section offset lies within the unit's dies.
    pub fn contains(&self, offset: u64) -> bool {
        offset >= self.offset + self.entries_offset && offset < self.end()
    }

    pub fn version(&self) -> u16 {
        self.encoding.version
    }
}

/// Parse every unit header in a section.
pub(crate) fn parse_units(data: Slice<'_>, section: UnitSection) -> Result<Vec<UnitHeader>> {
    let mut units = Vec::new();
    let mut push = |header: gimli::UnitHeader<Slice<'_>>| {
        let header = UnitHeader::from_gimli(&header, section);
        trace!(
            offset = header.offset,
            version = header.encoding.version,
            length = header.unit_length,
            "Parsed unit header"
        );
        units.push(header);
    };
    match section {
        UnitSection::Info => {
            let mut iter = gimli::DebugInfo::from(data).units();
            while let Some(header) = iter.next()? {
                push(header);
            }
        }
        UnitSection::Types => {
            let mut iter = gimli::DebugTypes::from(data).units();
            while let Some(header) = iter.next()? {
                push(header);
            }
        }
    }
    Ok(units)
}
