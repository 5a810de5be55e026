//! DWARF debug information.
//!
//! [`DebugInfo`] owns (or borrows from the object image) the `.debug_*`
//! sections, parses every unit header and abbreviation table up front and
//! decodes each unit's die tree lazily, once, on first traversal. The
//! sections are read with `gimli::read`; the die tree is an index over what
//! gimli's raw entry reader yields.

pub mod attr;
pub mod die;
pub mod unit;

#[cfg(test)]
pub(crate) mod testutil;

use std::collections::HashMap;
use std::sync::Arc;

use gimli::constants::{DwAt, DwForm, DwOp, DwTag};
use gimli::{Abbreviations, DebugAbbrevOffset, DebugAddrBase, DebugAddrIndex, DebugLineStrOffset};
use gimli::{DebugStrOffset, DebugStrOffsetsBase, DebugStrOffsetsIndex, RunTimeEndian};
use once_cell::sync::OnceCell;
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, warn};

use crate::buffer::DataBuffer;
use crate::config::DwarfConfig;
use crate::cursor::Endian;
use crate::formats::elf::{ElfObject, ObjectError, SectionFlags};
use die::DieArena;

pub use attr::{Attribute, AttributeValue};
pub use die::{Children, Die, UnitDies};
pub use unit::{UnitHeader, UnitId, UnitKind, UnitSection};

/// Debug information errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DwarfError {
    #[error("Missing section {0}")]
    MissingSection(&'static str),

    #[error("Section {0} is compressed")]
    CompressedSection(&'static str),

    #[error("Malformed DWARF: {0}")]
    Read(#[from] gimli::Error),

    #[error("Invalid unit at {offset:#x}: {reason}")]
    InvalidUnit { offset: u64, reason: String },

    #[error("Die tree nested deeper than {0} levels")]
    TooDeep(usize),

    #[error("No die at offset {0:#x}")]
    InvalidDieOffset(u64),

    #[error("Unit {0} does not belong to this debug information")]
    InvalidUnitId(usize),

    #[error("Type signature {0:#018x} not found")]
    UnknownTypeSignature(u64),

    #[error("Reference chain longer than {0} hops")]
    ReferenceLoop(usize),

    #[error("Address index {0} lies outside .debug_addr")]
    InvalidAddressIndex(u64),

    #[error("Invalid string offset {0:#x}")]
    InvalidStringOffset(u64),

    #[error("Attribute {code} has form {form}, expected a {expected}")]
    UnexpectedForm {
        code: DwAt,
        form: DwForm,
        expected: &'static str,
    },

    #[error("Die at {die:#x} lacks required attribute {attr}")]
    MissingAttribute { die: u64, attr: DwAt },

    #[error("Die at {die:#x} with tag {tag} is not the expected kind")]
    UnexpectedTag { die: u64, tag: DwTag },

    #[error("Unknown location operator {op:#x} at {offset:#x}")]
    UnknownOperator { op: u8, offset: usize },

    #[error("Operand of {op} at {offset:#x} lies outside its expression")]
    InvalidOperand { op: DwOp, offset: u64 },

    #[error("Operator {0} does not denote a nested value")]
    InvalidOperator(DwOp),

    #[error(transparent)]
    Object(#[from] ObjectError),
}

impl DwarfError {
    /// False for requests the input cannot answer, true for corrupt input.
    pub fn is_malformed_input(&self) -> bool {
        match self {
            DwarfError::MissingSection(_)
            | DwarfError::CompressedSection(_)
            | DwarfError::InvalidUnitId(_)
            | DwarfError::InvalidOperator(_) => false,
            DwarfError::Object(e) => e.is_malformed_input(),
            _ => true,
        }
    }
}

pub type Result<T> = std::result::Result<T, DwarfError>;

/// The reader every gimli section is parsed with.
pub(crate) type Slice<'a> = gimli::EndianSlice<'a, RunTimeEndian>;

/// Raw contents of the debug sections. Only `.debug_info` and
/// `.debug_abbrev` are required.
#[derive(Debug, Clone, Default)]
pub struct DwarfSections<'data> {
    pub debug_info: DataBuffer<'data>,
    pub debug_abbrev: DataBuffer<'data>,
    pub debug_str: DataBuffer<'data>,
    pub debug_line_str: DataBuffer<'data>,
    pub debug_str_offsets: DataBuffer<'data>,
    pub debug_addr: DataBuffer<'data>,
    pub debug_types: DataBuffer<'data>,
}

#[derive(Debug)]
pub(crate) struct Unit {
    pub(crate) header: UnitHeader,
    pub(crate) abbrevs: Arc<Abbreviations>,
    dies: OnceCell<std::result::Result<DieArena, DwarfError>>,
}

/// Debug information of one object.
#[derive(Debug)]
pub struct DebugInfo<'data> {
    sections: DwarfSections<'data>,
    endian: Endian,
    config: DwarfConfig,
    units: Vec<Unit>,
    /// Number of leading units that come from `.debug_info`.
    info_units: usize,
    signatures: HashMap<u64, UnitId>,
}

impl<'data> DebugInfo<'data> {
    /// Load the debug sections of an object.
    pub fn load(object: &ElfObject<'data>, config: &DwarfConfig) -> Result<Self> {
        let read = |name: &'static str, required: bool| -> Result<DataBuffer<'data>> {
            let Some(info) = object.section_by_name(name) else {
                return if required {
                    Err(DwarfError::MissingSection(name))
                } else {
                    Ok(DataBuffer::default())
                };
            };
            if info.header.flags().contains(SectionFlags::COMPRESSED) {
                return Err(DwarfError::CompressedSection(name));
            }
            Ok(object.section_data_bytes(info.index)?)
        };

        let sections = DwarfSections {
            debug_info: read(".debug_info", true)?,
            debug_abbrev: read(".debug_abbrev", true)?,
            debug_str: read(".debug_str", false)?,
            debug_line_str: read(".debug_line_str", false)?,
            debug_str_offsets: read(".debug_str_offsets", false)?,
            debug_addr: read(".debug_addr", false)?,
            debug_types: read(".debug_types", false)?,
        };
        Self::from_sections(sections, object.endian(), config)
    }

    /// Build from section contents supplied by the caller.
    pub fn from_sections(
        sections: DwarfSections<'data>,
        endian: Endian,
        config: &DwarfConfig,
    ) -> Result<Self> {
        let gimli_endian = RunTimeEndian::from(endian);
        let mut headers = unit::parse_units(
            Slice::new(&sections.debug_info, gimli_endian),
            UnitSection::Info,
        )?;
        let info_units = headers.len();
        headers.extend(unit::parse_units(
            Slice::new(&sections.debug_types, gimli_endian),
            UnitSection::Types,
        )?);

        let debug_abbrev = gimli::DebugAbbrev::new(&sections.debug_abbrev, gimli_endian);
        let mut tables: HashMap<u64, Arc<Abbreviations>> = HashMap::new();
        let mut units = Vec::with_capacity(headers.len());
        let mut signatures = HashMap::new();
        for (index, header) in headers.into_iter().enumerate() {
            let abbrevs = match tables.get(&header.abbrev_offset) {
                Some(table) => Arc::clone(table),
                None => {
                    let offset = usize::try_from(header.abbrev_offset)
                        .map_err(|_| gimli::Error::OffsetOutOfBounds(header.abbrev_offset))?;
                    let table = Arc::new(debug_abbrev.abbreviations(DebugAbbrevOffset(offset))?);
                    tables.insert(header.abbrev_offset, Arc::clone(&table));
                    table
                }
            };
            if let Some((signature, _)) = header.kind.type_signature() {
                if signatures.insert(signature, UnitId(index)).is_some() {
                    warn!(signature, "Duplicate type unit signature");
                }
            }
            units.push(Unit {
                header,
                abbrevs,
                dies: OnceCell::new(),
            });
        }

        debug!(
            units = units.len(),
            abbrev_tables = tables.len(),
            type_units = signatures.len(),
            "Loaded debug information"
        );
        Ok(Self {
            sections,
            endian,
            config: config.clone(),
            units,
            info_units,
            signatures,
        })
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn config(&self) -> &DwarfConfig {
        &self.config
    }

    pub fn sections(&self) -> &DwarfSections<'data> {
        &self.sections
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn units(&self) -> impl Iterator<Item = UnitId> {
        (0..self.units.len()).map(UnitId)
    }

    fn unit(&self, unit: UnitId) -> Result<&Unit> {
        self.units
            .get(unit.0)
            .ok_or(DwarfError::InvalidUnitId(unit.0))
    }

    /// Header of a unit. Ids minted by another `DebugInfo` may not exist
    /// here.
    pub fn unit_header(&self, unit: UnitId) -> Result<&UnitHeader> {
        self.unit(unit).map(|u| &u.header)
    }

    /// The bytes of one unit, so unit offsets index them directly.
    pub(crate) fn unit_data(&self, header: &UnitHeader) -> Result<Slice<'_>> {
        let section: &[u8] = match header.section {
            UnitSection::Info => &self.sections.debug_info,
            UnitSection::Types => &self.sections.debug_types,
        };
        let bytes = usize::try_from(header.offset)
            .ok()
            .zip(usize::try_from(header.end()).ok())
            .and_then(|(start, end)| section.get(start..end))
            .ok_or(DwarfError::InvalidDieOffset(header.offset))?;
        Ok(Slice::new(bytes, self.endian.into()))
    }

    /// The unit's die arena, decoding it on first use.
    fn arena(&self, unit: UnitId) -> Result<&DieArena> {
        let u = self.unit(unit)?;
        u.dies
            .get_or_init(|| {
                DieArena::build(
                    self.unit_data(&u.header)?,
                    &u.header,
                    unit,
                    &u.abbrevs,
                    self.config.max_die_depth,
                )
            })
            .as_ref()
            .map_err(Clone::clone)
    }

    pub(crate) fn die_by_index<'a>(&'a self, unit: UnitId, index: u32) -> Option<Die<'a>> {
        let cu = self.units.get(unit.0)?;
        let arena = self.arena(unit).ok()?;
        let entry = *arena.entries.get(index as usize)?;
        Some(Die {
            dwarf: self,
            unit,
            cu,
            index,
            entry,
        })
    }

    /// Every die of a unit, in stream order.
    pub fn dies_in_unit<'a>(&'a self, unit: UnitId) -> Result<UnitDies<'a>> {
        let arena = self.arena(unit)?;
        Ok(UnitDies {
            dwarf: self,
            unit,
            next: 0,
            len: arena.len() as u32,
        })
    }

    /// The first top-level die of a unit.
    pub fn unit_root<'a>(&'a self, unit: UnitId) -> Result<Die<'a>> {
        self.arena(unit)?;
        self.die_by_index(unit, 0)
            .ok_or(DwarfError::InvalidDieOffset(self.unit_header(unit)?.offset))
    }

    /// The die at a `.debug_info` offset.
    pub fn die_at<'a>(&'a self, offset: u64) -> Result<Die<'a>> {
        let infos = &self.units[..self.info_units];
        let pos = infos.partition_point(|u| u.header.offset <= offset);
        let index = pos
            .checked_sub(1)
            .filter(|&i| infos[i].header.contains(offset))
            .ok_or(DwarfError::InvalidDieOffset(offset))?;
        self.die_in_unit(UnitId(index), offset)
    }

    /// The die at a section offset within a known unit.
    fn die_in_unit<'a>(&'a self, unit: UnitId, offset: u64) -> Result<Die<'a>> {
        let arena = self.arena(unit)?;
        arena
            .find(offset)
            .and_then(|i| self.die_by_index(unit, i))
            .ok_or(DwarfError::InvalidDieOffset(offset))
    }

    /// The die at an offset relative to the start of `unit`.
    pub fn die_at_unit_offset<'a>(&'a self, unit: UnitId, offset: u64) -> Result<Die<'a>> {
        let header = self.unit_header(unit)?;
        let abs = header
            .offset
            .checked_add(offset)
            .filter(|&abs| header.contains(abs))
            .ok_or(DwarfError::InvalidDieOffset(offset))?;
        self.die_in_unit(unit, abs)
    }

    /// The die a reference-class attribute points at.
    pub fn resolve_reference<'a>(&'a self, attr: &Attribute<'_>) -> Result<Die<'a>> {
        match attr.value {
            AttributeValue::UnitRef(off) => self.die_at_unit_offset(attr.unit, off),
            AttributeValue::DebugInfoRef(off) => self.die_at(off),
            AttributeValue::TypeSignature(sig) => {
                let unit = *self
                    .signatures
                    .get(&sig)
                    .ok_or(DwarfError::UnknownTypeSignature(sig))?;
                let (_, type_offset) = self
                    .unit_header(unit)?
                    .kind
                    .type_signature()
                    .ok_or(DwarfError::UnknownTypeSignature(sig))?;
                self.die_at_unit_offset(unit, type_offset)
            }
            _ => Err(DwarfError::UnexpectedForm {
                code: attr.code,
                form: attr.form,
                expected: "reference",
            }),
        }
    }

    /// Bytes of a string-class attribute, without the terminating NUL.
    pub fn attr_string<'a>(&'a self, attr: &Attribute<'a>) -> Result<DataBuffer<'a>> {
        let endian = RunTimeEndian::from(self.endian);
        let debug_str = gimli::DebugStr::new(&self.sections.debug_str, endian);
        let (key, found) = match attr.value {
            AttributeValue::String(ref s) => return Ok(s.clone()),
            AttributeValue::StrOffset(off) => {
                (off, debug_str.get_str(DebugStrOffset(str_offset(off)?)))
            }
            AttributeValue::LineStrOffset(off) => {
                let line_str = gimli::DebugLineStr::new(&self.sections.debug_line_str, endian);
                (off, line_str.get_str(DebugLineStrOffset(str_offset(off)?)))
            }
            AttributeValue::StrIndex(index) => {
                let base = self.arena(attr.unit)?.str_offsets_base.unwrap_or(0);
                let found = gimli::DebugStrOffsets::from(gimli::EndianSlice::new(&self.sections.debug_str_offsets, endian))
                    .get_str_offset(
                        attr.encoding.format,
                        DebugStrOffsetsBase(str_offset(base)?),
                        DebugStrOffsetsIndex(str_offset(index)?),
                    )
                    .and_then(|entry| debug_str.get_str(entry));
                (index, found)
            }
            _ => {
                return Err(DwarfError::UnexpectedForm {
                    code: attr.code,
                    form: attr.form,
                    expected: "string",
                })
            }
        };
        found
            .map(|s| DataBuffer::Borrowed(s.slice()))
            .map_err(|_| DwarfError::InvalidStringOffset(key))
    }

    /// Value of an address-class attribute, reading `.debug_addr` for
    /// indexed forms.
    pub fn attr_address(&self, attr: &Attribute<'_>) -> Result<u64> {
        match attr.value {
            AttributeValue::Address(a) => Ok(a),
            AttributeValue::AddressIndex(index) => {
                let base = self.arena(attr.unit)?.addr_base.unwrap_or(0);
                let (Ok(base), Ok(slot)) = (usize::try_from(base), usize::try_from(index)) else {
                    return Err(DwarfError::InvalidAddressIndex(index));
                };
                gimli::DebugAddr::from(Slice::new(&self.sections.debug_addr, self.endian.into()))
                    .get_address(
                        attr.encoding.address_size,
                        DebugAddrBase(base),
                        DebugAddrIndex(slot),
                    )
                    .map_err(|_| DwarfError::InvalidAddressIndex(index))
            }
            _ => Err(DwarfError::UnexpectedForm {
                code: attr.code,
                form: attr.form,
                expected: "address",
            }),
        }
    }

    /// Decode every unit's die tree in parallel. Returns the total number of
    /// dies.
    pub fn materialize_all(&self) -> Result<usize> {
        let counts = (0..self.units.len())
            .into_par_iter()
            .map(|i| self.arena(UnitId(i)).map(DieArena::len))
            .collect::<Result<Vec<_>>>()?;
        let total: usize = counts.iter().sum();
        debug!(units = counts.len(), dies = total, "Materialized all units");
        Ok(total)
    }
}

fn str_offset(offset: u64) -> Result<usize> {
    usize::try_from(offset).map_err(|_| DwarfError::InvalidStringOffset(offset))
}
