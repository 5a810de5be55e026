//! Debug information entries.
//!
//! A unit's dies are decoded once into an arena: a flat vector in stream
//! order with parent, first-child and next-sibling links stored as indices.
//! `Die` is a copyable handle into that arena.

use std::fmt;

use gimli::constants::*;
use gimli::{Abbreviation, Abbreviations, EntriesRaw, Reader, UnitOffset};
use tracing::{debug, trace};

use crate::dwarf::attr::{AttrReader, Attribute, AttributeValue};
use crate::dwarf::unit::{UnitHeader, UnitId};
use crate::dwarf::{DebugInfo, DwarfError, Result, Slice, Unit};

#[derive(Debug, Clone, Copy)]
pub(crate) struct DieEntry {
    /// Section offset of the die.
    pub(crate) offset: u64,
    pub(crate) code: u64,
    pub(crate) tag: DwTag,
    pub(crate) has_children: bool,
    /// Unit offset of the first attribute.
    pub(crate) attrs_offset: u64,
    pub(crate) parent: Option<u32>,
    pub(crate) first_child: Option<u32>,
    pub(crate) next_sibling: Option<u32>,
}

/// Decoded die tree of one unit, plus the base offsets its root declares.
#[derive(Debug, Clone, Default)]
pub(crate) struct DieArena {
    pub(crate) entries: Vec<DieEntry>,
    pub(crate) str_offsets_base: Option<u64>,
    pub(crate) addr_base: Option<u64>,
}

impl DieArena {
    /// Linear scan of a unit's entries. `unit_data` covers the whole unit.
    pub(crate) fn build(
        unit_data: Slice<'_>,
        header: &UnitHeader,
        id: UnitId,
        abbrevs: &Abbreviations,
        max_depth: usize,
    ) -> Result<Self> {
        let start = usize::try_from(header.entries_offset)
            .map_err(|_| DwarfError::InvalidDieOffset(header.offset))?;
        let mut input = unit_data;
        input.skip(start)?;
        let mut raw = EntriesRaw::new(input, header.encoding, abbrevs, UnitOffset(start));

        let mut entries: Vec<DieEntry> = Vec::new();
        // Open parents, and the last child seen at each open level. The
        // bottom of `last_child` tracks top-level dies.
        let mut parents: Vec<u32> = Vec::new();
        let mut last_child: Vec<Option<u32>> = vec![None];

        while !raw.is_empty() {
            let offset = header.offset + raw.next_offset().0 as u64;
            let Some(abbrev) = raw.read_abbreviation()? else {
                // Null entry ends a sibling chain; at top level it is padding.
                if parents.pop().is_some() {
                    last_child.pop();
                }
                continue;
            };
            let attrs_offset = raw.next_offset().0 as u64;
            raw.skip_attributes(abbrev.attributes())?;

            let index = u32::try_from(entries.len()).map_err(|_| DwarfError::InvalidUnit {
                offset: header.offset,
                reason: "too many dies".into(),
            })?;
            entries.push(DieEntry {
                offset,
                code: abbrev.code(),
                tag: abbrev.tag(),
                has_children: abbrev.has_children(),
                attrs_offset,
                parent: parents.last().copied(),
                first_child: None,
                next_sibling: None,
            });
            if let Some(level) = last_child.last_mut() {
                match level.replace(index) {
                    Some(prev) => entries[prev as usize].next_sibling = Some(index),
                    None => {
                        if let Some(&parent) = parents.last() {
                            entries[parent as usize].first_child = Some(index);
                        }
                    }
                }
            }

            if abbrev.has_children() {
                if parents.len() >= max_depth {
                    return Err(DwarfError::TooDeep(max_depth));
                }
                parents.push(index);
                last_child.push(None);
            }
        }

        let mut arena = Self {
            entries,
            str_offsets_base: None,
            addr_base: None,
        };
        if let Some(root) = arena.entries.first().copied() {
            let abbrev = abbrevs
                .get(root.code)
                .ok_or(gimli::Error::InvalidAbbreviationCode(root.code))?;
            let mut reader = AttrReader::new(unit_data, root.attrs_offset, abbrevs, id, header.encoding)?;
            for spec in abbrev.attributes() {
                let attr = reader.read(*spec)?;
                let base = match attr.value {
                    AttributeValue::SecOffset(v) | AttributeValue::Constant(v) => Some(v),
                    _ => None,
                };
                match attr.code {
                    DW_AT_str_offsets_base => arena.str_offsets_base = base,
                    DW_AT_addr_base | DW_AT_GNU_addr_base => arena.addr_base = base,
                    _ => {}
                }
            }
        }

        trace!(unit = id.0, dies = arena.len(), "Decoded die arena");
        Ok(arena)
    }

    /// Arena index of the die at a section offset.
    pub(crate) fn find(&self, offset: u64) -> Option<u32> {
        self.entries
            .binary_search_by_key(&offset, |e| e.offset)
            .ok()
            .and_then(|i| u32::try_from(i).ok())
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// A debug information entry.
///
/// Cheap to copy; borrows the [`DebugInfo`] it came from.
#[derive(Clone, Copy)]
pub struct Die<'a> {
    pub(crate) dwarf: &'a DebugInfo<'a>,
    pub(crate) unit: UnitId,
    pub(crate) cu: &'a Unit,
    pub(crate) index: u32,
    pub(crate) entry: DieEntry,
}

impl PartialEq for Die<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.dwarf, other.dwarf) && self.unit == other.unit && self.index == other.index
    }
}

impl Eq for Die<'_> {}

impl fmt::Debug for Die<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Die")
            .field("unit", &self.unit.0)
            .field("offset", &format_args!("{:#x}", self.entry.offset))
            .field("tag", &self.tag())
            .finish()
    }
}

impl<'a> Die<'a> {
    pub fn unit(&self) -> UnitId {
        self.unit
    }

    pub fn unit_header(&self) -> &'a UnitHeader {
        &self.cu.header
    }

    /// Section offset of the die.
    pub fn offset(&self) -> u64 {
        self.entry.offset
    }

    /// Offset of the die relative to its unit.
    pub fn unit_offset(&self) -> u64 {
        self.entry.offset - self.cu.header.offset
    }

    fn abbrev(&self) -> Result<&'a Abbreviation> {
        self.cu
            .abbrevs
            .get(self.entry.code)
            .ok_or(DwarfError::Read(gimli::Error::InvalidAbbreviationCode(
                self.entry.code,
            )))
    }

    pub fn tag(&self) -> DwTag {
        self.entry.tag
    }

    pub fn has_children(&self) -> bool {
        self.entry.has_children
    }

    /// All attributes, in the order they were encoded.
    pub fn attributes(&self) -> Result<Vec<Attribute<'a>>> {
        let mut reader = self.attr_reader()?;
        self.abbrev()?
            .attributes()
            .iter()
            .map(|spec| reader.read(*spec))
            .collect()
    }

    /// The attribute with the given code, if the die has it.
    pub fn attr(&self, code: DwAt) -> Result<Option<Attribute<'a>>> {
        let specs = self.abbrev()?.attributes();
        let Some(pos) = specs.iter().position(|s| s.name() == code) else {
            return Ok(None);
        };
        let mut reader = self.attr_reader()?;
        reader.skip(&specs[..pos])?;
        reader.read(specs[pos]).map(Some)
    }

    pub fn has_attr(&self, code: DwAt) -> bool {
        self.abbrev()
            .is_ok_and(|a| a.attributes().iter().any(|s| s.name() == code))
    }

    /// Like [`Die::attr`], but also looks through `DW_AT_abstract_origin` and
    /// `DW_AT_specification` chains.
    pub fn attr_integrate(&self, code: DwAt) -> Result<Option<Attribute<'a>>> {
        let limit = self.dwarf.config().max_reference_hops;
        let mut die = *self;
        for _ in 0..=limit {
            if let Some(attr) = die.attr(code)? {
                return Ok(Some(attr));
            }
            let origin = match die.attr(DW_AT_abstract_origin)? {
                Some(a) => Some(a),
                None => die.attr(DW_AT_specification)?,
            };
            match origin {
                Some(origin) => die = self.dwarf.resolve_reference(&origin)?,
                None => return Ok(None),
            }
        }
        debug!(offset = self.offset(), "Attribute reference chain too long");
        Err(DwarfError::ReferenceLoop(limit))
    }

    pub fn parent(&self) -> Option<Die<'a>> {
        self.entry.parent.and_then(|i| self.sibling_handle(i))
    }

    pub fn first_child(&self) -> Option<Die<'a>> {
        self.entry.first_child.and_then(|i| self.sibling_handle(i))
    }

    pub fn next_sibling(&self) -> Option<Die<'a>> {
        self.entry.next_sibling.and_then(|i| self.sibling_handle(i))
    }

    pub fn children(&self) -> Children<'a> {
        Children {
            next: self.first_child(),
        }
    }

    /// `DW_AT_name`, resolved through the string sections.
    pub fn name(&self) -> Result<Option<String>> {
        match self.attr_integrate(DW_AT_name)? {
            Some(attr) => {
                let bytes = self.dwarf.attr_string(&attr)?;
                Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
            }
            None => Ok(None),
        }
    }

    pub fn byte_size(&self) -> Result<Option<u64>> {
        Ok(self
            .attr_integrate(DW_AT_byte_size)?
            .and_then(|a| a.udata()))
    }

    /// The die named by `DW_AT_type`, if any.
    pub fn type_die(&self) -> Result<Option<Die<'a>>> {
        match self.attr_integrate(DW_AT_type)? {
            Some(attr) => self.dwarf.resolve_reference(&attr).map(Some),
            None => Ok(None),
        }
    }

    /// Strip typedefs and qualifiers off this die.
    pub fn peel(&self) -> Result<Die<'a>> {
        let limit = self.dwarf.config().max_peel_depth;
        let mut die = *self;
        for _ in 0..=limit {
            if !is_peelable(die.tag()) {
                return Ok(die);
            }
            match die.type_die()? {
                Some(next) => die = next,
                // A qualifier of nothing qualifies void.
                None => return Ok(die),
            }
        }
        Err(DwarfError::ReferenceLoop(limit))
    }

    /// The die's type with typedefs and qualifiers stripped.
    pub fn peeled_type(&self) -> Result<Option<Die<'a>>> {
        match self.type_die()? {
            Some(t) => t.peel().map(Some),
            None => Ok(None),
        }
    }

    fn sibling_handle(&self, index: u32) -> Option<Die<'a>> {
        self.dwarf.die_by_index(self.unit, index)
    }

    fn attr_reader(&self) -> Result<AttrReader<'a, 'a>> {
        let data = self.dwarf.unit_data(&self.cu.header)?;
        AttrReader::new(
            data,
            self.entry.attrs_offset,
            &self.cu.abbrevs,
            self.unit,
            self.cu.header.encoding,
        )
    }
}

pub(crate) fn is_peelable(tag: DwTag) -> bool {
    matches!(
        tag,
        DW_TAG_typedef
            | DW_TAG_const_type
            | DW_TAG_volatile_type
            | DW_TAG_restrict_type
            | DW_TAG_atomic_type
            | DW_TAG_shared_type
            | DW_TAG_packed_type
    )
}

/// Iterator over a die's direct children.
#[derive(Debug, Clone)]
pub struct Children<'a> {
    next: Option<Die<'a>>,
}

impl<'a> Iterator for Children<'a> {
    type Item = Die<'a>;

    fn next(&mut self) -> Option<Die<'a>> {
        let die = self.next?;
        self.next = die.next_sibling();
        Some(die)
    }
}

/// Every die of a unit, in stream order.
#[derive(Debug, Clone)]
pub struct UnitDies<'a> {
    pub(crate) dwarf: &'a DebugInfo<'a>,
    pub(crate) unit: UnitId,
    pub(crate) next: u32,
    pub(crate) len: u32,
}

impl<'a> Iterator for UnitDies<'a> {
    type Item = Die<'a>;

    fn next(&mut self) -> Option<Die<'a>> {
        if self.next >= self.len {
            return None;
        }
        let die = self.dwarf.die_by_index(self.unit, self.next);
        self.next += 1;
        die
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = (self.len - self.next) as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for UnitDies<'_> {}
