//! Attribute values, read through `gimli::read::EntriesRaw`.

use gimli::constants::*;
use gimli::{Abbreviations, AttributeSpecification, Encoding, EntriesRaw, Reader, UnitOffset};

use crate::buffer::DataBuffer;
use crate::dwarf::unit::UnitId;
use crate::dwarf::{DwarfError, Result, Slice};

/// A decoded attribute value, tagged by the class of its form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue<'a> {
    Address(u64),
    /// Index into `.debug_addr`, relative to the unit's address base.
    AddressIndex(u64),
    Block(DataBuffer<'a>),
    /// Unsigned constant (`data1`..`data8`, `udata`).
    Constant(u64),
    /// Signed constant (`sdata`, `implicit_const`).
    Signed(i64),
    Flag(bool),
    /// Offset into another section (`sec_offset`).
    SecOffset(u64),
    /// Offset relative to the start of the containing unit.
    UnitRef(u64),
    /// Offset into `.debug_info`.
    DebugInfoRef(u64),
    TypeSignature(u64),
    /// Offset into the supplementary object file's `.debug_info`.
    SupRef(u64),
    /// Inline string.
    String(DataBuffer<'a>),
    /// Offset into `.debug_str`.
    StrOffset(u64),
    /// Offset into `.debug_line_str`.
    LineStrOffset(u64),
    /// Index into `.debug_str_offsets`.
    StrIndex(u64),
    /// Offset into the supplementary object file's string section.
    SupStrOffset(u64),
    Exprloc(DataBuffer<'a>),
    LocListIndex(u64),
    RngListIndex(u64),
}

/// One attribute of a die: its code, the form it was encoded with and the
/// decoded value. `unit` is the unit reference-class values are relative to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute<'a> {
    pub code: DwAt,
    pub form: DwForm,
    pub value: AttributeValue<'a>,
    pub unit: UnitId,
    pub encoding: Encoding,
}

impl<'a> Attribute<'a> {
    /// Unsigned constant value, if the attribute has one.
    pub fn udata(&self) -> Option<u64> {
        match self.value {
            AttributeValue::Constant(v) => Some(v),
            AttributeValue::Signed(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Signed constant value. Fixed-size data forms are sign-extended from
    /// their width.
    pub fn sdata(&self) -> Option<i64> {
        match self.value {
            AttributeValue::Signed(v) => Some(v),
            AttributeValue::Constant(v) => Some(match self.form {
                DW_FORM_data1 => v as u8 as i8 as i64,
                DW_FORM_data2 => v as u16 as i16 as i64,
                DW_FORM_data4 => v as u32 as i32 as i64,
                _ => v as i64,
            }),
            _ => None,
        }
    }

    pub fn flag(&self) -> Option<bool> {
        match self.value {
            AttributeValue::Flag(f) => Some(f),
            _ => None,
        }
    }

    /// Payload of a block or expression attribute.
    pub fn block(&self) -> Option<&DataBuffer<'a>> {
        match &self.value {
            AttributeValue::Block(b) | AttributeValue::Exprloc(b) => Some(b),
            _ => None,
        }
    }

    /// True for values that name another die.
    pub fn is_reference(&self) -> bool {
        matches!(
            self.value,
            AttributeValue::UnitRef(_)
                | AttributeValue::DebugInfoRef(_)
                | AttributeValue::TypeSignature(_)
                | AttributeValue::SupRef(_)
        )
    }

    /// Detach the attribute from the section bytes it borrows.
    pub fn into_owned(self) -> Attribute<'static> {
        let value = match self.value {
            AttributeValue::Block(b) => AttributeValue::Block(b.into_owned()),
            AttributeValue::Exprloc(b) => AttributeValue::Exprloc(b.into_owned()),
            AttributeValue::String(b) => AttributeValue::String(b.into_owned()),
            AttributeValue::Address(v) => AttributeValue::Address(v),
            AttributeValue::AddressIndex(v) => AttributeValue::AddressIndex(v),
            AttributeValue::Constant(v) => AttributeValue::Constant(v),
            AttributeValue::Signed(v) => AttributeValue::Signed(v),
            AttributeValue::Flag(v) => AttributeValue::Flag(v),
            AttributeValue::SecOffset(v) => AttributeValue::SecOffset(v),
            AttributeValue::UnitRef(v) => AttributeValue::UnitRef(v),
            AttributeValue::DebugInfoRef(v) => AttributeValue::DebugInfoRef(v),
            AttributeValue::TypeSignature(v) => AttributeValue::TypeSignature(v),
            AttributeValue::SupRef(v) => AttributeValue::SupRef(v),
            AttributeValue::StrOffset(v) => AttributeValue::StrOffset(v),
            AttributeValue::LineStrOffset(v) => AttributeValue::LineStrOffset(v),
            AttributeValue::StrIndex(v) => AttributeValue::StrIndex(v),
            AttributeValue::SupStrOffset(v) => AttributeValue::SupStrOffset(v),
            AttributeValue::LocListIndex(v) => AttributeValue::LocListIndex(v),
            AttributeValue::RngListIndex(v) => AttributeValue::RngListIndex(v),
        };
        Attribute {
            code: self.code,
            form: self.form,
            value,
            unit: self.unit,
            encoding: self.encoding,
        }
    }
}

/// Reads one die's attributes in abbreviation order.
pub(crate) struct AttrReader<'abbrev, 'a> {
    entries: EntriesRaw<'abbrev, Slice<'a>>,
    /// The whole unit, so unit offsets index it directly.
    unit_data: Slice<'a>,
    unit: UnitId,
    encoding: Encoding,
}

impl<'abbrev, 'a> AttrReader<'abbrev, 'a> {
    /// A reader positioned at unit offset `at`.
    pub(crate) fn new(
        unit_data: Slice<'a>,
        at: u64,
        abbrevs: &'abbrev Abbreviations,
        unit: UnitId,
        encoding: Encoding,
    ) -> Result<Self> {
        let pos = usize::try_from(at).map_err(|_| DwarfError::InvalidDieOffset(at))?;
        let mut input = unit_data;
        input.skip(pos)?;
        Ok(Self {
            entries: EntriesRaw::new(input, encoding, abbrevs, UnitOffset(pos)),
            unit_data,
            unit,
            encoding,
        })
    }

    pub(crate) fn read(&mut self, spec: AttributeSpecification) -> Result<Attribute<'a>> {
        let start = self.entries.next_offset().0;
        let form = match spec.form() {
            DW_FORM_indirect => self.indirect_form(start)?,
            form => form,
        };
        let raw = self.entries.read_attribute(spec)?.raw_value();
        let end = self.entries.next_offset().0;
        let value = self.convert(raw, form, end)?;
        Ok(Attribute {
            code: spec.name(),
            form,
            value,
            unit: self.unit,
            encoding: self.encoding,
        })
    }

    /// The form an `indirect` attribute at `at` names.
    fn indirect_form(&self, at: usize) -> Result<DwForm> {
        let mut input = self.unit_data;
        input.skip(at)?;
        loop {
            let form = DwForm(input.read_uleb128_u16()?);
            if form != DW_FORM_indirect {
                return Ok(form);
            }
        }
    }

    fn convert(
        &self,
        raw: gimli::AttributeValue<Slice<'a>>,
        form: DwForm,
        end: usize,
    ) -> Result<AttributeValue<'a>> {
        use gimli::AttributeValue as G;
        use AttributeValue as V;

        let bytes = |r: Slice<'a>| DataBuffer::Borrowed(r.slice());
        Ok(match raw {
            G::Addr(a) => V::Address(a),
            G::DebugAddrIndex(i) => V::AddressIndex(i.0 as u64),
            G::Block(b) => V::Block(bytes(b)),
            G::Exprloc(e) => V::Exprloc(bytes(e.0)),
            // The value is the last sixteen bytes read.
            G::Data16(_) => {
                let data = end
                    .checked_sub(16)
                    .and_then(|start| self.unit_data.slice().get(start..end))
                    .ok_or(DwarfError::InvalidDieOffset(end as u64))?;
                V::Block(DataBuffer::Borrowed(data))
            }
            G::Data1(v) => V::Constant(u64::from(v)),
            G::Data2(v) => V::Constant(u64::from(v)),
            G::Data4(v) => V::Constant(u64::from(v)),
            G::Data8(v) | G::Udata(v) => V::Constant(v),
            G::Sdata(v) => V::Signed(v),
            G::Flag(f) => V::Flag(f),
            G::SecOffset(o) => V::SecOffset(o as u64),
            G::UnitRef(o) => V::UnitRef(o.0 as u64),
            G::DebugInfoRef(o) => V::DebugInfoRef(o.0 as u64),
            G::DebugTypesRef(sig) => V::TypeSignature(sig.0),
            G::DebugInfoRefSup(o) => V::SupRef(o.0 as u64),
            G::String(s) => V::String(bytes(s)),
            G::DebugStrRef(o) => V::StrOffset(o.0 as u64),
            G::DebugLineStrRef(o) => V::LineStrOffset(o.0 as u64),
            G::DebugStrOffsetsIndex(i) => V::StrIndex(i.0 as u64),
            G::DebugStrRefSup(o) => V::SupStrOffset(o.0 as u64),
            G::DebugLocListsIndex(i) => V::LocListIndex(i.0 as u64),
            G::DebugRngListsIndex(i) => V::RngListIndex(i.0 as u64),
            // Raw values never carry the interpreted classes.
            _ => return Err(DwarfError::Read(gimli::Error::UnknownForm(form))),
        })
    }

    pub(crate) fn skip(&mut self, specs: &[AttributeSpecification]) -> Result<()> {
        Ok(self.entries.skip_attributes(specs)?)
    }
}
