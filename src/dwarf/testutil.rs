//! DWARF assembler for unit tests.
//!
//! Every die gets its own abbreviation; all units share one abbreviation
//! table at offset 0. References are written by label and patched at the end.

use std::collections::HashMap;

use gimli::constants::*;

use crate::buffer::DataBuffer;
use crate::config::DwarfConfig;
use crate::cursor::Endian;
use crate::dwarf::{DebugInfo, DwarfSections};

#[derive(Debug, Clone, Copy)]
enum FixupKind {
    UnitRelative { unit_start: u64 },
    SectionRelative,
}

#[derive(Debug)]
struct Fixup {
    pos: usize,
    size: usize,
    label: &'static str,
    kind: FixupKind,
}

#[derive(Debug, Default)]
struct PendingDie {
    tag: u16,
    children: bool,
    label: Option<&'static str>,
    specs: Vec<(DwAt, DwForm, Option<i64>)>,
    body: Vec<u8>,
    fixups: Vec<(usize, usize, &'static str, bool)>,
}

#[derive(Debug, Default)]
pub(crate) struct DwarfBuilder {
    info: Vec<u8>,
    abbrev: Vec<u8>,
    strings: Vec<u8>,
    labels: HashMap<&'static str, u64>,
    fixups: Vec<Fixup>,
    next_code: u64,
}

pub(crate) struct UnitBuilder<'b> {
    b: &'b mut DwarfBuilder,
    start: u64,
    version: u16,
    address_size: u8,
    pending: Option<PendingDie>,
}

pub(crate) struct Built {
    pub(crate) sections: DwarfSections<'static>,
    pub(crate) labels: HashMap<&'static str, u64>,
}

impl Built {
    pub(crate) fn debug_info(&self) -> DebugInfo<'static> {
        DebugInfo::from_sections(self.sections.clone(), Endian::Little, &DwarfConfig::default())
            .unwrap()
    }

    pub(crate) fn offset(&self, label: &str) -> u64 {
        self.labels[label]
    }
}

fn uleb(out: &mut Vec<u8>, mut v: u64) {
    loop {
        let byte = (v & 0x7f) as u8;
        v >>= 7;
        if v == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

fn sleb(out: &mut Vec<u8>, mut v: i64) {
    loop {
        let byte = (v & 0x7f) as u8;
        v >>= 7;
        let done = (v == 0 && byte & 0x40 == 0) || (v == -1 && byte & 0x40 != 0);
        if done {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// LEB128 encoders for hand-written expressions in tests.
pub(crate) fn uleb_bytes(v: u64) -> Vec<u8> {
    let mut out = Vec::new();
    uleb(&mut out, v);
    out
}

pub(crate) fn sleb_bytes(v: i64) -> Vec<u8> {
    let mut out = Vec::new();
    sleb(&mut out, v);
    out
}

impl DwarfBuilder {
    pub(crate) fn new() -> Self {
        Self {
            strings: vec![0],
            next_code: 1,
            ..Default::default()
        }
    }

    /// A compile unit (DWARF 2 to 5).
    pub(crate) fn unit(&mut self, version: u16, address_size: u8, f: impl FnOnce(&mut UnitBuilder<'_>)) {
        self.unit_with(version, address_size, None, f)
    }

    /// A DWARF 5 type unit whose type die carries `type_label`.
    pub(crate) fn type_unit(
        &mut self,
        signature: u64,
        type_label: &'static str,
        f: impl FnOnce(&mut UnitBuilder<'_>),
    ) {
        self.unit_with(5, 8, Some((signature, type_label)), f)
    }

    fn unit_with(
        &mut self,
        version: u16,
        address_size: u8,
        type_unit: Option<(u64, &'static str)>,
        f: impl FnOnce(&mut UnitBuilder<'_>),
    ) {
        let start = self.info.len();
        self.info.extend_from_slice(&0u32.to_le_bytes());
        self.info.extend_from_slice(&version.to_le_bytes());
        if version >= 5 {
            let ut = if type_unit.is_some() { DW_UT_type } else { DW_UT_compile };
            self.info.push(ut.0);
            self.info.push(address_size);
            self.info.extend_from_slice(&0u32.to_le_bytes());
        } else {
            self.info.extend_from_slice(&0u32.to_le_bytes());
            self.info.push(address_size);
        }
        if let Some((signature, label)) = type_unit {
            self.info.extend_from_slice(&signature.to_le_bytes());
            self.fixups.push(Fixup {
                pos: self.info.len(),
                size: 4,
                label,
                kind: FixupKind::UnitRelative {
                    unit_start: start as u64,
                },
            });
            self.info.extend_from_slice(&0u32.to_le_bytes());
        }

        let mut unit = UnitBuilder {
            b: self,
            start: start as u64,
            version,
            address_size,
            pending: None,
        };
        f(&mut unit);
        unit.flush();

        let len = (self.info.len() - start - 4) as u32;
        self.info[start..start + 4].copy_from_slice(&len.to_le_bytes());
    }

    pub(crate) fn build(mut self) -> Built {
        for fixup in &self.fixups {
            let target = self.labels[fixup.label];
            let value = match fixup.kind {
                FixupKind::UnitRelative { unit_start } => target - unit_start,
                FixupKind::SectionRelative => target,
            };
            self.info[fixup.pos..fixup.pos + fixup.size]
                .copy_from_slice(&value.to_le_bytes()[..fixup.size]);
        }
        self.abbrev.push(0);
        Built {
            sections: DwarfSections {
                debug_info: DataBuffer::from(self.info),
                debug_abbrev: DataBuffer::from(self.abbrev),
                debug_str: DataBuffer::from(self.strings),
                ..Default::default()
            },
            labels: self.labels,
        }
    }
}

impl UnitBuilder<'_> {
    /// Start a new die; the previous one is written out.
    pub(crate) fn die(&mut self, tag: DwTag, children: bool) -> &mut Self {
        self.flush();
        self.pending = Some(PendingDie {
            tag: tag.0,
            children,
            ..Default::default()
        });
        self
    }

    /// Close the children of the innermost open die.
    pub(crate) fn end(&mut self) -> &mut Self {
        self.flush();
        self.b.info.push(0);
        self
    }

    pub(crate) fn label(&mut self, label: &'static str) -> &mut Self {
        self.cur().label = Some(label);
        self
    }

    fn cur(&mut self) -> &mut PendingDie {
        self.pending.get_or_insert_with(PendingDie::default)
    }

    fn spec(&mut self, at: DwAt, form: DwForm, bytes: &[u8]) -> &mut Self {
        let d = self.cur();
        d.specs.push((at, form, None));
        d.body.extend_from_slice(bytes);
        self
    }

    pub(crate) fn data1(&mut self, at: DwAt, v: u8) -> &mut Self {
        self.spec(at, DW_FORM_data1, &[v])
    }

    pub(crate) fn data2(&mut self, at: DwAt, v: u16) -> &mut Self {
        self.spec(at, DW_FORM_data2, &v.to_le_bytes())
    }

    pub(crate) fn udata(&mut self, at: DwAt, v: u64) -> &mut Self {
        self.spec(at, DW_FORM_udata, &uleb_bytes(v))
    }

    pub(crate) fn sdata(&mut self, at: DwAt, v: i64) -> &mut Self {
        self.spec(at, DW_FORM_sdata, &sleb_bytes(v))
    }

    pub(crate) fn implicit_const(&mut self, at: DwAt, v: i64) -> &mut Self {
        self.cur().specs.push((at, DW_FORM_implicit_const, Some(v)));
        self
    }

    pub(crate) fn flag_present(&mut self, at: DwAt) -> &mut Self {
        self.spec(at, DW_FORM_flag_present, &[])
    }

    pub(crate) fn string(&mut self, at: DwAt, s: &str) -> &mut Self {
        let mut bytes = s.as_bytes().to_vec();
        bytes.push(0);
        self.spec(at, DW_FORM_string, &bytes)
    }

    /// String stored in `.debug_str`.
    pub(crate) fn strp(&mut self, at: DwAt, s: &str) -> &mut Self {
        let off = self.b.strings.len() as u32;
        self.b.strings.extend_from_slice(s.as_bytes());
        self.b.strings.push(0);
        self.spec(at, DW_FORM_strp, &off.to_le_bytes())
    }

    pub(crate) fn addr(&mut self, at: DwAt, v: u64) -> &mut Self {
        let n = self.address_size as usize;
        self.spec(at, DW_FORM_addr, &v.to_le_bytes()[..n])
    }

    pub(crate) fn exprloc(&mut self, at: DwAt, expr: &[u8]) -> &mut Self {
        let mut bytes = uleb_bytes(expr.len() as u64);
        bytes.extend_from_slice(expr);
        self.spec(at, DW_FORM_exprloc, &bytes)
    }

    pub(crate) fn block1(&mut self, at: DwAt, data: &[u8]) -> &mut Self {
        let mut bytes = vec![data.len() as u8];
        bytes.extend_from_slice(data);
        self.spec(at, DW_FORM_block1, &bytes)
    }

    pub(crate) fn ref_sig8(&mut self, at: DwAt, signature: u64) -> &mut Self {
        self.spec(at, DW_FORM_ref_sig8, &signature.to_le_bytes())
    }

    /// Unit-relative reference to a labelled die of the same unit.
    pub(crate) fn ref4(&mut self, at: DwAt, label: &'static str) -> &mut Self {
        let d = self.cur();
        d.specs.push((at, DW_FORM_ref4, None));
        d.fixups.push((d.body.len(), 4, label, false));
        d.body.extend_from_slice(&[0; 4]);
        self
    }

    /// Unit-relative reference to a raw offset, which need not hold a die.
    pub(crate) fn ref4_offset(&mut self, at: DwAt, offset: u32) -> &mut Self {
        self.spec(at, DW_FORM_ref4, &offset.to_le_bytes())
    }

    /// `.debug_info` reference to a labelled die of any unit.
    pub(crate) fn ref_addr(&mut self, at: DwAt, label: &'static str) -> &mut Self {
        let size = if self.version <= 2 {
            self.address_size as usize
        } else {
            4
        };
        let d = self.cur();
        d.specs.push((at, DW_FORM_ref_addr, None));
        d.fixups.push((d.body.len(), size, label, true));
        d.body.extend_from_slice(&vec![0; size]);
        self
    }

    fn flush(&mut self) {
        let Some(die) = self.pending.take() else {
            return;
        };
        let code = self.b.next_code;
        self.b.next_code += 1;

        let abbrev = &mut self.b.abbrev;
        uleb(abbrev, code);
        uleb(abbrev, u64::from(die.tag));
        abbrev.push(u8::from(die.children));
        for (at, form, implicit) in &die.specs {
            uleb(abbrev, u64::from(at.0));
            uleb(abbrev, u64::from(form.0));
            if let Some(v) = implicit {
                sleb(abbrev, *v);
            }
        }
        abbrev.extend_from_slice(&[0, 0]);

        let die_offset = self.b.info.len();
        if let Some(label) = die.label {
            self.b.labels.insert(label, die_offset as u64);
        }
        uleb(&mut self.b.info, code);
        let body_start = self.b.info.len();
        self.b.info.extend_from_slice(&die.body);
        for (pos, size, label, section) in die.fixups {
            let kind = if section {
                FixupKind::SectionRelative
            } else {
                FixupKind::UnitRelative {
                    unit_start: self.start,
                }
            };
            self.b.fixups.push(Fixup {
                pos: body_start + pos,
                size,
                label,
                kind,
            });
        }
    }
}
