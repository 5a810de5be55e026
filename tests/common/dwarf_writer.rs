//! DWARF 2-5 assembler for integration tests.
//!
//! Each die gets its own abbreviation; every unit shares the table at
//! offset 0. Labelled dies can be referenced before they are written.

use std::collections::HashMap;

use gimli::constants::*;

/// One attribute as written into a die.
pub enum Attr {
    Data1(DwAt, u8),
    Data2(DwAt, u16),
    Udata(DwAt, u64),
    Flag(DwAt),
    /// Inline string.
    Str(DwAt, &'static str),
    /// String in `.debug_str`.
    Strp(DwAt, &'static str),
    Addr(DwAt, u64),
    /// Unit-relative reference to a labelled die.
    Ref(DwAt, &'static str),
    /// `.debug_info` offset of a labelled die.
    RefAddr(DwAt, &'static str),
    Expr(DwAt, Vec<u8>),
}

pub struct DebugSections {
    pub info: Vec<u8>,
    pub abbrev: Vec<u8>,
    pub str: Vec<u8>,
    pub labels: HashMap<&'static str, u64>,
}

impl DebugSections {
    pub fn named(&self) -> [(&'static str, &Vec<u8>); 3] {
        [
            (".debug_info", &self.info),
            (".debug_abbrev", &self.abbrev),
            (".debug_str", &self.str),
        ]
    }

    pub fn offset(&self, label: &str) -> u64 {
        self.labels[label]
    }
}

enum Fixup {
    UnitRelative { unit_start: usize },
    Section,
}

pub struct DwarfWriter {
    info: Vec<u8>,
    abbrev: Vec<u8>,
    str: Vec<u8>,
    labels: HashMap<&'static str, u64>,
    fixups: Vec<(usize, usize, &'static str, Fixup)>,
    next_code: u64,
}

pub struct UnitWriter<'w> {
    w: &'w mut DwarfWriter,
    start: usize,
    version: u16,
    address_size: u8,
}

pub fn uleb(out: &mut Vec<u8>, mut v: u64) {
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

pub fn sleb(out: &mut Vec<u8>, mut v: i64) {
    loop {
        let byte = (v & 0x7f) as u8;
        v >>= 7;
        if (v == 0 && byte & 0x40 == 0) || (v == -1 && byte & 0x40 != 0) {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

impl Default for DwarfWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl DwarfWriter {
    pub fn new() -> Self {
        Self {
            info: Vec::new(),
            abbrev: Vec::new(),
            str: vec![0],
            labels: HashMap::new(),
            fixups: Vec::new(),
            next_code: 1,
        }
    }

    /// A compile unit. `version` 5 uses the DWARF 5 header layout.
    pub fn unit(&mut self, version: u16, address_size: u8, f: impl FnOnce(&mut UnitWriter<'_>)) {
        let start = self.info.len();
        self.info.extend_from_slice(&[0; 4]);
        self.info.extend_from_slice(&version.to_le_bytes());
        if version >= 5 {
            self.info.push(DW_UT_compile.0);
            self.info.push(address_size);
            self.info.extend_from_slice(&0u32.to_le_bytes());
        } else {
            self.info.extend_from_slice(&0u32.to_le_bytes());
            self.info.push(address_size);
        }
        f(&mut UnitWriter {
            w: self,
            start,
            version,
            address_size,
        });
        let len = (self.info.len() - start - 4) as u32;
        self.info[start..start + 4].copy_from_slice(&len.to_le_bytes());
    }

    pub fn finish(mut self) -> DebugSections {
        for (pos, size, label, kind) in &self.fixups {
            let target = self.labels[label];
            let value = match kind {
                Fixup::UnitRelative { unit_start } => target - *unit_start as u64,
                Fixup::Section => target,
            };
            self.info[*pos..*pos + *size].copy_from_slice(&value.to_le_bytes()[..*size]);
        }
        self.abbrev.push(0);
        DebugSections {
            info: self.info,
            abbrev: self.abbrev,
            str: self.str,
            labels: self.labels,
        }
    }
}

impl UnitWriter<'_> {
    /// Write a die. When `children` is set, the following dies are its
    /// children until [`UnitWriter::end`].
    pub fn die(&mut self, label: Option<&'static str>, tag: DwTag, children: bool, attrs: &[Attr]) {
        let code = self.w.next_code;
        self.w.next_code += 1;
        uleb(&mut self.w.abbrev, code);
        uleb(&mut self.w.abbrev, u64::from(tag.0));
        self.w.abbrev.push(u8::from(children));

        if let Some(label) = label {
            self.w.labels.insert(label, self.w.info.len() as u64);
        }
        uleb(&mut self.w.info, code);
        for attr in attrs {
            self.attr(attr);
        }
        self.w.abbrev.extend_from_slice(&[0, 0]);
    }

    pub fn end(&mut self) {
        self.w.info.push(0);
    }

    fn spec(&mut self, at: DwAt, form: DwForm) {
        uleb(&mut self.w.abbrev, u64::from(at.0));
        uleb(&mut self.w.abbrev, u64::from(form.0));
    }

    fn attr(&mut self, attr: &Attr) {
        match attr {
            Attr::Data1(at, v) => {
                self.spec(*at, DW_FORM_data1);
                self.w.info.push(*v);
            }
            Attr::Data2(at, v) => {
                self.spec(*at, DW_FORM_data2);
                self.w.info.extend_from_slice(&v.to_le_bytes());
            }
            Attr::Udata(at, v) => {
                self.spec(*at, DW_FORM_udata);
                uleb(&mut self.w.info, *v);
            }
            Attr::Flag(at) => self.spec(*at, DW_FORM_flag_present),
            Attr::Str(at, s) => {
                self.spec(*at, DW_FORM_string);
                self.w.info.extend_from_slice(s.as_bytes());
                self.w.info.push(0);
            }
            Attr::Strp(at, s) => {
                self.spec(*at, DW_FORM_strp);
                let off = self.w.str.len() as u32;
                self.w.str.extend_from_slice(s.as_bytes());
                self.w.str.push(0);
                self.w.info.extend_from_slice(&off.to_le_bytes());
            }
            Attr::Addr(at, v) => {
                self.spec(*at, DW_FORM_addr);
                let n = self.address_size as usize;
                self.w.info.extend_from_slice(&v.to_le_bytes()[..n]);
            }
            Attr::Ref(at, label) => {
                self.spec(*at, DW_FORM_ref4);
                let unit_start = self.start;
                self.fixup(4, label, Fixup::UnitRelative { unit_start });
            }
            Attr::RefAddr(at, label) => {
                self.spec(*at, DW_FORM_ref_addr);
                let size = if self.version <= 2 {
                    self.address_size as usize
                } else {
                    4
                };
                self.fixup(size, label, Fixup::Section);
            }
            Attr::Expr(at, expr) => {
                if self.version >= 4 {
                    self.spec(*at, DW_FORM_exprloc);
                    uleb(&mut self.w.info, expr.len() as u64);
                } else {
                    self.spec(*at, DW_FORM_block1);
                    self.w.info.push(expr.len() as u8);
                }
                self.w.info.extend_from_slice(expr);
            }
        }
    }

    fn fixup(&mut self, size: usize, label: &'static str, kind: Fixup) {
        let pos = self.w.info.len();
        self.w.fixups.push((pos, size, label, kind));
        self.w.info.extend(std::iter::repeat(0).take(size));
    }
}
