//! Element types and file-to-host byte order conversion of section data.

use crate::buffer::DataBuffer;
use crate::cursor::{align_up, Endian, EndianRead};
use crate::formats::elf::types::*;

/// Semantic element type of a data block, used to convert its contents
/// between file and host byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElfDataType {
    Byte,
    Half,
    Word,
    Sword,
    Xword,
    Sxword,
    Addr,
    Off,
    Sym,
    Rel,
    Rela,
    Dyn,
    Note,
}

impl ElfDataType {
    /// Element type implied by a section type.
    pub fn for_section(sh_type: u32) -> Self {
        match sh_type {
            SHT_SYMTAB | SHT_DYNSYM => Self::Sym,
            SHT_RELA => Self::Rela,
            SHT_REL => Self::Rel,
            SHT_DYNAMIC => Self::Dyn,
            SHT_NOTE => Self::Note,
            SHT_HASH | SHT_GROUP | SHT_SYMTAB_SHNDX => Self::Word,
            SHT_GNU_VERSYM => Self::Half,
            SHT_INIT_ARRAY | SHT_FINI_ARRAY | SHT_PREINIT_ARRAY | SHT_RELR => Self::Addr,
            // GNU hash tables mix word sizes; hand them out untouched.
            _ => Self::Byte,
        }
    }

    /// Field widths of one element, in order.
    fn layout(&self, class: ElfClass) -> &'static [usize] {
        use ElfClass::*;
        match (self, class) {
            (Self::Byte, _) => &[1],
            (Self::Half, _) => &[2],
            (Self::Word | Self::Sword | Self::Note, _) => &[4],
            (Self::Xword | Self::Sxword, _) => &[8],
            (Self::Addr | Self::Off, Elf32) => &[4],
            (Self::Addr | Self::Off, Elf64) => &[8],
            (Self::Sym, Elf32) => &[4, 4, 4, 1, 1, 2],
            (Self::Sym, Elf64) => &[4, 1, 1, 2, 8, 8],
            (Self::Rel | Self::Dyn, Elf32) => &[4, 4],
            (Self::Rel | Self::Dyn, Elf64) => &[8, 8],
            (Self::Rela, Elf32) => &[4, 4, 4],
            (Self::Rela, Elf64) => &[8, 8, 8],
        }
    }

    /// Size in bytes of one element; notes report their word size.
    pub fn element_size(&self, class: ElfClass) -> usize {
        self.layout(class).iter().sum()
    }
}

/// Bring raw section bytes into host byte order.
///
/// Data that needs no swapping stays borrowed from the image; anything that is
/// swapped is copied into an owned buffer.
pub fn to_native<'d>(
    raw: &'d [u8],
    kind: ElfDataType,
    class: ElfClass,
    endian: Endian,
    section: usize,
) -> Result<DataBuffer<'d>> {
    let invalid = |reason: String| ObjectError::InvalidData { section, reason };

    if kind == ElfDataType::Note {
        if endian == Endian::native() {
            return Ok(DataBuffer::Borrowed(raw));
        }
        let mut out = raw.to_vec();
        swap_notes(&mut out, endian).map_err(invalid)?;
        return Ok(out.into());
    }

    let size = kind.element_size(class);
    if raw.len() % size != 0 {
        return Err(invalid(format!(
            "size {} is not a multiple of the {:?} element size {}",
            raw.len(),
            kind,
            size
        )));
    }
    if size == 1 || endian == Endian::native() {
        return Ok(DataBuffer::Borrowed(raw));
    }

    let layout = kind.layout(class);
    let mut out = raw.to_vec();
    for element in out.chunks_exact_mut(size) {
        let mut pos = 0;
        for &width in layout {
            element[pos..pos + width].reverse();
            pos += width;
        }
    }
    Ok(out.into())
}

/// Swap the three header words of every note, leaving name and descriptor
/// bytes alone.
fn swap_notes(buf: &mut [u8], endian: Endian) -> std::result::Result<(), String> {
    let mut pos = 0usize;
    while pos < buf.len() {
        if buf.len() - pos < 12 {
            return Err(format!("note header truncated at {:#x}", pos));
        }
        let namesz = buf.read_u32(pos, endian).map_err(|e| e.to_string())?;
        let descsz = buf.read_u32(pos + 4, endian).map_err(|e| e.to_string())?;
        for word in buf[pos..pos + 12].chunks_exact_mut(4) {
            word.reverse();
        }
        let body = align_up(u64::from(namesz), 4) + align_up(u64::from(descsz), 4);
        pos = u64::try_from(pos + 12)
            .ok()
            .and_then(|p| p.checked_add(body))
            .and_then(|p| usize::try_from(p).ok())
            .filter(|&p| p <= buf.len())
            .ok_or_else(|| format!("note body overruns section at {:#x}", pos))?;
    }
    Ok(())
}
