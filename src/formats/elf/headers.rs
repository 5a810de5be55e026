//! ELF header parsing

use crate::cursor::EndianRead;
use crate::formats::elf::types::*;

/// Parse ELF identification bytes
pub fn parse_ident(data: &[u8]) -> Result<ElfIdent> {
    if data.len() < 16 {
        return Err(ObjectError::Truncated {
            offset: 0,
            needed: 16,
        });
    }

    if &data[0..4] != ELF_MAGIC {
        return Err(ObjectError::InvalidMagic);
    }

    Ok(ElfIdent {
        class: ElfClass::from_u8(data[4])?,
        data: endian_from_u8(data[5])?,
        version: data[6],
        osabi: data[7],
        abiversion: data[8],
    })
}

/// Parse ELF header
pub fn parse_header(data: &[u8]) -> Result<ElfHeader> {
    let ident = parse_ident(data)?;
    let class = ident.class;

    if data.len() < class.header_size() {
        return Err(ObjectError::Truncated {
            offset: 0,
            needed: class.header_size(),
        });
    }

    let endian = ident.data;
    let e_type = data.read_u16(16, endian)?;
    let e_machine = data.read_u16(18, endian)?;
    let e_version = data.read_u32(20, endian)?;

    // Everything past e_version shifts by the address width.
    let (e_entry, e_phoff, e_shoff, tail) = match class {
        ElfClass::Elf32 => (
            u64::from(data.read_u32(24, endian)?),
            u64::from(data.read_u32(28, endian)?),
            u64::from(data.read_u32(32, endian)?),
            36,
        ),
        ElfClass::Elf64 => (
            data.read_u64(24, endian)?,
            data.read_u64(32, endian)?,
            data.read_u64(40, endian)?,
            48,
        ),
    };

    let header = ElfHeader {
        ident,
        e_type,
        e_machine,
        e_version,
        e_entry,
        e_phoff,
        e_shoff,
        e_flags: data.read_u32(tail, endian)?,
        e_ehsize: data.read_u16(tail + 4, endian)?,
        e_phentsize: data.read_u16(tail + 6, endian)?,
        e_phnum: data.read_u16(tail + 8, endian)?,
        e_shentsize: data.read_u16(tail + 10, endian)?,
        e_shnum: data.read_u16(tail + 12, endian)?,
        e_shstrndx: data.read_u16(tail + 14, endian)?,
    };

    if header.e_ehsize as usize != class.header_size() {
        return Err(ObjectError::MalformedHeader(format!(
            "Invalid e_ehsize: expected {}, got {}",
            class.header_size(),
            header.e_ehsize
        )));
    }

    if header.e_phnum > 0 && header.e_phentsize as usize != class.phdr_size() {
        return Err(ObjectError::MalformedHeader(format!(
            "Invalid e_phentsize: expected {}, got {}",
            class.phdr_size(),
            header.e_phentsize
        )));
    }

    // e_shnum may be 0 with the real count in section 0 (extended numbering),
    // so check the entry size whenever a table is present at all.
    if header.e_shoff != 0 && header.e_shentsize as usize != class.shdr_size() {
        return Err(ObjectError::MalformedHeader(format!(
            "Invalid e_shentsize: expected {}, got {}",
            class.shdr_size(),
            header.e_shentsize
        )));
    }

    Ok(header)
}
