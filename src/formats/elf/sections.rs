//! Section header table parsing

use crate::cursor::{read_cstring, Endian, EndianRead};
use crate::formats::elf::types::*;
use tracing::{trace, warn};

/// A parsed section header table with names resolved.
#[derive(Debug, Clone, Default)]
pub struct SectionTable {
    pub headers: Vec<SectionHeader>,
    pub names: Vec<Option<String>>,
    pub shstrndx: usize,
}

impl SectionTable {
    /// Parse section table from ELF data
    pub fn parse(data: &[u8], header: &ElfHeader) -> Result<Self> {
        let sh_offset = usize::try_from(header.e_shoff)
            .map_err(|_| ObjectError::InvalidOffset { offset: usize::MAX })?;
        let class = header.ident.class;
        let endian = header.ident.data;

        if sh_offset == 0 {
            return Ok(Self::default());
        }

        // Extended numbering: the real count and string table index live in
        // section 0 when they do not fit the 16-bit header fields.
        let first = parse_section_header(data, sh_offset, class, endian)?;
        let sh_num = if header.e_shnum == 0 {
            usize::try_from(first.sh_size).map_err(|_| {
                ObjectError::MalformedHeader(format!("Section count {:#x}", first.sh_size))
            })?
        } else {
            header.e_shnum as usize
        };
        let shstrndx = if header.e_shstrndx == SHN_XINDEX {
            first.sh_link as usize
        } else {
            header.e_shstrndx as usize
        };

        let entsize = class.shdr_size();
        let total = sh_num
            .checked_mul(entsize)
            .and_then(|t| t.checked_add(sh_offset))
            .filter(|&end| end <= data.len())
            .ok_or(ObjectError::Truncated {
                offset: sh_offset,
                needed: sh_num.saturating_mul(entsize),
            })?;
        trace!(count = sh_num, end = total, "Parsing section headers");

        let mut headers = Vec::with_capacity(sh_num);
        for i in 0..sh_num {
            headers.push(parse_section_header(
                data,
                sh_offset + i * entsize,
                class,
                endian,
            )?);
        }

        let strings = headers
            .get(shstrndx)
            .filter(|h| h.sh_type != SHT_NOBITS)
            .and_then(|h| {
                let start = usize::try_from(h.sh_offset).ok()?;
                let end = start.checked_add(usize::try_from(h.sh_size).ok()?)?;
                data.get(start..end)
            });
        if strings.is_none() && shstrndx != 0 {
            warn!(index = shstrndx, "Section name string table is unreadable");
        }

        let names = headers
            .iter()
            .map(|h| {
                strings
                    .and_then(|s| read_cstring(s, h.sh_name as usize).ok())
                    .map(|n| String::from_utf8_lossy(n).into_owned())
            })
            .collect();

        Ok(Self {
            headers,
            names,
            shstrndx,
        })
    }

    /// Count sections
    pub fn count(&self) -> usize {
        self.headers.len()
    }
}

/// Parse a single section header
pub fn parse_section_header(
    data: &[u8],
    offset: usize,
    class: ElfClass,
    endian: Endian,
) -> Result<SectionHeader> {
    match class {
        ElfClass::Elf32 => Ok(SectionHeader {
            sh_name: data.read_u32(offset, endian)?,
            sh_type: data.read_u32(offset + 4, endian)?,
            sh_flags: u64::from(data.read_u32(offset + 8, endian)?),
            sh_addr: u64::from(data.read_u32(offset + 12, endian)?),
            sh_offset: u64::from(data.read_u32(offset + 16, endian)?),
            sh_size: u64::from(data.read_u32(offset + 20, endian)?),
            sh_link: data.read_u32(offset + 24, endian)?,
            sh_info: data.read_u32(offset + 28, endian)?,
            sh_addralign: u64::from(data.read_u32(offset + 32, endian)?),
            sh_entsize: u64::from(data.read_u32(offset + 36, endian)?),
        }),
        ElfClass::Elf64 => Ok(SectionHeader {
            sh_name: data.read_u32(offset, endian)?,
            sh_type: data.read_u32(offset + 4, endian)?,
            sh_flags: data.read_u64(offset + 8, endian)?,
            sh_addr: data.read_u64(offset + 16, endian)?,
            sh_offset: data.read_u64(offset + 24, endian)?,
            sh_size: data.read_u64(offset + 32, endian)?,
            sh_link: data.read_u32(offset + 40, endian)?,
            sh_info: data.read_u32(offset + 44, endian)?,
            sh_addralign: data.read_u64(offset + 48, endian)?,
            sh_entsize: data.read_u64(offset + 56, endian)?,
        }),
    }
}
