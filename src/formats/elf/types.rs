//! Core ELF types and constants

use bitflags::bitflags;
use thiserror::Error;

use crate::cursor::{CursorError, Endian};

/// Object container errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObjectError {
    #[error("Invalid ELF magic")]
    InvalidMagic,
    #[error("Unsupported ELF class: {0}")]
    UnsupportedClass(u8),
    #[error("Unsupported ELF data encoding: {0}")]
    UnsupportedData(u8),
    #[error("Invalid offset: {offset:#x}")]
    InvalidOffset { offset: usize },
    #[error("Truncated at {offset:#x}, needed {needed} bytes")]
    Truncated { offset: usize, needed: usize },
    #[error("Malformed header: {0}")]
    MalformedHeader(String),
    #[error("Invalid section index: {0}")]
    InvalidSectionIndex(usize),
    #[error("Invalid data in section {section}: {reason}")]
    InvalidData { section: usize, reason: String },
    #[error("Raw data of section {0} requested after it was converted")]
    DataMismatch(usize),
    #[error("Section 0 is reserved and cannot carry data")]
    ReservedSection,
    #[error("Object header has not been built yet")]
    HeaderNotYetBuilt,
    #[error("Out of memory")]
    OutOfMemory,
}

impl ObjectError {
    /// False for API misuse and resource exhaustion, true for corrupt input.
    pub fn is_malformed_input(&self) -> bool {
        !matches!(
            self,
            Self::ReservedSection
                | Self::HeaderNotYetBuilt
                | Self::OutOfMemory
                | Self::InvalidSectionIndex(_)
                | Self::DataMismatch(_)
        )
    }
}

impl From<CursorError> for ObjectError {
    fn from(e: CursorError) -> Self {
        match e {
            CursorError::Truncated { offset, needed } => Self::Truncated { offset, needed },
            other => Self::MalformedHeader(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ObjectError>;

/// ELF magic number
pub const ELF_MAGIC: &[u8; 4] = b"\x7fELF";

/// Current ELF format version
pub const EV_CURRENT: u32 = 1;

/// ELF class (32-bit or 64-bit)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElfClass {
    Elf32 = 1,
    Elf64 = 2,
}

impl ElfClass {
    pub fn from_u8(val: u8) -> Result<Self> {
        match val {
            1 => Ok(ElfClass::Elf32),
            2 => Ok(ElfClass::Elf64),
            _ => Err(ObjectError::UnsupportedClass(val)),
        }
    }

    pub fn bits(&self) -> u8 {
        match self {
            ElfClass::Elf32 => 32,
            ElfClass::Elf64 => 64,
        }
    }

    /// Size in bytes of an address/offset in this class.
    pub fn addr_size(&self) -> u8 {
        self.bits() / 8
    }

    pub(crate) fn header_size(&self) -> usize {
        match self {
            ElfClass::Elf32 => 52,
            ElfClass::Elf64 => 64,
        }
    }

    pub(crate) fn shdr_size(&self) -> usize {
        match self {
            ElfClass::Elf32 => 40,
            ElfClass::Elf64 => 64,
        }
    }

    pub(crate) fn phdr_size(&self) -> usize {
        match self {
            ElfClass::Elf32 => 32,
            ElfClass::Elf64 => 56,
        }
    }
}

pub(crate) fn endian_from_u8(val: u8) -> Result<Endian> {
    match val {
        1 => Ok(Endian::Little),
        2 => Ok(Endian::Big),
        _ => Err(ObjectError::UnsupportedData(val)),
    }
}

pub(crate) fn endian_to_u8(endian: Endian) -> u8 {
    match endian {
        Endian::Little => 1,
        Endian::Big => 2,
    }
}

/// ELF file type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfType {
    None = 0,
    Relocatable = 1,
    Executable = 2,
    SharedObject = 3,
    Core = 4,
}

impl From<u16> for ElfType {
    fn from(val: u16) -> Self {
        match val {
            1 => ElfType::Relocatable,
            2 => ElfType::Executable,
            3 => ElfType::SharedObject,
            4 => ElfType::Core,
            _ => ElfType::None,
        }
    }
}

/// ELF machine architecture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfMachine {
    None,
    X86,
    S390,
    ARM,
    X86_64,
    AArch64,
    Other(u16),
}

pub const EM_386: u16 = 3;
pub const EM_S390: u16 = 22;
pub const EM_X86_64: u16 = 62;

impl From<u16> for ElfMachine {
    fn from(val: u16) -> Self {
        match val {
            0 => ElfMachine::None,
            EM_386 => ElfMachine::X86,
            EM_S390 => ElfMachine::S390,
            40 => ElfMachine::ARM,
            EM_X86_64 => ElfMachine::X86_64,
            183 => ElfMachine::AArch64,
            other => ElfMachine::Other(other),
        }
    }
}

/// ELF identification (first 16 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElfIdent {
    pub class: ElfClass,
    pub data: Endian,
    pub version: u8,
    pub osabi: u8,
    pub abiversion: u8,
}

/// ELF header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElfHeader {
    pub ident: ElfIdent,
    pub e_type: u16,
    pub e_machine: u16,
    pub e_version: u32,
    pub e_entry: u64,
    pub e_phoff: u64,
    pub e_shoff: u64,
    pub e_flags: u32,
    pub e_ehsize: u16,
    pub e_phentsize: u16,
    pub e_phnum: u16,
    pub e_shentsize: u16,
    pub e_shnum: u16,
    pub e_shstrndx: u16,
}

impl ElfHeader {
    /// A fresh header for an object being built in memory.
    pub fn new(class: ElfClass, data: Endian, machine: u16, e_type: u16, version: u32) -> Self {
        Self {
            ident: ElfIdent {
                class,
                data,
                version: version as u8,
                osabi: 0,
                abiversion: 0,
            },
            e_type,
            e_machine: machine,
            e_version: version,
            e_entry: 0,
            e_phoff: 0,
            e_shoff: 0,
            e_flags: 0,
            e_ehsize: class.header_size() as u16,
            e_phentsize: class.phdr_size() as u16,
            e_phnum: 0,
            e_shentsize: class.shdr_size() as u16,
            e_shnum: 0,
            e_shstrndx: SHN_UNDEF,
        }
    }

    pub fn file_type(&self) -> ElfType {
        ElfType::from(self.e_type)
    }

    pub fn machine(&self) -> ElfMachine {
        ElfMachine::from(self.e_machine)
    }
}

/// Section header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SectionHeader {
    pub sh_name: u32,
    pub sh_type: u32,
    pub sh_flags: u64,
    pub sh_addr: u64,
    pub sh_offset: u64,
    pub sh_size: u64,
    pub sh_link: u32,
    pub sh_info: u32,
    pub sh_addralign: u64,
    pub sh_entsize: u64,
}

impl SectionHeader {
    pub fn flags(&self) -> SectionFlags {
        SectionFlags::from_bits_retain(self.sh_flags)
    }
}

/// Section types
pub const SHT_NULL: u32 = 0;
pub const SHT_PROGBITS: u32 = 1;
pub const SHT_SYMTAB: u32 = 2;
pub const SHT_STRTAB: u32 = 3;
pub const SHT_RELA: u32 = 4;
pub const SHT_HASH: u32 = 5;
pub const SHT_DYNAMIC: u32 = 6;
pub const SHT_NOTE: u32 = 7;
pub const SHT_NOBITS: u32 = 8;
pub const SHT_REL: u32 = 9;
pub const SHT_DYNSYM: u32 = 11;
pub const SHT_INIT_ARRAY: u32 = 14;
pub const SHT_FINI_ARRAY: u32 = 15;
pub const SHT_PREINIT_ARRAY: u32 = 16;
pub const SHT_GROUP: u32 = 17;
pub const SHT_SYMTAB_SHNDX: u32 = 18;
pub const SHT_RELR: u32 = 19;
pub const SHT_GNU_HASH: u32 = 0x6ffffff6;
pub const SHT_GNU_VERSYM: u32 = 0x6fffffff;

bitflags! {
    /// Section flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SectionFlags: u64 {
        const WRITE = 0x1;
        const ALLOC = 0x2;
        const EXECINSTR = 0x4;
        const MERGE = 0x10;
        const STRINGS = 0x20;
        const INFO_LINK = 0x40;
        const GROUP = 0x200;
        const TLS = 0x400;
        const COMPRESSED = 0x800;
    }
}

/// Special section indices
pub const SHN_UNDEF: u16 = 0;
pub const SHN_LORESERVE: u16 = 0xff00;
pub const SHN_XINDEX: u16 = 0xffff;
