//! ELF (Executable and Linkable Format) object container
//!
//! Parses the header and section table up front and materializes section
//! contents lazily through the data store in [`data`].

pub mod convert;
pub mod data;
pub mod headers;
pub mod sections;
pub mod types;

#[cfg(test)]
pub(crate) mod testutil;

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::config::ObjectConfig;
use crate::cursor::Endian;
use data::Section;
use headers::parse_header;
use sections::SectionTable;

pub use convert::ElfDataType;
pub use data::{DataBlock, DataBlockHandle, DataBlocks, SectionInfo};
pub use types::*;

/// Mutable shape of an object: its header and section list.
#[derive(Debug, Default)]
pub(crate) struct ObjectState<'data> {
    pub(crate) header: Option<ElfHeader>,
    pub(crate) sections: Vec<Section<'data>>,
}

/// An ELF object, either parsed from an image or built in memory.
///
/// One reader/writer lock guards the structural shape of every section;
/// methods take `&self` and can be called from any number of threads.
#[derive(Debug)]
pub struct ElfObject<'data> {
    image: &'data [u8],
    class: ElfClass,
    endian: Endian,
    config: ObjectConfig,
    state: RwLock<ObjectState<'data>>,
}

impl<'data> ElfObject<'data> {
    /// Parse ELF from raw data
    pub fn parse(image: &'data [u8], config: &ObjectConfig) -> Result<Self> {
        let header = parse_header(image)?;
        let table = SectionTable::parse(image, &header)?;

        debug!(
            class = header.ident.class.bits(),
            endian = ?header.ident.data,
            machine = header.e_machine,
            sections = table.count(),
            "Parsed object header"
        );

        let sections = table
            .headers
            .into_iter()
            .zip(table.names)
            .enumerate()
            .map(|(index, (h, name))| Section::from_file(index, h, name))
            .collect();

        Ok(Self {
            image,
            class: header.ident.class,
            endian: header.ident.data,
            config: config.clone(),
            state: RwLock::new(ObjectState {
                header: Some(header),
                sections,
            }),
        })
    }

    /// An empty object with no header and no sections.
    pub fn new(class: ElfClass, endian: Endian, config: &ObjectConfig) -> Self {
        Self {
            image: &[],
            class,
            endian,
            config: config.clone(),
            state: RwLock::new(ObjectState::default()),
        }
    }

    /// Build the object header if it does not exist yet, and the reserved
    /// null section with it. Returns the (possibly pre-existing) header.
    pub fn new_header(&self, machine: u16, file_type: u16) -> ElfHeader {
        let mut state = self.write_state();
        if let Some(header) = state.header {
            return header;
        }
        let header = ElfHeader::new(
            self.class,
            self.endian,
            machine,
            file_type,
            self.config.format_version,
        );
        state.header = Some(header);
        ensure_null_section(&mut state);
        debug!(machine, file_type, "Built object header");
        header
    }

    /// Create a new, empty section and return its index.
    pub fn new_section(&self, name: &str, sh_type: u32) -> usize {
        let mut state = self.write_state();
        ensure_null_section(&mut state);
        let index = state.sections.len();
        let header = SectionHeader {
            sh_type,
            sh_addralign: 1,
            ..Default::default()
        };
        state
            .sections
            .push(Section::created(index, header, Some(name.to_string())));
        debug!(index, name, sh_type, "Created section");
        index
    }

    pub fn header(&self) -> Option<ElfHeader> {
        self.read_state().header
    }

    pub fn class(&self) -> ElfClass {
        self.class
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn machine(&self) -> Option<ElfMachine> {
        self.header().map(|h| h.machine())
    }

    /// The backing image (empty for objects built in memory).
    pub fn image(&self) -> &'data [u8] {
        self.image
    }

    pub fn config(&self) -> &ObjectConfig {
        &self.config
    }

    pub(crate) fn read_state(&self) -> RwLockReadGuard<'_, ObjectState<'data>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write_state(&self) -> RwLockWriteGuard<'_, ObjectState<'data>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn ensure_null_section(state: &mut ObjectState<'_>) {
    if state.sections.is_empty() {
        state
            .sections
            .push(Section::created(0, SectionHeader::default(), Some(String::new())));
    }
}
