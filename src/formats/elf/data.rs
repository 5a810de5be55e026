//! Section data store.
//!
//! Each section moves through three states: unread, raw materialized (the file
//! bytes have been sliced out of the image) and block-list materialized (the raw
//! bytes have been converted into the first data block). After the last
//! transition the raw bytes are never consulted again. Structural changes to any
//! section happen under the object's write lock; readers take snapshots under
//! the read lock, so they observe a block list either before or after an append.

use tracing::{debug, trace};

use crate::buffer::DataBuffer;
use crate::formats::elf::convert::{to_native, ElfDataType};
use crate::formats::elf::types::*;
use crate::formats::elf::ElfObject;

/// Raw-data state of a section.
#[derive(Debug, Clone)]
pub(crate) enum RawData<'data> {
    /// Backed by the image, not read yet.
    Unread,
    /// Sliced out of the image.
    Read(DataBuffer<'data>),
    /// Created by the caller; never had file bytes.
    Created,
}

#[derive(Debug, Clone)]
pub(crate) struct Section<'data> {
    pub(crate) index: usize,
    pub(crate) header: SectionHeader,
    pub(crate) name: Option<String>,
    pub(crate) raw: RawData<'data>,
    pub(crate) blocks: Option<Vec<DataBlock<'data>>>,
}

impl<'data> Section<'data> {
    pub(crate) fn from_file(index: usize, header: SectionHeader, name: Option<String>) -> Self {
        Self {
            index,
            header,
            name,
            raw: RawData::Unread,
            blocks: None,
        }
    }

    pub(crate) fn created(index: usize, header: SectionHeader, name: Option<String>) -> Self {
        Self {
            index,
            header,
            name,
            raw: RawData::Created,
            blocks: None,
        }
    }

    fn info(&self) -> SectionInfo {
        SectionInfo {
            index: self.index,
            name: self.name.clone(),
            header: self.header,
            raw_read: !matches!(self.raw, RawData::Unread),
            block_count: self.blocks.as_ref().map(Vec::len),
        }
    }
}

/// Snapshot of a section's identity and materialization state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionInfo {
    pub index: usize,
    pub name: Option<String>,
    pub header: SectionHeader,
    /// The raw bytes have been read (always true for caller-created sections).
    pub raw_read: bool,
    /// Number of data blocks, or `None` if no block list exists yet.
    pub block_count: Option<usize>,
}

impl SectionInfo {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    pub fn element_type(&self) -> ElfDataType {
        ElfDataType::for_section(self.header.sh_type)
    }
}

/// One contiguous chunk of a section's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBlock<'data> {
    buffer: DataBuffer<'data>,
    kind: ElfDataType,
    version: u32,
    offset: u64,
    size: u64,
    align: u64,
    dirty: bool,
}

impl<'data> DataBlock<'data> {
    fn empty(version: u32) -> Self {
        Self {
            buffer: DataBuffer::default(),
            kind: ElfDataType::Byte,
            version,
            offset: 0,
            size: 0,
            align: 1,
            dirty: true,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn buffer(&self) -> &DataBuffer<'data> {
        &self.buffer
    }

    pub fn kind(&self) -> ElfDataType {
        self.kind
    }

    /// Format version the block was created under.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Offset of the block within its section.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Logical size; differs from `bytes().len()` only for NOBITS sections.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn align(&self) -> u64 {
        self.align
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

/// Snapshot iterator over a section's data blocks, in append order.
#[derive(Debug)]
pub struct DataBlocks<'data> {
    inner: std::vec::IntoIter<DataBlock<'data>>,
}

impl<'data> Iterator for DataBlocks<'data> {
    type Item = DataBlock<'data>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for DataBlocks<'_> {}

/// Writable handle to a block appended by [`ElfObject::new_data`].
#[derive(Debug, Clone, Copy)]
pub struct DataBlockHandle<'o, 'data> {
    object: &'o ElfObject<'data>,
    section: usize,
    block: usize,
}

impl<'o, 'data> DataBlockHandle<'o, 'data> {
    pub fn section(&self) -> usize {
        self.section
    }

    /// Position of the block in the section's list.
    pub fn index(&self) -> usize {
        self.block
    }

    /// Replace the block's contents; the logical size follows the buffer.
    pub fn set_bytes(&self, bytes: impl Into<DataBuffer<'data>>) -> Result<()> {
        let buffer = bytes.into();
        self.update(|b| {
            b.size = buffer.len() as u64;
            b.buffer = buffer;
        })
    }

    pub fn set_kind(&self, kind: ElfDataType) -> Result<()> {
        self.update(|b| b.kind = kind)
    }

    pub fn set_offset(&self, offset: u64) -> Result<()> {
        self.update(|b| b.offset = offset)
    }

    pub fn set_align(&self, align: u64) -> Result<()> {
        self.update(|b| b.align = align)
    }

    /// Current state of the block.
    pub fn get(&self) -> Result<DataBlock<'data>> {
        let state = self.object.read_state();
        state
            .sections
            .get(self.section)
            .and_then(|s| s.blocks.as_ref())
            .and_then(|blocks| blocks.get(self.block))
            .cloned()
            .ok_or(ObjectError::InvalidSectionIndex(self.section))
    }

    fn update(&self, f: impl FnOnce(&mut DataBlock<'data>)) -> Result<()> {
        let mut state = self.object.write_state();
        let block = state
            .sections
            .get_mut(self.section)
            .and_then(|s| s.blocks.as_mut())
            .and_then(|blocks| blocks.get_mut(self.block))
            .ok_or(ObjectError::InvalidSectionIndex(self.section))?;
        f(block);
        block.dirty = true;
        Ok(())
    }
}

impl<'data> ElfObject<'data> {
    /// Append a new, empty data block to a section.
    ///
    /// Section 0 never carries data and the object must have a header. If the
    /// section's file bytes have not been split into a block list yet, that
    /// happens first, inside the same critical section as the append.
    pub fn new_data(&self, index: usize) -> Result<DataBlockHandle<'_, 'data>> {
        if index == 0 {
            return Err(ObjectError::ReservedSection);
        }

        let mut state = self.write_state();
        if state.header.is_none() {
            return Err(ObjectError::HeaderNotYetBuilt);
        }
        let section = state
            .sections
            .get_mut(index)
            .ok_or(ObjectError::InvalidSectionIndex(index))?;

        self.ensure_block_list(section)
            .map_err(|e| crate::log_error!(e, "promoting section data before append"))?;
        let blocks = section.blocks.get_or_insert_with(Vec::new);
        blocks
            .try_reserve(1)
            .map_err(|_| ObjectError::OutOfMemory)?;
        blocks.push(DataBlock::empty(self.config.format_version));
        let block = blocks.len() - 1;

        debug!(section = index, block, "Appended empty data block");
        Ok(DataBlockHandle {
            object: self,
            section: index,
            block,
        })
    }

    /// Iterate a section's data blocks, converting its file bytes into the
    /// first block on first access.
    pub fn data_blocks(&self, index: usize) -> Result<DataBlocks<'data>> {
        {
            let state = self.read_state();
            let section = state
                .sections
                .get(index)
                .ok_or(ObjectError::InvalidSectionIndex(index))?;
            match (&section.blocks, &section.raw) {
                (Some(blocks), _) => return Ok(snapshot(blocks)),
                (None, RawData::Created) => return Ok(snapshot(&[])),
                _ => {}
            }
        }

        // Another reader may have promoted between the two locks;
        // ensure_block_list re-checks under the write lock.
        let mut state = self.write_state();
        let section = state
            .sections
            .get_mut(index)
            .ok_or(ObjectError::InvalidSectionIndex(index))?;
        self.ensure_block_list(section)?;
        Ok(snapshot(section.blocks.as_deref().unwrap_or(&[])))
    }

    /// The section's raw file bytes, reading them from the image if needed.
    ///
    /// Fails once the raw bytes have been converted into a block list.
    pub fn raw_data(&self, index: usize) -> Result<DataBuffer<'data>> {
        let mut state = self.write_state();
        let section = state
            .sections
            .get_mut(index)
            .ok_or(ObjectError::InvalidSectionIndex(index))?;
        if section.blocks.is_some() {
            return Err(ObjectError::DataMismatch(index));
        }
        self.read_raw(section)?;
        Ok(match &section.raw {
            RawData::Read(buf) => buf.clone(),
            _ => DataBuffer::default(),
        })
    }

    /// All of a section's blocks as one contiguous buffer. A single block is
    /// returned as-is; several are concatenated into an owned buffer.
    pub fn section_data_bytes(&self, index: usize) -> Result<DataBuffer<'data>> {
        let mut blocks = self.data_blocks(index)?;
        if blocks.len() <= 1 {
            return Ok(blocks
                .next()
                .map(|b| b.buffer)
                .unwrap_or_default());
        }
        let mut out = Vec::new();
        for block in blocks {
            out.try_reserve(block.bytes().len())
                .map_err(|_| ObjectError::OutOfMemory)?;
            out.extend_from_slice(block.bytes());
        }
        Ok(out.into())
    }

    /// Snapshot of every section.
    pub fn sections(&self) -> impl Iterator<Item = SectionInfo> {
        let state = self.read_state();
        state
            .sections
            .iter()
            .map(Section::info)
            .collect::<Vec<_>>()
            .into_iter()
    }

    pub fn section(&self, index: usize) -> Result<SectionInfo> {
        self.read_state()
            .sections
            .get(index)
            .map(Section::info)
            .ok_or(ObjectError::InvalidSectionIndex(index))
    }

    /// First section with the given name.
    pub fn section_by_name(&self, name: &str) -> Option<SectionInfo> {
        self.read_state()
            .sections
            .iter()
            .find(|s| s.name.as_deref() == Some(name))
            .map(Section::info)
    }

    pub fn section_count(&self) -> usize {
        self.read_state().sections.len()
    }

    /// Slice the section's file bytes out of the image (unread → raw).
    fn read_raw(&self, section: &mut Section<'data>) -> Result<()> {
        if !matches!(section.raw, RawData::Unread) {
            return Ok(());
        }
        let h = &section.header;
        let raw: &'data [u8] = if h.sh_type == SHT_NOBITS || h.sh_size == 0 {
            &[]
        } else {
            let start = usize::try_from(h.sh_offset)
                .map_err(|_| ObjectError::InvalidOffset { offset: usize::MAX })?;
            let len = usize::try_from(h.sh_size).map_err(|_| ObjectError::Truncated {
                offset: start,
                needed: usize::MAX,
            })?;
            start
                .checked_add(len)
                .and_then(|end| self.image.get(start..end))
                .ok_or(ObjectError::Truncated { offset: start, needed: len })?
        };
        trace!(section = section.index, len = raw.len(), "Read raw section data");
        section.raw = RawData::Read(DataBuffer::Borrowed(raw));
        Ok(())
    }

    /// Promote raw bytes into a one-block list if no list exists yet.
    fn ensure_block_list(&self, section: &mut Section<'data>) -> Result<()> {
        if section.blocks.is_some() {
            return Ok(());
        }
        self.read_raw(section)?;
        let raw = match &section.raw {
            RawData::Read(buf) => buf.clone(),
            // Caller-created: the first append starts the list.
            RawData::Created | RawData::Unread => return Ok(()),
        };

        let kind = ElfDataType::for_section(section.header.sh_type);
        let buffer = match raw {
            DataBuffer::Borrowed(bytes) => {
                to_native(bytes, kind, self.class, self.endian, section.index)?
            }
            owned => owned,
        };
        let size = if section.header.sh_type == SHT_NOBITS {
            section.header.sh_size
        } else {
            buffer.len() as u64
        };

        let mut blocks = Vec::new();
        blocks
            .try_reserve(1)
            .map_err(|_| ObjectError::OutOfMemory)?;
        blocks.push(DataBlock {
            buffer,
            kind,
            version: self.config.format_version,
            offset: 0,
            size,
            align: section.header.sh_addralign.max(1),
            dirty: false,
        });
        section.blocks = Some(blocks);

        debug!(
            section = section.index,
            name = section.name.as_deref().unwrap_or(""),
            kind = ?kind,
            size,
            "Promoted raw data to block list"
        );
        Ok(())
    }
}

fn snapshot<'data>(blocks: &[DataBlock<'data>]) -> DataBlocks<'data> {
    DataBlocks {
        inner: blocks.to_vec().into_iter(),
    }
}
