//! objscope: object file and debug information introspection.
//!
//! The crate answers "where does this value live at runtime" for a compiled
//! program. [`ElfObject`] models an ELF file's sections and their data-block
//! lists, [`DebugInfo`] lays a lazily decoded DWARF die tree over them,
//! [`location`] resolves the operators of location expressions and [`abi`]
//! places function return values per calling convention.

pub mod abi;
pub mod buffer;
pub mod config;
pub mod cursor;
pub mod dwarf;
pub mod error;
pub mod formats;
pub mod io;
pub mod location;
pub mod logging;

pub use abi::{classify_return_value, ClassifyError, ReturnLocation, TargetAbi};
pub use buffer::DataBuffer;
pub use config::{DwarfConfig, IntrospectConfig, ObjectConfig};
pub use dwarf::{Attribute, AttributeValue, DebugInfo, Die, DwarfError, UnitId};
pub use error::{Error, Result};
pub use formats::elf::{DataBlock, DataBlockHandle, ElfObject, ObjectError, SectionInfo};
pub use location::{decode_expression, resolve_location_op, LocationOp, ResolvedOp, SyntheticAttribute};

/// Parse an ELF image held in memory.
pub fn open_object<'data>(bytes: &'data [u8], config: &ObjectConfig) -> Result<ElfObject<'data>> {
    Ok(ElfObject::parse(bytes, config)?)
}
