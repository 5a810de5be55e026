//! Error types for the objscope introspection library.
//!
//! Every subsystem has its own `thiserror` enum; this module folds them into a
//! single crate-level error so callers that do not care which layer failed can
//! use one `Result`.

use thiserror::Error;

pub use crate::abi::ClassifyError;
pub use crate::dwarf::DwarfError;
pub use crate::formats::elf::ObjectError;
pub use crate::io::error::IoError;

/// Main error type for objscope operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Object container errors (header, section table, data store)
    #[error(transparent)]
    Object(#[from] ObjectError),

    /// Debug information and location expression errors
    #[error(transparent)]
    Dwarf(#[from] DwarfError),

    /// Return value classification errors
    #[error(transparent)]
    Classify(#[from] ClassifyError),

    /// Mapping a file into memory failed
    #[error(transparent)]
    Io(#[from] IoError),
}

impl Error {
    /// True when the error means the input bytes are corrupt rather than the
    /// caller having sequenced the API wrongly.
    pub fn is_malformed_input(&self) -> bool {
        match self {
            Error::Object(e) => e.is_malformed_input(),
            Error::Dwarf(e) => e.is_malformed_input(),
            Error::Classify(e) => matches!(e, ClassifyError::Malformed(_)),
            Error::Io(_) => false,
        }
    }
}

/// Result type alias for objscope operations
pub type Result<T> = std::result::Result<T, Error>;
