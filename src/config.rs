//! Configuration for the introspection core.
//!
//! All state that would otherwise be process-wide (the active container format
//! version, decoding limits) is carried here and handed to each object or
//! debug-info view explicitly.

use serde::{Deserialize, Serialize};

use crate::formats::elf::EV_CURRENT;

/// Master configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntrospectConfig {
    /// Object container configuration.
    pub object: ObjectConfig,
    /// Debug information decoding configuration.
    pub dwarf: DwarfConfig,
}

impl IntrospectConfig {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Object container configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectConfig {
    /// Format version stamped into every data block (default: EV_CURRENT = 1).
    pub format_version: u32,
    /// Maximum file size accepted when mapping from disk (default: 1GB).
    pub max_file_size: u64,
}

impl Default for ObjectConfig {
    fn default() -> Self {
        Self {
            format_version: EV_CURRENT,
            max_file_size: 1024 * 1024 * 1024,
        }
    }
}

/// Debug information decoding configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DwarfConfig {
    /// Maximum nesting depth of the die tree within a unit (default: 256).
    pub max_die_depth: usize,
    /// Maximum abstract_origin/specification hops when integrating attributes (default: 16).
    pub max_reference_hops: usize,
    /// Maximum typedef/qualifier dies stripped when peeling a type (default: 64).
    pub max_peel_depth: usize,
}

impl Default for DwarfConfig {
    fn default() -> Self {
        Self {
            max_die_depth: 256,
            max_reference_hops: 16,
            max_peel_depth: 64,
        }
    }
}
