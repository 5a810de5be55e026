//! Object container formats.

pub mod elf;
