//! Common test utilities and helpers.
//!
//! Integration tests build their inputs in memory: [`elf_writer`] lays out
//! an ELF image around arbitrary sections and [`dwarf_writer`] assembles the
//! debug sections that go into it.

#![allow(dead_code)]

pub mod dwarf_writer;
pub mod elf_writer;
pub mod test_utils;

use objscope::formats::elf::{EM_386, SHT_PROGBITS};

use dwarf_writer::DebugSections;
use elf_writer::ElfWriter;

/// An i386 relocatable object carrying `debug` as its DWARF sections.
pub fn i386_object_with(debug: &DebugSections) -> Vec<u8> {
    let mut elf = ElfWriter::new(false, EM_386).section(".text", SHT_PROGBITS, vec![0xc3; 16]);
    for (name, data) in debug.named() {
        elf = elf.section(name, SHT_PROGBITS, data.clone());
    }
    elf.build()
}
