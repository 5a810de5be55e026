//! In-memory ELF image builder for unit tests.

use crate::cursor::Endian;
use crate::formats::elf::types::*;

pub(crate) struct ImageBuilder {
    class: ElfClass,
    endian: Endian,
    machine: u16,
    sections: Vec<(String, u32, Vec<u8>)>,
}

impl ImageBuilder {
    pub(crate) fn new(class: ElfClass, endian: Endian, machine: u16) -> Self {
        Self {
            class,
            endian,
            machine,
            sections: Vec::new(),
        }
    }

    pub(crate) fn section(mut self, name: &str, sh_type: u32, data: &[u8]) -> Self {
        self.sections.push((name.to_string(), sh_type, data.to_vec()));
        self
    }

    fn put(&self, out: &mut Vec<u8>, value: u64, size: usize) {
        let bytes = value.to_le_bytes();
        let mut field = bytes[..size].to_vec();
        if self.endian == Endian::Big {
            field.reverse();
        }
        out.extend_from_slice(&field);
    }

    fn put_addr(&self, out: &mut Vec<u8>, value: u64) {
        self.put(out, value, self.class.addr_size() as usize);
    }

    pub(crate) fn build(self) -> Vec<u8> {
        let ehsize = self.class.header_size();
        let mut body = Vec::new();
        let mut shstrtab = vec![0u8];
        // (name offset, type, file offset, size)
        let mut entries = vec![(0u32, SHT_NULL, 0u64, 0u64)];

        for (name, sh_type, data) in &self.sections {
            while (ehsize + body.len()) % 8 != 0 {
                body.push(0);
            }
            let off = (ehsize + body.len()) as u64;
            entries.push((shstrtab.len() as u32, *sh_type, off, data.len() as u64));
            shstrtab.extend_from_slice(name.as_bytes());
            shstrtab.push(0);
            if *sh_type != SHT_NOBITS {
                body.extend_from_slice(data);
            }
        }

        let strtab_name = shstrtab.len() as u32;
        shstrtab.extend_from_slice(b".shstrtab\0");
        let strtab_off = (ehsize + body.len()) as u64;
        entries.push((strtab_name, SHT_STRTAB, strtab_off, shstrtab.len() as u64));
        body.extend_from_slice(&shstrtab);
        while (ehsize + body.len()) % 8 != 0 {
            body.push(0);
        }
        let shoff = (ehsize + body.len()) as u64;

        let mut out = Vec::new();
        out.extend_from_slice(ELF_MAGIC);
        out.push(self.class as u8);
        out.push(endian_to_u8(self.endian));
        out.push(1);
        out.resize(16, 0);
        self.put(&mut out, 1, 2); // ET_REL
        self.put(&mut out, u64::from(self.machine), 2);
        self.put(&mut out, 1, 4);
        self.put_addr(&mut out, 0); // entry
        self.put_addr(&mut out, 0); // phoff
        self.put_addr(&mut out, shoff);
        self.put(&mut out, 0, 4); // flags
        self.put(&mut out, ehsize as u64, 2);
        self.put(&mut out, self.class.phdr_size() as u64, 2);
        self.put(&mut out, 0, 2);
        self.put(&mut out, self.class.shdr_size() as u64, 2);
        self.put(&mut out, entries.len() as u64, 2);
        self.put(&mut out, (entries.len() - 1) as u64, 2);
        assert_eq!(out.len(), ehsize);

        out.extend_from_slice(&body);
        for (name, sh_type, off, size) in entries {
            self.put(&mut out, u64::from(name), 4);
            self.put(&mut out, u64::from(sh_type), 4);
            self.put_addr(&mut out, 0); // flags
            self.put_addr(&mut out, 0); // addr
            self.put_addr(&mut out, off);
            self.put_addr(&mut out, size);
            self.put(&mut out, 0, 4); // link
            self.put(&mut out, 0, 4); // info
            self.put_addr(&mut out, 1); // addralign
            self.put_addr(&mut out, 0); // entsize
        }
        out
    }
}
