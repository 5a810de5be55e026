//! Minimal ELF image writer: header, section data, `.shstrtab` and the
//! section header table, in that order.

use objscope::formats::elf::{ELF_MAGIC, SHT_NOBITS, SHT_NULL, SHT_STRTAB};

struct SectionSpec {
    name: String,
    sh_type: u32,
    flags: u64,
    data: Vec<u8>,
}

pub struct ElfWriter {
    is_64: bool,
    big_endian: bool,
    machine: u16,
    sections: Vec<SectionSpec>,
}

impl ElfWriter {
    pub fn new(is_64: bool, machine: u16) -> Self {
        Self {
            is_64,
            big_endian: false,
            machine,
            sections: Vec::new(),
        }
    }

    pub fn big_endian(mut self) -> Self {
        self.big_endian = true;
        self
    }

    pub fn section(self, name: &str, sh_type: u32, data: Vec<u8>) -> Self {
        self.section_with_flags(name, sh_type, 0, data)
    }

    pub fn section_with_flags(mut self, name: &str, sh_type: u32, flags: u64, data: Vec<u8>) -> Self {
        self.sections.push(SectionSpec {
            name: name.to_string(),
            sh_type,
            flags,
            data,
        });
        self
    }

    fn put(&self, out: &mut Vec<u8>, value: u64, size: usize) {
        let mut field = value.to_le_bytes()[..size].to_vec();
        if self.big_endian {
            field.reverse();
        }
        out.extend_from_slice(&field);
    }

    fn put_word(&self, out: &mut Vec<u8>, value: u64) {
        self.put(out, value, if self.is_64 { 8 } else { 4 });
    }

    pub fn build(self) -> Vec<u8> {
        let (ehsize, phentsize, shentsize) = if self.is_64 { (64, 56, 64) } else { (52, 32, 40) };
        let align = |buf: &mut Vec<u8>| {
            while (ehsize + buf.len()) % 8 != 0 {
                buf.push(0);
            }
        };

        let mut body = Vec::new();
        let mut shstrtab = vec![0u8];
        // (name, type, flags, offset, size)
        let mut headers = vec![(0u32, SHT_NULL, 0u64, 0u64, 0u64)];
        for s in &self.sections {
            align(&mut body);
            let offset = (ehsize + body.len()) as u64;
            headers.push((shstrtab.len() as u32, s.sh_type, s.flags, offset, s.data.len() as u64));
            shstrtab.extend_from_slice(s.name.as_bytes());
            shstrtab.push(0);
            if s.sh_type != SHT_NOBITS {
                body.extend_from_slice(&s.data);
            }
        }
        let name = shstrtab.len() as u32;
        shstrtab.extend_from_slice(b".shstrtab\0");
        headers.push((
            name,
            SHT_STRTAB,
            0,
            (ehsize + body.len()) as u64,
            shstrtab.len() as u64,
        ));
        body.extend_from_slice(&shstrtab);
        align(&mut body);
        let shoff = (ehsize + body.len()) as u64;

        let mut out = Vec::with_capacity(shoff as usize + headers.len() * shentsize);
        out.extend_from_slice(ELF_MAGIC);
        out.push(if self.is_64 { 2 } else { 1 });
        out.push(if self.big_endian { 2 } else { 1 });
        out.push(1);
        out.resize(16, 0);
        self.put(&mut out, 1, 2); // ET_REL
        self.put(&mut out, u64::from(self.machine), 2);
        self.put(&mut out, 1, 4);
        self.put_word(&mut out, 0); // entry
        self.put_word(&mut out, 0); // phoff
        self.put_word(&mut out, shoff);
        self.put(&mut out, 0, 4);
        self.put(&mut out, ehsize as u64, 2);
        self.put(&mut out, phentsize, 2);
        self.put(&mut out, 0, 2);
        self.put(&mut out, shentsize as u64, 2);
        self.put(&mut out, headers.len() as u64, 2);
        self.put(&mut out, (headers.len() - 1) as u64, 2);

        out.extend_from_slice(&body);
        for (name, sh_type, flags, offset, size) in headers {
            self.put(&mut out, u64::from(name), 4);
            self.put(&mut out, u64::from(sh_type), 4);
            self.put_word(&mut out, flags);
            self.put_word(&mut out, 0); // addr
            self.put_word(&mut out, offset);
            self.put_word(&mut out, size);
            self.put(&mut out, 0, 4); // link
            self.put(&mut out, 0, 4); // info
            self.put_word(&mut out, 1); // addralign
            self.put_word(&mut out, 0); // entsize
        }
        out
    }
}
