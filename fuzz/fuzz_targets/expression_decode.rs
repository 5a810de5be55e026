#![no_main]
use libfuzzer_sys::fuzz_target;

use gimli::{Encoding, Format};
use objscope::cursor::Endian;

fuzz_target!(|data: &[u8]| {
    let Some((&selector, expr)) = data.split_first() else {
        return;
    };
    let encoding = Encoding {
        format: if selector & 1 == 0 { Format::Dwarf32 } else { Format::Dwarf64 },
        version: 2 + u16::from((selector >> 1) & 3),
        address_size: if selector & 8 == 0 { 4 } else { 8 },
    };
    let endian = if selector & 16 == 0 { Endian::Little } else { Endian::Big };
    let _ = objscope::decode_expression(expr, encoding, endian);
});
