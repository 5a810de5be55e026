#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let config = objscope::ObjectConfig::default();
    if let Ok(obj) = objscope::open_object(data, &config) {
        for info in obj.sections() {
            let _ = obj.section_data_bytes(info.index);
        }
    }
});
