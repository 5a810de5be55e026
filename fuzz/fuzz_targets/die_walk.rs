#![no_main]
use libfuzzer_sys::fuzz_target;

use objscope::{classify_return_value, DebugInfo, DwarfConfig, ObjectConfig, TargetAbi};

fuzz_target!(|data: &[u8]| {
    let Ok(obj) = objscope::open_object(data, &ObjectConfig::default()) else {
        return;
    };
    let Ok(dwarf) = DebugInfo::load(&obj, &DwarfConfig::default()) else {
        return;
    };
    let abi = TargetAbi::for_object(&obj).unwrap_or(TargetAbi::S390x);
    for unit in dwarf.units() {
        let Ok(dies) = dwarf.dies_in_unit(unit) else {
            continue;
        };
        for die in dies {
            let _ = die.attributes();
            let _ = die.peeled_type();
            let _ = classify_return_value(&die, abi);
        }
    }
});
