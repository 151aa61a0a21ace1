//! Fuzz the model parser: parsing and analysis must never panic, and
//! anything that parses must pretty-print expressions without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    if let Ok(program) = stamina_lang::parse_program(data) {
        let _ = stamina_lang::analyze(&program);
    }
});
