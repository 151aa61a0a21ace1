//! Fuzz the property parser: parse, augment, render, and reparse must never
//! panic, and the rendered augmentation must stay parseable.

#![no_main]

use libfuzzer_sys::fuzz_target;
use stamina_lang::modify::{augment_properties, render_augmented};
use stamina_lang::properties::parse_properties;

fuzz_target!(|data: &str| {
    if let Ok(properties) = parse_properties(data) {
        let rendered = render_augmented(&augment_properties(&properties));
        parse_properties(&rendered).expect("augmented properties reparse");
    }
});
