// SPDX-License-Identifier: AGPL-3.0-or-later
#![no_main]

use kramdoc_core::{Document, Options};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(mut doc) = Document::new(source, Options::new()) {
        let formats: Vec<&'static str> = doc.formats().collect();
        for format in formats {
            let _ = doc.convert(format);
        }
    }
});
