#![no_main]

use libfuzzer_sys::fuzz_target;
use parley_runtime::{compose_mode_prompt, Mode};

fuzz_target!(|data: &[u8]| {
    let template = String::from_utf8_lossy(data);
    for mode in Mode::UI_ORDER {
        if let Ok(prompt) = compose_mode_prompt(mode, &template) {
            for key in parley_runtime::prompt_modes::REQUIRED_PROMPT_KEYS {
                assert!(!prompt.contains(&format!("{{{{{key}}}}}")));
            }
        }
    }
});
