//! Load fuzz target: feed arbitrary text to the model builder.
//! Loading must not panic; it returns Ok(()) or a ModelError.
//! Build with: cargo fuzz run load_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let s = match std::str::from_utf8(data) {
        Ok(x) => x,
        Err(_) => return,
    };
    let mut model = modgen::Model::with_clock(Box::new(modgen::FixedClock(0)));
    let _ = model.load_str(s);
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run load_fuzz");
}
