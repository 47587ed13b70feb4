#![no_main]
use filebus::container::RecordReader;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must only ever produce errors, never panics or
    // unbounded allocations.
    let Ok(reader) = RecordReader::new(data) else {
        return;
    };
    for record in reader.take(1 << 16) {
        if record.is_err() {
            break;
        }
    }
});
