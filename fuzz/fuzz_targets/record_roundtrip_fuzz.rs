#![no_main]
use filebus::codec::Compression;
use filebus::container::{RecordReader, RecordWriter, WriterOptions};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    // First byte picks a small block size so records span many blocks.
    let block_size = 1 + data[0] as usize;
    let lines: Vec<&[u8]> = data[1..].split(|&b| b == b'\n').collect();

    let opts = WriterOptions {
        codec: Compression::Lz4.codec(),
        block_size,
        checksum: data[0] & 1 == 0,
    };
    let mut writer = RecordWriter::new(Vec::new(), opts).unwrap();
    for line in &lines {
        writer.append(b"", line).unwrap();
    }
    let (bytes, stats) = writer.finish().unwrap();
    assert_eq!(stats.records, lines.len() as u64);

    let decoded: Vec<Vec<u8>> = RecordReader::new(bytes.as_slice())
        .unwrap()
        .map(|r| r.unwrap().value)
        .collect();
    assert_eq!(decoded.len(), lines.len());
    for (got, want) in decoded.iter().zip(&lines) {
        assert_eq!(got.as_slice(), *want);
    }
});
