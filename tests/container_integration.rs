// Integration tests for the record container.
//
// Writer -> bytes -> reader across codecs, block sizes and checksum
// settings, plus corruption and truncation detection.

use filebus::codec::{Compression, codec_for_id};
use filebus::container::{
    ContainerError, MAGIC, RecordReader, RecordWriter, WriterOptions,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn generate_lines(count: usize, seed: u64) -> Vec<Vec<u8>> {
    let mut state = seed;
    (0..count)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let len = (state >> 58) as usize;
            (0..len).map(|j| b'a' + ((state >> (j % 32)) as u8 % 26)).collect()
        })
        .collect()
}

fn write_all(lines: &[Vec<u8>], opts: WriterOptions) -> Vec<u8> {
    let mut writer = RecordWriter::new(Vec::new(), opts).unwrap();
    for line in lines {
        writer.append(b"", line).unwrap();
    }
    writer.finish().unwrap().0
}

fn read_all(bytes: &[u8]) -> Result<Vec<Vec<u8>>, ContainerError> {
    RecordReader::new(bytes)?
        .map(|r| r.map(|record| record.value))
        .collect()
}

fn options(compression: Compression, block_size: usize, checksum: bool) -> WriterOptions {
    WriterOptions {
        codec: compression.codec(),
        block_size,
        checksum,
    }
}

// ---------------------------------------------------------------------------
// Round trips
// ---------------------------------------------------------------------------

#[test]
fn all_codecs_and_block_sizes() {
    let lines = generate_lines(3000, 7);
    for name in Compression::available() {
        let compression: Compression = name.parse().unwrap();
        for block_size in [1, 100, 4096, 1 << 20] {
            for checksum in [true, false] {
                let bytes = write_all(&lines, options(compression.clone(), block_size, checksum));
                let decoded = read_all(&bytes).unwrap();
                assert_eq!(decoded, lines, "codec={name} block={block_size} crc={checksum}");
            }
        }
    }
}

#[test]
fn header_records_codec() {
    for name in Compression::available() {
        let compression: Compression = name.parse().unwrap();
        let bytes = write_all(&generate_lines(10, 1), options(compression.clone(), 64, true));
        assert_eq!(&bytes[..4], &MAGIC);
        let reader = RecordReader::new(bytes.as_slice()).unwrap();
        assert_eq!(reader.codec_name(), *name);
        assert_eq!(codec_for_id(reader.header().codec_id).unwrap().name(), *name);
        assert!(reader.header().has_checksums());
    }
}

#[test]
fn compressible_input_shrinks() {
    let lines: Vec<Vec<u8>> = (0..10_000).map(|_| b"GET /index.html 200".to_vec()).collect();
    let raw: usize = lines.iter().map(|l| l.len()).sum();
    let bytes = write_all(&lines, options(Compression::Lz4, 64 * 1024, true));
    assert!(bytes.len() < raw / 10, "container={} raw={raw}", bytes.len());
}

#[test]
fn keys_and_values_survive() {
    let mut writer = RecordWriter::new(Vec::new(), WriterOptions::default()).unwrap();
    writer.append(b"k1", b"v1").unwrap();
    writer.append(b"", b"").unwrap();
    writer.append(b"k3", b"").unwrap();
    let (bytes, stats) = writer.finish().unwrap();
    assert_eq!(stats.records, 3);

    let records: Vec<_> = RecordReader::new(bytes.as_slice())
        .unwrap()
        .map(Result::unwrap)
        .collect();
    assert_eq!(records[0].key, b"k1");
    assert_eq!(records[0].value, b"v1");
    assert!(records[1].key.is_empty() && records[1].value.is_empty());
    assert_eq!(records[2].key, b"k3");
}

// ---------------------------------------------------------------------------
// Damage detection
// ---------------------------------------------------------------------------

#[test]
fn truncation_is_detected_at_every_cut() {
    let bytes = write_all(&generate_lines(200, 3), options(Compression::Lz4, 256, true));
    for cut in 0..bytes.len() {
        let result = read_all(&bytes[..cut]);
        assert!(result.is_err(), "cut at {cut} of {} went unnoticed", bytes.len());
    }
}

#[test]
fn flipped_payload_byte_fails_checksum_or_decode() {
    let lines = generate_lines(500, 11);
    let bytes = write_all(&lines, options(Compression::None, 1 << 20, true));
    let mut damaged = bytes.clone();
    let last = damaged.len() - 3;
    damaged[last] ^= 0x40;
    let err = read_all(&damaged).unwrap_err();
    assert!(
        matches!(
            err,
            ContainerError::ChecksumMismatch { .. } | ContainerError::Corrupt(_)
        ),
        "unexpected error {err:?}"
    );
}

#[test]
fn wrong_magic_rejected() {
    let mut bytes = write_all(&generate_lines(5, 5), WriterOptions::default());
    bytes[0] = b'X';
    assert!(matches!(
        RecordReader::new(bytes.as_slice()),
        Err(ContainerError::BadMagic(_))
    ));
}

#[test]
fn trailing_garbage_after_trailer_is_ignored_by_iteration() {
    let lines = generate_lines(20, 9);
    let mut bytes = write_all(&lines, WriterOptions::default());
    bytes.extend_from_slice(b"garbage");
    let mut reader = RecordReader::new(bytes.as_slice()).unwrap();
    let mut count = 0;
    while let Some(record) = reader.next_record().unwrap() {
        assert_eq!(record.value, lines[count]);
        count += 1;
    }
    assert_eq!(count, lines.len());
    assert!(reader.is_finished());
}
