// Record-oriented, block-compressed container.
//
// Layout:
//
//   header   magic "FBRC" | version u8 | codec id u8 | flags u8 | varint block size hint
//   block*   varint record count (> 0) | varint raw len | varint stored len
//            | [adler32 of raw payload, u32 BE, when CHECKSUM] | stored bytes
//   trailer  varint 0
//
// A block's raw payload is its records back to back, each
// `varint key len | key | varint value len | value`.
//
// - `varint`: base-128 lengths and counts
// - `header`: container header and flags
// - `writer`: RecordWriter, buffers records into blocks, compresses, emits
// - `reader`: RecordReader, iterates records, verifying each block

pub mod header;
pub mod reader;
pub mod varint;
pub mod writer;

pub use header::{ContainerFlags, ContainerHeader, FORMAT_VERSION, MAGIC};
pub use reader::RecordReader;
pub use writer::{RecordWriter, WriterOptions};

/// Default raw block size before a block is compressed and flushed.
pub const DEFAULT_BLOCK_SIZE: usize = 1_000_000;

/// Largest raw or stored block a reader will accept.
pub const MAX_BLOCK_SIZE: usize = 64 << 20; // 64 MiB

/// One key/value record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl Record {
    /// The value as UTF-8 text, if it is valid.
    pub fn value_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.value).ok()
    }
}

/// Counters reported by `RecordWriter::finish`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContainerStats {
    /// Records appended.
    pub records: u64,
    /// Blocks emitted (the trailer is not counted).
    pub blocks: u64,
    /// Serialized record bytes before compression.
    pub raw_bytes: u64,
    /// Total bytes written to the sink, header and trailer included.
    pub bytes_written: u64,
}

/// Errors raised while writing or reading a container.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("bad magic: {0:02X?}")]
    BadMagic([u8; 4]),
    #[error("unsupported container version {0}")]
    UnsupportedVersion(u8),
    #[error("unknown codec id {0}")]
    UnknownCodec(u8),
    #[error("block checksum mismatch: expected {expected:#010X}, got {actual:#010X}")]
    ChecksumMismatch { expected: u32, actual: u32 },
    #[error("container truncated: {0}")]
    Truncated(String),
    #[error("corrupt container: {0}")]
    Corrupt(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl ContainerError {
    /// Map an I/O error from the parsing path, turning an early EOF into
    /// `Truncated` with some context.
    pub(crate) fn from_read(e: std::io::Error, what: &str) -> Self {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Self::Truncated(format!("end of input while reading {what}"))
        } else {
            Self::Io(e)
        }
    }
}

impl From<ContainerError> for std::io::Error {
    fn from(e: ContainerError) -> Self {
        match e {
            ContainerError::Io(e) => e,
            other => std::io::Error::new(std::io::ErrorKind::InvalidData, other),
        }
    }
}

/// Adler-32 of a raw block payload.
pub(crate) fn block_checksum(data: &[u8]) -> u32 {
    #[cfg(feature = "adler32")]
    {
        let mut hasher = simd_adler32::Adler32::new();
        hasher.write(data);
        hasher.finish()
    }
    #[cfg(not(feature = "adler32"))]
    {
        const MOD_ADLER: u32 = 65521;
        // Largest run before the u32 sums can overflow.
        const NMAX: usize = 5552;
        let (mut a, mut b) = (1u32, 0u32);
        for chunk in data.chunks(NMAX) {
            for &byte in chunk {
                a += u32::from(byte);
                b += a;
            }
            a %= MOD_ADLER;
            b %= MOD_ADLER;
        }
        (b << 16) | a
    }
}
