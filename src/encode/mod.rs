// Encoders: turn a local file into the bytes persisted at a staging path.
//
// - `raw`: byte-identical streaming copy
// - `records`: newline-delimited text into a block-compressed record container
//
// The encoder is a plain strategy value chosen when a destination is built;
// every delivery through that destination uses it unchanged.

pub mod raw;
pub mod records;

use std::io;
use std::path::{Path, PathBuf};

use crate::codec::Compression;
use crate::container::{ContainerError, DEFAULT_BLOCK_SIZE, WriterOptions};
use crate::store::{RemotePath, RemoteStore};

pub use records::{open_records, read_lines};

/// Read/write buffer size for local files.
pub(crate) const BUF_SIZE: usize = 64 * 1024; // 64 KiB

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by a successful encode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeStats {
    /// Bytes read from the local file.
    pub bytes_read: u64,
    /// Bytes written to the staging object.
    pub bytes_written: u64,
    /// Records written (record encoding only).
    pub records: Option<u64>,
    /// Container blocks written (record encoding only).
    pub blocks: Option<u64>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for encoding a local file into a staging object.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// The local file could not be opened or read.
    #[error("cannot read {path}: {source}")]
    Source {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The staging object could not be created or written.
    #[error("cannot write {path}: {source}")]
    Sink {
        path: RemotePath,
        #[source]
        source: io::Error,
    },
    /// The record container rejected a record or failed to write.
    #[error("record container {path}: {source}")]
    Container {
        path: RemotePath,
        #[source]
        source: ContainerError,
    },
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Settings for the record encoder.
#[derive(Debug, Clone)]
pub struct RecordOptions {
    /// Block compression algorithm.
    pub compression: Compression,
    /// Raw bytes per block before compression.
    pub block_size: usize,
    /// Store an Adler-32 per block.
    pub checksum: bool,
}

impl Default for RecordOptions {
    fn default() -> Self {
        Self {
            compression: Compression::default(),
            block_size: DEFAULT_BLOCK_SIZE,
            checksum: true,
        }
    }
}

impl RecordOptions {
    pub(crate) fn writer_options(&self) -> WriterOptions {
        WriterOptions {
            codec: self.compression.codec(),
            block_size: self.block_size,
            checksum: self.checksum,
        }
    }
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

/// How a destination persists local files.
#[derive(Debug, Clone, Default)]
pub enum Encoder {
    /// Verbatim byte copy.
    #[default]
    Raw,
    /// One record per text line, empty keys, block-compressed.
    Records(RecordOptions),
}

impl Encoder {
    /// Record encoding with the given compression and default block settings.
    pub fn records(compression: Compression) -> Self {
        Self::Records(RecordOptions {
            compression,
            ..Default::default()
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Records(_) => "records",
        }
    }

    /// Write `local`'s content to `staging`, replacing whatever is there.
    ///
    /// On error the staging object may hold a partial write; the next
    /// attempt truncates it.
    pub fn encode(
        &self,
        store: &dyn RemoteStore,
        local: &Path,
        staging: &RemotePath,
    ) -> Result<EncodeStats, EncodeError> {
        match self {
            Self::Raw => raw::encode(store, local, staging),
            Self::Records(opts) => records::encode(store, local, staging, opts),
        }
    }
}

impl std::fmt::Display for Encoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Raw => f.write_str("raw"),
            Self::Records(opts) => write!(f, "records/{}", opts.compression),
        }
    }
}
