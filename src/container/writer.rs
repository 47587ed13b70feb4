// Streaming record writer.
//
// RecordWriter buffers serialized records until the raw block reaches the
// configured size, then compresses the whole block with the selected codec
// and writes it out. Only one block is held in memory at a time.

use std::io::Write;
use std::sync::Arc;

use log::trace;

use crate::codec::{BlockCodec, Lz4Codec};

use super::header::{ContainerFlags, ContainerHeader};
use super::{
    ContainerError, ContainerStats, DEFAULT_BLOCK_SIZE, MAX_BLOCK_SIZE, block_checksum, varint,
};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Configuration for a record writer.
#[derive(Clone)]
pub struct WriterOptions {
    /// Block codec.
    pub codec: Arc<dyn BlockCodec>,
    /// Raw bytes buffered before a block is compressed and flushed.
    pub block_size: usize,
    /// Emit an Adler-32 per block.
    pub checksum: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            codec: Arc::new(Lz4Codec),
            block_size: DEFAULT_BLOCK_SIZE,
            checksum: true,
        }
    }
}

impl std::fmt::Debug for WriterOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriterOptions")
            .field("codec", &self.codec.name())
            .field("block_size", &self.block_size)
            .field("checksum", &self.checksum)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// RecordWriter
// ---------------------------------------------------------------------------

/// Block-compressing record writer.
///
/// The container is only complete once `finish()` returns; a writer that is
/// dropped early leaves a container without a trailer, which readers report
/// as truncated.
///
/// # Example
/// ```no_run
/// use filebus::container::{RecordWriter, WriterOptions};
/// let mut out = Vec::new();
/// let mut writer = RecordWriter::new(&mut out, WriterOptions::default()).unwrap();
/// writer.append(b"", b"first line").unwrap();
/// writer.finish().unwrap();
/// ```
pub struct RecordWriter<W: Write> {
    sink: W,
    codec: Arc<dyn BlockCodec>,
    checksum: bool,
    block_size: usize,
    buffer: Vec<u8>,
    pending: u64,
    stats: ContainerStats,
}

impl<W: Write> RecordWriter<W> {
    /// Create a writer and emit the container header.
    pub fn new(mut sink: W, opts: WriterOptions) -> Result<Self, ContainerError> {
        let block_size = opts.block_size.clamp(1, MAX_BLOCK_SIZE);
        let flags = if opts.checksum {
            ContainerFlags::CHECKSUM
        } else {
            ContainerFlags::empty()
        };
        let header = ContainerHeader::new(opts.codec.id(), flags, block_size);
        let header_len = header.encode(&mut sink)?;

        Ok(Self {
            sink,
            codec: opts.codec,
            checksum: opts.checksum,
            block_size,
            buffer: Vec::with_capacity(block_size.min(1 << 20)),
            pending: 0,
            stats: ContainerStats {
                bytes_written: header_len,
                ..Default::default()
            },
        })
    }

    /// Append one record. May compress and write a block.
    pub fn append(&mut self, key: &[u8], value: &[u8]) -> Result<(), ContainerError> {
        let encoded_len = key.len() + value.len() + 2 * varint::MAX_VARINT_LEN;
        if encoded_len > MAX_BLOCK_SIZE {
            return Err(ContainerError::Unsupported(format!(
                "record of {} bytes exceeds the {MAX_BLOCK_SIZE} byte block limit",
                key.len() + value.len()
            )));
        }
        if self.pending > 0 && self.buffer.len() + encoded_len > MAX_BLOCK_SIZE {
            self.flush_block()?;
        }

        varint::push_usize(&mut self.buffer, key.len());
        self.buffer.extend_from_slice(key);
        varint::push_usize(&mut self.buffer, value.len());
        self.buffer.extend_from_slice(value);
        self.pending += 1;
        self.stats.records += 1;

        if self.buffer.len() >= self.block_size {
            self.flush_block()?;
        }
        Ok(())
    }

    /// Records appended so far.
    pub fn records(&self) -> u64 {
        self.stats.records
    }

    /// Flush the final block, write the trailer and return the sink.
    pub fn finish(mut self) -> Result<(W, ContainerStats), ContainerError> {
        self.flush_block()?;
        let mut trailer = Vec::with_capacity(1);
        varint::push_usize(&mut trailer, 0);
        self.sink.write_all(&trailer)?;
        self.sink.flush()?;
        self.stats.bytes_written += trailer.len() as u64;
        Ok((self.sink, self.stats))
    }

    fn flush_block(&mut self) -> Result<(), ContainerError> {
        if self.pending == 0 {
            return Ok(());
        }

        let stored = self.codec.compress(&self.buffer)?;
        if stored.len() > MAX_BLOCK_SIZE {
            return Err(ContainerError::Unsupported(format!(
                "compressed block of {} bytes exceeds the {MAX_BLOCK_SIZE} byte block limit",
                stored.len()
            )));
        }

        let mut head = Vec::with_capacity(3 * varint::MAX_VARINT_LEN + 4);
        varint::push_usize(&mut head, self.pending as usize);
        varint::push_usize(&mut head, self.buffer.len());
        varint::push_usize(&mut head, stored.len());
        if self.checksum {
            head.extend_from_slice(&block_checksum(&self.buffer).to_be_bytes());
        }

        self.sink.write_all(&head)?;
        self.sink.write_all(&stored)?;

        trace!(
            "block {}: {} records, {} raw -> {} stored ({})",
            self.stats.blocks,
            self.pending,
            self.buffer.len(),
            stored.len(),
            self.codec.name()
        );

        self.stats.blocks += 1;
        self.stats.raw_bytes += self.buffer.len() as u64;
        self.stats.bytes_written += (head.len() + stored.len()) as u64;
        self.buffer.clear();
        self.pending = 0;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
