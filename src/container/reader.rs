// Streaming record reader.
//
// Parses the header once, then decodes one block at a time: read the block
// header, read the stored bytes, decompress, verify, and hand out records
// until the block is exhausted. A zero record count ends the container.

use std::io::Read;

use crate::codec::{self, BlockCodec};

use super::header::ContainerHeader;
use super::{ContainerError, MAX_BLOCK_SIZE, Record, block_checksum, varint};

/// Iterates the records of a container in write order.
///
/// Yields `Err` at most once; iteration stops after the first error.
pub struct RecordReader<R: Read> {
    inner: R,
    header: ContainerHeader,
    codec: Box<dyn BlockCodec>,
    block: Vec<u8>,
    pos: usize,
    remaining: u64,
    blocks_read: u64,
    finished: bool,
    failed: bool,
}

impl<R: Read> RecordReader<R> {
    /// Parse the container header and resolve its codec.
    pub fn new(mut inner: R) -> Result<Self, ContainerError> {
        let header = ContainerHeader::decode(&mut inner)?;
        let codec = codec::codec_for_id(header.codec_id)?;
        Ok(Self {
            inner,
            header,
            codec,
            block: Vec::new(),
            pos: 0,
            remaining: 0,
            blocks_read: 0,
            finished: false,
            failed: false,
        })
    }

    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    /// Name of the codec the container was written with.
    pub fn codec_name(&self) -> &'static str {
        self.codec.name()
    }

    pub fn blocks_read(&self) -> u64 {
        self.blocks_read
    }

    /// Whether the trailer has been reached.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Read the next record, or `None` once the trailer is reached.
    pub fn next_record(&mut self) -> Result<Option<Record>, ContainerError> {
        while self.remaining == 0 {
            if self.finished {
                return Ok(None);
            }
            self.read_block()?;
        }

        let key = self.take_field("key")?;
        let value = self.take_field("value")?;
        self.remaining -= 1;

        if self.remaining == 0 && self.pos != self.block.len() {
            return Err(ContainerError::Corrupt(format!(
                "{} unread bytes at end of block {}",
                self.block.len() - self.pos,
                self.blocks_read
            )));
        }

        Ok(Some(Record { key, value }))
    }

    fn take_field(&mut self, what: &str) -> Result<Vec<u8>, ContainerError> {
        let (len, n) = varint::read_usize(&self.block[self.pos..])
            .map_err(|e| ContainerError::Corrupt(format!("{what} length: {e}")))?;
        let start = self.pos + n;
        let end = start
            .checked_add(len)
            .filter(|&end| end <= self.block.len())
            .ok_or_else(|| {
                ContainerError::Corrupt(format!("{what} of {len} bytes overruns its block"))
            })?;
        self.pos = end;
        Ok(self.block[start..end].to_vec())
    }

    fn read_len(&mut self, what: &str) -> Result<usize, ContainerError> {
        let n = varint::stream_read_u64(&mut self.inner)
            .map_err(|e| ContainerError::from_read(e, what))?;
        usize::try_from(n)
            .ok()
            .filter(|&n| n <= MAX_BLOCK_SIZE)
            .ok_or_else(|| ContainerError::Corrupt(format!("{what} {n} exceeds block limit")))
    }

    fn read_block(&mut self) -> Result<(), ContainerError> {
        let count = varint::stream_read_u64(&mut self.inner)
            .map_err(|e| ContainerError::from_read(e, "block header"))?;
        if count == 0 {
            self.finished = true;
            return Ok(());
        }

        let raw_len = self.read_len("raw block length")?;
        let stored_len = self.read_len("stored block length")?;
        // Every record needs at least two length bytes.
        if count > (raw_len / 2) as u64 {
            return Err(ContainerError::Corrupt(format!(
                "{count} records cannot fit in {raw_len} bytes"
            )));
        }

        let expected = if self.header.has_checksums() {
            let mut sum = [0u8; 4];
            self.inner
                .read_exact(&mut sum)
                .map_err(|e| ContainerError::from_read(e, "block checksum"))?;
            Some(u32::from_be_bytes(sum))
        } else {
            None
        };

        // Grow with the input rather than trusting the declared length.
        let mut stored = Vec::new();
        (&mut self.inner)
            .take(stored_len as u64)
            .read_to_end(&mut stored)
            .map_err(|e| ContainerError::from_read(e, "block data"))?;
        if stored.len() != stored_len {
            return Err(ContainerError::Truncated(format!(
                "block data: {} of {stored_len} bytes",
                stored.len()
            )));
        }

        let raw = self.codec.decompress(&stored, raw_len)?;
        if raw.len() != raw_len {
            return Err(ContainerError::Corrupt(format!(
                "block decompressed to {} bytes, header says {raw_len}",
                raw.len()
            )));
        }
        if let Some(expected) = expected {
            let actual = block_checksum(&raw);
            if actual != expected {
                return Err(ContainerError::ChecksumMismatch { expected, actual });
            }
        }

        self.block = raw;
        self.pos = 0;
        self.remaining = count;
        self.blocks_read += 1;
        Ok(())
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<Record, ContainerError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
