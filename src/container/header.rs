// Container header encoding/decoding.

use std::io::{self, Read, Write};

use bitflags::bitflags;

use super::{ContainerError, MAX_BLOCK_SIZE, varint};

pub const MAGIC: [u8; 4] = *b"FBRC";
pub const FORMAT_VERSION: u8 = 1;

bitflags! {
    /// Header flags byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ContainerFlags: u8 {
        /// Every block carries an Adler-32 of its raw payload.
        const CHECKSUM = 1 << 0;
    }
}

/// Parsed container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    pub version: u8,
    pub codec_id: u8,
    pub flags: ContainerFlags,
    /// Raw block size the writer was configured with. Informational only:
    /// readers size buffers from the per-block lengths.
    pub block_size: usize,
}

impl ContainerHeader {
    pub fn new(codec_id: u8, flags: ContainerFlags, block_size: usize) -> Self {
        Self {
            version: FORMAT_VERSION,
            codec_id,
            flags,
            block_size,
        }
    }

    pub fn has_checksums(&self) -> bool {
        self.flags.contains(ContainerFlags::CHECKSUM)
    }

    /// Write the header, returning the number of bytes emitted.
    pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<u64> {
        let mut buf = Vec::with_capacity(16);
        buf.extend_from_slice(&MAGIC);
        buf.push(self.version);
        buf.push(self.codec_id);
        buf.push(self.flags.bits());
        varint::push_usize(&mut buf, self.block_size);
        w.write_all(&buf)?;
        Ok(buf.len() as u64)
    }

    /// Parse a header from the start of a stream.
    pub fn decode<R: Read>(r: &mut R) -> Result<Self, ContainerError> {
        let mut fixed = [0u8; 7];
        r.read_exact(&mut fixed)
            .map_err(|e| ContainerError::from_read(e, "header"))?;

        let magic = [fixed[0], fixed[1], fixed[2], fixed[3]];
        if magic != MAGIC {
            return Err(ContainerError::BadMagic(magic));
        }
        let version = fixed[4];
        if version != FORMAT_VERSION {
            return Err(ContainerError::UnsupportedVersion(version));
        }
        let codec_id = fixed[5];
        let flags = ContainerFlags::from_bits(fixed[6]).ok_or_else(|| {
            ContainerError::Corrupt(format!("unknown header flags {:#04x}", fixed[6]))
        })?;

        let block_size = varint::stream_read_u64(r)
            .map_err(|e| ContainerError::from_read(e, "header block size"))?;
        let block_size = usize::try_from(block_size)
            .ok()
            .filter(|&n| n <= MAX_BLOCK_SIZE)
            .ok_or_else(|| ContainerError::Corrupt(format!("block size hint {block_size}")))?;

        Ok(Self {
            version,
            codec_id,
            flags,
            block_size,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
