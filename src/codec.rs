// Block compression codecs for the record container.
//
// Provides a pluggable `BlockCodec` trait with built-in implementations:
//   - LZ4 block format (via lz4_flex, the default: fast, general purpose)
//   - Zlib/Deflate (via flate2, feature-gated `zlib`)
//   - LZMA (via lzma-rs, feature-gated `lzma`)
//   - NoCodec (stored blocks)
//   - External/custom compressors via the trait
//
// The container header records the codec ID so readers can pick the
// matching decompressor:
//   ID 0 = none, ID 1 = LZ4, ID 2 = Zlib, ID 3 = LZMA

use std::fmt;
use std::io;
use std::str::FromStr;
use std::sync::Arc;

use crate::container::ContainerError;

pub const CODEC_NONE_ID: u8 = 0;
pub const CODEC_LZ4_ID: u8 = 1;
pub const CODEC_ZLIB_ID: u8 = 2;
pub const CODEC_LZMA_ID: u8 = 3;

/// Default zlib level when none is configured.
pub const DEFAULT_ZLIB_LEVEL: u32 = 6;

// ---------------------------------------------------------------------------
// BlockCodec trait
// ---------------------------------------------------------------------------

/// A pluggable block compressor for container blocks.
///
/// Each block is compressed independently, so a codec only ever sees one
/// complete block of serialized records at a time.
///
/// # Implementing a custom codec
///
/// ```no_run
/// use filebus::codec::BlockCodec;
/// use filebus::container::ContainerError;
///
/// struct Reverse;
///
/// impl BlockCodec for Reverse {
///     fn id(&self) -> u8 { 200 }
///     fn name(&self) -> &'static str { "reverse" }
///     fn compress(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
///         Ok(data.iter().rev().copied().collect())
///     }
///     fn decompress(&self, data: &[u8], _raw_len: usize) -> Result<Vec<u8>, ContainerError> {
///         Ok(data.iter().rev().copied().collect())
///     }
/// }
/// ```
pub trait BlockCodec: Send + Sync {
    /// The codec ID stored in the container header.
    ///
    /// IDs 0-3 are taken by the built-in codecs; custom implementations
    /// should pick IDs that don't collide with them.
    fn id(&self) -> u8;

    /// Short configuration name (`lz4`, `zlib`, ...).
    fn name(&self) -> &'static str;

    /// Compress one block.
    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>>;

    /// Decompress a block previously produced by `compress()`.
    ///
    /// `raw_len` is the uncompressed length recorded in the block header.
    fn decompress(&self, data: &[u8], raw_len: usize) -> Result<Vec<u8>, ContainerError>;
}

// ---------------------------------------------------------------------------
// Bounded output
// ---------------------------------------------------------------------------

/// Decompression sink that refuses to grow past the block's declared raw
/// length, so a hostile block cannot expand without limit.
#[cfg(any(feature = "zlib", feature = "lzma"))]
struct BoundedOutput {
    buf: Vec<u8>,
    limit: usize,
}

#[cfg(any(feature = "zlib", feature = "lzma"))]
impl BoundedOutput {
    fn new(limit: usize) -> Self {
        Self {
            buf: Vec::with_capacity(limit),
            limit,
        }
    }
}

#[cfg(any(feature = "zlib", feature = "lzma"))]
impl io::Write for BoundedOutput {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if data.len() > self.limit - self.buf.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("block expands past its raw length of {} bytes", self.limit),
            ));
        }
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// No-compression codec
// ---------------------------------------------------------------------------

/// Stored blocks: payload bytes are written as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCodec;

impl BlockCodec for NoCodec {
    fn id(&self) -> u8 {
        CODEC_NONE_ID
    }

    fn name(&self) -> &'static str {
        "none"
    }

    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8], _raw_len: usize) -> Result<Vec<u8>, ContainerError> {
        Ok(data.to_vec())
    }
}

// ---------------------------------------------------------------------------
// LZ4 codec
// ---------------------------------------------------------------------------

/// LZ4 block codec (ID 1). Raw LZ4 blocks, no frame header; the block
/// length lives in the container block header instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz4Codec;

impl BlockCodec for Lz4Codec {
    fn id(&self) -> u8 {
        CODEC_LZ4_ID
    }

    fn name(&self) -> &'static str {
        "lz4"
    }

    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        Ok(lz4_flex::block::compress(data))
    }

    fn decompress(&self, data: &[u8], raw_len: usize) -> Result<Vec<u8>, ContainerError> {
        lz4_flex::block::decompress(data, raw_len)
            .map_err(|e| ContainerError::Corrupt(format!("LZ4 decompression failed: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Zlib codec
// ---------------------------------------------------------------------------

/// Zlib/Deflate codec (ID 2).
///
/// Uses zlib format (deflate + zlib header), not raw deflate,
/// so each block is self-describing and carries its own checksum.
#[cfg(feature = "zlib")]
#[derive(Debug, Clone, Copy)]
pub struct ZlibCodec {
    level: flate2::Compression,
}

#[cfg(feature = "zlib")]
impl ZlibCodec {
    /// Create a Zlib codec with the given compression level (0-9).
    pub fn new(level: u32) -> Self {
        Self {
            level: flate2::Compression::new(level.min(9)),
        }
    }
}

#[cfg(feature = "zlib")]
impl Default for ZlibCodec {
    fn default() -> Self {
        Self::new(DEFAULT_ZLIB_LEVEL)
    }
}

#[cfg(feature = "zlib")]
impl BlockCodec for ZlibCodec {
    fn id(&self) -> u8 {
        CODEC_ZLIB_ID
    }

    fn name(&self) -> &'static str {
        "zlib"
    }

    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        use flate2::write::ZlibEncoder;
        use io::Write;

        let mut encoder = ZlibEncoder::new(Vec::new(), self.level);
        encoder.write_all(data)?;
        encoder.finish()
    }

    fn decompress(&self, data: &[u8], raw_len: usize) -> Result<Vec<u8>, ContainerError> {
        use flate2::read::ZlibDecoder;

        let mut decoder = ZlibDecoder::new(data);
        let mut output = BoundedOutput::new(raw_len);
        io::copy(&mut decoder, &mut output)
            .map_err(|e| ContainerError::Corrupt(format!("Zlib decompression failed: {e}")))?;
        Ok(output.buf)
    }
}

// ---------------------------------------------------------------------------
// LZMA codec
// ---------------------------------------------------------------------------

/// LZMA codec (ID 3). Slow, but the densest of the built-ins.
#[cfg(feature = "lzma")]
#[derive(Debug, Clone, Copy, Default)]
pub struct LzmaCodec;

#[cfg(feature = "lzma")]
impl BlockCodec for LzmaCodec {
    fn id(&self) -> u8 {
        CODEC_LZMA_ID
    }

    fn name(&self) -> &'static str {
        "lzma"
    }

    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        let mut input = io::Cursor::new(data);
        let mut output = Vec::new();
        lzma_rs::lzma_compress(&mut input, &mut output)?;
        Ok(output)
    }

    fn decompress(&self, data: &[u8], raw_len: usize) -> Result<Vec<u8>, ContainerError> {
        let mut input = io::BufReader::new(io::Cursor::new(data));
        let mut output = BoundedOutput::new(raw_len);
        // The dictionary never needs to exceed the block itself.
        let options = lzma_rs::decompress::Options {
            memlimit: Some(raw_len.max(4096)),
            ..Default::default()
        };
        lzma_rs::lzma_decompress_with_options(&mut input, &mut output, &options)
            .map_err(|e| ContainerError::Corrupt(format!("LZMA decompression failed: {e}")))?;
        Ok(output.buf)
    }
}

// ---------------------------------------------------------------------------
// Read-side dispatch
// ---------------------------------------------------------------------------

/// Look up a decompression codec by the ID stored in a container header.
pub fn codec_for_id(id: u8) -> Result<Box<dyn BlockCodec>, ContainerError> {
    match id {
        CODEC_NONE_ID => Ok(Box::new(NoCodec)),
        CODEC_LZ4_ID => Ok(Box::new(Lz4Codec)),

        #[cfg(feature = "zlib")]
        CODEC_ZLIB_ID => Ok(Box::new(ZlibCodec::default())),

        #[cfg(not(feature = "zlib"))]
        CODEC_ZLIB_ID => Err(ContainerError::Unsupported(
            "Zlib blocks require the 'zlib' feature".into(),
        )),

        #[cfg(feature = "lzma")]
        CODEC_LZMA_ID => Ok(Box::new(LzmaCodec)),

        #[cfg(not(feature = "lzma"))]
        CODEC_LZMA_ID => Err(ContainerError::Unsupported(
            "LZMA blocks require the 'lzma' feature".into(),
        )),

        other => Err(ContainerError::UnknownCodec(other)),
    }
}

// ---------------------------------------------------------------------------
// Configuration-side selection
// ---------------------------------------------------------------------------

/// The block compression algorithm a record destination uses.
#[derive(Clone, Default)]
pub enum Compression {
    /// Stored blocks.
    None,
    /// LZ4 (ID 1).
    #[default]
    Lz4,
    /// Zlib/Deflate (ID 2).
    #[cfg(feature = "zlib")]
    Zlib {
        /// Zlib compression level (0-9). Default: 6.
        level: u32,
    },
    /// LZMA (ID 3).
    #[cfg(feature = "lzma")]
    Lzma,
    /// A codec provided by the caller.
    Custom(Arc<dyn BlockCodec>),
}

impl fmt::Debug for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Lz4 => write!(f, "Lz4"),
            #[cfg(feature = "zlib")]
            Self::Zlib { level } => write!(f, "Zlib {{ level: {level} }}"),
            #[cfg(feature = "lzma")]
            Self::Lzma => write!(f, "Lzma"),
            Self::Custom(c) => write!(f, "Custom(id={})", c.id()),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Compression {
    /// Return the codec implementation.
    pub fn codec(&self) -> Arc<dyn BlockCodec> {
        match self {
            Self::None => Arc::new(NoCodec),
            Self::Lz4 => Arc::new(Lz4Codec),
            #[cfg(feature = "zlib")]
            Self::Zlib { level } => Arc::new(ZlibCodec::new(*level)),
            #[cfg(feature = "lzma")]
            Self::Lzma => Arc::new(LzmaCodec),
            Self::Custom(c) => Arc::clone(c),
        }
    }

    /// Configuration name of the selected codec.
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Lz4 => "lz4",
            #[cfg(feature = "zlib")]
            Self::Zlib { .. } => "zlib",
            #[cfg(feature = "lzma")]
            Self::Lzma => "lzma",
            Self::Custom(c) => c.name(),
        }
    }

    /// Whether blocks are actually compressed.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Names accepted by `FromStr` in this build.
    pub fn available() -> &'static [&'static str] {
        &[
            "none",
            "lz4",
            #[cfg(feature = "zlib")]
            "zlib",
            #[cfg(feature = "lzma")]
            "lzma",
        ]
    }
}

/// Error for an unrecognised or compiled-out compression name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown compression '{0}'")]
pub struct UnknownCompression(pub String);

impl FromStr for Compression {
    type Err = UnknownCompression;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "stored" => Ok(Self::None),
            "lz4" | "default" => Ok(Self::Lz4),
            #[cfg(feature = "zlib")]
            "zlib" | "deflate" => Ok(Self::Zlib {
                level: DEFAULT_ZLIB_LEVEL,
            }),
            #[cfg(feature = "lzma")]
            "lzma" => Ok(Self::Lzma),
            _ => Err(UnknownCompression(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        b"2026-10-19 INFO request served in 12ms\n"
            .iter()
            .copied()
            .cycle()
            .take(4096)
            .collect()
    }

    fn roundtrip(codec: &dyn BlockCodec) {
        let data = sample();
        let compressed = codec.compress(&data).unwrap();
        let decompressed = codec.decompress(&compressed, data.len()).unwrap();
        assert_eq!(decompressed, data, "codec {}", codec.name());
    }

    #[test]
    fn lz4_roundtrip_and_shrinks() {
        let data = sample();
        let compressed = Lz4Codec.compress(&data).unwrap();
        assert!(compressed.len() < data.len());
        roundtrip(&Lz4Codec);
    }

    #[test]
    fn lz4_rejects_garbage() {
        let result = Lz4Codec.decompress(&[0xFF, 0xFF, 0xFF, 0xFF], 100);
        assert!(matches!(result, Err(ContainerError::Corrupt(_))));
    }

    #[cfg(feature = "zlib")]
    #[test]
    fn zlib_roundtrip() {
        roundtrip(&ZlibCodec::default());
        roundtrip(&ZlibCodec::new(0));
        roundtrip(&ZlibCodec::new(9));
    }

    #[cfg(feature = "lzma")]
    #[test]
    fn lzma_roundtrip() {
        roundtrip(&LzmaCodec);
    }

    #[cfg(feature = "zlib")]
    #[test]
    fn zlib_stops_at_declared_raw_len() {
        let bomb = ZlibCodec::new(9).compress(&vec![0u8; 1 << 20]).unwrap();
        let result = ZlibCodec::default().decompress(&bomb, 16);
        assert!(matches!(result, Err(ContainerError::Corrupt(_))));
    }

    #[cfg(feature = "lzma")]
    #[test]
    fn lzma_stops_at_declared_raw_len() {
        let bomb = LzmaCodec.compress(&vec![0u8; 1 << 20]).unwrap();
        let result = LzmaCodec.decompress(&bomb, 16);
        assert!(matches!(result, Err(ContainerError::Corrupt(_))));
    }

    #[cfg(feature = "zlib")]
    #[test]
    fn zlib_exact_raw_len_is_accepted() {
        let data = sample();
        let compressed = ZlibCodec::default().compress(&data).unwrap();
        assert_eq!(
            ZlibCodec::default().decompress(&compressed, data.len()).unwrap(),
            data
        );
    }

    #[test]
    fn no_codec_passthrough() {
        let data = b"plain";
        assert_eq!(NoCodec.compress(data).unwrap(), data);
        assert_eq!(NoCodec.decompress(data, data.len()).unwrap(), data);
    }

    #[test]
    fn empty_block_roundtrips() {
        let compressed = Lz4Codec.compress(&[]).unwrap();
        assert!(Lz4Codec.decompress(&compressed, 0).unwrap().is_empty());
    }

    #[test]
    fn codec_for_id_dispatch() {
        assert_eq!(codec_for_id(CODEC_NONE_ID).unwrap().id(), CODEC_NONE_ID);
        assert_eq!(codec_for_id(CODEC_LZ4_ID).unwrap().id(), CODEC_LZ4_ID);
        #[cfg(feature = "zlib")]
        assert_eq!(codec_for_id(CODEC_ZLIB_ID).unwrap().id(), CODEC_ZLIB_ID);
        #[cfg(feature = "lzma")]
        assert_eq!(codec_for_id(CODEC_LZMA_ID).unwrap().id(), CODEC_LZMA_ID);
        assert!(matches!(
            codec_for_id(99),
            Err(ContainerError::UnknownCodec(99))
        ));
    }

    #[test]
    fn compression_defaults_to_lz4() {
        let c = Compression::default();
        assert_eq!(c.name(), "lz4");
        assert_eq!(c.codec().id(), CODEC_LZ4_ID);
        assert!(c.is_enabled());
        assert!(!Compression::None.is_enabled());
    }

    #[test]
    fn compression_parses_names() {
        assert!(matches!("none".parse::<Compression>(), Ok(Compression::None)));
        assert!(matches!("LZ4".parse::<Compression>(), Ok(Compression::Lz4)));
        #[cfg(feature = "zlib")]
        assert!(matches!(
            "zlib".parse::<Compression>(),
            Ok(Compression::Zlib { level: 6 })
        ));
        #[cfg(feature = "lzma")]
        assert!(matches!("lzma".parse::<Compression>(), Ok(Compression::Lzma)));
        assert_eq!(
            "snappy".parse::<Compression>().unwrap_err(),
            UnknownCompression("snappy".into())
        );
    }

    #[test]
    fn every_available_name_parses() {
        for name in Compression::available() {
            let c: Compression = name.parse().unwrap();
            assert_eq!(c.name(), *name);
        }
    }

    #[test]
    fn custom_codec_is_used() {
        struct Reverse;
        impl BlockCodec for Reverse {
            fn id(&self) -> u8 {
                42
            }
            fn name(&self) -> &'static str {
                "reverse"
            }
            fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
                Ok(data.iter().rev().copied().collect())
            }
            fn decompress(&self, data: &[u8], _raw_len: usize) -> Result<Vec<u8>, ContainerError> {
                Ok(data.iter().rev().copied().collect())
            }
        }

        let c = Compression::Custom(Arc::new(Reverse));
        assert_eq!(c.name(), "reverse");
        assert_eq!(c.codec().id(), 42);
        assert_eq!(format!("{c:?}"), "Custom(id=42)");
        roundtrip(c.codec().as_ref());
    }
}
