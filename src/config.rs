// Destination configuration.
//
// The values an operator chooses once per destination: remote directory,
// encoding, and for record encoding the block codec and block layout.
// `build` validates them and binds them to a backend handle.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::codec::Compression;
use crate::container::{DEFAULT_BLOCK_SIZE, MAX_BLOCK_SIZE};
use crate::delivery::Destination;
use crate::encode::{Encoder, RecordOptions};
use crate::store::{InvalidRemotePath, RemotePath, RemoteStore};

/// Which encoder a destination uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncodingKind {
    #[default]
    Raw,
    Records,
}

impl fmt::Display for EncodingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw => f.write_str("raw"),
            Self::Records => f.write_str("records"),
        }
    }
}

impl FromStr for EncodingKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" | "copy" => Ok(Self::Raw),
            "records" | "record" => Ok(Self::Records),
            _ => Err(ConfigError::UnknownEncoding(s.to_string())),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown encoding '{0}' (expected raw or records)")]
    UnknownEncoding(String),
    #[error(transparent)]
    Directory(#[from] InvalidRemotePath),
    #[error("block size {0} is outside 1..={MAX_BLOCK_SIZE}")]
    BlockSize(usize),
    #[error("compression is only meaningful for record encoding")]
    CompressionWithRaw,
}

/// Everything needed to build a `Destination` apart from the backend.
#[derive(Debug, Clone)]
pub struct DestinationConfig {
    /// Remote directory that receives delivered files.
    pub directory: String,
    pub encoding: EncodingKind,
    /// Block codec; `None` means the default for the encoding.
    pub compression: Option<Compression>,
    pub block_size: usize,
    pub checksum: bool,
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            directory: "/".to_string(),
            encoding: EncodingKind::Raw,
            compression: None,
            block_size: DEFAULT_BLOCK_SIZE,
            checksum: true,
        }
    }
}

impl DestinationConfig {
    pub fn new(directory: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            ..Default::default()
        }
    }

    /// Check the settings and produce the encoder they describe.
    pub fn encoder(&self) -> Result<Encoder, ConfigError> {
        match self.encoding {
            EncodingKind::Raw => {
                if self.compression.as_ref().is_some_and(Compression::is_enabled) {
                    return Err(ConfigError::CompressionWithRaw);
                }
                Ok(Encoder::Raw)
            }
            EncodingKind::Records => {
                if self.block_size == 0 || self.block_size > MAX_BLOCK_SIZE {
                    return Err(ConfigError::BlockSize(self.block_size));
                }
                Ok(Encoder::Records(RecordOptions {
                    compression: self.compression.clone().unwrap_or_default(),
                    block_size: self.block_size,
                    checksum: self.checksum,
                }))
            }
        }
    }

    /// Validate and bind to a backend.
    pub fn build(&self, store: Arc<dyn RemoteStore>) -> Result<Destination, ConfigError> {
        let directory = RemotePath::new(&self.directory)?;
        let encoder = self.encoder()?;
        Ok(Destination::new(directory, store, encoder))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn default_is_raw_at_root() {
        let dest = DestinationConfig::default()
            .build(Arc::new(MemoryStore::new()))
            .unwrap();
        assert!(dest.directory().is_root());
        assert!(matches!(dest.encoder(), Encoder::Raw));
    }

    #[test]
    fn records_default_to_lz4() {
        let cfg = DestinationConfig {
            encoding: EncodingKind::Records,
            ..DestinationConfig::new("/out")
        };
        let Encoder::Records(opts) = cfg.encoder().unwrap() else {
            panic!("expected record encoder");
        };
        assert_eq!(opts.compression.name(), "lz4");
        assert_eq!(opts.block_size, DEFAULT_BLOCK_SIZE);
        assert!(opts.checksum);
    }

    #[test]
    fn raw_rejects_compression() {
        let cfg = DestinationConfig {
            compression: Some(Compression::Lz4),
            ..DestinationConfig::new("/out")
        };
        assert_eq!(cfg.encoder().unwrap_err(), ConfigError::CompressionWithRaw);

        let explicit_none = DestinationConfig {
            compression: Some(Compression::None),
            ..DestinationConfig::new("/out")
        };
        assert!(explicit_none.encoder().is_ok());
    }

    #[test]
    fn block_size_bounds() {
        for bad in [0, MAX_BLOCK_SIZE + 1] {
            let cfg = DestinationConfig {
                encoding: EncodingKind::Records,
                block_size: bad,
                ..DestinationConfig::new("/out")
            };
            assert_eq!(cfg.encoder().unwrap_err(), ConfigError::BlockSize(bad));
        }
    }

    #[test]
    fn bad_directory_rejected() {
        let err = DestinationConfig::new("/out/../etc")
            .build(Arc::new(MemoryStore::new()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Directory(_)));
    }

    #[test]
    fn encoding_names_parse() {
        assert_eq!("raw".parse::<EncodingKind>().unwrap(), EncodingKind::Raw);
        assert_eq!(
            "Records".parse::<EncodingKind>().unwrap(),
            EncodingKind::Records
        );
        assert!("seqfile".parse::<EncodingKind>().is_err());
    }
}
