// Raw-copy encoder: stream the local file's bytes verbatim.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use crate::store::{RemotePath, RemoteStore};

use super::{BUF_SIZE, EncodeError, EncodeStats};

/// Copy `local` byte-for-byte into a freshly created `staging` object.
pub fn encode(
    store: &dyn RemoteStore,
    local: &Path,
    staging: &RemotePath,
) -> Result<EncodeStats, EncodeError> {
    let source_err = |source| EncodeError::Source {
        path: local.to_path_buf(),
        source,
    };
    let sink_err = |source| EncodeError::Sink {
        path: staging.clone(),
        source,
    };

    let file = File::open(local).map_err(source_err)?;
    let mut reader = BufReader::with_capacity(BUF_SIZE, file);
    let mut sink = store.create(staging).map_err(sink_err)?;

    let mut buf = vec![0u8; BUF_SIZE];
    let mut copied = 0u64;
    loop {
        let n = reader.read(&mut buf).map_err(source_err)?;
        if n == 0 {
            break;
        }
        sink.write_all(&buf[..n]).map_err(sink_err)?;
        copied += n as u64;
    }
    sink.flush().map_err(sink_err)?;

    Ok(EncodeStats {
        bytes_read: copied,
        bytes_written: copied,
        records: None,
        blocks: None,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FaultyStore, MemoryStore};
    use tempfile::tempdir;

    fn rp(s: &str) -> RemotePath {
        RemotePath::new(s).unwrap()
    }

    #[test]
    fn copies_bytes_exactly() {
        let dir = tempdir().unwrap();
        let local = dir.path().join("blob.bin");
        let data: Vec<u8> = (0..=255u8).cycle().take(200_000).collect();
        std::fs::write(&local, &data).unwrap();

        let store = MemoryStore::new();
        let stats = encode(&store, &local, &rp("/out/blob.bin.tmp")).unwrap();
        assert_eq!(stats.bytes_read, data.len() as u64);
        assert_eq!(stats.bytes_written, data.len() as u64);
        assert_eq!(stats.records, None);
        assert_eq!(store.get(&rp("/out/blob.bin.tmp")).unwrap(), data);
    }

    #[test]
    fn empty_file_creates_empty_object() {
        let dir = tempdir().unwrap();
        let local = dir.path().join("empty");
        std::fs::write(&local, b"").unwrap();

        let store = MemoryStore::new();
        encode(&store, &local, &rp("/e.tmp")).unwrap();
        assert_eq!(store.get(&rp("/e.tmp")).unwrap(), b"");
    }

    #[test]
    fn overwrites_stale_staging() {
        let dir = tempdir().unwrap();
        let local = dir.path().join("f");
        std::fs::write(&local, b"fresh").unwrap();

        let store = MemoryStore::new();
        store.insert(&rp("/f.tmp"), b"stale partial content".to_vec());
        encode(&store, &local, &rp("/f.tmp")).unwrap();
        assert_eq!(store.get(&rp("/f.tmp")).unwrap(), b"fresh");
    }

    #[test]
    fn missing_source_is_source_error() {
        let dir = tempdir().unwrap();
        let store = MemoryStore::new();
        let err = encode(&store, &dir.path().join("nope"), &rp("/x.tmp")).unwrap_err();
        assert!(matches!(err, EncodeError::Source { .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn torn_write_is_sink_error() {
        let dir = tempdir().unwrap();
        let local = dir.path().join("f");
        std::fs::write(&local, vec![7u8; 1000]).unwrap();

        let store = FaultyStore::new(MemoryStore::new());
        store.faults().fail_writes_after(Some(10));
        let err = encode(&store, &local, &rp("/f.tmp")).unwrap_err();
        assert!(matches!(err, EncodeError::Sink { .. }));
        assert_eq!(store.inner().get(&rp("/f.tmp")).unwrap().len(), 10);
    }
}
