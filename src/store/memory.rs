// In-memory backend for tests and dry runs.
//
// Writers append straight into the stored object, so a half-written staging
// object is visible to readers exactly as it would be on a real backend after
// a crash mid-copy.

use std::collections::BTreeMap;
use std::io::{self, Cursor, Read, Write};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::{RemotePath, RemoteStore};

type Object = Arc<Mutex<Vec<u8>>>;

/// Shared in-process object map. Clones share the same objects.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    objects: Arc<RwLock<BTreeMap<RemotePath, Object>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place an object directly, replacing any existing one.
    pub fn insert(&self, path: &RemotePath, data: impl Into<Vec<u8>>) {
        self.objects
            .write()
            .insert(path.clone(), Arc::new(Mutex::new(data.into())));
    }

    /// Snapshot of an object's current bytes.
    pub fn get(&self, path: &RemotePath) -> Option<Vec<u8>> {
        self.objects.read().get(path).map(|obj| obj.lock().clone())
    }

    /// All stored paths, sorted.
    pub fn paths(&self) -> Vec<RemotePath> {
        self.objects.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct MemoryWriter {
    object: Object,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.object.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl RemoteStore for MemoryStore {
    fn create(&self, path: &RemotePath) -> io::Result<Box<dyn Write + Send>> {
        if path.is_root() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot create the namespace root",
            ));
        }
        let object: Object = Arc::new(Mutex::new(Vec::new()));
        self.objects.write().insert(path.clone(), Arc::clone(&object));
        Ok(Box::new(MemoryWriter { object }))
    }

    fn open(&self, path: &RemotePath) -> io::Result<Box<dyn Read + Send>> {
        let data = self.get(path).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no object at {path}"))
        })?;
        Ok(Box::new(Cursor::new(data)))
    }

    fn rename(&self, src: &RemotePath, dst: &RemotePath) -> io::Result<bool> {
        let mut objects = self.objects.write();
        if objects.contains_key(dst) {
            return Ok(false);
        }
        match objects.remove(src) {
            Some(object) => {
                objects.insert(dst.clone(), object);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete(&self, path: &RemotePath) -> io::Result<bool> {
        Ok(self.objects.write().remove(path).is_some())
    }

    fn exists(&self, path: &RemotePath) -> io::Result<bool> {
        Ok(self.objects.read().contains_key(path))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
