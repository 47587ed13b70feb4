// Remote storage backends.
//
// The delivery protocol needs only a small capability set from the remote
// side: create an object for writing, read it back, rename without
// overwriting, delete, and an existence check. Anything exposing those
// (a local directory tree, an object store with rename emulation, a
// distributed filesystem client) can act as a backend.
//
// - `path`: RemotePath, normalized paths in the remote namespace
// - `local`: LocalFsStore, a directory tree on the local filesystem
// - `memory`: MemoryStore, in-process map, for tests and dry runs
// - `faulty`: FaultyStore, fault-injecting wrapper around any backend

pub mod faulty;
pub mod local;
pub mod memory;
pub mod path;

use std::io::{self, Read, Write};

pub use faulty::{FaultyStore, Faults};
pub use local::LocalFsStore;
pub use memory::MemoryStore;
pub use path::{InvalidRemotePath, RemotePath};

/// Capability surface of a remote storage backend.
///
/// Implementations must tolerate concurrent calls on disjoint paths; the
/// delivery layer shares one handle across all in-flight deliveries.
pub trait RemoteStore: Send + Sync {
    /// Create `path` for writing, truncating any existing object.
    /// Never appends. Missing parent directories are created.
    fn create(&self, path: &RemotePath) -> io::Result<Box<dyn Write + Send>>;

    /// Open an existing object for reading.
    fn open(&self, path: &RemotePath) -> io::Result<Box<dyn Read + Send>>;

    /// Rename `src` to `dst` without overwriting.
    ///
    /// Returns `Ok(false)` when `src` does not exist or `dst` is already
    /// occupied; `Err` only for backend failures.
    fn rename(&self, src: &RemotePath, dst: &RemotePath) -> io::Result<bool>;

    /// Delete an object. Returns `Ok(false)` when it did not exist.
    fn delete(&self, path: &RemotePath) -> io::Result<bool>;

    /// Whether an object exists at `path`.
    fn exists(&self, path: &RemotePath) -> io::Result<bool>;
}

impl<S: RemoteStore + ?Sized> RemoteStore for std::sync::Arc<S> {
    fn create(&self, path: &RemotePath) -> io::Result<Box<dyn Write + Send>> {
        (**self).create(path)
    }
    fn open(&self, path: &RemotePath) -> io::Result<Box<dyn Read + Send>> {
        (**self).open(path)
    }
    fn rename(&self, src: &RemotePath, dst: &RemotePath) -> io::Result<bool> {
        (**self).rename(src, dst)
    }
    fn delete(&self, path: &RemotePath) -> io::Result<bool> {
        (**self).delete(path)
    }
    fn exists(&self, path: &RemotePath) -> io::Result<bool> {
        (**self).exists(path)
    }
}

/// Read a whole object into memory.
pub fn read_all(store: &dyn RemoteStore, path: &RemotePath) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    store.open(path)?.read_to_end(&mut out)?;
    Ok(out)
}
