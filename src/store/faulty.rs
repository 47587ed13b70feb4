// Fault-injecting backend wrapper.
//
// Wraps any `RemoteStore` and fails selected operations on demand, so the
// delivery protocol can be driven through every failure branch: staging
// write errors (up front or mid-stream), refused or failing publish, and
// failing cleanup. Faults are switched through a shared `Faults` handle
// that stays usable after the store has been moved into a destination.

use std::io::{self, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::{RemotePath, RemoteStore};

const NO_LIMIT: u64 = u64::MAX;

/// Switchable faults plus call counters.
#[derive(Debug)]
pub struct Faults {
    fail_create: AtomicBool,
    write_limit: AtomicU64,
    refuse_rename: AtomicBool,
    fail_rename: AtomicBool,
    fail_delete: AtomicBool,
    creates: AtomicU64,
    renames: AtomicU64,
    deletes: AtomicU64,
}

impl Default for Faults {
    fn default() -> Self {
        Self {
            fail_create: AtomicBool::new(false),
            write_limit: AtomicU64::new(NO_LIMIT),
            refuse_rename: AtomicBool::new(false),
            fail_rename: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            creates: AtomicU64::new(0),
            renames: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
        }
    }
}

impl Faults {
    /// `create` returns an error.
    pub fn fail_create(&self, on: bool) {
        self.fail_create.store(on, Ordering::SeqCst);
    }

    /// Writers accept `limit` bytes, then error (a torn staging write).
    pub fn fail_writes_after(&self, limit: Option<u64>) {
        self.write_limit
            .store(limit.unwrap_or(NO_LIMIT), Ordering::SeqCst);
    }

    /// `rename` returns `Ok(false)` as if the destination were occupied.
    pub fn refuse_rename(&self, on: bool) {
        self.refuse_rename.store(on, Ordering::SeqCst);
    }

    /// `rename` returns an error.
    pub fn fail_rename(&self, on: bool) {
        self.fail_rename.store(on, Ordering::SeqCst);
    }

    /// `delete` returns an error.
    pub fn fail_delete(&self, on: bool) {
        self.fail_delete.store(on, Ordering::SeqCst);
    }

    /// Clear every fault. Counters are kept.
    pub fn heal(&self) {
        self.fail_create(false);
        self.fail_writes_after(None);
        self.refuse_rename(false);
        self.fail_rename(false);
        self.fail_delete(false);
    }

    pub fn creates(&self) -> u64 {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn renames(&self) -> u64 {
        self.renames.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> u64 {
        self.deletes.load(Ordering::SeqCst)
    }
}

fn injected(op: &str) -> io::Error {
    io::Error::other(format!("injected {op} failure"))
}

/// A store whose operations fail according to its `Faults`.
#[derive(Debug)]
pub struct FaultyStore<S> {
    inner: S,
    faults: Arc<Faults>,
}

impl<S: RemoteStore> FaultyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            faults: Arc::new(Faults::default()),
        }
    }

    /// Handle for switching faults on and off.
    pub fn faults(&self) -> Arc<Faults> {
        Arc::clone(&self.faults)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

struct LimitedWriter {
    inner: Box<dyn Write + Send>,
    written: u64,
    limit: u64,
}

impl Write for LimitedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let room = self.limit.saturating_sub(self.written);
        if room == 0 {
            return Err(injected("write"));
        }
        let take = buf.len().min(usize::try_from(room).unwrap_or(usize::MAX));
        let n = self.inner.write(&buf[..take])?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<S: RemoteStore> RemoteStore for FaultyStore<S> {
    fn create(&self, path: &RemotePath) -> io::Result<Box<dyn Write + Send>> {
        self.faults.creates.fetch_add(1, Ordering::SeqCst);
        if self.faults.fail_create.load(Ordering::SeqCst) {
            return Err(injected("create"));
        }
        let writer = self.inner.create(path)?;
        let limit = self.faults.write_limit.load(Ordering::SeqCst);
        if limit == NO_LIMIT {
            Ok(writer)
        } else {
            Ok(Box::new(LimitedWriter {
                inner: writer,
                written: 0,
                limit,
            }))
        }
    }

    fn open(&self, path: &RemotePath) -> io::Result<Box<dyn Read + Send>> {
        self.inner.open(path)
    }

    fn rename(&self, src: &RemotePath, dst: &RemotePath) -> io::Result<bool> {
        self.faults.renames.fetch_add(1, Ordering::SeqCst);
        if self.faults.fail_rename.load(Ordering::SeqCst) {
            return Err(injected("rename"));
        }
        if self.faults.refuse_rename.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.inner.rename(src, dst)
    }

    fn delete(&self, path: &RemotePath) -> io::Result<bool> {
        self.faults.deletes.fetch_add(1, Ordering::SeqCst);
        if self.faults.fail_delete.load(Ordering::SeqCst) {
            return Err(injected("delete"));
        }
        self.inner.delete(path)
    }

    fn exists(&self, path: &RemotePath) -> io::Result<bool> {
        self.inner.exists(path)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
