// Per-path mutual exclusion for in-process deliveries.
//
// Staging and final paths are derived from the file name alone, so two
// concurrent deliveries of same-named files would race on the same remote
// objects. A delivery holds its final path here for its whole duration.
// Only held paths are stored; releasing the last holder drops the entry.

use std::collections::HashSet;

use parking_lot::{Condvar, Mutex};

use crate::store::RemotePath;

#[derive(Debug, Default)]
pub struct PathLocks {
    held: Mutex<HashSet<RemotePath>>,
    released: Condvar,
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until `path` is free, then hold it until the guard drops.
    pub fn lock(&self, path: &RemotePath) -> PathGuard<'_> {
        let mut held = self.held.lock();
        while held.contains(path) {
            self.released.wait(&mut held);
        }
        held.insert(path.clone());
        PathGuard {
            locks: self,
            path: path.clone(),
        }
    }

    /// Hold `path` only if nobody else does.
    pub fn try_lock(&self, path: &RemotePath) -> Option<PathGuard<'_>> {
        let mut held = self.held.lock();
        if !held.insert(path.clone()) {
            return None;
        }
        Some(PathGuard {
            locks: self,
            path: path.clone(),
        })
    }

    /// Number of paths currently held.
    pub fn held(&self) -> usize {
        self.held.lock().len()
    }
}

/// Releases its path on drop.
#[derive(Debug)]
pub struct PathGuard<'a> {
    locks: &'a PathLocks,
    path: RemotePath,
}

impl PathGuard<'_> {
    pub fn path(&self) -> &RemotePath {
        &self.path
    }
}

impl Drop for PathGuard<'_> {
    fn drop(&mut self) {
        self.locks.held.lock().remove(&self.path);
        self.locks.released.notify_all();
    }
}
