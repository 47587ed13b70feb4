// Local-filesystem backend.
//
// Maps the remote namespace onto a directory tree: `/out/a.log` under a
// store rooted at `/srv/bus` is `/srv/bus/out/a.log`. Publishing uses a hard
// link followed by an unlink of the old name, so an occupied destination is
// detected atomically instead of being silently replaced as `rename(2)`
// would do.
//
// Unless syncing is turned off, the staging file is flushed to disk before it
// is linked into place and the affected directories are flushed afterwards,
// so a published name never points at data the kernel has not persisted.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use super::{RemotePath, RemoteStore};

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

/// A directory tree standing in for the remote namespace.
#[derive(Debug, Clone)]
pub struct LocalFsStore {
    root: PathBuf,
    sync: bool,
}

impl LocalFsStore {
    /// Use `root` as the namespace root. The directory is created if needed.
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root, sync: true })
    }

    /// Turn fsync around publishing on or off. On by default.
    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    pub fn syncs(&self) -> bool {
        self.sync
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local path backing a remote path.
    pub fn resolve(&self, path: &RemotePath) -> PathBuf {
        let mut local = self.root.clone();
        local.extend(path.segments());
        local
    }
}

impl LocalFsStore {
    /// Link `src` to `dst` without overwriting, then drop the old name with
    /// `unlink`. Once the link exists the move has happened: a failed unlink
    /// or directory sync is logged, not returned.
    fn publish(
        &self,
        src: &RemotePath,
        dst: &RemotePath,
        unlink: impl FnOnce(&Path) -> io::Result<()>,
    ) -> io::Result<bool> {
        let from = self.resolve(src);
        let to = self.resolve(dst);
        if !from.is_file() {
            debug!("rename {src} -> {dst}: source missing");
            return Ok(false);
        }
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        if self.sync {
            sync_file(&from)?;
        }
        match fs::hard_link(&from, &to) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!("rename {src} -> {dst}: destination occupied");
                return Ok(false);
            }
            Err(e) => return Err(e),
        }
        if let Err(e) = unlink(&from) {
            warn!("published {dst} but could not remove staging name {src}: {e}");
        }
        if self.sync {
            let mut dirs: Vec<&Path> = to.parent().into_iter().collect();
            if let Some(parent) = from.parent().filter(|p| !dirs.contains(p)) {
                dirs.push(parent);
            }
            for dir in dirs {
                if let Err(e) = sync_directory(dir) {
                    warn!("published {dst} but could not sync {}: {e}", dir.display());
                }
            }
        }
        Ok(true)
    }
}

fn sync_file(path: &Path) -> io::Result<()> {
    File::open(path)?.sync_all()
}

fn sync_directory(path: &Path) -> io::Result<()> {
    File::open(path)?.sync_all()
}

impl RemoteStore for LocalFsStore {
    fn create(&self, path: &RemotePath) -> io::Result<Box<dyn Write + Send>> {
        if path.is_root() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot create the namespace root",
            ));
        }
        let local = self.resolve(path);
        if let Some(parent) = local.parent() {
            fs::create_dir_all(parent)?;
        }
        // A staging name left behind by an earlier publish may still be a
        // link to the published file; truncating it in place would clobber
        // the published content.
        match fs::remove_file(&local) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        let file = File::create(&local)?;
        Ok(Box::new(BufWriter::with_capacity(BUF_SIZE, file)))
    }

    fn open(&self, path: &RemotePath) -> io::Result<Box<dyn Read + Send>> {
        let file = File::open(self.resolve(path))?;
        Ok(Box::new(io::BufReader::with_capacity(BUF_SIZE, file)))
    }

    fn rename(&self, src: &RemotePath, dst: &RemotePath) -> io::Result<bool> {
        self.publish(src, dst, |path| fs::remove_file(path))
    }

    fn delete(&self, path: &RemotePath) -> io::Result<bool> {
        match fs::remove_file(self.resolve(path)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn exists(&self, path: &RemotePath) -> io::Result<bool> {
        self.resolve(path).try_exists()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
