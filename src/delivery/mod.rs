// Delivery coordinator.
//
// One `deliver` call moves one local file into the destination directory:
//
//   1. derive  <dir>/<name>.tmp (staging) and <dir>/<name> (final)
//   2. encode the local file into the staging object (truncating it)
//   3. rename staging -> final; on refusal, delete staging best-effort
//   4. remove the local file; a failure here is logged, not returned
//
// Every failure before the final object is published comes back as a
// `DeliveryFailure` carrying the original request. After publish nothing is
// retryable: re-sending would duplicate the remote object.

pub mod failure;
pub mod lock;

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, warn};

use crate::encode::{EncodeStats, Encoder};
use crate::store::{InvalidRemotePath, RemotePath, RemoteStore};

pub use failure::{DeliverError, DeliveryCause, DeliveryFailure, PreconditionError};
pub use lock::{PathGuard, PathLocks};

/// Appended to the file name to form the staging object name.
pub const STAGING_SUFFIX: &str = ".tmp";

// ---------------------------------------------------------------------------
// Request / outcome
// ---------------------------------------------------------------------------

/// A local file to deliver.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeliveryRequest {
    path: PathBuf,
}

impl DeliveryRequest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn into_path(self) -> PathBuf {
        self.path
    }

    /// The file name used for the remote object.
    pub fn file_name(&self) -> Result<&str, PreconditionError> {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| PreconditionError::InvalidFileName {
                path: self.path.clone(),
            })
    }

    /// Check that the file exists, is a regular file and can be opened.
    pub fn check_readable(&self) -> Result<(), PreconditionError> {
        let unreadable = |source| PreconditionError::Unreadable {
            path: self.path.clone(),
            source,
        };
        let meta = std::fs::metadata(&self.path).map_err(unreadable)?;
        if !meta.is_file() {
            return Err(PreconditionError::NotAFile {
                path: self.path.clone(),
            });
        }
        File::open(&self.path).map_err(unreadable)?;
        Ok(())
    }
}

impl From<PathBuf> for DeliveryRequest {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

impl From<&Path> for DeliveryRequest {
    fn from(path: &Path) -> Self {
        Self::new(path)
    }
}

/// A completed delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Where the object now lives.
    pub target: RemotePath,
    /// What the encoder did.
    pub stats: EncodeStats,
    /// The local file could not be removed after publish and may be
    /// picked up and delivered again.
    pub local_retained: bool,
}

// ---------------------------------------------------------------------------
// Local cleanup
// ---------------------------------------------------------------------------

/// Removes the local source once its remote copy is published.
pub trait LocalCleanup: Send + Sync {
    fn remove(&self, path: &Path) -> io::Result<()>;
}

/// `std::fs::remove_file`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveFile;

impl LocalCleanup for RemoveFile {
    fn remove(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }
}

// ---------------------------------------------------------------------------
// Destination
// ---------------------------------------------------------------------------

/// A remote directory plus the backend handle and encoder used to fill it.
///
/// Cheap to clone; clones share the backend handle and the per-path locks,
/// so concurrent deliveries of same-named files through any clone are
/// serialized.
#[derive(Clone)]
pub struct Destination {
    directory: RemotePath,
    store: Arc<dyn RemoteStore>,
    encoder: Encoder,
    locks: Arc<PathLocks>,
    cleanup: Arc<dyn LocalCleanup>,
}

impl std::fmt::Debug for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Destination")
            .field("directory", &self.directory)
            .field("encoder", &self.encoder)
            .finish_non_exhaustive()
    }
}

impl Destination {
    pub fn new(directory: RemotePath, store: Arc<dyn RemoteStore>, encoder: Encoder) -> Self {
        Self {
            directory,
            store,
            encoder,
            locks: Arc::new(PathLocks::new()),
            cleanup: Arc::new(RemoveFile),
        }
    }

    /// Replace how local files are removed after publish.
    pub fn with_local_cleanup(mut self, cleanup: Arc<dyn LocalCleanup>) -> Self {
        self.cleanup = cleanup;
        self
    }

    /// Share a lock registry with other destinations, e.g. several handles
    /// onto the same directory built independently.
    pub fn with_locks(mut self, locks: Arc<PathLocks>) -> Self {
        self.locks = locks;
        self
    }

    pub fn directory(&self) -> &RemotePath {
        &self.directory
    }

    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    pub fn store(&self) -> &dyn RemoteStore {
        self.store.as_ref()
    }

    pub fn locks(&self) -> &Arc<PathLocks> {
        &self.locks
    }

    /// `<directory>/<file_name>`
    pub fn final_path(&self, file_name: &str) -> Result<RemotePath, InvalidRemotePath> {
        self.directory.join(file_name)
    }

    /// `<directory>/<file_name>.tmp`
    pub fn staging_path(&self, file_name: &str) -> Result<RemotePath, InvalidRemotePath> {
        self.directory.join(&format!("{file_name}{STAGING_SUFFIX}"))
    }

    /// Deliver one local file.
    ///
    /// On success the object exists at `<directory>/<name>` and the local
    /// file is gone (unless `Delivery::local_retained`). On
    /// `DeliverError::Failed` the local file is untouched and the request
    /// can be resubmitted as-is.
    pub fn deliver(&self, request: DeliveryRequest) -> Result<Delivery, DeliverError> {
        let file_name = request.file_name()?;
        let invalid_name = |_| PreconditionError::InvalidFileName {
            path: request.path().to_path_buf(),
        };
        let target = self.final_path(file_name).map_err(invalid_name)?;
        let staging = self.staging_path(file_name).map_err(invalid_name)?;
        request.check_readable()?;

        let _guard = self.locks.lock(&target);
        debug!(
            "delivering {} -> {target} via {staging} ({})",
            request.path().display(),
            self.encoder
        );

        let stats = match self.transfer(request.path(), &staging, &target) {
            Ok(stats) => stats,
            Err(cause) => {
                debug!("delivery of {} failed: {cause}", request.path().display());
                return Err(DeliveryFailure::new(request, cause).into());
            }
        };

        let local_retained = match self.cleanup.remove(request.path()) {
            Ok(()) => false,
            Err(e) => {
                // Not an error for the caller: a retry would publish a
                // second copy of what is already at `target`.
                error!(
                    "unable to delete {} after delivering it to {target}: {e}; file may be redelivered",
                    request.path().display()
                );
                true
            }
        };

        debug!(
            "delivered {} -> {target} ({} bytes)",
            request.path().display(),
            stats.bytes_written
        );
        Ok(Delivery {
            target,
            stats,
            local_retained,
        })
    }

    /// `deliver`, resubmitting retryable failures up to `attempts` times
    /// in total with `backoff` between attempts.
    ///
    /// For callers without their own redelivery mechanism. Precondition
    /// failures are returned immediately.
    pub fn deliver_with_retry(
        &self,
        request: DeliveryRequest,
        attempts: u32,
        backoff: Duration,
    ) -> Result<Delivery, DeliverError> {
        let attempts = attempts.max(1);
        let mut request = request;
        let mut attempt = 1;
        loop {
            match self.deliver(request) {
                Err(DeliverError::Failed(failure)) if attempt < attempts => {
                    warn!(
                        "attempt {attempt}/{attempts} for {} failed: {}",
                        failure.payload().path().display(),
                        failure.cause()
                    );
                    request = failure.into_payload();
                    attempt += 1;
                    if !backoff.is_zero() {
                        std::thread::sleep(backoff);
                    }
                }
                result => return result,
            }
        }
    }

    /// Steps 2 and 3: staging write, then publish.
    fn transfer(
        &self,
        local: &Path,
        staging: &RemotePath,
        target: &RemotePath,
    ) -> Result<EncodeStats, DeliveryCause> {
        let stats = self.encoder.encode(self.store.as_ref(), local, staging)?;

        match self.store.rename(staging, target) {
            Ok(true) => Ok(stats),
            Ok(false) => {
                self.discard_staging(staging);
                Err(DeliveryCause::PublishRefused {
                    staging: staging.clone(),
                    target: target.clone(),
                })
            }
            Err(source) => {
                self.discard_staging(staging);
                Err(DeliveryCause::Store {
                    op: "rename",
                    path: staging.clone(),
                    source,
                })
            }
        }
    }

    fn discard_staging(&self, staging: &RemotePath) {
        match self.store.delete(staging) {
            Ok(true) => debug!("removed {staging} after failed publish"),
            Ok(false) => debug!("{staging} already gone after failed publish"),
            Err(e) => warn!(
                "failed to clean up temporary file at {staging} after rename failed ({e}); it will be overwritten on retry"
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
