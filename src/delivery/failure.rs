// Delivery errors.
//
// Two shapes only: a precondition failure (nothing remote was touched, the
// request is unusable as given) and a delivery failure that carries the
// original request back so any retry mechanism can resubmit it unchanged.

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::encode::EncodeError;
use crate::store::RemotePath;

use super::DeliveryRequest;

/// The local file cannot be delivered as given.
#[derive(Debug, thiserror::Error)]
pub enum PreconditionError {
    /// Missing or unreadable.
    #[error("{path} does not exist or is unreadable: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Exists but is a directory or special file.
    #[error("{path} is not a regular file")]
    NotAFile { path: PathBuf },
    /// No file name, or one that cannot name a remote object.
    #[error("{path} has no usable file name")]
    InvalidFileName { path: PathBuf },
}

/// Why a delivery attempt failed. Every variant is safe to retry.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryCause {
    /// Writing the staging object failed.
    #[error(transparent)]
    Encode(#[from] EncodeError),
    /// The backend declined to rename the staging object into place.
    #[error("can't rename {staging} to {target}")]
    PublishRefused {
        staging: RemotePath,
        target: RemotePath,
    },
    /// A backend call failed outright.
    #[error("{op} {path}: {source}")]
    Store {
        op: &'static str,
        path: RemotePath,
        #[source]
        source: io::Error,
    },
}

/// A failed delivery, carrying the payload to resubmit.
pub struct DeliveryFailure<P> {
    payload: P,
    cause: DeliveryCause,
}

impl<P> DeliveryFailure<P> {
    pub fn new(payload: P, cause: DeliveryCause) -> Self {
        Self { payload, cause }
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn cause(&self) -> &DeliveryCause {
        &self.cause
    }

    /// Take the payload back for a retry.
    pub fn into_payload(self) -> P {
        self.payload
    }

    pub fn into_parts(self) -> (P, DeliveryCause) {
        (self.payload, self.cause)
    }
}

impl<P: fmt::Debug> fmt::Debug for DeliveryFailure<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryFailure")
            .field("payload", &self.payload)
            .field("cause", &self.cause)
            .finish()
    }
}

impl<P: fmt::Debug> fmt::Display for DeliveryFailure<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "delivery of {:?} failed: {}", self.payload, self.cause)
    }
}

impl<P: fmt::Debug> std::error::Error for DeliveryFailure<P> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

/// Error returned by `Destination::deliver`.
#[derive(Debug, thiserror::Error)]
pub enum DeliverError {
    /// Rejected before any remote call; do not retry as-is.
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
    /// Remote delivery failed; resubmit the carried request.
    #[error(transparent)]
    Failed(#[from] DeliveryFailure<DeliveryRequest>),
}

impl DeliverError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// The request to resubmit, for retryable failures.
    pub fn into_request(self) -> Option<DeliveryRequest> {
        match self {
            Self::Failed(failure) => Some(failure.into_payload()),
            Self::Precondition(_) => None,
        }
    }
}
