//! Filebus: crash-safe delivery of local files into a remote storage
//! namespace.
//!
//! A delivery writes the file's encoded bytes to a staging object
//! (`<dir>/<name>.tmp`), atomically renames it to `<dir>/<name>`, and only
//! then removes the local file. Readers of the destination directory never
//! observe a partially written final object.
//!
//! The crate provides:
//! - Storage backends behind one trait (`store`)
//! - Raw and record-container encoders (`encode`, `container`, `codec`)
//! - The delivery coordinator (`delivery`) and its configuration (`config`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use filebus::config::{DestinationConfig, EncodingKind};
//! use filebus::delivery::DeliveryRequest;
//! use filebus::store::LocalFsStore;
//!
//! let store = Arc::new(LocalFsStore::new("/srv/bus").unwrap());
//! let dest = DestinationConfig {
//!     encoding: EncodingKind::Records,
//!     ..DestinationConfig::new("/incoming")
//! }
//! .build(store)
//! .unwrap();
//!
//! let delivery = dest.deliver(DeliveryRequest::new("/var/spool/app.log")).unwrap();
//! println!("published {}", delivery.target);
//! ```

pub mod codec;
pub mod config;
pub mod container;
pub mod delivery;
pub mod encode;
pub mod store;

#[cfg(feature = "cli")]
pub mod cli;

pub use config::DestinationConfig;
pub use delivery::{DeliverError, Delivery, DeliveryRequest, Destination};
pub use encode::Encoder;
pub use store::{RemotePath, RemoteStore};
