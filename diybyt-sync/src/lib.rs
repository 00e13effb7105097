//! # diybyt-sync
//!
//! Change detection and transfer of the authored program directory.
//!
//! [`SyncClient::check_and_sync`] fingerprints the directory and uploads a zip
//! snapshot only when the content differs from the last snapshot the render
//! host confirmed. [`service::run`] drives it from filesystem notifications
//! (through a [`ChangeDebouncer`]) and a fixed poll interval.

pub mod archive;
pub mod client;
pub mod debounce;
pub mod error;
pub mod fingerprint;
pub mod protocol;
pub mod service;

pub use client::{HttpTransport, SyncClient, SyncOutcome, Transport};
pub use debounce::{ChangeDebouncer, DebounceState};
pub use error::SyncError;
pub use fingerprint::{DirectoryFingerprint, SnapshotHash, TrackedFile};
pub use protocol::{UpdateResponse, UpdateStatus};
