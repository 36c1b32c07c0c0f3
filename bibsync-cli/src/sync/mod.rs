//! Synchronization between the desktop and remote libraries

mod session;
mod stores;
mod syncdata;

pub use session::{MODIFICATION_SLACK_MS, SyncOptions, SyncReport, Synchronizer};
pub use stores::{FailedWrite, ItemPage, LocalStore, RemoteStore, SavedItem, WriteOutcome};
pub use syncdata::{MARKER_KEY, MARKER_VALUE, SyncDataField, SyncEntry};
