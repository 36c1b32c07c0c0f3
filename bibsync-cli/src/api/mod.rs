//! Clients for the two reference-manager interfaces

pub mod local;
pub mod remote;

pub use local::BookendsClient;
pub use remote::{WRITE_BATCH_SIZE, ZoteroClient};
