//! Store contracts for the two reference managers
//!
//! The synchronizer only sees these traits. The desktop library is a record
//! store addressed by numeric reference id; the remote library is a
//! versioned item store addressed by string key.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::translator::Record;

/// A write that the remote store rejected. Collected for the final report
/// instead of aborting the batch.
#[derive(Debug, Clone)]
pub struct FailedWrite {
    pub message: String,
    pub code: Option<i64>,
    pub payload: String,
}

/// A successfully written item
#[derive(Debug, Clone)]
pub struct SavedItem {
    /// Index of the item within the submitted batch
    pub index: usize,
    /// Remote key assigned to (or confirmed for) the item
    pub key: String,
}

/// Result of a batched remote write
#[derive(Debug, Clone, Default)]
pub struct WriteOutcome {
    pub saved: Vec<SavedItem>,
    pub failed: Vec<FailedWrite>,
    /// Library version after the write
    pub library_version: i64,
}

/// One page of remote items
#[derive(Debug, Clone, Default)]
pub struct ItemPage {
    pub records: Vec<Record>,
    /// Library version the page was served at
    pub library_version: i64,
    /// Total number of matching items across all pages
    pub total: usize,
}

/// The desktop reference manager, driven over its scripting interface
#[async_trait]
pub trait LocalStore {
    /// Unique ids of the references in a group ("All" for the whole library)
    async fn group_reference_ids(&self, group: &str) -> Result<Vec<i64>>;

    /// Read the given fields of the given references
    async fn read_references(&self, ids: &[i64], fields: &[&str]) -> Result<Vec<Record>>;

    /// Create new references
    async fn add_references(&self, records: &[Record]) -> Result<()>;

    /// Update references matched by their `uniqueID` field
    async fn update_references(&self, records: &[Record]) -> Result<()>;

    /// Last-modification dates, in the order of the given ids
    async fn modification_dates(&self, ids: &[i64]) -> Result<Vec<DateTime<Utc>>>;
}

/// The remote reference-management web service
#[async_trait]
pub trait RemoteStore {
    /// Current library version
    async fn library_version(&self) -> Result<i64>;

    /// Page of items changed since the given library version
    async fn items_since(&self, version: i64, start: usize, limit: usize) -> Result<ItemPage>;

    /// Write a batch of items, creating or updating depending on whether an
    /// item carries a key. Per-item failures are reported in the outcome,
    /// not as an error.
    async fn write_items(&self, records: &[Record]) -> Result<WriteOutcome>;

    /// Create a child item (note or attachment) under an existing parent.
    /// Callers must not invoke this before the parent's key is known.
    async fn create_child(&self, parent_key: &str, record: Record) -> Result<String>;
}
