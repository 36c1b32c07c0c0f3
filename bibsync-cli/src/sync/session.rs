//! Synchronization session between the desktop and remote libraries
//!
//! The synchronizer calls the translator twice per record (local dialect to
//! pivot, pivot to the other dialect), decides what changed using the
//! sync-data field, and drives the two stores. All session state lives on
//! the [`Synchronizer`] instance.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;

use crate::schema::{bookends, zotero};
use crate::translator::{self, EXTRA_FIELD, Record, Value};

use super::stores::{FailedWrite, LocalStore, RemoteStore};
use super::syncdata::{SyncDataField, SyncEntry};

/// The sync timestamp is written back to the desktop store asynchronously,
/// so a reference modified within this window of its recorded sync time
/// still counts as unmodified.
pub const MODIFICATION_SLACK_MS: i64 = 100_000;

/// Page size when downloading remote items
const PAGE_LIMIT: usize = 100;

/// Session options
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Identifies the sync target inside the sync-data field, e.g.
    /// "zotero:groups:4711"
    pub sync_id: String,
    /// Desktop group to synchronize
    pub group: String,
    /// Desktop field holding the sync data
    pub sync_data_field: String,
    /// Where attachment files live on disk
    pub attachment_path: Option<PathBuf>,
    /// Discard recorded sync state and treat everything as new
    pub reset_sync_data: bool,
    /// Items per remote write request
    pub batch_size: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions {
            sync_id: "zotero".to_string(),
            group: "All".to_string(),
            sync_data_field: "user15".to_string(),
            attachment_path: None,
            reset_sync_data: false,
            batch_size: 50,
        }
    }
}

/// Counters and problem lists accumulated over a session
#[derive(Debug, Default)]
pub struct SyncReport {
    pub remote_created: usize,
    pub remote_updated: usize,
    pub local_created: usize,
    pub local_updated: usize,
    pub unmodified: usize,
    pub missing_attachments: Vec<String>,
    pub failed: Vec<FailedWrite>,
}

/// A synchronization session over a pair of stores
pub struct Synchronizer<'a, L, R> {
    local: &'a L,
    remote: &'a R,
    options: SyncOptions,
    /// Parsed sync-data field per desktop reference id
    sync_data: HashMap<i64, SyncDataField>,
    /// Recorded sync entry per desktop reference id
    entries: HashMap<i64, SyncEntry>,
    /// Remote key to desktop reference id
    key_to_local_id: HashMap<String, i64>,
    /// References changed since their last sync
    modified_ids: Vec<i64>,
    /// Highest remote version recorded across all references
    remote_version_floor: i64,
    report: SyncReport,
}

impl<'a, L: LocalStore, R: RemoteStore> Synchronizer<'a, L, R> {
    pub fn new(local: &'a L, remote: &'a R, options: SyncOptions) -> Self {
        Synchronizer {
            local,
            remote,
            options,
            sync_data: HashMap::new(),
            entries: HashMap::new(),
            key_to_local_id: HashMap::new(),
            modified_ids: Vec::new(),
            remote_version_floor: 0,
            report: SyncReport::default(),
        }
    }

    /// The accumulated session report
    pub fn report(&self) -> &SyncReport {
        &self.report
    }

    /// Read sync state from the desktop library and classify each reference
    /// as modified or unmodified
    pub async fn prepare(&mut self) -> Result<()> {
        let ids = self
            .local
            .group_reference_ids(&self.options.group)
            .await
            .with_context(|| format!("failed to list group '{}'", self.options.group))?;
        if ids.is_empty() {
            log::info!("group '{}' contains no references", self.options.group);
            return Ok(());
        }

        let dates = self.local.modification_dates(&ids).await?;
        let fields = ["uniqueID", self.options.sync_data_field.as_str()];
        let records = self.local.read_references(&ids, &fields).await?;

        for (index, record) in records.iter().enumerate() {
            let Some(id) = record.get_int("uniqueID") else {
                continue;
            };
            let data =
                SyncDataField::parse(record.get_str(&self.options.sync_data_field).unwrap_or(""));
            let entry = if self.options.reset_sync_data {
                None
            } else {
                data.entry(&self.options.sync_id)
            };
            self.sync_data.insert(id, data);

            if let Some(entry) = entry {
                if entry.version > self.remote_version_floor {
                    self.remote_version_floor = entry.version;
                }
                self.key_to_local_id.insert(entry.key.clone(), id);

                let modified_ms = dates
                    .get(index)
                    .map(|date| date.timestamp_millis())
                    .unwrap_or(0);
                let unmodified = modified_ms - entry.synced_at_ms < MODIFICATION_SLACK_MS;
                self.entries.insert(id, entry);
                if unmodified {
                    self.report.unmodified += 1;
                    continue;
                }
            }
            self.modified_ids.push(id);
        }

        log::debug!(
            "prepared sync: {} modified, {} unmodified, remote version floor {}",
            self.modified_ids.len(),
            self.report.unmodified,
            self.remote_version_floor
        );
        Ok(())
    }

    /// Push modified desktop references to the remote library
    pub async fn sync_to_remote(&mut self) -> Result<()> {
        if self.modified_ids.is_empty() {
            log::info!("remote library is up to date");
            return Ok(());
        }

        let ids = std::mem::take(&mut self.modified_ids);
        let records = self.local.read_references(&ids, &bookends::FIELDS).await?;

        let mut batch: Vec<(i64, Record)> = Vec::new();
        for record in &records {
            let local_id = record.get_int("uniqueID").unwrap_or(0);

            let pivot = translator::to_global(bookends::dictionary(), record)?;
            let mut item = translator::to_local(zotero::dictionary(), &pivot)?;
            ensure_creators(&mut item);

            if let Some(entry) = self.entries.get(&local_id) {
                item.set("key", Value::from(entry.key.clone()));
                item.set("version", Value::Int(entry.version));
            }

            batch.push((local_id, item));
            if batch.len() >= self.options.batch_size {
                self.flush_batch(&mut batch).await?;
            }
        }
        self.flush_batch(&mut batch).await?;
        Ok(())
    }

    /// Send one batch of items, then write the resulting sync data back to
    /// the desktop store
    async fn flush_batch(&mut self, batch: &mut Vec<(i64, Record)>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let pending = std::mem::take(batch);

        // notes and attachments become child items; they must wait for the
        // parent's key and are stripped from the parent payload
        let payload: Vec<Record> = pending
            .iter()
            .map(|(_, item)| {
                let mut stripped = item.clone();
                stripped.remove("notes");
                stripped.remove("attachments");
                stripped
            })
            .collect();

        let outcome = self
            .remote
            .write_items(&payload)
            .await
            .context("failed to write items to the remote library")?;
        self.report.failed.extend(outcome.failed);

        let now_ms = Utc::now().timestamp_millis();
        let mut sync_updates = Vec::new();

        for saved in outcome.saved {
            let Some((local_id, item)) = pending.get(saved.index) else {
                continue;
            };
            if item.contains("key") {
                self.report.remote_updated += 1;
            } else {
                self.report.remote_created += 1;
                // the parent key is known now, so children may follow
                self.push_children(&saved.key, item).await;
            }

            let entry = SyncEntry {
                synced_at_ms: now_ms,
                version: outcome.library_version,
                key: saved.key.clone(),
            };
            let data = self.sync_data.entry(*local_id).or_default();
            data.set_entry(&self.options.sync_id, &entry);

            let mut update = Record::new();
            update.set("uniqueID", Value::Int(*local_id));
            update.set(
                self.options.sync_data_field.clone(),
                Value::from(data.encode()),
            );
            sync_updates.push(update);

            self.key_to_local_id.insert(saved.key, *local_id);
            self.entries.insert(*local_id, entry);
        }

        if !sync_updates.is_empty() {
            self.local
                .update_references(&sync_updates)
                .await
                .context("failed to write sync data to the desktop library")?;
        }
        Ok(())
    }

    /// Create note and attachment children for a newly created item
    async fn push_children(&mut self, parent_key: &str, item: &Record) {
        if let Some(text) = item.get_str("notes") {
            if !text.is_empty() {
                let mut note = Record::new();
                note.set("itemType", Value::from("note"));
                note.set("parentItem", Value::from(parent_key));
                note.set("note", Value::from(text));
                if let Err(err) = self.remote.create_child(parent_key, note).await {
                    self.report.failed.push(FailedWrite {
                        message: err.to_string(),
                        code: None,
                        payload: format!("note for {}", parent_key),
                    });
                }
            }
        }

        let Some(attachments) = item.get_str("attachments") else {
            return;
        };
        for filename in attachments.split(';').map(str::trim).filter(|f| !f.is_empty()) {
            let path = self
                .options
                .attachment_path
                .as_ref()
                .map(|base| base.join(filename));
            let Some(path) = path.filter(|p| p.exists()) else {
                self.report.missing_attachments.push(filename.to_string());
                continue;
            };

            let mut attachment = Record::new();
            attachment.set("itemType", Value::from("attachment"));
            attachment.set("linkMode", Value::from("imported_file"));
            attachment.set("parentItem", Value::from(parent_key));
            attachment.set("title", Value::from(filename));
            attachment.set("filename", Value::from(path.to_string_lossy().as_ref()));
            if let Err(err) = self.remote.create_child(parent_key, attachment).await {
                self.report.failed.push(FailedWrite {
                    message: err.to_string(),
                    code: None,
                    payload: format!("attachment '{}' for {}", filename, parent_key),
                });
            }
        }
    }

    /// Pull remote items changed since the recorded version into the desktop
    /// library
    pub async fn sync_to_local(&mut self) -> Result<()> {
        let since = self.remote_version_floor;
        let mut start = 0;

        loop {
            let page = self
                .remote
                .items_since(since, start, PAGE_LIMIT)
                .await
                .context("failed to download remote items")?;
            if page.records.is_empty() {
                if start == 0 {
                    log::info!("desktop library is up to date");
                }
                return Ok(());
            }

            let sync_timestamp = Utc::now().timestamp_millis();
            for item in &page.records {
                // notes and attachments are children of items handled above
                if matches!(item.get_str("itemType"), Some("note") | Some("attachment")) {
                    continue;
                }

                let pivot = translator::to_global(zotero::dictionary(), item)?;
                let mut reference = translator::to_local(bookends::dictionary(), &pivot)?;

                let key = item.get_str("key").unwrap_or("");
                let local_id = self.key_to_local_id.get(key).copied().or_else(|| {
                    // fall back to the desktop id archived in the pivot extra
                    let extra = pivot.get_str(EXTRA_FIELD)?;
                    translator::unpack(extra)
                        .get_str(bookends::UNIQUE_ID_KEY)?
                        .parse()
                        .ok()
                });

                let entry = SyncEntry {
                    synced_at_ms: sync_timestamp,
                    version: page.library_version,
                    key: key.to_string(),
                };

                match local_id {
                    Some(id) => {
                        let data = self.sync_data.entry(id).or_default();
                        data.set_entry(&self.options.sync_id, &entry);
                        reference.set("uniqueID", Value::Int(id));
                        reference.set(
                            self.options.sync_data_field.clone(),
                            Value::from(data.encode()),
                        );
                        self.local.update_references(&[reference.clone()]).await?;
                        self.report.local_updated += 1;
                    }
                    None => {
                        let mut data = SyncDataField::new();
                        data.set_entry(&self.options.sync_id, &entry);
                        reference.set(
                            self.options.sync_data_field.clone(),
                            Value::from(data.encode()),
                        );
                        self.local.add_references(&[reference.clone()]).await?;
                        self.report.local_created += 1;
                    }
                }
            }

            start += page.records.len();
            if start >= page.total {
                return Ok(());
            }
        }
    }
}

/// The remote service rejects items without creators
fn ensure_creators(item: &mut Record) {
    let missing = match item.get("creators") {
        None => true,
        Some(Value::List(creators)) => creators.is_empty(),
        _ => false,
    };
    if missing {
        let mut anonymous = Record::new();
        anonymous.set("name", Value::from("Anonymous"));
        anonymous.set("creatorType", Value::from("author"));
        item.set("creators", Value::List(vec![Value::Table(anonymous)]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::stores::{ItemPage, SavedItem, WriteOutcome};
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone};
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockLocal {
        references: Vec<Record>,
        dates: Vec<DateTime<Utc>>,
        updates: Mutex<Vec<Record>>,
        added: Mutex<Vec<Record>>,
    }

    #[async_trait]
    impl LocalStore for MockLocal {
        async fn group_reference_ids(&self, _group: &str) -> Result<Vec<i64>> {
            Ok(self
                .references
                .iter()
                .filter_map(|r| r.get_int("uniqueID"))
                .collect())
        }

        async fn read_references(&self, ids: &[i64], fields: &[&str]) -> Result<Vec<Record>> {
            let mut result = Vec::new();
            for id in ids {
                let Some(reference) = self
                    .references
                    .iter()
                    .find(|r| r.get_int("uniqueID") == Some(*id))
                else {
                    continue;
                };
                let mut projected = Record::new();
                for field in fields {
                    if let Some(value) = reference.get(field) {
                        projected.set(*field, value.clone());
                    }
                }
                result.push(projected);
            }
            Ok(result)
        }

        async fn add_references(&self, records: &[Record]) -> Result<()> {
            self.added.lock().unwrap().extend(records.iter().cloned());
            Ok(())
        }

        async fn update_references(&self, records: &[Record]) -> Result<()> {
            self.updates.lock().unwrap().extend(records.iter().cloned());
            Ok(())
        }

        async fn modification_dates(&self, _ids: &[i64]) -> Result<Vec<DateTime<Utc>>> {
            Ok(self.dates.clone())
        }
    }

    #[derive(Default)]
    struct MockRemote {
        items: Vec<Record>,
        version: i64,
        writes: Mutex<Vec<Vec<Record>>>,
        children: Mutex<Vec<(String, Record)>>,
    }

    #[async_trait]
    impl RemoteStore for MockRemote {
        async fn library_version(&self) -> Result<i64> {
            Ok(self.version)
        }

        async fn items_since(&self, _version: i64, start: usize, _limit: usize) -> Result<ItemPage> {
            if start >= self.items.len() {
                return Ok(ItemPage::default());
            }
            Ok(ItemPage {
                records: self.items.clone(),
                library_version: self.version,
                total: self.items.len(),
            })
        }

        async fn write_items(&self, records: &[Record]) -> Result<WriteOutcome> {
            self.writes.lock().unwrap().push(records.to_vec());
            let saved = records
                .iter()
                .enumerate()
                .map(|(index, record)| SavedItem {
                    index,
                    key: record
                        .get_str("key")
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("NEW{:04}", index)),
                })
                .collect();
            Ok(WriteOutcome {
                saved,
                failed: Vec::new(),
                library_version: self.version + 1,
            })
        }

        async fn create_child(&self, parent_key: &str, record: Record) -> Result<String> {
            self.children
                .lock()
                .unwrap()
                .push((parent_key.to_string(), record));
            Ok("CHILD001".to_string())
        }
    }

    fn reference(id: i64, sync_field: Option<&str>) -> Record {
        let mut record = Record::new();
        record.set("uniqueID", Value::Int(id));
        record.set("type", Value::from("Journal article"));
        record.set("authors", Value::from("Doe, Jane"));
        record.set("title", Value::from(format!("Reference {}", id)));
        if let Some(text) = sync_field {
            record.set("user15", Value::from(text));
        }
        record
    }

    fn sync_field(sync_id: &str, entry: &SyncEntry) -> String {
        let mut data = SyncDataField::new();
        data.set_entry(sync_id, entry);
        data.encode()
    }

    fn options() -> SyncOptions {
        SyncOptions {
            sync_id: "zotero:groups:4711".to_string(),
            ..SyncOptions::default()
        }
    }

    #[tokio::test]
    async fn test_prepare_classifies_modified_and_unmodified() {
        let base = Utc.with_ymd_and_hms(2019, 3, 1, 10, 0, 0).unwrap();
        let fresh = SyncEntry {
            synced_at_ms: base.timestamp_millis() - 5_000,
            version: 300,
            key: "FRESH001".to_string(),
        };
        let stale = SyncEntry {
            synced_at_ms: base.timestamp_millis() - 600_000,
            version: 290,
            key: "STALE001".to_string(),
        };

        let local = MockLocal {
            references: vec![
                reference(1, Some(&sync_field("zotero:groups:4711", &fresh))),
                reference(2, Some(&sync_field("zotero:groups:4711", &stale))),
                reference(3, None),
            ],
            dates: vec![base, base, base],
            ..MockLocal::default()
        };
        let remote = MockRemote::default();

        let mut session = Synchronizer::new(&local, &remote, options());
        session.prepare().await.unwrap();

        assert_eq!(session.modified_ids, vec![2, 3]);
        assert_eq!(session.report().unmodified, 1);
        // the highest recorded remote version becomes the download floor
        assert_eq!(session.remote_version_floor, 300);
    }

    #[tokio::test]
    async fn test_sync_to_remote_creates_items_and_children() {
        let mut record = reference(7, None);
        record.set("notes", Value::from("read this again"));
        record.set("attachments", Value::from("missing.pdf"));

        let local = MockLocal {
            references: vec![record],
            dates: vec![Utc::now()],
            ..MockLocal::default()
        };
        let remote = MockRemote {
            version: 310,
            ..MockRemote::default()
        };

        let mut session = Synchronizer::new(&local, &remote, options());
        session.prepare().await.unwrap();
        session.sync_to_remote().await.unwrap();

        assert_eq!(session.report().remote_created, 1);
        assert_eq!(session.report().remote_updated, 0);

        // the item payload holds translated fields, not children
        let writes = remote.writes.lock().unwrap();
        let item = &writes[0][0];
        assert_eq!(item.get_str("itemType"), Some("journalArticle"));
        assert!(!item.contains("notes"));
        assert!(!item.contains("attachments"));

        // the note was created after the parent write returned its key
        let children = remote.children.lock().unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].0, "NEW0000");
        assert_eq!(children[0].1.get_str("itemType"), Some("note"));

        // the attachment file does not exist locally
        assert_eq!(session.report().missing_attachments, vec!["missing.pdf"]);

        // sync data was written back to the desktop store
        let updates = local.updates.lock().unwrap();
        assert_eq!(updates[0].get_int("uniqueID"), Some(7));
        let field = updates[0].get_str("user15").unwrap();
        assert!(field.contains("NEW0000"));
        assert!(field.contains("zotero:groups:4711"));
    }

    #[tokio::test]
    async fn test_sync_to_remote_updates_known_items() {
        let entry = SyncEntry {
            synced_at_ms: 0,
            version: 290,
            key: "KNOWN001".to_string(),
        };
        let local = MockLocal {
            references: vec![reference(
                1,
                Some(&sync_field("zotero:groups:4711", &entry)),
            )],
            dates: vec![Utc::now()],
            ..MockLocal::default()
        };
        let remote = MockRemote::default();

        let mut session = Synchronizer::new(&local, &remote, options());
        session.prepare().await.unwrap();
        session.sync_to_remote().await.unwrap();

        assert_eq!(session.report().remote_updated, 1);
        let writes = remote.writes.lock().unwrap();
        assert_eq!(writes[0][0].get_str("key"), Some("KNOWN001"));
        // no children for items that already exist remotely
        assert!(remote.children.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sync_to_local_matches_by_archived_id() {
        let item = Record::from_json(&json!({
            "key": "REMOTE01",
            "itemType": "journalArticle",
            "title": "Changed Remotely",
            "extra": "bookends-uniqueId:7"
        }));
        let note = Record::from_json(&json!({
            "key": "REMOTE02",
            "itemType": "note",
            "note": "skipped"
        }));

        let local = MockLocal::default();
        let remote = MockRemote {
            items: vec![item, note],
            version: 320,
            ..MockRemote::default()
        };

        let mut session = Synchronizer::new(&local, &remote, options());
        session.prepare().await.unwrap();
        session.sync_to_local().await.unwrap();

        assert_eq!(session.report().local_updated, 1);
        assert_eq!(session.report().local_created, 0);

        let updates = local.updates.lock().unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].get_int("uniqueID"), Some(7));
        assert_eq!(updates[0].get_str("title"), Some("Changed Remotely"));
        let field = updates[0].get_str("user15").unwrap();
        assert!(field.contains("REMOTE01"));
    }

    #[tokio::test]
    async fn test_sync_to_local_creates_unknown_items() {
        let item = Record::from_json(&json!({
            "key": "BRANDNEW",
            "itemType": "book",
            "title": "New Remote Book"
        }));

        let local = MockLocal::default();
        let remote = MockRemote {
            items: vec![item],
            version: 320,
            ..MockRemote::default()
        };

        let mut session = Synchronizer::new(&local, &remote, options());
        session.prepare().await.unwrap();
        session.sync_to_local().await.unwrap();

        assert_eq!(session.report().local_created, 1);
        let added = local.added.lock().unwrap();
        assert_eq!(added[0].get_str("title"), Some("New Remote Book"));
        assert_eq!(added[0].get_str("type"), Some("Book"));
        assert!(added[0].get_str("user15").unwrap().contains("BRANDNEW"));
    }
}
