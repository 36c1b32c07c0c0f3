//! Codec for the synchronization-data field
//!
//! The desktop store has no metadata storage of its own, so per-target sync
//! state is kept inside a reserved user field of each reference: a JSON
//! object mapping sync id to a `timestamp,version,key` triple. The scripting
//! transport cannot carry double quotes, so the field is stored with single
//! quotes and swapped on the way in and out.

use indexmap::IndexMap;

/// Marker entry warning users away from hand-editing the field
pub const MARKER_KEY: &str = "Synchronization data";
pub const MARKER_VALUE: &str = "DO NOT MODIFY THIS FIELD!";

/// Sync state of one reference against one sync target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEntry {
    /// When the reference was last synchronized (Unix milliseconds)
    pub synced_at_ms: i64,
    /// Remote library version at that time
    pub version: i64,
    /// Remote item key
    pub key: String,
}

impl SyncEntry {
    /// Parse a `timestamp,version,key` triple. Missing or malformed numeric
    /// parts degrade to zero rather than failing.
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.splitn(3, ',');
        let synced_at_ms = parts.next()?.parse().unwrap_or(0);
        let version = parts.next().and_then(|v| v.parse().ok()).unwrap_or(0);
        let key = parts.next().unwrap_or("").to_string();
        Some(SyncEntry {
            synced_at_ms,
            version,
            key,
        })
    }
}

impl std::fmt::Display for SyncEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{},{}", self.synced_at_ms, self.version, self.key)
    }
}

/// The whole synchronization-data field: one entry per sync target, plus the
/// marker entry
#[derive(Debug, Clone, PartialEq)]
pub struct SyncDataField {
    entries: IndexMap<String, String>,
}

impl SyncDataField {
    /// A freshly initialized field containing only the marker
    pub fn new() -> Self {
        let mut entries = IndexMap::new();
        entries.insert(MARKER_KEY.to_string(), MARKER_VALUE.to_string());
        SyncDataField { entries }
    }

    /// Parse the field's stored text. Empty or invalid content yields a
    /// freshly initialized field.
    pub fn parse(text: &str) -> Self {
        if text.is_empty() {
            return SyncDataField::new();
        }
        let json_text = text.replace('\'', "\"");
        match serde_json::from_str::<serde_json::Value>(&json_text) {
            Ok(serde_json::Value::Object(object)) => {
                let entries = object
                    .into_iter()
                    .filter_map(|(key, value)| match value {
                        serde_json::Value::String(s) => Some((key, s)),
                        _ => None,
                    })
                    .collect();
                SyncDataField { entries }
            }
            _ => SyncDataField::new(),
        }
    }

    /// The sync entry recorded for the given target, if any
    pub fn entry(&self, sync_id: &str) -> Option<SyncEntry> {
        self.entries.get(sync_id).and_then(|text| SyncEntry::parse(text))
    }

    /// Record the sync entry for the given target
    pub fn set_entry(&mut self, sync_id: &str, entry: &SyncEntry) {
        self.entries.insert(sync_id.to_string(), entry.to_string());
    }

    /// Encode for storage, single-quoted
    pub fn encode(&self) -> String {
        let object: serde_json::Map<String, serde_json::Value> = self
            .entries
            .iter()
            .map(|(key, value)| (key.clone(), serde_json::Value::String(value.clone())))
            .collect();
        serde_json::Value::Object(object)
            .to_string()
            .replace('"', "'")
    }
}

impl Default for SyncDataField {
    fn default() -> Self {
        SyncDataField::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_round_trip() {
        let mut field = SyncDataField::new();
        let entry = SyncEntry {
            synced_at_ms: 1551434400000,
            version: 310,
            key: "ABCD1234".to_string(),
        };
        field.set_entry("zotero:groups:4711", &entry);

        let reparsed = SyncDataField::parse(&field.encode());
        assert_eq!(reparsed.entry("zotero:groups:4711"), Some(entry));
    }

    #[test]
    fn test_encode_uses_single_quotes() {
        let field = SyncDataField::new();
        let encoded = field.encode();
        assert!(encoded.contains('\''));
        assert!(!encoded.contains('"'));
        assert!(encoded.contains(MARKER_VALUE));
    }

    #[test]
    fn test_parse_invalid_content_reinitializes() {
        let field = SyncDataField::parse("not json at all");
        assert_eq!(field, SyncDataField::new());

        let field = SyncDataField::parse("");
        assert_eq!(field, SyncDataField::new());
    }

    #[test]
    fn test_parse_preserves_other_targets() {
        let mut field = SyncDataField::new();
        field.set_entry(
            "zotero:groups:1",
            &SyncEntry {
                synced_at_ms: 1,
                version: 1,
                key: "AAAA0001".to_string(),
            },
        );
        field.set_entry(
            "zotero:groups:2",
            &SyncEntry {
                synced_at_ms: 2,
                version: 2,
                key: "BBBB0002".to_string(),
            },
        );

        let reparsed = SyncDataField::parse(&field.encode());
        assert!(reparsed.entry("zotero:groups:1").is_some());
        assert!(reparsed.entry("zotero:groups:2").is_some());
    }

    #[test]
    fn test_sync_entry_degrades_on_malformed_parts() {
        let entry = SyncEntry::parse("garbage,also-garbage,KEY99").unwrap();
        assert_eq!(entry.synced_at_ms, 0);
        assert_eq!(entry.version, 0);
        assert_eq!(entry.key, "KEY99");
    }

    #[test]
    fn test_sync_entry_key_may_contain_commas_not() {
        // the key is the third part onward; a well-formed key never contains
        // a comma, so splitn keeps this unambiguous
        let entry = SyncEntry::parse("10,20,KEY").unwrap();
        assert_eq!(entry.to_string(), "10,20,KEY");
    }
}
