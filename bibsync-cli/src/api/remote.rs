//! Zotero Web API client
//!
//! Versioned item store: writes go out in batches of 50 with a random write
//! token and a conditional `If-Unmodified-Since-Version` header; every
//! response updates the cached library version from `Last-Modified-Version`.
//! Rejected items are collected per batch instead of failing the request.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Mutex;
use uuid::Uuid;

use crate::sync::{FailedWrite, ItemPage, RemoteStore, SavedItem, WriteOutcome};
use crate::translator::{Record, Value};

const API_BASE: &str = "https://api.zotero.org";
const API_VERSION: &str = "3";

/// Items per write request, the API's changeset limit
pub const WRITE_BATCH_SIZE: usize = 50;

/// A library path prefix is "groups/<id>" or "users/<id>"
static PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(groups|users)/[0-9]+$").unwrap());

/// Client for one Zotero library
pub struct ZoteroClient {
    http: reqwest::Client,
    base_url: String,
    prefix: String,
    api_key: String,
    /// Library version from the most recent response
    version: Mutex<i64>,
}

impl ZoteroClient {
    pub fn new(prefix: &str, api_key: &str) -> Result<Self> {
        if !PREFIX_RE.is_match(prefix) {
            bail!(
                "invalid library prefix '{}': expected groups/<group id> or users/<user id>",
                prefix
            );
        }
        Ok(ZoteroClient {
            http: reqwest::Client::new(),
            base_url: API_BASE.to_string(),
            prefix: prefix.to_string(),
            api_key: api_key.to_string(),
            version: Mutex::new(0),
        })
    }

    fn items_url(&self) -> String {
        format!("{}/{}/items", self.base_url, self.prefix)
    }

    /// Random 32-hex-character token making unversioned writes idempotent
    fn write_token() -> String {
        Uuid::new_v4().simple().to_string()
    }

    fn cached_version(&self) -> i64 {
        *self.version.lock().unwrap()
    }

    /// Remember the library version a response was served at
    fn record_version(&self, response: &reqwest::Response) -> i64 {
        let version = response
            .headers()
            .get("Last-Modified-Version")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok())
            .unwrap_or(0);
        if version > 0 {
            *self.version.lock().unwrap() = version;
        }
        version
    }

    async fn write_chunk(&self, chunk: &[Record], offset: usize) -> Result<WriteOutcome> {
        let payload: Vec<serde_json::Value> = chunk.iter().map(serialize_item).collect();
        let version = match self.cached_version() {
            0 => self.library_version().await?,
            cached => cached,
        };

        let response = self
            .http
            .post(self.items_url())
            .header("Zotero-API-Version", API_VERSION)
            .header("Zotero-API-Key", &self.api_key)
            .header("Zotero-Write-Token", Self::write_token())
            .header("If-Unmodified-Since-Version", version)
            .json(&payload)
            .send()
            .await
            .context("item write request failed")?;

        let status = response.status();
        let library_version = self.record_version(&response);
        if !status.is_success() {
            bail!(
                "item write rejected with {}: {}",
                status,
                response.text().await.unwrap_or_default()
            );
        }

        let body: serde_json::Value = response
            .json()
            .await
            .context("item write response is not valid JSON")?;
        let (saved, failed) = parse_write_response(&body, offset);
        Ok(WriteOutcome {
            saved,
            failed,
            library_version,
        })
    }
}

#[async_trait]
impl RemoteStore for ZoteroClient {
    async fn library_version(&self) -> Result<i64> {
        let response = self
            .http
            .get(self.items_url())
            .header("Zotero-API-Version", API_VERSION)
            .header("Zotero-API-Key", &self.api_key)
            .query(&[("limit", "1"), ("format", "keys")])
            .send()
            .await
            .context("library version request failed")?;
        let version = self.record_version(&response);
        Ok(version)
    }

    async fn items_since(&self, version: i64, start: usize, limit: usize) -> Result<ItemPage> {
        let response = self
            .http
            .get(self.items_url())
            .header("Zotero-API-Version", API_VERSION)
            .header("Zotero-API-Key", &self.api_key)
            .query(&[
                ("since", version.to_string()),
                ("start", start.to_string()),
                ("limit", limit.to_string()),
                ("format", "json".to_string()),
            ])
            .send()
            .await
            .context("item download request failed")?;

        let status = response.status();
        let library_version = self.record_version(&response);
        let total = response
            .headers()
            .get("Total-Results")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok())
            .unwrap_or(0);
        if !status.is_success() {
            bail!("item download rejected with {}", status);
        }

        let body: serde_json::Value = response
            .json()
            .await
            .context("item download response is not valid JSON")?;
        let Some(entries) = body.as_array() else {
            bail!("expected a JSON array of items");
        };

        // each entry wraps the item data in a "data" envelope that already
        // carries key and version
        let records = entries
            .iter()
            .map(|entry| Record::from_json(entry.get("data").unwrap_or(entry)))
            .collect();

        Ok(ItemPage {
            records,
            library_version,
            total,
        })
    }

    async fn write_items(&self, records: &[Record]) -> Result<WriteOutcome> {
        let mut outcome = WriteOutcome::default();
        for (chunk_index, chunk) in records.chunks(WRITE_BATCH_SIZE).enumerate() {
            let chunk_outcome = self
                .write_chunk(chunk, chunk_index * WRITE_BATCH_SIZE)
                .await?;
            outcome.saved.extend(chunk_outcome.saved);
            outcome.failed.extend(chunk_outcome.failed);
            outcome.library_version = chunk_outcome.library_version;
        }
        Ok(outcome)
    }

    async fn create_child(&self, parent_key: &str, record: Record) -> Result<String> {
        let outcome = self.write_chunk(std::slice::from_ref(&record), 0).await?;
        if let Some(failure) = outcome.failed.first() {
            bail!(
                "child item for {} rejected: {}",
                parent_key,
                failure.message
            );
        }
        outcome
            .saved
            .into_iter()
            .next()
            .map(|saved| saved.key)
            .with_context(|| format!("no key returned for child item of {}", parent_key))
    }
}

/// Serialize an item for the API, dropping an empty extra bucket
fn serialize_item(record: &Record) -> serde_json::Value {
    let mut item = record.clone();
    if let Some(Value::Table(bucket)) = item.get("extra") {
        if bucket.is_empty() {
            item.remove("extra");
        }
    }
    item.to_json()
}

/// Split a write response into saved items and rejected items. The response
/// maps batch-relative indexes to keys (success) or error descriptions
/// (failed); `offset` rebases them onto the full submission.
fn parse_write_response(
    body: &serde_json::Value,
    offset: usize,
) -> (Vec<SavedItem>, Vec<FailedWrite>) {
    let mut saved = Vec::new();
    let mut failed = Vec::new();

    if let Some(success) = body.get("success").and_then(|v| v.as_object()) {
        for (index, key) in success {
            let (Ok(index), Some(key)) = (index.parse::<usize>(), key.as_str()) else {
                continue;
            };
            saved.push(SavedItem {
                index: offset + index,
                key: key.to_string(),
            });
        }
    }
    // unchanged items are successful writes that produced no new version
    if let Some(unchanged) = body.get("unchanged").and_then(|v| v.as_object()) {
        for (index, key) in unchanged {
            let (Ok(index), Some(key)) = (index.parse::<usize>(), key.as_str()) else {
                continue;
            };
            saved.push(SavedItem {
                index: offset + index,
                key: key.to_string(),
            });
        }
    }
    if let Some(rejected) = body.get("failed").and_then(|v| v.as_object()) {
        for (index, error) in rejected {
            failed.push(FailedWrite {
                message: error
                    .get("message")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown error")
                    .to_string(),
                code: error.get("code").and_then(|v| v.as_i64()),
                payload: format!("item #{}", offset + index.parse::<usize>().unwrap_or(0)),
            });
        }
    }

    saved.sort_by_key(|item| item.index);
    (saved, failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prefix_validation() {
        assert!(ZoteroClient::new("groups/4711", "key").is_ok());
        assert!(ZoteroClient::new("users/1", "key").is_ok());
        assert!(ZoteroClient::new("group/4711", "key").is_err());
        assert!(ZoteroClient::new("groups/abc", "key").is_err());
        assert!(ZoteroClient::new("groups/4711/items", "key").is_err());
    }

    #[test]
    fn test_write_token_is_32_hex_chars() {
        let token = ZoteroClient::write_token();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, ZoteroClient::write_token());
    }

    #[test]
    fn test_parse_write_response_rebases_indexes() {
        let body = json!({
            "success": {"0": "AAAA0001", "2": "CCCC0003"},
            "unchanged": {"1": "BBBB0002"},
            "failed": {"3": {"code": 400, "message": "creator required"}}
        });

        let (saved, failed) = parse_write_response(&body, 50);
        assert_eq!(saved.len(), 3);
        assert_eq!(saved[0].index, 50);
        assert_eq!(saved[0].key, "AAAA0001");
        assert_eq!(saved[1].index, 51);
        assert_eq!(saved[2].index, 52);

        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].code, Some(400));
        assert_eq!(failed[0].message, "creator required");
        assert_eq!(failed[0].payload, "item #53");
    }

    #[test]
    fn test_serialize_item_drops_empty_extra() {
        let mut record = Record::new();
        record.set("title", Value::from("T"));
        record.set("extra", Value::Table(Record::new()));

        let json = serialize_item(&record);
        assert!(json.get("extra").is_none());
        assert_eq!(json.get("title").unwrap(), "T");
    }

    #[test]
    fn test_serialize_item_keeps_packed_extra() {
        let mut record = Record::new();
        record.set("extra", Value::from("bookends-uniqueId:42"));

        let json = serialize_item(&record);
        assert_eq!(json.get("extra").unwrap(), "bookends-uniqueId:42");
    }
}
