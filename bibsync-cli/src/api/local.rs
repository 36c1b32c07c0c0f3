//! Bookends scripting client
//!
//! Drives a running Bookends application over its OSA event interface. Each
//! call builds a four-character event command, executes it through
//! `osascript`, and parses the textual reply (quoted strings, `\r`-separated
//! lists, NUL-separated timestamp lists).

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, LocalResult, TimeZone, Utc};
use tokio::process::Command;

use crate::schema::ReferenceType;
use crate::schema::bookends::FIELDS;
use crate::sync::LocalStore;
use crate::translator::{Record, Value};

/// Error fragments Bookends reports in-band instead of failing the call.
/// TODO: expand as more in-band errors show up in the wild.
const ERROR_MARKERS: [&str; 1] = ["No Bookends library window is open"];

/// Seconds between the Mac scripting epoch (1904) and the Unix epoch
const MAC_EPOCH_OFFSET_SECS: i64 = 2_082_844_800;

/// Client for a running Bookends instance
#[derive(Debug, Default)]
pub struct BookendsClient;

impl BookendsClient {
    pub fn new() -> Self {
        BookendsClient
    }

    /// Bookends version string
    pub async fn version(&self) -> Result<String> {
        let reply = self.run(event_command("VERS", &[])).await?;
        Ok(remove_quotes(&reply).to_string())
    }

    async fn run(&self, command: String) -> Result<String> {
        log::debug!("OSA command: {}", command);
        let output = Command::new("osascript")
            .arg("-e")
            .arg(&command)
            .output()
            .await
            .context("failed to run osascript; is this macOS with Bookends installed?")?;
        if !output.status.success() {
            bail!(
                "osascript failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        let reply = String::from_utf8_lossy(&output.stdout).into_owned();
        if ERROR_MARKERS.iter().any(|marker| reply.contains(marker)) {
            bail!("Bookends error: {}", reply.trim());
        }
        Ok(reply)
    }

    /// Restrict a record to fields Bookends knows, converting the type name
    /// back to its numeric code. The translator emits pivot bookkeeping
    /// (e.g. the extra field) that has no Bookends counterpart.
    fn sanitize(record: &Record) -> Result<Record> {
        let mut sanitized = Record::new();
        for (field, value) in record.iter() {
            if !FIELDS.contains(&field.as_str()) {
                log::debug!("dropping field '{}' unknown to Bookends", field);
                continue;
            }
            if field == "type" {
                if let Some(label) = value.as_str() {
                    let code = ReferenceType::from_label(label)
                        .with_context(|| format!("invalid reference type '{}'", label))?
                        .code();
                    sanitized.set("type", Value::Int(code));
                    continue;
                }
            }
            sanitized.set(field.clone(), value.clone());
        }
        Ok(sanitized)
    }
}

#[async_trait]
impl LocalStore for BookendsClient {
    async fn group_reference_ids(&self, group: &str) -> Result<Vec<i64>> {
        let reply = self.run(event_command("RUID", &[quote(group)])).await?;
        Ok(parse_id_list(&reply))
    }

    async fn read_references(&self, ids: &[i64], fields: &[&str]) -> Result<Vec<Record>> {
        for field in fields {
            if !FIELDS.contains(field) {
                bail!("unknown field '{}'", field);
            }
        }
        let id_list = ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let reply = self
            .run(event_command(
                "RJSN",
                &[
                    quote(&id_list),
                    "given string:".to_string(),
                    quote(&fields.join(",")),
                ],
            ))
            .await?;

        let parsed: serde_json::Value = serde_json::from_str(reply.trim())
            .with_context(|| format!("Bookends returned invalid JSON: {}", reply.trim()))?;
        let Some(items) = parsed.as_array() else {
            bail!("expected a JSON array from Bookends");
        };

        let mut records = Vec::new();
        for item in items {
            let mut record = Record::from_json(item);
            // reference types arrive as numeric codes
            if let Some(code) = record.get_int("type") {
                let label = ReferenceType::from_code(code)
                    .with_context(|| format!("reference with unknown type code {}", code))?
                    .label();
                record.set("type", Value::from(label));
            }
            records.push(record);
        }
        Ok(records)
    }

    async fn add_references(&self, records: &[Record]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut created = Vec::new();
        for record in records {
            // create an empty entry from a minimal RIS stub, then fill it in
            let reply = self
                .run(event_command(
                    "ADDA",
                    &[
                        "\"\"".to_string(),
                        "given «class RIST»:\"TY - JOUR\n\"".to_string(),
                    ],
                ))
                .await?;
            let id: i64 = reply
                .trim()
                .parse()
                .with_context(|| format!("expected a new reference id, got '{}'", reply.trim()))?;
            let mut filled = record.clone();
            filled.set("uniqueID", Value::Int(id));
            created.push(filled);
        }
        self.update_references(&created).await
    }

    async fn update_references(&self, records: &[Record]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let payload: Vec<serde_json::Value> = records
            .iter()
            .map(|record| Self::sanitize(record).map(|r| r.to_json()))
            .collect::<Result<_>>()?;
        // the OSA string layer eats single backslashes
        let json = serde_json::Value::Array(payload)
            .to_string()
            .replace('\\', "\\\\");
        let reply = self.run(event_command("SJSN", &[quote(&json)])).await?;
        if !reply.trim().is_empty() {
            bail!("updating references failed: {}", reply.trim());
        }
        Ok(())
    }

    async fn modification_dates(&self, ids: &[i64]) -> Result<Vec<DateTime<Utc>>> {
        let id_list = ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let reply = self.run(event_command("RMOD", &[quote(&id_list)])).await?;
        let dates: Vec<DateTime<Utc>> = remove_quotes(&reply)
            .split('\u{0}')
            .filter_map(parse_modification_date)
            .collect();
        if dates.len() != ids.len() {
            bail!(
                "expected {} modification dates, got {}; is the database empty?",
                ids.len(),
                dates.len()
            );
        }
        Ok(dates)
    }
}

/// Build the OSA command for an event code and pre-quoted parameters
fn event_command(event_code: &str, parameters: &[String]) -> String {
    format!(
        "tell application \"Bookends\" to «event XXXX{}» {}",
        event_code,
        parameters.join(" ")
    )
}

/// Quote a parameter, escaping embedded double quotes
fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\\\""))
}

/// Strip the quotes OSA puts around string replies
fn remove_quotes(reply: &str) -> &str {
    let trimmed = reply.trim_end_matches(['\n', '\r']);
    trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed)
}

/// Replies listing ids separate them with carriage returns
fn parse_id_list(reply: &str) -> Vec<i64> {
    remove_quotes(reply)
        .split('\r')
        .filter_map(|token| token.trim().parse().ok())
        .collect()
}

/// Bookends reports local-time seconds since the 1904 Mac epoch
fn parse_modification_date(timestamp: &str) -> Option<DateTime<Utc>> {
    let secs = timestamp.trim().parse::<i64>().ok()? - MAC_EPOCH_OFFSET_SECS;
    let naive = DateTime::from_timestamp(secs, 0)?.naive_utc();
    match chrono::Local.from_local_datetime(&naive) {
        LocalResult::Single(local) => Some(local.with_timezone(&Utc)),
        _ => DateTime::from_timestamp(secs, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_command_format() {
        let cmd = event_command("RUID", &[quote("All")]);
        assert_eq!(
            cmd,
            "tell application \"Bookends\" to «event XXXXRUID» \"All\""
        );
    }

    #[test]
    fn test_quote_escapes_double_quotes() {
        assert_eq!(quote("title REGEX \"x\""), "\"title REGEX \\\"x\\\"\"");
    }

    #[test]
    fn test_remove_quotes() {
        assert_eq!(remove_quotes("\"hello\"\n"), "hello");
        assert_eq!(remove_quotes("bare\n"), "bare");
    }

    #[test]
    fn test_parse_id_list() {
        assert_eq!(parse_id_list("\"123\r456\r789\"\n"), vec![123, 456, 789]);
        assert_eq!(parse_id_list("\"\"\n"), Vec::<i64>::new());
    }

    #[test]
    fn test_parse_modification_date() {
        // 2_082_844_800 seconds is the Unix epoch in Mac scripting time
        let date = parse_modification_date("2082844800").unwrap();
        // the value is interpreted in local time, so allow a day of skew
        assert!(date.timestamp().abs() < 86_400);
        assert_eq!(parse_modification_date("not a number"), None);
    }

    #[test]
    fn test_sanitize_converts_type_and_drops_unknown_fields() {
        let mut record = Record::new();
        record.set("uniqueID", Value::Int(7));
        record.set("type", Value::from("Journal article"));
        record.set("extra", Value::from("zotero-key:ABCD1234"));

        let sanitized = BookendsClient::sanitize(&record).unwrap();
        assert_eq!(sanitized.get_int("type"), Some(9));
        assert!(!sanitized.contains("extra"));
        assert_eq!(sanitized.get_int("uniqueID"), Some(7));
    }

    #[test]
    fn test_sanitize_rejects_unknown_type() {
        let mut record = Record::new();
        record.set("type", Value::from("Hologram"));
        assert!(BookendsClient::sanitize(&record).is_err());
    }
}
