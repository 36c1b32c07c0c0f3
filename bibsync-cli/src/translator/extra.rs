//! Codec for the pivot format's catch-all "extra" field
//!
//! Fields without a structural home in the pivot vocabulary are collected in
//! a sub-record and stored on the wire as newline-delimited `key:value` lines
//! (HTTP-header style), which both reference managers can keep in a free-text
//! field.

use super::{Record, Value};

/// Serialize an extra bucket to its line-oriented string form, in insertion
/// order. Keys and values are written verbatim: a `:` or newline inside a
/// value is not escaped and will not survive a round trip.
pub fn pack(bucket: &Record) -> String {
    bucket
        .iter()
        .map(|(key, value)| format!("{}:{}", key, value))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse the line-oriented string form back into a bucket. Each line is split
/// on the first `:`; a line without a colon yields the whole line as a key
/// with a null value.
pub fn unpack(text: &str) -> Record {
    let mut bucket = Record::new();
    for line in text.split('\n') {
        match line.split_once(':') {
            Some((key, value)) => bucket.set(key, Value::from(value)),
            None => bucket.set(line, Value::Null),
        }
    }
    bucket
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(entries: &[(&str, &str)]) -> Record {
        let mut record = Record::new();
        for (key, value) in entries {
            record.set(*key, Value::from(*value));
        }
        record
    }

    #[test]
    fn test_pack_insertion_order() {
        let packed = pack(&bucket(&[("b", "2"), ("a", "1")]));
        assert_eq!(packed, "b:2\na:1");
    }

    #[test]
    fn test_round_trip() {
        let original = bucket(&[("a", "1"), ("b", "2")]);
        assert_eq!(unpack(&pack(&original)), original);
    }

    #[test]
    fn test_unpack_splits_on_first_colon_only() {
        let unpacked = unpack("doi:10.1000/182");
        assert_eq!(unpacked.get_str("doi"), Some("10.1000/182"));
    }

    #[test]
    fn test_unpack_line_without_colon_yields_null_value() {
        let unpacked = unpack("orphaned line");
        assert_eq!(unpacked.get("orphaned line"), Some(&Value::Null));
    }

    #[test]
    fn test_newline_in_value_is_lossy() {
        // Known limitation: no escaping, so a newline inside a value splits
        // into a bogus extra line on the way back.
        let original = bucket(&[("note", "line one\nline two")]);
        let reparsed = unpack(&pack(&original));
        assert_eq!(reparsed.get_str("note"), Some("line one"));
        assert!(reparsed.contains("line two"));
    }
}
