//! Append policy for merging translated content into a target field

use super::{Record, Value};

/// Separator used when concatenating string fields
pub const SEPARATOR: &str = "; ";

/// Merge `content` into `record[field]` without clobbering data that an
/// earlier source field already contributed.
///
/// - absent or empty-string field: set it to `content` directly
/// - existing list: concatenate a list, push anything else
/// - existing string: concatenate with `separator`
///
/// Null and empty-string content is ignored; merging nothing is a no-op.
/// Any other existing shape is a dictionary authoring error and the merge
/// is discarded with a warning.
pub fn append(record: &mut Record, field: &str, content: Value, separator: &str) {
    if content.is_empty_content() {
        return;
    }
    match record.get(field) {
        None => {
            record.set(field, content);
        }
        Some(Value::String(existing)) if existing.is_empty() => {
            record.set(field, content);
        }
        Some(Value::List(existing)) => {
            let mut items = existing.clone();
            match content {
                Value::List(more) => items.extend(more),
                other => items.push(other),
            }
            record.set(field, Value::List(items));
        }
        Some(Value::String(existing)) => {
            let merged = format!("{}{}{}", existing, separator, content);
            record.set(field, Value::String(merged));
        }
        Some(other) => {
            log::warn!(
                "cannot merge into field '{}' holding {:?}; content discarded",
                field,
                other
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_sets_absent_field() {
        let mut record = Record::new();
        append(&mut record, "keywords", Value::from("syntax"), SEPARATOR);
        assert_eq!(record.get_str("keywords"), Some("syntax"));
    }

    #[test]
    fn test_append_replaces_empty_string() {
        let mut record = Record::new();
        record.set("keywords", Value::from(""));
        append(&mut record, "keywords", Value::from("syntax"), SEPARATOR);
        assert_eq!(record.get_str("keywords"), Some("syntax"));
    }

    #[test]
    fn test_append_concatenates_strings() {
        let mut record = Record::new();
        append(&mut record, "keywords", Value::from("value1"), SEPARATOR);
        append(&mut record, "keywords", Value::from("value2"), SEPARATOR);
        assert_eq!(record.get_str("keywords"), Some("value1; value2"));
    }

    #[test]
    fn test_append_concatenates_lists_preserving_order() {
        let mut record = Record::new();
        append(
            &mut record,
            "creators",
            Value::List(vec![Value::from("a"), Value::from("b")]),
            SEPARATOR,
        );
        append(
            &mut record,
            "creators",
            Value::List(vec![Value::from("c")]),
            SEPARATOR,
        );
        assert_eq!(
            record.get("creators"),
            Some(&Value::List(vec![
                Value::from("a"),
                Value::from("b"),
                Value::from("c"),
            ]))
        );
    }

    #[test]
    fn test_append_pushes_scalar_onto_list() {
        let mut record = Record::new();
        record.set("creators", Value::List(vec![Value::from("a")]));
        append(&mut record, "creators", Value::from("b"), SEPARATOR);
        assert_eq!(
            record.get("creators"),
            Some(&Value::List(vec![Value::from("a"), Value::from("b")]))
        );
    }

    #[test]
    fn test_append_ignores_empty_content() {
        let mut record = Record::new();
        record.set("title", Value::from("kept"));
        append(&mut record, "title", Value::Null, SEPARATOR);
        append(&mut record, "title", Value::from(""), SEPARATOR);
        assert_eq!(record.get_str("title"), Some("kept"));
    }

    #[test]
    fn test_append_discards_merge_into_undefined_shape() {
        let mut record = Record::new();
        record.set("count", Value::Int(1));
        append(&mut record, "count", Value::from("x"), SEPARATOR);
        // merging into a non-string, non-list value is undefined by the
        // policy; the existing value wins
        assert_eq!(record.get_int("count"), Some(1));
    }

    #[test]
    fn test_append_custom_separator() {
        let mut record = Record::new();
        append(&mut record, "pages", Value::from("1"), ", ");
        append(&mut record, "pages", Value::from("2"), ", ");
        assert_eq!(record.get_str("pages"), Some("1, 2"));
    }
}
