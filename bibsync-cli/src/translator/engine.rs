//! Field translation engine
//!
//! Translates one record between a local schema and the global exchange
//! format, in either direction, using a [`Dictionary`]. The same algorithm
//! runs both ways; only the dictionary orientation differs. The engine is a
//! pure function over its inputs: it allocates a fresh output record per call
//! and never persists anything.

use super::append::{SEPARATOR, append};
use super::dictionary::{Dictionary, Direction, FieldRule};
use super::extra;
use super::value::{Record, Value};

/// Reserved name of the pivot format's catch-all field
pub const EXTRA_FIELD: &str = "extra";

/// Error from a translation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslateError {
    /// A dictionary entry has an unrecognized shape. Fatal to the call;
    /// dictionaries are configuration, so this is never retried.
    InvalidFieldRule { field: String },
}

impl std::fmt::Display for TranslateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranslateError::InvalidFieldRule { field } => {
                write!(f, "invalid field rule for '{}'", field)
            }
        }
    }
}

impl std::error::Error for TranslateError {}

/// Translate a record from a local dialect to the global exchange format
pub fn to_global(dictionary: &Dictionary, record: &Record) -> Result<Record, TranslateError> {
    translate(dictionary, record, Direction::ToGlobal)
}

/// Translate a record from the global exchange format to a local dialect
pub fn to_local(dictionary: &Dictionary, record: &Record) -> Result<Record, TranslateError> {
    translate(dictionary, record, Direction::ToLocal)
}

/// Translate a record in the given direction.
///
/// Fields whose value is the empty string are treated as absent. Fields the
/// dictionary does not recognize are archived in the extra bucket, except
/// those carrying one of the dictionary's reserved prefixes, which are
/// local-only bookkeeping and are dropped. Errors thrown by rule functions
/// are not caught: a panicking rule is a configuration defect.
pub fn translate(
    dictionary: &Dictionary,
    record: &Record,
    direction: Direction,
) -> Result<Record, TranslateError> {
    let mut output = Record::new();

    // Catch-all bucket for fields without a structural home. A string-form
    // extra field on the source is unpacked into the bucket up front and not
    // iterated again; a structured one flows through the normal field loop.
    let mut bucket = Record::new();
    let extra_consumed = match record.get(EXTRA_FIELD) {
        Some(Value::String(text)) => {
            bucket = extra::unpack(text);
            true
        }
        _ => false,
    };
    // reserve the extra slot so it keeps a stable position in the output
    output.set(EXTRA_FIELD, Value::Table(Record::new()));

    for (field, value) in record.iter() {
        if value.is_empty_content() {
            continue;
        }
        if field == EXTRA_FIELD && extra_consumed {
            continue;
        }

        let rule = dictionary.rule(direction, field);
        if let Some(rule) = rule {
            log::trace!("field '{}' -> {}", field, rule.describe());
        }
        let target = resolve_name(rule, field, record)?;
        let content = resolve_content(rule, record, value);

        match target {
            // direct equivalent in the target schema
            Some(name) => {
                if !output.contains(&name) {
                    if let Some(FieldRule::Object(object)) = rule {
                        if let Some(default) = object.default {
                            output.set(name.clone(), default());
                        }
                    }
                }
                append(&mut output, &name, content, SEPARATOR);
            }
            // no target name, but structured content: each key may promote
            // itself into a field the dictionary recognizes in either
            // direction; the rest goes to the bucket
            None => match content {
                Value::Table(table) => {
                    for (key, entry) in table.iter() {
                        if dictionary.knows_field(key) {
                            append(&mut output, key, entry.clone(), SEPARATOR);
                        } else {
                            append(&mut bucket, key, entry.clone(), SEPARATOR);
                        }
                    }
                }
                other => {
                    if !dictionary.is_dropped(field) {
                        append(&mut bucket, field, other, SEPARATOR);
                    }
                }
            },
        }
    }

    log::debug!(
        "translated {} fields {} via '{}', {} archived in extra",
        record.len(),
        direction.label(),
        dictionary.name(),
        bucket.len()
    );

    if !bucket.is_empty() {
        output.set(EXTRA_FIELD, Value::String(extra::pack(&bucket)));
    }
    Ok(output)
}

/// Resolve the target field name for a source field, `None` meaning the
/// field has no direct equivalent
fn resolve_name(
    rule: Option<&FieldRule>,
    field: &str,
    record: &Record,
) -> Result<Option<String>, TranslateError> {
    match rule {
        // unrecognized by this dictionary
        None => Ok(None),
        Some(FieldRule::NoMapping) => Ok(None),
        Some(FieldRule::Rename(target)) => Ok(Some(target.clone())),
        Some(FieldRule::Computed(name)) => Ok(name(record)),
        Some(FieldRule::Object(object)) => {
            if !object.is_well_formed() {
                return Err(TranslateError::InvalidFieldRule {
                    field: field.to_string(),
                });
            }
            Ok(object.translate_name.and_then(|f| f(record)))
        }
    }
}

/// Resolve the target content: the rule's content function if present, else
/// the raw source value
fn resolve_content(rule: Option<&FieldRule>, record: &Record, value: &Value) -> Value {
    if let Some(FieldRule::Object(object)) = rule {
        if let Some(f) = object.translate_content {
            return f(record);
        }
    }
    value.clone()
}
