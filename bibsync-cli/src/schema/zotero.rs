//! Field dictionary for the Zotero dialect

use once_cell::sync::Lazy;

use crate::translator::{Dictionary, FieldRule, Record, RuleObject, Value};

/// Key under which an item's Zotero key is archived in the pivot format's
/// extra bucket
pub const ITEM_KEY_EXTRA: &str = "zotero-key";

/// The Zotero field dictionary
pub fn dictionary() -> &'static Dictionary {
    static DICT: Lazy<Dictionary> = Lazy::new(build);
    &DICT
}

fn build() -> Dictionary {
    Dictionary::new("zotero")
        // versioning and collection bookkeeping stays on the Zotero side
        .with_drop_prefixes(&[
            "user",
            "default",
            "version",
            "dateAdded",
            "dateModified",
            "relations",
            "collections",
            "accessDate",
        ])
        .global(
            "key",
            FieldRule::Object(RuleObject::new().name(|_| None).content(key_to_extra)),
        )
        .global("itemType", FieldRule::rename("itemType"))
        .global("title", FieldRule::rename("title"))
        .global(
            "creators",
            FieldRule::Object(RuleObject::new().name(creators).content(creators_to_pivot)),
        )
        .global("date", FieldRule::rename("date"))
        .global("publicationTitle", FieldRule::rename("publication"))
        .global("bookTitle", FieldRule::rename("publication"))
        .global("volume", FieldRule::rename("volume"))
        .global("issue", FieldRule::rename("issue"))
        .global("pages", FieldRule::rename("pages"))
        .global("publisher", FieldRule::rename("publisher"))
        .global("place", FieldRule::rename("place"))
        .global("series", FieldRule::rename("series"))
        .global("abstractNote", FieldRule::rename("abstract"))
        .global(
            "tags",
            FieldRule::Object(RuleObject::new().name(keywords).content(tags_to_keywords)),
        )
        .global("notes", FieldRule::rename("notes"))
        .global("attachments", FieldRule::rename("attachments"))
        .global("DOI", FieldRule::rename("doi"))
        .global("url", FieldRule::rename("url"))
        .global("language", FieldRule::rename("language"))
        .local("itemType", FieldRule::rename("itemType"))
        .local("title", FieldRule::rename("title"))
        .local(
            "creators",
            FieldRule::Object(RuleObject::new().name(creators).content(creators_to_zotero)),
        )
        .local("date", FieldRule::rename("date"))
        .local("publication", FieldRule::computed(publication_field))
        .local("volume", FieldRule::rename("volume"))
        .local("issue", FieldRule::rename("issue"))
        .local("pages", FieldRule::rename("pages"))
        .local("publisher", FieldRule::rename("publisher"))
        .local("place", FieldRule::rename("place"))
        .local("series", FieldRule::rename("series"))
        .local("abstract", FieldRule::rename("abstractNote"))
        .local(
            "keywords",
            FieldRule::Object(RuleObject::new().name(tags).content(keywords_to_tags)),
        )
        .local("notes", FieldRule::rename("notes"))
        .local("attachments", FieldRule::rename("attachments"))
        .local("doi", FieldRule::rename("DOI"))
        .local("url", FieldRule::rename("url"))
        .local("language", FieldRule::rename("language"))
}

fn creators(_: &Record) -> Option<String> {
    Some("creators".to_string())
}

fn keywords(_: &Record) -> Option<String> {
    Some("keywords".to_string())
}

fn tags(_: &Record) -> Option<String> {
    Some("tags".to_string())
}

/// Book chapters keep their container title in `bookTitle`, everything else
/// in `publicationTitle`
fn publication_field(record: &Record) -> Option<String> {
    if record.get_str("itemType") == Some("bookSection") {
        Some("bookTitle".to_string())
    } else {
        Some("publicationTitle".to_string())
    }
}

/// The Zotero item key has no pivot equivalent; archive it in the extra
/// bucket so the reverse sync can recover it
fn key_to_extra(record: &Record) -> Value {
    let mut table = Record::new();
    if let Some(key) = record.get("key") {
        table.set(ITEM_KEY_EXTRA, key.clone());
    }
    Value::Table(table)
}

/// Zotero creator objects use `creatorType`; the pivot uses `role`
fn creators_to_pivot(record: &Record) -> Value {
    map_creators(record.get("creators"), "creatorType", "role")
}

fn creators_to_zotero(record: &Record) -> Value {
    map_creators(record.get("creators"), "role", "creatorType")
}

fn map_creators(value: Option<&Value>, from_key: &str, to_key: &str) -> Value {
    let Some(creators) = value.and_then(|v| v.as_list()) else {
        return Value::List(Vec::new());
    };
    let mapped = creators
        .iter()
        .filter_map(|creator| creator.as_table())
        .map(|table| {
            let mut mapped = Record::new();
            for (key, entry) in table.iter() {
                if key == from_key {
                    mapped.set(to_key, entry.clone());
                } else {
                    mapped.set(key.clone(), entry.clone());
                }
            }
            Value::Table(mapped)
        })
        .collect();
    Value::List(mapped)
}

/// Flatten the tag list to the pivot's joined keyword string
fn tags_to_keywords(record: &Record) -> Value {
    let Some(tag_entries) = record.get("tags").and_then(|v| v.as_list()) else {
        return Value::Null;
    };
    let names: Vec<&str> = tag_entries
        .iter()
        .filter_map(|entry| entry.as_table())
        .filter_map(|table| table.get_str("tag"))
        .collect();
    if names.is_empty() {
        Value::Null
    } else {
        Value::String(names.join("; "))
    }
}

/// Rebuild the tag list from a joined keyword string
fn keywords_to_tags(record: &Record) -> Value {
    let Some(text) = record.get_str("keywords") else {
        return Value::Null;
    };
    let entries = text
        .split([';', ','])
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .map(|name| {
            let mut tag = Record::new();
            tag.set("tag", Value::from(name));
            Value::Table(tag)
        })
        .collect();
    Value::List(entries)
}
