//! Field dictionary for the Bookends dialect

use once_cell::sync::Lazy;

use crate::translator::{Dictionary, FieldRule, Record, RuleObject, Value};

use super::reftype::ReferenceType;

/// Key under which a reference's Bookends id is archived in the pivot
/// format's extra bucket (it has no structural home in the pivot vocabulary)
pub const UNIQUE_ID_KEY: &str = "bookends-uniqueId";

/// Every field Bookends exposes on its scripting interface
pub const FIELDS: [&str; 37] = [
    "uniqueID",
    "authors",
    "title",
    "editors",
    "journal",
    "volume",
    "pages",
    "publisher",
    "thedate",
    "location",
    "title2",
    "abstract",
    "keywords",
    "notes",
    "user1",
    "user2",
    "user3",
    "user4",
    "user5",
    "user6",
    "user7",
    "user8",
    "user9",
    "user10",
    "user11",
    "user12",
    "user13",
    "user14",
    "user15",
    "user16",
    "user17",
    "user18",
    "user19",
    "user20",
    "attachments",
    "type",
    "groups",
];

/// The Bookends field dictionary
pub fn dictionary() -> &'static Dictionary {
    static DICT: Lazy<Dictionary> = Lazy::new(build);
    &DICT
}

fn build() -> Dictionary {
    Dictionary::new("bookends")
        // user fields are local bookkeeping, one of them holds the sync data
        .with_drop_prefixes(&["user", "default"])
        .global(
            "uniqueID",
            FieldRule::Object(RuleObject::new().name(|_| None).content(unique_id_to_extra)),
        )
        // group membership has no structural home; archive it
        .global("groups", FieldRule::NoMapping)
        .global(
            "authors",
            FieldRule::Object(RuleObject::new().name(creators).content(authors_to_creators)),
        )
        .global(
            "editors",
            FieldRule::Object(RuleObject::new().name(creators).content(editors_to_creators)),
        )
        .global("title", FieldRule::rename("title"))
        .global("journal", FieldRule::rename("publication"))
        .global("volume", FieldRule::rename("volume"))
        .global("pages", FieldRule::rename("pages"))
        .global("publisher", FieldRule::rename("publisher"))
        .global("thedate", FieldRule::rename("date"))
        .global("location", FieldRule::rename("place"))
        .global("title2", FieldRule::rename("series"))
        .global("abstract", FieldRule::rename("abstract"))
        .global("keywords", FieldRule::rename("keywords"))
        .global("notes", FieldRule::rename("notes"))
        .global("attachments", FieldRule::rename("attachments"))
        .global(
            "type",
            FieldRule::Object(RuleObject::new().name(item_type).content(type_to_item_type)),
        )
        .local(
            "creators",
            FieldRule::Object(RuleObject::new().name(|_| None).content(creators_to_name_fields)),
        )
        .local("title", FieldRule::rename("title"))
        .local("publication", FieldRule::rename("journal"))
        .local("volume", FieldRule::rename("volume"))
        .local("pages", FieldRule::rename("pages"))
        .local("publisher", FieldRule::rename("publisher"))
        .local("date", FieldRule::rename("thedate"))
        .local("place", FieldRule::rename("location"))
        .local("series", FieldRule::rename("title2"))
        .local("abstract", FieldRule::rename("abstract"))
        .local("keywords", FieldRule::rename("keywords"))
        .local("notes", FieldRule::rename("notes"))
        .local("attachments", FieldRule::rename("attachments"))
        .local(
            "itemType",
            FieldRule::Object(RuleObject::new().name(bookends_type).content(item_type_to_type)),
        )
}

fn creators(_: &Record) -> Option<String> {
    Some("creators".to_string())
}

fn item_type(_: &Record) -> Option<String> {
    Some("itemType".to_string())
}

fn bookends_type(_: &Record) -> Option<String> {
    Some("type".to_string())
}

/// The Bookends id has no pivot equivalent; archive it in the extra bucket
/// so the reverse sync can recover it
fn unique_id_to_extra(record: &Record) -> Value {
    let mut table = Record::new();
    if let Some(id) = record.get("uniqueID") {
        table.set(UNIQUE_ID_KEY, id.clone());
    }
    Value::Table(table)
}

fn authors_to_creators(record: &Record) -> Value {
    parse_names(record.get_str("authors").unwrap_or(""), "author")
}

fn editors_to_creators(record: &Record) -> Value {
    parse_names(record.get_str("editors").unwrap_or(""), "editor")
}

/// Bookends stores people as newline-separated "Last, First" names
fn parse_names(text: &str, role: &str) -> Value {
    let creators = text
        .split('\n')
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .map(|name| {
            let mut creator = Record::new();
            creator.set("role", Value::from(role));
            match name.split_once(',') {
                Some((last, first)) => {
                    creator.set("lastName", Value::from(last.trim()));
                    creator.set("firstName", Value::from(first.trim()));
                }
                // institutional or single-part name
                None => creator.set("name", Value::from(name)),
            }
            creator
        })
        .map(Value::Table)
        .collect();
    Value::List(creators)
}

/// Split pivot creators back into the authors/editors fields. The result has
/// no target name of its own; both keys promote themselves into structural
/// fields because the dictionary recognizes them.
fn creators_to_name_fields(record: &Record) -> Value {
    let mut authors = Vec::new();
    let mut editors = Vec::new();

    if let Some(Value::List(creators)) = record.get("creators") {
        for creator in creators {
            let Some(table) = creator.as_table() else {
                continue;
            };
            let name = match (table.get_str("lastName"), table.get_str("firstName")) {
                (Some(last), Some(first)) => format!("{}, {}", last, first),
                (Some(last), None) => last.to_string(),
                _ => table.get_str("name").unwrap_or("").to_string(),
            };
            if name.is_empty() {
                continue;
            }
            match table.get_str("role") {
                Some("editor") => editors.push(name),
                _ => authors.push(name),
            }
        }
    }

    let mut fields = Record::new();
    if !authors.is_empty() {
        fields.set("authors", Value::String(authors.join("\n")));
    }
    if !editors.is_empty() {
        fields.set("editors", Value::String(editors.join("\n")));
    }
    Value::Table(fields)
}

fn type_to_item_type(record: &Record) -> Value {
    let item_type = record
        .get_str("type")
        .and_then(|label| ReferenceType::from_label(label).ok())
        .map(|t| t.item_type())
        .unwrap_or("document");
    Value::from(item_type)
}

fn item_type_to_type(record: &Record) -> Value {
    let label = record
        .get_str("itemType")
        .and_then(ReferenceType::from_item_type)
        .map(|t| t.label())
        .unwrap_or(ReferenceType::JournalArticle.label());
    Value::from(label)
}
