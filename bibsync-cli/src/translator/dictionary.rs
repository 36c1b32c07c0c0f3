//! Dictionary: per-schema, per-direction field mapping configuration

use indexmap::IndexMap;

use super::{Record, Value};

/// Translation direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Local dialect to the global exchange format
    ToGlobal,
    /// Global exchange format to the local dialect
    ToLocal,
}

impl Direction {
    /// Get display label for logs
    pub fn label(&self) -> &'static str {
        match self {
            Direction::ToGlobal => "to-global",
            Direction::ToLocal => "to-local",
        }
    }
}

/// Produces the target field name for a source record, or `None` when the
/// field has no target in this direction
pub type NameFn = fn(&Record) -> Option<String>;

/// Produces the target field content from the whole source record
pub type ContentFn = fn(&Record) -> Value;

/// Produces a default target value used as a merge base
pub type DefaultFn = fn() -> Value;

/// How one source field translates into the target schema
#[derive(Debug, Clone)]
pub enum FieldRule {
    /// Explicit "no target field"; content is routed to the extra bucket
    /// unless the source field name carries a reserved prefix
    NoMapping,
    /// Literal target field name, content copied verbatim
    Rename(String),
    /// Target field name depends on the record's content
    Computed(NameFn),
    /// Rule object with optional name/content/default functions
    Object(RuleObject),
}

impl FieldRule {
    /// Create a rename rule
    pub fn rename(target: impl Into<String>) -> Self {
        FieldRule::Rename(target.into())
    }

    /// Create a computed-name rule
    pub fn computed(name: NameFn) -> Self {
        FieldRule::Computed(name)
    }

    /// Get a human-readable description of this rule
    pub fn describe(&self) -> String {
        match self {
            FieldRule::NoMapping => "none".to_string(),
            FieldRule::Rename(target) => format!("rename({})", target),
            FieldRule::Computed(_) => "computed".to_string(),
            FieldRule::Object(object) => {
                let mut parts = Vec::new();
                if object.translate_name.is_some() {
                    parts.push("name");
                }
                if object.translate_content.is_some() {
                    parts.push("content");
                }
                if object.default.is_some() {
                    parts.push("default");
                }
                format!("object({})", parts.join(","))
            }
        }
    }
}

/// Rule object: each part is optional, but at least one must be present for
/// the rule to be well-formed
#[derive(Debug, Clone, Default)]
pub struct RuleObject {
    /// Target field name, dependent on content; `None` result means no target
    pub translate_name: Option<NameFn>,
    /// Target field content; absent means the raw source value is used
    pub translate_content: Option<ContentFn>,
    /// Default target value, seeded before content is merged in
    pub default: Option<DefaultFn>,
}

impl RuleObject {
    /// Create an empty rule object (not well-formed until a part is added)
    pub fn new() -> Self {
        RuleObject::default()
    }

    /// Set the name function
    pub fn name(mut self, f: NameFn) -> Self {
        self.translate_name = Some(f);
        self
    }

    /// Set the content function
    pub fn content(mut self, f: ContentFn) -> Self {
        self.translate_content = Some(f);
        self
    }

    /// A rule object with none of its parts is an unrecognized shape
    pub fn is_well_formed(&self) -> bool {
        self.translate_name.is_some()
            || self.translate_content.is_some()
            || self.default.is_some()
    }
}

/// Declarative field mapping for one local schema: rules for translating its
/// fields into the global exchange format and back.
///
/// The two maps are authored independently; the translator does not require
/// them to be inverses, though a well-formed dictionary round-trips all
/// structurally mapped fields.
#[derive(Debug, Clone)]
pub struct Dictionary {
    name: String,
    to_global: IndexMap<String, FieldRule>,
    to_local: IndexMap<String, FieldRule>,
    drop_prefixes: Vec<String>,
}

impl Dictionary {
    /// Create an empty dictionary with the default reserved prefixes
    /// ("user", "default"): unmapped fields with these prefixes are local
    /// bookkeeping and are dropped instead of archived in the extra bucket.
    pub fn new(name: impl Into<String>) -> Self {
        Dictionary {
            name: name.into(),
            to_global: IndexMap::new(),
            to_local: IndexMap::new(),
            drop_prefixes: vec!["user".to_string(), "default".to_string()],
        }
    }

    /// Replace the reserved drop prefixes
    pub fn with_drop_prefixes(mut self, prefixes: &[&str]) -> Self {
        self.drop_prefixes = prefixes.iter().map(|p| p.to_string()).collect();
        self
    }

    /// Add a rule for translating a local field into the global format
    pub fn global(mut self, field: impl Into<String>, rule: FieldRule) -> Self {
        self.to_global.insert(field.into(), rule);
        self
    }

    /// Add a rule for translating a global field into the local dialect
    pub fn local(mut self, field: impl Into<String>, rule: FieldRule) -> Self {
        self.to_local.insert(field.into(), rule);
        self
    }

    /// Dictionary name, used in error messages and logs
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up the rule for a source field in the given direction
    pub fn rule(&self, direction: Direction, field: &str) -> Option<&FieldRule> {
        match direction {
            Direction::ToGlobal => self.to_global.get(field),
            Direction::ToLocal => self.to_local.get(field),
        }
    }

    /// Whether the field name is recognized in either direction. Used when
    /// translated content promotes its own keys into structural fields.
    pub fn knows_field(&self, field: &str) -> bool {
        self.to_global.contains_key(field) || self.to_local.contains_key(field)
    }

    /// Whether an unmapped field with this name is dropped outright instead
    /// of being archived in the extra bucket
    pub fn is_dropped(&self, field: &str) -> bool {
        self.drop_prefixes
            .iter()
            .any(|prefix| field.starts_with(prefix.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_lookup_per_direction() {
        let dict = Dictionary::new("test")
            .global("journal", FieldRule::rename("publication"))
            .local("publication", FieldRule::rename("journal"));

        assert!(matches!(
            dict.rule(Direction::ToGlobal, "journal"),
            Some(FieldRule::Rename(t)) if t == "publication"
        ));
        assert!(dict.rule(Direction::ToLocal, "journal").is_none());
    }

    #[test]
    fn test_knows_field_checks_both_directions() {
        let dict = Dictionary::new("test")
            .global("journal", FieldRule::rename("publication"))
            .local("publication", FieldRule::rename("journal"));

        assert!(dict.knows_field("journal"));
        assert!(dict.knows_field("publication"));
        assert!(!dict.knows_field("nonexistent"));
    }

    #[test]
    fn test_default_drop_prefixes() {
        let dict = Dictionary::new("test");
        assert!(dict.is_dropped("user5"));
        assert!(dict.is_dropped("defaultSomething"));
        assert!(!dict.is_dropped("customField"));
    }

    #[test]
    fn test_configured_drop_prefixes() {
        let dict = Dictionary::new("test").with_drop_prefixes(&["version", "dateAdded"]);
        assert!(dict.is_dropped("version"));
        assert!(dict.is_dropped("dateAdded"));
        assert!(!dict.is_dropped("user5"));
        // a prefix list entry matches any field it prefixes, so the list
        // must not contain prefixes of real field names
        assert!(!dict.is_dropped("date"));
    }

    #[test]
    fn test_describe() {
        assert_eq!(FieldRule::NoMapping.describe(), "none");
        assert_eq!(FieldRule::rename("title").describe(), "rename(title)");
        assert_eq!(
            FieldRule::Object(RuleObject::new().content(|_| Value::Null)).describe(),
            "object(content)"
        );
    }

    #[test]
    fn test_rule_object_well_formed() {
        assert!(!RuleObject::new().is_well_formed());
        assert!(RuleObject::new().name(|_| None).is_well_formed());

        let mut with_default = RuleObject::new();
        with_default.default = Some(|| Value::Null);
        assert!(with_default.is_well_formed());
    }
}
