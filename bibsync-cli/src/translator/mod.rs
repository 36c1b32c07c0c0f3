//! Record translation between local schemas and the global exchange format
//!
//! Each reference manager speaks its own field dialect. Records are
//! translated through a shared pivot vocabulary using per-schema
//! dictionaries, so no pairwise mappings are needed.

mod append;
mod dictionary;
mod engine;
mod extra;
mod value;

pub use append::{SEPARATOR, append};
pub use dictionary::{ContentFn, DefaultFn, Dictionary, Direction, FieldRule, NameFn, RuleObject};
pub use engine::{EXTRA_FIELD, TranslateError, to_global, to_local, translate};
pub use extra::{pack, unpack};
pub use value::{Record, Value};
