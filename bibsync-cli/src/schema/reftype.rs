//! Bookends reference types and their numeric codes
//!
//! Bookends addresses reference types by small integer codes on its
//! scripting interface; Zotero uses camel-case item type names. Both
//! mappings live here.

/// A Bookends reference type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceType {
    Artwork,
    AudiovisualMaterial,
    Book,
    BookChapter,
    ConferenceProceedings,
    Dissertation,
    EditedBook,
    Editorial,
    InPress,
    JournalArticle,
    Letter,
    Map,
    NewspaperArticle,
    Patent,
    PersonalCommunication,
    Review,
    Internet,
}

/// Error when converting between type names and codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeCodeError {
    /// The name is not a known reference type
    UnknownType(String),
    /// The code is outside the range Bookends uses
    CodeOutOfRange(i64),
    /// The code is in range but has no type assigned
    UnknownCode(i64),
}

impl std::fmt::Display for TypeCodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeCodeError::UnknownType(name) => write!(f, "invalid type '{}'", name),
            TypeCodeError::CodeOutOfRange(code) => write!(f, "code {} out of range", code),
            TypeCodeError::UnknownCode(code) => write!(f, "no type with code {}", code),
        }
    }
}

impl std::error::Error for TypeCodeError {}

impl ReferenceType {
    /// All types, ordered by their numeric code
    pub const ALL: [ReferenceType; 17] = [
        ReferenceType::Artwork,
        ReferenceType::AudiovisualMaterial,
        ReferenceType::Book,
        ReferenceType::BookChapter,
        ReferenceType::ConferenceProceedings,
        ReferenceType::Dissertation,
        ReferenceType::EditedBook,
        ReferenceType::Editorial,
        ReferenceType::InPress,
        ReferenceType::JournalArticle,
        ReferenceType::Letter,
        ReferenceType::Map,
        ReferenceType::NewspaperArticle,
        ReferenceType::Patent,
        ReferenceType::PersonalCommunication,
        ReferenceType::Review,
        ReferenceType::Internet,
    ];

    /// The type name as Bookends displays it
    pub fn label(&self) -> &'static str {
        match self {
            ReferenceType::Artwork => "Artwork",
            ReferenceType::AudiovisualMaterial => "Audiovisual material",
            ReferenceType::Book => "Book",
            ReferenceType::BookChapter => "Book chapter",
            ReferenceType::ConferenceProceedings => "Conference proceedings",
            ReferenceType::Dissertation => "Dissertation",
            ReferenceType::EditedBook => "Edited book",
            ReferenceType::Editorial => "Editorial",
            ReferenceType::InPress => "In press",
            ReferenceType::JournalArticle => "Journal article",
            ReferenceType::Letter => "Letter",
            ReferenceType::Map => "Map",
            ReferenceType::NewspaperArticle => "Newspaper article",
            ReferenceType::Patent => "Patent",
            ReferenceType::PersonalCommunication => "Personal communication",
            ReferenceType::Review => "Review",
            ReferenceType::Internet => "Internet",
        }
    }

    /// The closest Zotero item type
    pub fn item_type(&self) -> &'static str {
        match self {
            ReferenceType::Artwork => "artwork",
            ReferenceType::AudiovisualMaterial => "videoRecording",
            ReferenceType::Book => "book",
            ReferenceType::BookChapter => "bookSection",
            ReferenceType::ConferenceProceedings => "conferencePaper",
            ReferenceType::Dissertation => "thesis",
            ReferenceType::EditedBook => "book",
            ReferenceType::Editorial => "journalArticle",
            ReferenceType::InPress => "journalArticle",
            ReferenceType::JournalArticle => "journalArticle",
            ReferenceType::Letter => "letter",
            ReferenceType::Map => "map",
            ReferenceType::NewspaperArticle => "newspaperArticle",
            ReferenceType::Patent => "patent",
            ReferenceType::PersonalCommunication => "letter",
            ReferenceType::Review => "journalArticle",
            ReferenceType::Internet => "webpage",
        }
    }

    /// The internal numeric code Bookends uses
    pub fn code(&self) -> i64 {
        Self::ALL.iter().position(|t| t == self).unwrap_or(0) as i64
    }

    /// Look up a type by its numeric code
    pub fn from_code(code: i64) -> Result<Self, TypeCodeError> {
        if !(0..40).contains(&code) {
            return Err(TypeCodeError::CodeOutOfRange(code));
        }
        Self::ALL
            .get(code as usize)
            .copied()
            .ok_or(TypeCodeError::UnknownCode(code))
    }

    /// Look up a type by its Bookends name
    pub fn from_label(label: &str) -> Result<Self, TypeCodeError> {
        Self::ALL
            .iter()
            .find(|t| t.label() == label)
            .copied()
            .ok_or_else(|| TypeCodeError::UnknownType(label.to_string()))
    }

    /// Look up the type a Zotero item type maps back to. Several Bookends
    /// types share a Zotero item type; the first (lowest-code) one wins.
    pub fn from_item_type(item_type: &str) -> Option<Self> {
        Self::ALL.iter().find(|t| t.item_type() == item_type).copied()
    }
}
