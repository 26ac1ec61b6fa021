//! Database models for the library catalog
//!
//! The catalog is built from a folder tree:
//! - Subject folders become subjects
//! - `yonalish.xlsx` rows become faculties linked to the subject
//! - Encoded file names become books, literary works, or audio works
//!
//! Subjects, faculties, and catalog items use integer row ids assigned by
//! SQLite. Attachments use a freshly minted UUID so their storage location is
//! known before the row exists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Academic subject
///
/// One subject per top-level folder under the subjects root. Names are unique;
/// the folder name is used verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbSubject {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Coarse academic level (Bakalavr, Magistr)
///
/// Static reference set seeded with the schema. The import pipeline only reads it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbEducationType {
    pub id: i64,
    pub name: String,
}

/// Academic program identified by its numeric code (e.g. "60310300")
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbFaculty {
    pub id: i64,
    /// Unique across the catalog; the first row seen for a code wins
    pub code: String,
    pub name: String,
    pub education_type_id: i64,
}

/// Links faculties to subjects (many-to-many)
///
/// The store does not enforce uniqueness of (faculty, subject) pairs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbFacultySubject {
    pub id: i64,
    pub faculty_id: i64,
    pub subject_id: i64,
}

/// A stored copy of a source file
///
/// Owned by exactly one catalog item. The bytes live at
/// `<storage_root>/<prefix>/<id>/<name>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbAttachment {
    pub id: String,
    /// Subject-scoped subdirectory (the subject name)
    pub prefix: String,
    /// Original file name
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl DbAttachment {
    pub fn new(prefix: &str, name: &str) -> Self {
        DbAttachment {
            id: Uuid::new_v4().to_string(),
            prefix: prefix.to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Printed book
///
/// Books come from two import paths: the incremental import stores a copied
/// attachment, the full refresh stores the absolute path of the original file.
/// `has_library_copy` and `library_count` describe the physical library and are
/// never set by ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbBook {
    pub id: i64,
    pub subject_id: Option<i64>,
    pub name: String,
    pub author: String,
    pub publisher: String,
    pub genre: String,
    pub description: Option<String>,
    pub path: Option<String>,
    pub attachment_id: Option<String>,
    pub has_library_copy: Option<bool>,
    pub library_count: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Literary work ("badiiy") or audio work
///
/// Both collections share this shape and differ only in their table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbWork {
    pub id: i64,
    pub name: String,
    pub author: String,
    pub publisher: String,
    pub genre: String,
    pub description: Option<String>,
    pub path: String,
    pub created_at: DateTime<Utc>,
}

/// Catalog item ready to be inserted (no row id yet)
#[derive(Debug, Clone, PartialEq)]
pub struct NewCatalogItem {
    pub name: String,
    pub author: String,
    pub publisher: String,
    pub genre: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub source: ItemSource,
}

/// Where a catalog item's bytes can be found
#[derive(Debug, Clone, PartialEq)]
pub enum ItemSource {
    /// Absolute path of the original file on disk
    Path(String),
    /// Id of a stored attachment
    Attachment(String),
}

/// The collection a catalog item lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogKind {
    Books,
    LiteraryWorks,
    Audio,
}

impl CatalogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogKind::Books => "books",
            CatalogKind::LiteraryWorks => "literary_works",
            CatalogKind::Audio => "audio",
        }
    }

    /// Table holding items of this kind
    pub fn table(&self) -> &'static str {
        match self {
            CatalogKind::Books => "books",
            CatalogKind::LiteraryWorks => "badiiy",
            CatalogKind::Audio => "audio",
        }
    }
}

impl std::fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row counts per table, used to confirm the effect of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogCounts {
    pub subjects: i64,
    pub faculties: i64,
    pub faculty_subjects: i64,
    pub books: i64,
    pub badiiy: i64,
    pub audio: i64,
    pub attachments: i64,
}
