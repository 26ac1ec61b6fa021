use crate::db::CatalogKind;
use crate::import::mapping_sheet::SheetError;
use crate::library::LibraryError;
use crate::storage::StorageError;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// How a run reconciles the folder tree with the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    /// Append books with copied attachments, never delete
    Incremental,
    /// Clear the collection and rebuild it in one transaction
    FullRefresh,
}

/// Summary of a finished run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportReport {
    pub kind: CatalogKind,
    pub mode: ImportMode,
    /// Subject folders processed
    pub subjects: usize,
    /// Catalog items saved
    pub imported: usize,
    /// Files, rows, or sheets that were skipped
    pub skipped: usize,
    /// Faculty-subject associations created
    pub faculty_links: usize,
    pub duration: Duration,
}

impl ImportReport {
    pub fn new(kind: CatalogKind, mode: ImportMode) -> Self {
        ImportReport {
            kind,
            mode,
            subjects: 0,
            imported: 0,
            skipped: 0,
            faculty_links: 0,
            duration: Duration::ZERO,
        }
    }
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Bad input: {0}")]
    BadInput(String),
    #[error("Malformed entry {entry}: {reason}")]
    MalformedEntry { entry: String, reason: String },
    #[error("Education type {education_type_id} not found (faculty code {code})")]
    ReferenceNotFound { code: String, education_type_id: i64 },
    #[error("IO failure: {0}")]
    IoFailure(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Import cancelled")]
    Cancelled,
    #[error("An import is already running")]
    AlreadyRunning,
}

impl ImportError {
    /// Fatal errors end the run; the others skip one file, row, or sheet
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ImportError::BadInput(_)
                | ImportError::Database(_)
                | ImportError::Cancelled
                | ImportError::AlreadyRunning
        )
    }
}

impl From<LibraryError> for ImportError {
    fn from(e: LibraryError) -> Self {
        match e {
            LibraryError::Database(e) => ImportError::Database(e),
            LibraryError::ReferenceNotFound {
                code,
                education_type_id,
            } => ImportError::ReferenceNotFound {
                code,
                education_type_id,
            },
            other @ LibraryError::NotFound(_) => ImportError::BadInput(other.to_string()),
        }
    }
}

impl From<StorageError> for ImportError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Database(e) => ImportError::Database(e),
            other => ImportError::IoFailure(other.to_string()),
        }
    }
}

impl From<SheetError> for ImportError {
    fn from(e: SheetError) -> Self {
        ImportError::IoFailure(e.to_string())
    }
}

impl From<std::io::Error> for ImportError {
    fn from(e: std::io::Error) -> Self {
        ImportError::IoFailure(e.to_string())
    }
}
