use crate::db::{CatalogCounts, CatalogKind, Database, DbBook, DbFaculty, DbSubject, DbWork};
use crate::storage::AttachmentStore;
use serde::Serialize;
use std::path::PathBuf;

/// Everything in the catalog, for `stats --detail`
#[derive(Debug, Serialize)]
pub struct CatalogListing {
    pub counts: CatalogCounts,
    pub subjects: Vec<SubjectListing>,
    pub faculties: Vec<DbFaculty>,
    pub books: Vec<BookListing>,
    pub literary_works: Vec<DbWork>,
    pub audio: Vec<DbWork>,
}

#[derive(Debug, Serialize)]
pub struct SubjectListing {
    #[serde(flatten)]
    pub subject: DbSubject,
    pub faculties: Vec<String>,
}

/// A book with the file it points at, either its source path or its stored copy
#[derive(Debug, Serialize)]
pub struct BookListing {
    #[serde(flatten)]
    pub book: DbBook,
    pub file: Option<PathBuf>,
}

pub async fn catalog_listing(
    database: &Database,
    attachments: &AttachmentStore,
) -> Result<CatalogListing, sqlx::Error> {
    let mut subjects = Vec::new();
    for subject in database.get_subjects().await? {
        let faculties = database
            .get_faculties_for_subject(subject.id)
            .await?
            .into_iter()
            .map(|f| f.code)
            .collect();
        subjects.push(SubjectListing { subject, faculties });
    }

    let mut books = Vec::new();
    for book in database.get_books().await? {
        let file = match (&book.path, &book.attachment_id) {
            (Some(path), _) => Some(PathBuf::from(path)),
            (None, Some(id)) => database
                .get_attachment(id)
                .await?
                .map(|attachment| attachments.resolve(&attachment)),
            (None, None) => None,
        };
        books.push(BookListing { book, file });
    }

    Ok(CatalogListing {
        counts: database.counts().await?,
        subjects,
        faculties: database.get_faculties().await?,
        books,
        literary_works: database.get_works(CatalogKind::LiteraryWorks).await?,
        audio: database.get_works(CatalogKind::Audio).await?,
    })
}
