use crate::db::{store, DbFaculty, DbFacultySubject, DbSubject};
use sqlx::SqliteConnection;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Education type {education_type_id} not found (faculty code {code})")]
    ReferenceNotFound { code: String, education_type_id: i64 },
    #[error("{0} not found")]
    NotFound(String),
}

/// Find-or-create logic for subjects, faculties, and their associations
///
/// Handles:
/// - Subject upsert by exact name
/// - Faculty upsert by exact code (first writer wins)
/// - Faculty-subject association rows
///
/// A registry lives for one import run and remembers the rows it has resolved,
/// so repeated lookups for the same subject or faculty code skip the database.
/// The connection is passed per call so the registry works both on a pooled
/// connection and inside a full-refresh transaction.
#[derive(Debug, Default)]
pub struct CatalogRegistry {
    subjects: HashMap<String, DbSubject>,
    faculties: HashMap<String, DbFaculty>,
}

impl CatalogRegistry {
    /// Create an empty registry for a new run
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a subject by exact name, creating it on miss
    ///
    /// Idempotent: repeated calls with the same name return the same record.
    /// The description is only used when the subject is created.
    pub async fn find_or_create_subject(
        &mut self,
        conn: &mut SqliteConnection,
        name: &str,
        description: Option<&str>,
    ) -> Result<DbSubject, LibraryError> {
        if let Some(subject) = self.subjects.get(name) {
            return Ok(subject.clone());
        }

        let subject = match store::get_subject_by_name(conn, name).await? {
            Some(existing) => {
                debug!("Found subject '{}' (id {})", name, existing.id);
                existing
            }
            None => {
                let created = store::insert_subject(conn, name, description).await?;
                info!("Created subject '{}' (id {})", name, created.id);
                created
            }
        };

        self.subjects.insert(name.to_string(), subject.clone());
        Ok(subject)
    }

    /// Look up a faculty by exact code, creating it on miss
    ///
    /// An existing faculty is returned unchanged even when `name` or
    /// `education_type_id` differ. Creation fails with `ReferenceNotFound` when
    /// the education type does not exist.
    pub async fn find_or_create_faculty(
        &mut self,
        conn: &mut SqliteConnection,
        code: &str,
        name: &str,
        education_type_id: i64,
    ) -> Result<DbFaculty, LibraryError> {
        if let Some(faculty) = self.faculties.get(code) {
            return Ok(faculty.clone());
        }

        let faculty = match store::get_faculty_by_code(conn, code).await? {
            Some(existing) => existing,
            None => {
                if store::get_education_type(conn, education_type_id)
                    .await?
                    .is_none()
                {
                    return Err(LibraryError::ReferenceNotFound {
                        code: code.to_string(),
                        education_type_id,
                    });
                }

                let created = store::insert_faculty(conn, code, name, education_type_id).await?;
                info!("Created faculty {} '{}' (id {})", code, created.name, created.id);
                created
            }
        };

        self.faculties.insert(code.to_string(), faculty.clone());
        Ok(faculty)
    }

    /// Append a faculty-subject association row
    ///
    /// Not idempotent: calling twice for the same pair stores two rows.
    pub async fn link_faculty_subject(
        &self,
        conn: &mut SqliteConnection,
        faculty: &DbFaculty,
        subject: &DbSubject,
    ) -> Result<DbFacultySubject, LibraryError> {
        let link = store::insert_faculty_subject(conn, faculty.id, subject.id).await?;
        debug!(
            "Linked faculty {} to subject '{}'",
            faculty.code, subject.name
        );
        Ok(link)
    }

    /// Link a faculty to a subject unless they are already linked
    ///
    /// Returns the new association, or `None` when the pair already existed.
    pub async fn link_faculty_subject_if_absent(
        &self,
        conn: &mut SqliteConnection,
        faculty: &DbFaculty,
        subject: &DbSubject,
    ) -> Result<Option<DbFacultySubject>, LibraryError> {
        if store::faculty_subject_exists(conn, faculty.id, subject.id).await? {
            return Ok(None);
        }
        Ok(Some(self.link_faculty_subject(conn, faculty, subject).await?))
    }

    /// Link an existing faculty (by code) to an existing subject (by name)
    ///
    /// Nothing is created: an unknown code or name is `NotFound`. An
    /// already linked pair is left alone and `None` is returned.
    pub async fn link_existing(
        &mut self,
        conn: &mut SqliteConnection,
        faculty_code: &str,
        subject_name: &str,
    ) -> Result<Option<DbFacultySubject>, LibraryError> {
        let faculty = store::get_faculty_by_code(conn, faculty_code)
            .await?
            .ok_or_else(|| LibraryError::NotFound(format!("Faculty {}", faculty_code)))?;
        let subject = store::get_subject_by_name(conn, subject_name)
            .await?
            .ok_or_else(|| LibraryError::NotFound(format!("Subject '{}'", subject_name)))?;

        let link = self
            .link_faculty_subject_if_absent(conn, &faculty, &subject)
            .await?;
        if link.is_some() {
            info!("Linked faculty {} to subject '{}'", faculty.code, subject.name);
        }
        Ok(link)
    }
}
