//! Store operations on a single connection.
//!
//! Every function takes `&mut SqliteConnection` so the same code runs on a
//! pooled connection (auto-commit) or inside a transaction (full refresh).

use chrono::Utc;
use sqlx::{Row, SqliteConnection};

use crate::db::client::{faculty_from_row, subject_from_row};
use crate::db::models::*;

/// Get subject by exact name
pub async fn get_subject_by_name(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<Option<DbSubject>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM subjects WHERE name = ? LIMIT 1")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(subject_from_row).transpose()
}

/// Insert a subject unless one with the same name exists, then return the stored row
///
/// Relies on the UNIQUE(name) constraint so two writers cannot both create it.
pub async fn insert_subject(
    conn: &mut SqliteConnection,
    name: &str,
    description: Option<&str>,
) -> Result<DbSubject, sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        r#"
        INSERT INTO subjects (name, description, created_at, updated_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(name) DO NOTHING
        "#,
    )
    .bind(name)
    .bind(description)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    get_subject_by_name(conn, name)
        .await?
        .ok_or(sqlx::Error::RowNotFound)
}

/// Get education type by id
pub async fn get_education_type(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<DbEducationType>, sqlx::Error> {
    let row = sqlx::query("SELECT id, name FROM education_types WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.map(|row| DbEducationType {
        id: row.get("id"),
        name: row.get("name"),
    }))
}

/// Get faculty by exact code
pub async fn get_faculty_by_code(
    conn: &mut SqliteConnection,
    code: &str,
) -> Result<Option<DbFaculty>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM faculties WHERE code = ?")
        .bind(code)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.as_ref().map(faculty_from_row))
}

/// Insert a faculty unless the code is taken, then return the stored row
///
/// The first writer for a code wins; a later insert with a different name
/// returns the original faculty untouched.
pub async fn insert_faculty(
    conn: &mut SqliteConnection,
    code: &str,
    name: &str,
    education_type_id: i64,
) -> Result<DbFaculty, sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO faculties (code, name, education_type_id)
        VALUES (?, ?, ?)
        ON CONFLICT(code) DO NOTHING
        "#,
    )
    .bind(code)
    .bind(name)
    .bind(education_type_id)
    .execute(&mut *conn)
    .await?;

    get_faculty_by_code(conn, code)
        .await?
        .ok_or(sqlx::Error::RowNotFound)
}

/// Insert faculty-subject relationship
pub async fn insert_faculty_subject(
    conn: &mut SqliteConnection,
    faculty_id: i64,
    subject_id: i64,
) -> Result<DbFacultySubject, sqlx::Error> {
    let result = sqlx::query("INSERT INTO faculty_subjects (faculty_id, subject_id) VALUES (?, ?)")
        .bind(faculty_id)
        .bind(subject_id)
        .execute(&mut *conn)
        .await?;

    Ok(DbFacultySubject {
        id: result.last_insert_rowid(),
        faculty_id,
        subject_id,
    })
}

/// Check whether a faculty is already linked to a subject
pub async fn faculty_subject_exists(
    conn: &mut SqliteConnection,
    faculty_id: i64,
    subject_id: i64,
) -> Result<bool, sqlx::Error> {
    let row = sqlx::query(
        "SELECT EXISTS(SELECT 1 FROM faculty_subjects WHERE faculty_id = ? AND subject_id = ?) AS linked",
    )
    .bind(faculty_id)
    .bind(subject_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.get::<i64, _>("linked") != 0)
}

/// Insert an attachment record
pub async fn insert_attachment(
    conn: &mut SqliteConnection,
    attachment: &DbAttachment,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO attachments (id, prefix, name, created_at) VALUES (?, ?, ?, ?)")
        .bind(&attachment.id)
        .bind(&attachment.prefix)
        .bind(&attachment.name)
        .bind(attachment.created_at.to_rfc3339())
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Insert a book, optionally linked to a subject. Returns the new row id.
pub async fn insert_book(
    conn: &mut SqliteConnection,
    subject_id: Option<i64>,
    item: &NewCatalogItem,
) -> Result<i64, sqlx::Error> {
    let (path, attachment_id) = match &item.source {
        ItemSource::Path(path) => (Some(path.as_str()), None),
        ItemSource::Attachment(id) => (None, Some(id.as_str())),
    };

    let result = sqlx::query(
        r#"
        INSERT INTO books (
            subject_id, name, author, publisher, genre,
            description, path, attachment_id, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(subject_id)
    .bind(&item.name)
    .bind(&item.author)
    .bind(&item.publisher)
    .bind(&item.genre)
    .bind(&item.description)
    .bind(path)
    .bind(attachment_id)
    .bind(item.created_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Insert a literary work or an audio work. Returns the new row id.
///
/// These collections only reference files by path; an attachment source is rejected.
pub async fn insert_work(
    conn: &mut SqliteConnection,
    kind: CatalogKind,
    item: &NewCatalogItem,
) -> Result<i64, sqlx::Error> {
    let path = match (&item.source, kind) {
        (_, CatalogKind::Books) | (ItemSource::Attachment(_), _) => {
            return Err(sqlx::Error::Protocol(format!(
                "{} items must reference a file path",
                kind
            )));
        }
        (ItemSource::Path(path), _) => path,
    };

    let result = sqlx::query(&format!(
        r#"
        INSERT INTO {} (name, author, publisher, genre, description, path, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
        kind.table()
    ))
    .bind(&item.name)
    .bind(&item.author)
    .bind(&item.publisher)
    .bind(&item.genre)
    .bind(&item.description)
    .bind(path)
    .bind(item.created_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Delete every row of a collection before it is rebuilt
///
/// Deleting books also clears faculty links and subjects, which are rebuilt
/// from the same folder tree. Faculties and attachments are kept.
pub async fn delete_all(conn: &mut SqliteConnection, kind: CatalogKind) -> Result<u64, sqlx::Error> {
    let tables: &[&str] = match kind {
        CatalogKind::Books => &["books", "faculty_subjects", "subjects"],
        CatalogKind::LiteraryWorks => &["badiiy"],
        CatalogKind::Audio => &["audio"],
    };

    let mut deleted = 0;
    for table in tables {
        deleted += sqlx::query(&format!("DELETE FROM {}", table))
            .execute(&mut *conn)
            .await?
            .rows_affected();
    }

    Ok(deleted)
}
