use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use std::str::FromStr;
use tracing::info;

use crate::db::models::*;

// Education types the catalog starts with (keep ids stable, mapping sheets refer to them)
const SEED_EDUCATION_TYPES: &[(i64, &str)] = &[(1, "Bakalavr"), (2, "Magistr")];

// Canonical faculties (code, name), all Bakalavr. Seeded into an empty table
// only; they win over mapping-sheet rows with the same code.
pub(crate) const SEED_FACULTIES: &[(&str, &str)] = &[
    ("60310300", "Psixologiya (faoliyat turlari bo’yicha)"),
    ("60110900", "Xorijiy til va adabiyoti (tillar bo’yicha)"),
    ("60410100", "Iqtisodiyot (tarmoqlar va sohalar bo’yicha)"),
    ("60110700", "O’zbek tili va adabiyoti"),
    ("60220300", "Tarix (mamlakatlar va yo'nalishlar bo’yicha)"),
    ("60110600", "Musiqa ta'limi"),
    ("60110200", "Maktabgacha ta`lim"),
    ("60110400", "Boshlang'ich ta`lim"),
    ("60111200", "Jismoniy madaniyat"),
    ("60111100", "Milliy g’oya, ma’naviyat asoslari va huquq ta’limi"),
    (
        "60610100",
        "Kompyuter ilmlari va dasturlash texnologiyalari (yo’nalishlar bo’yicha)",
    ),
    ("61010100", "Turizm (faoliyat yo’nalishlari bo’yicha)"),
];
const SEED_FACULTY_EDUCATION_TYPE: i64 = 1;

#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Initialize database connection and create tables
    pub async fn new(database_path: &str) -> Result<Self, sqlx::Error> {
        // Use sqlite:// with ?mode=rwc to create if it doesn't exist
        let database_url = format!("sqlite://{}?mode=rwc", database_path);
        info!("Connecting to {}", database_url);

        // WAL lets readers keep seeing the last committed catalog while a
        // full refresh is rebuilding inside its transaction
        let options =
            SqliteConnectOptions::from_str(&database_url)?.journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePool::connect_with(options).await?;

        let db = Database { pool };
        db.create_tables().await?;
        db.seed_education_types().await?;
        db.seed_faculties().await?;
        Ok(db)
    }

    /// Borrow a pooled connection for auto-committed work
    pub async fn acquire(&self) -> Result<PoolConnection<Sqlite>, sqlx::Error> {
        self.pool.acquire().await
    }

    /// Start a transaction; nothing written through it is visible until commit
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
        self.pool.begin().await
    }

    /// Create all necessary tables
    async fn create_tables(&self) -> Result<(), sqlx::Error> {
        // Subjects table (one per subject folder)
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS subjects (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                description TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Education types (static reference set)
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS education_types (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS faculties (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                code TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                education_type_id INTEGER NOT NULL,
                FOREIGN KEY (education_type_id) REFERENCES education_types (id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Faculty-Subject junction table
        // No UNIQUE(faculty_id, subject_id): callers decide whether to check first
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS faculty_subjects (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                faculty_id INTEGER NOT NULL,
                subject_id INTEGER NOT NULL,
                FOREIGN KEY (faculty_id) REFERENCES faculties (id) ON DELETE CASCADE,
                FOREIGN KEY (subject_id) REFERENCES subjects (id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS attachments (
                id TEXT PRIMARY KEY,
                prefix TEXT NOT NULL,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS books (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                subject_id INTEGER,
                name TEXT NOT NULL,
                author TEXT NOT NULL,
                publisher TEXT NOT NULL,
                genre TEXT NOT NULL,
                description TEXT,
                path TEXT,
                attachment_id TEXT,
                has_library_copy BOOLEAN,
                library_count INTEGER,
                created_at TEXT NOT NULL,
                FOREIGN KEY (subject_id) REFERENCES subjects (id),
                FOREIGN KEY (attachment_id) REFERENCES attachments (id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Literary works and audio works share a shape
        for table in [CatalogKind::LiteraryWorks.table(), CatalogKind::Audio.table()] {
            sqlx::query(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    author TEXT NOT NULL,
                    publisher TEXT NOT NULL,
                    genre TEXT NOT NULL,
                    description TEXT,
                    path TEXT NOT NULL,
                    created_at TEXT NOT NULL
                )
                "#,
                table
            ))
            .execute(&self.pool)
            .await?;
        }

        // Create indexes for performance
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_books_subject_id ON books (subject_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_faculty_subjects_faculty_id ON faculty_subjects (faculty_id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_faculty_subjects_subject_id ON faculty_subjects (subject_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Seed the education type reference set (no-op when already present)
    async fn seed_education_types(&self) -> Result<(), sqlx::Error> {
        for (id, name) in SEED_EDUCATION_TYPES {
            sqlx::query("INSERT OR IGNORE INTO education_types (id, name) VALUES (?, ?)")
                .bind(id)
                .bind(name)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    /// Seed the canonical faculties when the table is empty
    ///
    /// A catalog that already has faculties (seeded or imported) is left alone.
    async fn seed_faculties(&self) -> Result<(), sqlx::Error> {
        let existing: i64 = sqlx::query("SELECT COUNT(*) AS count FROM faculties")
            .fetch_one(&self.pool)
            .await?
            .get("count");
        if existing > 0 {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for (code, name) in SEED_FACULTIES {
            sqlx::query("INSERT INTO faculties (code, name, education_type_id) VALUES (?, ?, ?)")
                .bind(code)
                .bind(name)
                .bind(SEED_FACULTY_EDUCATION_TYPE)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        info!("Seeded {} faculties", SEED_FACULTIES.len());
        Ok(())
    }

    /// Row counts for every catalog table
    pub async fn counts(&self) -> Result<CatalogCounts, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM subjects) AS subjects,
                (SELECT COUNT(*) FROM faculties) AS faculties,
                (SELECT COUNT(*) FROM faculty_subjects) AS faculty_subjects,
                (SELECT COUNT(*) FROM books) AS books,
                (SELECT COUNT(*) FROM badiiy) AS badiiy,
                (SELECT COUNT(*) FROM audio) AS audio,
                (SELECT COUNT(*) FROM attachments) AS attachments
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(CatalogCounts {
            subjects: row.get("subjects"),
            faculties: row.get("faculties"),
            faculty_subjects: row.get("faculty_subjects"),
            books: row.get("books"),
            badiiy: row.get("badiiy"),
            audio: row.get("audio"),
            attachments: row.get("attachments"),
        })
    }

    /// Get all subjects ordered by name
    pub async fn get_subjects(&self) -> Result<Vec<DbSubject>, sqlx::Error> {
        let rows = sqlx::query("SELECT * FROM subjects ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(subject_from_row).collect()
    }

    /// Get all faculties ordered by code
    pub async fn get_faculties(&self) -> Result<Vec<DbFaculty>, sqlx::Error> {
        let rows = sqlx::query("SELECT * FROM faculties ORDER BY code")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(faculty_from_row).collect())
    }

    /// Get faculties linked to a subject (one entry per association row)
    pub async fn get_faculties_for_subject(
        &self,
        subject_id: i64,
    ) -> Result<Vec<DbFaculty>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT f.* FROM faculties f
            JOIN faculty_subjects fs ON f.id = fs.faculty_id
            WHERE fs.subject_id = ?
            ORDER BY f.code
            "#,
        )
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(faculty_from_row).collect())
    }

    /// Get all books, oldest first
    pub async fn get_books(&self) -> Result<Vec<DbBook>, sqlx::Error> {
        let rows = sqlx::query("SELECT * FROM books ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(book_from_row).collect()
    }

    /// Get all literary works or audio works, oldest first
    pub async fn get_works(&self, kind: CatalogKind) -> Result<Vec<DbWork>, sqlx::Error> {
        let rows = sqlx::query(&format!("SELECT * FROM {} ORDER BY id", kind.table()))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(work_from_row).collect()
    }

    /// Get a stored attachment by id
    pub async fn get_attachment(
        &self,
        attachment_id: &str,
    ) -> Result<Option<DbAttachment>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM attachments WHERE id = ?")
            .bind(attachment_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(attachment_from_row).transpose()
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

pub(crate) fn subject_from_row(row: &SqliteRow) -> Result<DbSubject, sqlx::Error> {
    Ok(DbSubject {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
        updated_at: parse_timestamp(&row.get::<String, _>("updated_at"))?,
    })
}

pub(crate) fn faculty_from_row(row: &SqliteRow) -> DbFaculty {
    DbFaculty {
        id: row.get("id"),
        code: row.get("code"),
        name: row.get("name"),
        education_type_id: row.get("education_type_id"),
    }
}

fn attachment_from_row(row: &SqliteRow) -> Result<DbAttachment, sqlx::Error> {
    Ok(DbAttachment {
        id: row.get("id"),
        prefix: row.get("prefix"),
        name: row.get("name"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
    })
}

fn book_from_row(row: &SqliteRow) -> Result<DbBook, sqlx::Error> {
    Ok(DbBook {
        id: row.get("id"),
        subject_id: row.get("subject_id"),
        name: row.get("name"),
        author: row.get("author"),
        publisher: row.get("publisher"),
        genre: row.get("genre"),
        description: row.get("description"),
        path: row.get("path"),
        attachment_id: row.get("attachment_id"),
        has_library_copy: row.get("has_library_copy"),
        library_count: row.get("library_count"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
    })
}

fn work_from_row(row: &SqliteRow) -> Result<DbWork, sqlx::Error> {
    Ok(DbWork {
        id: row.get("id"),
        name: row.get("name"),
        author: row.get("author"),
        publisher: row.get("publisher"),
        genre: row.get("genre"),
        description: row.get("description"),
        path: row.get("path"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
    })
}
