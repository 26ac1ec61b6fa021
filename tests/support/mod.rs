use catalog_ingest::db::Database;
use catalog_ingest::import::{ImportService, ITEMS_DIR, MAPPING_SHEET};
use catalog_ingest::storage::{AttachmentStore, FileStorage, LocalFileStorage, StorageError};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Initialize tracing for tests with proper test output handling
pub fn tracing_init() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A fresh database, attachment store, and import service in a temp dir
pub struct TestCatalog {
    pub service: ImportService,
    pub database: Database,
    pub attachments: AttachmentStore,
    pub dir: TempDir,
}

impl TestCatalog {
    pub async fn new() -> Self {
        Self::with_storage(|files| Arc::new(LocalFileStorage::new(files))).await
    }

    /// Like `new`, with attachment storage built from the `files` directory
    pub async fn with_storage<F>(make_storage: F) -> Self
    where
        F: FnOnce(PathBuf) -> Arc<dyn FileStorage>,
    {
        tracing_init();

        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("catalog.db");
        let database = Database::new(db_path.to_str().unwrap())
            .await
            .expect("Failed to create database");
        let attachments = AttachmentStore::from_storage(make_storage(dir.path().join("files")));
        let service = ImportService::new(database.clone(), attachments.clone());

        TestCatalog {
            service,
            database,
            attachments,
            dir,
        }
    }

    /// Path of a source root inside the temp dir (not created)
    pub fn root(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

/// Local storage that refuses to copy one file name
pub struct FailingStorage {
    inner: LocalFileStorage,
    fail_on: String,
}

impl FailingStorage {
    pub fn new(root: PathBuf, fail_on: &str) -> Self {
        FailingStorage {
            inner: LocalFileStorage::new(root),
            fail_on: fail_on.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl FileStorage for FailingStorage {
    async fn put_file(&self, key: &Path, source: &Path) -> Result<u64, StorageError> {
        if key.file_name().and_then(|n| n.to_str()) == Some(self.fail_on.as_str()) {
            return Err(StorageError::Copy {
                path: source.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "disk refused"),
            });
        }
        self.inner.put_file(key, source).await
    }

    async fn remove(&self, key: &Path) -> Result<(), StorageError> {
        self.inner.remove(key).await
    }

    fn locate(&self, key: &Path) -> PathBuf {
        self.inner.locate(key)
    }
}

/// Create `<root>/<subject>/adabiyotlar/` with one file per name
///
/// Each file's content is its own name, so copies can be checked byte for byte.
pub fn write_subject(root: &Path, subject: &str, files: &[&str]) -> PathBuf {
    let subject_dir = root.join(subject);
    let items = subject_dir.join(ITEMS_DIR);
    fs::create_dir_all(&items).unwrap();
    for name in files {
        fs::write(items.join(name), name.as_bytes()).unwrap();
    }
    subject_dir
}

/// Create a flat root with one file per name
pub fn write_flat_root(root: &Path, files: &[&str]) {
    fs::create_dir_all(root).unwrap();
    for name in files {
        fs::write(root.join(name), name.as_bytes()).unwrap();
    }
}

/// Write `yonalish.xlsx` into a subject folder
///
/// Rows are (code, name, education type id); the header row is added here.
pub fn write_mapping_sheet(subject_dir: &Path, rows: &[(f64, &str, Option<f64>)]) {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.write_string(0, 0, "#").unwrap();
    worksheet.write_string(0, 1, "Kod").unwrap();
    worksheet.write_string(0, 2, "Yo'nalish nomi").unwrap();
    worksheet.write_string(0, 3, "Ta'lim turi").unwrap();

    for (i, (code, name, education_type)) in rows.iter().enumerate() {
        let row = i as u32 + 1;
        worksheet.write_number(row, 0, row as f64).unwrap();
        worksheet.write_number(row, 1, *code).unwrap();
        worksheet.write_string(row, 2, *name).unwrap();
        if let Some(education_type) = education_type {
            worksheet.write_number(row, 3, *education_type).unwrap();
        }
    }

    workbook.save(subject_dir.join(MAPPING_SHEET)).unwrap();
}
