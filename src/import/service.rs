// # Import Service - Orchestrator
//
// Walks a source tree and reconciles it with the catalog in one of two modes:
// - Incremental: subject folders become subjects, files under `adabiyotlar/`
//   become books with a copied attachment; nothing is deleted
// - Full refresh: the target collection is cleared and rebuilt from the tree
//   inside a single transaction, so readers keep the old catalog until commit
//
// Per-file and per-row problems are logged and counted as skipped. Bad input,
// store failures, and cancellation end the run.

use crate::db::{store, CatalogKind, Database, DbSubject, ItemSource, NewCatalogItem};
use crate::import::filename_decoder::{decode_filename, CatalogFields, DecodedFilename};
use crate::import::folder_scanner::{
    list_files, list_subject_dirs, scan_subject, validate_root, SubjectFolder,
};
use crate::import::mapping_sheet::{read_mapping_sheet, MappingSheet};
use crate::import::types::{ImportError, ImportMode, ImportReport};
use crate::library::{CatalogRegistry, LibraryError};
use crate::storage::AttachmentStore;
use chrono::Utc;
use sqlx::SqliteConnection;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const INCREMENTAL_DESCRIPTION: &str = "Imported from filesystem";
const LITERARY_DESCRIPTION: &str = "Badiiy book from folder";
const AUDIO_DESCRIPTION: &str = "Audio book from folder";

/// Runs catalog imports, one at a time
///
/// Clones share the same run lock, so a second run started through any clone
/// fails with `AlreadyRunning` while the first is in progress.
#[derive(Clone, Debug)]
pub struct ImportService {
    database: Database,
    attachments: AttachmentStore,
    run_lock: Arc<Mutex<()>>,
}

impl ImportService {
    pub fn new(database: Database, attachments: AttachmentStore) -> Self {
        ImportService {
            database,
            attachments,
            run_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Import books from a subjects root, copying every file into attachment storage
    ///
    /// Existing rows are never removed, so running twice over the same tree
    /// stores every book twice. When cancelled, rows already written stay.
    pub async fn run_incremental_import(
        &self,
        root: &Path,
        cancel: &CancellationToken,
    ) -> Result<ImportReport, ImportError> {
        let _running = self
            .run_lock
            .try_lock()
            .map_err(|_| ImportError::AlreadyRunning)?;
        validate_root(root).map_err(ImportError::BadInput)?;

        info!("Starting incremental import from {}", root.display());
        let started = Instant::now();
        let mut report = ImportReport::new(CatalogKind::Books, ImportMode::Incremental);
        let mut registry = CatalogRegistry::new();
        let mut conn = self.database.acquire().await?;

        for dir in list_subject_dirs(root)? {
            check_cancelled(cancel)?;

            let Some(folder) = scan_or_skip(&dir, &mut report) else {
                continue;
            };
            let subject = registry
                .find_or_create_subject(&mut conn, &folder.name, None)
                .await?;
            report.subjects += 1;

            for file in &folder.item_files {
                check_cancelled(cancel)?;
                let result = self.import_attached_book(&mut conn, &subject, file).await;
                record_item(&mut report, file, result)?;
            }
        }

        report.duration = started.elapsed();
        log_report(&report);
        Ok(report)
    }

    /// Clear one collection and rebuild it from `root`
    ///
    /// The whole rebuild runs in one transaction. If the walk fails or is
    /// cancelled the transaction is rolled back and the previous catalog is
    /// left exactly as it was.
    pub async fn run_full_refresh(
        &self,
        kind: CatalogKind,
        root: &Path,
        cancel: &CancellationToken,
    ) -> Result<ImportReport, ImportError> {
        let _running = self
            .run_lock
            .try_lock()
            .map_err(|_| ImportError::AlreadyRunning)?;
        validate_root(root).map_err(ImportError::BadInput)?;

        info!("Starting full refresh of {} from {}", kind, root.display());
        let started = Instant::now();
        let mut report = ImportReport::new(kind, ImportMode::FullRefresh);
        let mut tx = self.database.begin().await?;

        let rebuilt = async {
            let deleted = store::delete_all(&mut tx, kind).await?;
            debug!("Cleared {} rows for {}", deleted, kind);

            let walked = match kind {
                CatalogKind::Books => rebuild_books(&mut tx, root, cancel, &mut report).await,
                CatalogKind::LiteraryWorks | CatalogKind::Audio => {
                    rebuild_works(&mut tx, kind, root, cancel, &mut report).await
                }
            };
            walked?;

            // Last chance to back out before the new catalog becomes visible
            check_cancelled(cancel)
        }
        .await;

        if let Err(e) = rebuilt {
            warn!("Full refresh of {} aborted, rolling back: {}", kind, e);
            if let Err(rollback) = tx.rollback().await {
                warn!("Rollback failed: {}", rollback);
            }
            return Err(e);
        }

        tx.commit().await?;

        report.duration = started.elapsed();
        log_report(&report);
        Ok(report)
    }

    /// Decode, copy, and save one book for the incremental import
    async fn import_attached_book(
        &self,
        conn: &mut SqliteConnection,
        subject: &DbSubject,
        file: &Path,
    ) -> Result<(), ImportError> {
        let fields = decode_file(file)?;
        let attachment = self
            .attachments
            .store_file(conn, file, &subject.name)
            .await?;

        let item = new_item(fields, INCREMENTAL_DESCRIPTION, ItemSource::Attachment(attachment.id));
        let book_id = store::insert_book(conn, Some(subject.id), &item).await?;
        debug!("Saved book {} '{}'", book_id, item.name);
        Ok(())
    }
}

/// Rebuild subjects, faculty links, and books from a subjects root
async fn rebuild_books(
    conn: &mut SqliteConnection,
    root: &Path,
    cancel: &CancellationToken,
    report: &mut ImportReport,
) -> Result<(), ImportError> {
    let mut registry = CatalogRegistry::new();

    for dir in list_subject_dirs(root)? {
        check_cancelled(cancel)?;

        let Some(folder) = scan_or_skip(&dir, report) else {
            continue;
        };
        let description = format!("Description for {}", folder.name);
        let subject = registry
            .find_or_create_subject(conn, &folder.name, Some(description.as_str()))
            .await?;
        report.subjects += 1;

        if let Some(sheet_path) = &folder.mapping_sheet {
            match load_mapping_sheet(sheet_path).await {
                Ok(sheet) => {
                    link_faculties(conn, &mut registry, &subject, sheet, report).await?
                }
                Err(e) => {
                    warn!("Skipping mapping sheet {}: {}", sheet_path.display(), e);
                    report.skipped += 1;
                }
            }
        }

        let description = format!("Book from {}", subject.name);
        for file in &folder.item_files {
            check_cancelled(cancel)?;
            let result = save_path_book(conn, &subject, file, &description).await;
            record_item(report, file, result)?;
        }
    }

    Ok(())
}

/// Rebuild literary works or audio works from the files directly under `root`
async fn rebuild_works(
    conn: &mut SqliteConnection,
    kind: CatalogKind,
    root: &Path,
    cancel: &CancellationToken,
    report: &mut ImportReport,
) -> Result<(), ImportError> {
    let description = match kind {
        CatalogKind::Audio => AUDIO_DESCRIPTION,
        _ => LITERARY_DESCRIPTION,
    };

    for file in list_files(root)? {
        check_cancelled(cancel)?;
        let result = save_path_work(conn, kind, &file, description).await;
        record_item(report, &file, result)?;
    }

    Ok(())
}

/// Create the sheet's faculties and link each one to the subject
///
/// A row whose education type does not exist is skipped; the rest of the
/// sheet is still applied.
async fn link_faculties(
    conn: &mut SqliteConnection,
    registry: &mut CatalogRegistry,
    subject: &DbSubject,
    sheet: MappingSheet,
    report: &mut ImportReport,
) -> Result<(), ImportError> {
    report.skipped += sheet.skipped.len();

    for mapping in sheet.mappings {
        let faculty = match registry
            .find_or_create_faculty(conn, &mapping.code, &mapping.name, mapping.education_type_id)
            .await
        {
            Ok(faculty) => faculty,
            Err(e @ LibraryError::ReferenceNotFound { .. }) => {
                warn!("Skipping faculty {} for '{}': {}", mapping.code, subject.name, e);
                report.skipped += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        registry.link_faculty_subject(conn, &faculty, subject).await?;
        report.faculty_links += 1;
    }

    Ok(())
}

async fn save_path_book(
    conn: &mut SqliteConnection,
    subject: &DbSubject,
    file: &Path,
    description: &str,
) -> Result<(), ImportError> {
    let fields = decode_file(file)?;
    let path = absolute_path(file).await?;

    let item = new_item(fields, description, ItemSource::Path(path));
    let book_id = store::insert_book(conn, Some(subject.id), &item).await?;
    debug!("Saved book {} '{}'", book_id, item.name);
    Ok(())
}

async fn save_path_work(
    conn: &mut SqliteConnection,
    kind: CatalogKind,
    file: &Path,
    description: &str,
) -> Result<(), ImportError> {
    let fields = decode_file(file)?;
    let path = absolute_path(file).await?;

    let item = new_item(fields, description, ItemSource::Path(path));
    let work_id = store::insert_work(conn, kind, &item).await?;
    debug!("Saved {} {} '{}'", kind, work_id, item.name);
    Ok(())
}

fn decode_file(file: &Path) -> Result<CatalogFields, ImportError> {
    let file_name = file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ImportError::MalformedEntry {
            entry: file.display().to_string(),
            reason: "file name is not valid UTF-8".to_string(),
        })?;

    match decode_filename(file_name) {
        DecodedFilename::Decoded(fields) => Ok(fields),
        DecodedFilename::Malformed { reason } => Err(ImportError::MalformedEntry {
            entry: file_name.to_string(),
            reason,
        }),
    }
}

fn new_item(fields: CatalogFields, description: &str, source: ItemSource) -> NewCatalogItem {
    NewCatalogItem {
        name: fields.name,
        author: fields.author,
        publisher: fields.publisher,
        genre: fields.genre,
        description: description.to_string(),
        created_at: Utc::now(),
        source,
    }
}

async fn absolute_path(file: &Path) -> Result<String, ImportError> {
    let path = tokio::fs::canonicalize(file).await?;
    path.into_os_string().into_string().map_err(|raw| {
        ImportError::MalformedEntry {
            entry: PathBuf::from(raw).display().to_string(),
            reason: "path is not valid UTF-8".to_string(),
        }
    })
}

/// Parse a mapping sheet off the async runtime
async fn load_mapping_sheet(path: &Path) -> Result<MappingSheet, ImportError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || read_mapping_sheet(&path))
        .await
        .map_err(|e| ImportError::IoFailure(format!("mapping sheet task failed: {}", e)))?
        .map_err(ImportError::from)
}

fn scan_or_skip(dir: &Path, report: &mut ImportReport) -> Option<SubjectFolder> {
    match scan_subject(dir) {
        Ok(folder) => Some(folder),
        Err(e) => {
            warn!("Skipping subject folder {}: {}", dir.display(), e);
            report.skipped += 1;
            None
        }
    }
}

/// Count one item result; only fatal errors escape
fn record_item(
    report: &mut ImportReport,
    file: &Path,
    result: Result<(), ImportError>,
) -> Result<(), ImportError> {
    match result {
        Ok(()) => report.imported += 1,
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            warn!("Skipping {}: {}", file.display(), e);
            report.skipped += 1;
        }
    }
    Ok(())
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), ImportError> {
    if cancel.is_cancelled() {
        return Err(ImportError::Cancelled);
    }
    Ok(())
}

fn log_report(report: &ImportReport) {
    info!(
        "{:?} import of {} finished in {:?}: {} subjects, {} imported, {} skipped, {} faculty links",
        report.mode,
        report.kind,
        report.duration,
        report.subjects,
        report.imported,
        report.skipped,
        report.faculty_links
    );
}
