mod support;

use catalog_ingest::db::{CatalogCounts, CatalogKind};
use catalog_ingest::import::{ImportError, ImportMode};
use catalog_ingest::library::catalog_listing;
use std::sync::Arc;
use support::{write_flat_root, write_mapping_sheet, write_subject, FailingStorage, TestCatalog};
use tokio_util::sync::CancellationToken;

const VALID_BOOKS: &[&str] = &[
    "Oliver_Dickens_PenguinPress_Classic.pdf",
    "Algebra_Alimov_Oqituvchi_Darslik.docx",
    "Geometriya_Pogorelov_Prosveshenie_Darslik.doc",
];

/// Two subjects, one with a mapping sheet (two good rows, one bad row)
fn build_subjects_tree(catalog: &TestCatalog) -> std::path::PathBuf {
    let root = catalog.root("fanlar");

    let pedagogika = write_subject(&root, "Pedagogika", VALID_BOOKS);
    // The first row has no education type; the third has a text code and is skipped
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 1, "Kod").unwrap();
    sheet.write_number(1, 1, 60110100.0).unwrap();
    sheet.write_string(1, 2, "Pedagogika").unwrap();
    sheet.write_number(2, 1, 70110101.0).unwrap();
    sheet.write_string(2, 2, "Pedagogika nazariyasi").unwrap();
    sheet.write_number(2, 3, 2.0).unwrap();
    sheet.write_string(3, 1, "kod yo'q").unwrap();
    sheet.write_string(3, 2, "Noto'g'ri").unwrap();
    workbook
        .save(pedagogika.join(catalog_ingest::import::MAPPING_SHEET))
        .unwrap();

    write_subject(&root, "Tarix", &["Temur_Yazdiy_Sharq_Tarixiy.pdf"]);
    root
}

#[tokio::test]
async fn test_incremental_import_single_subject() {
    let catalog = TestCatalog::new().await;
    let root = catalog.root("fanlar");
    let mut files = VALID_BOOKS.to_vec();
    files.push("onlytwo_parts.pdf");
    write_subject(&root, "Adabiyot", &files);

    let report = catalog
        .service
        .run_incremental_import(&root, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.mode, ImportMode::Incremental);
    assert_eq!(report.subjects, 1);
    assert_eq!(report.imported, 3);
    assert_eq!(report.skipped, 1);

    let counts = catalog.database.counts().await.unwrap();
    assert_eq!(counts.subjects, 1);
    assert_eq!(counts.books, 3);
    assert_eq!(counts.attachments, 3);

    let subject = catalog.database.get_subjects().await.unwrap().remove(0);
    assert_eq!(subject.name, "Adabiyot");
    assert_eq!(subject.description, None);

    let books = catalog.database.get_books().await.unwrap();
    let oliver = books.iter().find(|b| b.name == "Oliver").unwrap();
    assert_eq!(oliver.author, "Dickens");
    assert_eq!(oliver.publisher, "PenguinPress");
    assert_eq!(oliver.genre, "Classic");

    for book in &books {
        assert_eq!(book.subject_id, Some(subject.id));
        assert_eq!(book.description.as_deref(), Some("Imported from filesystem"));
        assert_eq!(book.path, None);
        assert_eq!(book.has_library_copy, None);

        let attachment_id = book.attachment_id.as_deref().unwrap();
        let attachment = catalog
            .database
            .get_attachment(attachment_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(attachment.prefix, "Adabiyot");

        let source = root.join("Adabiyot").join("adabiyotlar").join(&attachment.name);
        let stored = catalog.attachments.resolve(&attachment);
        assert_eq!(std::fs::read(stored).unwrap(), std::fs::read(source).unwrap());
    }
}

#[tokio::test]
async fn test_incremental_import_twice_duplicates_books() {
    let catalog = TestCatalog::new().await;
    let root = catalog.root("fanlar");
    write_subject(&root, "Adabiyot", VALID_BOOKS);

    for _ in 0..2 {
        catalog
            .service
            .run_incremental_import(&root, &CancellationToken::new())
            .await
            .unwrap();
    }

    let counts = catalog.database.counts().await.unwrap();
    assert_eq!(counts.subjects, 1);
    assert_eq!(counts.books, 6);
    assert_eq!(counts.attachments, 6);
}

#[tokio::test]
async fn test_full_refresh_builds_subjects_faculties_and_books() {
    let catalog = TestCatalog::new().await;
    let root = build_subjects_tree(&catalog);

    let report = catalog
        .service
        .run_full_refresh(CatalogKind::Books, &root, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.mode, ImportMode::FullRefresh);
    assert_eq!(report.subjects, 2);
    assert_eq!(report.imported, 4);
    assert_eq!(report.faculty_links, 2);
    assert_eq!(report.skipped, 1);

    let subjects = catalog.database.get_subjects().await.unwrap();
    assert_eq!(subjects[0].name, "Pedagogika");
    assert_eq!(
        subjects[0].description.as_deref(),
        Some("Description for Pedagogika")
    );

    let faculties = catalog
        .database
        .get_faculties_for_subject(subjects[0].id)
        .await
        .unwrap();
    let codes: Vec<&str> = faculties.iter().map(|f| f.code.as_str()).collect();
    assert_eq!(codes, vec!["60110100", "70110101"]);
    // Missing education type cell defaults to 1
    assert_eq!(faculties[0].education_type_id, 1);
    assert_eq!(faculties[1].education_type_id, 2);

    let books = catalog.database.get_books().await.unwrap();
    let temur = books.iter().find(|b| b.name == "Temur").unwrap();
    assert_eq!(temur.description.as_deref(), Some("Book from Tarix"));
    assert_eq!(temur.attachment_id, None);
    let path = std::path::Path::new(temur.path.as_deref().unwrap());
    assert!(path.is_absolute());
    assert!(path.ends_with("Tarix/adabiyotlar/Temur_Yazdiy_Sharq_Tarixiy.pdf"));

    assert_eq!(catalog.database.counts().await.unwrap().attachments, 0);
}

#[tokio::test]
async fn test_full_refresh_twice_yields_same_counts() {
    let catalog = TestCatalog::new().await;
    let root = build_subjects_tree(&catalog);
    let seeded = catalog.database.counts().await.unwrap().faculties;

    let mut snapshots = Vec::new();
    for _ in 0..2 {
        catalog
            .service
            .run_full_refresh(CatalogKind::Books, &root, &CancellationToken::new())
            .await
            .unwrap();
        snapshots.push(catalog.database.counts().await.unwrap());
    }

    assert_eq!(snapshots[0], snapshots[1]);
    assert_eq!(
        snapshots[0],
        CatalogCounts {
            subjects: 2,
            faculties: seeded + 2,
            faculty_subjects: 2,
            books: 4,
            ..CatalogCounts::default()
        }
    );
}

#[tokio::test]
async fn test_full_refresh_skips_row_with_unknown_education_type() {
    let catalog = TestCatalog::new().await;
    let seeded = catalog.database.counts().await.unwrap().faculties;
    let root = catalog.root("fanlar");
    let subject_dir = write_subject(&root, "Musiqa", &["Maqom_Rajabiy_Fan_Ilmiy.pdf"]);
    write_mapping_sheet(
        &subject_dir,
        &[
            (60230100.0, "Musiqa ijrochiligi", Some(9.0)),
            (60211400.0, "Cholg'u ijrochiligi", Some(1.0)),
        ],
    );

    let report = catalog
        .service
        .run_full_refresh(CatalogKind::Books, &root, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.faculty_links, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.imported, 1);

    let faculties = catalog.database.get_faculties().await.unwrap();
    assert_eq!(faculties.len() as i64, seeded + 1);
    assert!(faculties.iter().any(|f| f.code == "60211400"));
    assert!(!faculties.iter().any(|f| f.code == "60230100"));
}

#[tokio::test]
async fn test_sheet_row_with_seeded_code_keeps_canonical_name() {
    let catalog = TestCatalog::new().await;
    let seeded = catalog.database.counts().await.unwrap().faculties;
    let root = catalog.root("fanlar");
    let subject_dir = write_subject(&root, "Psixologiya", &["Shaxs_Goziyev_Fan_Darslik.pdf"]);
    write_mapping_sheet(&subject_dir, &[(60310300.0, "Psixologiya", Some(2.0))]);

    let report = catalog
        .service
        .run_full_refresh(CatalogKind::Books, &root, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.faculty_links, 1);
    assert_eq!(report.skipped, 0);

    let subject = catalog.database.get_subjects().await.unwrap().remove(0);
    let linked = catalog
        .database
        .get_faculties_for_subject(subject.id)
        .await
        .unwrap();
    assert_eq!(linked.len(), 1);
    assert_eq!(linked[0].code, "60310300");
    assert_eq!(linked[0].name, "Psixologiya (faoliyat turlari bo’yicha)");
    assert_eq!(linked[0].education_type_id, 1);
    assert_eq!(catalog.database.counts().await.unwrap().faculties, seeded);
}

#[tokio::test]
async fn test_full_refresh_skips_corrupt_mapping_sheet() {
    let catalog = TestCatalog::new().await;
    let root = catalog.root("fanlar");
    let subject_dir = write_subject(&root, "Pedagogika", &VALID_BOOKS[..2]);
    std::fs::write(
        subject_dir.join(catalog_ingest::import::MAPPING_SHEET),
        b"this is not a workbook",
    )
    .unwrap();

    let report = catalog
        .service
        .run_full_refresh(CatalogKind::Books, &root, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.subjects, 1);
    assert_eq!(report.imported, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.faculty_links, 0);

    let counts = catalog.database.counts().await.unwrap();
    assert_eq!(counts.books, 2);
    assert_eq!(counts.faculty_subjects, 0);
}

#[tokio::test]
async fn test_incremental_import_skips_failed_copy_and_continues() {
    let refused = VALID_BOOKS[1];
    let catalog = TestCatalog::with_storage(|files| Arc::new(FailingStorage::new(files, refused))).await;
    let root = catalog.root("fanlar");
    write_subject(&root, "Adabiyot", VALID_BOOKS);
    write_subject(&root, "Tarix", &["Temur_Yazdiy_Sharq_Tarixiy.pdf"]);

    let report = catalog
        .service
        .run_incremental_import(&root, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.subjects, 2);
    assert_eq!(report.imported, 3);
    assert_eq!(report.skipped, 1);

    let counts = catalog.database.counts().await.unwrap();
    assert_eq!(counts.books, 3);
    assert_eq!(counts.attachments, 3);

    let books = catalog.database.get_books().await.unwrap();
    assert!(!books.iter().any(|b| b.name == "Algebra"));
    assert!(books.iter().any(|b| b.name == "Geometriya"));
    assert!(books.iter().any(|b| b.name == "Temur"));
}

#[tokio::test]
async fn test_full_refresh_missing_root_deletes_nothing() {
    let catalog = TestCatalog::new().await;
    let root = build_subjects_tree(&catalog);
    catalog
        .service
        .run_full_refresh(CatalogKind::Books, &root, &CancellationToken::new())
        .await
        .unwrap();
    let before = catalog.database.counts().await.unwrap();

    let err = catalog
        .service
        .run_full_refresh(
            CatalogKind::Books,
            &catalog.root("missing"),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ImportError::BadInput(_)));
    assert_eq!(catalog.database.counts().await.unwrap(), before);
}

#[tokio::test]
async fn test_cancelled_full_refresh_keeps_previous_catalog() {
    let catalog = TestCatalog::new().await;
    let root = build_subjects_tree(&catalog);
    catalog
        .service
        .run_full_refresh(CatalogKind::Books, &root, &CancellationToken::new())
        .await
        .unwrap();
    let before = catalog.database.counts().await.unwrap();
    let books_before = catalog.database.get_books().await.unwrap();

    // Add more books, then cancel the rebuild before it can commit
    write_subject(&root, "Kimyo", &["Atom_Mendeleyev_Fan_Darslik.pdf"]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = catalog
        .service
        .run_full_refresh(CatalogKind::Books, &root, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, ImportError::Cancelled));
    assert_eq!(catalog.database.counts().await.unwrap(), before);
    assert_eq!(catalog.database.get_books().await.unwrap(), books_before);
}

#[tokio::test]
async fn test_concurrent_run_is_rejected() {
    let catalog = TestCatalog::new().await;
    let root = build_subjects_tree(&catalog);
    let other = catalog.service.clone();
    let cancel = CancellationToken::new();

    let (first, second) = tokio::join!(
        catalog
            .service
            .run_full_refresh(CatalogKind::Books, &root, &cancel),
        other.run_incremental_import(&root, &cancel),
    );

    assert!(first.is_ok());
    assert!(matches!(second, Err(ImportError::AlreadyRunning)));

    // The lock is released once the first run finishes
    catalog
        .service
        .run_incremental_import(&root, &cancel)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_literary_refresh_replaces_only_badiiy() {
    let catalog = TestCatalog::new().await;
    let subjects = build_subjects_tree(&catalog);
    catalog
        .service
        .run_full_refresh(CatalogKind::Books, &subjects, &CancellationToken::new())
        .await
        .unwrap();

    let badiiy = catalog.root("badiiy");
    write_flat_root(
        &badiiy,
        &[
            "Otkan kunlar_Qodiriy_Sharq_Roman.pdf",
            "Kecha va kunduz_Cholpon_Yangi asr avlodi_Roman.docx",
            "README",
        ],
    );

    let first = catalog
        .service
        .run_full_refresh(CatalogKind::LiteraryWorks, &badiiy, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(first.kind, CatalogKind::LiteraryWorks);
    assert_eq!(first.imported, 2);
    assert_eq!(first.skipped, 1);

    let second = catalog
        .service
        .run_full_refresh(CatalogKind::LiteraryWorks, &badiiy, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(second.imported, 2);

    let counts = catalog.database.counts().await.unwrap();
    assert_eq!(counts.badiiy, 2);
    assert_eq!(counts.books, 4);
    assert_eq!(counts.audio, 0);

    let works = catalog
        .database
        .get_works(CatalogKind::LiteraryWorks)
        .await
        .unwrap();
    let names: Vec<&str> = works.iter().map(|w| w.name.as_str()).collect();
    assert_eq!(names, vec!["Kecha va kunduz", "Otkan kunlar"]);
    assert!(works
        .iter()
        .all(|w| w.description.as_deref() == Some("Badiiy book from folder")));
}

#[tokio::test]
async fn test_catalog_listing_points_at_files() {
    let catalog = TestCatalog::new().await;
    let subjects = build_subjects_tree(&catalog);
    catalog
        .service
        .run_full_refresh(CatalogKind::Books, &subjects, &CancellationToken::new())
        .await
        .unwrap();
    let extra = catalog.root("qoshimcha");
    write_subject(&extra, "Kimyo", &["Atom_Mendeleyev_Fan_Darslik.pdf"]);
    catalog
        .service
        .run_incremental_import(&extra, &CancellationToken::new())
        .await
        .unwrap();

    let listing = catalog_listing(&catalog.database, &catalog.attachments)
        .await
        .unwrap();

    assert_eq!(listing.counts, catalog.database.counts().await.unwrap());
    assert_eq!(listing.books.len(), 5);
    assert_eq!(listing.faculties.len() as i64, listing.counts.faculties);

    let pedagogika = listing
        .subjects
        .iter()
        .find(|s| s.subject.name == "Pedagogika")
        .unwrap();
    assert_eq!(pedagogika.faculties, vec!["60110100", "70110101"]);

    // Both path books and attached books resolve to readable files
    for entry in &listing.books {
        let file = entry.file.as_deref().unwrap();
        assert!(file.is_file(), "{} is missing", file.display());
    }
    let atom = listing.books.iter().find(|b| b.book.name == "Atom").unwrap();
    assert!(atom.file.as_deref().unwrap().starts_with(catalog.dir.path().join("files")));
}
