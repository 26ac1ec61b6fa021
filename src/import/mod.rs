// # Import Module
//
// Folder-tree ingestion with focused, testable components:
//
// - **FilenameDecoder**: Parses `name_author_publisher_genre.ext` file names
// - **MappingSheet**: Reads faculty rows from a subject's `yonalish.xlsx`
// - **FolderScanner**: Lists subject folders and item files in a stable order
// - **ImportService**: Orchestrates incremental imports and full refreshes
//
// Public API:
// - `ImportService`: Run an import over a root folder
// - `ImportReport`: Counts produced by a finished run
// - `ImportError`: Why a run (or a single entry) failed

mod filename_decoder;
mod folder_scanner;
mod mapping_sheet;
mod service;
mod types;

// Public API exports
pub use filename_decoder::{decode_filename, CatalogFields, DecodedFilename};
pub use folder_scanner::{ITEMS_DIR, MAPPING_SHEET};
pub use mapping_sheet::{read_mapping_sheet, FacultyMapping, MappingSheet, SheetError, SkippedRow};
pub use service::ImportService;
pub use types::{ImportError, ImportMode, ImportReport};
