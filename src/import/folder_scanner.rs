//! Folder scanner for the catalog source trees.
//!
//! Supports two layouts:
//! 1. Subjects root - one directory per subject, each with an optional
//!    `yonalish.xlsx` mapping sheet and an optional `adabiyotlar/` folder of
//!    item files
//! 2. Flat root - item files directly under the root (literary and audio works)
//!
//! Listings are sorted by name so runs over the same tree are reproducible.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Folder holding a subject's item files
pub const ITEMS_DIR: &str = "adabiyotlar";
/// Per-subject faculty mapping sheet
pub const MAPPING_SHEET: &str = "yonalish.xlsx";

const NOISE_FILES: &[&str] = &[".DS_Store", "Thumbs.db", "desktop.ini"];

/// A subject directory discovered under the subjects root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectFolder {
    /// Directory name, used verbatim as the subject name
    pub name: String,
    pub path: PathBuf,
    /// Present when the folder contains `yonalish.xlsx`
    pub mapping_sheet: Option<PathBuf>,
    /// Regular files directly under `adabiyotlar/`, sorted by name
    pub item_files: Vec<PathBuf>,
}

/// Check that a run root exists and is a directory
pub fn validate_root(root: &Path) -> Result<(), String> {
    if !root.exists() {
        return Err(format!("{} does not exist", root.display()));
    }
    if !root.is_dir() {
        return Err(format!("{} is not a directory", root.display()));
    }
    Ok(())
}

/// Check if a file is noise (.DS_Store, Thumbs.db, etc.)
fn is_noise_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|name| NOISE_FILES.contains(&name))
        .unwrap_or(false)
}

fn sorted_entries(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)?.map(|entry| entry.map(|e| e.path()));
    let mut paths = readable_entries(dir, entries);
    paths.sort();
    Ok(paths)
}

/// Keep the entries that could be read; an unreadable one is logged and left out
fn readable_entries(
    dir: &Path,
    entries: impl Iterator<Item = io::Result<PathBuf>>,
) -> Vec<PathBuf> {
    entries
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Unreadable entry in {}: {}", dir.display(), e);
                None
            }
        })
        .collect()
}

/// List the regular files directly under `dir`, sorted, without noise files
///
/// Used for the flat literary and audio roots and for `adabiyotlar/`.
pub fn list_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let files: Vec<PathBuf> = sorted_entries(dir)?
        .into_iter()
        .filter(|path| path.is_file() && !is_noise_file(path))
        .collect();

    debug!("Found {} files in {}", files.len(), dir.display());
    Ok(files)
}

/// Describe one subject directory
pub fn scan_subject(path: &Path) -> io::Result<SubjectFolder> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("subject folder name is not valid UTF-8: {}", path.display()),
            )
        })?;

    let sheet = path.join(MAPPING_SHEET);
    let mapping_sheet = sheet.is_file().then_some(sheet);

    let items_dir = path.join(ITEMS_DIR);
    let item_files = if items_dir.is_dir() {
        list_files(&items_dir)?
    } else {
        debug!("Subject '{}' has no {} folder", name, ITEMS_DIR);
        Vec::new()
    };

    Ok(SubjectFolder {
        name,
        path: path.to_path_buf(),
        mapping_sheet,
        item_files,
    })
}

/// List subject directories under the subjects root, sorted by name
///
/// Only directories are returned; loose files at the root are ignored.
pub fn list_subject_dirs(root: &Path) -> io::Result<Vec<PathBuf>> {
    let dirs: Vec<PathBuf> = sorted_entries(root)?
        .into_iter()
        .filter(|path| path.is_dir())
        .collect();

    info!("Found {} subject folders in {}", dirs.len(), root.display());
    Ok(dirs)
}
