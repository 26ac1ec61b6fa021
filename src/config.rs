use crate::db::CatalogKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const DEFAULT_STORAGE_ROOT: &str = "backend/files";
const DEFAULT_SUBJECTS_ROOT: &str = "./fanlar";
const DEFAULT_LITERARY_ROOT: &str = "./badiiy";
const DEFAULT_AUDIO_ROOT: &str = "./audio";
const DATABASE_FILE: &str = "catalog.db";

/// Application configuration
///
/// Loaded from the environment, optionally seeded by a `.env` file. Roots are
/// only defaults: every run receives its root explicitly.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// SQLite database file
    pub database_path: PathBuf,
    /// Directory attachments are copied into
    pub storage_root: PathBuf,
    /// One folder per subject (`fanlar`)
    pub subjects_root: PathBuf,
    /// Flat folder of literary works (`badiiy`)
    pub literary_root: PathBuf,
    /// Flat folder of audio works
    pub audio_root: PathBuf,
}

impl Config {
    /// Load `.env` if present, then read the environment
    pub fn load() -> Self {
        match dotenvy::dotenv() {
            Ok(path) => info!("Config: loaded {}", path.display()),
            Err(_) => debug!("Config: no .env file found, using environment only"),
        }

        Self::from_env()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let path = |key: &str| {
            lookup(key)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        };

        let config = Config {
            database_path: path("CATALOG_DATABASE_PATH").unwrap_or_else(default_database_path),
            storage_root: path("CATALOG_STORAGE_ROOT")
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_ROOT)),
            subjects_root: path("CATALOG_SUBJECTS_ROOT")
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SUBJECTS_ROOT)),
            literary_root: path("CATALOG_LITERARY_ROOT")
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LITERARY_ROOT)),
            audio_root: path("CATALOG_AUDIO_ROOT")
                .unwrap_or_else(|| PathBuf::from(DEFAULT_AUDIO_ROOT)),
        };

        debug!("Config: {:?}", config);
        config
    }

    /// Default source root for a collection
    pub fn root_for(&self, kind: CatalogKind) -> &Path {
        match kind {
            CatalogKind::Books => &self.subjects_root,
            CatalogKind::LiteraryWorks => &self.literary_root,
            CatalogKind::Audio => &self.audio_root,
        }
    }
}

/// `<data dir>/catalog-ingest/catalog.db`, or `catalog.db` in the working
/// directory when the platform has no data dir
fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("catalog-ingest").join(DATABASE_FILE))
        .unwrap_or_else(|| PathBuf::from(DATABASE_FILE))
}
