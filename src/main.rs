use catalog_ingest::config::Config;
use catalog_ingest::db::{CatalogKind, Database};
use catalog_ingest::import::{ImportError, ImportReport, ImportService};
use catalog_ingest::library::{catalog_listing, CatalogRegistry, LibraryError};
use catalog_ingest::storage::AttachmentStore;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "catalog-ingest", version, about = "Import the library catalog from folder trees")]
struct Cli {
    /// SQLite database file (overrides CATALOG_DATABASE_PATH)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Append books from the subjects root, copying each file into storage
    Import {
        /// Subjects root (overrides CATALOG_SUBJECTS_ROOT)
        #[arg(long)]
        root: Option<PathBuf>,
        /// Attachment storage directory (overrides CATALOG_STORAGE_ROOT)
        #[arg(long)]
        storage: Option<PathBuf>,
    },
    /// Clear one collection and rebuild it from its root folder
    Refresh {
        #[arg(value_enum)]
        collection: Collection,
        /// Source root (overrides the collection's CATALOG_*_ROOT)
        #[arg(long)]
        root: Option<PathBuf>,
    },
    /// Print row counts for every catalog table
    Stats {
        /// Also list every subject, faculty, book, and work
        #[arg(long)]
        detail: bool,
    },
    /// Link an existing faculty to an existing subject
    Link {
        /// Faculty code, e.g. 60310300
        #[arg(long)]
        faculty: String,
        /// Subject name, exactly as its folder is named
        #[arg(long)]
        subject: String,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Collection {
    Books,
    Literary,
    Audio,
}

impl From<Collection> for CatalogKind {
    fn from(collection: Collection) -> Self {
        match collection {
            Collection::Books => CatalogKind::Books,
            Collection::Literary => CatalogKind::LiteraryWorks,
            Collection::Audio => CatalogKind::Audio,
        }
    }
}

#[derive(Error, Debug)]
enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Import(#[from] ImportError),
    #[error("{0}")]
    Library(#[from] LibraryError),
    #[error("Failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
}

#[tokio::main]
async fn main() {
    // Use RUST_LOG env var if set, otherwise default to info level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let mut config = Config::load();
    if let Some(database) = cli.database {
        config.database_path = database;
    }

    if let Err(e) = run(cli.command, config).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(command: Command, mut config: Config) -> Result<(), CliError> {
    if let Some(parent) = config.database_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let database = Database::new(&config.database_path.to_string_lossy()).await?;

    match &command {
        Command::Stats { detail: false } => {
            let counts = database.counts().await?;
            println!("{}", serde_json::to_string_pretty(&counts)?);
            return Ok(());
        }
        Command::Stats { detail: true } => {
            let attachments = AttachmentStore::local(&config.storage_root);
            let listing = catalog_listing(&database, &attachments).await?;
            println!("{}", serde_json::to_string_pretty(&listing)?);
            return Ok(());
        }
        Command::Link { faculty, subject } => {
            let mut conn = database.acquire().await?;
            let link = CatalogRegistry::new()
                .link_existing(&mut conn, faculty, subject)
                .await?;
            if link.is_none() {
                info!("Faculty {} is already linked to '{}'", faculty, subject);
            }
            return Ok(());
        }
        Command::Import {
            storage: Some(storage),
            ..
        } => config.storage_root = storage.clone(),
        _ => {}
    }

    let service = ImportService::new(database, AttachmentStore::local(&config.storage_root));
    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    let report = match command {
        Command::Import { root, .. } => {
            let root = root.unwrap_or_else(|| config.subjects_root.clone());
            service.run_incremental_import(&root, &cancel).await?
        }
        Command::Refresh { collection, root } => {
            let kind = CatalogKind::from(collection);
            let root = root.unwrap_or_else(|| config.root_for(kind).to_path_buf());
            service.run_full_refresh(kind, &root, &cancel).await?
        }
        Command::Stats { .. } | Command::Link { .. } => return Ok(()),
    };

    print_report(&report)
}

/// Cancel the running import on Ctrl-C; a full refresh then rolls back
fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupted, cancelling import");
                cancel.cancel();
            }
            Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
        }
    });
}

fn print_report(report: &ImportReport) -> Result<(), CliError> {
    info!(
        "Done: {} imported, {} skipped",
        report.imported, report.skipped
    );
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}
