//! Catalog registry: find-or-create for subjects, faculties, and their links.
//! Also the full catalog listing behind `stats --detail`.

mod listing;
mod registry;

pub use listing::{catalog_listing, BookListing, CatalogListing, SubjectListing};
pub use registry::{CatalogRegistry, LibraryError};
