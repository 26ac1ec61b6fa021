mod client;
mod models;
pub mod store;

pub use client::Database;
pub(crate) use client::SEED_FACULTIES;
pub use models::*;
