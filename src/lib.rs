// Library exports for the CLI and integration tests

pub mod config;
pub mod db;
pub mod import;
pub mod library;
pub mod storage;
