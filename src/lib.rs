//! Family Films Catalog Library
//!
//! This library exposes the internal modules for the server, the admin CLI
//! and the end-to-end tests.

pub mod catalog_export;
pub mod catalog_store;
pub mod config;
pub mod curation;
pub mod genealogy;
pub mod import;
pub mod server;
pub mod sqlite_persistence;
pub mod user;

// Re-export commonly used types for convenience
pub use catalog_store::{CatalogStore, SqliteCatalogStore};
pub use server::{make_app, run_server, RequestsLoggingLevel};
pub use user::{SqliteUserStore, UserManager, UserStore};
