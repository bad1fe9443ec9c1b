pub mod aggregation;
pub mod browse;
pub mod edits;
mod error;
pub mod family;
mod models;
pub mod queries;
mod schema;
mod store;
mod trait_def;
pub mod validation;

pub use error::{CatalogError, CatalogResult};
pub use models::*;
pub use schema::CATALOG_VERSIONED_SCHEMAS;
pub use store::SqliteCatalogStore;
pub use trait_def::{CatalogCounts, CatalogStore};
