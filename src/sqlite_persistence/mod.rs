//! Shared SQLite plumbing: declarative table definitions, versioned schemas
//! and the open-validate-migrate sequence used by every database in the crate.

mod versioned_schema;

pub use versioned_schema::*;
