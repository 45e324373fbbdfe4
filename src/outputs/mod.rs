//! Sinks for an extracted batch.
//!
//! # Submodules
//!
//! - [`text`]: rewrites the delimited text ledger with normalized dates
//! - [`store`]: inserts rows into the SQLite `articles` table, deduplicated by URL
//! - [`json`]: optional JSON summary of the whole run
//!
//! Both sinks consume the same batch, one after the other. A failure in the
//! text sink does not stop the row store write.

pub mod json;
pub mod store;
pub mod text;
