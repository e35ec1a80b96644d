//! Catalog module
//!
//! The materialized mask records: the always-current read model kept in
//! step with the latest projection, and the catalog the matcher ranks
//! against.

mod memory;
mod repository;

pub use memory::InMemoryMaskRepository;
pub use repository::{CatalogError, MaskRepository, MaterializedMask, PgMaskRepository};
