//! CSV input and output.

mod catalog;
mod output;

pub use catalog::{read_catalog, read_catalog_from, CatalogLayout};
pub use output::{format_timestamp, write_assignment, WriteMode};
