//! Item data model.
//!
//! - [`ItemRecord`]: the counters of a single question item.
//! - [`Catalog`]: all records keyed by label, shared read-only via `Arc`.
//! - [`ItemSet`]: a set of labels viewed through a catalog.
//! - [`PairedSet`]: the (pre, post) pair under optimization.

mod pair;
mod record;
mod set;

pub use pair::{PairExport, PairReport, PairedSet, Side};
pub(crate) use record::{tally_add, tally_difference, tally_missed, tally_sub};
pub use record::{Catalog, ItemRecord, Tally};
pub use set::ItemSet;
