//! Balanced pre/post assessment pair selection.
//!
//! Given a catalog of assessment items (questions), each made of sub-parts
//! with true/false answers and tagged with category and sub-category
//! counts, selects two disjoint item sets (a "pre" test and a "post" test)
//! that are comparable:
//!
//! 1. no item appears on both tests;
//! 2. both tests hold the same number of items (`qNum`);
//! 3. their sub-part totals differ by at most `diffMax`;
//! 4. every category has at least `typeMin` sub-parts on each test;
//! 5. each test's proportion of true answers lies in `[TMin, TMax]`;
//! 6. both tests cover the same sub-categories.
//!
//! The search is a randomized local search over single-item swaps that
//! minimises a constraint score (3–5) first and a coverage score (6)
//! second. Runs stop on success or when a step, bad-step or
//! consecutive-bad-step limit is reached; several independent runs may be
//! chained, keeping the best pair found.
//!
//! # Modules
//!
//! - [`item`]: item records, catalogs, item sets and pre/post pairs.
//! - [`optimizer`]: configuration, scoring and the [`PairOptimizer`](optimizer::PairOptimizer).
//! - [`log`]: progress sinks.
//! - [`io`]: catalog CSV ingestion and assignment export.
//! - [`job`]: JSON job configuration.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use u_prepost::item::{Catalog, ItemRecord};
//! use u_prepost::log::NullSink;
//! use u_prepost::optimizer::{PairConfig, PairOptimizer};
//!
//! let catalog: Catalog = (0..12)
//!     .map(|i| ItemRecord::new(format!("q{i}"), 2, 1, 1).with_category("recall", 2))
//!     .collect();
//! let config = PairConfig::default()
//!     .with_q_num(3)
//!     .with_type_min(1)
//!     .with_seed(42);
//!
//! let mut optimizer = PairOptimizer::new(Arc::new(catalog), config)
//!     .unwrap()
//!     .with_logger(NullSink);
//! let report = optimizer.run().unwrap();
//! assert!(report.termination.is_success());
//!
//! let pair = optimizer.export_best().unwrap();
//! assert_eq!(pair.pre.len(), 3);
//! ```

pub mod error;
pub mod io;
pub mod item;
pub mod job;
pub mod log;
pub mod optimizer;

pub use error::{PairError, Result};
