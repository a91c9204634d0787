//! Pre/post pair optimizer.
//!
//! Selects two disjoint, equally sized item sets satisfying:
//!
//! 1. no item appears on both sides;
//! 2. both sides hold `q_num` items;
//! 3. sub-part totals differ by at most `diff_max`;
//! 4. every category has at least `type_min` sub-parts on each side;
//! 5. each side's true-answer ratio lies in `[t_min, t_max]`;
//! 6. both sides cover the same sub-categories.
//!
//! (1) and (2) hold by construction. (3)–(5) feed the constraint score and
//! (6) the coverage score; the search minimises them lexicographically
//! with single-item swaps, see [`PairOptimizer`].

mod config;
mod runner;
pub mod scoring;
mod types;

pub use config::PairConfig;
pub use runner::PairOptimizer;
pub use scoring::Weights;
pub use types::{MultiRunReport, RunReport, Scores, StepOutcome, Summary, Swap, Termination};
