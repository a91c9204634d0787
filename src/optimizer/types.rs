//! Value types shared by the scoring functions and the optimizer.

use std::fmt;

use crate::item::{PairedSet, Side, Tally};

/// Replacement of a used label by an unused one on one side.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Swap {
    /// Label leaving the side.
    pub old: String,
    /// Label entering the side.
    pub new: String,
    pub side: Side,
}

impl Swap {
    pub fn new(old: impl Into<String>, new: impl Into<String>, side: Side) -> Self {
        Self {
            old: old.into(),
            new: new.into(),
            side,
        }
    }

    /// Whether applying `self` right after `prev` would undo it.
    pub fn reverses(&self, prev: &Swap) -> bool {
        self.side == prev.side && self.old == prev.new && self.new == prev.old
    }
}

impl fmt::Display for Swap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} -> {}, {})", self.old, self.new, self.side)
    }
}

/// Cached aggregates of a pair, indexed by [`Side::index`].
///
/// Holds exactly what the constraint score needs.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub subparts: [i64; 2],
    pub trues: [i64; 2],
    pub categories: [Tally; 2],
}

impl Summary {
    /// Recomputes the summary from scratch.
    pub fn of(pair: &PairedSet) -> Self {
        Self {
            subparts: [pair.pre().tally_subparts(), pair.post().tally_subparts()],
            trues: [pair.pre().tally_true(), pair.post().tally_true()],
            categories: [pair.pre().tally_categories(), pair.post().tally_categories()],
        }
    }
}

/// The two scores of a state: constraint violation (constraints on sub-part
/// balance, category minimums and true ratio) and sub-category coverage
/// mismatch. Lower is better for both.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scores {
    pub constraint: f64,
    pub coverage: i64,
}

impl Scores {
    pub fn new(constraint: f64, coverage: i64) -> Self {
        Self {
            constraint,
            coverage,
        }
    }

    /// Strict lexicographic improvement: a smaller constraint score wins
    /// outright; coverage only decides once the constraint score is zero.
    pub fn improves_on(&self, other: &Scores) -> bool {
        self.constraint < other.constraint
            || (self.constraint == 0.0 && other.constraint == 0.0 && self.coverage < other.coverage)
    }

    /// Every constraint satisfied.
    pub fn is_perfect(&self) -> bool {
        self.constraint == 0.0 && self.coverage == 0
    }
}

impl fmt::Display for Scores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Constraint Score={:.2}, Optimization Score={}",
            self.constraint, self.coverage
        )
    }
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Termination {
    /// Both scores reached zero.
    Success,
    /// `step_max` steps taken.
    StepLimit,
    /// `bad_max` bad steps taken.
    BadLimit,
    /// `bad_seq_max` consecutive bad steps taken.
    BadSequenceLimit,
}

impl Termination {
    pub fn is_success(self) -> bool {
        self == Termination::Success
    }

    pub fn message(self) -> &'static str {
        match self {
            Termination::Success => "Best outcome obtained. Terminate",
            Termination::StepLimit => "Maximum number of steps reached. Terminate",
            Termination::BadLimit => "Maximum number of bad steps reached. Terminate",
            Termination::BadSequenceLimit => {
                "Maximum number of consecutive bad steps reached. Terminate"
            }
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Result of one search step.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// The committed swap, or `None` when no admissible candidate existed.
    pub swap: Option<Swap>,
    /// Scores of the state after the step.
    pub scores: Scores,
    /// Whether the step failed to improve on the previous state.
    pub bad: bool,
    /// Number of candidate swaps scored.
    pub candidates: usize,
}

/// Result of one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub termination: Termination,
    /// Steps taken in this run.
    pub steps: usize,
    /// Bad steps taken in this run.
    pub bad_steps: usize,
    /// Trailing consecutive bad steps.
    pub bad_seq: usize,
    /// Scores of the final current state.
    pub final_scores: Scores,
    /// Scores of the stored best after the run.
    pub best_scores: Scores,
    /// Stored best scores after initialization and after every step.
    pub best_history: Vec<Scores>,
}

/// Result of [`PairOptimizer::run_multiple`](super::PairOptimizer::run_multiple).
#[derive(Debug, Clone)]
pub struct MultiRunReport {
    /// One report per run performed, in order.
    pub runs: Vec<RunReport>,
    /// Scores of the stored best across all runs.
    pub best_scores: Scores,
}

impl MultiRunReport {
    pub fn success(&self) -> bool {
        self.best_scores.is_perfect()
    }
}
