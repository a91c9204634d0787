//! Scoring functions.
//!
//! All functions here are pure: swap evaluation takes the current cached
//! aggregates by reference and returns hypothetical ones, leaving the live
//! cache untouched. This is what allows candidate swaps to be scored in
//! parallel.
//!
//! # Constraint score
//!
//! ```text
//! ratio     = w_ratio    * Σ_side max(TMin − r, r − TMax, 0)      r = trues / subparts
//! imbalance = w_diff     * max(0, |subparts_pre − subparts_post| − diffMax)
//! category  = w_category * Σ_side Σ_category max(typeMin − count, 0)
//! ```
//!
//! The ratio term is a funnel: zero inside `[TMin, TMax]`, growing linearly
//! outside. A side with no sub-parts has no ratio; it is charged the widest
//! violation a ratio in `[0, 1]` could have, `max(TMin, 1 − TMax)`.
//!
//! # Coverage score
//!
//! With `diff = post − pre` per sub-category:
//!
//! ```text
//! coverage = Σ_{k missing from pre} diff[k] − Σ_{k missing from post} diff[k]
//! ```
//!
//! It is zero once both sides cover the same sub-categories.

use std::collections::BTreeSet;

use super::config::PairConfig;
use super::types::Summary;
use crate::item::{tally_add, tally_difference, tally_missed, tally_sub, ItemRecord, Side, Tally};

/// Weights of the three constraint-score terms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    pub diff: f64,
    pub category: f64,
    pub ratio: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            diff: 1.0,
            category: 1.0,
            ratio: 10.0,
        }
    }
}

/// Distance of a side's true ratio outside `[t_min, t_max]`.
pub fn ratio_violation(trues: i64, subparts: i64, t_min: f64, t_max: f64) -> f64 {
    if subparts == 0 {
        return t_min.max(1.0 - t_max);
    }
    let r = trues as f64 / subparts as f64;
    (t_min - r).max(r - t_max).max(0.0)
}

/// Constraint score of a summarised state.
///
/// `categories` is the category universe of the catalog; a category
/// missing from a side's tally counts as 0 there.
pub fn constraint_score(
    summary: &Summary,
    config: &PairConfig,
    categories: &BTreeSet<String>,
    weights: &Weights,
) -> f64 {
    let ratio: f64 = Side::BOTH
        .iter()
        .map(|s| {
            let i = s.index();
            ratio_violation(summary.trues[i], summary.subparts[i], config.t_min, config.t_max)
        })
        .sum();

    let imbalance = ((summary.subparts[0] - summary.subparts[1]).abs() - config.diff_max).max(0);

    let deficiency: i64 = summary
        .categories
        .iter()
        .map(|tally| {
            categories
                .iter()
                .map(|name| (config.type_min - tally.get(name).copied().unwrap_or(0)).max(0))
                .sum::<i64>()
        })
        .sum();

    weights.ratio * ratio + weights.diff * imbalance as f64 + weights.category * deficiency as f64
}

/// Summary after replacing `old` by `new` on `side`.
pub fn swap_summary(summary: &Summary, old: &ItemRecord, new: &ItemRecord, side: Side) -> Summary {
    let mut next = summary.clone();
    let i = side.index();
    next.subparts[i] += new.count - old.count;
    next.trues[i] += new.true_count - old.true_count;
    tally_add(&mut next.categories[i], &new.categories);
    tally_sub(&mut next.categories[i], &old.categories);
    next
}

/// Constraint score after replacing `old` by `new` on `side`, together with
/// the hypothetical summary it was computed from.
pub fn swap_constraint_score(
    summary: &Summary,
    old: &ItemRecord,
    new: &ItemRecord,
    side: Side,
    config: &PairConfig,
    categories: &BTreeSet<String>,
    weights: &Weights,
) -> (f64, Summary) {
    let next = swap_summary(summary, old, new, side);
    let score = constraint_score(&next, config, categories, weights);
    (score, next)
}

/// Coverage score of a pair of sub-category tallies.
pub fn coverage_score(pre: &Tally, post: &Tally) -> i64 {
    let diff = tally_difference(pre, post);
    let (missed_from_pre, missed_from_post) = tally_missed(pre, post);
    let gained: i64 = missed_from_pre
        .iter()
        .filter_map(|k| diff.get(k))
        .sum();
    let lost: i64 = missed_from_post
        .iter()
        .filter_map(|k| diff.get(k))
        .sum();
    gained - lost
}

/// Sub-category tally of `side` after replacing `old` by `new`.
pub fn swap_subcategories(tally: &Tally, old: &ItemRecord, new: &ItemRecord) -> Tally {
    let mut next = tally.clone();
    tally_add(&mut next, &new.subcategories);
    tally_sub(&mut next, &old.subcategories);
    next
}

/// Coverage score after replacing `old` by `new` on `side`. Only the
/// affected side's tally is rebuilt.
pub fn swap_coverage_score(tallies: &[Tally; 2], old: &ItemRecord, new: &ItemRecord, side: Side) -> i64 {
    let swapped = swap_subcategories(&tallies[side.index()], old, new);
    match side {
        Side::Pre => coverage_score(&swapped, &tallies[1]),
        Side::Post => coverage_score(&tallies[0], &swapped),
    }
}
