//! Two-tier local search over pre/post pairs.
//!
//! # Algorithm
//!
//! 1. Start from a random disjoint pair (or a caller-supplied one); compute
//!    the cached summary and both scores.
//! 2. While the state is not perfect and no limit is reached:
//!    a. Sample `ceil(effort · used)` used labels (alternating sides) and
//!    `ceil(effort · unused)` unused labels.
//!    b. Score every (used, unused) swap except the reversal of the previous
//!    step. The smallest constraint score wins; among zero-constraint
//!    candidates the smallest coverage score wins.
//!    c. Commit the winner even if it is worse than the current state, so
//!    the search can walk out of local optima. A step that does not improve
//!    the current state is "bad".
//!    d. Record the state as the best if it strictly improves on it.
//! 3. Stop on success, `step_max` steps, `bad_max` bad steps or
//!    `bad_seq_max` consecutive bad steps.
//!
//! Disjointness and equal side sizes hold by construction: a swap removes
//! one label from a side and adds one label taken from outside both sides.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::{debug, trace};

use super::config::PairConfig;
use super::scoring::{self, Weights};
use super::types::{MultiRunReport, RunReport, Scores, StepOutcome, Summary, Swap, Termination};
use crate::error::{PairError, Result};
use crate::item::{Catalog, ItemRecord, PairExport, PairedSet, Side, Tally};
use crate::log::{LogSink, StdoutSink};

fn create_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::seed_from_u64(rand::random()),
    }
}

/// Number of entries kept out of `len` at the given effort.
fn effort_count(len: usize, effort: f64) -> usize {
    (len as f64 * effort.clamp(0.0, 1.0)).ceil() as usize
}

/// Current search state with its cached aggregates.
#[derive(Debug, Clone)]
struct SearchState {
    pair: PairedSet,
    summary: Summary,
    subcategories: [Tally; 2],
    scores: Scores,
}

#[derive(Debug, Clone)]
struct Best {
    pair: PairedSet,
    scores: Scores,
}

/// Stateful pre/post pair optimizer.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use u_prepost::item::{Catalog, ItemRecord};
/// use u_prepost::log::NullSink;
/// use u_prepost::optimizer::{PairConfig, PairOptimizer};
///
/// let catalog: Catalog = (0..8)
///     .map(|i| ItemRecord::new(format!("q{i}"), 4, 2, 2).with_category("recall", 4))
///     .collect();
/// let config = PairConfig::default()
///     .with_q_num(2)
///     .with_type_min(1)
///     .with_verbosity(0)
///     .with_seed(1);
///
/// let mut optimizer = PairOptimizer::new(Arc::new(catalog), config)
///     .unwrap()
///     .with_logger(NullSink);
/// let report = optimizer.run().unwrap();
/// assert!(report.termination.is_success());
///
/// let export = optimizer.export_best().unwrap();
/// assert_eq!(export.pre.len(), 2);
/// assert_eq!(export.post.len(), 2);
/// ```
pub struct PairOptimizer {
    catalog: Arc<Catalog>,
    config: PairConfig,
    weights: Weights,
    logger: Box<dyn LogSink>,
    rng: StdRng,
    state: Option<SearchState>,
    best: Option<Best>,
    backtrack: Option<Swap>,
    step: usize,
    bad: usize,
    bad_seq: usize,
}

impl PairOptimizer {
    /// Creates an optimizer over `catalog`, logging to standard output.
    pub fn new(catalog: Arc<Catalog>, config: PairConfig) -> Result<Self> {
        config.validate().map_err(PairError::InvalidConfig)?;
        let rng = create_rng(config.seed);
        Ok(Self {
            catalog,
            config,
            weights: Weights::default(),
            logger: Box::new(StdoutSink),
            rng,
            state: None,
            best: None,
            backtrack: None,
            step: 0,
            bad: 0,
            bad_seq: 0,
        })
    }

    /// Replaces the logging sink.
    pub fn with_logger<L: LogSink + 'static>(mut self, logger: L) -> Self {
        self.logger = Box::new(logger);
        self
    }

    /// Replaces the constraint-score weights.
    pub fn with_weights(mut self, weights: Weights) -> Self {
        self.weights = weights;
        self
    }

    /// Replaces the logging sink in place.
    pub fn set_logger<L: LogSink + 'static>(&mut self, logger: L) {
        self.logger = Box::new(logger);
    }

    /// The catalog every pair resolves labels against.
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Current configuration.
    pub fn config(&self) -> &PairConfig {
        &self.config
    }

    /// Replaces the configuration. A seed in the new configuration reseeds
    /// the generator. The current state's cached scores are refreshed; if
    /// its sides no longer hold `q_num` items the current state is dropped
    /// and the next run samples a fresh pair.
    pub fn set_config(&mut self, config: PairConfig) -> Result<()> {
        config.validate().map_err(PairError::InvalidConfig)?;
        if config.seed.is_some() {
            self.rng = create_rng(config.seed);
        }
        self.config = config;
        if let Some(state) = self.state.take() {
            let q = self.config.q_num;
            if state.pair.pre().len() == q && state.pair.post().len() == q {
                self.install(state.pair);
            } else {
                debug!(q_num = q, "current pair dropped after q_num change");
                self.backtrack = None;
            }
        }
        Ok(())
    }

    /// Constraint-score weights.
    pub fn weights(&self) -> &Weights {
        &self.weights
    }

    /// The pair the search is currently at.
    pub fn current(&self) -> Option<&PairedSet> {
        self.state.as_ref().map(|s| &s.pair)
    }

    /// The best pair recorded so far, across runs.
    pub fn best(&self) -> Option<&PairedSet> {
        self.best.as_ref().map(|b| &b.pair)
    }

    /// Scores of the current pair.
    pub fn current_scores(&self) -> Option<Scores> {
        self.state.as_ref().map(|s| s.scores)
    }

    /// Scores of the best pair.
    pub fn best_scores(&self) -> Option<Scores> {
        self.best.as_ref().map(|b| b.scores)
    }

    /// Cached summary of the current pair.
    pub fn summary(&self) -> Option<&Summary> {
        self.state.as_ref().map(|s| &s.summary)
    }

    /// The swap committed by the last step, if any.
    pub fn last_swap(&self) -> Option<&Swap> {
        self.backtrack.as_ref()
    }

    /// Steps taken since the counters were last reset.
    pub fn step(&self) -> usize {
        self.step
    }

    /// Bad steps taken since the counters were last reset.
    pub fn bad(&self) -> usize {
        self.bad
    }

    /// Current run of consecutive bad steps.
    pub fn bad_seq(&self) -> usize {
        self.bad_seq
    }

    /// Zeroes the step, bad and consecutive-bad counters.
    pub fn reset_counters(&mut self) {
        self.step = 0;
        self.bad = 0;
        self.bad_seq = 0;
    }

    fn incr_counters(&mut self, bad: bool) {
        self.step += 1;
        if bad {
            self.bad += 1;
            self.bad_seq += 1;
        } else {
            self.bad_seq = 0;
        }
    }

    /// Forgets the best pair.
    pub fn reset_best(&mut self) {
        self.best = None;
    }

    /// Labels of the best pair; fails before any run.
    pub fn export_best(&self) -> Result<PairExport> {
        self.best
            .as_ref()
            .map(|b| b.pair.export())
            .ok_or(PairError::NoResult("best pre-post pair does not exist"))
    }

    /// Labels of the current pair; fails before any pair is set.
    pub fn export_current(&self) -> Result<PairExport> {
        self.current()
            .map(PairedSet::export)
            .ok_or(PairError::NoResult("current pre-post pair does not exist"))
    }

    fn log(&mut self, level: u8, parts: &[&str], end: &str) {
        if self.config.verbosity >= level {
            self.logger.log(parts, " ", end);
        }
    }

    fn dump_current(&mut self) {
        if self.config.verbosity >= 3 {
            let text = self.current().map(PairedSet::to_string);
            self.dump(text);
        }
    }

    fn dump_best(&mut self) {
        if self.config.verbosity >= 3 {
            let text = self.best().map(PairedSet::to_string);
            self.dump(text);
        }
    }

    fn dump(&mut self, text: Option<String>) {
        if let Some(text) = text {
            self.logger.log(&[text.as_str()], " ", "\n");
        }
    }

    /// Makes `pair` the current state and rebuilds every cache from it.
    fn install(&mut self, pair: PairedSet) {
        let summary = Summary::of(&pair);
        let subcategories = [pair.pre().tally_subcategories(), pair.post().tally_subcategories()];
        let constraint =
            scoring::constraint_score(&summary, &self.config, self.catalog.categories(), &self.weights);
        let coverage = scoring::coverage_score(&subcategories[0], &subcategories[1]);
        self.state = Some(SearchState {
            pair,
            summary,
            subcategories,
            scores: Scores::new(constraint, coverage),
        });
        self.backtrack = None;
    }

    fn check_pair(&self, pair: &PairedSet) -> Result<()> {
        if !Arc::ptr_eq(pair.pre().catalog(), &self.catalog)
            || !Arc::ptr_eq(pair.post().catalog(), &self.catalog)
        {
            return Err(PairError::InvalidPair(
                "pair must resolve labels against the optimizer's catalog".into(),
            ));
        }
        let q = self.config.q_num;
        if pair.pre().len() != q || pair.post().len() != q {
            return Err(PairError::InvalidPair(format!(
                "each side must hold {q} items, got {} and {}",
                pair.pre().len(),
                pair.post().len()
            )));
        }
        let overlap = pair.overlap();
        if !overlap.is_empty() {
            return Err(PairError::InvalidPair(format!(
                "sides share {} item(s): {:?}",
                overlap.len(),
                overlap
            )));
        }
        Ok(())
    }

    /// Replaces the current state with a fresh random disjoint pair.
    pub fn sample_pair(&mut self) -> Result<()> {
        let pair = PairedSet::sample_disjoint(self.catalog.clone(), self.config.q_num, &mut self.rng)?;
        self.install(pair);
        self.dump_current();
        Ok(())
    }

    /// Sets the current state from explicit label lists.
    pub fn set_pair<I, J, S, T>(&mut self, pre: I, post: J) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        let pair = PairedSet::new(pre, post, self.catalog.clone())?;
        self.check_pair(&pair)?;
        self.install(pair);
        Ok(())
    }

    /// Samples used labels of the current pair, tagged with their side.
    ///
    /// Sides alternate, starting from a random one; each side is shuffled
    /// and the interleaving is cut to `ceil(effort · total)` entries. A
    /// `seed` reseeds this optimizer's generator first.
    pub fn sample_current(&mut self, effort: f64, seed: Option<u64>) -> Result<Vec<(Side, String)>> {
        if let Some(seed) = seed {
            self.rng = StdRng::seed_from_u64(seed);
        }
        let state = self
            .state
            .as_ref()
            .ok_or(PairError::NoResult("current pre-post pair does not exist"))?;

        let first = if self.rng.random_range(0..2) == 0 {
            Side::Pre
        } else {
            Side::Post
        };
        let mut pre = state.pair.pre().export();
        pre.shuffle(&mut self.rng);
        let mut post = state.pair.post().export();
        post.shuffle(&mut self.rng);

        let total = pre.len() + post.len();
        let (lead, follow) = match first {
            Side::Pre => (pre, post),
            Side::Post => (post, pre),
        };
        let mut sample = Vec::with_capacity(total);
        for (a, b) in lead.into_iter().zip(follow) {
            sample.push((first, a));
            sample.push((first.other(), b));
        }
        sample.truncate(effort_count(total, effort));
        Ok(sample)
    }

    /// Samples labels used on neither side: shuffled, cut to
    /// `ceil(effort · unused)` entries.
    pub fn sample_unused(&mut self, effort: f64, seed: Option<u64>) -> Result<Vec<String>> {
        if let Some(seed) = seed {
            self.rng = StdRng::seed_from_u64(seed);
        }
        let state = self
            .state
            .as_ref()
            .ok_or(PairError::NoResult("current pre-post pair does not exist"))?;

        let mut avail: Vec<String> = self
            .catalog
            .labels()
            .filter(|l| !state.pair.pre().contains(l) && !state.pair.post().contains(l))
            .map(str::to_string)
            .collect();
        avail.shuffle(&mut self.rng);
        let n = effort_count(avail.len(), effort);
        avail.truncate(n);
        Ok(avail)
    }

    /// Hypothetical constraint score and summary after swapping `old` (on
    /// `side`) for `new`. The live cache is not modified.
    ///
    /// `new` must be unused; passing a used label gives meaningless scores.
    pub fn swap_constraint_score(&self, old: &str, new: &str, side: Side) -> Result<(f64, Summary)> {
        let state = self
            .state
            .as_ref()
            .ok_or(PairError::NoResult("current pre-post pair does not exist"))?;
        let old = self.record(old)?;
        let new = self.record(new)?;
        Ok(scoring::swap_constraint_score(
            &state.summary,
            old,
            new,
            side,
            &self.config,
            self.catalog.categories(),
            &self.weights,
        ))
    }

    /// Hypothetical coverage score after swapping `old` (on `side`) for
    /// `new`.
    pub fn swap_coverage_score(&self, old: &str, new: &str, side: Side) -> Result<i64> {
        let state = self
            .state
            .as_ref()
            .ok_or(PairError::NoResult("current pre-post pair does not exist"))?;
        let old = self.record(old)?;
        let new = self.record(new)?;
        Ok(scoring::swap_coverage_score(&state.subcategories, old, new, side))
    }

    fn record(&self, label: &str) -> Result<&ItemRecord> {
        self.catalog
            .get(label)
            .ok_or_else(|| PairError::UnknownLabel(label.to_string()))
    }

    /// Takes one local-search step.
    ///
    /// The best admissible swap is committed even when it makes the state
    /// worse. If there is no admissible swap at all the state is left as is.
    /// Either way the step is counted, as bad unless it improved the state.
    pub fn take_step(&mut self) -> Result<StepOutcome> {
        let effort = self.config.effort;
        let unused = self.sample_unused(effort, None)?;
        let used = self.sample_current(effort, None)?;

        let mut candidates: Vec<Swap> = Vec::with_capacity(used.len() * unused.len());
        for (side, old) in &used {
            for new in &unused {
                let swap = Swap::new(old.clone(), new.clone(), *side);
                if self.backtrack.as_ref().is_some_and(|prev| swap.reverses(prev)) {
                    continue;
                }
                candidates.push(swap);
            }
        }

        let state = self
            .state
            .as_ref()
            .ok_or(PairError::NoResult("current pre-post pair does not exist"))?;
        let catalog = &*self.catalog;
        let config = &self.config;
        let weights = &self.weights;

        // (constraint score, coverage score when the constraint score is 0)
        let evaluate = |swap: &Swap| -> Option<(f64, Option<i64>)> {
            let old = catalog.get(&swap.old)?;
            let new = catalog.get(&swap.new)?;
            let (constraint, _) = scoring::swap_constraint_score(
                &state.summary,
                old,
                new,
                swap.side,
                config,
                catalog.categories(),
                weights,
            );
            let coverage = (constraint == 0.0)
                .then(|| scoring::swap_coverage_score(&state.subcategories, old, new, swap.side));
            Some((constraint, coverage))
        };

        #[cfg(feature = "parallel")]
        let evaluated: Vec<Option<(f64, Option<i64>)>> = candidates.par_iter().map(evaluate).collect();
        #[cfg(not(feature = "parallel"))]
        let evaluated: Vec<Option<(f64, Option<i64>)>> = candidates.iter().map(evaluate).collect();

        let mut chosen: Option<(usize, f64, Option<i64>)> = None;
        for (i, eval) in evaluated.iter().enumerate() {
            let Some((constraint, coverage)) = *eval else {
                continue;
            };
            let better = match chosen {
                None => true,
                Some((_, best_constraint, best_coverage)) => {
                    constraint < best_constraint
                        || (constraint == 0.0
                            && best_constraint == 0.0
                            && coverage.unwrap_or(i64::MAX) < best_coverage.unwrap_or(i64::MAX))
                }
            };
            if better {
                chosen = Some((i, constraint, coverage));
            }
        }

        let Some((index, constraint, coverage)) = chosen else {
            let scores = state.scores;
            self.incr_counters(true);
            let header = format!("Step #{}:", self.step);
            let body = format!("Swap = none; {scores}");
            self.log(2, &[header.as_str(), body.as_str()], "\n");
            trace!(step = self.step, "no admissible swap");
            return Ok(StepOutcome {
                swap: None,
                scores,
                bad: true,
                candidates: 0,
            });
        };

        let swap = candidates.swap_remove(index);
        let (summary, subcategories, scores) = {
            let old = self.record(&swap.old)?;
            let new = self.record(&swap.new)?;
            let summary = scoring::swap_summary(&state.summary, old, new, swap.side);
            let mut subcategories = state.subcategories.clone();
            subcategories[swap.side.index()] =
                scoring::swap_subcategories(&state.subcategories[swap.side.index()], old, new);
            let coverage = match coverage {
                Some(c) => c,
                None => scoring::coverage_score(&subcategories[0], &subcategories[1]),
            };
            (summary, subcategories, Scores::new(constraint, coverage))
        };
        let bad = !scores.improves_on(&state.scores);
        self.incr_counters(bad);

        if let Some(state) = self.state.as_mut() {
            state.pair.side_mut(swap.side).swap(&swap.old, &swap.new);
            state.summary = summary;
            state.subcategories = subcategories;
            state.scores = scores;
        }

        let header = format!("Step #{}:", self.step);
        let body = format!("Swap = {swap}; {scores}");
        self.log(2, &[header.as_str(), body.as_str()], "\n");
        trace!(
            step = self.step,
            swap = %swap,
            constraint = scores.constraint,
            coverage = scores.coverage,
            bad,
            "step committed"
        );

        self.backtrack = Some(swap.clone());
        Ok(StepOutcome {
            swap: Some(swap),
            scores,
            bad,
            candidates: evaluated.len(),
        })
    }

    /// Records the current pair as the best if it strictly improves on the
    /// stored best. Returns whether the best changed.
    pub fn update_best(&mut self) -> bool {
        let Some(state) = self.state.as_ref() else {
            return false;
        };
        let improved = match &self.best {
            None => true,
            Some(best) => state.scores.improves_on(&best.scores),
        };
        if improved {
            self.best = Some(Best {
                pair: state.pair.clone(),
                scores: state.scores,
            });
            self.log(2, &["Best pre-post pair updated."], "\n");
            self.dump_best();
        }
        improved
    }

    fn limit_reached(&self) -> Option<Termination> {
        if self.step >= self.config.step_max {
            Some(Termination::StepLimit)
        } else if self.bad >= self.config.bad_max {
            Some(Termination::BadLimit)
        } else if self.bad_seq >= self.config.bad_seq_max {
            Some(Termination::BadSequenceLimit)
        } else {
            None
        }
    }

    /// Performs a full run from a fresh random disjoint pair.
    ///
    /// The stored best is kept from earlier runs and only replaced on
    /// strict improvement.
    pub fn run(&mut self) -> Result<RunReport> {
        self.reset_counters();
        self.sample_pair()?;
        self.search()
    }

    /// Performs a full run starting from `pair`, which must be disjoint,
    /// sized `q_num` per side and built on this optimizer's catalog.
    pub fn run_from(&mut self, pair: PairedSet) -> Result<RunReport> {
        self.check_pair(&pair)?;
        self.reset_counters();
        self.install(pair);
        self.search()
    }

    /// Continues searching from the current pair without resetting the
    /// counters.
    pub fn resume(&mut self) -> Result<RunReport> {
        if self.state.is_none() {
            return Err(PairError::NoResult("current pre-post pair does not exist"));
        }
        self.search()
    }

    fn search(&mut self) -> Result<RunReport> {
        let initial = self
            .current_scores()
            .ok_or(PairError::NoResult("current pre-post pair does not exist"))?;
        debug!(
            q_num = self.config.q_num,
            catalog = self.catalog.len(),
            constraint = initial.constraint,
            coverage = initial.coverage,
            "run started"
        );
        let header = format!("Step #{}:", self.step);
        let body = initial.to_string();
        self.log(2, &[header.as_str(), body.as_str()], "\n");

        self.update_best();
        let mut best_history = Vec::new();
        best_history.extend(self.best_scores());

        let mut current = initial;
        if !current.is_perfect() {
            self.log(1, &["Optimization initiated."], "\n");
        }

        let termination = loop {
            if current.is_perfect() {
                break Termination::Success;
            }
            if let Some(limit) = self.limit_reached() {
                break limit;
            }
            let outcome = self.take_step()?;
            self.update_best();
            best_history.extend(self.best_scores());
            if self.config.verbosity == 1 {
                self.logger.log(&["."], "", "");
            }
            current = outcome.scores;
        };

        if self.config.verbosity == 1 {
            self.logger.log(&[""], "", "\n");
        }
        self.log(1, &[termination.message()], "\n");
        self.dump_best();

        let best_scores = self
            .best_scores()
            .ok_or(PairError::NoResult("best pre-post pair does not exist"))?;
        debug!(
            ?termination,
            steps = self.step,
            bad = self.bad,
            best_constraint = best_scores.constraint,
            best_coverage = best_scores.coverage,
            "run finished"
        );
        Ok(RunReport {
            termination,
            steps: self.step,
            bad_steps: self.bad,
            bad_seq: self.bad_seq,
            final_scores: current,
            best_scores,
            best_history,
        })
    }

    /// Performs up to `n` independent runs, stopping as soon as the stored
    /// best is perfect.
    pub fn run_multiple(&mut self, n: usize) -> Result<MultiRunReport> {
        if n == 0 {
            return Err(PairError::InvalidConfig("number of runs must be at least 1".into()));
        }
        let mut runs = Vec::with_capacity(n);
        for i in 0..n {
            let banner = format!("==== RUN #{i} ====");
            self.log(1, &[banner.as_str()], "\n");
            runs.push(self.run()?);
            if self.best_scores().is_some_and(|s| s.is_perfect()) {
                break;
            }
        }
        let best_scores = self
            .best_scores()
            .ok_or(PairError::NoResult("best pre-post pair does not exist"))?;
        Ok(MultiRunReport { runs, best_scores })
    }
}

impl std::fmt::Debug for PairOptimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PairOptimizer")
            .field("catalog_len", &self.catalog.len())
            .field("config", &self.config)
            .field("current_scores", &self.current_scores())
            .field("best_scores", &self.best_scores())
            .field("step", &self.step)
            .field("bad", &self.bad)
            .field("bad_seq", &self.bad_seq)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemRecord;
    use crate::log::{MemorySink, NullSink};
    use proptest::prelude::*;

    fn optimizer(catalog: Catalog, config: PairConfig) -> PairOptimizer {
        PairOptimizer::new(Arc::new(catalog), config.with_verbosity(0))
            .unwrap()
            .with_logger(NullSink)
    }

    /// Twelve items with mixed counts, two categories and three
    /// sub-categories.
    fn mixed_catalog() -> Catalog {
        (0..12)
            .map(|i: i64| {
                let count = 2 + i % 4;
                let trues = (i * 7) % (count + 1);
                let category = if i % 2 == 0 { "recall" } else { "apply" };
                let sub = ["cells", "genes", "evolution"][(i % 3) as usize];
                ItemRecord::new(format!("q{i:02}"), count, trues, count - trues)
                    .with_category(category, count)
                    .with_subcategory(sub, count)
            })
            .collect()
    }

    #[test]
    fn test_export_before_any_state_fails() {
        let opt = optimizer(mixed_catalog(), PairConfig::default());
        assert!(matches!(opt.export_best(), Err(PairError::NoResult(_))));
        assert!(matches!(opt.export_current(), Err(PairError::NoResult(_))));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = PairOptimizer::new(Arc::new(mixed_catalog()), PairConfig::default().with_effort(2.0))
            .unwrap_err();
        assert!(matches!(err, PairError::InvalidConfig(_)));
    }

    #[test]
    fn test_run_on_too_small_catalog_fails() {
        let mut opt = optimizer(mixed_catalog(), PairConfig::default().with_q_num(7));
        assert!(matches!(opt.run(), Err(PairError::CatalogTooSmall { .. })));
    }

    #[test]
    fn test_set_pair_validation() {
        let mut opt = optimizer(mixed_catalog(), PairConfig::default().with_q_num(2));
        let overlapping = opt.set_pair(["q00", "q01"], ["q01", "q02"]);
        assert!(matches!(overlapping, Err(PairError::InvalidPair(_))));

        let short = opt.set_pair(["q00"], ["q01", "q02"]);
        assert!(matches!(short, Err(PairError::InvalidPair(_))));

        let unknown = opt.set_pair(["q00", "nope"], ["q01", "q02"]);
        assert!(matches!(unknown, Err(PairError::UnknownLabel(_))));

        assert!(opt.set_pair(["q00", "q03"], ["q01", "q02"]).is_ok());
        assert_eq!(opt.export_current().unwrap().pre, vec!["q00", "q03"]);
    }

    #[test]
    fn test_run_from_rejects_foreign_catalog() {
        let mut opt = optimizer(mixed_catalog(), PairConfig::default().with_q_num(1));
        let foreign = PairedSet::new(["q00"], ["q01"], Arc::new(mixed_catalog())).unwrap();
        assert!(matches!(opt.run_from(foreign), Err(PairError::InvalidPair(_))));
    }

    #[test]
    fn test_swap_delta_on_cached_summary() {
        let catalog: Catalog = vec![
            ItemRecord::new("A", 3, 2, 1),
            ItemRecord::new("B", 5, 1, 4),
            ItemRecord::new("C", 4, 2, 2),
        ]
        .into_iter()
        .collect();
        let mut opt = optimizer(catalog, PairConfig::default().with_q_num(1));
        opt.set_pair(["A"], ["C"]).unwrap();
        let before = opt.summary().unwrap().clone();

        let (_, after) = opt.swap_constraint_score("A", "B", Side::Pre).unwrap();
        assert_eq!(after.subparts[0] - before.subparts[0], 2);
        assert_eq!(after.trues[0] - before.trues[0], -1);
        assert_eq!(opt.summary().unwrap(), &before, "live cache must not change");
    }

    #[test]
    fn test_sample_current_alternates_and_truncates() {
        let mut opt = optimizer(mixed_catalog(), PairConfig::default().with_q_num(4));
        opt.sample_pair().unwrap();

        let full = opt.sample_current(1.0, Some(5)).unwrap();
        assert_eq!(full.len(), 8);
        for pair in full.windows(2) {
            assert_ne!(pair[0].0, pair[1].0, "sides must alternate");
        }
        let current = opt.current().unwrap().clone();
        for (side, label) in &full {
            assert!(current.side(*side).contains(label), "{label} not on {side}");
        }

        // ceil(0.3 * 8) = 3
        assert_eq!(opt.sample_current(0.3, None).unwrap().len(), 3);
        assert!(opt.sample_current(0.0, None).unwrap().is_empty());
    }

    #[test]
    fn test_sample_unused_is_disjoint_and_seeded() {
        let mut opt = optimizer(mixed_catalog(), PairConfig::default().with_q_num(3));
        opt.sample_pair().unwrap();

        let unused = opt.sample_unused(1.0, Some(11)).unwrap();
        assert_eq!(unused.len(), 6);
        let current = opt.current().unwrap().clone();
        for label in &unused {
            assert!(!current.pre().contains(label) && !current.post().contains(label));
        }

        let again = opt.sample_unused(1.0, Some(11)).unwrap();
        assert_eq!(unused, again, "same seed must give the same sample");

        // ceil(0.5 * 6) = 3
        assert_eq!(opt.sample_unused(0.5, None).unwrap().len(), 3);
    }

    #[test]
    fn test_anti_backtrack() {
        // X and P balance each other perfectly; Y unbalances whichever
        // side takes it. After swapping Y in, putting X or P back is the
        // best move but the reversal is forbidden.
        let catalog: Catalog = vec![
            ItemRecord::new("X", 2, 1, 1),
            ItemRecord::new("P", 2, 1, 1),
            ItemRecord::new("Y", 5, 5, 0),
        ]
        .into_iter()
        .collect();
        let config = PairConfig::default()
            .with_q_num(1)
            .with_type_min(0)
            .with_diff_max(0)
            .with_effort(1.0)
            .with_seed(9);
        let mut opt = optimizer(catalog, config);
        opt.set_pair(["X"], ["P"]).unwrap();

        let first = opt.take_step().unwrap();
        let first_swap = first.swap.expect("a swap is always available");
        assert!(first.bad, "leaving a perfect state cannot improve it");

        let second = opt.take_step().unwrap();
        assert_eq!(second.candidates, 1, "only the non-reversing swap is admissible");
        let second_swap = second.swap.expect("one admissible swap");
        assert!(
            !second_swap.reverses(&first_swap),
            "{second_swap} reverses {first_swap}"
        );
        assert_eq!(second_swap.side, first_swap.side.other());
    }

    #[test]
    fn test_coverage_decides_among_feasible_swaps() {
        // every swap keeps the constraint score at 0; only a -> c on pre
        // makes both sides cover the same sub-category
        let catalog: Catalog = vec![
            ItemRecord::new("a", 1, 1, 0).with_subcategory("s1", 1),
            ItemRecord::new("b", 1, 1, 0).with_subcategory("s2", 1),
            ItemRecord::new("c", 1, 1, 0).with_subcategory("s2", 1),
            ItemRecord::new("d", 1, 1, 0).with_subcategory("s3", 1),
        ]
        .into_iter()
        .collect();
        let config = PairConfig::default()
            .with_q_num(1)
            .with_type_min(0)
            .with_diff_max(0)
            .with_true_band(0.0, 1.0)
            .with_effort(0.0)
            .with_seed(4);
        let mut opt = optimizer(catalog, config);
        opt.set_pair(["a"], ["b"]).unwrap();
        assert_eq!(opt.current_scores(), Some(Scores::new(0.0, 2)));

        // no candidates at effort 0: a bad step
        assert!(opt.take_step().unwrap().bad);
        assert_eq!(opt.bad_seq(), 1);

        let config = opt.config().clone().with_effort(1.0);
        opt.set_config(config).unwrap();
        assert_eq!(opt.export_current().unwrap().pre, vec!["a"], "same-size pair is kept");

        let outcome = opt.take_step().unwrap();
        assert_eq!(outcome.candidates, 4);
        assert_eq!(outcome.swap, Some(Swap::new("a", "c", Side::Pre)));
        assert_eq!(outcome.scores, Scores::new(0.0, 0));
        assert!(!outcome.bad, "lower coverage at zero constraint is an improvement");
        assert_eq!(opt.bad_seq(), 0, "a good step resets the bad sequence");
        assert_eq!(opt.bad(), 1);
        assert_eq!(opt.step(), 2);
    }

    #[test]
    fn test_set_config_drops_pair_of_wrong_size() {
        let mut opt = optimizer(mixed_catalog(), PairConfig::default().with_q_num(2).with_seed(5));
        opt.sample_pair().unwrap();

        let config = opt.config().clone().with_q_num(4);
        opt.set_config(config).unwrap();
        assert!(opt.current().is_none());
        assert!(matches!(opt.resume(), Err(PairError::NoResult(_))));

        opt.run().unwrap();
        let pair = opt.current().unwrap();
        assert_eq!(pair.pre().len(), 4);
        assert_eq!(pair.post().len(), 4);
    }

    #[test]
    fn test_set_config_refreshes_scores_and_rejects_invalid() {
        let mut opt = optimizer(mixed_catalog(), PairConfig::default().with_q_num(2).with_type_min(0));
        opt.set_pair(["q00", "q01"], ["q02", "q03"]).unwrap();
        let before = opt.current_scores().unwrap();

        let config = opt.config().clone().with_type_min(1_000);
        opt.set_config(config).unwrap();
        let after = opt.current_scores().unwrap();
        assert!(after.constraint > before.constraint, "{after} vs {before}");

        let bad = opt.config().clone().with_true_band(0.9, 0.1);
        assert!(matches!(opt.set_config(bad), Err(PairError::InvalidConfig(_))));
        assert_eq!(opt.config().type_min, 1_000, "rejected config is not applied");
    }

    #[test]
    fn test_resume_keeps_counters() {
        let config = PairConfig::default()
            .with_q_num(2)
            .with_type_min(1_000)
            .with_step_max(3)
            .with_bad_max(100)
            .with_bad_seq_max(100)
            .with_seed(17);
        let mut opt = optimizer(mixed_catalog(), config);
        assert!(matches!(opt.resume(), Err(PairError::NoResult(_))));

        let first = opt.run().unwrap();
        assert_eq!(first.termination, Termination::StepLimit);
        assert_eq!(first.steps, 3);

        let config = opt.config().clone().with_step_max(5);
        opt.set_config(config).unwrap();
        let second = opt.resume().unwrap();
        assert_eq!(second.termination, Termination::StepLimit);
        assert_eq!(second.steps, 5, "resume continues the step count");
        assert_eq!(second.best_history.len(), 3);
    }

    #[test]
    fn test_no_candidates_is_bad_step_without_commit() {
        let mut opt = optimizer(
            mixed_catalog(),
            PairConfig::default().with_q_num(2).with_effort(0.0),
        );
        opt.sample_pair().unwrap();
        let before = opt.export_current().unwrap();

        let outcome = opt.take_step().unwrap();
        assert!(outcome.swap.is_none());
        assert!(outcome.bad);
        assert_eq!(opt.step(), 1);
        assert_eq!(opt.bad_seq(), 1);
        assert_eq!(opt.export_current().unwrap(), before);
    }

    #[test]
    fn test_end_to_end_immediate_success() {
        let catalog: Catalog = vec![
            ItemRecord::new("a", 2, 1, 1).with_category("c1", 2),
            ItemRecord::new("b", 3, 2, 1).with_category("c2", 3),
            ItemRecord::new("c", 3, 1, 2).with_category("c1", 3),
            ItemRecord::new("d", 2, 2, 0).with_category("c2", 2),
            ItemRecord::new("e", 4, 0, 4).with_category("c1", 4),
            ItemRecord::new("f", 1, 1, 0).with_category("c2", 1),
        ]
        .into_iter()
        .collect();
        let config = PairConfig::default()
            .with_q_num(2)
            .with_diff_max(0)
            .with_type_min(0)
            .with_true_band(0.0, 1.0);
        let mut opt = optimizer(catalog, config);
        let pair = PairedSet::new(["a", "b"], ["c", "d"], opt.catalog().clone()).unwrap();

        let report = opt.run_from(pair).unwrap();
        assert_eq!(report.termination, Termination::Success);
        assert_eq!(report.steps, 0);
        assert_eq!(report.best_scores, Scores::new(0.0, 0));
        assert_eq!(opt.export_best().unwrap().pre, vec!["a", "b"]);
    }

    #[test]
    fn test_infeasible_run_hits_step_limit() {
        let config = PairConfig::default()
            .with_q_num(2)
            .with_type_min(1_000)
            .with_step_max(20)
            .with_bad_max(1_000)
            .with_bad_seq_max(1_000)
            .with_seed(42);
        let mut opt = optimizer(mixed_catalog(), config);

        let report = opt.run().unwrap();
        assert_eq!(report.termination, Termination::StepLimit);
        assert_eq!(report.steps, 20);
        assert!(report.best_scores.constraint > 0.0);
    }

    fn identical_catalog() -> Catalog {
        (0..8)
            .map(|i| ItemRecord::new(format!("q{i}"), 3, 1, 2).with_category("recall", 3))
            .collect()
    }

    #[test]
    fn test_bad_sequence_limit_terminates() {
        // every swap scores the same, so no step can improve
        let config = PairConfig::default()
            .with_q_num(2)
            .with_type_min(1_000)
            .with_step_max(100)
            .with_bad_max(100)
            .with_bad_seq_max(3);
        let mut opt = optimizer(identical_catalog(), config);

        let report = opt.run().unwrap();
        assert_eq!(report.termination, Termination::BadSequenceLimit);
        assert_eq!(report.steps, 3);
        assert_eq!(report.bad_seq, 3);
    }

    #[test]
    fn test_bad_limit_terminates() {
        let config = PairConfig::default()
            .with_q_num(2)
            .with_type_min(1_000)
            .with_step_max(100)
            .with_bad_max(2)
            .with_bad_seq_max(100);
        let mut opt = optimizer(identical_catalog(), config);

        let report = opt.run().unwrap();
        assert_eq!(report.termination, Termination::BadLimit);
        assert_eq!(report.bad_steps, 2);
    }

    #[test]
    fn test_best_history_monotonic() {
        let config = PairConfig::default()
            .with_q_num(3)
            .with_type_min(4)
            .with_diff_max(1)
            .with_true_band(0.3, 0.7)
            .with_step_max(60)
            .with_bad_max(60)
            .with_bad_seq_max(60)
            .with_seed(7);
        let mut opt = optimizer(mixed_catalog(), config);
        let report = opt.run().unwrap();

        assert_eq!(report.best_history.len(), report.steps + 1);
        for w in report.best_history.windows(2) {
            assert!(
                w[1].constraint <= w[0].constraint,
                "best constraint rose: {} -> {}",
                w[0].constraint,
                w[1].constraint
            );
            if w[0].constraint == 0.0 {
                assert!(w[1].coverage <= w[0].coverage);
            }
        }
    }

    #[test]
    fn test_run_multiple_stops_on_perfect() {
        let catalog: Catalog = (0..10)
            .map(|i| ItemRecord::new(format!("q{i}"), 2, 1, 1))
            .collect();
        let config = PairConfig::default()
            .with_q_num(3)
            .with_type_min(0)
            .with_true_band(0.0, 1.0)
            .with_seed(3);
        let mut opt = optimizer(catalog, config);

        let report = opt.run_multiple(5).unwrap();
        assert_eq!(report.runs.len(), 1);
        assert!(report.success());
    }

    #[test]
    fn test_run_multiple_keeps_global_best() {
        let config = PairConfig::default()
            .with_q_num(2)
            .with_type_min(1_000)
            .with_step_max(5)
            .with_seed(13);
        let mut opt = optimizer(mixed_catalog(), config);

        let report = opt.run_multiple(3).unwrap();
        assert_eq!(report.runs.len(), 3);
        for run in &report.runs {
            assert!(report.best_scores.constraint <= run.best_scores.constraint);
        }
        assert!(matches!(opt.run_multiple(0), Err(PairError::InvalidConfig(_))));
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let config = PairConfig::default().with_q_num(3).with_step_max(15).with_seed(21);
        let mut a = optimizer(mixed_catalog(), config.clone());
        let mut b = optimizer(mixed_catalog(), config);
        a.run().unwrap();
        b.run().unwrap();
        assert_eq!(a.export_best().unwrap(), b.export_best().unwrap());
        assert_eq!(a.export_current().unwrap(), b.export_current().unwrap());
    }

    #[test]
    fn test_progress_logging_levels() {
        let sink = MemorySink::new();
        let config = PairConfig::default()
            .with_q_num(2)
            .with_type_min(1_000)
            .with_step_max(3)
            .with_bad_max(100)
            .with_bad_seq_max(100)
            .with_seed(1)
            .with_verbosity(1);
        let mut opt = PairOptimizer::new(Arc::new(mixed_catalog()), config)
            .unwrap()
            .with_logger(sink.clone());
        opt.run().unwrap();

        let text = sink.contents();
        assert!(text.contains("Optimization initiated.\n"), "{text}");
        assert!(text.contains("...\n"), "{text}");
        assert!(text.ends_with("Maximum number of steps reached. Terminate\n"), "{text}");
        assert!(!text.contains("Step #"), "step lines are level 2: {text}");

        let sink = MemorySink::new();
        let mut opt = PairOptimizer::new(
            Arc::new(mixed_catalog()),
            opt.config().clone().with_verbosity(2),
        )
        .unwrap()
        .with_logger(sink.clone());
        opt.run().unwrap();
        let text = sink.contents();
        assert!(text.contains("Step #0: Constraint Score="), "{text}");
        assert!(text.contains("Step #1: Swap = ("), "{text}");
    }

    #[test]
    fn test_silent_at_verbosity_zero() {
        let sink = MemorySink::new();
        let config = PairConfig::default().with_q_num(2).with_step_max(3).with_verbosity(0);
        let mut opt = PairOptimizer::new(Arc::new(mixed_catalog()), config)
            .unwrap()
            .with_logger(sink.clone());
        opt.run().unwrap();
        assert!(sink.contents().is_empty());
    }

    fn nonzero(tally: &Tally) -> Tally {
        tally.iter().filter(|&(_, &n)| n != 0).map(|(k, &n)| (k.clone(), n)).collect()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_steps_preserve_size_and_disjointness(
            seed in any::<u64>(),
            q in 1usize..=4,
            steps in 0usize..12,
            effort in 0.1f64..=1.0,
        ) {
            let config = PairConfig::default().with_q_num(q).with_effort(effort).with_seed(seed);
            let mut opt = optimizer(mixed_catalog(), config);
            opt.sample_pair().unwrap();
            for _ in 0..steps {
                opt.take_step().unwrap();
                let pair = opt.current().unwrap();
                prop_assert_eq!(pair.pre().len(), q);
                prop_assert_eq!(pair.post().len(), q);
                prop_assert!(pair.overlap().is_empty());
            }
        }

        #[test]
        fn prop_cached_state_matches_recompute(seed in any::<u64>(), steps in 1usize..10) {
            let config = PairConfig::default().with_q_num(3).with_type_min(3).with_seed(seed);
            let mut opt = optimizer(mixed_catalog(), config);
            opt.sample_pair().unwrap();
            for _ in 0..steps {
                opt.take_step().unwrap();
            }

            let pair = opt.current().unwrap();
            let cached = opt.summary().unwrap();
            let fresh = Summary::of(pair);
            prop_assert_eq!(cached.subparts, fresh.subparts);
            prop_assert_eq!(cached.trues, fresh.trues);
            for i in 0..2 {
                prop_assert_eq!(nonzero(&cached.categories[i]), nonzero(&fresh.categories[i]));
            }

            let scores = opt.current_scores().unwrap();
            let constraint = scoring::constraint_score(
                &fresh,
                opt.config(),
                opt.catalog().categories(),
                opt.weights(),
            );
            let (pre, post) = pair.tally_subcategories();
            prop_assert!((scores.constraint - constraint).abs() < 1e-9);
            prop_assert_eq!(scores.coverage, scoring::coverage_score(&pre, &post));
        }
    }
}
