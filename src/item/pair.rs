//! Pre/post pairs of item sets.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::record::{tally_difference, tally_missed, Catalog, Tally};
use super::set::ItemSet;
use crate::error::{PairError, Result};

/// Which side of a pair an item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    Pre,
    Post,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Pre, Side::Post];

    /// `0` for pre, `1` for post.
    pub fn index(self) -> usize {
        match self {
            Side::Pre => 0,
            Side::Post => 1,
        }
    }

    pub fn other(self) -> Side {
        match self {
            Side::Pre => Side::Post,
            Side::Post => Side::Pre,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Pre => write!(f, "pre"),
            Side::Post => write!(f, "post"),
        }
    }
}

/// Exported labels of a pair, each side in lexicographic order.
///
/// Serialises as `{"pre": [...], "post": [...]}`; use
/// [`into_tuple`](Self::into_tuple) for the bare pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairExport {
    pub pre: Vec<String>,
    pub post: Vec<String>,
}

impl PairExport {
    pub fn into_tuple(self) -> (Vec<String>, Vec<String>) {
        (self.pre, self.post)
    }
}

impl From<PairExport> for (Vec<String>, Vec<String>) {
    fn from(export: PairExport) -> Self {
        export.into_tuple()
    }
}

/// Aggregate figures of both sides, indexed by [`Side::index`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairReport {
    pub subparts: [i64; 2],
    pub true_ratio: [Option<f64>; 2],
    pub categories: [Tally; 2],
    pub subcategories: [Tally; 2],
}

/// A pre-course and a post-course [`ItemSet`].
///
/// The two sides usually share one catalog, but may each carry their own.
#[derive(Debug, Clone)]
pub struct PairedSet {
    pre: ItemSet,
    post: ItemSet,
}

impl PairedSet {
    /// Builds a pair from two label collections over one catalog.
    pub fn new<I, J, S, T>(pre: I, post: J, catalog: Arc<Catalog>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Ok(Self {
            pre: ItemSet::new(pre, catalog.clone())?,
            post: ItemSet::new(post, catalog)?,
        })
    }

    /// Builds a pair whose sides resolve labels against different catalogs.
    pub fn with_catalogs<I, J, S, T>(
        pre: I,
        post: J,
        pre_catalog: Arc<Catalog>,
        post_catalog: Arc<Catalog>,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Ok(Self {
            pre: ItemSet::new(pre, pre_catalog)?,
            post: ItemSet::new(post, post_catalog)?,
        })
    }

    pub fn from_sets(pre: ItemSet, post: ItemSet) -> Self {
        Self { pre, post }
    }

    /// Samples `2n` distinct labels and splits them into two disjoint sides
    /// of `n` each.
    pub fn sample_disjoint<R: Rng + ?Sized>(catalog: Arc<Catalog>, n: usize, rng: &mut R) -> Result<Self> {
        let needed = 2 * n;
        if needed > catalog.len() {
            return Err(PairError::CatalogTooSmall {
                needed,
                available: catalog.len(),
            });
        }
        let mut keys: Vec<&str> = catalog.labels().collect();
        keys.shuffle(rng);
        let pre: Vec<String> = keys[..n].iter().map(|s| s.to_string()).collect();
        let post: Vec<String> = keys[n..needed].iter().map(|s| s.to_string()).collect();
        Self::new(pre, post, catalog)
    }

    /// Samples each side independently; the sides may overlap.
    pub fn sample_independent<R: Rng + ?Sized>(
        catalog: Arc<Catalog>,
        n: usize,
        rng: &mut R,
    ) -> Result<Self> {
        let pre = ItemSet::sample_from(catalog.clone(), n, rng)?;
        let post = ItemSet::sample_from(catalog, n, rng)?;
        Ok(Self { pre, post })
    }

    pub fn pre(&self) -> &ItemSet {
        &self.pre
    }

    pub fn post(&self) -> &ItemSet {
        &self.post
    }

    pub fn side(&self, side: Side) -> &ItemSet {
        match side {
            Side::Pre => &self.pre,
            Side::Post => &self.post,
        }
    }

    pub(crate) fn side_mut(&mut self, side: Side) -> &mut ItemSet {
        match side {
            Side::Pre => &mut self.pre,
            Side::Post => &mut self.post,
        }
    }

    /// Whether both sides point at the same catalog.
    pub fn shares_catalog(&self) -> bool {
        Arc::ptr_eq(self.pre.catalog(), self.post.catalog())
    }

    /// `post − pre` sub-part totals.
    pub fn subpart_difference(&self) -> i64 {
        self.post.tally_subparts() - self.pre.tally_subparts()
    }

    /// `post − pre` per category over the union of categories.
    pub fn category_difference(&self) -> Tally {
        tally_difference(&self.pre.tally_categories(), &self.post.tally_categories())
    }

    /// `post − pre` per sub-category over the union of sub-categories.
    pub fn subcategory_difference(&self) -> Tally {
        tally_difference(&self.pre.tally_subcategories(), &self.post.tally_subcategories())
    }

    /// Categories with a positive count on exactly one side, as
    /// `(missing from pre, missing from post)`.
    pub fn category_missed(&self) -> (BTreeSet<String>, BTreeSet<String>) {
        tally_missed(&self.pre.tally_categories(), &self.post.tally_categories())
    }

    /// Sub-categories with a positive count on exactly one side, as
    /// `(missing from pre, missing from post)`.
    pub fn subcategory_missed(&self) -> (BTreeSet<String>, BTreeSet<String>) {
        tally_missed(&self.pre.tally_subcategories(), &self.post.tally_subcategories())
    }

    pub fn tally_subparts(&self) -> (i64, i64) {
        (self.pre.tally_subparts(), self.post.tally_subparts())
    }

    pub fn tally_true(&self) -> (i64, i64) {
        (self.pre.tally_true(), self.post.tally_true())
    }

    pub fn tally_false(&self) -> (i64, i64) {
        (self.pre.tally_false(), self.post.tally_false())
    }

    pub fn true_ratio(&self) -> (Option<f64>, Option<f64>) {
        (self.pre.true_ratio(), self.post.true_ratio())
    }

    pub fn tally_categories(&self) -> (Tally, Tally) {
        (self.pre.tally_categories(), self.post.tally_categories())
    }

    pub fn tally_subcategories(&self) -> (Tally, Tally) {
        (self.pre.tally_subcategories(), self.post.tally_subcategories())
    }

    /// Labels used on both sides.
    pub fn overlap(&self) -> BTreeSet<String> {
        self.pre.overlap(&self.post)
    }

    /// Labels used on both sides whose records also agree.
    pub fn overlap_strict(&self) -> BTreeSet<String> {
        self.pre.overlap_strict(&self.post)
    }

    pub fn export(&self) -> PairExport {
        PairExport {
            pre: self.pre.export(),
            post: self.post.export(),
        }
    }

    pub fn summary_report(&self) -> PairReport {
        PairReport {
            subparts: [self.pre.tally_subparts(), self.post.tally_subparts()],
            true_ratio: [self.pre.true_ratio(), self.post.true_ratio()],
            categories: [self.pre.tally_categories(), self.post.tally_categories()],
            subcategories: [self.pre.tally_subcategories(), self.post.tally_subcategories()],
        }
    }
}

impl fmt::Display for PairedSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pre: {}\npost: {}", self.pre, self.post)
    }
}
