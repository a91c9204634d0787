//! A set of item labels over a shared catalog.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;

use super::record::{tally_add, Catalog, ItemRecord, Tally};
use crate::error::{PairError, Result};

/// One side of an assessment pair: a set of labels plus a handle to the
/// catalog that resolves them.
///
/// Cloning an `ItemSet` copies the label set but not the catalog; both
/// copies point at the same `Arc<Catalog>`. Every label is guaranteed to be
/// present in the catalog.
#[derive(Debug, Clone)]
pub struct ItemSet {
    labels: BTreeSet<String>,
    catalog: Arc<Catalog>,
}

impl ItemSet {
    /// Creates a set from labels, failing on the first label the catalog
    /// does not know.
    pub fn new<I, S>(labels: I, catalog: Arc<Catalog>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = BTreeSet::new();
        for label in labels {
            let label = label.into();
            if !catalog.contains(&label) {
                return Err(PairError::UnknownLabel(label));
            }
            set.insert(label);
        }
        Ok(Self {
            labels: set,
            catalog,
        })
    }

    /// Draws `n` distinct labels uniformly from the catalog.
    pub fn sample_from<R: Rng + ?Sized>(catalog: Arc<Catalog>, n: usize, rng: &mut R) -> Result<Self> {
        if n > catalog.len() {
            return Err(PairError::CatalogTooSmall {
                needed: n,
                available: catalog.len(),
            });
        }
        let mut keys: Vec<&str> = catalog.labels().collect();
        keys.shuffle(rng);
        let labels = keys[..n].iter().map(|s| s.to_string()).collect();
        Ok(Self { labels, catalog })
    }

    pub fn labels(&self) -> &BTreeSet<String> {
        &self.labels
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    fn records(&self) -> impl Iterator<Item = &ItemRecord> {
        self.labels.iter().filter_map(|label| self.catalog.get(label))
    }

    /// Total number of sub-parts.
    pub fn tally_subparts(&self) -> i64 {
        self.records().map(|r| r.count).sum()
    }

    /// Total number of sub-parts answered true.
    pub fn tally_true(&self) -> i64 {
        self.records().map(|r| r.true_count).sum()
    }

    /// Total number of sub-parts answered false.
    pub fn tally_false(&self) -> i64 {
        self.records().map(|r| r.false_count).sum()
    }

    /// `true / (true + false)`, or `None` when both tallies are zero.
    pub fn true_ratio(&self) -> Option<f64> {
        let t = self.tally_true();
        let total = t + self.tally_false();
        if total == 0 {
            None
        } else {
            Some(t as f64 / total as f64)
        }
    }

    /// Sub-part counts per category, summed over all members.
    pub fn tally_categories(&self) -> Tally {
        let mut tally = Tally::new();
        for record in self.records() {
            tally_add(&mut tally, &record.categories);
        }
        tally
    }

    /// Sub-part counts per sub-category, summed over all members.
    pub fn tally_subcategories(&self) -> Tally {
        let mut tally = Tally::new();
        for record in self.records() {
            tally_add(&mut tally, &record.subcategories);
        }
        tally
    }

    /// Labels present in both sets.
    pub fn overlap(&self, other: &ItemSet) -> BTreeSet<String> {
        self.labels.intersection(&other.labels).cloned().collect()
    }

    /// Labels present in both sets whose records are also equal in the two
    /// catalogs.
    pub fn overlap_strict(&self, other: &ItemSet) -> BTreeSet<String> {
        self.labels
            .intersection(&other.labels)
            .filter(|label| self.catalog.get(label) == other.catalog.get(label))
            .cloned()
            .collect()
    }

    /// Labels of this set that also appear in `labels`.
    pub fn overlap_labels<'a, I>(&self, labels: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        labels
            .into_iter()
            .filter(|label| self.labels.contains(*label))
            .map(str::to_string)
            .collect()
    }

    /// Labels in lexicographic order.
    pub fn export(&self) -> Vec<String> {
        self.labels.iter().cloned().collect()
    }

    /// Replaces `old` with `new`. The caller guarantees `new` is in the
    /// catalog.
    pub(crate) fn swap(&mut self, old: &str, new: &str) {
        self.labels.remove(old);
        self.labels.insert(new.to_string());
    }
}

impl fmt::Display for ItemSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, label) in self.labels.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{label}")?;
        }
        write!(f, "}}; catalog@{:p}", Arc::as_ptr(&self.catalog))
    }
}
