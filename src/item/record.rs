//! Item records and the shared catalog.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Per-name counts (category or sub-category → number of sub-parts).
///
/// Ordered so that iteration, logging and exports are deterministic.
pub type Tally = BTreeMap<String, i64>;

/// Adds every entry of `other` into `tally`, keeping zero entries.
pub(crate) fn tally_add(tally: &mut Tally, other: &Tally) {
    for (name, &n) in other {
        *tally.entry(name.clone()).or_insert(0) += n;
    }
}

/// Subtracts every entry of `other` from `tally`, keeping zero entries.
pub(crate) fn tally_sub(tally: &mut Tally, other: &Tally) {
    for (name, &n) in other {
        *tally.entry(name.clone()).or_insert(0) -= n;
    }
}

/// Names whose count is strictly positive.
pub(crate) fn present(tally: &Tally) -> BTreeSet<&str> {
    tally
        .iter()
        .filter(|&(_, &n)| n > 0)
        .map(|(name, _)| name.as_str())
        .collect()
}

/// `post - pre` over the union of keys, missing keys counting as 0.
pub(crate) fn tally_difference(pre: &Tally, post: &Tally) -> Tally {
    let mut diff = Tally::new();
    for name in pre.keys().chain(post.keys()) {
        if diff.contains_key(name) {
            continue;
        }
        let n = post.get(name).copied().unwrap_or(0) - pre.get(name).copied().unwrap_or(0);
        diff.insert(name.clone(), n);
    }
    diff
}

/// Names present (count > 0) on one side only, as
/// `(present in post but not pre, present in pre but not post)`.
pub(crate) fn tally_missed(pre: &Tally, post: &Tally) -> (BTreeSet<String>, BTreeSet<String>) {
    let pre = present(pre);
    let post = present(post);
    let missed_from_pre = post.difference(&pre).map(|s| s.to_string()).collect();
    let missed_from_post = pre.difference(&post).map(|s| s.to_string()).collect();
    (missed_from_pre, missed_from_post)
}

/// One catalog entry (a question item).
///
/// `count` is the number of sub-parts. `true_count` and `false_count` need
/// not add up to `count`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub label: String,
    pub count: i64,
    pub true_count: i64,
    pub false_count: i64,
    pub categories: Tally,
    pub subcategories: Tally,
}

impl ItemRecord {
    /// Creates a record with empty category and sub-category tallies.
    pub fn new(label: impl Into<String>, count: i64, true_count: i64, false_count: i64) -> Self {
        Self {
            label: label.into(),
            count,
            true_count,
            false_count,
            categories: Tally::new(),
            subcategories: Tally::new(),
        }
    }

    /// Sets the sub-part count of category `name`.
    pub fn with_category(mut self, name: impl Into<String>, n: i64) -> Self {
        self.categories.insert(name.into(), n);
        self
    }

    /// Sets the sub-part count of sub-category `name`.
    pub fn with_subcategory(mut self, name: impl Into<String>, n: i64) -> Self {
        self.subcategories.insert(name.into(), n);
        self
    }
}

/// Item records keyed by their own label.
///
/// A catalog is built once and then shared read-only (behind an `Arc`) by
/// every [`ItemSet`](super::ItemSet) that refers to it. It also tracks the
/// universe of category and sub-category names seen across its records;
/// a record that lacks a name counts as 0 for it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    items: BTreeMap<String, ItemRecord>,
    categories: BTreeSet<String>,
    subcategories: BTreeSet<String>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record under its label, replacing any previous record with
    /// the same label.
    pub fn insert(&mut self, record: ItemRecord) {
        if self.items.contains_key(&record.label) {
            self.items.insert(record.label.clone(), record);
            self.rebuild_names();
        } else {
            self.categories.extend(record.categories.keys().cloned());
            self.subcategories.extend(record.subcategories.keys().cloned());
            self.items.insert(record.label.clone(), record);
        }
    }

    fn rebuild_names(&mut self) {
        self.categories.clear();
        self.subcategories.clear();
        for record in self.items.values() {
            self.categories.extend(record.categories.keys().cloned());
            self.subcategories.extend(record.subcategories.keys().cloned());
        }
    }

    /// Copies every record of `other` into this catalog; records of `other`
    /// win on label clashes.
    pub fn merge(&mut self, other: &Catalog) {
        for record in other.items.values() {
            self.items.insert(record.label.clone(), record.clone());
        }
        self.rebuild_names();
    }

    pub fn get(&self, label: &str) -> Option<&ItemRecord> {
        self.items.get(label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.items.contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Labels in lexicographic order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    pub fn records(&self) -> impl Iterator<Item = &ItemRecord> {
        self.items.values()
    }

    /// Every category name appearing in any record.
    pub fn categories(&self) -> &BTreeSet<String> {
        &self.categories
    }

    /// Every sub-category name appearing in any record.
    pub fn subcategories(&self) -> &BTreeSet<String> {
        &self.subcategories
    }
}

impl FromIterator<ItemRecord> for Catalog {
    fn from_iter<I: IntoIterator<Item = ItemRecord>>(iter: I) -> Self {
        let mut catalog = Catalog::new();
        for record in iter {
            catalog.items.insert(record.label.clone(), record);
        }
        catalog.rebuild_names();
        catalog
    }
}
