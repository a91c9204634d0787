//! Catalog ingestion from CSV.
//!
//! Expected layout: `header_row` header rows, the last of which names the
//! category and sub-category columns, followed by one row per item:
//!
//! ```text
//! label, count, T, F, <category counts...>, <sub-category counts...>
//! ```
//!
//! Column positions are configurable through [`CatalogLayout`]; all indexes
//! are zero-based.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PairError, Result};
use crate::item::{Catalog, ItemRecord, Tally};

/// Column layout of a catalog CSV file.
///
/// Serialises with the job-file key names (`header_row`, `label_idx`,
/// `count_idx`, `TF_idx`, `type_idx`, `num_type`, `subtype_idx`,
/// `num_subtype`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogLayout {
    /// Number of header rows; the last one holds the category names.
    pub header_row: usize,
    /// Column of the item label.
    pub label_idx: usize,
    /// Column of the sub-part count.
    pub count_idx: usize,
    /// Column of the true count; the false count follows it.
    #[serde(rename = "TF_idx")]
    pub tf_idx: usize,
    /// First category-count column.
    pub type_idx: usize,
    /// Number of category-count columns.
    pub num_type: usize,
    /// First sub-category-count column.
    pub subtype_idx: usize,
    /// Number of sub-category-count columns.
    pub num_subtype: usize,
}

impl Default for CatalogLayout {
    fn default() -> Self {
        Self {
            header_row: 2,
            label_idx: 0,
            count_idx: 1,
            tf_idx: 2,
            type_idx: 4,
            num_type: 5,
            subtype_idx: 9,
            num_subtype: 15,
        }
    }
}

/// Reads a catalog from a CSV file. With `base`, the result starts as a
/// copy of it and rows of the file override records with the same label.
pub fn read_catalog(path: impl AsRef<Path>, layout: &CatalogLayout, base: Option<&Catalog>) -> Result<Catalog> {
    let path = path.as_ref();
    let catalog = read_catalog_from(File::open(path)?, layout, base)?;
    debug!(path = %path.display(), items = catalog.len(), "catalog read");
    Ok(catalog)
}

/// Reads a catalog from any CSV source. See [`read_catalog`].
pub fn read_catalog_from<R: Read>(reader: R, layout: &CatalogLayout, base: Option<&Catalog>) -> Result<Catalog> {
    if layout.header_row == 0 {
        return Err(PairError::InvalidConfig(
            "header_row must be at least 1 to name the categories".into(),
        ));
    }

    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    let mut rows = csv_reader.records();

    let mut header = csv::StringRecord::new();
    for _ in 0..layout.header_row {
        match rows.next() {
            Some(row) => header = row?,
            None => break,
        }
    }
    let category_names: Vec<String> = window(&header, layout.type_idx, layout.num_type);
    let subcategory_names: Vec<String> = window(&header, layout.subtype_idx, layout.num_subtype);

    let mut catalog = base.cloned().unwrap_or_default();
    for row in rows {
        let row = row?;
        if row.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        let line = row.position().map(|p| p.line()).unwrap_or(0);

        let label = row
            .get(layout.label_idx)
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .ok_or_else(|| PairError::Parse {
                line,
                column: layout.label_idx,
                reason: "missing item label".into(),
            })?;

        let mut record = ItemRecord::new(
            label,
            count(&row, layout.count_idx, line)?,
            count(&row, layout.tf_idx, line)?,
            count(&row, layout.tf_idx + 1, line)?,
        );
        record.categories = tally(&row, layout.type_idx, &category_names, line)?;
        record.subcategories = tally(&row, layout.subtype_idx, &subcategory_names, line)?;
        catalog.insert(record);
    }
    Ok(catalog)
}

fn window(header: &csv::StringRecord, start: usize, len: usize) -> Vec<String> {
    header
        .iter()
        .skip(start)
        .take(len)
        .map(|name| name.trim().to_string())
        .collect()
}

fn parse_count(field: &str, column: usize, line: u64) -> Result<i64> {
    let field = field.trim();
    if field.is_empty() {
        return Ok(0);
    }
    let n: i64 = field.parse().map_err(|_| PairError::Parse {
        line,
        column,
        reason: format!("expected a non-negative integer, got {field:?}"),
    })?;
    if n < 0 {
        return Err(PairError::Parse {
            line,
            column,
            reason: format!("count must not be negative, got {n}"),
        });
    }
    Ok(n)
}

fn count(row: &csv::StringRecord, column: usize, line: u64) -> Result<i64> {
    let field = row.get(column).ok_or_else(|| PairError::Parse {
        line,
        column,
        reason: "missing column".into(),
    })?;
    parse_count(field, column, line)
}

/// Counts under `names` starting at `start`; stops at the end of the row.
fn tally(row: &csv::StringRecord, start: usize, names: &[String], line: u64) -> Result<Tally> {
    let mut out = Tally::new();
    for (offset, name) in names.iter().enumerate() {
        let column = start + offset;
        let Some(field) = row.get(column) else {
            break;
        };
        out.insert(name.clone(), parse_count(field, column, line)?);
    }
    Ok(out)
}
