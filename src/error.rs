//! Crate error type.

use std::io;

use thiserror::Error;

/// Errors raised by catalog loading, pair construction and the optimizer.
///
/// Search termination is never an error: a run that hits one of its limits
/// reports a [`Termination`](crate::optimizer::Termination) instead.
#[derive(Error, Debug)]
pub enum PairError {
    #[error("no result available: {0}")]
    NoResult(&'static str),

    #[error("catalog too small: need {needed} items, have {available}")]
    CatalogTooSmall { needed: usize, available: usize },

    #[error("unknown item label: {0}")]
    UnknownLabel(String),

    #[error("invalid pre/post pair: {0}")]
    InvalidPair(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("parse error at line {line}, column {column}: {reason}")]
    Parse {
        line: u64,
        column: usize,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PairError>;
