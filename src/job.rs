//! Job configuration: everything one invocation of the tool needs beyond
//! the input and output paths.
//!
//! A job file is a flat JSON object. Optimizer keys (`qNum`, `TMin`, ...),
//! catalog layout keys (`header_row`, `TF_idx`, ...), `n_runs` and
//! `write_mode` share the same level. Every key is optional; unknown keys
//! are ignored.
//!
//! ```json
//! { "qNum": 12, "TMin": 0.35, "n_runs": 5, "write_mode": "a" }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PairError, Result};
use crate::io::{CatalogLayout, WriteMode};
use crate::optimizer::PairConfig;

/// Configuration of one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    #[serde(flatten)]
    pub optimizer: PairConfig,

    #[serde(flatten)]
    pub layout: CatalogLayout,

    /// Number of independent runs; the best pair across them is kept.
    pub n_runs: usize,

    pub write_mode: WriteMode,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            optimizer: PairConfig::default(),
            layout: CatalogLayout::default(),
            n_runs: 3,
            write_mode: WriteMode::default(),
        }
    }
}

impl JobConfig {
    /// Parses a job from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let job: JobConfig = serde_json::from_str(text)?;
        job.validate()?;
        Ok(job)
    }

    /// Loads a job file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let job = Self::from_json(&fs::read_to_string(path)?)?;
        debug!(path = %path.display(), "job configuration loaded");
        Ok(job)
    }

    /// Loads `path` when given, otherwise returns the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Writes the default configuration as pretty-printed JSON.
    pub fn write_defaults(path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string_pretty(&Self::default())?;
        fs::write(path, text + "\n")?;
        Ok(())
    }

    /// Applies a command-line verbosity, which takes precedence over the
    /// job file.
    pub fn with_verbosity_override(mut self, verbosity: Option<u8>) -> Self {
        if let Some(v) = verbosity {
            self.optimizer.verbosity = v;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.optimizer.validate().map_err(PairError::InvalidConfig)
    }
}
