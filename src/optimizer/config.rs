//! Optimizer configuration.

use serde::{Deserialize, Serialize};

/// Configuration parameters for [`PairOptimizer`](super::PairOptimizer).
///
/// Serialises with the key names used in job files (`qNum`, `typeMin`,
/// `diffMax`, `TMin`, `TMax`, `stepMax`, `badMax`, `badSeqMax`, `effort`,
/// `verbosity`, `seed`); missing keys take their default.
///
/// # Examples
///
/// ```
/// use u_prepost::optimizer::PairConfig;
///
/// let config = PairConfig::default()
///     .with_q_num(10)
///     .with_true_band(0.3, 0.7)
///     .with_effort(0.8)
///     .with_seed(7);
/// assert_eq!(config.q_num, 10);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairConfig {
    /// Number of items on each side.
    #[serde(rename = "qNum")]
    pub q_num: usize,

    /// Minimum sub-part count per category on each side.
    #[serde(rename = "typeMin")]
    pub type_min: i64,

    /// Maximum allowed difference in sub-part totals between the sides.
    #[serde(rename = "diffMax")]
    pub diff_max: i64,

    /// Lower bound of the true-answer ratio band.
    #[serde(rename = "TMin")]
    pub t_min: f64,

    /// Upper bound of the true-answer ratio band.
    #[serde(rename = "TMax")]
    pub t_max: f64,

    /// Maximum number of steps in one run.
    #[serde(rename = "stepMax")]
    pub step_max: usize,

    /// Maximum number of bad (non-improving) steps in one run.
    #[serde(rename = "badMax")]
    pub bad_max: usize,

    /// Maximum number of consecutive bad steps in one run.
    #[serde(rename = "badSeqMax")]
    pub bad_seq_max: usize,

    /// Fraction in `[0, 1]` of used and of unused items sampled per step.
    /// The number of swaps scored scales with `effort²`.
    pub effort: f64,

    /// Progress detail, 0 (silent) to 3 (full dumps).
    pub verbosity: u8,

    /// Random seed (None for a random one).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for PairConfig {
    fn default() -> Self {
        Self {
            q_num: 15,
            type_min: 5,
            diff_max: 2,
            t_min: 0.4,
            t_max: 0.6,
            step_max: 100,
            bad_max: 50,
            bad_seq_max: 10,
            effort: 0.5,
            verbosity: 1,
            seed: None,
        }
    }
}

impl PairConfig {
    /// Sets the number of items on each side.
    pub fn with_q_num(mut self, n: usize) -> Self {
        self.q_num = n;
        self
    }

    /// Sets the minimum sub-part count per category on each side.
    pub fn with_type_min(mut self, n: i64) -> Self {
        self.type_min = n;
        self
    }

    /// Sets the maximum sub-part total difference between the sides.
    pub fn with_diff_max(mut self, n: i64) -> Self {
        self.diff_max = n;
        self
    }

    /// Sets the true-answer ratio band `[t_min, t_max]`.
    pub fn with_true_band(mut self, t_min: f64, t_max: f64) -> Self {
        self.t_min = t_min;
        self.t_max = t_max;
        self
    }

    /// Sets the maximum number of steps per run.
    pub fn with_step_max(mut self, n: usize) -> Self {
        self.step_max = n;
        self
    }

    /// Sets the maximum number of bad steps per run.
    pub fn with_bad_max(mut self, n: usize) -> Self {
        self.bad_max = n;
        self
    }

    /// Sets the maximum number of consecutive bad steps.
    pub fn with_bad_seq_max(mut self, n: usize) -> Self {
        self.bad_seq_max = n;
        self
    }

    /// Sets the sampled fraction of used and unused items per step.
    pub fn with_effort(mut self, effort: f64) -> Self {
        self.effort = effort;
        self
    }

    /// Sets the progress detail level (0 to 3).
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Sets the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.q_num == 0 {
            return Err("qNum must be at least 1".into());
        }
        if !(0.0..=1.0).contains(&self.t_min) || !(0.0..=1.0).contains(&self.t_max) {
            return Err(format!(
                "TMin and TMax must lie in [0, 1], got {} and {}",
                self.t_min, self.t_max
            ));
        }
        if self.t_min > self.t_max {
            return Err(format!(
                "TMin must not exceed TMax, got {} > {}",
                self.t_min, self.t_max
            ));
        }
        if !(0.0..=1.0).contains(&self.effort) {
            return Err(format!("effort must lie in [0, 1], got {}", self.effort));
        }
        if self.verbosity > 3 {
            return Err(format!("verbosity must be 0..=3, got {}", self.verbosity));
        }
        Ok(())
    }
}
