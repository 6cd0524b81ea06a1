//! Run configuration and run-round keys.

use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::{CodesignError, Result};

/// Default base directory shared with the external search jobs.
pub const DEFAULT_BASE_DIR: &str = "/content/ArithmeticTree";

/// Timestamp format used for run stamps and round keys.
pub const STAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Immutable configuration for one co-design run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    /// Directory holding the job scripts and every artifact subdirectory.
    pub base_dir: PathBuf,

    /// Bit-width of the target multiplier.
    pub input_bit: u32,

    /// Weight applied to the area metrics when scoring candidates.
    pub area_weight: f64,

    /// Iteration budget handed to the policy-optimization stage.
    pub ppo_iterations: u32,

    /// Iteration budget handed to the tree-search stage.
    pub mcts_iterations: u32,

    /// Number of rounds to run.
    pub rounds: u32,

    /// Program used to launch the job scripts.
    pub interpreter: String,

    /// Policy-optimization job script, relative to `base_dir`.
    pub ppo_script: String,

    /// Tree-search job script, relative to `base_dir`.
    pub mcts_script: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(DEFAULT_BASE_DIR),
            input_bit: 16,
            area_weight: 0.01,
            ppo_iterations: 900,
            mcts_iterations: 100,
            rounds: 3,
            interpreter: "python3".to_string(),
            ppo_script: "PPO2_mult.py".to_string(),
            mcts_script: "MCTS_mult.py".to_string(),
        }
    }
}

impl RunConfig {
    /// Check the invariants every component relies on.
    pub fn validate(&self) -> Result<()> {
        if self.input_bit == 0 {
            return Err(CodesignError::InvalidConfig(
                "input_bit must be greater than zero".to_string(),
            ));
        }
        if !self.area_weight.is_finite() || self.area_weight < 0.0 {
            return Err(CodesignError::InvalidConfig(format!(
                "area_weight must be a non-negative number, got {}",
                self.area_weight
            )));
        }
        if self.rounds == 0 {
            return Err(CodesignError::InvalidConfig(
                "rounds must be greater than zero".to_string(),
            ));
        }
        if self.ppo_iterations == 0 || self.mcts_iterations == 0 {
            return Err(CodesignError::InvalidConfig(
                "stage iteration budgets must be greater than zero".to_string(),
            ));
        }
        if self.interpreter.trim().is_empty() {
            return Err(CodesignError::InvalidConfig(
                "interpreter must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Bit-width handed to the tree-search stage.
    pub fn adder_bits(&self) -> u32 {
        self.input_bit * 2
    }

    /// Area weight as it appears on command lines and file names.
    pub fn area_weight_label(&self) -> String {
        format!("{:.2}", self.area_weight)
    }
}

/// Timestamp shared by every round of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStamp(String);

impl RunStamp {
    /// Stamp for the current local time.
    pub fn now() -> Self {
        Self::from_datetime(Local::now())
    }

    pub fn from_datetime(at: DateTime<Local>) -> Self {
        Self(at.format(STAMP_FORMAT).to_string())
    }

    /// Use a caller-supplied stamp verbatim.
    pub fn fixed(stamp: impl Into<String>) -> Self {
        Self(stamp.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key naming every artifact produced in `round`.
    pub fn round_key(&self, round: u32) -> String {
        format!("{}-{}", self.0, round)
    }
}

impl std::fmt::Display for RunStamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
