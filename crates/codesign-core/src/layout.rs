//! On-disk layout shared with the external search jobs.
//!
//! Every path the controller reads or writes is composed here from the
//! base directory, a bit-width and a run-round key, so the controller and
//! the jobs agree on names without exchanging them.

use std::path::{Path, PathBuf};

use crate::config::{RunConfig, RunStamp};
use crate::error::Result;

const MULT_LOGS_DIR: &str = "mult_logs";
const MCTS_LOGS_DIR: &str = "mcts_mult_adder";
const RUN_LOGS_DIR: &str = "back_and_forth";
const MULT_SOURCES_DIR: &str = "run_verilog_mult_mid";
const ADDER_SOURCES_DIR: &str = "run_verilog_mult_add_mid";
const MULT_TEMPLATE_DIR: &str = "multiplier_template";
const ADDER_TEMPLATE_DIR: &str = "adder_template";

/// Path conventions rooted at a base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    base: PathBuf,
}

impl Layout {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(&config.base_dir)
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Create the log, run-log and template directories if absent.
    pub fn prepare(&self) -> Result<()> {
        for dir in [
            self.mult_logs_dir(),
            self.mcts_logs_dir(),
            self.run_logs_dir(),
            self.mult_template_dir(),
            self.adder_template_dir(),
        ] {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(())
    }

    pub fn mult_logs_dir(&self) -> PathBuf {
        self.base.join(MULT_LOGS_DIR)
    }

    pub fn mcts_logs_dir(&self) -> PathBuf {
        self.base.join(MCTS_LOGS_DIR)
    }

    pub fn run_logs_dir(&self) -> PathBuf {
        self.base.join(RUN_LOGS_DIR)
    }

    pub fn mult_sources_dir(&self) -> PathBuf {
        self.base.join(MULT_SOURCES_DIR)
    }

    pub fn adder_sources_dir(&self) -> PathBuf {
        self.base.join(ADDER_SOURCES_DIR)
    }

    pub fn mult_template_dir(&self) -> PathBuf {
        self.base.join(MULT_TEMPLATE_DIR)
    }

    pub fn adder_template_dir(&self) -> PathBuf {
        self.base.join(ADDER_TEMPLATE_DIR)
    }

    /// Result log written by the policy-optimization job.
    pub fn mult_log(&self, bits: u32, key: &str) -> PathBuf {
        self.mult_logs_dir().join(format!("mult_{}b_{}.log", bits, key))
    }

    /// Result log written by the tree-search job.
    pub fn mcts_log(&self, bits: u32, key: &str) -> PathBuf {
        self.mcts_logs_dir()
            .join(format!("mcts_mult_adder_{}b_openroad_{}.log", bits, key))
    }

    /// Journal for a whole run.
    pub fn run_log(&self, config: &RunConfig, stamp: &RunStamp) -> PathBuf {
        self.run_logs_dir().join(format!(
            "bandf_{}b_{}_{}.log",
            config.input_bit,
            stamp,
            config.area_weight_label()
        ))
    }

    pub fn script(&self, name: &str) -> PathBuf {
        self.base.join(name)
    }
}

/// File name of the multiplier template for a round key.
pub fn mult_template_name(key: &str) -> String {
    format!("mult_template_{}.v", key)
}

/// File name of the adder template for a round key.
pub fn adder_template_name(key: &str) -> String {
    format!("adder_template_{}.v", key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_log_paths_follow_convention() {
        let layout = Layout::new("/base");
        assert_eq!(
            layout.mult_log(16, "2024-01-01-00-00-00-0"),
            PathBuf::from("/base/mult_logs/mult_16b_2024-01-01-00-00-00-0.log")
        );
        assert_eq!(
            layout.mcts_log(32, "k-1"),
            PathBuf::from("/base/mcts_mult_adder/mcts_mult_adder_32b_openroad_k-1.log")
        );
    }

    #[test]
    fn test_run_log_includes_width_stamp_and_weight() {
        let layout = Layout::new("/base");
        let config = RunConfig {
            input_bit: 8,
            area_weight: 0.05,
            ..RunConfig::default()
        };
        let path = layout.run_log(&config, &RunStamp::fixed("s"));
        assert_eq!(path, PathBuf::from("/base/back_and_forth/bandf_8b_s_0.05.log"));
    }

    #[test]
    fn test_template_names() {
        assert_eq!(mult_template_name("s-0"), "mult_template_s-0.v");
        assert_eq!(adder_template_name("s-1"), "adder_template_s-1.v");
    }

    #[test]
    fn test_prepare_is_idempotent() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path());
        layout.prepare().unwrap();
        layout.prepare().unwrap();

        assert!(layout.mult_logs_dir().is_dir());
        assert!(layout.mcts_logs_dir().is_dir());
        assert!(layout.run_logs_dir().is_dir());
        assert!(layout.mult_template_dir().is_dir());
        assert!(layout.adder_template_dir().is_dir());
    }
}
