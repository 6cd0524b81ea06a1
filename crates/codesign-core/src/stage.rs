//! Search stage definitions and job command lines.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::RunConfig;
use crate::layout::Layout;
use crate::template::TemplateKind;

/// The two external search stages of a round.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Policy-optimization search over partial-product structures.
    PolicySearch,

    /// Tree search over adder structures.
    TreeSearch,
}

impl StageKind {
    /// Label used in the run journal.
    pub fn label(&self) -> &'static str {
        match self {
            StageKind::PolicySearch => "PPO",
            StageKind::TreeSearch => "MCTS",
        }
    }

    /// Job script for this stage.
    pub fn script<'a>(&self, config: &'a RunConfig) -> &'a str {
        match self {
            StageKind::PolicySearch => &config.ppo_script,
            StageKind::TreeSearch => &config.mcts_script,
        }
    }

    /// Bit-width this stage works at.
    pub fn bits(&self, config: &RunConfig) -> u32 {
        match self {
            StageKind::PolicySearch => config.input_bit,
            StageKind::TreeSearch => config.adder_bits(),
        }
    }

    /// Result log the job is expected to leave behind.
    pub fn result_log(&self, layout: &Layout, config: &RunConfig, key: &str) -> PathBuf {
        match self {
            StageKind::PolicySearch => layout.mult_log(self.bits(config), key),
            StageKind::TreeSearch => layout.mcts_log(self.bits(config), key),
        }
    }

    /// Full Verilog file of a candidate named in the result log.
    pub fn candidate_source(&self, layout: &Layout, candidate_id: &str) -> PathBuf {
        match self {
            StageKind::PolicySearch => layout.mult_sources_dir().join(candidate_id),
            StageKind::TreeSearch => layout.adder_sources_dir().join(candidate_id),
        }
    }

    /// Template extracted from this stage's winner.
    pub fn template_kind(&self) -> TemplateKind {
        match self {
            StageKind::PolicySearch => TemplateKind::Multiplier,
            StageKind::TreeSearch => TemplateKind::Adder,
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A fully resolved job invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub stage: StageKind,

    /// Round this job belongs to.
    pub round: u32,

    /// Run-round key passed as `--strftime`.
    pub round_key: String,

    /// Command to execute (first element is the executable).
    pub command: Vec<String>,
}

impl JobSpec {
    /// Policy-optimization job; seeded with the previous round's adder
    /// template when one exists.
    pub fn policy_search(
        config: &RunConfig,
        layout: &Layout,
        round: u32,
        round_key: &str,
        adder_template: Option<&str>,
    ) -> Self {
        let stage = StageKind::PolicySearch;
        let mut command = vec![
            config.interpreter.clone(),
            layout.script(stage.script(config)).to_string_lossy().into_owned(),
            "--input_bit".to_string(),
            stage.bits(config).to_string(),
            "--max_iter".to_string(),
            config.ppo_iterations.to_string(),
            "--strftime".to_string(),
            round_key.to_string(),
        ];
        if let Some(template) = adder_template {
            command.push("--template".to_string());
            command.push(template.to_string());
        }

        Self {
            stage,
            round,
            round_key: round_key.to_string(),
            command,
        }
    }

    /// Tree-search job over the given multiplier template. After the first
    /// round the job resumes from its accumulated search state.
    pub fn tree_search(
        config: &RunConfig,
        layout: &Layout,
        round: u32,
        round_key: &str,
        mult_template: &str,
    ) -> Self {
        let stage = StageKind::TreeSearch;
        let mut command = vec![
            config.interpreter.clone(),
            layout.script(stage.script(config)).to_string_lossy().into_owned(),
            "--input_bit".to_string(),
            stage.bits(config).to_string(),
            "--max_iter".to_string(),
            config.mcts_iterations.to_string(),
            "--template".to_string(),
            mult_template.to_string(),
            "--strftime".to_string(),
            round_key.to_string(),
            "--area_w".to_string(),
            config.area_weight_label(),
        ];
        if round > 0 {
            command.push("--init_state".to_string());
        }

        Self {
            stage,
            round,
            round_key: round_key.to_string(),
            command,
        }
    }

    pub fn program(&self) -> &str {
        self.command.first().map(String::as_str).unwrap_or_default()
    }

    pub fn args(&self) -> &[String] {
        self.command.get(1..).unwrap_or_default()
    }

    /// Script name shown in diagnostics.
    pub fn display_name(&self) -> String {
        self.command
            .get(1)
            .map(|script| {
                std::path::Path::new(script)
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| script.clone())
            })
            .unwrap_or_else(|| self.program().to_string())
    }
}
