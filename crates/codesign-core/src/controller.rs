//! Round controller.
//!
//! Each round walks the same sequence of phases:
//!
//! ```text
//! PolicySearchRun -> PolicySearchSelect -> MultTemplateExtract
//!   -> TreeSearchRun -> TreeSearchSelect -> AdderTemplateExtract
//! ```
//!
//! The adder template closing round `i` seeds the policy search of round
//! `i + 1`. The first failure in any phase is written to the run journal
//! and ends the run; nothing is retried.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, Instrument};

use crate::config::{RunConfig, RunStamp};
use crate::error::{CodesignError, Result};
use crate::journal::RunJournal;
use crate::layout::Layout;
use crate::obs;
use crate::runner::JobRunner;
use crate::selector::{select_best, Selection};
use crate::stage::{JobSpec, StageKind};
use crate::template::{extract_adder_template, extract_mult_template, TemplateArtifact};

/// Phase of a round in which an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    PolicySearchRun,
    PolicySearchSelect,
    MultTemplateExtract,
    TreeSearchRun,
    TreeSearchSelect,
    AdderTemplateExtract,
}

impl std::fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RoundPhase::PolicySearchRun => "policy search run",
            RoundPhase::PolicySearchSelect => "policy search selection",
            RoundPhase::MultTemplateExtract => "multiplier template extraction",
            RoundPhase::TreeSearchRun => "tree search run",
            RoundPhase::TreeSearchSelect => "tree search selection",
            RoundPhase::AdderTemplateExtract => "adder template extraction",
        };
        f.write_str(name)
    }
}

/// Everything a completed round produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round: u32,
    pub round_key: String,
    pub policy_search: Selection,
    pub mult_template: TemplateArtifact,
    pub tree_search: Selection,
    pub adder_template: TemplateArtifact,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Done,
    Aborted {
        round: u32,
        phase: Option<RoundPhase>,
        error: String,
    },
}

/// Summary returned once the journal is closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub stamp: RunStamp,
    pub status: RunStatus,
    pub rounds: Vec<RoundRecord>,
    pub journal: PathBuf,
    pub elapsed_secs: f64,
}

impl RunOutcome {
    pub fn is_done(&self) -> bool {
        self.status == RunStatus::Done
    }

    pub fn rounds_completed(&self) -> u32 {
        self.rounds.len() as u32
    }

    /// Adder template left by the last completed round.
    pub fn last_adder_template(&self) -> Option<&TemplateArtifact> {
        self.rounds.last().map(|r| &r.adder_template)
    }
}

/// Sequences the two search stages over a fixed number of rounds.
pub struct RoundController {
    config: RunConfig,
    layout: Layout,
    stamp: RunStamp,
    runner: Arc<dyn JobRunner>,
}

impl RoundController {
    /// Build a controller stamped with the current local time.
    pub fn new(config: RunConfig, runner: Arc<dyn JobRunner>) -> Result<Self> {
        config.validate()?;
        let layout = Layout::from_config(&config);
        Ok(Self {
            config,
            layout,
            stamp: RunStamp::now(),
            runner,
        })
    }

    /// Replace the run stamp, e.g. to resume naming from a known run.
    pub fn with_stamp(mut self, stamp: RunStamp) -> Self {
        self.stamp = stamp;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn stamp(&self) -> &RunStamp {
        &self.stamp
    }

    /// Path of the journal this run writes.
    pub fn journal_path(&self) -> PathBuf {
        self.layout.run_log(&self.config, &self.stamp)
    }

    /// Run every round, stopping at the first failure.
    ///
    /// A stage or selection failure ends the run with
    /// [`RunStatus::Aborted`]; `Err` is reserved for failures to prepare
    /// the layout or write the journal itself.
    pub async fn run(&self) -> Result<RunOutcome> {
        self.layout.prepare()?;
        let mut journal = RunJournal::create(&self.journal_path())?;
        let start = Instant::now();

        obs::emit_run_started(
            self.stamp.as_str(),
            self.config.input_bit,
            self.config.area_weight,
            self.config.rounds,
        );

        let mut rounds: Vec<RoundRecord> = Vec::new();
        let mut status = RunStatus::Done;

        for round in 0..self.config.rounds {
            journal.round_started(round, start.elapsed())?;
            obs::emit_round_started(round, start.elapsed().as_secs_f64());

            let key = self.stamp.round_key(round);
            let seed = rounds.last().map(|r| r.adder_template.file_name.clone());

            let result = self
                .run_round(round, &key, seed.as_deref(), &mut journal)
                .instrument(obs::round_span(round, &key))
                .await;

            match result {
                Ok(record) => rounds.push(record),
                Err(err) => {
                    record_failure(&mut journal, round, &err)?;
                    obs::emit_run_aborted(round, &err);
                    let phase = match &err {
                        CodesignError::Round { phase, .. } => Some(*phase),
                        _ => None,
                    };
                    status = RunStatus::Aborted {
                        round,
                        phase,
                        error: err.root().to_string(),
                    };
                    break;
                }
            }
        }

        let elapsed = start.elapsed();
        journal.finish(elapsed)?;
        obs::emit_run_finished(rounds.len() as u32, elapsed.as_secs_f64());

        Ok(RunOutcome {
            stamp: self.stamp.clone(),
            status,
            rounds,
            journal: journal.path().to_path_buf(),
            elapsed_secs: elapsed.as_secs_f64(),
        })
    }

    async fn run_round(
        &self,
        round: u32,
        key: &str,
        adder_seed: Option<&str>,
        journal: &mut RunJournal,
    ) -> Result<RoundRecord> {
        let at = |phase: RoundPhase| move |e: CodesignError| e.in_round(round, phase);

        let job = JobSpec::policy_search(&self.config, &self.layout, round, key, adder_seed);
        self.run_stage(&job)
            .await
            .map_err(at(RoundPhase::PolicySearchRun))?;

        let policy_search = self
            .select(StageKind::PolicySearch, key)
            .map_err(at(RoundPhase::PolicySearchSelect))?;
        journal
            .selection(StageKind::PolicySearch, policy_search.raw_record())
            .map_err(at(RoundPhase::PolicySearchSelect))?;

        let source = StageKind::PolicySearch
            .candidate_source(&self.layout, policy_search.candidate_id());
        let mult_template = extract_mult_template(&source, &self.layout.mult_template_dir(), key)
            .map_err(at(RoundPhase::MultTemplateExtract))?;
        obs::emit_template_written(&mult_template);

        let job = JobSpec::tree_search(
            &self.config,
            &self.layout,
            round,
            key,
            &mult_template.file_name,
        );
        self.run_stage(&job)
            .await
            .map_err(at(RoundPhase::TreeSearchRun))?;

        let tree_search = self
            .select(StageKind::TreeSearch, key)
            .map_err(at(RoundPhase::TreeSearchSelect))?;
        journal
            .selection(StageKind::TreeSearch, tree_search.raw_record())
            .map_err(at(RoundPhase::TreeSearchSelect))?;

        let source =
            StageKind::TreeSearch.candidate_source(&self.layout, tree_search.candidate_id());
        let adder_template = extract_adder_template(
            &source,
            &self.layout.adder_template_dir(),
            key,
            self.config.adder_bits(),
        )
        .map_err(at(RoundPhase::AdderTemplateExtract))?;
        obs::emit_template_written(&adder_template);

        Ok(RoundRecord {
            round,
            round_key: key.to_string(),
            policy_search,
            mult_template,
            tree_search,
            adder_template,
        })
    }

    async fn run_stage(&self, job: &JobSpec) -> Result<()> {
        debug!(stage = %job.stage, command = ?job.command, "launching job");
        let output = self.runner.run(job).await?;
        obs::emit_stage_finished(job.stage, output.succeeded, output.exit_code, output.duration_ms);

        if output.succeeded {
            Ok(())
        } else {
            Err(CodesignError::JobFailed {
                job: job.display_name(),
                exit_code: output.exit_code,
                output: output.output,
            })
        }
    }

    fn select(&self, stage: StageKind, key: &str) -> Result<Selection> {
        let log = stage.result_log(&self.layout, &self.config, key);
        debug!(stage = %stage, log = %log.display(), "reading result log");
        let selection = select_best(&log, self.config.area_weight)?;
        obs::emit_candidate_selected(stage, &selection);
        Ok(selection)
    }
}

/// Write the journal diagnostic for a failed round.
fn record_failure(journal: &mut RunJournal, round: u32, err: &CodesignError) -> Result<()> {
    match err.root() {
        CodesignError::JobFailed { job, output, .. } => journal.job_failed(job, round, output),
        root => journal.error(round, root),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_phase_display() {
        assert_eq!(RoundPhase::PolicySearchRun.to_string(), "policy search run");
        assert_eq!(
            RoundPhase::AdderTemplateExtract.to_string(),
            "adder template extraction"
        );
    }

    #[test]
    fn test_run_status_serializes_with_tag() {
        let status = RunStatus::Aborted {
            round: 0,
            phase: Some(RoundPhase::TreeSearchSelect),
            error: "result log x does not exist".to_string(),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "aborted");
        assert_eq!(json["phase"], "tree_search_select");

        let json = serde_json::to_value(&RunStatus::Done).unwrap();
        assert_eq!(json["status"], "done");
    }
}
