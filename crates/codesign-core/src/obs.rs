//! Structured observability hooks for the round lifecycle.
//!
//! Emits `round.*`, `stage.*`, `candidate.*`, `template.*` and `run.*`
//! events at `info!` (failures at `warn!`). Filter with `RUST_LOG`.

use tracing::{info, warn};

use crate::selector::Selection;
use crate::stage::StageKind;
use crate::template::TemplateArtifact;

/// Span tagging every event inside a round with its index and key.
///
/// Attach with [`tracing::Instrument`] so the span follows the round
/// future across await points.
pub fn round_span(round: u32, round_key: &str) -> tracing::Span {
    tracing::info_span!("codesign.round", round, round_key = %round_key)
}

pub fn emit_run_started(stamp: &str, input_bit: u32, area_weight: f64, rounds: u32) {
    info!(
        event = "run.started",
        stamp = %stamp,
        input_bit,
        area_weight,
        rounds,
    );
}

pub fn emit_round_started(round: u32, elapsed_secs: f64) {
    info!(event = "round.started", round, elapsed_secs);
}

pub fn emit_stage_finished(
    stage: StageKind,
    succeeded: bool,
    exit_code: Option<i32>,
    duration_ms: u64,
) {
    if succeeded {
        info!(event = "stage.finished", stage = %stage, duration_ms);
    } else {
        warn!(event = "stage.failed", stage = %stage, exit_code = ?exit_code, duration_ms);
    }
}

pub fn emit_candidate_selected(stage: StageKind, selection: &Selection) {
    info!(
        event = "candidate.selected",
        stage = %stage,
        candidate = %selection.candidate_id(),
        score = selection.score,
        considered = selection.considered,
    );
}

pub fn emit_template_written(artifact: &TemplateArtifact) {
    let digest = &artifact.digest[..12.min(artifact.digest.len())];
    info!(
        event = "template.written",
        kind = artifact.kind.name(),
        file = %artifact.file_name,
        lines = artifact.lines,
        digest = %digest,
    );
}

pub fn emit_run_finished(rounds_completed: u32, elapsed_secs: f64) {
    info!(event = "run.finished", rounds_completed, elapsed_secs);
}

pub fn emit_run_aborted(round: u32, error: &dyn std::fmt::Display) {
    warn!(event = "run.aborted", round, error = %error);
}
