//! Append-only run journal.
//!
//! Human-readable record of round timings, selected candidates and
//! failures. Every entry is flushed as soon as it is written so a killed
//! run still leaves a readable journal behind.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::stage::StageKind;

/// Writer for the run log.
pub struct RunJournal {
    path: PathBuf,
    file: File,
}

impl RunJournal {
    /// Create (or truncate) the journal at `path`.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn round_started(&mut self, round: u32, elapsed: Duration) -> Result<()> {
        self.line(&format!(
            "Iteration {}, Time elapsed: {:.2} seconds",
            round,
            elapsed.as_secs_f64()
        ))
    }

    pub fn selection(&mut self, stage: StageKind, raw_record: &str) -> Result<()> {
        self.line(&format!("{}\t{}", stage.label(), raw_record))
    }

    /// Record a job that exited unsuccessfully, with everything it printed.
    pub fn job_failed(&mut self, job_name: &str, round: u32, output: &str) -> Result<()> {
        self.line(&format!(
            "[ERROR] {} failed during iteration {}.\nOutput:\n{}",
            job_name, round, output
        ))
    }

    pub fn error(&mut self, round: u32, diagnostic: &dyn std::fmt::Display) -> Result<()> {
        self.line(&format!("[ERROR] iteration {}: {}", round, diagnostic))
    }

    pub fn finish(&mut self, elapsed: Duration) -> Result<()> {
        self.line(&format!(
            "Total Time Elapsed: {:.2} seconds",
            elapsed.as_secs_f64()
        ))
    }

    fn line(&mut self, text: &str) -> Result<()> {
        self.file.write_all(text.as_bytes())?;
        self.file.write_all(b"\n")?;
        self.file.flush()?;
        Ok(())
    }
}
