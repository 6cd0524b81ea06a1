//! Candidate selection from a stage's result log.
//!
//! A result log holds one candidate per line, tab-separated:
//! `identifier, primary1, area1, primary2, area2`. The winner is the
//! record with the lowest weighted score; the earliest record wins ties.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CodesignError, Result};

/// Number of tab-separated fields a record must carry.
pub const RECORD_FIELDS: usize = 5;

/// One parsed result-log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    /// File identifier of the candidate design.
    pub id: String,

    pub primary1: f64,
    pub area1: f64,
    pub primary2: f64,
    pub area2: f64,

    /// The trimmed line exactly as read.
    pub raw: String,
}

impl CandidateRecord {
    /// Parse a trimmed record line. Fields beyond the fifth are ignored.
    pub fn parse(line: &str) -> std::result::Result<Self, String> {
        let raw = line.trim();
        let fields: Vec<&str> = raw.split('\t').collect();
        if fields.len() < RECORD_FIELDS {
            return Err(format!(
                "expected at least {} tab-separated fields, found {}",
                RECORD_FIELDS,
                fields.len()
            ));
        }

        let metric = |index: usize| -> std::result::Result<f64, String> {
            let text = fields[index].trim();
            text.parse::<f64>()
                .map_err(|_| format!("field {} is not a number: {:?}", index + 1, text))
        };

        Ok(Self {
            id: fields[0].to_string(),
            primary1: metric(1)?,
            area1: metric(2)?,
            primary2: metric(3)?,
            area2: metric(4)?,
            raw: raw.to_string(),
        })
    }

    /// Weighted cost; lower is better.
    pub fn score(&self, weight: f64) -> f64 {
        self.primary1 + self.area1 * weight + self.primary2 + self.area2 * weight
    }
}

/// The winning record of a result log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub record: CandidateRecord,
    pub score: f64,
    /// 1-based line number of the winner.
    pub line: usize,
    /// Number of records considered.
    pub considered: usize,
}

impl Selection {
    pub fn candidate_id(&self) -> &str {
        &self.record.id
    }

    pub fn raw_record(&self) -> &str {
        &self.record.raw
    }
}

/// Select the minimum-score record of the log at `path`.
///
/// Whitespace-only lines are skipped. Any other line that fails to parse
/// aborts selection with [`CodesignError::MalformedRecord`]. Records whose
/// score is NaN or infinite are counted but can never win; a log with no
/// finite score is [`CodesignError::LogEmpty`].
pub fn select_best(path: &Path, weight: f64) -> Result<Selection> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(CodesignError::LogNotFound(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    let mut best: Option<Selection> = None;
    let mut considered = 0usize;

    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let record =
            CandidateRecord::parse(&line).map_err(|reason| CodesignError::MalformedRecord {
                path: path.to_path_buf(),
                line: index + 1,
                reason,
            })?;
        considered += 1;

        let score = record.score(weight);
        // NaN and infinite scores never beat the starting bound.
        let bound = best.as_ref().map_or(f64::INFINITY, |current| current.score);
        let better = score < bound;
        if better {
            best = Some(Selection {
                record,
                score,
                line: index + 1,
                considered: 0,
            });
        }
    }

    match best {
        Some(mut selection) => {
            selection.considered = considered;
            Ok(selection)
        }
        None => Err(CodesignError::LogEmpty(path.to_path_buf())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_log(dir: &Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("stage.log");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_parse_record() {
        let record = CandidateRecord::parse("a.v\t1.5\t200\t0.5\t100\n").unwrap();
        assert_eq!(record.id, "a.v");
        assert_eq!(record.primary1, 1.5);
        assert_eq!(record.area2, 100.0);
        assert_eq!(record.raw, "a.v\t1.5\t200\t0.5\t100");
    }

    #[test]
    fn test_score_formula() {
        let record = CandidateRecord::parse("x\t1\t100\t2\t50").unwrap();
        assert!((record.score(0.01) - (1.0 + 1.0 + 2.0 + 0.5)).abs() < 1e-12);
        assert_eq!(record.score(0.0), 3.0);
    }

    #[test]
    fn test_select_minimum_score() {
        let dir = tempdir().unwrap();
        let path = write_log(
            dir.path(),
            "a.v\t5\t100\t5\t100\nb.v\t1\t100\t1\t100\nc.v\t3\t0\t3\t0\n",
        );
        let selection = select_best(&path, 0.01).unwrap();
        assert_eq!(selection.candidate_id(), "b.v");
        assert_eq!(selection.raw_record(), "b.v\t1\t100\t1\t100");
        assert_eq!(selection.line, 2);
        assert_eq!(selection.considered, 3);
    }

    #[test]
    fn test_weight_changes_winner() {
        let dir = tempdir().unwrap();
        let path = write_log(dir.path(), "small\t5\t10\t5\t10\nfast\t1\t1000\t1\t1000\n");
        assert_eq!(select_best(&path, 0.0).unwrap().candidate_id(), "fast");
        assert_eq!(select_best(&path, 1.0).unwrap().candidate_id(), "small");
    }

    #[test]
    fn test_tie_keeps_earliest_record() {
        let dir = tempdir().unwrap();
        let path = write_log(
            dir.path(),
            "late\t9\t0\t9\t0\nfirst\t2\t0\t2\t0\nsecond\t1\t0\t3\t0\nthird\t4\t0\t0\t0\n",
        );
        let selection = select_best(&path, 0.5).unwrap();
        assert_eq!(selection.candidate_id(), "first");
    }

    #[test]
    fn test_missing_log_is_reported() {
        let dir = tempdir().unwrap();
        let err = select_best(&dir.path().join("absent.log"), 0.01).unwrap_err();
        assert!(matches!(err, CodesignError::LogNotFound(_)));
    }

    #[test]
    fn test_empty_log_is_reported() {
        let dir = tempdir().unwrap();
        let path = write_log(dir.path(), "");
        assert!(matches!(
            select_best(&path, 0.01).unwrap_err(),
            CodesignError::LogEmpty(_)
        ));

        let path = write_log(dir.path(), "\n   \n");
        assert!(matches!(
            select_best(&path, 0.01).unwrap_err(),
            CodesignError::LogEmpty(_)
        ));
    }

    #[test]
    fn test_short_record_is_malformed() {
        let dir = tempdir().unwrap();
        let path = write_log(dir.path(), "a.v\t1\t2\t3\t4\nb.v\t1\t2\n");
        match select_best(&path, 0.01).unwrap_err() {
            CodesignError::MalformedRecord { line, reason, .. } => {
                assert_eq!(line, 2);
                assert!(reason.contains("found 3"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_numeric_metric_is_malformed() {
        let dir = tempdir().unwrap();
        let path = write_log(dir.path(), "a.v\t1\tbig\t3\t4\n");
        match select_best(&path, 0.01).unwrap_err() {
            CodesignError::MalformedRecord { line, reason, .. } => {
                assert_eq!(line, 1);
                assert!(reason.contains("field 3"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_nan_metric_never_wins() {
        let dir = tempdir().unwrap();

        let path = write_log(dir.path(), "good.v\t1\t2\t3\t4\nfailed.v\tnan\t0\t0\t0\n");
        let selection = select_best(&path, 0.01).unwrap();
        assert_eq!(selection.candidate_id(), "good.v");
        assert_eq!(selection.considered, 2);

        let path = write_log(
            dir.path(),
            "failed.v\tnan\t0\t0\t0\ngood.v\t1\t2\t3\t4\nlate.v\t0\tNaN\t0\t0\nworse.v\t9\t9\t9\t9\n",
        );
        let selection = select_best(&path, 0.01).unwrap();
        assert_eq!(selection.candidate_id(), "good.v");
        assert_eq!(selection.line, 2);
        assert_eq!(selection.considered, 4);
    }

    #[test]
    fn test_log_without_finite_score_is_empty() {
        let dir = tempdir().unwrap();
        let path = write_log(dir.path(), "a.v\tnan\t0\t0\t0\nb.v\tinf\t0\t0\t0\n");
        assert!(matches!(
            select_best(&path, 0.01).unwrap_err(),
            CodesignError::LogEmpty(_)
        ));
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let dir = tempdir().unwrap();
        let path = write_log(dir.path(), "a.v\t1\t2\t3\t4\textra\tmore\n");
        let selection = select_best(&path, 0.0).unwrap();
        assert_eq!(selection.candidate_id(), "a.v");
        assert_eq!(selection.raw_record(), "a.v\t1\t2\t3\t4\textra\tmore");
    }
}
