//! Template extraction from winning Verilog candidates.
//!
//! A candidate file carries the multiplier netlist followed by an adder
//! module opened by [`ADDER_MODULE_MARKER`]. The multiplier template is the
//! prefix before that marker; the adder template is the marker onward plus
//! a bounded number of header comment lines.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::error::{CodesignError, Result};
use crate::layout::{adder_template_name, mult_template_name};

/// Line that opens the adder module in a candidate file.
pub const ADDER_MODULE_MARKER: &str = "module adder(a,b,s);";

/// Prefix of a Verilog line comment.
pub const COMMENT_MARKER: &str = "//";

/// Which half of a candidate a template holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    Multiplier,
    Adder,
}

impl TemplateKind {
    pub fn name(&self) -> &'static str {
        match self {
            TemplateKind::Multiplier => "multiplier",
            TemplateKind::Adder => "adder",
        }
    }

    /// Deterministic file name for a round key.
    pub fn file_name(&self, key: &str) -> String {
        match self {
            TemplateKind::Multiplier => mult_template_name(key),
            TemplateKind::Adder => adder_template_name(key),
        }
    }
}

/// A template written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateArtifact {
    pub kind: TemplateKind,
    /// Bare file name handed to the next stage.
    pub file_name: String,
    pub path: PathBuf,
    pub lines: usize,
    /// SHA-256 of the template bytes.
    pub digest: String,
}

/// Copy `source` verbatim up to, not including, the first adder marker line.
///
/// A source without the marker is copied whole.
pub fn extract_mult_template(
    source: &Path,
    dest_dir: &Path,
    key: &str,
) -> Result<TemplateArtifact> {
    let reader = open_source(source)?;
    let mut kept = Vec::new();

    for line in read_lines(reader) {
        let line = line?;
        if line.starts_with(ADDER_MODULE_MARKER) {
            break;
        }
        kept.push(line);
    }

    write_template(TemplateKind::Multiplier, dest_dir, key, &kept)
}

/// Copy the adder module and up to `bit_width` header comment lines.
///
/// Non-comment lines are kept from the marker line onward. Comment lines
/// containing `2` are always dropped; the remaining comment lines are kept
/// until `bit_width` of them have been copied, wherever they appear.
pub fn extract_adder_template(
    source: &Path,
    dest_dir: &Path,
    key: &str,
    bit_width: u32,
) -> Result<TemplateArtifact> {
    let reader = open_source(source)?;
    let mut kept = Vec::new();
    let mut comments_kept = 0u32;
    let mut in_adder = false;

    for line in read_lines(reader) {
        let line = line?;
        if line.starts_with(COMMENT_MARKER) {
            if line.contains('2') {
                continue;
            }
            if comments_kept < bit_width {
                kept.push(line);
                comments_kept += 1;
            }
        } else {
            if line.starts_with(ADDER_MODULE_MARKER) {
                in_adder = true;
            }
            if in_adder {
                kept.push(line);
            }
        }
    }

    write_template(TemplateKind::Adder, dest_dir, key, &kept)
}

fn open_source(source: &Path) -> Result<BufReader<File>> {
    match File::open(source) {
        Ok(file) => Ok(BufReader::new(file)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(CodesignError::SourceMissing(source.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Lines with their terminators intact, so copies stay byte-identical.
fn read_lines(mut reader: BufReader<File>) -> impl Iterator<Item = std::io::Result<String>> {
    std::iter::from_fn(move || {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(Ok(line)),
            Err(e) => Some(Err(e)),
        }
    })
}

/// Write through a temp file in `dest_dir` and rename it into place.
fn write_template(
    kind: TemplateKind,
    dest_dir: &Path,
    key: &str,
    lines: &[String],
) -> Result<TemplateArtifact> {
    std::fs::create_dir_all(dest_dir)?;
    let file_name = kind.file_name(key);
    let path = dest_dir.join(&file_name);

    let mut hasher = Sha256::new();
    let mut tmp = NamedTempFile::new_in(dest_dir)?;
    for line in lines {
        tmp.write_all(line.as_bytes())?;
        hasher.update(line.as_bytes());
    }
    tmp.flush()?;
    tmp.persist(&path).map_err(|e| CodesignError::Io(e.error))?;

    Ok(TemplateArtifact {
        kind,
        file_name,
        path,
        lines: lines.len(),
        digest: hex::encode(hasher.finalize()),
    })
}
