//! Multiplier co-design controller.
//!
//! Alternates two external search jobs over a fixed number of rounds:
//! - a policy-optimization search over partial-product structures
//! - a tree search over adder structures summing those partial products
//!
//! After each job the controller picks the lowest-cost candidate from
//! its result log, cuts the matching half out of the winner's Verilog and
//! hands it to the next job as a template.

pub mod config;
pub mod controller;
pub mod error;
pub mod journal;
pub mod layout;
pub mod obs;
pub mod runner;
pub mod selector;
pub mod stage;
pub mod telemetry;
pub mod template;

pub use config::{RunConfig, RunStamp};
pub use controller::{RoundController, RoundPhase, RoundRecord, RunOutcome, RunStatus};
pub use error::{CodesignError, Result};
pub use journal::RunJournal;
pub use layout::Layout;
pub use runner::{JobOutput, JobRunner, ProcessRunner};
pub use selector::{select_best, CandidateRecord, Selection};
pub use stage::{JobSpec, StageKind};
pub use telemetry::init_tracing;
pub use template::{
    extract_adder_template, extract_mult_template, TemplateArtifact, TemplateKind,
    ADDER_MODULE_MARKER,
};
