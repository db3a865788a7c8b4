//! # x12-pipeline
//!
//! One-call processing for X12 healthcare EDI: tokenize, assemble the
//! envelope tree, project recognized transactions into semantic trees, and
//! evaluate validation rules, collecting diagnostics throughout.
//!
//! The pipeline is a pure transformation over the input bytes: it holds no
//! process-wide state, so independent documents can be processed from
//! multiple threads against a shared pipeline.

pub mod pipeline;

pub use pipeline::{Pipeline, PipelineBuilder, PipelineConfig, ProcessOutcome};

pub use x12_ast::{
    Diagnostic, DiagnosticCollector, DiagnosticReport, EdiDocument, Severity, TransactionData,
};
pub use x12_transactions::{PlbSignConvention, Projector, ProjectorRegistry};
pub use x12_validation::{ErrorPolicy, Rule, RuleSet};

use thiserror::Error;

/// Errors that abort processing entirely.
#[derive(Error, Debug)]
pub enum Error {
    /// The input cannot be interpreted as X12 at all.
    #[error(transparent)]
    Parse(#[from] x12_parser::Error),

    /// A user-supplied rule file failed to load.
    #[error(transparent)]
    Rules(#[from] x12_validation::Error),
}

/// Crate-local result type.
pub type Result<T> = std::result::Result<T, Error>;
