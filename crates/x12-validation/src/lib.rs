//! # x12-validation
//!
//! Rule-driven validation for X12 healthcare EDI.
//!
//! Rules are declarative records: an ordered condition list (implicit AND)
//! over dotted field paths into the semantic tree, optional field-level
//! validators, and optional cross-field checks. Built-in rule sets cover
//! structural, business, and HIPAA concerns; user rules load from YAML.
//! The engine is constructed once, treated as immutable, and evaluated
//! against documents in registration order.

pub mod builtin;
pub mod engine;
pub mod loader;
pub mod path;
pub mod rule;
pub mod validators;

pub use builtin::RuleSet;
pub use engine::{DocumentRule, DocumentRuleKind, ErrorPolicy, RuleEngine, RuleRegistry};
pub use loader::{RuleFile, RuleFileLoader};
pub use path::FieldPath;
pub use rule::{Condition, Operator, Rule, RuleCategory};
pub use validators::{npi_is_valid, CalcOperation, CrossCheck, FieldCheck, FieldCheckKind};

use thiserror::Error;

/// Errors that can occur when building rules or loading rule files.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid field path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Invalid rule file: {0}")]
    InvalidFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Crate-local result type.
pub type Result<T> = std::result::Result<T, Error>;
