//! # x12-parser
//!
//! Streaming tokenizer and envelope assembly for X12 interchanges.
//!
//! This crate turns a byte stream into the envelope tree: delimiters are
//! discovered from the fixed-width ISA header, segments are tokenized
//! lazily, and a pushdown state machine folds them into interchanges,
//! functional groups, and transaction sets while checking control-number
//! and count integrity. Structural mismatches are recorded as diagnostics
//! and never abort the parse; only an uninterpretable header does.

pub mod delimiters;
pub mod envelope;
pub mod tokenizer;

pub use delimiters::Delimiters;
pub use envelope::EnvelopeAssembler;
pub use tokenizer::SegmentTokenizer;

use thiserror::Error;
use x12_ast::{DiagnosticCollector, EdiDocument};

/// Errors that abort parsing.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid interchange header: {0}")]
    InvalidHeader(String),
}

/// Crate-local result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Parse a complete document into its envelope tree.
///
/// Every transaction set comes back with its raw segments retained; the
/// transaction dispatcher replaces recognized ones with semantic trees.
/// The only failure is [`Error::InvalidHeader`]; everything else is
/// recorded in `diagnostics` and parsing continues.
pub fn parse(input: &[u8], diagnostics: &mut DiagnosticCollector) -> Result<EdiDocument> {
    let delimiters = Delimiters::from_isa(input)?;
    let mut tokenizer = SegmentTokenizer::new(input, delimiters);
    let mut assembler = EnvelopeAssembler::new();
    while let Some(segment) = tokenizer.next_segment(diagnostics) {
        assembler.push(segment, diagnostics);
    }
    Ok(assembler.finish(diagnostics))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_an_invalid_header() {
        let mut diagnostics = DiagnosticCollector::new();
        let err = parse(b"", &mut diagnostics).unwrap_err();
        assert!(matches!(err, Error::InvalidHeader(_)));
    }

    #[test]
    fn non_isa_input_is_an_invalid_header() {
        let mut diagnostics = DiagnosticCollector::new();
        let err = parse(&[b'X'; 200], &mut diagnostics).unwrap_err();
        assert!(matches!(err, Error::InvalidHeader(_)));
    }
}
