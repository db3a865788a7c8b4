//! Envelope tree for X12 interchanges.
//!
//! The document is a three-level tree: interchange (ISA/IEA) → functional
//! group (GS/GE) → transaction set (ST/SE). Header and trailer control
//! numbers and counts are kept verbatim so integrity checks can report the
//! declared values exactly as they appeared on the wire.

use crate::transaction::TransactionData;
use serde::Serialize;

/// A parsed X12 document: one or more interchanges.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EdiDocument {
    pub interchanges: Vec<Interchange>,
}

impl EdiDocument {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of transaction sets across all envelopes.
    pub fn transaction_count(&self) -> usize {
        self.interchanges
            .iter()
            .flat_map(|i| &i.functional_groups)
            .map(|g| g.transactions.len())
            .sum()
    }
}

/// ISA/IEA envelope.
#[derive(Debug, Clone, Serialize)]
pub struct Interchange {
    pub header: InterchangeHeader,
    pub functional_groups: Vec<FunctionalGroup>,
    pub trailer: InterchangeTrailer,
}

/// Fields of the fixed-width ISA header.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InterchangeHeader {
    pub sender_qualifier: String,
    pub sender_id: String,
    pub receiver_qualifier: String,
    pub receiver_id: String,
    pub date: String,
    pub time: String,
    pub standards_id: String,
    pub version: String,
    pub control_number: String,
    pub usage_indicator: String,
    pub component_separator: String,
}

/// IEA trailer: declared group count and control number, verbatim.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InterchangeTrailer {
    pub group_count: String,
    pub control_number: String,
}

/// GS/GE envelope.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionalGroup {
    pub header: FunctionalGroupHeader,
    pub transactions: Vec<TransactionSet>,
    pub trailer: FunctionalGroupTrailer,
}

/// Fields of the GS header.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FunctionalGroupHeader {
    pub functional_id_code: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub date: String,
    pub time: String,
    pub control_number: String,
    pub agency_code: String,
    pub version_code: String,
}

/// GE trailer: declared transaction count and control number, verbatim.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FunctionalGroupTrailer {
    pub transaction_count: String,
    pub control_number: String,
}

/// ST/SE envelope around a single business document.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionSet {
    pub header: TransactionHeader,
    #[serde(rename = "transaction_data")]
    pub data: TransactionData,
    pub trailer: TransactionTrailer,
}

impl TransactionSet {
    /// Transaction-set identifier from ST01 (e.g. "835").
    pub fn code(&self) -> &str {
        &self.header.transaction_set_code
    }
}

/// ST header fields.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransactionHeader {
    pub transaction_set_code: String,
    pub control_number: String,
}

/// SE trailer: declared segment count (ST through SE inclusive) and control
/// number, verbatim.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransactionTrailer {
    pub segment_count: String,
    pub control_number: String,
}
