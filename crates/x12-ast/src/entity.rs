//! Named entities and hierarchical-transaction references shared across
//! transaction trees.

use serde::Serialize;

/// A named party from an NM1 loop: payer, provider, subscriber, dependent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Party {
    /// Organization name or person last name (NM103).
    pub name: String,
    /// Person first name (NM104), absent for organizations.
    pub first_name: Option<String>,
    /// Identification code qualifier (NM108), e.g. "PI", "XX", "MI".
    pub id_qualifier: Option<String>,
    /// Identification code (NM109).
    pub identifier: Option<String>,
}

impl Party {
    /// Party with a name only.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Beginning-of-hierarchical-transaction reference (BHT).
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransactionReference {
    /// Transaction purpose code (BHT02).
    pub purpose_code: String,
    /// Submitter reference identification (BHT03).
    pub reference_id: String,
    /// Transaction creation date, canonical ISO form.
    pub date: String,
    /// Transaction creation time.
    pub time: String,
}
