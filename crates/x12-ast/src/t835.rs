//! 835 remittance-advice tree.

use serde::Serialize;

/// Semantic tree for an 835 payment/remittance advice.
///
/// Slots stay `None` when the corresponding segment never appeared; the
/// projector records a diagnostic for required ones.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Remittance {
    pub financial_information: Option<FinancialInformation>,
    pub payer: Option<Payer>,
    pub payee: Option<Payee>,
    /// Production date from DTM*405, canonical ISO form.
    pub production_date: Option<String>,
    pub claims: Vec<Claim>,
    pub plb_adjustments: Vec<PlbAdjustment>,
}

/// BPR payment-order fields plus the TRN trace number.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FinancialInformation {
    /// Total actual provider payment (BPR02).
    pub total_paid: f64,
    /// Payment method code (BPR04): ACH, CHK, ...
    pub payment_method: String,
    /// Payment effective date (BPR16), canonical ISO form.
    pub payment_date: String,
    /// Check or EFT trace number (TRN02).
    pub trace_number: Option<String>,
}

/// Payer identification (N1*PR loop).
#[derive(Debug, Clone, Default, Serialize)]
pub struct Payer {
    pub name: String,
    pub identifier: Option<String>,
}

/// Payee identification (N1*PE loop).
#[derive(Debug, Clone, Default, Serialize)]
pub struct Payee {
    pub name: String,
    /// National Provider Identifier, from N1 qualifier XX or REF*HPI.
    pub npi: Option<String>,
    /// Tax ID from REF*TJ.
    pub tax_id: Option<String>,
    /// Any other REF identifiers, verbatim.
    pub other_identifiers: Vec<OtherIdentifier>,
}

/// A retained (qualifier, value) identifier pair.
#[derive(Debug, Clone, Serialize)]
pub struct OtherIdentifier {
    pub qualifier: String,
    pub value: String,
}

/// One claim payment (CLP loop).
#[derive(Debug, Clone, Default, Serialize)]
pub struct Claim {
    /// Patient control number (CLP01).
    pub claim_id: String,
    /// Claim status code (CLP02).
    pub status_code: String,
    /// Submitted charge (CLP03).
    pub total_charge: f64,
    /// Amount paid (CLP04).
    pub total_paid: f64,
    /// Patient responsibility (CLP05).
    pub patient_responsibility: f64,
    /// Claim filing indicator (CLP06).
    pub claim_filing_indicator: Option<String>,
    /// Payer internal control number (CLP07).
    pub payer_control_number: Option<String>,
    pub adjustments: Vec<Adjustment>,
    pub services: Vec<ServiceLine>,
}

/// One CAS adjustment triplet.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Adjustment {
    /// Claim adjustment group code (CO, PR, OA, ...).
    pub group_code: String,
    /// Claim adjustment reason code.
    pub reason_code: String,
    pub amount: f64,
    pub quantity: f64,
}

/// One service line (SVC loop).
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServiceLine {
    /// Procedure code from the SVC01 composite, qualifier stripped.
    pub procedure_code: String,
    /// Procedure modifiers from the SVC01 composite, in order.
    pub modifiers: Vec<String>,
    /// Submitted charge (SVC02).
    pub charge: f64,
    /// Amount paid (SVC03).
    pub paid: f64,
    /// Units of service (SVC05), 1 when not stated.
    pub units: f64,
    /// Service date from DTM*472/DTM*484, canonical ISO form.
    pub service_date: Option<String>,
    pub adjustments: Vec<Adjustment>,
}

/// One provider-level adjustment from a PLB reason/amount pair.
///
/// A positive amount reduces the payer's obligation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PlbAdjustment {
    /// Provider identifier (PLB01).
    pub provider_id: String,
    /// Fiscal period date (PLB02), canonical ISO form.
    pub fiscal_period: Option<String>,
    /// Adjustment reason code, first component of the reason composite.
    pub reason_code: String,
    pub amount: f64,
}
