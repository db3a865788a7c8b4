//! 837P professional-claim tree.

use crate::entity::{Party, TransactionReference};
use serde::Serialize;

/// Semantic tree for an 837P professional claim.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfessionalClaim {
    pub reference: Option<TransactionReference>,
    /// Submitter (NM1*41).
    pub submitter: Option<Party>,
    /// Receiver (NM1*40).
    pub receiver: Option<Party>,
    /// Billing provider (loop 2010AA, NM1*85).
    pub billing_provider: Option<Provider>,
    /// Rendering provider (NM1*82), when distinct from billing.
    pub rendering_provider: Option<Provider>,
    /// Subscriber (loop 2000B).
    pub subscriber: Option<Subscriber>,
    /// Patient, when not the subscriber.
    pub patient: Option<Patient>,
    pub claim: Option<ClaimInformation>,
    pub diagnoses: Vec<Diagnosis>,
    pub service_lines: Vec<ProfessionalService>,
}

/// A provider with its identifiers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Provider {
    pub name: String,
    pub npi: Option<String>,
    /// Employer identification from REF*EI.
    pub tax_id: Option<String>,
}

/// Subscriber demographics and coverage (SBR + NM1*IL).
#[derive(Debug, Clone, Default, Serialize)]
pub struct Subscriber {
    pub last_name: String,
    pub first_name: Option<String>,
    /// Member identification (NM109 under qualifier MI).
    pub member_id: Option<String>,
    /// Payer responsibility sequence (SBR01).
    pub payer_responsibility: Option<String>,
    /// Group or policy number (SBR03).
    pub group_number: Option<String>,
}

/// Patient demographics when the patient is not the subscriber.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Patient {
    pub last_name: String,
    pub first_name: Option<String>,
    /// Relationship to subscriber (PAT01).
    pub relationship: Option<String>,
}

/// Claim-level information (CLM).
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClaimInformation {
    /// Patient control number (CLM01).
    pub claim_id: String,
    /// Total submitted charge (CLM02).
    pub total_charge: f64,
    /// Place of service, first component of the CLM05 composite.
    pub place_of_service: Option<String>,
    /// Claim frequency code, third component of the CLM05 composite.
    pub frequency_code: Option<String>,
}

/// One diagnosis from an HI composite.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnosis {
    /// Code-list qualifier (ABK, ABF, BK, BF, ...).
    pub qualifier: String,
    pub code: String,
}

/// One service line (LX/SV1 loop).
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfessionalService {
    /// Procedure code from the SV101 composite, qualifier stripped.
    pub procedure_code: String,
    /// Procedure modifiers from the SV101 composite, in order.
    pub modifiers: Vec<String>,
    /// Line charge amount (SV102).
    pub charge: f64,
    /// Unit basis (SV103): UN or MJ.
    pub unit_type: Option<String>,
    /// Service unit count (SV104).
    pub units: f64,
    /// 1-based pointers into `diagnoses`, from the SV107 composite.
    pub diagnosis_pointers: Vec<u32>,
    /// Service date from DTP*472, canonical ISO form.
    pub service_date: Option<String>,
}
