//! Transaction payload sum type.
//!
//! A recognized transaction-set code selects a typed semantic tree; anything
//! else keeps its raw segments for downstream inspection.

use crate::segment::Segment;
use crate::t270::{EligibilityInquiry, EligibilityResponse};
use crate::t276::{ClaimStatusInquiry, ClaimStatusResponse};
use crate::t835::Remittance;
use crate::t837p::ProfessionalClaim;
use serde::Serialize;

/// The semantic payload of a transaction set.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum TransactionData {
    /// 835 payment/remittance advice.
    Remittance(Remittance),
    /// 837P professional claim.
    ProfessionalClaim(ProfessionalClaim),
    /// 270 eligibility inquiry.
    EligibilityInquiry(EligibilityInquiry),
    /// 271 eligibility response.
    EligibilityResponse(EligibilityResponse),
    /// 276 claim-status inquiry.
    ClaimStatusInquiry(ClaimStatusInquiry),
    /// 277 claim-status response.
    ClaimStatusResponse(ClaimStatusResponse),
    /// Unrecognized transaction code: segments retained verbatim.
    Raw(RawTransaction),
}

impl TransactionData {
    /// True when no projector ran and the raw segments were retained.
    pub fn is_raw(&self) -> bool {
        matches!(self, TransactionData::Raw(_))
    }

    /// The 835 tree, when this is a remittance.
    pub fn as_remittance(&self) -> Option<&Remittance> {
        match self {
            TransactionData::Remittance(r) => Some(r),
            _ => None,
        }
    }

    /// The 837P tree, when this is a professional claim.
    pub fn as_professional_claim(&self) -> Option<&ProfessionalClaim> {
        match self {
            TransactionData::ProfessionalClaim(c) => Some(c),
            _ => None,
        }
    }

    /// The 270 tree, when this is an eligibility inquiry.
    pub fn as_eligibility_inquiry(&self) -> Option<&EligibilityInquiry> {
        match self {
            TransactionData::EligibilityInquiry(t) => Some(t),
            _ => None,
        }
    }

    /// The 271 tree, when this is an eligibility response.
    pub fn as_eligibility_response(&self) -> Option<&EligibilityResponse> {
        match self {
            TransactionData::EligibilityResponse(t) => Some(t),
            _ => None,
        }
    }

    /// The 276 tree, when this is a claim-status inquiry.
    pub fn as_claim_status_inquiry(&self) -> Option<&ClaimStatusInquiry> {
        match self {
            TransactionData::ClaimStatusInquiry(t) => Some(t),
            _ => None,
        }
    }

    /// The 277 tree, when this is a claim-status response.
    pub fn as_claim_status_response(&self) -> Option<&ClaimStatusResponse> {
        match self {
            TransactionData::ClaimStatusResponse(t) => Some(t),
            _ => None,
        }
    }

    /// The retained segments, when no projector recognized the code.
    pub fn as_raw(&self) -> Option<&RawTransaction> {
        match self {
            TransactionData::Raw(r) => Some(r),
            _ => None,
        }
    }
}

/// Segments of an unrecognized transaction, ST..SE exclusive.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RawTransaction {
    pub segments: Vec<Segment>,
}

impl RawTransaction {
    /// Wrap a segment window.
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }
}
