//! 276/277 claim-status inquiry and response trees.

use crate::entity::{Party, TransactionReference};
use serde::Serialize;

/// Semantic tree for a 276 claim-status inquiry.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClaimStatusInquiry {
    pub reference: Option<TransactionReference>,
    pub information_source: Option<Party>,
    pub information_receiver: Option<Party>,
    pub subscriber: Option<Party>,
    pub dependent: Option<Party>,
    pub claim_inquiries: Vec<ClaimInquiry>,
}

/// One claim being asked about (TRN + AMT*T3).
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClaimInquiry {
    /// Claim trace/control number (TRN02).
    pub claim_control_number: String,
    /// Total submitted charge (AMT*T3), when stated.
    pub total_charge: Option<f64>,
}

/// Semantic tree for a 277 claim-status response.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClaimStatusResponse {
    pub reference: Option<TransactionReference>,
    pub information_source: Option<Party>,
    pub information_receiver: Option<Party>,
    pub subscriber: Option<Party>,
    pub dependent: Option<Party>,
    pub claim_status_info: Vec<ClaimStatusInfo>,
    /// Free-text MSG segments, in order.
    pub messages: Vec<String>,
}

/// One STC status statement.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClaimStatusInfo {
    /// Claim trace/control number from the preceding TRN.
    pub claim_control_number: Option<String>,
    /// Status category, first component of the STC01 composite.
    pub category_code: String,
    /// Status code, second component of the STC01 composite.
    pub status_code: String,
    /// Status effective date (STC02), canonical ISO form.
    pub effective_date: Option<String>,
}
