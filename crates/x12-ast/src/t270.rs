//! 270/271 eligibility inquiry and response trees.
//!
//! Both transactions share the same party skeleton (information source,
//! information receiver, subscriber, optional dependent) and diverge at the
//! EQ/EB level.

use crate::entity::{Party, TransactionReference};
use serde::Serialize;

/// Semantic tree for a 270 eligibility inquiry.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EligibilityInquiry {
    pub reference: Option<TransactionReference>,
    /// Payer or plan being asked (NM1*PR).
    pub information_source: Option<Party>,
    /// Provider asking (NM1*1P).
    pub information_receiver: Option<Party>,
    /// Subscriber (NM1*IL).
    pub subscriber: Option<Party>,
    /// Dependent (NM1*03), when the patient is not the subscriber.
    pub dependent: Option<Party>,
    pub eligibility_inquiries: Vec<ServiceTypeInquiry>,
}

/// One EQ inquiry keyed by service-type code.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceTypeInquiry {
    /// Service type code (EQ01), e.g. "30" for plan coverage.
    pub service_type_code: String,
}

/// Semantic tree for a 271 eligibility response.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EligibilityResponse {
    pub reference: Option<TransactionReference>,
    pub information_source: Option<Party>,
    pub information_receiver: Option<Party>,
    pub subscriber: Option<Party>,
    pub dependent: Option<Party>,
    pub eligibility_benefits: Vec<EligibilityBenefit>,
    /// Free-text MSG segments, in order.
    pub messages: Vec<String>,
    /// AAA request-validation rejections, in order.
    pub rejections: Vec<RequestRejection>,
}

/// One EB benefit statement.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EligibilityBenefit {
    /// Eligibility or benefit information code (EB01): 1 active, 6 inactive, ...
    pub eligibility_code: String,
    /// Coverage level code (EB02).
    pub coverage_level: Option<String>,
    /// Service type code (EB03).
    pub service_type_code: Option<String>,
    /// Insurance type code (EB04).
    pub insurance_type: Option<String>,
    /// Plan coverage description (EB05).
    pub plan_description: Option<String>,
    /// Monetary amount (EB07), when the benefit carries one.
    pub amount: Option<f64>,
}

/// One AAA rejection.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RequestRejection {
    /// Reject reason code (AAA03).
    pub reject_reason_code: String,
    /// Follow-up action code (AAA04).
    pub follow_up_action: Option<String>,
}
