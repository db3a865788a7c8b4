//! 270/271 eligibility projector.
//!
//! Both directions share the party skeleton (information source NM1*PR,
//! information receiver NM1*1P, subscriber NM1*IL, optional dependent
//! NM1*03) and diverge at the EQ/EB level: 270 accumulates inquiries,
//! 271 accumulates benefits, messages, and AAA rejections.

use crate::dispatch::{ProjectionContext, Projector};
use crate::fields::{iso_date, iso_time, money_opt, opt, party_from_nm1};
use tracing::trace;
use x12_ast::t270::{
    EligibilityBenefit, EligibilityInquiry, EligibilityResponse, RequestRejection,
    ServiceTypeInquiry,
};
use x12_ast::{Diagnostic, Party, Segment, TransactionData, TransactionReference};

/// Projector for 270 eligibility inquiries and 271 responses.
#[derive(Debug)]
pub struct EligibilityProjector {
    response: bool,
}

impl EligibilityProjector {
    /// Projector for the 270 inquiry direction.
    pub fn inquiry() -> Self {
        Self { response: false }
    }

    /// Projector for the 271 response direction.
    pub fn response() -> Self {
        Self { response: true }
    }
}

#[derive(Default)]
struct Skeleton {
    reference: Option<TransactionReference>,
    information_source: Option<Party>,
    information_receiver: Option<Party>,
    subscriber: Option<Party>,
    dependent: Option<Party>,
}

impl Projector for EligibilityProjector {
    fn project(&self, segments: &[Segment], ctx: &mut ProjectionContext<'_>) -> TransactionData {
        let mut skeleton = Skeleton::default();
        let mut inquiries: Vec<ServiceTypeInquiry> = Vec::new();
        let mut benefits: Vec<EligibilityBenefit> = Vec::new();
        let mut messages: Vec<String> = Vec::new();
        let mut rejections: Vec<RequestRejection> = Vec::new();

        for segment in segments {
            match segment.id.as_str() {
                "BHT" => {
                    skeleton.reference = Some(TransactionReference {
                        purpose_code: segment.value_owned(2),
                        reference_id: segment.value_owned(3),
                        date: iso_date(segment.value(4)),
                        time: iso_time(segment.value(5)),
                    });
                }
                "HL" => {
                    trace!(level = %segment.value(3), "hierarchical level");
                }
                "NM1" => match segment.value(1) {
                    "PR" => skeleton.information_source = Some(party_from_nm1(segment)),
                    "1P" => skeleton.information_receiver = Some(party_from_nm1(segment)),
                    "IL" => skeleton.subscriber = Some(party_from_nm1(segment)),
                    "03" => skeleton.dependent = Some(party_from_nm1(segment)),
                    entity => trace!(%entity, "tolerated NM1 entity"),
                },
                "EQ" => {
                    if self.response {
                        ctx.unexpected_segment(segment, "eligibility response");
                        continue;
                    }
                    let code = segment.value(1);
                    if !code.is_empty() {
                        inquiries.push(ServiceTypeInquiry {
                            service_type_code: code.to_string(),
                        });
                    }
                }
                "EB" => {
                    if !self.response {
                        ctx.unexpected_segment(segment, "eligibility inquiry");
                        continue;
                    }
                    let index = benefits.len();
                    benefits.push(EligibilityBenefit {
                        eligibility_code: segment.value_owned(1),
                        coverage_level: opt(segment.value(2)),
                        service_type_code: opt(segment.value(3)),
                        insurance_type: opt(segment.value(4)),
                        plan_description: opt(segment.value(5)),
                        amount: money_opt(
                            ctx,
                            &format!("eligibility_benefits[{index}].amount"),
                            segment.value(7),
                        ),
                    });
                }
                "MSG" => {
                    if self.response {
                        messages.push(segment.value_owned(1));
                    } else {
                        ctx.unexpected_segment(segment, "eligibility inquiry");
                    }
                }
                "AAA" => {
                    if !self.response {
                        ctx.unexpected_segment(segment, "eligibility inquiry");
                        continue;
                    }
                    let reason = segment.value_owned(3);
                    ctx.record(
                        Diagnostic::warning(
                            "271_REQUEST_REJECTED",
                            format!("request validation failed with reject reason '{reason}'"),
                        )
                        .with_value(reason.clone()),
                    );
                    rejections.push(RequestRejection {
                        reject_reason_code: reason,
                        follow_up_action: opt(segment.value(4)),
                    });
                }
                // Demographics, dates, and trace segments carry no slot.
                "TRN" | "REF" | "DMG" | "DTP" | "INS" | "PER" | "N3" | "N4" | "PRV" | "HI"
                | "III" | "LS" | "LE" => {
                    trace!(id = %segment.id, "tolerated segment");
                }
                _ => ctx.unexpected_segment(segment, "eligibility"),
            }
        }

        if skeleton.information_source.is_none() {
            ctx.missing_required("NM1*PR", "information source");
        }
        if skeleton.subscriber.is_none() {
            ctx.missing_required("NM1*IL", "subscriber");
        }

        if self.response {
            TransactionData::EligibilityResponse(EligibilityResponse {
                reference: skeleton.reference,
                information_source: skeleton.information_source,
                information_receiver: skeleton.information_receiver,
                subscriber: skeleton.subscriber,
                dependent: skeleton.dependent,
                eligibility_benefits: benefits,
                messages,
                rejections,
            })
        } else {
            TransactionData::EligibilityInquiry(EligibilityInquiry {
                reference: skeleton.reference,
                information_source: skeleton.information_source,
                information_receiver: skeleton.information_receiver,
                subscriber: skeleton.subscriber,
                dependent: skeleton.dependent,
                eligibility_inquiries: inquiries,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use x12_ast::{DiagnosticCollector, Element};

    fn seg(raw: &str) -> Segment {
        let mut parts = raw.split('*');
        let id = parts.next().unwrap().to_string();
        let elements = parts
            .map(|e| Element::new(e.split(':').map(str::to_string).collect()))
            .collect();
        Segment::new(id, elements)
    }

    fn skeleton() -> Vec<&'static str> {
        vec![
            "BHT*0022*13*REF270*20240101*1200",
            "HL*1**20*1",
            "NM1*PR*2*ACME HEALTH*****PI*PAYER01",
            "HL*2*1*21*1",
            "NM1*1P*2*FAMILY PRACTICE*****XX*1234567893",
            "HL*3*2*22*0",
            "NM1*IL*1*DOE*JANE****MI*MEMBER001",
            "DMG*D8*19800101*F",
        ]
    }

    fn project(projector: EligibilityProjector, raw: &[&str]) -> (TransactionData, DiagnosticCollector) {
        let segments: Vec<Segment> = raw.iter().map(|s| seg(s)).collect();
        let mut diagnostics = DiagnosticCollector::new();
        let mut ctx = ProjectionContext::new("transactions[0]", &mut diagnostics);
        (projector.project(&segments, &mut ctx), diagnostics)
    }

    #[test]
    fn inquiry_collects_service_type_codes() {
        let mut raw = skeleton();
        raw.push("EQ*30");
        raw.push("EQ*98");
        let (data, diagnostics) = project(EligibilityProjector::inquiry(), &raw);
        assert!(diagnostics.is_valid(), "{:?}", diagnostics.entries());

        let tree = data.as_eligibility_inquiry().unwrap();
        assert_eq!(tree.information_source.as_ref().unwrap().name, "ACME HEALTH");
        assert_eq!(
            tree.information_receiver.as_ref().unwrap().identifier.as_deref(),
            Some("1234567893")
        );
        assert_eq!(tree.subscriber.as_ref().unwrap().name, "DOE");
        assert!(tree.dependent.is_none());
        let codes: Vec<&str> = tree
            .eligibility_inquiries
            .iter()
            .map(|i| i.service_type_code.as_str())
            .collect();
        assert_eq!(codes, ["30", "98"]);
    }

    #[test]
    fn response_collects_benefits_and_messages() {
        let mut raw = skeleton();
        raw.push("EB*1*IND*30**GOLD PLAN");
        raw.push("EB*C*IND*30***23*500.00");
        raw.push("MSG*DEDUCTIBLE APPLIES");
        let (data, diagnostics) = project(EligibilityProjector::response(), &raw);
        assert!(diagnostics.is_valid(), "{:?}", diagnostics.entries());

        let tree = data.as_eligibility_response().unwrap();
        assert_eq!(tree.eligibility_benefits.len(), 2);
        assert_eq!(tree.eligibility_benefits[0].eligibility_code, "1");
        assert_eq!(
            tree.eligibility_benefits[0].plan_description.as_deref(),
            Some("GOLD PLAN")
        );
        assert_eq!(tree.eligibility_benefits[1].amount, Some(500.0));
        assert_eq!(tree.messages, vec!["DEDUCTIBLE APPLIES".to_string()]);
    }

    #[test]
    fn dependent_is_captured_when_present() {
        let mut raw = skeleton();
        raw.push("NM1*03*1*DOE*JIMMY");
        raw.push("EQ*30");
        let (data, _) = project(EligibilityProjector::inquiry(), &raw);
        let tree = data.as_eligibility_inquiry().unwrap();
        let dependent = tree.dependent.as_ref().unwrap();
        assert_eq!(dependent.name, "DOE");
        assert_eq!(dependent.first_name.as_deref(), Some("JIMMY"));
    }

    #[test]
    fn aaa_rejection_is_surfaced_as_a_warning() {
        let mut raw = skeleton();
        raw.push("AAA*N**72*C");
        let (data, diagnostics) = project(EligibilityProjector::response(), &raw);
        let tree = data.as_eligibility_response().unwrap();
        assert_eq!(tree.rejections.len(), 1);
        assert_eq!(tree.rejections[0].reject_reason_code, "72");
        assert_eq!(tree.rejections[0].follow_up_action.as_deref(), Some("C"));
        let warning = diagnostics.find("271_REQUEST_REJECTED").unwrap();
        assert_eq!(warning.severity, x12_ast::Severity::Warning);
    }

    #[test]
    fn eb_in_an_inquiry_is_unexpected() {
        let mut raw = skeleton();
        raw.push("EB*1");
        let (data, diagnostics) = project(EligibilityProjector::inquiry(), &raw);
        assert!(data.as_eligibility_inquiry().is_some());
        assert!(diagnostics.find("UNEXPECTED_SEGMENT").is_some());
    }

    #[test]
    fn missing_subscriber_is_a_required_error() {
        let raw = vec!["BHT*0022*13*REF270*20240101*1200", "NM1*PR*2*ACME"];
        let (_, diagnostics) = project(EligibilityProjector::inquiry(), &raw);
        assert!(!diagnostics.is_valid());
        let missing = diagnostics.find("MISSING_REQUIRED").unwrap();
        assert_eq!(missing.value.as_deref(), Some("NM1*IL"));
    }
}
