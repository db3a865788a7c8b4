//! 276/277 claim-status projector.
//!
//! Shares the 270/271 party skeleton. The 276 accumulates claim inquiries
//! (TRN plus an optional AMT*T3 total charge); the 277 accumulates STC
//! status statements keyed by the preceding TRN, plus free-text messages.

use crate::dispatch::{ProjectionContext, Projector};
use crate::fields::{iso_date, iso_time, money_opt, opt, party_from_nm1};
use tracing::trace;
use x12_ast::t276::{ClaimInquiry, ClaimStatusInfo, ClaimStatusInquiry, ClaimStatusResponse};
use x12_ast::{Party, Segment, TransactionData, TransactionReference};

/// Projector for 276 claim-status inquiries and 277 responses.
#[derive(Debug)]
pub struct ClaimStatusProjector {
    response: bool,
}

impl ClaimStatusProjector {
    /// Projector for the 276 inquiry direction.
    pub fn inquiry() -> Self {
        Self { response: false }
    }

    /// Projector for the 277 response direction.
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

impl Projector for ClaimStatusProjector {
    fn project(&self, segments: &[Segment], ctx: &mut ProjectionContext<'_>) -> TransactionData {
        let mut skeleton = Skeleton::default();
        let mut inquiries: Vec<ClaimInquiry> = Vec::new();
        let mut statuses: Vec<ClaimStatusInfo> = Vec::new();
        let mut messages: Vec<String> = Vec::new();
        let mut pending_trace: Option<String> = None;

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
                "TRN" => {
                    if self.response {
                        pending_trace = opt(segment.value(2));
                    } else {
                        inquiries.push(ClaimInquiry {
                            claim_control_number: segment.value_owned(2),
                            total_charge: None,
                        });
                    }
                }
                "AMT" => {
                    if !self.response && segment.value(1) == "T3" && !inquiries.is_empty() {
                        let index = inquiries.len() - 1;
                        let charge = money_opt(
                            ctx,
                            &format!("claim_inquiries[{index}].total_charge"),
                            segment.value(2),
                        );
                        inquiries[index].total_charge = charge;
                    } else {
                        trace!(qualifier = %segment.value(1), "tolerated AMT");
                    }
                }
                "STC" => {
                    if !self.response {
                        ctx.unexpected_segment(segment, "claim-status inquiry");
                        continue;
                    }
                    let composite = segment.element(1);
                    statuses.push(ClaimStatusInfo {
                        claim_control_number: pending_trace.clone(),
                        category_code: composite
                            .and_then(|e| e.component(0))
                            .unwrap_or("")
                            .to_string(),
                        status_code: composite
                            .and_then(|e| e.component(1))
                            .unwrap_or("")
                            .to_string(),
                        effective_date: opt(&iso_date(segment.value(2))),
                    });
                }
                "MSG" => {
                    if self.response {
                        messages.push(segment.value_owned(1));
                    } else {
                        ctx.unexpected_segment(segment, "claim-status inquiry");
                    }
                }
                // Demographics, references, and service detail carry no slot.
                "REF" | "DMG" | "DTP" | "SVC" | "PER" | "N3" | "N4" | "QTY" => {
                    trace!(id = %segment.id, "tolerated segment");
                }
                _ => ctx.unexpected_segment(segment, "claim status"),
            }
        }

        if skeleton.information_source.is_none() {
            ctx.missing_required("NM1*PR", "information source");
        }
        if skeleton.subscriber.is_none() {
            ctx.missing_required("NM1*IL", "subscriber");
        }

        if self.response {
            TransactionData::ClaimStatusResponse(ClaimStatusResponse {
                reference: skeleton.reference,
                information_source: skeleton.information_source,
                information_receiver: skeleton.information_receiver,
                subscriber: skeleton.subscriber,
                dependent: skeleton.dependent,
                claim_status_info: statuses,
                messages,
            })
        } else {
            TransactionData::ClaimStatusInquiry(ClaimStatusInquiry {
                reference: skeleton.reference,
                information_source: skeleton.information_source,
                information_receiver: skeleton.information_receiver,
                subscriber: skeleton.subscriber,
                dependent: skeleton.dependent,
                claim_inquiries: inquiries,
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
            "BHT*0010*13*REF276*20240101*1200",
            "HL*1**20*1",
            "NM1*PR*2*ACME HEALTH*****PI*PAYER01",
            "HL*2*1*21*1",
            "NM1*1P*2*FAMILY PRACTICE*****XX*1234567893",
            "HL*3*2*22*0",
            "NM1*IL*1*DOE*JANE****MI*MEMBER001",
        ]
    }

    fn project(
        projector: ClaimStatusProjector,
        raw: &[&str],
    ) -> (TransactionData, DiagnosticCollector) {
        let segments: Vec<Segment> = raw.iter().map(|s| seg(s)).collect();
        let mut diagnostics = DiagnosticCollector::new();
        let mut ctx = ProjectionContext::new("transactions[0]", &mut diagnostics);
        (projector.project(&segments, &mut ctx), diagnostics)
    }

    #[test]
    fn inquiry_collects_claims_with_charges() {
        let mut raw = skeleton();
        raw.push("TRN*1*CLM001");
        raw.push("AMT*T3*450.00");
        raw.push("TRN*1*CLM002");
        let (data, diagnostics) = project(ClaimStatusProjector::inquiry(), &raw);
        assert!(diagnostics.is_valid(), "{:?}", diagnostics.entries());

        let tree = data.as_claim_status_inquiry().unwrap();
        assert_eq!(tree.claim_inquiries.len(), 2);
        assert_eq!(tree.claim_inquiries[0].claim_control_number, "CLM001");
        assert_eq!(tree.claim_inquiries[0].total_charge, Some(450.0));
        assert_eq!(tree.claim_inquiries[1].total_charge, None);
    }

    #[test]
    fn response_collects_statuses_keyed_by_trace() {
        let mut raw = skeleton();
        raw.push("TRN*2*CLM001");
        raw.push("STC*F1:65*20240120");
        raw.push("MSG*CLAIM FINALIZED");
        let (data, diagnostics) = project(ClaimStatusProjector::response(), &raw);
        assert!(diagnostics.is_valid(), "{:?}", diagnostics.entries());

        let tree = data.as_claim_status_response().unwrap();
        assert_eq!(tree.claim_status_info.len(), 1);
        let status = &tree.claim_status_info[0];
        assert_eq!(status.claim_control_number.as_deref(), Some("CLM001"));
        assert_eq!(status.category_code, "F1");
        assert_eq!(status.status_code, "65");
        assert_eq!(status.effective_date.as_deref(), Some("2024-01-20"));
        assert_eq!(tree.messages, vec!["CLAIM FINALIZED".to_string()]);
    }

    #[test]
    fn stc_in_an_inquiry_is_unexpected() {
        let mut raw = skeleton();
        raw.push("STC*F1:65");
        let (data, diagnostics) = project(ClaimStatusProjector::inquiry(), &raw);
        assert!(data.as_claim_status_inquiry().is_some());
        assert!(diagnostics.find("UNEXPECTED_SEGMENT").is_some());
    }

    #[test]
    fn missing_information_source_is_a_required_error() {
        let raw = vec!["BHT*0010*13*REF276*20240101*1200", "NM1*IL*1*DOE*JANE"];
        let (_, diagnostics) = project(ClaimStatusProjector::inquiry(), &raw);
        let missing = diagnostics.find("MISSING_REQUIRED").unwrap();
        assert_eq!(missing.value.as_deref(), Some("NM1*PR"));
    }
}
