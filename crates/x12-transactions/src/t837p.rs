//! 837P professional-claim projector.
//!
//! Loop order: header (BHT) → submitter (NM1*41) → receiver (NM1*40) →
//! billing provider (2000A/2010AA) → subscriber (2000B) → claim (CLM) →
//! diagnoses (HI) → service lines (LX/SV1).

use crate::dispatch::{ProjectionContext, Projector};
use crate::fields::{composite_procedure, count, iso_date, iso_time, money, opt, party_from_nm1};
use tracing::trace;
use x12_ast::t837p::{
    ClaimInformation, Diagnosis, Patient, ProfessionalClaim, ProfessionalService, Provider,
    Subscriber,
};
use x12_ast::{Segment, TransactionData, TransactionReference};

/// Projector for 837P professional claims.
#[derive(Debug, Default)]
pub struct ProfessionalClaimProjector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Header,
    BillingProvider,
    Subscriber,
    Patient,
    Claim,
    Service,
}

impl LoopState {
    fn name(self) -> &'static str {
        match self {
            LoopState::Header => "header",
            LoopState::BillingProvider => "billing provider",
            LoopState::Subscriber => "subscriber",
            LoopState::Patient => "patient",
            LoopState::Claim => "claim",
            LoopState::Service => "service line",
        }
    }
}

impl Projector for ProfessionalClaimProjector {
    fn project(&self, segments: &[Segment], ctx: &mut ProjectionContext<'_>) -> TransactionData {
        let mut tree = ProfessionalClaim::default();
        let mut state = LoopState::Header;

        for segment in segments {
            match segment.id.as_str() {
                "BHT" => {
                    tree.reference = Some(TransactionReference {
                        purpose_code: segment.value_owned(2),
                        reference_id: segment.value_owned(3),
                        date: iso_date(segment.value(4)),
                        time: iso_time(segment.value(5)),
                    });
                }
                "NM1" => state = self.handle_nm1(segment, state, &mut tree, ctx),
                "HL" => {
                    trace!(level = %segment.value(3), "hierarchical level");
                }
                "SBR" => {
                    let subscriber = tree.subscriber.get_or_insert_with(Subscriber::default);
                    subscriber.payer_responsibility = opt(segment.value(1));
                    subscriber.group_number = opt(segment.value(3));
                    state = LoopState::Subscriber;
                }
                "PAT" => {
                    let patient = tree.patient.get_or_insert_with(Patient::default);
                    patient.relationship = opt(segment.value(1));
                    state = LoopState::Patient;
                }
                "REF" => {
                    if state == LoopState::BillingProvider && segment.value(1) == "EI" {
                        if let Some(provider) = tree.billing_provider.as_mut() {
                            provider.tax_id = opt(segment.value(2));
                        }
                    } else {
                        trace!(qualifier = %segment.value(1), "tolerated REF in {} loop", state.name());
                    }
                }
                "CLM" => {
                    let place = segment.element(5);
                    tree.claim = Some(ClaimInformation {
                        claim_id: segment.value_owned(1),
                        total_charge: money(ctx, "claim.total_charge", segment.value(2)),
                        place_of_service: place
                            .and_then(|e| e.component(0))
                            .and_then(|c| opt(c)),
                        frequency_code: place.and_then(|e| e.component(2)).and_then(|c| opt(c)),
                    });
                    state = LoopState::Claim;
                }
                "HI" => {
                    for element in &segment.elements {
                        let qualifier = element.component(0).unwrap_or("");
                        let code = element.component(1).unwrap_or("");
                        if !code.is_empty() {
                            tree.diagnoses.push(Diagnosis {
                                qualifier: qualifier.to_string(),
                                code: code.to_string(),
                            });
                        }
                    }
                }
                "LX" => state = LoopState::Service,
                "SV1" => {
                    if state != LoopState::Service {
                        ctx.unexpected_segment(segment, state.name());
                        continue;
                    }
                    let index = tree.service_lines.len();
                    let base = format!("service_lines[{index}]");
                    let (procedure_code, modifiers) = composite_procedure(segment.element(1));
                    let pointers = diagnosis_pointers(segment, &base, ctx);
                    tree.service_lines.push(ProfessionalService {
                        procedure_code,
                        modifiers,
                        charge: money(ctx, &format!("{base}.charge"), segment.value(2)),
                        unit_type: opt(segment.value(3)),
                        units: count(ctx, &format!("{base}.units"), segment.value(4), 1.0),
                        diagnosis_pointers: pointers,
                        service_date: None,
                    });
                }
                "DTP" => {
                    if state == LoopState::Service && segment.value(1) == "472" {
                        if let Some(service) = tree.service_lines.last_mut() {
                            service.service_date = opt(&iso_date(segment.value(3)));
                        }
                    } else {
                        trace!(qualifier = %segment.value(1), "tolerated DTP in {} loop", state.name());
                    }
                }
                // Known 837P segments with no semantic slot in the tree.
                "N3" | "N4" | "DMG" | "PER" | "PRV" | "CUR" | "AMT" | "NTE" | "PWK" | "CN1"
                | "DSB" | "CRC" | "K3" => {
                    trace!(id = %segment.id, "tolerated segment in {} loop", state.name());
                }
                _ => ctx.unexpected_segment(segment, state.name()),
            }
        }

        if tree.submitter.is_none() {
            ctx.missing_required("NM1*41", "submitter");
        }
        if tree.billing_provider.is_none() {
            ctx.missing_required("NM1*85", "billing provider");
        }
        if tree.subscriber.is_none() {
            ctx.missing_required("SBR", "subscriber loop");
        }
        if tree.claim.is_none() {
            ctx.missing_required("CLM", "claim information");
        }

        TransactionData::ProfessionalClaim(tree)
    }
}

impl ProfessionalClaimProjector {
    fn handle_nm1(
        &self,
        segment: &Segment,
        state: LoopState,
        tree: &mut ProfessionalClaim,
        _ctx: &mut ProjectionContext<'_>,
    ) -> LoopState {
        match segment.value(1) {
            "41" => {
                tree.submitter = Some(party_from_nm1(segment));
                state
            }
            "40" => {
                tree.receiver = Some(party_from_nm1(segment));
                state
            }
            "85" => {
                tree.billing_provider = Some(provider_from_nm1(segment));
                LoopState::BillingProvider
            }
            "82" => {
                tree.rendering_provider = Some(provider_from_nm1(segment));
                state
            }
            "IL" => {
                let subscriber = tree.subscriber.get_or_insert_with(Subscriber::default);
                subscriber.last_name = segment.value_owned(3);
                subscriber.first_name = opt(segment.value(4));
                if segment.value(8) == "MI" {
                    subscriber.member_id = opt(segment.value(9));
                }
                LoopState::Subscriber
            }
            "QC" => {
                let patient = tree.patient.get_or_insert_with(Patient::default);
                patient.last_name = segment.value_owned(3);
                patient.first_name = opt(segment.value(4));
                LoopState::Patient
            }
            entity => {
                // Payer (PR), referring provider (DN), facility (77), ...
                trace!(%entity, "tolerated NM1 entity");
                state
            }
        }
    }
}

fn provider_from_nm1(segment: &Segment) -> Provider {
    Provider {
        name: segment.value_owned(3),
        npi: if segment.value(8) == "XX" {
            opt(segment.value(9))
        } else {
            None
        },
        tax_id: None,
    }
}

/// SV107 is a colon-joined list of 1-based pointers into the HI diagnoses.
fn diagnosis_pointers(
    segment: &Segment,
    base: &str,
    ctx: &mut ProjectionContext<'_>,
) -> Vec<u32> {
    let Some(element) = segment.element(7) else {
        return Vec::new();
    };
    let mut pointers = Vec::new();
    for component in element.components() {
        let component = component.trim_matches(' ');
        if component.is_empty() {
            continue;
        }
        match component.parse::<u32>() {
            Ok(pointer) => pointers.push(pointer),
            Err(_) => {
                ctx.numeric_format(
                    &format!("{base}.diagnosis_pointers"),
                    component,
                    "diagnosis pointer",
                );
            }
        }
    }
    pointers
}
