//! 835 remittance-advice projector.
//!
//! Loop order: header (BPR/TRN/REF/DTM) → payer (N1*PR) → payee (N1*PE) →
//! claims (CLP with CAS/NM1/REF/DTM/AMT/QTY, each with SVC sub-loops) →
//! summary (PLB). Unexpected segments are skipped with a warning; the walk
//! never aborts.

use crate::dispatch::{ProjectionContext, Projector};
use crate::fields::{composite_procedure, count, format_amount, iso_date, money, opt};
use tracing::trace;
use x12_ast::t835::{
    Adjustment, Claim, FinancialInformation, OtherIdentifier, Payee, Payer, PlbAdjustment,
    Remittance, ServiceLine,
};
use x12_ast::{Diagnostic, Segment, TransactionData};

/// Allowed drift between BPR02 and the claim/PLB roll-up.
const BALANCE_TOLERANCE: f64 = 0.01;

/// How a positive PLB amount relates to the payment total.
///
/// The wire convention is that a positive provider-level adjustment
/// reduces the payer's obligation, so the balance identity is
/// `BPR02 ≈ Σ CLP04 − Σ PLB`. Feeds that emit the opposite sign can flip
/// this at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlbSignConvention {
    /// Positive PLB amounts deduct from the payment (the standard reading).
    #[default]
    DeductsFromPayment,
    /// Positive PLB amounts add to the payment.
    AddsToPayment,
}

/// Projector for 835 payment/remittance advice.
#[derive(Debug, Default)]
pub struct RemittanceProjector {
    convention: PlbSignConvention,
}

impl RemittanceProjector {
    /// Projector with an explicit PLB sign convention.
    pub fn new(convention: PlbSignConvention) -> Self {
        Self { convention }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Header,
    Payer,
    Payee,
    Claim,
    Service,
    Summary,
}

impl LoopState {
    fn name(self) -> &'static str {
        match self {
            LoopState::Header => "header",
            LoopState::Payer => "payer",
            LoopState::Payee => "payee",
            LoopState::Claim => "claim",
            LoopState::Service => "service",
            LoopState::Summary => "summary",
        }
    }
}

impl Projector for RemittanceProjector {
    fn project(&self, segments: &[Segment], ctx: &mut ProjectionContext<'_>) -> TransactionData {
        let mut tree = Remittance::default();
        let mut state = LoopState::Header;
        let mut trace_number: Option<String> = None;

        for segment in segments {
            match segment.id.as_str() {
                "BPR" => {
                    if tree.financial_information.is_some() {
                        ctx.unexpected_segment(segment, state.name());
                        continue;
                    }
                    tree.financial_information = Some(FinancialInformation {
                        total_paid: money(
                            ctx,
                            "financial_information.total_paid",
                            segment.value(2),
                        ),
                        payment_method: segment.value_owned(4),
                        payment_date: iso_date(segment.value(16)),
                        trace_number: None,
                    });
                }
                "TRN" => {
                    trace_number = opt(segment.value(2));
                }
                "DTM" => self.handle_dtm(segment, state, &mut tree, ctx),
                "N1" => match segment.value(1) {
                    "PR" => {
                        tree.payer = Some(Payer {
                            name: segment.value_owned(2),
                            identifier: opt(segment.value(4)),
                        });
                        state = LoopState::Payer;
                    }
                    "PE" => {
                        let npi = if segment.value(3) == "XX" {
                            opt(segment.value(4))
                        } else {
                            None
                        };
                        tree.payee = Some(Payee {
                            name: segment.value_owned(2),
                            npi,
                            tax_id: None,
                            other_identifiers: Vec::new(),
                        });
                        state = LoopState::Payee;
                    }
                    _ => ctx.unexpected_segment(segment, state.name()),
                },
                "REF" => self.handle_ref(segment, state, &mut tree, ctx),
                "NM1" => {
                    // NM1*..*..*..*..*..*..*..*XX*<npi> inside the payee loop
                    // carries the provider NPI.
                    if state == LoopState::Payee && segment.value(8) == "XX" {
                        if let Some(payee) = tree.payee.as_mut() {
                            if payee.npi.is_none() {
                                payee.npi = opt(segment.value(9));
                            }
                        }
                    } else {
                        trace!(id = %segment.id, "tolerated NM1 in {} loop", state.name());
                    }
                }
                "CLP" => {
                    let index = tree.claims.len();
                    let base = format!("claims[{index}]");
                    tree.claims.push(Claim {
                        claim_id: segment.value_owned(1),
                        status_code: segment.value_owned(2),
                        total_charge: money(ctx, &format!("{base}.total_charge"), segment.value(3)),
                        total_paid: money(ctx, &format!("{base}.total_paid"), segment.value(4)),
                        patient_responsibility: money(
                            ctx,
                            &format!("{base}.patient_responsibility"),
                            segment.value(5),
                        ),
                        claim_filing_indicator: opt(segment.value(6)),
                        payer_control_number: opt(segment.value(7)),
                        adjustments: Vec::new(),
                        services: Vec::new(),
                    });
                    state = LoopState::Claim;
                }
                "CAS" => match state {
                    LoopState::Claim => {
                        let index = tree.claims.len() - 1;
                        let base = format!("claims[{index}].adjustments");
                        let start = tree.claims[index].adjustments.len();
                        let adjustments = parse_cas(segment, &base, start, ctx);
                        tree.claims[index].adjustments.extend(adjustments);
                    }
                    LoopState::Service => {
                        let claim = tree.claims.len() - 1;
                        let service = tree.claims[claim].services.len() - 1;
                        let base = format!("claims[{claim}].services[{service}].adjustments");
                        let start = tree.claims[claim].services[service].adjustments.len();
                        let adjustments = parse_cas(segment, &base, start, ctx);
                        tree.claims[claim].services[service]
                            .adjustments
                            .extend(adjustments);
                    }
                    _ => ctx.unexpected_segment(segment, state.name()),
                },
                "SVC" => {
                    if !matches!(state, LoopState::Claim | LoopState::Service) {
                        ctx.unexpected_segment(segment, state.name());
                        continue;
                    }
                    let claim = tree.claims.len() - 1;
                    let index = tree.claims[claim].services.len();
                    let base = format!("claims[{claim}].services[{index}]");
                    let (procedure_code, modifiers) = composite_procedure(segment.element(1));
                    tree.claims[claim].services.push(ServiceLine {
                        procedure_code,
                        modifiers,
                        charge: money(ctx, &format!("{base}.charge"), segment.value(2)),
                        paid: money(ctx, &format!("{base}.paid"), segment.value(3)),
                        units: count(ctx, &format!("{base}.units"), segment.value(5), 1.0),
                        service_date: None,
                        adjustments: Vec::new(),
                    });
                    state = LoopState::Service;
                }
                "PLB" => {
                    parse_plb(segment, &mut tree, ctx);
                    state = LoopState::Summary;
                }
                // Known 835 segments with no semantic slot in the tree.
                "LX" | "TS3" | "TS2" | "AMT" | "QTY" | "MIA" | "MOA" | "N3" | "N4" | "PER"
                | "RDM" | "CUR" => {
                    trace!(id = %segment.id, "tolerated segment in {} loop", state.name());
                }
                _ => ctx.unexpected_segment(segment, state.name()),
            }
        }

        if let Some(financial) = tree.financial_information.as_mut() {
            financial.trace_number = trace_number;
        } else {
            ctx.missing_required("BPR", "financial information");
        }
        if tree.payer.is_none() {
            ctx.missing_required("N1*PR", "payer identification");
        }
        if tree.payee.is_none() {
            ctx.missing_required("N1*PE", "payee identification");
        }

        self.check_balance(&tree, ctx);

        TransactionData::Remittance(tree)
    }
}

impl RemittanceProjector {
    fn handle_dtm(
        &self,
        segment: &Segment,
        state: LoopState,
        tree: &mut Remittance,
        _ctx: &mut ProjectionContext<'_>,
    ) {
        let qualifier = segment.value(1);
        match qualifier {
            "405" => tree.production_date = opt(&iso_date(segment.value(2))),
            "472" | "484" | "150" | "151" => {
                if state == LoopState::Service {
                    let claim = tree.claims.len() - 1;
                    if let Some(service) = tree.claims[claim].services.last_mut() {
                        service.service_date = opt(&iso_date(segment.value(2)));
                    }
                }
            }
            // Statement and coverage dates carry no slot in the tree.
            _ => trace!(%qualifier, "tolerated DTM qualifier"),
        }
    }

    fn handle_ref(
        &self,
        segment: &Segment,
        state: LoopState,
        tree: &mut Remittance,
        ctx: &mut ProjectionContext<'_>,
    ) {
        if state != LoopState::Payee {
            trace!(qualifier = %segment.value(1), "tolerated REF in {} loop", state.name());
            return;
        }
        let Some(payee) = tree.payee.as_mut() else {
            return;
        };
        let qualifier = segment.value(1);
        let value = segment.value(2);
        match qualifier {
            // REF*TJ is the federal Tax ID, not the NPI.
            "TJ" => payee.tax_id = opt(value),
            "HPI" => payee.npi = opt(value),
            "1D" => {
                payee.other_identifiers.push(OtherIdentifier {
                    qualifier: qualifier.to_string(),
                    value: value.to_string(),
                });
                // Legacy Medicaid qualifier that some feeds use for the NPI.
                ctx.record_at(
                    "payee",
                    Diagnostic::info(
                        "835_NPI_CANDIDATE",
                        format!("REF*1D value '{value}' may be an NPI on legacy feeds"),
                    )
                    .with_value(value.to_string()),
                );
            }
            _ => payee.other_identifiers.push(OtherIdentifier {
                qualifier: qualifier.to_string(),
                value: value.to_string(),
            }),
        }
    }

    fn check_balance(&self, tree: &Remittance, ctx: &mut ProjectionContext<'_>) {
        let Some(financial) = tree.financial_information.as_ref() else {
            return;
        };
        let claims_total: f64 = tree.claims.iter().map(|c| c.total_paid).sum();
        let plb_total: f64 = tree.plb_adjustments.iter().map(|p| p.amount).sum();
        let expected = match self.convention {
            PlbSignConvention::DeductsFromPayment => claims_total - plb_total,
            PlbSignConvention::AddsToPayment => claims_total + plb_total,
        };
        let delta = (financial.total_paid - expected).abs();
        if delta > BALANCE_TOLERANCE + f64::EPSILON {
            ctx.record_at(
                "financial_information.total_paid",
                Diagnostic::warning(
                    "835_FINANCIAL_IMBALANCE",
                    format!(
                        "BPR total {} does not reconcile with claims {} and PLB {} (delta {})",
                        format_amount(financial.total_paid),
                        format_amount(claims_total),
                        format_amount(plb_total),
                        format_amount(delta),
                    ),
                )
                .with_value(format_amount(financial.total_paid))
                .with_context("bpr_total", format_amount(financial.total_paid))
                .with_context("claims_total", format_amount(claims_total))
                .with_context("plb_total", format_amount(plb_total))
                .with_context("delta", format_amount(delta))
                .with_context("tolerance", format_amount(BALANCE_TOLERANCE)),
            );
        }
    }
}

/// CAS encodes adjustments as (reason, amount, quantity) triplets repeating
/// after the group code; every triplet is captured. `start` is the number
/// of adjustments the target list already holds, so diagnostic paths index
/// correctly across repeated CAS segments.
fn parse_cas(
    segment: &Segment,
    base: &str,
    start: usize,
    ctx: &mut ProjectionContext<'_>,
) -> Vec<Adjustment> {
    let group_code = segment.value_owned(1);
    let mut adjustments = Vec::new();
    let mut position = 2;
    while position < 20 {
        let reason = segment.value(position);
        if reason.is_empty() {
            break;
        }
        let index = start + adjustments.len();
        adjustments.push(Adjustment {
            group_code: group_code.clone(),
            reason_code: reason.to_string(),
            amount: money(
                ctx,
                &format!("{base}[{index}].amount"),
                segment.value(position + 1),
            ),
            quantity: count(
                ctx,
                &format!("{base}[{index}].quantity"),
                segment.value(position + 2),
                1.0,
            ),
        });
        position += 3;
    }
    adjustments
}

/// PLB carries reason/amount pairs after the provider id and fiscal period.
/// The reason may be a composite; only its first component is the code.
fn parse_plb(segment: &Segment, tree: &mut Remittance, ctx: &mut ProjectionContext<'_>) {
    let provider_id = segment.value_owned(1);
    let fiscal_period = opt(&iso_date(segment.value(2)));
    let mut position = 3;
    while position < 15 {
        let reason = segment
            .element(position)
            .and_then(|e| e.component(0))
            .unwrap_or("")
            .trim_matches(' ');
        if reason.is_empty() {
            break;
        }
        let index = tree.plb_adjustments.len();
        tree.plb_adjustments.push(PlbAdjustment {
            provider_id: provider_id.clone(),
            fiscal_period: fiscal_period.clone(),
            reason_code: reason.to_string(),
            amount: money(
                ctx,
                &format!("plb_adjustments[{index}].amount"),
                segment.value(position + 1),
            ),
        });
        position += 2;
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

    fn project(raw_segments: &[&str]) -> (Remittance, DiagnosticCollector) {
        let segments: Vec<Segment> = raw_segments.iter().map(|s| seg(s)).collect();
        let mut diagnostics = DiagnosticCollector::new();
        let mut ctx = ProjectionContext::new("transactions[0]", &mut diagnostics);
        let data = RemittanceProjector::default().project(&segments, &mut ctx);
        match data {
            TransactionData::Remittance(tree) => (tree, diagnostics),
            other => panic!("expected a remittance, got {other:?}"),
        }
    }

    fn minimal() -> Vec<&'static str> {
        vec![
            "BPR*I*1000.00*C*ACH*CCP*01*123456789*DA*987654321*1500000000**01*123456789*DA*987654321*20240101",
            "TRN*1*TRACE123*1500000000",
            "N1*PR*PAYER",
            "N1*PE*PAYEE*XX*1234567893",
            "CLP*CLM001*1*1200.00*1000.00*200.00*MC*PAYERCLAIM",
        ]
    }

    #[test]
    fn minimal_remittance_projects_cleanly() {
        let (tree, diagnostics) = project(&minimal());
        assert!(diagnostics.is_valid(), "{:?}", diagnostics.entries());

        let financial = tree.financial_information.unwrap();
        assert_eq!(financial.total_paid, 1000.0);
        assert_eq!(financial.payment_method, "ACH");
        assert_eq!(financial.payment_date, "2024-01-01");
        assert_eq!(financial.trace_number.as_deref(), Some("TRACE123"));

        assert_eq!(tree.payer.unwrap().name, "PAYER");
        let payee = tree.payee.unwrap();
        assert_eq!(payee.name, "PAYEE");
        assert_eq!(payee.npi.as_deref(), Some("1234567893"));

        assert_eq!(tree.claims.len(), 1);
        let claim = &tree.claims[0];
        assert_eq!(claim.claim_id, "CLM001");
        assert_eq!(claim.total_charge, 1200.0);
        assert_eq!(claim.total_paid, 1000.0);
        assert_eq!(claim.patient_responsibility, 200.0);
        assert_eq!(claim.payer_control_number.as_deref(), Some("PAYERCLAIM"));
    }

    #[test]
    fn svc_composite_with_modifier() {
        let mut segments = minimal();
        segments.push("SVC*HC:99213:25*100.00*75.00**1");
        let (tree, _) = project(&segments);
        let service = &tree.claims[0].services[0];
        assert_eq!(service.procedure_code, "99213");
        assert_eq!(service.modifiers, vec!["25".to_string()]);
        assert_eq!(service.charge, 100.0);
        assert_eq!(service.paid, 75.0);
        assert_eq!(service.units, 1.0);
    }

    #[test]
    fn bare_procedure_code_without_qualifier() {
        let mut segments = minimal();
        segments.push("SVC*99213*100.00*75.00");
        let (tree, _) = project(&segments);
        let service = &tree.claims[0].services[0];
        assert_eq!(service.procedure_code, "99213");
        assert!(service.modifiers.is_empty());
        assert_eq!(service.units, 1.0);
    }

    #[test]
    fn all_cas_triplets_are_captured() {
        let mut segments = minimal();
        segments.push("CAS*CO*45*150.00*1*97*30.00*1*253*20.00*1");
        let (tree, _) = project(&segments);
        let adjustments = &tree.claims[0].adjustments;
        assert_eq!(adjustments.len(), 3);
        assert_eq!(adjustments[0].reason_code, "45");
        assert_eq!(adjustments[0].amount, 150.0);
        assert_eq!(adjustments[1].reason_code, "97");
        assert_eq!(adjustments[2].reason_code, "253");
        assert!(adjustments.iter().all(|a| a.group_code == "CO"));
    }

    #[test]
    fn service_level_cas_lands_on_the_service() {
        let mut segments = minimal();
        segments.push("SVC*HC:99213*100.00*75.00");
        segments.push("CAS*PR*3*25.00");
        let (tree, _) = project(&segments);
        assert!(tree.claims[0].adjustments.is_empty());
        let service = &tree.claims[0].services[0];
        assert_eq!(service.adjustments.len(), 1);
        assert_eq!(service.adjustments[0].reason_code, "3");
    }

    #[test]
    fn service_date_attaches_to_the_latest_service() {
        let mut segments = minimal();
        segments.push("SVC*HC:99213*100.00*75.00");
        segments.push("DTM*472*20240115");
        let (tree, _) = project(&segments);
        assert_eq!(
            tree.claims[0].services[0].service_date.as_deref(),
            Some("2024-01-15")
        );
    }

    #[test]
    fn ref_tj_is_tax_id_and_1d_is_npi_candidate() {
        let mut segments = minimal();
        // REF follows the payee N1, before the claim loop.
        segments.insert(4, "REF*TJ*123456789");
        segments.insert(5, "REF*1D*9876543210");
        let (tree, diagnostics) = project(&segments);
        let payee = tree.payee.unwrap();
        assert_eq!(payee.tax_id.as_deref(), Some("123456789"));
        // The N1 qualifier XX already set the NPI; 1D must not clobber it.
        assert_eq!(payee.npi.as_deref(), Some("1234567893"));
        assert_eq!(payee.other_identifiers.len(), 1);
        assert!(diagnostics.find("835_NPI_CANDIDATE").is_some());
    }

    #[test]
    fn balanced_remittance_records_no_imbalance() {
        let (_, diagnostics) = project(&minimal());
        assert!(diagnostics.find("835_FINANCIAL_IMBALANCE").is_none());
    }

    #[test]
    fn plb_shifts_the_balance_identity() {
        let mut segments = minimal();
        segments.push("PLB*1234567893*20240101*CV*-5.00");
        let (tree, diagnostics) = project(&segments);

        assert_eq!(tree.plb_adjustments.len(), 1);
        assert_eq!(tree.plb_adjustments[0].reason_code, "CV");
        assert_eq!(tree.plb_adjustments[0].amount, -5.0);

        let imbalance = diagnostics.find("835_FINANCIAL_IMBALANCE").unwrap();
        assert_eq!(imbalance.context["bpr_total"], "1000.00");
        assert_eq!(imbalance.context["claims_total"], "1000.00");
        assert_eq!(imbalance.context["plb_total"], "-5.00");
        assert_eq!(imbalance.context["delta"], "5.00");
        assert_eq!(imbalance.context["tolerance"], "0.01");
    }

    #[test]
    fn plb_sign_honors_alternating_amounts() {
        let mut segments = minimal();
        // +50 and -50 cancel out, so the identity still holds.
        segments.push("PLB*1234567893*20240101*WO*50.00*CV*-50.00");
        let (tree, diagnostics) = project(&segments);
        assert_eq!(tree.plb_adjustments.len(), 2);
        assert!(diagnostics.find("835_FINANCIAL_IMBALANCE").is_none());
    }

    #[test]
    fn adds_to_payment_convention_flips_the_identity() {
        let segments: Vec<Segment> = {
            let mut raw = minimal();
            raw.push("PLB*1234567893*20240101*CV*-5.00");
            raw.iter().map(|s| seg(s)).collect()
        };
        let mut diagnostics = DiagnosticCollector::new();
        let mut ctx = ProjectionContext::new("transactions[0]", &mut diagnostics);
        let projector = RemittanceProjector::new(PlbSignConvention::AddsToPayment);
        projector.project(&segments, &mut ctx);
        // 1000 + (-5) = 995 vs BPR 1000: still imbalanced, delta 5.
        let imbalance = diagnostics.find("835_FINANCIAL_IMBALANCE").unwrap();
        assert_eq!(imbalance.context["delta"], "5.00");
    }

    #[test]
    fn missing_bpr_is_a_required_error_with_defaults() {
        let (tree, diagnostics) = project(&["N1*PR*PAYER", "N1*PE*PAYEE"]);
        assert!(tree.financial_information.is_none());
        assert!(!diagnostics.is_valid());
        let missing = diagnostics.find("MISSING_REQUIRED").unwrap();
        assert_eq!(missing.value.as_deref(), Some("BPR"));
    }

    #[test]
    fn invalid_money_defaults_to_zero_with_numeric_format() {
        let mut segments = minimal();
        segments[4] = "CLP*CLM001*1*12X0.00*1000.00*200.00";
        let (tree, diagnostics) = project(&segments);
        assert_eq!(tree.claims[0].total_charge, 0.0);
        let numeric = diagnostics.find("NUMERIC_FORMAT").unwrap();
        assert_eq!(numeric.field_path.as_deref(), Some("claims[0].total_charge"));
        assert_eq!(numeric.value.as_deref(), Some("12X0.00"));
    }

    #[test]
    fn unexpected_segment_is_skipped_not_fatal() {
        let mut segments = minimal();
        segments.push("ZZZ*1*2");
        let (tree, diagnostics) = project(&segments);
        assert_eq!(tree.claims.len(), 1);
        let unexpected = diagnostics.find("UNEXPECTED_SEGMENT").unwrap();
        assert_eq!(unexpected.value.as_deref(), Some("ZZZ"));
        assert_eq!(unexpected.severity, x12_ast::Severity::Warning);
    }
}
