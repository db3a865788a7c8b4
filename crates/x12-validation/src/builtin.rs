//! Built-in rule sets.
//!
//! Six bundled sets, selectable by name. `comprehensive` (alias `all`) is
//! the union of the others, deduplicated by rule id with the first
//! registration winning.

use crate::engine::{DocumentRule, DocumentRuleKind, RuleRegistry};
use crate::rule::{Condition, Operator, Rule, RuleCategory};
use crate::validators::{CalcOperation, CrossCheck, FieldCheck, FieldCheckKind};
use serde_json::json;
use x12_ast::Severity;

/// The bundled rule sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSet {
    /// Required-slot presence and primitive numeric sanity.
    Basic,
    /// 835 financial consistency and payment-logic checks.
    Business,
    /// NPI, date, precision, and control-number compliance.
    Hipaa,
    /// `Hipaa` plus identifier requirements and conditional fields.
    HipaaAdvanced,
    /// Field-level and cross-field validator showcase over the 835 tree.
    EnhancedBusiness,
    /// Union of everything above.
    Comprehensive,
}

impl RuleSet {
    /// Look a set up by its published name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "basic" => Some(RuleSet::Basic),
            "business" => Some(RuleSet::Business),
            "hipaa" => Some(RuleSet::Hipaa),
            "hipaa-advanced" => Some(RuleSet::HipaaAdvanced),
            "enhanced-business" => Some(RuleSet::EnhancedBusiness),
            "comprehensive" | "all" => Some(RuleSet::Comprehensive),
            _ => None,
        }
    }

    /// The published name.
    pub fn name(self) -> &'static str {
        match self {
            RuleSet::Basic => "basic",
            RuleSet::Business => "business",
            RuleSet::Hipaa => "hipaa",
            RuleSet::HipaaAdvanced => "hipaa-advanced",
            RuleSet::EnhancedBusiness => "enhanced-business",
            RuleSet::Comprehensive => "comprehensive",
        }
    }

    /// Build a registry holding this set.
    pub fn registry(self) -> RuleRegistry {
        let mut registry = RuleRegistry::new();
        self.register_into(&mut registry);
        registry
    }

    /// Register this set into an existing registry.
    pub fn register_into(self, registry: &mut RuleRegistry) {
        match self {
            RuleSet::Basic => {
                for rule in basic_rules() {
                    registry.add(rule);
                }
            }
            RuleSet::Business => {
                for rule in business_rules() {
                    registry.add(rule);
                }
            }
            RuleSet::Hipaa => {
                for rule in hipaa_document_rules() {
                    registry.add_document_rule(rule);
                }
                for rule in hipaa_rules() {
                    registry.add(rule);
                }
            }
            RuleSet::HipaaAdvanced => {
                RuleSet::Hipaa.register_into(registry);
                for rule in hipaa_advanced_rules() {
                    registry.add(rule);
                }
            }
            RuleSet::EnhancedBusiness => {
                for rule in enhanced_business_rules() {
                    registry.add(rule);
                }
            }
            RuleSet::Comprehensive => {
                RuleSet::Basic.register_into(registry);
                RuleSet::Business.register_into(registry);
                RuleSet::HipaaAdvanced.register_into(registry);
                RuleSet::EnhancedBusiness.register_into(registry);
            }
        }
    }
}

fn missing_slot(id: &str, code: &str, slot: &str, description: &str) -> Rule {
    Rule::new(id, Severity::Error)
        .in_category(RuleCategory::Structural)
        .describe(format!("{description} must be present"))
        .with_message(format!("{description} is missing"))
        .for_transactions([code])
        .when(Condition::new(slot, Operator::NotExists))
}

fn basic_rules() -> Vec<Rule> {
    vec![
        missing_slot(
            "835_MISSING_FINANCIAL_INFO",
            "835",
            "financial_information",
            "BPR financial information",
        ),
        missing_slot("835_MISSING_PAYER", "835", "payer", "payer identification"),
        missing_slot("835_MISSING_PAYEE", "835", "payee", "payee identification"),
        Rule::new("835_NO_CLAIMS", Severity::Warning)
            .in_category(RuleCategory::Structural)
            .describe("an 835 without claims is unusual")
            .with_message("no claims found in the remittance")
            .for_transactions(["835"])
            .when(Condition::new("claims[0]", Operator::NotExists)),
        Rule::new("835_NEGATIVE_PAYMENT", Severity::Error)
            .in_category(RuleCategory::Business)
            .with_message("total payment {value} is negative")
            .for_transactions(["835"])
            .when(Condition::comparing(
                "financial_information.total_paid",
                Operator::Lt,
                json!(0),
            )),
        missing_slot(
            "837P_MISSING_SUBMITTER",
            "837",
            "submitter",
            "submitter loop",
        ),
        missing_slot("837P_MISSING_CLAIM", "837", "claim", "CLM claim information"),
        missing_slot(
            "270_MISSING_SUBSCRIBER",
            "270",
            "subscriber",
            "subscriber loop",
        ),
        missing_slot(
            "271_MISSING_SUBSCRIBER",
            "271",
            "subscriber",
            "subscriber loop",
        ),
        missing_slot(
            "276_MISSING_SUBSCRIBER",
            "276",
            "subscriber",
            "subscriber loop",
        ),
        missing_slot(
            "277_MISSING_SUBSCRIBER",
            "277",
            "subscriber",
            "subscriber loop",
        ),
    ]
}

fn business_rules() -> Vec<Rule> {
    vec![
        Rule::new("835_CLAIM_OVERPAYMENT", Severity::Warning)
            .in_category(RuleCategory::Business)
            .describe("paid amount must not exceed the submitted charge")
            .for_transactions(["835"])
            .with_cross_check(CrossCheck::ConsistencyCheck {
                field1: "claims[*].total_charge".into(),
                relationship: Operator::Gte,
                field2: "claims[*].total_paid".into(),
            }),
        Rule::new("835_NEGATIVE_PATIENT_RESPONSIBILITY", Severity::Error)
            .in_category(RuleCategory::Business)
            .with_message("patient responsibility {value} is negative")
            .for_transactions(["835"])
            .when(Condition::comparing(
                "claims[*].patient_responsibility",
                Operator::Lt,
                json!(0),
            )),
        Rule::new("835_NEGATIVE_CHARGE", Severity::Error)
            .in_category(RuleCategory::Business)
            .with_message("claim charge {value} is negative")
            .for_transactions(["835"])
            .when(Condition::comparing(
                "claims[*].total_charge",
                Operator::Lt,
                json!(0),
            )),
        Rule::new("835_INVALID_PAYMENT_METHOD", Severity::Error)
            .in_category(RuleCategory::Business)
            .with_message("payment method '{value}' is not an accepted code")
            .for_transactions(["835"])
            .when(Condition::comparing(
                "financial_information.payment_method",
                Operator::NotIn,
                json!(["ACH", "CHK", "WIR", "NON"]),
            )),
        Rule::new("835_SERVICE_PAID_MISMATCH", Severity::Info)
            .in_category(RuleCategory::Business)
            .describe("service-line payments should sum to the claim payment")
            .for_transactions(["835"])
            .with_cross_check(CrossCheck::BalanceCheck {
                left_sum: vec!["claims[*].total_paid".into()],
                right_sum: vec!["claims[*].services[*].paid".into()],
                tolerance: 0.01,
            }),
        Rule::new("835_SERVICE_CHARGE_MISMATCH", Severity::Info)
            .in_category(RuleCategory::Business)
            .describe("service-line charges should sum to the claim charge")
            .for_transactions(["835"])
            .with_cross_check(CrossCheck::BalanceCheck {
                left_sum: vec!["claims[*].total_charge".into()],
                right_sum: vec!["claims[*].services[*].charge".into()],
                tolerance: 0.01,
            }),
        Rule::new("835_ZERO_PAYMENT_NO_ADJUSTMENTS", Severity::Info)
            .in_category(RuleCategory::Business)
            .with_message("zero-payment claim carries no adjustment explanation")
            .for_transactions(["835"])
            .when(Condition::comparing(
                "claims[*].total_paid",
                Operator::Eq,
                json!(0),
            ))
            .when(Condition::new(
                "claims[*].adjustments[0]",
                Operator::NotExists,
            )),
    ]
}

fn hipaa_document_rules() -> Vec<DocumentRule> {
    vec![
        DocumentRule {
            id: "HIPAA_DUPLICATE_CONTROL_NUMBER".into(),
            severity: Severity::Error,
            kind: DocumentRuleKind::ControlNumberUniqueness,
        },
        DocumentRule {
            id: "HIPAA_UNRECOGNIZED_TRANSACTION".into(),
            severity: Severity::Warning,
            kind: DocumentRuleKind::RecognizedTransactionCodes,
        },
    ]
}

fn hipaa_rules() -> Vec<Rule> {
    vec![
        Rule::new("HIPAA_PAYEE_NPI", Severity::Warning)
            .in_category(RuleCategory::Hipaa)
            .for_transactions(["835"])
            .with_field_check(
                FieldCheck::new("payee.npi", FieldCheckKind::NpiFormat)
                    .with_message("payee NPI fails the 80840 Luhn check"),
            ),
        Rule::new("HIPAA_BILLING_PROVIDER_NPI", Severity::Warning)
            .in_category(RuleCategory::Hipaa)
            .for_transactions(["837"])
            .with_field_check(
                FieldCheck::new("billing_provider.npi", FieldCheckKind::NpiFormat)
                    .with_message("billing provider NPI fails the 80840 Luhn check"),
            ),
        Rule::new("HIPAA_PAYMENT_DATE", Severity::Warning)
            .in_category(RuleCategory::Hipaa)
            .for_transactions(["835"])
            .with_field_check(
                FieldCheck::new(
                    "financial_information.payment_date",
                    FieldCheckKind::DateFormat {
                        format: "%Y-%m-%d".into(),
                        min: None,
                        max: None,
                    },
                )
                .with_message("payment date is not a canonical calendar date"),
            ),
        Rule::new("HIPAA_MONETARY_PRECISION", Severity::Error)
            .in_category(RuleCategory::Hipaa)
            .for_transactions(["835"])
            .with_field_check(FieldCheck::new(
                "financial_information.total_paid",
                FieldCheckKind::CurrencyFormat {
                    min: None,
                    max: None,
                },
            ))
            .with_field_check(FieldCheck::new(
                "claims[*].total_paid",
                FieldCheckKind::CurrencyFormat {
                    min: None,
                    max: None,
                },
            ))
            .with_field_check(FieldCheck::new(
                "claims[*].total_charge",
                FieldCheckKind::CurrencyFormat {
                    min: None,
                    max: None,
                },
            )),
    ]
}

fn hipaa_advanced_rules() -> Vec<Rule> {
    vec![
        Rule::new("HIPAA_PAYEE_IDENTIFICATION", Severity::Warning)
            .in_category(RuleCategory::Hipaa)
            .with_message("payee carries neither an NPI nor a Tax ID")
            .for_transactions(["835"])
            .when(Condition::new("payee", Operator::Exists))
            .when(Condition::new("payee.npi", Operator::NotExists))
            .when(Condition::new("payee.tax_id", Operator::NotExists)),
        Rule::new("HIPAA_TAX_ID_FORMAT", Severity::Info)
            .in_category(RuleCategory::Hipaa)
            .for_transactions(["835"])
            .with_field_check(
                FieldCheck::new("payee.tax_id", FieldCheckKind::TaxIdFormat)
                    .with_message("payee Tax ID is neither an EIN nor an SSN"),
            ),
        Rule::new("HIPAA_ACH_PAYMENT_DATE", Severity::Warning)
            .in_category(RuleCategory::Hipaa)
            .for_transactions(["835"])
            .with_field_check(
                FieldCheck::new(
                    "financial_information.payment_date",
                    FieldCheckKind::ConditionalRequired {
                        when: "financial_information.payment_method".into(),
                        operator: Operator::Eq,
                        value: Some(json!("ACH")),
                    },
                )
                .with_message("ACH payments must state an effective date"),
            ),
    ]
}

fn enhanced_business_rules() -> Vec<Rule> {
    vec![
        Rule::new("ENH_835_SERVICE_CODE_FORMAT", Severity::Warning)
            .in_category(RuleCategory::Format)
            .for_transactions(["835"])
            .with_field_check(
                FieldCheck::new(
                    "claims[*].services[*].procedure_code",
                    FieldCheckKind::Regex {
                        pattern: "^[A-Z0-9]{1,48}$".into(),
                    },
                )
                .with_message("procedure code is not a valid service identifier"),
            ),
        Rule::new("ENH_835_CHARGE_RANGE", Severity::Error)
            .in_category(RuleCategory::Business)
            .for_transactions(["835"])
            .with_field_check(
                FieldCheck::new(
                    "claims[*].total_charge",
                    FieldCheckKind::Range {
                        min: Some(0.0),
                        max: Some(999_999_999.99),
                    },
                )
                .with_message("claim charge is outside the representable range"),
            ),
        Rule::new("ENH_835_UNITS_RANGE", Severity::Warning)
            .in_category(RuleCategory::Business)
            .for_transactions(["835"])
            .with_field_check(
                FieldCheck::new(
                    "claims[*].services[*].units",
                    FieldCheckKind::Range {
                        min: Some(0.0),
                        max: Some(9999.0),
                    },
                )
                .with_message("service units are outside the plausible range"),
            ),
        Rule::new("ENH_835_PAYMENT_METHOD", Severity::Error)
            .in_category(RuleCategory::Format)
            .for_transactions(["835"])
            .with_field_check(
                FieldCheck::new(
                    "financial_information.payment_method",
                    FieldCheckKind::Enum {
                        values: vec![
                            "ACH".into(),
                            "CHK".into(),
                            "WIR".into(),
                            "NON".into(),
                        ],
                    },
                )
                .with_message("payment method is not an accepted code"),
            ),
        Rule::new("ENH_835_CLAIM_BALANCE", Severity::Info)
            .in_category(RuleCategory::Business)
            .describe("paid + patient responsibility + adjustments should equal the charge")
            .for_transactions(["835"])
            .with_cross_check(CrossCheck::CalculationCheck {
                operation: CalcOperation::Sum,
                operands: vec![
                    "claims[*].total_paid".into(),
                    "claims[*].patient_responsibility".into(),
                    "claims[*].adjustments[*].amount".into(),
                ],
                result_field: "claims[*].total_charge".into(),
                tolerance: 0.01,
            }),
        Rule::new("835_HIGH_VALUE_TRANSACTION", Severity::Info)
            .in_category(RuleCategory::Business)
            .with_message("high-value payment {value} may warrant review")
            .for_transactions(["835"])
            .when(Condition::comparing(
                "financial_information.total_paid",
                Operator::Gt,
                json!(100_000),
            )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for set in [
            RuleSet::Basic,
            RuleSet::Business,
            RuleSet::Hipaa,
            RuleSet::HipaaAdvanced,
            RuleSet::EnhancedBusiness,
            RuleSet::Comprehensive,
        ] {
            assert_eq!(RuleSet::from_name(set.name()), Some(set));
        }
        assert_eq!(RuleSet::from_name("all"), Some(RuleSet::Comprehensive));
        assert_eq!(RuleSet::from_name("nope"), None);
    }

    #[test]
    fn every_set_builds_a_nonempty_registry() {
        for set in [
            RuleSet::Basic,
            RuleSet::Business,
            RuleSet::Hipaa,
            RuleSet::HipaaAdvanced,
            RuleSet::EnhancedBusiness,
            RuleSet::Comprehensive,
        ] {
            assert!(!set.registry().is_empty(), "{} is empty", set.name());
        }
    }

    #[test]
    fn comprehensive_is_a_deduplicated_union() {
        let comprehensive = RuleSet::Comprehensive.registry();
        let parts = RuleSet::Basic.registry().len()
            + RuleSet::Business.registry().len()
            + RuleSet::HipaaAdvanced.registry().len()
            + RuleSet::EnhancedBusiness.registry().len();
        // Nothing overlaps today, so the union is exactly the parts.
        assert_eq!(comprehensive.len(), parts);

        let mut seen = std::collections::HashSet::new();
        for rule in comprehensive.rules() {
            assert!(seen.insert(rule.id.clone()), "duplicate id {}", rule.id);
        }
    }

    #[test]
    fn hipaa_advanced_includes_hipaa() {
        let advanced = RuleSet::HipaaAdvanced.registry();
        assert!(advanced.rules().iter().any(|r| r.id == "HIPAA_PAYEE_NPI"));
        assert!(advanced
            .rules()
            .iter()
            .any(|r| r.id == "HIPAA_PAYEE_IDENTIFICATION"));
        assert_eq!(advanced.document_rules().len(), 2);
    }
}
