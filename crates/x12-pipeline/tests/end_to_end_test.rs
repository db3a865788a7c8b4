//! End-to-end scenarios: bytes in, document and report out.

use std::io::Write;
use x12_pipeline::{Pipeline, PipelineConfig, RuleSet, Severity};

fn isa(control: &str) -> String {
    format!(
        "ISA*00*          *00*          *ZZ*{:<15}*ZZ*{:<15}*240101*1200*^*00501*{}*0*P*:~",
        "SENDER", "RECEIVER", control
    )
}

fn envelope_835(body: &str, declared_count: usize, se_control: &str) -> String {
    format!(
        "{}GS*HP*SENDER*RECEIVER*20240101*1200*1*X*005010X221A1~ST*835*0001~{}SE*{}*{}~GE*1*1~IEA*1*000000001~",
        isa("000000001"),
        body,
        declared_count,
        se_control,
    )
}

const S1_BODY: &str = "BPR*I*1000.00*C*ACH*CCP*01*123456789*DA*987654321*1500000000**01*123456789*DA*987654321*20240101~\
TRN*1*TRACE123*1500000000~\
N1*PR*PAYER~\
N1*PE*PAYEE*XX*1234567893~\
CLP*CLM001*1*1200.00*1000.00*200.00*MC*PAYERCLAIM~";

#[test]
fn s1_minimal_835_is_valid_with_one_paid_claim() {
    let input = envelope_835(S1_BODY, 7, "0001");
    let outcome = Pipeline::new().process_str(&input).unwrap();

    assert!(outcome.report.is_valid, "{:?}", outcome.report.errors);
    assert_eq!(outcome.report.summary.errors, 0);

    assert_eq!(outcome.document.interchanges.len(), 1);
    let interchange = &outcome.document.interchanges[0];
    assert_eq!(interchange.functional_groups.len(), 1);
    let transactions = &interchange.functional_groups[0].transactions;
    assert_eq!(transactions.len(), 1);

    let remittance = transactions[0].data.as_remittance().unwrap();
    let financial = remittance.financial_information.as_ref().unwrap();
    assert_eq!(financial.total_paid, 1000.0);
    assert_eq!(financial.payment_method, "ACH");

    assert_eq!(remittance.claims.len(), 1);
    let claim = &remittance.claims[0];
    assert_eq!(claim.total_charge, 1200.0);
    assert_eq!(claim.total_paid, 1000.0);
    assert_eq!(claim.patient_responsibility, 200.0);
}

#[test]
fn s2_wrong_se_count_still_parses_with_one_count_diagnostic() {
    let input = envelope_835(S1_BODY, 99, "0001");
    let outcome = Pipeline::new().process_str(&input).unwrap();

    // The document is still fully projected.
    let transactions = &outcome.document.interchanges[0].functional_groups[0].transactions;
    assert!(transactions[0].data.as_remittance().is_some());

    let findings = outcome.report.find_all("SE01_COUNT_INVALID");
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].context["declared"], "99");
    assert_eq!(findings[0].context["actual"], "7");
    assert!(!outcome.report.is_valid);
}

#[test]
fn s3_mismatched_control_numbers_at_every_level() {
    let input = format!(
        "{}GS*HP*SENDER*RECEIVER*20240101*1200*1*X*005010X221A1~ST*835*0001~{}SE*7*XYZ999~GE*1*999999~IEA*1*000000099~",
        isa("000000001"),
        S1_BODY,
    );
    let outcome = Pipeline::new().process_str(&input).unwrap();

    assert!(outcome.report.find("ST02_SE02_MISMATCH").is_some());
    assert!(outcome.report.find("GS06_GE02_MISMATCH").is_some());
    assert!(outcome.report.find("ISA13_IEA02_MISMATCH").is_some());
    assert!(!outcome.report.is_valid);
}

#[test]
fn s4_plb_shifts_the_balance_and_warns_with_context() {
    let body = format!("{S1_BODY}PLB*1234567893*20240101*CV*-5.00~");
    let input = envelope_835(&body, 8, "0001");
    let outcome = Pipeline::new().process_str(&input).unwrap();

    // A warning, not an error: the run is otherwise clean.
    assert!(outcome.report.is_valid, "{:?}", outcome.report.errors);
    let imbalance = outcome.report.find("835_FINANCIAL_IMBALANCE").unwrap();
    assert_eq!(imbalance.severity, Severity::Warning);
    assert_eq!(imbalance.context["bpr_total"], "1000.00");
    assert_eq!(imbalance.context["claims_total"], "1000.00");
    assert_eq!(imbalance.context["plb_total"], "-5.00");
    assert_eq!(imbalance.context["delta"], "5.00");
    assert_eq!(imbalance.context["tolerance"], "0.01");
}

#[test]
fn s5_composite_svc_with_modifier() {
    let body = format!("{S1_BODY}SVC*HC:99213:25*100.00*75.00**1~");
    let input = envelope_835(&body, 8, "0001");
    let outcome = Pipeline::new().process_str(&input).unwrap();

    let transactions = &outcome.document.interchanges[0].functional_groups[0].transactions;
    let remittance = transactions[0].data.as_remittance().unwrap();
    let service = &remittance.claims[0].services[0];
    assert_eq!(service.procedure_code, "99213");
    assert_eq!(service.modifiers, vec!["25".to_string()]);
    assert_eq!(service.charge, 100.0);
    assert_eq!(service.paid, 75.0);
    assert_eq!(service.units, 1.0);
}

#[test]
fn s6_custom_yaml_rule_fires() {
    let yaml = r#"
version: "1.0"
transaction_set: "835"
rules:
  - id: HIGH_VALUE
    severity: info
    message: "High-value payment {value}"
    conditions:
      - field: financial_information.total_paid
        operator: gt
        value: 500
"#;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();

    let pipeline = Pipeline::builder(PipelineConfig::default())
        .with_rule_file(file.path())
        .unwrap()
        .build();
    let outcome = pipeline.process_str(&envelope_835(S1_BODY, 7, "0001")).unwrap();

    assert!(outcome.report.is_valid);
    let fired = outcome.report.find("HIGH_VALUE").unwrap();
    assert_eq!(fired.severity, Severity::Info);
    assert_eq!(fired.value.as_deref(), Some("1000.0"));
    assert_eq!(fired.message, "High-value payment 1000.0");
    assert_eq!(
        fired.field_path.as_deref(),
        Some("financial_information.total_paid")
    );
}

#[test]
fn zero_length_document_is_an_invalid_header() {
    assert!(Pipeline::new().process(b"").is_err());
}

#[test]
fn isa_iea_only_yields_an_empty_interchange() {
    let input = format!("{}IEA*0*000000001~", isa("000000001"));
    let outcome = Pipeline::new().process_str(&input).unwrap();
    assert!(outcome.report.is_valid, "{:?}", outcome.report.errors);
    assert!(outcome.document.interchanges[0].functional_groups.is_empty());
}

#[test]
fn comprehensive_set_stays_quiet_on_a_clean_remittance() {
    let pipeline = Pipeline::with_config(PipelineConfig {
        rule_sets: vec![RuleSet::Comprehensive],
        ..Default::default()
    });
    let outcome = pipeline.process_str(&envelope_835(S1_BODY, 7, "0001")).unwrap();
    assert!(outcome.report.is_valid, "{:?}", outcome.report.errors);
    assert!(outcome.report.summary.rules_applied > 15);
    // The claim balances: 1000 paid + 200 patient responsibility = 1200.
    assert!(outcome.report.find("ENH_835_CLAIM_BALANCE").is_none());
}

#[test]
fn comprehensive_set_flags_a_broken_remittance() {
    let body = "BPR*I*500.00*C*EFT************20240101~\
                TRN*1*T1~\
                N1*PR*PAYER~\
                N1*PE*PAYEE*XX*1234567890~\
                CLP*C1*1*100.00*250.00*-10.00~";
    let input = envelope_835(body, 7, "0001");
    let pipeline = Pipeline::with_config(PipelineConfig {
        rule_sets: vec![RuleSet::Comprehensive],
        ..Default::default()
    });
    let outcome = pipeline.process_str(&input).unwrap();

    assert!(!outcome.report.is_valid);
    // Bad payment-method code, overpayment, negative patient share, bad NPI
    // checksum, and the projector's own balance warning.
    assert!(outcome.report.find("835_INVALID_PAYMENT_METHOD").is_some());
    assert!(outcome.report.find("835_CLAIM_OVERPAYMENT").is_some());
    assert!(outcome
        .report
        .find("835_NEGATIVE_PATIENT_RESPONSIBILITY")
        .is_some());
    assert!(outcome.report.find("FIELD_NPI_FORMAT").is_some());
    assert!(outcome.report.find("835_FINANCIAL_IMBALANCE").is_some());
}

#[test]
fn report_serializes_to_the_documented_shape() {
    let input = envelope_835(S1_BODY, 99, "0001");
    let outcome = Pipeline::new().process_str(&input).unwrap();
    let json = serde_json::to_value(&outcome.report).unwrap();

    assert_eq!(json["is_valid"], false);
    assert!(json["summary"]["errors"].as_u64().unwrap() >= 1);
    assert!(json["summary"]["rules_applied"].as_u64().is_some());
    let error = &json["errors"][0];
    assert_eq!(error["code"], "SE01_COUNT_INVALID");
    assert_eq!(error["severity"], "error");
    assert!(error["path"]
        .as_str()
        .unwrap()
        .starts_with("interchanges[0]"));
}

#[test]
fn processing_is_idempotent() {
    let input = envelope_835(S1_BODY, 7, "0001");
    let pipeline = Pipeline::new();
    let first = pipeline.process_str(&input).unwrap();
    let second = pipeline.process_str(&input).unwrap();

    assert_eq!(
        serde_json::to_string(&first.document).unwrap(),
        serde_json::to_string(&second.document).unwrap()
    );
    assert_eq!(
        serde_json::to_string(&first.report).unwrap(),
        serde_json::to_string(&second.report).unwrap()
    );
}

#[test]
fn fail_fast_returns_structure_without_rule_findings() {
    let input = envelope_835(S1_BODY, 99, "0001");
    let pipeline = Pipeline::with_config(PipelineConfig {
        rule_sets: vec![RuleSet::Comprehensive],
        policy: x12_pipeline::ErrorPolicy {
            fail_fast: true,
            max_errors: 0,
        },
        ..Default::default()
    });
    let outcome = pipeline.process_str(&input).unwrap();

    // The structural error is present and the parsed document intact.
    assert!(outcome.report.find("SE01_COUNT_INVALID").is_some());
    assert_eq!(outcome.document.transaction_count(), 1);
    // No rule-driven findings were appended after it.
    assert!(outcome
        .report
        .errors
        .iter()
        .chain(&outcome.report.warnings)
        .chain(&outcome.report.info)
        .all(|d| d.rule_id.is_none()));
}
