//! Rule registry and evaluation engine.
//!
//! The registry is built once and treated as immutable during evaluation;
//! multiple threads may evaluate distinct documents against a shared
//! registry. Rules fire in registration order, wildcard expansions in
//! ascending index order, so the diagnostic stream is a deterministic
//! function of (document, rule set, registration order).

use crate::path::FieldPath;
use crate::rule::{Condition, Rule};
use crate::validators::{apply_cross_check, apply_field_check};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tracing::{debug, trace};
use x12_ast::{Diagnostic, DiagnosticCollector, EdiDocument, Severity};

/// Transaction-set codes with a built-in projector.
const RECOGNIZED_CODES: [&str; 6] = ["835", "837", "270", "271", "276", "277"];

/// Whole-document structural checks that cannot be phrased as field paths.
#[derive(Debug, Clone)]
pub struct DocumentRule {
    /// Stable identifier, doubling as the error code.
    pub id: String,
    pub severity: Severity,
    pub kind: DocumentRuleKind,
}

/// The closed set of document-rule kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentRuleKind {
    /// ISA13 unique across the run, GS06 within its interchange, ST02
    /// within its group.
    ControlNumberUniqueness,
    /// Every transaction-set code belongs to the recognized set.
    RecognizedTransactionCodes,
}

/// Ordered rule collection, deduplicated by rule id (first wins).
#[derive(Debug, Default)]
pub struct RuleRegistry {
    rules: Vec<Rule>,
    document_rules: Vec<DocumentRule>,
    ids: HashSet<String>,
}

impl RuleRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule. Returns false (and drops it) when the id is taken.
    pub fn add(&mut self, rule: Rule) -> bool {
        if !self.ids.insert(rule.id.clone()) {
            debug!(id = %rule.id, "duplicate rule id dropped");
            return false;
        }
        self.rules.push(rule);
        true
    }

    /// Register a document-level rule, same id semantics.
    pub fn add_document_rule(&mut self, rule: DocumentRule) -> bool {
        if !self.ids.insert(rule.id.clone()) {
            debug!(id = %rule.id, "duplicate document rule id dropped");
            return false;
        }
        self.document_rules.push(rule);
        true
    }

    /// Register every rule from another registry, preserving order.
    pub fn merge(&mut self, other: RuleRegistry) {
        for rule in other.document_rules {
            self.add_document_rule(rule);
        }
        for rule in other.rules {
            self.add(rule);
        }
    }

    /// Field rules in registration order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Document rules in registration order.
    pub fn document_rules(&self) -> &[DocumentRule] {
        &self.document_rules
    }

    /// Total registered rules, document rules included.
    pub fn len(&self) -> usize {
        self.rules.len() + self.document_rules.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Error-handling policy for a validation run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorPolicy {
    /// Stop evaluating once this many errors exist; 0 means unlimited.
    pub max_errors: usize,
    /// Stop evaluating at the first error-severity diagnostic.
    pub fail_fast: bool,
}

/// The rule evaluation engine.
pub struct RuleEngine {
    registry: RuleRegistry,
    policy: ErrorPolicy,
    budget: Option<Duration>,
}

impl RuleEngine {
    /// Engine over a registry with the default policy.
    pub fn new(registry: RuleRegistry) -> Self {
        Self {
            registry,
            policy: ErrorPolicy::default(),
            budget: None,
        }
    }

    /// Set the error policy.
    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set a wall-clock budget; when exceeded, evaluation stops with a
    /// `RULES_TIMEOUT` info entry and the parsed document is still usable.
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = Some(budget);
        self
    }

    /// The registry backing this engine.
    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Number of rules an evaluation applies (enabled rules only).
    pub fn rules_applied(&self) -> usize {
        self.registry.document_rules.len()
            + self.registry.rules.iter().filter(|r| r.enabled).count()
    }

    /// Evaluate every registered rule against the document.
    ///
    /// Document-level rules run first, then per-transaction rules in
    /// registration order. Transactions retained as raw segments are
    /// skipped entirely: no rule of another transaction's set fires
    /// against them.
    pub fn evaluate(&self, document: &EdiDocument, diagnostics: &mut DiagnosticCollector) {
        let started = Instant::now();
        if self.stopped(diagnostics) {
            debug!("rule evaluation suppressed by error policy");
            return;
        }

        for rule in &self.registry.document_rules {
            match rule.kind {
                DocumentRuleKind::ControlNumberUniqueness => {
                    self.check_control_numbers(rule, document, diagnostics);
                }
                DocumentRuleKind::RecognizedTransactionCodes => {
                    self.check_recognized_codes(rule, document, diagnostics);
                }
            }
            if self.stopped(diagnostics) {
                return;
            }
        }

        for (i, interchange) in document.interchanges.iter().enumerate() {
            for (j, group) in interchange.functional_groups.iter().enumerate() {
                for (k, tx) in group.transactions.iter().enumerate() {
                    if tx.data.is_raw() {
                        continue;
                    }
                    let prefix =
                        format!("interchanges[{i}].functional_groups[{j}].transactions[{k}]");
                    let tree = match serde_json::to_value(&tx.data) {
                        Ok(tree) => tree,
                        Err(error) => {
                            debug!(%error, "transaction tree failed to serialize");
                            continue;
                        }
                    };
                    for rule in &self.registry.rules {
                        if !rule.enabled || !rule.applies_to(tx.code()) {
                            continue;
                        }
                        if let Some(budget) = self.budget {
                            if started.elapsed() > budget {
                                diagnostics.push(Diagnostic::info(
                                    "RULES_TIMEOUT",
                                    "rule evaluation exceeded its wall-clock budget",
                                ));
                                return;
                            }
                        }
                        trace!(rule = %rule.id, %prefix, "evaluating rule");
                        self.apply_rule(rule, &tree, &prefix, diagnostics);
                        if self.stopped(diagnostics) {
                            return;
                        }
                    }
                }
            }
        }
    }

    fn apply_rule(
        &self,
        rule: &Rule,
        tree: &Value,
        prefix: &str,
        diagnostics: &mut DiagnosticCollector,
    ) {
        if !rule.conditions.is_empty() {
            for bindings in condition_bindings(&rule.conditions, tree) {
                let mut anchor = None;
                let mut all_hold = true;
                for condition in &rule.conditions {
                    let outcome = condition.evaluate(tree, &bindings);
                    if !outcome.holds {
                        all_hold = false;
                        break;
                    }
                    if anchor.is_none() {
                        anchor = Some(outcome);
                    }
                }
                if all_hold {
                    let anchor = anchor.expect("conditions are non-empty");
                    let message = rule.render_message(&anchor.path, anchor.value.as_deref());
                    let mut diagnostic = Diagnostic::new(rule.severity, rule.code(), message)
                        .with_path(format!("{prefix}.{}", anchor.path))
                        .with_field_path(anchor.path)
                        .with_rule(rule.id.clone());
                    if let Some(value) = anchor.value {
                        diagnostic = diagnostic.with_value(value);
                    }
                    diagnostics.push(diagnostic);
                }
                if self.stopped(diagnostics) {
                    return;
                }
            }
        }

        for check in &rule.field_checks {
            apply_field_check(rule, check, tree, prefix, diagnostics);
            if self.stopped(diagnostics) {
                return;
            }
        }
        for check in &rule.cross_checks {
            apply_cross_check(rule, check, tree, prefix, diagnostics);
            if self.stopped(diagnostics) {
                return;
            }
        }
    }

    fn check_control_numbers(
        &self,
        rule: &DocumentRule,
        document: &EdiDocument,
        diagnostics: &mut DiagnosticCollector,
    ) {
        let mut interchange_numbers: HashMap<&str, usize> = HashMap::new();
        for (i, interchange) in document.interchanges.iter().enumerate() {
            let number = interchange.header.control_number.as_str();
            if !number.is_empty() {
                if let Some(first) = interchange_numbers.get(number) {
                    diagnostics.push(duplicate_control(
                        rule,
                        format!("interchanges[{i}]"),
                        "interchange",
                        number,
                        &format!("interchanges[{first}]"),
                    ));
                } else {
                    interchange_numbers.insert(number, i);
                }
            }

            let mut group_numbers: HashMap<&str, usize> = HashMap::new();
            for (j, group) in interchange.functional_groups.iter().enumerate() {
                let number = group.header.control_number.as_str();
                if !number.is_empty() {
                    if let Some(first) = group_numbers.get(number) {
                        diagnostics.push(duplicate_control(
                            rule,
                            format!("interchanges[{i}].functional_groups[{j}]"),
                            "functional group",
                            number,
                            &format!("interchanges[{i}].functional_groups[{first}]"),
                        ));
                    } else {
                        group_numbers.insert(number, j);
                    }
                }

                let mut transaction_numbers: HashMap<&str, usize> = HashMap::new();
                for (k, tx) in group.transactions.iter().enumerate() {
                    let number = tx.header.control_number.as_str();
                    if number.is_empty() {
                        continue;
                    }
                    if let Some(first) = transaction_numbers.get(number) {
                        diagnostics.push(duplicate_control(
                            rule,
                            format!(
                                "interchanges[{i}].functional_groups[{j}].transactions[{k}]"
                            ),
                            "transaction set",
                            number,
                            &format!(
                                "interchanges[{i}].functional_groups[{j}].transactions[{first}]"
                            ),
                        ));
                    } else {
                        transaction_numbers.insert(number, k);
                    }
                }
            }
        }
    }

    fn check_recognized_codes(
        &self,
        rule: &DocumentRule,
        document: &EdiDocument,
        diagnostics: &mut DiagnosticCollector,
    ) {
        for (i, interchange) in document.interchanges.iter().enumerate() {
            for (j, group) in interchange.functional_groups.iter().enumerate() {
                for (k, tx) in group.transactions.iter().enumerate() {
                    let code = tx.code();
                    if !RECOGNIZED_CODES.contains(&code) {
                        diagnostics.push(
                            Diagnostic::new(
                                rule.severity,
                                rule.id.clone(),
                                format!("transaction-set code '{code}' is not recognized"),
                            )
                            .with_path(format!(
                                "interchanges[{i}].functional_groups[{j}].transactions[{k}]"
                            ))
                            .with_value(code.to_string())
                            .with_rule(rule.id.clone()),
                        );
                    }
                }
            }
        }
    }

    fn stopped(&self, diagnostics: &DiagnosticCollector) -> bool {
        let errors = diagnostics.error_count();
        if self.policy.fail_fast && errors > 0 {
            return true;
        }
        self.policy.max_errors > 0 && errors >= self.policy.max_errors
    }
}

fn duplicate_control(
    rule: &DocumentRule,
    path: String,
    level: &str,
    number: &str,
    first_path: &str,
) -> Diagnostic {
    Diagnostic::new(
        rule.severity,
        rule.id.clone(),
        format!("{level} control number '{number}' is reused within the run"),
    )
    .with_path(path)
    .with_value(number.to_string())
    .with_rule(rule.id.clone())
    .with_context("first_seen", first_path.to_string())
}

/// Wildcard index bindings for a condition list: the first wildcard-bearing
/// condition defines them, in ascending order; wildcard-free rules get one
/// empty binding.
fn condition_bindings(conditions: &[Condition], tree: &Value) -> Vec<Vec<usize>> {
    for condition in conditions {
        let Ok(path) = FieldPath::parse(&condition.field) else {
            continue;
        };
        if !path.has_wildcard() {
            continue;
        }
        let mut seen: Vec<Vec<usize>> = Vec::new();
        for m in path.resolve(tree) {
            if !seen.contains(&m.bindings) {
                seen.push(m.bindings);
            }
        }
        return seen;
    }
    vec![Vec::new()]
}
