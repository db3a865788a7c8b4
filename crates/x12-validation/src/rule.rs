//! Declarative rule model.
//!
//! A rule fires when ALL of its conditions evaluate true against the
//! semantic tree; firing appends one diagnostic per unique matching path,
//! carrying the rule's severity, code, and interpolated message.

use crate::path::{as_number, value_to_string, FieldPath};
use crate::validators::{CrossCheck, FieldCheck};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::debug;
use x12_ast::Severity;

/// The closed comparison-operator set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Exists,
    NotExists,
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    In,
    NotIn,
    Matches,
    NotMatches,
}

/// Rule grouping for reporting and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleCategory {
    Structural,
    Business,
    Hipaa,
    Format,
    #[default]
    Custom,
}

/// One field comparison; conditions in a rule AND together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    /// Dotted path into the semantic tree; `[*]` multiplies evaluation.
    pub field: String,
    pub operator: Operator,
    /// Comparison literal; a list for `in`/`not_in`, a pattern for
    /// `matches`/`not_matches`, absent for the existence operators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Optional per-condition annotation kept for rule authors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Condition {
    /// Condition without a literal (existence checks).
    pub fn new(field: impl Into<String>, operator: Operator) -> Self {
        Self {
            field: field.into(),
            operator,
            value: None,
            message: None,
        }
    }

    /// Condition comparing against a literal.
    pub fn comparing(field: impl Into<String>, operator: Operator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value: Some(value),
            message: None,
        }
    }

    /// Evaluate under the given wildcard bindings.
    ///
    /// Numeric operators coerce strings that parse as decimals; otherwise
    /// the comparison is false and records nothing. Missing intermediate
    /// paths are "absent": the existence operators resolve accordingly and
    /// everything else short-circuits to false.
    pub(crate) fn evaluate(&self, tree: &Value, bindings: &[usize]) -> ConditionOutcome {
        let path = match FieldPath::parse(&self.field) {
            Ok(path) => path.substitute(bindings),
            Err(error) => {
                debug!(field = %self.field, %error, "unparseable condition path");
                return ConditionOutcome {
                    holds: false,
                    path: self.field.clone(),
                    value: None,
                };
            }
        };

        let matches = path.resolve(tree);
        if matches.is_empty() {
            // A wildcard walked an absent list: nothing to test.
            return ConditionOutcome {
                holds: self.operator == Operator::NotExists,
                path: path.raw().to_string(),
                value: None,
            };
        }

        // Any-match semantics across residual wildcard expansion.
        for m in &matches {
            if self.holds_for(m.value) {
                return ConditionOutcome {
                    holds: true,
                    path: m.path.clone(),
                    value: m.value.map(value_to_string),
                };
            }
        }
        ConditionOutcome {
            holds: false,
            path: matches[0].path.clone(),
            value: matches[0].value.map(value_to_string),
        }
    }

    fn holds_for(&self, value: Option<&Value>) -> bool {
        match self.operator {
            Operator::Exists => return value.is_some(),
            Operator::NotExists => return value.is_none(),
            _ => {}
        }
        let Some(actual) = value else {
            return false;
        };
        let Some(expected) = self.value.as_ref() else {
            return false;
        };

        match self.operator {
            Operator::Eq => compare_eq(actual, expected),
            Operator::Ne => !compare_eq(actual, expected),
            Operator::Gt => compare_numeric(actual, expected, |a, b| a > b),
            Operator::Lt => compare_numeric(actual, expected, |a, b| a < b),
            Operator::Gte => compare_numeric(actual, expected, |a, b| a >= b),
            Operator::Lte => compare_numeric(actual, expected, |a, b| a <= b),
            Operator::In => in_list(actual, expected),
            Operator::NotIn => !in_list(actual, expected),
            Operator::Matches => regex_match(actual, expected),
            Operator::NotMatches => {
                // An uncompilable pattern is false for both polarities.
                pattern_of(expected).is_some_and(|re| !re.is_match(&value_to_string(actual)))
            }
            Operator::Exists | Operator::NotExists => unreachable!("handled above"),
        }
    }
}

/// Result of one condition evaluation: truth, the concrete path tested,
/// and the value found there.
pub(crate) struct ConditionOutcome {
    pub holds: bool,
    pub path: String,
    pub value: Option<String>,
}

fn compare_eq(actual: &Value, expected: &Value) -> bool {
    if let (Some(a), Some(b)) = (as_number(actual), as_number(expected)) {
        return a == b;
    }
    value_to_string(actual) == value_to_string(expected)
}

fn compare_numeric(actual: &Value, expected: &Value, cmp: fn(f64, f64) -> bool) -> bool {
    match (as_number(actual), as_number(expected)) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

fn in_list(actual: &Value, expected: &Value) -> bool {
    let Some(list) = expected.as_array() else {
        return false;
    };
    list.iter().any(|candidate| compare_eq(actual, candidate))
}

fn pattern_of(expected: &Value) -> Option<Regex> {
    let pattern = expected.as_str()?;
    Regex::new(pattern).ok()
}

fn regex_match(actual: &Value, expected: &Value) -> bool {
    pattern_of(expected).is_some_and(|re| re.is_match(&value_to_string(actual)))
}

fn default_enabled() -> bool {
    true
}

/// A declarative validation rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// Stable identifier; also the default error code.
    pub id: String,
    #[serde(default)]
    pub description: String,
    pub severity: Severity,
    /// Transaction-set codes this rule applies to; empty means all.
    #[serde(default)]
    pub transaction_types: BTreeSet<String>,
    #[serde(default)]
    pub category: RuleCategory,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Ordered conditions, implicit AND.
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Error code override; defaults from the id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Diagnostic message; `{value}` and `{field}` interpolate.
    #[serde(default)]
    pub message: String,
    /// Field-level validators evaluated alongside the conditions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub field_checks: Vec<FieldCheck>,
    /// Cross-field assertions evaluated alongside the conditions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cross_checks: Vec<CrossCheck>,
}

impl Rule {
    /// Minimal rule; flesh out with the builder methods.
    pub fn new(id: impl Into<String>, severity: Severity) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            severity,
            transaction_types: BTreeSet::new(),
            category: RuleCategory::default(),
            enabled: true,
            conditions: Vec::new(),
            error_code: None,
            message: String::new(),
            field_checks: Vec::new(),
            cross_checks: Vec::new(),
        }
    }

    /// Set the description.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the diagnostic message template.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Set the category.
    pub fn in_category(mut self, category: RuleCategory) -> Self {
        self.category = category;
        self
    }

    /// Restrict to the given transaction-set codes.
    pub fn for_transactions<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.transaction_types = codes.into_iter().map(Into::into).collect();
        self
    }

    /// Append a condition.
    pub fn when(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Append a field-level validator.
    pub fn with_field_check(mut self, check: FieldCheck) -> Self {
        self.field_checks.push(check);
        self
    }

    /// Append a cross-field assertion.
    pub fn with_cross_check(mut self, check: CrossCheck) -> Self {
        self.cross_checks.push(check);
        self
    }

    /// The error code: the explicit override or the rule id.
    pub fn code(&self) -> &str {
        self.error_code.as_deref().unwrap_or(&self.id)
    }

    /// Whether this rule applies to a transaction-set code.
    pub fn applies_to(&self, code: &str) -> bool {
        self.transaction_types.is_empty() || self.transaction_types.contains(code)
    }

    /// Interpolate `{value}` and `{field}` into the message template.
    pub(crate) fn render_message(&self, field: &str, value: Option<&str>) -> String {
        let template = if self.message.is_empty() {
            if self.description.is_empty() {
                return format!("rule {} matched", self.id);
            }
            &self.description
        } else {
            &self.message
        };
        template
            .replace("{value}", value.unwrap_or(""))
            .replace("{field}", field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree() -> Value {
        json!({
            "financial_information": { "total_paid": 1000.0, "payment_method": "ACH" },
            "claims": [
                { "total_paid": 600.0, "status_code": "1" },
                { "total_paid": -5.0, "status_code": "4" }
            ]
        })
    }

    #[test]
    fn numeric_comparison_coerces_strings() {
        let tree = tree();
        let gt = Condition::comparing("claims[0].status_code", Operator::Gt, json!(0));
        assert!(gt.evaluate(&tree, &[]).holds);

        let against_string =
            Condition::comparing("financial_information.total_paid", Operator::Gt, json!("500"));
        assert!(against_string.evaluate(&tree, &[]).holds);
    }

    #[test]
    fn non_numeric_comparison_is_false_not_an_error() {
        let tree = tree();
        let cond =
            Condition::comparing("financial_information.payment_method", Operator::Gt, json!(5));
        assert!(!cond.evaluate(&tree, &[]).holds);
    }

    #[test]
    fn existence_respects_absent_paths() {
        let tree = tree();
        assert!(Condition::new("payer", Operator::NotExists)
            .evaluate(&tree, &[])
            .holds);
        assert!(!Condition::new("payer.name", Operator::Exists)
            .evaluate(&tree, &[])
            .holds);
        assert!(Condition::new("claims[0]", Operator::Exists)
            .evaluate(&tree, &[])
            .holds);
    }

    #[test]
    fn bindings_pin_wildcard_conditions() {
        let tree = tree();
        let cond = Condition::comparing("claims[*].total_paid", Operator::Lt, json!(0));
        assert!(!cond.evaluate(&tree, &[0]).holds);
        let outcome = cond.evaluate(&tree, &[1]);
        assert!(outcome.holds);
        assert_eq!(outcome.path, "claims[1].total_paid");
        assert_eq!(outcome.value.as_deref(), Some("-5.0"));
    }

    #[test]
    fn in_and_matches_operators() {
        let tree = tree();
        let inside = Condition::comparing(
            "financial_information.payment_method",
            Operator::In,
            json!(["ACH", "CHK"]),
        );
        assert!(inside.evaluate(&tree, &[]).holds);

        let outside = Condition::comparing(
            "financial_information.payment_method",
            Operator::NotIn,
            json!(["CHK", "WIR"]),
        );
        assert!(outside.evaluate(&tree, &[]).holds);

        let pattern = Condition::comparing(
            "financial_information.payment_method",
            Operator::Matches,
            json!("^[A-Z]{3}$"),
        );
        assert!(pattern.evaluate(&tree, &[]).holds);

        let bad_pattern = Condition::comparing(
            "financial_information.payment_method",
            Operator::Matches,
            json!("["),
        );
        assert!(!bad_pattern.evaluate(&tree, &[]).holds);
    }

    #[test]
    fn message_interpolation() {
        let rule = Rule::new("HIGH_VALUE", Severity::Info)
            .with_message("High-value payment {value} at {field}");
        assert_eq!(
            rule.render_message("financial_information.total_paid", Some("1000.0")),
            "High-value payment 1000.0 at financial_information.total_paid"
        );
    }

    #[test]
    fn code_defaults_from_id() {
        let mut rule = Rule::new("MY_RULE", Severity::Warning);
        assert_eq!(rule.code(), "MY_RULE");
        rule.error_code = Some("OTHER_CODE".into());
        assert_eq!(rule.code(), "OTHER_CODE");
    }

    #[test]
    fn applies_to_empty_set_means_all() {
        let any = Rule::new("R", Severity::Info);
        assert!(any.applies_to("835"));
        let only_835 = Rule::new("R", Severity::Info).for_transactions(["835"]);
        assert!(only_835.applies_to("835"));
        assert!(!only_835.applies_to("837"));
    }

    #[test]
    fn rule_deserializes_from_yaml() {
        let yaml = r#"
id: HIGH_VALUE
severity: info
transaction_types: ["835"]
conditions:
  - field: financial_information.total_paid
    operator: gt
    value: 500
message: "High-value payment {value}"
"#;
        let rule: Rule = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(rule.id, "HIGH_VALUE");
        assert!(rule.enabled);
        assert_eq!(rule.conditions.len(), 1);
        assert_eq!(rule.conditions[0].operator, Operator::Gt);
    }
}
