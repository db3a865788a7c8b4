//! Field-level and cross-field validators.
//!
//! A closed set of validator kinds, extended by adding a variant rather
//! than by subclassing. Field checks pass on absent values unless the kind
//! is a required one; cross checks are assertions that record a diagnostic
//! when the asserted relationship does not hold.

use crate::path::{as_number, value_to_string, FieldPath};
use crate::rule::{Condition, Operator, Rule};
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use x12_ast::{Diagnostic, DiagnosticCollector, Severity};

/// A field validator bound to a path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldCheck {
    pub field: String,
    #[serde(flatten)]
    pub kind: FieldCheckKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Severity override; the rule's severity otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
}

impl FieldCheck {
    /// Bind a validator kind to a field path.
    pub fn new(field: impl Into<String>, kind: FieldCheckKind) -> Self {
        Self {
            field: field.into(),
            kind,
            message: None,
            severity: None,
        }
    }

    /// Set the failure message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Override the severity.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }
}

/// The closed set of field-validator kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldCheckKind {
    /// Decimal with at most two fractional digits, optionally bounded.
    CurrencyFormat {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    /// Date in the given chrono format, optionally bounded by ISO dates.
    DateFormat {
        #[serde(default = "default_date_format")]
        format: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<String>,
    },
    /// Ten digits with a valid 80840-prefixed Luhn check digit.
    NpiFormat,
    /// EIN or SSN, with or without dashes.
    TaxIdFormat,
    /// Numeric range.
    Range {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    /// Membership in a fixed value set.
    Enum { values: Vec<String> },
    /// Full-value regular-expression match.
    Regex { pattern: String },
    /// Present and non-empty.
    Required,
    /// Present and non-empty when another field satisfies a condition.
    ConditionalRequired {
        when: String,
        operator: Operator,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
    },
}

fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}

impl FieldCheckKind {
    /// Stable error code for this validator kind.
    pub fn code(&self) -> &'static str {
        match self {
            FieldCheckKind::CurrencyFormat { .. } => "FIELD_CURRENCY_FORMAT",
            FieldCheckKind::DateFormat { .. } => "FIELD_DATE_FORMAT",
            FieldCheckKind::NpiFormat => "FIELD_NPI_FORMAT",
            FieldCheckKind::TaxIdFormat => "FIELD_TAX_ID_FORMAT",
            FieldCheckKind::Range { .. } => "FIELD_RANGE",
            FieldCheckKind::Enum { .. } => "FIELD_ENUM",
            FieldCheckKind::Regex { .. } => "FIELD_REGEX",
            FieldCheckKind::Required => "FIELD_REQUIRED",
            FieldCheckKind::ConditionalRequired { .. } => "FIELD_CONDITIONAL_REQUIRED",
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            FieldCheckKind::CurrencyFormat { .. } => "is not a valid currency amount",
            FieldCheckKind::DateFormat { .. } => "is not a valid date",
            FieldCheckKind::NpiFormat => "is not a valid NPI",
            FieldCheckKind::TaxIdFormat => "is not a valid Tax ID",
            FieldCheckKind::Range { .. } => "is out of range",
            FieldCheckKind::Enum { .. } => "is not an allowed value",
            FieldCheckKind::Regex { .. } => "does not match the required pattern",
            FieldCheckKind::Required => "is required",
            FieldCheckKind::ConditionalRequired { .. } => "is conditionally required",
        }
    }

    fn passes(&self, value: Option<&Value>, tree: &Value, bindings: &[usize]) -> bool {
        match self {
            FieldCheckKind::Required => value.is_some_and(present),
            FieldCheckKind::ConditionalRequired {
                when,
                operator,
                value: expected,
            } => {
                let mut condition = Condition::new(when.clone(), *operator);
                condition.value = expected.clone();
                if condition.evaluate(tree, bindings).holds {
                    value.is_some_and(present)
                } else {
                    true
                }
            }
            _ => {
                // Format validators pass on absent values; `required`
                // composes separately.
                let Some(value) = value else {
                    return true;
                };
                self.passes_present(value)
            }
        }
    }

    fn passes_present(&self, value: &Value) -> bool {
        match self {
            FieldCheckKind::CurrencyFormat { min, max } => {
                let Some(amount) = as_number(value) else {
                    return false;
                };
                currency_precision_ok(value)
                    && min.map_or(true, |m| amount >= m)
                    && max.map_or(true, |m| amount <= m)
            }
            FieldCheckKind::DateFormat { format, min, max } => {
                let Some(date) = NaiveDate::parse_from_str(&value_to_string(value), format).ok()
                else {
                    return false;
                };
                let lower = min.as_deref().and_then(parse_iso);
                let upper = max.as_deref().and_then(parse_iso);
                lower.map_or(true, |m| date >= m) && upper.map_or(true, |m| date <= m)
            }
            FieldCheckKind::NpiFormat => npi_is_valid(&value_to_string(value)),
            FieldCheckKind::TaxIdFormat => tax_id_is_valid(&value_to_string(value)),
            FieldCheckKind::Range { min, max } => {
                let Some(number) = as_number(value) else {
                    return false;
                };
                min.map_or(true, |m| number >= m) && max.map_or(true, |m| number <= m)
            }
            FieldCheckKind::Enum { values } => values.contains(&value_to_string(value)),
            FieldCheckKind::Regex { pattern } => match Regex::new(pattern) {
                Ok(re) => re.is_match(&value_to_string(value)),
                Err(error) => {
                    debug!(%pattern, %error, "uncompilable validator pattern");
                    false
                }
            },
            FieldCheckKind::Required | FieldCheckKind::ConditionalRequired { .. } => true,
        }
    }
}

fn present(value: &Value) -> bool {
    match value {
        Value::String(s) => !s.trim().is_empty(),
        Value::Null => false,
        _ => true,
    }
}

fn parse_iso(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// At most two fractional digits, judged on the textual form for strings
/// and on cent alignment for numbers.
fn currency_precision_ok(value: &Value) -> bool {
    match value {
        Value::String(s) => match s.split_once('.') {
            Some((_, frac)) => frac.len() <= 2,
            None => true,
        },
        Value::Number(n) => n.as_f64().is_some_and(|v| {
            let cents = v * 100.0;
            (cents - cents.round()).abs() < 1e-6
        }),
        _ => false,
    }
}

/// NPI validity: ten digits whose check digit satisfies the Luhn algorithm
/// over the 80840-prefixed base.
pub fn npi_is_valid(npi: &str) -> bool {
    if npi.len() != 10 || !npi.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let mut sum = 0u32;
    let mut double = false;
    for c in "80840".chars().chain(npi.chars()).rev() {
        let mut digit = c.to_digit(10).expect("digits checked above");
        if double {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
        double = !double;
    }
    sum % 10 == 0
}

fn tax_id_is_valid(raw: &str) -> bool {
    let is_shape = |shape: &[usize]| {
        let parts: Vec<&str> = raw.split('-').collect();
        parts.len() == shape.len()
            && parts
                .iter()
                .zip(shape)
                .all(|(part, len)| part.len() == *len && part.bytes().all(|b| b.is_ascii_digit()))
    };
    // EIN XX-XXXXXXX, SSN XXX-XX-XXXX, or nine bare digits.
    is_shape(&[2, 7]) || is_shape(&[3, 2, 4]) || is_shape(&[9])
}

/// A cross-field assertion; the closed set of cross-validator kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CrossCheck {
    /// `Σ left_sum ≈ Σ right_sum` within the tolerance.
    BalanceCheck {
        left_sum: Vec<String>,
        right_sum: Vec<String>,
        #[serde(default = "default_tolerance")]
        tolerance: f64,
    },
    /// `field1 <relationship> field2` must hold.
    ConsistencyCheck {
        field1: String,
        relationship: Operator,
        field2: String,
    },
    /// `operation(operands) ≈ result_field` within the tolerance.
    CalculationCheck {
        operation: CalcOperation,
        operands: Vec<String>,
        result_field: String,
        #[serde(default = "default_tolerance")]
        tolerance: f64,
    },
}

/// Arithmetic for [`CrossCheck::CalculationCheck`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalcOperation {
    Sum,
    Subtract,
    Multiply,
    Divide,
}

fn default_tolerance() -> f64 {
    0.01
}

/// Evaluate a rule's field checks against a transaction tree.
pub(crate) fn apply_field_check(
    rule: &Rule,
    check: &FieldCheck,
    tree: &Value,
    prefix: &str,
    diagnostics: &mut DiagnosticCollector,
) {
    let Ok(path) = FieldPath::parse(&check.field) else {
        debug!(field = %check.field, rule = %rule.id, "unparseable field-check path");
        return;
    };
    for m in path.resolve(tree) {
        if check.kind.passes(m.value, tree, &m.bindings) {
            continue;
        }
        let value = m.value.map(value_to_string);
        let message = check.message.clone().unwrap_or_else(|| {
            format!(
                "field {} {}{}",
                m.path,
                check.kind.describe(),
                value
                    .as_deref()
                    .map(|v| format!(": '{v}'"))
                    .unwrap_or_default()
            )
        });
        let mut diagnostic = Diagnostic::new(
            check.severity.unwrap_or(rule.severity),
            check.kind.code(),
            message,
        )
        .with_path(format!("{prefix}.{}", m.path))
        .with_field_path(m.path.clone())
        .with_rule(rule.id.clone());
        if let Some(value) = value {
            diagnostic = diagnostic.with_value(value);
        }
        diagnostics.push(diagnostic);
    }
}

/// Evaluate a rule's cross-field assertions against a transaction tree.
pub(crate) fn apply_cross_check(
    rule: &Rule,
    check: &CrossCheck,
    tree: &Value,
    prefix: &str,
    diagnostics: &mut DiagnosticCollector,
) {
    match check {
        CrossCheck::BalanceCheck {
            left_sum,
            right_sum,
            tolerance,
        } => {
            for bindings in bindings_of(left_sum.first(), tree) {
                let (left, left_count, anchor) = sum_paths(left_sum, tree, &bindings);
                let (right, right_count, _) = sum_paths(right_sum, tree, &bindings);
                // Nothing to reconcile when either side never resolved.
                if left_count == 0 || right_count == 0 {
                    continue;
                }
                let delta = (left - right).abs();
                if delta > tolerance + f64::EPSILON {
                    let anchor = anchor.unwrap_or_else(|| check_anchor(left_sum));
                    diagnostics.push(
                        Diagnostic::new(
                            rule.severity,
                            rule.code(),
                            format!(
                                "balance mismatch at {anchor}: {left:.2} vs {right:.2} (delta {delta:.2})"
                            ),
                        )
                        .with_path(format!("{prefix}.{anchor}"))
                        .with_field_path(anchor)
                        .with_rule(rule.id.clone())
                        .with_context("left_total", format!("{left:.2}"))
                        .with_context("right_total", format!("{right:.2}"))
                        .with_context("delta", format!("{delta:.2}"))
                        .with_context("tolerance", format!("{tolerance:.2}")),
                    );
                }
            }
        }
        CrossCheck::ConsistencyCheck {
            field1,
            relationship,
            field2,
        } => {
            for bindings in bindings_of(Some(field1), tree) {
                let Some((path1, value1)) = first_value(field1, tree, &bindings) else {
                    continue;
                };
                let Some((_, value2)) = first_value(field2, tree, &bindings) else {
                    continue;
                };
                let mut assertion = Condition::new(path1.clone(), *relationship);
                assertion.value = Some(value2.clone());
                if !assertion.evaluate(tree, &[]).holds {
                    diagnostics.push(
                        Diagnostic::new(
                            rule.severity,
                            rule.code(),
                            format!(
                                "consistency check failed: {path1} = {} against {field2} = {}",
                                value_to_string(&value1),
                                value_to_string(&value2),
                            ),
                        )
                        .with_path(format!("{prefix}.{path1}"))
                        .with_field_path(path1)
                        .with_value(value_to_string(&value1))
                        .with_rule(rule.id.clone())
                        .with_context("field2", field2.clone())
                        .with_context("field2_value", value_to_string(&value2)),
                    );
                }
            }
        }
        CrossCheck::CalculationCheck {
            operation,
            operands,
            result_field,
            tolerance,
        } => {
            for bindings in bindings_of(Some(result_field), tree) {
                let Some((result_path, result_value)) = first_value(result_field, tree, &bindings)
                else {
                    continue;
                };
                let Some(actual) = as_number(&result_value) else {
                    continue;
                };
                let Some(expected) = calculate(*operation, operands, tree, &bindings) else {
                    continue;
                };
                let delta = (expected - actual).abs();
                if delta > tolerance + f64::EPSILON {
                    diagnostics.push(
                        Diagnostic::new(
                            rule.severity,
                            rule.code(),
                            format!(
                                "calculation mismatch at {result_path}: expected {expected:.2}, found {actual:.2}"
                            ),
                        )
                        .with_path(format!("{prefix}.{result_path}"))
                        .with_field_path(result_path)
                        .with_value(format!("{actual:.2}"))
                        .with_rule(rule.id.clone())
                        .with_context("expected", format!("{expected:.2}"))
                        .with_context("actual", format!("{actual:.2}"))
                        .with_context("delta", format!("{delta:.2}")),
                    );
                }
            }
        }
    }
}

/// Wildcard bindings of the anchor path: one entry per concrete expansion,
/// or a single empty binding for wildcard-free paths.
fn bindings_of(anchor: Option<&String>, tree: &Value) -> Vec<Vec<usize>> {
    let Some(anchor) = anchor else {
        return vec![Vec::new()];
    };
    let Ok(path) = FieldPath::parse(anchor) else {
        return Vec::new();
    };
    if !path.has_wildcard() {
        return vec![Vec::new()];
    }
    let mut seen: Vec<Vec<usize>> = Vec::new();
    for m in path.resolve(tree) {
        // Bind only the leading wildcard so trailing ones keep summing.
        let head: Vec<usize> = m.bindings.iter().take(1).copied().collect();
        if !seen.contains(&head) {
            seen.push(head);
        }
    }
    seen
}

/// Sum all numeric resolutions of the given paths under the bindings.
/// Returns (total, resolved count, first concrete path).
fn sum_paths(paths: &[String], tree: &Value, bindings: &[usize]) -> (f64, usize, Option<String>) {
    let mut total = 0.0;
    let mut count = 0;
    let mut anchor = None;
    for raw in paths {
        let Ok(path) = FieldPath::parse(raw) else {
            continue;
        };
        for m in path.substitute(bindings).resolve(tree) {
            if anchor.is_none() {
                anchor = Some(m.path.clone());
            }
            if let Some(number) = m.value.and_then(as_number) {
                total += number;
                count += 1;
            }
        }
    }
    (total, count, anchor)
}

fn first_value(raw: &str, tree: &Value, bindings: &[usize]) -> Option<(String, Value)> {
    let path = FieldPath::parse(raw).ok()?.substitute(bindings);
    let matches = path.resolve(tree);
    let m = matches.first()?;
    Some((m.path.clone(), m.value?.clone()))
}

fn calculate(
    operation: CalcOperation,
    operands: &[String],
    tree: &Value,
    bindings: &[usize],
) -> Option<f64> {
    let terms: Vec<f64> = operands
        .iter()
        .map(|raw| sum_paths(std::slice::from_ref(raw), tree, bindings).0)
        .collect();
    match operation {
        CalcOperation::Sum => Some(terms.iter().sum()),
        CalcOperation::Subtract => {
            let (first, rest) = terms.split_first()?;
            Some(rest.iter().fold(*first, |acc, t| acc - t))
        }
        CalcOperation::Multiply => {
            let (first, rest) = terms.split_first()?;
            Some(rest.iter().fold(*first, |acc, t| acc * t))
        }
        CalcOperation::Divide => {
            let (first, rest) = terms.split_first()?;
            let divisor: f64 = rest.iter().product();
            if divisor == 0.0 {
                None
            } else {
                Some(first / divisor)
            }
        }
    }
}

fn check_anchor(paths: &[String]) -> String {
    paths.first().cloned().unwrap_or_default()
}
