//! Severity-tagged diagnostics and the report they aggregate into.
//!
//! Every processing stage appends here: envelope assembly, projection, and
//! rule evaluation, in that order. The collector is append-only and scoped
//! to one parse invocation; entries with an identical (code, path, value)
//! tuple after the first are suppressed.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// One finding: stable code, human message, structured location.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Stable error code, namespaced by category (ISA*, SE*, 835_*, ...).
    pub code: String,
    pub message: String,
    /// Full document path, envelope prefix included.
    pub path: String,
    /// Path within the transaction's semantic tree, when applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_path: Option<String>,
    /// The offending field value, when one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Identifier of the rule that fired, for rule-driven findings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    /// Free-form structured context, e.g. declared vs observed counts.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
}

impl Diagnostic {
    /// Create a diagnostic with an empty path.
    pub fn new(severity: Severity, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            code: code.into(),
            message: message.into(),
            path: String::new(),
            field_path: None,
            value: None,
            rule_id: None,
            context: BTreeMap::new(),
        }
    }

    /// Shorthand for an error-severity diagnostic.
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    /// Shorthand for a warning-severity diagnostic.
    pub fn warning(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    /// Shorthand for an info-severity diagnostic.
    pub fn info(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, code, message)
    }

    /// Set the document path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the within-transaction field path.
    pub fn with_field_path(mut self, field_path: impl Into<String>) -> Self {
        self.field_path = Some(field_path.into());
        self
    }

    /// Set the offending value.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Set the originating rule id.
    pub fn with_rule(mut self, rule_id: impl Into<String>) -> Self {
        self.rule_id = Some(rule_id.into());
        self
    }

    /// Add one structured context entry.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Append-only collector with (code, path, value) deduplication.
#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    entries: Vec<Diagnostic>,
    seen: HashSet<(String, String, Option<String>)>,
    errors: usize,
    warnings: usize,
    info: usize,
}

impl DiagnosticCollector {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a diagnostic. Returns false when an identical
    /// (code, path, value) entry was already recorded.
    pub fn push(&mut self, diagnostic: Diagnostic) -> bool {
        let key = (
            diagnostic.code.clone(),
            diagnostic.path.clone(),
            diagnostic.value.clone(),
        );
        if !self.seen.insert(key) {
            return false;
        }
        match diagnostic.severity {
            Severity::Error => self.errors += 1,
            Severity::Warning => self.warnings += 1,
            Severity::Info => self.info += 1,
        }
        self.entries.push(diagnostic);
        true
    }

    /// Number of error-severity entries.
    pub fn error_count(&self) -> usize {
        self.errors
    }

    /// Number of warning-severity entries.
    pub fn warning_count(&self) -> usize {
        self.warnings
    }

    /// Number of info-severity entries.
    pub fn info_count(&self) -> usize {
        self.info
    }

    /// A run is valid when it recorded no errors.
    pub fn is_valid(&self) -> bool {
        self.errors == 0
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in the order they were recorded.
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Iterate entries in recorded order.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    /// First entry with the given code, if any.
    pub fn find(&self, code: &str) -> Option<&Diagnostic> {
        self.entries.iter().find(|d| d.code == code)
    }

    /// Consume the collector into the serializable report shape.
    pub fn into_report(self, rules_applied: usize) -> DiagnosticReport {
        let is_valid = self.errors == 0;
        let summary = DiagnosticSummary {
            errors: self.errors,
            warnings: self.warnings,
            info: self.info,
            rules_applied,
        };
        let mut errors = Vec::with_capacity(self.errors);
        let mut warnings = Vec::with_capacity(self.warnings);
        let mut info = Vec::with_capacity(self.info);
        for entry in self.entries {
            match entry.severity {
                Severity::Error => errors.push(entry),
                Severity::Warning => warnings.push(entry),
                Severity::Info => info.push(entry),
            }
        }
        DiagnosticReport {
            is_valid,
            summary,
            errors,
            warnings,
            info,
        }
    }
}

/// Per-severity counts for the report header.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DiagnosticSummary {
    pub errors: usize,
    pub warnings: usize,
    pub info: usize,
    pub rules_applied: usize,
}

/// The serializable diagnostic report.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticReport {
    pub is_valid: bool,
    pub summary: DiagnosticSummary,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    pub info: Vec<Diagnostic>,
}

impl DiagnosticReport {
    /// First entry with the given code, across all severities.
    pub fn find(&self, code: &str) -> Option<&Diagnostic> {
        self.errors
            .iter()
            .chain(&self.warnings)
            .chain(&self.info)
            .find(|d| d.code == code)
    }

    /// All entries with the given code, across all severities.
    pub fn find_all(&self, code: &str) -> Vec<&Diagnostic> {
        self.errors
            .iter()
            .chain(&self.warnings)
            .chain(&self.info)
            .filter(|d| d.code == code)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_entries_invalidate_the_run() {
        let mut collector = DiagnosticCollector::new();
        assert!(collector.is_valid());

        collector.push(Diagnostic::warning("W1", "a warning"));
        assert!(collector.is_valid());

        collector.push(Diagnostic::error("E1", "an error"));
        assert!(!collector.is_valid());
        assert_eq!(collector.error_count(), 1);
        assert_eq!(collector.warning_count(), 1);
    }

    #[test]
    fn duplicate_code_path_value_is_suppressed() {
        let mut collector = DiagnosticCollector::new();
        let diag = Diagnostic::error("E1", "first").with_path("interchanges[0]");
        assert!(collector.push(diag.clone()));
        assert!(!collector.push(diag));
        assert_eq!(collector.len(), 1);

        // A different value on the same code/path is a distinct finding.
        let other = Diagnostic::error("E1", "second")
            .with_path("interchanges[0]")
            .with_value("x");
        assert!(collector.push(other));
        assert_eq!(collector.len(), 2);
    }

    #[test]
    fn report_partitions_by_severity_in_order() {
        let mut collector = DiagnosticCollector::new();
        collector.push(Diagnostic::info("I1", "one"));
        collector.push(Diagnostic::error("E1", "two"));
        collector.push(Diagnostic::info("I2", "three"));

        let report = collector.into_report(4);
        assert!(!report.is_valid);
        assert_eq!(report.summary.errors, 1);
        assert_eq!(report.summary.info, 2);
        assert_eq!(report.summary.rules_applied, 4);
        assert_eq!(report.info[0].code, "I1");
        assert_eq!(report.info[1].code, "I2");
    }

    #[test]
    fn report_serializes_with_optional_fields_omitted() {
        let mut collector = DiagnosticCollector::new();
        collector.push(Diagnostic::error("E1", "oops").with_path("interchanges[0]"));
        let json = serde_json::to_value(collector.into_report(0)).unwrap();
        assert_eq!(json["is_valid"], false);
        assert!(json["errors"][0].get("rule_id").is_none());
        assert!(json["errors"][0].get("context").is_none());
    }

    #[test]
    fn severity_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Severity::Warning).unwrap(),
            "\"warning\""
        );
    }
}
