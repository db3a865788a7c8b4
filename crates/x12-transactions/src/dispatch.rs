//! Transaction dispatch.
//!
//! The registry maps ST01 transaction-set codes to projectors. Callers may
//! register additional projectors for other codes at construction time (the
//! plugin surface); no code is ever loaded dynamically.

use std::collections::HashMap;
use tracing::{debug, trace};
use x12_ast::{Diagnostic, DiagnosticCollector, EdiDocument, Segment, TransactionData};

use crate::t270_271::EligibilityProjector;
use crate::t276_277::ClaimStatusProjector;
use crate::t835::RemittanceProjector;
use crate::t837p::ProfessionalClaimProjector;

/// A transaction-set projector: turns the ST..SE segment window into a
/// typed semantic tree, recording diagnostics as it goes.
pub trait Projector: Send + Sync {
    /// Project the segment window (envelope segments excluded).
    fn project(&self, segments: &[Segment], ctx: &mut ProjectionContext<'_>) -> TransactionData;
}

/// Per-transaction projection scope: the document path of the transaction
/// and the shared diagnostic collector.
pub struct ProjectionContext<'a> {
    path: &'a str,
    diagnostics: &'a mut DiagnosticCollector,
}

impl<'a> ProjectionContext<'a> {
    /// Create a context rooted at the given transaction path.
    pub fn new(path: &'a str, diagnostics: &'a mut DiagnosticCollector) -> Self {
        Self { path, diagnostics }
    }

    /// The transaction's document path.
    pub fn path(&self) -> &str {
        self.path
    }

    /// Record a diagnostic at the transaction path.
    pub fn record(&mut self, diagnostic: Diagnostic) {
        let diagnostic = if diagnostic.path.is_empty() {
            diagnostic.with_path(self.path.to_string())
        } else {
            diagnostic
        };
        self.diagnostics.push(diagnostic);
    }

    /// Record a diagnostic anchored at a field of the semantic tree.
    pub fn record_at(&mut self, field: &str, diagnostic: Diagnostic) {
        let full = format!("{}.{}", self.path, field);
        self.diagnostics
            .push(diagnostic.with_path(full).with_field_path(field.to_string()));
    }

    /// A segment appeared where the state machine did not expect it; it is
    /// skipped, not fatal.
    pub fn unexpected_segment(&mut self, segment: &Segment, state: &str) {
        self.record(
            Diagnostic::warning(
                "UNEXPECTED_SEGMENT",
                format!("segment '{}' not expected in the {state} loop", segment.id),
            )
            .with_value(segment.id.clone()),
        );
    }

    /// A required segment never appeared in the window.
    pub fn missing_required(&mut self, segment_id: &str, description: &str) {
        self.record(
            Diagnostic::error(
                "MISSING_REQUIRED",
                format!("required segment {segment_id} ({description}) is missing"),
            )
            .with_value(segment_id.to_string()),
        );
    }

    /// A field failed numeric parsing; its semantic value defaults to zero.
    pub fn numeric_format(&mut self, field: &str, raw: &str, expected: &str) {
        self.record_at(
            field,
            Diagnostic::error(
                "NUMERIC_FORMAT",
                format!("value '{raw}' is not a valid {expected}"),
            )
            .with_value(raw.to_string()),
        );
    }
}

/// Registry of projectors keyed by transaction-set code.
pub struct ProjectorRegistry {
    projectors: HashMap<String, Box<dyn Projector>>,
}

impl Default for ProjectorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ProjectorRegistry {
    /// An empty registry; nothing dispatches until registered.
    pub fn new() -> Self {
        Self {
            projectors: HashMap::new(),
        }
    }

    /// Registry with the built-in healthcare projectors.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("835", Box::new(RemittanceProjector::default()));
        registry.register("837", Box::new(ProfessionalClaimProjector));
        registry.register("270", Box::new(EligibilityProjector::inquiry()));
        registry.register("271", Box::new(EligibilityProjector::response()));
        registry.register("276", Box::new(ClaimStatusProjector::inquiry()));
        registry.register("277", Box::new(ClaimStatusProjector::response()));
        registry
    }

    /// Register (or replace) the projector for a transaction-set code.
    pub fn register(&mut self, code: impl Into<String>, projector: Box<dyn Projector>) {
        let code = code.into();
        debug!(%code, "registering projector");
        self.projectors.insert(code, projector);
    }

    /// True when a projector exists for the code.
    pub fn recognizes(&self, code: &str) -> bool {
        self.projectors.contains_key(code)
    }

    /// Project every recognized transaction in the document in place.
    ///
    /// Unrecognized codes keep their raw segments and record an
    /// `UNKNOWN_TRANSACTION` info entry.
    pub fn project_document(
        &self,
        document: &mut EdiDocument,
        diagnostics: &mut DiagnosticCollector,
    ) {
        for (i, interchange) in document.interchanges.iter_mut().enumerate() {
            for (j, group) in interchange.functional_groups.iter_mut().enumerate() {
                for (k, tx) in group.transactions.iter_mut().enumerate() {
                    let path =
                        format!("interchanges[{i}].functional_groups[{j}].transactions[{k}]");
                    let code = tx.header.transaction_set_code.clone();
                    match self.projectors.get(&code) {
                        Some(projector) => {
                            if let TransactionData::Raw(raw) = &mut tx.data {
                                trace!(%code, %path, "projecting transaction");
                                let segments = std::mem::take(&mut raw.segments);
                                let mut ctx = ProjectionContext::new(&path, diagnostics);
                                tx.data = projector.project(&segments, &mut ctx);
                            }
                        }
                        None => {
                            diagnostics.push(
                                Diagnostic::info(
                                    "UNKNOWN_TRANSACTION",
                                    format!(
                                        "no projector for transaction set '{code}'; segments retained"
                                    ),
                                )
                                .with_path(path)
                                .with_value(code),
                            );
                        }
                    }
                }
            }
        }
    }
}
