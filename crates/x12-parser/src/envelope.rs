//! Envelope assembly.
//!
//! Folds the segment stream into the interchange → functional group →
//! transaction set tree with a three-level pushdown:
//!
//! ```text
//! start → ISA → (GS → (ST → … SE)+ → GE)+ → IEA
//! ```
//!
//! Control-number and count mismatches are recorded and assembly continues;
//! the structure is always produced, partial envelopes included.

use tracing::trace;
use x12_ast::{
    Diagnostic, DiagnosticCollector, EdiDocument, FunctionalGroup, FunctionalGroupHeader,
    FunctionalGroupTrailer, Interchange, InterchangeHeader, InterchangeTrailer, RawTransaction,
    Segment, TransactionData, TransactionHeader, TransactionSet, TransactionTrailer,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Outside,
    InInterchange,
    InGroup,
    InTransaction,
}

struct OpenInterchange {
    header: InterchangeHeader,
    groups: Vec<FunctionalGroup>,
}

struct OpenGroup {
    header: FunctionalGroupHeader,
    transactions: Vec<TransactionSet>,
}

struct OpenTransaction {
    header: TransactionHeader,
    segments: Vec<Segment>,
}

/// Pushdown assembler over the tokenized segment stream.
pub struct EnvelopeAssembler {
    state: State,
    document: EdiDocument,
    interchange: Option<OpenInterchange>,
    group: Option<OpenGroup>,
    transaction: Option<OpenTransaction>,
}

impl Default for EnvelopeAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvelopeAssembler {
    /// Create an assembler in the initial `Outside` state.
    pub fn new() -> Self {
        Self {
            state: State::Outside,
            document: EdiDocument::new(),
            interchange: None,
            group: None,
            transaction: None,
        }
    }

    /// Feed the next segment.
    pub fn push(&mut self, segment: Segment, diagnostics: &mut DiagnosticCollector) {
        // The id is matched while the segment itself may be moved into the
        // open transaction, so take a copy up front.
        let id = segment.id.clone();
        match self.state {
            State::Outside => match id.as_str() {
                "ISA" => self.open_interchange(&segment),
                _ => self.unexpected(&segment, diagnostics),
            },
            State::InInterchange => match id.as_str() {
                "ISA" => {
                    diagnostics.push(
                        Diagnostic::error(
                            "NESTED_ISA",
                            "ISA encountered inside an open interchange",
                        )
                        .with_path(self.interchange_path()),
                    );
                }
                "GS" => self.open_group(&segment),
                "IEA" => self.close_interchange(&segment, diagnostics),
                "ST" | "SE" | "GE" => self.unexpected(&segment, diagnostics),
                _ => trace!(id = %segment.id, "ignoring stray segment in interchange"),
            },
            State::InGroup => match id.as_str() {
                "ST" => self.open_transaction(&segment),
                "GE" => self.close_group(&segment, diagnostics),
                "ISA" | "GS" | "SE" | "IEA" => self.unexpected(&segment, diagnostics),
                _ => trace!(id = %segment.id, "ignoring stray segment in group"),
            },
            State::InTransaction => match id.as_str() {
                "SE" => self.close_transaction(&segment, diagnostics),
                "ISA" | "GS" | "ST" | "GE" | "IEA" => self.unexpected(&segment, diagnostics),
                _ => {
                    self.transaction
                        .as_mut()
                        .expect("transaction open in InTransaction state")
                        .segments
                        .push(segment);
                }
            },
        }
    }

    /// Close out any open envelopes and return the assembled document.
    pub fn finish(mut self, diagnostics: &mut DiagnosticCollector) -> EdiDocument {
        if let Some(open) = self.transaction.take() {
            diagnostics.push(
                Diagnostic::error("ST_UNTERMINATED", "transaction set has no SE trailer")
                    .with_path(self.transaction_path()),
            );
            let set = TransactionSet {
                header: open.header,
                data: TransactionData::Raw(RawTransaction::new(open.segments)),
                trailer: TransactionTrailer::default(),
            };
            self.group
                .as_mut()
                .expect("group open under transaction")
                .transactions
                .push(set);
        }
        if let Some(open) = self.group.take() {
            diagnostics.push(
                Diagnostic::error("GS_UNTERMINATED", "functional group has no GE trailer")
                    .with_path(self.group_path()),
            );
            self.interchange
                .as_mut()
                .expect("interchange open under group")
                .groups
                .push(FunctionalGroup {
                    header: open.header,
                    transactions: open.transactions,
                    trailer: FunctionalGroupTrailer::default(),
                });
        }
        if let Some(open) = self.interchange.take() {
            diagnostics.push(
                Diagnostic::error("ISA_UNTERMINATED", "interchange has no IEA trailer")
                    .with_path(self.interchange_path()),
            );
            self.document.interchanges.push(Interchange {
                header: open.header,
                functional_groups: open.groups,
                trailer: InterchangeTrailer::default(),
            });
        }
        self.document
    }

    fn open_interchange(&mut self, isa: &Segment) {
        self.interchange = Some(OpenInterchange {
            header: InterchangeHeader {
                sender_qualifier: isa.value_owned(5),
                sender_id: isa.value_owned(6),
                receiver_qualifier: isa.value_owned(7),
                receiver_id: isa.value_owned(8),
                date: isa.value_owned(9),
                time: isa.value_owned(10),
                standards_id: isa.value_owned(11),
                version: isa.value_owned(12),
                control_number: isa.value_owned(13),
                usage_indicator: isa.value_owned(15),
                component_separator: isa.value_owned(16),
            },
            groups: Vec::new(),
        });
        self.state = State::InInterchange;
    }

    fn open_group(&mut self, gs: &Segment) {
        self.group = Some(OpenGroup {
            header: FunctionalGroupHeader {
                functional_id_code: gs.value_owned(1),
                sender_id: gs.value_owned(2),
                receiver_id: gs.value_owned(3),
                date: gs.value_owned(4),
                time: gs.value_owned(5),
                control_number: gs.value_owned(6),
                agency_code: gs.value_owned(7),
                version_code: gs.value_owned(8),
            },
            transactions: Vec::new(),
        });
        self.state = State::InGroup;
    }

    fn open_transaction(&mut self, st: &Segment) {
        self.transaction = Some(OpenTransaction {
            header: TransactionHeader {
                transaction_set_code: st.value_owned(1),
                control_number: st.value_owned(2),
            },
            segments: Vec::new(),
        });
        self.state = State::InTransaction;
    }

    fn close_transaction(&mut self, se: &Segment, diagnostics: &mut DiagnosticCollector) {
        let path = self.transaction_path();
        let open = self
            .transaction
            .take()
            .expect("transaction open in InTransaction state");

        let trailer = TransactionTrailer {
            segment_count: se.value_owned(1),
            control_number: se.value_owned(2),
        };

        if open.header.control_number != trailer.control_number {
            diagnostics.push(
                Diagnostic::error(
                    "ST02_SE02_MISMATCH",
                    format!(
                        "transaction control number '{}' does not match SE trailer '{}'",
                        open.header.control_number, trailer.control_number
                    ),
                )
                .with_path(path.clone())
                .with_context("header", open.header.control_number.clone())
                .with_context("trailer", trailer.control_number.clone()),
            );
        }

        // ST through SE inclusive.
        let actual = open.segments.len() + 2;
        if trailer.segment_count.parse::<usize>() != Ok(actual) {
            diagnostics.push(
                Diagnostic::error(
                    "SE01_COUNT_INVALID",
                    format!(
                        "SE declares {} segments, transaction has {}",
                        trailer.segment_count, actual
                    ),
                )
                .with_path(path)
                .with_context("declared", trailer.segment_count.clone())
                .with_context("actual", actual.to_string()),
            );
        }

        self.group
            .as_mut()
            .expect("group open under transaction")
            .transactions
            .push(TransactionSet {
                header: open.header,
                data: TransactionData::Raw(RawTransaction::new(open.segments)),
                trailer,
            });
        self.state = State::InGroup;
    }

    fn close_group(&mut self, ge: &Segment, diagnostics: &mut DiagnosticCollector) {
        let path = self.group_path();
        let open = self.group.take().expect("group open in InGroup state");

        let trailer = FunctionalGroupTrailer {
            transaction_count: ge.value_owned(1),
            control_number: ge.value_owned(2),
        };

        if open.header.control_number != trailer.control_number {
            diagnostics.push(
                Diagnostic::error(
                    "GS06_GE02_MISMATCH",
                    format!(
                        "group control number '{}' does not match GE trailer '{}'",
                        open.header.control_number, trailer.control_number
                    ),
                )
                .with_path(path.clone())
                .with_context("header", open.header.control_number.clone())
                .with_context("trailer", trailer.control_number.clone()),
            );
        }

        let actual = open.transactions.len();
        if trailer.transaction_count.parse::<usize>() != Ok(actual) {
            diagnostics.push(
                Diagnostic::error(
                    "GE01_COUNT_MISMATCH",
                    format!(
                        "GE declares {} transactions, group has {}",
                        trailer.transaction_count, actual
                    ),
                )
                .with_path(path)
                .with_context("declared", trailer.transaction_count.clone())
                .with_context("actual", actual.to_string()),
            );
        }

        self.interchange
            .as_mut()
            .expect("interchange open under group")
            .groups
            .push(FunctionalGroup {
                header: open.header,
                transactions: open.transactions,
                trailer,
            });
        self.state = State::InInterchange;
    }

    fn close_interchange(&mut self, iea: &Segment, diagnostics: &mut DiagnosticCollector) {
        let path = self.interchange_path();
        let open = self
            .interchange
            .take()
            .expect("interchange open in InInterchange state");

        let trailer = InterchangeTrailer {
            group_count: iea.value_owned(1),
            control_number: iea.value_owned(2),
        };

        if open.header.control_number != trailer.control_number {
            diagnostics.push(
                Diagnostic::error(
                    "ISA13_IEA02_MISMATCH",
                    format!(
                        "interchange control number '{}' does not match IEA trailer '{}'",
                        open.header.control_number, trailer.control_number
                    ),
                )
                .with_path(path.clone())
                .with_context("header", open.header.control_number.clone())
                .with_context("trailer", trailer.control_number.clone()),
            );
        }

        let actual = open.groups.len();
        if trailer.group_count.parse::<usize>() != Ok(actual) {
            diagnostics.push(
                Diagnostic::error(
                    "IEA01_COUNT_MISMATCH",
                    format!(
                        "IEA declares {} groups, interchange has {}",
                        trailer.group_count, actual
                    ),
                )
                .with_path(path)
                .with_context("declared", trailer.group_count.clone())
                .with_context("actual", actual.to_string()),
            );
        }

        self.document.interchanges.push(Interchange {
            header: open.header,
            functional_groups: open.groups,
            trailer,
        });
        self.state = State::Outside;
    }

    fn unexpected(&mut self, segment: &Segment, diagnostics: &mut DiagnosticCollector) {
        diagnostics.push(
            Diagnostic::error(
                "UNEXPECTED",
                format!(
                    "segment '{}' is not valid at the {} level",
                    segment.id,
                    self.state_name()
                ),
            )
            .with_path(self.current_path())
            .with_value(segment.id.clone()),
        );
    }

    fn state_name(&self) -> &'static str {
        match self.state {
            State::Outside => "document",
            State::InInterchange => "interchange",
            State::InGroup => "functional group",
            State::InTransaction => "transaction",
        }
    }

    fn current_path(&self) -> String {
        match self.state {
            State::Outside => String::new(),
            State::InInterchange => self.interchange_path(),
            State::InGroup => self.group_path(),
            State::InTransaction => self.transaction_path(),
        }
    }

    fn interchange_path(&self) -> String {
        format!("interchanges[{}]", self.document.interchanges.len())
    }

    fn group_path(&self) -> String {
        let groups = self.interchange.as_ref().map_or(0, |i| i.groups.len());
        format!("{}.functional_groups[{}]", self.interchange_path(), groups)
    }

    fn transaction_path(&self) -> String {
        let transactions = self.group.as_ref().map_or(0, |g| g.transactions.len());
        format!("{}.transactions[{}]", self.group_path(), transactions)
    }
}
