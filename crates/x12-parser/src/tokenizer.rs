//! Lazy segment tokenizer.
//!
//! Splits the input on the segment terminator, trims inter-segment CR/LF
//! noise, and decomposes each segment into elements and sub-element
//! components. The dialect has no release/escape character: a literal
//! delimiter embedded in data splits like any other.

use crate::delimiters::Delimiters;
use x12_ast::{Diagnostic, DiagnosticCollector, Element, Segment};

/// Streaming tokenizer over a fully materialized byte buffer.
pub struct SegmentTokenizer<'a> {
    data: &'a [u8],
    pos: usize,
    delimiters: Delimiters,
    emitted: usize,
}

impl<'a> SegmentTokenizer<'a> {
    /// Create a tokenizer with the detected delimiters.
    pub fn new(data: &'a [u8], delimiters: Delimiters) -> Self {
        Self {
            data,
            pos: 0,
            delimiters,
            emitted: 0,
        }
    }

    /// Produce the next segment, or `None` at end of input.
    ///
    /// Empty segments (consecutive terminators) are skipped silently. A
    /// segment id outside the 2–3 uppercase-alphanumeric shape records a
    /// `MALFORMED_SEGMENT` warning but the segment is still emitted so
    /// downstream diagnostics can point at it.
    pub fn next_segment(&mut self, diagnostics: &mut DiagnosticCollector) -> Option<Segment> {
        loop {
            self.skip_whitespace();
            if self.pos >= self.data.len() {
                return None;
            }

            let raw = self.take_until_terminator();
            if raw.iter().all(|b| b.is_ascii_whitespace()) {
                continue;
            }

            let segment = self.split_segment(raw);
            if !valid_segment_id(&segment.id) {
                diagnostics.push(
                    Diagnostic::warning(
                        "MALFORMED_SEGMENT",
                        format!("segment id '{}' is not 2-3 uppercase characters", segment.id),
                    )
                    .with_path(format!("segments[{}]", self.emitted))
                    .with_value(segment.id.clone()),
                );
            }
            self.emitted += 1;
            return Some(segment);
        }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.pos.min(self.data.len())..]
    }

    fn skip_whitespace(&mut self) {
        while let Some(&b) = self.data.get(self.pos) {
            if b == b' ' || b == b'\r' || b == b'\n' || b == b'\t' {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn take_until_terminator(&mut self) -> &'a [u8] {
        let start = self.pos;
        while self.pos < self.data.len() && self.data[self.pos] != self.delimiters.segment {
            self.pos += 1;
        }
        let raw = &self.data[start..self.pos];
        if self.pos < self.data.len() {
            self.pos += 1; // consume the terminator
        }
        raw
    }

    fn split_segment(&self, raw: &[u8]) -> Segment {
        let mut fields = split_on(raw, self.delimiters.element);
        let id = decode(&fields.remove(0));

        // ISA is fixed width and its final element is the component
        // separator itself, so it must not be component-split.
        let elements = if id == "ISA" {
            fields.into_iter().map(|f| Element::simple(decode(&f))).collect()
        } else {
            fields
                .into_iter()
                .map(|f| {
                    Element::new(
                        split_on(&f, self.delimiters.component)
                            .iter()
                            .map(|c| decode(c))
                            .collect(),
                    )
                })
                .collect()
        };

        Segment::new(id, elements)
    }
}

/// Split preserving empty fields, including trailing ones: trailing
/// separators in the source are significant.
fn split_on(data: &[u8], separator: u8) -> Vec<Vec<u8>> {
    let mut fields = vec![Vec::new()];
    for &b in data {
        if b == separator {
            fields.push(Vec::new());
        } else {
            fields.last_mut().expect("fields never empty").push(b);
        }
    }
    fields
}

/// Decode latin-1: every byte maps to the code point of the same value.
fn decode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

fn valid_segment_id(id: &str) -> bool {
    (2..=3).contains(&id.len())
        && id
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(input: &[u8]) -> (Vec<Segment>, DiagnosticCollector) {
        let mut diagnostics = DiagnosticCollector::new();
        let mut tokenizer = SegmentTokenizer::new(input, Delimiters::default());
        let mut segments = Vec::new();
        while let Some(segment) = tokenizer.next_segment(&mut diagnostics) {
            segments.push(segment);
        }
        (segments, diagnostics)
    }

    #[test]
    fn splits_elements_and_components() {
        let (segments, _) = tokenize(b"SVC*HC:99213:25*100.00*75.00**1~");
        assert_eq!(segments.len(), 1);
        let svc = &segments[0];
        assert_eq!(svc.id, "SVC");
        assert_eq!(svc.element_count(), 5);
        assert_eq!(
            svc.element(1).unwrap().components(),
            &["HC".to_string(), "99213".to_string(), "25".to_string()]
        );
        assert_eq!(svc.value(2), "100.00");
        assert!(svc.element(4).unwrap().is_empty());
        assert_eq!(svc.value(5), "1");
    }

    #[test]
    fn trailing_separators_are_significant() {
        let (segments, _) = tokenize(b"REF*TJ*123456789*~");
        assert_eq!(segments[0].element_count(), 3);
        assert!(segments[0].element(3).unwrap().is_empty());
    }

    #[test]
    fn newlines_between_segments_are_trimmed() {
        let (segments, _) = tokenize(b"ST*835*0001~\r\nBPR*I*100~\nSE*3*0001~");
        let ids: Vec<&str> = segments.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["ST", "BPR", "SE"]);
    }

    #[test]
    fn empty_segments_are_skipped_silently() {
        let (segments, diagnostics) = tokenize(b"ST*835*0001~~~SE*2*0001~");
        assert_eq!(segments.len(), 2);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn malformed_segment_id_warns_but_emits() {
        let (segments, diagnostics) = tokenize(b"X*1*2~TOOLONG*3~");
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].id, "X");
        let warnings: Vec<_> = diagnostics
            .iter()
            .filter(|d| d.code == "MALFORMED_SEGMENT")
            .collect();
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn missing_final_terminator_still_yields_the_segment() {
        let (segments, _) = tokenize(b"ST*835*0001~SE*2*0001");
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].value(2), "0001");
    }

    #[test]
    fn isa_is_not_component_split() {
        let isa = format!(
            "ISA*00*          *00*          *ZZ*{:<15}*ZZ*{:<15}*240101*1200*^*00501*000000001*0*P*:~",
            "SENDER", "RECEIVER"
        );
        let (segments, _) = tokenize(isa.as_bytes());
        let isa = &segments[0];
        assert_eq!(isa.element_count(), 16);
        assert_eq!(isa.value(16), ":");
        assert_eq!(isa.value(13), "000000001");
        assert_eq!(isa.value(6), "SENDER");
    }
}
