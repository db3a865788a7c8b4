//! Raw segment and element model produced by the tokenizer.

use serde::Serialize;

/// A single data element: an ordered list of sub-element components.
///
/// A zero-length component is distinct from an absent element; trailing
/// separators in the source produce empty components here and are preserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Element {
    components: Vec<String>,
}

impl Element {
    /// Create an element from its sub-element components.
    pub fn new(components: Vec<String>) -> Self {
        Self { components }
    }

    /// Create an element with a single component.
    pub fn simple(value: impl Into<String>) -> Self {
        Self {
            components: vec![value.into()],
        }
    }

    /// First component, or the empty string when the element is empty.
    pub fn value(&self) -> &str {
        self.components.first().map(String::as_str).unwrap_or("")
    }

    /// Component by zero-based index.
    pub fn component(&self, index: usize) -> Option<&str> {
        self.components.get(index).map(String::as_str)
    }

    /// All components in order.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// True when the element carries no data at all.
    pub fn is_empty(&self) -> bool {
        self.components.iter().all(String::is_empty)
    }
}

/// One logical record: a 2–3 character id plus its elements.
///
/// Segments are immutable after tokenization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    /// Segment identifier (e.g. "ISA", "CLP").
    pub id: String,
    /// Data elements in document order, excluding the id.
    pub elements: Vec<Element>,
}

impl Segment {
    /// Create a new segment.
    pub fn new(id: impl Into<String>, elements: Vec<Element>) -> Self {
        Self {
            id: id.into(),
            elements,
        }
    }

    /// Element by its 1-indexed position, as written in X12 implementation
    /// guides (ISA13 is `element(13)`).
    pub fn element(&self, position: usize) -> Option<&Element> {
        if position == 0 {
            return None;
        }
        self.elements.get(position - 1)
    }

    /// First component of the element at a 1-indexed position, trimmed of
    /// the space padding fixed-width envelope fields carry. Returns the
    /// empty string when the element is absent.
    pub fn value(&self, position: usize) -> &str {
        self.element(position)
            .map(|e| e.value().trim_matches(' '))
            .unwrap_or("")
    }

    /// Like [`Segment::value`] but owned, for direct field assignment.
    pub fn value_owned(&self, position: usize) -> String {
        self.value(position).to_string()
    }

    /// Number of data elements.
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_value_and_components() {
        let element = Element::new(vec!["HC".into(), "99213".into(), "25".into()]);
        assert_eq!(element.value(), "HC");
        assert_eq!(element.component(1), Some("99213"));
        assert_eq!(element.component(3), None);
        assert!(!element.is_empty());
    }

    #[test]
    fn empty_components_are_preserved() {
        let element = Element::new(vec![String::new(), String::new()]);
        assert_eq!(element.components().len(), 2);
        assert!(element.is_empty());
    }

    #[test]
    fn segment_positions_are_one_indexed() {
        let segment = Segment::new(
            "CLP",
            vec![
                Element::simple("CLM001"),
                Element::simple("1"),
                Element::simple("1200.00"),
            ],
        );
        assert_eq!(segment.value(1), "CLM001");
        assert_eq!(segment.value(3), "1200.00");
        assert_eq!(segment.value(4), "");
        assert!(segment.element(0).is_none());
    }

    #[test]
    fn value_trims_fixed_width_padding() {
        let segment = Segment::new("ISA", vec![Element::simple("SENDER         ")]);
        assert_eq!(segment.value(1), "SENDER");
    }

    #[test]
    fn element_serializes_as_component_list() {
        let element = Element::new(vec!["HC".into(), "99213".into()]);
        let json = serde_json::to_value(&element).unwrap();
        assert_eq!(json, serde_json::json!(["HC", "99213"]));
    }
}
