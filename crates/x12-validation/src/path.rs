//! Dotted-path addressing into the semantic tree.
//!
//! Grammar: `ident ('.' ident | '[' digit+ ']' | '[*]')*`. Paths are
//! interpreted against the transaction's canonical JSON value, which is
//! defined once on the document model; the `[*]` wildcard expands by
//! walking list children in ascending index order. Missing intermediate
//! steps resolve to "absent" rather than failing.

use crate::{Error, Result};
use serde_json::Value;

/// One step of a parsed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathToken {
    /// Named field access.
    Key(String),
    /// Fixed list index.
    Index(usize),
    /// Wildcard over every list index.
    Wildcard,
}

/// A parsed field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    raw: String,
    tokens: Vec<PathToken>,
}

/// One resolution of a path against a tree.
#[derive(Debug, Clone)]
pub struct PathMatch<'a> {
    /// Concrete path with wildcards replaced by the matched indices.
    pub path: String,
    /// Indices chosen for each wildcard, outermost first.
    pub bindings: Vec<usize>,
    /// The value at the path; `None` when absent (or JSON null).
    pub value: Option<&'a Value>,
}

impl FieldPath {
    /// Parse a path string.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidPath {
            path: raw.to_string(),
            reason: reason.to_string(),
        };

        let mut tokens = Vec::new();
        let mut chars = raw.chars().peekable();
        let mut ident = String::new();
        let mut expect_ident = true;

        while let Some(c) = chars.next() {
            match c {
                '.' => {
                    if ident.is_empty() {
                        if !matches!(tokens.last(), Some(PathToken::Index(_) | PathToken::Wildcard))
                        {
                            return Err(invalid("empty path step"));
                        }
                    } else {
                        tokens.push(PathToken::Key(std::mem::take(&mut ident)));
                    }
                    expect_ident = true;
                }
                '[' => {
                    if !ident.is_empty() {
                        tokens.push(PathToken::Key(std::mem::take(&mut ident)));
                    } else if tokens.is_empty() {
                        return Err(invalid("subscript before any field name"));
                    }
                    let mut subscript = String::new();
                    loop {
                        match chars.next() {
                            Some(']') => break,
                            Some(c) => subscript.push(c),
                            None => return Err(invalid("unterminated subscript")),
                        }
                    }
                    if subscript == "*" {
                        tokens.push(PathToken::Wildcard);
                    } else if !subscript.is_empty()
                        && subscript.bytes().all(|b| b.is_ascii_digit())
                    {
                        tokens.push(PathToken::Index(
                            subscript.parse().map_err(|_| invalid("index out of range"))?,
                        ));
                    } else {
                        return Err(invalid("subscript must be digits or '*'"));
                    }
                    expect_ident = false;
                }
                ']' => return Err(invalid("unmatched ']'")),
                c if c.is_ascii_alphanumeric() || c == '_' => {
                    ident.push(c);
                    expect_ident = false;
                }
                _ => return Err(invalid("unexpected character")),
            }
        }
        if !ident.is_empty() {
            tokens.push(PathToken::Key(ident));
        } else if expect_ident {
            return Err(invalid("path ends with '.'"));
        }
        if tokens.is_empty() {
            return Err(invalid("empty path"));
        }

        Ok(Self {
            raw: raw.to_string(),
            tokens,
        })
    }

    /// The original path text.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// True when any step is the `[*]` wildcard.
    pub fn has_wildcard(&self) -> bool {
        self.tokens.iter().any(|t| matches!(t, PathToken::Wildcard))
    }

    /// Replace wildcards, outermost first, with the given indices. Extra
    /// wildcards beyond the bindings are left in place.
    pub fn substitute(&self, bindings: &[usize]) -> FieldPath {
        let mut remaining = bindings.iter();
        let tokens: Vec<PathToken> = self
            .tokens
            .iter()
            .map(|t| match t {
                PathToken::Wildcard => match remaining.next() {
                    Some(&i) => PathToken::Index(i),
                    None => PathToken::Wildcard,
                },
                other => other.clone(),
            })
            .collect();
        FieldPath {
            raw: render(&tokens),
            tokens,
        }
    }

    /// Resolve against a tree. Without wildcards this yields exactly one
    /// match (absent when the path leads nowhere); each wildcard multiplies
    /// matches over the list it walks, in ascending index order. A wildcard
    /// over an absent or non-list value yields no matches.
    pub fn resolve<'a>(&self, root: &'a Value) -> Vec<PathMatch<'a>> {
        let mut out = Vec::new();
        walk(
            Some(root),
            &self.tokens,
            String::new(),
            Vec::new(),
            &mut out,
        );
        out
    }
}

fn walk<'a>(
    value: Option<&'a Value>,
    tokens: &[PathToken],
    path: String,
    bindings: Vec<usize>,
    out: &mut Vec<PathMatch<'a>>,
) {
    let Some((token, rest)) = tokens.split_first() else {
        out.push(PathMatch {
            path,
            bindings,
            value: value.filter(|v| !v.is_null()),
        });
        return;
    };
    match token {
        PathToken::Key(key) => {
            let next = value.and_then(|v| v.get(key.as_str()));
            let path = if path.is_empty() {
                key.clone()
            } else {
                format!("{path}.{key}")
            };
            walk(next, rest, path, bindings, out);
        }
        PathToken::Index(index) => {
            let next = value.and_then(|v| v.get(index));
            walk(next, rest, format!("{path}[{index}]"), bindings, out);
        }
        PathToken::Wildcard => {
            let Some(array) = value.and_then(Value::as_array) else {
                return;
            };
            for (index, item) in array.iter().enumerate() {
                let mut bindings = bindings.clone();
                bindings.push(index);
                walk(
                    Some(item),
                    rest,
                    format!("{path}[{index}]"),
                    bindings,
                    out,
                );
            }
        }
    }
}

fn render(tokens: &[PathToken]) -> String {
    let mut out = String::new();
    for token in tokens {
        match token {
            PathToken::Key(key) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(key);
            }
            PathToken::Index(index) => {
                out.push('[');
                out.push_str(&index.to_string());
                out.push(']');
            }
            PathToken::Wildcard => out.push_str("[*]"),
        }
    }
    out
}

/// Render a JSON value the way diagnostics print field values.
pub(crate) fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Numeric coercion: numbers directly, strings when they parse as decimals.
pub(crate) fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree() -> Value {
        json!({
            "financial_information": { "total_paid": 1000.0, "payment_method": "ACH" },
            "payer": null,
            "claims": [
                { "claim_id": "A", "total_paid": 600.0, "services": [ { "paid": 600.0 } ] },
                { "claim_id": "B", "total_paid": 400.0, "services": [] }
            ]
        })
    }

    #[test]
    fn parses_the_grammar() {
        let path = FieldPath::parse("claims[*].services[0].paid").unwrap();
        assert!(path.has_wildcard());
        assert_eq!(path.raw(), "claims[*].services[0].paid");

        assert!(FieldPath::parse("").is_err());
        assert!(FieldPath::parse("claims[").is_err());
        assert!(FieldPath::parse("claims[x]").is_err());
        assert!(FieldPath::parse(".claims").is_err());
        assert!(FieldPath::parse("claims.").is_err());
        assert!(FieldPath::parse("[0]").is_err());
    }

    #[test]
    fn resolves_simple_paths() {
        let tree = tree();
        let matches = FieldPath::parse("financial_information.total_paid")
            .unwrap()
            .resolve(&tree);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].value.unwrap(), &json!(1000.0));
        assert_eq!(matches[0].path, "financial_information.total_paid");
    }

    #[test]
    fn absent_and_null_resolve_to_none() {
        let tree = tree();
        let absent = FieldPath::parse("no.such.thing").unwrap().resolve(&tree);
        assert_eq!(absent.len(), 1);
        assert!(absent[0].value.is_none());

        let null = FieldPath::parse("payer").unwrap().resolve(&tree);
        assert!(null[0].value.is_none());
    }

    #[test]
    fn wildcard_expands_in_ascending_order() {
        let tree = tree();
        let matches = FieldPath::parse("claims[*].total_paid").unwrap().resolve(&tree);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].path, "claims[0].total_paid");
        assert_eq!(matches[0].bindings, vec![0]);
        assert_eq!(matches[1].path, "claims[1].total_paid");
    }

    #[test]
    fn nested_wildcards_bind_outermost_first() {
        let tree = tree();
        let matches = FieldPath::parse("claims[*].services[*].paid")
            .unwrap()
            .resolve(&tree);
        // The second claim has no services, so only one concrete match.
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].bindings, vec![0, 0]);
        assert_eq!(matches[0].path, "claims[0].services[0].paid");
    }

    #[test]
    fn wildcard_over_absent_list_yields_nothing() {
        let tree = json!({});
        let matches = FieldPath::parse("claims[*].total_paid").unwrap().resolve(&tree);
        assert!(matches.is_empty());
    }

    #[test]
    fn substitution_pins_wildcards() {
        let path = FieldPath::parse("claims[*].services[*].paid").unwrap();
        let pinned = path.substitute(&[1]);
        assert_eq!(pinned.raw(), "claims[1].services[*].paid");
        let fully = path.substitute(&[1, 2]);
        assert_eq!(fully.raw(), "claims[1].services[2].paid");
    }

    #[test]
    fn numeric_coercion_accepts_decimal_strings() {
        assert_eq!(as_number(&json!("12.50")), Some(12.5));
        assert_eq!(as_number(&json!(3)), Some(3.0));
        assert_eq!(as_number(&json!("abc")), None);
        assert_eq!(as_number(&json!(true)), None);
    }
}
