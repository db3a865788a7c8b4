//! Field parsing helpers shared by the projectors.

use crate::dispatch::ProjectionContext;
use x12_ast::{Element, Party, Segment};

/// Parse a monetary amount: fixed-point decimal, at most two fractional
/// digits. An empty value defaults to zero silently; anything else that
/// does not parse records `NUMERIC_FORMAT` and defaults to zero.
pub(crate) fn money(ctx: &mut ProjectionContext<'_>, field: &str, raw: &str) -> f64 {
    if raw.is_empty() {
        return 0.0;
    }
    match parse_fixed2(raw) {
        Some(value) => value,
        None => {
            ctx.numeric_format(field, raw, "monetary amount");
            0.0
        }
    }
}

/// Parse an optional monetary amount: absent stays absent.
pub(crate) fn money_opt(ctx: &mut ProjectionContext<'_>, field: &str, raw: &str) -> Option<f64> {
    if raw.is_empty() {
        return None;
    }
    Some(money(ctx, field, raw))
}

/// Parse a unit or quantity count. An empty value takes the stated default;
/// an invalid one records `NUMERIC_FORMAT` and defaults to zero.
pub(crate) fn count(
    ctx: &mut ProjectionContext<'_>,
    field: &str,
    raw: &str,
    default: f64,
) -> f64 {
    if raw.is_empty() {
        return default;
    }
    match parse_decimal(raw) {
        Some(value) => value,
        None => {
            ctx.numeric_format(field, raw, "numeric count");
            0.0
        }
    }
}

/// Fixed-point decimal with at most two fractional digits.
pub(crate) fn parse_fixed2(raw: &str) -> Option<f64> {
    let unsigned = raw.strip_prefix('-').unwrap_or(raw);
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };
    if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if let Some(frac) = frac_part {
        if frac.is_empty() || frac.len() > 2 || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
    }
    raw.parse().ok()
}

/// Plain decimal, any precision.
pub(crate) fn parse_decimal(raw: &str) -> Option<f64> {
    let unsigned = raw.strip_prefix('-').unwrap_or(raw);
    if unsigned.is_empty()
        || !unsigned
            .bytes()
            .all(|b| b.is_ascii_digit() || b == b'.')
        || unsigned.bytes().filter(|&b| b == b'.').count() > 1
    {
        return None;
    }
    raw.parse().ok()
}

/// Render an amount the way the wire format writes money.
pub(crate) fn format_amount(value: f64) -> String {
    format!("{value:.2}")
}

/// CCYYMMDD → YYYY-MM-DD; anything else passes through verbatim.
pub(crate) fn iso_date(raw: &str) -> String {
    if raw.len() == 8 && raw.bytes().all(|b| b.is_ascii_digit()) {
        format!("{}-{}-{}", &raw[0..4], &raw[4..6], &raw[6..8])
    } else {
        raw.to_string()
    }
}

/// HHMM → HH:MM; anything else passes through verbatim.
pub(crate) fn iso_time(raw: &str) -> String {
    if raw.len() == 4 && raw.bytes().all(|b| b.is_ascii_digit()) {
        format!("{}:{}", &raw[0..2], &raw[2..4])
    } else {
        raw.to_string()
    }
}

/// Non-empty string, or `None`.
pub(crate) fn opt(raw: &str) -> Option<String> {
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

/// Build a [`Party`] from the standard NM1 layout: name in NM103, first
/// name in NM104, identification qualifier and code in NM108/NM109.
pub(crate) fn party_from_nm1(segment: &Segment) -> Party {
    Party {
        name: segment.value_owned(3),
        first_name: opt(segment.value(4)),
        id_qualifier: opt(segment.value(8)),
        identifier: opt(segment.value(9)),
    }
}

/// Split a composite procedure element ("HC:99213:25:59") into the
/// procedure code and its ordered modifiers. A bare code without a
/// qualifier ("99213") is accepted as-is.
pub(crate) fn composite_procedure(element: Option<&Element>) -> (String, Vec<String>) {
    let Some(element) = element else {
        return (String::new(), Vec::new());
    };
    let components = element.components();
    match components.len() {
        0 => (String::new(), Vec::new()),
        1 => (components[0].clone(), Vec::new()),
        _ => (
            components[1].clone(),
            components[2..]
                .iter()
                .filter(|m| !m.is_empty())
                .cloned()
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed2_accepts_money_shapes() {
        assert_eq!(parse_fixed2("1200.00"), Some(1200.0));
        assert_eq!(parse_fixed2("-5.00"), Some(-5.0));
        assert_eq!(parse_fixed2("75.5"), Some(75.5));
        assert_eq!(parse_fixed2("0"), Some(0.0));
    }

    #[test]
    fn fixed2_rejects_everything_else() {
        assert_eq!(parse_fixed2("1.234"), None);
        assert_eq!(parse_fixed2("12a"), None);
        assert_eq!(parse_fixed2("."), None);
        assert_eq!(parse_fixed2(".50"), None);
        assert_eq!(parse_fixed2("1e3"), None);
        assert_eq!(parse_fixed2(""), None);
    }

    #[test]
    fn date_and_time_canonicalization() {
        assert_eq!(iso_date("20240101"), "2024-01-01");
        assert_eq!(iso_date("240101"), "240101");
        assert_eq!(iso_time("1200"), "12:00");
        assert_eq!(iso_time("120000"), "120000");
    }

    #[test]
    fn composite_procedure_shapes() {
        let qualified = Element::new(vec!["HC".into(), "99213".into()]);
        assert_eq!(
            composite_procedure(Some(&qualified)),
            ("99213".to_string(), vec![])
        );

        let with_mods = Element::new(vec![
            "HC".into(),
            "99213".into(),
            "25".into(),
            "59".into(),
        ]);
        assert_eq!(
            composite_procedure(Some(&with_mods)),
            ("99213".to_string(), vec!["25".to_string(), "59".to_string()])
        );

        let bare = Element::simple("99213");
        assert_eq!(
            composite_procedure(Some(&bare)),
            ("99213".to_string(), vec![])
        );

        assert_eq!(composite_procedure(None), (String::new(), vec![]));
    }

    #[test]
    fn amount_formatting_is_two_decimal() {
        assert_eq!(format_amount(1000.0), "1000.00");
        assert_eq!(format_amount(-5.0), "-5.00");
    }
}
