//! Field-level exact-match scoring.
//!
//! Absent values and empty ticker lists are the same thing as far as a label
//! is concerned, so both are canonicalized to `Empty` before comparing.
//! Everything else must match exactly, ticker order included.

use crate::domain::{Currency, FieldValue};

/// Canonical form used for comparison only.
#[derive(Debug, PartialEq, Eq)]
enum Canonical<'a> {
    Empty,
    Text(&'a str),
    Tickers(&'a [String]),
    Currency(Currency),
}

fn canonicalize(value: FieldValue<'_>) -> Canonical<'_> {
    match value {
        FieldValue::Text(None) | FieldValue::Tickers(None) => Canonical::Empty,
        FieldValue::Tickers(Some(tickers)) if tickers.is_empty() => Canonical::Empty,
        FieldValue::Text(Some(text)) => Canonical::Text(text),
        FieldValue::Tickers(Some(tickers)) => Canonical::Tickers(tickers),
        FieldValue::Currency(currency) => Canonical::Currency(currency),
    }
}

/// Score one field: 1 on a match, 0 otherwise.
pub fn score(expected: FieldValue<'_>, predicted: FieldValue<'_>) -> u32 {
    u32::from(canonicalize(expected) == canonicalize(predicted))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tickers(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_none_and_empty_are_equivalent() {
        let empty: Vec<String> = Vec::new();
        assert_eq!(score(FieldValue::Tickers(None), FieldValue::Tickers(Some(&empty))), 1);
        assert_eq!(score(FieldValue::Tickers(Some(&empty)), FieldValue::Tickers(None)), 1);
        assert_eq!(score(FieldValue::Tickers(None), FieldValue::Tickers(None)), 1);
        assert_eq!(score(FieldValue::Text(None), FieldValue::Tickers(Some(&empty))), 1);
        assert_eq!(score(FieldValue::Text(None), FieldValue::Text(None)), 1);
    }

    #[test]
    fn test_empty_string_is_not_none() {
        assert_eq!(score(FieldValue::Text(None), FieldValue::Text(Some(""))), 0);
        assert_eq!(score(FieldValue::Text(Some("")), FieldValue::Text(Some(""))), 1);
    }

    #[test]
    fn test_text_exact_match() {
        assert_eq!(score(FieldValue::Text(Some("Alpha")), FieldValue::Text(Some("Alpha"))), 1);
        assert_eq!(score(FieldValue::Text(Some("Alpha")), FieldValue::Text(Some("alpha"))), 0);
        assert_eq!(score(FieldValue::Text(Some("Alpha")), FieldValue::Text(None)), 0);
    }

    #[test]
    fn test_ticker_order_matters() {
        let expected = tickers(&["ALP", "ALP.TO"]);
        let reversed = tickers(&["ALP.TO", "ALP"]);
        let same = tickers(&["ALP", "ALP.TO"]);

        assert_eq!(score(FieldValue::Tickers(Some(&expected)), FieldValue::Tickers(Some(&same))), 1);
        assert_eq!(score(FieldValue::Tickers(Some(&expected)), FieldValue::Tickers(Some(&reversed))), 0);
    }

    #[test]
    fn test_non_empty_tickers_vs_none() {
        let expected = tickers(&["ALP"]);
        assert_eq!(score(FieldValue::Tickers(Some(&expected)), FieldValue::Tickers(None)), 0);
    }

    #[test]
    fn test_currency() {
        assert_eq!(score(FieldValue::Currency(Currency::Usd), FieldValue::Currency(Currency::Usd)), 1);
        assert_eq!(score(FieldValue::Currency(Currency::Usd), FieldValue::Currency(Currency::Cad)), 0);
    }
}
