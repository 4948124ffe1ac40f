//! Raw producer line parsing.
//!
//! The player process prints one packet per line, e.g.
//! `Packet{symbol='MAINIDX11JUL2419000CE', LTP=120.5, LTQ=10}`.
//! No schema is enforced: every `key=value` token becomes a field.
//!
//! Grammar:
//!
//! ```text
//! token := run '=' run
//! run   := 1*(any char except '{' '}' '=' ',')
//! ```
//!
//! Tokens are found by a left-to-right scan. A run that is not followed by
//! `=` and a non-empty run is skipped as a whole.

use crate::error::ParseError;
use crate::record::{FieldValue, Record};
use serde_json::Number;

/// One `key=value` pair as it appears in the line (untrimmed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub key: &'a str,
    pub value: &'a str,
}

#[inline]
fn is_delimiter(b: u8) -> bool {
    matches!(b, b'{' | b'}' | b'=' | b',')
}

/// Index of the first delimiter at or after `start`, or `bytes.len()`.
fn run_end(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|&b| is_delimiter(b))
        .map_or(bytes.len(), |offset| start + offset)
}

/// Split a raw line into `key=value` tokens.
///
/// Delimiters are ASCII, so slicing at their byte offsets never splits a
/// UTF-8 character.
pub fn tokenize(raw: &str) -> Vec<Token<'_>> {
    let bytes = raw.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        if is_delimiter(bytes[pos]) {
            pos += 1;
            continue;
        }

        let key_end = run_end(bytes, pos);
        if key_end < bytes.len() && bytes[key_end] == b'=' {
            let value_start = key_end + 1;
            let value_end = run_end(bytes, value_start);
            if value_end > value_start {
                tokens.push(Token {
                    key: &raw[pos..key_end],
                    value: &raw[value_start..value_end],
                });
                pos = value_end;
                continue;
            }
        }
        pos = key_end;
    }

    tokens
}

/// Parse one raw line into a record.
///
/// Keys are whitespace-trimmed; tokens whose key trims to nothing are ignored.
/// Fails when the line holds no usable token. Callers skip the line and keep
/// reading.
pub fn parse_line(raw: &str) -> Result<Record, ParseError> {
    let mut record = Record::new();
    for token in tokenize(raw) {
        let key = token.key.trim();
        if key.is_empty() {
            continue;
        }
        record.insert(key, coerce_value(token.value));
    }

    if record.is_empty() {
        return Err(ParseError::no_tokens(raw));
    }
    Ok(record)
}

/// Strip whitespace and surrounding single quotes, then coerce to a number
/// when the remainder is a plain decimal literal.
pub fn coerce_value(raw: &str) -> FieldValue {
    let stripped = raw.trim().trim_matches('\'').trim();
    match lex_number(stripped) {
        Some(n) => FieldValue::Number(n),
        None => FieldValue::Text(stripped.to_string()),
    }
}

/// `[+-]? digits [. digits] [(e|E) [+-]? digits]` with at least one mantissa digit.
fn is_decimal_literal(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut i = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }

    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut mantissa_digits = i - int_start;

    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        let frac_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        mantissa_digits += i - frac_start;
    }

    if mantissa_digits == 0 {
        return false;
    }

    if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
        i += 1;
        if matches!(bytes.get(i), Some(b'+' | b'-')) {
            i += 1;
        }
        let exp_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == exp_start {
            return false;
        }
    }

    i == bytes.len()
}

fn lex_number(s: &str) -> Option<Number> {
    if !is_decimal_literal(s) {
        return None;
    }
    let unsigned = s.strip_prefix('+').unwrap_or(s);
    if let Ok(n) = unsigned.parse::<i64>() {
        return Some(Number::from(n));
    }
    unsigned
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quoted_and_numeric() {
        let record = parse_line("{key1='ABC',key2=123}").unwrap();
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["key1", "key2"]);
        assert_eq!(record.get("key1"), Some(FieldValue::from("ABC")));
        assert_eq!(record.get("key2"), Some(FieldValue::from(123_i64)));
    }

    #[test]
    fn test_parse_player_packet() {
        let record =
            parse_line("Packet{symbol='FINANCIALS2407119000CE', LTP=120.5, LTQ=10}").unwrap();
        assert_eq!(record.len(), 3);
        assert_eq!(record.symbol(), Some("FINANCIALS2407119000CE"));
        assert_eq!(record.get_f64("LTP"), Some(120.5));
        assert_eq!(record.to_json().unwrap(), r#"{"symbol":"FINANCIALS2407119000CE","LTP":120.5,"LTQ":10}"#);
    }

    #[test]
    fn test_no_tokens_is_error() {
        for line in ["", "   ", "{}", "hello world", "a==b", "=value", ",,,"] {
            assert!(
                matches!(parse_line(line), Err(ParseError::NoTokens(_))),
                "line {line:?} should not parse"
            );
        }
    }

    #[test]
    fn test_error_does_not_poison_later_lines() {
        assert!(parse_line("garbage").is_err());
        let record = parse_line("a=1").unwrap();
        assert_eq!(record.get_f64("a"), Some(1.0));
    }

    #[test]
    fn test_tokenize_skips_broken_runs() {
        let tokens = tokenize("a=b=c,d=e");
        assert_eq!(
            tokens,
            vec![
                Token { key: "a", value: "b" },
                Token { key: "d", value: "e" },
            ]
        );

        let tokens = tokenize("junk{x=1}");
        assert_eq!(tokens, vec![Token { key: "x", value: "1" }]);
    }

    #[test]
    fn test_whitespace_only_key_ignored() {
        let record = parse_line("{ =1, b=2}").unwrap();
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn test_duplicate_field_last_wins() {
        let record = parse_line("a=1,a=2").unwrap();
        assert_eq!(record.len(), 1);
        assert_eq!(record.get_f64("a"), Some(2.0));
    }

    #[test]
    fn test_numeric_coercion_rules() {
        assert_eq!(coerce_value(" 42 "), FieldValue::from(42_i64));
        assert_eq!(coerce_value("-7"), FieldValue::from(-7_i64));
        assert_eq!(coerce_value("+7"), FieldValue::from(7_i64));
        assert_eq!(coerce_value("'19000'"), FieldValue::from(19000_i64));
        assert_eq!(coerce_value("1.5e2").as_f64(), Some(150.0));
        assert_eq!(coerce_value(".5").as_f64(), Some(0.5));
        assert_eq!(coerce_value("5.").as_f64(), Some(5.0));

        assert_eq!(coerce_value("NaN"), FieldValue::from("NaN"));
        assert_eq!(coerce_value("inf"), FieldValue::from("inf"));
        assert_eq!(coerce_value("1e"), FieldValue::from("1e"));
        assert_eq!(coerce_value("0x1A"), FieldValue::from("0x1A"));
        assert_eq!(coerce_value("12 34"), FieldValue::from("12 34"));
        assert_eq!(coerce_value("''"), FieldValue::from(""));
        assert_eq!(coerce_value("-"), FieldValue::from("-"));
    }

    #[test]
    fn test_unicode_values_survive() {
        let record = parse_line("{name='Δelta', px=1}").unwrap();
        assert_eq!(record.get_str("name"), Some("Δelta"));
    }
}
