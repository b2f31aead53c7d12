//! Parsing utilities.
use std::{borrow::Cow, sync::LazyLock};

use nom::{
    Parser,
    character::complete::line_ending,
    combinator::{eof, opt},
    sequence::terminated,
};
use regex::bytes::Regex;

use crate::error::ParseError;

pub(crate) mod fields;
pub(crate) mod start_line;

static LINE_FOLDING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\r\n|\n)[ \t]+").expect("line folding pattern is valid")
});

/// Parse a block of HTTP header lines into name-value pairs.
///
/// The block may end with an empty line. Any other trailing input is an error.
pub fn parse_name_value_fields(value: &[u8]) -> Result<Vec<fields::FieldPairRef<'_>>, ParseError> {
    let mut parser = terminated(fields::field_pairs, (opt(line_ending), eof));

    match parser.parse(value) {
        Ok((_input, output)) => Ok(output),
        Err(error) => Err(error.into()),
    }
}

/// Parse a hexadecimal chunk size.
///
/// Only ASCII hex digits are permitted.
pub fn parse_hex_u64_strict(value: &[u8]) -> Option<u64> {
    if value.is_empty() || !value.iter().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }

    let text = std::str::from_utf8(value).ok()?;
    u64::from_str_radix(text, 16).ok()
}

/// Parse a value into a `u64`.
///
/// Unlike [`u64::try_from()`], only ASCII digits are permitted. Use of std
/// library parsing functions may lead to security issues.
pub fn parse_u64_strict(value: &str) -> Result<u64, std::num::ParseIntError> {
    if !value.chars().all(|c| c.is_ascii_digit()) {
        return "?".parse();
    }

    value.parse()
}

/// Remove line folding from a HTTP field value.
pub fn remove_line_folding(value: &[u8]) -> Cow<'_, [u8]> {
    LINE_FOLDING.replace_all(value, b" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fields_trailing_garbage() {
        assert_eq!(parse_name_value_fields(b"a: 1\r\n\r\n").unwrap().len(), 1);
        assert_eq!(parse_name_value_fields(b"a: 1\r\n").unwrap().len(), 1);
        assert_eq!(parse_name_value_fields(b"").unwrap().len(), 0);
        assert!(parse_name_value_fields(b"a: 1\r\ngarbage").is_err());
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex_u64_strict(b"0"), Some(0));
        assert_eq!(parse_hex_u64_strict(b"1f"), Some(0x1f));
        assert_eq!(parse_hex_u64_strict(b"1F"), Some(0x1f));
        assert_eq!(parse_hex_u64_strict(b""), None);
        assert_eq!(parse_hex_u64_strict(b"+1"), None);
        assert_eq!(parse_hex_u64_strict(b"ffffffffffffffffff"), None);
    }

    #[test]
    fn test_parse_u64_strict() {
        assert_eq!(parse_u64_strict("123"), Ok(123));
        assert!(parse_u64_strict("+123").is_err());
        assert!(parse_u64_strict(" 1").is_err());
    }

    #[test]
    fn test_remove_line_folding() {
        assert_eq!(*remove_line_folding(b"abc"), *b"abc");
        assert_eq!(*remove_line_folding(b"abc\r\n  def"), *b"abc def");
        assert_eq!(
            *remove_line_folding(b"abc\r\n  def\r\n\t123"),
            *b"abc def 123"
        );
        assert_eq!(*remove_line_folding(b"abc\n  def"), *b"abc def");
    }
}
