//! Typed cell values and the classifier that produces them.
//!
//! Every cell arrives from the database as text. [`classify`] decides what
//! the text represents, trying integer first, then float, then falling back
//! to the raw string:
//!
//! | Input | Result |
//! |-------|--------|
//! | `42`, `-7`, `0x1F`, `0b101`, `0o17`, `017`, `1_000` | `Integer` |
//! | `2.75`, `1e-3`, `.5`, `inf`, `NaN`, `0x1p-2`, `09` | `Float` |
//! | `abc`, `""`, `1e400`, `+nan` | `String` |
//!
//! Integer parsing follows base-prefix rules (a bare leading `0` means
//! octal), which is why `09` is not an integer but still parses as a float.

use std::fmt;

use serde::{Serialize, Serializer};

/// A classified cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    String(String),
    Integer(i64),
    Float(f64),
}

impl TypedValue {
    /// Short name of the variant, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            TypedValue::String(_) => "string",
            TypedValue::Integer(_) => "integer",
            TypedValue::Float(_) => "float",
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            TypedValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TypedValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedValue::String(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::String(v) => f.write_str(v),
            TypedValue::Integer(v) => write!(f, "{}", v),
            TypedValue::Float(v) => write!(f, "{}", v),
        }
    }
}

impl Serialize for TypedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TypedValue::String(v) => serializer.serialize_str(v),
            TypedValue::Integer(v) => serializer.serialize_i64(*v),
            // JSON has no NaN or infinity: written as "NaN", "inf", "-inf".
            TypedValue::Float(v) if !v.is_finite() => serializer.collect_str(v),
            TypedValue::Float(v) => serializer.serialize_f64(*v),
        }
    }
}

/// Classifies a raw cell. Never fails: anything that is neither an integer
/// nor a float is kept as a string.
pub fn classify(raw: &str) -> TypedValue {
    if let Some(n) = parse_int(raw) {
        return TypedValue::Integer(n);
    }
    if let Some(f) = parse_float(raw) {
        return TypedValue::Float(f);
    }
    TypedValue::String(raw.to_string())
}

// ---------------------------------------------------------------------------
// Integer parsing
// ---------------------------------------------------------------------------

/// Parses a signed 64-bit integer with base detection from its prefix.
///
/// `0x`/`0o`/`0b` select hex/octal/binary and must be followed by at least
/// one more character; a bare leading `0` selects octal. Underscores may
/// separate digits.
pub fn parse_int(s: &str) -> Option<i64> {
    let (negative, body) = split_sign(s);
    if body.is_empty() || !underscores_ok(s) {
        return None;
    }

    let bytes = body.as_bytes();
    let (radix, digits) = if bytes[0] == b'0' && bytes.len() >= 3 {
        match bytes[1].to_ascii_lowercase() {
            b'x' => (16, &body[2..]),
            b'o' => (8, &body[2..]),
            b'b' => (2, &body[2..]),
            _ => (8, &body[1..]),
        }
    } else if bytes[0] == b'0' {
        (8, &body[1..])
    } else {
        (10, body)
    };

    let mut magnitude: u64 = 0;
    for c in digits.chars() {
        if c == '_' {
            continue;
        }
        let d = c.to_digit(radix)?;
        magnitude = magnitude
            .checked_mul(u64::from(radix))?
            .checked_add(u64::from(d))?;
    }

    if negative {
        if magnitude > i64::MIN.unsigned_abs() {
            return None;
        }
        Some((magnitude as i64).wrapping_neg())
    } else {
        i64::try_from(magnitude).ok()
    }
}

fn split_sign(s: &str) -> (bool, &str) {
    if let Some(rest) = s.strip_prefix('-') {
        (true, rest)
    } else if let Some(rest) = s.strip_prefix('+') {
        (false, rest)
    } else {
        (false, s)
    }
}

/// Underscores must sit between digits, or between a base prefix and a digit.
fn underscores_ok(s: &str) -> bool {
    let (_, body) = split_sign(s);
    let bytes = body.as_bytes();

    // '^' start, '0' digit (or prefix), '_' underscore, '!' anything else
    let mut saw = b'^';
    let mut i = 0;
    let mut hex = false;

    if bytes.len() >= 2 && bytes[0] == b'0' {
        let p = bytes[1].to_ascii_lowercase();
        if p == b'b' || p == b'o' || p == b'x' {
            i = 2;
            saw = b'0';
            hex = p == b'x';
        }
    }

    for &b in &bytes[i..] {
        if b.is_ascii_digit() || (hex && b.is_ascii_hexdigit()) {
            saw = b'0';
            continue;
        }
        if b == b'_' {
            if saw != b'0' {
                return false;
            }
            saw = b'_';
            continue;
        }
        if saw == b'_' {
            return false;
        }
        saw = b'!';
    }
    saw != b'_'
}

// ---------------------------------------------------------------------------
// Float parsing
// ---------------------------------------------------------------------------

/// Parses a 64-bit float.
///
/// Accepts decimal literals, signed `inf`/`infinity`, unsigned `nan` and hex
/// floats with a `p` exponent. Literals that overflow to infinity are
/// rejected.
pub fn parse_float(s: &str) -> Option<f64> {
    if s.is_empty() {
        return None;
    }

    let (negative, body) = split_sign(s);
    let lower = body.to_ascii_lowercase();

    if lower == "inf" || lower == "infinity" {
        return Some(if negative {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        });
    }
    if lower == "nan" {
        // A signed "nan" is not a valid literal.
        return (body.len() == s.len()).then_some(f64::NAN);
    }

    if lower.starts_with("0x") {
        let v = parse_hex_float(&lower[2..])?;
        return Some(if negative { -v } else { v });
    }

    if !body
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'))
    {
        return None;
    }

    let v: f64 = s.parse().ok()?;
    v.is_finite().then_some(v)
}

/// Parses the part of a hex float after `0x`: `<hex>[.<hex>]p[+-]<dec>`.
fn parse_hex_float(s: &str) -> Option<f64> {
    if !underscores_ok(&format!("0x{}", s)) {
        return None;
    }
    let s: String = s.chars().filter(|&c| c != '_').collect();
    let (mantissa, exponent) = s.split_once('p')?;

    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }

    let mut value = 0.0f64;
    for c in int_part.chars() {
        value = value * 16.0 + f64::from(c.to_digit(16)?);
    }
    let mut scale = 1.0 / 16.0;
    for c in frac_part.chars() {
        value += f64::from(c.to_digit(16)?) * scale;
        scale /= 16.0;
    }

    let (exp_negative, exp_digits) = split_sign(exponent);
    if exp_digits.is_empty() || !exp_digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let exp: i32 = exp_digits.parse().ok()?;
    let v = value * 2f64.powi(if exp_negative { -exp } else { exp });
    v.is_finite().then_some(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_decimal_integers() {
        assert_eq!(classify("42"), TypedValue::Integer(42));
        assert_eq!(classify("-7"), TypedValue::Integer(-7));
        assert_eq!(classify("+15"), TypedValue::Integer(15));
        assert_eq!(classify("0"), TypedValue::Integer(0));
    }

    #[test]
    fn classifies_prefixed_integers() {
        assert_eq!(classify("0x1F"), TypedValue::Integer(31));
        assert_eq!(classify("0b101"), TypedValue::Integer(5));
        assert_eq!(classify("0o17"), TypedValue::Integer(15));
        assert_eq!(classify("017"), TypedValue::Integer(15));
        assert_eq!(classify("-0x10"), TypedValue::Integer(-16));
    }

    #[test]
    fn underscores_between_digits() {
        assert_eq!(classify("1_000"), TypedValue::Integer(1000));
        assert_eq!(classify("0x_ff"), TypedValue::Integer(255));
        assert_eq!(classify("1__0"), TypedValue::String("1__0".into()));
        assert_eq!(classify("_1"), TypedValue::String("_1".into()));
        assert_eq!(classify("1_"), TypedValue::String("1_".into()));
    }

    #[test]
    fn integer_bounds() {
        assert_eq!(
            classify("9223372036854775807"),
            TypedValue::Integer(i64::MAX)
        );
        assert_eq!(
            classify("-9223372036854775808"),
            TypedValue::Integer(i64::MIN)
        );
        // Overflowing integers still parse as floats.
        assert_eq!(
            classify("99999999999999999999"),
            TypedValue::Float(99999999999999999999.0)
        );
    }

    #[test]
    fn invalid_octal_falls_back_to_float() {
        assert_eq!(classify("09"), TypedValue::Float(9.0));
    }

    #[test]
    fn classifies_floats() {
        assert_eq!(classify("2.75"), TypedValue::Float(2.75));
        assert_eq!(classify("1e-3"), TypedValue::Float(0.001));
        assert_eq!(classify(".5"), TypedValue::Float(0.5));
        assert_eq!(classify("5."), TypedValue::Float(5.0));
        assert_eq!(classify("-2.5E2"), TypedValue::Float(-250.0));
        assert_eq!(classify("Inf"), TypedValue::Float(f64::INFINITY));
        assert_eq!(classify("-infinity"), TypedValue::Float(f64::NEG_INFINITY));
        assert!(classify("NaN").as_f64().is_some_and(f64::is_nan));
    }

    #[test]
    fn classifies_hex_floats() {
        assert_eq!(classify("0x1p-2"), TypedValue::Float(0.25));
        assert_eq!(classify("0x1.8p1"), TypedValue::Float(3.0));
        // Without an exponent it is not a float, and "0x1.8" is not an integer.
        assert_eq!(classify("0x1.8"), TypedValue::String("0x1.8".into()));
    }

    #[test]
    fn float_only_strings_never_classify_as_integer() {
        for s in ["1.0", "1e3", "0.0", "-0.5", "1E+2", "inf", "0x1p0"] {
            assert_eq!(classify(s).kind(), "float", "input {:?}", s);
        }
    }

    #[test]
    fn falls_back_to_string() {
        assert_eq!(classify(""), TypedValue::String(String::new()));
        assert_eq!(classify("abc"), TypedValue::String("abc".into()));
        assert_eq!(classify("Yes"), TypedValue::String("Yes".into()));
        assert_eq!(classify(" 1"), TypedValue::String(" 1".into()));
        assert_eq!(classify("0x"), TypedValue::String("0x".into()));
        assert_eq!(classify("-"), TypedValue::String("-".into()));
        assert_eq!(classify("1e400"), TypedValue::String("1e400".into()));
        assert_eq!(classify("+nan"), TypedValue::String("+nan".into()));
        assert_eq!(classify("1_0.5"), TypedValue::String("1_0.5".into()));
    }

    #[test]
    fn serializes_untagged() {
        let json = serde_json::to_string(&vec![
            TypedValue::String("x".into()),
            TypedValue::Integer(3),
            TypedValue::Float(1.5),
        ])
        .unwrap();
        assert_eq!(json, r#"["x",3,1.5]"#);
    }
}
