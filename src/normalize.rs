//! Cell canonicalization shared by the differ and the identity resolver.
//!
//! Every comparison in the crate goes through [`Normalizer`], so two values
//! that the differ reports as equal always hash to the same identity and
//! vice versa (numeric tolerance aside, which only the differ applies).

use std::fmt;

use serde::{Serialize, Serializer};

use crate::data::{Numeric, Value};

pub const DEFAULT_TOLERANCE: f64 = 1e-10;

/// Integral floats at or beyond this magnitude stay floats; `i64` cannot hold them.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

const EMPTY_MARKER: &str = "\u{0}empty";

#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedValue {
    Empty,
    Number(Numeric),
    Text(String),
}

impl NormalizedValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, NormalizedValue::Empty)
    }

    /// String form fed into identity hashing. Each variant carries its own
    /// tag, so a null never collides with `""` and the number 3 never
    /// collides with the text "3".
    pub fn canonical(&self) -> String {
        match self {
            NormalizedValue::Empty => EMPTY_MARKER.to_string(),
            NormalizedValue::Number(n) => format!("n:{n}"),
            NormalizedValue::Text(s) => format!("t:{s}"),
        }
    }
}

impl fmt::Display for NormalizedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizedValue::Empty => f.write_str("<empty>"),
            NormalizedValue::Number(n) => write!(f, "{n}"),
            NormalizedValue::Text(s) => f.write_str(s),
        }
    }
}

impl Serialize for NormalizedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            NormalizedValue::Empty => serializer.serialize_none(),
            NormalizedValue::Number(Numeric::Integer(i)) => serializer.serialize_i64(*i),
            NormalizedValue::Number(Numeric::Float(f)) => serializer.serialize_f64(*f),
            NormalizedValue::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl From<NormalizedValue> for Value {
    fn from(value: NormalizedValue) -> Self {
        match value {
            NormalizedValue::Empty => Value::Null,
            NormalizedValue::Number(n) => Value::Number(n),
            NormalizedValue::Text(s) => Value::Text(s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalizer {
    tolerance: f64,
    normalize_text: bool,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            normalize_text: true,
        }
    }
}

impl Normalizer {
    pub fn new(tolerance: f64, normalize_text: bool) -> Self {
        Self {
            tolerance,
            normalize_text,
        }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn normalize(&self, value: &Value) -> NormalizedValue {
        match value {
            Value::Null => NormalizedValue::Empty,
            Value::Number(Numeric::Integer(i)) => NormalizedValue::Number(Numeric::Integer(*i)),
            Value::Number(Numeric::Float(f)) => normalize_float(*f),
            Value::Text(raw) if !self.normalize_text => NormalizedValue::Text(raw.clone()),
            Value::Text(raw) => normalize_text(raw),
        }
    }

    /// Normalizes an optional field; an absent field is `Empty`.
    pub fn normalize_field(&self, value: Option<&Value>) -> NormalizedValue {
        value.map_or(NormalizedValue::Empty, |v| self.normalize(v))
    }

    pub fn equivalent(&self, left: &NormalizedValue, right: &NormalizedValue) -> bool {
        match (left, right) {
            (NormalizedValue::Empty, NormalizedValue::Empty) => true,
            (NormalizedValue::Empty, _) | (_, NormalizedValue::Empty) => false,
            (NormalizedValue::Number(a), NormalizedValue::Number(b)) => {
                numbers_within(*a, *b, self.tolerance)
            }
            (NormalizedValue::Text(a), NormalizedValue::Text(b)) => a == b,
            _ => false,
        }
    }

    pub fn values_equivalent(&self, left: Option<&Value>, right: Option<&Value>) -> bool {
        self.equivalent(&self.normalize_field(left), &self.normalize_field(right))
    }
}

fn numbers_within(a: Numeric, b: Numeric, tolerance: f64) -> bool {
    match (a, b) {
        (Numeric::Integer(x), Numeric::Integer(y)) => {
            x == y || ((x as i128 - y as i128) as f64).abs() <= tolerance
        }
        _ => {
            let (x, y) = (a.as_f64(), b.as_f64());
            x == y || (x - y).abs() <= tolerance
        }
    }
}

fn normalize_float(value: f64) -> NormalizedValue {
    if value.is_nan() {
        NormalizedValue::Empty
    } else if value.fract() == 0.0 && value.abs() < I64_BOUND {
        NormalizedValue::Number(Numeric::Integer(value as i64))
    } else {
        NormalizedValue::Number(Numeric::Float(value))
    }
}

fn normalize_text(raw: &str) -> NormalizedValue {
    let trimmed = raw.trim();
    if let Ok(parsed) = trimmed.parse::<i64>() {
        return NormalizedValue::Number(Numeric::Integer(parsed));
    }
    if let Ok(parsed) = trimmed.parse::<f64>() {
        if parsed.is_nan() {
            return NormalizedValue::Empty;
        }
        // "1e400" and "inf" overflow; keep them as text rather than infinity.
        if parsed.is_finite() {
            return normalize_float(parsed);
        }
    }
    NormalizedValue::Text(trimmed.to_lowercase())
}
