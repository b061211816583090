//! Scalar values, rows and row normalization
//!
//! A [`Row`] is an insertion-ordered mapping from column name to [`Value`].
//! Rows coming from different stores are made comparable by [`normalize`],
//! which truncates decimals to integers and recurses into list values.

use std::fmt;
use std::hash::{Hash, Hasher};

use indexmap::IndexMap;
use serde::de::Deserializer;
use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A single field value in a result row
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Arbitrary-precision decimal, kept as the driver's textual digits
    Decimal(String),
    Bytes(Vec<u8>),
    /// Tuple- or array-valued field (document stores)
    List(Vec<Value>),
}

impl Value {
    /// Build a decimal value, validating its textual form
    pub fn decimal(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        let trimmed = text.trim();
        if parse_decimal(trimmed).is_none() {
            return Err(Error::InvalidDecimal(text));
        }
        Ok(Value::Decimal(trimmed.to_string()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Decimal(_) => "decimal",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
        }
    }

    /// Normalize this value: decimals become integers, lists recurse.
    pub fn normalized(&self) -> Value {
        match self {
            Value::Decimal(text) => match decimal_to_int(text) {
                Some(i) => Value::Int(i),
                None => self.clone(),
            },
            Value::List(items) => Value::List(items.iter().map(Value::normalized).collect()),
            other => other.clone(),
        }
    }

    /// Convert a JSON value. Objects nested below the top level are kept as
    /// their JSON text.
    pub fn from_json(value: &serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(f) = n.as_f64() {
                    Value::Float(f)
                } else {
                    Value::Decimal(n.to_string())
                }
            }
            serde_json::Value::String(s) => Value::Text(s.clone()),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(_) => Value::Text(value.to_string()),
        }
    }

    fn canonical_float_bits(f: f64) -> u64 {
        if f.is_nan() {
            f64::NAN.to_bits()
        } else if f == 0.0 {
            0.0f64.to_bits()
        } else {
            f.to_bits()
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => {
                Value::canonical_float_bits(*a) == Value::canonical_float_bits(*b)
            }
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(f) => Value::canonical_float_bits(*f).hash(state),
            Value::Text(s) | Value::Decimal(s) => s.hash(state),
            Value::Bytes(b) => b.hash(state),
            Value::List(items) => items.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "{:?}", s),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Bytes(b) => write!(f, "x'{}'", hex::encode(b)),
            Value::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Text(s) | Value::Decimal(s) => serializer.serialize_str(s),
            Value::Bytes(b) => serializer.serialize_str(&hex::encode(b)),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Ok(Value::from_json(&json))
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v.into())
            }
        })*
    };
}

impl_from! {
    bool => Bool,
    i32 => Int,
    i64 => Int,
    u32 => Int,
    f64 => Float,
    String => Text,
    &str => Text,
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Split a decimal literal into (negative, integer digits, fraction digits, exponent)
fn parse_decimal(text: &str) -> Option<(bool, &str, &str, i64)> {
    let (negative, rest) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    let (mantissa, exponent) = match rest.find(['e', 'E']) {
        Some(pos) => (&rest[..pos], rest[pos + 1..].parse::<i64>().ok()?),
        None => (rest, 0),
    };
    let (int_part, frac_part) = match mantissa.find('.') {
        Some(pos) => (&mantissa[..pos], &mantissa[pos + 1..]),
        None => (mantissa, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(int_part) || !all_digits(frac_part) {
        return None;
    }
    Some((negative, int_part, frac_part, exponent))
}

/// Truncate a decimal literal toward zero. `None` when it does not fit `i64`.
fn decimal_to_int(text: &str) -> Option<i64> {
    let (negative, int_part, frac_part, exponent) = parse_decimal(text)?;
    let digits: String = format!("{}{}", int_part, frac_part);
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Some(0);
    }
    let leading_zeros = (int_part.len() + frac_part.len() - digits.len()) as i64;
    let point = (int_part.len() as i64)
        .checked_add(exponent)?
        .checked_sub(leading_zeros)?;

    let whole: String = if point <= 0 {
        String::new()
    } else if point as usize >= digits.len() {
        let zeros = point as usize - digits.len();
        // anything wider than i64 cannot fit anyway
        if zeros > 20 {
            return None;
        }
        format!("{}{}", digits, "0".repeat(zeros))
    } else {
        digits[..point as usize].to_string()
    };

    let whole = whole.trim_start_matches('0');
    if whole.is_empty() {
        return Some(0);
    }
    let magnitude: i128 = whole.parse().ok()?;
    let signed = if negative { -magnitude } else { magnitude };
    i64::try_from(signed).ok()
}

/// An ordered mapping from column name to value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    columns: IndexMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.columns.insert(column.into(), value.into())
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Whether `column` holds exactly `value` in this row
    pub fn has_pair(&self, column: &str, value: &Value) -> bool {
        self.columns.get(column).map_or(false, |v| v == value)
    }

    /// Canonical, order-independent key used for hashing and multiset membership
    pub fn key(&self) -> RowKey {
        let mut pairs: Vec<(String, Value)> = self
            .columns
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        RowKey(pairs)
    }

    /// Build a row from a JSON object (a document). Non-objects are rejected.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            Error::InvalidRow(format!("expected a JSON object, got {}", value))
        })?;
        Ok(object
            .iter()
            .map(|(k, v)| (k.clone(), Value::from_json(v)))
            .collect())
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Row {
    type Item = (&'a String, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.iter()
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (column, value)) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", column, value)?;
        }
        write!(f, "}}")
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, value) in &self.columns {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Row {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let columns = IndexMap::<String, Value>::deserialize(deserializer)?;
        Ok(Self { columns })
    }
}

/// Sorted (column, value) pairs of a row; hashable
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowKey(Vec<(String, Value)>);

/// Return a normalized copy of `row`: every decimal field is truncated to an
/// integer and list fields are normalized element-wise. The input row is
/// left untouched so the same expected rows can be reused across strategies.
pub fn normalize(row: &Row) -> Row {
    row.iter()
        .map(|(column, value)| (column.to_string(), value.normalized()))
        .collect()
}

/// Normalize every row of a slice
pub fn normalize_all(rows: &[Row]) -> Vec<Row> {
    rows.iter().map(normalize).collect()
}
