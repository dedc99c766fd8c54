//! Hashable attribute values.
//!
//! `serde_json::Value` is neither `Eq` nor `Hash`, so row projections are
//! converted into `AttrValue` tuples before they are counted. Numbers are
//! normalized so that `1` and `1.0` (which different portal versions emit
//! for the same integer column) compare equal.

use serde_json::{Number, Value};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// Largest integer that round-trips exactly through an `f64`.
const MAX_EXACT_F64_INT: f64 = 9_007_199_254_740_992.0;

/// A single attribute value from a feature row.
#[derive(Debug, Clone)]
pub enum AttrValue {
    Null,
    Bool(bool),
    /// Any JSON integer; wide enough for both `i64` and `u64` values.
    Int(i128),
    Float(f64),
    Text(String),
    /// Arrays and objects, kept as their compact JSON text.
    Json(String),
}

impl AttrValue {
    /// Converts a JSON attribute into its hashable form.
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => Self::from_number(n),
            Value::String(s) => Self::Text(s.clone()),
            other => Self::Json(other.to_string()),
        }
    }

    fn from_number(n: &Number) -> Self {
        if let Some(i) = n.as_i64() {
            return Self::Int(i.into());
        }
        if let Some(u) = n.as_u64() {
            return Self::Int(u.into());
        }
        match n.as_f64() {
            Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() <= MAX_EXACT_F64_INT => {
                Self::Int(f as i128)
            }
            Some(f) => Self::Float(f),
            // Only reachable with serde_json's `arbitrary_precision`.
            None => Self::Text(n.to_string()),
        }
    }

    /// Converts back to JSON for reporting.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => i64::try_from(*i)
                .map(Number::from)
                .or_else(|_| u64::try_from(*i).map(Number::from))
                .map_or_else(|_| Value::String(i.to_string()), Value::Number),
            Self::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
            Self::Text(s) => Value::String(s.clone()),
            Self::Json(raw) => serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone())),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Int(_) => 2,
            Self::Float(_) => 3,
            Self::Text(_) => 4,
            Self::Json(_) => 5,
        }
    }
}

impl PartialEq for AttrValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for AttrValue {}

impl Hash for AttrValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Self::Null => {}
            Self::Bool(b) => b.hash(state),
            Self::Int(i) => i.hash(state),
            Self::Float(f) => f.to_bits().hash(state),
            Self::Text(s) | Self::Json(s) => s.hash(state),
        }
    }
}

impl PartialOrd for AttrValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AttrValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Text(a), Self::Text(b)) | (Self::Json(a), Self::Json(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl From<&Value> for AttrValue {
    fn from(value: &Value) -> Self {
        Self::from_json(value)
    }
}
