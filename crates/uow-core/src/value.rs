//! Normalized persistent values.
//!
//! `Value` is the wire-neutral representation the engine uses for snapshots,
//! primary keys, and change sets. It is deliberately smaller than a full SQL
//! type system — the engine only needs enough structure to compare two
//! observations of the same field for equality.

use std::hash::{Hash, Hasher};

/// A normalized, persistent-form value.
///
/// Relation fields are represented by the foreign-key value they resolve to,
/// never by the related entity itself — the engine never holds a `Value`
/// that points at another `Entity`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    TinyInt(i8),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Float(f32),
    Double(f64),
    Decimal(String),
    Text(String),
    Bytes(Vec<u8>),
    Date(String),
    Time(String),
    Timestamp(String),
    TimestampTz(String),
    Uuid(String),
    Json(serde_json::Value),
    Array(Vec<Value>),
}

/// Bit-pattern equality for floats, matching [`hash_value`]'s treatment:
/// `Value` is only ever compared to decide whether a snapshot changed, and a
/// derived `PartialEq` on f32/f64 (where NaN != NaN) would break the `Eq`
/// contract for `Value`s used as `HashMap`/`HashSet` keys.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::TinyInt(a), Value::TinyInt(b)) => a == b,
            (Value::SmallInt(a), Value::SmallInt(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Time(a), Value::Time(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::TimestampTz(a), Value::TimestampTz(b)) => a == b,
            (Value::Uuid(a), Value::Uuid(b)) => a == b,
            (Value::Json(a), Value::Json(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_value(self, state);
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl Value {
    /// True iff this value is `Null`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// Hash a slice of values, used to key a primary key tuple.
///
/// Floats are hashed via `to_bits` so that `Value` can implement `Eq`/`Hash`
/// without pretending NaN-equality is meaningful — two snapshots are only
/// ever compared for the purpose of deciding "did this field change", and a
/// bit-identical float never counts as changed.
#[must_use]
pub fn hash_values(values: &[Value]) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    let mut hasher = DefaultHasher::new();
    values.len().hash(&mut hasher);
    for v in values {
        hash_value(v, &mut hasher);
    }
    hasher.finish()
}

fn hash_value(v: &Value, hasher: &mut impl Hasher) {
    match v {
        Value::Null => 0u8.hash(hasher),
        Value::Bool(b) => {
            1u8.hash(hasher);
            b.hash(hasher);
        }
        Value::TinyInt(i) => {
            2u8.hash(hasher);
            i.hash(hasher);
        }
        Value::SmallInt(i) => {
            3u8.hash(hasher);
            i.hash(hasher);
        }
        Value::Int(i) => {
            4u8.hash(hasher);
            i.hash(hasher);
        }
        Value::BigInt(i) => {
            5u8.hash(hasher);
            i.hash(hasher);
        }
        Value::Float(f) => {
            6u8.hash(hasher);
            f.to_bits().hash(hasher);
        }
        Value::Double(f) => {
            7u8.hash(hasher);
            f.to_bits().hash(hasher);
        }
        Value::Decimal(s) => {
            8u8.hash(hasher);
            s.hash(hasher);
        }
        Value::Text(s) => {
            9u8.hash(hasher);
            s.hash(hasher);
        }
        Value::Bytes(b) => {
            10u8.hash(hasher);
            b.hash(hasher);
        }
        Value::Date(d) => {
            11u8.hash(hasher);
            d.hash(hasher);
        }
        Value::Time(t) => {
            12u8.hash(hasher);
            t.hash(hasher);
        }
        Value::Timestamp(ts) => {
            13u8.hash(hasher);
            ts.hash(hasher);
        }
        Value::TimestampTz(ts) => {
            14u8.hash(hasher);
            ts.hash(hasher);
        }
        Value::Uuid(u) => {
            15u8.hash(hasher);
            u.hash(hasher);
        }
        Value::Json(j) => {
            16u8.hash(hasher);
            j.to_string().hash(hasher);
        }
        Value::Array(arr) => {
            17u8.hash(hasher);
            arr.len().hash(hasher);
            for item in arr {
                hash_value(item, hasher);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_consistent_for_equal_values() {
        let a = vec![Value::BigInt(42)];
        let b = vec![Value::BigInt(42)];
        assert_eq!(hash_values(&a), hash_values(&b));
    }

    #[test]
    fn hash_differs_for_different_values() {
        let a = vec![Value::BigInt(42)];
        let b = vec![Value::BigInt(43)];
        assert_ne!(hash_values(&a), hash_values(&b));
    }

    #[test]
    fn hash_differs_for_different_variants_same_text() {
        let a = vec![Value::BigInt(42)];
        let b = vec![Value::Text("42".to_string())];
        assert_ne!(hash_values(&a), hash_values(&b));
    }

    #[test]
    fn null_is_not_equal_to_any_non_null() {
        assert_ne!(Value::Null, Value::Int(0));
        assert_ne!(Value::Null, Value::Text(String::new()));
    }

    #[test]
    fn nan_float_is_reflexively_equal_and_hashes_consistently() {
        // Derived PartialEq on f32/f64 would make this false (NaN != NaN),
        // which breaks the Eq contract HashMap/HashSet rely on for Value keys.
        let a = Value::Float(f32::NAN);
        let b = Value::Float(f32::NAN);
        assert_eq!(a, b);
        assert_eq!(hash_values(&[a]), hash_values(&[b]));
    }

    #[test]
    fn json_equality_is_structural() {
        let a = Value::Json(serde_json::json!({"a": 1, "b": [1,2]}));
        let b = Value::Json(serde_json::json!({"b": [1,2], "a": 1}));
        assert_eq!(a, b);
    }
}
