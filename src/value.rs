//! dynamically typed values, produced and consumed by the generic codecs of [crate::translate]

use core::fmt;

/**
    application value of any CoE type

    The variant produced by decoding depends on the type's [Category](crate::types::Category):

    | category | value |
    |----------|-------|
    | `Bool` | [Value::Bool] |
    | `FixedInt` | [Value::Unsigned] or [Value::Signed] |
    | `Float32`, `Float64` | [Value::Float32], [Value::Float64] |
    | `BitArray` | [Value::Bits] |
    | `FixedString` | [Value::String] |
    | `Structural` | [Value::Struct], or [Value::Raw] for opaque structures |

    Arrays of numerics and strings decode to [Value::Array] of their element values.
*/
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Unsigned(u64),
    Signed(i64),
    Float32(f32),
    Float64(f64),
    Bits(Vec<bool>),
    String(String),
    Array(Vec<Value>),
    Struct(Vec<(String, Value)>),
    Raw(Vec<u8>),
}

impl Value {
    /// integer content, if the value is an integer or a boolean
    pub fn as_i128(&self) -> Option<i128> {
        match *self {
            Self::Bool(value) => Some(value.into()),
            Self::Unsigned(value) => Some(value.into()),
            Self::Signed(value) => Some(value.into()),
            _ => None,
        }
    }
    pub fn as_u64(&self) -> Option<u64> {
        self.as_i128().and_then(|value|  u64::try_from(value).ok())
    }
    pub fn as_i64(&self) -> Option<i64> {
        self.as_i128().and_then(|value|  i64::try_from(value).ok())
    }
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Self::Bool(value) => Some(value),
            Self::Unsigned(0) | Self::Signed(0) => Some(false),
            Self::Unsigned(1) | Self::Signed(1) => Some(true),
            _ => None,
        }
    }
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Float32(value) => Some(value.into()),
            Self::Float64(value) => Some(value),
            _ => self.as_i128().map(|value|  value as f64),
        }
    }
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }
    /// member of a structure value
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Self::Struct(fields) => fields.iter()
                .find(|(field, _)|  field == name)
                .map(|(_, value)|  value),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{}", value),
            Self::Unsigned(value) => write!(f, "{}", value),
            Self::Signed(value) => write!(f, "{}", value),
            Self::Float32(value) => write!(f, "{}", value),
            Self::Float64(value) => write!(f, "{}", value),
            Self::Bits(bits) => {
                write!(f, "0b")?;
                for bit in bits.iter().rev()  {write!(f, "{}", u8::from(*bit))?;}
                Ok(())
            },
            Self::String(value) => write!(f, "{:?}", value),
            Self::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i != 0  {write!(f, ", ")?;}
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            },
            Self::Struct(fields) => {
                write!(f, "{{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i != 0  {write!(f, ", ")?;}
                    write!(f, "{}: {}", name, value)?;
                }
                write!(f, "}}")
            },
            Self::Raw(bytes) => write!(f, "{:02x?}", bytes),
        }
    }
}

macro_rules! value_from {
    ($t: ty, $variant: ident, $inner: ty) => {
        impl From<$t> for Value {
            fn from(value: $t) -> Self  {Self::$variant(<$inner>::from(value))}
        }
    };
}
value_from!(bool, Bool, bool);
value_from!(u8, Unsigned, u64);
value_from!(u16, Unsigned, u64);
value_from!(u32, Unsigned, u64);
value_from!(u64, Unsigned, u64);
value_from!(i8, Signed, i64);
value_from!(i16, Signed, i64);
value_from!(i32, Signed, i64);
value_from!(i64, Signed, i64);
value_from!(f32, Float32, f32);
value_from!(f64, Float64, f64);
value_from!(&str, String, String);
value_from!(String, String, String);
value_from!(Vec<bool>, Bits, Vec<bool>);


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions() {
        assert_eq!(Value::from(42u16).as_u64(), Some(42));
        assert_eq!(Value::from(-3i8).as_u64(), None);
        assert_eq!(Value::from(-3i8).as_i64(), Some(-3));
        assert_eq!(Value::from(u64::MAX).as_i64(), None);
        assert_eq!(Value::Unsigned(1).as_bool(), Some(true));
        assert_eq!(Value::from(1.5f32).as_f64(), Some(1.5));
        assert_eq!(Value::from("abc").as_str(), Some("abc"));
    }

    #[test]
    fn display() {
        assert_eq!(Value::Bits(vec![true, false, false]).to_string(), "0b001");
        let record = Value::Struct(vec![
            ("a".into(), Value::Unsigned(1)),
            ("b".into(), Value::Array(vec![Value::Signed(-1), Value::Signed(2)])),
            ]);
        assert_eq!(record.to_string(), "{a: 1, b: [-1, 2]}");
        assert_eq!(record.field("a"), Some(&Value::Unsigned(1)));
    }
}
