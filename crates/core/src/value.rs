use crate::geo::GeoShape;
use crate::macros::Macro;
use crate::series::GeoTimeSeries;
use std::sync::Arc;

/// Value: What scripts talk about
///
/// A closed sum type over every kind of value an operator may push. Operators
/// match on it and fail with a type error on mismatch.
///
/// Every payload larger than a word sits behind `Arc`, so cloning a value, or
/// forking a whole stack, never copies strings, bytes or list contents.
#[derive(Debug, Clone)]
pub enum Value {
    /// Integer value (also used for timestamps and durations)
    Int(i64),

    /// Floating-point value (IEEE 754 double precision)
    Float(f64),

    /// Boolean value
    Bool(bool),

    /// UTF-8 string
    String(Arc<str>),

    /// Raw byte array
    Bytes(Arc<[u8]>),

    /// Geo time series
    Series(Arc<GeoTimeSeries>),

    /// Geographic shape
    Shape(Arc<GeoShape>),

    /// Executable macro (first-class code block)
    Macro(Arc<Macro>),

    /// Ordered list of values (nested stack)
    List(Arc<[Value]>),
}

// Macros compare by identity (Arc pointer comparison), everything else by content
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Series(a), Value::Series(b)) => a == b,
            (Value::Shape(a), Value::Shape(b)) => a == b,
            (Value::Macro(a), Value::Macro(b)) => Arc::ptr_eq(a, b),
            (Value::List(a), Value::List(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    /// Name of the value kind, as shown in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "LONG",
            Value::Float(_) => "DOUBLE",
            Value::Bool(_) => "BOOLEAN",
            Value::String(_) => "STRING",
            Value::Bytes(_) => "BYTES",
            Value::Series(_) => "GTS",
            Value::Shape(_) => "GEOSHAPE",
            Value::Macro(_) => "MACRO",
            Value::List(_) => "LIST",
        }
    }

    pub fn series(gts: GeoTimeSeries) -> Self {
        Value::Series(Arc::new(gts))
    }

    pub fn shape(shape: GeoShape) -> Self {
        Value::Shape(Arc::new(shape))
    }

    pub fn bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        Value::Bytes(bytes.into())
    }

    pub fn list(items: impl Into<Arc<[Value]>>) -> Self {
        Value::List(items.into())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

// Unsuffixed integer literals default to i32
impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.into())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v.into())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v.into())
    }
}

impl From<Macro> for Value {
    fn from(m: Macro) -> Self {
        Value::Macro(Arc::new(m))
    }
}
