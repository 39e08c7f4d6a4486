//! The closed set of value shapes the packer can encode.
//!
//! Domain objects are converted into a [`Value`] at the boundary, so the hot encoding
//! loop matches on a tag instead of inspecting types. Values borrow their payloads;
//! building one never allocates.

use std::fmt;

use uuid::Uuid;

/// A dynamically-typed value borrowed from the caller.
#[derive(Clone, Copy)]
pub enum Value<'a> {
    Null,
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Str(&'a str),
    /// UTF-16 code units (a character array). Encoded as a string.
    Utf16(&'a [u16]),
    /// Raw bytes. Encoded as MessagePack binary, never as an array of ints.
    Bytes(&'a [u8]),
    /// Encoded as 16 bytes of binary.
    Uuid(Uuid),
    I16Array(&'a [i16]),
    I32Array(&'a [i32]),
    I64Array(&'a [i64]),
    F32Array(&'a [f32]),
    F64Array(&'a [f64]),
    BoolArray(&'a [bool]),
    /// String-keyed entries.
    Map(&'a [(&'a str, Value<'a>)]),
    Array(&'a [Value<'a>]),
    /// Anything else. Encoded as its `Display` rendering.
    Other(&'a dyn fmt::Display),
}

/// The tag of a [`Value`], used as the registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    I16,
    I32,
    I64,
    U64,
    F32,
    F64,
    Str,
    Utf16,
    Bytes,
    Uuid,
    I16Array,
    I32Array,
    I64Array,
    F32Array,
    F64Array,
    BoolArray,
    Map,
    Array,
    Other,
}

impl ValueKind {
    pub const COUNT: usize = 21;

    pub const ALL: [ValueKind; Self::COUNT] = [
        ValueKind::Null,
        ValueKind::Bool,
        ValueKind::I16,
        ValueKind::I32,
        ValueKind::I64,
        ValueKind::U64,
        ValueKind::F32,
        ValueKind::F64,
        ValueKind::Str,
        ValueKind::Utf16,
        ValueKind::Bytes,
        ValueKind::Uuid,
        ValueKind::I16Array,
        ValueKind::I32Array,
        ValueKind::I64Array,
        ValueKind::F32Array,
        ValueKind::F64Array,
        ValueKind::BoolArray,
        ValueKind::Map,
        ValueKind::Array,
        ValueKind::Other,
    ];

    #[inline(always)]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl<'a> Value<'a> {
    #[inline]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::I16(_) => ValueKind::I16,
            Value::I32(_) => ValueKind::I32,
            Value::I64(_) => ValueKind::I64,
            Value::U64(_) => ValueKind::U64,
            Value::F32(_) => ValueKind::F32,
            Value::F64(_) => ValueKind::F64,
            Value::Str(_) => ValueKind::Str,
            Value::Utf16(_) => ValueKind::Utf16,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::Uuid(_) => ValueKind::Uuid,
            Value::I16Array(_) => ValueKind::I16Array,
            Value::I32Array(_) => ValueKind::I32Array,
            Value::I64Array(_) => ValueKind::I64Array,
            Value::F32Array(_) => ValueKind::F32Array,
            Value::F64Array(_) => ValueKind::F64Array,
            Value::BoolArray(_) => ValueKind::BoolArray,
            Value::Map(_) => ValueKind::Map,
            Value::Array(_) => ValueKind::Array,
            Value::Other(_) => ValueKind::Other,
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Debug for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
            Value::I16(v) => f.debug_tuple("I16").field(v).finish(),
            Value::I32(v) => f.debug_tuple("I32").field(v).finish(),
            Value::I64(v) => f.debug_tuple("I64").field(v).finish(),
            Value::U64(v) => f.debug_tuple("U64").field(v).finish(),
            Value::F32(v) => f.debug_tuple("F32").field(v).finish(),
            Value::F64(v) => f.debug_tuple("F64").field(v).finish(),
            Value::Str(v) => f.debug_tuple("Str").field(v).finish(),
            Value::Utf16(v) => f
                .debug_tuple("Utf16")
                .field(&String::from_utf16_lossy(v))
                .finish(),
            Value::Bytes(v) => f.debug_tuple("Bytes").field(v).finish(),
            Value::Uuid(v) => f.debug_tuple("Uuid").field(v).finish(),
            Value::I16Array(v) => f.debug_tuple("I16Array").field(v).finish(),
            Value::I32Array(v) => f.debug_tuple("I32Array").field(v).finish(),
            Value::I64Array(v) => f.debug_tuple("I64Array").field(v).finish(),
            Value::F32Array(v) => f.debug_tuple("F32Array").field(v).finish(),
            Value::F64Array(v) => f.debug_tuple("F64Array").field(v).finish(),
            Value::BoolArray(v) => f.debug_tuple("BoolArray").field(v).finish(),
            Value::Map(v) => f.debug_tuple("Map").field(v).finish(),
            Value::Array(v) => f.debug_tuple("Array").field(v).finish(),
            Value::Other(v) => f.debug_tuple("Other").field(&v.to_string()).finish(),
        }
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value<'_> {
                #[inline]
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from_scalar!(
    bool => Bool,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    Uuid => Uuid,
);

macro_rules! impl_from_slice {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl<'a> From<&'a [$ty]> for Value<'a> {
                #[inline]
                fn from(v: &'a [$ty]) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from_slice!(
    u8 => Bytes,
    u16 => Utf16,
    i16 => I16Array,
    i32 => I32Array,
    i64 => I64Array,
    f32 => F32Array,
    f64 => F64Array,
    bool => BoolArray,
);

impl<'a> From<&'a str> for Value<'a> {
    #[inline]
    fn from(s: &'a str) -> Self {
        Value::Str(s)
    }
}

impl<'a> From<&'a [Value<'a>]> for Value<'a> {
    #[inline]
    fn from(v: &'a [Value<'a>]) -> Self {
        Value::Array(v)
    }
}

impl<'a> From<&'a [(&'a str, Value<'a>)]> for Value<'a> {
    #[inline]
    fn from(v: &'a [(&'a str, Value<'a>)]) -> Self {
        Value::Map(v)
    }
}

impl<'a, T> From<Option<T>> for Value<'a>
where
    T: Into<Value<'a>>,
{
    #[inline]
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
