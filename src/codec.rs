//! Type encoder registry.
//!
//! MessagePack only knows nil, bool, integers, floats, strings, binary, arrays and
//! maps, so every [`ValueKind`] has to be mapped onto one of those:
//!
//! - scalar numerics keep their width
//! - primitive arrays become arrays; UTF-16 becomes a string, bytes and UUIDs binary
//! - maps are written with string keys, arrays recurse per element
//! - anything else is written as its `Display` rendering
//!
//! Each kind is resolved at most once per [`Codec`]; later lookups hit the memo table.

use std::fmt;

use crate::cache::EncodingCache;
use crate::error::WriteResult;
use crate::value::{Value, ValueKind};
use crate::writable::{len_u32, Writable};

/// Encodes one shape of [`Value`].
///
/// An encoder is registered for a single kind. Built-in encoders handed a value of
/// another kind fall back to its string rendering, so a map entry never loses its value.
pub type TypeEncoder = fn(&Value<'_>, &mut dyn Writable, &dyn EncodingCache) -> WriteResult;

/// Per-writer registry from [`ValueKind`] to [`TypeEncoder`].
///
/// A `Codec` is owned by exactly one packer. Cloning one copies its memo table.
#[derive(Clone)]
pub struct Codec {
    overrides: [Option<TypeEncoder>; ValueKind::COUNT],
    resolved: [Option<TypeEncoder>; ValueKind::COUNT],
}

impl Default for Codec {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let resolved = self.resolved.iter().filter(|e| e.is_some()).count();
        let overrides = self.overrides.iter().filter(|e| e.is_some()).count();
        f.debug_struct("Codec")
            .field("resolved", &resolved)
            .field("overrides", &overrides)
            .finish()
    }
}

impl Codec {
    pub fn new() -> Self {
        Self {
            overrides: [None; ValueKind::COUNT],
            resolved: [None; ValueKind::COUNT],
        }
    }

    /// Build a registry where the given encoders take precedence over the built-in ones.
    pub fn with_overrides(overrides: impl IntoIterator<Item = (ValueKind, TypeEncoder)>) -> Self {
        let mut codec = Self::new();
        for (kind, encoder) in overrides {
            codec.overrides[kind.index()] = Some(encoder);
        }
        codec
    }

    /// Look up the encoder for `kind`, resolving and memoizing it on first use.
    #[inline]
    pub fn get(&mut self, kind: ValueKind) -> TypeEncoder {
        let slot = &mut self.resolved[kind.index()];
        match slot {
            Some(encoder) => *encoder,
            None => {
                let encoder = self.overrides[kind.index()].unwrap_or_else(|| resolve(kind));
                *slot = Some(encoder);
                encoder
            }
        }
    }

    /// Number of kinds resolved so far.
    pub fn resolved_count(&self) -> usize {
        self.resolved.iter().filter(|e| e.is_some()).count()
    }
}

/// Built-in encoder for `kind`.
fn resolve(kind: ValueKind) -> TypeEncoder {
    match kind {
        ValueKind::Null => write_null,
        ValueKind::Bool => write_bool,
        ValueKind::I16 => write_i16,
        ValueKind::I32 => write_i32,
        ValueKind::I64 => write_i64,
        ValueKind::U64 => write_u64,
        ValueKind::F32 => write_f32,
        ValueKind::F64 => write_f64,
        ValueKind::Str => write_str,
        ValueKind::Utf16 => write_utf16,
        ValueKind::Bytes => write_bytes,
        ValueKind::Uuid => write_uuid,
        ValueKind::I16Array => write_i16_array,
        ValueKind::I32Array => write_i32_array,
        ValueKind::I64Array => write_i64_array,
        ValueKind::F32Array => write_f32_array,
        ValueKind::F64Array => write_f64_array,
        ValueKind::BoolArray => write_bool_array,
        ValueKind::Map => write_map,
        ValueKind::Array => write_array,
        ValueKind::Other => write_display,
    }
}

fn write_null(_: &Value<'_>, w: &mut dyn Writable, _: &dyn EncodingCache) -> WriteResult {
    w.write_null()
}

macro_rules! value_encoder {
    ($name:ident, $variant:ident, |$w:ident, $x:ident, $cache:ident| $write:expr) => {
        fn $name(v: &Value<'_>, $w: &mut dyn Writable, $cache: &dyn EncodingCache) -> WriteResult {
            match *v {
                Value::$variant($x) => $write,
                other => write_display(&other, $w, $cache),
            }
        }
    };
}

value_encoder!(write_bool, Bool, |w, x, cache| w.write_boolean(x));
value_encoder!(write_i16, I16, |w, x, cache| w.write_int(i32::from(x)));
value_encoder!(write_i32, I32, |w, x, cache| w.write_int(x));
value_encoder!(write_i64, I64, |w, x, cache| w.write_long(x));
value_encoder!(write_u64, U64, |w, x, cache| w.write_unsigned_long(x));
value_encoder!(write_f32, F32, |w, x, cache| w.write_float(x));
value_encoder!(write_f64, F64, |w, x, cache| w.write_double(x));
value_encoder!(write_str, Str, |w, s, cache| w.write_string(s, cache));
value_encoder!(write_utf16, Utf16, |w, units, cache| w.write_utf16(units));
value_encoder!(write_bytes, Bytes, |w, b, cache| w.write_binary(b));
value_encoder!(write_uuid, Uuid, |w, id, cache| w.write_binary(id.as_bytes()));
value_encoder!(write_map, Map, |w, entries, cache| w.write_map(entries, cache));

macro_rules! array_encoder {
    ($name:ident, $variant:ident, |$w:ident, $x:ident| $write:expr) => {
        value_encoder!($name, $variant, |$w, items, cache| {
            $w.start_array(len_u32(items.len())?)?;
            for &$x in items.iter() {
                $write?;
            }
            Ok(())
        });
    };
}

array_encoder!(write_i16_array, I16Array, |w, x| w.write_int(i32::from(x)));
array_encoder!(write_i32_array, I32Array, |w, x| w.write_int(x));
array_encoder!(write_i64_array, I64Array, |w, x| w.write_long(x));
array_encoder!(write_f32_array, F32Array, |w, x| w.write_float(x));
array_encoder!(write_f64_array, F64Array, |w, x| w.write_double(x));
array_encoder!(write_bool_array, BoolArray, |w, x| w.write_boolean(x));

value_encoder!(write_array, Array, |w, items, cache| {
    w.start_array(len_u32(items.len())?)?;
    for item in items.iter() {
        w.write_object(item, cache)?;
    }
    Ok(())
});

fn write_display(v: &Value<'_>, w: &mut dyn Writable, cache: &dyn EncodingCache) -> WriteResult {
    match v {
        Value::Other(d) => w.write_string(&d.to_string(), cache),
        other => w.write_string(&format!("{other:?}"), cache),
    }
}
