use bytes::Buf;

use crate::cache::EncodingCache;
use crate::error::WriteResult;
use crate::value::Value;

/// The output surface a [`Mapper`] writes one message through.
///
/// Every method writes a complete MessagePack item or fails with
/// [`Overflow`](crate::Overflow) when the buffer is full; mappers propagate that with `?`
/// and the framer takes care of recovery.
///
/// `start_map(n)` and `start_array(n)` only write a header. The caller must follow a map
/// header with exactly `n` key/value pairs and an array header with exactly `n` items.
/// This is not checked; a mismatch yields a structurally invalid stream.
pub trait Writable {
    fn write_null(&mut self) -> WriteResult;

    fn write_boolean(&mut self, value: bool) -> WriteResult;

    /// Encode any value through the type registry.
    fn write_object(&mut self, value: &Value<'_>, cache: &dyn EncodingCache) -> WriteResult;

    /// Write a string, using `cache` to skip encoding when it knows the string.
    fn write_string(&mut self, s: &str, cache: &dyn EncodingCache) -> WriteResult;

    /// Write UTF-16 code units as a UTF-8 string. Unpaired surrogates become `?`.
    fn write_utf16(&mut self, units: &[u16]) -> WriteResult;

    /// Write bytes that are already valid UTF-8 as a string.
    fn write_utf8(&mut self, utf8: &[u8]) -> WriteResult;

    fn write_binary(&mut self, binary: &[u8]) -> WriteResult;

    /// Write the remaining bytes of `binary` as one binary item, consuming them.
    fn write_binary_buf(&mut self, binary: &mut dyn Buf) -> WriteResult;

    fn write_int(&mut self, value: i32) -> WriteResult;

    fn write_long(&mut self, value: i64) -> WriteResult;

    fn write_unsigned_long(&mut self, value: u64) -> WriteResult;

    /// Write an integer as its decimal string rather than as a MessagePack integer.
    fn write_long_as_string(&mut self, value: i64) -> WriteResult;

    fn write_float(&mut self, value: f32) -> WriteResult;

    fn write_double(&mut self, value: f64) -> WriteResult;

    fn start_map(&mut self, element_count: u32) -> WriteResult;

    fn start_array(&mut self, element_count: u32) -> WriteResult;

    /// Write string-keyed entries as a map. Keys use `cache`, values go through the registry.
    fn write_map(&mut self, entries: &[(&str, Value<'_>)], cache: &dyn EncodingCache) -> WriteResult {
        self.start_map(len_u32(entries.len())?)?;
        for (key, value) in entries {
            self.write_string(key, cache)?;
            self.write_object(value, cache)?;
        }
        Ok(())
    }
}

/// Maps one domain object to a fixed sequence of [`Writable`] calls.
pub trait Mapper<T: ?Sized> {
    fn map(&mut self, message: &T, writable: &mut dyn Writable) -> WriteResult;

    /// Called before a message is replayed after an overflow, so mappers holding
    /// per-message state can start over.
    fn reset(&mut self) {}
}

impl<T, F> Mapper<T> for F
where
    T: ?Sized,
    F: FnMut(&T, &mut dyn Writable) -> WriteResult,
{
    #[inline]
    fn map(&mut self, message: &T, writable: &mut dyn Writable) -> WriteResult {
        self(message, writable)
    }
}

/// Collection lengths travel as u32 on the wire. Anything longer cannot fit any buffer.
#[inline]
pub(crate) fn len_u32(len: usize) -> Result<u32, crate::Overflow> {
    u32::try_from(len).map_err(|_| crate::Overflow)
}
