use bytes::Buf;
use tracing::{debug, trace};

use crate::buffer::{FrameBuffer, MAX_ARRAY_HEADER_SIZE};
use crate::cache::EncodingCache;
use crate::codec::Codec;
use crate::config::PackerConfig;
use crate::error::{Error, Overflow, Result, WriteResult};
use crate::formatter::{ByteBufferConsumer, MessageFormatter};
use crate::utf8::{self, SCRATCH_SIZE};
use crate::util::{self, MAX_I64_DIGITS};
use crate::value::Value;
use crate::writable::{len_u32, Mapper, Writable};

// see https://github.com/msgpack/msgpack/blob/master/spec.md
pub const NIL: u8 = 0xC0;

pub const FALSE: u8 = 0xC2;
pub const TRUE: u8 = 0xC3;

pub const UINT8: u8 = 0xCC;
pub const UINT16: u8 = 0xCD;
pub const UINT32: u8 = 0xCE;
pub const UINT64: u8 = 0xCF;

pub const INT8: u8 = 0xD0;
pub const INT16: u8 = 0xD1;
pub const INT32: u8 = 0xD2;
pub const INT64: u8 = 0xD3;

pub const FLOAT32: u8 = 0xCA;
pub const FLOAT64: u8 = 0xCB;

pub const STR8: u8 = 0xD9;
pub const STR16: u8 = 0xDA;
pub const STR32: u8 = 0xDB;

pub const BIN8: u8 = 0xC4;
pub const BIN16: u8 = 0xC5;
pub const BIN32: u8 = 0xC6;

pub const ARRAY16: u8 = 0xDC;
pub const ARRAY32: u8 = 0xDD;

pub const MAP16: u8 = 0xDE;
pub const MAP32: u8 = 0xDF;

pub const NEGFIXNUM: u8 = 0xE0;
pub const FIXSTR: u8 = 0xA0;
pub const FIXARRAY: u8 = 0x90;
pub const FIXMAP: u8 = 0x80;

/// Largest number of messages one frame can announce.
pub const MAX_MESSAGE_COUNT: u32 = u32::MAX;

/// String header width classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StrClass {
    Fix,
    Str8,
    Str16,
    Str32,
}

impl StrClass {
    #[inline]
    fn of(len: u32) -> Self {
        if len < 0x20 {
            StrClass::Fix
        } else if len < 0x100 {
            StrClass::Str8
        } else if len < 0x10000 {
            StrClass::Str16
        } else {
            StrClass::Str32
        }
    }
}

/// MessagePack encoder over one fixed-capacity buffer, framing messages for a sink.
///
/// The buffer is allocated once. Each frame reserves five bytes up front so the outer
/// array header, whose width depends on the final message count, can be written
/// backwards at flush time without moving any payload.
///
/// Not thread-safe: use one `Packer` per producing thread.
///
/// ```
/// use packstream::{MessageFormatter, Packer, SinkError, Writable, WriteResult};
///
/// let mut frames = Vec::new();
/// {
///     let sink = |count: u32, frame: &[u8]| -> Result<(), SinkError> {
///         frames.push((count, frame.to_vec()));
///         Ok(())
///     };
///     let mut packer = Packer::with_capacity(sink, 64);
///     let mut mapper = |n: &i64, w: &mut dyn Writable| -> WriteResult { w.write_long(*n) };
///     packer.format(&1i64, &mut mapper).unwrap();
///     packer.format(&300i64, &mut mapper).unwrap();
///     packer.flush().unwrap();
/// }
/// assert_eq!(frames, vec![(2, vec![0x92, 0x01, 0xCD, 0x01, 0x2C])]);
/// ```
pub struct Packer<S> {
    codec: Codec,
    sink: S,
    buffer: FrameBuffer,
    message_count: u32,
    scratch: [u8; SCRATCH_SIZE],
}

impl<S: ByteBufferConsumer> Packer<S> {
    /// Create a packer whose buffer holds `capacity` bytes including the frame header.
    pub fn with_capacity(sink: S, capacity: usize) -> Self {
        Self::with_codec(Codec::new(), sink, capacity)
    }

    /// Like [`with_capacity`](Self::with_capacity) with a caller-built registry.
    pub fn with_codec(codec: Codec, sink: S, capacity: usize) -> Self {
        Self {
            codec,
            sink,
            buffer: FrameBuffer::with_capacity(capacity),
            message_count: 0,
            scratch: [0u8; SCRATCH_SIZE],
        }
    }

    /// Validate `config` and build a packer from it.
    pub fn from_config(config: &PackerConfig, sink: S) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_capacity(sink, config.buffer_capacity))
    }

    /// Total buffer size, frame header reservation included.
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Messages in the current, unflushed frame.
    pub fn message_count(&self) -> u32 {
        self.message_count
    }

    /// Payload bytes committed to the current frame.
    pub fn frame_len(&self) -> usize {
        self.buffer.mark() - MAX_ARRAY_HEADER_SIZE
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Drop the current frame and return the sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    #[inline]
    fn commit(&mut self) {
        self.buffer.commit();
        self.message_count += 1;
    }

    #[inline]
    fn write_string_header(&mut self, len: u32) -> WriteResult {
        match StrClass::of(len) {
            StrClass::Fix => self.buffer.put_u8(FIXSTR | len as u8),
            StrClass::Str8 => self.buffer.put_tagged_u8(STR8, len as u8),
            StrClass::Str16 => self.buffer.put_tagged_u16(STR16, len as u16),
            StrClass::Str32 => self.buffer.put_tagged_u32(STR32, len),
        }
    }

    #[inline]
    fn write_binary_header(&mut self, len: u32) -> WriteResult {
        if len < 0x100 {
            self.buffer.put_tagged_u8(BIN8, len as u8)
        } else if len < 0x10000 {
            self.buffer.put_tagged_u16(BIN16, len as u16)
        } else {
            self.buffer.put_tagged_u32(BIN32, len)
        }
    }

    #[inline]
    fn write_array_header(&mut self, len: u32) -> WriteResult {
        if len < 0x10 {
            self.buffer.put_u8(FIXARRAY | len as u8)
        } else if len < 0x10000 {
            self.buffer.put_tagged_u16(ARRAY16, len as u16)
        } else {
            self.buffer.put_tagged_u32(ARRAY32, len)
        }
    }

    #[inline]
    fn write_map_header(&mut self, len: u32) -> WriteResult {
        if len < 0x10 {
            self.buffer.put_u8(FIXMAP | len as u8)
        } else if len < 0x10000 {
            self.buffer.put_tagged_u16(MAP16, len as u16)
        } else {
            self.buffer.put_tagged_u32(MAP32, len)
        }
    }

    /// Rewrite the length of a string header written at `mark` without changing its class.
    fn fix_string_header_in_place(&mut self, mark: usize, class: StrClass, actual: u32) {
        match class {
            StrClass::Fix => self.buffer.patch(mark, &[FIXSTR | actual as u8]),
            StrClass::Str8 => self.buffer.patch(mark + 1, &[actual as u8]),
            StrClass::Str16 => self.buffer.patch(mark + 1, &(actual as u16).to_be_bytes()),
            StrClass::Str32 => self.buffer.patch(mark + 1, &actual.to_be_bytes()),
        }
    }

    /// Write a string whose UTF-8 length is only known after encoding.
    ///
    /// The header is sized for the unit count, which never exceeds the byte count. If
    /// the real length lands in the same header class the header is patched in place;
    /// otherwise the string is written again behind a wider header.
    fn write_utf16_optimistic(&mut self, units: &[u16]) -> WriteResult {
        let estimate = len_u32(units.len())?;
        let mark = self.buffer.position();
        self.write_string_header(estimate)?;
        let actual = utf8::encode(units, &mut self.buffer, &mut self.scratch)?;
        let actual = len_u32(actual)?;
        if actual != estimate {
            let written = StrClass::of(estimate);
            let required = StrClass::of(actual);
            if written == required {
                self.fix_string_header_in_place(mark, required, actual);
            } else {
                self.buffer.set_position(mark);
                self.write_string_header(actual)?;
                utf8::encode(units, &mut self.buffer, &mut self.scratch)?;
            }
        }
        Ok(())
    }

    /// Run `mapper` and commit the message if it fit.
    fn try_format<T, M>(&mut self, message: &T, mapper: &mut M) -> WriteResult
    where
        T: ?Sized,
        M: Mapper<T> + ?Sized,
    {
        match mapper.map(message, self) {
            Ok(()) => {
                self.commit();
                Ok(())
            }
            Err(overflow) => {
                // go back to the last successfully written message
                self.buffer.rewind();
                Err(overflow)
            }
        }
    }

    fn too_large(&self) -> Error {
        let capacity = self.buffer.capacity();
        debug!(
            capacity,
            "dropping message because its serialized size exceeds the buffer"
        );
        Error::MessageTooLarge { capacity }
    }
}

/// Where the outer array header starts so that it ends exactly at the reservation.
#[inline]
fn header_offset(message_count: u32) -> usize {
    if message_count < 0x10 {
        4
    } else if message_count < 0x10000 {
        2
    } else {
        0
    }
}

impl<S: ByteBufferConsumer> MessageFormatter for Packer<S> {
    fn format<T, M>(&mut self, message: &T, mapper: &mut M) -> Result<()>
    where
        T: ?Sized,
        M: Mapper<T> + ?Sized,
    {
        if self.message_count == MAX_MESSAGE_COUNT {
            self.flush()?;
        }
        if self.try_format(message, mapper).is_ok() {
            return Ok(());
        }
        if self.buffer.is_frame_empty() {
            return Err(self.too_large());
        }
        debug!(
            messages = self.message_count,
            bytes = self.frame_len(),
            "buffer full, flushing frame before retrying message"
        );
        self.flush()?;
        mapper.reset();
        self.try_format(message, mapper).map_err(|_| self.too_large())
    }

    fn flush(&mut self) -> Result<()> {
        let message_count = self.message_count;
        if message_count == 0 {
            trace!("skipping flush of empty frame");
            return Ok(());
        }
        let start = header_offset(message_count);
        let header = match message_count {
            n if n < 0x10 => [FIXARRAY | n as u8, 0, 0, 0, 0],
            n if n < 0x10000 => {
                let [hi, lo] = (n as u16).to_be_bytes();
                [ARRAY16, hi, lo, 0, 0]
            }
            n => {
                let [a, b, c, d] = n.to_be_bytes();
                [ARRAY32, a, b, c, d]
            }
        };
        self.buffer
            .patch(start, &header[..MAX_ARRAY_HEADER_SIZE - start]);
        let frame = self.buffer.committed_from(start);
        trace!(messages = message_count, bytes = frame.len(), "delivering frame");
        let delivered = self.sink.accept(message_count, frame);
        self.buffer.reset();
        self.message_count = 0;
        delivered.map_err(|source| Error::Sink {
            message_count,
            source,
        })
    }
}

impl<S: ByteBufferConsumer> Writable for Packer<S> {
    #[inline]
    fn write_null(&mut self) -> WriteResult {
        self.buffer.put_u8(NIL)
    }

    #[inline]
    fn write_boolean(&mut self, value: bool) -> WriteResult {
        self.buffer.put_u8(if value { TRUE } else { FALSE })
    }

    fn write_object(&mut self, value: &Value<'_>, cache: &dyn EncodingCache) -> WriteResult {
        if value.is_null() {
            return self.write_null();
        }
        let encoder = self.codec.get(value.kind());
        encoder(value, self, cache)
    }

    fn write_string(&mut self, s: &str, cache: &dyn EncodingCache) -> WriteResult {
        match cache.encode(s) {
            Some(utf8) => self.write_utf8(&utf8),
            None => self.write_utf8(s.as_bytes()),
        }
    }

    fn write_utf16(&mut self, units: &[u16]) -> WriteResult {
        self.write_utf16_optimistic(units)
    }

    #[inline]
    fn write_utf8(&mut self, utf8: &[u8]) -> WriteResult {
        self.write_string_header(len_u32(utf8.len())?)?;
        self.buffer.put_slice(utf8)
    }

    #[inline]
    fn write_binary(&mut self, binary: &[u8]) -> WriteResult {
        self.write_binary_header(len_u32(binary.len())?)?;
        self.buffer.put_slice(binary)
    }

    fn write_binary_buf(&mut self, binary: &mut dyn Buf) -> WriteResult {
        let len = binary.remaining();
        self.write_binary_header(len_u32(len)?)?;
        if len > self.buffer.remaining() {
            return Err(Overflow);
        }
        while binary.has_remaining() {
            let chunk = binary.chunk();
            let n = chunk.len();
            self.buffer.put_slice(chunk)?;
            binary.advance(n);
        }
        Ok(())
    }

    fn write_int(&mut self, value: i32) -> WriteResult {
        if value < 0 {
            match (!value).leading_zeros() {
                0..=16 => self.buffer.put_tagged_u32(INT32, value as u32),
                17..=24 => self.buffer.put_tagged_u16(INT16, value as u16),
                25 | 26 => self.buffer.put_tagged_u8(INT8, value as u8),
                _ => self.buffer.put_u8(NEGFIXNUM | value as u8),
            }
        } else {
            match value.leading_zeros() {
                0..=15 => self.buffer.put_tagged_u32(UINT32, value as u32),
                16..=23 => self.buffer.put_tagged_u16(UINT16, value as u16),
                24 => self.buffer.put_tagged_u8(UINT8, value as u8),
                _ => self.buffer.put_u8(value as u8),
            }
        }
    }

    fn write_long(&mut self, value: i64) -> WriteResult {
        if value < 0 {
            match (!value).leading_zeros() {
                0..=32 => self.buffer.put_tagged_u64(INT64, value as u64),
                33..=48 => self.buffer.put_tagged_u32(INT32, value as u32),
                49..=56 => self.buffer.put_tagged_u16(INT16, value as u16),
                57 | 58 => self.buffer.put_tagged_u8(INT8, value as u8),
                _ => self.buffer.put_u8(NEGFIXNUM | value as u8),
            }
        } else {
            self.write_unsigned_long(value as u64)
        }
    }

    fn write_unsigned_long(&mut self, value: u64) -> WriteResult {
        match value.leading_zeros() {
            0..=31 => self.buffer.put_tagged_u64(UINT64, value),
            32..=47 => self.buffer.put_tagged_u32(UINT32, value as u32),
            48..=55 => self.buffer.put_tagged_u16(UINT16, value as u16),
            56 => self.buffer.put_tagged_u8(UINT8, value as u8),
            _ => self.buffer.put_u8(value as u8),
        }
    }

    fn write_long_as_string(&mut self, value: i64) -> WriteResult {
        let mut digits = [0u8; MAX_I64_DIGITS];
        let ascii = util::format_i64(value, &mut digits);
        self.write_string_header(ascii.len() as u32)?;
        self.buffer.put_slice(ascii)
    }

    #[inline]
    fn write_float(&mut self, value: f32) -> WriteResult {
        let [a, b, c, d] = value.to_bits().to_be_bytes();
        self.buffer.put_slice(&[FLOAT32, a, b, c, d])
    }

    #[inline]
    fn write_double(&mut self, value: f64) -> WriteResult {
        self.buffer.put_tagged_u64(FLOAT64, value.to_bits())
    }

    #[inline]
    fn start_map(&mut self, element_count: u32) -> WriteResult {
        self.write_map_header(element_count)
    }

    #[inline]
    fn start_array(&mut self, element_count: u32) -> WriteResult {
        self.write_array_header(element_count)
    }
}
