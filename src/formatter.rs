use crate::error::{Result, SinkError};
use crate::writable::Mapper;

/// Drives repeated message encoding into a frame and hands finished frames to a sink.
pub trait MessageFormatter {
    /// Encode one message. A full buffer is flushed and the message retried once;
    /// a message that does not fit an empty buffer is an error.
    fn format<T, M>(&mut self, message: &T, mapper: &mut M) -> Result<()>
    where
        T: ?Sized,
        M: Mapper<T> + ?Sized;

    /// Finalize the frame header and deliver the frame to the sink.
    fn flush(&mut self) -> Result<()>;
}

/// Receives finished frames.
///
/// `frame` is a complete MessagePack array of `message_count` items. It borrows the
/// encoder's buffer, which is reused as soon as `accept` returns: copy or drain it
/// before returning.
pub trait ByteBufferConsumer {
    fn accept(&mut self, message_count: u32, frame: &[u8]) -> std::result::Result<(), SinkError>;
}

impl<F> ByteBufferConsumer for F
where
    F: FnMut(u32, &[u8]) -> std::result::Result<(), SinkError>,
{
    #[inline]
    fn accept(&mut self, message_count: u32, frame: &[u8]) -> std::result::Result<(), SinkError> {
        self(message_count, frame)
    }
}

/// Sink that drops every frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct Discard;

impl ByteBufferConsumer for Discard {
    #[inline]
    fn accept(&mut self, _message_count: u32, _frame: &[u8]) -> std::result::Result<(), SinkError> {
        Ok(())
    }
}
