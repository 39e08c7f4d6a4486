//! Error types.
//!
//! Two levels of failure exist:
//! - [`Overflow`]: a single write did not fit in the remaining buffer space. Every
//!   [`Writable`](crate::Writable) method returns it, and mappers propagate it with `?`.
//!   The framer recovers from it by flushing and retrying.
//! - [`Error`]: what the framer reports to its caller once recovery is impossible,
//!   plus sink and configuration failures.

use thiserror::Error;

/// A write would have exceeded the buffer limit. Nothing was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("buffer overflow")]
pub struct Overflow;

/// Error returned by a [`ByteBufferConsumer`](crate::ByteBufferConsumer).
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// Result of a single `Writable` call.
pub type WriteResult = std::result::Result<(), Overflow>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("message does not fit in an empty buffer of {capacity} bytes")]
    MessageTooLarge { capacity: usize },

    #[error("sink rejected frame of {message_count} messages")]
    Sink {
        message_count: u32,
        #[source]
        source: SinkError,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
