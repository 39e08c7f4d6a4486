//! Packstream: frame many MessagePack messages into one fixed-capacity buffer.
//!
//! This crate is built for telemetry hot paths where every span or event is encoded once
//! and shipped in batches:
//! - `Packer`: a MessagePack encoder over a buffer allocated once. It implements
//!   `Writable` (what mappers write through) and `MessageFormatter` (what callers drive).
//! - `Mapper`: turns one domain object into a fixed sequence of `Writable` calls.
//! - `ByteBufferConsumer`: receives each finished frame, a single MessagePack array
//!   holding every message written since the previous flush.
//!
//! A message that does not fit is rolled back, the frame so far is flushed, and the
//! message is retried against the empty buffer. Output already written is never
//! corrupted by a later message; a message larger than the whole buffer is reported
//! as `Error::MessageTooLarge`.
//!
//! Quick start
//!
//! ```
//! use packstream::{
//!     CachingStrategies, MessageFormatter, Packer, SinkError, Utf8Table, Value, Writable,
//!     WriteResult,
//! };
//!
//! struct Event<'a> {
//!     name: &'a str,
//!     duration: i64,
//! }
//!
//! let caches = CachingStrategies::new(Utf8Table::from_static(&["name", "duration"]), Utf8Table::new());
//! let mut delivered = 0u32;
//! {
//!     let sink = |count: u32, _frame: &[u8]| -> Result<(), SinkError> {
//!         delivered += count;
//!         Ok(())
//!     };
//!     let mut packer = Packer::with_capacity(sink, 4096);
//!     let mut mapper = |e: &Event<'_>, w: &mut dyn Writable| -> WriteResult {
//!         w.start_map(2)?;
//!         w.write_string("name", caches.constant_keys())?;
//!         w.write_string(e.name, caches.no_caching())?;
//!         w.write_string("duration", caches.constant_keys())?;
//!         w.write_object(&Value::I64(e.duration), caches.no_caching())
//!     };
//!     packer.format(&Event { name: "GET /", duration: 1200 }, &mut mapper).unwrap();
//!     packer.flush().unwrap();
//! }
//! assert_eq!(delivered, 1);
//! ```
pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod formatter;
pub mod generational;
pub mod packer;
pub mod util;
pub mod value;
pub mod writable;

mod buffer;
mod utf8;

// Re-export commonly used types at the crate root for convenient imports in tests and consumers
pub use cache::{CachingStrategies, EncodingCache, NoCaching, Utf8Table, NO_CACHING};
pub use codec::{Codec, TypeEncoder};
pub use config::PackerConfig;
pub use error::{Error, Overflow, Result, SinkError, WriteResult};
pub use formatter::{ByteBufferConsumer, Discard, MessageFormatter};
pub use generational::{CacheStats, GenerationalUtf8Cache};
pub use packer::Packer;
pub use value::{Value, ValueKind};
pub use writable::{Mapper, Writable};
