//! Pre-encoded UTF-8 lookups for recurring strings.
//!
//! A cache hit lets the packer skip straight to a header plus one copy. Callers pick
//! the strategy per write call, so a single message can mix field names from the
//! constant-key table, tag values from the constant-value table, and dynamic strings
//! that bypass caching altogether.
//!
//! Entries are handed out as [`Bytes`], so a cache that evicts or promotes entries
//! while it is read (see [`GenerationalUtf8Cache`](crate::GenerationalUtf8Cache)) never
//! invalidates bytes a writer is still copying.

use std::collections::HashMap;

use bytes::Bytes;

/// Lookup from a string to its UTF-8 bytes.
///
/// A `Some` result must be exactly the UTF-8 encoding of `s`. `None` only means
/// "encode it live".
pub trait EncodingCache {
    fn encode(&self, s: &str) -> Option<Bytes>;
}

/// Strategy that never caches.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCaching;

/// Shared no-caching instance, for call sites writing genuinely dynamic strings.
pub static NO_CACHING: NoCaching = NoCaching;

impl EncodingCache for NoCaching {
    #[inline(always)]
    fn encode(&self, _s: &str) -> Option<Bytes> {
        None
    }
}

/// An immutable table of pre-encoded strings, built once and shared by reference.
#[derive(Debug, Clone, Default)]
pub struct Utf8Table {
    entries: HashMap<Box<str>, Bytes>,
}

impl Utf8Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from static strings. Entries borrow the static data, no copy is made.
    pub fn from_static(strings: &[&'static str]) -> Self {
        let mut table = Self::new();
        for &s in strings {
            table
                .entries
                .insert(Box::from(s), Bytes::from_static(s.as_bytes()));
        }
        table
    }

    /// Add a string to the table, copying its bytes.
    pub fn insert(&mut self, s: &str) {
        if !self.entries.contains_key(s) {
            self.entries
                .insert(Box::from(s), Bytes::copy_from_slice(s.as_bytes()));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, s: &str) -> bool {
        self.entries.contains_key(s)
    }
}

impl EncodingCache for Utf8Table {
    #[inline]
    fn encode(&self, s: &str) -> Option<Bytes> {
        self.entries.get(s).cloned()
    }
}

impl<C: EncodingCache + ?Sized> EncodingCache for &C {
    #[inline]
    fn encode(&self, s: &str) -> Option<Bytes> {
        (**self).encode(s)
    }
}

/// The constant-key and value namespaces, assembled once by whoever builds the encoder.
///
/// Keys are always a fixed table. Values may be a fixed table or any other cache, such
/// as a [`GenerationalUtf8Cache`](crate::GenerationalUtf8Cache) that learns recurring
/// tag values.
///
/// ```
/// use packstream::{CachingStrategies, EncodingCache, Utf8Table};
/// let strategies = CachingStrategies::new(
///     Utf8Table::from_static(&["service", "resource"]),
///     Utf8Table::from_static(&["web", "db"]),
/// );
/// assert_eq!(strategies.constant_keys().encode("service").as_deref(), Some(&b"service"[..]));
/// assert_eq!(strategies.constant_values().encode("service"), None);
/// assert_eq!(strategies.no_caching().encode("service"), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CachingStrategies<V = Utf8Table> {
    keys: Utf8Table,
    values: V,
}

impl<V: EncodingCache> CachingStrategies<V> {
    pub fn new(keys: Utf8Table, values: V) -> Self {
        Self { keys, values }
    }

    /// Cache of frequently repeated field names.
    #[inline]
    pub fn constant_keys(&self) -> &dyn EncodingCache {
        &self.keys
    }

    /// Cache of frequently repeated values.
    #[inline]
    pub fn constant_values(&self) -> &dyn EncodingCache {
        &self.values
    }

    #[inline]
    pub fn no_caching(&self) -> &dyn EncodingCache {
        &NO_CACHING
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_return_exact_utf8_given_known_string() {
        let table = Utf8Table::from_static(&["span.kind", "héllo"]);
        assert_eq!(table.encode("héllo").as_deref(), Some("héllo".as_bytes()));
        assert_eq!(table.encode("span.kind").as_deref(), Some(&b"span.kind"[..]));
    }

    #[test]
    fn should_return_none_given_unknown_string() {
        let table = Utf8Table::from_static(&["a"]);
        assert_eq!(table.encode("b"), None);
        assert_eq!(NO_CACHING.encode("a"), None);
    }

    #[test]
    fn should_insert_once_when_string_repeats() {
        let mut table = Utf8Table::new();
        table.insert("env");
        table.insert("env");
        assert_eq!(table.len(), 1);
        assert!(table.contains("env"));
        assert!(!table.is_empty());
    }

    #[test]
    fn should_keep_namespaces_separate() {
        let strategies =
            CachingStrategies::new(Utf8Table::from_static(&["k"]), Utf8Table::from_static(&["v"]));
        assert!(strategies.constant_keys().encode("v").is_none());
        assert!(strategies.constant_values().encode("v").is_some());
    }
}
