//! Two-level generational cache for recurring string values.
//!
//! Tag values tend to be low cardinality (`env`, `http.method`, peer names) but are
//! mixed with high cardinality ones (ids, urls). The cache keeps the former encoded
//! without letting the latter churn it:
//!
//! - The first request for a value only sets a marker; nothing is cached and the
//!   caller encodes live.
//! - A second request that hits the marker creates an entry in the eden table.
//! - Eden hits raise the entry's score. Once the score passes the promotion threshold
//!   the entry moves to the promoted table, evicting its least recently used entry
//!   if the search window is full.
//! - When eden has no free slot, its most frequently used entry is promoted early if
//!   the promoted table has room; otherwise the least frequently used eden entry is
//!   evicted.
//!
//! Both tables are open addressed with a short linear search window, so lookups and
//! inserts are bounded regardless of input cardinality.
//!
//! [`recalibrate`](GenerationalUtf8Cache::recalibrate) decays eden scores, purges
//! cold entries and tunes the promotion threshold from the promotion and eviction
//! counts since the last call. Call it at a natural boundary such as a flush.

use std::collections::hash_map::RandomState;
use std::fmt;
use std::hash::BuildHasher;
use std::sync::Mutex;

use bytes::Bytes;
use tracing::trace;

use crate::cache::EncodingCache;

const DEFAULT_EDEN_SIZE: usize = 64;
const DEFAULT_PROMOTED_SIZE: usize = 128;

const WINDOW_SLOTS: usize = 4;
const MIN_PROMOTION_THRESHOLD: f64 = 2.0;
const INITIAL_PROMOTION_THRESHOLD: f64 = 10.0;
const SCORE_DECAY: f64 = 0.8;
const PURGE_THRESHOLD: f64 = 0.1;
const PROMOTION_THRESHOLD_ADJ_FACTOR: f64 = 1.5;

/// Marker value for an unused slot. Hashes are adjusted to never equal it.
const EMPTY_MARK: u32 = 0;

/// Counters since the last recalibration.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub eden_hits: u32,
    pub promoted_hits: u32,
    pub promotions: u32,
    pub early_promotions: u32,
    pub eden_evictions: u32,
    pub promoted_evictions: u32,
}

#[derive(Debug)]
struct Entry {
    hash: u32,
    value: Box<str>,
    utf8: Bytes,
    last_used: u64,
    score: f64,
}

impl Entry {
    fn new(hash: u32, value: &str) -> Self {
        Self {
            hash,
            value: Box::from(value),
            utf8: Bytes::copy_from_slice(value.as_bytes()),
            last_used: 0,
            score: 0.0,
        }
    }

    #[inline]
    fn matches(&self, hash: u32, value: &str) -> bool {
        self.hash == hash && &*self.value == value
    }

    #[inline]
    fn hit(&mut self, now: u64) -> f64 {
        self.last_used = now;
        self.score += 1.0;
        self.score
    }

    /// Returns true when the entry has gone cold.
    fn decay(&mut self) -> bool {
        self.score *= SCORE_DECAY;
        self.is_purgeable()
    }

    #[inline]
    fn is_purgeable(&self) -> bool {
        self.score < PURGE_THRESHOLD
    }
}

/// Slots visited for `hash` in a table of `len` (a power of two) slots.
#[inline]
fn window(len: usize, hash: u32) -> impl Iterator<Item = usize> {
    let mask = len - 1;
    let start = hash as usize & mask;
    (0..WINDOW_SLOTS).map(move |p| (start + p) & mask)
}

fn find(table: &[Option<Entry>], hash: u32, value: &str) -> Option<usize> {
    window(table.len(), hash).find(|&i| table[i].as_ref().is_some_and(|e| e.matches(hash, value)))
}

fn find_available(table: &[Option<Entry>], hash: u32) -> Option<usize> {
    window(table.len(), hash).find(|&i| table[i].as_ref().map_or(true, Entry::is_purgeable))
}

/// First empty slot in the window, or else the slot with the highest score.
fn find_empty_or_mfu(table: &[Option<Entry>], hash: u32) -> usize {
    let mut mfu = (f64::MIN, 0);
    for i in window(table.len(), hash) {
        match &table[i] {
            None => return i,
            Some(e) if e.score > mfu.0 => mfu = (e.score, i),
            Some(_) => {}
        }
    }
    mfu.1
}

/// Insert into a free or purgeable slot, else replace the lowest score. True on eviction.
fn lfu_insert(table: &mut [Option<Entry>], entry: Entry) -> bool {
    let mut lfu = (f64::MAX, 0);
    for i in window(table.len(), entry.hash) {
        match &table[i] {
            None => {
                table[i] = Some(entry);
                return false;
            }
            Some(e) if e.is_purgeable() => {
                table[i] = Some(entry);
                return false;
            }
            Some(e) if e.score < lfu.0 => lfu = (e.score, i),
            Some(_) => {}
        }
    }
    table[lfu.1] = Some(entry);
    true
}

/// Insert into a free or matching slot, else replace the oldest use. True on eviction.
fn lru_insert(table: &mut [Option<Entry>], entry: Entry) -> bool {
    let mut lru = (u64::MAX, 0);
    for i in window(table.len(), entry.hash) {
        match &table[i] {
            None => {
                table[i] = Some(entry);
                return false;
            }
            Some(e) if e.matches(entry.hash, &entry.value) => {
                table[i] = Some(entry);
                return false;
            }
            Some(e) if e.last_used < lru.0 => lru = (e.last_used, i),
            Some(_) => {}
        }
    }
    table[lru.1] = Some(entry);
    true
}

/// Record `hash` in its marker slot. True if the slot already held it.
fn mark(markers: &mut [u32], hash: u32) -> bool {
    let index = hash as usize & (markers.len() - 1);
    let prior = std::mem::replace(&mut markers[index], hash);
    prior == hash
}

struct Generations {
    eden: Box<[Option<Entry>]>,
    markers: Box<[u32]>,
    promoted: Box<[Option<Entry>]>,
    clock: u64,
    promotion_threshold: f64,
    stats: CacheStats,
}

impl Generations {
    fn new(eden_size: usize, promoted_size: usize) -> Self {
        Self {
            eden: std::iter::repeat_with(|| None).take(eden_size).collect(),
            markers: vec![EMPTY_MARK; eden_size].into_boxed_slice(),
            promoted: std::iter::repeat_with(|| None).take(promoted_size).collect(),
            clock: 0,
            promotion_threshold: INITIAL_PROMOTION_THRESHOLD,
            stats: CacheStats::default(),
        }
    }

    fn lookup(&mut self, hash: u32, value: &str) -> Option<Bytes> {
        self.clock += 1;
        let now = self.clock;

        if let Some(i) = find(&self.eden, hash, value) {
            let entry = self.eden[i].as_mut()?;
            let score = entry.hit(now);
            let utf8 = entry.utf8.clone();
            self.stats.eden_hits += 1;
            if score > self.promotion_threshold {
                if let Some(entry) = self.eden[i].take() {
                    self.stats.promotions += 1;
                    if lru_insert(&mut self.promoted, entry) {
                        self.stats.promoted_evictions += 1;
                    }
                }
            }
            return Some(utf8);
        }

        if let Some(i) = find(&self.promoted, hash, value) {
            let entry = self.promoted[i].as_mut()?;
            entry.hit(now);
            self.stats.promoted_hits += 1;
            return Some(entry.utf8.clone());
        }

        // a first sighting only leaves a marker
        if !mark(&mut self.markers, hash) {
            return None;
        }

        let mut entry = Entry::new(hash, value);
        // the marked request counts too
        entry.hit(now);
        entry.hit(now);
        let utf8 = entry.utf8.clone();

        let slot = find_empty_or_mfu(&self.eden, hash);
        let mfu_hash = match &self.eden[slot] {
            None => {
                self.eden[slot] = Some(entry);
                return Some(utf8);
            }
            Some(mfu) => mfu.hash,
        };
        if let Some(free) = find_available(&self.promoted, mfu_hash) {
            self.promoted[free] = self.eden[slot].take();
            self.eden[slot] = Some(entry);
            self.stats.early_promotions += 1;
        } else if lfu_insert(&mut self.eden, entry) {
            self.stats.eden_evictions += 1;
        }
        Some(utf8)
    }

    fn recalibrate(&mut self) {
        for slot in self.eden.iter_mut() {
            if slot.as_mut().is_some_and(Entry::decay) {
                *slot = None;
            }
        }
        self.markers.fill(EMPTY_MARK);

        let promotions = self.stats.promotions + self.stats.early_promotions;
        if promotions == 0 && self.promotion_threshold >= MIN_PROMOTION_THRESHOLD {
            self.promotion_threshold /= PROMOTION_THRESHOLD_ADJ_FACTOR;
        } else if promotions > self.stats.promoted_evictions / 2 {
            self.promotion_threshold *= PROMOTION_THRESHOLD_ADJ_FACTOR;
        }
        trace!(
            stats = ?self.stats,
            promotion_threshold = self.promotion_threshold,
            "recalibrated value cache"
        );
        self.stats = CacheStats::default();
    }
}

/// Bounded, self-tuning cache of UTF-8 encodings for recurring values.
///
/// Thread-safe. A lookup that finds the cache busy returns `None` and the caller
/// encodes live, so contention never blocks a writer.
///
/// ```
/// use packstream::{EncodingCache, GenerationalUtf8Cache};
///
/// let cache = GenerationalUtf8Cache::new();
/// assert_eq!(cache.encode("prod"), None); // first sighting
/// assert_eq!(cache.encode("prod").as_deref(), Some(&b"prod"[..]));
/// ```
pub struct GenerationalUtf8Cache {
    hasher: RandomState,
    state: Mutex<Generations>,
}

impl Default for GenerationalUtf8Cache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for GenerationalUtf8Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationalUtf8Cache")
            .field("eden_len", &self.eden_len())
            .field("promoted_len", &self.promoted_len())
            .field("stats", &self.stats())
            .finish()
    }
}

impl GenerationalUtf8Cache {
    /// 64 eden slots and 128 promoted slots.
    pub fn new() -> Self {
        Self::with_sizes(DEFAULT_EDEN_SIZE, DEFAULT_PROMOTED_SIZE)
    }

    /// Table sizes are rounded up to a power of two no smaller than the search window.
    pub fn with_sizes(eden_size: usize, promoted_size: usize) -> Self {
        let eden_size = eden_size.max(WINDOW_SLOTS).next_power_of_two();
        let promoted_size = promoted_size.max(WINDOW_SLOTS).next_power_of_two();
        Self {
            hasher: RandomState::new(),
            state: Mutex::new(Generations::new(eden_size, promoted_size)),
        }
    }

    #[inline]
    fn hash(&self, value: &str) -> u32 {
        match self.hasher.hash_one(value) as u32 {
            EMPTY_MARK => 0x0DA7_AD06,
            h => h,
        }
    }

    /// Decay eden scores, drop cold entries and retune the promotion threshold.
    pub fn recalibrate(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.recalibrate();
        }
    }

    /// Counters since the last recalibration.
    pub fn stats(&self) -> CacheStats {
        self.state.lock().map(|s| s.stats).unwrap_or_default()
    }

    pub fn promotion_threshold(&self) -> f64 {
        self.state
            .lock()
            .map(|s| s.promotion_threshold)
            .unwrap_or(INITIAL_PROMOTION_THRESHOLD)
    }

    /// Slots available in the eden and promoted tables.
    pub fn capacity(&self) -> (usize, usize) {
        self.state
            .lock()
            .map(|s| (s.eden.len(), s.promoted.len()))
            .unwrap_or_default()
    }

    pub fn eden_len(&self) -> usize {
        self.state
            .lock()
            .map(|s| s.eden.iter().flatten().count())
            .unwrap_or_default()
    }

    pub fn promoted_len(&self) -> usize {
        self.state
            .lock()
            .map(|s| s.promoted.iter().flatten().count())
            .unwrap_or_default()
    }

    /// True if `value` sits in the promoted table.
    pub fn is_promoted(&self, value: &str) -> bool {
        let hash = self.hash(value);
        self.state
            .lock()
            .map(|s| find(&s.promoted, hash, value).is_some())
            .unwrap_or(false)
    }
}

impl EncodingCache for GenerationalUtf8Cache {
    fn encode(&self, s: &str) -> Option<Bytes> {
        let hash = self.hash(s);
        self.state.try_lock().ok()?.lookup(hash, s)
    }
}
