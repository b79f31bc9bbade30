//! Concurrent first-touch page registry
//!
//! The registry is the single process-wide set of pages seen so far. It is
//! built once at tool initialization, shared by `Arc` with every
//! instrumentation entry point, and read exactly once at shutdown by the
//! report exporter.
//!
//! The hot path (page already seen) is a read-locked probe of a sharded FNV
//! map and runs on nearly every basic block of the instrumented program.
//! The slow path re-checks under the shard write lock, so the check-then-act
//! race resolves to exactly one record per page: losers observe the winner's
//! entry and return before symbol resolution or sequence assignment, which
//! keeps the discovery sequence gapless.

use std::sync::{PoisonError, RwLock};

use fnv::FnvHashMap;

use crate::clock::SequenceClock;

/// Size of a tracked page in bytes.
pub const PAGE_SIZE: u64 = 4096;

/// Base address of the page containing `addr`.
#[inline]
pub fn page_of(addr: u64) -> u64 {
    addr & !(PAGE_SIZE - 1)
}

/// Which instrumentation path discovered a page first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOrigin {
    /// Discovered by a basic-block code fetch.
    Code,
    /// Discovered by a store instruction.
    Data,
}

impl PageOrigin {
    /// Single-character tag used in the report.
    pub fn tag(self) -> char {
        match self {
            PageOrigin::Code => 'C',
            PageOrigin::Data => 'D',
        }
    }
}

/// One first-touch observation.
///
/// Created exactly once per distinct page, immutable afterwards, owned by
/// the registry until the final snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    /// Page base address.
    pub page_id: u64,
    /// Access type that won the insert race.
    pub origin: PageOrigin,
    /// 0-based discovery order, gapless across all threads.
    pub sequence: u64,
    /// Raw tick sample taken at discovery.
    pub timestamp: u64,
    /// Symbolic description of the triggering instruction address.
    pub location: String,
}

const SHARD_COUNT: usize = 16;

/// Concurrent insert-if-absent set of pages, keyed by page base address.
pub struct PageRegistry {
    clock: SequenceClock,
    shards: [RwLock<FnvHashMap<u64, PageRecord>>; SHARD_COUNT],
}

impl PageRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            clock: SequenceClock::new(),
            shards: std::array::from_fn(|_| RwLock::new(FnvHashMap::default())),
        }
    }

    #[inline]
    fn shard(&self, page_id: u64) -> &RwLock<FnvHashMap<u64, PageRecord>> {
        // Low 12 bits of a page id are always zero, shard on the bits above.
        &self.shards[(page_id >> 12) as usize & (SHARD_COUNT - 1)]
    }

    /// Record a first touch of `page_id`, returning true iff this call
    /// inserted the record.
    ///
    /// `location` is invoked only on the insertion path: already-seen pages
    /// never pay for symbol resolution. The sequence number is drawn from
    /// the clock only after absence has been confirmed under the shard
    /// write lock, so two callers racing on the same page produce one
    /// record and the loser never allocates a sequence.
    pub fn record_first_touch<F>(&self, page_id: u64, origin: PageOrigin, location: F) -> bool
    where
        F: FnOnce() -> String,
    {
        debug_assert_eq!(page_id % PAGE_SIZE, 0, "page_id must be page-aligned");

        let shard = self.shard(page_id);
        {
            let seen = shard.read().unwrap_or_else(PoisonError::into_inner);
            if seen.contains_key(&page_id) {
                return false;
            }
        }

        let mut seen = shard.write().unwrap_or_else(PoisonError::into_inner);
        if seen.contains_key(&page_id) {
            // Lost the insert race; the winner's record stands.
            return false;
        }
        let location = location();
        let stamp = self.clock.next();
        seen.insert(
            page_id,
            PageRecord {
                page_id,
                origin,
                sequence: stamp.sequence,
                timestamp: stamp.timestamp,
                location,
            },
        );
        true
    }

    /// Number of distinct pages recorded so far.
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.read().unwrap_or_else(PoisonError::into_inner).len())
            .sum()
    }

    /// True if no page has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy out every record, in unspecified order.
    ///
    /// Precondition: all instrumented activity has ceased. The host must
    /// guarantee no concurrent `record_first_touch` caller is running; the
    /// exporter sorts the result by `sequence`.
    pub fn snapshot(&self) -> Vec<PageRecord> {
        let mut records = Vec::with_capacity(self.len());
        for shard in &self.shards {
            let seen = shard.read().unwrap_or_else(PoisonError::into_inner);
            records.extend(seen.values().cloned());
        }
        records
    }
}

impl Default for PageRegistry {
    fn default() -> Self {
        Self::new()
    }
}
